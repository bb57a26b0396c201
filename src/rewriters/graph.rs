/*!
`circuit` and `routes`: Hamiltonian-circuit and vehicle-routing arc sets over
a node-indexed graph, each arc carrying a literal that is true iff the arc is
used (spec.md §4.3.8). Both constraints share the same arc representation
(`(tail, head, literal)`, with a self-arc `(n, n, lit)` meaning node `n` is
skipped), but `circuit` additionally requires every node to lie on a single
cycle through every non-skipped node, while `routes` only requires each
node's used arcs to balance in/out degree.
*/

use std::collections::{BTreeMap, BTreeSet};

use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::{Circuit, ConstraintKind, Routes};
use crate::model::{ConstraintIndex, Literal};

use super::{mark_false, remove_constraint};

/// Reindexes nodes to `0..num_nodes` densely (dropping gaps left by nodes no
/// arc mentions anymore) and returns the arcs rewritten against the new
/// indices along with the incident-arc lists per new node index.
fn reindex(arcs: &[(i32, i32, Literal)]) -> (Vec<(i32, i32, Literal)>, BTreeMap<i32, i32>) {
    let mut nodes: BTreeSet<i32> = BTreeSet::new();
    for &(t, h, _) in arcs {
        nodes.insert(t);
        nodes.insert(h);
    }
    let remap: BTreeMap<i32, i32> = nodes.iter().enumerate().map(|(new, &old)| (old, new as i32)).collect();
    let rewritten = arcs.iter().map(|&(t, h, l)| (remap[&t], remap[&h], l)).collect();
    (rewritten, remap)
}

pub fn presolve_circuit(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Circuit(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    if body.arcs.is_empty() {
        remove_constraint(ctx, ci);
        return Ok(());
    }

    let (arcs, _remap) = reindex(&body.arcs);
    let num_nodes = arcs.iter().map(|&(t, h, _)| t.max(h)).max().unwrap_or(-1) + 1;

    // Every literal already fixed false is dropped from consideration for
    // degree/coverage purposes; a literal fixed true is recorded as the
    // arc this node must take.
    let mut out_arcs: Vec<Vec<usize>> = vec![Vec::new(); num_nodes as usize];
    let mut in_arcs: Vec<Vec<usize>> = vec![Vec::new(); num_nodes as usize];
    let mut live: Vec<bool> = Vec::with_capacity(arcs.len());
    for (idx, &(t, h, lit)) in arcs.iter().enumerate() {
        let fixed = ctx.model.var(lit.atom()).is_fixed();
        let forced_false = fixed.map(|v| (v != 0) != lit.polarity()).unwrap_or(false);
        live.push(!forced_false);
        if !forced_false {
            out_arcs[t as usize].push(idx);
            in_arcs[h as usize].push(idx);
        }
    }

    // Every node needs at least one live outgoing and one live incoming arc.
    for node in 0..num_nodes as usize {
        if out_arcs[node].is_empty() || in_arcs[node].is_empty() {
            mark_false(ctx, ci, "circuit node has no available incoming or outgoing arc");
            return Ok(());
        }
    }

    // Degree-1 nodes: the sole surviving arc must be taken.
    for node in 0..num_nodes as usize {
        if out_arcs[node].len() == 1 {
            let (_, _, lit) = arcs[out_arcs[node][0]];
            ctx.set_literal_true(lit)?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
        if in_arcs[node].len() == 1 {
            let (_, _, lit) = arcs[in_arcs[node][0]];
            ctx.set_literal_true(lit)?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
    }

    // Arcs already forced true: chase the forced sub-path they form. If it
    // closes into a cycle before covering every node, every arc outside the
    // forced set must be excluded (a circuit visiting every non-skipped
    // node can only contain one cycle).
    let mut forced_next: BTreeMap<i32, i32> = BTreeMap::new();
    for &(t, h, lit) in &arcs {
        if ctx.model.var(lit.atom()).is_fixed() == Some(if lit.polarity() { 1 } else { 0 }) {
            forced_next.insert(t, h);
        }
    }
    if let Some((&start, _)) = forced_next.iter().next() {
        let mut visited = BTreeSet::new();
        let mut cur = start;
        loop {
            if !visited.insert(cur) {
                break;
            }
            match forced_next.get(&cur) {
                Some(&next) => cur = next,
                None => break,
            }
        }
        let closed_cycle = forced_next.get(&cur) == Some(&start);
        if closed_cycle && (visited.len() as i32) < num_nodes {
            for (idx, &(t, h, lit)) in arcs.iter().enumerate() {
                if !live[idx] {
                    continue;
                }
                if visited.contains(&t) && !(visited.contains(&h) && h == start && t == cur) {
                    // Any arc leaving a node already on the forced cycle,
                    // other than the closing arc itself, must be excluded.
                    if !(t == cur && h == start) {
                        ctx.set_literal_false(lit)?;
                        if ctx.is_infeasible() {
                            return Ok(());
                        }
                    }
                }
            }
        } else if (visited.len() as i32) == num_nodes && closed_cycle {
            // Every node covered by the forced path: fully specified,
            // remove the constraint (the forced arcs already pin the
            // solution).
            remove_constraint(ctx, ci);
            ctx.rule_stats.increment("circuit_fully_specified");
            return Ok(());
        }
    }

    // A node with exactly two undetermined incident arcs on one side forces
    // a binary equality between them (exactly one of the two holds, since
    // each live node needs exactly one outgoing and one incoming arc).
    for node in 0..num_nodes as usize {
        let undetermined_out: Vec<Literal> = out_arcs[node]
            .iter()
            .filter(|&&idx| ctx.model.var(arcs[idx].2.atom()).is_fixed().is_none())
            .map(|&idx| arcs[idx].2)
            .collect();
        if undetermined_out.len() == 2 {
            ctx.store_boolean_equality(undetermined_out[0], -undetermined_out[1])?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
        let undetermined_in: Vec<Literal> = in_arcs[node]
            .iter()
            .filter(|&&idx| ctx.model.var(arcs[idx].2.atom()).is_fixed().is_none())
            .map(|&idx| arcs[idx].2)
            .collect();
        if undetermined_in.len() == 2 {
            ctx.store_boolean_equality(undetermined_in[0], -undetermined_in[1])?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Circuit(Circuit { arcs: body.arcs }));
    Ok(())
}

pub fn presolve_routes(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Routes(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    // Drop arcs whose literal is already fixed false; they can never be
    // taken and only clutter the incidence check below.
    let arcs: Vec<(i32, i32, Literal)> = body
        .arcs
        .into_iter()
        .filter(|&(_, _, lit)| {
            let fixed = ctx.model.var(lit.atom()).is_fixed();
            !fixed.map(|v| (v != 0) != lit.polarity()).unwrap_or(false)
        })
        .collect();

    if arcs.is_empty() {
        mark_false(ctx, ci, "routes has no available arcs");
        return Ok(());
    }

    let mut out_count: BTreeMap<i32, usize> = BTreeMap::new();
    let mut in_count: BTreeMap<i32, usize> = BTreeMap::new();
    for &(t, h, _) in &arcs {
        if t != 0 {
            *out_count.entry(t).or_insert(0) += 1;
        }
        if h != 0 {
            *in_count.entry(h).or_insert(0) += 1;
        }
    }
    let mut nodes: BTreeSet<i32> = BTreeSet::new();
    for &(t, h, _) in &arcs {
        nodes.insert(t);
        nodes.insert(h);
    }
    for &node in &nodes {
        if node == 0 {
            continue;
        }
        if out_count.get(&node).copied().unwrap_or(0) == 0 || in_count.get(&node).copied().unwrap_or(0) == 0 {
            mark_false(ctx, ci, "routes node has no available incident arc");
            return Ok(());
        }
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Routes(Routes { arcs }));
    Ok(())
}
