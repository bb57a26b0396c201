/*!
Clique merging (spec.md §4.4.5): builds the literal co-occurrence graph
implied by `at_most_one` constraints and greedily grows maximal cliques,
replacing the covered `at_most_one`s with a single larger one.

Worked example from the spec: `at_most_one(a,b)`, `at_most_one(b,c)`,
`at_most_one(a,c)` pairwise forbid every pair of `{a,b,c}` from holding
together, which is exactly `at_most_one(a,b,c)` — so the three small
constraints merge into one and are removed.
*/

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::{AtMostOne, Constraint, ConstraintKind};
use crate::model::literal::Literal;
use crate::model::ConstraintIndex;

use crate::rewriters::remove_constraint;

/// An undirected graph over literals: `edges[lit]` is the set of literals
/// that appear together with `lit` in some live, unconditional
/// `at_most_one` of size exactly 2 (the clique-merge reduction only needs
/// pairwise edges; larger `at_most_one`s are already cliques and are left
/// as seeds rather than decomposed).
fn build_pairwise_graph(ctx: &PresolveContext) -> (HashMap<Literal, BTreeSet<Literal>>, Vec<ConstraintIndex>) {
    let mut edges: HashMap<Literal, BTreeSet<Literal>> = HashMap::new();
    let mut pair_constraints = Vec::new();

    for (idx, constraint) in ctx.model.constraints.iter().enumerate() {
        if constraint.is_removed() || !constraint.enforcement.is_empty() {
            continue;
        }
        if let Some(ConstraintKind::AtMostOne(c)) = &constraint.kind {
            if c.literals.len() == 2 {
                let (x, y) = (c.literals[0], c.literals[1]);
                edges.entry(x).or_default().insert(y);
                edges.entry(y).or_default().insert(x);
                pair_constraints.push(ConstraintIndex(idx as u32));
            }
        }
    }
    (edges, pair_constraints)
}

/// Greedily grows a clique starting from edge `(seed, first_neighbor)`:
/// repeatedly adds any literal connected to every member already in the
/// clique, in literal order for determinism.
fn grow_clique(edges: &HashMap<Literal, BTreeSet<Literal>>, seed: Literal, first: Literal) -> BTreeSet<Literal> {
    let mut clique: BTreeSet<Literal> = [seed, first].into_iter().collect();
    let mut candidates: BTreeSet<Literal> = edges
        .get(&seed)
        .into_iter()
        .flatten()
        .chain(edges.get(&first).into_iter().flatten())
        .copied()
        .collect();
    candidates.remove(&seed);
    candidates.remove(&first);

    loop {
        let next = candidates
            .iter()
            .find(|&&cand| clique.iter().all(|m| edges.get(m).map(|s| s.contains(&cand)).unwrap_or(false)))
            .copied();
        let Some(next) = next else { break };
        clique.insert(next);
        candidates.remove(&next);
    }
    clique
}

pub fn run(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let (edges, pair_constraints) = build_pairwise_graph(ctx);
    if pair_constraints.len() < 3 {
        return Ok(());
    }

    let mut covered: HashSet<Literal> = HashSet::new();
    let mut seeds: Vec<(Literal, Literal)> = Vec::new();
    for (&lit, neighbors) in &edges {
        for &other in neighbors {
            if lit < other {
                seeds.push((lit, other));
            }
        }
    }
    seeds.sort();

    for (seed, first) in seeds {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        if covered.contains(&seed) || covered.contains(&first) {
            continue;
        }
        budget.spend(edges.get(&seed).map(|s| s.len() as u64).unwrap_or(1));

        let clique = grow_clique(&edges, seed, first);
        if clique.len() < 3 {
            continue;
        }

        // Find every pairwise at_most_one fully contained in the clique;
        // merging only pays off if it actually covers more than one
        // constraint.
        let covered_constraints: Vec<ConstraintIndex> = pair_constraints
            .iter()
            .copied()
            .filter(|&ci| {
                if ctx.model.constraint(ci).is_removed() {
                    return false;
                }
                let Some(ConstraintKind::AtMostOne(c)) = &ctx.model.constraint(ci).kind else { return false };
                c.literals.len() == 2 && clique.contains(&c.literals[0]) && clique.contains(&c.literals[1])
            })
            .collect();
        if covered_constraints.len() < 2 {
            continue;
        }

        let merged = Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: clique.iter().copied().collect(),
        }));
        let new_ci = ctx.model.add_constraint(merged);
        ctx.track_new_constraint(new_ci);
        for ci in covered_constraints {
            remove_constraint(ctx, ci);
        }
        ctx.rule_stats.increment("clique_merge");
        covered.extend(clique.iter().copied());
    }
    Ok(())
}
