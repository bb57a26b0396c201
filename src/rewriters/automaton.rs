/*!
`automaton`: a sequence of variables (labels) must trace a path through a
finite automaton from its starting state to one of its final states (spec.md
§4.3.6). The rewriter computes forward reachability (states reachable from
`starting_state` after reading `k` labels) and backward reachability (states
that can still reach a final state in the remaining `n-k` steps), and
restricts each label's domain to the set of transition labels consistent
with both directions.
*/

use std::collections::{BTreeSet, HashMap};

use crate::context::PresolveContext;
use crate::domain::{Domain, Interval};
use crate::error::PresolveError;
use crate::model::constraint::{Automaton, ConstraintKind};
use crate::model::ConstraintIndex;

use super::{mark_false, remove_constraint};

/// `forward[k]` = states reachable from `starting_state` after reading `k`
/// labels from a domain-consistent word; `backward[k]` = states from which
/// a final state is reachable in `n - k` more steps.
fn reachability(automaton: &Automaton, n: usize, label_allowed: impl Fn(usize, i64) -> bool) -> (Vec<BTreeSet<i64>>, Vec<BTreeSet<i64>>) {
    let mut by_from: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    let mut by_to: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    for &(from, label, to) in &automaton.transitions {
        by_from.entry(from).or_default().push((label, to));
        by_to.entry(to).or_default().push((label, from));
    }

    let mut forward = vec![BTreeSet::new(); n + 1];
    forward[0].insert(automaton.starting_state);
    for k in 0..n {
        let current: Vec<i64> = forward[k].iter().copied().collect();
        for state in current {
            if let Some(edges) = by_from.get(&state) {
                for &(label, to) in edges {
                    if label_allowed(k, label) {
                        forward[k + 1].insert(to);
                    }
                }
            }
        }
    }

    let mut backward = vec![BTreeSet::new(); n + 1];
    for &f in &automaton.final_states {
        backward[n].insert(f);
    }
    for k in (0..n).rev() {
        let next: Vec<i64> = backward[k + 1].iter().copied().collect();
        for state in next {
            if let Some(edges) = by_to.get(&state) {
                for &(label, from) in edges {
                    if label_allowed(k, label) {
                        backward[k].insert(from);
                    }
                }
            }
        }
    }

    (forward, backward)
}

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Automaton(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let n = body.vars.len();
    if n == 0 {
        if body.final_states.contains(&body.starting_state) {
            remove_constraint(ctx, ci);
        } else {
            mark_false(ctx, ci, "empty automaton word cannot reach a final state");
        }
        return Ok(());
    }

    let domains: Vec<Domain> = body.vars.iter().map(|v| ctx.model.var(*v).domain.clone()).collect();
    let label_allowed = |k: usize, label: i64| domains[k].contains(label);

    let (forward, backward) = reachability(&body, n, label_allowed);

    if !forward[n].iter().any(|s| body.final_states.contains(s)) {
        mark_false(ctx, ci, "no automaton run reaches a final state given current label domains");
        return Ok(());
    }

    // Restrict each position's label domain to labels that both continue a
    // forward-reachable state and lead to a backward-reachable one.
    let mut by_from: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    for &(from, label, to) in &body.transitions {
        by_from.entry(from).or_default().push((label, to));
    }

    for k in 0..n {
        let mut allowed_labels: BTreeSet<i64> = BTreeSet::new();
        for state in &forward[k] {
            if let Some(edges) = by_from.get(state) {
                for &(label, to) in edges {
                    if backward[k + 1].contains(&to) {
                        allowed_labels.insert(label);
                    }
                }
            }
        }
        let restricted = Domain::from_intervals(allowed_labels.iter().map(|&v| Interval::singleton(v)).collect());
        ctx.intersect_domain(body.vars[k], &restricted)?;
        if ctx.is_infeasible() {
            return Ok(());
        }
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Automaton(body));
    Ok(())
}
