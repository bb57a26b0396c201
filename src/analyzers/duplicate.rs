/*!
The duplicate detector (spec.md §4.4.2): finds constraints that are
identical up to reordering of their own symmetric arguments and merges
them, so a model built by a generator that emits the same constraint twice
(common after several rewrite passes substitute two different variables
down to the same representative) doesn't carry the redundant copy forward.

Equality is checked on a constraint's *canonical shape* — its kind, its
sorted variable/coefficient list, everything except its enforcement literals
— with enforcement compared separately, since two constraints with the same
body but different enforcement are not interchangeable.
*/

use std::collections::HashMap;

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::ConstraintIndex;

use crate::rewriters::remove_constraint;

/// A structural fingerprint cheap to hash and compare, built so that two
/// constraints with the same fingerprint are *candidates* for exact
/// equality, not guaranteed matches (the bucket is then checked pairwise).
fn fingerprint(kind: &ConstraintKind) -> String {
    use ConstraintKind::*;
    match kind {
        Linear(c) => format!("linear:{}:{:?}:{:?}:{}", c.expr.vars.len(), c.expr.vars, c.expr.coeffs, c.expr.offset),
        BoolOr(c) => {
            let mut lits = c.literals.clone();
            lits.sort();
            format!("bool_or:{:?}", lits)
        }
        BoolAnd(c) => {
            let mut lits = c.literals.clone();
            lits.sort();
            format!("bool_and:{:?}", lits)
        }
        AtMostOne(c) => {
            let mut lits = c.literals.clone();
            lits.sort();
            format!("at_most_one:{:?}", lits)
        }
        ExactlyOne(c) => {
            let mut lits = c.literals.clone();
            lits.sort();
            format!("exactly_one:{:?}", lits)
        }
        BoolXor(c) => format!("bool_xor:{:?}", c.literals),
        IntProd(c) => format!("int_prod:{:?}:{:?}", c.target, c.factors),
        IntDiv(c) => format!("int_div:{:?}:{:?}:{:?}", c.target, c.numerator, c.denominator),
        IntMod(c) => format!("int_mod:{:?}:{:?}:{:?}", c.target, c.numerator, c.modulus),
        Element(c) => format!("element:{:?}:{:?}:{:?}", c.index, c.target, c.entries),
        Table(c) => format!("table:{:?}:{:?}:{}", c.vars, c.tuples, c.negated),
        Automaton(c) => format!("automaton:{:?}", c.vars),
        Interval(c) => format!("interval:{:?}:{:?}:{:?}", c.start, c.size, c.end),
        NoOverlap(c) => format!("no_overlap:{:?}", c.intervals),
        NoOverlap2D(c) => format!("no_overlap_2d:{:?}:{:?}", c.x_intervals, c.y_intervals),
        Cumulative(c) => format!("cumulative:{:?}:{:?}:{:?}", c.capacity, c.intervals, c.demands),
        Circuit(c) => format!("circuit:{:?}", c.arcs),
        Routes(c) => format!("routes:{:?}", c.arcs),
        Reservoir(c) => format!("reservoir:{:?}", c.events),
        AllDifferent(c) => format!("all_different:{:?}", c.exprs),
        Inverse(c) => format!("inverse:{:?}:{:?}", c.forward, c.backward),
    }
}

fn same_shape(a: &ConstraintKind, b: &ConstraintKind) -> bool {
    use ConstraintKind::*;
    match (a, b) {
        (Linear(x), Linear(y)) => x.expr.vars == y.expr.vars && x.expr.coeffs == y.expr.coeffs && x.expr.offset == y.expr.offset && x.rhs == y.rhs,
        (BoolOr(x), BoolOr(y)) => {
            let (mut xs, mut ys) = (x.literals.clone(), y.literals.clone());
            xs.sort();
            ys.sort();
            xs == ys
        }
        (BoolAnd(x), BoolAnd(y)) => {
            let (mut xs, mut ys) = (x.literals.clone(), y.literals.clone());
            xs.sort();
            ys.sort();
            xs == ys
        }
        (AtMostOne(x), AtMostOne(y)) => {
            let (mut xs, mut ys) = (x.literals.clone(), y.literals.clone());
            xs.sort();
            ys.sort();
            xs == ys
        }
        (ExactlyOne(x), ExactlyOne(y)) => {
            let (mut xs, mut ys) = (x.literals.clone(), y.literals.clone());
            xs.sort();
            ys.sort();
            xs == ys
        }
        _ => a == b,
    }
}

/// Merges exact duplicates among live constraints: when two constraints
/// have the same body and the same enforcement, one is entirely redundant
/// and can be tombstoned. When the bodies match but the enforcement
/// differs, the two constraints are left alone — reconciling them would
/// need an implication between the two enforcement literals, which is
/// [`super::probing`]'s job, not this pass's.
pub fn run(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let mut buckets: HashMap<String, Vec<ConstraintIndex>> = HashMap::new();
    for (idx, constraint) in ctx.model.constraints.iter().enumerate() {
        if constraint.is_removed() {
            continue;
        }
        let Some(kind) = &constraint.kind else { continue };
        let fp = fingerprint(kind);
        buckets.entry(fp).or_default().push(ConstraintIndex(idx as u32));
    }

    for (_fp, mut members) in buckets {
        if members.len() < 2 {
            continue;
        }
        members.sort();
        for i in 0..members.len() {
            if budget.exhausted() || ctx.is_infeasible() {
                return Ok(());
            }
            let keep = members[i];
            if ctx.model.constraint(keep).is_removed() {
                continue;
            }
            for &drop in &members[(i + 1)..] {
                budget.spend(1);
                if ctx.model.constraint(drop).is_removed() {
                    continue;
                }
                let (keep_kind, keep_enf) = {
                    let c = ctx.model.constraint(keep);
                    (c.kind.clone(), c.enforcement.clone())
                };
                let (drop_kind, drop_enf) = {
                    let c = ctx.model.constraint(drop);
                    (c.kind.clone(), c.enforcement.clone())
                };
                let (Some(keep_kind), Some(drop_kind)) = (keep_kind, drop_kind) else { continue };
                if !same_shape(&keep_kind, &drop_kind) {
                    continue;
                }
                let mut keep_enf_sorted = keep_enf.clone();
                keep_enf_sorted.sort();
                let mut drop_enf_sorted = drop_enf.clone();
                drop_enf_sorted.sort();
                if keep_enf_sorted == drop_enf_sorted {
                    remove_constraint(ctx, drop);
                    ctx.rule_stats.increment("duplicate_constraint_merged");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Domain;
    use crate::model::constraint::{AtMostOne, Constraint};
    use crate::model::literal::Literal;
    use crate::model::var::Variable;
    use crate::model::Model;

    #[test]
    fn exact_duplicate_at_most_one_is_merged() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![Literal::positive(a), Literal::positive(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![Literal::positive(b), Literal::positive(a)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert!(ctx.model.constraint(ConstraintIndex(1)).is_removed());
        assert!(!ctx.model.constraint(ConstraintIndex(0)).is_removed());
    }

    #[test]
    fn different_enforcement_is_left_alone() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let g1 = model.new_variable(Variable::new(Domain::range(0, 1)));
        let g2 = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::new(
            ConstraintKind::AtMostOne(AtMostOne {
                literals: vec![Literal::positive(a), Literal::positive(b)],
            }),
            vec![Literal::positive(g1)],
        ));
        model.add_constraint(Constraint::new(
            ConstraintKind::AtMostOne(AtMostOne {
                literals: vec![Literal::positive(a), Literal::positive(b)],
            }),
            vec![Literal::positive(g2)],
        ));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert!(!ctx.model.constraint(ConstraintIndex(0)).is_removed());
        assert!(!ctx.model.constraint(ConstraintIndex(1)).is_removed());
    }
}
