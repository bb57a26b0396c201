/*!
`element`: `target = entries[index]` (spec.md §4.3.4). Index and target are
affine linear expressions over a single variable each; array entries
likewise. The rewriter restricts the index to `[0, n-1]`, then for each
reachable index value requires the target's domain to be able to reach that
entry's value, excluding index values that can't.
*/

use crate::context::PresolveContext;
use crate::domain::{Domain, Interval};
use crate::error::PresolveError;
use crate::model::constraint::{ConstraintKind, Element};
use crate::model::linear::LinearExpr;
use crate::model::ConstraintIndex;

use super::remove_constraint;

fn domain_of(ctx: &PresolveContext, e: &crate::model::constraint::AffineExpr) -> Domain {
    ctx.model.var(e.var).domain.mul_by(e.coeff).add(&Domain::fixed(e.offset))
}

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Element(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let n = body.entries.len() as i64;
    if n == 0 {
        ctx.mark_infeasible("element constraint over an empty array");
        return Ok(());
    }

    if !ctx.model.constraint(ci).enforcement.is_empty() {
        // Every branch below tightens the index or target domain, folds the
        // constraint into an unconditional equality, or removes it outright
        // — all assume the body must hold, which a reified element need
        // not. Leave it untouched rather than risk discarding a solution
        // where the enforcement is false.
        return Ok(());
    }

    ctx.intersect_domain(body.index.var, &inverse_domain(&body.index, &Domain::range(0, n - 1)))?;
    if ctx.is_infeasible() {
        return Ok(());
    }

    let index_domain = domain_of(ctx, &body.index);

    // Fixed index: replace the whole constraint with a direct equality
    // between target and the selected entry, and push the original
    // constraint to mapping for the (now-removed) index's reconstruction.
    if let Some(idx_val) = index_domain.is_fixed() {
        if idx_val < 0 || idx_val >= n {
            ctx.mark_infeasible("element index out of array bounds");
            return Ok(());
        }
        let entry = body.entries[idx_val as usize];
        let expr = LinearExpr {
            vars: vec![body.target.var, entry.var],
            coeffs: vec![body.target.coeff, -entry.coeff],
            offset: body.target.offset - entry.offset,
        }
        .canonicalize();
        let ci_new = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
            ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
                expr,
                rhs: Domain::fixed(0),
            }),
        ));
        ctx.track_new_constraint(ci_new);
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("element_fixed_index");
        return Ok(());
    }

    // All entries denote the same affine expression of the same variable
    // (or are all fixed to the same value): the index is irrelevant, the
    // constraint reduces to a direct equality and the index can be
    // eliminated (pushed to mapping, since any in-range value works).
    if all_entries_equal(&body.entries) {
        let entry = body.entries[0];
        let expr = LinearExpr {
            vars: vec![body.target.var, entry.var],
            coeffs: vec![body.target.coeff, -entry.coeff],
            offset: body.target.offset - entry.offset,
        }
        .canonicalize();
        let ci_new = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
            ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
                expr,
                rhs: Domain::fixed(0),
            }),
        ));
        ctx.track_new_constraint(ci_new);

        if ctx.degree(body.index.var) == 1 {
            let original = crate::model::constraint::Constraint::unconditional(ConstraintKind::Element(body.clone()));
            ctx.new_mapping_constraint(original, "element_index_unused_all_entries_equal");
            ctx.model.var_mut(body.index.var).state = crate::model::VarState::Removed;
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("element_all_entries_equal");
        return Ok(());
    }

    // Restrict the index to values whose entry domain can still reach the
    // target's domain, and widen the target's domain to the union of
    // reachable entries.
    let target_domain = domain_of(ctx, &body.target);
    let mut reachable_indices: Vec<Interval> = Vec::new();
    let mut union_of_reachable = Domain::empty();
    for v in index_domain.min().unwrap()..=index_domain.max().unwrap() {
        if v < 0 || v >= n || !index_domain.contains(v) {
            continue;
        }
        let entry_domain = domain_of(ctx, &body.entries[v as usize]);
        if entry_domain.intersect(&target_domain).is_empty() {
            continue;
        }
        reachable_indices.push(Interval::singleton(v));
        union_of_reachable = union_of_reachable.union(&entry_domain);
    }
    let reachable_index_domain = Domain::from_intervals(reachable_indices);
    ctx.intersect_domain(body.index.var, &inverse_domain(&body.index, &reachable_index_domain))?;
    if ctx.is_infeasible() {
        return Ok(());
    }
    ctx.intersect_domain(body.target.var, &inverse_domain(&body.target, &union_of_reachable))?;
    if ctx.is_infeasible() {
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Element(body));
    Ok(())
}

fn inverse_domain(e: &crate::model::constraint::AffineExpr, required: &Domain) -> Domain {
    if e.coeff == 0 {
        return if required.contains(e.offset) { Domain::full() } else { Domain::empty() };
    }
    required.add(&Domain::fixed(-e.offset)).inverse_mul(e.coeff)
}

fn all_entries_equal(entries: &[crate::model::constraint::AffineExpr]) -> bool {
    entries.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::constraint::{AffineExpr, Constraint};
    use crate::model::var::Variable;
    use crate::model::Model;

    fn affine(var: crate::model::VarIndex) -> AffineExpr {
        AffineExpr { var, coeff: 1, offset: 0 }
    }

    #[test]
    fn fixed_index_becomes_direct_equality() {
        let mut model = Model::default();
        let target = model.new_variable(Variable::new(Domain::range(0, 10)));
        let index = model.new_variable(Variable::new(Domain::fixed(1)));
        let e0 = model.new_variable(Variable::new(Domain::fixed(5)));
        let e1 = model.new_variable(Variable::new(Domain::fixed(7)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Element(Element {
            index: affine(index),
            target: affine(target),
            entries: vec![affine(e0), affine(e1)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert!(ctx.model.constraint(ConstraintIndex(0)).is_removed());
        assert_eq!(ctx.model.constraint(ConstraintIndex(1)).kind.as_ref().unwrap().name(), "linear");
    }

    #[test]
    fn out_of_range_index_excluded() {
        let mut model = Model::default();
        let target = model.new_variable(Variable::new(Domain::range(0, 10)));
        let index = model.new_variable(Variable::new(Domain::range(0, 5)));
        let e0 = model.new_variable(Variable::new(Domain::fixed(1)));
        let e1 = model.new_variable(Variable::new(Domain::fixed(2)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Element(Element {
            index: affine(index),
            target: affine(target),
            entries: vec![affine(e0), affine(e1)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(index).domain, Domain::range(0, 1));
    }
}
