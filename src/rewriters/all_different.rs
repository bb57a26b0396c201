/*!
`all_different`: every expression in `exprs` must denote a distinct value
(spec.md §4.3.10). Each expression is an affine map of a single variable, so
two expressions denote the same function of the model's variables — and
therefore can never differ — exactly when they canonicalize to the same
`(var, coeff, offset)` (or, for a constant expression, the same offset
regardless of which placeholder variable carries it).
*/

use std::collections::HashMap;

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{AffineExpr, AllDifferent, ConstraintKind};
use crate::model::ConstraintIndex;

use super::{mark_false, remove_constraint};

/// The key two affine expressions share iff they denote the same function:
/// a non-constant expression is keyed on `(var, coeff, offset)`; a constant
/// expression (`coeff == 0`) is keyed on the offset alone, since the
/// placeholder variable it carries is never read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ExprKey {
    Constant(i64),
    Affine(crate::model::VarIndex, i64, i64),
}

fn key_of(e: &AffineExpr) -> ExprKey {
    if e.coeff == 0 {
        ExprKey::Constant(e.offset)
    } else {
        ExprKey::Affine(e.var, e.coeff, e.offset)
    }
}

fn domain_of(ctx: &PresolveContext, e: &AffineExpr) -> Domain {
    if e.coeff == 0 {
        return Domain::fixed(e.offset);
    }
    ctx.model.var(e.var).domain.mul_by(e.coeff).add(&Domain::fixed(e.offset))
}

/// `required` is a domain of values for the expression's *underlying
/// variable*-independent value; translates it back through `e`'s affine map
/// into a domain on `e.var` itself.
fn inverse_domain(e: &AffineExpr, required: &Domain) -> Domain {
    if e.coeff == 0 {
        return Domain::full();
    }
    required.add(&Domain::fixed(-e.offset)).inverse_mul(e.coeff)
}

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::AllDifferent(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    if body.exprs.len() <= 1 {
        remove_constraint(ctx, ci);
        return Ok(());
    }

    // Two expressions that are the very same function of the model are an
    // automatic contradiction: they must always take the same value, which
    // an all-different with at least two members forbids.
    let mut first_seen: HashMap<ExprKey, usize> = HashMap::new();
    for (i, e) in body.exprs.iter().enumerate() {
        let k = key_of(e);
        if first_seen.contains_key(&k) {
            mark_false(ctx, ci, "all_different has two structurally identical expressions");
            return Ok(());
        }
        first_seen.insert(k, i);
    }

    if !ctx.model.constraint(ci).enforcement.is_empty() {
        // The propagation and Hall-interval passes below both tighten a
        // member expression's domain on the assumption the all-different
        // holds; a reified one need not, so stop here and leave the body
        // as substituted above.
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::AllDifferent(AllDifferent { exprs: body.exprs }));
        return Ok(());
    }

    // Propagate already-fixed expressions: their value is forbidden to
    // every other expression.
    let mut exprs = body.exprs;
    let fixed_values: Vec<Option<i64>> = exprs.iter().map(|e| domain_of(ctx, e).is_fixed()).collect();
    for (i, fv) in fixed_values.iter().enumerate() {
        let Some(value) = fv else { continue };
        for (j, e) in exprs.iter().enumerate() {
            if i == j {
                continue;
            }
            let forbidden = Domain::fixed(*value).complement();
            ctx.intersect_domain(e.var, &inverse_domain(e, &forbidden))?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
    }
    if ctx.is_infeasible() {
        return Ok(());
    }

    // Hall-interval propagation for the total-permutation case: when the
    // number of expressions equals the size of the union of their domains,
    // every value in the union is taken by exactly one expression, so any
    // contiguous value range fully saturated by a subset of expressions
    // belongs exclusively to that subset and must be excluded from every
    // other expression. Bounded to a modest number of candidate breakpoints
    // since this is a strengthening pass, not required for soundness.
    let doms: Vec<Domain> = exprs.iter().map(|e| domain_of(ctx, e)).collect();
    let mut union = Domain::empty();
    for d in &doms {
        union = union.union(d);
    }
    if !union.is_empty() && exprs.len() as i64 == union.size() {
        let mut breakpoints: Vec<i64> = Vec::new();
        for d in &doms {
            for iv in d.intervals() {
                breakpoints.push(iv.lo);
                breakpoints.push(iv.hi);
            }
        }
        breakpoints.sort();
        breakpoints.dedup();
        if breakpoints.len() <= 200 {
            for (bi, &lo) in breakpoints.iter().enumerate() {
                for &hi in &breakpoints[bi..] {
                    if hi < lo {
                        continue;
                    }
                    let width = hi - lo + 1;
                    let subset: Vec<usize> = (0..doms.len())
                        .filter(|&i| doms[i].min().map(|m| m >= lo).unwrap_or(false) && doms[i].max().map(|m| m <= hi).unwrap_or(false))
                        .collect();
                    if subset.len() as i64 > width {
                        mark_false(ctx, ci, "all_different violates Hall's theorem over a saturated value range");
                        return Ok(());
                    }
                    if subset.len() as i64 == width && width > 0 {
                        let hall_range = Domain::range(lo, hi);
                        for j in 0..exprs.len() {
                            if subset.contains(&j) {
                                continue;
                            }
                            let forbidden = hall_range.complement();
                            ctx.intersect_domain(exprs[j].var, &inverse_domain(&exprs[j], &forbidden))?;
                            if ctx.is_infeasible() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::AllDifferent(AllDifferent { exprs }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::constraint::Constraint;
    use crate::model::var::Variable;
    use crate::model::Model;

    fn affine(var: crate::model::VarIndex) -> AffineExpr {
        AffineExpr { var, coeff: 1, offset: 0 }
    }

    #[test]
    fn fixed_value_excluded_from_others() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::fixed(3)));
        let b = model.new_variable(Variable::new(Domain::range(0, 5)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AllDifferent(AllDifferent {
            exprs: vec![affine(a), affine(b)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert!(!ctx.model.var(b).domain.contains(3));
    }

    #[test]
    fn duplicate_expression_is_infeasible() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 5)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AllDifferent(AllDifferent {
            exprs: vec![affine(a), affine(a)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert!(ctx.is_infeasible());
    }

    #[test]
    fn hall_interval_forces_exclusive_range() {
        // Two domains both subsets of {0,1}: those two values belong
        // exclusively to these two expressions; a third expression with a
        // wider domain must have {0,1} excluded.
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let c = model.new_variable(Variable::new(Domain::range(0, 2)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AllDifferent(AllDifferent {
            exprs: vec![affine(a), affine(b), affine(c)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(c).domain, Domain::fixed(2));
    }
}
