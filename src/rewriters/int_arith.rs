/*!
Integer arithmetic rewriters: `int_prod`, `int_div`, `int_mod` (spec.md
§4.3.3). All three are small relative to linear: propagate the target's
domain from the factors (or numerator/denominator, or numerator/modulus) and
vice versa, and specialize away degenerate shapes (constant factors, `x/1`,
`x/x`, both operands fixed).
*/

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{AffineExpr, ConstraintKind, IntDiv, IntMod, IntProd};
use crate::model::linear::LinearExpr;
use crate::model::ConstraintIndex;

use super::remove_constraint;

fn domain_of(ctx: &PresolveContext, e: &AffineExpr) -> Domain {
    ctx.model
        .var(e.var)
        .domain
        .mul_by(e.coeff)
        .add(&Domain::fixed(e.offset))
}

/// The domain a single affine expression must take for `e.value_at(x) = v`
/// to have a solution `x` in `e`'s underlying variable's domain; used to
/// propagate a target-side requirement back onto `e`'s own variable.
fn inverse_domain(e: &AffineExpr, required: &Domain) -> Domain {
    if e.coeff == 0 {
        return if required.contains(e.offset) {
            Domain::full()
        } else {
            Domain::empty()
        };
    }
    required.add(&Domain::fixed(-e.offset)).inverse_mul(e.coeff)
}

fn propagate_affine(ctx: &mut PresolveContext, e: &AffineExpr, required: &Domain) -> Result<(), PresolveError> {
    let bound = inverse_domain(e, required);
    ctx.intersect_domain(e.var, &bound)?;
    Ok(())
}

pub fn presolve_int_prod(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::IntProd(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    if !ctx.model.constraint(ci).enforcement.is_empty() {
        // Every path below either tightens a variable's domain or removes
        // the constraint outright, both of which assume the body must
        // hold; a reified int_prod need not, so leave it untouched.
        return Ok(());
    }

    // Fold constant factors (fixed-domain) into a single running scalar,
    // keeping only the non-constant factors.
    let mut scalar: i64 = 1;
    let mut offset_product_ok = true;
    let mut factors = Vec::with_capacity(body.factors.len());
    for f in &body.factors {
        match domain_of(ctx, f).is_fixed() {
            Some(v) => {
                scalar = scalar.saturating_mul(v);
                if scalar == i64::MIN || scalar == i64::MAX {
                    offset_product_ok = false;
                }
            }
            None => factors.push(*f),
        }
    }

    if factors.is_empty() {
        // Every factor is fixed: the whole constraint reduces to
        // `target == scalar`.
        if offset_product_ok {
            propagate_affine(ctx, &body.target, &Domain::fixed(scalar))?;
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("int_prod_all_constant");
        return Ok(());
    }

    if factors.len() == 1 && scalar == 1 {
        // target = factor: linearize directly.
        let f = factors[0];
        if f.var == body.target.var && f.coeff == body.target.coeff && f.offset == body.target.offset {
            remove_constraint(ctx, ci);
            return Ok(());
        }
        let expr = LinearExpr {
            vars: vec![body.target.var, f.var],
            coeffs: vec![body.target.coeff, -f.coeff],
            offset: body.target.offset - f.offset,
        }
        .canonicalize();
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
            expr,
            rhs: Domain::fixed(0),
        }));
        ctx.rule_stats.increment("int_prod_linearized_single_factor");
        return Ok(());
    }

    // Squaring: `x * x = target`. Propagate target from the (sound,
    // over-approximating) continuous square of x's domain.
    if factors.len() == 2 && scalar == 1 && factors[0] == factors[1] {
        let x_dom = domain_of(ctx, &factors[0]);
        let square = x_dom.continuous_mul(&x_dom).intersect(&Domain::range(0, i64::MAX));
        propagate_affine(ctx, &body.target, &square)?;
        ctx.rule_stats.increment("int_prod_square_propagated");
        return Ok(());
    }

    // All-Boolean detection: int_prod over {0,1} variables is an AND.
    let target_boolean = ctx.model.var(body.target.var).is_boolean() && body.target.coeff == 1 && body.target.offset == 0;
    let all_factors_boolean = factors.iter().all(|f| {
        ctx.model.var(f.var).is_boolean() && f.coeff == 1 && f.offset == 0
    });
    if target_boolean && all_factors_boolean && scalar == 1 {
        let target_lit = crate::model::Literal::positive(body.target.var);
        let factor_lits: Vec<crate::model::Literal> = factors.iter().map(|f| crate::model::Literal::positive(f.var)).collect();
        // target <-> AND(factors): encode as bool_and enforced by target,
        // plus bool_or(factor_negations + target) to force target false
        // when any factor is false.
        let mut or_lits = vec![target_lit];
        or_lits.extend(factor_lits.iter().map(|l| -*l));
        let or_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(ConstraintKind::BoolOr(
            crate::model::constraint::BoolOr { literals: or_lits },
        )));
        ctx.track_new_constraint(or_ci);
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::BoolAnd(crate::model::constraint::BoolAnd {
            literals: factor_lits,
        }));
        ctx.model.constraint_mut(ci).enforcement.push(target_lit);
        ctx.rule_stats.increment("int_prod_boolean_to_bool_and");
        return Ok(());
    }

    // Propagate target from the continuous product of remaining factors,
    // folding in the scalar.
    let mut product = Domain::fixed(scalar);
    for f in &factors {
        product = product.continuous_mul(&domain_of(ctx, f));
    }
    propagate_affine(ctx, &body.target, &product)?;
    if ctx.is_infeasible() {
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::IntProd(IntProd {
        target: body.target,
        factors,
    }));
    Ok(())
}

pub fn presolve_int_div(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::IntDiv(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    if !ctx.model.constraint(ci).enforcement.is_empty() {
        return Ok(());
    }

    let denom_domain = domain_of(ctx, &body.denominator);
    if denom_domain.contains(0) && denom_domain.size() == 1 {
        ctx.mark_infeasible("int_div by a denominator fixed to 0");
        return Ok(());
    }

    // target = numerator / 1 is just an equality.
    if let Some(1) = denom_domain.is_fixed() {
        let expr = LinearExpr {
            vars: vec![body.target.var, body.numerator.var],
            coeffs: vec![body.target.coeff, -body.numerator.coeff],
            offset: body.target.offset - body.numerator.offset,
        }
        .canonicalize();
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
            expr,
            rhs: Domain::fixed(0),
        }));
        ctx.rule_stats.increment("int_div_by_one");
        return Ok(());
    }
    if let Some(-1) = denom_domain.is_fixed() {
        let expr = LinearExpr {
            vars: vec![body.target.var, body.numerator.var],
            coeffs: vec![body.target.coeff, body.numerator.coeff],
            offset: body.target.offset + body.numerator.offset,
        }
        .canonicalize();
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
            expr,
            rhs: Domain::fixed(0),
        }));
        ctx.rule_stats.increment("int_div_by_minus_one");
        return Ok(());
    }

    // x / x = 1 whenever numerator and target expressions denote the same
    // variable/affine-form and that variable's domain excludes 0.
    if body.numerator.var == body.denominator.var
        && body.numerator.coeff == body.denominator.coeff
        && body.numerator.offset == body.denominator.offset
        && !domain_of(ctx, &body.numerator).contains(0)
    {
        propagate_affine(ctx, &body.target, &Domain::fixed(1))?;
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("int_div_self");
        return Ok(());
    }

    // Constant divisor: linearize via bound propagation (target's domain
    // narrows to numerator_domain / k and vice versa), but keep the
    // constraint itself (exact integer division with rounding towards zero
    // cannot be captured as a linear equality in general).
    if let Some(k) = denom_domain.is_fixed() {
        let num_domain = domain_of(ctx, &body.numerator);
        let target_bound = num_domain.div_by(k);
        propagate_affine(ctx, &body.target, &target_bound)?;
        if ctx.is_infeasible() {
            return Ok(());
        }
        let target_domain = domain_of(ctx, &body.target);
        let numerator_bound = target_domain.mul_by(k).add(&Domain::range(-(k.unsigned_abs() as i64 - 1).max(0), (k.unsigned_abs() as i64 - 1).max(0)));
        propagate_affine(ctx, &body.numerator, &numerator_bound)?;
        ctx.rule_stats.increment("int_div_constant_divisor_propagated");
    }

    Ok(())
}

pub fn presolve_int_mod(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::IntMod(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    if !ctx.model.constraint(ci).enforcement.is_empty() {
        return Ok(());
    }

    let modulus_domain = domain_of(ctx, &body.modulus);
    if modulus_domain.contains(0) && modulus_domain.size() == 1 {
        ctx.mark_infeasible("int_mod by a modulus fixed to 0");
        return Ok(());
    }

    let numerator_domain = domain_of(ctx, &body.numerator);

    // Target-sign propagation: C-truncating modulo has the sign of the
    // numerator (when the numerator's sign is known).
    let target_sign_bound = if numerator_domain.min().map(|m| m >= 0).unwrap_or(false) {
        Domain::range(0, i64::MAX)
    } else if numerator_domain.max().map(|m| m < 0).unwrap_or(false) {
        Domain::range(i64::MIN, 0)
    } else {
        Domain::full()
    };
    let mod_superset = numerator_domain.mod_superset(&modulus_domain).intersect(&target_sign_bound);
    propagate_affine(ctx, &body.target, &mod_superset)?;
    if ctx.is_infeasible() {
        return Ok(());
    }

    // Both numerator and modulus fixed: the whole constraint reduces to an
    // affine equality fixing the target.
    if let (Some(n), Some(m)) = (numerator_domain.is_fixed(), modulus_domain.is_fixed()) {
        if m != 0 {
            let r = n % m;
            propagate_affine(ctx, &body.target, &Domain::fixed(r))?;
            remove_constraint(ctx, ci);
            ctx.rule_stats.increment("int_mod_both_constant");
        }
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::IntMod(IntMod {
        target: body.target,
        numerator: body.numerator,
        modulus: body.modulus,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::PresolveContext;
    use crate::model::constraint::Constraint;
    use crate::model::var::Variable;
    use crate::model::Model;

    fn affine(var: crate::model::VarIndex) -> AffineExpr {
        AffineExpr { var, coeff: 1, offset: 0 }
    }

    #[test]
    fn int_prod_constant_factors_fix_target() {
        let mut model = Model::default();
        let target = model.new_variable(Variable::new(Domain::range(0, 100)));
        let a = model.new_variable(Variable::new(Domain::fixed(3)));
        let b = model.new_variable(Variable::new(Domain::fixed(4)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::IntProd(IntProd {
            target: affine(target),
            factors: vec![affine(a), affine(b)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve_int_prod(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(target).domain, Domain::fixed(12));
    }

    #[test]
    fn int_div_by_one_linearizes() {
        let mut model = Model::default();
        let target = model.new_variable(Variable::new(Domain::range(0, 10)));
        let num = model.new_variable(Variable::new(Domain::range(0, 10)));
        let denom = model.new_variable(Variable::new(Domain::fixed(1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::IntDiv(IntDiv {
            target: affine(target),
            numerator: affine(num),
            denominator: affine(denom),
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve_int_div(&mut ctx, ConstraintIndex(0)).unwrap();
        assert!(matches!(
            ctx.model.constraint(ConstraintIndex(0)).kind,
            Some(ConstraintKind::Linear(_))
        ));
    }

    #[test]
    fn int_mod_both_fixed() {
        let mut model = Model::default();
        let target = model.new_variable(Variable::new(Domain::range(-10, 10)));
        let num = model.new_variable(Variable::new(Domain::fixed(7)));
        let modulus = model.new_variable(Variable::new(Domain::fixed(3)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::IntMod(IntMod {
            target: affine(target),
            numerator: affine(num),
            modulus: affine(modulus),
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve_int_mod(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(target).domain, Domain::fixed(1));
    }
}
