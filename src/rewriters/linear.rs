/*!
The linear rewriter: the richest single-constraint rule (spec.md §4.3.1).
Runs a fixed pipeline each time the constraint is dequeued; every step is
a no-op when it finds nothing to do, so repeated visits converge instead
of oscillating.
*/

use crate::context::PresolveContext;
use crate::domain::sat_arith::{floor_div, sat_add, sat_mul, sat_sub};
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{ConstraintKind, LinearConstraint};
use crate::model::literal::Literal;
use crate::model::linear::LinearExpr;
use crate::model::ConstraintIndex;

use super::{bool_family, mark_false, remove_constraint};

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Linear(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    // Step 1: canonicalize, apply affine substitution to terms and to
    // enforcement literals.
    let expr = substitute_affine_terms(ctx, body.expr.canonicalize());
    let enforcement = substitute_affine_enforcement(ctx, ctx.model.constraint(ci).enforcement.clone());
    ctx.model.constraint_mut(ci).enforcement = enforcement;

    if expr.is_empty() {
        // Size 0: a pure constant. Either always true (remove) or the
        // enforcement must be false (mark_false handles both).
        if body.rhs.contains(expr.offset) {
            remove_constraint(ctx, ci);
        } else {
            mark_false(ctx, ci, "constant linear body outside rhs");
        }
        return Ok(());
    }

    // Step 2: normalize sign (leading coefficient positive) and gcd-reduce.
    let (expr, rhs) = normalize_sign_and_gcd(expr, body.rhs);

    write_back(ctx, ci, &expr, &rhs);
    if rhs.is_empty() {
        mark_false(ctx, ci, "linear rhs collapsed to empty after gcd reduction");
        return Ok(());
    }

    // Step 3: activity bounds; trivial / mark-false short circuits.
    let activity = expr.activity_bounds(|v| ctx.model.var(v).domain.clone());
    if activity.is_empty() {
        // Some variable's domain is already empty; the context-level
        // infeasibility flag will already be set by whoever emptied it.
        return Ok(());
    }
    if activity.intersect(&rhs) == activity {
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("linear_trivially_satisfied");
        return Ok(());
    }
    if activity.intersect(&rhs).is_empty() {
        mark_false(ctx, ci, "linear activity disjoint from rhs");
        return Ok(());
    }

    // Step 4: tighten rhs using the implied activity range.
    let rhs = rhs.simplify_using_implied(&activity);
    write_back(ctx, ci, &expr, &rhs);

    // Steps 5-7 shrink a variable's domain, eliminate a variable outright,
    // or fix one to zero — all sound only when this constraint's body must
    // actually hold. A reified body (`enforcement` non-empty) need not hold
    // when its enforcement is false, so a solution with the enforcement
    // false and a variable value this pipeline would otherwise forbid is
    // still a legal solution of the original model; skip straight to the
    // equivalence-preserving steps (8-10) for those.
    let unconditional = ctx.model.constraint(ci).enforcement.is_empty();

    // Step 5: per-variable bound tightening.
    if unconditional {
        if expr.len() == 1 {
            tighten_single_variable(ctx, &expr, &rhs)?;
            if !ctx.is_infeasible() {
                remove_constraint(ctx, ci);
                ctx.rule_stats.increment("linear_size_one_absorbed");
            }
            return Ok(());
        }
        tighten_bounds_per_term(ctx, &expr, &rhs)?;
        if ctx.is_infeasible() {
            return Ok(());
        }
    }

    // Step 6: singleton elimination.
    if unconditional {
        if let Some(()) = try_singleton_elimination(ctx, ci, &expr, &rhs) {
            return Ok(());
        }
    }

    // Step 7: coefficient strengthening on upper-bounded Boolean sums.
    let expr = if unconditional {
        let strengthened = strengthen_coefficients(ctx, &expr, &rhs)?;
        write_back(ctx, ci, &strengthened, &rhs);
        strengthened
    } else {
        expr
    };

    // Step 8: approximate-gcd reduction.
    let (expr, rhs) = if let Some((new_expr, new_rhs)) = approximate_gcd_reduction(ctx, &expr, &rhs) {
        ctx.rule_stats.increment("linear_approximate_gcd");
        write_back(ctx, ci, &new_expr, &new_rhs);
        if new_rhs.is_empty() {
            mark_false(ctx, ci, "linear rhs collapsed to empty after approximate-gcd reduction");
            return Ok(());
        }
        (new_expr, new_rhs)
    } else {
        (expr, rhs)
    };

    // Step 9: size-2 equality affine-relation extraction. Singleton
    // elimination (step 6) already handles a unit-coefficient variable that
    // touches nothing else; this picks up the remaining size-2 equality
    // case, where the unit-coefficient variable also appears in other
    // linear constraints, by substituting it out of them first.
    if ctx.config.effective_substitution_level() > 0 && try_size_two_affine_extraction(ctx, ci, &expr, &rhs)? {
        return Ok(());
    }

    // Step 10: Boolean-only detection.
    if all_boolean_unit_coeffs(ctx, &expr) {
        if let Some(new_kind) = boolean_only_conversion(&expr, &rhs) {
            ctx.model.constraint_mut(ci).kind = Some(new_kind.clone());
            dispatch_boolean_reconversion(ctx, ci, &new_kind)?;
        }
    }

    Ok(())
}

fn write_back(ctx: &mut PresolveContext, ci: ConstraintIndex, expr: &LinearExpr, rhs: &Domain) {
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(LinearConstraint {
        expr: expr.clone(),
        rhs: rhs.clone(),
    }));
}

fn substitute_affine_terms(ctx: &PresolveContext, mut expr: LinearExpr) -> LinearExpr {
    loop {
        let reduced = expr.vars.iter().position(|v| ctx.affine.is_reduced(*v));
        let Some(pos) = reduced else { break };
        let var = expr.vars[pos];
        let (rep, a, b) = ctx.affine.resolve(var);
        expr = expr.substitute(var, a, b, rep);
    }
    expr
}

fn substitute_affine_enforcement(ctx: &PresolveContext, enforcement: Vec<Literal>) -> Vec<Literal> {
    enforcement
        .into_iter()
        .map(|lit| {
            if !ctx.affine.is_reduced(lit.atom()) {
                return lit;
            }
            let (rep, a, b) = ctx.affine.resolve(lit.atom());
            // Booleans only ever affine-reduce via `store_boolean_equality`,
            // which always uses a = 1 or -1 and b = 0 or 1.
            if a == 1 && b == 0 {
                Literal::of(rep, lit.polarity())
            } else {
                Literal::of(rep, !lit.polarity())
            }
        })
        .collect()
}

/// Maps `rhs` through division by `g`, keeping only values congruent to
/// `offset` modulo `g` (the only values a term of coefficient-multiple-of-`g`
/// plus `offset` can ever take). Each interval's congruent subset is itself
/// a contiguous range once divided by `g`, since consecutive congruent
/// values differ by exactly `g`.
fn divide_rhs_by_gcd(rhs: &Domain, offset: i64, g: i64) -> Domain {
    let mut out = Vec::new();
    for iv in rhs.intervals() {
        let rem = |v: i64| -> i64 {
            let r = (v - offset) % g;
            if r < 0 {
                r + g.abs()
            } else {
                r
            }
        };
        let lo_adjust = rem(iv.lo);
        let v0 = if lo_adjust == 0 { iv.lo } else { sat_add(iv.lo, g.abs() - lo_adjust) };
        if v0 > iv.hi {
            continue;
        }
        let span = sat_sub(iv.hi, v0);
        let steps = span / g.abs();
        let v1 = sat_add(v0, steps * g.abs());
        out.push(crate::domain::Interval::new((v0 - offset) / g, (v1 - offset) / g));
    }
    Domain::from_intervals(out)
}

fn normalize_sign_and_gcd(mut expr: LinearExpr, mut rhs: Domain) -> (LinearExpr, Domain) {
    if let Some(&first) = expr.coeffs.first() {
        if first < 0 {
            expr = expr.negate();
            rhs = rhs.negate();
        }
    }
    let g = expr.coeff_gcd();
    if g > 1 {
        rhs = divide_rhs_by_gcd(&rhs, expr.offset, g);
        expr = LinearExpr {
            vars: expr.vars.clone(),
            coeffs: expr.coeffs.iter().map(|c| c / g).collect(),
            offset: 0,
        };
    }
    (expr, rhs)
}

/// Step 8: tries rounding every coefficient to the nearest multiple of some
/// `d >= 2`, accepting the rewrite only when brute-force enumeration over
/// every variable's current domain proves the rounded expression's
/// rhs-membership agrees with the original at every reachable point. Bails
/// out (no floating point involved, per the rounding happening on integer
/// coefficients) whenever the enumeration space is too large to check
/// exhaustively, or when no variable has a domain small enough to bound it.
fn approximate_gcd_reduction(ctx: &PresolveContext, expr: &LinearExpr, rhs: &Domain) -> Option<(LinearExpr, Domain)> {
    if expr.len() < 2 {
        return None;
    }
    let domains: Vec<Domain> = expr.vars.iter().map(|&v| ctx.model.var(v).domain.clone()).collect();
    let mut space: i64 = 1;
    for d in &domains {
        space = sat_mul(space, d.size().max(1));
        if space > 4096 {
            return None;
        }
    }
    let min_abs_coeff = expr.coeffs.iter().map(|c| c.abs()).min().unwrap_or(1);
    if min_abs_coeff < 2 {
        return None;
    }
    let values: Vec<Vec<i64>> = domains.iter().map(enumerate_domain_values).collect();

    for d in 2..=min_abs_coeff {
        let rounded: Vec<i64> = expr.coeffs.iter().map(|&c| round_to_nearest_multiple(c, d)).collect();
        if rounded == expr.coeffs || rounded.iter().any(|&c| c == 0) {
            continue;
        }
        let candidate = LinearExpr { vars: expr.vars.clone(), coeffs: rounded, offset: expr.offset };
        if activity_equivalent(expr, &candidate, &values, rhs) {
            return Some(normalize_sign_and_gcd(candidate, rhs.clone()));
        }
    }
    None
}

fn enumerate_domain_values(d: &Domain) -> Vec<i64> {
    let mut out = Vec::new();
    for iv in d.intervals() {
        for v in iv.lo..=iv.hi {
            out.push(v);
        }
    }
    out
}

fn round_to_nearest_multiple(c: i64, d: i64) -> i64 {
    let q = floor_div(c, d);
    let lo = sat_mul(q, d);
    let hi = sat_add(lo, d);
    if sat_sub(c, lo).abs() <= sat_sub(hi, c).abs() {
        lo
    } else {
        hi
    }
}

fn activity_equivalent(expr: &LinearExpr, candidate: &LinearExpr, values: &[Vec<i64>], rhs: &Domain) -> bool {
    fn recurse(idx: usize, values: &[Vec<i64>], combo: &mut Vec<i64>, expr: &LinearExpr, candidate: &LinearExpr, rhs: &Domain) -> bool {
        if idx == values.len() {
            let old_activity = expr.coeffs.iter().zip(combo.iter()).fold(expr.offset, |acc, (c, v)| sat_add(acc, sat_mul(*c, *v)));
            let new_activity = candidate.coeffs.iter().zip(combo.iter()).fold(candidate.offset, |acc, (c, v)| sat_add(acc, sat_mul(*c, *v)));
            return rhs.contains(old_activity) == rhs.contains(new_activity);
        }
        for &v in &values[idx] {
            combo.push(v);
            let ok = recurse(idx + 1, values, combo, expr, candidate, rhs);
            combo.pop();
            if !ok {
                return false;
            }
        }
        true
    }
    let mut combo = Vec::with_capacity(values.len());
    recurse(0, values, &mut combo, expr, candidate, rhs)
}

fn tighten_single_variable(ctx: &mut PresolveContext, expr: &LinearExpr, rhs: &Domain) -> Result<(), PresolveError> {
    let var = expr.vars[0];
    let coeff = expr.coeffs[0];
    let shifted = rhs.add(&Domain::fixed(-expr.offset));
    let bound = shifted.inverse_mul(coeff);
    ctx.intersect_domain(var, &bound)?;
    Ok(())
}

fn tighten_bounds_per_term(ctx: &mut PresolveContext, expr: &LinearExpr, rhs: &Domain) -> Result<(), PresolveError> {
    for (i, &var) in expr.vars.iter().enumerate() {
        let coeff = expr.coeffs[i];
        let rest = expr.activity_without(var, |v| ctx.model.var(v).domain.clone());
        let (Some(rest_lo), Some(rest_hi)) = (rest.min(), rest.max()) else {
            continue;
        };
        let (Some(rhs_lo), Some(rhs_hi)) = (rhs.min(), rhs.max()) else {
            continue;
        };
        let cx_lo = sat_sub(rhs_lo, rest_hi);
        let cx_hi = sat_sub(rhs_hi, rest_lo);
        let cx_bound = Domain::range(cx_lo, cx_hi);
        let x_bound = cx_bound.inverse_mul(coeff);
        ctx.intersect_domain(var, &x_bound)?;
        if ctx.is_infeasible() {
            return Ok(());
        }
    }
    Ok(())
}

/// Step 6: a variable touching only this constraint and (optionally) the
/// objective, with unit coefficient and a fixed rhs, can be dropped from
/// the working model entirely: its value is an affine function of the
/// remaining terms, recorded in the mapping model.
fn try_singleton_elimination(ctx: &mut PresolveContext, ci: ConstraintIndex, expr: &LinearExpr, rhs: &Domain) -> Option<()> {
    let Some(rhs_val) = rhs.is_fixed() else {
        return None;
    };
    for (pos, &var) in expr.vars.iter().enumerate() {
        let coeff = expr.coeffs[pos];
        if coeff.abs() != 1 {
            continue;
        }
        if ctx.degree(var) != 1 {
            continue;
        }
        let mut rest = expr.clone();
        rest.vars.remove(pos);
        rest.coeffs.remove(pos);
        // coeff*var + rest.offset + sum(rest) = rhs_val
        // => var = coeff * (rhs_val - rest.offset - sum(rest terms))
        let definition_offset = sat_mul(coeff, sat_sub(rhs_val, rest.offset));
        let definition = LinearExpr {
            vars: rest.vars.clone(),
            coeffs: rest.coeffs.iter().map(|c| sat_mul(-coeff, *c)).collect(),
            offset: definition_offset,
        };

        ctx.substitute_variable_in_objective_via_definition(var, &definition);

        let original = crate::model::constraint::Constraint::new(
            ConstraintKind::Linear(LinearConstraint {
                expr: expr.clone(),
                rhs: rhs.clone(),
            }),
            ctx.model.constraint(ci).enforcement.clone(),
        );
        ctx.new_mapping_constraint(original, "linear_singleton_elimination");
        ctx.model.var_mut(var).state = crate::model::VarState::Removed;
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("linear_singleton_elimination");
        return Some(());
    }
    None
}

/// Step 9: `coeff*var + rep_coeff*rep + offset == rhs_val` with `coeff ==
/// +-1` solves directly for `var = a*rep + b`. Delegates eligibility
/// (whether `var` shows up anywhere substitution can't reach) and the
/// actual elimination to [`PresolveContext::try_eliminate_via_affine_relation`].
fn try_size_two_affine_extraction(ctx: &mut PresolveContext, ci: ConstraintIndex, expr: &LinearExpr, rhs: &Domain) -> Result<bool, PresolveError> {
    if expr.len() != 2 {
        return Ok(false);
    }
    let Some(rhs_val) = rhs.is_fixed() else {
        return Ok(false);
    };
    let Some(idx) = expr.coeffs.iter().position(|&c| c.abs() == 1) else {
        return Ok(false);
    };
    let other_idx = 1 - idx;
    let (var, coeff) = (expr.vars[idx], expr.coeffs[idx]);
    let (rep, rep_coeff) = (expr.vars[other_idx], expr.coeffs[other_idx]);

    // var = coeff*(rhs_val - offset) - coeff*rep_coeff*rep
    let a = sat_mul(-coeff, rep_coeff);
    let b = sat_mul(coeff, sat_sub(rhs_val, expr.offset));
    let eliminated = ctx.try_eliminate_via_affine_relation(var, a, b, rep, ci)?;
    if eliminated {
        ctx.rule_stats.increment("linear_size_two_affine_extraction");
    }
    Ok(eliminated)
}

/// For an upper-bounded sum of Boolean terms (`rhs` has the shape
/// `(-inf, R]`), clips any coefficient larger than the slack left by the
/// other terms' minimum activity down to that slack — the clipped
/// constraint accepts exactly the same 0/1 assignments.
fn strengthen_coefficients(ctx: &mut PresolveContext, expr: &LinearExpr, rhs: &Domain) -> Result<LinearExpr, PresolveError> {
    let Some(r) = rhs.max() else { return Ok(expr.clone()) };
    if rhs.min() != Some(i64::MIN) {
        return Ok(expr.clone());
    }
    let mut vars = expr.vars.clone();
    let mut coeffs = expr.coeffs.clone();
    for i in 0..vars.len() {
        let var = vars[i];
        let coeff = coeffs[i];
        if coeff <= 0 || !ctx.model.var(var).is_boolean() {
            continue;
        }
        let rest = LinearExpr {
            vars: vars.clone(),
            coeffs: coeffs.clone(),
            offset: expr.offset,
        }
        .activity_without(var, |v| ctx.model.var(v).domain.clone());
        let Some(min_without) = rest.min() else { continue };
        let slack = sat_sub(r, min_without);
        if slack < 0 {
            ctx.fix_value(var, 0)?;
            continue;
        }
        if slack < coeff {
            coeffs[i] = slack.max(0);
        }
    }
    Ok(LinearExpr { vars, coeffs, offset: expr.offset }.canonicalize())
}

fn all_boolean_unit_coeffs(ctx: &PresolveContext, expr: &LinearExpr) -> bool {
    expr.coeffs.iter().all(|&c| c == 1) && expr.vars.iter().all(|&v| ctx.model.var(v).is_boolean())
}

fn boolean_only_conversion(expr: &LinearExpr, rhs: &Domain) -> Option<ConstraintKind> {
    let n = expr.vars.len() as i64;
    let shifted = rhs.add(&Domain::fixed(-expr.offset));
    let lo = shifted.min()?;
    let hi = shifted.max()?;
    let literals: Vec<Literal> = expr.vars.iter().map(|&v| Literal::positive(v)).collect();

    if lo >= 1 && hi >= n {
        return Some(ConstraintKind::BoolOr(crate::model::constraint::BoolOr { literals }));
    }
    if lo <= 0 && hi <= 1 {
        return Some(ConstraintKind::AtMostOne(crate::model::constraint::AtMostOne { literals }));
    }
    if lo == 1 && hi == 1 {
        return Some(ConstraintKind::ExactlyOne(crate::model::constraint::ExactlyOne { literals }));
    }
    if lo == n && hi == n {
        return Some(ConstraintKind::BoolAnd(crate::model::constraint::BoolAnd { literals }));
    }
    None
}

fn dispatch_boolean_reconversion(ctx: &mut PresolveContext, ci: ConstraintIndex, kind: &ConstraintKind) -> Result<(), PresolveError> {
    match kind {
        ConstraintKind::BoolOr(_) => bool_family::presolve_bool_or(ctx, ci),
        ConstraintKind::BoolAnd(_) => bool_family::presolve_bool_and(ctx, ci),
        ConstraintKind::AtMostOne(_) => bool_family::presolve_at_most_one(ctx, ci),
        ConstraintKind::ExactlyOne(_) => bool_family::presolve_exactly_one(ctx, ci),
        _ => Ok(()),
    }
}
