/*!
Encoding extraction (spec.md §4.4.1, final paragraph): recognizes a linear
equality whose Boolean variables exactly cover a live `exactly_one`
constraint, and whose one remaining variable has coefficient `+-1`, as a
disjoint value-literal encoding of that variable — each Boolean *is* the
literal `x == v_i` for the value it selects, rather than a separate
reification [`PresolveContext::get_or_create_var_value_encoding`] would
otherwise synthesize on demand.

Materializing the encoding (via
[`PresolveContext::cache_value_encoding`]) lets every later rule that asks
for `x == v_i` reuse the existing Boolean, and the linear equality that
exposed the pattern becomes redundant once the `exactly_one` is left to
enforce it alone — so it is pushed to the mapping model and removed.
*/

use std::collections::HashSet;

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::{ConstraintIndex, Literal, VarIndex};

use crate::rewriters::remove_constraint;

/// A linear equality recognized as a candidate encoding: `target_var`'s
/// value is `values[i]` exactly when `bool_vars[i]` is the one Boolean set
/// to 1 among a disjoint family.
struct Candidate {
    ci: ConstraintIndex,
    target_var: VarIndex,
    bool_vars: Vec<VarIndex>,
    values: Vec<i64>,
}

/// Matches an unconditional linear equality `offset + sum(c_i*v_i) == k`
/// where every `v_i` but one is a live (unfixed) Boolean and the remaining
/// one, `target_var`, has coefficient `+-1`. Each Boolean's implied value
/// for `target_var`, were it the one set to 1, is `target_sign*(k - offset
/// - coeff_i)`; values that collide are rejected (not a genuine disjoint
/// encoding).
fn find_candidate(ctx: &PresolveContext, ci: ConstraintIndex) -> Option<Candidate> {
    let constraint = ctx.model.constraint(ci);
    if constraint.is_removed() || !constraint.enforcement.is_empty() {
        return None;
    }
    let Some(ConstraintKind::Linear(c)) = &constraint.kind else {
        return None;
    };
    let k = c.rhs.is_fixed()?;

    let mut target: Option<(VarIndex, i64)> = None;
    let mut bool_terms: Vec<(VarIndex, i64)> = Vec::new();
    for (&v, &coeff) in c.expr.vars.iter().zip(c.expr.coeffs.iter()) {
        if ctx.model.var(v).is_boolean() && ctx.model.var(v).domain.is_fixed().is_none() {
            bool_terms.push((v, coeff));
        } else if (coeff == 1 || coeff == -1) && target.is_none() {
            target = Some((v, coeff));
        } else {
            return None;
        }
    }
    let (target_var, target_sign) = target?;
    if bool_terms.len() < 2 {
        return None;
    }

    let mut values = Vec::with_capacity(bool_terms.len());
    let mut bool_vars = Vec::with_capacity(bool_terms.len());
    for &(v, coeff) in &bool_terms {
        values.push(target_sign * (k - c.expr.offset - coeff));
        bool_vars.push(v);
    }
    let mut seen = HashSet::new();
    if !values.iter().all(|v| seen.insert(*v)) {
        return None;
    }

    Some(Candidate {
        ci,
        target_var,
        bool_vars,
        values,
    })
}

/// A live, unconditional `exactly_one` whose literal set is exactly
/// `bool_vars` taken positively — the disjoint-selection constraint the
/// candidate's Booleans actually belong to.
fn matching_exactly_one(ctx: &PresolveContext, bool_vars: &[VarIndex]) -> Option<ConstraintIndex> {
    let wanted: HashSet<VarIndex> = bool_vars.iter().copied().collect();
    let mut checked = HashSet::new();
    for &v in bool_vars {
        for &ci in ctx.constraints_touching(v) {
            if !checked.insert(ci) {
                continue;
            }
            let constraint = ctx.model.constraint(ci);
            if constraint.is_removed() || !constraint.enforcement.is_empty() {
                continue;
            }
            let Some(ConstraintKind::ExactlyOne(eo)) = &constraint.kind else {
                continue;
            };
            if eo.literals.len() != wanted.len() {
                continue;
            }
            if eo.literals.iter().all(|l| l.polarity() && wanted.contains(&l.atom())) {
                return Some(ci);
            }
        }
    }
    None
}

pub fn run(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let candidates: Vec<Candidate> = (0..ctx.model.constraints.len())
        .filter_map(|idx| find_candidate(ctx, ConstraintIndex(idx as u32)))
        .collect();

    for candidate in candidates {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        budget.spend(candidate.bool_vars.len() as u64);
        if ctx.model.constraint(candidate.ci).is_removed() {
            continue;
        }
        if matching_exactly_one(ctx, &candidate.bool_vars).is_none() {
            continue;
        }

        // Every value target_var can take is one of `values`: the
        // exactly_one guarantees exactly one Boolean is set, so any other
        // value the domain still allows is unreachable and can be dropped.
        let mut reachable = Domain::empty();
        for &v in &candidate.values {
            reachable = reachable.union(&Domain::fixed(v));
        }
        ctx.intersect_domain(candidate.target_var, &reachable)?;
        if ctx.is_infeasible() {
            continue;
        }

        let original = ctx.model.constraint(candidate.ci).clone();
        let domain_now = ctx.model.var(candidate.target_var).domain.clone();
        for (i, &b) in candidate.bool_vars.iter().enumerate() {
            let value = candidate.values[i];
            if domain_now.contains(value) {
                ctx.cache_value_encoding(candidate.target_var, value, Literal::positive(b));
            }
        }
        ctx.new_mapping_constraint(original, "encoding_extraction");
        remove_constraint(ctx, candidate.ci);
        ctx.rule_stats.increment("encoding_extracted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::constraint::{Constraint, ExactlyOne, LinearConstraint};
    use crate::model::linear::LinearExpr;
    use crate::model::var::Variable;
    use crate::model::Model;

    #[test]
    fn recognizes_value_literal_encoding() {
        // x = 10*b0 + 20*b1 + 30*b2, exactly_one(b0,b1,b2): x is encoded as
        // selecting one of {10,20,30}.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 100)));
        let b0 = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b1 = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b2 = model.new_variable(Variable::new(Domain::range(0, 1)));

        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, b0, b1, b2],
                coeffs: vec![1, -10, -20, -30],
                offset: 0,
            },
            rhs: Domain::fixed(0),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::ExactlyOne(ExactlyOne {
            literals: vec![Literal::positive(b0), Literal::positive(b1), Literal::positive(b2)],
        })));

        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();

        assert!(ctx.model.constraint(ConstraintIndex(0)).is_removed());
        assert_eq!(ctx.model.var(x).domain, Domain::from_intervals(vec![
            crate::domain::Interval::singleton(10),
            crate::domain::Interval::singleton(20),
            crate::domain::Interval::singleton(30),
        ]));
        assert_eq!(ctx.cached_value_encoding(x, 10), Some(Literal::positive(b0)));
        assert_eq!(ctx.cached_value_encoding(x, 20), Some(Literal::positive(b1)));
        assert_eq!(ctx.cached_value_encoding(x, 30), Some(Literal::positive(b2)));
    }

    #[test]
    fn leaves_non_encoding_linear_alone() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![1, 1],
                offset: 0,
            },
            rhs: Domain::fixed(5),
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert!(!ctx.model.constraint(ConstraintIndex(0)).is_removed());
    }
}
