/*!
Cross-constraint affine substitution (spec.md §4.4.6): generalizes the
linear rewriter's size-2 affine-relation extraction
(`rewriters::linear::try_size_two_affine_extraction`) to a unit-coefficient
variable inside a larger equality, whose defining relation spans several
other variables rather than a single representative.

Such a variable can't be folded into the affine store (that store only
ever holds a two-variable `x = a*rep + b` map), so it is retired outright
via [`PresolveContext::try_eliminate_via_linear_definition`]: its
definition is substituted into every other linear body that still
mentions it, and it is dropped from the working model entirely.

Gated behind [`crate::config::Config::effective_substitution_level`] and a
conservative growth heuristic: a variable touching many other constraints
is left alone if eliminating it would add more terms across the model
than it removes, since the point of presolve is to shrink the model, not
trade one kind of size for another.
*/

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::domain::sat_arith::{sat_mul, sat_sub};
use crate::error::PresolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::linear::LinearExpr;
use crate::model::{ConstraintIndex, VarIndex};

/// Eliminating a variable touching `other_touching` constraints besides
/// its defining equality replaces one term with `definition_len` terms in
/// each of them; above this many net new terms, the substitution is
/// rejected as not worth the growth.
const MAX_SUBSTITUTION_GROWTH: usize = 8;

/// A unit-coefficient variable in a live, unconditional linear equality of
/// size >= 3, together with its solved-for definition in terms of the
/// remaining variables.
struct Candidate {
    ci: ConstraintIndex,
    var: VarIndex,
    definition: LinearExpr,
    other_touching: usize,
}

fn find_candidates(ctx: &PresolveContext, ci: ConstraintIndex) -> Vec<Candidate> {
    let mut out = Vec::new();
    let constraint = ctx.model.constraint(ci);
    if constraint.is_removed() || !constraint.enforcement.is_empty() {
        return out;
    }
    let Some(ConstraintKind::Linear(c)) = &constraint.kind else {
        return out;
    };
    if c.expr.len() < 3 {
        // Size <=2 is handled inline by the linear rewriter's own step 9.
        return out;
    }
    let Some(rhs_val) = c.rhs.is_fixed() else {
        return out;
    };

    for (pos, &var) in c.expr.vars.iter().enumerate() {
        let coeff = c.expr.coeffs[pos];
        if coeff.abs() != 1 {
            continue;
        }
        let other_touching = ctx.constraints_touching(var).iter().filter(|&&t| t != ci).count();
        let growth = other_touching * (c.expr.len() - 2);
        if growth > MAX_SUBSTITUTION_GROWTH {
            continue;
        }

        let mut rest = c.expr.clone();
        rest.vars.remove(pos);
        rest.coeffs.remove(pos);
        // coeff*var + rest.offset + sum(rest) = rhs_val
        // => var = coeff*(rhs_val - rest.offset) - coeff*rest
        let definition_offset = sat_mul(coeff, sat_sub(rhs_val, rest.offset));
        let definition = LinearExpr {
            vars: rest.vars,
            coeffs: rest.coeffs.iter().map(|c| sat_mul(-coeff, *c)).collect(),
            offset: definition_offset,
        };
        out.push(Candidate {
            ci,
            var,
            definition,
            other_touching,
        });
    }
    out
}

pub fn run(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    if ctx.config.effective_substitution_level() == 0 {
        return Ok(());
    }

    let candidates: Vec<Candidate> = (0..ctx.model.constraints.len())
        .flat_map(|idx| find_candidates(ctx, ConstraintIndex(idx as u32)))
        .collect();

    for candidate in candidates {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        budget.spend((candidate.other_touching + 1) as u64);
        if ctx.model.constraint(candidate.ci).is_removed() {
            continue;
        }
        if ctx.affine.is_reduced(candidate.var) || ctx.model.var(candidate.var).state != crate::model::VarState::Representative {
            continue;
        }
        let eliminated = ctx.try_eliminate_via_linear_definition(candidate.var, &candidate.definition, candidate.ci)?;
        if eliminated {
            ctx.rule_stats.increment("affine_substitution");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Domain;
    use crate::model::constraint::{Constraint, LinearConstraint};
    use crate::model::var::Variable;
    use crate::model::{ConstraintIndex, Model, VarState};

    #[test]
    fn eliminates_unit_coeff_var_touching_another_constraint() {
        // x = y + z + w (defining equality), plus x + y <= 20 elsewhere: x
        // has unit coefficient, touches a second linear constraint, and
        // should be substituted out of it and retired.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 100)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        let z = model.new_variable(Variable::new(Domain::range(0, 10)));
        let w = model.new_variable(Variable::new(Domain::range(0, 10)));

        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y, z, w],
                coeffs: vec![1, -1, -1, -1],
                offset: 0,
            },
            rhs: Domain::fixed(0),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![1, 1],
                offset: 0,
            },
            rhs: Domain::range(i64::MIN, 20),
        })));

        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();

        assert!(ctx.model.constraint(ConstraintIndex(0)).is_removed());
        assert_eq!(ctx.model.var(x).state, VarState::Removed);
        let Some(ConstraintKind::Linear(rewritten)) = &ctx.model.constraint(ConstraintIndex(1)).kind else {
            panic!("second constraint was removed");
        };
        assert!(!rewritten.expr.vars.contains(&x));
        assert!(rewritten.expr.vars.contains(&y));
        assert!(rewritten.expr.vars.contains(&z));
        assert!(rewritten.expr.vars.contains(&w));
    }

    #[test]
    fn disabled_by_substitution_level_zero() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 100)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        let z = model.new_variable(Variable::new(Domain::range(0, 10)));
        let w = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y, z, w],
                coeffs: vec![1, -1, -1, -1],
                offset: 0,
            },
            rhs: Domain::fixed(0),
        })));
        let mut config = Config::default();
        config.presolve_substitution_level.set(0);
        let mut ctx = PresolveContext::new(model, config, 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert!(!ctx.model.constraint(ConstraintIndex(0)).is_removed());
    }
}
