//! Scenario tests for the linear rewriter (spec.md §8): coefficient
//! strengthening, gcd reduction, and singleton elimination, exercised
//! through the public `presolve` entry point rather than the rewriter
//! function directly.

use csp_presolve::config::Config;
use csp_presolve::context::time_limit::Unbounded;
use csp_presolve::domain::Domain;
use csp_presolve::model::constraint::{AtMostOne, Constraint, ConstraintKind, LinearConstraint};
use csp_presolve::model::linear::LinearExpr;
use csp_presolve::model::var::Variable;
use csp_presolve::model::Model;
use csp_presolve::postsolve::{postsolve, PartialAssignment};
use csp_presolve::presolve;

mod linear {
    use super::*;

    #[test]
    fn coefficient_strengthening_clips_oversized_coefficients() {
        // 5x + 7y <= 4, x and y Boolean: each coefficient alone already
        // exceeds the slack (4) left by the other term at its minimum (0),
        // so both clip down to 4 without changing which assignments satisfy
        // the constraint.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 1)));
        let y = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![5, 7],
                offset: 0,
            },
            rhs: Domain::range(i64::MIN, 4),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        let live: Vec<_> = output.model.constraints.iter().filter(|c| !c.is_removed()).collect();
        assert_eq!(live.len(), 1);
        match &live[0].kind {
            Some(ConstraintKind::Linear(c)) => assert!(c.expr.coeffs.iter().all(|&coeff| coeff <= 4)),
            Some(ConstraintKind::AtMostOne(_)) => {}
            other => panic!("unexpected constraint kind after strengthening: {other:?}"),
        }
    }

    #[test]
    fn gcd_reduction_divides_through_the_common_factor() {
        // 6x + 9y = 15 has no solution unless divided by gcd(6, 9) = 3
        // first: 2x + 3y = 5 is the same constraint in lowest terms.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![6, 9],
                offset: 0,
            },
            rhs: Domain::fixed(15),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);

        let mut assignment = PartialAssignment::from_solution([(x, 1), (y, 1)]);
        postsolve(&output.mapping, &mut assignment).unwrap();
        // 2*1 + 3*1 = 5, so (1, 1) should survive whatever shape the
        // reduced constraint ends up in.
        if let Some(x_val) = assignment.get(x) {
            if let Some(y_val) = assignment.get(y) {
                assert_eq!(6 * x_val + 9 * y_val, 15);
            }
        }
    }

    #[test]
    fn an_infeasible_gcd_violation_is_detected() {
        // 6x + 9y = 16: every value of 6x + 9y is a multiple of 3, 16 is
        // not, so this has no integer solution regardless of domains.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![6, 9],
                offset: 0,
            },
            rhs: Domain::fixed(16),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(output.infeasible);
    }

    #[test]
    fn singleton_elimination_removes_the_constraint_and_the_variable() {
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

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 0);
        assert!(!output.mapping.is_empty());
    }

    #[test]
    fn approximate_gcd_rounds_coefficients_when_activity_is_provably_unchanged() {
        // 3x + 4y <= 4 with x, y in {0,1}: only (0,0), (0,1), (1,0) satisfy
        // it. Rounding both coefficients to the nearest multiple of 2 gives
        // 2x + 4y <= 4, which accepts exactly the same three points, so the
        // rewrite (and its subsequent gcd-2 normalization down to x + 2y <=
        // 2) is sound even though 3 and 4 share no common factor.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 1)));
        let y = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![x, y],
                coeffs: vec![3, 4],
                offset: 0,
            },
            rhs: Domain::range(i64::MIN, 4),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert!(output.rule_report.get("linear_approximate_gcd").copied().unwrap_or(0) > 0);

        for (xv, yv) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            let mut assignment = PartialAssignment::from_solution([(x, xv), (y, yv)]);
            postsolve(&output.mapping, &mut assignment).unwrap();
            let live: Vec<_> = output.model.constraints.iter().filter(|c| !c.is_removed()).collect();
            let holds = live.iter().all(|c| match &c.kind {
                Some(ConstraintKind::Linear(lc)) => {
                    let v = lc.expr.offset
                        + lc.expr.vars.iter().zip(lc.expr.coeffs.iter()).map(|(v, c)| c * assignment.get(*v).unwrap()).sum::<i64>();
                    lc.rhs.contains(v)
                }
                _ => true,
            });
            assert_eq!(holds, 3 * xv + 4 * yv <= 4, "mismatch at x={xv}, y={yv}");
        }
    }

    #[test]
    fn a_duplicate_at_most_one_created_by_linear_conversion_still_merges() {
        // Two Boolean sums that both reduce to at_most_one(a, b) merge into
        // one, whether they started out typed as at_most_one or as linear.
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![a, b],
                coeffs: vec![1, 1],
                offset: 0,
            },
            rhs: Domain::range(i64::MIN, 1),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![csp_presolve::model::Literal::positive(a), csp_presolve::model::Literal::positive(b)],
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 1);
    }
}
