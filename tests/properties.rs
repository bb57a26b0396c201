//! Property-style checks for the invariants listed in spec.md §8: soundness,
//! idempotence, determinism, and infeasibility detection. These are
//! small-scale brute-force checks (enumerate a tiny domain rather than use a
//! property-testing crate, mirroring the scale of the teacher's own
//! hand-enumerated test fixtures) rather than a full `proptest` harness,
//! since the presolver has no `proptest`/`quickcheck` dependency to draw on.

use csp_presolve::config::Config;
use csp_presolve::context::time_limit::Unbounded;
use csp_presolve::domain::Domain;
use csp_presolve::model::constraint::{AtMostOne, Constraint, ConstraintKind, LinearConstraint};
use csp_presolve::model::linear::LinearExpr;
use csp_presolve::model::var::Variable;
use csp_presolve::model::{Literal, Model, VarState};
use csp_presolve::postsolve::{postsolve, PartialAssignment};
use csp_presolve::presolve;

fn linear_value(expr: &LinearExpr, values: &PartialAssignment) -> i64 {
    let mut sum = expr.offset;
    for (&v, &c) in expr.vars.iter().zip(expr.coeffs.iter()) {
        sum += c * values.get(v).expect("every variable should be assigned by this point");
    }
    sum
}

mod properties {
    use super::*;

    #[test]
    fn soundness_every_reduced_solution_lifts_to_a_feasible_original_solution() {
        // 2x + 3y <= 10, x,y in [0,5]: presolve may tighten bounds, strengthen
        // coefficients, or otherwise rewrite the constraint, but every
        // solution of whatever it produces must still lift (via postsolve)
        // to an (x, y) pair satisfying the *original* inequality.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 5)));
        let y = model.new_variable(Variable::new(Domain::range(0, 5)));
        let original = LinearExpr { vars: vec![x, y], coeffs: vec![2, 3], offset: 0 };
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: original.clone(),
            rhs: Domain::range(i64::MIN, 10),
        })));

        let output = presolve(model, Config::default(), 42, &Unbounded).unwrap();
        assert!(!output.infeasible);

        let live_vars: Vec<_> = [x, y]
            .into_iter()
            .filter(|&v| output.model.var(v).state == VarState::Representative)
            .collect();

        // Brute-force every assignment to the surviving variables within
        // their (possibly tightened) domains; every one must lift to a
        // solution of `2x + 3y <= 10`.
        let ranges: Vec<(i64, i64)> = live_vars
            .iter()
            .map(|&v| {
                let d = &output.model.var(v).domain;
                (d.min().unwrap(), d.max().unwrap())
            })
            .collect();

        let mut combos: Vec<Vec<i64>> = vec![vec![]];
        for &(lo, hi) in &ranges {
            let mut next = Vec::new();
            for combo in &combos {
                for val in lo..=hi {
                    let mut c = combo.clone();
                    c.push(val);
                    next.push(c);
                }
            }
            combos = next;
        }

        // Only combinations that satisfy whatever the reduced model's
        // surviving constraint actually became count as "a solution of the
        // reduced model" — the domain box alone is a superset of that (the
        // rewriter may have strengthened the constraint body rather than
        // the domains themselves).
        let active: Vec<_> = output.model.constraints.iter().filter(|c| !c.is_removed()).collect();
        let reduced_holds = |assignment: &PartialAssignment| -> bool {
            active.iter().all(|c| match &c.kind {
                Some(ConstraintKind::Linear(lc)) => lc.rhs.contains(linear_value(&lc.expr, assignment)),
                _ => true,
            })
        };

        let mut checked = 0;
        let mut reduced_solutions = 0;
        for combo in combos {
            let mut assignment = PartialAssignment::new();
            for (&v, &val) in live_vars.iter().zip(combo.iter()) {
                assignment.set(v, val);
            }
            if !reduced_holds(&assignment) {
                continue;
            }
            reduced_solutions += 1;
            postsolve(&output.mapping, &mut assignment).unwrap();
            assert!(linear_value(&original, &assignment) <= 10, "lifted assignment violates the original constraint");
            checked += 1;
        }
        assert!(checked > 0 && reduced_solutions > 0, "expected at least one reduced-model solution to brute-force");
    }

    #[test]
    fn idempotence_presolving_the_output_again_finds_nothing_new() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let c = model.new_variable(Variable::new(Domain::range(0, 1)));
        let lit = |v| Literal::positive(v);
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(b), lit(c)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(c)],
        })));

        let first = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!first.infeasible);
        assert!(first.rule_report.values().sum::<i64>() > 0);

        let second = presolve(first.model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!second.infeasible);
        assert_eq!(
            second.rule_report.values().sum::<i64>(),
            0,
            "re-presolving an already-fixed-point model should apply no further rules"
        );
    }

    #[test]
    fn determinism_same_seed_same_input_produces_identical_output() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, 1], offset: 0 },
            rhs: Domain::fixed(5),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![Literal::positive(a), Literal::positive(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![Literal::positive(b), Literal::positive(a)],
        })));

        let run1 = presolve(model.clone(), Config::default(), 99, &Unbounded).unwrap();
        let run2 = presolve(model, Config::default(), 99, &Unbounded).unwrap();

        assert_eq!(run1.infeasible, run2.infeasible);
        assert_eq!(run1.model.constraints, run2.model.constraints);
        assert_eq!(run1.rule_report, run2.rule_report);

        let entries1: Vec<_> = run1.mapping.entries().iter().map(|e| (e.constraint.clone(), e.reason)).collect();
        let entries2: Vec<_> = run2.mapping.entries().iter().map(|e| (e.constraint.clone(), e.reason)).collect();
        assert_eq!(entries1, entries2);

        for v in [x, y, a, b] {
            assert_eq!(run1.model.var(v).domain, run2.model.var(v).domain);
        }
    }

    #[test]
    fn infeasibility_is_detected_for_a_contradictory_fixed_equality() {
        // x = 0, y = 0 both fixed, constraint x + y = 1: impossible to satisfy.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::fixed(0)));
        let y = model.new_variable(Variable::new(Domain::fixed(0)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, 1], offset: 0 },
            rhs: Domain::fixed(1),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(output.infeasible);
    }

    #[test]
    fn reified_linear_bound_tightening_preserves_vacuous_solutions() {
        // enforcement=[b], body x <= 3, x in [0,10]. When b is false the
        // body need not hold, so x = 7 remains a legal assignment of the
        // original model; presolve must not shrink x's domain to [0,3] or
        // remove the constraint, either of which would discard that
        // solution (spec.md §8.1 soundness).
        let mut model = Model::default();
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::new(
            ConstraintKind::Linear(LinearConstraint {
                expr: LinearExpr { vars: vec![x], coeffs: vec![1], offset: 0 },
                rhs: Domain::range(i64::MIN, 3),
            }),
            vec![Literal::positive(b)],
        ));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(
            output.model.var(x).domain,
            Domain::range(0, 10),
            "a reified constraint must not tighten its body's variable unconditionally"
        );
    }

    #[test]
    fn reified_at_most_one_does_not_force_the_other_literal_false() {
        // enforcement=[b], at_most_one(l1, l2) with l1 already globally
        // true. b = false, l2 = true is a feasible original solution (the
        // at-most-one need not hold), so presolve must not force l2 false.
        let mut model = Model::default();
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let l1 = model.new_variable(Variable::new(Domain::fixed(1)));
        let l2 = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::new(
            ConstraintKind::AtMostOne(AtMostOne {
                literals: vec![Literal::positive(l1), Literal::positive(l2)],
            }),
            vec![Literal::positive(b)],
        ));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(
            output.model.var(l2).domain,
            Domain::range(0, 1),
            "a reified at_most_one must not force the other literal false when one literal is already true"
        );
    }
}
