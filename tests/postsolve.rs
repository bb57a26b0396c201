//! End-to-end postsolve round-trips (spec.md §8 testable property 1,
//! "soundness"): presolve a model, pick a solution of the reduced model,
//! replay the mapping model in reverse, and check the lifted assignment
//! satisfies the *original* constraint.
//!
//! `postsolve.rs`'s own `#[cfg(test)]` module checks the mapping-replay
//! mechanics directly against hand-built mapping models; these tests drive
//! the same machinery through the public `presolve` entry point instead, so
//! the whole chain (rewriter -> mapping push -> postsolve) is exercised
//! together for more than one rule.

use csp_presolve::config::Config;
use csp_presolve::context::time_limit::Unbounded;
use csp_presolve::domain::Domain;
use csp_presolve::model::constraint::{AffineExpr, Constraint, ConstraintKind, Element, LinearConstraint};
use csp_presolve::model::linear::LinearExpr;
use csp_presolve::model::var::Variable;
use csp_presolve::model::Model;
use csp_presolve::postsolve::{postsolve, PartialAssignment};
use csp_presolve::presolve;

mod postsolve_round_trips {
    use super::*;

    #[test]
    fn chained_singleton_eliminations_reconstruct_every_removed_variable() {
        // x + y = 5 (y singleton, minimize y), then y + z = 5 (z singleton,
        // minimize z): two independent eliminations feeding the same
        // mapping model. Only x should survive into the reduced model.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        let z = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, 1], offset: 0 },
            rhs: Domain::fixed(5),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![y, z], coeffs: vec![1, 1], offset: 0 },
            rhs: Domain::fixed(5),
        })));
        model.objective = Some(csp_presolve::model::Objective::minimize(LinearExpr::single(z, 1, 0)));

        let output = presolve(model, Config::default(), 3, &Unbounded).unwrap();
        assert!(!output.infeasible);

        // Seed the assignment with a value for every variable still live
        // in the reduced model (whichever of x/y/z that turns out to be),
        // then let postsolve fill in the rest.
        let mut assignment = PartialAssignment::new();
        for v in [x, y, z] {
            if output.model.var(v).state == csp_presolve::model::VarState::Representative {
                let val = output.model.var(v).domain.min().unwrap();
                assignment.set(v, val);
            }
        }
        postsolve(&output.mapping, &mut assignment).unwrap();

        let x_val = assignment.get(x).expect("x should have a value after postsolve");
        let y_val = assignment.get(y).expect("y should have a value after postsolve");
        let z_val = assignment.get(z).expect("z should have a value after postsolve");
        assert_eq!(x_val + y_val, 5);
        assert_eq!(y_val + z_val, 5);
    }

    #[test]
    fn element_with_all_entries_equal_reconstructs_any_in_range_index() {
        let mut model = Model::default();
        let index = model.new_variable(Variable::new(Domain::range(0, 2)));
        let target = model.new_variable(Variable::new(Domain::range(0, 10)));
        let a = model.new_variable(Variable::new(Domain::fixed(4)));
        let b = model.new_variable(Variable::new(Domain::fixed(4)));
        let c = model.new_variable(Variable::new(Domain::fixed(4)));
        let affine = |v| AffineExpr { var: v, coeff: 1, offset: 0 };
        model.add_constraint(Constraint::unconditional(ConstraintKind::Element(Element {
            index: affine(index),
            target: affine(target),
            entries: vec![affine(a), affine(b), affine(c)],
        })));

        let output = presolve(model, Config::default(), 5, &Unbounded).unwrap();
        assert!(!output.infeasible);

        let target_val = output.model.var(target).domain.min().unwrap();
        assert_eq!(target_val, 4);
        let mut assignment = PartialAssignment::from_solution([(target, target_val)]);
        postsolve(&output.mapping, &mut assignment).unwrap();

        let index_val = assignment.get(index).expect("index should be reconstructed by postsolve");
        assert!((0..3).contains(&index_val));
    }

    #[test]
    fn gcd_reduction_then_singleton_elimination_round_trips_to_the_original() {
        // 4x + 2y = 6 gcd-reduces to 2x + y = 3; y then has unit
        // coefficient and appears nowhere else, so it's eliminated as a
        // singleton and pushed to mapping. Every value of x in range should
        // postsolve-lift to a (x, y) pair satisfying the *original*
        // (pre-gcd-reduction) equation.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![4, 2], offset: 0 },
            rhs: Domain::fixed(6),
        })));

        let output = presolve(model, Config::default(), 11, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 0, "y should be fully eliminated as a singleton");
        assert!(!output.mapping.is_empty());

        for xv in output.model.var(x).domain.intervals().iter().flat_map(|iv| iv.lo..=iv.hi) {
            let mut assignment = PartialAssignment::from_solution([(x, xv)]);
            postsolve(&output.mapping, &mut assignment).unwrap();
            let yv = assignment.get(y).expect("y should be reconstructed by postsolve");
            assert_eq!(4 * xv + 2 * yv, 6);
        }
    }
}
