//! Scenario tests for at-most-one clique merging (spec.md §8, §4.4.5)
//! exercised through the public `presolve` entry point. `analyzers::clique`
//! already has a unit test at the module level exercising the exact
//! triangle worked example from spec.md §8; these tests drive the same
//! analyzer end to end, including a case it must leave alone.

use csp_presolve::config::Config;
use csp_presolve::context::time_limit::Unbounded;
use csp_presolve::domain::Domain;
use csp_presolve::model::constraint::{AtMostOne, Constraint, ConstraintKind};
use csp_presolve::model::var::Variable;
use csp_presolve::model::{Literal, Model};
use csp_presolve::presolve;

mod cliques {
    use super::*;

    #[test]
    fn triangle_of_pairwise_at_most_ones_merges_through_the_full_pipeline() {
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

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 1);
        let live: Vec<_> = output.model.constraints.iter().filter(|c| !c.is_removed()).collect();
        match &live[0].kind {
            Some(ConstraintKind::AtMostOne(c)) => assert_eq!(c.literals.len(), 3),
            other => panic!("expected a merged at_most_one(3), got {other:?}"),
        }
        assert!(output.rule_report.get("clique_merge").copied().unwrap_or(0) >= 1);
    }

    #[test]
    fn a_square_of_pairwise_at_most_ones_does_not_falsely_merge() {
        // a-b, b-c, c-d, d-a: this 4-cycle has no triangle (a and c are
        // never paired, neither are b and d), so no at_most_one(3) or
        // at_most_one(4) is implied; merging here would be unsound.
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let c = model.new_variable(Variable::new(Domain::range(0, 1)));
        let d = model.new_variable(Variable::new(Domain::range(0, 1)));
        let lit = |v| Literal::positive(v);
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(b), lit(c)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(c), lit(d)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(d), lit(a)],
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 4);
        assert_eq!(output.rule_report.get("clique_merge").copied().unwrap_or(0), 0);
    }

    #[test]
    fn two_disjoint_triangles_each_merge_independently() {
        let mut model = Model::default();
        let vars: Vec<_> = (0..6).map(|_| model.new_variable(Variable::new(Domain::range(0, 1)))).collect();
        let lit = |v| Literal::positive(v);
        for &(i, j) in &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
            model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
                literals: vec![lit(vars[i]), lit(vars[j])],
            })));
        }

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 2);
        assert_eq!(output.rule_report.get("clique_merge").copied().unwrap_or(0), 2);
    }
}
