/*!
A fixed-point presolver for constraint-optimization models.

This crate implements the *core* of a presolve pass for a CP/MIP-style
intermediate model (see [`model`]): given a [`model::Model`], it produces a
smaller, semantically equivalent model plus a [`model::MappingModel`] that
lets an external postsolve step reconstruct a full solution of the original
model from any solution of the reduced one.

The crate is organized leaves-first, matching the component breakdown this
library was designed against:

- [`domain`]: saturating interval-union arithmetic over variable domains.
- [`model`]: the intermediate model's data structures (variables,
  constraints, the linear objective, the mapping stream).
- [`context`]: [`context::PresolveContext`], the mutable state every rule
  shares, plus the affine-relation store and the narrow operation set
  ([`context::ops`]) rules use to mutate it.
- [`copier`]: the one-shot normalizer that turns a caller-supplied model
  into a ready-to-run context.
- [`rewriters`]: one function per constraint kind, each rewriting a single
  constraint in place.
- [`analyzers`]: cross-constraint passes (inclusion, duplicates, probing,
  dominance, clique merging, affine substitution).
- [`driver`]: the fixed-point loop tying the above together.
- [`postsolve`]: replays the mapping model in reverse to lift a reduced
  solution back to the original variables.
- [`config`]: the control parameters a caller can tune.
- [`error`]: the error taxonomy shared across the crate.

Everything outside this crate — search, LP relaxation, the SAT
inprocessing engine, per-backend solvers, parallel orchestration, CLI/file
I/O — is treated as an external collaborator and is out of scope here (see
`SPEC_FULL.md`).

# Example

```
use csp_presolve::config::Config;
use csp_presolve::context::time_limit::Unbounded;
use csp_presolve::domain::Domain;
use csp_presolve::model::constraint::{Constraint, ConstraintKind, LinearConstraint};
use csp_presolve::model::linear::LinearExpr;
use csp_presolve::model::var::Variable;
use csp_presolve::model::Model;

let mut model = Model::default();
let x = model.new_variable(Variable::new(Domain::range(0, 10)));
let y = model.new_variable(Variable::new(Domain::range(0, 10)));
model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
    expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, 1], offset: 0 },
    rhs: Domain::fixed(5),
})));

let output = csp_presolve::presolve(model, Config::default(), 1, &Unbounded).unwrap();
assert!(!output.infeasible);
```
*/

pub mod analyzers;
pub mod config;
pub mod context;
pub mod copier;
pub mod domain;
pub mod driver;
pub mod error;
pub mod generic;
pub mod misc;
pub mod model;
pub mod postsolve;
pub mod rewriters;

use std::collections::BTreeMap;

use config::Config;
use context::time_limit::TimeLimit;
use context::PresolveContext;
use driver::Driver;
use error::PresolveError;
use model::{infeasible_model, MappingModel, Model};

/// The result of running [`presolve`]: a reduced model, the mapping model
/// needed to postsolve it, whether the presolver proved infeasibility, and
/// a rule-application report (spec.md §6's `{rule_name -> count}`).
#[derive(Clone, Debug)]
pub struct PresolveOutput {
    /// The reduced working model. When `infeasible` is set this is the
    /// small canonical "always false" shape from
    /// [`model::infeasible_model`], per spec.md §7.
    pub model: Model,

    /// The postsolve mapping stream accumulated during this run.
    pub mapping: MappingModel,

    /// Set when a rule proved the model has no solution.
    pub infeasible: bool,

    /// `rule_name -> number of times applied`, for diagnostics and for the
    /// idempotence/determinism property tests in spec.md §8.
    pub rule_report: BTreeMap<&'static str, i64>,
}

/// Runs the presolver to a fixed point (or until `time_limit` trips, or
/// [`config::Config::debug_max_num_presolve_operations`] is reached).
///
/// `seed` feeds the deterministic RNG used by [`config::Config::permute_presolve_constraint_order`]
/// and by the analyzers that accept randomized choices (spec.md §5: same
/// input and seed produce byte-identical output).
///
/// Returns `Err` only for a malformed input model (see [`error::CopyError`])
/// or a broken internal invariant; a model the presolver proves infeasible
/// is reported via [`PresolveOutput::infeasible`], not an `Err`, per
/// spec.md §7.
pub fn presolve(model: Model, config: Config, seed: u64, time_limit: &dyn TimeLimit) -> Result<PresolveOutput, PresolveError> {
    let mut ctx = copier::copy_model(model, config, seed).map_err(PresolveError::Copy)?;

    let driver = Driver::new();
    driver.run(&mut ctx, time_limit)?;

    let rule_report = ctx.rule_stats.report().clone();

    if ctx.is_infeasible() {
        return Ok(PresolveOutput {
            model: infeasible_model(),
            mapping: ctx.mapping,
            infeasible: true,
            rule_report,
        });
    }

    Ok(PresolveOutput {
        model: ctx.model,
        mapping: ctx.mapping,
        infeasible: false,
        rule_report,
    })
}

/// Convenience wrapper around [`PresolveContext::new`] plus
/// [`driver::Driver::run`] for callers that want direct access to the
/// context afterwards (e.g. to inspect `ctx.affine` or re-run the driver
/// incrementally), rather than the one-shot [`presolve`] entry point.
pub fn presolve_into_context(model: Model, config: Config, seed: u64, time_limit: &dyn TimeLimit) -> Result<PresolveContext, PresolveError> {
    let mut ctx = copier::copy_model(model, config, seed).map_err(PresolveError::Copy)?;
    let driver = Driver::new();
    driver.run(&mut ctx, time_limit)?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::time_limit::Unbounded;
    use crate::domain::Domain;
    use crate::model::constraint::{Constraint, ConstraintKind, LinearConstraint};
    use crate::model::linear::LinearExpr;
    use crate::model::var::Variable;
    use crate::model::Model;
    use crate::postsolve::{postsolve, PartialAssignment};

    #[test]
    fn end_to_end_singleton_elimination_round_trips_through_postsolve() {
        // x + y = 5, minimize y: y should be eliminated as a singleton, and
        // postsolve should recover a full (x, y) assignment from just x.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, 1], offset: 0 },
            rhs: Domain::fixed(5),
        })));
        model.objective = Some(crate::model::Objective::minimize(LinearExpr::single(y, 1, 0)));

        let output = presolve(model, Config::default(), 7, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert!(output.model.var(x).domain.contains(2));

        let mut assignment = PartialAssignment::from_solution([(x, 2)]);
        postsolve(&output.mapping, &mut assignment).unwrap();
        assert_eq!(assignment.get(y), Some(3));
    }

    #[test]
    fn reports_infeasibility_without_a_reduced_model() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::fixed(0)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr::single(x, 1, 0),
            rhs: Domain::fixed(1),
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 1);
    }

    #[test]
    fn rule_report_is_populated() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(crate::model::constraint::AtMostOne {
            literals: vec![crate::model::Literal::positive(a), crate::model::Literal::positive(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(crate::model::constraint::AtMostOne {
            literals: vec![crate::model::Literal::positive(a), crate::model::Literal::positive(b)],
        })));

        let output = presolve(model, Config::default(), 1, &Unbounded).unwrap();
        assert!(!output.infeasible);
        assert_eq!(output.model.active_constraint_count(), 1);
        assert!(output.rule_report.values().sum::<i64>() > 0);
    }
}
