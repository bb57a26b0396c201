/*!
The fixed-point driver (spec.md §4.5): the outer loop that repeatedly
drains the constraint queue, reacts to variable-level triggers, and runs
the cross-constraint analyzers until nothing changes or a limit trips.

Every analyzer and rewriter is idempotent on a converged input, so the
loop structure itself carries no correctness burden beyond calling each
step in the documented order and stopping promptly once a limit is hit;
see `PresolveContext` and the individual rewriter/analyzer modules for the
actual soundness arguments.
*/

use crate::analyzers::{affine_sub, clique, dominance, duplicate, encoding, inclusion, probing};
use crate::context::time_limit::{TimeLimit, WorkBudget};
use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::{ConstraintIndex, VarIndex, VarState};
use crate::rewriters::presolve_one_constraint;

/// A snapshot of driver progress, emitted once per outer-loop iteration to
/// an optional observer. Grounded on the teacher's dispatch module
/// (`otter_sat::dispatch`): an optional callback checked at a single point
/// per iteration rather than a channel or event bus, since nothing here
/// needs back-pressure or multiple subscribers.
#[derive(Clone, Copy, Debug)]
pub struct Dispatch {
    pub loop_number: u32,
    pub queue_len: usize,
    pub operations_so_far: u64,
}

/// Runs the fixed-point loop described in spec.md §4.5 to convergence (or
/// until `time_limit` trips, or `config.debug_max_num_presolve_operations`
/// is reached), leaving `ctx` holding the reduced model and populated
/// mapping model.
pub struct Driver {
    pub dispatch: Option<Box<dyn Fn(Dispatch)>>,
}

impl Default for Driver {
    fn default() -> Self {
        Driver { dispatch: None }
    }
}

impl Driver {
    pub fn new() -> Self {
        Driver::default()
    }

    pub fn with_dispatch(dispatch: Box<dyn Fn(Dispatch)>) -> Self {
        Driver {
            dispatch: Some(dispatch),
        }
    }

    fn notify(&self, loop_number: u32, ctx: &PresolveContext) {
        if let Some(dispatch) = &self.dispatch {
            dispatch(Dispatch {
                loop_number,
                queue_len: ctx.queue_len(),
                operations_so_far: ctx.rule_stats.total(),
            });
        }
    }

    pub fn run(&self, ctx: &mut PresolveContext, time_limit: &dyn TimeLimit) -> Result<(), PresolveError> {
        let max_loops = ctx.config.max_num_loops.value;
        let op_limit = ctx.config.debug_max_num_presolve_operations.value;

        for loop_number in 0..max_loops {
            self.notify(loop_number, ctx);
            if ctx.is_infeasible() || time_limit.reached() || ctx.rule_stats.total() >= op_limit {
                break;
            }

            let mut made_progress = false;

            // Step 1: drain the constraint queue.
            made_progress |= drain_queue(ctx, time_limit, op_limit)?;
            if ctx.is_infeasible() || time_limit.reached() || ctx.rule_stats.total() >= op_limit {
                break;
            }

            // Step 2: variable-degree-triggered rules.
            made_progress |= process_reduced_degree_variables(ctx)?;
            if ctx.is_infeasible() {
                break;
            }

            // Step 3: domain-modification-triggered rules.
            made_progress |= process_modified_domains(ctx)?;
            if ctx.is_infeasible() {
                break;
            }

            // Step 4: fold integer variables used only in a value-literal
            // encoding into the encoding's own Boolean set.
            made_progress |= fold_encoding_only_variables(ctx)?;
            if ctx.is_infeasible() {
                break;
            }

            // Re-drain: steps 2-4 above can requeue constraints.
            made_progress |= drain_queue(ctx, time_limit, op_limit)?;
            if ctx.is_infeasible() {
                break;
            }

            // Step 5: dual-bound strengthening, repeated until it stops
            // finding anything or the configured pass count is reached.
            let before = ctx.rule_stats.total();
            for _ in 0..ctx.config.dual_bound_strengthening_passes.value {
                if ctx.is_infeasible() || time_limit.reached() {
                    break;
                }
                let mut budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
                let prior = ctx.rule_stats.total();
                dominance::dual_bound_strengthening(ctx, &mut budget)?;
                if ctx.rule_stats.total() == prior {
                    break;
                }
            }
            if ctx.rule_stats.total() != before {
                made_progress = true;
            }
            if ctx.is_infeasible() {
                break;
            }

            // Step 6: variable domination, bounded by the configured pass
            // count per spec.md's "at most twice per fixed-point call".
            let before = ctx.rule_stats.total();
            for _ in 0..ctx.config.var_domination_passes.value {
                if ctx.is_infeasible() || time_limit.reached() {
                    break;
                }
                let mut budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
                dominance::var_domination(ctx, &mut budget)?;
            }
            if ctx.rule_stats.total() != before {
                made_progress = true;
            }
            if ctx.is_infeasible() {
                break;
            }

            // Re-drain once more: dual-bound/domination may have fixed
            // variables, which requeues their touching constraints.
            made_progress |= drain_queue(ctx, time_limit, op_limit)?;
            if ctx.is_infeasible() {
                break;
            }

            // Cross-constraint analyzers, each with its own work budget.
            made_progress |= run_analyzers(ctx, time_limit)?;
            if ctx.is_infeasible() {
                break;
            }

            made_progress |= drain_queue(ctx, time_limit, op_limit)?;
            if ctx.is_infeasible() {
                break;
            }

            // Step 7: stop once nothing in this iteration produced work.
            if !made_progress {
                break;
            }
        }

        if ctx.is_infeasible() {
            ctx.rule_stats.increment("driver_infeasible");
        }
        Ok(())
    }
}

fn drain_queue(ctx: &mut PresolveContext, time_limit: &dyn TimeLimit, op_limit: u64) -> Result<bool, PresolveError> {
    let mut any = false;
    while let Some(ci) = ctx.dequeue() {
        if ctx.is_infeasible() || time_limit.reached() || ctx.rule_stats.total() >= op_limit {
            break;
        }
        let footprint_changed = presolve_one_constraint(ctx, ci)?;
        if footprint_changed {
            any = true;
        }
        ctx.rule_stats.increment("driver_constraints_dequeued");
    }
    Ok(any)
}

/// Step 2: react to a variable whose live incidence just dropped, in
/// sorted-variable order (spec.md §4.5, §9 determinism).
fn process_reduced_degree_variables(ctx: &mut PresolveContext) -> Result<bool, PresolveError> {
    let mut any = false;
    for var in ctx.take_reduced_small_degree() {
        if ctx.is_infeasible() {
            break;
        }
        if ctx.model.var(var).state != VarState::Representative {
            continue;
        }
        let degree = ctx.degree(var);
        if degree == 0 {
            continue;
        }
        // Requeue every live constraint still touching the variable so the
        // next queue drain re-examines it with up-to-date incidence,
        // regardless of which of the cases below (if any) also fires.
        ctx.requeue_constraints_touching(var);
        any = true;

        if degree == 1 {
            // A variable touched by exactly one constraint is a singleton
            // elimination candidate; re-enqueuing above is enough to give
            // the linear rewriter's own step 6 another look.
            continue;
        }
        if degree == 2 {
            if try_degree_two_affine_fold(ctx, var)? {
                ctx.rule_stats.increment("driver_degree_two_fold");
            }
        }
        // degree in {2, 3}: a variable shared by only two or three
        // at_most_one/exactly_one constraints is exactly the shape clique
        // merging (`analyzers::clique`) looks for; requeuing here and
        // running that analyzer later this same outer loop iteration
        // covers it without duplicating its logic.
    }
    Ok(any)
}

/// When a variable's degree has just dropped to exactly two and both
/// remaining constraints are plain linear equalities, one of which gives an
/// explicit affine definition of the variable, fold it via the same
/// elimination path as the linear rewriter's own step 9. This is the
/// degree-triggered counterpart: the linear rewriter only notices a
/// size-2 equality when *that* constraint itself is dequeued, whereas this
/// fires as soon as the variable's incidence shrinks to two regardless of
/// which of the two constraints is visited next.
fn try_degree_two_affine_fold(ctx: &mut PresolveContext, var: VarIndex) -> Result<bool, PresolveError> {
    let touching: Vec<ConstraintIndex> = ctx
        .constraints_touching(var)
        .iter()
        .copied()
        .filter(|ci| !ctx.model.constraint(*ci).is_removed())
        .collect();
    if touching.len() != 2 {
        return Ok(false);
    }
    for &ci in &touching {
        let constraint = ctx.model.constraint(ci);
        if !constraint.enforcement.is_empty() {
            continue;
        }
        let Some(ConstraintKind::Linear(c)) = &constraint.kind else {
            continue;
        };
        if c.expr.len() != 2 {
            continue;
        }
        let Some(rhs_val) = c.rhs.is_fixed() else {
            continue;
        };
        let Some(idx) = c.expr.coeffs.iter().position(|&coeff| coeff.abs() == 1) else {
            continue;
        };
        if c.expr.vars[idx] != var {
            continue;
        }
        let other_idx = 1 - idx;
        let (coeff, rep, rep_coeff, offset) = (c.expr.coeffs[idx], c.expr.vars[other_idx], c.expr.coeffs[other_idx], c.expr.offset);
        let a = crate::domain::sat_arith::sat_mul(-coeff, rep_coeff);
        let b = crate::domain::sat_arith::sat_mul(coeff, crate::domain::sat_arith::sat_sub(rhs_val, offset));
        if ctx.try_eliminate_via_affine_relation(var, a, b, rep, ci)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Step 3: simplify a variable's own domain into a dense, zero-based range
/// via an affine substitution whenever its live values form an arithmetic
/// progression with a stride greater than one (OR-Tools calls this domain
/// canonicalization; here it's `var = stride*y + base` with `y` ranging
/// over a tighter domain), then requeue every constraint that touches it.
fn process_modified_domains(ctx: &mut PresolveContext) -> Result<bool, PresolveError> {
    let mut any = false;
    for var in ctx.take_modified_domains() {
        if ctx.is_infeasible() {
            break;
        }
        if ctx.model.var(var).state != VarState::Representative {
            continue;
        }
        if canonicalize_domain_via_gcd(ctx, var)? {
            any = true;
        }
        ctx.requeue_constraints_touching(var);
        any = true;
    }
    Ok(any)
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a as i64
}

/// A domain whose live values are all congruent modulo some `stride > 1`
/// can be re-expressed as `base + stride*y`, shrinking the encoding the
/// rest of presolve has to reason about. Any interval wider than a single
/// point forces `stride = 1` (consecutive integers always differ by
/// exactly one), so this only fires for domains built entirely of
/// singleton intervals — e.g. `{0, 2, 4, 6}` after an earlier rule removed
/// the odd values one at a time.
fn canonicalize_domain_via_gcd(ctx: &mut PresolveContext, var: VarIndex) -> Result<bool, PresolveError> {
    let domain = ctx.model.var(var).domain.clone();
    if domain.is_fixed().is_some() {
        return Ok(false);
    }
    let mut values = Vec::new();
    for iv in domain.intervals() {
        if iv.lo != iv.hi {
            return Ok(false);
        }
        values.push(iv.lo);
    }
    if values.len() < 2 {
        return Ok(false);
    }
    let base = values[0];
    let mut stride = 0i64;
    for &v in &values[1..] {
        stride = gcd(stride, v - base);
    }
    if stride <= 1 {
        return Ok(false);
    }

    let y_domain = Domain::from_intervals(
        values
            .iter()
            .map(|&v| crate::domain::Interval::singleton((v - base) / stride))
            .collect(),
    );
    let y = ctx.new_variable_with_definition(y_domain, None);
    ctx.store_affine_relation(var, stride, base, y)?;
    ctx.rule_stats.increment("driver_domain_gcd_canonicalized");
    Ok(true)
}

/// Step 4: a variable whose every remaining touching constraint is one of
/// the reified `enc -> var == value` equalities synthesized or recognized
/// by the encoding cache, and whose domain is exactly the set of values
/// those equalities cover, no longer needs its own representation: the
/// `exactly_one` over its encoding literals already pins down which value
/// it takes, so the variable is retired and the reified equalities
/// replaced by that single Boolean constraint.
fn fold_encoding_only_variables(ctx: &mut PresolveContext) -> Result<bool, PresolveError> {
    let mut any = false;
    let candidate_vars: Vec<VarIndex> = (0..ctx.model.variables.len())
        .map(|i| VarIndex(i as u32))
        .filter(|&v| ctx.model.var(v).state == VarState::Representative)
        .collect();

    for var in candidate_vars {
        if ctx.is_infeasible() {
            break;
        }
        if fold_one_encoding_only_variable(ctx, var)? {
            any = true;
        }
    }
    Ok(any)
}

fn fold_one_encoding_only_variable(ctx: &mut PresolveContext, var: VarIndex) -> Result<bool, PresolveError> {
    let touching: Vec<ConstraintIndex> = ctx
        .constraints_touching(var)
        .iter()
        .copied()
        .filter(|ci| !ctx.model.constraint(*ci).is_removed())
        .collect();
    if touching.len() < 2 {
        return Ok(false);
    }

    let mut covered = Vec::with_capacity(touching.len());
    for &ci in &touching {
        let constraint = ctx.model.constraint(ci);
        if constraint.enforcement.len() != 1 {
            return Ok(false);
        }
        let Some(ConstraintKind::Linear(c)) = &constraint.kind else {
            return Ok(false);
        };
        if c.expr.vars != [var] || c.expr.coeffs != [1] {
            return Ok(false);
        }
        let Some(value) = c.rhs.is_fixed() else {
            return Ok(false);
        };
        covered.push((value, constraint.enforcement[0]));
    }

    let domain = ctx.model.var(var).domain.clone();
    let mut covered_domain = Domain::empty();
    for &(value, _) in &covered {
        covered_domain = covered_domain.union(&Domain::fixed(value));
    }
    if covered_domain != domain {
        return Ok(false);
    }

    let literals: Vec<crate::model::Literal> = covered.iter().map(|&(_, lit)| lit).collect();
    let exactly_one = crate::model::constraint::Constraint::unconditional(ConstraintKind::ExactlyOne(
        crate::model::constraint::ExactlyOne { literals },
    ));
    let new_ci = ctx.model.add_constraint(exactly_one);
    ctx.track_new_constraint(new_ci);

    for &ci in &touching {
        let original = ctx.model.constraint(ci).clone();
        ctx.new_mapping_constraint(original, "encoding_only_variable_removed");
        crate::rewriters::remove_constraint(ctx, ci);
    }
    ctx.model.var_mut(var).state = VarState::Removed;
    ctx.rule_stats.increment("encoding_only_variable_removed");
    Ok(true)
}

fn run_analyzers(ctx: &mut PresolveContext, time_limit: &dyn TimeLimit) -> Result<bool, PresolveError> {
    let before = ctx.rule_stats.total();

    let mut inclusion_budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
    inclusion::run(ctx, &mut inclusion_budget)?;
    if ctx.is_infeasible() || time_limit.reached() {
        return Ok(ctx.rule_stats.total() != before);
    }

    let mut duplicate_budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
    duplicate::run(ctx, &mut duplicate_budget)?;
    if ctx.is_infeasible() || time_limit.reached() {
        return Ok(ctx.rule_stats.total() != before);
    }

    let mut clique_budget = WorkBudget::new(ctx.config.merge_at_most_one_work_limit.value);
    clique::run(ctx, &mut clique_budget)?;
    if ctx.is_infeasible() || time_limit.reached() {
        return Ok(ctx.rule_stats.total() != before);
    }

    let mut encoding_budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
    encoding::run(ctx, &mut encoding_budget)?;
    if ctx.is_infeasible() || time_limit.reached() {
        return Ok(ctx.rule_stats.total() != before);
    }

    let mut affine_budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
    affine_sub::run(ctx, &mut affine_budget)?;
    if ctx.is_infeasible() || time_limit.reached() {
        return Ok(ctx.rule_stats.total() != before);
    }

    if ctx.config.probing_deterministic_time_limit_ms.value > 0 {
        let engine = probing::UnitPropagationEngine::from_context(ctx);
        let mut probing_budget = WorkBudget::new(ctx.config.presolve_inclusion_work_limit.value);
        probing::run(ctx, &engine, &mut probing_budget)?;
    }

    Ok(ctx.rule_stats.total() != before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::time_limit::Unbounded;
    use crate::domain::Domain;
    use crate::model::constraint::{Constraint, LinearConstraint};
    use crate::model::linear::LinearExpr;
    use crate::model::var::Variable;
    use crate::model::Model;

    #[test]
    fn converges_on_a_chain_of_singleton_eliminations() {
        // x = y, y = z, z = 5: everything should fold down to nothing left
        // to rewrite and z fixed to 5.
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        let y = model.new_variable(Variable::new(Domain::range(0, 10)));
        let z = model.new_variable(Variable::new(Domain::range(0, 10)));

        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![x, y], coeffs: vec![1, -1], offset: 0 },
            rhs: Domain::fixed(0),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr { vars: vec![y, z], coeffs: vec![1, -1], offset: 0 },
            rhs: Domain::fixed(0),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr::single(z, 1, 0),
            rhs: Domain::fixed(5),
        })));

        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let driver = Driver::new();
        driver.run(&mut ctx, &Unbounded).unwrap();

        assert!(!ctx.is_infeasible());
        assert_eq!(ctx.model.active_constraint_count(), 0);
    }

    #[test]
    fn detects_infeasible_contradiction() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr::single(x, 1, 0),
            rhs: Domain::fixed(3),
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr::single(x, 1, 0),
            rhs: Domain::fixed(7),
        })));

        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let driver = Driver::new();
        driver.run(&mut ctx, &Unbounded).unwrap();
        assert!(ctx.is_infeasible());
    }

    #[test]
    fn dispatch_callback_fires_each_iteration() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 10)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr::single(x, 1, 0),
            rhs: Domain::fixed(3),
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let driver = Driver::with_dispatch(Box::new(move |d: Dispatch| {
            seen_clone.lock().unwrap().push(d.loop_number);
        }));
        driver.run(&mut ctx, &Unbounded).unwrap();
        assert!(!seen.lock().unwrap().is_empty());
    }
}
