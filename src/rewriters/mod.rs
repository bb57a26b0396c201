/*!
Single-constraint rewriters: one function per constraint kind, each taking
a constraint in place and returning whether its variable footprint changed
(spec.md §4.3). [`presolve_one_constraint`] is the driver's single entry
point; it extracts the constraint's kind (leaving a tombstone behind while
the rewriter runs, so a rewriter can freely call context operations without
holding a live borrow of the constraint it is rewriting), dispatches, and
puts the (possibly rewritten) kind back unless the rewriter removed it.
*/

pub mod all_different;
pub mod automaton;
pub mod bool_family;
pub mod element;
pub mod graph;
pub mod int_arith;
pub mod inverse;
pub mod linear;
pub mod reservoir;
pub mod scheduling;
pub mod table;

use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::{BoolOr, ConstraintKind};
use crate::model::{ConstraintIndex, Literal};

/// Clears `ct`'s enforcement (it becomes unconditional) and rewrites its
/// body to `bool_or` of the negated enforcement literals — at least one of
/// them must be false for the constraint to have been allowed to not hold.
/// If the enforcement list was already empty, the constraint itself was
/// unconditional and could never hold: that proves infeasibility.
pub fn mark_false(ctx: &mut PresolveContext, ci: ConstraintIndex, reason: &str) {
    let enforcement = std::mem::take(&mut ctx.model.constraint_mut(ci).enforcement);
    if enforcement.is_empty() {
        ctx.mark_infeasible(format!("{reason} ({ci} is unconditionally false)"));
        return;
    }
    let literals: Vec<Literal> = enforcement.iter().map(|l| -*l).collect();
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::BoolOr(BoolOr { literals }));
}

/// Tombstones `ct` in place.
pub fn remove_constraint(ctx: &mut PresolveContext, ci: ConstraintIndex) {
    ctx.model.constraint_mut(ci).remove();
}

/// Runs the rewriter matching `ci`'s current kind. Returns `Ok(true)` if the
/// constraint's footprint changed (new or dropped variable references),
/// which the driver uses to decide whether to re-touch neighboring
/// structures; a constraint that was merely tightened in place without
/// changing which variables it mentions returns `Ok(false)`.
pub fn presolve_one_constraint(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<bool, PresolveError> {
    if ctx.is_infeasible() || ctx.model.constraint(ci).is_removed() {
        return Ok(false);
    }

    let before = ctx.model.constraint(ci).footprint();

    let kind = ctx.model.constraint(ci).kind.clone();
    let Some(kind) = kind else {
        return Ok(false);
    };

    use ConstraintKind::*;
    match kind {
        Linear(_) => linear::presolve(ctx, ci)?,
        BoolOr(_) => bool_family::presolve_bool_or(ctx, ci)?,
        BoolAnd(_) => bool_family::presolve_bool_and(ctx, ci)?,
        AtMostOne(_) => bool_family::presolve_at_most_one(ctx, ci)?,
        ExactlyOne(_) => bool_family::presolve_exactly_one(ctx, ci)?,
        BoolXor(_) => bool_family::presolve_bool_xor(ctx, ci)?,
        IntProd(_) => int_arith::presolve_int_prod(ctx, ci)?,
        IntDiv(_) => int_arith::presolve_int_div(ctx, ci)?,
        IntMod(_) => int_arith::presolve_int_mod(ctx, ci)?,
        Element(_) => element::presolve(ctx, ci)?,
        Table(_) => table::presolve(ctx, ci)?,
        Automaton(_) => automaton::presolve(ctx, ci)?,
        Interval(_) => scheduling::presolve_interval(ctx, ci)?,
        NoOverlap(_) => scheduling::presolve_no_overlap(ctx, ci)?,
        NoOverlap2D(_) => scheduling::presolve_no_overlap_2d(ctx, ci)?,
        Cumulative(_) => scheduling::presolve_cumulative(ctx, ci)?,
        Circuit(_) => graph::presolve_circuit(ctx, ci)?,
        Routes(_) => graph::presolve_routes(ctx, ci)?,
        Reservoir(_) => reservoir::presolve(ctx, ci)?,
        AllDifferent(_) => all_different::presolve(ctx, ci)?,
        Inverse(_) => inverse::presolve(ctx, ci)?,
    }

    if ctx.is_infeasible() {
        return Ok(true);
    }

    let after = if ctx.model.constraint(ci).is_removed() {
        Vec::new()
    } else {
        ctx.model.constraint(ci).footprint()
    };
    Ok(before != after)
}
