/*!
The Boolean constraint families: `bool_or`, `bool_and`, `at_most_one`,
`exactly_one`, `bool_xor` (spec.md §4.3.2). All five share the same shape of
cleanup — substitute affine-reduced atoms, drop duplicates, fold already-
fixed literals out, detect a trivially-true or trivially-false body — so the
family-specific logic is the small part at the end of each function.
*/

use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::{AtMostOne, BoolAnd, BoolOr, BoolXor, ConstraintKind, ExactlyOne};
use crate::model::literal::Literal;
use crate::model::ConstraintIndex;

use super::{mark_false, remove_constraint};

fn substitute_and_dedupe(ctx: &PresolveContext, literals: Vec<Literal>) -> Vec<Literal> {
    let mut out: Vec<Literal> = literals
        .into_iter()
        .map(|lit| {
            if !ctx.affine.is_reduced(lit.atom()) {
                return lit;
            }
            let (rep, a, b) = ctx.affine.resolve(lit.atom());
            if a == 1 && b == 0 {
                Literal::of(rep, lit.polarity())
            } else {
                Literal::of(rep, !lit.polarity())
            }
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

fn has_complementary_pair(literals: &[Literal]) -> bool {
    literals.iter().any(|l| literals.binary_search(&-*l).is_ok())
}

/// Splits `literals` into (already-true, already-false, undetermined),
/// using each literal's underlying variable's current (possibly fixed)
/// domain.
fn partition_by_fixed(ctx: &PresolveContext, literals: &[Literal]) -> (usize, usize, Vec<Literal>) {
    let mut true_count = 0;
    let mut false_count = 0;
    let mut rest = Vec::with_capacity(literals.len());
    for &lit in literals {
        match ctx.model.var(lit.atom()).domain.is_fixed() {
            Some(v) => {
                if (v != 0) == lit.polarity() {
                    true_count += 1;
                } else {
                    false_count += 1;
                }
            }
            None => rest.push(lit),
        }
    }
    (true_count, false_count, rest)
}

pub fn presolve_bool_or(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::BoolOr(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    let literals = substitute_and_dedupe(ctx, body.literals);

    if has_complementary_pair(&literals) {
        remove_constraint(ctx, ci);
        return Ok(());
    }

    let (true_count, _false_count, rest) = partition_by_fixed(ctx, &literals);
    if true_count > 0 {
        remove_constraint(ctx, ci);
        return Ok(());
    }

    if rest.is_empty() {
        mark_false(ctx, ci, "bool_or has no surviving literal");
        return Ok(());
    }
    if rest.len() == 1 && ctx.model.constraint(ci).enforcement.is_empty() {
        ctx.set_literal_true(rest[0])?;
        remove_constraint(ctx, ci);
        return Ok(());
    }
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::BoolOr(BoolOr { literals: rest }));
    Ok(())
}

pub fn presolve_bool_and(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::BoolAnd(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    let literals = substitute_and_dedupe(ctx, body.literals);

    if has_complementary_pair(&literals) {
        mark_false(ctx, ci, "bool_and requires a literal and its negation");
        return Ok(());
    }

    let (_true_count, false_count, rest) = partition_by_fixed(ctx, &literals);
    if false_count > 0 {
        mark_false(ctx, ci, "bool_and has an already-false literal");
        return Ok(());
    }
    if rest.is_empty() {
        remove_constraint(ctx, ci);
        return Ok(());
    }
    if ctx.model.constraint(ci).enforcement.is_empty() {
        for lit in &rest {
            ctx.set_literal_true(*lit)?;
        }
        remove_constraint(ctx, ci);
        return Ok(());
    }
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::BoolAnd(BoolAnd { literals: rest }));
    Ok(())
}

pub fn presolve_at_most_one(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::AtMostOne(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    let literals = substitute_and_dedupe(ctx, body.literals);
    let (true_count, _false_count, rest) = partition_by_fixed(ctx, &literals);

    if true_count > 1 {
        mark_false(ctx, ci, "at_most_one has two already-true literals");
        return Ok(());
    }
    if true_count == 1 {
        if ctx.model.constraint(ci).enforcement.is_empty() {
            for lit in &rest {
                ctx.set_literal_false(*lit)?;
            }
            remove_constraint(ctx, ci);
        } else {
            // Can't force the rest false unconditionally: the constraint
            // only requires that when its enforcement holds. `rest` alone
            // would under-constrain (it permits one of `rest` true on top
            // of the literal already true), so keep the already-true
            // literal in the stored body instead of dropping it.
            ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::AtMostOne(AtMostOne { literals }));
        }
        return Ok(());
    }
    if rest.len() <= 1 {
        remove_constraint(ctx, ci);
        return Ok(());
    }
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::AtMostOne(AtMostOne { literals: rest }));
    Ok(())
}

pub fn presolve_exactly_one(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::ExactlyOne(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    let literals = substitute_and_dedupe(ctx, body.literals);
    let (true_count, _false_count, rest) = partition_by_fixed(ctx, &literals);

    if true_count > 1 {
        mark_false(ctx, ci, "exactly_one has two already-true literals");
        return Ok(());
    }
    if true_count == 1 {
        if ctx.model.constraint(ci).enforcement.is_empty() {
            for lit in &rest {
                ctx.set_literal_false(*lit)?;
            }
            remove_constraint(ctx, ci);
        } else {
            // Same under-constraining hazard as `at_most_one`: keep the
            // already-true literal in the stored body rather than leaving
            // `rest` to stand in for the whole thing.
            ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::ExactlyOne(ExactlyOne { literals }));
        }
        return Ok(());
    }
    if rest.is_empty() {
        mark_false(ctx, ci, "exactly_one has no surviving literal");
        return Ok(());
    }
    if rest.len() == 1 {
        if ctx.model.constraint(ci).enforcement.is_empty() {
            ctx.set_literal_true(rest[0])?;
            remove_constraint(ctx, ci);
        } else {
            ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::ExactlyOne(ExactlyOne { literals: rest }));
        }
        return Ok(());
    }
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::ExactlyOne(ExactlyOne { literals: rest }));
    Ok(())
}

pub fn presolve_bool_xor(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::BoolXor(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };
    // Xor's duplicate semantics differ from the other families (`x xor x`
    // cancels to 0 rather than collapsing to `x`), so literals are only
    // affine-substituted here, not deduplicated.
    let literals: Vec<Literal> = body
        .literals
        .into_iter()
        .map(|lit| {
            if !ctx.affine.is_reduced(lit.atom()) {
                return lit;
            }
            let (rep, a, b) = ctx.affine.resolve(lit.atom());
            if a == 1 && b == 0 {
                Literal::of(rep, lit.polarity())
            } else {
                Literal::of(rep, !lit.polarity())
            }
        })
        .collect();

    // Group by atom: an even number of occurrences of one polarity cancels
    // entirely; an odd number leaves one literal of that polarity; one
    // leftover of each polarity for the same atom (`x xor not(x)`) forces a
    // parity flip and leaves nothing behind for that atom.
    let mut by_atom: std::collections::BTreeMap<crate::model::VarIndex, (u32, u32)> = std::collections::BTreeMap::new();
    for lit in &literals {
        let entry = by_atom.entry(lit.atom()).or_insert((0, 0));
        if lit.polarity() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut parity_flips = 0usize;
    let mut rest = Vec::with_capacity(by_atom.len());
    for (var, (pos, neg)) in by_atom {
        let pos_odd = pos % 2 == 1;
        let neg_odd = neg % 2 == 1;
        let remaining_lit = match (pos_odd, neg_odd) {
            (true, true) => {
                parity_flips += 1;
                None
            }
            (true, false) => Some(Literal::positive(var)),
            (false, true) => Some(Literal::negative(var)),
            (false, false) => None,
        };
        let Some(lit) = remaining_lit else { continue };
        match ctx.model.var(lit.atom()).domain.is_fixed() {
            Some(v) => {
                if (v != 0) == lit.polarity() {
                    parity_flips += 1;
                }
            }
            None => rest.push(lit),
        }
    }
    let required_true = parity_flips % 2 == 1;

    if rest.is_empty() {
        if required_true {
            remove_constraint(ctx, ci);
        } else {
            mark_false(ctx, ci, "bool_xor parity unsatisfiable with no remaining literals");
        }
        return Ok(());
    }
    if rest.len() == 1 {
        if ctx.model.constraint(ci).enforcement.is_empty() {
            if required_true {
                ctx.set_literal_true(rest[0])?;
            } else {
                ctx.set_literal_false(rest[0])?;
            }
            remove_constraint(ctx, ci);
            return Ok(());
        }
    }
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::BoolXor(BoolXor { literals: rest }));
    Ok(())
}
