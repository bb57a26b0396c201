/*!
Postsolve (spec.md §4.6): replays the mapping model in reverse to lift a
solution of the reduced model back to a solution of the original one.

Every mapping entry was pushed by a rule that proved the constraint it
carries still holds given the rest of the model, and that exactly one of
the variables it mentions was left without a value by the rule that wrote
it (the "most-recently-removed variable", per spec.md §4.6's contract).
Replaying entries in reverse order therefore always has enough pinned
values on hand to solve for the one that's missing — this module is the
actual implementation of that external contract, grounded in the same
"narrow, append-only, replay in reverse" shape the mapping model itself
(`model::mapping`) is built around.
*/

use std::collections::HashMap;

use crate::domain::{sat_arith::sat_add, sat_arith::sat_mul, Domain};
use crate::error::PostsolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::{MappingModel, VarIndex};

/// A partially-built solution: some variables already have a value (from
/// the reduced model's own solution, or pinned by an earlier-processed
/// mapping entry), others don't yet.
#[derive(Clone, Debug, Default)]
pub struct PartialAssignment {
    values: HashMap<VarIndex, i64>,
}

impl PartialAssignment {
    pub fn new() -> Self {
        PartialAssignment::default()
    }

    /// Builds a partial assignment from the reduced model's own solution
    /// (one entry per live representative variable).
    pub fn from_solution(values: impl IntoIterator<Item = (VarIndex, i64)>) -> Self {
        PartialAssignment {
            values: values.into_iter().collect(),
        }
    }

    pub fn get(&self, var: VarIndex) -> Option<i64> {
        self.values.get(&var).copied()
    }

    pub fn is_assigned(&self, var: VarIndex) -> bool {
        self.values.contains_key(&var)
    }

    pub fn set(&mut self, var: VarIndex, value: i64) {
        self.values.insert(var, value);
    }

    pub fn into_map(self) -> HashMap<VarIndex, i64> {
        self.values
    }
}

/// Replays `mapping` in reverse, filling in `assignment` for every variable
/// the presolver removed from the working model. On return (`Ok`),
/// `assignment` holds a value for every variable any mapping entry
/// mentions, consistent with every entry's constraint.
pub fn postsolve(mapping: &MappingModel, assignment: &mut PartialAssignment) -> Result<(), PostsolveError> {
    let entries = mapping.entries();
    for (idx, entry) in entries.iter().enumerate().rev() {
        log::trace!(target: crate::misc::log::targets::POSTSOLVE, "replaying entry {idx} ({})", entry.reason);

        let mut enforcement_holds = true;
        for lit in &entry.constraint.enforcement {
            let Some(v) = assignment.get(lit.atom()) else {
                return Err(PostsolveError::MissingValue(lit.atom()));
            };
            let holds = if lit.polarity() { v != 0 } else { v == 0 };
            if !holds {
                enforcement_holds = false;
                break;
            }
        }
        if !enforcement_holds {
            continue;
        }

        let Some(kind) = &entry.constraint.kind else {
            continue;
        };
        let body_vars = kind.body_vars();
        let mut unassigned: Vec<VarIndex> = body_vars.into_iter().filter(|v| !assignment.is_assigned(*v)).collect();
        unassigned.sort();
        unassigned.dedup();
        match unassigned.len() {
            0 => continue,
            1 => {
                let target = unassigned[0];
                let value = solve_for(kind, target, assignment, idx)?;
                assignment.set(target, value);
            }
            _ => return Err(PostsolveError::MissingValue(unassigned[1])),
        }
    }
    Ok(())
}

/// Solves a single mapping-entry constraint for its one unpinned variable,
/// given every other variable it mentions already has a value.
fn solve_for(kind: &ConstraintKind, target: VarIndex, assignment: &PartialAssignment, entry_idx: usize) -> Result<i64, PostsolveError> {
    match kind {
        ConstraintKind::Linear(c) => {
            let Some(coeff) = c.expr.coeff_of(target) else {
                return Err(PostsolveError::UnsatisfiableMappingEntry(entry_idx));
            };
            let mut known_sum = c.expr.offset;
            for (&v, &co) in c.expr.vars.iter().zip(c.expr.coeffs.iter()) {
                if v == target {
                    continue;
                }
                let val = assignment.get(v).ok_or(PostsolveError::MissingValue(v))?;
                known_sum = sat_add(known_sum, sat_mul(co, val));
            }
            if let Some(rhs_val) = c.rhs.is_fixed() {
                let numerator = rhs_val - known_sum;
                if coeff == 0 || numerator % coeff != 0 {
                    return Err(PostsolveError::UnsatisfiableMappingEntry(entry_idx));
                }
                Ok(numerator / coeff)
            } else {
                // A ranged rhs: any value in the implied range for `target`
                // satisfies the constraint equally well; the smallest one
                // is as good as any other.
                let shifted = c.rhs.add(&Domain::fixed(-known_sum));
                let bound = shifted.inverse_mul(coeff);
                bound.min().ok_or(PostsolveError::UnsatisfiableMappingEntry(entry_idx))
            }
        }

        ConstraintKind::Element(e) if e.index.var == target => {
            // The only Element mapping entry this library ever produces is
            // "every entry denotes the same value, so the index doesn't
            // matter" (see `rewriters::element`); any in-range index
            // works, so pick the smallest value of `e.index.var` whose
            // affine image lands in `[0, n-1]`.
            let n = e.entries.len() as i64;
            for candidate_index in 0..n {
                let shifted = candidate_index - e.index.offset;
                if e.index.coeff != 0 && shifted % e.index.coeff == 0 {
                    return Ok(shifted / e.index.coeff);
                }
            }
            Err(PostsolveError::UnsatisfiableMappingEntry(entry_idx))
        }

        _ => Err(PostsolveError::UnsatisfiableMappingEntry(entry_idx)),
    }
}
