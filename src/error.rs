/*!
Error types used by the presolver.

Most of these never escape the library: infeasibility is a process-wide flag
rather than a propagated `Err` (see [`PresolveError::Infeasible`]), overflow
and work/time-limit conditions simply cause the triggering rule to leave its
constraint untouched. `PresolveError` exists for the small number of cases
where a caller-visible failure is the right shape: a malformed input model,
or an internal invariant broken (a bug, not a presolve outcome).
*/

use crate::model::ConstraintIndex;

/// A union of the error kinds that can be returned across the public API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PresolveError {
    /// The model was proven to have no solution. Carries a short,
    /// human-readable, stable reason used for diagnostics and tests.
    Infeasible(String),

    /// An error encountered while importing/copying the input model.
    Copy(CopyError),

    /// An error in the affine-relation store.
    Affine(AffineError),

    /// An error from the mapping-model bookkeeping.
    Mapping(MappingError),

    /// An error raised by postsolve while replaying the mapping stream.
    Postsolve(PostsolveError),

    /// An internal invariant was broken. Indicates a bug rather than a
    /// property of the input model.
    Invariant(&'static str),
}

impl std::fmt::Display for PresolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Infeasible(reason) => write!(f, "infeasible: {reason}"),
            Self::Copy(e) => write!(f, "error copying input model: {e:?}"),
            Self::Affine(e) => write!(f, "error in affine-relation store: {e:?}"),
            Self::Mapping(e) => write!(f, "error in mapping model: {e:?}"),
            Self::Postsolve(e) => write!(f, "error during postsolve: {e:?}"),
            Self::Invariant(msg) => write!(f, "internal invariant broken: {msg}"),
        }
    }
}

impl std::error::Error for PresolveError {}

/// Errors encountered while normalizing an input [`Model`](crate::model::Model).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CopyError {
    /// A linear term referenced a negative variable index directly (negative
    /// refs are only meaningful as literals, never inside a linear term).
    NegativeRefInLinearTerm(ConstraintIndex),

    /// A constraint referenced a variable index outside the declared range.
    VariableOutOfRange(ConstraintIndex),

    /// The declared domain of a variable is empty.
    EmptyDomain(crate::model::VarIndex),
}

/// Errors from [`AffineStore`](crate::context::affine::AffineStore).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AffineError {
    /// Composing two relations produced a contradiction (e.g. `x = 2y` and
    /// `x = 2y + 1` simultaneously).
    Contradiction,

    /// The affine coefficient `a` was zero; `x = 0*rep + b` is a fixed value,
    /// not a relation, and must be routed through `fix_value` instead.
    ZeroCoefficient,
}

/// Errors appending to or replaying the mapping model.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MappingError {
    /// A rule marked a variable removed without first pushing a mapping
    /// entry that pins it. This is an internal invariant violation.
    UnpinnedRemoval,
}

/// Errors raised while replaying the mapping stream to reconstruct a full
/// solution from a reduced-model solution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PostsolveError {
    /// A mapping-model constraint could not be satisfied by any assignment
    /// to its unpinned variables given the values pinned so far. This would
    /// indicate the presolver produced an unsound reduction.
    UnsatisfiableMappingEntry(usize),

    /// A variable required by a mapping entry was never assigned, and is
    /// also not the entry's own pinned variable.
    MissingValue(crate::model::VarIndex),
}

/// Work-limit exhaustion: not an error, a normal "stop early" signal
/// returned by analyzers that accept an opaque work budget.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkLimitReached;
