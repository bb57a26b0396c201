/*!
Variable indices and the lifecycle state of a variable within the working
model.
*/

use crate::domain::Domain;

/// An index into the working model's variable list.
///
/// A newtype rather than a bare `usize` so it cannot be confused with a
/// [`ConstraintIndex`](crate::model::ConstraintIndex) at a call site —
/// mirrors the teacher's distinct `Atom`/`ClauseKey` index spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(pub u32);

impl VarIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for VarIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for VarIndex {
    fn from(v: usize) -> Self {
        VarIndex(v as u32)
    }
}

/// The lifecycle state of a variable.
///
/// A variable is never destroyed during presolve (index compaction is a
/// separate, final step outside the scope of this crate); it only moves
/// through these three states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarState {
    /// The variable is live in the working model.
    Representative,

    /// The variable has been substituted by an affine relation `x = a*rep +
    /// b` and no longer appears in any working-model constraint body.
    AffineReduced,

    /// The variable has been fixed or otherwise eliminated; its value is
    /// reconstructed at postsolve time from the mapping model.
    Removed,
}

/// A single variable of the working model.
#[derive(Clone, Debug)]
pub struct Variable {
    pub domain: Domain,
    pub name: Option<String>,
    pub state: VarState,
}

impl Variable {
    pub fn new(domain: Domain) -> Self {
        Variable {
            domain,
            name: None,
            state: VarState::Representative,
        }
    }

    pub fn named(domain: Domain, name: impl Into<String>) -> Self {
        Variable {
            domain,
            name: Some(name.into()),
            state: VarState::Representative,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.domain == Domain::fixed(0)
            || self.domain == Domain::fixed(1)
            || self.domain == Domain::range(0, 1)
    }

    pub fn is_fixed(&self) -> Option<i64> {
        self.domain.is_fixed()
    }
}
