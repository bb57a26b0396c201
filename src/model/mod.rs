/*!
The intermediate model (IM): the data structures presolve reads, rewrites,
and eventually hands back in reduced form.
*/

pub mod constraint;
pub mod linear;
pub mod literal;
pub mod mapping;
pub mod objective;
pub mod var;

pub use constraint::{Constraint, ConstraintIndex, ConstraintKind};
pub use linear::LinearExpr;
pub use literal::Literal;
pub use mapping::MappingModel;
pub use objective::Objective;
pub use var::{VarIndex, VarState, Variable};

/// A hinted starting value for a variable, clipped into its domain during
/// import.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HintEntry {
    pub var: VarIndex,
    pub value: i64,
}

/// The working model: everything a presolve run reads and rewrites.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
    pub objective: Option<Objective>,
    pub solution_hint: Vec<HintEntry>,
    pub assumptions: Vec<Literal>,
}

impl Model {
    pub fn new_variable(&mut self, var: Variable) -> VarIndex {
        let idx = VarIndex(self.variables.len() as u32);
        self.variables.push(var);
        idx
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintIndex {
        let idx = ConstraintIndex(self.constraints.len() as u32);
        self.constraints.push(constraint);
        idx
    }

    pub fn var(&self, idx: VarIndex) -> &Variable {
        &self.variables[idx.index()]
    }

    pub fn var_mut(&mut self, idx: VarIndex) -> &mut Variable {
        &mut self.variables[idx.index()]
    }

    pub fn constraint(&self, idx: ConstraintIndex) -> &Constraint {
        &self.constraints[idx.index()]
    }

    pub fn constraint_mut(&mut self, idx: ConstraintIndex) -> &mut Constraint {
        &mut self.constraints[idx.index()]
    }

    /// Active (non-removed) constraint count — the count that matters for
    /// model size, as opposed to `constraints.len()` which includes
    /// tombstoned slots.
    pub fn active_constraint_count(&self) -> usize {
        self.constraints.iter().filter(|c| !c.is_removed()).count()
    }
}

/// A small canonical "always false" model, returned in place of a reduced
/// model when the presolver proves infeasibility (spec.md §7).
pub fn infeasible_model() -> Model {
    let mut model = Model::default();
    model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(
        constraint::BoolOr { literals: vec![] },
    )));
    model
}
