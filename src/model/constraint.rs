/*!
The tagged-variant constraint record and the fixed set of constraint kinds
spec.md §4.3 enumerates.
*/

use crate::model::{linear::LinearExpr, literal::Literal, var::VarIndex};

/// An index into the working model's constraint list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintIndex(pub u32);

impl ConstraintIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ConstraintIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// An affine expression over a single variable: `coeff * var + offset`.
/// Used where spec.md calls for "an affine linear expression" as an
/// argument (element indices/targets, interval endpoints, reservoir times).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffineExpr {
    pub var: VarIndex,
    pub coeff: i64,
    pub offset: i64,
}

impl AffineExpr {
    pub fn constant(offset: i64, placeholder: VarIndex) -> Self {
        AffineExpr {
            var: placeholder,
            coeff: 0,
            offset,
        }
    }

    pub fn value_at(&self, var_value: i64) -> i64 {
        self.coeff.saturating_mul(var_value).saturating_add(self.offset)
    }

    pub fn as_linear(&self) -> LinearExpr {
        LinearExpr::single(self.var, self.coeff, self.offset)
    }
}

/// An interval-typed constraint argument: a reference to another
/// `interval` constraint's index, used by the scheduling family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalRef(pub ConstraintIndex);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    /// The right-hand-side domain: the constraint holds iff
    /// `expr.value() in rhs`.
    pub rhs: crate::domain::Domain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoolOr {
    pub literals: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoolAnd {
    pub literals: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtMostOne {
    pub literals: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactlyOne {
    pub literals: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoolXor {
    pub literals: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntProd {
    pub target: AffineExpr,
    pub factors: Vec<AffineExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntDiv {
    pub target: AffineExpr,
    pub numerator: AffineExpr,
    pub denominator: AffineExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntMod {
    pub target: AffineExpr,
    pub numerator: AffineExpr,
    pub modulus: AffineExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub index: AffineExpr,
    pub target: AffineExpr,
    pub entries: Vec<AffineExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub vars: Vec<VarIndex>,
    pub tuples: Vec<Vec<i64>>,
    /// If true, forbid rather than require membership in `tuples`.
    pub negated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Automaton {
    pub vars: Vec<VarIndex>,
    pub starting_state: i64,
    pub final_states: Vec<i64>,
    /// `(from_state, label, to_state)`.
    pub transitions: Vec<(i64, i64, i64)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start: AffineExpr,
    pub size: AffineExpr,
    pub end: AffineExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoOverlap {
    pub intervals: Vec<IntervalRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoOverlap2D {
    pub x_intervals: Vec<IntervalRef>,
    pub y_intervals: Vec<IntervalRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cumulative {
    pub capacity: AffineExpr,
    pub intervals: Vec<IntervalRef>,
    pub demands: Vec<AffineExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Circuit {
    /// `(tail, head, literal)` arcs; a self-arc `(n, n, lit)` means node `n`
    /// is excluded from the circuit when `lit` is true.
    pub arcs: Vec<(i32, i32, Literal)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub arcs: Vec<(i32, i32, Literal)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservoirEvent {
    pub time: AffineExpr,
    pub level_change: i64,
    pub active: Option<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservoir {
    pub min_level: i64,
    pub max_level: i64,
    pub events: Vec<ReservoirEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllDifferent {
    pub exprs: Vec<AffineExpr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inverse {
    pub forward: Vec<VarIndex>,
    pub backward: Vec<VarIndex>,
}

/// The fixed set of constraint kinds a working model may contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    Linear(LinearConstraint),
    BoolOr(BoolOr),
    BoolAnd(BoolAnd),
    AtMostOne(AtMostOne),
    ExactlyOne(ExactlyOne),
    BoolXor(BoolXor),
    IntProd(IntProd),
    IntDiv(IntDiv),
    IntMod(IntMod),
    Element(Element),
    Table(Table),
    Automaton(Automaton),
    Interval(Interval),
    NoOverlap(NoOverlap),
    NoOverlap2D(NoOverlap2D),
    Cumulative(Cumulative),
    Circuit(Circuit),
    Routes(Routes),
    Reservoir(Reservoir),
    AllDifferent(AllDifferent),
    Inverse(Inverse),
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::BoolOr(_) => "bool_or",
            Self::BoolAnd(_) => "bool_and",
            Self::AtMostOne(_) => "at_most_one",
            Self::ExactlyOne(_) => "exactly_one",
            Self::BoolXor(_) => "bool_xor",
            Self::IntProd(_) => "int_prod",
            Self::IntDiv(_) => "int_div",
            Self::IntMod(_) => "int_mod",
            Self::Element(_) => "element",
            Self::Table(_) => "table",
            Self::Automaton(_) => "automaton",
            Self::Interval(_) => "interval",
            Self::NoOverlap(_) => "no_overlap",
            Self::NoOverlap2D(_) => "no_overlap_2d",
            Self::Cumulative(_) => "cumulative",
            Self::Circuit(_) => "circuit",
            Self::Routes(_) => "routes",
            Self::Reservoir(_) => "reservoir",
            Self::AllDifferent(_) => "all_different",
            Self::Inverse(_) => "inverse",
        }
    }
}

/// A constraint: `kind` holds iff every literal of `enforcement` is true.
/// An empty enforcement list means the constraint is unconditional.
///
/// A `None` kind denotes a removed/cleared constraint: its index is kept
/// (tombstoned) so constraint indices remain stable for the lifetime of a
/// presolve run, matching the teacher's treatment of removed clauses as
/// still-addressable, emptied, slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub kind: Option<ConstraintKind>,
    pub enforcement: Vec<Literal>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, enforcement: Vec<Literal>) -> Self {
        Constraint {
            kind: Some(kind),
            enforcement,
        }
    }

    pub fn unconditional(kind: ConstraintKind) -> Self {
        Constraint::new(kind, Vec::new())
    }

    pub fn removed() -> Self {
        Constraint {
            kind: None,
            enforcement: Vec::new(),
        }
    }

    pub fn is_removed(&self) -> bool {
        self.kind.is_none()
    }

    pub fn remove(&mut self) {
        self.kind = None;
        self.enforcement.clear();
    }

    /// Every variable this constraint's body and enforcement literals touch.
    /// Used to populate/update `var_to_constraints`.
    pub fn footprint(&self) -> Vec<VarIndex> {
        let mut vars: Vec<VarIndex> = self.enforcement.iter().map(|l| l.atom()).collect();
        if let Some(kind) = &self.kind {
            vars.extend(kind.body_vars());
        }
        vars.sort();
        vars.dedup();
        vars
    }
}

impl ConstraintKind {
    /// Every variable referenced by this kind's own body, excluding a
    /// constraint's enforcement literals (those belong to [`Constraint`],
    /// not the kind). Used both by [`Constraint::footprint`] and by
    /// postsolve, which needs to tell a mapping entry's body variables
    /// apart from its enforcement so it can reconstruct the one variable a
    /// rule left unpinned.
    pub fn body_vars(&self) -> Vec<VarIndex> {
        let mut vars = Vec::new();
        match self {
            ConstraintKind::Linear(c) => vars.extend(c.expr.vars.iter().copied()),
            ConstraintKind::BoolOr(c) => vars.extend(c.literals.iter().map(|l| l.atom())),
            ConstraintKind::BoolAnd(c) => vars.extend(c.literals.iter().map(|l| l.atom())),
            ConstraintKind::AtMostOne(c) => vars.extend(c.literals.iter().map(|l| l.atom())),
            ConstraintKind::ExactlyOne(c) => vars.extend(c.literals.iter().map(|l| l.atom())),
            ConstraintKind::BoolXor(c) => vars.extend(c.literals.iter().map(|l| l.atom())),
            ConstraintKind::IntProd(c) => {
                vars.push(c.target.var);
                vars.extend(c.factors.iter().map(|f| f.var));
            }
            ConstraintKind::IntDiv(c) => {
                vars.push(c.target.var);
                vars.push(c.numerator.var);
                vars.push(c.denominator.var);
            }
            ConstraintKind::IntMod(c) => {
                vars.push(c.target.var);
                vars.push(c.numerator.var);
                vars.push(c.modulus.var);
            }
            ConstraintKind::Element(c) => {
                vars.push(c.index.var);
                vars.push(c.target.var);
                vars.extend(c.entries.iter().map(|e| e.var));
            }
            ConstraintKind::Table(c) => vars.extend(c.vars.iter().copied()),
            ConstraintKind::Automaton(c) => vars.extend(c.vars.iter().copied()),
            ConstraintKind::Interval(c) => {
                vars.push(c.start.var);
                vars.push(c.size.var);
                vars.push(c.end.var);
            }
            ConstraintKind::NoOverlap(_) => {}
            ConstraintKind::NoOverlap2D(_) => {}
            ConstraintKind::Cumulative(c) => {
                vars.push(c.capacity.var);
                vars.extend(c.demands.iter().map(|d| d.var));
            }
            ConstraintKind::Circuit(c) => vars.extend(c.arcs.iter().map(|(_, _, l)| l.atom())),
            ConstraintKind::Routes(c) => vars.extend(c.arcs.iter().map(|(_, _, l)| l.atom())),
            ConstraintKind::Reservoir(c) => {
                for e in &c.events {
                    vars.push(e.time.var);
                    if let Some(lit) = e.active {
                        vars.push(lit.atom());
                    }
                }
            }
            ConstraintKind::AllDifferent(c) => vars.extend(c.exprs.iter().map(|e| e.var)),
            ConstraintKind::Inverse(c) => {
                vars.extend(c.forward.iter().copied());
                vars.extend(c.backward.iter().copied());
            }
        }
        vars
    }
}
