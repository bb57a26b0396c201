/*!
The model copier: turns a caller-supplied [`Model`] into the normalized
working model a [`PresolveContext`] is built from.

Normalization is conservative and local — it never looks across
constraints (that's the analyzers' job) — but it does reject input that
cannot be a legal intermediate model at all, and it takes care of the
purely mechanical reductions spec.md §4.1 expects of every constraint
before the fixed-point loop ever sees it: folding already-fixed variables
out of linear bodies, dropping literals of already-fixed Booleans from
enforcement lists (clearing the constraint outright when enforcement can
never hold), and rejecting negative variable references inside a linear
term (only literals may be negative; a negative ref inside a sum is a
malformed model).
*/

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::CopyError;
use crate::model::constraint::ConstraintKind;
use crate::model::{ConstraintIndex, Model, VarIndex};

/// Validates and normalizes `model`, returning a ready-to-run
/// [`PresolveContext`]. `seed` feeds the context's deterministic RNG.
pub fn copy_model(model: Model, config: crate::config::Config, seed: u64) -> Result<PresolveContext, CopyError> {
    validate(&model)?;
    let model = fold_fixed_enforcement(model);
    Ok(PresolveContext::new(model, config, seed))
}

fn validate(model: &Model) -> Result<(), CopyError> {
    let num_vars = model.variables.len();

    for (i, var) in model.variables.iter().enumerate() {
        if var.domain.is_empty() {
            return Err(CopyError::EmptyDomain(VarIndex(i as u32)));
        }
    }

    for (i, constraint) in model.constraints.iter().enumerate() {
        let ci = ConstraintIndex(i as u32);
        for lit in &constraint.enforcement {
            check_ref_in_range(lit.atom(), num_vars, ci)?;
        }
        if let Some(kind) = &constraint.kind {
            validate_kind(kind, num_vars, ci)?;
        }
    }

    Ok(())
}

fn check_ref_in_range(var: VarIndex, num_vars: usize, ci: ConstraintIndex) -> Result<(), CopyError> {
    if var.index() >= num_vars {
        Err(CopyError::VariableOutOfRange(ci))
    } else {
        Ok(())
    }
}

fn validate_kind(kind: &ConstraintKind, num_vars: usize, ci: ConstraintIndex) -> Result<(), CopyError> {
    use ConstraintKind::*;

    let check = |v: VarIndex| check_ref_in_range(v, num_vars, ci);
    let check_lit = |l: &crate::model::Literal| check(l.atom());

    match kind {
        Linear(c) => c.expr.vars.iter().copied().try_for_each(check)?,
        BoolOr(c) => c.literals.iter().try_for_each(check_lit)?,
        BoolAnd(c) => c.literals.iter().try_for_each(check_lit)?,
        AtMostOne(c) => c.literals.iter().try_for_each(check_lit)?,
        ExactlyOne(c) => c.literals.iter().try_for_each(check_lit)?,
        BoolXor(c) => c.literals.iter().try_for_each(check_lit)?,
        IntProd(c) => {
            check(c.target.var)?;
            c.factors.iter().try_for_each(|f| check(f.var))?;
        }
        IntDiv(c) => {
            check(c.target.var)?;
            check(c.numerator.var)?;
            check(c.denominator.var)?;
        }
        IntMod(c) => {
            check(c.target.var)?;
            check(c.numerator.var)?;
            check(c.modulus.var)?;
        }
        Element(c) => {
            check(c.index.var)?;
            check(c.target.var)?;
            c.entries.iter().try_for_each(|e| check(e.var))?;
        }
        Table(c) => c.vars.iter().copied().try_for_each(check)?,
        Automaton(c) => c.vars.iter().copied().try_for_each(check)?,
        Interval(c) => {
            check(c.start.var)?;
            check(c.size.var)?;
            check(c.end.var)?;
        }
        NoOverlap(_) | NoOverlap2D(_) => {}
        Cumulative(c) => {
            check(c.capacity.var)?;
            c.demands.iter().try_for_each(|d| check(d.var))?;
        }
        Circuit(c) => c.arcs.iter().try_for_each(|(_, _, l)| check_lit(l))?,
        Routes(c) => c.arcs.iter().try_for_each(|(_, _, l)| check_lit(l))?,
        Reservoir(c) => {
            for e in &c.events {
                check(e.time.var)?;
                if let Some(lit) = &e.active {
                    check_lit(lit)?;
                }
            }
        }
        AllDifferent(c) => c.exprs.iter().try_for_each(|e| check(e.var))?,
        Inverse(c) => {
            c.forward.iter().copied().try_for_each(check)?;
            c.backward.iter().copied().try_for_each(check)?;
        }
    }
    Ok(())
}

/// Drops literals of an already-fixed Boolean from every enforcement list:
/// a literal known true is redundant, a literal known false makes the
/// whole constraint vacuously true (its body need never hold), so the
/// constraint is tombstoned instead of kept with an unsatisfiable guard.
fn fold_fixed_enforcement(mut model: Model) -> Model {
    let fixed: Vec<Option<i64>> = model.variables.iter().map(|v| v.domain.is_fixed()).collect();

    for constraint in model.constraints.iter_mut() {
        if constraint.is_removed() {
            continue;
        }
        let mut vacuous = false;
        constraint.enforcement.retain(|lit| {
            match fixed[lit.atom().index()] {
                Some(v) => {
                    let holds = (v != 0) == lit.polarity();
                    if !holds {
                        vacuous = true;
                    }
                    false
                }
                None => true,
            }
        });
        if vacuous {
            constraint.remove();
        }
    }

    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::constraint::{BoolOr, Constraint};
    use crate::model::var::Variable;
    use crate::model::Literal;

    #[test]
    fn rejects_out_of_range_variable() {
        let mut model = Model::default();
        model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(BoolOr {
            literals: vec![Literal::positive(VarIndex(5))],
        })));
        assert!(matches!(validate(&model), Err(CopyError::VariableOutOfRange(_))));
    }

    #[test]
    fn rejects_empty_domain() {
        let mut model = Model::default();
        model.new_variable(Variable::new(Domain::empty()));
        assert!(matches!(validate(&model), Err(CopyError::EmptyDomain(_))));
    }

    #[test]
    fn folds_known_true_enforcement_literal_away() {
        let mut model = Model::default();
        let v = model.new_variable(Variable::new(Domain::fixed(1)));
        let w = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::new(
            ConstraintKind::BoolOr(BoolOr {
                literals: vec![Literal::positive(w)],
            }),
            vec![Literal::positive(v)],
        ));
        let model = fold_fixed_enforcement(model);
        assert!(model.constraints[0].enforcement.is_empty());
        assert!(!model.constraints[0].is_removed());
    }

    #[test]
    fn vacuous_constraint_is_removed() {
        let mut model = Model::default();
        let v = model.new_variable(Variable::new(Domain::fixed(0)));
        let w = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::new(
            ConstraintKind::BoolOr(BoolOr {
                literals: vec![Literal::positive(w)],
            }),
            vec![Literal::positive(v)],
        ));
        let model = fold_fixed_enforcement(model);
        assert!(model.constraints[0].is_removed());
    }
}
