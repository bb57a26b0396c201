/*!
Probing (spec.md §4.4.3): fixes a literal, runs a cheap propagation pass
over the Boolean skeleton of the model, and records whatever else became
forced or equivalent as a result. spec.md frames the actual propagation
engine as "an external collaborator this module treats as a black box" —
[`BooleanEngine`] is that seam; [`UnitPropagationEngine`] is the only
implementation this crate ships, a plain unit-propagation closure over the
`bool_or`/`bool_and` skeleton, since no full SAT solver is in scope here.
*/

use std::collections::{HashMap, HashSet, VecDeque};

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::ConstraintKind;
use crate::model::literal::Literal;
use crate::model::VarIndex;

/// The probing engine seam: given a literal to assume true, returns every
/// literal forced true by unit propagation from that assumption (not
/// including the assumption itself), or `None` if the assumption is
/// immediately contradictory.
pub trait BooleanEngine {
    fn propagate_from(&self, assumption: Literal) -> Option<Vec<Literal>>;
}

/// A unit-propagation engine over every live, unconditional `bool_or` /
/// `bool_and` constraint, built fresh from the current model each time
/// [`run`] is called — cheap enough for the small number of probes this
/// pass performs (spec.md's `probing_deterministic_time_limit_ms` bounds
/// total probing work, not per-probe cost).
pub struct UnitPropagationEngine {
    /// `watch[lit]` lists every clause (as a full literal list) that
    /// contains `lit`, so propagating `lit` only inspects clauses it can
    /// actually affect.
    watch: HashMap<Literal, Vec<Vec<Literal>>>,
}

impl UnitPropagationEngine {
    pub fn from_context(ctx: &PresolveContext) -> Self {
        let mut watch: HashMap<Literal, Vec<Vec<Literal>>> = HashMap::new();
        for constraint in &ctx.model.constraints {
            if constraint.is_removed() || !constraint.enforcement.is_empty() {
                continue;
            }
            let clause = match &constraint.kind {
                Some(ConstraintKind::BoolOr(c)) => Some(c.literals.clone()),
                Some(ConstraintKind::BoolAnd(c)) => {
                    // Each literal of an unconditional bool_and is its own
                    // unit clause.
                    for &lit in &c.literals {
                        watch.entry(lit).or_default().push(vec![lit]);
                    }
                    None
                }
                _ => None,
            };
            if let Some(clause) = clause {
                for &lit in &clause {
                    watch.entry(lit).or_default().push(clause.clone());
                }
            }
        }
        UnitPropagationEngine { watch }
    }
}

impl BooleanEngine for UnitPropagationEngine {
    fn propagate_from(&self, assumption: Literal) -> Option<Vec<Literal>> {
        let mut assigned: HashMap<VarIndex, bool> = HashMap::new();
        let mut forced = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(assumption);
        assigned.insert(assumption.atom(), assumption.polarity());

        while let Some(lit) = queue.pop_front() {
            // Every clause containing `not(lit)` now has one fewer
            // candidate literal; if it's down to a single undetermined
            // literal, that literal is forced.
            let Some(clauses) = self.watch.get(&(-lit)) else { continue };
            for clause in clauses {
                let mut undetermined: Option<Literal> = None;
                let mut satisfied = false;
                for &l in clause {
                    match assigned.get(&l.atom()) {
                        Some(&v) if v == l.polarity() => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => continue,
                        None => {
                            if undetermined.is_some() {
                                undetermined = None;
                                break;
                            }
                            undetermined = Some(l);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                let Some(unit) = undetermined else {
                    // clause fully falsified: the assumption is contradictory.
                    return None;
                };
                match assigned.get(&unit.atom()) {
                    Some(&v) if v != unit.polarity() => return None,
                    Some(_) => continue,
                    None => {
                        assigned.insert(unit.atom(), unit.polarity());
                        forced.push(unit);
                        queue.push_back(unit);
                    }
                }
            }
        }
        Some(forced)
    }
}

/// Candidate literals to probe: every Boolean variable touched by at least
/// one `bool_or`/`bool_and`/`at_most_one`/`exactly_one`/`bool_xor`
/// constraint, in index order (spec.md §5's deterministic iteration).
fn probe_candidates(ctx: &PresolveContext) -> Vec<Literal> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for constraint in &ctx.model.constraints {
        if constraint.is_removed() {
            continue;
        }
        let lits: Vec<Literal> = match &constraint.kind {
            Some(ConstraintKind::BoolOr(c)) => c.literals.clone(),
            Some(ConstraintKind::BoolAnd(c)) => c.literals.clone(),
            Some(ConstraintKind::AtMostOne(c)) => c.literals.clone(),
            Some(ConstraintKind::ExactlyOne(c)) => c.literals.clone(),
            Some(ConstraintKind::BoolXor(c)) => c.literals.clone(),
            _ => continue,
        };
        for lit in lits {
            if ctx.model.var(lit.atom()).domain.is_fixed().is_some() {
                continue;
            }
            if seen.insert(lit.atom()) {
                out.push(Literal::positive(lit.atom()));
            }
        }
    }
    out
}

/// Probes each candidate variable in both polarities within `budget`:
/// - if probing one polarity is contradictory, the other polarity is
///   forced (spec.md's "dead-end probe fixes the variable").
/// - if the two polarities force the exact same set of other literals
///   (other than flipping sign of the atom itself), an equivalence between
///   the probed literal and that forced literal is recorded as an affine
///   (Boolean) relation.
pub fn run(ctx: &mut PresolveContext, engine: &dyn BooleanEngine, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let candidates = probe_candidates(ctx);

    for atom_lit in candidates {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        if ctx.model.var(atom_lit.atom()).domain.is_fixed().is_some() {
            continue;
        }
        budget.spend(1);

        let pos_result = engine.propagate_from(atom_lit);
        let neg_result = engine.propagate_from(-atom_lit);

        match (pos_result, neg_result) {
            (None, None) => {
                ctx.mark_infeasible(format!("probing {atom_lit} is contradictory under both polarities"));
                return Ok(());
            }
            (None, Some(_)) => {
                ctx.set_literal_false(atom_lit)?;
                ctx.rule_stats.increment("probing_forced_by_dead_end");
            }
            (Some(_), None) => {
                ctx.set_literal_true(atom_lit)?;
                ctx.rule_stats.increment("probing_forced_by_dead_end");
            }
            (Some(pos_forced), Some(neg_forced)) => {
                // A literal forced identically (same atom, same polarity
                // relative to the probe) under both polarities of the probe
                // is unconditionally true.
                for &lit in &pos_forced {
                    if neg_forced.contains(&lit) {
                        ctx.set_literal_true(lit)?;
                        ctx.rule_stats.increment("probing_forced_both_ways");
                    }
                }
                // If flipping the probe's polarity exactly flips one other
                // variable's forced polarity and nothing else, the two
                // variables are equivalent (or negated-equivalent).
                if pos_forced.len() == 1 && neg_forced.len() == 1 {
                    let p = pos_forced[0];
                    let n = neg_forced[0];
                    if p.atom() == n.atom() && p.atom() != atom_lit.atom() {
                        ctx.store_boolean_equality(atom_lit, p)?;
                        ctx.rule_stats.increment("probing_equivalence");
                    }
                }
            }
        }
        if ctx.is_infeasible() {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Domain;
    use crate::model::constraint::{BoolOr, Constraint};
    use crate::model::var::Variable;
    use crate::model::Model;

    #[test]
    fn dead_end_probe_fixes_variable() {
        // (a or b), (not a or b): probing a=false forces b true via the
        // first clause's unit propagation once a is false... instead probe
        // the contradictory direction: (a or b), (not b). not b forces
        // nothing new, but a=false makes (a or b) unit on b, contradicting
        // (not b). So a must be true.
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(BoolOr {
            literals: vec![Literal::positive(a), Literal::positive(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolAnd(crate::model::constraint::BoolAnd {
            literals: vec![Literal::negative(b)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let engine = UnitPropagationEngine::from_context(&ctx);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &engine, &mut budget).unwrap();
        assert_eq!(ctx.model.var(a).domain.is_fixed(), Some(1));
    }

    #[test]
    fn equivalent_literals_become_affine_equal() {
        // (not a or b) and (a or not b) unconditionally => a <-> b.
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(BoolOr {
            literals: vec![Literal::negative(a), Literal::positive(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(BoolOr {
            literals: vec![Literal::positive(a), Literal::negative(b)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let engine = UnitPropagationEngine::from_context(&ctx);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &engine, &mut budget).unwrap();
        assert!(ctx.affine.is_reduced(a) || ctx.affine.is_reduced(b));
    }
}
