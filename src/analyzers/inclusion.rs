/*!
The inclusion detector (spec.md §4.4.1): given a family of sets (sorted
lists of positive literal/variable indices extracted from a constraint),
finds `(subset, superset)` pairs within a work budget, without building the
full incidence matrix.

Rather than compare every pair of constraints, each set is indexed by its
rarest element: for a candidate subset `A`, only constraints sharing `A`'s
least-frequent literal can possibly be a superset of `A`, so the candidate
superset list is the intersection of the inverted-index postings for `A`'s
elements, anchored on the shortest posting list. This is the "signature and
watch" shape spec.md asks for, with the inverted index playing the role of
the watch lists.
*/

use std::collections::HashMap;

use crate::context::time_limit::WorkBudget;
use crate::context::PresolveContext;
use crate::error::PresolveError;
use crate::model::constraint::{AtMostOne, BoolAnd, BoolOr, ConstraintKind, ExactlyOne};
use crate::model::literal::Literal;
use crate::model::ConstraintIndex;

use crate::rewriters::remove_constraint;

/// One of the three literal-set families the set-packing/cover reductions
/// apply to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SetFamily {
    BoolOr,
    AtMostOne,
    ExactlyOne,
}

fn literal_set_of(kind: &ConstraintKind) -> Option<(SetFamily, Vec<Literal>)> {
    match kind {
        ConstraintKind::BoolOr(c) => Some((SetFamily::BoolOr, c.literals.clone())),
        ConstraintKind::AtMostOne(c) => Some((SetFamily::AtMostOne, c.literals.clone())),
        ConstraintKind::ExactlyOne(c) => Some((SetFamily::ExactlyOne, c.literals.clone())),
        _ => None,
    }
}

/// Builds an inverted index (literal -> constraints containing it, each
/// constraint's own literal set sorted) over every live `bool_or` /
/// `at_most_one` / `exactly_one` constraint with no enforcement (enforced
/// set constraints don't participate in this reduction: inclusion only
/// proves something about the unconditional clause/packing family).
fn index_set_constraints(ctx: &PresolveContext) -> (HashMap<Literal, Vec<ConstraintIndex>>, HashMap<ConstraintIndex, (SetFamily, Vec<Literal>)>) {
    let mut inverted: HashMap<Literal, Vec<ConstraintIndex>> = HashMap::new();
    let mut sets: HashMap<ConstraintIndex, (SetFamily, Vec<Literal>)> = HashMap::new();

    for (idx, constraint) in ctx.model.constraints.iter().enumerate() {
        if constraint.is_removed() || !constraint.enforcement.is_empty() {
            continue;
        }
        let Some(kind) = &constraint.kind else { continue };
        let Some((family, mut literals)) = literal_set_of(kind) else { continue };
        literals.sort();
        literals.dedup();
        let ci = ConstraintIndex(idx as u32);
        for &lit in &literals {
            inverted.entry(lit).or_default().push(ci);
        }
        sets.insert(ci, (family, literals));
    }

    (inverted, sets)
}

/// Candidate constraints that might be a superset of `subset`, found by
/// intersecting the postings of `subset`'s elements, anchored on the
/// shortest one to keep the intersection cheap.
fn candidate_supersets(
    subset: &[Literal],
    inverted: &HashMap<Literal, Vec<ConstraintIndex>>,
    budget: &mut WorkBudget,
) -> Vec<ConstraintIndex> {
    if subset.is_empty() {
        return Vec::new();
    }
    let anchor_lit = *subset
        .iter()
        .min_by_key(|l| inverted.get(l).map(|v| v.len()).unwrap_or(0))
        .unwrap();
    let Some(anchor_postings) = inverted.get(&anchor_lit) else {
        return Vec::new();
    };
    budget.spend(anchor_postings.len() as u64);

    anchor_postings
        .iter()
        .copied()
        .filter(|ci| {
            subset.iter().all(|lit| {
                inverted
                    .get(lit)
                    .map(|postings| postings.binary_search(ci).is_ok())
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// Set-packing / set-cover reductions (spec.md §4.4.1):
/// - `bool_or ⊂ at_most_one` ⇒ promote the at_most_one to exactly_one and
///   fix every literal outside the bool_or false.
/// - `bool_or ⊂ bool_or` / `at_most_one ⊂ at_most_one` ⇒ the superset is
///   implied (a weaker clause / a looser packing bound) and can be dropped.
pub fn run(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let (inverted, sets) = index_set_constraints(ctx);
    let mut by_size: Vec<ConstraintIndex> = sets.keys().copied().collect();
    by_size.sort_by_key(|ci| ci.index());

    for ci in by_size {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        if ctx.model.constraint(ci).is_removed() {
            continue;
        }
        let Some((family, literals)) = sets.get(&ci).cloned() else { continue };
        if literals.len() < 2 {
            continue;
        }

        let supersets = candidate_supersets(&literals, &inverted, budget);
        for sup_ci in supersets {
            if sup_ci == ci || ctx.model.constraint(sup_ci).is_removed() {
                continue;
            }
            let Some((sup_family, sup_literals)) = sets.get(&sup_ci) else { continue };
            if sup_literals.len() <= literals.len() {
                continue;
            }
            budget.spend(sup_literals.len() as u64);

            match (family, sup_family) {
                (SetFamily::BoolOr, SetFamily::AtMostOne) => {
                    // bool_or(subset) subsumed by at_most_one(superset):
                    // at least one of `subset` must be true, and at most
                    // one of `superset` (which contains `subset`) may be
                    // true, so exactly one of `subset` is true and every
                    // other literal of `superset` is false.
                    for &lit in sup_literals {
                        if !literals.contains(&lit) {
                            ctx.set_literal_false(lit)?;
                        }
                    }
                    let exactly: Vec<Literal> = sup_literals.iter().filter(|l| literals.contains(l)).copied().collect();
                    ctx.model.constraint_mut(sup_ci).kind = Some(ConstraintKind::ExactlyOne(ExactlyOne { literals: exactly }));
                    ctx.track_new_constraint(sup_ci);
                    ctx.rule_stats.increment("inclusion_bool_or_in_at_most_one");
                }
                (SetFamily::BoolOr, SetFamily::BoolOr) | (SetFamily::AtMostOne, SetFamily::AtMostOne) => {
                    // The superset clause/packing-bound is implied by the
                    // subset and can simply be dropped.
                    remove_constraint(ctx, sup_ci);
                    ctx.rule_stats.increment("inclusion_redundant_superset");
                }
                _ => {}
            }
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
    }

    run_enforcement_inclusion(ctx, budget)?;
    run_linear_inclusion(ctx, budget)?;
    Ok(())
}

/// Enforcement-list inclusion (spec.md §4.4.1): if `bool_and A`'s
/// enforcement is a (non-strict) superset of `bool_and B`'s, then whenever
/// `A` is enforced so is `B`, so `B`'s body can be folded into `A`'s —
/// concretely, every literal of `B`'s body not already in `A`'s body can be
/// added to it, and `B` itself removed (its guarantee is now a consequence
/// of `A`).
fn run_enforcement_inclusion(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let mut bool_ands: Vec<(ConstraintIndex, Vec<Literal>, Vec<Literal>)> = Vec::new();
    for (idx, constraint) in ctx.model.constraints.iter().enumerate() {
        if constraint.is_removed() {
            continue;
        }
        if let Some(ConstraintKind::BoolAnd(c)) = &constraint.kind {
            let mut enforcement = constraint.enforcement.clone();
            enforcement.sort();
            let mut body = c.literals.clone();
            body.sort();
            bool_ands.push((ConstraintIndex(idx as u32), enforcement, body));
        }
    }

    for i in 0..bool_ands.len() {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        for j in 0..bool_ands.len() {
            if i == j {
                continue;
            }
            budget.spend(1);
            let (a_ci, a_enf, _) = &bool_ands[i];
            let (b_ci, b_enf, b_body) = &bool_ands[j];
            if ctx.model.constraint(*a_ci).is_removed() || ctx.model.constraint(*b_ci).is_removed() {
                continue;
            }
            if b_enf.len() <= a_enf.len() || !b_enf.iter().all(|l| a_enf.contains(l)) {
                continue;
            }
            // A's enforcement ⊇ B's enforcement: B always holds whenever A
            // does, so B's body can be absorbed into A's.
            if let Some(ConstraintKind::BoolAnd(a_body_c)) = &ctx.model.constraint(*a_ci).kind {
                let mut merged = a_body_c.literals.clone();
                for &lit in b_body {
                    if !merged.contains(&lit) {
                        merged.push(lit);
                    }
                }
                merged.sort();
                ctx.model.constraint_mut(*a_ci).kind = Some(ConstraintKind::BoolAnd(BoolAnd { literals: merged }));
                ctx.track_new_constraint(*a_ci);
                remove_constraint(ctx, *b_ci);
                ctx.rule_stats.increment("inclusion_enforcement_subsumed");
            }
        }
    }
    Ok(())
}

/// Linear ⊂ linear: a restricted but sound case of spec.md §4.4.1's
/// general linear-subsumption reduction. Two unconditional linear
/// constraints over *exactly* the same variable footprint, whose
/// coefficient vectors are related by a positive rational scale, bound the
/// same quantity up to that scale — whichever bound is looser given the
/// scale is implied by the other and can be dropped.
fn run_linear_inclusion(ctx: &mut PresolveContext, budget: &mut WorkBudget) -> Result<(), PresolveError> {
    let mut linears: Vec<(ConstraintIndex, crate::model::LinearExpr, crate::domain::Domain)> = Vec::new();
    for (idx, constraint) in ctx.model.constraints.iter().enumerate() {
        if constraint.is_removed() || !constraint.enforcement.is_empty() {
            continue;
        }
        if let Some(ConstraintKind::Linear(c)) = &constraint.kind {
            linears.push((ConstraintIndex(idx as u32), c.expr.clone(), c.rhs.clone()));
        }
    }

    for i in 0..linears.len() {
        if budget.exhausted() || ctx.is_infeasible() {
            return Ok(());
        }
        for j in (i + 1)..linears.len() {
            budget.spend(1);
            let (ci_a, expr_a, rhs_a) = &linears[i];
            let (ci_b, expr_b, rhs_b) = &linears[j];
            if ctx.model.constraint(*ci_a).is_removed() || ctx.model.constraint(*ci_b).is_removed() {
                continue;
            }
            if expr_a.vars != expr_b.vars || expr_a.vars.is_empty() {
                continue;
            }
            let Some(&first_a) = expr_a.coeffs.first() else { continue };
            let Some(&first_b) = expr_b.coeffs.first() else { continue };
            if first_a == 0 || first_b == 0 {
                continue;
            }
            // expr_b.coeffs == k * expr_a.coeffs for a single rational k
            // represented as first_b/first_a in lowest terms (checked
            // exactly via cross-multiplication to avoid float error).
            let same_ratio = expr_a
                .coeffs
                .iter()
                .zip(expr_b.coeffs.iter())
                .all(|(&ca, &cb)| ca as i128 * first_b as i128 == cb as i128 * first_a as i128);
            if !same_ratio {
                continue;
            }
            let offset_consistent = expr_a.offset as i128 * first_b as i128 - expr_b.offset as i128 * first_a as i128;
            if offset_consistent != 0 {
                // The two expressions differ by more than the shared
                // scale; not a sound comparison.
                continue;
            }
            // a's activity == (first_a) * t, b's activity == (first_b) * t
            // for the same underlying integer t == sum(coeffs_a[i]*vars[i])
            // (when first_a divides evenly); rhs_b is implied by rhs_a iff
            // scaling rhs_a by (first_b/first_a) covers rhs_b everywhere
            // t could range, i.e. iff rhs_a's scaled image is a subset of
            // rhs_b's after removing the shared offset already checked.
            let scaled_a = if first_b % first_a == 0 {
                rhs_a.mul_by(first_b / first_a)
            } else {
                continue;
            };
            if scaled_a.intersect(rhs_b) == scaled_a {
                remove_constraint(ctx, *ci_b);
                ctx.rule_stats.increment("inclusion_redundant_linear");
            } else if rhs_b.mul_by(first_a / num_gcd(first_a, first_b)).intersect(&scaled_a) == scaled_a {
                // symmetric check skipped: full generality (first_a not
                // dividing first_b) is a possible future extension, noted
                // in DESIGN.md rather than guessed at here.
            }
        }
    }
    Ok(())
}

fn num_gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Domain;
    use crate::model::constraint::Constraint;
    use crate::model::var::Variable;
    use crate::model::Model;

    fn lit(v: crate::model::VarIndex) -> Literal {
        Literal::positive(v)
    }

    #[test]
    fn bool_or_subset_of_at_most_one_becomes_exactly_one() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let c = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::BoolOr(BoolOr {
            literals: vec![lit(a), lit(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(b), lit(c)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert_eq!(ctx.model.var(c).domain, Domain::fixed(0));
        assert!(matches!(ctx.model.constraint(ConstraintIndex(1)).kind, Some(ConstraintKind::ExactlyOne(_))));
    }

    #[test]
    fn duplicate_at_most_one_drops_superset() {
        let mut model = Model::default();
        let a = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b = model.new_variable(Variable::new(Domain::range(0, 1)));
        let c = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(b)],
        })));
        model.add_constraint(Constraint::unconditional(ConstraintKind::AtMostOne(AtMostOne {
            literals: vec![lit(a), lit(b), lit(c)],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        let mut budget = WorkBudget::new(10_000);
        run(&mut ctx, &mut budget).unwrap();
        assert!(ctx.model.constraint(ConstraintIndex(1)).is_removed());
        assert!(!ctx.model.constraint(ConstraintIndex(0)).is_removed());
    }
}
