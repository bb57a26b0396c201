/*!
The narrow operation set rewriters and analyzers use to mutate a
[`PresolveContext`](super::PresolveContext): every way a rule can shrink a
domain, fix a value, record an affine relation, or retire a variable funnels
through one of these methods, so the incidence index, work queue, and
mapping model stay consistent no matter which rule made the change.

Rewriters never reach into `ctx.model` to shrink a domain directly; they
call [`PresolveContext::intersect_domain`] instead.
*/

use crate::domain::Domain;
use crate::error::{AffineError, PresolveError};
use crate::model::constraint::{Constraint, ConstraintKind, LinearConstraint};
use crate::model::{ConstraintIndex, LinearExpr, Literal, VarIndex, VarState};

use super::PresolveContext;

impl PresolveContext {
    /// Intersects `var`'s domain with `new_domain`. Returns `Ok(true)` if the
    /// domain actually shrank (queuing touching constraints and recording
    /// the modification), `Ok(false)` if `new_domain` already held no new
    /// information, and marks the context infeasible (without an `Err`) if
    /// the result is empty — infeasibility is a context-wide flag rather
    /// than a propagated error, per spec.md §4.2.
    pub fn intersect_domain(&mut self, var: VarIndex, new_domain: &Domain) -> Result<bool, PresolveError> {
        let current = self.model.var(var).domain.clone();
        let narrowed = current.intersect(new_domain).relax_if_complex();
        if narrowed == current {
            return Ok(false);
        }
        if narrowed.is_empty() {
            self.mark_infeasible(format!("domain of {var} became empty"));
            self.model.var_mut(var).domain = narrowed;
            return Ok(true);
        }
        self.model.var_mut(var).domain = narrowed;
        self.mark_domain_modified(var);
        self.requeue_constraints_touching(var);
        Ok(true)
    }

    /// Fixes `var` to a single value: shorthand for intersecting with a
    /// singleton domain.
    pub fn fix_value(&mut self, var: VarIndex, value: i64) -> Result<bool, PresolveError> {
        self.intersect_domain(var, &Domain::fixed(value))
    }

    /// Forces `lit` true: fixes its underlying variable to 1 if `lit` is a
    /// positive reference, to 0 if negated.
    pub fn set_literal_true(&mut self, lit: Literal) -> Result<bool, PresolveError> {
        let target = if lit.polarity() { 1 } else { 0 };
        self.fix_value(lit.atom(), target)
    }

    /// Forces `lit` false: the complement of [`Self::set_literal_true`].
    pub fn set_literal_false(&mut self, lit: Literal) -> Result<bool, PresolveError> {
        self.set_literal_true(-lit)
    }

    /// Records `var = a*rep + b` and marks `var` affine-reduced. Does *not*
    /// rewrite any constraint bodies that still mention `var` — callers
    /// (the affine-substitution analyzer) are responsible for replacing
    /// `var` in every constraint touching it before calling this, since the
    /// store itself has no way to walk those constraints back.
    ///
    /// Every call that actually installs a fresh relation also pushes the
    /// resolved relation to the mapping model, so postsolve can recover
    /// `var` from its representative without consulting the affine store
    /// directly (spec.md §4.6 lists "every affine-relation store call" among
    /// the mapping model's writers). A call that turns out to be a no-op —
    /// `var` already reduced to the same relation, or the chain resolves to
    /// an identity — writes nothing.
    pub fn store_affine_relation(&mut self, var: VarIndex, a: i64, b: i64, rep: VarIndex) -> Result<(), PresolveError> {
        let already_reduced = self.affine.is_reduced(var);
        self.affine
            .add_relation(var, a, b, rep)
            .map_err(PresolveError::Affine)?;
        if already_reduced {
            return Ok(());
        }
        let Some(relation) = self.affine.relation_of(var) else {
            // Identity no-op: var already resolves to rep via an existing chain.
            return Ok(());
        };
        self.model.var_mut(var).state = VarState::AffineReduced;
        self.mark_reduced_small_degree(relation.rep);
        let defining = Constraint::unconditional(ConstraintKind::Linear(LinearConstraint {
            expr: LinearExpr {
                vars: vec![var, relation.rep],
                coeffs: vec![1, -relation.a],
                offset: -relation.b,
            },
            rhs: Domain::fixed(0),
        }));
        self.new_mapping_constraint(defining, "affine_relation");
        Ok(())
    }

    /// Eliminates `var` via the affine relation `var = a*rep + b` implied by
    /// `defining_ci` (an unconditional linear equality), substituting `rep`
    /// for `var` in every other live constraint that still mentions it
    /// before handing the relation to [`Self::store_affine_relation`].
    ///
    /// Returns `Ok(false)` and leaves the model untouched if `defining_ci`
    /// itself is conditional, or if `var` appears in another live
    /// constraint that isn't a plain `linear` body (an enforcement literal,
    /// or a non-linear constraint's `AffineExpr`/`Literal` slot) — widening
    /// one of those slots to a general linear combination is outside what
    /// this substitution engine attempts (see `DESIGN.md`).
    pub fn try_eliminate_via_affine_relation(
        &mut self,
        var: VarIndex,
        a: i64,
        b: i64,
        rep: VarIndex,
        defining_ci: ConstraintIndex,
    ) -> Result<bool, PresolveError> {
        if !self.model.constraint(defining_ci).enforcement.is_empty() {
            return Ok(false);
        }
        let touching: Vec<ConstraintIndex> = self
            .constraints_touching(var)
            .iter()
            .copied()
            .filter(|&ci| ci != defining_ci)
            .collect();

        for &ci in &touching {
            let constraint = self.model.constraint(ci);
            if constraint.is_removed() {
                continue;
            }
            if constraint.enforcement.iter().any(|l| l.atom() == var) {
                return Ok(false);
            }
            if !matches!(constraint.kind, Some(ConstraintKind::Linear(_))) {
                return Ok(false);
            }
        }

        for ci in touching {
            let constraint = self.model.constraint(ci);
            if constraint.is_removed() {
                continue;
            }
            if let Some(ConstraintKind::Linear(c)) = constraint.kind.clone() {
                let new_expr = c.expr.substitute(var, a, b, rep).canonicalize();
                self.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(LinearConstraint {
                    expr: new_expr,
                    rhs: c.rhs,
                }));
                self.track_new_constraint(ci);
            }
        }
        self.substitute_variable_in_objective(var, a, b, rep);
        self.store_affine_relation(var, a, b, rep)?;
        self.model.constraint_mut(defining_ci).remove();
        Ok(true)
    }

    /// As [`Self::try_eliminate_via_affine_relation`], but `var`'s value is
    /// an arbitrary linear combination of several other variables (a unit-
    /// coefficient term in a size->=3 equality) rather than a single
    /// representative, so `var` is retired outright (`VarState::Removed`)
    /// instead of folded into the affine store. Used by the cross-
    /// constraint affine-substitution analyzer; the two-variable case is
    /// handled inline by the linear rewriter via
    /// [`Self::try_eliminate_via_affine_relation`] instead.
    pub fn try_eliminate_via_linear_definition(
        &mut self,
        var: VarIndex,
        definition: &LinearExpr,
        defining_ci: ConstraintIndex,
    ) -> Result<bool, PresolveError> {
        if !self.model.constraint(defining_ci).enforcement.is_empty() {
            return Ok(false);
        }
        let touching: Vec<ConstraintIndex> = self
            .constraints_touching(var)
            .iter()
            .copied()
            .filter(|&ci| ci != defining_ci)
            .collect();

        for &ci in &touching {
            let constraint = self.model.constraint(ci);
            if constraint.is_removed() {
                continue;
            }
            if constraint.enforcement.iter().any(|l| l.atom() == var) {
                return Ok(false);
            }
            if !matches!(constraint.kind, Some(ConstraintKind::Linear(_))) {
                return Ok(false);
            }
        }

        for ci in touching {
            let constraint = self.model.constraint(ci);
            if constraint.is_removed() {
                continue;
            }
            if let Some(ConstraintKind::Linear(c)) = constraint.kind.clone() {
                let new_expr = c.expr.substitute_linear(var, definition).canonicalize();
                self.model.constraint_mut(ci).kind = Some(ConstraintKind::Linear(LinearConstraint {
                    expr: new_expr,
                    rhs: c.rhs,
                }));
                self.track_new_constraint(ci);
            }
        }
        self.substitute_variable_in_objective_via_definition(var, definition);

        let original = self.model.constraint(defining_ci).clone();
        self.new_mapping_constraint(original, "affine_substitution");
        self.model.var_mut(var).state = VarState::Removed;
        self.model.constraint_mut(defining_ci).remove();
        Ok(true)
    }

    /// Records that `a` and `b` denote the same Boolean value (`a <-> b`),
    /// expressed as the affine relation `atom(a) = ka*atom(b) + ba` where
    /// `ka`/`ba` account for each literal's polarity.
    pub fn store_boolean_equality(&mut self, a: Literal, b: Literal) -> Result<(), PresolveError> {
        if a.atom() == b.atom() {
            if a.polarity() != b.polarity() {
                self.mark_infeasible(format!("{a} and {b} both name the same variable with opposite polarity"));
            }
            return Ok(());
        }
        // atom(lit) = 1 when lit is true. Solve for atom(a) in terms of
        // atom(b): same polarity => atom(a) = atom(b); opposite polarity
        // => atom(a) = 1 - atom(b).
        let (ka, ba) = if a.polarity() == b.polarity() {
            (1, 0)
        } else {
            (-1, 1)
        };
        match self.store_affine_relation(a.atom(), ka, ba, b.atom()) {
            Ok(()) => Ok(()),
            Err(PresolveError::Affine(AffineError::Contradiction)) => {
                self.mark_infeasible(format!("{a} <-> {b} contradicts an existing relation"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrites the objective's linear expression so `var` no longer
    /// appears in it, substituting `a*rep + b` in its place. A no-op if the
    /// objective doesn't mention `var` or there is no objective.
    pub fn substitute_variable_in_objective(&mut self, var: VarIndex, a: i64, b: i64, rep: VarIndex) {
        if let Some(objective) = self.model.objective.as_mut() {
            objective.expr = objective.expr.substitute(var, a, b, rep);
        }
    }

    /// As [`Self::substitute_variable_in_objective`], but the replacement is
    /// an arbitrary linear expression rather than an affine map to a single
    /// representative — used by linear-constraint singleton elimination,
    /// where the eliminated variable's value depends on several others.
    pub fn substitute_variable_in_objective_via_definition(&mut self, var: VarIndex, definition: &crate::model::LinearExpr) {
        if let Some(objective) = self.model.objective.as_mut() {
            objective.expr = objective.expr.substitute_linear(var, definition);
        }
    }

    /// Appends a constraint to the mapping model, tagged with the rule name
    /// that produced it. This is the only way a rule may grow the mapping
    /// stream (spec.md §9's "narrow append-only interface").
    pub fn new_mapping_constraint(&mut self, constraint: Constraint, reason: &'static str) {
        self.mapping.push(constraint, reason);
    }

    /// Introduces a new working-model variable with the given domain,
    /// wiring it into the incidence index with no constraints touching it
    /// yet, and returns its index. Used by rules that synthesize an
    /// auxiliary variable (e.g. an `element` index encoding, a reified
    /// equality).
    pub fn new_variable_with_definition(&mut self, domain: Domain, name: Option<String>) -> VarIndex {
        let variable = match name {
            Some(name) => crate::model::var::Variable::named(domain, name),
            None => crate::model::var::Variable::new(domain),
        };
        let idx = self.model.new_variable(variable);
        self.grow_incidence_index(idx.index() + 1);
        idx
    }

    /// Returns a literal `enc` such that `enc` is true iff `var == value`,
    /// synthesizing a fresh reified half-constraint the first time this
    /// pair is requested. If `var`'s domain is already fixed the answer is
    /// known outright and no auxiliary variable is created. Callers that
    /// need to avoid re-synthesizing the same `(var, value)` pair on every
    /// call are expected to cache the result themselves (the
    /// encoding-extraction analyzer does this); this method only performs
    /// the synthesis step.
    pub fn get_or_create_var_value_encoding(&mut self, var: VarIndex, value: i64) -> Literal {
        let domain = self.model.var(var).domain.clone();
        if let Some(fixed) = domain.is_fixed() {
            let t = self.true_literal_var();
            return if fixed == value {
                Literal::positive(t)
            } else {
                Literal::negative(t)
            };
        }
        if !domain.contains(value) {
            let t = self.true_literal_var();
            return Literal::negative(t);
        }
        if let Some(lit) = self.cached_value_encoding(var, value) {
            return lit;
        }

        let enc_var = self.new_variable_with_definition(Domain::range(0, 1), None);
        let enc_lit = Literal::positive(enc_var);

        // enc -> (var == value): (not enc) or (var == value), modeled as a
        // linear equality enforced only when enc holds.
        let ci = self.model.add_constraint(Constraint::new(
            ConstraintKind::Linear(LinearConstraint {
                expr: crate::model::LinearExpr::single(var, 1, 0),
                rhs: Domain::fixed(value),
            }),
            vec![enc_lit],
        ));
        self.track_new_constraint(ci);
        self.cache_value_encoding(var, value, enc_lit);

        enc_lit
    }

    fn true_literal_var(&mut self) -> VarIndex {
        if let Some(v) = self.true_var {
            return v;
        }
        let v = self.new_variable_with_definition(Domain::fixed(1), None);
        self.true_var = Some(v);
        v
    }
}
