/*!
The presolve context: the single struct every rewriter and analyzer borrows
to read and mutate the working model, per spec.md §4.2.

Rewriters never touch [`Model`] fields directly except through the narrow
operations in [`ops`] — every mutation that can affect soundness (shrinking a
domain, fixing a value, recording an affine relation, removing a variable)
goes through one of those methods so it can update the incidence index, push
a work-queue entry, and append to the mapping model in the same place,
instead of each rewriter repeating that bookkeeping.
*/

pub mod affine;
pub mod ops;
pub mod time_limit;

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::Config;
use crate::generic::sparse_set::SparseSet;
use crate::generic::MinimalPCG32;
use crate::model::{ConstraintIndex, Literal, MappingModel, Model, VarIndex};

use affine::AffineStore;
use rule_stats::RuleStats;

pub mod rule_stats;

/// Ties together everything a presolve run needs: the working model, the
/// bookkeeping structures rewriters and analyzers consult, and a work queue
/// driving the fixed-point loop.
pub struct PresolveContext {
    pub model: Model,
    pub mapping: MappingModel,
    pub affine: AffineStore,
    pub rule_stats: RuleStats,
    pub config: Config,
    pub rng: MinimalPCG32,

    /// `var_to_constraints[v.index()]` lists every constraint whose
    /// footprint includes `v`, kept current by [`ops`] as constraints are
    /// added, rewritten, or removed.
    var_to_constraints: Vec<Vec<ConstraintIndex>>,

    /// Constraint indices waiting to be re-examined by the driver, plus a
    /// parallel membership bitset so a constraint is never queued twice.
    queue: VecDeque<ConstraintIndex>,
    in_queue: Vec<bool>,

    /// Variables whose domain shrank since the last time every constraint
    /// touching them was re-examined (spec.md §4.5).
    modified_domains: SparseSet<VarIndex>,

    /// Variables whose constraint degree dropped low enough to be worth a
    /// fresh look by the inclusion/duplicate analyzers (spec.md §4.5).
    var_with_reduced_small_degree: SparseSet<VarIndex>,

    /// Set once a rewrite proves the model has no solution. Checked by the
    /// driver after every operation; once set, the driver stops rewriting
    /// and the caller gets back [`crate::model::infeasible_model`].
    infeasible: bool,

    /// A lazily-created variable fixed to `1`, reused by
    /// [`ops::PresolveContext::get_or_create_var_value_encoding`] whenever a
    /// constant-true literal is needed instead of a fresh reification.
    pub(crate) true_var: Option<VarIndex>,

    /// `interval` constraints for which the `start + size = end` sync
    /// constraint has already been synthesized, so repeated fixed-point
    /// visits to the same `interval` don't keep emitting duplicates (the
    /// duplicate detector runs periodically, not after every single rule
    /// application, so relying on it alone would let the model grow
    /// without bound between sweeps).
    synced_intervals: HashSet<ConstraintIndex>,

    /// Materialized `(var, value) -> literal` value-literal encodings, so a
    /// Boolean already known to mean `var == value` (recognized by
    /// [`crate::analyzers::encoding`], or synthesized once by
    /// [`ops::PresolveContext::get_or_create_var_value_encoding`]) is reused
    /// rather than re-synthesized on a later request for the same pair.
    value_encodings: HashMap<(VarIndex, i64), Literal>,
}

impl PresolveContext {
    pub fn new(model: Model, config: Config, seed: u64) -> Self {
        use rand::SeedableRng;

        let num_vars = model.variables.len();
        let num_constraints = model.constraints.len();

        let mut ctx = PresolveContext {
            model,
            mapping: MappingModel::default(),
            affine: AffineStore::default(),
            rule_stats: RuleStats::default(),
            config,
            rng: MinimalPCG32::from_seed(seed.to_le_bytes()),
            var_to_constraints: vec![Vec::new(); num_vars],
            queue: VecDeque::with_capacity(num_constraints),
            in_queue: vec![false; num_constraints],
            modified_domains: SparseSet::default(),
            var_with_reduced_small_degree: SparseSet::default(),
            infeasible: false,
            true_var: None,
            synced_intervals: HashSet::new(),
            value_encodings: HashMap::new(),
        };

        for idx in 0..num_constraints {
            let ci = ConstraintIndex(idx as u32);
            for v in ctx.model.constraint(ci).footprint() {
                ctx.register_footprint(v, ci);
            }
        }

        let mut initial_order: Vec<ConstraintIndex> = (0..num_constraints).map(|idx| ConstraintIndex(idx as u32)).collect();
        if ctx.config.permute_presolve_constraint_order.value {
            ctx.rng.shuffle(&mut initial_order);
        }
        for ci in initial_order {
            ctx.enqueue(ci);
        }

        ctx
    }

    fn register_footprint(&mut self, var: VarIndex, ci: ConstraintIndex) {
        if var.index() >= self.var_to_constraints.len() {
            self.var_to_constraints.resize(var.index() + 1, Vec::new());
        }
        let slot = &mut self.var_to_constraints[var.index()];
        if !slot.contains(&ci) {
            slot.push(ci);
        }
    }

    /// Grows the incidence index to cover a freshly-created variable with
    /// no constraints touching it yet.
    pub(crate) fn grow_incidence_index(&mut self, new_len: usize) {
        if new_len > self.var_to_constraints.len() {
            self.var_to_constraints.resize(new_len, Vec::new());
        }
    }

    pub fn constraints_touching(&self, var: VarIndex) -> &[ConstraintIndex] {
        &self.var_to_constraints[var.index()]
    }

    /// Registers a freshly-added constraint's footprint and queues it.
    pub fn track_new_constraint(&mut self, ci: ConstraintIndex) {
        if ci.index() >= self.in_queue.len() {
            self.in_queue.resize(ci.index() + 1, false);
        }
        let footprint = self.model.constraint(ci).footprint();
        for v in footprint {
            self.register_footprint(v, ci);
        }
        self.enqueue(ci);
    }

    pub fn enqueue(&mut self, ci: ConstraintIndex) {
        if self.in_queue[ci.index()] {
            return;
        }
        self.in_queue[ci.index()] = true;
        self.queue.push_back(ci);
    }

    pub fn dequeue(&mut self) -> Option<ConstraintIndex> {
        let ci = self.queue.pop_front()?;
        self.in_queue[ci.index()] = false;
        Some(ci)
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Requeues every constraint touching `var`, used after its domain
    /// shrinks so every constraint gets a chance to propagate the tighter
    /// bound.
    pub fn requeue_constraints_touching(&mut self, var: VarIndex) {
        let touching = self.var_to_constraints[var.index()].clone();
        for ci in touching {
            self.enqueue(ci);
        }
    }

    pub fn mark_domain_modified(&mut self, var: VarIndex) {
        self.modified_domains.insert(var);
    }

    pub fn take_modified_domains(&mut self) -> Vec<VarIndex> {
        self.modified_domains.drain_sorted()
    }

    pub fn mark_reduced_small_degree(&mut self, var: VarIndex) {
        self.var_with_reduced_small_degree.insert(var);
    }

    pub fn take_reduced_small_degree(&mut self) -> Vec<VarIndex> {
        self.var_with_reduced_small_degree.drain_sorted()
    }

    pub fn mark_infeasible(&mut self, reason: impl Into<String>) {
        if !self.infeasible {
            log::debug!(target: crate::misc::log::targets::DRIVER, "infeasible: {}", reason.into());
        }
        self.infeasible = true;
    }

    pub fn is_infeasible(&self) -> bool {
        self.infeasible
    }

    /// Records that `ci`'s `start + size = end` sync constraint has been
    /// synthesized, returning `true` the first time (caller should
    /// synthesize) and `false` on every later call.
    pub fn mark_interval_synced(&mut self, ci: ConstraintIndex) -> bool {
        self.synced_intervals.insert(ci)
    }

    /// A previously-materialized literal for `var == value`, if one has
    /// already been synthesized or recognized.
    pub fn cached_value_encoding(&self, var: VarIndex, value: i64) -> Option<Literal> {
        self.value_encodings.get(&(var, value)).copied()
    }

    /// Records that `lit` means `var == value`, so later requests for the
    /// same pair reuse it instead of synthesizing a fresh reification.
    /// First write wins: a pair already cached keeps its original literal.
    pub fn cache_value_encoding(&mut self, var: VarIndex, value: i64, lit: Literal) {
        self.value_encodings.entry((var, value)).or_insert(lit);
    }

    pub fn degree(&self, var: VarIndex) -> usize {
        self.var_to_constraints[var.index()]
            .iter()
            .filter(|ci| !self.model.constraint(**ci).is_removed())
            .count()
    }
}
