/*!
Configuration of a presolve run.

All control parameters from spec.md §6 live here as [`ConfigOption`] fields,
following the teacher's [`Config`](crate) aggregation pattern rather than
loose function arguments: each option records its own name (for
diagnostics), a min/max range, and its current value.
*/

/// A single configuration knob: a name (for diagnostics/CLI surfaces built
/// on top of this crate), an allowed range, and the current value.
#[derive(Clone, Copy, Debug)]
pub struct ConfigOption<T> {
    pub name: &'static str,
    pub min: T,
    pub max: T,
    pub value: T,
}

impl<T: PartialOrd + Copy> ConfigOption<T> {
    pub fn set(&mut self, value: T) -> bool {
        if value < self.min || value > self.max {
            false
        } else {
            self.value = value;
            true
        }
    }
}

/// The primary configuration structure for a presolve run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Caps work done by each inclusion-style analyzer.
    pub presolve_inclusion_work_limit: ConfigOption<u64>,

    /// `0` disables affine substitution, `1` enables it cautiously.
    pub presolve_substitution_level: ConfigOption<u32>,

    /// Cap on at-most-one clique merging.
    pub merge_at_most_one_work_limit: ConfigOption<u64>,

    /// Cap on interval (no-overlap) clique merging.
    pub merge_no_overlap_work_limit: ConfigOption<u64>,

    /// Time budget handed to probing, in milliseconds (0 = unbounded).
    pub probing_deterministic_time_limit_ms: ConfigOption<u64>,

    /// Disables reductions that would remove equally-feasible solutions.
    pub keep_all_feasible_solutions_in_presolve: ConfigOption<bool>,

    /// Disables reductions that break a declared symmetry group.
    pub keep_symmetry_in_presolve: ConfigOption<bool>,

    /// Allows post-expansion synthesis of all-different cliques from `x !=
    /// y` detections.
    pub infer_all_diffs: ConfigOption<bool>,

    /// Shuffle the initial constraint queue using the configured RNG.
    pub permute_presolve_constraint_order: ConfigOption<bool>,

    /// Hard bound on total rule applications.
    pub debug_max_num_presolve_operations: ConfigOption<u64>,

    /// Skip copying human-readable names.
    pub ignore_names: ConfigOption<bool>,

    /// Bound on the outer fixed-point loop (spec.md §4.5: `KMaxNumLoops`).
    pub max_num_loops: ConfigOption<u32>,

    /// Number of dual-bound-strengthening passes to run per fixed-point
    /// call before giving up on further deletions.
    pub dual_bound_strengthening_passes: ConfigOption<u32>,

    /// Number of variable-domination passes to run per fixed-point call.
    pub var_domination_passes: ConfigOption<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            presolve_inclusion_work_limit: ConfigOption {
                name: "presolve_inclusion_work_limit",
                min: 0,
                max: u64::MAX,
                value: 100_000_000,
            },

            presolve_substitution_level: ConfigOption {
                name: "presolve_substitution_level",
                min: 0,
                max: 1,
                value: 1,
            },

            merge_at_most_one_work_limit: ConfigOption {
                name: "merge_at_most_one_work_limit",
                min: 0,
                max: u64::MAX,
                value: 100_000_000,
            },

            merge_no_overlap_work_limit: ConfigOption {
                name: "merge_no_overlap_work_limit",
                min: 0,
                max: u64::MAX,
                value: 100_000_000,
            },

            probing_deterministic_time_limit_ms: ConfigOption {
                name: "probing_deterministic_time_limit",
                min: 0,
                max: u64::MAX,
                value: 10_000,
            },

            keep_all_feasible_solutions_in_presolve: ConfigOption {
                name: "keep_all_feasible_solutions_in_presolve",
                min: false,
                max: true,
                value: false,
            },

            keep_symmetry_in_presolve: ConfigOption {
                name: "keep_symmetry_in_presolve",
                min: false,
                max: true,
                value: false,
            },

            infer_all_diffs: ConfigOption {
                name: "infer_all_diffs",
                min: false,
                max: true,
                value: false,
            },

            permute_presolve_constraint_order: ConfigOption {
                name: "permute_presolve_constraint_order",
                min: false,
                max: true,
                value: false,
            },

            debug_max_num_presolve_operations: ConfigOption {
                name: "debug_max_num_presolve_operations",
                min: 0,
                max: u64::MAX,
                value: u64::MAX,
            },

            ignore_names: ConfigOption {
                name: "ignore_names",
                min: false,
                max: true,
                value: false,
            },

            max_num_loops: ConfigOption {
                name: "max_num_loops",
                min: 1,
                max: u32::MAX,
                value: 1000,
            },

            dual_bound_strengthening_passes: ConfigOption {
                name: "dual_bound_strengthening_passes",
                min: 0,
                max: u32::MAX,
                value: 10,
            },

            var_domination_passes: ConfigOption {
                name: "var_domination_passes",
                min: 0,
                max: u32::MAX,
                value: 2,
            },
        }
    }
}

impl Config {
    /// The safe default for the interaction spec.md §9 leaves as an open
    /// question: disable affine substitution whenever a symmetry group is
    /// kept, since the interaction between the two is not fully specified.
    pub fn effective_substitution_level(&self) -> u32 {
        if self.keep_symmetry_in_presolve.value {
            0
        } else {
            self.presolve_substitution_level.value
        }
    }
}
