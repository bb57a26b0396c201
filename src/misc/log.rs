//! Log targets used throughout the library.
//!
//! Each subsystem logs under its own target so output can be filtered, e.g.
//! `RUST_LOG=linear=debug` to see only linear-rewriter activity.

/// String constants passed as the `target:` of `log` macro calls.
pub mod targets {
    pub const COPIER: &str = "copier";
    pub const LINEAR: &str = "linear";
    pub const BOOL_FAMILY: &str = "bool_family";
    pub const INT_ARITH: &str = "int_arith";
    pub const ELEMENT: &str = "element";
    pub const TABLE: &str = "table";
    pub const AUTOMATON: &str = "automaton";
    pub const SCHEDULING: &str = "scheduling";
    pub const GRAPH: &str = "graph";
    pub const RESERVOIR: &str = "reservoir";
    pub const ALL_DIFF: &str = "all_diff";
    pub const INCLUSION: &str = "inclusion";
    pub const DUPLICATE: &str = "duplicate";
    pub const PROBING: &str = "probing";
    pub const DOMINANCE: &str = "dominance";
    pub const CLIQUE: &str = "clique";
    pub const AFFINE_SUB: &str = "affine_sub";
    pub const DRIVER: &str = "driver";
    pub const POSTSOLVE: &str = "postsolve";
}
