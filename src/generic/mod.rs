//! Small generic building blocks used across the presolver: a source of
//! randomness and an index-keyed work queue.

pub mod minimal_pcg;
pub mod sparse_set;

pub use minimal_pcg::MinimalPCG32;
