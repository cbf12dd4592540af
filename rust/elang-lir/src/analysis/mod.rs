//! Derived analyses over the CFG: dominator trees, use-def lists, and
//! register usage queries consumed by the allocator.

pub mod dominators;
pub mod use_def;
pub mod usage;
