//! Transformation passes over the LIR graph, in pipeline order:
//! architecture lowering, critical-edge removal, register assignment
//! (allocation, spilling, φ-expansion, stack layout, rewrite), and
//! post-allocation CFG cleanup.

pub mod allocation_pass;
pub mod clean;
pub mod critical_edges;
pub mod lowering_x64;
pub mod parallel_copy;
pub mod phi_expander;
pub mod register_allocator;
pub mod register_assignments;
pub mod spill_manager;
pub mod stack_allocator;
pub mod stack_assigner;
