//! Type inference engine.
//!
//! The pieces, from the bottom up:
//!
//! - [`values`]: the tagged value hierarchy constraints are made of.
//! - [`factory`]: arena and interning for values, union-find for
//!   type variables, the union-value operations.
//! - [`evaluator`]: unification and collapse-to-ground evaluation.
//! - [`method_resolver`]: arity filtering of method groups.
//! - [`variable_tracker`]: read/write accounting and storage-class
//!   classification for locals.
//! - [`type_resolver`]: the AST walk that drives everything.

pub mod evaluator;
pub mod factory;
pub mod method_resolver;
pub mod type_resolver;
pub mod values;
pub mod variable_tracker;
