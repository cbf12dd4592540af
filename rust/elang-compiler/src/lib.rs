//! elang-compiler
//!
//! Constraint-based type inference and overload resolution for elang.
//! Expressions are unified against contextual expectations; overloaded
//! call sites narrow progressively as argument evidence accumulates.

pub mod analysis;

pub use analysis::evaluator::Evaluator;
pub use analysis::factory::Factory;
pub use analysis::method_resolver::MethodResolver;
pub use analysis::type_resolver::TypeResolver;
pub use analysis::values::{Value, ValueId};
pub use analysis::variable_tracker::VariableTracker;
