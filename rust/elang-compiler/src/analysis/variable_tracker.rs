//! Read/write accounting for locals and parameters.
//!
//! Each registered variable carries counters for the contexts it is
//! read or written in; when inference finishes, the counters decide the
//! variable's storage class and its tracked value must ground to a
//! concrete type.

use super::evaluator::Evaluator;
use super::factory::Factory;
use super::values::{Value, ValueId};
use elang_core::ast::VarId;
use elang_core::sm::{Semantic, StorageClass};
use elang_core::{CompilationSession, ErrorCode};
use std::collections::BTreeMap;

#[derive(Debug)]
struct TrackingData {
    heap_get_count: u32,
    heap_set_count: u32,
    local_get_count: u32,
    local_set_count: u32,
    non_local_get_count: u32,
    non_local_set_count: u32,
    value: ValueId,
}

impl TrackingData {
    fn new(value: ValueId) -> Self {
        Self {
            heap_get_count: 0,
            heap_set_count: 0,
            local_get_count: 0,
            local_set_count: 0,
            non_local_get_count: 0,
            non_local_set_count: 0,
            value,
        }
    }

    fn compute_storage_class(&self) -> StorageClass {
        if self.non_local_set_count > 0 {
            return StorageClass::Heap;
        }
        if self.non_local_get_count > 0 {
            return StorageClass::NonLocal;
        }
        if self.local_set_count > 0 || self.heap_set_count > 0 {
            return StorageClass::Local;
        }
        if self.heap_get_count > 0 || self.local_get_count > 0 {
            return StorageClass::ReadOnly;
        }
        // Declared but never touched.
        StorageClass::Void
    }
}

pub struct VariableTracker {
    // BTreeMap keeps finish() deterministic across runs.
    variable_map: BTreeMap<VarId, TrackingData>,
}

impl VariableTracker {
    pub fn new() -> Self {
        Self {
            variable_map: BTreeMap::new(),
        }
    }

    /// Called once per local/parameter before any use is recorded.
    pub fn register_variable(&mut self, variable: VarId, value: ValueId) {
        debug_assert!(!self.variable_map.contains_key(&variable));
        self.variable_map.insert(variable, TrackingData::new(value));
    }

    pub fn is_registered(&self, variable: VarId) -> bool {
        self.variable_map.contains_key(&variable)
    }

    pub fn record_get(&mut self, variable: VarId) -> ValueId {
        let data = self
            .variable_map
            .get_mut(&variable)
            .unwrap_or_else(|| unreachable!("get of unregistered variable"));
        data.local_get_count += 1;
        data.value
    }

    pub fn record_set(&mut self, variable: VarId) -> ValueId {
        let data = self
            .variable_map
            .get_mut(&variable)
            .unwrap_or_else(|| unreachable!("set of unregistered variable"));
        data.local_set_count += 1;
        data.value
    }

    /// Ground every tracked value and publish semantic variable nodes.
    /// A value that did not resolve to a literal reports
    /// `TypeResolverVariableNotResolved`.
    pub fn finish(&self, session: &CompilationSession, factory: &mut Factory) {
        for (&variable, data) in &self.variable_map {
            let mut evaluator = Evaluator::new(factory, &session.semantics);
            let evaluated = evaluator.evaluate(data.value);
            let ty = match factory.value(evaluated) {
                Value::Literal { ty } => *ty,
                _ => {
                    session.error(ErrorCode::TypeResolverVariableNotResolved, variable);
                    continue;
                }
            };
            session.set_semantic_of(
                variable,
                Semantic::Variable {
                    ty,
                    storage: data.compute_storage_class(),
                    ast: variable,
                },
            );
        }
    }
}

impl Default for VariableTracker {
    fn default() -> Self {
        Self::new()
    }
}
