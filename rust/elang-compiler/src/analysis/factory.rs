//! Value factory: arena, interning, union-find, union-value operations.

use super::values::{Value, ValueId};
use elang_core::ast::{ExprId, NodeRef};
use elang_core::sm::{MethodId, PredefinedName, SemanticFactory, TypeId};
use elang_core::CompilationSession;
use std::collections::HashMap;

/// Arena and interner for [`Value`]s.
///
/// The factory pre-interns the predefined numeric and boolean literal
/// values so the resolver can compare against them by id.
pub struct Factory {
    values: Vec<Value>,
    literal_cache: HashMap<TypeId, ValueId>,
    null_cache: HashMap<ValueId, ValueId>,

    any_value: ValueId,
    empty_value: ValueId,
    bool_value: ValueId,
    float32_value: ValueId,
    float64_value: ValueId,
    int16_value: ValueId,
    int32_value: ValueId,
    int64_value: ValueId,
    int8_value: ValueId,
    uint16_value: ValueId,
    uint32_value: ValueId,
    uint64_value: ValueId,
    uint8_value: ValueId,
}

impl Factory {
    pub fn new(session: &CompilationSession) -> Self {
        let mut factory = Factory {
            values: Vec::new(),
            literal_cache: HashMap::new(),
            null_cache: HashMap::new(),
            any_value: ValueId(0),
            empty_value: ValueId(0),
            bool_value: ValueId(0),
            float32_value: ValueId(0),
            float64_value: ValueId(0),
            int16_value: ValueId(0),
            int32_value: ValueId(0),
            int64_value: ValueId(0),
            int8_value: ValueId(0),
            uint16_value: ValueId(0),
            uint32_value: ValueId(0),
            uint64_value: ValueId(0),
            uint8_value: ValueId(0),
        };
        factory.any_value = factory.push(Value::Any);
        factory.empty_value = factory.push(Value::Empty);
        let predefined =
            |f: &mut Factory, name: PredefinedName| f.new_literal(session.predefined_type_of(name));
        factory.bool_value = predefined(&mut factory, PredefinedName::Bool);
        factory.float32_value = predefined(&mut factory, PredefinedName::Float32);
        factory.float64_value = predefined(&mut factory, PredefinedName::Float64);
        factory.int16_value = predefined(&mut factory, PredefinedName::Int16);
        factory.int32_value = predefined(&mut factory, PredefinedName::Int32);
        factory.int64_value = predefined(&mut factory, PredefinedName::Int64);
        factory.int8_value = predefined(&mut factory, PredefinedName::Int8);
        factory.uint16_value = predefined(&mut factory, PredefinedName::UInt16);
        factory.uint32_value = predefined(&mut factory, PredefinedName::UInt32);
        factory.uint64_value = predefined(&mut factory, PredefinedName::UInt64);
        factory.uint8_value = predefined(&mut factory, PredefinedName::UInt8);
        factory
    }

    fn push(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(value);
        id
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    // ── Interned singletons ─────────────────────────────────────────

    pub fn any_value(&self) -> ValueId {
        self.any_value
    }

    pub fn empty_value(&self) -> ValueId {
        self.empty_value
    }

    pub fn bool_value(&self) -> ValueId {
        self.bool_value
    }

    pub fn float32_value(&self) -> ValueId {
        self.float32_value
    }

    pub fn float64_value(&self) -> ValueId {
        self.float64_value
    }

    pub fn int16_value(&self) -> ValueId {
        self.int16_value
    }

    pub fn int32_value(&self) -> ValueId {
        self.int32_value
    }

    pub fn int64_value(&self) -> ValueId {
        self.int64_value
    }

    pub fn int8_value(&self) -> ValueId {
        self.int8_value
    }

    pub fn uint16_value(&self) -> ValueId {
        self.uint16_value
    }

    pub fn uint32_value(&self) -> ValueId {
        self.uint32_value
    }

    pub fn uint64_value(&self) -> ValueId {
        self.uint64_value
    }

    pub fn uint8_value(&self) -> ValueId {
        self.uint8_value
    }

    // ── Constructors ────────────────────────────────────────────────

    /// Interned: one literal value per semantic type.
    pub fn new_literal(&mut self, ty: TypeId) -> ValueId {
        if let Some(&id) = self.literal_cache.get(&ty) {
            return id;
        }
        let id = self.push(Value::Literal { ty });
        self.literal_cache.insert(ty, id);
        id
    }

    /// Interned: one null value per base value.
    pub fn new_null_value(&mut self, base: ValueId) -> ValueId {
        if let Some(&id) = self.null_cache.get(&base) {
            return id;
        }
        let id = self.push(Value::Null { value: base });
        self.null_cache.insert(base, id);
        id
    }

    pub fn new_invalid_value(&mut self, node: impl Into<NodeRef>) -> ValueId {
        self.push(Value::Invalid { node: node.into() })
    }

    pub fn new_variable(&mut self, node: impl Into<NodeRef>, value: ValueId) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value::Variable {
            node: node.into(),
            parent: id,
            rank: 0,
            value,
        });
        id
    }

    pub fn new_call_value(&mut self, ast_call: ExprId) -> ValueId {
        self.push(Value::Call {
            ast_call,
            methods: Vec::new(),
        })
    }

    pub fn new_argument(&mut self, call_value: ValueId, position: usize) -> ValueId {
        debug_assert!(matches!(self.value(call_value), Value::Call { .. }));
        self.push(Value::Argument {
            call_value,
            position,
        })
    }

    pub fn new_and_value(&mut self, union_values: Vec<ValueId>) -> ValueId {
        debug_assert!(union_values.len() >= 2);
        debug_assert!(union_values
            .iter()
            .all(|&u| self.value(u).is_union_value()));
        self.push(Value::And { union_values })
    }

    // ── Union-value operations ──────────────────────────────────────

    pub fn is_union_value(&self, id: ValueId) -> bool {
        self.value(id).is_union_value()
    }

    /// Surviving candidate methods of a union value. An argument shares
    /// its call's list.
    pub fn methods_of(&self, id: ValueId) -> Vec<MethodId> {
        match self.value(id) {
            Value::Call { methods, .. } => methods.clone(),
            Value::Argument { call_value, .. } => self.methods_of(*call_value),
            _ => unreachable!("methods_of on non-union value"),
        }
    }

    /// Shrink the method list. An argument writes through to its call.
    pub fn set_methods(&mut self, id: ValueId, methods: Vec<MethodId>) {
        let target = match self.value(id) {
            Value::Call { .. } => id,
            Value::Argument { call_value, .. } => *call_value,
            _ => unreachable!("set_methods on non-union value"),
        };
        match &mut self.values[target.0 as usize] {
            Value::Call { methods: slot, .. } => *slot = methods,
            _ => unreachable!("argument not backed by a call value"),
        }
    }

    /// The type a method contributes through this union: its return
    /// type for a call, the parameter type at this position for an
    /// argument (a rest parameter covers every trailing position).
    pub fn value_for(
        &self,
        id: ValueId,
        method_id: MethodId,
        semantics: &SemanticFactory,
    ) -> TypeId {
        match self.value(id) {
            Value::Call { .. } => semantics.method(method_id).return_type(),
            Value::Argument { position, .. } => {
                let params = semantics.method(method_id).parameters();
                debug_assert!(!params.is_empty());
                let index = (*position).min(params.len() - 1);
                params[index].ty
            }
            _ => unreachable!("value_for on non-union value"),
        }
    }

    /// Whether `method` remains usable when this union is constrained to
    /// `ty`. The subtype direction differs between the two variants: a
    /// call's return type must flow out into `ty`, while an argument
    /// position must accept a `ty` flowing in.
    pub fn can_use(
        &self,
        id: ValueId,
        method_id: MethodId,
        ty: TypeId,
        semantics: &SemanticFactory,
    ) -> bool {
        match self.value(id) {
            Value::Call { .. } => {
                semantics.is_subtype_of(self.value_for(id, method_id, semantics), ty)
            }
            Value::Argument { .. } => {
                semantics.is_subtype_of(ty, self.value_for(id, method_id, semantics))
            }
            _ => unreachable!("can_use on non-union value"),
        }
    }

    // ── Union-find over type variables ──────────────────────────────

    /// Root of a variable's parent chain, with path compression.
    pub fn find(&mut self, id: ValueId) -> ValueId {
        let parent = match self.value(id) {
            Value::Variable { parent, .. } => *parent,
            _ => unreachable!("find on non-variable"),
        };
        if parent == id {
            return id;
        }
        let root = self.find(parent);
        if let Value::Variable { parent: slot, .. } = &mut self.values[id.0 as usize] {
            *slot = root;
        }
        root
    }

    /// Union by rank. Afterwards both chains share one root.
    pub fn union(&mut self, a: ValueId, b: ValueId) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank_of(root_a);
        let rank_b = self.rank_of(root_b);
        let (child, parent) = if rank_a < rank_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        if let Value::Variable { parent: slot, .. } = &mut self.values[child.0 as usize] {
            *slot = parent;
        }
        if rank_a == rank_b {
            if let Value::Variable { rank, .. } = &mut self.values[parent.0 as usize] {
                *rank += 1;
            }
        }
    }

    fn rank_of(&self, id: ValueId) -> u32 {
        match self.value(id) {
            Value::Variable { rank, .. } => *rank,
            _ => unreachable!("rank_of on non-variable"),
        }
    }

    /// Current value of a variable's root.
    pub fn variable_value(&mut self, id: ValueId) -> ValueId {
        let root = self.find(id);
        match self.value(root) {
            Value::Variable { value, .. } => *value,
            _ => unreachable!(),
        }
    }

    /// Store `value` into a variable's root.
    pub fn set_variable_value(&mut self, id: ValueId, value: ValueId) {
        let root = self.find(id);
        if let Value::Variable { value: slot, .. } = &mut self.values[root.0 as usize] {
            *slot = value;
        }
    }

    /// Replace an and-value's branch list (two or more survivors).
    pub fn set_union_values(&mut self, id: ValueId, union_values: Vec<ValueId>) {
        debug_assert!(union_values.len() >= 2);
        match &mut self.values[id.0 as usize] {
            Value::And {
                union_values: slot, ..
            } => *slot = union_values,
            _ => unreachable!("set_union_values on non-and value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elang_core::sm::PredefinedName;

    #[test]
    fn literals_are_interned() {
        let session = CompilationSession::new();
        let mut factory = Factory::new(&session);
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let a = factory.new_literal(int32);
        let b = factory.new_literal(int32);
        assert_eq!(a, b);
        assert_eq!(a, factory.int32_value());
    }

    #[test]
    fn null_values_are_interned_per_base() {
        let session = CompilationSession::new();
        let mut factory = Factory::new(&session);
        let base = factory.int32_value();
        let n1 = factory.new_null_value(base);
        let n2 = factory.new_null_value(base);
        let n3 = factory.new_null_value(factory.int64_value());
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);
    }

    #[test]
    fn union_find_by_rank() {
        let mut session = CompilationSession::new();
        let node = session.ast.new_variable_decl("x");
        let mut factory = Factory::new(&session);
        let any = factory.any_value();
        let v1 = factory.new_variable(node, any);
        let v2 = factory.new_variable(node, any);
        let v3 = factory.new_variable(node, any);
        factory.union(v1, v2);
        factory.union(v2, v3);
        let root = factory.find(v1);
        assert_eq!(factory.find(v2), root);
        assert_eq!(factory.find(v3), root);
    }
}
