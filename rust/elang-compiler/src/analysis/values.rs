//! Type-inference values.
//!
//! A closed sum type: every constraint the resolver manipulates is one
//! of these variants. Values live in the [`Factory`](super::factory::Factory)
//! arena and are addressed by [`ValueId`]; literal and null values are
//! interned there, so id equality doubles as type equality for ground
//! values.

use elang_core::ast::{ExprId, NodeRef};
use elang_core::sm::{MethodId, TypeId};

/// Handle to a value in the factory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone)]
pub enum Value {
    /// Universal top: unifies to the other operand.
    Any,

    /// Bottom: a contradiction. Unification failure is `Empty`, never a
    /// panic or an exception.
    Empty,

    /// Error sentinel carrying the offending AST node. Substituted for
    /// failed sub-expressions so resolution continues without cascading.
    Invalid { node: NodeRef },

    /// A concrete semantic type. Interned per type.
    Literal { ty: TypeId },

    /// The `null` literal with its inferred base value. Interned per base.
    Null { value: ValueId },

    /// A type variable with union-find linkage. The root of a parent
    /// chain holds the authoritative value.
    Variable {
        node: NodeRef,
        parent: ValueId,
        rank: u32,
        value: ValueId,
    },

    /// An open call site with its surviving candidate methods. The
    /// method list only ever shrinks.
    Call {
        ast_call: ExprId,
        methods: Vec<MethodId>,
    },

    /// The type of one argument position of an open call; narrows as the
    /// call's method list shrinks.
    Argument {
        call_value: ValueId,
        position: usize,
    },

    /// A conjunction of union values (always two or more) that must all
    /// remain satisfiable.
    And { union_values: Vec<ValueId> },
}

impl Value {
    /// Union values are the two variants exposing a method list.
    pub fn is_union_value(&self) -> bool {
        matches!(self, Value::Call { .. } | Value::Argument { .. })
    }
}
