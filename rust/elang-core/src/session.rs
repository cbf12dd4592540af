//! Compilation session.
//!
//! One session per compilation: it owns the AST arena, the semantic
//! arena, the predefined-type table, the semantic side table that maps
//! AST nodes to semantic nodes, and the diagnostic sink. Sessions are
//! single-threaded; the sink and side table use interior mutability so
//! analyses can record results while holding shared borrows of the
//! arenas.

use crate::ast::{AstArena, NodeRef};
use crate::errors::{Diagnostic, ErrorCode};
use crate::sm::{PredefinedName, Semantic, SemanticFactory, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use strum::IntoEnumIterator;

pub struct CompilationSession {
    pub ast: AstArena,
    pub semantics: SemanticFactory,
    predefined: HashMap<PredefinedName, TypeId>,
    semantic_map: RefCell<HashMap<NodeRef, Semantic>>,
    errors: RefCell<Vec<Diagnostic>>,
}

impl CompilationSession {
    /// Create a session with the predefined classes installed,
    /// including the numeric widening lattice (int8 ≤ int16 ≤ int32 ≤
    /// int64 and likewise for unsigned and float widths).
    pub fn new() -> Self {
        let mut semantics = SemanticFactory::new();
        let mut predefined = HashMap::new();

        let object = semantics.new_class("Object", vec![]);
        predefined.insert(PredefinedName::Object, object);

        let class = |semantics: &mut SemanticFactory, name: PredefinedName, bases: Vec<TypeId>| {
            let id = semantics.new_class(&name.to_string(), bases);
            (name, id)
        };

        for (name, id) in [
            class(&mut semantics, PredefinedName::Bool, vec![object]),
            class(&mut semantics, PredefinedName::Char, vec![object]),
            class(&mut semantics, PredefinedName::String, vec![object]),
            class(&mut semantics, PredefinedName::Void, vec![object]),
        ] {
            predefined.insert(name, id);
        }

        let float64 = semantics.new_class("Float64", vec![object]);
        let float32 = semantics.new_class("Float32", vec![float64]);
        predefined.insert(PredefinedName::Float64, float64);
        predefined.insert(PredefinedName::Float32, float32);

        let int64 = semantics.new_class("Int64", vec![object]);
        let int32 = semantics.new_class("Int32", vec![int64]);
        let int16 = semantics.new_class("Int16", vec![int32]);
        let int8 = semantics.new_class("Int8", vec![int16]);
        predefined.insert(PredefinedName::Int64, int64);
        predefined.insert(PredefinedName::Int32, int32);
        predefined.insert(PredefinedName::Int16, int16);
        predefined.insert(PredefinedName::Int8, int8);

        let uint64 = semantics.new_class("UInt64", vec![object]);
        let uint32 = semantics.new_class("UInt32", vec![uint64]);
        let uint16 = semantics.new_class("UInt16", vec![uint32]);
        let uint8 = semantics.new_class("UInt8", vec![uint16]);
        predefined.insert(PredefinedName::UInt64, uint64);
        predefined.insert(PredefinedName::UInt32, uint32);
        predefined.insert(PredefinedName::UInt16, uint16);
        predefined.insert(PredefinedName::UInt8, uint8);

        debug_assert!(PredefinedName::iter().all(|name| predefined.contains_key(&name)));

        Self {
            ast: AstArena::new(),
            semantics,
            predefined,
            semantic_map: RefCell::new(HashMap::new()),
            errors: RefCell::new(Vec::new()),
        }
    }

    pub fn predefined_type_of(&self, name: PredefinedName) -> TypeId {
        self.predefined[&name]
    }

    // ── Semantic side table ─────────────────────────────────────────

    pub fn semantic_of(&self, node: impl Into<NodeRef>) -> Option<Semantic> {
        self.semantic_map.borrow().get(&node.into()).cloned()
    }

    pub fn set_semantic_of(&self, node: impl Into<NodeRef>, semantic: Semantic) {
        self.semantic_map.borrow_mut().insert(node.into(), semantic);
    }

    /// The type an AST node resolved to, if its semantic carries one.
    pub fn value_of(&self, node: impl Into<NodeRef>) -> Option<TypeId> {
        self.semantic_of(node).and_then(|s| s.type_of())
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    pub fn error(&self, code: ErrorCode, node: impl Into<NodeRef>) {
        self.errors.borrow_mut().push(Diagnostic::new(code, node));
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.errors.borrow().clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }
}

impl Default for CompilationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenKind;

    #[test]
    fn predefined_lattice() {
        let session = CompilationSession::new();
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let int64 = session.predefined_type_of(PredefinedName::Int64);
        let uint32 = session.predefined_type_of(PredefinedName::UInt32);
        assert!(session.semantics.is_subtype_of(int32, int64));
        assert!(!session.semantics.is_subtype_of(int64, int32));
        assert!(!session.semantics.is_subtype_of(uint32, int64));
    }

    #[test]
    fn semantic_side_table() {
        let mut session = CompilationSession::new();
        let lit = session.ast.new_literal(TokenKind::Int32Literal(7));
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        session.set_semantic_of(
            lit,
            Semantic::Literal {
                ty: int32,
                token: TokenKind::Int32Literal(7),
            },
        );
        assert_eq!(session.value_of(lit), Some(int32));
    }

    #[test]
    fn error_sink_preserves_order() {
        let mut session = CompilationSession::new();
        let a = session.ast.new_literal(TokenKind::TrueLiteral);
        let b = session.ast.new_literal(TokenKind::FalseLiteral);
        session.error(ErrorCode::TypeResolverExpressionNotBool, a);
        session.error(ErrorCode::TypeResolverExpressionInvalid, b);
        let errors = session.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, ErrorCode::TypeResolverExpressionNotBool);
    }
}
