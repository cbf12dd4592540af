//! Read-only AST expression tree.
//!
//! Expressions arrive from the front end fully built; analysis passes
//! may attach semantics to nodes but never mutate the tree itself.
//! Nodes live in an arena and are addressed by [`ExprId`]; local and
//! parameter declarations are [`NamedNode`]s addressed by [`VarId`].
//! Integer ids double as stable keys for semantic side tables.

use crate::tokens::TokenKind;

/// Handle to an expression node in an [`AstArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Handle to a named declaration (local variable or parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A local variable or parameter declaration.
#[derive(Debug, Clone)]
pub struct NamedNode {
    pub name: String,
    pub is_parameter: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    ArrayAccess {
        array: ExprId,
        indexes: Vec<ExprId>,
    },
    Assignment {
        left: ExprId,
        right: ExprId,
    },
    BinaryOperation {
        op: TokenKind,
        left: ExprId,
        right: ExprId,
    },
    Call {
        callee: ExprId,
        arguments: Vec<ExprId>,
    },
    Conditional {
        condition: ExprId,
        true_expression: ExprId,
        false_expression: ExprId,
    },
    IncrementExpression {
        op: TokenKind,
        expression: ExprId,
    },
    Literal {
        token: TokenKind,
    },
    MemberAccess {
        container: ExprId,
        member: String,
    },
    NameReference {
        name: String,
    },
    ParameterReference {
        parameter: VarId,
    },
    UnaryOperation {
        op: TokenKind,
        expression: ExprId,
    },
    VariableReference {
        variable: VarId,
    },
}

/// Arena owning every expression and named node of one compilation.
#[derive(Debug, Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
    named: Vec<NamedNode>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn named(&self, id: VarId) -> &NamedNode {
        &self.named[id.0 as usize]
    }

    fn push(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    // ── Builders ────────────────────────────────────────────────────

    pub fn new_variable_decl(&mut self, name: &str) -> VarId {
        let id = VarId(self.named.len() as u32);
        self.named.push(NamedNode {
            name: name.to_string(),
            is_parameter: false,
        });
        id
    }

    pub fn new_parameter_decl(&mut self, name: &str) -> VarId {
        let id = VarId(self.named.len() as u32);
        self.named.push(NamedNode {
            name: name.to_string(),
            is_parameter: true,
        });
        id
    }

    pub fn new_array_access(&mut self, array: ExprId, indexes: Vec<ExprId>) -> ExprId {
        self.push(Expr::ArrayAccess { array, indexes })
    }

    pub fn new_assignment(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.push(Expr::Assignment { left, right })
    }

    pub fn new_binary_operation(&mut self, op: TokenKind, left: ExprId, right: ExprId) -> ExprId {
        debug_assert!(!op.is_literal());
        self.push(Expr::BinaryOperation { op, left, right })
    }

    pub fn new_call(&mut self, callee: ExprId, arguments: Vec<ExprId>) -> ExprId {
        self.push(Expr::Call { callee, arguments })
    }

    pub fn new_conditional(
        &mut self,
        condition: ExprId,
        true_expression: ExprId,
        false_expression: ExprId,
    ) -> ExprId {
        self.push(Expr::Conditional {
            condition,
            true_expression,
            false_expression,
        })
    }

    pub fn new_increment(&mut self, op: TokenKind, expression: ExprId) -> ExprId {
        self.push(Expr::IncrementExpression { op, expression })
    }

    pub fn new_literal(&mut self, token: TokenKind) -> ExprId {
        debug_assert!(token.is_literal());
        self.push(Expr::Literal { token })
    }

    pub fn new_member_access(&mut self, container: ExprId, member: &str) -> ExprId {
        self.push(Expr::MemberAccess {
            container,
            member: member.to_string(),
        })
    }

    pub fn new_name_reference(&mut self, name: &str) -> ExprId {
        self.push(Expr::NameReference {
            name: name.to_string(),
        })
    }

    pub fn new_parameter_reference(&mut self, parameter: VarId) -> ExprId {
        self.push(Expr::ParameterReference { parameter })
    }

    pub fn new_unary_operation(&mut self, op: TokenKind, expression: ExprId) -> ExprId {
        self.push(Expr::UnaryOperation { op, expression })
    }

    pub fn new_variable_reference(&mut self, variable: VarId) -> ExprId {
        self.push(Expr::VariableReference { variable })
    }

    /// Number of arguments at a call site; used for arity-based
    /// overload filtering.
    pub fn arity_of(&self, call: ExprId) -> usize {
        match self.expr(call) {
            Expr::Call { arguments, .. } => arguments.len(),
            _ => 0,
        }
    }
}

/// Key into semantic side tables: either an expression or a named node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Expr(ExprId),
    Name(VarId),
}

impl From<ExprId> for NodeRef {
    fn from(id: ExprId) -> Self {
        NodeRef::Expr(id)
    }
}

impl From<VarId> for NodeRef {
    fn from(id: VarId) -> Self {
        NodeRef::Name(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_read_back() {
        let mut arena = AstArena::new();
        let a = arena.new_literal(TokenKind::Int32Literal(1));
        let b = arena.new_literal(TokenKind::Int32Literal(2));
        let add = arena.new_binary_operation(TokenKind::Add, a, b);
        match arena.expr(add) {
            Expr::BinaryOperation { op, left, right } => {
                assert_eq!(*op, TokenKind::Add);
                assert_eq!(*left, a);
                assert_eq!(*right, b);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn call_arity() {
        let mut arena = AstArena::new();
        let callee = arena.new_name_reference("foo");
        let x = arena.new_literal(TokenKind::Int32Literal(3));
        let call = arena.new_call(callee, vec![x]);
        assert_eq!(arena.arity_of(call), 1);
    }
}
