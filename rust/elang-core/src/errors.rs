//! Front-end diagnostic codes.
//!
//! Type-resolution failures are reported, never raised: the resolver
//! records a [`Diagnostic`] against the offending node and substitutes
//! an invalid value so analysis continues without cascading.

use crate::ast::NodeRef;
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

/// Semantic error codes surfaced through the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
pub enum ErrorCode {
    TypeResolverArrayAccessArray,
    TypeResolverArrayAccessIndex,
    TypeResolverArrayAccessRank,
    TypeResolverAssignmentLeftValue,
    TypeResolverBinaryOperationEquality,
    TypeResolverBinaryOperationNumeric,
    TypeResolverBinaryOperationShift,
    TypeResolverCalleeNotSupported,
    TypeResolverConditionalNotMatch,
    TypeResolverExpressionInvalid,
    TypeResolverExpressionNotBool,
    TypeResolverExpressionNotYetImplemented,
    TypeResolverIncrementExpressionPlace,
    TypeResolverIncrementExpressionType,
    TypeResolverMethodNoMatch,
    TypeResolverUnaryOperationType,
    TypeResolverVariableNotResolved,
}

/// One reported error: a code plus the node it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{code} at {node:?}")]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub node: NodeRef,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, node: impl Into<NodeRef>) -> Self {
        Self {
            code,
            node: node.into(),
        }
    }
}
