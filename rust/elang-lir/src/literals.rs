//! The literal pool.
//!
//! Heap constants referenced from instructions get dense
//! `Literal(index)` handles; the pool maps handles back to the data at
//! emission time.

use crate::function::{BlockId, FunctionId};
use crate::value::{Value, ValueKind, ValueSize, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    BasicBlock(BlockId),
    Float32(f32),
    Float64(f64),
    Function(FunctionId),
    Int32(i32),
    Int64(i64),
    String(String),
}

/// Maps `Literal(index)` values to pooled constants. Handles are
/// one-based so data zero never aliases a real literal.
#[derive(Debug, Default)]
pub struct LiteralMap {
    literals: Vec<Literal>,
}

impl LiteralMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_value(&self, ty: ValueType, size: ValueSize) -> Value {
        let data = (self.literals.len() + 1) as i32;
        debug_assert!(Value::can_be_immediate(i64::from(data)));
        Value::new(ty, size, ValueKind::Literal, data)
    }

    pub fn register(&mut self, literal: Literal) -> Value {
        let (ty, size) = match &literal {
            Literal::Float32(_) => (ValueType::Float, ValueSize::Size32),
            Literal::Float64(_) => (ValueType::Float, ValueSize::Size64),
            Literal::Int32(_) => (ValueType::Integer, ValueSize::Size32),
            Literal::Int64(_) | Literal::BasicBlock(_) | Literal::Function(_) | Literal::String(_) => {
                (ValueType::Integer, ValueSize::Size64)
            }
        };
        let value = self.next_value(ty, size);
        self.literals.push(literal);
        value
    }

    pub fn literal(&self, value: Value) -> &Literal {
        debug_assert_eq!(value.kind, ValueKind::Literal);
        &self.literals[(value.data - 1) as usize]
    }

    pub fn try_literal(&self, value: Value) -> Option<&Literal> {
        if value.kind != ValueKind::Literal {
            return None;
        }
        self.literals.get((value.data - 1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_one_based_handles() {
        let mut map = LiteralMap::new();
        let a = map.register(Literal::Int32(7));
        let b = map.register(Literal::String("main".to_string()));
        assert_eq!(a.data, 1);
        assert_eq!(b.data, 2);
        assert_eq!(map.literal(a), &Literal::Int32(7));
        assert_eq!(map.literal(b), &Literal::String("main".to_string()));
    }
}
