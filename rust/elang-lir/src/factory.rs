//! LIR factory: virtual registers, literals, functions, and the
//! structured error list for one compilation.

use crate::error::ErrorData;
use crate::function::{Function, FunctionId};
use crate::literals::{Literal, LiteralMap};
use crate::value::{Value, ValueKind};

#[derive(Default)]
pub struct Factory {
    literals: LiteralMap,
    errors: Vec<ErrorData>,
    next_register: i32,
    next_condition: i32,
    next_function: u32,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_function(&mut self) -> Function {
        let id = FunctionId(self.next_function);
        self.next_function += 1;
        Function::new(id)
    }

    /// A fresh SSA virtual register of the given type tag.
    pub fn new_register(&mut self, type_tag: Value) -> Value {
        let data = self.next_register;
        self.next_register += 1;
        Value::new(type_tag.ty, type_tag.size, ValueKind::VirtualRegister, data)
    }

    /// A fresh condition value produced by `Cmp`.
    pub fn new_condition(&mut self) -> Value {
        let data = self.next_condition;
        self.next_condition += 1;
        Value::new(
            Value::int32_type().ty,
            Value::int32_type().size,
            ValueKind::Condition,
            data,
        )
    }

    // ── Literal pool ────────────────────────────────────────────────

    pub fn new_string_literal(&mut self, data: &str) -> Value {
        self.literals.register(Literal::String(data.to_string()))
    }

    pub fn new_int32_literal(&mut self, data: i32) -> Value {
        self.literals.register(Literal::Int32(data))
    }

    pub fn new_int64_literal(&mut self, data: i64) -> Value {
        self.literals.register(Literal::Int64(data))
    }

    pub fn new_float32_literal(&mut self, data: f32) -> Value {
        self.literals.register(Literal::Float32(data))
    }

    pub fn new_float64_literal(&mut self, data: f64) -> Value {
        self.literals.register(Literal::Float64(data))
    }

    pub fn literal(&self, value: Value) -> &Literal {
        self.literals.literal(value)
    }

    pub fn try_literal(&self, value: Value) -> Option<&Literal> {
        self.literals.try_literal(value)
    }

    // ── Errors ──────────────────────────────────────────────────────

    pub fn add_error(&mut self, error: ErrorData) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ErrorData>) {
        self.errors.extend(errors);
    }

    pub fn errors(&self) -> &[ErrorData] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
