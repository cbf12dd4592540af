//! Expression type resolution.
//!
//! The resolver walks an expression against a contextual expectation
//! (the `upper_bound`), unifying as it goes. Ground types are attached
//! to AST nodes as semantics; open call sites stay symbolic and narrow
//! as argument evidence accumulates. Failures are reported to the
//! session sink and replaced by an invalid value so the walk continues.

use super::evaluator::Evaluator;
use super::factory::Factory;
use super::method_resolver::MethodResolver;
use super::values::{Value, ValueId};
use super::variable_tracker::VariableTracker;
use elang_core::ast::{Expr, ExprId};
use elang_core::sm::Semantic;
use elang_core::tokens::TokenKind;
use elang_core::{CompilationSession, ErrorCode};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericKind {
    Float,
    Int,
    None,
    UInt,
}

#[derive(Debug, Clone, Copy)]
struct NumericType {
    kind: NumericKind,
    size: u32,
}

impl NumericType {
    fn new(kind: NumericKind, size: u32) -> Self {
        Self { kind, size }
    }

    fn is_float(&self) -> bool {
        self.kind == NumericKind::Float
    }

    fn is_int(&self) -> bool {
        self.kind == NumericKind::Int
    }

    fn is_none(&self) -> bool {
        self.kind == NumericKind::None
    }

    fn is_uint(&self) -> bool {
        self.kind == NumericKind::UInt
    }

    fn is_integral(&self) -> bool {
        self.is_int() || self.is_uint()
    }
}

struct Context {
    value: ValueId,
    result: Option<ValueId>,
}

pub struct TypeResolver<'a> {
    session: &'a CompilationSession,
    factory: &'a mut Factory,
    variable_tracker: &'a mut VariableTracker,
    contexts: Vec<Context>,
    call_values: Vec<ValueId>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(
        session: &'a CompilationSession,
        factory: &'a mut Factory,
        variable_tracker: &'a mut VariableTracker,
    ) -> Self {
        Self {
            session,
            factory,
            variable_tracker,
            contexts: Vec::new(),
            call_values: Vec::new(),
        }
    }

    // ── Entry points ────────────────────────────────────────────────

    /// Resolve `expression` against `upper_bound`. An `Empty` bound
    /// marks an error context and is widened to `Any`. Returns the
    /// resolved value, or an invalid value on failure.
    pub fn resolve(&mut self, expression: ExprId, upper_bound: ValueId) -> ValueId {
        let value = if upper_bound == self.factory.empty_value() {
            self.factory.any_value()
        } else {
            upper_bound
        };
        self.contexts.push(Context {
            value,
            result: None,
        });
        self.visit(expression);
        let context = self.contexts.pop().unwrap_or_else(|| unreachable!());
        match context.result {
            Some(result) if result != self.factory.empty_value() => result,
            _ => self.factory.new_invalid_value(expression),
        }
    }

    /// Resolve `expression` expecting `bool`; anything else is `Empty`.
    pub fn resolve_as_bool(&mut self, expression: ExprId) -> ValueId {
        let bool_value = self.factory.bool_value();
        let result = self.resolve(expression, bool_value);
        if result != bool_value {
            return self.factory.empty_value();
        }
        result
    }

    /// Report call sites still ambiguous after the whole body has been
    /// resolved, and record the chosen method on grounded sites.
    pub fn finish(&mut self) {
        for &call_value in &self.call_values {
            let ast_call = match self.factory.value(call_value) {
                Value::Call { ast_call, .. } => *ast_call,
                _ => unreachable!(),
            };
            let methods = self.factory.methods_of(call_value);
            match methods.as_slice() {
                [only] => {
                    if self.session.semantic_of(ast_call).is_none() {
                        self.session
                            .set_semantic_of(ast_call, Semantic::Method(*only));
                    }
                }
                [_, _, ..] => {
                    self.session.error(ErrorCode::TypeResolverMethodNoMatch, ast_call);
                }
                [] => {}
            }
        }
    }

    // ── Context plumbing ────────────────────────────────────────────

    fn context_value(&self) -> ValueId {
        self.contexts
            .last()
            .unwrap_or_else(|| unreachable!("visit outside resolve"))
            .value
    }

    fn produce_result(&mut self, result: ValueId, producer: ExprId) {
        debug_assert!(self.contexts.last().is_some_and(|c| c.result.is_none()));
        if result != self.factory.empty_value() {
            if let Some(context) = self.contexts.last_mut() {
                context.result = Some(result);
            }
            return;
        }
        let code = if self.context_value() == self.factory.bool_value() {
            ErrorCode::TypeResolverExpressionNotBool
        } else {
            ErrorCode::TypeResolverExpressionInvalid
        };
        self.session.error(code, producer);
        let invalid = self.factory.new_invalid_value(producer);
        if let Some(context) = self.contexts.last_mut() {
            context.result = Some(invalid);
        }
    }

    fn produce_unified_result(&mut self, result: ValueId, producer: ExprId) {
        let unified = self.unify(result, self.context_value());
        self.produce_result(unified, producer);
    }

    fn produce_resolved(&mut self, expression: ExprId, value: ValueId, producer: ExprId) {
        self.resolve(expression, value);
        self.produce_unified_result(value, producer);
    }

    /// Attach the ground type to the node, then unify into the context.
    fn produce_semantics(&mut self, value: ValueId, node: ExprId) {
        if let Value::Literal { ty } = self.factory.value(value) {
            self.session.set_semantic_of(node, Semantic::Type(*ty));
        }
        self.produce_unified_result(value, node);
    }

    fn unify(&mut self, value1: ValueId, value2: ValueId) -> ValueId {
        let mut evaluator = Evaluator::new(self.factory, &self.session.semantics);
        let result = evaluator.unify(value1, value2);
        if result == self.factory.empty_value() {
            debug!("unify yields empty");
        }
        result
    }

    fn evaluate(&mut self, value: ValueId) -> ValueId {
        let mut evaluator = Evaluator::new(self.factory, &self.session.semantics);
        evaluator.evaluate(value)
    }

    fn resolve_reference(&self, expression: ExprId) -> Option<Semantic> {
        self.session.semantic_of(expression)
    }

    // ── Numeric typing ──────────────────────────────────────────────

    fn numeric_type_of(&self, value: ValueId) -> NumericType {
        use NumericKind::*;
        let f = &self.factory;
        if value == f.float64_value() {
            return NumericType::new(Float, 64);
        }
        if value == f.float32_value() {
            return NumericType::new(Float, 32);
        }
        if value == f.int64_value() {
            return NumericType::new(Int, 64);
        }
        if value == f.int32_value() {
            return NumericType::new(Int, 32);
        }
        if value == f.int16_value() {
            return NumericType::new(Int, 16);
        }
        if value == f.int8_value() {
            return NumericType::new(Int, 8);
        }
        if value == f.uint64_value() {
            return NumericType::new(UInt, 64);
        }
        if value == f.uint32_value() {
            return NumericType::new(UInt, 32);
        }
        if value == f.uint16_value() {
            return NumericType::new(UInt, 16);
        }
        if value == f.uint8_value() {
            return NumericType::new(UInt, 8);
        }
        NumericType::new(None, 0)
    }

    /// Promote one operand alone; 32 bits is the floor.
    fn promote_numeric(&mut self, ty: NumericType) -> ValueId {
        match ty.kind {
            NumericKind::Float => {
                if ty.size == 64 {
                    self.factory.float64_value()
                } else {
                    self.factory.float32_value()
                }
            }
            NumericKind::Int => {
                if ty.size == 64 {
                    self.factory.int64_value()
                } else {
                    self.factory.int32_value()
                }
            }
            NumericKind::UInt => {
                if ty.size == 64 {
                    self.factory.uint64_value()
                } else {
                    self.factory.uint32_value()
                }
            }
            NumericKind::None => self.factory.empty_value(),
        }
    }

    /// Promote a binary operand pair to their common numeric type.
    /// Mixed signed/unsigned integers are ambiguous and yield `Empty`.
    fn promote_numeric_pair(&mut self, left: NumericType, right: NumericType) -> ValueId {
        if left.is_none() {
            return self.promote_numeric(right);
        }
        if right.is_none() {
            return self.promote_numeric(left);
        }
        if left.is_float() || right.is_float() {
            return if left.size == 64 || right.size == 64 {
                self.factory.float64_value()
            } else {
                self.factory.float32_value()
            };
        }
        if left.kind != right.kind {
            return self.factory.empty_value();
        }
        let wide = left.size == 64 || right.size == 64;
        if left.is_uint() {
            if wide {
                self.factory.uint64_value()
            } else {
                self.factory.uint32_value()
            }
        } else if wide {
            self.factory.int64_value()
        } else {
            self.factory.int32_value()
        }
    }

    // ── Visitors ────────────────────────────────────────────────────

    fn visit(&mut self, node: ExprId) {
        match self.session.ast.expr(node).clone() {
            Expr::ArrayAccess { array, indexes } => self.visit_array_access(node, array, &indexes),
            Expr::Assignment { left, right } => self.visit_assignment(node, left, right),
            Expr::BinaryOperation { op, left, right } => {
                self.visit_binary_operation(node, &op, left, right)
            }
            Expr::Call { callee, arguments } => self.visit_call(node, callee, &arguments),
            Expr::Conditional {
                condition,
                true_expression,
                false_expression,
            } => self.visit_conditional(node, condition, true_expression, false_expression),
            Expr::IncrementExpression { expression, .. } => {
                self.visit_increment_expression(node, expression)
            }
            Expr::Literal { token } => self.visit_literal(node, &token),
            Expr::NameReference { .. } => self.visit_name_reference(node),
            Expr::ParameterReference { parameter } => {
                let value = self.variable_tracker.record_get(parameter);
                self.produce_unified_result(value, node);
            }
            Expr::UnaryOperation { op, expression } => {
                self.visit_unary_operation(node, &op, expression)
            }
            Expr::VariableReference { variable } => {
                let value = self.variable_tracker.record_get(variable);
                self.produce_unified_result(value, node);
            }
            Expr::MemberAccess { .. } => self.do_default_visit(node),
        }
    }

    fn do_default_visit(&mut self, node: ExprId) {
        self.session
            .error(ErrorCode::TypeResolverExpressionNotYetImplemented, node);
    }

    /// The base must be an array type, the index count must match its
    /// rank, and each index must evaluate to an integral type.
    fn visit_array_access(&mut self, node: ExprId, array: ExprId, indexes: &[ExprId]) {
        let any = self.factory.any_value();
        let array_value = self.resolve(array, any);
        let element_type = match self.factory.value(array_value) {
            Value::Literal { ty } => match self.session.semantics.ty(*ty) {
                elang_core::sm::Type::Array { element_type, rank } => {
                    let (element_type, rank) = (*element_type, *rank);
                    if rank != indexes.len() {
                        self.session.error(ErrorCode::TypeResolverArrayAccessRank, node);
                    }
                    element_type
                }
                _ => {
                    self.session.error(ErrorCode::TypeResolverArrayAccessArray, array);
                    return;
                }
            },
            _ => {
                self.session.error(ErrorCode::TypeResolverArrayAccessArray, array);
                return;
            }
        };
        for &index in indexes {
            let any = self.factory.any_value();
            let resolved = self.resolve(index, any);
            let index_type = self.evaluate(resolved);
            if !self.numeric_type_of(index_type).is_integral() {
                self.session.error(ErrorCode::TypeResolverArrayAccessIndex, index);
            }
        }
        let result = self.factory.new_literal(element_type);
        self.produce_result(result, node);
    }

    fn visit_assignment(&mut self, node: ExprId, left: ExprId, right: ExprId) {
        match self.session.ast.expr(left).clone() {
            Expr::ParameterReference { parameter } => {
                let value = self.variable_tracker.record_set(parameter);
                self.produce_resolved(right, value, node);
            }
            Expr::VariableReference { variable } => {
                let value = self.variable_tracker.record_set(variable);
                self.produce_resolved(right, value, node);
            }
            Expr::ArrayAccess { .. } => {
                let any = self.factory.any_value();
                let element_value = self.resolve(left, any);
                self.produce_resolved(right, element_value, node);
            }
            Expr::NameReference { .. } | Expr::MemberAccess { .. } => {
                // Field and property stores are not handled yet.
                if self.resolve_reference(left).is_some() {
                    self.session
                        .error(ErrorCode::TypeResolverExpressionNotYetImplemented, left);
                } else {
                    self.session
                        .error(ErrorCode::TypeResolverAssignmentLeftValue, left);
                }
            }
            _ => {
                self.session
                    .error(ErrorCode::TypeResolverAssignmentLeftValue, left);
            }
        }
    }

    fn visit_binary_operation(&mut self, node: ExprId, op: &TokenKind, left: ExprId, right: ExprId) {
        if *op == TokenKind::NullOr {
            // T operator??(T?, T): the result takes the right side's
            // type. The left side ought to be nullable; not enforced
            // here.
            let any = self.factory.any_value();
            let left_value = self.resolve(left, any);
            let right_value = self.resolve(right, any);
            if matches!(self.factory.value(left_value), Value::Invalid { .. })
                || matches!(self.factory.value(right_value), Value::Invalid { .. })
            {
                return;
            }
            self.produce_semantics(right_value, node);
            return;
        }

        if op.is_conditional() {
            // bool operator&&(bool, bool) and friends.
            self.resolve_as_bool(left);
            self.resolve_as_bool(right);
            let bool_value = self.factory.bool_value();
            self.produce_unified_result(bool_value, node);
            return;
        }

        let any = self.factory.any_value();
        let left_resolved = self.resolve(left, any);
        let left_value = self.evaluate(left_resolved);
        let any = self.factory.any_value();
        let right_resolved = self.resolve(right, any);
        let right_value = self.evaluate(right_resolved);

        if op.is_equality() {
            // bool operator==(T, T): operands must already agree.
            if left_value != right_value {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationEquality, node);
            }
            let bool_value = self.factory.bool_value();
            self.produce_unified_result(bool_value, node);
            return;
        }

        let left_type = self.numeric_type_of(left_value);
        let right_type = self.numeric_type_of(right_value);

        if left_type.is_none() && right_type.is_none() {
            self.session
                .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
            self.session
                .error(ErrorCode::TypeResolverBinaryOperationNumeric, right);
            return;
        }

        if op.is_bitwise_shift() {
            // The shift count is int32; the result follows the left
            // operand among {int32, int64, uint32, uint64}.
            if !right_type.is_int() || right_type.size != 32 {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationShift, right);
                return;
            }
            if left_type.is_int() {
                let result = if left_type.size == 64 {
                    self.factory.int64_value()
                } else {
                    self.factory.int32_value()
                };
                self.produce_semantics(result, node);
                return;
            }
            if left_type.is_uint() {
                let result = if left_type.size == 64 {
                    self.factory.uint64_value()
                } else {
                    self.factory.uint32_value()
                };
                self.produce_semantics(result, node);
                return;
            }
            self.session
                .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
            return;
        }

        // Arithmetic, bitwise and relational operands promote to one
        // shared numeric type.
        let promoted = self.promote_numeric_pair(left_type, right_type);

        if op.is_arithmetic() {
            if promoted == self.factory.empty_value() {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, right);
                return;
            }
            self.produce_semantics(promoted, node);
            return;
        }

        if op.is_bitwise() {
            let promoted_type = self.numeric_type_of(promoted);
            if promoted_type.is_integral() {
                self.produce_semantics(promoted, node);
                return;
            }
            if left_type.is_float() {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
            }
            if right_type.is_float() {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, right);
            }
            if !left_type.is_float() && !right_type.is_float() {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, right);
            }
            return;
        }

        if op.is_relational() {
            let bool_value = self.factory.bool_value();
            self.produce_unified_result(bool_value, node);
            if let Value::Literal { ty } = self.factory.value(promoted) {
                self.session.set_semantic_of(node, Semantic::Type(*ty));
            } else {
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, left);
                self.session
                    .error(ErrorCode::TypeResolverBinaryOperationNumeric, right);
            }
            return;
        }

        unreachable!("unhandled binary operator {}", op);
    }

    /// Bind applicable methods to the call site and narrow them with
    /// argument evidence.
    fn visit_call(&mut self, node: ExprId, callee: ExprId, arguments: &[ExprId]) {
        let Some(callee_semantic) = self.resolve_reference(callee) else {
            return;
        };
        let group = match callee_semantic {
            Semantic::MethodGroup(group) => group,
            _ => {
                self.session
                    .error(ErrorCode::TypeResolverCalleeNotSupported, callee);
                return;
            }
        };

        let candidates = MethodResolver::new(&self.session.semantics)
            .compute_applicable_methods(group, self.context_value(), arguments.len());

        let call_value = self.factory.new_call_value(node);
        self.factory.set_methods(call_value, candidates.clone());
        self.call_values.push(call_value);

        if let [method_id] = candidates.as_slice() {
            // One candidate: check each argument against its parameter.
            let method_id = *method_id;
            let method = self.session.semantics.method(method_id).clone();
            let parameters = method.parameters();
            let mut cursor = 0usize;
            for &argument in arguments {
                let parameter = &parameters[cursor.min(parameters.len() - 1)];
                let expected = self.factory.new_literal(parameter.ty);
                let result = self.resolve(argument, expected);
                if matches!(self.factory.value(result), Value::Invalid { .. }) {
                    debug!(position = parameter.position, "argument does not match parameter");
                    self.factory.set_methods(call_value, Vec::new());
                    self.session.error(ErrorCode::TypeResolverMethodNoMatch, node);
                    return;
                }
                if !parameter.is_rest {
                    cursor += 1;
                }
            }
            let result = self.factory.new_literal(method.return_type());
            self.session.set_semantic_of(node, Semantic::Method(method_id));
            self.produce_unified_result(result, node);
            return;
        }

        if candidates.len() >= 2 {
            // Several candidates: each argument constrains the shared
            // method list through its argument position.
            for (position, &argument) in arguments.iter().enumerate() {
                let argument_value = self.factory.new_argument(call_value, position);
                let result = self.resolve(argument, argument_value);
                if matches!(self.factory.value(result), Value::Invalid { .. }) {
                    debug!(position, "argument should be a subtype of some candidate");
                }
            }
        }

        let methods = self.factory.methods_of(call_value);
        if methods.is_empty() {
            debug!("no matching methods for call");
            self.session.error(ErrorCode::TypeResolverMethodNoMatch, node);
            return;
        }
        if let [only] = methods.as_slice() {
            let result = {
                let return_type = self.session.semantics.method(*only).return_type();
                self.factory.new_literal(return_type)
            };
            self.session.set_semantic_of(node, Semantic::Method(*only));
            self.produce_unified_result(result, node);
            return;
        }
        self.produce_unified_result(call_value, node);
    }

    fn visit_conditional(
        &mut self,
        node: ExprId,
        condition: ExprId,
        true_expression: ExprId,
        false_expression: ExprId,
    ) {
        self.resolve_as_bool(condition);
        let any = self.factory.any_value();
        let true_resolved = self.resolve(true_expression, any);
        let true_value = self.evaluate(true_resolved);
        let any = self.factory.any_value();
        let false_resolved = self.resolve(false_expression, any);
        let false_value = self.evaluate(false_resolved);
        // The arms unify, so a subtype pair collapses to the narrower
        // type; only an irreconcilable pair is an error.
        let unified = self.unify(true_value, false_value);
        if unified == self.factory.empty_value() {
            self.session
                .error(ErrorCode::TypeResolverConditionalNotMatch, node);
            return;
        }
        self.produce_unified_result(unified, node);
    }

    /// Post/pre increment and decrement: a numeric, assignable place.
    fn visit_increment_expression(&mut self, node: ExprId, place: ExprId) {
        let any = self.factory.any_value();
        let resolved = self.resolve(place, any);
        let operand = self.evaluate(resolved);
        let numeric_type = self.numeric_type_of(operand);
        if numeric_type.is_none() {
            self.session
                .error(ErrorCode::TypeResolverIncrementExpressionType, place);
            return;
        }
        if !matches!(
            self.session.ast.expr(place),
            Expr::VariableReference { .. } | Expr::ParameterReference { .. }
        ) {
            self.session
                .error(ErrorCode::TypeResolverIncrementExpressionPlace, place);
            return;
        }
        let promoted = self.promote_numeric(numeric_type);
        self.produce_semantics(promoted, node);
    }

    /// `null` takes its type from the context; any other literal's type
    /// is predefined by its token.
    fn visit_literal(&mut self, node: ExprId, token: &TokenKind) {
        if *token == TokenKind::NullLiteral {
            let context_value = self.context_value();
            let null = self.factory.new_null_value(context_value);
            self.produce_result(null, node);
            return;
        }
        let Some(name) = token.literal_type() else {
            unreachable!("literal node without literal token");
        };
        let literal_type = self.session.predefined_type_of(name);
        let literal = self.factory.new_literal(literal_type);
        let context_value = self.context_value();
        let result = self.unify(literal, context_value);
        if result == self.factory.empty_value() {
            self.produce_result(result, node);
            return;
        }
        let Value::Literal { ty } = self.factory.value(result) else {
            return;
        };
        let ty = *ty;
        debug_assert!(self.session.semantic_of(node).is_none());
        self.session.set_semantic_of(
            node,
            Semantic::Literal {
                ty,
                token: token.clone(),
            },
        );
        self.produce_result(result, node);
    }

    fn visit_name_reference(&mut self, node: ExprId) {
        let Some(semantic) = self.resolve_reference(node) else {
            return;
        };
        self.session.set_semantic_of(node, semantic.clone());
        if let Semantic::Field { ty, .. } = semantic {
            let result = self.factory.new_literal(ty);
            self.produce_unified_result(result, node);
        }
    }

    //  '!' bool
    //  '~' int|uint
    //  '+' '-' numeric
    fn visit_unary_operation(&mut self, node: ExprId, op: &TokenKind, expression: ExprId) {
        if *op == TokenKind::Not {
            let result = self.resolve_as_bool(expression);
            self.produce_unified_result(result, node);
            return;
        }
        let any = self.factory.any_value();
        let resolved = self.resolve(expression, any);
        let operand = self.evaluate(resolved);
        let numeric_type = self.numeric_type_of(operand);
        if numeric_type.is_none() {
            self.session
                .error(ErrorCode::TypeResolverUnaryOperationType, expression);
            return;
        }
        if *op == TokenKind::BitNot && numeric_type.is_float() {
            self.session
                .error(ErrorCode::TypeResolverUnaryOperationType, expression);
            return;
        }
        let promoted = self.promote_numeric(numeric_type);
        self.produce_semantics(promoted, node);
    }
}
