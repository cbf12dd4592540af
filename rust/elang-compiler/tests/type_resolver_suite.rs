//! End-to-end type resolution scenarios: expressions built the way the
//! front end hands them over, resolved against contextual expectations.

use elang_compiler::{Factory, TypeResolver, Value, VariableTracker};
use elang_core::sm::{Parameter, PredefinedName, Semantic, Signature, StorageClass, TypeId};
use elang_core::tokens::TokenKind;
use elang_core::{CompilationSession, ErrorCode};

fn parameter(position: usize, ty: TypeId) -> Parameter {
    Parameter {
        name: format!("p{}", position),
        ty,
        position,
        is_rest: false,
    }
}

fn error_codes(session: &CompilationSession) -> Vec<ErrorCode> {
    session.errors().iter().map(|d| d.code).collect()
}

#[test]
fn int32_plus_int64_promotes_to_int64() {
    let mut session = CompilationSession::new();
    let left = session.ast.new_literal(TokenKind::Int32Literal(1));
    let right = session.ast.new_literal(TokenKind::Int64Literal(2));
    let add = session.ast.new_binary_operation(TokenKind::Add, left, right);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let int64 = factory.int64_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(add, any);

    assert_eq!(result, int64);
    assert!(!session.has_errors());
    match session.semantic_of(add) {
        Some(Semantic::Type(ty)) => {
            assert_eq!(ty, session.predefined_type_of(PredefinedName::Int64))
        }
        other => panic!("unexpected semantic {:?}", other),
    }
}

#[test]
fn shift_count_must_be_int32() {
    let mut session = CompilationSession::new();
    let count_decl = session.ast.new_variable_decl("n");
    let left = session.ast.new_literal(TokenKind::Int32Literal(1));
    let right = session.ast.new_variable_reference(count_decl);
    let shift = session.ast.new_binary_operation(TokenKind::Shl, left, right);

    let mut factory = Factory::new(&session);
    let int16 = factory.int16_value();
    let count_value = factory.new_variable(count_decl, int16);
    let mut tracker = VariableTracker::new();
    tracker.register_variable(count_decl, count_value);

    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(shift, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverBinaryOperationShift]
    );
}

#[test]
fn mixed_signedness_addition_reports_both_operands() {
    let mut session = CompilationSession::new();
    let left = session.ast.new_literal(TokenKind::UInt32Literal(1));
    let right = session.ast.new_literal(TokenKind::Int32Literal(2));
    let add = session.ast.new_binary_operation(TokenKind::Add, left, right);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(add, any);

    assert!(matches!(factory.value(result), Value::Invalid { .. }));
    assert_eq!(
        error_codes(&session),
        vec![
            ErrorCode::TypeResolverBinaryOperationNumeric,
            ErrorCode::TypeResolverBinaryOperationNumeric,
        ]
    );
    let nodes: Vec<_> = session.errors().iter().map(|d| d.node).collect();
    assert_eq!(nodes, vec![left.into(), right.into()]);
}

#[test]
fn overload_prunes_to_int_candidate() {
    let mut session = CompilationSession::new();
    let int32 = session.predefined_type_of(PredefinedName::Int32);
    let string = session.predefined_type_of(PredefinedName::String);
    let bool_ty = session.predefined_type_of(PredefinedName::Bool);

    let f_int = session.semantics.new_method(
        "f",
        Signature {
            return_type: bool_ty,
            parameters: vec![parameter(0, int32)],
        },
    );
    let f_str = session.semantics.new_method(
        "f",
        Signature {
            return_type: bool_ty,
            parameters: vec![parameter(0, string)],
        },
    );
    let group = session.semantics.new_method_group("f", vec![f_int, f_str]);

    let callee = session.ast.new_name_reference("f");
    let argument = session.ast.new_literal(TokenKind::Int32Literal(42));
    let call = session.ast.new_call(callee, vec![argument]);
    session.set_semantic_of(callee, Semantic::MethodGroup(group));

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let bool_value = factory.bool_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(call, any);
    resolver.finish();

    assert!(!session.has_errors());
    assert_eq!(result, bool_value);
    match session.semantic_of(call) {
        Some(Semantic::Method(chosen)) => assert_eq!(chosen, f_int),
        other => panic!("unexpected semantic {:?}", other),
    }
}

#[test]
fn call_with_no_applicable_methods_reports() {
    let mut session = CompilationSession::new();
    let int32 = session.predefined_type_of(PredefinedName::Int32);
    let f = session.semantics.new_method(
        "f",
        Signature {
            return_type: int32,
            parameters: vec![parameter(0, int32)],
        },
    );
    let group = session.semantics.new_method_group("f", vec![f]);

    let callee = session.ast.new_name_reference("f");
    // Two arguments against a unary method group: no candidate by arity.
    let a = session.ast.new_literal(TokenKind::Int32Literal(1));
    let b = session.ast.new_literal(TokenKind::Int32Literal(2));
    let call = session.ast.new_call(callee, vec![a, b]);
    session.set_semantic_of(callee, Semantic::MethodGroup(group));

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(call, any);

    assert_eq!(error_codes(&session), vec![ErrorCode::TypeResolverMethodNoMatch]);
}

#[test]
fn conditional_arms_must_match() {
    let mut session = CompilationSession::new();
    let condition = session.ast.new_literal(TokenKind::TrueLiteral);
    let then_arm = session.ast.new_literal(TokenKind::Int32Literal(1));
    let else_arm = session.ast.new_literal(TokenKind::StringLiteral("s".to_string()));
    let conditional = session.ast.new_conditional(condition, then_arm, else_arm);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(conditional, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverConditionalNotMatch]
    );
}

#[test]
fn conditional_arms_collapse_by_subtype() {
    let mut session = CompilationSession::new();
    let condition = session.ast.new_literal(TokenKind::TrueLiteral);
    let then_arm = session.ast.new_literal(TokenKind::Int32Literal(1));
    let else_arm = session.ast.new_literal(TokenKind::Int64Literal(2));
    let conditional = session.ast.new_conditional(condition, then_arm, else_arm);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let int32 = factory.int32_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(conditional, any);

    assert!(!session.has_errors());
    // int32 is a subtype of int64, so the arms unify to the narrower
    // type instead of mismatching.
    assert_eq!(result, int32);
}

#[test]
fn unary_minus_grounds_a_call_result_operand() {
    let mut session = CompilationSession::new();
    let int32 = session.predefined_type_of(PredefinedName::Int32);
    // Two candidates stay open at the call site, but both return
    // int32, so the operand still evaluates to a numeric type.
    let sig = |ret| Signature {
        return_type: ret,
        parameters: vec![],
    };
    let f_a = session.semantics.new_method("f", sig(int32));
    let f_b = session.semantics.new_method("f", sig(int32));
    let group = session.semantics.new_method_group("f", vec![f_a, f_b]);

    let callee = session.ast.new_name_reference("f");
    let call = session.ast.new_call(callee, vec![]);
    session.set_semantic_of(callee, Semantic::MethodGroup(group));
    let negated = session.ast.new_unary_operation(TokenKind::Sub, call);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let int32_value = factory.int32_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(negated, any);

    assert!(!session.has_errors());
    assert_eq!(result, int32_value);
}

#[test]
fn conditional_with_agreeing_arms_resolves() {
    let mut session = CompilationSession::new();
    let condition = session.ast.new_literal(TokenKind::TrueLiteral);
    let then_arm = session.ast.new_literal(TokenKind::Int32Literal(1));
    let else_arm = session.ast.new_literal(TokenKind::Int32Literal(2));
    let conditional = session.ast.new_conditional(condition, then_arm, else_arm);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let int32 = factory.int32_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(conditional, any);

    assert!(!session.has_errors());
    assert_eq!(result, int32);
}

#[test]
fn assignment_grounds_local_variable() {
    let mut session = CompilationSession::new();
    let decl = session.ast.new_variable_decl("x");
    let reference = session.ast.new_variable_reference(decl);
    let value = session.ast.new_literal(TokenKind::Int32Literal(42));
    let assignment = session.ast.new_assignment(reference, value);

    let mut factory = Factory::new(&session);
    let any = factory.any_value();
    let var_value = factory.new_variable(decl, any);
    let mut tracker = VariableTracker::new();
    tracker.register_variable(decl, var_value);

    {
        let any = factory.any_value();
        let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
        resolver.resolve(assignment, any);
    }
    tracker.finish(&session, &mut factory);

    assert!(!session.has_errors());
    match session.semantic_of(decl) {
        Some(Semantic::Variable { ty, storage, .. }) => {
            assert_eq!(ty, session.predefined_type_of(PredefinedName::Int32));
            assert_eq!(storage, StorageClass::Local);
        }
        other => panic!("unexpected semantic {:?}", other),
    }
}

#[test]
fn array_access_checks_base_rank_and_index() {
    let mut session = CompilationSession::new();
    let int32 = session.predefined_type_of(PredefinedName::Int32);
    let array_ty = session.semantics.new_array_type(int32, 1);

    let array_decl = session.ast.new_variable_decl("a");
    let array_ref = session.ast.new_variable_reference(array_decl);
    let i0 = session.ast.new_literal(TokenKind::Int32Literal(0));
    let i1 = session.ast.new_literal(TokenKind::Int32Literal(1));
    // Two indexes against a rank-1 array.
    let access = session.ast.new_array_access(array_ref, vec![i0, i1]);

    let mut factory = Factory::new(&session);
    let array_value = {
        let literal = factory.new_literal(array_ty);
        factory.new_variable(array_decl, literal)
    };
    let mut tracker = VariableTracker::new();
    tracker.register_variable(array_decl, array_value);

    let any = factory.any_value();
    let int32_value = factory.int32_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(access, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverArrayAccessRank]
    );
    // Element type is still produced so resolution continues.
    assert_eq!(result, int32_value);
}

#[test]
fn null_coalescing_takes_right_type() {
    let mut session = CompilationSession::new();
    let left = session.ast.new_literal(TokenKind::NullLiteral);
    let right = session.ast.new_literal(TokenKind::StringLiteral("s".to_string()));
    let null_or = session.ast.new_binary_operation(TokenKind::NullOr, left, right);

    let mut factory = Factory::new(&session);
    let string = factory.new_literal(session.predefined_type_of(PredefinedName::String));
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(null_or, any);

    assert!(!session.has_errors());
    assert_eq!(result, string);
}

#[test]
fn logical_operands_must_be_bool() {
    let mut session = CompilationSession::new();
    let left = session.ast.new_literal(TokenKind::TrueLiteral);
    let right = session.ast.new_literal(TokenKind::Int32Literal(1));
    let and = session.ast.new_binary_operation(TokenKind::And, left, right);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(and, any);

    assert!(session
        .errors()
        .iter()
        .any(|d| d.code == ErrorCode::TypeResolverExpressionNotBool));
}

#[test]
fn bitnot_rejects_float() {
    let mut session = CompilationSession::new();
    let operand = session.ast.new_literal(TokenKind::Float32Literal(1.5));
    let bitnot = session.ast.new_unary_operation(TokenKind::BitNot, operand);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(bitnot, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverUnaryOperationType]
    );
}

#[test]
fn increment_requires_a_place() {
    let mut session = CompilationSession::new();
    let operand = session.ast.new_literal(TokenKind::Int32Literal(1));
    let increment = session.ast.new_increment(TokenKind::Increment, operand);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(increment, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverIncrementExpressionPlace]
    );
}

#[test]
fn equality_of_unrelated_types_reports() {
    let mut session = CompilationSession::new();
    let left = session.ast.new_literal(TokenKind::Int32Literal(1));
    let right = session.ast.new_literal(TokenKind::StringLiteral("x".to_string()));
    let eq = session.ast.new_binary_operation(TokenKind::Eq, left, right);

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let bool_value = factory.bool_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    let result = resolver.resolve(eq, any);

    assert_eq!(
        error_codes(&session),
        vec![ErrorCode::TypeResolverBinaryOperationEquality]
    );
    // The comparison still types as bool.
    assert_eq!(result, bool_value);
}

#[test]
fn ambiguous_call_reported_at_finish() {
    let mut session = CompilationSession::new();
    let int32 = session.predefined_type_of(PredefinedName::Int32);
    let int64 = session.predefined_type_of(PredefinedName::Int64);
    // Both candidates accept an int32 argument; nothing disambiguates.
    let f_a = session.semantics.new_method(
        "f",
        Signature {
            return_type: int32,
            parameters: vec![parameter(0, int32)],
        },
    );
    let f_b = session.semantics.new_method(
        "f",
        Signature {
            return_type: int64,
            parameters: vec![parameter(0, int64)],
        },
    );
    let group = session.semantics.new_method_group("f", vec![f_a, f_b]);

    let callee = session.ast.new_name_reference("f");
    let argument = session.ast.new_literal(TokenKind::Int32Literal(1));
    let call = session.ast.new_call(callee, vec![argument]);
    session.set_semantic_of(callee, Semantic::MethodGroup(group));

    let mut factory = Factory::new(&session);
    let mut tracker = VariableTracker::new();
    let any = factory.any_value();
    let mut resolver = TypeResolver::new(&session, &mut factory, &mut tracker);
    resolver.resolve(call, any);
    resolver.finish();

    assert_eq!(error_codes(&session), vec![ErrorCode::TypeResolverMethodNoMatch]);
}
