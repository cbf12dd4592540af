//! Unification and evaluation of type-inference values.
//!
//! [`Evaluator::unify`] reconciles two constraints into their most
//! informative consistent value, shrinking union method lists as a side
//! effect. [`Evaluator::evaluate`] collapses a value to a ground
//! literal when the remaining evidence admits only one type.
//!
//! Failure is the `Empty` value; a variant pair neither rule covers is
//! a logic bug, not a surfaced error.

use super::factory::Factory;
use super::values::{Value, ValueId};
use elang_core::sm::{MethodId, SemanticFactory, TypeId};
use tracing::debug;

pub struct Evaluator<'a> {
    factory: &'a mut Factory,
    semantics: &'a SemanticFactory,
}

impl<'a> Evaluator<'a> {
    pub fn new(factory: &'a mut Factory, semantics: &'a SemanticFactory) -> Self {
        Self { factory, semantics }
    }

    fn empty_value(&self) -> ValueId {
        self.factory.empty_value()
    }

    fn new_literal(&mut self, ty: TypeId) -> ValueId {
        self.factory.new_literal(ty)
    }

    // ── Containment ─────────────────────────────────────────────────

    /// Does some method of `union` still produce a subtype of `ty`?
    fn union_contains_type(&self, union: ValueId, ty: TypeId) -> bool {
        self.factory.methods_of(union).iter().any(|&method| {
            let value = self.factory.value_for(union, method, self.semantics);
            self.semantics.is_subtype_of(value, ty)
        })
    }

    fn and_contains_type(&self, and_value: ValueId, ty: TypeId) -> bool {
        match self.factory.value(and_value) {
            Value::And { union_values } => union_values
                .iter()
                .any(|&union| self.union_contains_type(union, ty)),
            _ => unreachable!("and_contains_type on non-and value"),
        }
    }

    /// Does the and-value still admit at least one method of `union`?
    fn and_contains_union(&self, and_value: ValueId, union: ValueId) -> bool {
        self.factory.methods_of(union).iter().any(|&method| {
            let value = self.factory.value_for(union, method, self.semantics);
            self.and_contains_type(and_value, value)
        })
    }

    // ── Unification ─────────────────────────────────────────────────

    /// The entry point: symmetric unification.
    pub fn unify(&mut self, value1: ValueId, value2: ValueId) -> ValueId {
        if value1 == value2 {
            return value1;
        }
        let kind1 = self.factory.value(value1).clone();
        let kind2 = self.factory.value(value2).clone();

        if matches!(kind1, Value::Invalid { .. } | Value::Empty) {
            return value1;
        }
        if matches!(kind2, Value::Invalid { .. } | Value::Empty) {
            return value2;
        }

        if matches!(kind1, Value::Any) {
            return value2;
        }
        if matches!(kind2, Value::Any) {
            return value1;
        }

        if matches!(kind1, Value::Variable { .. }) {
            return self.unify_variable(value1, value2);
        }
        if matches!(kind2, Value::Variable { .. }) {
            return self.unify_variable(value2, value1);
        }

        if let Value::Null { value: base } = &kind1 {
            return self.unify(*base, value2);
        }
        if let Value::Null { value: base } = &kind2 {
            return self.unify(*base, value1);
        }

        if let Value::Literal { ty } = &kind1 {
            return self.unify_literal(*ty, value2);
        }
        if let Value::Literal { ty } = &kind2 {
            return self.unify_literal(*ty, value1);
        }

        if kind1.is_union_value() {
            return self.unify_union(value1, value2);
        }
        if kind2.is_union_value() {
            return self.unify_union(value2, value1);
        }

        if matches!(kind1, Value::And { .. }) && matches!(kind2, Value::And { .. }) {
            return self.unify_and(value1, value2);
        }

        unreachable!("unify on unsupported value pair");
    }

    /// Variable ∘ anything: recurse with the root's value and store the
    /// result back; two variables additionally union their chains.
    fn unify_variable(&mut self, variable: ValueId, other: ValueId) -> ValueId {
        if matches!(self.factory.value(other), Value::Variable { .. }) {
            let value1 = self.factory.variable_value(variable);
            let value2 = self.factory.variable_value(other);
            let result = self.unify(value1, value2);
            self.factory.set_variable_value(variable, result);
            self.factory.set_variable_value(other, result);
            self.factory.union(variable, other);
            return result;
        }
        let value = self.factory.variable_value(variable);
        let result = self.unify(value, other);
        self.factory.set_variable_value(variable, result);
        result
    }

    /// Literal ∘ {Literal, UnionValue, AndValue}.
    fn unify_literal(&mut self, ty1: TypeId, value2: ValueId) -> ValueId {
        match self.factory.value(value2).clone() {
            Value::Literal { ty: ty2 } => {
                if self.semantics.is_subtype_of(ty1, ty2) {
                    return self.new_literal(ty1);
                }
                if self.semantics.is_subtype_of(ty2, ty1) {
                    return self.new_literal(ty2);
                }
                debug!(
                    left = %self.semantics.name_of(ty1),
                    right = %self.semantics.name_of(ty2),
                    "unify of unrelated literals yields empty"
                );
                self.empty_value()
            }
            Value::Call { .. } | Value::Argument { .. } => {
                self.unify_literal_with_union(ty1, value2)
            }
            Value::And { union_values } => self.unify_literal_with_and(ty1, &union_values, value2),
            _ => unreachable!("unify_literal on unsupported value"),
        }
    }

    /// Drop methods whose `can_use` fails against the literal; collapse
    /// on zero or one survivor.
    fn unify_literal_with_union(&mut self, ty1: TypeId, union: ValueId) -> ValueId {
        let methods: Vec<MethodId> = self
            .factory
            .methods_of(union)
            .into_iter()
            .filter(|&m| self.factory.can_use(union, m, ty1, self.semantics))
            .collect();
        self.factory.set_methods(union, methods.clone());
        match methods.as_slice() {
            [] => self.empty_value(),
            [only] => {
                let value = self.factory.value_for(union, *only, self.semantics);
                self.new_literal(value)
            }
            _ => union,
        }
    }

    /// Distribute the literal across the and-value's branches. Every
    /// branch is unified even after the accumulator goes empty so each
    /// union's method list still shrinks.
    fn unify_literal_with_and(
        &mut self,
        ty1: TypeId,
        union_values: &[ValueId],
        and_value: ValueId,
    ) -> ValueId {
        let mut accumulated = self.new_literal(ty1);
        let mut survivors = Vec::new();
        for &union in union_values {
            let result = self.unify(accumulated, union);
            if self.factory.is_union_value(result) {
                survivors.push(result);
                continue;
            }
            accumulated = self.unify(accumulated, result);
        }
        match survivors.as_slice() {
            [] => accumulated,
            [only] => *only,
            _ => {
                self.factory.set_union_values(and_value, survivors);
                and_value
            }
        }
    }

    /// UnionValue ∘ {UnionValue, AndValue}.
    fn unify_union(&mut self, union1: ValueId, value2: ValueId) -> ValueId {
        match self.factory.value(value2).clone() {
            Value::Call { .. } | Value::Argument { .. } => self.unify_two_unions(union1, value2),
            Value::And { union_values } => self.unify_union_with_and(union1, &union_values, value2),
            _ => unreachable!("unify_union on unsupported value"),
        }
    }

    /// Intersect two unions by method-method compatibility.
    fn unify_two_unions(&mut self, union1: ValueId, union2: ValueId) -> ValueId {
        let methods1: Vec<MethodId> = self
            .factory
            .methods_of(union1)
            .into_iter()
            .filter(|&m| {
                let value = self.factory.value_for(union1, m, self.semantics);
                self.union_contains_type(union2, value)
            })
            .collect();
        self.factory.set_methods(union1, methods1.clone());
        if methods1.is_empty() {
            self.factory.set_methods(union2, Vec::new());
            return self.empty_value();
        }
        if let [only] = methods1.as_slice() {
            let value = self.factory.value_for(union1, *only, self.semantics);
            let literal = self.new_literal(value);
            return self.unify(literal, union2);
        }

        let methods2: Vec<MethodId> = self
            .factory
            .methods_of(union2)
            .into_iter()
            .filter(|&m| {
                let value = self.factory.value_for(union2, m, self.semantics);
                self.union_contains_type(union1, value)
            })
            .collect();
        self.factory.set_methods(union2, methods2.clone());
        match methods2.as_slice() {
            [] => self.empty_value(),
            [only] => {
                let value = self.factory.value_for(union2, *only, self.semantics);
                self.new_literal(value)
            }
            _ => self.factory.new_and_value(vec![union1, union2]),
        }
    }

    /// Intersect a union against an and-value; two or more surviving
    /// branches absorb the union as a fresh conjunction.
    fn unify_union_with_and(
        &mut self,
        union1: ValueId,
        union_values: &[ValueId],
        and_value: ValueId,
    ) -> ValueId {
        let methods1: Vec<MethodId> = self
            .factory
            .methods_of(union1)
            .into_iter()
            .filter(|&m| {
                let value = self.factory.value_for(union1, m, self.semantics);
                self.and_contains_type(and_value, value)
            })
            .collect();
        self.factory.set_methods(union1, methods1.clone());
        match methods1.as_slice() {
            [] => self.empty_value(),
            [only] => {
                let value = self.factory.value_for(union1, *only, self.semantics);
                self.new_literal(value)
            }
            _ => {
                let mut branches = union_values.to_vec();
                branches.push(union1);
                self.factory.new_and_value(branches)
            }
        }
    }

    /// AndValue ∘ AndValue: keep the branches each side's constraint
    /// still admits, then collapse.
    fn unify_and(&mut self, and1: ValueId, and2: ValueId) -> ValueId {
        let branches1 = match self.factory.value(and1) {
            Value::And { union_values } => union_values.clone(),
            _ => unreachable!(),
        };
        let branches2 = match self.factory.value(and2) {
            Value::And { union_values } => union_values.clone(),
            _ => unreachable!(),
        };
        let mut survivors: Vec<ValueId> = branches1
            .into_iter()
            .filter(|&u| self.and_contains_union(and2, u))
            .collect();
        for union in branches2 {
            if self.and_contains_union(and1, union) && !survivors.contains(&union) {
                survivors.push(union);
            }
        }
        match survivors.as_slice() {
            [] => self.empty_value(),
            [only] => *only,
            _ => self.factory.new_and_value(survivors),
        }
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Collapse `value` to a ground literal when the evidence permits,
    /// otherwise hand it back unchanged.
    pub fn evaluate(&mut self, value: ValueId) -> ValueId {
        match self.factory.value(value).clone() {
            Value::Variable { .. } => {
                let current = self.factory.variable_value(value);
                self.evaluate(current)
            }
            Value::Null { value: base } => self.evaluate(base),
            Value::Call { .. } | Value::Argument { .. } => {
                match self.sole_union_type(value) {
                    Some(ty) => self.new_literal(ty),
                    None => value,
                }
            }
            Value::And { union_values } => {
                let mut ground: Option<ValueId> = None;
                for union in union_values {
                    let evaluated = self.evaluate(union);
                    if !matches!(self.factory.value(evaluated), Value::Literal { .. }) {
                        return value;
                    }
                    match ground {
                        None => ground = Some(evaluated),
                        Some(seen) if seen == evaluated => {}
                        Some(_) => return value,
                    }
                }
                ground.unwrap_or(value)
            }
            _ => value,
        }
    }

    /// The single type a union's surviving methods all agree on, if any.
    fn sole_union_type(&self, union: ValueId) -> Option<TypeId> {
        let methods = self.factory.methods_of(union);
        let mut agreed: Option<TypeId> = None;
        for method in methods {
            let ty = self.factory.value_for(union, method, self.semantics);
            match agreed {
                None => agreed = Some(ty),
                Some(seen) if seen == ty => {}
                Some(_) => return None,
            }
        }
        agreed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elang_core::sm::{Parameter, PredefinedName, Signature};
    use elang_core::tokens::TokenKind;
    use elang_core::CompilationSession;

    fn session() -> CompilationSession {
        CompilationSession::new()
    }

    #[test]
    fn unify_identity() {
        let session = session();
        let mut factory = Factory::new(&session);
        let int32 = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(int32, int32), int32);
    }

    #[test]
    fn any_is_unit() {
        let session = session();
        let mut factory = Factory::new(&session);
        let any = factory.any_value();
        let int32 = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(any, int32), int32);
        assert_eq!(evaluator.unify(int32, any), int32);
    }

    #[test]
    fn literal_subtype_picks_narrower() {
        let session = session();
        let mut factory = Factory::new(&session);
        let int32 = factory.int32_value();
        let int64 = factory.int64_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(int32, int64), int32);
        assert_eq!(evaluator.unify(int64, int32), int32);
    }

    #[test]
    fn unrelated_literals_yield_empty() {
        let session = session();
        let mut factory = Factory::new(&session);
        let int32 = factory.int32_value();
        let uint32 = factory.uint32_value();
        let empty = factory.empty_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(int32, uint32), empty);
    }

    #[test]
    fn null_unifies_through_base() {
        let session = session();
        let mut factory = Factory::new(&session);
        let string = factory.new_literal(session.predefined_type_of(PredefinedName::String));
        let null = factory.new_null_value(string);
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(null, string), string);
    }

    #[test]
    fn variable_absorbs_evidence() {
        let mut session = session();
        let decl = session.ast.new_variable_decl("x");
        let mut factory = Factory::new(&session);
        let any = factory.any_value();
        let var = factory.new_variable(decl, any);
        let int32 = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.unify(var, int32), int32);
        assert_eq!(evaluator.evaluate(var), int32);
    }

    #[test]
    fn call_value_prunes_against_expected_type() {
        let mut session = session();
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let string = session.predefined_type_of(PredefinedName::String);
        let m_int = session.semantics.new_method(
            "f",
            Signature {
                return_type: int32,
                parameters: vec![Parameter {
                    name: "a".to_string(),
                    ty: int32,
                    position: 0,
                    is_rest: false,
                }],
            },
        );
        let m_str = session.semantics.new_method(
            "f",
            Signature {
                return_type: string,
                parameters: vec![Parameter {
                    name: "a".to_string(),
                    ty: string,
                    position: 0,
                    is_rest: false,
                }],
            },
        );
        let callee = session.ast.new_name_reference("f");
        let arg = session.ast.new_literal(TokenKind::Int32Literal(1));
        let call = session.ast.new_call(callee, vec![arg]);

        let mut factory = Factory::new(&session);
        let call_value = factory.new_call_value(call);
        factory.set_methods(call_value, vec![m_int, m_str]);
        let int32_value = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        let result = evaluator.unify(int32_value, call_value);
        assert_eq!(result, int32_value);
        assert_eq!(factory.methods_of(call_value), vec![m_int]);
    }

    #[test]
    fn argument_prunes_call_methods() {
        let mut session = session();
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let string = session.predefined_type_of(PredefinedName::String);
        let void = session.predefined_type_of(PredefinedName::Void);
        let m_int = session.semantics.new_method(
            "f",
            Signature {
                return_type: void,
                parameters: vec![Parameter {
                    name: "a".to_string(),
                    ty: int32,
                    position: 0,
                    is_rest: false,
                }],
            },
        );
        let m_str = session.semantics.new_method(
            "f",
            Signature {
                return_type: void,
                parameters: vec![Parameter {
                    name: "a".to_string(),
                    ty: string,
                    position: 0,
                    is_rest: false,
                }],
            },
        );
        let callee = session.ast.new_name_reference("f");
        let arg = session.ast.new_literal(TokenKind::Int32Literal(1));
        let call = session.ast.new_call(callee, vec![arg]);

        let mut factory = Factory::new(&session);
        let call_value = factory.new_call_value(call);
        factory.set_methods(call_value, vec![m_int, m_str]);
        let argument = factory.new_argument(call_value, 0);
        let int32_value = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        let result = evaluator.unify(int32_value, argument);
        // The int32 argument admits only f(int32); the surviving
        // parameter type comes back as the literal.
        assert_eq!(result, int32_value);
        assert_eq!(factory.methods_of(call_value), vec![m_int]);
    }

    #[test]
    fn evaluate_collapses_agreeing_union() {
        let mut session = session();
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let sig = |ret| Signature {
            return_type: ret,
            parameters: vec![],
        };
        let m1 = session.semantics.new_method("f", sig(int32));
        let m2 = session.semantics.new_method("f", sig(int32));
        let callee = session.ast.new_name_reference("f");
        let call = session.ast.new_call(callee, vec![]);

        let mut factory = Factory::new(&session);
        let call_value = factory.new_call_value(call);
        factory.set_methods(call_value, vec![m1, m2]);
        let int32_value = factory.int32_value();
        let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
        assert_eq!(evaluator.evaluate(call_value), int32_value);
    }
}
