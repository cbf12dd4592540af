//! Arity-based filtering of method groups.

use super::values::ValueId;
use elang_core::sm::{MethodGroupId, MethodId, SemanticFactory};

pub struct MethodResolver<'a> {
    semantics: &'a SemanticFactory,
}

impl<'a> MethodResolver<'a> {
    pub fn new(semantics: &'a SemanticFactory) -> Self {
        Self { semantics }
    }

    fn is_applicable(&self, method: MethodId, arity: usize) -> bool {
        let signature = &self.semantics.method(method).signature;
        arity >= signature.minimum_arity() && arity <= signature.maximum_arity()
    }

    /// Methods of `group` whose signature accepts `arity` arguments.
    // TODO(analysis): search base classes once method groups record
    // their owner class.
    pub fn compute_applicable_methods(
        &self,
        group: MethodGroupId,
        _expected: ValueId,
        arity: usize,
    ) -> Vec<MethodId> {
        self.semantics
            .method_group(group)
            .methods
            .iter()
            .copied()
            .filter(|&method| self.is_applicable(method, arity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::factory::Factory;
    use elang_core::sm::{Parameter, PredefinedName, Signature};
    use elang_core::CompilationSession;

    #[test]
    fn filters_by_arity() {
        let mut session = CompilationSession::new();
        let int32 = session.predefined_type_of(PredefinedName::Int32);
        let param = |pos| Parameter {
            name: format!("p{}", pos),
            ty: int32,
            position: pos,
            is_rest: false,
        };
        let unary = session.semantics.new_method(
            "f",
            Signature {
                return_type: int32,
                parameters: vec![param(0)],
            },
        );
        let binary = session.semantics.new_method(
            "f",
            Signature {
                return_type: int32,
                parameters: vec![param(0), param(1)],
            },
        );
        let group = session.semantics.new_method_group("f", vec![unary, binary]);
        let factory = Factory::new(&session);
        let resolver = MethodResolver::new(&session.semantics);
        let methods = resolver.compute_applicable_methods(group, factory.any_value(), 1);
        assert_eq!(methods, vec![unary]);
    }
}
