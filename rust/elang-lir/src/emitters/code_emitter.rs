//! Code emitter: drives the instruction handler over a function and
//! feeds the finished buffer into a machine-code builder.

use super::code_buffer::CodeBuffer;
use super::x64::InstructionHandlerX64;
use super::MachineCodeBuilder;
use crate::factory::Factory;
use crate::function::Function;

pub struct CodeEmitter<'a> {
    factory: &'a Factory,
    builder: &'a mut dyn MachineCodeBuilder,
}

impl<'a> CodeEmitter<'a> {
    pub fn new(factory: &'a Factory, builder: &'a mut dyn MachineCodeBuilder) -> Self {
        Self { factory, builder }
    }

    pub fn process(self, function: &Function) {
        let mut buffer = CodeBuffer::new();
        InstructionHandlerX64::new(self.factory, function, &mut buffer).process();
        buffer.finish(self.factory, self.builder);
    }
}
