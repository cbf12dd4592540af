//! x64 lowering.
//!
//! Rewrites three-address arithmetic into the ISA's destructive
//! two-address form (a copy feeds the output register, which then
//! serves as both first input and output), and pins `Mul`/`Div`
//! operands to their architectural RAX/RDX homes.

use crate::editor::Editor;
use crate::function::{InstrId, Opcode};
use crate::target::{Register, Target};
use crate::value::Value;

pub struct LoweringX64Pass<'a, 'b> {
    editor: &'a mut Editor<'b>,
}

impl<'a, 'b> LoweringX64Pass<'a, 'b> {
    pub fn new(editor: &'a mut Editor<'b>) -> Self {
        Self { editor }
    }

    pub fn run(&mut self) {
        let blocks = self.editor.function().block_order().to_vec();
        for block in blocks {
            let instructions = self.editor.function().block(block).instructions.clone();
            self.editor.edit(block);
            for instr in instructions {
                self.rewrite(instr);
            }
            self.editor.commit();
        }
    }

    fn rewrite(&mut self, instr: InstrId) {
        match self.editor.function().instr(instr).opcode {
            Opcode::Add
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitXor
            | Opcode::Sub => self.rewrite_to_two_operands(instr),
            Opcode::Shl | Opcode::Shr | Opcode::UShr => self.rewrite_shift(instr),
            Opcode::Mul => self.rewrite_mul(instr),
            Opcode::Div => self.rewrite_div(instr),
            _ => {}
        }
    }

    /// `out = op left, right` becomes `copy out <- left; op out <- out,
    /// right`.
    fn rewrite_to_two_operands(&mut self, instr: InstrId) {
        let (output, left) = {
            let i = self.editor.function().instr(instr);
            (i.output(0), i.input(0))
        };
        if left == output {
            return;
        }
        let copy = self
            .editor
            .new_instruction(Opcode::Copy, vec![output], vec![left]);
        self.editor.insert_before(copy, instr);
        self.editor.set_input(instr, 0, output);
    }

    /// Shift counts live in CL unless they are immediates.
    fn rewrite_shift(&mut self, instr: InstrId) {
        self.rewrite_to_two_operands(instr);
        let count = self.editor.function().instr(instr).input(1);
        if count.is_immediate() {
            return;
        }
        let cl = Target::register_of(Register::CL);
        let copy = self.editor.new_instruction(Opcode::Copy, vec![cl], vec![count]);
        self.editor.insert_before(copy, instr);
        self.editor.set_input(instr, 1, cl);
    }

    /// `mul` reads and writes RAX with the high part in RDX.
    fn rewrite_mul(&mut self, instr: InstrId) {
        let (output, left) = {
            let i = self.editor.function().instr(instr);
            (i.output(0), i.input(0))
        };
        let rax = Target::adjust_size(output, Target::register_of(Register::RAX));
        let copy_in = self.editor.new_instruction(Opcode::Copy, vec![rax], vec![left]);
        self.editor.insert_before(copy_in, instr);
        self.editor.set_input(instr, 0, rax);
        self.editor.set_output(instr, 0, rax);
        let copy_out = self
            .editor
            .new_instruction(Opcode::Copy, vec![output], vec![rax]);
        self.editor.insert_after_in_block(copy_out, instr);
    }

    /// `div` takes the dividend in RAX (RDX zeroed by the emitter) and
    /// leaves the quotient in RAX.
    fn rewrite_div(&mut self, instr: InstrId) {
        self.rewrite_mul(instr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;

    #[test]
    fn add_becomes_destructive() {
        let mut factory = Factory::new();
        let a = factory.new_register(Value::int32_type());
        let b = factory.new_register(Value::int32_type());
        let out = factory.new_register(Value::int32_type());
        let mut function = factory.new_function();
        let entry = function.entry_block;
        let add = {
            let mut editor = Editor::new(&mut factory, &mut function);
            editor.edit(entry);
            let def_a = editor.new_instruction(Opcode::Literal, vec![a], vec![Value::small_int32(1)]);
            let def_b = editor.new_instruction(Opcode::Literal, vec![b], vec![Value::small_int32(2)]);
            let add = editor.new_instruction(Opcode::Add, vec![out], vec![a, b]);
            editor.append(def_a);
            editor.append(def_b);
            editor.append(add);
            assert!(editor.commit());
            add
        };

        {
            let mut editor = Editor::new(&mut factory, &mut function);
            LoweringX64Pass::new(&mut editor).run();
        }

        let instr = function.instr(add);
        assert_eq!(instr.input(0), out);
        assert_eq!(instr.input(1), b);
        // The copy sits immediately before the add.
        let block = function.block(entry);
        let position = block.instructions.iter().position(|&i| i == add).unwrap();
        let copy = function.instr(block.instructions[position - 1]);
        assert_eq!(copy.opcode, Opcode::Copy);
        assert_eq!(copy.output(0), out);
        assert_eq!(copy.input(0), a);
    }

    #[test]
    fn mul_is_pinned_to_rax() {
        let mut factory = Factory::new();
        let a = factory.new_register(Value::int32_type());
        let b = factory.new_register(Value::int32_type());
        let out = factory.new_register(Value::int32_type());
        let mut function = factory.new_function();
        let entry = function.entry_block;
        let mul = {
            let mut editor = Editor::new(&mut factory, &mut function);
            editor.edit(entry);
            let def_a = editor.new_instruction(Opcode::Literal, vec![a], vec![Value::small_int32(3)]);
            let def_b = editor.new_instruction(Opcode::Literal, vec![b], vec![Value::small_int32(4)]);
            let mul = editor.new_instruction(Opcode::Mul, vec![out], vec![a, b]);
            editor.append(def_a);
            editor.append(def_b);
            editor.append(mul);
            assert!(editor.commit());
            mul
        };

        {
            let mut editor = Editor::new(&mut factory, &mut function);
            LoweringX64Pass::new(&mut editor).run();
        }

        let eax = Target::adjust_size(Value::int32_type(), Target::register_of(Register::RAX));
        let instr = function.instr(mul);
        assert_eq!(instr.output(0), eax);
        assert_eq!(instr.input(0), eax);
    }
}
