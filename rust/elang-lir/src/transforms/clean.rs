//! Post-allocation CFG hygiene, after Cooper and Torczon,
//! "Engineering a Compiler": fold redundant branches, remove empty
//! blocks, combine straight-line pairs, hoist branches into jumping
//! predecessors. Iterates to fixpoint; reports nothing, only mutates.

use crate::editor::Editor;
use crate::function::{BlockId, Opcode};
use tracing::trace;

pub struct CleanPass<'a, 'b> {
    editor: &'a mut Editor<'b>,
    changed: bool,
}

impl<'a, 'b> CleanPass<'a, 'b> {
    pub fn new(editor: &'a mut Editor<'b>) -> Self {
        Self {
            editor,
            changed: false,
        }
    }

    pub fn run(&mut self) {
        loop {
            self.changed = false;
            self.clean();
            if !self.changed {
                break;
            }
        }
    }

    fn clean(&mut self) {
        let blocks = self.editor.function().block_order().to_vec();
        for block in blocks {
            if block == self.editor.exit_block() {
                continue;
            }
            let Some(terminator) = self.editor.function().terminator_of(block) else {
                continue;
            };
            match self.editor.function().instr(terminator).opcode {
                Opcode::Branch => self.clean_branch(block, terminator),
                Opcode::Jump => self.clean_jump(block, terminator),
                _ => {}
            }
        }
    }

    /// A conditional branch with both edges on one target is a jump.
    fn clean_branch(&mut self, block: BlockId, terminator: crate::function::InstrId) {
        let operands = self.editor.function().instr(terminator).block_operands.clone();
        if operands.len() == 2 && operands[0] == operands[1] {
            trace!(block = block.0, "folding redundant branch");
            self.editor.edit(block);
            self.editor.set_jump(operands[0]);
            self.editor.commit();
            self.changed = true;
        }
    }

    fn clean_jump(&mut self, block: BlockId, terminator: crate::function::InstrId) {
        let target = self.editor.function().instr(terminator).block_operand(0);

        // Remove an empty block: predecessors jump straight to the
        // target.
        if self.is_empty_block(block) && block != self.editor.entry_block() {
            let predecessors = self.editor.function().block(block).predecessors.clone();
            if !predecessors.is_empty() {
                trace!(block = block.0, "removing empty block");
                for pred in predecessors {
                    let Some(pred_terminator) = self.editor.function().terminator_of(pred) else {
                        continue;
                    };
                    self.editor.edit(pred);
                    self.editor.replace_block_operand(pred_terminator, block, target);
                    self.editor.commit();
                }
                self.changed = true;
            }
            self.remove_if_unreachable(block);
            return;
        }

        // Combine with the target when this is its only predecessor
        // and the target is not the exit block.
        if target != self.editor.exit_block()
            && self.editor.function().block(target).predecessors == vec![block]
            && self.editor.function().block(block).successors == vec![target]
        {
            trace!(block = block.0, target = target.0, "combining blocks");
            let moved = self.editor.function().block(target).instructions.clone();
            self.editor.edit(block);
            self.editor.remove(terminator);
            for instr in moved {
                self.editor.take_from_block(instr, target);
            }
            self.editor.commit();
            self.editor.function_remove_block(target);
            self.changed = true;
            return;
        }

        // Hoist a branch out of a trivial target: if the target holds
        // nothing but a branch, the jump becomes that branch.
        if target != block && self.is_branch_only_block(target) {
            let branch = self
                .editor
                .function()
                .terminator_of(target)
                .unwrap_or_else(|| unreachable!());
            let (condition, operands) = {
                let instr = self.editor.function().instr(branch);
                (instr.input(0), instr.block_operands.clone())
            };
            trace!(block = block.0, target = target.0, "hoisting branch");
            self.editor.edit(block);
            self.editor.set_branch(condition, operands[0], operands[1]);
            self.editor.commit();
            self.remove_if_unreachable(target);
            self.changed = true;
        }
    }

    /// Only a terminator (ignoring the entry marker).
    fn is_empty_block(&self, block: BlockId) -> bool {
        let instructions = &self.editor.function().block(block).instructions;
        instructions.len() == 1 && self.editor.function().block(block).phis.is_empty()
    }

    fn is_branch_only_block(&self, block: BlockId) -> bool {
        if !self.is_empty_block(block) {
            return false;
        }
        let Some(terminator) = self.editor.function().terminator_of(block) else {
            return false;
        };
        self.editor.function().instr(terminator).opcode == Opcode::Branch
    }

    fn remove_if_unreachable(&mut self, block: BlockId) {
        if self.editor.function().block(block).predecessors.is_empty() {
            self.editor.function_remove_block(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::function::Opcode;
    use crate::target::{Register, Target};
    use crate::value::Value;

    #[test]
    fn redundant_branch_folds_to_jump() {
        let mut factory = Factory::new();
        let condition = factory.new_condition();
        let mut function = factory.new_function();
        let exit = function.exit_block;
        let entry = function.entry_block;
        let target = {
            let mut editor = Editor::new(&mut factory, &mut function);
            let target = editor.new_basic_block(exit);
            editor.edit(target);
            editor.set_ret();
            editor.commit();
            editor.edit(entry);
            editor.set_branch(condition, target, target);
            editor.commit();

            CleanPass::new(&mut editor).run();
            target
        };
        let terminator = function.terminator_of(entry).unwrap();
        // Folded to a jump, then combined with its sole successor: the
        // ret ends up in the entry block.
        assert_ne!(function.instr(terminator).opcode, Opcode::Branch);
        assert!(!function.block_order().contains(&target));
        assert_eq!(function.instr(terminator).opcode, Opcode::Ret);
    }

    #[test]
    fn empty_block_is_threaded_away() {
        let mut factory = Factory::new();
        let mut function = factory.new_function();
        let exit = function.exit_block;
        let entry = function.entry_block;
        let (trampoline, landing) = {
            let mut editor = Editor::new(&mut factory, &mut function);
            let trampoline = editor.new_basic_block(exit);
            let landing = editor.new_basic_block(exit);
            editor.edit(landing);
            let eax = Target::register_of(Register::EAX);
            let lit =
                editor.new_instruction(Opcode::Literal, vec![eax], vec![Value::small_int32(7)]);
            editor.append(lit);
            editor.set_ret();
            editor.commit();
            editor.edit(trampoline);
            editor.set_jump(landing);
            editor.commit();
            editor.edit(entry);
            editor.set_jump(trampoline);
            editor.commit();

            CleanPass::new(&mut editor).run();
            (trampoline, landing)
        };
        assert!(!function.block_order().contains(&trampoline));
        // Entry flows into the landing code, directly or merged.
        let terminator = function.terminator_of(entry).unwrap();
        match function.instr(terminator).opcode {
            Opcode::Jump => {
                assert_eq!(function.instr(terminator).block_operand(0), landing);
            }
            Opcode::Ret => {}
            other => panic!("unexpected terminator {:?}", other),
        }
    }
}
