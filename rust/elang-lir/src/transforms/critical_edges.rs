//! Critical-edge removal (φ-inversion preparation).
//!
//! A φ-block's incoming copies need an exclusive landing site per
//! predecessor. For every edge `pred → block` where `block` carries
//! φ-instructions and `pred` has several successors, a fresh
//! single-predecessor block is spliced onto the edge.

use crate::editor::Editor;
use crate::function::BlockId;

pub struct RemoveCriticalEdgesPass<'a, 'b> {
    editor: &'a mut Editor<'b>,
}

impl<'a, 'b> RemoveCriticalEdgesPass<'a, 'b> {
    pub fn new(editor: &'a mut Editor<'b>) -> Self {
        Self { editor }
    }

    pub fn run(&mut self) {
        let mut critical: Vec<(BlockId, BlockId)> = Vec::new();
        for &block in self.editor.function().block_order() {
            if !self.editor.function().block(block).has_phis() {
                continue;
            }
            for &pred in &self.editor.function().block(block).predecessors {
                if self.editor.function().block(pred).successors.len() > 1 {
                    critical.push((pred, block));
                }
            }
        }

        for (pred, block) in critical {
            self.split_edge(pred, block);
        }
    }

    fn split_edge(&mut self, pred: BlockId, block: BlockId) {
        let landing = self.editor.new_basic_block(block);
        self.editor.edit(landing);
        self.editor.set_jump(block);
        self.editor.commit();

        let terminator = self
            .editor
            .function()
            .terminator_of(pred)
            .unwrap_or_else(|| unreachable!("predecessor without terminator"));
        self.editor.edit(pred);
        self.editor.replace_block_operand(terminator, block, landing);
        self.editor.commit();

        self.editor.replace_phi_predecessor(block, pred, landing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::function::Opcode;
    use crate::value::Value;

    #[test]
    fn splits_edge_from_branching_predecessor() {
        let mut factory = Factory::new();
        let v1 = factory.new_register(Value::int32_type());
        let v2 = factory.new_register(Value::int32_type());
        let phi_out = factory.new_register(Value::int32_type());
        let condition = factory.new_condition();
        let mut function = factory.new_function();
        let exit = function.exit_block;
        let entry = function.entry_block;

        // entry → {left, join}; left → join; join has a φ.
        let join = {
            let mut editor = Editor::new(&mut factory, &mut function);
            let left = editor.new_basic_block(exit);
            let join = editor.new_basic_block(exit);

            editor.edit(entry);
            let d1 = editor.new_instruction(Opcode::Literal, vec![v1], vec![Value::small_int32(1)]);
            editor.append(d1);
            editor.set_branch(condition, left, join);
            editor.commit();

            editor.edit(left);
            let d2 = editor.new_instruction(Opcode::Literal, vec![v2], vec![Value::small_int32(2)]);
            editor.append(d2);
            editor.set_jump(join);
            editor.commit();

            editor.edit(join);
            let phi = editor.new_phi(phi_out);
            editor.set_phi_input(phi, entry, v1);
            editor.set_phi_input(phi, left, v2);
            editor.set_ret();
            editor.commit();
            join
        };

        {
            let mut editor = Editor::new(&mut factory, &mut function);
            RemoveCriticalEdgesPass::new(&mut editor).run();
            assert!(editor.validate());
        }

        // entry no longer flows straight into the φ-block.
        assert!(!function.block(join).predecessors.contains(&entry));
        let phi = function.block(join).phis[0];
        for (pred, _) in &function.instr(phi).phi_inputs {
            assert!(function.block(join).predecessors.contains(pred));
            assert_eq!(function.block(*pred).successors.len(), 1);
        }
    }
}
