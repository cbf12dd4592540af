//! Register-assignment pass.
//!
//! Runs the allocator and the stack assigner, then rewrites the
//! instruction stream: materializes queued reload/spill/φ-copy
//! actions, substitutes every virtual operand with its allocation,
//! splices the prologue and epilogue, deletes the expanded
//! φ-instructions, and drops copies that became identities.

use super::register_allocator::RegisterAllocator;
use super::register_assignments::{RegisterAssignments, StackAssignments};
use super::stack_assigner::StackAssigner;
use crate::editor::Editor;
use crate::function::{BlockId, InstrId, Opcode};
use crate::value::Value;
use tracing::debug;

pub struct RegisterAssignmentsPass<'a, 'b> {
    editor: &'a mut Editor<'b>,
    assignments: RegisterAssignments,
    stack_assignments: StackAssignments,
    useless_instructions: Vec<InstrId>,
}

impl<'a, 'b> RegisterAssignmentsPass<'a, 'b> {
    pub fn new(editor: &'a mut Editor<'b>) -> Self {
        Self {
            editor,
            assignments: RegisterAssignments::new(),
            stack_assignments: StackAssignments::new(),
            useless_instructions: Vec::new(),
        }
    }

    pub fn run(&mut self) {
        {
            let allocator = RegisterAllocator::new(
                self.editor.function(),
                &mut self.assignments,
                &mut self.stack_assignments,
            );
            allocator.run();
        }
        StackAssigner::new(&mut self.assignments, &mut self.stack_assignments).run();

        self.insert_prologue();
        let blocks = self.editor.function().block_order().to_vec();
        for block in blocks {
            self.rewrite_block(block);
        }
        debug!(
            removed = self.useless_instructions.len(),
            "dropping identity copies"
        );
        self.editor
            .bulk_remove_instructions(&self.useless_instructions.clone());
    }

    fn insert_prologue(&mut self) {
        if self.stack_assignments.prologue.is_empty() {
            return;
        }
        let entry = self.editor.entry_block();
        // The frame setup goes right after the entry marker.
        let reference = self.editor.function().block(entry).instructions[1];
        self.editor.edit(entry);
        for spec in self.stack_assignments.prologue.clone() {
            let instr = self.editor.materialize(&spec);
            self.editor.insert_before(instr, reference);
        }
        self.editor.commit();
    }

    fn rewrite_block(&mut self, block: BlockId) {
        self.editor.edit(block);

        let instructions = self.editor.function().block(block).instructions.clone();
        for instr in instructions {
            for spec in self.assignments.before_actions_of(instr).to_vec() {
                let action = self.editor.materialize(&spec);
                self.editor.insert_before(action, instr);
                self.note_if_useless(action);
            }
            self.rewrite_operands(instr);
            self.note_if_useless(instr);
        }

        // Epilogue runs right before returning.
        if let Some(terminator) = self.editor.function().terminator_of(block) {
            if self.editor.function().instr(terminator).opcode == Opcode::Ret {
                for spec in self.stack_assignments.epilogue.clone() {
                    let action = self.editor.materialize(&spec);
                    self.editor.insert_before(action, terminator);
                }
            }
        }

        // φs are fully represented by edge copies now.
        for phi in self.editor.function().block(block).phis.clone() {
            self.editor.remove(phi);
        }

        self.editor.commit();
    }

    fn rewrite_operands(&mut self, instr: InstrId) {
        let outputs = self.editor.function().instr(instr).outputs.clone();
        for (position, output) in outputs.into_iter().enumerate() {
            if let Some(allocated) = self.assignment_of(instr, output) {
                self.editor.set_output(instr, position, allocated);
            }
        }
        let inputs = self.editor.function().instr(instr).inputs.clone();
        for (position, input) in inputs.into_iter().enumerate() {
            if let Some(allocated) = self.assignment_of(instr, input) {
                self.editor.set_input(instr, position, allocated);
            }
        }
    }

    fn assignment_of(&self, instr: InstrId, operand: Value) -> Option<Value> {
        if !operand.is_virtual() {
            return None;
        }
        let allocated = self
            .assignments
            .allocation_of(instr, operand)
            .unwrap_or_else(|| unreachable!("operand {} was never allocated", operand));
        Some(allocated)
    }

    fn note_if_useless(&mut self, instr: InstrId) {
        let instruction = self.editor.function().instr(instr);
        if instruction.opcode == Opcode::Copy
            && instruction.outputs.first() == instruction.inputs.first()
        {
            self.useless_instructions.push(instr);
        }
    }
}
