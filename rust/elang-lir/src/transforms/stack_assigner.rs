//! Stack-frame layout.
//!
//! Turns abstract spill-slot offsets into concrete `[RSP+offset]`
//! positions and publishes prologue/epilogue sequences. Leaf functions
//! get a bare `sub`/`add RSP` frame; non-leaf functions additionally
//! reserve the outgoing shadow area (32 bytes plus stack homes for
//! arguments beyond the four register parameters) and keep RSP
//! 16-aligned at call sites.

use super::register_assignments::{RegisterAssignments, StackAssignments};
use crate::function::{NewInstruction, Opcode};
use crate::target::{Register, Target, SHADOW_AREA_SIZE};
use crate::value::{Value, ValueSize};
use std::collections::HashMap;

fn round_up(value: i32, alignment: i32) -> i32 {
    (value + alignment - 1) / alignment * alignment
}

/// Slots at or above the return-address position shift past it.
fn stack_offset(offset: i32, return_offset: i32) -> i32 {
    if offset >= return_offset {
        offset + 8
    } else {
        offset
    }
}

pub struct StackAssigner<'a> {
    assignments: &'a mut RegisterAssignments,
    stack_assignments: &'a mut StackAssignments,
}

impl<'a> StackAssigner<'a> {
    pub fn new(
        assignments: &'a mut RegisterAssignments,
        stack_assignments: &'a mut StackAssignments,
    ) -> Self {
        Self {
            assignments,
            stack_assignments,
        }
    }

    pub fn run(mut self) {
        if self.stack_assignments.is_leaf() {
            self.run_for_leaf_function();
        } else {
            self.run_for_non_leaf_function();
        }
    }

    // Stack layout of a leaf function; RBP is not used.
    //
    //          +----------------+
    // RSP ---->| local[0]       |
    //          +----------------+
    //          | local[8]       |
    //          +----------------+
    //          | saved regs     |
    //          +----------------+
    // RSP+N    | return address |
    //          +----------------+
    fn run_for_leaf_function(&mut self) {
        const ALIGNMENT: i32 = 8;
        let preserved = self.stack_assignments.preserving_registers.clone();
        let using_size =
            self.stack_assignments.maximum_size + preserved.len() as i32 * ALIGNMENT;
        let size = round_up(using_size, ALIGNMENT);
        Self::emit_frame_adjust(self.stack_assignments, size);

        let return_offset = size;
        self.relocate_spill_slots(0, return_offset);
        let base = self.stack_assignments.maximum_size;
        Self::emit_preserved_saves(self.stack_assignments, &preserved, base, return_offset);
    }

    // Non-leaf frames put the outgoing area (shadow space plus homes
    // for arguments past the fourth) at RSP+0 and the spill area above
    // it, keeping RSP+size+8 a multiple of 16 at every call.
    fn run_for_non_leaf_function(&mut self) {
        const ALIGNMENT: i32 = 8;
        let preserved = self.stack_assignments.preserving_registers.clone();
        let outgoing = SHADOW_AREA_SIZE
            + (self.stack_assignments.maximum_argc as i32 - 4).max(0) * 8;
        let using_size = outgoing
            + self.stack_assignments.maximum_size
            + preserved.len() as i32 * ALIGNMENT;
        let mut size = round_up(using_size, ALIGNMENT);
        if (size + 8) % 16 != 0 {
            size += 8;
        }
        Self::emit_frame_adjust(self.stack_assignments, size);

        let return_offset = size;
        self.relocate_spill_slots(outgoing, return_offset);
        let base = outgoing + self.stack_assignments.maximum_size;
        Self::emit_preserved_saves(self.stack_assignments, &preserved, base, return_offset);
    }

    fn emit_frame_adjust(stack_assignments: &mut StackAssignments, size: i32) {
        if size == 0 {
            return;
        }
        let rsp = Target::register_of(Register::RSP);
        let amount = Value::immediate(ValueSize::Size32, size);
        stack_assignments.prologue.push(NewInstruction {
            opcode: Opcode::Sub,
            outputs: vec![rsp],
            inputs: vec![rsp, amount],
        });
        stack_assignments.epilogue.push(NewInstruction {
            opcode: Opcode::Add,
            outputs: vec![rsp],
            inputs: vec![rsp, amount],
        });
    }

    /// Shift every abstract spill slot by `base` and past the return
    /// address where applicable.
    fn relocate_spill_slots(&mut self, base: i32, return_offset: i32) {
        let mut translation: HashMap<Value, Value> = HashMap::new();
        for (_, &slot) in self.assignments.stack_slot_map() {
            let offset = stack_offset(slot.data + base, return_offset);
            translation.insert(slot, Value::new(slot.ty, slot.size, slot.kind, offset));
        }
        self.assignments.update_stack_slots(&translation);
    }

    fn emit_preserved_saves(
        stack_assignments: &mut StackAssignments,
        preserved: &[Value],
        base: i32,
        return_offset: i32,
    ) {
        let mut offset = base;
        for &register in preserved {
            let slot_offset = stack_offset(offset, return_offset);
            let slot = Value::stack_slot(Value::type_of(register), slot_offset);
            stack_assignments
                .prologue
                .push(NewInstruction::copy(slot, register));
            stack_assignments
                .epilogue
                .insert(0, NewInstruction::copy(register, slot));
            offset += 8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_frame_adjusts_rsp_once() {
        let mut assignments = RegisterAssignments::new();
        let mut stack_assignments = StackAssignments {
            maximum_size: 12,
            ..StackAssignments::new()
        };
        StackAssigner::new(&mut assignments, &mut stack_assignments).run();
        assert_eq!(stack_assignments.prologue.len(), 1);
        assert_eq!(stack_assignments.prologue[0].opcode, Opcode::Sub);
        assert_eq!(stack_assignments.prologue[0].inputs[1].data, 16);
        assert_eq!(stack_assignments.epilogue.len(), 1);
        assert_eq!(stack_assignments.epilogue[0].opcode, Opcode::Add);
    }

    #[test]
    fn non_leaf_frame_reserves_shadow_area_and_aligns() {
        let mut assignments = RegisterAssignments::new();
        let vreg = Value::new(
            crate::value::ValueType::Integer,
            ValueSize::Size64,
            crate::value::ValueKind::VirtualRegister,
            0,
        );
        let slot = Value::stack_slot(Value::int64_type(), 0);
        assignments.set_spill_slot(vreg, slot);
        let mut stack_assignments = StackAssignments {
            number_of_calls: 1,
            maximum_argc: 6,
            maximum_size: 8,
            ..StackAssignments::new()
        };
        StackAssigner::new(&mut assignments, &mut stack_assignments).run();
        // 32 shadow + 2 extra arg homes + 8 spill = 56; +8 for the
        // 16-byte call alignment.
        assert_eq!(stack_assignments.prologue[0].inputs[1].data, 56);
        // The spill slot moved above the outgoing area.
        let relocated = assignments.spill_slot_of(vreg).unwrap();
        assert_eq!(relocated.data, 48);
    }

    #[test]
    fn zero_sized_leaf_frame_has_no_prologue() {
        let mut assignments = RegisterAssignments::new();
        let mut stack_assignments = StackAssignments::new();
        StackAssigner::new(&mut assignments, &mut stack_assignments).run();
        assert!(stack_assignments.prologue.is_empty());
        assert!(stack_assignments.epilogue.is_empty());
    }
}
