//! Allocation results.
//!
//! The allocator never touches instructions; it fills these side
//! tables, and the rewrite pass applies them. Keys are
//! `(instruction, operand)` pairs plus a per-register spill-slot map
//! and per-instruction lists of actions to materialize before an
//! instruction.

use crate::function::{InstrId, NewInstruction};
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct RegisterAssignments {
    allocations: HashMap<(InstrId, Value), Value>,
    spill_slots: HashMap<Value, Value>,
    before_actions: HashMap<InstrId, Vec<NewInstruction>>,
    callee_saved_used: BTreeSet<Value>,
}

impl RegisterAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_allocation(&mut self, instr: InstrId, operand: Value, allocated: Value) {
        debug_assert!(operand.is_virtual());
        debug_assert!(allocated.is_physical() || allocated.is_memory_slot());
        self.allocations.insert((instr, operand), allocated);
    }

    pub fn allocation_of(&self, instr: InstrId, operand: Value) -> Option<Value> {
        self.allocations.get(&(instr, operand)).copied()
    }

    pub fn set_spill_slot(&mut self, vreg: Value, slot: Value) {
        debug_assert!(vreg.is_virtual());
        debug_assert!(slot.is_stack_slot());
        self.spill_slots.insert(vreg, slot);
    }

    pub fn spill_slot_of(&self, vreg: Value) -> Option<Value> {
        self.spill_slots.get(&vreg).copied()
    }

    pub fn stack_slot_map(&self) -> &HashMap<Value, Value> {
        &self.spill_slots
    }

    pub fn add_before_action(&mut self, instr: InstrId, action: NewInstruction) {
        self.before_actions.entry(instr).or_default().push(action);
    }

    pub fn before_actions_of(&self, instr: InstrId) -> &[NewInstruction] {
        self.before_actions
            .get(&instr)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn instructions_with_actions(&self) -> Vec<InstrId> {
        self.before_actions.keys().copied().collect()
    }

    /// First use of a callee-saved register; the stack assigner saves
    /// and restores every register recorded here.
    pub fn record_callee_saved(&mut self, natural: Value) {
        debug_assert!(natural.is_physical());
        self.callee_saved_used.insert(natural);
    }

    pub fn callee_saved_used(&self) -> impl Iterator<Item = Value> + '_ {
        self.callee_saved_used.iter().copied()
    }

    /// Replace abstract spill-slot offsets with their final frame
    /// positions, everywhere a slot value is recorded.
    pub fn update_stack_slots(&mut self, translation: &HashMap<Value, Value>) {
        let translate = |value: &mut Value| {
            if let Some(new) = translation.get(value) {
                *value = *new;
            }
        };
        for slot in self.spill_slots.values_mut() {
            translate(slot);
        }
        for allocated in self.allocations.values_mut() {
            translate(allocated);
        }
        for actions in self.before_actions.values_mut() {
            for action in actions {
                for output in &mut action.outputs {
                    translate(output);
                }
                for input in &mut action.inputs {
                    translate(input);
                }
            }
        }
    }
}

/// Frame bookkeeping gathered during allocation and consumed by the
/// stack assigner.
#[derive(Debug, Default)]
pub struct StackAssignments {
    pub number_of_calls: u32,
    pub maximum_argc: usize,
    /// Bytes of spill area requested from the stack allocator.
    pub maximum_size: i32,
    /// Incoming parameters homed on the stack (beyond the register
    /// parameters).
    pub number_of_parameters: usize,
    pub preserving_registers: Vec<Value>,
    pub prologue: Vec<NewInstruction>,
    pub epilogue: Vec<NewInstruction>,
}

impl StackAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_leaf(&self) -> bool {
        self.number_of_calls == 0
    }
}
