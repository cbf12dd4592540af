//! Register allocation.
//!
//! A dominator-tree walk with a linear local allocator per block. The
//! walk carries the allocation state of the immediate dominator into
//! each child, assigns φ outputs fresh registers at block heads, keeps
//! bidirectional vreg/register maps per instruction, spills by
//! farthest next use (preferring values whose slot is already
//! written), and saves caller-held values across calls. After the
//! walk, φ bindings expand into parallel copies on each incoming edge.
//!
//! Results land in [`RegisterAssignments`]; instructions are not
//! touched here.

use super::phi_expander::PhiExpander;
use super::register_assignments::{RegisterAssignments, StackAssignments};
use super::spill_manager::SpillManager;
use super::stack_allocator::StackAllocator;
use crate::analysis::dominators::DominatorTree;
use crate::analysis::usage::RegisterUsageTracker;
use crate::function::{BlockId, Function, InstrId, Opcode};
use crate::target::Target;
use crate::value::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Where every live virtual register sits at one program point.
/// Keys are vregs; values are physical registers (natural width) or
/// stack slots.
type AllocationState = BTreeMap<Value, Value>;

pub struct RegisterAllocator<'a> {
    function: &'a Function,
    assignments: &'a mut RegisterAssignments,
    stack_assignments: &'a mut StackAssignments,
    stack_allocator: StackAllocator,
    usage: RegisterUsageTracker,
    dominator_tree: DominatorTree,
    block_end_states: BTreeMap<BlockId, AllocationState>,
    phi_output_allocations: BTreeMap<BlockId, BTreeMap<Value, Value>>,
}

impl<'a> RegisterAllocator<'a> {
    pub fn new(
        function: &'a Function,
        assignments: &'a mut RegisterAssignments,
        stack_assignments: &'a mut StackAssignments,
    ) -> Self {
        Self {
            function,
            assignments,
            stack_assignments,
            stack_allocator: StackAllocator::new(8),
            usage: RegisterUsageTracker::new(function),
            dominator_tree: DominatorTree::compute(function),
            block_end_states: BTreeMap::new(),
            phi_output_allocations: BTreeMap::new(),
        }
    }

    /// The entry point.
    pub fn run(mut self) {
        let mut entry_state = AllocationState::new();
        for (position, &parameter) in self.function.parameters.iter().enumerate() {
            let home = Target::parameter_at(parameter, position);
            if home.is_physical() {
                entry_state.insert(parameter, Target::natural_register_of(home));
            } else {
                // Stack-homed parameters count toward the frame layout.
                self.stack_assignments.number_of_parameters += 1;
            }
        }

        // Dominator preorder, each child starting from its parent's
        // end state.
        self.process_block(self.function.entry_block, entry_state);

        // Expand φ bindings on every incoming edge.
        let mut expansions: Vec<(BlockId, Vec<crate::function::NewInstruction>)> = Vec::new();
        for &block in self.function.block_order() {
            if !self.function.block(block).has_phis() {
                continue;
            }
            let output_allocation = self.phi_output_allocations[&block].clone();
            for &pred in &self.function.block(block).predecessors {
                let pred_state = self.block_end_states[&pred].clone();
                let mut spill_manager =
                    SpillManager::new(self.assignments, &mut self.stack_allocator);
                let expander = PhiExpander::new(
                    self.function,
                    &mut spill_manager,
                    block,
                    pred,
                    &pred_state,
                    &output_allocation,
                );
                expansions.push((pred, expander.expand()));
            }
        }
        for (pred, actions) in expansions {
            let terminator = self
                .function
                .terminator_of(pred)
                .unwrap_or_else(|| unreachable!("predecessor without terminator"));
            for action in actions {
                self.assignments.add_before_action(terminator, action);
            }
        }

        self.stack_assignments.maximum_size = self.stack_allocator.required_size();
    }

    fn process_block(&mut self, block: BlockId, mut state: AllocationState) {
        trace!(block = block.0, "allocating block");

        // φ outputs receive registers at the block head.
        let mut phi_allocations = BTreeMap::new();
        for &phi in &self.function.block(block).phis {
            let output = self.function.instr(phi).output(0);
            let allocated = self.allocate_register(phi, output, &mut state);
            self.assignments.set_allocation(phi, output, allocated);
            phi_allocations.insert(
                output,
                if allocated.is_physical() {
                    Target::natural_register_of(allocated)
                } else {
                    allocated
                },
            );
        }
        self.phi_output_allocations.insert(block, phi_allocations);

        let instructions = self.function.block(block).instructions.clone();
        for instr in instructions {
            self.process_instruction(instr, &mut state);
        }

        self.block_end_states.insert(block, state.clone());

        let children = self.dominator_tree.children_of(block).to_vec();
        for child in children {
            self.process_block(child, state.clone());
        }
    }

    fn process_instruction(&mut self, instr: InstrId, state: &mut AllocationState) {
        let opcode = self.function.instr(instr).opcode;

        // Inputs first: every virtual input must sit in a register.
        let inputs = self.function.instr(instr).inputs.clone();
        for &input in &inputs {
            if !input.is_virtual() {
                continue;
            }
            let location = *state
                .get(&input)
                .unwrap_or_else(|| unreachable!("use of unallocated register {}", input));
            let physical = if location.is_physical() {
                location
            } else {
                // Reload from the spill slot.
                let physical = self.allocate_physical(instr, input, state);
                let mut spill_manager =
                    SpillManager::new(self.assignments, &mut self.stack_allocator);
                let reload = spill_manager.new_reload(
                    Target::adjust_size(input, physical),
                    input,
                );
                self.assignments.add_before_action(instr, reload);
                state.insert(input, physical);
                physical
            };
            self.assignments
                .set_allocation(instr, input, Target::adjust_size(input, physical));
        }

        if opcode == Opcode::Call {
            self.process_call(instr, state);
        }

        // Fixed physical outputs evict their current holder.
        let outputs = self.function.instr(instr).outputs.clone();
        for &output in &outputs {
            if output.is_physical() {
                self.evict(instr, Target::natural_register_of(output), state);
            }
        }
        for &output in &outputs {
            if !output.is_virtual() {
                continue;
            }
            // The destructive two-address form redefines an input in
            // place; keep its register.
            if let Some(&location) = state.get(&output) {
                if location.is_physical() {
                    self.assignments.set_allocation(
                        instr,
                        output,
                        Target::adjust_size(output, location),
                    );
                    continue;
                }
            }
            let allocated = self.allocate_register(instr, output, state);
            self.assignments.set_allocation(instr, output, allocated);
        }

        // Release registers whose value is dead past this instruction.
        for &input in &inputs {
            if !input.is_virtual() {
                continue;
            }
            if self.usage.is_used_after(self.function, input, instr) {
                continue;
            }
            state.remove(&input);
            if let Some(slot) = self.assignments.spill_slot_of(input) {
                self.stack_allocator.free(slot);
            }
        }
    }

    /// Save every caller-held value that survives the call, then drop
    /// it from the register file.
    fn process_call(&mut self, instr: InstrId, state: &mut AllocationState) {
        self.stack_assignments.number_of_calls += 1;
        let argc = self.function.instr(instr).inputs.len().saturating_sub(1);
        self.stack_assignments.maximum_argc = self.stack_assignments.maximum_argc.max(argc);

        let held: Vec<(Value, Value)> = state
            .iter()
            .filter(|(_, location)| location.is_physical())
            .map(|(&vreg, &location)| (vreg, location))
            .collect();
        for (vreg, physical) in held {
            if !Target::is_caller_saved_register(physical) {
                continue;
            }
            if self.usage.is_used_after(self.function, vreg, instr) {
                if self.assignments.spill_slot_of(vreg).is_none() {
                    let mut spill_manager =
                        SpillManager::new(self.assignments, &mut self.stack_allocator);
                    let spill =
                        spill_manager.new_spill(vreg, Target::adjust_size(vreg, physical));
                    self.assignments.add_before_action(instr, spill);
                }
                let slot = self
                    .assignments
                    .spill_slot_of(vreg)
                    .unwrap_or_else(|| unreachable!());
                state.insert(vreg, slot);
                debug!(%vreg, "spilled across call");
            } else {
                state.remove(&vreg);
            }
        }
    }

    /// A register for `output`, spilling a victim when the bank is
    /// full. Returns the allocation sized to `output`.
    fn allocate_register(
        &mut self,
        instr: InstrId,
        output: Value,
        state: &mut AllocationState,
    ) -> Value {
        let physical = self.allocate_physical(instr, output, state);
        state.insert(output, physical);
        Target::adjust_size(output, physical)
    }

    /// A free physical register of `model`'s bank (natural width), by
    /// preference order; spills the farthest-used holder when full.
    fn allocate_physical(
        &mut self,
        instr: InstrId,
        model: Value,
        state: &mut AllocationState,
    ) -> Value {
        for candidate in Target::allocatable_registers_for(model) {
            let natural = Target::natural_register_of(candidate);
            if state.values().any(|&location| location == natural) {
                continue;
            }
            if Target::is_callee_saved_register(natural) {
                self.assignments.record_callee_saved(natural);
                if !self.stack_assignments.preserving_registers.contains(&natural) {
                    self.stack_assignments.preserving_registers.push(natural);
                }
            }
            return natural;
        }
        self.spill_for(instr, model, state)
    }

    /// Choose the victim whose next use is farthest away, preferring
    /// one whose slot is already written so no store is needed.
    fn spill_for(&mut self, instr: InstrId, model: Value, state: &mut AllocationState) -> Value {
        let mut victim: Option<(Value, Value, u32)> = None;
        let mut stored_victim: Option<(Value, Value, u32)> = None;
        for (&vreg, &location) in state.iter() {
            if !location.is_physical() || location.ty != model.ty {
                continue;
            }
            // Operands of the current instruction are pinned.
            if self.function.instr(instr).inputs.contains(&vreg) {
                continue;
            }
            let distance = self.usage.next_use_distance(self.function, vreg, instr);
            let entry = (vreg, location, distance);
            if self.assignments.spill_slot_of(vreg).is_some() {
                if stored_victim.map_or(true, |(_, _, d)| distance > d) {
                    stored_victim = Some(entry);
                }
            } else if victim.map_or(true, |(_, _, d)| distance > d) {
                victim = Some(entry);
            }
        }
        let (vreg, physical, _) = stored_victim
            .or(victim)
            .unwrap_or_else(|| unreachable!("no spillable register for {}", model));
        debug!(%vreg, %physical, "spilling farthest next use");
        if self.assignments.spill_slot_of(vreg).is_none() {
            let mut spill_manager = SpillManager::new(self.assignments, &mut self.stack_allocator);
            let spill = spill_manager.new_spill(vreg, Target::adjust_size(vreg, physical));
            self.assignments.add_before_action(instr, spill);
        }
        let slot = self
            .assignments
            .spill_slot_of(vreg)
            .unwrap_or_else(|| unreachable!());
        state.insert(vreg, slot);
        physical
    }

    /// Force `natural` free for a fixed-register constraint.
    fn evict(&mut self, instr: InstrId, natural: Value, state: &mut AllocationState) {
        let holder = state
            .iter()
            .find(|(_, &location)| location == natural)
            .map(|(&vreg, _)| vreg);
        let Some(vreg) = holder else {
            return;
        };
        if self.usage.is_used_after(self.function, vreg, instr) {
            if self.assignments.spill_slot_of(vreg).is_none() {
                let mut spill_manager =
                    SpillManager::new(self.assignments, &mut self.stack_allocator);
                let spill = spill_manager.new_spill(vreg, Target::adjust_size(vreg, natural));
                self.assignments.add_before_action(instr, spill);
            }
            let slot = self
                .assignments
                .spill_slot_of(vreg)
                .unwrap_or_else(|| unreachable!());
            state.insert(vreg, slot);
        } else {
            state.remove(&vreg);
        }
    }
}
