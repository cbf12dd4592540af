//! φ expansion.
//!
//! For one `(φ-block, predecessor)` edge, turn the simultaneous φ
//! bindings into sequenced copies placed before the predecessor's
//! terminator. Each operand type expands independently; scratch
//! registers come from whatever is free on the edge. When nothing is
//! free one is synthesized by spilling, preferring a φ input that is
//! already spilled, then a φ output, then a live-through register.

use super::parallel_copy::ParallelCopyExpander;
use super::spill_manager::SpillManager;
use crate::function::{BlockId, Function, NewInstruction};
use crate::target::Target;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

fn expansion_types() -> [Value; 4] {
    [
        Value::int32_type(),
        Value::int64_type(),
        Value::float32_type(),
        Value::float64_type(),
    ]
}

pub struct PhiExpander<'a, 'b> {
    function: &'a Function,
    spill_manager: &'a mut SpillManager<'b>,
    phi_block: BlockId,
    predecessor: BlockId,
    /// Location of every value live at the predecessor's end.
    pred_allocation: &'a BTreeMap<Value, Value>,
    /// Location assigned to each φ output at the φ-block's head.
    output_allocation: &'a BTreeMap<Value, Value>,

    // Working state.
    allocations: BTreeMap<Value, Value>,
    scratch_registers: BTreeSet<Value>,
    input_registers: BTreeSet<Value>,
    output_registers: BTreeSet<Value>,
    live_registers: BTreeSet<Value>,
    spills: Vec<NewInstruction>,
    reloads: Vec<NewInstruction>,
}

impl<'a, 'b> PhiExpander<'a, 'b> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        function: &'a Function,
        spill_manager: &'a mut SpillManager<'b>,
        phi_block: BlockId,
        predecessor: BlockId,
        pred_allocation: &'a BTreeMap<Value, Value>,
        output_allocation: &'a BTreeMap<Value, Value>,
    ) -> Self {
        debug_assert!(function.block(phi_block).has_phis());
        Self {
            function,
            spill_manager,
            phi_block,
            predecessor,
            pred_allocation,
            output_allocation,
            allocations: BTreeMap::new(),
            scratch_registers: BTreeSet::new(),
            input_registers: BTreeSet::new(),
            output_registers: BTreeSet::new(),
            live_registers: BTreeSet::new(),
            spills: Vec::new(),
            reloads: Vec::new(),
        }
    }

    fn allocation_of(&self, value: Value) -> Value {
        if !value.is_virtual() {
            return value;
        }
        *self
            .allocations
            .get(&value)
            .unwrap_or_else(|| unreachable!("no allocation for {}", value))
    }

    /// The copies for this edge, in order: spills, moves, reloads.
    pub fn expand(mut self) -> Vec<NewInstruction> {
        // Seed the scratch pool with every allocatable register, then
        // subtract everything this edge touches.
        for bank in [Value::int64_type(), Value::float64_type()] {
            for register in Target::allocatable_registers_for(bank) {
                self.scratch_registers
                    .insert(Target::natural_register_of(register));
            }
        }

        let mut tasks: Vec<(Value, Value)> = Vec::new();
        for &phi in &self.function.block(self.phi_block).phis {
            let instr = self.function.instr(phi);
            let output = instr.output(0);
            self.output_registers.insert(output);
            let output_location = *self
                .output_allocation
                .get(&output)
                .unwrap_or_else(|| unreachable!("unallocated phi output {}", output));
            self.allocations.insert(output, output_location);
            if output_location.is_physical() {
                self.scratch_registers
                    .remove(&Target::natural_register_of(output_location));
            }

            let input = instr
                .phi_input_of(self.predecessor)
                .unwrap_or_else(|| unreachable!("phi without input for predecessor"));
            if !input.is_virtual() {
                tasks.push((output, input));
                continue;
            }
            self.input_registers.insert(input);
            let input_location = *self
                .pred_allocation
                .get(&input)
                .unwrap_or_else(|| unreachable!("phi input {} dead at predecessor", input));
            self.allocations.insert(input, input_location);
            if input_location.is_physical() {
                self.scratch_registers
                    .remove(&Target::natural_register_of(input_location));
            }
            if input_location == output_location {
                continue;
            }
            tasks.push((output, input));
        }

        if tasks.is_empty() {
            return Vec::new();
        }

        // Registers carrying live-through values are not scratch.
        for (&vreg, &location) in self.pred_allocation {
            if self.input_registers.contains(&vreg) || self.output_registers.contains(&vreg) {
                continue;
            }
            if location.is_physical() {
                self.live_registers.insert(vreg);
                self.scratch_registers
                    .remove(&Target::natural_register_of(location));
            }
        }

        let mut copies = Vec::new();
        for type_tag in expansion_types() {
            // The expander needs at most two scratch registers; one
            // synthesis attempt per round.
            for _round in 0..2 {
                let mut expander = ParallelCopyExpander::new(type_tag);
                // Registers are tracked at natural width; copies move
                // the operand width.
                let resize = |location: Value| {
                    if location.is_physical() {
                        Target::adjust_size(type_tag, location)
                    } else {
                        location
                    }
                };
                for &(output, input) in &tasks {
                    if output.ty != type_tag.ty || output.size != type_tag.size {
                        continue;
                    }
                    expander.add_task(
                        resize(self.allocation_of(output)),
                        resize(self.allocation_of(input)),
                    );
                }
                if !expander.has_tasks() {
                    break;
                }
                for &natural in &self.scratch_registers {
                    if natural.ty != type_tag.ty {
                        continue;
                    }
                    expander.add_scratch(natural);
                }
                if let Some(instructions) = expander.expand() {
                    copies.extend(instructions);
                    break;
                }
                trace!(block = self.phi_block.0, "synthesizing scratch register");
                if self.spill_from_input(type_tag) || self.spill_from_output(type_tag) {
                    continue;
                }
                self.spill_from_live_in(type_tag);
            }
        }

        let mut result = self.spills;
        result.extend(copies);
        result.extend(self.reloads);
        result
    }

    /// Free a register by parking a φ input in its spill slot. An
    /// input already stored needs no new store.
    fn spill_from_input(&mut self, type_tag: Value) -> bool {
        let mut candidate = None;
        for &input in &self.input_registers {
            if input.ty != type_tag.ty || input.size != type_tag.size {
                continue;
            }
            if !self.allocation_of(input).is_physical() {
                continue;
            }
            if self.spill_manager.spill_slot_of(input).is_some() {
                candidate = Some(input);
                break;
            }
            candidate.get_or_insert(input);
        }
        let Some(victim) = candidate else {
            return false;
        };
        let physical = self.allocation_of(victim);
        if self.spill_manager.spill_slot_of(victim).is_none() {
            let spill = self
                .spill_manager
                .new_spill(victim, Target::adjust_size(victim, physical));
            self.spills.push(spill);
        }
        let slot = self
            .spill_manager
            .spill_slot_of(victim)
            .unwrap_or_else(|| unreachable!());
        self.allocations.insert(victim, slot);
        self.scratch_registers
            .insert(Target::natural_register_of(physical));
        true
    }

    /// Free a register by writing a φ output to its spill slot and
    /// reloading it after the copies.
    fn spill_from_output(&mut self, type_tag: Value) -> bool {
        let mut candidate = None;
        for &output in &self.output_registers {
            if output.ty != type_tag.ty || output.size != type_tag.size {
                continue;
            }
            let physical = self.allocation_of(output);
            if !physical.is_physical() {
                continue;
            }
            if self.is_input_register(physical) {
                continue;
            }
            candidate = Some(output);
            break;
        }
        let Some(victim) = candidate else {
            return false;
        };
        let physical = self.allocation_of(victim);
        let slot = self.spill_manager.ensure_spill_slot(victim);
        self.allocations.insert(victim, slot);
        self.scratch_registers
            .insert(Target::natural_register_of(physical));
        let reload = self
            .spill_manager
            .new_reload(Target::adjust_size(victim, physical), victim);
        self.reloads.push(reload);
        true
    }

    /// Last resort: spill a live-through register around the copies.
    fn spill_from_live_in(&mut self, type_tag: Value) {
        let mut candidate = None;
        for &live in &self.live_registers {
            if live.ty != type_tag.ty || live.size != type_tag.size {
                continue;
            }
            if self.spill_manager.spill_slot_of(live).is_some() {
                candidate = Some(live);
                break;
            }
            candidate.get_or_insert(live);
        }
        let Some(victim) = candidate else {
            unreachable!("no spillable register for scratch synthesis");
        };
        let physical = *self
            .pred_allocation
            .get(&victim)
            .unwrap_or_else(|| unreachable!());
        if self.spill_manager.spill_slot_of(victim).is_none() {
            let spill = self
                .spill_manager
                .new_spill(victim, Target::adjust_size(victim, physical));
            self.spills.push(spill);
        }
        let reload = self
            .spill_manager
            .new_reload(Target::adjust_size(victim, physical), victim);
        self.reloads.push(reload);
        self.live_registers.remove(&victim);
        self.scratch_registers
            .insert(Target::natural_register_of(physical));
    }

    fn is_input_register(&self, physical: Value) -> bool {
        let natural = Target::natural_register_of(physical);
        self.input_registers.iter().any(|&input| {
            let location = self.allocation_of(input);
            location.is_physical() && Target::natural_register_of(location) == natural
        })
    }
}
