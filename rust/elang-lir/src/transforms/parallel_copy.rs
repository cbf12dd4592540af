//! Parallel-copy sequencing.
//!
//! A set of simultaneous `dst <- src` moves of one operand type is
//! serialized into plain copies without clobbering a source that is
//! still needed. Memory-to-memory moves and cycles consume scratch
//! registers; when the expander runs out it reports failure and the
//! caller frees one by spilling.

use crate::function::NewInstruction;
use crate::target::Target;
use crate::value::Value;

pub struct ParallelCopyExpander {
    type_tag: Value,
    tasks: Vec<(Value, Value)>,
    scratches: Vec<Value>,
}

impl ParallelCopyExpander {
    pub fn new(type_tag: Value) -> Self {
        Self {
            type_tag,
            tasks: Vec::new(),
            scratches: Vec::new(),
        }
    }

    pub fn add_task(&mut self, dst: Value, src: Value) {
        debug_assert!(!dst.is_virtual() && !src.is_virtual());
        if dst == src {
            return;
        }
        self.tasks.push((dst, src));
    }

    pub fn add_scratch(&mut self, physical: Value) {
        debug_assert!(physical.is_physical());
        self.scratches.push(Target::adjust_size(self.type_tag, physical));
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Serialize the pending moves. `None` means a scratch register was
    /// needed but none is available; add one and retry.
    pub fn expand(&self) -> Option<Vec<NewInstruction>> {
        let mut tasks = self.tasks.clone();
        let mut free_scratches = self.scratches.clone();
        // Scratches lent to a cycle break return to the pool when the
        // rewritten task reading them retires.
        let mut lent: Vec<Value> = Vec::new();
        let mut copies = Vec::new();

        while !tasks.is_empty() {
            let ready = tasks.iter().position(|&(dst, _)| {
                !tasks
                    .iter()
                    .any(|&(_, src)| locations_alias(src, dst))
            });
            if let Some(position) = ready {
                let (dst, src) = tasks.remove(position);
                self.emit_move(dst, src, &mut free_scratches, &mut copies)?;
                if let Some(index) = lent.iter().position(|&s| s == src) {
                    free_scratches.push(lent.remove(index));
                }
                continue;
            }

            // Only cycles remain: park one destination in a scratch and
            // redirect its readers there.
            let scratch = free_scratches.pop()?;
            let (dst, _) = tasks[0];
            copies.push(NewInstruction::copy(scratch, dst));
            for task in &mut tasks {
                if locations_alias(task.1, dst) {
                    task.1 = scratch;
                }
            }
            lent.push(scratch);
        }
        Some(copies)
    }

    fn emit_move(
        &self,
        dst: Value,
        src: Value,
        free_scratches: &mut Vec<Value>,
        copies: &mut Vec<NewInstruction>,
    ) -> Option<()> {
        if src.is_immediate() || src.is_literal() {
            copies.push(NewInstruction::literal(dst, src));
            return Some(());
        }
        if dst.is_memory_slot() && src.is_memory_slot() {
            // The ISA has no memory-to-memory move.
            let scratch = free_scratches.last().copied()?;
            copies.push(NewInstruction::copy(scratch, src));
            copies.push(NewInstruction::copy(dst, scratch));
            return Some(());
        }
        copies.push(NewInstruction::copy(dst, src));
        Some(())
    }
}

/// Two locations alias when they name the same physical register
/// (any width) or the same slot.
fn locations_alias(a: Value, b: Value) -> bool {
    if a.is_physical() && b.is_physical() {
        return a.ty == b.ty && a.data == b.data;
    }
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Register;

    fn reg(name: Register) -> Value {
        Target::register_of(name)
    }

    #[test]
    fn straight_line_copies_in_dependency_order() {
        // RBX <- RAX, RCX <- RBX: RCX must be copied first.
        let mut expander = ParallelCopyExpander::new(Value::int64_type());
        expander.add_task(reg(Register::RBX), reg(Register::RAX));
        expander.add_task(reg(Register::RCX), reg(Register::RBX));
        let copies = expander.expand().expect("no scratch needed");
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].outputs[0], reg(Register::RCX));
        assert_eq!(copies[0].inputs[0], reg(Register::RBX));
        assert_eq!(copies[1].outputs[0], reg(Register::RBX));
    }

    #[test]
    fn swap_cycle_uses_scratch() {
        // RAX <-> RCX with RDX as scratch: three copies.
        let mut expander = ParallelCopyExpander::new(Value::int64_type());
        expander.add_task(reg(Register::RAX), reg(Register::RCX));
        expander.add_task(reg(Register::RCX), reg(Register::RAX));
        expander.add_scratch(reg(Register::RDX));
        let copies = expander.expand().expect("scratch available");
        assert_eq!(copies.len(), 3);
        assert_eq!(copies[0].outputs[0], reg(Register::RDX));
        assert_eq!(copies[0].inputs[0], reg(Register::RAX));
        // After parking RAX, the copies resolve the cycle.
        assert_eq!(copies[1].outputs[0], reg(Register::RAX));
        assert_eq!(copies[1].inputs[0], reg(Register::RCX));
        assert_eq!(copies[2].outputs[0], reg(Register::RCX));
        assert_eq!(copies[2].inputs[0], reg(Register::RDX));
    }

    #[test]
    fn cycle_without_scratch_fails() {
        let mut expander = ParallelCopyExpander::new(Value::int64_type());
        expander.add_task(reg(Register::RAX), reg(Register::RCX));
        expander.add_task(reg(Register::RCX), reg(Register::RAX));
        assert!(expander.expand().is_none());
    }

    #[test]
    fn memory_to_memory_goes_through_scratch() {
        let slot_a = Value::stack_slot(Value::int64_type(), 0);
        let slot_b = Value::stack_slot(Value::int64_type(), 8);
        let mut expander = ParallelCopyExpander::new(Value::int64_type());
        expander.add_task(slot_a, slot_b);
        assert!(expander.expand().is_none());
        expander.add_scratch(reg(Register::RDX));
        let copies = expander.expand().expect("scratch available");
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].outputs[0], reg(Register::RDX));
        assert_eq!(copies[0].inputs[0], slot_b);
        assert_eq!(copies[1].outputs[0], slot_a);
        assert_eq!(copies[1].inputs[0], reg(Register::RDX));
    }

    #[test]
    fn identity_tasks_are_dropped() {
        let mut expander = ParallelCopyExpander::new(Value::int32_type());
        expander.add_task(reg(Register::EAX), reg(Register::EAX));
        assert!(!expander.has_tasks());
        assert_eq!(expander.expand().unwrap(), Vec::<NewInstruction>::new());
    }
}
