//! Next-use queries backing the allocator's spill heuristics.

use super::dominators::DominatorTree;
use super::use_def::{UseDefList, UseDefListBuilder};
use crate::function::{Function, InstrId};
use crate::value::Value;

pub struct RegisterUsageTracker {
    post_dominator_tree: DominatorTree,
    use_def_list: UseDefList,
}

impl RegisterUsageTracker {
    pub fn new(function: &Function) -> Self {
        Self {
            post_dominator_tree: DominatorTree::compute_post(function),
            use_def_list: UseDefListBuilder::new(function).build(),
        }
    }

    pub fn users_of(&self, value: Value) -> &[InstrId] {
        self.use_def_list.users_of(value)
    }

    /// Is `input` read anywhere after `instr`? Same-block users compare
    /// by index; a user in another block means the value flows on.
    pub fn is_used_after(&self, function: &Function, input: Value, instr: InstrId) -> bool {
        self.next_use_after(function, input, instr).is_some()
    }

    /// The closest following use of `input`, if any. Same-block uses
    /// win by index distance; a cross-block use counts as farther than
    /// any same-block one.
    pub fn next_use_after(
        &self,
        function: &Function,
        input: Value,
        instr: InstrId,
    ) -> Option<InstrId> {
        debug_assert!(input.is_virtual());
        let block = function.instr(instr).basic_block?;
        let index = function.instr(instr).index;

        let mut same_block: Option<InstrId> = None;
        let mut cross_block: Option<InstrId> = None;
        for &user in self.use_def_list.users_of(input) {
            let user_block = match function.instr(user).basic_block {
                Some(b) => b,
                None => continue,
            };
            // A φ reads its input at the end of the feeding
            // predecessor, so the value stays live through every block
            // on the way there.
            if function.instr(user).is_phi() {
                cross_block.get_or_insert(user);
                continue;
            }
            if user_block == block {
                if function.instr(user).index <= index {
                    continue;
                }
                let better = match same_block {
                    None => true,
                    Some(current) => function.instr(user).index < function.instr(current).index,
                };
                if better {
                    same_block = Some(user);
                }
                continue;
            }
            // Prefer a user whose block this one post-dominates; any
            // other cross-block user still keeps the value alive.
            if cross_block.is_none()
                || self.post_dominator_tree.dominates(user_block, block)
            {
                cross_block = Some(user);
            }
        }
        same_block.or(cross_block)
    }

    /// Distance heuristic for spill-victim choice: same-block index
    /// delta, with cross-block uses treated as far away.
    pub fn next_use_distance(&self, function: &Function, input: Value, instr: InstrId) -> u32 {
        match self.next_use_after(function, input, instr) {
            None => u32::MAX,
            Some(user) => {
                let block = function.instr(instr).basic_block;
                if function.instr(user).basic_block == block {
                    function.instr(user).index - function.instr(instr).index
                } else {
                    u32::MAX - 1
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::factory::Factory;
    use crate::function::Opcode;

    #[test]
    fn next_use_prefers_nearest_in_block() {
        let mut factory = Factory::new();
        let vreg = factory.new_register(Value::int32_type());
        let a = factory.new_register(Value::int32_type());
        let b = factory.new_register(Value::int32_type());
        let mut function = factory.new_function();
        let entry = function.entry_block;
        let (def, use1, use2) = {
            let mut editor = Editor::new(&mut factory, &mut function);
            editor.edit(entry);
            let def =
                editor.new_instruction(Opcode::Literal, vec![vreg], vec![Value::small_int32(1)]);
            let use1 = editor.new_instruction(Opcode::Add, vec![a], vec![vreg, vreg]);
            let use2 = editor.new_instruction(Opcode::Add, vec![b], vec![vreg, vreg]);
            editor.append(def);
            editor.append(use1);
            editor.append(use2);
            assert!(editor.commit());
            (def, use1, use2)
        };
        let tracker = RegisterUsageTracker::new(&function);
        assert_eq!(tracker.next_use_after(&function, vreg, def), Some(use1));
        assert_eq!(tracker.next_use_after(&function, vreg, use1), Some(use2));
        assert_eq!(tracker.next_use_after(&function, vreg, use2), None);
        assert!(!tracker.is_used_after(&function, vreg, use2));
    }
}
