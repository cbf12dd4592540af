//! Per-register user lists.
//!
//! For every virtual register, the ordered list of instructions that
//! read it. φ reads are recorded against the φ instruction itself so a
//! value feeding a φ stays live to the end of the predecessor edge it
//! flows along.

use crate::function::{Function, InstrId};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct UseDefList {
    map: HashMap<Value, Vec<InstrId>>,
}

impl UseDefList {
    pub fn users_of(&self, value: Value) -> &[InstrId] {
        debug_assert!(value.is_virtual());
        self.map.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_defined(&self, value: Value) -> bool {
        self.map.contains_key(&value)
    }
}

pub struct UseDefListBuilder<'a> {
    function: &'a Function,
}

impl<'a> UseDefListBuilder<'a> {
    pub fn new(function: &'a Function) -> Self {
        Self { function }
    }

    pub fn build(&self) -> UseDefList {
        let mut list = UseDefList::default();
        for &block_id in self.function.block_order() {
            let block = self.function.block(block_id);
            for &phi in &block.phis {
                for &output in &self.function.instr(phi).outputs {
                    assign(&mut list, output);
                }
                for &(_, input) in &self.function.instr(phi).phi_inputs {
                    add_user(&mut list, input, phi);
                }
            }
            for &instr_id in &block.instructions {
                let instr = self.function.instr(instr_id);
                for &input in &instr.inputs {
                    add_user(&mut list, input, instr_id);
                }
                for &output in &instr.outputs {
                    assign(&mut list, output);
                }
            }
        }
        list
    }
}

fn assign(list: &mut UseDefList, value: Value) {
    if !value.is_virtual() {
        return;
    }
    list.map.entry(value).or_default();
}

fn add_user(list: &mut UseDefList, value: Value, user: InstrId) {
    if !value.is_virtual() {
        return;
    }
    let users = list.map.entry(value).or_default();
    // An instruction reading the same register twice is one user.
    if users.last() == Some(&user) {
        return;
    }
    users.push(user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::factory::Factory;
    use crate::function::Opcode;

    #[test]
    fn users_are_ordered_and_deduplicated() {
        let mut factory = Factory::new();
        let vreg = factory.new_register(Value::int32_type());
        let out = factory.new_register(Value::int32_type());
        let mut function = factory.new_function();
        let entry = function.entry_block;
        {
            let mut editor = Editor::new(&mut factory, &mut function);
            editor.edit(entry);
            let def = editor.new_instruction(Opcode::Literal, vec![vreg], vec![Value::small_int32(1)]);
            // Reads vreg twice in one instruction.
            let add = editor.new_instruction(Opcode::Add, vec![out], vec![vreg, vreg]);
            editor.append(def);
            editor.append(add);
            assert!(editor.commit());
        }
        let list = UseDefListBuilder::new(&function).build();
        let add_id = function.block(entry).instructions[2];
        assert_eq!(list.users_of(vreg), &[add_id]);
        assert!(list.users_of(out).is_empty());
    }
}
