//! Transactional CFG editor.
//!
//! The editor is the only mutator of graph structure. A pass opens a
//! scoped `edit(block)`, mutates, and `commit()`s; commit renumbers,
//! revalidates the whole function, and queues structured errors into
//! the factory on failure. Edge lists are kept consistent eagerly as
//! terminators change.

use crate::analysis::dominators::DominatorTree;
use crate::factory::Factory;
use crate::function::{BlockId, Function, InstrId, Opcode};
use crate::validator::{validate_block, validate_function};
use crate::value::Value;

pub struct Editor<'a> {
    factory: &'a mut Factory,
    function: &'a mut Function,
    basic_block: Option<BlockId>,
}

impl<'a> Editor<'a> {
    pub fn new(factory: &'a mut Factory, function: &'a mut Function) -> Self {
        Self {
            factory,
            function,
            basic_block: None,
        }
    }

    pub fn function(&self) -> &Function {
        self.function
    }

    pub fn factory_mut(&mut self) -> &mut Factory {
        self.factory
    }

    pub fn entry_block(&self) -> BlockId {
        self.function.entry_block
    }

    pub fn exit_block(&self) -> BlockId {
        self.function.exit_block
    }

    // ── Transactions ────────────────────────────────────────────────

    pub fn edit(&mut self, block: BlockId) {
        debug_assert!(self.basic_block.is_none(), "nested edit");
        self.basic_block = Some(block);
    }

    /// Close the transaction: renumber, validate the edited block, and
    /// queue any errors. Returns whether the block is structurally
    /// sound.
    pub fn commit(&mut self) -> bool {
        let block = self.edited_block();
        self.basic_block = None;
        self.function.renumber();
        let errors = validate_block(self.function, block);
        if errors.is_empty() {
            return true;
        }
        self.factory.add_errors(errors);
        false
    }

    /// Whole-function validation; run between passes.
    pub fn validate(&mut self) -> bool {
        let errors = validate_function(self.function);
        if errors.is_empty() {
            return true;
        }
        self.factory.add_errors(errors);
        false
    }

    fn edited_block(&self) -> BlockId {
        self.basic_block.unwrap_or_else(|| unreachable!("no open edit"))
    }

    // ── Blocks ──────────────────────────────────────────────────────

    /// A fresh block placed before `before` in layout order. It has no
    /// terminator yet; give it one before commit.
    pub fn new_basic_block(&mut self, before: BlockId) -> BlockId {
        let block = self.function.alloc_block();
        self.function.insert_block_before(block, before);
        block
    }

    // ── Terminators ─────────────────────────────────────────────────

    pub fn set_jump(&mut self, target: BlockId) {
        let jump = self.function.alloc_instr(Opcode::Jump, vec![], vec![]);
        self.function.instr_mut(jump).block_operands = vec![target];
        self.replace_terminator(jump);
    }

    pub fn set_branch(&mut self, condition: Value, true_block: BlockId, false_block: BlockId) {
        debug_assert!(condition.is_conditional());
        let branch = self
            .function
            .alloc_instr(Opcode::Branch, vec![], vec![condition]);
        self.function.instr_mut(branch).block_operands = vec![true_block, false_block];
        self.replace_terminator(branch);
    }

    pub fn set_ret(&mut self) {
        let ret = self.function.alloc_instr(Opcode::Ret, vec![], vec![]);
        self.replace_terminator(ret);
    }

    fn replace_terminator(&mut self, new_terminator: InstrId) {
        let block = self.edited_block();
        if let Some(old) = self.function.terminator_of(block) {
            self.function.block_mut(block).instructions.pop();
            self.function.instr_mut(old).basic_block = None;
        }
        self.function
            .block_mut(block)
            .instructions
            .push(new_terminator);
        self.function.instr_mut(new_terminator).basic_block = Some(block);
        self.update_edges(block);
    }

    fn update_edges(&mut self, block: BlockId) {
        let new_successors = self.function.implied_successors(block);
        let old_successors = self.function.block(block).successors.clone();
        for successor in old_successors {
            self.function
                .block_mut(successor)
                .predecessors
                .retain(|&p| p != block);
        }
        for &successor in &new_successors {
            let preds = &mut self.function.block_mut(successor).predecessors;
            if !preds.contains(&block) {
                preds.push(block);
            }
        }
        self.function.block_mut(block).successors = new_successors;
    }

    // ── Instructions ────────────────────────────────────────────────

    pub fn new_instruction(
        &mut self,
        opcode: Opcode,
        outputs: Vec<Value>,
        inputs: Vec<Value>,
    ) -> InstrId {
        self.function.alloc_instr(opcode, outputs, inputs)
    }

    pub fn materialize(&mut self, spec: &crate::function::NewInstruction) -> InstrId {
        self.function.materialize(spec)
    }

    /// Append before the terminator of the edited block, or at the end
    /// when no terminator has been set yet.
    pub fn append(&mut self, instr: InstrId) {
        let block = self.edited_block();
        let has_terminator = self.function.terminator_of(block).is_some();
        let instructions = &mut self.function.block_mut(block).instructions;
        if has_terminator {
            let position = instructions.len() - 1;
            instructions.insert(position, instr);
        } else {
            instructions.push(instr);
        }
        self.function.instr_mut(instr).basic_block = Some(block);
    }

    pub fn insert_after_in_block(&mut self, instr: InstrId, reference: InstrId) {
        let block = self.edited_block();
        let instructions = &mut self.function.block_mut(block).instructions;
        let position = instructions
            .iter()
            .position(|&i| i == reference)
            .unwrap_or_else(|| unreachable!("reference not in edited block"));
        instructions.insert(position + 1, instr);
        self.function.instr_mut(instr).basic_block = Some(block);
    }

    pub fn insert_before(&mut self, instr: InstrId, reference: InstrId) {
        let block = self.edited_block();
        let instructions = &mut self.function.block_mut(block).instructions;
        let position = instructions
            .iter()
            .position(|&i| i == reference)
            .unwrap_or_else(|| unreachable!("reference not in edited block"));
        instructions.insert(position, instr);
        self.function.instr_mut(instr).basic_block = Some(block);
    }

    pub fn remove(&mut self, instr: InstrId) {
        let block = self.edited_block();
        let was_terminator = self.function.terminator_of(block) == Some(instr);
        self.function
            .block_mut(block)
            .instructions
            .retain(|&i| i != instr);
        self.function.block_mut(block).phis.retain(|&i| i != instr);
        self.function.instr_mut(instr).basic_block = None;
        if was_terminator {
            self.update_edges(block);
        }
    }

    /// Move an instruction from another block to the end of the edited
    /// block, keeping edge lists of both sides current.
    pub fn take_from_block(&mut self, instr: InstrId, from: BlockId) {
        let block = self.edited_block();
        self.function
            .block_mut(from)
            .instructions
            .retain(|&i| i != instr);
        self.function.block_mut(block).instructions.push(instr);
        self.function.instr_mut(instr).basic_block = Some(block);
        self.update_edges(from);
        self.update_edges(block);
    }

    /// Detach an unreachable block from the function entirely.
    pub fn function_remove_block(&mut self, block: BlockId) {
        debug_assert!(self.function.block(block).predecessors.is_empty());
        let successors = self.function.block(block).successors.clone();
        for successor in successors {
            self.function
                .block_mut(successor)
                .predecessors
                .retain(|&p| p != block);
        }
        self.function.block_mut(block).successors.clear();
        let instructions: Vec<InstrId> = self.function.block(block).all_instructions().collect();
        for instr in instructions {
            self.function.instr_mut(instr).basic_block = None;
        }
        self.function.block_mut(block).instructions.clear();
        self.function.block_mut(block).phis.clear();
        self.function.remove_block_from_order(block);
    }

    /// Remove instructions across blocks in one sweep; used by the
    /// rewrite pass to discard identity copies.
    pub fn bulk_remove_instructions(&mut self, instructions: &[InstrId]) {
        for &instr in instructions {
            let Some(block) = self.function.instr(instr).basic_block else {
                continue;
            };
            self.function
                .block_mut(block)
                .instructions
                .retain(|&i| i != instr);
            self.function.block_mut(block).phis.retain(|&i| i != instr);
            self.function.instr_mut(instr).basic_block = None;
        }
        self.function.renumber();
    }

    pub fn set_input(&mut self, instr: InstrId, position: usize, value: Value) {
        self.function.instr_mut(instr).inputs[position] = value;
    }

    pub fn set_output(&mut self, instr: InstrId, position: usize, value: Value) {
        self.function.instr_mut(instr).outputs[position] = value;
    }

    // ── φ management ────────────────────────────────────────────────

    pub fn new_phi(&mut self, output: Value) -> InstrId {
        let block = self.edited_block();
        let phi = self.function.alloc_instr(Opcode::Phi, vec![output], vec![]);
        self.function.instr_mut(phi).basic_block = Some(block);
        self.function.block_mut(block).phis.push(phi);
        phi
    }

    pub fn set_phi_input(&mut self, phi: InstrId, predecessor: BlockId, value: Value) {
        let instr = self.function.instr_mut(phi);
        debug_assert_eq!(instr.opcode, Opcode::Phi);
        if let Some(slot) = instr
            .phi_inputs
            .iter_mut()
            .find(|(pred, _)| *pred == predecessor)
        {
            slot.1 = value;
            return;
        }
        instr.phi_inputs.push((predecessor, value));
    }

    /// Re-key every φ input of `block` from `old_pred` to `new_pred`;
    /// used when an edge is split.
    pub fn replace_phi_predecessor(
        &mut self,
        block: BlockId,
        old_pred: BlockId,
        new_pred: BlockId,
    ) {
        let phis = self.function.block(block).phis.clone();
        for phi in phis {
            for slot in &mut self.function.instr_mut(phi).phi_inputs {
                if slot.0 == old_pred {
                    slot.0 = new_pred;
                }
            }
        }
    }

    /// Retarget a terminator's block operand, maintaining edges.
    pub fn replace_block_operand(&mut self, instr: InstrId, old: BlockId, new: BlockId) {
        let Some(block) = self.function.instr(instr).basic_block else {
            return;
        };
        for target in &mut self.function.instr_mut(instr).block_operands {
            if *target == old {
                *target = new;
            }
        }
        self.update_edges(block);
    }

    // ── Derived analyses ────────────────────────────────────────────

    pub fn dominator_tree(&self) -> DominatorTree {
        DominatorTree::compute(self.function)
    }

    pub fn post_dominator_tree(&self) -> DominatorTree {
        DominatorTree::compute_post(self.function)
    }
}
