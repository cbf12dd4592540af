//! The LIR control-flow graph.
//!
//! A [`Function`] owns arenas of blocks and instructions addressed by
//! [`BlockId`] / [`InstrId`]; cross-references are ids, never owning
//! pointers. Block layout order is kept separately from block identity
//! so passes can insert blocks without renumbering.
//!
//! Every block holds a φ prefix followed by ordinary instructions, the
//! last of which is the terminator. Instruction `index` fields give
//! cheap before/after queries inside a block and are renumbered by the
//! editor on commit.

use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

/// Comparison outcomes carried by `Cmp` and consumed by `Branch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerCondition {
    Equal,
    NotEqual,
    SignedGreaterThan,
    SignedGreaterThanOrEqual,
    SignedLessThan,
    SignedLessThanOrEqual,
    UnsignedGreaterThan,
    UnsignedGreaterThanOrEqual,
    UnsignedLessThan,
    UnsignedLessThanOrEqual,
}

impl IntegerCondition {
    /// The condition that holds exactly when `self` does not; used to
    /// branch on the false edge when the true edge falls through.
    pub fn negated(self) -> Self {
        use IntegerCondition::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            SignedGreaterThan => SignedLessThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThan,
            SignedLessThan => SignedGreaterThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThan,
            UnsignedGreaterThan => UnsignedLessThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThan,
            UnsignedLessThan => UnsignedGreaterThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    BitAnd,
    BitOr,
    BitXor,
    Branch,
    Call,
    Cmp(IntegerCondition),
    Copy,
    Div,
    Entry,
    Exit,
    Jump,
    Literal,
    Load,
    Mul,
    Nop,
    PCopy,
    Phi,
    Ret,
    Shl,
    Shr,
    SignExtend,
    Sub,
    UShr,
    ZeroExtend,
}

impl Opcode {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Branch | Opcode::Exit | Opcode::Jump | Opcode::Ret
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::BitAnd => "and",
            Opcode::BitOr => "or",
            Opcode::BitXor => "xor",
            Opcode::Branch => "br",
            Opcode::Call => "call",
            Opcode::Cmp(_) => "cmp",
            Opcode::Copy => "mov",
            Opcode::Div => "div",
            Opcode::Entry => "entry",
            Opcode::Exit => "exit",
            Opcode::Jump => "jmp",
            Opcode::Literal => "lit",
            Opcode::Load => "load",
            Opcode::Mul => "mul",
            Opcode::Nop => "nop",
            Opcode::PCopy => "pcopy",
            Opcode::Phi => "phi",
            Opcode::Ret => "ret",
            Opcode::Shl => "shl",
            Opcode::Shr => "sar",
            Opcode::SignExtend => "sext",
            Opcode::Sub => "sub",
            Opcode::UShr => "shr",
            Opcode::ZeroExtend => "zext",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub id: InstrId,
    pub opcode: Opcode,
    pub outputs: Vec<Value>,
    pub inputs: Vec<Value>,
    pub block_operands: Vec<BlockId>,
    /// φ only: one entry per predecessor.
    pub phi_inputs: Vec<(BlockId, Value)>,
    pub basic_block: Option<BlockId>,
    pub index: u32,
}

impl Instruction {
    pub fn output(&self, position: usize) -> Value {
        self.outputs[position]
    }

    pub fn input(&self, position: usize) -> Value {
        self.inputs[position]
    }

    pub fn block_operand(&self, position: usize) -> BlockId {
        self.block_operands[position]
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    pub fn is_phi(&self) -> bool {
        self.opcode == Opcode::Phi
    }

    /// The φ input flowing in from `block`.
    pub fn phi_input_of(&self, block: BlockId) -> Option<Value> {
        debug_assert!(self.is_phi());
        self.phi_inputs
            .iter()
            .find(|(pred, _)| *pred == block)
            .map(|(_, value)| *value)
    }
}

/// A freshly described instruction not yet allocated in any function.
/// Allocator actions are collected in this form and materialized by the
/// rewrite pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstruction {
    pub opcode: Opcode,
    pub outputs: Vec<Value>,
    pub inputs: Vec<Value>,
}

impl NewInstruction {
    pub fn copy(output: Value, input: Value) -> Self {
        Self {
            opcode: Opcode::Copy,
            outputs: vec![output],
            inputs: vec![input],
        }
    }

    pub fn literal(output: Value, input: Value) -> Self {
        Self {
            opcode: Opcode::Literal,
            outputs: vec![output],
            inputs: vec![input],
        }
    }
}

#[derive(Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    pub phis: Vec<InstrId>,
    pub instructions: Vec<InstrId>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            phis: Vec::new(),
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn first_instruction(&self) -> Option<InstrId> {
        self.instructions.first().copied()
    }

    pub fn last_instruction(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }

    pub fn has_phis(&self) -> bool {
        !self.phis.is_empty()
    }

    /// φ prefix followed by ordinary instructions.
    pub fn all_instructions(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.phis.iter().chain(self.instructions.iter()).copied()
    }
}

pub struct Function {
    pub id: FunctionId,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    block_order: Vec<BlockId>,
    pub entry_block: BlockId,
    pub exit_block: BlockId,
    /// Incoming parameter values, in position order.
    pub parameters: Vec<Value>,
}

impl Function {
    /// A fresh function: an entry block jumping straight to the exit
    /// block. The edge structure is valid from the start.
    pub fn new(id: FunctionId) -> Self {
        let mut function = Self {
            id,
            blocks: Vec::new(),
            instructions: Vec::new(),
            block_order: Vec::new(),
            entry_block: BlockId(0),
            exit_block: BlockId(0),
            parameters: Vec::new(),
        };
        let entry = function.alloc_block();
        let exit = function.alloc_block();
        function.entry_block = entry;
        function.exit_block = exit;
        function.block_order = vec![entry, exit];

        let entry_instr = function.alloc_instr(Opcode::Entry, vec![], vec![]);
        let jump = function.alloc_instr(Opcode::Jump, vec![], vec![]);
        function.instr_mut(jump).block_operands = vec![exit];
        function.block_mut(entry).instructions = vec![entry_instr, jump];
        function.instr_mut(entry_instr).basic_block = Some(entry);
        function.instr_mut(jump).basic_block = Some(entry);

        let exit_instr = function.alloc_instr(Opcode::Exit, vec![], vec![]);
        function.block_mut(exit).instructions = vec![exit_instr];
        function.instr_mut(exit_instr).basic_block = Some(exit);

        function.block_mut(entry).successors = vec![exit];
        function.block_mut(exit).predecessors = vec![entry];
        function.renumber();
        function
    }

    // ── Arenas ──────────────────────────────────────────────────────

    pub fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn alloc_instr(&mut self, opcode: Opcode, outputs: Vec<Value>, inputs: Vec<Value>) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        self.instructions.push(Instruction {
            id,
            opcode,
            outputs,
            inputs,
            block_operands: Vec::new(),
            phi_inputs: Vec::new(),
            basic_block: None,
            index: 0,
        });
        id
    }

    pub fn materialize(&mut self, spec: &NewInstruction) -> InstrId {
        self.alloc_instr(spec.opcode, spec.outputs.clone(), spec.inputs.clone())
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn instr(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0 as usize]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instructions[id.0 as usize]
    }

    // ── Layout order ────────────────────────────────────────────────

    pub fn block_order(&self) -> &[BlockId] {
        &self.block_order
    }

    pub fn insert_block_before(&mut self, block: BlockId, before: BlockId) {
        debug_assert!(!self.block_order.contains(&block));
        let position = self
            .block_order
            .iter()
            .position(|&b| b == before)
            .unwrap_or(self.block_order.len());
        self.block_order.insert(position, block);
    }

    pub fn remove_block_from_order(&mut self, block: BlockId) {
        self.block_order.retain(|&b| b != block);
    }

    /// Layout successor, used for branch fallthrough decisions.
    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        let position = self.block_order.iter().position(|&b| b == block)?;
        self.block_order.get(position + 1).copied()
    }

    pub fn terminator_of(&self, block: BlockId) -> Option<InstrId> {
        let last = self.block(block).last_instruction()?;
        self.instr(last).is_terminator().then_some(last)
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Reassign intra-block indices and parent back-pointers.
    pub fn renumber(&mut self) {
        for block_index in 0..self.blocks.len() {
            let block_id = BlockId(block_index as u32);
            let ids: Vec<InstrId> = self.blocks[block_index]
                .phis
                .iter()
                .chain(self.blocks[block_index].instructions.iter())
                .copied()
                .collect();
            for (index, id) in ids.into_iter().enumerate() {
                let instr = self.instr_mut(id);
                instr.index = index as u32;
                instr.basic_block = Some(block_id);
            }
        }
    }

    /// Successors implied by a block's terminator. `Ret` flows to the
    /// exit block; `Exit` ends the function.
    pub fn implied_successors(&self, block: BlockId) -> Vec<BlockId> {
        let Some(terminator) = self.terminator_of(block) else {
            return Vec::new();
        };
        let instr = self.instr(terminator);
        match instr.opcode {
            Opcode::Jump | Opcode::Branch => instr.block_operands.clone(),
            Opcode::Ret => vec![self.exit_block],
            Opcode::Exit => Vec::new(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}:", self.id.0)?;
        for &block_id in &self.block_order {
            let block = self.block(block_id);
            writeln!(f, "bb{}:", block_id.0)?;
            for id in block.all_instructions() {
                let instr = self.instr(id);
                write!(f, "  {}", instr.opcode.mnemonic())?;
                let mut separator = " ";
                for output in &instr.outputs {
                    write!(f, "{}{}", separator, output)?;
                    separator = ", ";
                }
                if !instr.outputs.is_empty() {
                    write!(f, " <-")?;
                    separator = " ";
                }
                for input in &instr.inputs {
                    write!(f, "{}{}", separator, input)?;
                    separator = ", ";
                }
                for (pred, value) in &instr.phi_inputs {
                    write!(f, "{}bb{} {}", separator, pred.0, value)?;
                    separator = ", ";
                }
                for target in &instr.block_operands {
                    write!(f, "{}bb{}", separator, target.0)?;
                    separator = ", ";
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_function_is_well_formed() {
        let function = Function::new(FunctionId(1));
        assert_ne!(function.entry_block, function.exit_block);
        assert_eq!(function.block_order().len(), 2);
        assert_eq!(
            function.implied_successors(function.entry_block),
            vec![function.exit_block]
        );
        let entry = function.block(function.entry_block);
        assert_eq!(entry.instructions.len(), 2);
        let first = function.instr(entry.instructions[0]);
        assert_eq!(first.opcode, Opcode::Entry);
    }

    #[test]
    fn condition_negation_is_involutive() {
        use IntegerCondition::*;
        for condition in [
            Equal,
            NotEqual,
            SignedGreaterThan,
            SignedGreaterThanOrEqual,
            SignedLessThan,
            SignedLessThanOrEqual,
            UnsignedGreaterThan,
            UnsignedGreaterThanOrEqual,
            UnsignedLessThan,
            UnsignedLessThanOrEqual,
        ] {
            assert_eq!(condition.negated().negated(), condition);
        }
    }
}
