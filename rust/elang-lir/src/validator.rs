//! Structural validation.
//!
//! [`validate_block`] runs on every editor commit and checks the edited
//! block's local invariants. [`validate_function`] additionally checks
//! the global ones (SSA single definition, edge agreement, entry/exit
//! placement) and is run by the pipeline between passes. Violations
//! queue [`ErrorData`] records; nothing panics on malformed input.

use crate::error::{ErrorData, ErrorSubject, LirErrorCode};
use crate::function::{BlockId, Function, InstrId, Opcode};
use crate::value::Value;
use std::collections::HashSet;

/// Local invariants of one block: non-empty, one trailing terminator,
/// marker placement, φ shape, operand sanity. Single-definition SSA is
/// a whole-function property checked by [`validate_function`]; it no
/// longer holds once lowering rewrites to the destructive two-address
/// form.
pub fn validate_block(function: &Function, block_id: BlockId) -> Vec<ErrorData> {
    let mut errors = Vec::new();
    let block = function.block(block_id);

    if block.instructions.is_empty() {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateBasicBlockEmpty,
            ErrorSubject::Block(block_id),
        ));
        return errors;
    }

    let first = function.instr(block.instructions[0]);
    if block_id == function.entry_block && first.opcode != Opcode::Entry {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateBasicBlockEntry,
            ErrorSubject::Block(block_id),
        ));
    }
    let last_id = block.instructions[block.instructions.len() - 1];
    let last = function.instr(last_id);
    if block_id == function.exit_block && last.opcode != Opcode::Exit {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateBasicBlockExit,
            ErrorSubject::Block(block_id),
        ));
    }
    if !last.is_terminator() {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateBasicBlockTerminator,
            ErrorSubject::Block(block_id),
        ));
    }

    let order_set: HashSet<_> = function.block_order().iter().copied().collect();

    for (position, &instr_id) in block.instructions.iter().enumerate() {
        let instr = function.instr(instr_id);
        let is_last = position + 1 == block.instructions.len();
        if instr.basic_block != Some(block_id) {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionBasicBlock,
                ErrorSubject::Instruction(instr_id),
            ));
        }
        if instr.opcode == Opcode::Entry && (block_id != function.entry_block || position != 0) {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionEntry,
                ErrorSubject::Instruction(instr_id),
            ));
        }
        if instr.opcode == Opcode::Exit && block_id != function.exit_block {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionExit,
                ErrorSubject::Instruction(instr_id),
            ));
        }
        if instr.is_terminator() && !is_last {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionTerminator,
                ErrorSubject::Instruction(instr_id),
            ));
        }
        if instr.opcode == Opcode::Phi {
            // φs belong to the prefix list, never the body.
            errors.push(ErrorData::new(
                LirErrorCode::ValidatePhiNotFound,
                ErrorSubject::Instruction(instr_id),
            ));
        }
        for &target in &instr.block_operands {
            if !order_set.contains(&target) {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidateInstructionSuccessor,
                    ErrorSubject::Instruction(instr_id),
                ));
            }
        }
        validate_operands(function, instr_id, &mut errors);
    }

    // φ prefix: one input per predecessor, every input labeled by a
    // real predecessor.
    for &phi_id in &block.phis {
        let phi = function.instr(phi_id);
        if phi.opcode != Opcode::Phi {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionId,
                ErrorSubject::Instruction(phi_id),
            ));
            continue;
        }
        if phi.phi_inputs.len() != block.predecessors.len() {
            errors.push(ErrorData::new(
                LirErrorCode::ValidatePhiCount,
                ErrorSubject::Instruction(phi_id),
            ));
        }
        for (pred, _) in &phi.phi_inputs {
            if !block.predecessors.contains(pred) {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidatePhiNotFound,
                    ErrorSubject::Instruction(phi_id),
                ));
            }
        }
    }

    errors
}

/// Whole-function validation: every block's local invariants plus SSA
/// single definition, entry/exit placement in layout order, and
/// successor/predecessor agreement.
pub fn validate_function(function: &Function) -> Vec<ErrorData> {
    let mut errors = Vec::new();
    let order = function.block_order();

    if order.is_empty() {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateFunctionEmpty,
            ErrorSubject::Function,
        ));
        return errors;
    }
    if order.first() != Some(&function.entry_block) {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateFunctionEntry,
            ErrorSubject::Function,
        ));
    }
    if order.last() != Some(&function.exit_block) {
        errors.push(ErrorData::new(
            LirErrorCode::ValidateFunctionExit,
            ErrorSubject::Function,
        ));
    }

    for &block_id in order {
        errors.extend(validate_block(function, block_id));
    }

    // SSA across blocks.
    let mut defined: HashSet<Value> = HashSet::new();
    for &block_id in order {
        for instr_id in function.block(block_id).all_instructions() {
            check_single_def(function, instr_id, &mut defined, &mut errors);
        }
    }

    // Successor/predecessor agreement, both directions.
    for &block_id in order {
        let block = function.block(block_id);
        for &successor in &block.successors {
            if !function.block(successor).predecessors.contains(&block_id) {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidateInstructionSuccessor,
                    ErrorSubject::Block(block_id),
                ));
            }
        }
        for &predecessor in &block.predecessors {
            if !function.block(predecessor).successors.contains(&block_id) {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidateInstructionSuccessor,
                    ErrorSubject::Block(block_id),
                ));
            }
        }
    }

    errors
}

/// SSA: a virtual register is the output of exactly one instruction.
fn check_single_def(
    function: &Function,
    instr_id: InstrId,
    defined: &mut HashSet<Value>,
    errors: &mut Vec<ErrorData>,
) {
    for &output in &function.instr(instr_id).outputs {
        if !output.is_virtual() {
            continue;
        }
        if !defined.insert(output) {
            errors.push(ErrorData::new(
                LirErrorCode::ValidateInstructionOutput,
                ErrorSubject::Operand(instr_id, output),
            ));
        }
    }
}

fn validate_operands(function: &Function, instr_id: InstrId, errors: &mut Vec<ErrorData>) {
    let instr = function.instr(instr_id);
    match instr.opcode {
        Opcode::Branch => {
            if instr.inputs.len() != 1 || !instr.inputs[0].is_conditional() {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidateInstructionInput,
                    ErrorSubject::Instruction(instr_id),
                ));
            }
        }
        Opcode::Add
        | Opcode::BitAnd
        | Opcode::BitOr
        | Opcode::BitXor
        | Opcode::Cmp(_)
        | Opcode::Mul
        | Opcode::Sub => {
            if instr.inputs.len() != 2 {
                errors.push(ErrorData::new(
                    LirErrorCode::ValidateInstructionInput,
                    ErrorSubject::Instruction(instr_id),
                ));
                return;
            }
            let (left, right) = (instr.inputs[0], instr.inputs[1]);
            if left.ty != right.ty {
                errors.push(ErrorData::with_detail(
                    LirErrorCode::ValidateInstructionInputType,
                    ErrorSubject::Instruction(instr_id),
                    1,
                ));
            }
            if left.size != right.size {
                errors.push(ErrorData::with_detail(
                    LirErrorCode::ValidateInstructionInputSize,
                    ErrorSubject::Instruction(instr_id),
                    1,
                ));
            }
        }
        _ => {}
    }
}
