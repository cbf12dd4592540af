//! Structured LIR errors.
//!
//! Validation failures queue [`ErrorData`] records instead of
//! unwinding; the factory collects them per compilation.

use crate::function::{BlockId, InstrId};
use crate::value::Value;
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

/// Validation error codes, partitioned by subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
pub enum LirErrorCode {
    ValidateBasicBlockEmpty,
    ValidateBasicBlockEntry,
    ValidateBasicBlockExit,
    ValidateBasicBlockFunction,
    ValidateBasicBlockId,
    ValidateBasicBlockTerminator,
    ValidateFunctionEmpty,
    ValidateFunctionEntry,
    ValidateFunctionExit,
    ValidateInstructionBasicBlock,
    ValidateInstructionEntry,
    ValidateInstructionExit,
    ValidateInstructionId,
    ValidateInstructionInput,
    ValidateInstructionInputSize,
    ValidateInstructionInputType,
    ValidateInstructionOutput,
    ValidateInstructionSuccessor,
    ValidateInstructionTerminator,
    ValidatePhiCount,
    ValidatePhiNotFound,
}

/// What an error record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSubject {
    Block(BlockId),
    Function,
    Instruction(InstrId),
    Operand(InstrId, Value),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code} on {subject:?}")]
pub struct ErrorData {
    pub code: LirErrorCode,
    pub subject: ErrorSubject,
    /// Operand position or other small detail, when meaningful.
    pub detail: i32,
}

impl ErrorData {
    pub fn new(code: LirErrorCode, subject: ErrorSubject) -> Self {
        Self {
            code,
            subject,
            detail: 0,
        }
    }

    pub fn with_detail(code: LirErrorCode, subject: ErrorSubject, detail: i32) -> Self {
        Self {
            code,
            subject,
            detail,
        }
    }
}
