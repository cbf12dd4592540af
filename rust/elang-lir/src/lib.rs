//! elang-lir
//!
//! The low-level SSA intermediate representation and its x64 backend:
//! a tagged operand model, an editor-mediated CFG, the transformation
//! pipeline (lowering, critical-edge removal, register allocation with
//! spilling and φ-expansion, stack layout, cleanup), and bit-exact
//! machine-code emission.

pub mod analysis;
pub mod editor;
pub mod emitters;
pub mod error;
pub mod factory;
pub mod function;
pub mod literals;
pub mod pipeline;
pub mod target;
pub mod testing;
pub mod transforms;
pub mod validator;
pub mod value;

pub use editor::Editor;
pub use emitters::{MachineCode, MachineCodeBuilder};
pub use error::{ErrorData, LirErrorCode};
pub use factory::Factory;
pub use function::{BasicBlock, BlockId, Function, InstrId, Instruction, IntegerCondition, Opcode};
pub use pipeline::Pipeline;
pub use value::{Value, ValueKind, ValueSize, ValueType};
