//! x64 target description: register names, ABI classes, parameter
//! homes. The ABI is Windows x64 (RCX/RDX/R8/R9 integer parameters,
//! 32-byte shadow area).

use crate::value::{Value, ValueKind, ValueSize, ValueType};
use strum_macros::Display;

/// ISA register names. The numeric value encodes the width class in
/// the high byte and the register number in the low nibble, so the
/// mapping to operand values is arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u32)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    AL = 0x000,
    CL = 0x001,
    DL = 0x002,
    BL = 0x003,

    AX = 0x100,
    CX = 0x101,
    DX = 0x102,
    BX = 0x103,

    EAX = 0x200,
    ECX = 0x201,
    EDX = 0x202,
    EBX = 0x203,
    ESP = 0x204,
    EBP = 0x205,
    ESI = 0x206,
    EDI = 0x207,
    R8D = 0x208,
    R9D = 0x209,
    R10D = 0x20A,
    R11D = 0x20B,
    R12D = 0x20C,
    R13D = 0x20D,
    R14D = 0x20E,
    R15D = 0x20F,

    RAX = 0x300,
    RCX = 0x301,
    RDX = 0x302,
    RBX = 0x303,
    RSP = 0x304,
    RBP = 0x305,
    RSI = 0x306,
    RDI = 0x307,
    R8 = 0x308,
    R9 = 0x309,
    R10 = 0x30A,
    R11 = 0x30B,
    R12 = 0x30C,
    R13 = 0x30D,
    R14 = 0x30E,
    R15 = 0x30F,

    XMM0S = 0x400,
    XMM1S = 0x401,
    XMM2S = 0x402,
    XMM3S = 0x403,

    XMM0D = 0x500,
    XMM1D = 0x501,
    XMM2D = 0x502,
    XMM3D = 0x503,
    XMM4D = 0x504,
    XMM5D = 0x505,
    XMM6D = 0x506,
    XMM7D = 0x507,
    XMM8D = 0x508,
    XMM9D = 0x509,
    XMM10D = 0x50A,
    XMM11D = 0x50B,
    XMM12D = 0x50C,
    XMM13D = 0x50D,
    XMM14D = 0x50E,
    XMM15D = 0x50F,
}

// Allocation order: volatile registers first so short-lived values
// avoid callee-saved homes. RSP/RBP are never allocatable.
const ALLOCATABLE_GENERAL: [Register; 13] = [
    Register::RAX,
    Register::RCX,
    Register::RDX,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::RBX,
    Register::RSI,
    Register::RDI,
    Register::R12,
    Register::R13,
    Register::R14,
];

// XMM0 is the float return home; keep it out of the pool.
const ALLOCATABLE_FLOAT: [Register; 8] = [
    Register::XMM1D,
    Register::XMM2D,
    Register::XMM3D,
    Register::XMM4D,
    Register::XMM5D,
    Register::XMM8D,
    Register::XMM9D,
    Register::XMM10D,
];

const INTEGER_PARAMETERS: [Register; 4] =
    [Register::RCX, Register::RDX, Register::R8, Register::R9];
const FLOAT_PARAMETERS: [Register; 4] = [
    Register::XMM0D,
    Register::XMM1D,
    Register::XMM2D,
    Register::XMM3D,
];

// General caller-saved mask: RAX RCX RDX R8-R11.
const GENERAL_CALLER_SAVED: u16 = 0b0000_1111_0000_0111;
// General callee-saved mask: RBX RBP RSI RDI R12-R15.
const GENERAL_CALLEE_SAVED: u16 = 0b1111_0000_1110_1000;
// Float caller-saved mask: XMM0-XMM5.
const FLOAT_CALLER_SAVED: u16 = 0b0000_0000_0011_1111;
const FLOAT_CALLEE_SAVED: u16 = !FLOAT_CALLER_SAVED;

/// Shadow area the caller reserves for the callee (Windows x64 ABI).
pub const SHADOW_AREA_SIZE: i32 = 32;

pub struct Target;

impl Target {
    pub fn register_of(name: Register) -> Value {
        let number = name as u32;
        match number >> 8 {
            0 => Value::new(
                ValueType::Integer,
                ValueSize::Size8,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
            1 => Value::new(
                ValueType::Integer,
                ValueSize::Size16,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
            2 => Value::new(
                ValueType::Integer,
                ValueSize::Size32,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
            3 => Value::new(
                ValueType::Integer,
                ValueSize::Size64,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
            4 => Value::new(
                ValueType::Float,
                ValueSize::Size32,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
            _ => Value::new(
                ValueType::Float,
                ValueSize::Size64,
                ValueKind::PhysicalRegister,
                (number & 15) as i32,
            ),
        }
    }

    /// Allocatable registers for the bank `value` belongs to, in
    /// preference order.
    pub fn allocatable_registers_for(value: Value) -> Vec<Value> {
        if value.is_float() {
            ALLOCATABLE_FLOAT
                .iter()
                .map(|&r| Self::register_of(r))
                .collect()
        } else {
            ALLOCATABLE_GENERAL
                .iter()
                .map(|&r| Self::register_of(r))
                .collect()
        }
    }

    /// The widest name of a physical register; two widths of one
    /// register compare equal through this.
    pub fn natural_register_of(value: Value) -> Value {
        debug_assert!(value.is_physical());
        if value.is_float() {
            return Value::new(
                ValueType::Float,
                ValueSize::Size64,
                ValueKind::PhysicalRegister,
                value.data,
            );
        }
        Value::new(
            ValueType::Integer,
            ValueSize::Size64,
            ValueKind::PhysicalRegister,
            value.data,
        )
    }

    /// Resize a physical register to carry `model`'s type and size.
    pub fn adjust_size(model: Value, register: Value) -> Value {
        debug_assert!(register.is_physical());
        Value::new(model.ty, model.size, ValueKind::PhysicalRegister, register.data)
    }

    pub fn is_caller_saved_register(value: Value) -> bool {
        debug_assert!(value.is_physical());
        let mask = 1u16 << (value.data & 15);
        if value.is_float() {
            FLOAT_CALLER_SAVED & mask != 0
        } else {
            GENERAL_CALLER_SAVED & mask != 0
        }
    }

    pub fn is_callee_saved_register(value: Value) -> bool {
        debug_assert!(value.is_physical());
        let mask = 1u16 << (value.data & 15);
        if value.is_float() {
            FLOAT_CALLEE_SAVED & mask != 0
        } else {
            GENERAL_CALLEE_SAVED & mask != 0
        }
    }

    /// Where the caller puts argument `position` for an outgoing call.
    pub fn argument_at(model: Value, position: usize) -> Value {
        if position < INTEGER_PARAMETERS.len() {
            let home = if model.is_float() {
                FLOAT_PARAMETERS[position]
            } else {
                INTEGER_PARAMETERS[position]
            };
            return Value::new(
                model.ty,
                model.size,
                ValueKind::PhysicalRegister,
                (home as u32 & 15) as i32,
            );
        }
        Value::argument(model.ty, model.size, position as i32)
    }

    /// Where the callee finds its parameter `position`.
    pub fn parameter_at(model: Value, position: usize) -> Value {
        if position < INTEGER_PARAMETERS.len() {
            let home = if model.is_float() {
                FLOAT_PARAMETERS[position]
            } else {
                INTEGER_PARAMETERS[position]
            };
            return Value::new(
                model.ty,
                model.size,
                ValueKind::PhysicalRegister,
                (home as u32 & 15) as i32,
            );
        }
        Value::parameter(model.ty, model.size, position as i32)
    }

    /// The return-value home for `type_tag`.
    pub fn return_of(type_tag: Value) -> Value {
        if type_tag.is_float() {
            return Self::register_of(if type_tag.is_32bit() {
                Register::XMM0S
            } else {
                Register::XMM0D
            });
        }
        Self::register_of(if type_tag.is_64bit() {
            Register::RAX
        } else {
            Register::EAX
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_values_encode_width_and_number() {
        let rax = Target::register_of(Register::RAX);
        assert!(rax.is_physical());
        assert!(rax.is_64bit());
        assert_eq!(rax.data, 0);
        assert_eq!(rax.to_string(), "RAX");
        let ecx = Target::register_of(Register::ECX);
        assert!(ecx.is_32bit());
        assert_eq!(ecx.to_string(), "ECX");
        let xmm1 = Target::register_of(Register::XMM1D);
        assert!(xmm1.is_float());
        assert_eq!(xmm1.data, 1);
    }

    #[test]
    fn abi_register_classes_partition() {
        for &name in &ALLOCATABLE_GENERAL {
            let value = Target::register_of(name);
            assert_ne!(
                Target::is_caller_saved_register(value),
                Target::is_callee_saved_register(value),
                "{:?}",
                name
            );
        }
    }

    #[test]
    fn parameter_homes() {
        let int32 = Value::int32_type();
        assert_eq!(
            Target::parameter_at(int32, 0),
            Target::adjust_size(int32, Target::register_of(Register::RCX))
        );
        let fifth = Target::parameter_at(int32, 4);
        assert!(!fifth.is_physical());
        assert_eq!(fifth.data, 4);
    }

    #[test]
    fn natural_register_merges_widths() {
        let eax = Target::register_of(Register::EAX);
        let rax = Target::register_of(Register::RAX);
        assert_eq!(
            Target::natural_register_of(eax),
            Target::natural_register_of(rax)
        );
    }
}
