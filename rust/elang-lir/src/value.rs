//! The LIR operand model.
//!
//! A [`Value`] is a small POD record `{type, size, kind, data}`; every
//! operand of every instruction is one. Equality is field-wise, so a
//! value can key hash maps throughout the allocator.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueType {
    Float,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueSize {
    Size8,
    Size16,
    Size32,
    Size64,
}

impl ValueSize {
    pub fn bits(self) -> u32 {
        match self {
            ValueSize::Size8 => 8,
            ValueSize::Size16 => 16,
            ValueSize::Size32 => 32,
            ValueSize::Size64 => 64,
        }
    }

    pub fn bytes(self) -> i32 {
        (self.bits() / 8) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueKind {
    Invalid,
    Argument,
    Condition,
    FrameSlot,
    Immediate,
    Instruction,
    Literal,
    Parameter,
    PhysicalRegister,
    StackSlot,
    VirtualRegister,
    Void,
}

/// A 64-bit tagged operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Value {
    pub ty: ValueType,
    pub size: ValueSize,
    pub kind: ValueKind,
    pub data: i32,
}

impl Value {
    pub const fn new(ty: ValueType, size: ValueSize, kind: ValueKind, data: i32) -> Self {
        Self {
            ty,
            size,
            kind,
            data,
        }
    }

    pub const fn void() -> Self {
        Self::new(
            ValueType::Integer,
            ValueSize::Size8,
            ValueKind::Void,
            0,
        )
    }

    pub const fn invalid() -> Self {
        Self::new(
            ValueType::Integer,
            ValueSize::Size8,
            ValueKind::Invalid,
            0,
        )
    }

    // ── Type tags ───────────────────────────────────────────────────
    // Kind `Void` values double as type descriptors: only their type
    // and size fields matter.

    pub const fn int32_type() -> Self {
        Self::new(ValueType::Integer, ValueSize::Size32, ValueKind::Void, 0)
    }

    pub const fn int64_type() -> Self {
        Self::new(ValueType::Integer, ValueSize::Size64, ValueKind::Void, 0)
    }

    pub const fn float32_type() -> Self {
        Self::new(ValueType::Float, ValueSize::Size32, ValueKind::Void, 0)
    }

    pub const fn float64_type() -> Self {
        Self::new(ValueType::Float, ValueSize::Size64, ValueKind::Void, 0)
    }

    /// The type descriptor of `value`: same type and size, kind `Void`.
    pub fn type_of(value: Value) -> Value {
        Value::new(value.ty, value.size, ValueKind::Void, 0)
    }

    // ── Constructors ────────────────────────────────────────────────

    pub fn immediate(size: ValueSize, data: i32) -> Self {
        Self::new(ValueType::Integer, size, ValueKind::Immediate, data)
    }

    pub fn small_int32(data: i32) -> Self {
        Self::immediate(ValueSize::Size32, data)
    }

    pub fn parameter(ty: ValueType, size: ValueSize, position: i32) -> Self {
        Self::new(ty, size, ValueKind::Parameter, position)
    }

    pub fn argument(ty: ValueType, size: ValueSize, position: i32) -> Self {
        Self::new(ty, size, ValueKind::Argument, position)
    }

    pub fn frame_slot(ty: Value, offset: i32) -> Self {
        Self::new(ty.ty, ty.size, ValueKind::FrameSlot, offset)
    }

    pub fn stack_slot(ty: Value, offset: i32) -> Self {
        Self::new(ty.ty, ty.size, ValueKind::StackSlot, offset)
    }

    // ── Predicates ──────────────────────────────────────────────────

    pub fn is_physical(&self) -> bool {
        self.kind == ValueKind::PhysicalRegister
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == ValueKind::VirtualRegister
    }

    pub fn is_register(&self) -> bool {
        self.is_physical() || self.is_virtual()
    }

    pub fn is_immediate(&self) -> bool {
        self.kind == ValueKind::Immediate
    }

    pub fn is_literal(&self) -> bool {
        self.kind == ValueKind::Literal
    }

    pub fn is_conditional(&self) -> bool {
        self.kind == ValueKind::Condition
    }

    pub fn is_frame_slot(&self) -> bool {
        self.kind == ValueKind::FrameSlot
    }

    pub fn is_stack_slot(&self) -> bool {
        self.kind == ValueKind::StackSlot
    }

    /// Frame and stack slots address memory.
    pub fn is_memory_slot(&self) -> bool {
        self.is_frame_slot() || self.is_stack_slot()
    }

    pub fn is_void(&self) -> bool {
        self.kind == ValueKind::Void
    }

    pub fn is_integer(&self) -> bool {
        self.ty == ValueType::Integer
    }

    pub fn is_float(&self) -> bool {
        self.ty == ValueType::Float
    }

    pub fn is_8bit(&self) -> bool {
        self.size == ValueSize::Size8
    }

    pub fn is_16bit(&self) -> bool {
        self.size == ValueSize::Size16
    }

    pub fn is_32bit(&self) -> bool {
        self.size == ValueSize::Size32
    }

    pub fn is_64bit(&self) -> bool {
        self.size == ValueSize::Size64
    }

    pub fn is_int8(&self) -> bool {
        self.is_integer() && self.is_8bit()
    }

    pub fn is_int32(&self) -> bool {
        self.is_integer() && self.is_32bit()
    }

    pub fn is_int64(&self) -> bool {
        self.is_integer() && self.is_64bit()
    }

    /// Does an immediate payload fit the declared size?
    pub fn fits_size(&self) -> bool {
        debug_assert!(self.is_immediate());
        match self.size {
            ValueSize::Size8 => is_8bit(self.data),
            ValueSize::Size16 => (-32768..=32767).contains(&self.data),
            _ => true,
        }
    }

    /// Can `data` be carried in a value's 32-bit payload?
    pub fn can_be_immediate(data: i64) -> bool {
        is_32bit(data)
    }

    /// Same-register test ignoring operand width.
    pub fn natural_equals(&self, other: &Value) -> bool {
        self.kind == other.kind && self.ty == other.ty && self.data == other.data
    }
}

/// Signed 8-bit range test used for displacement and immediate forms.
pub fn is_8bit(data: i32) -> bool {
    (-128..=127).contains(&data)
}

/// Signed 32-bit range test for 64-bit immediates.
pub fn is_32bit(data: i64) -> bool {
    data >= i64::from(i32::MIN) && data <= i64::from(i32::MAX)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Invalid => write!(f, "INVALID"),
            ValueKind::Argument => write!(f, "%arg[{}]", self.data),
            ValueKind::Condition => write!(f, "%b{}", self.data),
            ValueKind::FrameSlot => write!(f, "%frame[{}]", self.data),
            ValueKind::Immediate => {
                if self.size == ValueSize::Size64 {
                    write!(f, "{}l", self.data)
                } else {
                    write!(f, "{}", self.data)
                }
            }
            ValueKind::Instruction => write!(f, "#i{}", self.data),
            ValueKind::Literal => write!(f, "#{}", self.data),
            ValueKind::Parameter => write!(f, "%param[{}]", self.data),
            ValueKind::PhysicalRegister => write_physical(f, self),
            ValueKind::StackSlot => write!(f, "%stack[{}]", self.data),
            ValueKind::VirtualRegister => {
                let prefix = if self.is_float() { "%f" } else { "%r" };
                match self.size {
                    ValueSize::Size8 => write!(f, "{}{}b", prefix, self.data),
                    ValueSize::Size16 => write!(f, "{}{}w", prefix, self.data),
                    ValueSize::Size32 => write!(f, "{}{}", prefix, self.data),
                    ValueSize::Size64 => write!(f, "{}{}l", prefix, self.data),
                }
            }
            ValueKind::Void => write!(f, "void"),
        }
    }
}

static NAMES8: [&str; 16] = [
    "AL", "CL", "DL", "BL", "SPL", "BPL", "SIL", "DIL", "R8L", "R9L", "R10L", "R11L", "R12L",
    "R13L", "R14L", "R15L",
];
static NAMES16: [&str; 16] = [
    "AX", "CX", "DX", "BX", "SP", "BP", "SI", "DI", "R8W", "R9W", "R10W", "R11W", "R12W", "R13W",
    "R14W", "R15W",
];
static NAMES32: [&str; 16] = [
    "EAX", "ECX", "EDX", "EBX", "ESP", "EBP", "ESI", "EDI", "R8D", "R9D", "R10D", "R11D", "R12D",
    "R13D", "R14D", "R15D",
];
static NAMES64: [&str; 16] = [
    "RAX", "RCX", "RDX", "RBX", "RSP", "RBP", "RSI", "RDI", "R8", "R9", "R10", "R11", "R12",
    "R13", "R14", "R15",
];

fn write_physical(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    debug_assert!((0..16).contains(&value.data));
    let index = (value.data & 15) as usize;
    if value.is_float() {
        return write!(f, "XMM{}", value.data);
    }
    match value.size {
        ValueSize::Size8 => write!(f, "{}", NAMES8[index]),
        ValueSize::Size16 => write!(f, "{}", NAMES16[index]),
        ValueSize::Size32 => write!(f, "{}", NAMES32[index]),
        ValueSize::Size64 => write!(f, "{}", NAMES64[index]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn eight_bit_fits_everywhere(data: i8) -> bool {
        let value = Value::immediate(ValueSize::Size8, i32::from(data));
        value.fits_size() && is_8bit(i32::from(data)) && is_32bit(i64::from(data))
    }

    #[test]
    fn pod_equality_is_field_wise() {
        let a = Value::immediate(ValueSize::Size32, 42);
        let b = Value::immediate(ValueSize::Size32, 42);
        let c = Value::immediate(ValueSize::Size64, 42);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn immediate_range_helpers() {
        assert!(is_8bit(127));
        assert!(is_8bit(-128));
        assert!(!is_8bit(128));
        assert!(is_32bit(i64::from(i32::MAX)));
        assert!(!is_32bit(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn display_forms() {
        let rax = Value::new(ValueType::Integer, ValueSize::Size64, ValueKind::PhysicalRegister, 0);
        assert_eq!(rax.to_string(), "RAX");
        let ecx = Value::new(ValueType::Integer, ValueSize::Size32, ValueKind::PhysicalRegister, 1);
        assert_eq!(ecx.to_string(), "ECX");
        let vreg = Value::new(ValueType::Integer, ValueSize::Size32, ValueKind::VirtualRegister, 3);
        assert_eq!(vreg.to_string(), "%r3");
        let freg = Value::new(ValueType::Float, ValueSize::Size64, ValueKind::VirtualRegister, 2);
        assert_eq!(freg.to_string(), "%f2l");
        assert_eq!(Value::stack_slot(Value::int32_type(), 8).to_string(), "%stack[8]");
    }
}
