//! Machine-code emission: the byte buffer with symbolic jumps, the
//! x64 instruction handler, and the builder interface the final bytes
//! are fed into.

pub mod code_buffer;
pub mod code_emitter;
pub mod isa;
mod x64;

use crate::value::Value;
use serde::Serialize;

/// Consumer of finished machine code. `CodeBuffer::finish` feeds it
/// the byte vector, call-site fix-ups, and literal relocations.
pub trait MachineCodeBuilder {
    fn prepare_code_buffer(&mut self, code_size: usize) {
        let _ = code_size;
    }
    fn emit_code(&mut self, bytes: &[u8]);
    /// A `rel32` call at `offset` targets the named callee.
    fn set_call_site(&mut self, offset: usize, callee: &str);
    /// The 32 bits at `offset` reference a pooled literal.
    fn set_code_offset_of_value(&mut self, offset: usize, value: Value);
    fn finish(&mut self) {}
}

/// A complete machine-code artifact, serializable for drivers that
/// dump compilation results.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MachineCode {
    pub bytes: Vec<u8>,
    pub call_sites: Vec<CallSite>,
    pub value_references: Vec<ValueReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallSite {
    pub offset: usize,
    pub callee: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueReference {
    pub offset: usize,
    pub value: Value,
}

impl MachineCodeBuilder for MachineCode {
    fn emit_code(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn set_call_site(&mut self, offset: usize, callee: &str) {
        self.call_sites.push(CallSite {
            offset,
            callee: callee.to_string(),
        });
    }

    fn set_code_offset_of_value(&mut self, offset: usize, value: Value) {
        self.value_references.push(ValueReference { offset, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_code_dumps_as_json() {
        let mut code = MachineCode::default();
        code.emit_code(&[0xC3]);
        code.set_call_site(0, "foo");
        let json = serde_json::to_string(&code).expect("serializable artifact");
        assert!(json.contains("\"callee\":\"foo\""));
        assert!(json.contains("\"bytes\":[195]"));
    }
}
