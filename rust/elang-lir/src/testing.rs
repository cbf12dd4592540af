//! Test support: a machine-code builder that renders a hex dump, with
//! long runs of one byte compressed, so golden tests stay readable.

use crate::emitters::MachineCodeBuilder;
use crate::value::Value;
use std::fmt::Write;

#[derive(Debug, Default)]
pub struct TestMachineCodeBuilder {
    bytes: Vec<u8>,
    call_sites: Vec<(usize, String)>,
    value_references: Vec<(usize, Value)>,
}

impl TestMachineCodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_sites(&self) -> &[(usize, String)] {
        &self.call_sites
    }

    pub fn value_references(&self) -> &[(usize, Value)] {
        &self.value_references
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex dump, 16 bytes per line; two or more consecutive uniform
    /// lines collapse into a run marker.
    pub fn result(&self) -> String {
        let lines: Vec<&[u8]> = self.bytes.chunks(16).collect();
        let uniform = |line: &[u8]| -> Option<u8> {
            if line.len() == 16 && line.iter().all(|&b| b == line[0]) {
                Some(line[0])
            } else {
                None
            }
        };

        let mut out = String::new();
        let mut index = 0;
        while index < lines.len() {
            let offset = index * 16;
            if let Some(byte) = uniform(lines[index]) {
                let mut run = index;
                while run < lines.len() && uniform(lines[run]) == Some(byte) {
                    run += 1;
                }
                if run - index >= 2 {
                    let _ = writeln!(
                        out,
                        "{:04X} ... 0x{:02X} x {} ...",
                        offset,
                        byte,
                        (run - index) * 16
                    );
                    index = run;
                    continue;
                }
            }
            let mut line = format!("{:04X}", offset);
            for byte in lines[index] {
                let _ = write!(line, " {:02X}", byte);
            }
            let _ = writeln!(out, "{}", line);
            index += 1;
        }
        out
    }
}

impl MachineCodeBuilder for TestMachineCodeBuilder {
    fn emit_code(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn set_call_site(&mut self, offset: usize, callee: &str) {
        self.call_sites.push((offset, callee.to_string()));
    }

    fn set_code_offset_of_value(&mut self, offset: usize, value: Value) {
        self.value_references.push((offset, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_compresses_uniform_lines() {
        let mut builder = TestMachineCodeBuilder::new();
        let mut bytes = vec![0x73, 0x01];
        bytes.extend(std::iter::repeat(0x4E).take(46));
        builder.emit_code(&bytes);
        let dump = builder.result();
        assert!(dump.starts_with("0000 73 01 4E"));
        assert!(dump.contains("0010 ... 0x4E x 32 ..."));
    }
}
