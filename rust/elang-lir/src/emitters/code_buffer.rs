//! The code buffer.
//!
//! Bytes accumulate per basic block with symbolic jumps left open.
//! On `finish` the buffer picks short or long encodings: every jump
//! starts short and grows while its displacement misses the signed
//! 8-bit window. Growth is monotone, so the loop reaches a fixpoint.
//! The resolved bytes, call sites, and literal relocations then feed a
//! [`MachineCodeBuilder`].

use super::MachineCodeBuilder;
use crate::factory::Factory;
use crate::function::BlockId;
use crate::value::Value;
use std::collections::HashMap;
use tracing::trace;

/// One jump encoding alternative: an opcode (emitted high byte first
/// over `opcode_size` bytes) and its displacement width.
#[derive(Debug, Clone, Copy)]
pub struct Jump {
    pub opcode: i32,
    pub opcode_size: i32,
    pub operand_size: i32,
}

impl Jump {
    pub fn new(opcode: i32, opcode_size: i32, operand_size: i32) -> Self {
        Self {
            opcode,
            opcode_size,
            operand_size,
        }
    }

    pub fn size(&self) -> i32 {
        self.opcode_size + self.operand_size
    }
}

#[derive(Debug)]
struct JumpData {
    long_form: Jump,
    short_form: Jump,
    target: BlockId,
    is_long: bool,
}

#[derive(Debug)]
enum Chunk {
    BlockStart(BlockId),
    Bytes(Vec<u8>),
    CallSite(String),
    Jump(usize),
    ValueRef(Value),
}

#[derive(Debug, Default)]
pub struct CodeBuffer {
    chunks: Vec<Chunk>,
    jumps: Vec<JumpData>,
    in_block: bool,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_basic_block(&mut self, block: BlockId) {
        debug_assert!(!self.in_block);
        self.in_block = true;
        self.chunks.push(Chunk::BlockStart(block));
    }

    pub fn end_basic_block(&mut self) {
        debug_assert!(self.in_block);
        self.in_block = false;
    }

    fn bytes_chunk(&mut self) -> &mut Vec<u8> {
        if !matches!(self.chunks.last(), Some(Chunk::Bytes(_))) {
            self.chunks.push(Chunk::Bytes(Vec::new()));
        }
        match self.chunks.last_mut() {
            Some(Chunk::Bytes(bytes)) => bytes,
            _ => unreachable!(),
        }
    }

    pub fn emit8(&mut self, value: i32) {
        self.bytes_chunk().push(value as u8);
    }

    pub fn emit16(&mut self, value: i32) {
        let bytes = (value as u16).to_le_bytes();
        self.bytes_chunk().extend_from_slice(&bytes);
    }

    pub fn emit32(&mut self, value: u32) {
        let bytes = value.to_le_bytes();
        self.bytes_chunk().extend_from_slice(&bytes);
    }

    pub fn emit64(&mut self, value: u64) {
        let bytes = value.to_le_bytes();
        self.bytes_chunk().extend_from_slice(&bytes);
    }

    /// A symbolic jump to `target`, encoded short when the final
    /// displacement allows.
    pub fn emit_jump(&mut self, long_form: Jump, short_form: Jump, target: BlockId) {
        let index = self.jumps.len();
        self.jumps.push(JumpData {
            long_form,
            short_form,
            target,
            is_long: false,
        });
        self.chunks.push(Chunk::Jump(index));
    }

    /// Associate `callee` with the 32-bit field at the current offset.
    pub fn associate_call_site(&mut self, callee: &str) {
        self.chunks.push(Chunk::CallSite(callee.to_string()));
    }

    /// Associate a pooled value with the 32-bit field at the current
    /// offset.
    pub fn associate_value(&mut self, value: Value) {
        self.chunks.push(Chunk::ValueRef(value));
    }

    // ── Finish ──────────────────────────────────────────────────────

    fn chunk_size(&self, chunk: &Chunk) -> usize {
        match chunk {
            Chunk::BlockStart(_) | Chunk::CallSite(_) | Chunk::ValueRef(_) => 0,
            Chunk::Bytes(bytes) => bytes.len(),
            Chunk::Jump(index) => {
                let jump = &self.jumps[*index];
                if jump.is_long {
                    jump.long_form.size() as usize
                } else {
                    jump.short_form.size() as usize
                }
            }
        }
    }

    fn block_offsets(&self) -> HashMap<BlockId, usize> {
        let mut offsets = HashMap::new();
        let mut offset = 0usize;
        for chunk in &self.chunks {
            if let Chunk::BlockStart(block) = chunk {
                offsets.insert(*block, offset);
            }
            offset += self.chunk_size(chunk);
        }
        offsets
    }

    /// Grow jumps whose short displacement cannot reach; repeat until
    /// nothing changes.
    fn resolve_jump_sizes(&mut self) {
        loop {
            let offsets = self.block_offsets();
            let mut changed = false;
            let mut offset = 0usize;
            for chunk_index in 0..self.chunks.len() {
                let size = self.chunk_size(&self.chunks[chunk_index]);
                if let Chunk::Jump(index) = self.chunks[chunk_index] {
                    let jump = &self.jumps[index];
                    if !jump.is_long {
                        let end = offset + size;
                        let displacement = offsets[&jump.target] as i64 - end as i64;
                        if !(-128..=127).contains(&displacement) {
                            self.jumps[index].is_long = true;
                            changed = true;
                        }
                    }
                }
                offset += size;
            }
            if !changed {
                return;
            }
        }
    }

    /// Close the buffer: resolve jump forms, then hand bytes and
    /// fix-ups to `builder`.
    pub fn finish(mut self, _factory: &Factory, builder: &mut dyn MachineCodeBuilder) {
        self.resolve_jump_sizes();
        let offsets = self.block_offsets();

        let total: usize = self.chunks.iter().map(|c| self.chunk_size(c)).sum();
        builder.prepare_code_buffer(total);
        trace!(code_size = total, "emitting machine code");

        let mut bytes: Vec<u8> = Vec::with_capacity(total);
        for chunk in &self.chunks {
            match chunk {
                Chunk::BlockStart(_) => {}
                Chunk::Bytes(data) => bytes.extend_from_slice(data),
                Chunk::CallSite(callee) => builder.set_call_site(bytes.len(), callee),
                Chunk::ValueRef(value) => builder.set_code_offset_of_value(bytes.len(), *value),
                Chunk::Jump(index) => {
                    let jump = &self.jumps[*index];
                    let form = if jump.is_long {
                        jump.long_form
                    } else {
                        jump.short_form
                    };
                    let end = bytes.len() + form.size() as usize;
                    let displacement = offsets[&jump.target] as i64 - end as i64;
                    // Opcode bytes, high first.
                    for position in (0..form.opcode_size).rev() {
                        bytes.push((form.opcode >> (position * 8)) as u8);
                    }
                    match form.operand_size {
                        1 => {
                            debug_assert!((-128..=127).contains(&displacement));
                            bytes.push(displacement as u8);
                        }
                        4 => {
                            bytes.extend_from_slice(&(displacement as i32).to_le_bytes());
                        }
                        _ => unreachable!("unsupported jump operand size"),
                    }
                }
            }
        }
        debug_assert_eq!(bytes.len(), total);
        builder.emit_code(&bytes);
        builder.finish();
    }
}
