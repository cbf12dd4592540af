//! x64 instruction encoding.
//!
//! Per instruction, emits REX prefix, opcode, ModR/M, SIB,
//! displacement, and immediate bytes. Each arithmetic instruction
//! picks among the `Eb_Gb / Gb_Eb / AL_Ib / Eb_Ib / Ev_Iz / Ev_Ib`
//! forms by operand kind and immediate fit. Conditional branches take
//! their condition from the last `cmp` in the block; a `cmp` feeding a
//! `br` never materializes its flag register.

use super::code_buffer::{CodeBuffer, Jump};
use super::isa::{self, Mod, Opcode, OpcodeExt, Scale, ShiftExt, Tttn};
use crate::factory::Factory;
use crate::function::{BlockId, Function, InstrId, IntegerCondition, Opcode as Lir};
use crate::literals::Literal;
use crate::target::{Register, Target};
use crate::value::{is_32bit, is_8bit, Value, ValueSize};
use tracing::debug;

fn to_32bit_value(value: Value) -> Value {
    debug_assert!(value.is_64bit());
    Value::new(value.ty, ValueSize::Size32, value.kind, value.data)
}

fn opcode_for_load(output: Value) -> Opcode {
    debug_assert!(output.is_physical());
    if output.is_int8() {
        return Opcode::MOV_Gb_Eb;
    }
    if output.is_integer() {
        return Opcode::MOV_Gv_Ev;
    }
    if output.is_32bit() {
        return Opcode::MOVSS_Vss_Wss;
    }
    Opcode::MOVSD_Vsd_Wsd
}

fn opcode_for_store(input: Value) -> Opcode {
    debug_assert!(input.is_physical());
    if input.is_int8() {
        return Opcode::MOV_Eb_Gb;
    }
    if input.is_integer() {
        return Opcode::MOV_Ev_Gv;
    }
    if input.is_32bit() {
        return Opcode::MOVSS_Wss_Vss;
    }
    Opcode::MOVSD_Wsd_Vsd
}

fn tttn_of(condition: IntegerCondition) -> Tttn {
    match condition {
        IntegerCondition::Equal => Tttn::Equal,
        IntegerCondition::NotEqual => Tttn::NotEqual,
        IntegerCondition::SignedGreaterThan => Tttn::GreaterThan,
        IntegerCondition::SignedGreaterThanOrEqual => Tttn::GreaterOrEqual,
        IntegerCondition::SignedLessThan => Tttn::LessThan,
        IntegerCondition::SignedLessThanOrEqual => Tttn::LessThanOrEqual,
        IntegerCondition::UnsignedGreaterThan => Tttn::Above,
        IntegerCondition::UnsignedGreaterThanOrEqual => Tttn::AboveOrEqual,
        IntegerCondition::UnsignedLessThan => Tttn::Below,
        IntegerCondition::UnsignedLessThanOrEqual => Tttn::BelowOrEqual,
    }
}

fn jump_of(opcode: Opcode, tttn: Tttn, opcode_size: i32, operand_size: i32) -> Jump {
    Jump::new(
        (opcode.value() + tttn as u32) as i32,
        opcode_size,
        operand_size,
    )
}

pub struct InstructionHandlerX64<'a> {
    factory: &'a Factory,
    function: &'a Function,
    buffer: &'a mut CodeBuffer,
    /// Last `cmp` seen in the current block; the flags source for a
    /// following `br`.
    last_cmp_instruction: Option<InstrId>,
}

impl<'a> InstructionHandlerX64<'a> {
    pub fn new(factory: &'a Factory, function: &'a Function, buffer: &'a mut CodeBuffer) -> Self {
        Self {
            factory,
            function,
            buffer,
            last_cmp_instruction: None,
        }
    }

    pub fn process(&mut self) {
        for &block in self.function.block_order() {
            self.buffer.start_basic_block(block);
            self.last_cmp_instruction = None;
            for instr in self.function.block(block).all_instructions() {
                self.handle(instr);
                self.last_cmp_instruction = match self.function.instr(instr).opcode {
                    Lir::Cmp(_) => Some(instr),
                    _ => self.last_cmp_instruction,
                };
            }
            self.buffer.end_basic_block();
        }
    }

    fn handle(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        match instruction.opcode {
            Lir::Add => self.visit_arithmetic(instr, Opcode::ADD_Eb_Gb, OpcodeExt::Add),
            Lir::BitAnd => self.visit_arithmetic(instr, Opcode::AND_Eb_Gb, OpcodeExt::And),
            Lir::BitOr => self.visit_arithmetic(instr, Opcode::OR_Eb_Gb, OpcodeExt::Or),
            Lir::BitXor => self.visit_arithmetic(instr, Opcode::XOR_Eb_Gb, OpcodeExt::Xor),
            Lir::Branch => self.visit_branch(instr),
            Lir::Call => self.visit_call(instr),
            Lir::Cmp(_) => self.visit_cmp(instr),
            Lir::Copy => self.visit_copy(instr),
            Lir::Entry | Lir::Exit => {}
            Lir::Jump => self.visit_jump(instr),
            Lir::Literal => self.visit_literal(instr),
            Lir::Load => self.visit_load(instr),
            Lir::Nop => self.buffer.emit8(Opcode::NOP.value() as i32),
            Lir::Ret => self.visit_ret(),
            Lir::Shl => self.visit_shift(instr, ShiftExt::Shl),
            Lir::Shr => self.visit_shift(instr, ShiftExt::Sar),
            Lir::SignExtend => self.visit_sign_extend(instr),
            Lir::Sub => self.visit_arithmetic(instr, Opcode::SUB_Eb_Gb, OpcodeExt::Sub),
            Lir::UShr => self.visit_shift(instr, ShiftExt::Shr),
            Lir::ZeroExtend => self.visit_zero_extend(instr),
            opcode => self.do_default_visit(opcode),
        }
    }

    fn do_default_visit(&mut self, opcode: Lir) {
        debug!(mnemonic = opcode.mnemonic(), "no encoding yet");
    }

    // ── Byte-level helpers ──────────────────────────────────────────

    fn emit_opcode(&mut self, opcode: Opcode) {
        let value = opcode.value();
        debug_assert!(value < 1 << 24);
        if value > 0xFFFF {
            self.buffer.emit8((value >> 16) as i32);
        }
        if value > 0xFF {
            self.buffer.emit8((value >> 8) as i32);
        }
        self.buffer.emit8(value as i32);
    }

    /// Opcode plus a small delta, for forms that encode a register or
    /// an operand-size step in the opcode byte.
    fn emit_opcode_plus(&mut self, opcode: Opcode, delta: i32) {
        let value = opcode.value() as i32 + delta;
        debug_assert!(value < 1 << 24);
        if value > 0xFFFF {
            self.buffer.emit8(value >> 16);
        }
        if value > 0xFF {
            self.buffer.emit8(value >> 8);
        }
        self.buffer.emit8(value);
    }

    fn emit_modrm_raw(&mut self, modifier: Mod, reg: i32, rm: i32) {
        self.buffer
            .emit8(modifier as u8 as i32 | ((reg & 7) << 3) | (rm & 7));
    }

    fn emit_sib(&mut self, scale: Scale, index: i32, base: i32) {
        self.buffer
            .emit8(scale as u8 as i32 | ((index & 7) << 3) | (base & 7));
    }

    /// ModR/M (and SIB/displacement) for a register field against a
    /// register or memory operand.
    fn emit_modrm(&mut self, reg: i32, operand: Value) {
        if operand.is_physical() {
            self.emit_modrm_raw(Mod::Reg, reg, operand.data);
            return;
        }
        if operand.is_frame_slot() {
            let rbp = Target::register_of(Register::RBP).data;
            self.emit_modrm_disp(reg, rbp, operand.data);
            return;
        }
        debug_assert!(operand.is_stack_slot(), "bad memory operand {}", operand);
        let rsp = Target::register_of(Register::RSP).data;
        self.emit_modrm_disp(reg, rsp, operand.data);
    }

    /// Register-or-memory pair: exactly one side names the ModR/M reg
    /// field.
    fn emit_modrm_pair(&mut self, output: Value, input: Value) {
        if output.is_physical() {
            self.emit_modrm(output.data, input);
            return;
        }
        debug_assert!(input.is_physical(), "{} , {}", output, input);
        self.emit_modrm(input.data, output);
    }

    fn emit_modrm_disp(&mut self, reg: i32, base: i32, displacement: i32) {
        let rm = base & 7;
        if displacement == 0 && rm != isa::RM_DISP32 as i32 {
            self.emit_modrm_raw(Mod::Disp0, reg, base);
            if rm == isa::RM_SIB as i32 {
                self.emit_sib(Scale::One, isa::RM_SIB as i32, base);
            }
            return;
        }
        if is_8bit(displacement) {
            self.emit_modrm_raw(Mod::Disp8, reg, base);
            if rm == isa::RM_SIB as i32 {
                self.emit_sib(Scale::One, isa::RM_SIB as i32, base);
            }
            self.buffer.emit8(displacement);
            return;
        }
        self.emit_modrm_raw(Mod::Disp32, reg, base);
        if rm == isa::RM_SIB as i32 {
            self.emit_sib(Scale::One, isa::RM_SIB as i32, base);
        }
        self.buffer.emit32(displacement as u32);
    }

    /// REX prefix (and operand-size prefix) for a reg/rm pair.
    fn emit_rex_prefix(&mut self, reg: Value, rm: Value) {
        if reg.is_16bit() {
            self.emit_opcode(Opcode::OPDSIZ);
        }
        let mut rex = 0u8;
        if reg.is_64bit() {
            rex |= isa::REX_W;
        }
        if reg.is_physical() && reg.data >= 8 {
            rex |= isa::REX_R;
        }
        if rm.is_physical() && rm.data >= 8 {
            rex |= isa::REX_B;
        }
        // Accessing the low byte of SI, DI, SP, BP needs a bare REX.
        if reg.is_8bit() && reg.is_physical() && reg.data >= 4 {
            rex |= isa::REX;
        }
        if rm.is_8bit() && rm.is_physical() && rm.data >= 4 {
            rex |= isa::REX;
        }
        if rex == 0 {
            return;
        }
        self.buffer.emit8((isa::REX | rex) as i32);
    }

    fn emit_rex_prefix_for(&mut self, rm: Value) {
        if rm.is_16bit() {
            self.emit_opcode(Opcode::OPDSIZ);
        }
        let mut rex = 0u8;
        if rm.is_64bit() {
            rex |= isa::REX_W;
        }
        if rm.is_physical() && rm.data >= 8 {
            rex |= isa::REX_B;
        }
        if rm.is_8bit() && rm.is_physical() && rm.data >= 4 {
            rex |= isa::REX;
        }
        if rex == 0 {
            return;
        }
        self.buffer.emit8((isa::REX | rex) as i32);
    }

    /// Immediate sized to the destination: Ib, Iw, or Iz.
    fn emit_iz(&mut self, output: Value, imm: i32) {
        if output.is_8bit() {
            self.buffer.emit8(imm);
            return;
        }
        if output.is_16bit() {
            self.buffer.emit16(imm);
            return;
        }
        self.buffer.emit32(imm as u32);
    }

    /// A 32-bit operand field: inline immediates and small literals,
    /// or a relocated reference into the literal pool.
    fn emit_operand(&mut self, value: Value) {
        if value.is_immediate() {
            match value.size {
                ValueSize::Size8 => self.buffer.emit8(value.data),
                ValueSize::Size16 => self.buffer.emit16(value.data),
                ValueSize::Size32 | ValueSize::Size64 => self.buffer.emit32(value.data as u32),
            }
            return;
        }
        if value.is_literal() {
            match self.factory.literal(value) {
                Literal::Int32(data) => {
                    self.buffer.emit32(*data as u32);
                    return;
                }
                Literal::Int64(data) => {
                    debug_assert!(is_32bit(*data));
                    self.buffer.emit32(*data as u32);
                    return;
                }
                _ => {}
            }
        }
        self.buffer.associate_value(value);
        self.buffer.emit32(0);
    }

    fn int32_value_of(&self, value: Value) -> i32 {
        if value.is_immediate() {
            return value.data;
        }
        debug_assert!(value.is_literal(), "{}", value);
        match self.factory.literal(value) {
            Literal::Int32(data) => *data,
            Literal::Int64(data) => {
                debug_assert!(is_32bit(*data));
                *data as i32
            }
            literal => unreachable!("{:?} is not a 32-bit literal", literal),
        }
    }

    fn int64_value_of(&self, value: Value) -> i64 {
        if value.is_immediate() {
            return i64::from(value.data);
        }
        debug_assert!(value.is_literal(), "{}", value);
        match self.factory.literal(value) {
            Literal::Int32(data) => i64::from(*data),
            Literal::Int64(data) => *data,
            literal => unreachable!("{:?} is not an integer literal", literal),
        }
    }

    fn use_condition(&self, user: InstrId) -> IntegerCondition {
        let cmp = self
            .last_cmp_instruction
            .unwrap_or_else(|| unreachable!("branch without a preceding cmp"));
        debug_assert_eq!(
            self.function.instr(cmp).output(0),
            self.function.instr(user).input(0)
        );
        match self.function.instr(cmp).opcode {
            Lir::Cmp(condition) => condition,
            _ => unreachable!(),
        }
    }

    // ── Jumps and branches ──────────────────────────────────────────

    fn emit_branch(&mut self, condition: IntegerCondition, target: BlockId) {
        let tttn = tttn_of(condition);
        let long_branch = jump_of(Opcode::Jcc_Jv, tttn, 2, 4);
        let short_branch = jump_of(Opcode::Jcc_Jb, tttn, 1, 1);
        self.buffer.emit_jump(long_branch, short_branch, target);
    }

    fn emit_jump_to(&mut self, target: BlockId) {
        let long_jump = Jump::new(Opcode::JMP_Jv.value() as i32, 1, 4);
        let short_jump = Jump::new(Opcode::JMP_Jb.value() as i32, 1, 1);
        self.buffer.emit_jump(long_jump, short_jump, target);
    }

    // 70+tttn cb   Jcc Jb
    // 0F 80+tttn cv Jcc Jv
    // EB cb        JMP rel8
    // E9 cd        JMP rel32
    fn visit_branch(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let true_block = instruction.block_operand(0);
        let false_block = instruction.block_operand(1);
        debug_assert_ne!(true_block, false_block);

        let condition = self.use_condition(instr);
        let block = instruction
            .basic_block
            .unwrap_or_else(|| unreachable!("detached branch"));
        let next_block = self.function.next_block_of(block);
        if next_block == Some(true_block) {
            self.emit_branch(condition.negated(), false_block);
            return;
        }
        self.emit_branch(condition, true_block);
        if next_block == Some(false_block) {
            return;
        }
        self.emit_jump_to(false_block);
    }

    fn visit_jump(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let target = instruction.block_operand(0);
        let block = instruction
            .basic_block
            .unwrap_or_else(|| unreachable!("detached jump"));
        if self.function.next_block_of(block) == Some(target) {
            return;
        }
        self.emit_jump_to(target);
    }

    // E8 cd: CALL rel32, resolved by the machine-code consumer.
    fn visit_call(&mut self, instr: InstrId) {
        self.emit_opcode(Opcode::CALL_Jv);
        let callee = self.function.instr(instr).input(0);
        match self.factory.literal(callee) {
            Literal::String(name) => {
                let name = name.clone();
                self.buffer.associate_call_site(&name);
            }
            literal => unreachable!("unsupported callee {:?}", literal),
        }
        self.buffer.emit32(0);
    }

    fn visit_ret(&mut self) {
        self.emit_opcode(Opcode::RET);
    }

    // ── Arithmetic ──────────────────────────────────────────────────

    // Form selection for the 00/08/20/28/30/38 opcode families:
    //
    //  00 /r       op r/m8, r8
    //  02 /r       op r8, r/m8
    //  04 ib       op AL, imm8
    //  80 /ext ib  op r/m8, imm8
    //  01 /r       op r/m32, r32
    //  03 /r       op r32, r/m32
    //  05 id       op eAX, imm32
    //  83 /ext ib  op r/m32, imm8
    //  81 /ext id  op r/m32, imm32
    fn visit_arithmetic(&mut self, instr: InstrId, op_eb_gb: Opcode, ext: OpcodeExt) {
        let instruction = self.function.instr(instr);
        debug_assert!(
            instruction.output(0).is_conditional()
                || instruction.output(0) == instruction.input(0)
        );
        self.handle_integer_arithmetic(instr, op_eb_gb, ext);
    }

    fn handle_integer_arithmetic(&mut self, instr: InstrId, op_eb_gb: Opcode, ext: OpcodeExt) {
        let instruction = self.function.instr(instr);
        let left = instruction.input(0);
        let right = instruction.input(1);
        debug_assert_eq!(left.size, right.size);
        debug_assert_eq!(left.ty, right.ty);

        if left.is_8bit() {
            if right.is_physical() {
                self.emit_rex_prefix(right, left);
                self.emit_opcode(op_eb_gb);
                self.emit_modrm(right.data, left);
                return;
            }
            if right.is_memory_slot() {
                self.emit_rex_prefix(left, right);
                self.emit_opcode_plus(op_eb_gb, 2);
                self.emit_modrm(left.data, right);
                return;
            }
            let imm8 = self.int32_value_of(right);
            if left.is_physical() && left.data == 0 {
                self.emit_rex_prefix_for(left);
                self.emit_opcode_plus(op_eb_gb, 4);
                self.buffer.emit8(imm8);
                return;
            }
            self.emit_rex_prefix_for(left);
            self.emit_opcode(Opcode::ADD_Eb_Ib);
            self.emit_modrm(ext as i32, left);
            self.buffer.emit8(imm8);
            return;
        }

        if right.is_physical() {
            self.emit_rex_prefix(right, left);
            self.emit_opcode_plus(op_eb_gb, 1);
            self.emit_modrm(right.data, left);
            return;
        }
        if right.is_memory_slot() {
            self.emit_rex_prefix(left, right);
            self.emit_opcode_plus(op_eb_gb, 3);
            self.emit_modrm(left.data, right);
            return;
        }

        self.emit_rex_prefix_for(left);
        let imm32 = self.int32_value_of(right);
        if left.is_physical() && left.data == 0 {
            self.emit_opcode_plus(op_eb_gb, 5);
            self.emit_iz(left, imm32);
            return;
        }
        if is_8bit(imm32) {
            self.emit_opcode(Opcode::ADD_Ev_Ib);
            self.emit_modrm(ext as i32, left);
            self.buffer.emit8(imm32);
            return;
        }
        self.emit_opcode(Opcode::ADD_Ev_Iz);
        self.emit_modrm(ext as i32, left);
        self.emit_iz(left, imm32);
    }

    // D0-D3/C0-C1 shift group; the count is 1, CL, or imm8.
    fn visit_shift(&mut self, instr: InstrId, ext: ShiftExt) {
        let instruction = self.function.instr(instr);
        let count = instruction.input(1);
        let output = instruction.output(0);
        debug_assert_eq!(output, instruction.input(0));

        self.emit_rex_prefix_for(output);
        let cl = Target::register_of(Register::CL);
        let (one, by_cl, by_imm) = if output.is_8bit() {
            (Opcode::SHL_Eb_1, Opcode::SHL_Eb_CL, Opcode::SHL_Eb_Ib)
        } else {
            (Opcode::SHL_Ev_1, Opcode::SHL_Ev_CL, Opcode::SHL_Ev_Ib)
        };
        if count == Value::small_int32(1) {
            self.emit_opcode(one);
            self.emit_modrm(ext as i32, output);
            return;
        }
        if count.is_physical() && count.natural_equals(&cl) {
            self.emit_opcode(by_cl);
            self.emit_modrm(ext as i32, output);
            return;
        }
        debug_assert!(count.is_immediate() && is_8bit(count.data), "{}", count);
        self.emit_opcode(by_imm);
        self.emit_modrm(ext as i32, output);
        self.buffer.emit8(count.data);
    }

    // Base opcode 0x38, ext 7; the output is a condition value that
    // lives in the flags, so no bytes are produced for it.
    fn visit_cmp(&mut self, instr: InstrId) {
        debug_assert!(self.function.instr(instr).output(0).is_conditional());
        self.handle_integer_arithmetic(instr, Opcode::CMP_Eb_Gb, OpcodeExt::Cmp);
    }

    // ── Moves ───────────────────────────────────────────────────────

    // 88/8A MOV r/m8; 89/8B MOV r/m32; F3 0F 10/11 MOVSS; F2 0F 10/11
    // MOVSD.
    fn visit_copy(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let output = instruction.output(0);
        let input = instruction.input(0);
        debug_assert_eq!(Value::type_of(output), Value::type_of(input));

        if output.is_physical() {
            self.emit_rex_prefix(output, input);
            self.emit_opcode(opcode_for_load(output));
            self.emit_modrm(output.data, input);
            return;
        }
        debug_assert!(input.is_physical(), "{} <- {}", output, input);
        self.emit_rex_prefix(input, output);
        self.emit_opcode(opcode_for_store(input));
        self.emit_modrm(input.data, output);
    }

    // B0+r/B8+r MOV reg, imm; C6/C7 MOV r/m, imm. A 64-bit immediate
    // that fits 32 bits takes the sign-extended or zero-extended short
    // form.
    fn visit_literal(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let input = instruction.input(0);
        let output = instruction.output(0);
        debug_assert_eq!(input.size, output.size);
        debug_assert!(output.is_integer(), "float literals are lowered: {}", output);

        if output.is_64bit() {
            let imm64 = self.int64_value_of(input);
            if is_32bit(imm64) {
                let value32 = to_32bit_value(output);
                let imm32 = imm64 as i32;
                if imm32 >= 0 && output.is_physical() {
                    // B8+r id: the 32-bit write zero-extends.
                    self.emit_rex_prefix_for(value32);
                    self.emit_opcode_plus(Opcode::MOV_rAX_Iv, value32.data & 7);
                    self.buffer.emit32(imm32 as u32);
                    return;
                }
                // REX.W C7 /0 id: sign-extend to 64 bits.
                self.emit_rex_prefix_for(output);
                self.emit_opcode(Opcode::MOV_Ev_Iz);
                self.emit_modrm(isa::MOV_EXT as i32, output);
                self.buffer.emit32(imm32 as u32);
                return;
            }
            // REX.W B8+r io: the full 64-bit immediate.
            debug_assert!(output.is_physical());
            self.emit_rex_prefix_for(output);
            self.emit_opcode_plus(Opcode::MOV_rAX_Iv, output.data & 7);
            self.buffer.emit64(imm64 as u64);
            return;
        }

        self.emit_rex_prefix_for(output);
        if output.is_8bit() {
            if output.is_physical() {
                self.emit_opcode_plus(Opcode::MOV_AL_Ib, output.data & 7);
                self.emit_operand(input);
                return;
            }
            self.emit_opcode(Opcode::MOV_Eb_Ib);
            self.emit_modrm(isa::MOV_EXT as i32, output);
            self.emit_operand(input);
            return;
        }
        if output.is_physical() {
            self.emit_opcode_plus(Opcode::MOV_rAX_Iv, output.data & 7);
            self.emit_operand(input);
            return;
        }
        self.emit_opcode(Opcode::MOV_Ev_Iz);
        self.emit_modrm(isa::MOV_EXT as i32, output);
        self.emit_operand(input);
    }

    // 8A/8B MOV from [base+disp]; input(0) is the anchor the pointer
    // was derived from and does not contribute bytes.
    fn visit_load(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let output = instruction.output(0);
        let pointer = instruction.input(1);
        let displacement = instruction.input(2);
        debug_assert!(displacement.is_immediate());
        self.emit_rex_prefix(output, pointer);
        self.emit_opcode(opcode_for_load(output));
        self.emit_modrm_disp(output.data, pointer.data, displacement.data);
    }

    // 0F BE/BF MOVSX; REX.W 63 MOVSXD.
    fn visit_sign_extend(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let output = instruction.output(0);
        let input = instruction.input(0);
        self.emit_rex_prefix(output, input);
        let opcode = match input.size {
            ValueSize::Size8 => Opcode::MOVSX_Gv_Eb,
            ValueSize::Size16 => Opcode::MOVSX_Gv_Ew,
            ValueSize::Size32 => Opcode::MOVSXD_Gv_Ev,
            ValueSize::Size64 => unreachable!("sign extend from 64 bits"),
        };
        self.emit_opcode(opcode);
        self.emit_modrm_pair(output, input);
    }

    // 0F B6/B7 MOVZX; a 32-bit MOV already zero-clears the high half,
    // so extending 32→64 uses the plain 32-bit move.
    fn visit_zero_extend(&mut self, instr: InstrId) {
        let instruction = self.function.instr(instr);
        let output_orig = instruction.output(0);
        let output = if output_orig.is_64bit() {
            to_32bit_value(output_orig)
        } else {
            output_orig
        };
        let input = instruction.input(0);
        self.emit_rex_prefix(output, input);
        let opcode = match input.size {
            ValueSize::Size8 => Opcode::MOVZX_Gv_Eb,
            ValueSize::Size16 => Opcode::MOVZX_Gv_Ew,
            ValueSize::Size32 => Opcode::MOV_Gv_Ev,
            ValueSize::Size64 => unreachable!("zero extend from 64 bits"),
        };
        self.emit_opcode(opcode);
        self.emit_modrm_pair(output, input);
    }
}
