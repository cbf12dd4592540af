//! End-to-end backend runs: building SSA functions, driving the full
//! pass pipeline, and inspecting the allocated, emitted result.

use elang_lir::testing::TestMachineCodeBuilder;
use elang_lir::transforms::allocation_pass::RegisterAssignmentsPass;
use elang_lir::transforms::critical_edges::RemoveCriticalEdgesPass;
use elang_lir::transforms::lowering_x64::LoweringX64Pass;
use elang_lir::{
    Editor, Factory, Function, IntegerCondition, Opcode, Pipeline, Value, ValueKind,
};

fn copies_of(function: &Function) -> (usize, usize) {
    let mut stores = 0;
    let mut reloads = 0;
    for &block in function.block_order() {
        for instr in function.block(block).all_instructions() {
            let instruction = function.instr(instr);
            if instruction.opcode != Opcode::Copy {
                continue;
            }
            if instruction.output(0).is_stack_slot() {
                stores += 1;
            }
            if instruction.input(0).is_stack_slot() {
                reloads += 1;
            }
        }
    }
    (stores, reloads)
}

fn assert_no_virtual_operands(function: &Function) {
    for &block in function.block_order() {
        for instr in function.block(block).all_instructions() {
            let instruction = function.instr(instr);
            for operand in instruction.outputs.iter().chain(instruction.inputs.iter()) {
                assert!(
                    operand.kind != ValueKind::VirtualRegister,
                    "virtual operand {} survived allocation",
                    operand
                );
            }
        }
    }
}

// lit eax <- 42; ret: the smallest function that produces bytes.
#[test]
fn constant_return_emits_mov_and_ret() {
    let mut factory = Factory::new();
    let mut function = factory.new_function();
    let entry = function.entry_block;
    {
        let mut editor = Editor::new(&mut factory, &mut function);
        let eax = elang_lir::target::Target::register_of(elang_lir::target::Register::EAX);
        editor.edit(entry);
        let lit = editor.new_instruction(Opcode::Literal, vec![eax], vec![Value::small_int32(42)]);
        editor.append(lit);
        editor.set_ret();
        assert!(editor.commit());
    }

    let mut builder = TestMachineCodeBuilder::new();
    assert!(Pipeline::new(&mut factory, &mut function).run(&mut builder));
    assert_eq!(builder.bytes(), &[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3]);
}

// t = a + b; c = foo(); d = t + c: t lives across the call, so the
// allocator parks it in a spill slot with exactly one store/reload
// pair.
#[test]
fn value_live_across_call_spills_once() {
    let mut factory = Factory::new();
    let a = factory.new_register(Value::int32_type());
    let b = factory.new_register(Value::int32_type());
    let t = factory.new_register(Value::int32_type());
    let c = factory.new_register(Value::int32_type());
    let d = factory.new_register(Value::int32_type());
    let foo = factory.new_string_literal("foo");
    let mut function = factory.new_function();
    let entry = function.entry_block;
    {
        let mut editor = Editor::new(&mut factory, &mut function);
        let eax = elang_lir::target::Target::register_of(elang_lir::target::Register::EAX);
        editor.edit(entry);
        let def_a = editor.new_instruction(Opcode::Literal, vec![a], vec![Value::small_int32(1)]);
        let def_b = editor.new_instruction(Opcode::Literal, vec![b], vec![Value::small_int32(2)]);
        let sum = editor.new_instruction(Opcode::Add, vec![t], vec![a, b]);
        let call = editor.new_instruction(Opcode::Call, vec![], vec![foo]);
        let take = editor.new_instruction(Opcode::Copy, vec![c], vec![eax]);
        let total = editor.new_instruction(Opcode::Add, vec![d], vec![t, c]);
        for instr in [def_a, def_b, sum, call, take, total] {
            editor.append(instr);
        }
        editor.set_ret();
        assert!(editor.commit());
    }

    let mut builder = TestMachineCodeBuilder::new();
    assert!(Pipeline::new(&mut factory, &mut function).run(&mut builder));

    assert_no_virtual_operands(&function);
    let (stores, reloads) = copies_of(&function);
    assert_eq!(stores, 1, "exactly one spill store:\n{}", function);
    assert_eq!(reloads, 1, "exactly one reload:\n{}", function);
    // Non-leaf frame: the prologue reserves the shadow area.
    let first = function.block(function.entry_block).instructions[1];
    assert_eq!(function.instr(first).opcode, Opcode::Sub);
    assert!(!builder.bytes().is_empty());
}

// Two φs swapping values around a loop force a register cycle on the
// back edge; the expansion breaks it with a scratch register in three
// copies.
#[test]
fn phi_swap_cycle_breaks_with_scratch() {
    let mut factory = Factory::new();
    let v1 = factory.new_register(Value::int32_type());
    let v2 = factory.new_register(Value::int32_type());
    let p1 = factory.new_register(Value::int32_type());
    let p2 = factory.new_register(Value::int32_type());
    let mut function = factory.new_function();
    let entry = function.entry_block;
    let exit = function.exit_block;

    let loop_block = {
        let mut editor = Editor::new(&mut factory, &mut function);
        let loop_block = editor.new_basic_block(exit);
        let done = editor.new_basic_block(exit);

        editor.edit(entry);
        let d1 = editor.new_instruction(Opcode::Literal, vec![v1], vec![Value::small_int32(1)]);
        let d2 = editor.new_instruction(Opcode::Literal, vec![v2], vec![Value::small_int32(2)]);
        editor.append(d1);
        editor.append(d2);
        editor.set_jump(loop_block);
        assert!(editor.commit());

        editor.edit(loop_block);
        let phi1 = editor.new_phi(p1);
        let phi2 = editor.new_phi(p2);
        editor.set_phi_input(phi1, entry, v1);
        editor.set_phi_input(phi1, loop_block, p2);
        editor.set_phi_input(phi2, entry, v2);
        editor.set_phi_input(phi2, loop_block, p1);
        let condition = editor.factory_mut().new_condition();
        let compare = editor.new_instruction(
            Opcode::Cmp(IntegerCondition::SignedLessThan),
            vec![condition],
            vec![p1, p2],
        );
        editor.append(compare);
        editor.set_branch(condition, loop_block, done);
        assert!(editor.commit());

        editor.edit(done);
        editor.set_ret();
        assert!(editor.commit());
        loop_block
    };

    {
        let mut editor = Editor::new(&mut factory, &mut function);
        RemoveCriticalEdgesPass::new(&mut editor).run();
        assert!(editor.validate());
        LoweringX64Pass::new(&mut editor).run();
        RegisterAssignmentsPass::new(&mut editor).run();
    }
    assert!(!factory.has_errors());
    assert_no_virtual_operands(&function);

    // The landing block on the back edge carries the cycle-breaking
    // sequence: three register copies and its jump.
    let landing = function
        .block_order()
        .iter()
        .copied()
        .find(|&block| {
            block != function.entry_block
                && function.block(block).successors == vec![loop_block]
                && function.block(block).predecessors == vec![loop_block]
        })
        .expect("landing block for the back edge");
    let copies: Vec<_> = function
        .block(landing)
        .instructions
        .iter()
        .filter(|&&instr| function.instr(instr).opcode == Opcode::Copy)
        .collect();
    assert_eq!(copies.len(), 3, "swap expands to three copies:\n{}", function);
    // All three stay in registers: a scratch register was free.
    for &&copy in &copies {
        assert!(function.instr(copy).output(0).is_physical());
        assert!(function.instr(copy).input(0).is_physical());
    }
}

// φ inputs arriving over a split edge also get their copies when no
// cycle is involved.
#[test]
fn phi_forward_edge_gets_plain_copies() {
    let mut factory = Factory::new();
    let v1 = factory.new_register(Value::int32_type());
    let v2 = factory.new_register(Value::int32_type());
    let p = factory.new_register(Value::int32_type());
    let out = factory.new_register(Value::int32_type());
    let mut function = factory.new_function();
    let entry = function.entry_block;
    let exit = function.exit_block;

    {
        let mut editor = Editor::new(&mut factory, &mut function);
        let left = editor.new_basic_block(exit);
        let join = editor.new_basic_block(exit);

        editor.edit(entry);
        let d1 = editor.new_instruction(Opcode::Literal, vec![v1], vec![Value::small_int32(1)]);
        let d2 = editor.new_instruction(Opcode::Literal, vec![v2], vec![Value::small_int32(2)]);
        editor.append(d1);
        editor.append(d2);
        let condition = editor.factory_mut().new_condition();
        let compare = editor.new_instruction(
            Opcode::Cmp(IntegerCondition::Equal),
            vec![condition],
            vec![v1, v2],
        );
        editor.append(compare);
        editor.set_branch(condition, left, join);
        assert!(editor.commit());

        editor.edit(left);
        editor.set_jump(join);
        assert!(editor.commit());

        editor.edit(join);
        let phi = editor.new_phi(p);
        editor.set_phi_input(phi, entry, v1);
        editor.set_phi_input(phi, left, v2);
        let use_p = editor.new_instruction(Opcode::Add, vec![out], vec![p, p]);
        editor.append(use_p);
        editor.set_ret();
        assert!(editor.commit());
    }

    {
        let mut editor = Editor::new(&mut factory, &mut function);
        RemoveCriticalEdgesPass::new(&mut editor).run();
        assert!(editor.validate());
        LoweringX64Pass::new(&mut editor).run();
        RegisterAssignmentsPass::new(&mut editor).run();
    }
    assert!(!factory.has_errors());
    assert_no_virtual_operands(&function);
}
