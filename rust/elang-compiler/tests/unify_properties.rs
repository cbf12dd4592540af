//! Property tests for the unification engine.
//!
//! Factories are deterministic: building two sessions with the same
//! construction sequence yields the same value ids, so results of
//! order-swapped unifications can be compared directly.

use elang_compiler::{Evaluator, Factory, ValueId};
use elang_core::CompilationSession;
use quickcheck_macros::quickcheck;

/// A small universe of ground-ish values addressed by selector index.
fn pick(factory: &mut Factory, session: &CompilationSession, selector: u8) -> ValueId {
    let _ = session;
    match selector % 15 {
        0 => factory.any_value(),
        1 => factory.empty_value(),
        2 => factory.bool_value(),
        3 => factory.int8_value(),
        4 => factory.int16_value(),
        5 => factory.int32_value(),
        6 => factory.int64_value(),
        7 => factory.uint8_value(),
        8 => factory.uint16_value(),
        9 => factory.uint32_value(),
        10 => factory.uint64_value(),
        11 => factory.float32_value(),
        12 => factory.float64_value(),
        13 => {
            let base = factory.int32_value();
            factory.new_null_value(base)
        }
        _ => {
            let base = factory.float64_value();
            factory.new_null_value(base)
        }
    }
}

#[quickcheck]
fn unify_is_commutative(a_sel: u8, b_sel: u8) -> bool {
    let session1 = CompilationSession::new();
    let mut factory1 = Factory::new(&session1);
    let a1 = pick(&mut factory1, &session1, a_sel);
    let b1 = pick(&mut factory1, &session1, b_sel);
    let forward = {
        let mut evaluator = Evaluator::new(&mut factory1, &session1.semantics);
        evaluator.unify(a1, b1)
    };

    let session2 = CompilationSession::new();
    let mut factory2 = Factory::new(&session2);
    let a2 = pick(&mut factory2, &session2, a_sel);
    let b2 = pick(&mut factory2, &session2, b_sel);
    let backward = {
        let mut evaluator = Evaluator::new(&mut factory2, &session2.semantics);
        evaluator.unify(b2, a2)
    };

    forward == backward
}

#[quickcheck]
fn unify_is_idempotent(a_sel: u8) -> bool {
    let session = CompilationSession::new();
    let mut factory = Factory::new(&session);
    let a = pick(&mut factory, &session, a_sel);
    let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
    evaluator.unify(a, a) == a
}

#[quickcheck]
fn evaluate_is_stable_on_ground_values(a_sel: u8) -> bool {
    let session = CompilationSession::new();
    let mut factory = Factory::new(&session);
    let a = pick(&mut factory, &session, a_sel);
    let mut evaluator = Evaluator::new(&mut factory, &session.semantics);
    let once = evaluator.evaluate(a);
    let twice = evaluator.evaluate(once);
    once == twice
}
