//! Dispatch tests on hand-assembled bytecode.

use std::sync::Arc;

use super::*;
use crate::compiler::{Bytecode, Instruction, OpCode, Operand};
use crate::runtime::{Method, Value, Vm, builtin};

fn r(register: u8) -> Operand {
    Operand::Register(register)
}

fn k(constant: u8) -> Operand {
    Operand::Constant(constant)
}

fn index(i: usize) -> Operand {
    Operand::Index(i as u8)
}

fn method(
    name: &str,
    num_registers: usize,
    instructions: Vec<Instruction>,
    constants: Vec<Value>,
) -> Arc<Method> {
    Arc::new(Method {
        name: name.to_string(),
        bytecode: Bytecode {
            instructions,
            constants,
        },
        methods: Vec::new(),
        num_registers,
        primitive: None,
        module: 0,
    })
}

fn define(vm: &mut Vm, method: Arc<Method>) -> usize {
    let name = method.name.clone();
    vm.methods.define(&name, method)
}

fn request_gc(vm: &mut Vm, argument: Value) -> Result<Value, VmError> {
    vm.heap.request_collection();
    Ok(argument)
}

/// Runs a fiber to completion, collecting at every pause. Returns the
/// result and the number of pauses.
fn drive(vm: &mut Vm, fiber: &mut Fiber) -> (FiberResult, usize) {
    let mut pauses = 0;
    loop {
        match fiber.run(vm) {
            FiberResult::PausedForGc => {
                pauses += 1;
                vm.collect(&mut [&mut *fiber]);
            }
            other => return (other, pauses),
        }
    }
}

#[test]
fn test_arithmetic_and_end() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::Constant, k(0), r(0)),
            Instruction::new(OpCode::Multiply, r(0), k(1), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(6.0), Value::Number(7.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(42.0)));
    assert!(fiber.is_terminated());
}

#[test]
fn test_finished_fiber_reports_again() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![Instruction::unary(OpCode::End, r(0))],
        vec![],
    );

    let mut fiber = Fiber::new(main, Value::Number(1.0));
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(1.0)));
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(1.0)));
}

#[test]
fn test_call_stores_result_in_caller_register() {
    let mut vm = Vm::new();
    let f = define(
        &mut vm,
        method(
            "f",
            1,
            vec![
                Instruction::new(OpCode::Add, r(0), k(0), r(0)),
                Instruction::unary(OpCode::End, r(0)),
            ],
            vec![Value::Number(1.0)],
        ),
    );

    // r2 must survive the call untouched.
    let main = method(
        "main",
        3,
        vec![
            Instruction::binary(OpCode::Constant, k(0), r(1)),
            Instruction::binary(OpCode::Constant, k(1), r(2)),
            Instruction::binary(OpCode::Call, index(f), r(1)),
            Instruction::new(OpCode::Add, r(1), r(2), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(5.0), Value::Number(100.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(106.0)));
}

#[test]
fn test_pause_resumes_at_next_instruction() {
    let mut vm = Vm::new();
    let pause = vm.define_native("pause", request_gc);
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::Constant, k(0), r(0)),
            Instruction::binary(OpCode::Call, index(pause), r(0)),
            Instruction::new(OpCode::Add, r(0), k(1), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(1.0), Value::Number(2.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(fiber.run(&mut vm), FiberResult::PausedForGc);
    assert!(!fiber.is_terminated());
    assert_eq!(fiber.frames()[0].ip, 2);

    vm.collect(&mut [&mut fiber]);
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(3.0)));
}

#[test]
fn test_pause_before_first_instruction() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![Instruction::unary(OpCode::End, r(0))],
        vec![],
    );

    vm.heap.request_collection();
    let mut fiber = Fiber::new(main, Value::Bool(true));
    let (result, pauses) = drive(&mut vm, &mut fiber);
    assert_eq!(result, FiberResult::Done(Value::Bool(true)));
    assert_eq!(pauses, 1);
}

#[test]
fn test_stale_registers_are_not_roots() {
    let mut vm = Vm::new();
    let pause = vm.define_native("pause", request_gc);
    let x = vm.symbols.intern("x");
    let ty = vm.record_types.intern(vec![x]);

    // Builds a record in a deep frame and drops it.
    let deep = define(
        &mut vm,
        method(
            "deep",
            3,
            vec![
                Instruction::binary(OpCode::Constant, k(0), r(1)),
                Instruction::new(OpCode::Record, r(1), index(ty), r(2)),
                Instruction::binary(OpCode::BuiltIn, index(builtin::NOTHING as usize), r(0)),
                Instruction::unary(OpCode::End, r(0)),
            ],
            vec![Value::Number(1.0)],
        ),
    );
    let shallow = define(
        &mut vm,
        method(
            "shallow",
            1,
            vec![
                Instruction::binary(OpCode::Call, index(pause), r(0)),
                Instruction::unary(OpCode::End, r(0)),
            ],
            vec![],
        ),
    );
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::Call, index(deep), r(0)),
            Instruction::binary(OpCode::Call, index(shallow), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(fiber.run(&mut vm), FiberResult::PausedForGc);
    assert_eq!(fiber.frames().len(), 2);

    let stats = vm.collect(&mut [&mut fiber]);
    assert_eq!(stats.freed, 1);
    assert_eq!(vm.heap.live_objects(), 0);

    let frontier = fiber.frames()[1].stack_start + 1;
    assert!(fiber.stack()[frontier..].iter().all(Value::is_nothing));

    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Nothing));
}

#[test]
fn test_live_record_survives_collection() {
    let mut vm = Vm::new();
    let pause = vm.define_native("pause", request_gc);
    let x = vm.symbols.intern("x");
    let ty = vm.record_types.intern(vec![x]);

    let main = method(
        "main",
        2,
        vec![
            Instruction::binary(OpCode::Constant, k(0), r(1)),
            Instruction::new(OpCode::Record, r(1), index(ty), r(0)),
            Instruction::binary(OpCode::Call, index(pause), r(1)),
            Instruction::new(OpCode::GetField, r(0), index(x), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(9.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    let (result, pauses) = drive(&mut vm, &mut fiber);
    assert_eq!(pauses, 1);
    assert_eq!(result, FiberResult::Done(Value::Number(9.0)));
    assert_eq!(vm.heap.stats().freed, 0);
}

#[test]
fn test_throw_stops_execution() {
    let mut vm = Vm::new();
    vm.capture_output();
    let print = vm.methods.find("print").expect("print is a builtin");

    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::Constant, k(0), r(0)),
            Instruction::unary(OpCode::Throw, r(0)),
            Instruction::binary(OpCode::Call, index(print), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(7.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Thrown(Value::Number(7.0)))
    );
    assert!(vm.take_output().is_empty());
    assert_eq!(fiber.frames()[0].ip, 2);
}

#[test]
fn test_type_mismatch_is_uncaught_fault() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::BuiltIn, index(builtin::TRUE as usize), r(0)),
            Instruction::new(OpCode::Add, r(0), k(0), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(1.0)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::NotANumber { found: "bool" }))
    );
}

#[test]
fn test_field_access_on_number_faults() {
    let mut vm = Vm::new();
    let x = vm.symbols.intern("x");
    let main = method(
        "main",
        1,
        vec![
            Instruction::new(OpCode::GetField, r(0), index(x), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![],
    );

    let mut fiber = Fiber::new(main, Value::Number(3.0));
    assert!(matches!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::NotARecord { .. }))
    ));
}

#[test]
fn test_placeholder_faults() {
    let mut vm = Vm::new();
    let main = method("main", 1, vec![Instruction::placeholder()], vec![]);

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert_eq!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::Placeholder(0)))
    );
}

#[test]
fn test_store_into_constant_faults() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![
            Instruction::unary(OpCode::Not, k(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Bool(true)],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert!(matches!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::StoreIntoConstant { .. }))
    ));
}

#[test]
fn test_declared_but_undefined_method_faults() {
    let mut vm = Vm::new();
    let later = vm.methods.declare("later");
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::Call, index(later), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert!(matches!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::UndefinedMethod { .. }))
    ));
}

#[test]
fn test_jump_if_false_skips() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![
            Instruction::binary(OpCode::JumpIfFalse, r(0), Operand::Offset(2)),
            Instruction::binary(OpCode::Constant, k(0), r(0)),
            Instruction::unary(OpCode::Jump, Operand::Offset(1)),
            Instruction::binary(OpCode::Constant, k(1), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ],
        vec![Value::Number(1.0), Value::Number(2.0)],
    );

    let mut fiber = Fiber::new(Arc::clone(&main), Value::Bool(false));
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(2.0)));

    let mut fiber = Fiber::new(main, Value::Bool(true));
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(1.0)));

    let mut fiber = Fiber::new(
        method(
            "other",
            1,
            vec![
                Instruction::binary(OpCode::JumpIfTrue, r(0), Operand::Offset(1)),
                Instruction::binary(OpCode::BuiltIn, index(builtin::FALSE as usize), r(0)),
                Instruction::unary(OpCode::End, r(0)),
            ],
            vec![],
        ),
        Value::Number(0.0),
    );
    // Zero is truthy.
    assert_eq!(fiber.run(&mut vm), FiberResult::Done(Value::Number(0.0)));
}

#[test]
fn test_jump_out_of_bounds_faults() {
    let mut vm = Vm::new();
    let main = method(
        "main",
        1,
        vec![Instruction::unary(OpCode::Jump, Operand::Offset(-5))],
        vec![],
    );

    let mut fiber = Fiber::new(main, Value::Nothing);
    assert!(matches!(
        fiber.run(&mut vm),
        FiberResult::Uncaught(Uncaught::Fault(VmError::OutOfBounds { .. }))
    ));
}
