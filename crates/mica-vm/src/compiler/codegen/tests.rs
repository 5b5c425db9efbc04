//! Tests for the bytecode compiler.

use super::*;
use crate::compiler::bytecode::{OpCode, Operand};
use crate::parser::Parser;
use crate::runtime::Vm;
use crate::vm::VmError;

fn compile_source(vm: &mut Vm, src: &str) -> Result<usize, CompileErrors> {
    let name = format!("test{}", vm.modules.iter().count());
    let module = Parser::new(src)
        .parse_module(&name)
        .expect("source should parse");
    compile_module(vm, &module)
}

fn compile_ok(src: &str) -> Vm {
    let mut vm = Vm::new();
    compile_source(&mut vm, src).expect("compilation should succeed");
    vm
}

fn method(vm: &Vm, name: &str) -> Arc<Method> {
    let index = vm.methods.find(name).expect("method should be declared");
    vm.methods.get(index).expect("method should be defined").clone()
}

fn instructions(src: &str, name: &str) -> Vec<Instruction> {
    let vm = compile_ok(src);
    method(&vm, name).bytecode.instructions.clone()
}

fn r(register: u8) -> Operand {
    Operand::Register(register)
}

fn k(constant: u8) -> Operand {
    Operand::Constant(constant)
}

#[test]
fn test_parameter_then_binary() {
    assert_eq!(
        instructions("def f(x) = x + 1", "f"),
        vec![
            Instruction::binary(OpCode::Move, r(0), r(1)),
            Instruction::binary(OpCode::Move, r(1), r(2)),
            Instruction::new(OpCode::Add, r(2), k(0), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ]
    );
}

#[test]
fn test_literal_operands_use_constant_pool() {
    let vm = compile_ok("def f() = 1 + \"a\"");
    let f = method(&vm, "f");
    assert_eq!(
        f.bytecode.instructions[0],
        Instruction::new(OpCode::Add, k(0), k(1), r(0))
    );
    assert_eq!(f.bytecode.constants.len(), 2);
    assert!(matches!(f.bytecode.constants[1], Value::String(_)));
}

#[test]
fn test_constant_pool_is_not_deduplicated() {
    let vm = compile_ok("def f() = 1 + 1");
    assert_eq!(method(&vm, "f").bytecode.constants.len(), 2);
}

#[test]
fn test_variable_register_survives_inner_temps() {
    // The left operand's temp is still live when the val is compiled.
    let code = instructions("def f(y) = y + (val x = 2)", "f");
    assert_eq!(
        code,
        vec![
            Instruction::binary(OpCode::Move, r(0), r(1)),
            Instruction::binary(OpCode::Move, r(1), r(2)),
            Instruction::binary(OpCode::Constant, k(0), r(5)),
            Instruction::binary(OpCode::Move, r(5), r(4)),
            Instruction::binary(OpCode::Move, r(5), r(3)),
            Instruction::new(OpCode::Add, r(2), r(3), r(0)),
            Instruction::unary(OpCode::End, r(0)),
        ]
    );
}

#[test]
fn test_if_else_jump_offsets() {
    let code = instructions("def f(x) = if x then 1 else 2", "f");
    assert_eq!(
        code[2],
        Instruction::binary(OpCode::JumpIfFalse, r(0), Operand::Offset(2))
    );
    assert_eq!(code[4], Instruction::unary(OpCode::Jump, Operand::Offset(1)));
    assert_eq!(code.last().map(|i| i.opcode), Some(OpCode::End));
}

#[test]
fn test_if_without_else_yields_nothing() {
    let code = instructions("def f(x) = if x then 1", "f");
    assert!(code.contains(&Instruction::binary(
        OpCode::BuiltIn,
        Operand::Index(builtin::NOTHING),
        r(0)
    )));
}

#[test]
fn test_and_or_short_circuit() {
    let and = instructions("def f(a) = a and false", "f");
    assert!(and.iter().any(|i| i.opcode == OpCode::JumpIfFalse));

    let or = instructions("def f(a) = a or true", "f");
    assert!(or.iter().any(|i| i.opcode == OpCode::JumpIfTrue));
}

#[test]
fn test_no_placeholders_survive() {
    let vm = compile_ok(
        "def f(x)\n  if x < 1 then\n    if x then 1 else 2\n  else\n    x and x or x\n  end\nend",
    );
    let f = method(&vm, "f");
    assert!(
        f.bytecode
            .instructions
            .iter()
            .all(|i| i.opcode != OpCode::Placeholder)
    );
}

#[test]
fn test_call_uses_method_index() {
    let vm = compile_ok("def g(x) = x\ndef f() = g(1)");
    let g = vm.methods.find("g").expect("g declared") as u8;
    let code = &method(&vm, "f").bytecode.instructions;
    assert!(code.contains(&Instruction::binary(
        OpCode::Call,
        Operand::Index(g),
        r(0)
    )));
}

#[test]
fn test_forward_reference_between_methods() {
    let vm = compile_ok("def f() = g()\ndef g() = 1");
    assert!(vm.methods.is_defined("f"));
    assert!(vm.methods.is_defined("g"));
}

#[test]
fn test_record_uses_contiguous_registers() {
    let code = instructions("def f() = x: 1, y: 2", "f");
    let record = code
        .iter()
        .find(|i| i.opcode == OpCode::Record)
        .expect("record instruction");
    assert_eq!(record.a, r(1));
    assert_eq!(record.c, r(0));
    assert!(code.contains(&Instruction::binary(OpCode::Constant, k(0), r(1))));
    assert!(code.contains(&Instruction::binary(OpCode::Constant, k(1), r(2))));
}

#[test]
fn test_record_pattern_emits_get_field() {
    let code = instructions("def f(x: a, y: b) = a + b", "f");
    let fields = code.iter().filter(|i| i.opcode == OpCode::GetField).count();
    assert_eq!(fields, 2);
}

#[test]
fn test_import_resolves_to_get_module() {
    let code = instructions("import math\ndef f() = pi", "f");
    assert_eq!(code[0].opcode, OpCode::GetModule);
    assert_eq!(code[0].a, Operand::Index(0));
}

#[test]
fn test_nested_def() {
    let vm = compile_ok("def f()\n  def g(x) = x * 2\n  g(3)\nend");
    let f = method(&vm, "f");
    assert_eq!(f.methods.len(), 1);
    assert_eq!(f.methods[0].name, "g");
    assert!(
        f.bytecode
            .instructions
            .iter()
            .any(|i| i.opcode == OpCode::DefMethod)
    );
}

#[test]
fn test_return_and_throw() {
    let code = instructions("def f(x)\n  if x then return 1\n  throw 2\nend", "f");
    assert!(code.iter().any(|i| i.opcode == OpCode::Return));
    assert!(code.iter().any(|i| i.opcode == OpCode::Throw));
}

#[test]
fn test_errors_are_collected() {
    let mut vm = Vm::new();
    let errors = compile_source(&mut vm, "def f() = nope(missing)\ndef g() = other")
        .expect_err("compilation should fail");
    assert_eq!(errors.errors().len(), 3);
    assert!(matches!(
        errors.errors()[0],
        CompileError::UndefinedVariable { .. }
    ));
    assert!(matches!(
        errors.errors()[1],
        CompileError::UndefinedMethod { .. }
    ));
    assert_eq!(errors.to_string().lines().count(), 3);
}

#[test]
fn test_failed_module_installs_nothing() {
    let mut vm = Vm::new();
    let modules = vm.modules.iter().count();
    assert!(compile_source(&mut vm, "def good() = 1\ndef bad() = missing").is_err());

    assert!(!vm.methods.is_defined("good"));
    assert!(!vm.methods.is_defined("bad"));
    let good = vm.methods.find("good").expect("name stays declared");
    assert!(matches!(
        vm.methods.get(good),
        Err(VmError::UndefinedMethod { .. })
    ));
    assert_eq!(vm.modules.iter().count(), modules);

    // The same names compile once the module is fixed.
    compile_source(&mut vm, "def good() = 1\ndef bad() = good()").expect("fixed module");
    assert!(vm.methods.is_defined("good"));
    assert!(vm.methods.is_defined("bad"));
}

#[test]
fn test_module_name_is_taken_once() {
    let mut vm = Vm::new();
    let ast = |src: &str, name: &str| Parser::new(src).parse_module(name).expect("parse");

    compile_module(&mut vm, &ast("def f() = 1", "app")).expect("first load");
    let errors = compile_module(&mut vm, &ast("def g() = 2", "app")).expect_err("same name");
    assert_eq!(
        errors.errors(),
        &[CompileError::ModuleExists { name: "app".into() }]
    );
    assert!(!vm.methods.is_defined("g"));

    let errors = compile_module(&mut vm, &ast("def h() = 3", "math")).expect_err("host name");
    assert!(matches!(errors.errors()[0], CompileError::ModuleExists { .. }));
}

#[test]
fn test_unknown_import() {
    let mut vm = Vm::new();
    let errors = compile_source(&mut vm, "import nowhere\ndef f() = 1").expect_err("should fail");
    assert!(matches!(
        errors.errors()[0],
        CompileError::UnknownImport { .. }
    ));
}

#[test]
fn test_duplicate_definition() {
    let mut vm = Vm::new();
    let errors =
        compile_source(&mut vm, "def f() = 1\ndef f() = 2").expect_err("should fail");
    assert_eq!(
        errors.errors()[0],
        CompileError::AlreadyDefined { name: "f".into() }
    );

    let errors = compile_source(&mut vm, "def print(x) = x").expect_err("should fail");
    assert!(matches!(
        errors.errors()[0],
        CompileError::AlreadyDefined { .. }
    ));
}

#[test]
fn test_too_many_registers() {
    let mut body = String::from("def f()\n");
    for i in 0..300 {
        body.push_str(&format!("  val v{} = {}\n", i, i));
    }
    body.push_str("end");

    let mut vm = Vm::new();
    let errors = compile_source(&mut vm, &body).expect_err("should hit the register limit");
    assert!(matches!(
        errors.errors()[0],
        CompileError::Limit {
            what: "register count",
            ..
        }
    ));
}

#[test]
fn test_long_branch_exceeds_jump_range() {
    let mut body = String::from("def f(x)\n  if x then\n");
    for _ in 0..100 {
        body.push_str("    x + 1\n");
    }
    body.push_str("  end\nend");

    let mut vm = Vm::new();
    let errors = compile_source(&mut vm, &body).expect_err("jump should not fit");
    assert!(matches!(
        errors.errors()[0],
        CompileError::JumpTooFar { distance, .. } if distance > 127
    ));
    assert!(errors.to_string().contains("-128..=127"));
}

#[test]
fn test_register_high_water_mark() {
    let vm = compile_ok("def f() = 1");
    assert_eq!(method(&vm, "f").num_registers, 1);

    let vm = compile_ok("def f(x) = x + 1");
    assert_eq!(method(&vm, "f").num_registers, 3);
}

#[test]
fn test_disassembly() {
    let vm = compile_ok("def f(x) = x + 1");
    let text = method(&vm, "f").disassemble(&vm.heap);
    assert!(text.starts_with("method f (3 registers)"));
    assert!(text.contains("ADD          r2 k0 r0"));
    assert!(text.contains("k0 = 1"));
}

#[test]
fn test_compile_method_does_not_install() {
    let mut vm = Vm::new();
    let ast = MethodAst {
        name: "(eval)".into(),
        parameter: None,
        body: Expr::binary(BinaryOp::Add, Expr::Number(1.0), Expr::Number(2.0)),
    };
    let method = compile_method(&mut vm, 0, &ast).expect("should compile");
    assert_eq!(method.bytecode.instructions.len(), 2);
    assert!(vm.methods.find("(eval)").is_none());
}

#[test]
fn test_var_compiles_like_val() {
    let val = instructions("def f()\n  val x = 1\n  x + 2\nend", "f");
    let var = instructions("def f()\n  var x = 1\n  x + 2\nend", "f");
    assert_eq!(val, var);
}
