// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Fibers: the register-machine dispatch loop.
//!
//! A fiber owns one register stack shared by all of its frames. Frame `f`
//! addresses its register `r` at `stack[f.stack_start + r]`, and a callee's
//! frame starts right after its caller's registers:
//!
//! ```text
//! stack: [ main: r0 r1 r2 r3 | f: r0 r1 | g: r0 r1 r2 ]
//!          ^ stack_start 0     ^ 4        ^ 6
//! ```
//!
//! The stack never shrinks. Slots past the deepest frame are cleared when
//! that frame returns and again whenever the collector asks for roots.

use std::sync::Arc;

use thiserror::Error;

use super::VmError;
use crate::compiler::{Instruction, OpCode, Operand};
use crate::gc::{Object, Trace, Tracer};
use crate::runtime::{Method, Value, Vm};

/// One activation of a method.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// The method being executed
    pub method: Arc<Method>,
    /// Index of the next instruction
    pub ip: usize,
    /// Base of this frame's registers in the fiber's stack
    pub stack_start: usize,
}

/// Why a fiber stopped without a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Uncaught {
    /// `throw` with no handler
    #[error("uncaught throw")]
    Thrown(Value),
    /// A runtime fault
    #[error(transparent)]
    Fault(#[from] VmError),
}

/// What [`Fiber::run`] stopped on.
#[derive(Debug, Clone, PartialEq)]
pub enum FiberResult {
    /// The outermost frame returned this value
    Done(Value),
    /// A collection is due; collect, then call `run` again
    PausedForGc,
    /// The fiber terminated with an error
    Uncaught(Uncaught),
}

#[derive(Debug, Clone)]
enum State {
    Running,
    Done(Value),
    Uncaught(Uncaught),
}

/// A cooperatively scheduled execution context.
#[derive(Debug)]
pub struct Fiber {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    state: State,
}

impl Fiber {
    /// Creates a fiber that will run `method` on `argument`.
    pub fn new(method: Arc<Method>, argument: Value) -> Self {
        let mut fiber = Self {
            stack: Vec::new(),
            frames: Vec::new(),
            state: State::Running,
        };
        fiber.init(method, argument);
        fiber
    }

    /// Resets the fiber to a single frame with no caller.
    pub fn init(&mut self, method: Arc<Method>, argument: Value) {
        self.stack.clear();
        self.frames.clear();
        self.state = State::Running;

        self.ensure_stack(method.num_registers.max(1));
        self.stack[0] = argument;
        self.frames.push(CallFrame {
            method,
            ip: 0,
            stack_start: 0,
        });
    }

    /// Runs until the fiber finishes, fails, or pauses for a collection.
    ///
    /// A pause leaves every frame and register untouched, so calling `run`
    /// again resumes at the same instruction. A finished fiber reports its
    /// result again.
    pub fn run(&mut self, vm: &mut Vm) -> FiberResult {
        match &self.state {
            State::Done(value) => return FiberResult::Done(*value),
            State::Uncaught(uncaught) => return FiberResult::Uncaught(uncaught.clone()),
            State::Running => {}
        }

        match self.execute(vm) {
            Ok(Some(value)) => {
                self.state = State::Done(value);
                FiberResult::Done(value)
            }
            Ok(None) => FiberResult::PausedForGc,
            Err(uncaught) => {
                self.state = State::Uncaught(uncaught.clone());
                FiberResult::Uncaught(uncaught)
            }
        }
    }

    /// Returns true once the fiber has finished or failed.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.state, State::Running)
    }

    /// The active frames, innermost last.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// The whole register stack, including stale slots.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Reports the fiber's roots and clears every slot past the live
    /// frontier.
    pub fn reach(&mut self, tracer: &mut Tracer) {
        let frontier = self.frontier();
        for slot in &mut self.stack[frontier..] {
            *slot = Value::Nothing;
        }

        for value in &self.stack[..frontier] {
            value.trace(tracer);
        }
        for frame in &self.frames {
            frame.method.trace(tracer);
        }

        match &self.state {
            State::Done(value) | State::Uncaught(Uncaught::Thrown(value)) => value.trace(tracer),
            State::Running | State::Uncaught(Uncaught::Fault(_)) => {}
        }
    }

    /// End of the deepest frame's registers.
    fn frontier(&self) -> usize {
        self.frames
            .last()
            .map_or(0, |frame| frame.stack_start + frame.method.num_registers)
            .min(self.stack.len())
    }

    fn ensure_stack(&mut self, len: usize) {
        if self.stack.len() < len {
            self.stack.resize(len, Value::Nothing);
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// `Ok(Some)` when the outermost frame returns, `Ok(None)` at a
    /// collection pause.
    fn execute(&mut self, vm: &mut Vm) -> Result<Option<Value>, Uncaught> {
        loop {
            // Safepoint: every register is rooted here, so pins can go.
            vm.heap.release_temps();
            if vm.heap.is_collection_due() {
                return Ok(None);
            }

            let instruction = self.fetch()?;

            match instruction.opcode {
                OpCode::Move => {
                    let value = self.read(instruction.a, &instruction)?;
                    self.store(instruction.b, value, &instruction)?;
                }

                OpCode::Constant => {
                    let value = self.read(instruction.a, &instruction)?;
                    self.store(instruction.b, value, &instruction)?;
                }

                OpCode::BuiltIn => {
                    let id = Self::index(instruction.a, &instruction)?;
                    let value = vm.builtin(id)?;
                    self.store(instruction.b, value, &instruction)?;
                }

                OpCode::Record => self.make_record(vm, &instruction)?,

                OpCode::DefMethod => {
                    let nested = Self::index(instruction.a, &instruction)?;
                    let slot = Self::index(instruction.b, &instruction)?;
                    let method = self
                        .frame()
                        .method
                        .methods
                        .get(nested as usize)
                        .cloned()
                        .ok_or(VmError::UnknownNestedMethod(nested))?;
                    vm.methods.define_index(slot as usize, method)?;
                }

                OpCode::GetField => {
                    let record = self.read(instruction.a, &instruction)?.to_record()?;
                    let symbol = Self::index(instruction.b, &instruction)? as usize;

                    let Object::Record { ty, values } = vm.heap.get(record)? else {
                        return Err(VmError::NotARecord { found: "string" }.into());
                    };
                    let field = vm
                        .record_types
                        .get(*ty as usize)
                        .ok_or(VmError::UnknownRecordType(*ty))?
                        .field_index(symbol)
                        .and_then(|index| values.get(index).copied())
                        .ok_or_else(|| VmError::MissingField {
                            field: vm.symbols.name(symbol).unwrap_or("?").to_string(),
                        })?;

                    self.store(instruction.c, field, &instruction)?;
                }

                OpCode::GetModule => {
                    let import = Self::index(instruction.a, &instruction)?;
                    let export = Self::index(instruction.b, &instruction)?;
                    let missing = VmError::MissingExport { import, export };

                    let module = vm.modules.get(self.frame().method.module).ok_or(missing.clone())?;
                    let imported = module
                        .imports
                        .get(import as usize)
                        .and_then(|id| vm.modules.get(*id))
                        .ok_or(missing.clone())?;
                    let value = imported.export_value(export as usize).ok_or(missing)?;

                    self.store(instruction.c, value, &instruction)?;
                }

                OpCode::Add => self.binary_num_op(&instruction, |a, b| Value::Number(a + b))?,
                OpCode::Subtract => self.binary_num_op(&instruction, |a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_num_op(&instruction, |a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_num_op(&instruction, |a, b| Value::Number(a / b))?,
                OpCode::LessThan => self.binary_num_op(&instruction, |a, b| Value::Bool(a < b))?,

                OpCode::Not => {
                    let value = self.read(instruction.a, &instruction)?;
                    self.store(instruction.a, Value::Bool(!value.is_truthy()), &instruction)?;
                }

                OpCode::Jump => self.jump(instruction.a, &instruction)?,

                OpCode::JumpIfFalse => {
                    if !self.read(instruction.a, &instruction)?.is_truthy() {
                        self.jump(instruction.b, &instruction)?;
                    }
                }

                OpCode::JumpIfTrue => {
                    if self.read(instruction.a, &instruction)?.is_truthy() {
                        self.jump(instruction.b, &instruction)?;
                    }
                }

                OpCode::Call => self.call(vm, &instruction)?,

                OpCode::Return | OpCode::End => {
                    let value = self.read(instruction.a, &instruction)?;
                    if let Some(result) = self.return_from_frame(value)? {
                        return Ok(Some(result));
                    }
                }

                OpCode::Throw => {
                    let value = self.read(instruction.a, &instruction)?;
                    return Err(Uncaught::Thrown(value));
                }

                OpCode::Placeholder => {
                    return Err(VmError::Placeholder(self.frame().ip - 1).into());
                }
            }
        }
    }

    fn frame(&self) -> &CallFrame {
        // `execute` only runs while a frame is active.
        &self.frames[self.frames.len() - 1]
    }

    /// Reads the next instruction and advances past it.
    fn fetch(&mut self) -> Result<Instruction, VmError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(VmError::NoFrame)?;
        let instruction = frame
            .method
            .bytecode
            .instructions
            .get(frame.ip)
            .copied()
            .ok_or_else(|| VmError::OutOfBounds {
                method: frame.method.name.clone(),
                ip: frame.ip as isize,
            })?;
        frame.ip += 1;
        Ok(instruction)
    }

    /// Reads a register or constant operand.
    fn read(&self, operand: Operand, instruction: &Instruction) -> Result<Value, VmError> {
        let frame = self.frame();
        match operand {
            Operand::Register(r) => self
                .stack
                .get(frame.stack_start + r as usize)
                .copied()
                .ok_or(VmError::BadRegister(r)),
            Operand::Constant(k) => frame
                .method
                .bytecode
                .constants
                .get(k as usize)
                .copied()
                .ok_or(VmError::UnknownConstant(k)),
            other => Err(bad_operand(other, instruction)),
        }
    }

    /// Writes a register operand.
    fn store(
        &mut self,
        operand: Operand,
        value: Value,
        instruction: &Instruction,
    ) -> Result<(), VmError> {
        let slot = self.slot(operand, instruction)?;
        self.stack[slot] = value;
        Ok(())
    }

    /// Absolute stack index of a register operand.
    fn slot(&self, operand: Operand, instruction: &Instruction) -> Result<usize, VmError> {
        match operand {
            Operand::Register(r) => {
                let slot = self.frame().stack_start + r as usize;
                if slot < self.stack.len() {
                    Ok(slot)
                } else {
                    Err(VmError::BadRegister(r))
                }
            }
            Operand::Constant(_) => Err(VmError::StoreIntoConstant {
                opcode: instruction.opcode.mnemonic(),
                operand: operand.to_string(),
            }),
            other => Err(bad_operand(other, instruction)),
        }
    }

    fn index(operand: Operand, instruction: &Instruction) -> Result<u8, VmError> {
        match operand {
            Operand::Index(i) => Ok(i),
            other => Err(bad_operand(other, instruction)),
        }
    }

    fn jump(&mut self, operand: Operand, instruction: &Instruction) -> Result<(), VmError> {
        let Operand::Offset(offset) = operand else {
            return Err(bad_operand(operand, instruction));
        };

        let frame = self
            .frames
            .last_mut()
            .ok_or(VmError::NoFrame)?;
        // The ip already points past the jump.
        let target = frame.ip as isize + offset as isize;
        if target < 0 || target as usize > frame.method.bytecode.instructions.len() {
            return Err(VmError::OutOfBounds {
                method: frame.method.name.clone(),
                ip: target,
            });
        }
        frame.ip = target as usize;
        Ok(())
    }

    fn binary_num_op<F>(&mut self, instruction: &Instruction, op: F) -> Result<(), VmError>
    where
        F: Fn(f64, f64) -> Value,
    {
        let a = self.read(instruction.a, instruction)?.to_number()?;
        let b = self.read(instruction.b, instruction)?.to_number()?;
        self.store(instruction.c, op(a, b), instruction)
    }

    fn make_record(&mut self, vm: &mut Vm, instruction: &Instruction) -> Result<(), VmError> {
        let first = self.slot(instruction.a, instruction)?;
        let ty = Self::index(instruction.b, instruction)?;
        let count = vm
            .record_types
            .get(ty as usize)
            .ok_or(VmError::UnknownRecordType(ty))?
            .fields
            .len();

        let values = self
            .stack
            .get(first..first + count)
            .ok_or(VmError::BadRegister(u8::MAX))?
            .to_vec();

        let record = vm.heap.alloc(Object::Record { ty, values });
        self.store(instruction.c, Value::Record(record.get()), instruction)
    }

    fn call(&mut self, vm: &mut Vm, instruction: &Instruction) -> Result<(), Uncaught> {
        let index = Self::index(instruction.a, instruction)?;
        let method = Arc::clone(vm.methods.get(index as usize)?);
        let argument = self.read(instruction.b, instruction)?;

        if let Some(primitive) = method.primitive {
            let result = primitive(vm, argument)?;
            self.store(instruction.b, result, instruction)?;
            return Ok(());
        }

        let caller = self.frame();
        let stack_start = caller.stack_start + caller.method.num_registers;
        self.ensure_stack(stack_start + method.num_registers.max(1));
        self.stack[stack_start] = argument;

        self.frames.push(CallFrame {
            method,
            ip: 0,
            stack_start,
        });
        Ok(())
    }

    /// Pops the current frame. Returns the value if it was the outermost
    /// one, otherwise stores it where the caller's CALL expects it.
    fn return_from_frame(&mut self, value: Value) -> Result<Option<Value>, VmError> {
        let Some(frame) = self.frames.pop() else {
            return Ok(Some(value));
        };

        let end = (frame.stack_start + frame.method.num_registers).min(self.stack.len());
        for slot in &mut self.stack[frame.stack_start..end] {
            *slot = Value::Nothing;
        }

        let Some(caller) = self.frames.last() else {
            return Ok(Some(value));
        };

        // The caller's ip sits just past its CALL; that instruction names
        // the register expecting the result.
        let call = caller
            .ip
            .checked_sub(1)
            .and_then(|index| caller.method.bytecode.instructions.get(index))
            .copied()
            .ok_or(VmError::BadReturn { found: "nothing" })?;
        if call.opcode != OpCode::Call {
            return Err(VmError::BadReturn {
                found: call.opcode.mnemonic(),
            });
        }

        self.store(call.b, value, &call)?;
        Ok(None)
    }
}

fn bad_operand(operand: Operand, instruction: &Instruction) -> VmError {
    VmError::BadOperand {
        opcode: instruction.opcode.mnemonic(),
        operand: operand.to_string(),
    }
}
