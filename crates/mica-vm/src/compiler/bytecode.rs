// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions.
//!
//! Every instruction is a fixed opcode plus three one-byte operand slots.
//! Each slot carries an explicit [`Operand`] kind, so an arithmetic operand
//! that refers to the constant pool cannot be confused with a register.

use std::fmt;

use crate::runtime::value::Value;

/// A compiled bytecode chunk.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Value>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant and returns its index. Entries are never deduplicated.
    pub fn add_constant(&mut self, value: Value) -> usize {
        let index = self.constants.len();
        self.constants.push(value);
        index
    }

    /// Returns the index the next emitted instruction will get.
    pub fn next_index(&self) -> usize {
        self.instructions.len()
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// First operand
    pub a: Operand,
    /// Second operand
    pub b: Operand,
    /// Third operand
    pub c: Operand,
}

impl Instruction {
    /// Creates an instruction from all three operand slots.
    pub const fn new(opcode: OpCode, a: Operand, b: Operand, c: Operand) -> Self {
        Self { opcode, a, b, c }
    }

    /// Creates an instruction that only uses slot A.
    pub const fn unary(opcode: OpCode, a: Operand) -> Self {
        Self::new(opcode, a, Operand::Unused, Operand::Unused)
    }

    /// Creates an instruction that uses slots A and B.
    pub const fn binary(opcode: OpCode, a: Operand, b: Operand) -> Self {
        Self::new(opcode, a, b, Operand::Unused)
    }

    /// A reserved slot that must be overwritten before the method is
    /// finished.
    pub const fn placeholder() -> Self {
        Self::new(OpCode::Placeholder, Operand::Unused, Operand::Unused, Operand::Unused)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12}", self.opcode.mnemonic())?;
        for operand in [self.a, self.b, self.c] {
            if operand != Operand::Unused {
                write!(f, " {}", operand)?;
            }
        }
        Ok(())
    }
}

/// Instruction operands.
///
/// The payload of every kind fits in one byte; the compiler refuses to emit
/// anything larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The slot is not used by this opcode
    Unused,
    /// A register, relative to the current frame's stack start
    Register(u8),
    /// A constant pool index
    Constant(u8),
    /// A relative jump offset, counted from the instruction after the jump
    Offset(i8),
    /// Any other small index: builtin id, method index, symbol, record
    /// type, module import or export
    Index(u8),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Unused => write!(f, "-"),
            Operand::Register(r) => write!(f, "r{}", r),
            Operand::Constant(k) => write!(f, "k{}", k),
            Operand::Offset(offset) => write!(f, "{:+}", offset),
            Operand::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// Operation codes for the VM.
///
/// The operand layout of each opcode is listed as `A B C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Moves
    /// `src dest`: copy a register
    Move,
    /// `const dest`: load from the constant pool
    Constant,
    /// `id dest`: load a VM-wide builtin value
    BuiltIn,

    // Objects
    /// `first type dest`: build a record from a run of registers
    Record,
    /// `nested method`: bind a nested method into the method table
    DefMethod,
    /// `record symbol dest`: read a record field
    GetField,
    /// `import export dest`: read an export of an imported module
    GetModule,

    // Arithmetic
    /// `left right dest`
    Add,
    /// `left right dest`
    Subtract,
    /// `left right dest`
    Multiply,
    /// `left right dest`
    Divide,
    /// `left right dest`
    LessThan,
    /// `reg`: logical negation in place
    Not,

    // Control flow
    /// `offset`
    Jump,
    /// `reg offset`
    JumpIfFalse,
    /// `reg offset`
    JumpIfTrue,
    /// `method reg`: the argument and the result both live in `reg`
    Call,
    /// `reg`
    Return,
    /// `reg`
    Throw,
    /// `reg`: end of a method body, returns `reg`
    End,

    /// A reserved slot that was never patched
    Placeholder,
}

impl OpCode {
    /// The upper-case mnemonic used in disassembly.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Move => "MOVE",
            OpCode::Constant => "CONSTANT",
            OpCode::BuiltIn => "BUILT_IN",
            OpCode::Record => "RECORD",
            OpCode::DefMethod => "DEF_METHOD",
            OpCode::GetField => "GET_FIELD",
            OpCode::GetModule => "GET_MODULE",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::LessThan => "LESS_THAN",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::Throw => "THROW",
            OpCode::End => "END",
            OpCode::Placeholder => "PLACEHOLDER",
        }
    }

    /// Returns true for the three jump opcodes.
    pub fn is_jump(self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue)
    }
}
