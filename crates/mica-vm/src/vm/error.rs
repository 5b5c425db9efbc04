// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime faults.

use thiserror::Error;

/// A fault raised while executing bytecode.
///
/// Faults terminate the fiber through the same uncaught channel as `throw`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// An arithmetic operand was not a number
    #[error("expected a number, found {found}")]
    NotANumber {
        /// Type name of the offending value
        found: &'static str,
    },

    /// A field was read from something that is not a record
    #[error("expected a record, found {found}")]
    NotARecord {
        /// Type name of the offending value
        found: &'static str,
    },

    /// A string operation got some other object
    #[error("expected a string, found {found}")]
    NotAString {
        /// Type name of the offending value
        found: &'static str,
    },

    /// The record's type has no such field
    #[error("record has no field '{field}'")]
    MissingField {
        /// The requested field
        field: String,
    },

    /// The call target was declared but never defined
    #[error("method '{name}' is declared but not defined")]
    UndefinedMethod {
        /// Name of the method
        name: String,
    },

    /// No method table entry at this index
    #[error("no method at index {0}")]
    UnknownMethod(usize),

    /// An operand slot held the wrong kind of operand
    #[error("{opcode} cannot use operand {operand}")]
    BadOperand {
        /// Mnemonic of the instruction
        opcode: &'static str,
        /// The operand, as disassembled
        operand: String,
    },

    /// An instruction tried to write through a constant operand
    #[error("{opcode} cannot store into constant {operand}")]
    StoreIntoConstant {
        /// Mnemonic of the instruction
        opcode: &'static str,
        /// The operand, as disassembled
        operand: String,
    },

    /// A reserved jump slot was never patched
    #[error("executed an unpatched placeholder at instruction {0}")]
    Placeholder(usize),

    /// A heap reference points at a freed slot
    #[error("reference to freed object {0}")]
    DanglingReference(usize),

    /// A frame returned into something other than a CALL
    #[error("returned into {found} instead of CALL")]
    BadReturn {
        /// Mnemonic of the instruction found before the caller's ip
        found: &'static str,
    },

    /// BUILT_IN with an id that has no value
    #[error("unknown builtin value #{0}")]
    UnknownBuiltin(u8),

    /// Constant index past the end of the pool
    #[error("unknown constant k{0}")]
    UnknownConstant(u8),

    /// Record type id with no registered type
    #[error("unknown record type #{0}")]
    UnknownRecordType(u8),

    /// DEF_METHOD with a nested index the method does not have
    #[error("no nested method #{0}")]
    UnknownNestedMethod(u8),

    /// GET_MODULE with an import or export that does not exist
    #[error("module has no export #{export} in import #{import}")]
    MissingExport {
        /// Import slot
        import: u8,
        /// Export slot
        export: u8,
    },

    /// A register index past the end of the register stack
    #[error("register r{0} is outside the frame")]
    BadRegister(u8),

    /// The fiber has no active frame
    #[error("fiber has no active frame")]
    NoFrame,

    /// The instruction pointer left the method body
    #[error("instruction pointer {ip} is outside '{method}'")]
    OutOfBounds {
        /// Method being executed
        method: String,
        /// The bad instruction pointer
        ip: isize,
    },
}
