// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from the syntax tree to register bytecode.
//!
//! Compilation is a single destination-passing walk: every node is handed
//! the register its value must end up in, and it releases every temporary
//! it allocates before returning. Variable registers are reserved before
//! the temporaries that compute their value, and stay put until their
//! scope ends.
//!
//! Name and call errors are collected so that one run reports every
//! problem in a module. Exceeding an operand limit aborts only the method
//! being compiled.

mod registers;
mod scope;

#[cfg(test)]
mod tests;

pub use registers::{MAX_REGISTERS, Registers};
pub use scope::{Local, Scope};

use std::fmt;
use std::sync::Arc;
use std::vec;

use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::*;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand};
use crate::runtime::{Method, Module, Value, Vm, builtin};

/// A compile error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A call names a method that was never declared
    #[error("{method}: undefined method '{name}'")]
    UndefinedMethod {
        /// Method containing the call
        method: String,
        /// The missing callee
        name: String,
    },

    /// A name is neither a local nor an export of an imported module
    #[error("{method}: undefined variable '{name}'")]
    UndefinedVariable {
        /// Method containing the reference
        method: String,
        /// The unresolved name
        name: String,
    },

    /// An import names a module the VM does not know
    #[error("{module}: unknown module '{name}'")]
    UnknownImport {
        /// The importing module
        module: String,
        /// The missing module
        name: String,
    },

    /// A module with this name is already loaded
    #[error("module '{name}' is already loaded")]
    ModuleExists {
        /// The module name
        name: String,
    },

    /// A method name was defined twice
    #[error("method '{name}' is already defined")]
    AlreadyDefined {
        /// The duplicate name
        name: String,
    },

    /// An operand would not fit in one byte
    #[error("{method}: {what} exceeds the one-byte operand limit")]
    Limit {
        /// Method being compiled
        method: String,
        /// Which table or range overflowed
        what: &'static str,
    },

    /// A branch is too long for a one-byte signed jump offset
    #[error("{method}: jump over {distance} instructions is outside -128..=127")]
    JumpTooFar {
        /// Method being compiled
        method: String,
        /// Instructions the jump would skip
        distance: isize,
    },

    /// A reserved jump slot was never patched
    #[error("{method}: jump reserved at {index} was never patched")]
    UnpatchedJump {
        /// Method being compiled
        method: String,
        /// Index of the placeholder
        index: usize,
    },
}

/// Every error from one compilation, in the order they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    /// The individual errors.
    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// Compiles one method definition.
pub struct Compiler<'vm> {
    vm: &'vm mut Vm,
    module: usize,
    method_name: String,
    bytecode: Bytecode,
    registers: Registers,
    scope: Scope,
    methods: Vec<Arc<Method>>,
    errors: Vec<CompileError>,
}

impl<'vm> Compiler<'vm> {
    /// Creates a compiler for a method belonging to `module`.
    pub fn new(vm: &'vm mut Vm, module: usize) -> Self {
        Self {
            vm,
            module,
            method_name: String::new(),
            bytecode: Bytecode::new(),
            registers: Registers::new(),
            scope: Scope::new(),
            methods: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Compiles `method`. Nothing is installed in the method table.
    pub fn compile(mut self, method: &MethodAst) -> Result<Method, Vec<CompileError>> {
        self.method_name = method.name.clone();

        if let Err(fatal) = self.compile_method(method) {
            self.errors.push(fatal);
        }

        if self.errors.is_empty() {
            let unpatched = self
                .bytecode
                .instructions
                .iter()
                .position(|instruction| instruction.opcode == OpCode::Placeholder);
            if let Some(index) = unpatched {
                self.errors.push(CompileError::UnpatchedJump {
                    method: self.method_name.clone(),
                    index,
                });
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        debug!(
            method = %self.method_name,
            instructions = self.bytecode.instructions.len(),
            constants = self.bytecode.constants.len(),
            registers = self.registers.max(),
            "compiled method"
        );

        Ok(Method {
            name: self.method_name,
            bytecode: self.bytecode,
            methods: self.methods,
            num_registers: self.registers.max(),
            primitive: None,
            module: self.module,
        })
    }

    fn compile_method(&mut self, method: &MethodAst) -> Result<(), CompileError> {
        self.scope.begin_scope();

        // r0 holds the argument on entry and the result on exit.
        let result = self.allocate()?;

        if let Some(pattern) = &method.parameter {
            let mut variables = self.reserve_variables(pattern)?;
            self.match_pattern(pattern, result, &mut variables)?;
        }

        self.compile_expr(&method.body, result)?;
        self.emit(Instruction::unary(OpCode::End, Operand::Register(result)));
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn compile_expr(&mut self, expr: &Expr, dest: u8) -> Result<(), CompileError> {
        match expr {
            Expr::Bool(true) => self.emit_builtin(builtin::TRUE, dest),
            Expr::Bool(false) => self.emit_builtin(builtin::FALSE, dest),
            Expr::Nothing => self.emit_builtin(builtin::NOTHING, dest),

            Expr::Number(_) | Expr::String(_) => {
                let constant = self.literal(expr)?;
                self.emit(Instruction::binary(
                    OpCode::Constant,
                    constant,
                    Operand::Register(dest),
                ));
            }

            Expr::Name(name) => self.compile_name(name, dest)?,
            Expr::Binary { op, left, right } => self.compile_binary(*op, left, right, dest)?,
            Expr::Logical { op, left, right } => self.compile_logical(*op, left, right, dest)?,

            Expr::Not(operand) => {
                self.compile_expr(operand, dest)?;
                self.emit(Instruction::unary(OpCode::Not, Operand::Register(dest)));
            }

            Expr::Call { name, argument } => self.compile_call(name, argument.as_deref(), dest)?,

            Expr::If {
                condition,
                then_arm,
                else_arm,
            } => self.compile_if(condition, then_arm, else_arm.as_deref(), dest)?,

            Expr::Sequence(exprs) => self.compile_sequence(exprs, dest)?,

            Expr::Variable { pattern, value, .. } => {
                self.compile_variable(pattern, value, dest)?
            }

            Expr::Record(fields) => self.compile_record(fields, dest)?,
            Expr::Def(method) => self.compile_def(method, dest)?,

            Expr::Return(value) => {
                match value {
                    Some(value) => self.compile_expr(value, dest)?,
                    None => self.emit_builtin(builtin::NOTHING, dest),
                }
                self.emit(Instruction::unary(OpCode::Return, Operand::Register(dest)));
            }

            Expr::Throw(value) => {
                self.compile_expr(value, dest)?;
                self.emit(Instruction::unary(OpCode::Throw, Operand::Register(dest)));
            }
        }
        Ok(())
    }

    fn compile_name(&mut self, name: &str, dest: u8) -> Result<(), CompileError> {
        if let Some(register) = self.scope.resolve(name) {
            if register != dest {
                self.emit(Instruction::binary(
                    OpCode::Move,
                    Operand::Register(register),
                    Operand::Register(dest),
                ));
            }
            return Ok(());
        }

        if let Some((import, export)) = self.find_export(name) {
            let import = self.index(import, "import list")?;
            let export = self.index(export, "export list")?;
            self.emit(Instruction::new(
                OpCode::GetModule,
                import,
                export,
                Operand::Register(dest),
            ));
            return Ok(());
        }

        self.errors.push(CompileError::UndefinedVariable {
            method: self.method_name.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    /// Finds `name` among the exports of this module's imports.
    fn find_export(&self, name: &str) -> Option<(usize, usize)> {
        let module = self.vm.modules.get(self.module)?;
        module.imports.iter().enumerate().find_map(|(import, id)| {
            let export = self.vm.modules.get(*id)?.export_index(name)?;
            Some((import, export))
        })
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        dest: u8,
    ) -> Result<(), CompileError> {
        let opcode = match op {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Subtract => OpCode::Subtract,
            BinaryOp::Multiply => OpCode::Multiply,
            BinaryOp::Divide => OpCode::Divide,
            BinaryOp::LessThan => OpCode::LessThan,
        };

        let (left, left_temp) = self.operand(left)?;
        let (right, right_temp) = self.operand(right)?;

        self.emit(Instruction::new(opcode, left, right, Operand::Register(dest)));

        if let Some(temp) = right_temp {
            self.registers.release(temp);
        }
        if let Some(temp) = left_temp {
            self.registers.release(temp);
        }
        Ok(())
    }

    /// Compiles an arithmetic operand. Literals go straight to the constant
    /// pool; anything else gets a temporary the caller must release.
    fn operand(&mut self, expr: &Expr) -> Result<(Operand, Option<u8>), CompileError> {
        if matches!(expr, Expr::Number(_) | Expr::String(_)) {
            return Ok((self.literal(expr)?, None));
        }

        let temp = self.allocate()?;
        self.compile_expr(expr, temp)?;
        Ok((Operand::Register(temp), Some(temp)))
    }

    fn compile_logical(
        &mut self,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
        dest: u8,
    ) -> Result<(), CompileError> {
        // The left value stays in dest when it decides the result.
        self.compile_expr(left, dest)?;
        let jump = self.start_jump();
        self.compile_expr(right, dest)?;

        let opcode = match op {
            LogicalOp::And => OpCode::JumpIfFalse,
            LogicalOp::Or => OpCode::JumpIfTrue,
        };
        self.patch_jump(jump, opcode, Some(dest))
    }

    fn compile_call(
        &mut self,
        name: &str,
        argument: Option<&Expr>,
        dest: u8,
    ) -> Result<(), CompileError> {
        match argument {
            Some(argument) => self.compile_expr(argument, dest)?,
            None => self.emit_builtin(builtin::NOTHING, dest),
        }

        let Some(index) = self.vm.methods.find(name) else {
            self.errors.push(CompileError::UndefinedMethod {
                method: self.method_name.clone(),
                name: name.to_string(),
            });
            return Ok(());
        };

        let method = self.index(index, "method table")?;
        self.emit(Instruction::binary(
            OpCode::Call,
            method,
            Operand::Register(dest),
        ));
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        then_arm: &Expr,
        else_arm: Option<&Expr>,
        dest: u8,
    ) -> Result<(), CompileError> {
        self.compile_expr(condition, dest)?;
        let jump_to_else = self.start_jump();

        self.compile_scoped(then_arm, dest)?;
        let jump_to_end = self.start_jump();

        self.patch_jump(jump_to_else, OpCode::JumpIfFalse, Some(dest))?;
        match else_arm {
            Some(else_arm) => self.compile_scoped(else_arm, dest)?,
            None => self.emit_builtin(builtin::NOTHING, dest),
        }

        self.patch_jump(jump_to_end, OpCode::Jump, None)
    }

    fn compile_sequence(&mut self, exprs: &[Expr], dest: u8) -> Result<(), CompileError> {
        self.scope.begin_scope();
        if exprs.is_empty() {
            self.emit_builtin(builtin::NOTHING, dest);
        }
        for expr in exprs {
            self.compile_expr(expr, dest)?;
        }
        self.end_scope();
        Ok(())
    }

    fn compile_scoped(&mut self, expr: &Expr, dest: u8) -> Result<(), CompileError> {
        self.scope.begin_scope();
        self.compile_expr(expr, dest)?;
        self.end_scope();
        Ok(())
    }

    fn compile_variable(
        &mut self,
        pattern: &Pattern,
        value: &Expr,
        dest: u8,
    ) -> Result<(), CompileError> {
        // Variables first, so no temporary below can take their registers.
        let mut variables = self.reserve_variables(pattern)?;
        let temp = self.allocate()?;

        self.compile_expr(value, temp)?;
        self.match_pattern(pattern, temp, &mut variables)?;

        self.emit(Instruction::binary(
            OpCode::Move,
            Operand::Register(temp),
            Operand::Register(dest),
        ));
        self.registers.release(temp);
        Ok(())
    }

    fn compile_record(&mut self, fields: &[(String, Expr)], dest: u8) -> Result<(), CompileError> {
        // RECORD reads a contiguous run, so take every register up front.
        let mut registers = Vec::with_capacity(fields.len());
        for _ in fields {
            registers.push(self.allocate()?);
        }

        let mut symbols = Vec::with_capacity(fields.len());
        for ((name, value), register) in fields.iter().zip(&registers) {
            self.compile_expr(value, *register)?;
            let symbol = self.vm.symbols.intern(name);
            self.index(symbol, "symbol table")?;
            symbols.push(symbol);
        }

        let ty = self.vm.record_types.intern(symbols);
        let ty = self.index(ty, "record types")?;
        let first = registers.first().copied().unwrap_or(dest);

        self.emit(Instruction::new(
            OpCode::Record,
            Operand::Register(first),
            ty,
            Operand::Register(dest),
        ));

        for register in registers.into_iter().rev() {
            self.registers.release(register);
        }
        Ok(())
    }

    fn compile_def(&mut self, method: &MethodAst, dest: u8) -> Result<(), CompileError> {
        let slot = self.vm.methods.declare(&method.name);
        let slot = self.index(slot, "method table")?;

        match Compiler::new(self.vm, self.module).compile(method) {
            Ok(nested) => {
                self.methods.push(Arc::new(nested));
                let nested = self.index(self.methods.len() - 1, "nested methods")?;
                self.emit(Instruction::binary(OpCode::DefMethod, nested, slot));
            }
            Err(errors) => self.errors.extend(errors),
        }

        self.emit_builtin(builtin::NOTHING, dest);
        Ok(())
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    /// Allocates one register per name the pattern binds, in binding order.
    fn reserve_variables(&mut self, pattern: &Pattern) -> Result<vec::IntoIter<u8>, CompileError> {
        let mut variables = Vec::with_capacity(pattern.count_variables());
        for _ in 0..pattern.count_variables() {
            variables.push(self.allocate()?);
        }
        Ok(variables.into_iter())
    }

    /// Destructures register `value` into the reserved `variables`.
    fn match_pattern(
        &mut self,
        pattern: &Pattern,
        value: u8,
        variables: &mut vec::IntoIter<u8>,
    ) -> Result<(), CompileError> {
        match pattern {
            Pattern::Wildcard => {}

            Pattern::Variable(name) => {
                let register = variables
                    .next()
                    .ok_or_else(|| self.limit("pattern variables"))?;
                self.emit(Instruction::binary(
                    OpCode::Move,
                    Operand::Register(value),
                    Operand::Register(register),
                ));
                self.scope.declare(name, register);
                trace!(name = %name, register, "declared local");
            }

            Pattern::Record(fields) => {
                for (field, subpattern) in fields {
                    let symbol = self.vm.symbols.intern(field);
                    let symbol = self.index(symbol, "symbol table")?;
                    let temp = self.allocate()?;

                    self.emit(Instruction::new(
                        OpCode::GetField,
                        Operand::Register(value),
                        symbol,
                        Operand::Register(temp),
                    ));
                    self.match_pattern(subpattern, temp, variables)?;
                    self.registers.release(temp);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.emit(instruction)
    }

    fn emit_builtin(&mut self, id: u8, dest: u8) {
        self.emit(Instruction::binary(
            OpCode::BuiltIn,
            Operand::Index(id),
            Operand::Register(dest),
        ));
    }

    /// Reserves an instruction slot for a jump whose target is not known
    /// yet.
    fn start_jump(&mut self) -> usize {
        self.emit(Instruction::placeholder())
    }

    /// Overwrites the slot at `index` with a jump to the next instruction.
    fn patch_jump(
        &mut self,
        index: usize,
        opcode: OpCode,
        condition: Option<u8>,
    ) -> Result<(), CompileError> {
        let distance = self.bytecode.next_index() as isize - index as isize - 1;
        let offset = i8::try_from(distance).map_err(|_| CompileError::JumpTooFar {
            method: self.method_name.clone(),
            distance,
        })?;

        let jump = match condition {
            Some(register) => {
                Instruction::binary(opcode, Operand::Register(register), Operand::Offset(offset))
            }
            None => Instruction::unary(opcode, Operand::Offset(offset)),
        };
        self.bytecode.instructions[index] = jump;
        Ok(())
    }

    fn end_scope(&mut self) {
        for register in self.scope.end_scope() {
            self.registers.release(register);
        }
    }

    fn allocate(&mut self) -> Result<u8, CompileError> {
        self.registers
            .allocate()
            .ok_or_else(|| self.limit("register count"))
    }

    /// Adds a number or string literal to the constant pool.
    fn literal(&mut self, expr: &Expr) -> Result<Operand, CompileError> {
        let value = match expr {
            Expr::String(text) => Value::String(self.vm.heap.alloc_string(text.as_str()).get()),
            Expr::Number(n) => Value::Number(*n),
            _ => Value::Nothing,
        };
        let index = self.bytecode.add_constant(value);
        u8::try_from(index)
            .map(Operand::Constant)
            .map_err(|_| self.limit("constant pool"))
    }

    fn index(&self, index: usize, what: &'static str) -> Result<Operand, CompileError> {
        u8::try_from(index)
            .map(Operand::Index)
            .map_err(|_| self.limit(what))
    }

    fn limit(&self, what: &'static str) -> CompileError {
        CompileError::Limit {
            method: self.method_name.clone(),
            what,
        }
    }
}

/// Compiles a parsed module into `vm`.
///
/// Every method name is declared before any body is compiled, so methods
/// may call each other in any order. Methods are installed only if the
/// whole module compiles; otherwise every error is reported together and
/// the module name stays free. Returns the module id.
pub fn compile_module(vm: &mut Vm, ast: &ModuleAst) -> Result<usize, CompileErrors> {
    let mut errors = Vec::new();

    let mut module = Module::new(&ast.name);
    for import in &ast.imports {
        match vm.modules.find(import) {
            Some(id) => module.imports.push(id),
            None => errors.push(CompileError::UnknownImport {
                module: ast.name.clone(),
                name: import.clone(),
            }),
        }
    }
    let Some(module) = vm.modules.add(module) else {
        return Err(CompileErrors(vec![CompileError::ModuleExists {
            name: ast.name.clone(),
        }]));
    };

    let mut declared = Vec::with_capacity(ast.methods.len());
    for (i, method) in ast.methods.iter().enumerate() {
        let repeated = ast.methods[..i].iter().any(|m| m.name == method.name);
        if repeated || vm.methods.is_defined(&method.name) {
            errors.push(CompileError::AlreadyDefined {
                name: method.name.clone(),
            });
            declared.push(false);
        } else {
            vm.methods.declare(&method.name);
            declared.push(true);
        }
    }

    let mut compiled = Vec::new();
    for (method, declared) in ast.methods.iter().zip(declared) {
        if !declared {
            continue;
        }
        match Compiler::new(vm, module).compile(method) {
            Ok(method) => compiled.push(method),
            Err(method_errors) => errors.extend(method_errors),
        }
    }

    if !errors.is_empty() {
        // Declared slots stay empty, so calls into them fault.
        vm.modules.discard(module);
        vm.heap.release_temps();
        debug!(module = %ast.name, errors = errors.len(), "module failed to compile");
        return Err(CompileErrors(errors));
    }

    let installed = compiled.len();
    for method in compiled {
        let name = method.name.clone();
        vm.methods.define(&name, Arc::new(method));
    }

    // Constants are reachable from the method table now.
    vm.heap.release_temps();

    debug!(module = %ast.name, installed, "compiled module");
    Ok(module)
}

/// Compiles a single method without installing it, for one-off evaluation.
///
/// String constants stay pinned until the next safepoint.
pub fn compile_method(vm: &mut Vm, module: usize, ast: &MethodAst) -> Result<Method, CompileErrors> {
    Compiler::new(vm, module).compile(ast).map_err(CompileErrors)
}
