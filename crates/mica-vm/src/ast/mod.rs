// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for Mica.
//!
//! The tree is a closed set of sum types. The compiler walks it with one
//! exhaustive `match` per node family, so adding a variant forces every
//! consumer to handle it.

/// A compiled unit of source: the modules it imports and the methods it
/// defines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleAst {
    /// Name of the module (used for diagnostics and module lookup)
    pub name: String,
    /// Names of imported modules, in declaration order
    pub imports: Vec<String>,
    /// Top-level method definitions
    pub methods: Vec<MethodAst>,
}

/// A method definition: `def name(pattern) body`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodAst {
    /// The method name
    pub name: String,
    /// The parameter pattern, if the method takes an argument
    pub parameter: Option<Pattern>,
    /// The body expression
    pub body: Expr,
}

/// Binary arithmetic and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `<`
    LessThan,
}

/// Short-circuiting logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`: the right side only runs when the left side is true
    And,
    /// `or`: the right side only runs when the left side is false
    Or,
}

/// A Mica expression. Everything is an expression, including variable
/// declarations and control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `true` / `false`
    Bool(bool),
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// `nothing`
    Nothing,
    /// A reference to a local variable or an imported export
    Name(String),
    /// `left op right`
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `left and right` / `left or right`
    Logical {
        /// The operator
        op: LogicalOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `not operand`
    Not(Box<Expr>),
    /// `name(argument)`
    Call {
        /// The method being called
        name: String,
        /// The argument, if any
        argument: Option<Box<Expr>>,
    },
    /// `if condition then ... else ...`
    If {
        /// The condition
        condition: Box<Expr>,
        /// Evaluated when the condition is true
        then_arm: Box<Expr>,
        /// Evaluated when the condition is false; `nothing` if absent
        else_arm: Option<Box<Expr>>,
    },
    /// A block of expressions; its value is the value of the last one
    Sequence(Vec<Expr>),
    /// `val pattern = value` / `var pattern = value`
    Variable {
        /// Whether the binding was introduced with `var`
        mutable: bool,
        /// The pattern the value is destructured into
        pattern: Pattern,
        /// The bound value
        value: Box<Expr>,
    },
    /// `x: 1, y: 2`
    Record(Vec<(String, Expr)>),
    /// A method definition nested inside another method's body
    Def(Box<MethodAst>),
    /// `return value`
    Return(Option<Box<Expr>>),
    /// `throw value`
    Throw(Box<Expr>),
}

/// A binding pattern on the left of `val`/`var` or in a parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`: matches anything, binds nothing
    Wildcard,
    /// `name`: binds the whole value
    Variable(String),
    /// `x: a, y: b`: destructures a record field by field
    Record(Vec<(String, Pattern)>),
}

impl Pattern {
    /// Counts the names this pattern introduces.
    pub fn count_variables(&self) -> usize {
        match self {
            Pattern::Wildcard => 0,
            Pattern::Variable(_) => 1,
            Pattern::Record(fields) => fields.iter().map(|(_, p)| p.count_variables()).sum(),
        }
    }
}

impl Expr {
    /// Wraps two expressions in a binary operator node.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Builds a call node.
    pub fn call(name: impl Into<String>, argument: Option<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            argument: argument.map(Box::new),
        }
    }

    /// Builds a name reference.
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_variables() {
        assert_eq!(Pattern::Wildcard.count_variables(), 0);
        assert_eq!(Pattern::Variable("a".into()).count_variables(), 1);

        let nested = Pattern::Record(vec![
            ("x".into(), Pattern::Variable("a".into())),
            ("y".into(), Pattern::Wildcard),
            (
                "z".into(),
                Pattern::Record(vec![
                    ("p".into(), Pattern::Variable("b".into())),
                    ("q".into(), Pattern::Variable("c".into())),
                ]),
            ),
        ]);
        assert_eq!(nested.count_variables(), 3);
    }
}
