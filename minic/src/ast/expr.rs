//! Expression AST nodes

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Call, Type};
use crate::iloc::IlocProgram;
use crate::lexeme::Lexeme;
use crate::sema::infer_type;

/// An evaluable term.
///
/// The resolved type mirrors the active variant's type; the `code` buffer
/// is filled in by lowering and holds the full fragment for this subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExprKind,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

/// The closed set of expression variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Bin(Box<BinOp>),
    Un(Box<UnOp>),
    Call(Call),
    Ident(Identifier),
    Lit(Literal),
}

impl Expression {
    pub fn bin(op: BinOpKind, left: Expression, right: Expression) -> Self {
        let bin = BinOp::new(op, left, right);
        Self {
            ty: bin.ty,
            kind: ExprKind::Bin(Box::new(bin)),
            code: IlocProgram::new(),
        }
    }

    pub fn un(op: UnOpKind, operand: Expression) -> Self {
        let un = UnOp::new(op, operand);
        Self {
            ty: un.ty,
            kind: ExprKind::Un(Box::new(un)),
            code: IlocProgram::new(),
        }
    }

    pub fn call(call: Call) -> Self {
        Self {
            ty: call.ty,
            kind: ExprKind::Call(call),
            code: IlocProgram::new(),
        }
    }

    pub fn ident(identifier: Identifier) -> Self {
        Self {
            ty: identifier.ty,
            kind: ExprKind::Ident(identifier),
            code: IlocProgram::new(),
        }
    }

    pub fn literal(literal: Literal) -> Self {
        Self {
            ty: literal.ty(),
            kind: ExprKind::Lit(literal),
            code: IlocProgram::new(),
        }
    }
}

/// Binary operator application.
///
/// The result type is inferred from the operand types at construction
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinOp {
    pub op: BinOpKind,
    pub left: Expression,
    pub right: Expression,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl BinOp {
    pub fn new(op: BinOpKind, left: Expression, right: Expression) -> Self {
        let ty = infer_type(left.ty, right.ty);
        Self {
            op,
            left,
            right,
            ty,
            code: IlocProgram::new(),
        }
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOpKind {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOpKind::Mul => write!(f, "*"),
            BinOpKind::Div => write!(f, "/"),
            BinOpKind::Mod => write!(f, "%"),
            BinOpKind::Add => write!(f, "+"),
            BinOpKind::Sub => write!(f, "-"),
            BinOpKind::Lt => write!(f, "<"),
            BinOpKind::Gt => write!(f, ">"),
            BinOpKind::Le => write!(f, "<="),
            BinOpKind::Ge => write!(f, ">="),
            BinOpKind::Eq => write!(f, "=="),
            BinOpKind::Ne => write!(f, "!="),
            BinOpKind::And => write!(f, "&"),
            BinOpKind::Or => write!(f, "|"),
        }
    }
}

/// Unary operator application. The result type is the operand's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnOp {
    pub op: UnOpKind,
    pub operand: Expression,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl UnOp {
    pub fn new(op: UnOpKind, operand: Expression) -> Self {
        let ty = operand.ty;
        Self {
            op,
            operand,
            ty,
            code: IlocProgram::new(),
        }
    }
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOpKind {
    /// Numeric negation (`-`)
    Neg,
    /// Logical negation (`!`)
    Not,
}

impl fmt::Display for UnOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOpKind::Neg => write!(f, "-"),
            UnOpKind::Not => write!(f, "!"),
        }
    }
}

/// A constant value, carrying the lexeme it was scanned from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub lexeme: Lexeme,
    #[serde(skip)]
    pub code: IlocProgram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralKind {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn int(value: i64, lexeme: Lexeme) -> Self {
        Self {
            kind: LiteralKind::Int(value),
            lexeme,
            code: IlocProgram::new(),
        }
    }

    pub fn float(value: f64, lexeme: Lexeme) -> Self {
        Self {
            kind: LiteralKind::Float(value),
            lexeme,
            code: IlocProgram::new(),
        }
    }

    pub fn boolean(value: bool, lexeme: Lexeme) -> Self {
        Self {
            kind: LiteralKind::Bool(value),
            lexeme,
            code: IlocProgram::new(),
        }
    }

    pub fn ty(&self) -> Type {
        match self.kind {
            LiteralKind::Int(_) => Type::Int,
            LiteralKind::Float(_) => Type::Float,
            LiteralKind::Bool(_) => Type::Bool,
        }
    }
}

/// A name occurrence.
///
/// `ty` starts out `Undefined`; semantic analysis resolves it against the
/// declaration before lowering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub text: String,
    pub lexeme: Lexeme,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Identifier {
    pub fn new(text: impl Into<String>, lexeme: Lexeme) -> Self {
        Self {
            text: text.into(),
            lexeme,
            ty: Type::Undefined,
            code: IlocProgram::new(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Bin(bin) => write!(f, "({}) {} ({})", bin.left, bin.op, bin.right),
            ExprKind::Un(un) => write!(f, "{}{}", un.op, un.operand),
            ExprKind::Call(call) => write!(f, "{call}"),
            ExprKind::Ident(identifier) => write!(f, "{}", identifier.text),
            ExprKind::Lit(literal) => write!(f, "{literal}"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LiteralKind::Int(value) => write!(f, "{value}"),
            LiteralKind::Float(value) => write!(f, "{value}"),
            LiteralKind::Bool(value) => write!(f, "{value}"),
        }
    }
}
