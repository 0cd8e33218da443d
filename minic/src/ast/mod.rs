//! Abstract syntax tree
//!
//! The parser stage builds this tree through the constructors below. Every
//! node exclusively owns its children and one ILOC buffer that lowering
//! fills with the node's own fragment. Child lists only ever grow; there
//! is no removal operation.

mod expr;
mod types;

pub use expr::*;
pub use types::*;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::iloc::IlocProgram;

/// A whole compilation unit: an ordered sequence of global declarations.
///
/// After lowering, `code` holds the complete linear ILOC program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub globals: Vec<Global>,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, global: Global) {
        self.globals.push(global);
    }
}

/// One top-level declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub kind: GlobalKind,
    #[serde(skip)]
    pub code: IlocProgram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GlobalKind {
    Function(Function),
    Variable(Variable),
}

impl Global {
    pub fn function(function: Function) -> Self {
        Self {
            kind: GlobalKind::Function(function),
            code: IlocProgram::new(),
        }
    }

    pub fn variable(variable: Variable) -> Self {
        Self {
            kind: GlobalKind::Variable(variable),
            code: IlocProgram::new(),
        }
    }
}

/// A function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: Identifier,
    pub ret_ty: Type,
    pub params: Parameters,
    pub body: Block,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Function {
    pub fn new(name: Identifier, ret_ty: Type, params: Parameters, body: Block) -> Self {
        Self {
            name,
            ret_ty,
            params,
            body,
            code: IlocProgram::new(),
        }
    }
}

/// A formal parameter list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    pub vars: Vec<Variable>,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, variable: Variable) {
        self.vars.push(variable);
    }
}

/// One type-tagged declaration group, e.g. `int a, b, c`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub ty: Type,
    pub names: VariableNames,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Variable {
    pub fn new(ty: Type, names: VariableNames) -> Self {
        Self {
            ty,
            names,
            code: IlocProgram::new(),
        }
    }
}

/// The names sharing one declared type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableNames {
    pub names: Vec<Identifier>,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl VariableNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: Identifier) {
        self.names.push(name);
    }
}

/// One statement. The resolved type is inherited from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

/// The closed set of statement variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandKind {
    VarDecl(Variable),
    Attribution(Attribution),
    Call(Call),
    Return(Return),
    If(If),
    While(While),
    Block(Block),
}

impl From<Variable> for Command {
    fn from(variable: Variable) -> Self {
        Self {
            ty: variable.ty,
            kind: CommandKind::VarDecl(variable),
            code: IlocProgram::new(),
        }
    }
}

impl From<Attribution> for Command {
    fn from(attribution: Attribution) -> Self {
        Self {
            ty: attribution.ty,
            kind: CommandKind::Attribution(attribution),
            code: IlocProgram::new(),
        }
    }
}

impl From<Call> for Command {
    fn from(call: Call) -> Self {
        Self {
            ty: call.ty,
            kind: CommandKind::Call(call),
            code: IlocProgram::new(),
        }
    }
}

impl From<Return> for Command {
    fn from(ret: Return) -> Self {
        Self {
            ty: ret.ty,
            kind: CommandKind::Return(ret),
            code: IlocProgram::new(),
        }
    }
}

impl From<If> for Command {
    fn from(branch: If) -> Self {
        Self {
            ty: branch.ty,
            kind: CommandKind::If(branch),
            code: IlocProgram::new(),
        }
    }
}

impl From<While> for Command {
    fn from(repeat: While) -> Self {
        Self {
            ty: repeat.ty,
            kind: CommandKind::While(repeat),
            code: IlocProgram::new(),
        }
    }
}

impl From<Block> for Command {
    fn from(block: Block) -> Self {
        Self {
            ty: Type::Undefined,
            kind: CommandKind::Block(block),
            code: IlocProgram::new(),
        }
    }
}

/// An assignment. The target's type is resolved later by semantic
/// analysis, so it starts out `Undefined`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub target: Identifier,
    pub value: Expression,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Attribution {
    pub fn new(target: Identifier, value: Expression) -> Self {
        Self {
            target,
            value,
            ty: Type::Undefined,
            code: IlocProgram::new(),
        }
    }
}

/// A function invocation. The return type is resolved later by semantic
/// analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub callee: Identifier,
    pub args: Arguments,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Call {
    pub fn new(callee: Identifier, args: Arguments) -> Self {
        Self {
            callee,
            args,
            ty: Type::Undefined,
            code: IlocProgram::new(),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.callee.text)?;
        for (i, arg) in self.args.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// An actual argument list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    pub args: Vec<Expression>,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, argument: Expression) {
        self.args.push(argument);
    }
}

/// A return statement. Its type is the returned expression's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Return {
    pub value: Expression,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Return {
    pub fn new(value: Expression) -> Self {
        let ty = value.ty;
        Self {
            value,
            ty,
            code: IlocProgram::new(),
        }
    }
}

/// A conditional with an optional else branch. Its type is the
/// condition's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct If {
    pub cond: Expression,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl If {
    pub fn new(cond: Expression, then_block: Block, else_block: Option<Block>) -> Self {
        let ty = cond.ty;
        Self {
            cond,
            then_block,
            else_block,
            ty,
            code: IlocProgram::new(),
        }
    }
}

/// A loop. Its type is the condition's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct While {
    pub cond: Expression,
    pub body: Block,
    pub ty: Type,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl While {
    pub fn new(cond: Expression, body: Block) -> Self {
        let ty = cond.ty;
        Self {
            cond,
            body,
            ty,
            code: IlocProgram::new(),
        }
    }
}

/// A statement sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub commands: Vec<Command>,
    #[serde(skip)]
    pub code: IlocProgram,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }
}
