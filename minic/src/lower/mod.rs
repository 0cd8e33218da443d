//! Tree-to-ILOC lowering
//!
//! Lowering is invoked on the root but assembles bottom-up: every node
//! first lowers its children, splices their fragments into its own buffer
//! in evaluation order, then appends the instructions for its own
//! operation. Expression nodes hand their value back in a fresh virtual
//! register; statement and structural nodes leave their buffer as the only
//! observable output.
//!
//! Logical `&`, `|`, and `!` take the branch-and-converge shape: the
//! operand is compared against the false constant, a conditional branch
//! picks the result label, and a label fence around the right operand's
//! fragment keeps it off the short-circuit path.

use log::debug;

use crate::ast::{
    Arguments, Attribution, BinOp, BinOpKind, Block, Call, Command, CommandKind, Expression,
    ExprKind, Function, Global, GlobalKind, Identifier, If, Literal, LiteralKind, Parameters,
    Program, Return, UnOp, UnOpKind, Variable, VariableNames, While,
};
use crate::error::{CompileError, Result};
use crate::iloc::{Instruction, Opcode, Reg, RegAlloc};
use crate::sema::{Resolve, Slot};

// Stack growth guards for deeply nested expressions.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// One lowering session: the id allocator plus the symbol resolver.
///
/// A session is created per compilation unit, so register and label
/// numbering starts at zero every run and two units lowered in the same
/// process never share ids.
pub struct Lower<'a> {
    regs: RegAlloc,
    symbols: &'a dyn Resolve,
}

impl<'a> Lower<'a> {
    pub fn new(symbols: &'a dyn Resolve) -> Self {
        Self::with_registers(RegAlloc::new(), symbols)
    }

    /// Builds a session around an allocator the caller already drew ids
    /// from, e.g. to reserve base-address registers before lowering.
    pub fn with_registers(regs: RegAlloc, symbols: &'a dyn Resolve) -> Self {
        Self { regs, symbols }
    }

    fn fresh(&mut self) -> Reg {
        self.regs.next_id()
    }

    fn resolve(&self, identifier: &Identifier) -> Result<Slot> {
        self.symbols
            .resolve_variable(&identifier.text)
            .ok_or_else(|| {
                CompileError::undeclared(
                    &identifier.text,
                    identifier.lexeme.line,
                    identifier.lexeme.column,
                )
            })
    }
}

impl Program {
    /// Lowers the whole unit. Afterwards `self.code` holds the complete
    /// linear program, ready for the register allocation stage.
    pub fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        debug!("lowering {} global declaration(s)", self.globals.len());
        for global in &mut self.globals {
            global.lower(cx)?;
            self.code.append(&global.code);
        }
        Ok(())
    }
}

impl Global {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        match &mut self.kind {
            GlobalKind::Function(function) => {
                function.lower(cx)?;
                self.code.append(&function.code);
            }
            GlobalKind::Variable(variable) => {
                variable.lower(cx);
                self.code.append(&variable.code);
            }
        }
        Ok(())
    }
}

impl Function {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        debug!("lowering function `{}`", self.name.text);
        self.params.lower(cx);
        self.body.lower(cx)?;
        self.code.append(&self.params.code);
        self.code.append(&self.body.code);
        Ok(())
    }
}

impl Parameters {
    fn lower(&mut self, cx: &mut Lower) {
        for var in &mut self.vars {
            var.lower(cx);
            self.code.append(&var.code);
        }
    }
}

impl Variable {
    // Declarations reserve storage through the symbol table; they emit
    // nothing themselves.
    fn lower(&mut self, cx: &mut Lower) {
        self.names.lower(cx);
        self.code.append(&self.names.code);
    }
}

impl VariableNames {
    fn lower(&mut self, _cx: &mut Lower) {}
}

impl Block {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        for command in &mut self.commands {
            command.lower(cx)?;
            self.code.append(&command.code);
        }
        Ok(())
    }
}

impl Command {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        match &mut self.kind {
            CommandKind::VarDecl(variable) => {
                variable.lower(cx);
                self.code.append(&variable.code);
            }
            CommandKind::Attribution(attribution) => {
                attribution.lower(cx)?;
                self.code.append(&attribution.code);
            }
            CommandKind::Call(call) => {
                // A call in statement position discards its value.
                call.lower(cx)?;
                self.code.append(&call.code);
            }
            CommandKind::Return(ret) => {
                ret.lower(cx)?;
                self.code.append(&ret.code);
            }
            CommandKind::If(branch) => {
                branch.lower(cx)?;
                self.code.append(&branch.code);
            }
            CommandKind::While(repeat) => {
                repeat.lower(cx)?;
                self.code.append(&repeat.code);
            }
            CommandKind::Block(block) => {
                block.lower(cx)?;
                self.code.append(&block.code);
            }
        }
        Ok(())
    }
}

impl Attribution {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        debug!("lowering `{} = {}`", self.target.text, self.value);
        let value = self.value.lower(cx)?;
        let slot = cx.resolve(&self.target)?;
        self.code.append(&self.value.code);
        self.code
            .push(Instruction::new(Opcode::StoreAi, value, slot.base, slot.offset));
        Ok(())
    }
}

impl Call {
    fn lower(&mut self, cx: &mut Lower) -> Result<Reg> {
        self.args.lower(cx)?;
        self.code.append(&self.args.code);
        // The instruction set carries no call; the calling convention is
        // the register allocation stage's job. The value register is
        // reserved here so expression contexts have a destination.
        Ok(cx.fresh())
    }
}

impl Arguments {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        for arg in &mut self.args {
            arg.lower(cx)?;
            self.code.append(&arg.code);
        }
        Ok(())
    }
}

impl Return {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        self.value.lower(cx)?;
        self.code.append(&self.value.code);
        Ok(())
    }
}

impl If {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        let cond = self.cond.lower(cx)?;
        self.then_block.lower(cx)?;

        match &mut self.else_block {
            Some(else_block) => {
                else_block.lower(cx)?;
                let then_label = cx.fresh();
                let else_label = cx.fresh();
                let done = cx.fresh();

                self.code.append(&self.cond.code);
                self.code
                    .push(Instruction::new(Opcode::Cbr, cond, then_label, else_label));
                self.code.push(Instruction::new(Opcode::Label, then_label, 0, 0));
                self.code.append(&self.then_block.code);
                self.code.push(Instruction::new(Opcode::JumpI, done, 0, 0));
                self.code.push(Instruction::new(Opcode::Label, else_label, 0, 0));
                self.code.append(&else_block.code);
                self.code.push(Instruction::new(Opcode::Label, done, 0, 0));
            }
            None => {
                let then_label = cx.fresh();
                let done = cx.fresh();

                self.code.append(&self.cond.code);
                self.code
                    .push(Instruction::new(Opcode::Cbr, cond, then_label, done));
                self.code.push(Instruction::new(Opcode::Label, then_label, 0, 0));
                self.code.append(&self.then_block.code);
                self.code.push(Instruction::new(Opcode::Label, done, 0, 0));
            }
        }
        Ok(())
    }
}

impl While {
    fn lower(&mut self, cx: &mut Lower) -> Result<()> {
        let cond = self.cond.lower(cx)?;
        self.body.lower(cx)?;

        let top = cx.fresh();
        let body_label = cx.fresh();
        let done = cx.fresh();

        self.code.push(Instruction::new(Opcode::Label, top, 0, 0));
        self.code.append(&self.cond.code);
        self.code
            .push(Instruction::new(Opcode::Cbr, cond, body_label, done));
        self.code.push(Instruction::new(Opcode::Label, body_label, 0, 0));
        self.code.append(&self.body.code);
        self.code.push(Instruction::new(Opcode::JumpI, top, 0, 0));
        self.code.push(Instruction::new(Opcode::Label, done, 0, 0));
        Ok(())
    }
}

impl Expression {
    /// Lowers this expression; the returned register holds its value.
    pub fn lower(&mut self, cx: &mut Lower) -> Result<Reg> {
        // Grow the stack under deeply nested operand chains.
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.lower_inner(cx))
    }

    fn lower_inner(&mut self, cx: &mut Lower) -> Result<Reg> {
        let value = match &mut self.kind {
            ExprKind::Bin(bin) => {
                let value = bin.lower(cx)?;
                self.code.append(&bin.code);
                value
            }
            ExprKind::Un(un) => {
                let value = un.lower(cx)?;
                self.code.append(&un.code);
                value
            }
            ExprKind::Call(call) => {
                let value = call.lower(cx)?;
                self.code.append(&call.code);
                value
            }
            ExprKind::Ident(identifier) => {
                let value = identifier.lower(cx)?;
                self.code.append(&identifier.code);
                value
            }
            ExprKind::Lit(literal) => {
                let value = literal.lower(cx);
                self.code.append(&literal.code);
                value
            }
        };
        Ok(value)
    }
}

impl BinOp {
    fn lower(&mut self, cx: &mut Lower) -> Result<Reg> {
        // Operands evaluate left to right; both fragments land in this
        // buffer even for `&`/`|`, where branches realize the
        // short-circuit instead of omission.
        let left = self.left.lower(cx)?;
        let right = self.right.lower(cx)?;
        let value = cx.fresh();

        self.code.append(&self.left.code);

        match self.op {
            BinOpKind::Mul => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::Mult, left, right, value));
            }
            BinOpKind::Div => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::Div, left, right, value));
            }
            BinOpKind::Mod => {
                // No native remainder: v = l / r; t = v * r; v = l - t.
                let temp = cx.fresh();
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::Div, left, right, value));
                self.code
                    .push(Instruction::new(Opcode::Mult, value, right, temp));
                self.code
                    .push(Instruction::new(Opcode::Sub, left, temp, value));
            }
            BinOpKind::Add => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::Add, left, right, value));
            }
            BinOpKind::Sub => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::Sub, left, right, value));
            }
            BinOpKind::Lt => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpLt, left, right, value));
            }
            BinOpKind::Gt => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpGt, left, right, value));
            }
            BinOpKind::Le => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpLe, left, right, value));
            }
            BinOpKind::Ge => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpGe, left, right, value));
            }
            BinOpKind::Eq => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpEq, left, right, value));
            }
            BinOpKind::Ne => {
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpNe, left, right, value));
            }
            BinOpKind::And | BinOpKind::Or => {
                let temp = cx.fresh();
                let cond = cx.fresh();
                let check_right = cx.fresh();
                let case_true = cx.fresh();
                let case_false = cx.fresh();
                let done = cx.fresh();

                // cond = (left == false); a decided left branches straight
                // to its result label, jumping over the fenced right
                // fragment.
                self.code.push(Instruction::new(Opcode::LoadI, 0, temp, 0));
                self.code
                    .push(Instruction::new(Opcode::CmpEq, temp, left, cond));
                match self.op {
                    BinOpKind::And => self
                        .code
                        .push(Instruction::new(Opcode::Cbr, cond, case_false, check_right)),
                    _ => self
                        .code
                        .push(Instruction::new(Opcode::Cbr, cond, check_right, case_true)),
                }
                self.code
                    .push(Instruction::new(Opcode::Label, check_right, 0, 0));
                self.code.append(&self.right.code);
                self.code
                    .push(Instruction::new(Opcode::CmpEq, temp, right, cond));
                self.code
                    .push(Instruction::new(Opcode::Cbr, cond, case_false, case_true));
                self.code
                    .push(Instruction::new(Opcode::Label, case_true, 0, 0));
                self.code.push(Instruction::new(Opcode::LoadI, 1, value, 0));
                self.code.push(Instruction::new(Opcode::JumpI, done, 0, 0));
                self.code
                    .push(Instruction::new(Opcode::Label, case_false, 0, 0));
                self.code.push(Instruction::new(Opcode::LoadI, 0, value, 0));
                self.code.push(Instruction::new(Opcode::Label, done, 0, 0));
            }
        }

        Ok(value)
    }
}

impl UnOp {
    fn lower(&mut self, cx: &mut Lower) -> Result<Reg> {
        let operand = self.operand.lower(cx)?;
        let value = cx.fresh();

        self.code.append(&self.operand.code);

        match self.op {
            UnOpKind::Neg => {
                self.code
                    .push(Instruction::new(Opcode::RsubI, operand, 0, value));
            }
            UnOpKind::Not => {
                let temp = cx.fresh();
                let cond = cx.fresh();
                let case_true = cx.fresh();
                let case_false = cx.fresh();
                let done = cx.fresh();

                // cond = (operand == false); each branch loads the
                // inverted truth value.
                self.code.push(Instruction::new(Opcode::LoadI, 0, temp, 0));
                self.code
                    .push(Instruction::new(Opcode::CmpEq, temp, operand, cond));
                self.code
                    .push(Instruction::new(Opcode::Cbr, cond, case_false, case_true));
                self.code
                    .push(Instruction::new(Opcode::Label, case_true, 0, 0));
                self.code.push(Instruction::new(Opcode::LoadI, 0, value, 0));
                self.code.push(Instruction::new(Opcode::JumpI, done, 0, 0));
                self.code
                    .push(Instruction::new(Opcode::Label, case_false, 0, 0));
                self.code.push(Instruction::new(Opcode::LoadI, 1, value, 0));
                self.code.push(Instruction::new(Opcode::Label, done, 0, 0));
            }
        }

        Ok(value)
    }
}

impl Literal {
    fn lower(&mut self, cx: &mut Lower) -> Reg {
        let value = cx.fresh();
        let immediate = match self.kind {
            LiteralKind::Int(v) => v,
            // loadI carries an integer-only immediate; the fractional
            // part cannot be encoded and is dropped.
            LiteralKind::Float(v) => v as i64,
            LiteralKind::Bool(v) => i64::from(v),
        };
        self.code
            .push(Instruction::new(Opcode::LoadI, immediate as u64, value, 0));
        value
    }
}

impl Identifier {
    fn lower(&mut self, cx: &mut Lower) -> Result<Reg> {
        let slot = cx.resolve(self)?;
        let value = cx.fresh();
        self.code
            .push(Instruction::new(Opcode::LoadAi, slot.base, slot.offset, value));
        Ok(value)
    }
}

#[cfg(test)]
mod tests;
