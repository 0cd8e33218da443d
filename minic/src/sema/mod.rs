//! Semantic-analysis interfaces consumed by lowering
//!
//! Type checking and scope analysis proper run in an earlier stage; this
//! module fixes the two contracts lowering depends on — type inference for
//! binary operators and name-to-storage resolution — and bundles a flat
//! symbol table so the CLI driver and the tests can resolve identifiers
//! without that stage.

use std::collections::HashMap;

use log::debug;

use crate::ast::{Block, CommandKind, GlobalKind, Program, Type, Variable};
use crate::iloc::Reg;

/// Result type of a binary operation over two operand types.
///
/// Two ints stay int, any float operand widens the result to float, and
/// two bools stay bool. Any other pairing is a type error the semantic
/// stage reports; here it degrades to `Undefined`.
pub fn infer_type(left: Type, right: Type) -> Type {
    match (left, right) {
        (Type::Float, _) | (_, Type::Float) => Type::Float,
        (Type::Int, Type::Int) => Type::Int,
        (Type::Bool, Type::Bool) => Type::Bool,
        _ => Type::Undefined,
    }
}

/// Storage location of a declared variable: a base register plus a fixed
/// byte offset from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub base: Reg,
    pub offset: u64,
}

/// Symbol resolution as the lowering engine consumes it.
pub trait Resolve {
    /// Looks up a variable's storage slot. `None` means the program uses
    /// a name no declaration introduced, which is fatal to lowering.
    fn resolve_variable(&self, name: &str) -> Option<Slot>;
}

/// A flat name-to-slot table with bump-allocated offsets.
///
/// All slots live off a single caller-chosen base register; callers that
/// keep separate data segments can use one table per segment. The first
/// declaration of a name wins, matching the scope rules the semantic
/// stage enforces before this table is consulted.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    base: Reg,
    next_offset: u64,
    slots: HashMap<String, Slot>,
}

impl SymbolTable {
    pub fn new(base: Reg) -> Self {
        Self {
            base,
            next_offset: 0,
            slots: HashMap::new(),
        }
    }

    /// Declares `name`, assigning it the next free offset. Redeclaring a
    /// name returns the slot it already has.
    pub fn declare(&mut self, name: &str, ty: Type) -> Slot {
        if let Some(slot) = self.slots.get(name) {
            return *slot;
        }
        let slot = Slot {
            base: self.base,
            offset: self.next_offset,
        };
        self.next_offset += ty.size();
        debug!("declared `{name}`: {ty} at r{}+{}", slot.base, slot.offset);
        self.slots.insert(name.to_string(), slot);
        slot
    }

    /// Declares every name the program introduces — global variables,
    /// function parameters, and local declarations — in source order.
    pub fn bind_program(&mut self, program: &Program) {
        for global in &program.globals {
            match &global.kind {
                GlobalKind::Variable(variable) => self.bind_variable(variable),
                GlobalKind::Function(function) => {
                    for param in &function.params.vars {
                        self.bind_variable(param);
                    }
                    self.bind_block(&function.body);
                }
            }
        }
    }

    fn bind_variable(&mut self, variable: &Variable) {
        for name in &variable.names.names {
            self.declare(&name.text, variable.ty);
        }
    }

    fn bind_block(&mut self, block: &Block) {
        for command in &block.commands {
            match &command.kind {
                CommandKind::VarDecl(variable) => self.bind_variable(variable),
                CommandKind::If(branch) => {
                    self.bind_block(&branch.then_block);
                    if let Some(else_block) = &branch.else_block {
                        self.bind_block(else_block);
                    }
                }
                CommandKind::While(repeat) => self.bind_block(&repeat.body),
                CommandKind::Block(inner) => self.bind_block(inner),
                _ => {}
            }
        }
    }
}

impl Resolve for SymbolTable {
    fn resolve_variable(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Attribution, Command, Expression, Function, Global, Identifier, Literal, Parameters,
        VariableNames,
    };
    use crate::lexeme::Lexeme;

    #[test]
    fn infer_type_combines_operand_types() {
        assert_eq!(infer_type(Type::Int, Type::Int), Type::Int);
        assert_eq!(infer_type(Type::Int, Type::Float), Type::Float);
        assert_eq!(infer_type(Type::Float, Type::Int), Type::Float);
        assert_eq!(infer_type(Type::Float, Type::Float), Type::Float);
        assert_eq!(infer_type(Type::Bool, Type::Bool), Type::Bool);
        assert_eq!(infer_type(Type::Bool, Type::Int), Type::Undefined);
        assert_eq!(infer_type(Type::Undefined, Type::Int), Type::Undefined);
    }

    #[test]
    fn declare_assigns_word_aligned_offsets() {
        let mut table = SymbolTable::new(7);
        let a = table.declare("a", Type::Int);
        let f = table.declare("f", Type::Float);
        let b = table.declare("b", Type::Bool);

        assert_eq!(a, Slot { base: 7, offset: 0 });
        assert_eq!(f, Slot { base: 7, offset: 4 });
        assert_eq!(b, Slot { base: 7, offset: 12 });

        // Redeclaration keeps the first slot.
        assert_eq!(table.declare("a", Type::Int), a);
        assert_eq!(table.resolve_variable("f"), Some(f));
        assert_eq!(table.resolve_variable("missing"), None);
    }

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, Lexeme::ident(name, 1, 1))
    }

    fn decl(ty: Type, name: &str) -> Variable {
        let mut names = VariableNames::new();
        names.push(ident(name));
        Variable::new(ty, names)
    }

    #[test]
    fn bind_program_walks_globals_params_and_nested_locals() {
        let mut program = Program::new();
        program.push(Global::variable(decl(Type::Int, "g")));

        let mut params = Parameters::new();
        params.push(decl(Type::Int, "p"));

        let mut body = Block::new();
        body.push(Command::from(decl(Type::Float, "local")));
        let mut inner = Block::new();
        inner.push(Command::from(decl(Type::Bool, "nested")));
        body.push(Command::from(inner));
        body.push(Command::from(Attribution::new(
            ident("g"),
            Expression::literal(Literal::int(0, Lexeme::int(0, 1, 1))),
        )));

        program.push(Global::function(Function::new(
            ident("main"),
            Type::Int,
            params,
            body,
        )));

        let mut table = SymbolTable::new(0);
        table.bind_program(&program);

        assert_eq!(table.resolve_variable("g"), Some(Slot { base: 0, offset: 0 }));
        assert_eq!(table.resolve_variable("p"), Some(Slot { base: 0, offset: 4 }));
        assert_eq!(
            table.resolve_variable("local"),
            Some(Slot { base: 0, offset: 8 })
        );
        assert_eq!(
            table.resolve_variable("nested"),
            Some(Slot { base: 0, offset: 16 })
        );
    }
}
