//! Lowering tests
//!
//! Shape assertions check the emitted instruction sequences directly; the
//! control-flow properties (short-circuiting, branches, loops) run the
//! lowered fragments through a small ILOC interpreter and assert on what
//! actually executed.

use std::collections::{HashMap, HashSet};

use super::Lower;
use crate::ast::{
    Attribution, Block, BinOpKind, Command, Expression, If, Identifier, Literal, Type, UnOpKind,
    While,
};
use crate::error::CompileError;
use crate::iloc::{IlocProgram, Opcode, Reg};
use crate::lexeme::Lexeme;
use crate::sema::SymbolTable;

// ============================================
// Helpers
// ============================================

fn int_lit(value: i64) -> Expression {
    Expression::literal(Literal::int(value, Lexeme::int(value, 1, 1)))
}

fn float_lit(value: f64) -> Expression {
    Expression::literal(Literal::float(value, Lexeme::float(value, 1, 1)))
}

fn bool_lit(value: bool) -> Expression {
    Expression::literal(Literal::boolean(value, Lexeme::boolean(value, 1, 1)))
}

fn ident(name: &str) -> Identifier {
    Identifier::new(name, Lexeme::ident(name, 1, 1))
}

fn bin(op: BinOpKind, left: Expression, right: Expression) -> Expression {
    Expression::bin(op, left, right)
}

/// Lowers one expression in a fresh session with no declared symbols.
fn lower_expr(mut expr: Expression) -> (IlocProgram, Reg) {
    let symbols = SymbolTable::new(0);
    let mut cx = Lower::new(&symbols);
    let value = expr.lower(&mut cx).expect("lowering should succeed");
    (expr.code, value)
}

/// Index of the `loadI` carrying `immediate`, used to tag an operand's
/// fragment from the outside.
fn load_of(program: &IlocProgram, immediate: i64) -> usize {
    program
        .iter()
        .position(|i| i.op == Opcode::LoadI && i.r1 as i64 == immediate)
        .expect("tagged loadI should be in the buffer")
}

// ============================================
// ILOC interpreter
// ============================================

/// Executes a lowered fragment over the opcode subset lowering emits.
///
/// Memory is keyed by (base register id, offset): base registers stand for
/// segment addresses the later stages materialize, so their ids are stable
/// keys here.
struct Machine {
    regs: HashMap<Reg, i64>,
    memory: HashMap<(Reg, u64), i64>,
    executed: Vec<usize>,
}

impl Machine {
    fn run(program: &IlocProgram) -> Self {
        let instructions = program.instructions();
        let mut labels = HashMap::new();
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.op == Opcode::Label {
                labels.insert(instruction.r1, index);
            }
        }

        let mut machine = Self {
            regs: HashMap::new(),
            memory: HashMap::new(),
            executed: Vec::new(),
        };

        let mut pc = 0;
        let mut steps = 0;
        while pc < instructions.len() {
            steps += 1;
            assert!(steps < 10_000, "simulation did not terminate");
            machine.executed.push(pc);

            let inst = &instructions[pc];
            let target = |label: Reg| {
                *labels
                    .get(&label)
                    .unwrap_or_else(|| panic!("branch to unknown label L{label}"))
            };
            pc = match inst.op {
                Opcode::LoadI => {
                    machine.regs.insert(inst.r2, inst.r1 as i64);
                    pc + 1
                }
                Opcode::Add => {
                    let v = machine.reg(inst.r1) + machine.reg(inst.r2);
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::Sub => {
                    let v = machine.reg(inst.r1) - machine.reg(inst.r2);
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::Mult => {
                    let v = machine.reg(inst.r1) * machine.reg(inst.r2);
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::Div => {
                    let v = machine.reg(inst.r1) / machine.reg(inst.r2);
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::RsubI => {
                    let v = inst.r2 as i64 - machine.reg(inst.r1);
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::CmpLt => machine.compare(inst.r1, inst.r2, inst.r3, i64::lt, pc),
                Opcode::CmpLe => machine.compare(inst.r1, inst.r2, inst.r3, i64::le, pc),
                Opcode::CmpEq => machine.compare(inst.r1, inst.r2, inst.r3, i64::eq, pc),
                Opcode::CmpGe => machine.compare(inst.r1, inst.r2, inst.r3, i64::ge, pc),
                Opcode::CmpGt => machine.compare(inst.r1, inst.r2, inst.r3, i64::gt, pc),
                Opcode::CmpNe => machine.compare(inst.r1, inst.r2, inst.r3, i64::ne, pc),
                Opcode::LoadAi => {
                    let v = *machine
                        .memory
                        .get(&(inst.r1, inst.r2))
                        .unwrap_or_else(|| panic!("load from unwritten slot r{}+{}", inst.r1, inst.r2));
                    machine.regs.insert(inst.r3, v);
                    pc + 1
                }
                Opcode::StoreAi => {
                    let v = machine.reg(inst.r1);
                    machine.memory.insert((inst.r2, inst.r3), v);
                    pc + 1
                }
                Opcode::Cbr => {
                    if machine.reg(inst.r1) != 0 {
                        target(inst.r2)
                    } else {
                        target(inst.r3)
                    }
                }
                Opcode::JumpI => target(inst.r1),
                Opcode::Label => pc + 1,
                other => panic!("opcode {other:?} is not modeled by the test machine"),
            };
        }
        machine
    }

    fn reg(&self, r: Reg) -> i64 {
        *self
            .regs
            .get(&r)
            .unwrap_or_else(|| panic!("read of unwritten register r{r}"))
    }

    fn compare(&mut self, r1: Reg, r2: Reg, r3: Reg, op: fn(&i64, &i64) -> bool, pc: usize) -> usize {
        let v = op(&self.reg(r1), &self.reg(r2));
        self.regs.insert(r3, i64::from(v));
        pc + 1
    }

    fn ran(&self, index: usize) -> bool {
        self.executed.contains(&index)
    }
}

// ============================================
// Literals and registers
// ============================================

#[test]
fn literal_lowers_to_a_single_load_i() {
    let (code, value) = lower_expr(int_lit(42));
    assert_eq!(code.len(), 1);
    let inst = code.instructions()[0];
    assert_eq!(inst.op, Opcode::LoadI);
    assert_eq!(inst.r1 as i64, 42);
    assert_eq!(inst.r2, value);
}

#[test]
fn bool_literals_load_zero_and_one() {
    let (code, _) = lower_expr(bool_lit(false));
    assert_eq!(code.instructions()[0].r1, 0);
    let (code, _) = lower_expr(bool_lit(true));
    assert_eq!(code.instructions()[0].r1, 1);
}

#[test]
fn float_literal_truncates_to_an_integer_immediate() {
    let (code, _) = lower_expr(float_lit(2.75));
    assert_eq!(code.instructions()[0].r1 as i64, 2);
}

#[test]
fn negative_literal_prints_signed() {
    let (code, _) = lower_expr(int_lit(-7));
    assert_eq!(code.to_string(), "loadI -7 => r0\n");
}

#[test]
fn every_lowering_call_returns_a_distinct_register() {
    let symbols = SymbolTable::new(0);
    let mut cx = Lower::new(&symbols);

    let mut returned = Vec::new();
    let exprs = vec![
        int_lit(1),
        int_lit(2),
        bin(BinOpKind::Add, int_lit(3), int_lit(4)),
        bin(BinOpKind::Mul, int_lit(5), int_lit(6)),
        Expression::un(UnOpKind::Not, bool_lit(true)),
    ];
    for mut expr in exprs {
        returned.push(expr.lower(&mut cx).unwrap());
    }

    let unique: HashSet<Reg> = returned.iter().copied().collect();
    assert_eq!(unique.len(), returned.len());
}

#[test]
fn each_session_restarts_numbering() {
    let (first, value_a) = lower_expr(int_lit(5));
    let (second, value_b) = lower_expr(int_lit(5));
    assert_eq!(first, second);
    assert_eq!(value_a, value_b);
}

// ============================================
// Binary operators
// ============================================

#[test]
fn left_fragment_precedes_right_fragment_and_combiner() {
    let (code, value) = lower_expr(bin(
        BinOpKind::Add,
        bin(BinOpKind::Add, int_lit(1), int_lit(2)),
        bin(BinOpKind::Add, int_lit(3), int_lit(4)),
    ));

    let ops: Vec<Opcode> = code.iter().map(|i| i.op).collect();
    assert_eq!(
        ops,
        vec![
            Opcode::LoadI,
            Opcode::LoadI,
            Opcode::Add,
            Opcode::LoadI,
            Opcode::LoadI,
            Opcode::Add,
            Opcode::Add,
        ]
    );
    // Left operands 1 and 2 come strictly before right operands 3 and 4.
    assert!(load_of(&code, 2) < load_of(&code, 3));
    let last = code.instructions()[6];
    assert_eq!(last.r3, value);
}

#[test]
fn precedence_example_lowers_to_five_instructions() {
    let (code, value) = lower_expr(bin(
        BinOpKind::Add,
        int_lit(3),
        bin(BinOpKind::Mul, int_lit(4), int_lit(2)),
    ));

    let lines: Vec<String> = code.iter().map(|i| i.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "loadI 3 => r0",
            "loadI 4 => r1",
            "loadI 2 => r2",
            "mult r1, r2 => r3",
            "add r0, r3 => r4",
        ]
    );
    assert_eq!(value, 4);
}

#[test]
fn comparison_emits_one_cmp() {
    let (code, value) = lower_expr(bin(BinOpKind::Le, int_lit(1), int_lit(2)));
    let inst = code.instructions()[2];
    assert_eq!(inst.op, Opcode::CmpLe);
    assert_eq!(inst.r3, value);

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);
}

#[test]
fn modulo_synthesizes_div_mult_sub() {
    let (code, value) = lower_expr(bin(BinOpKind::Mod, int_lit(7), int_lit(3)));

    let insts = code.instructions();
    assert_eq!(insts.len(), 5);
    let left = insts[0].r2;
    let right = insts[1].r2;
    let (div, mult, sub) = (insts[2], insts[3], insts[4]);

    // v = l / r; t = v * r; v = l - t
    assert_eq!(div.op, Opcode::Div);
    assert_eq!((div.r1, div.r2, div.r3), (left, right, value));
    assert_eq!(mult.op, Opcode::Mult);
    assert_eq!((mult.r1, mult.r2), (value, right));
    assert_eq!(sub.op, Opcode::Sub);
    assert_eq!((sub.r1, sub.r2, sub.r3), (left, mult.r3, value));

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);
}

// ============================================
// Short-circuit operators
// ============================================

#[test]
fn and_short_circuits_a_false_left_operand() {
    let (code, value) = lower_expr(bin(BinOpKind::And, bool_lit(false), int_lit(99)));

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 0);
    // The tagged right operand is present in the buffer but stays off the
    // taken path.
    let tagged = load_of(&code, 99);
    assert!(!machine.ran(tagged));
}

#[test]
fn and_with_true_left_evaluates_the_right_operand() {
    let (code, value) = lower_expr(bin(BinOpKind::And, bool_lit(true), bool_lit(false)));

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 0);

    let (code, value) = lower_expr(bin(BinOpKind::And, bool_lit(true), bool_lit(true)));
    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);
}

#[test]
fn or_short_circuits_a_true_left_operand() {
    let (code, value) = lower_expr(bin(BinOpKind::Or, bool_lit(true), int_lit(99)));

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);
    let tagged = load_of(&code, 99);
    assert!(!machine.ran(tagged));
}

#[test]
fn or_with_false_left_evaluates_the_right_operand() {
    let (code, value) = lower_expr(bin(BinOpKind::Or, bool_lit(false), bool_lit(true)));
    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);

    let (code, value) = lower_expr(bin(BinOpKind::Or, bool_lit(false), bool_lit(false)));
    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 0);
}

#[test]
fn right_fragment_sits_behind_the_check_right_label() {
    let (code, _) = lower_expr(bin(BinOpKind::And, bool_lit(true), int_lit(99)));

    let tagged = load_of(&code, 99);
    let fence = code
        .iter()
        .position(|i| i.op == Opcode::Label)
        .expect("the check_right label should exist");
    assert!(fence < tagged);
}

// ============================================
// Unary operators
// ============================================

#[test]
fn negation_lowers_to_rsub_i() {
    let (code, value) = lower_expr(Expression::un(UnOpKind::Neg, int_lit(5)));

    let inst = code.instructions()[1];
    assert_eq!(inst.op, Opcode::RsubI);
    assert_eq!(inst.r2, 0);
    assert_eq!(inst.r3, value);

    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), -5);
}

#[test]
fn logical_not_inverts_both_truth_values() {
    let (code, value) = lower_expr(Expression::un(UnOpKind::Not, bool_lit(true)));
    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 0);

    let (code, value) = lower_expr(Expression::un(UnOpKind::Not, bool_lit(false)));
    let machine = Machine::run(&code);
    assert_eq!(machine.reg(value), 1);
}

// ============================================
// Identifiers and assignment
// ============================================

#[test]
fn identifier_loads_from_its_resolved_slot() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("x", Type::Int);

    let mut expr = Expression::ident(ident("x"));
    let mut cx = Lower::new(&symbols);
    let value = expr.lower(&mut cx).unwrap();

    assert_eq!(expr.code.to_string(), format!("loadAI r100, 0 => r{value}\n"));
}

#[test]
fn undeclared_identifier_is_fatal() {
    let symbols = SymbolTable::new(0);
    let mut expr = Expression::ident(Identifier::new("y", Lexeme::ident("y", 3, 7)));
    let mut cx = Lower::new(&symbols);

    let err = expr.lower(&mut cx).unwrap_err();
    match &err {
        CompileError::Undeclared { name, line, column } => {
            assert_eq!(name, "y");
            assert_eq!((*line, *column), (3, 7));
        }
        other => panic!("expected an undeclared-variable error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), crate::error::EXIT_UNDECLARED);
}

#[test]
fn attribution_stores_the_value_into_the_target_slot() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("x", Type::Int);

    let mut attribution = Attribution::new(ident("x"), int_lit(3));
    let mut cx = Lower::new(&symbols);
    attribution.lower(&mut cx).unwrap();

    assert_eq!(
        attribution.code.to_string(),
        "loadI 3 => r0\nstoreAI r0 => r100, 0\n"
    );
}

#[test]
fn attribution_to_an_undeclared_target_is_fatal() {
    let symbols = SymbolTable::new(0);
    let mut attribution = Attribution::new(ident("ghost"), int_lit(3));
    let mut cx = Lower::new(&symbols);
    assert!(attribution.lower(&mut cx).is_err());
}

// ============================================
// Control flow
// ============================================

fn assign(name: &str, value: Expression) -> Command {
    Command::from(Attribution::new(ident(name), value))
}

#[test]
fn if_else_executes_exactly_one_branch() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("x", Type::Int);

    let mut then_block = Block::new();
    then_block.push(assign("x", int_lit(1)));
    let mut else_block = Block::new();
    else_block.push(assign("x", int_lit(2)));

    let mut command = Command::from(If::new(bool_lit(true), then_block, Some(else_block)));
    let mut cx = Lower::new(&symbols);
    command.lower(&mut cx).unwrap();

    let ops: Vec<Opcode> = command.code.iter().map(|i| i.op).collect();
    assert_eq!(
        ops,
        vec![
            Opcode::LoadI,
            Opcode::Cbr,
            Opcode::Label,
            Opcode::LoadI,
            Opcode::StoreAi,
            Opcode::JumpI,
            Opcode::Label,
            Opcode::LoadI,
            Opcode::StoreAi,
            Opcode::Label,
        ]
    );

    let machine = Machine::run(&command.code);
    assert_eq!(machine.memory[&(100, 0)], 1);
    let else_load = load_of(&command.code, 2);
    assert!(!machine.ran(else_load));
}

#[test]
fn if_without_else_falls_through_when_false() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("x", Type::Int);

    let mut then_block = Block::new();
    then_block.push(assign("x", int_lit(1)));

    let mut command = Command::from(If::new(bool_lit(false), then_block, None));
    let mut cx = Lower::new(&symbols);
    command.lower(&mut cx).unwrap();

    let machine = Machine::run(&command.code);
    assert!(!machine.memory.contains_key(&(100, 0)));
}

#[test]
fn while_loop_runs_until_the_condition_fails() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("i", Type::Int);

    let mut body = Block::new();
    body.push(assign(
        "i",
        bin(BinOpKind::Add, Expression::ident(ident("i")), int_lit(1)),
    ));
    let repeat = While::new(
        bin(BinOpKind::Lt, Expression::ident(ident("i")), int_lit(3)),
        body,
    );

    let mut block = Block::new();
    block.push(assign("i", int_lit(0)));
    block.push(Command::from(repeat));

    let mut cx = Lower::new(&symbols);
    block.lower(&mut cx).unwrap();

    let machine = Machine::run(&block.code);
    assert_eq!(machine.memory[&(100, 0)], 3);

    // The loop-back edge runs once per iteration.
    let add_index = block
        .code
        .iter()
        .position(|i| i.op == Opcode::Add)
        .unwrap();
    let iterations = machine.executed.iter().filter(|&&i| i == add_index).count();
    assert_eq!(iterations, 3);
}

#[test]
fn block_is_pure_concatenation_of_its_commands() {
    let mut symbols = SymbolTable::new(100);
    symbols.declare("a", Type::Int);
    symbols.declare("b", Type::Int);

    let mut block = Block::new();
    block.push(assign("a", int_lit(1)));
    block.push(assign("b", int_lit(2)));

    let mut cx = Lower::new(&symbols);
    block.lower(&mut cx).unwrap();

    let mut expected = IlocProgram::new();
    for command in &block.commands {
        expected.append(&command.code);
    }
    assert_eq!(block.code, expected);
}
