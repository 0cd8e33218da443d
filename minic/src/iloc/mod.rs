//! ILOC intermediate representation
//!
//! Lowering emits ILOC, a linear three-address pseudo-assembly over
//! unbounded virtual registers and symbolic branch labels. A program is an
//! append-only instruction sequence; mapping virtual registers onto real
//! ones is the job of the register allocation stage that consumes this
//! output.

use std::fmt;

/// A virtual register or branch label identifier.
///
/// Registers and labels share one id space. An id acts as a label only
/// where it appears as the target operand of `label`, `cbr`, or `jumpI`.
pub type Reg = u64;

/// Hands out virtual register and label identifiers.
///
/// Ids are sequential from zero and never reused within one lowering
/// session. Each session owns its own allocator, so numbering is
/// deterministic for a given tree shape and traversal order.
#[derive(Debug, Clone, Default)]
pub struct RegAlloc {
    next: Reg,
}

impl RegAlloc {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns a fresh, never-before-issued identifier.
    pub fn next_id(&mut self) -> Reg {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// ILOC operation codes.
///
/// The meaning of the `r1, r2, r3` operand fields of [`Instruction`]
/// depends on the opcode; the doc comment on each variant gives the
/// printed form and its semantics (`cN` marks an operand holding an
/// immediate constant rather than a register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `nop` — does nothing
    Nop,

    // Arithmetic
    /// `add r1, r2 => r3` — r3 = r1 + r2
    Add,
    /// `sub r1, r2 => r3` — r3 = r1 - r2
    Sub,
    /// `mult r1, r2 => r3` — r3 = r1 * r2
    Mult,
    /// `div r1, r2 => r3` — r3 = r1 / r2
    Div,
    /// `addI r1, c2 => r3` — r3 = r1 + c2
    AddI,
    /// `subI r1, c2 => r3` — r3 = r1 - c2
    SubI,
    /// `rsubI r1, c2 => r3` — r3 = c2 - r1
    RsubI,
    /// `multI r1, c2 => r3` — r3 = r1 * c2
    MultI,
    /// `divI r1, c2 => r3` — r3 = r1 / c2
    DivI,
    /// `rdivI r1, c2 => r3` — r3 = c2 / r1
    RdivI,

    // Shift
    /// `lshift r1, r2 => r3` — r3 = r1 << r2
    Lshift,
    /// `lshiftI r1, c2 => r3` — r3 = r1 << c2
    LshiftI,
    /// `rshift r1, r2 => r3` — r3 = r1 >> r2
    Rshift,
    /// `rshiftI r1, c2 => r3` — r3 = r1 >> c2
    RshiftI,

    // Load
    /// `load r1 => r2` — r2 = Memory(r1)
    Load,
    /// `loadAI r1, c2 => r3` — r3 = Memory(r1 + c2)
    LoadAi,
    /// `loadA0 r1, r2 => r3` — r3 = Memory(r1 + r2)
    LoadA0,
    /// `cload r1 => r2` — byte-sized `load`
    CLoad,
    /// `cloadAI r1, c2 => r3` — byte-sized `loadAI`
    CLoadAi,
    /// `cloadA0 r1, r2 => r3` — byte-sized `loadA0`
    CLoadA0,
    /// `loadI c1 => r2` — r2 = c1
    LoadI,

    // Store
    /// `store r1 => r2` — Memory(r2) = r1
    Store,
    /// `storeAI r1 => r2, c3` — Memory(r2 + c3) = r1
    StoreAi,
    /// `storeAO r1 => r2, r3` — Memory(r2 + r3) = r1
    StoreAo,
    /// `cstore r1 => r2` — byte-sized `store`
    CStore,
    /// `cstoreAI r1 => r2, c3` — byte-sized `storeAI`
    CStoreAi,
    /// `cstoreAO r1 => r2, r3` — byte-sized `storeAO`
    CStoreAo,

    // Copy
    /// `i2i r1 => r2` — word-to-word copy
    I2i,
    /// `c2c r1 => r2` — byte-to-byte copy
    C2c,
    /// `c2i r1 => r2` — widen a byte into a word
    C2i,
    /// `i2c r1 => r2` — narrow a word into a byte
    I2c,

    // Comparison
    /// `cmp_LT r1, r2 -> r3` — r3 = 1 if r1 < r2, else 0
    CmpLt,
    /// `cmp_LE r1, r2 -> r3` — r3 = 1 if r1 <= r2, else 0
    CmpLe,
    /// `cmp_EQ r1, r2 -> r3` — r3 = 1 if r1 == r2, else 0
    CmpEq,
    /// `cmp_GE r1, r2 -> r3` — r3 = 1 if r1 >= r2, else 0
    CmpGe,
    /// `cmp_GT r1, r2 -> r3` — r3 = 1 if r1 > r2, else 0
    CmpGt,
    /// `cmp_NE r1, r2 -> r3` — r3 = 1 if r1 != r2, else 0
    CmpNe,
    /// `cbr r1 -> L2, L3` — PC = L2 if r1 is true, else PC = L3
    Cbr,

    // Jump
    /// `jumpI -> L1` — PC = L1
    JumpI,
    /// `jump -> r1` — PC = r1
    Jump,

    /// `L1:` — branch target marker, no executable effect
    Label,
}

/// One ILOC instruction: an opcode plus up to three 64-bit operands.
///
/// Immediate operands are stored as the two's-complement bit pattern of
/// their signed value and reinterpreted on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub r1: Reg,
    pub r2: Reg,
    pub r3: Reg,
}

impl Instruction {
    pub fn new(op: Opcode, r1: Reg, r2: Reg, r3: Reg) -> Self {
        Self { op, r1, r2, r3 }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { op, r1, r2, r3 } = *self;
        match op {
            Opcode::Nop => write!(f, "nop"),
            Opcode::Add => write!(f, "add r{r1}, r{r2} => r{r3}"),
            Opcode::Sub => write!(f, "sub r{r1}, r{r2} => r{r3}"),
            Opcode::Mult => write!(f, "mult r{r1}, r{r2} => r{r3}"),
            Opcode::Div => write!(f, "div r{r1}, r{r2} => r{r3}"),
            Opcode::AddI => write!(f, "addI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::SubI => write!(f, "subI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::RsubI => write!(f, "rsubI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::MultI => write!(f, "multI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::DivI => write!(f, "divI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::RdivI => write!(f, "rdivI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::Lshift => write!(f, "lshift r{r1}, r{r2} => r{r3}"),
            Opcode::LshiftI => write!(f, "lshiftI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::Rshift => write!(f, "rshift r{r1}, r{r2} => r{r3}"),
            Opcode::RshiftI => write!(f, "rshiftI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::Load => write!(f, "load r{r1} => r{r2}"),
            Opcode::LoadAi => write!(f, "loadAI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::LoadA0 => write!(f, "loadA0 r{r1}, r{r2} => r{r3}"),
            Opcode::CLoad => write!(f, "cload r{r1} => r{r2}"),
            Opcode::CLoadAi => write!(f, "cloadAI r{r1}, {} => r{r3}", r2 as i64),
            Opcode::CLoadA0 => write!(f, "cloadA0 r{r1}, r{r2} => r{r3}"),
            Opcode::LoadI => write!(f, "loadI {} => r{r2}", r1 as i64),
            Opcode::Store => write!(f, "store r{r1} => r{r2}"),
            Opcode::StoreAi => write!(f, "storeAI r{r1} => r{r2}, {}", r3 as i64),
            Opcode::StoreAo => write!(f, "storeAO r{r1} => r{r2}, r{r3}"),
            Opcode::CStore => write!(f, "cstore r{r1} => r{r2}"),
            Opcode::CStoreAi => write!(f, "cstoreAI r{r1} => r{r2}, {}", r3 as i64),
            Opcode::CStoreAo => write!(f, "cstoreAO r{r1} => r{r2}, r{r3}"),
            Opcode::I2i => write!(f, "i2i r{r1} => r{r2}"),
            Opcode::C2c => write!(f, "c2c r{r1} => r{r2}"),
            Opcode::C2i => write!(f, "c2i r{r1} => r{r2}"),
            Opcode::I2c => write!(f, "i2c r{r1} => r{r2}"),
            Opcode::CmpLt => write!(f, "cmp_LT r{r1}, r{r2} -> r{r3}"),
            Opcode::CmpLe => write!(f, "cmp_LE r{r1}, r{r2} -> r{r3}"),
            Opcode::CmpEq => write!(f, "cmp_EQ r{r1}, r{r2} -> r{r3}"),
            Opcode::CmpGe => write!(f, "cmp_GE r{r1}, r{r2} -> r{r3}"),
            Opcode::CmpGt => write!(f, "cmp_GT r{r1}, r{r2} -> r{r3}"),
            Opcode::CmpNe => write!(f, "cmp_NE r{r1}, r{r2} -> r{r3}"),
            Opcode::Cbr => write!(f, "cbr r{r1} -> L{r2}, L{r3}"),
            Opcode::JumpI => write!(f, "jumpI -> L{r1}"),
            Opcode::Jump => write!(f, "jump -> r{r1}"),
            Opcode::Label => write!(f, "L{r1}:"),
        }
    }
}

/// An append-only ILOC instruction sequence.
///
/// Every syntax tree node owns one buffer holding exactly the instructions
/// for its own subtree; parents splice children's buffers into their own
/// with [`IlocProgram::append`]. Instructions are never removed or
/// reordered once pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IlocProgram {
    instructions: Vec<Instruction>,
}

impl IlocProgram {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    /// Appends one instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Copies all of `src`'s instructions, in order, onto the end of
    /// `self`. `src` is left untouched.
    pub fn append(&mut self, src: &IlocProgram) {
        self.instructions.extend_from_slice(&src.instructions);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

impl fmt::Display for IlocProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
