//! Instruction word layout for the Duck Machine (DM2022).
//!
//! Instruction words are unsigned 32-bit integers, laid out from the
//! high-order bit down:
//!
//! ```text
//!  31  30..26  25..22  21..18  17..14  13..10   9..0
//! +---+-------+-------+-------+-------+-------+--------+
//! | - |  op   | cond  |  rT   |  rA   |  rB   |  disp  |
//! +---+-------+-------+-------+-------+-------+--------+
//! ```
//!
//! Bit 31 is reserved. `disp` is a 10-bit two's complement value in
//! `-512..=511`; every other field is unsigned.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::isa::bitfield::{BitField, FieldRangeError};
use crate::isa::cond::CondFlag;

/// A raw 32-bit memory word.
pub type Word = u32;

pub const RESERVED_FIELD: BitField = BitField::from_bits(31, 31);
pub const OPCODE_FIELD: BitField = BitField::from_bits(26, 30);
pub const COND_FIELD: BitField = BitField::from_bits(22, 25);
pub const TARGET_FIELD: BitField = BitField::from_bits(18, 21);
pub const SRC1_FIELD: BitField = BitField::from_bits(14, 17);
pub const SRC2_FIELD: BitField = BitField::from_bits(10, 13);
pub const DISP_FIELD: BitField = BitField::from_bits(0, 9);

/// Register index of the hard-wired zero register.
pub const REG_ZERO: u8 = 0;
/// Register index of the program counter.
pub const REG_PC: u8 = 15;
/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 16;

/// Operation codes understood by the CPU.
///
/// HALT, LOAD and STORE drive the CPU beyond the ALU; the rest are
/// pure ALU operations. Code 4 and codes 8-31 are unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    /// Stop the machine.
    Halt = 0,
    /// rT := mem[rA + rB + disp]
    Load = 1,
    /// mem[rA + rB + disp] := rT
    Store = 2,
    /// rT := rA + (rB + disp)
    Add = 3,
    /// rT := rA - (rB + disp)
    Sub = 5,
    /// rT := rA * (rB + disp)
    Mul = 6,
    /// rT := rA / (rB + disp), truncating toward zero
    Div = 7,
}

impl OpCode {
    pub const ALL: [OpCode; 7] = [
        OpCode::Halt,
        OpCode::Load,
        OpCode::Store,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
    ];

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Halt => "HALT",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
        }
    }

    /// Look up an opcode by mnemonic, ignoring case.
    pub fn from_mnemonic(name: &str) -> Option<OpCode> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|op| *op as u8 == value)
            .ok_or(value)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction word.
///
/// The opcode is kept raw so that decoding is total: an unassigned
/// opcode only becomes an error when the CPU tries to execute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub cond: CondFlag,
    pub target: u8,
    pub src1: u8,
    pub src2: u8,
    pub disp: i16,
}

impl Instruction {
    /// Assemble an instruction from typed fields.
    pub fn new(op: OpCode, cond: CondFlag, target: u8, src1: u8, src2: u8, disp: i16) -> Self {
        Self {
            opcode: op as u8,
            cond,
            target,
            src1,
            src2,
            disp,
        }
    }

    /// The operation, or the raw code if it is unassigned.
    #[inline]
    pub fn op(&self) -> Result<OpCode, u8> {
        OpCode::try_from(self.opcode)
    }

    /// Pack into a 32-bit word, checking every field's range.
    pub fn encode(&self) -> Result<Word, EncodeError> {
        encode(
            self.opcode as u32,
            self.cond.bits() as u32,
            self.target as u32,
            self.src1 as u32,
            self.src2 as u32,
            self.disp as i32,
        )
    }
}

impl fmt::Display for Instruction {
    /// Assembly-like form, e.g. `MUL/ZP   r1,r3,r15[42]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Ok(op) => write!(f, "{}", op)?,
            Err(code) => write!(f, "OP#{}", code)?,
        }
        if self.cond != CondFlag::ALWAYS {
            write!(f, "/{}", self.cond)?;
        }
        write!(
            f,
            "   r{},r{},r{}[{}]",
            self.target, self.src1, self.src2, self.disp
        )
    }
}

/// Which instruction field rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Opcode,
    Cond,
    Target,
    Src1,
    Src2,
    Disp,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Opcode => "opcode",
            Field::Cond => "condition mask",
            Field::Target => "target register",
            Field::Src1 => "source register 1",
            Field::Src2 => "source register 2",
            Field::Disp => "displacement",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while packing an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} {source}")]
pub struct EncodeError {
    pub field: Field,
    pub source: FieldRangeError,
}

/// Pack instruction fields into a word.
///
/// Fails if a register index needs more than 4 bits, the opcode more
/// than 5, the mask more than 4, or `disp` is outside `-512..=511`.
pub fn encode(
    opcode: u32,
    cond: u32,
    target: u32,
    src1: u32,
    src2: u32,
    disp: i32,
) -> Result<Word, EncodeError> {
    let tag = |field: Field| move |source: FieldRangeError| EncodeError { field, source };

    let mut word: Word = 0;
    word = OPCODE_FIELD.insert(opcode, word).map_err(tag(Field::Opcode))?;
    word = COND_FIELD.insert(cond, word).map_err(tag(Field::Cond))?;
    word = TARGET_FIELD.insert(target, word).map_err(tag(Field::Target))?;
    word = SRC1_FIELD.insert(src1, word).map_err(tag(Field::Src1))?;
    word = SRC2_FIELD.insert(src2, word).map_err(tag(Field::Src2))?;
    word = DISP_FIELD.insert_signed(disp, word).map_err(tag(Field::Disp))?;
    Ok(word)
}

/// Unpack a word into its fields.
///
/// Every bit pattern decodes; the reserved bit is ignored.
pub fn decode(word: Word) -> Instruction {
    Instruction {
        opcode: OPCODE_FIELD.extract(word) as u8,
        cond: CondFlag::from_bits_truncate(COND_FIELD.extract(word) as u8),
        target: TARGET_FIELD.extract(word) as u8,
        src1: SRC1_FIELD.extract(word) as u8,
        src2: SRC2_FIELD.extract(word) as u8,
        disp: DISP_FIELD.extract_signed(word) as i16,
    }
}

/// Resolve a register name: `r0`..`r15`, `zero`, or `pc`.
pub fn parse_register(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "zero" => return Some(REG_ZERO),
        "pc" => return Some(REG_PC),
        _ => {}
    }
    let digits = lower.strip_prefix('r')?;
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    let index: u8 = digits.parse().ok()?;
    (usize::from(index) < NUM_REGISTERS).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_layout_is_disjoint() {
        let fields = [
            RESERVED_FIELD,
            OPCODE_FIELD,
            COND_FIELD,
            TARGET_FIELD,
            SRC1_FIELD,
            SRC2_FIELD,
            DISP_FIELD,
        ];
        let mut seen = 0u32;
        for field in fields {
            assert_eq!(seen & field.mask(), 0, "overlap at {:?}", field);
            seen |= field.mask();
        }
        assert_eq!(seen, u32::MAX);
    }

    #[test]
    fn test_encode_decode_add() {
        let word = encode(OpCode::Add as u32, 0b1111, 1, 1, 2, 0).unwrap();
        let instr = decode(word);
        assert_eq!(instr.op(), Ok(OpCode::Add));
        assert_eq!(instr.cond, CondFlag::ALWAYS);
        assert_eq!(instr.target, 1);
        assert_eq!(instr.src1, 1);
        assert_eq!(instr.src2, 2);
        assert_eq!(instr.disp, 0);
    }

    #[test]
    fn test_encode_field_positions() {
        let word = encode(OpCode::Sub as u32, 0b0011, 2, 1, 3, -12).unwrap();
        assert_eq!(word >> 26, 5);
        assert_eq!((word >> 22) & 0xF, 0b0011);
        assert_eq!((word >> 18) & 0xF, 2);
        assert_eq!((word >> 14) & 0xF, 1);
        assert_eq!((word >> 10) & 0xF, 3);
        assert_eq!(word & 0x3FF, (-12i32 as u32) & 0x3FF);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert_eq!(encode(32, 0, 0, 0, 0, 0).unwrap_err().field, Field::Opcode);
        assert_eq!(encode(0, 16, 0, 0, 0, 0).unwrap_err().field, Field::Cond);
        assert_eq!(encode(0, 0, 16, 0, 0, 0).unwrap_err().field, Field::Target);
        assert_eq!(encode(0, 0, 0, 16, 0, 0).unwrap_err().field, Field::Src1);
        assert_eq!(encode(0, 0, 0, 0, 16, 0).unwrap_err().field, Field::Src2);
        assert_eq!(encode(0, 0, 0, 0, 0, 512).unwrap_err().field, Field::Disp);
        assert_eq!(encode(0, 0, 0, 0, 0, -513).unwrap_err().field, Field::Disp);
    }

    #[test]
    fn test_decode_is_total() {
        let instr = decode(u32::MAX);
        assert_eq!(instr.opcode, 31);
        assert!(instr.op().is_err());
        assert_eq!(instr.disp, -1);

        let unassigned = encode(4, 15, 0, 0, 0, 0).unwrap();
        assert_eq!(decode(unassigned).op(), Err(4));
    }

    #[test]
    fn test_reserved_bit_ignored() {
        let word = encode(OpCode::Mul as u32, 15, 3, 4, 5, 6).unwrap();
        assert_eq!(decode(word | 0x8000_0000), decode(word));
    }

    #[test]
    fn test_display_predicated() {
        let instr = Instruction::new(OpCode::Mul, CondFlag::P | CondFlag::Z, 1, 3, REG_PC, 42);
        assert_eq!(instr.to_string(), "MUL/ZP   r1,r3,r15[42]");
    }

    #[test]
    fn test_display_always() {
        let instr = Instruction::new(OpCode::Add, CondFlag::ALWAYS, REG_ZERO, REG_PC, REG_PC, 0);
        assert_eq!(instr.to_string(), "ADD   r0,r15,r15[0]");
    }

    #[test]
    fn test_display_unknown_opcode() {
        assert_eq!(decode(encode(9, 15, 0, 0, 0, 0).unwrap()).to_string(), "OP#9   r0,r0,r0[0]");
    }

    #[test]
    fn test_instruction_roundtrip_text() {
        let instr = Instruction::new(OpCode::Sub, CondFlag::M | CondFlag::Z, 2, 1, 3, -12);
        let word = instr.encode().unwrap();
        assert_eq!(decode(word).to_string(), instr.to_string());
    }

    #[test]
    fn test_opcode_lookup() {
        assert_eq!(OpCode::try_from(7), Ok(OpCode::Div));
        assert_eq!(OpCode::try_from(4), Err(4));
        assert_eq!(OpCode::from_mnemonic("store"), Some(OpCode::Store));
        assert_eq!(OpCode::from_mnemonic("JUMP"), None);
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("r0"), Some(0));
        assert_eq!(parse_register("R15"), Some(15));
        assert_eq!(parse_register("pc"), Some(REG_PC));
        assert_eq!(parse_register("zero"), Some(REG_ZERO));
        assert_eq!(parse_register("r16"), None);
        assert_eq!(parse_register("r01"), None);
        assert_eq!(parse_register("reg1"), None);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            opcode in 0u8..32,
            cond in 0u8..16,
            target in 0u8..16,
            src1 in 0u8..16,
            src2 in 0u8..16,
            disp in -512i16..=511,
        ) {
            let instr = Instruction {
                opcode,
                cond: CondFlag::from_bits_truncate(cond),
                target,
                src1,
                src2,
                disp,
            };
            let word = instr.encode().unwrap();
            prop_assert_eq!(decode(word), instr);
            prop_assert_eq!(word >> 31, 0);
        }
    }
}
