//! The Duck Machine instruction set.
//!
//! This module provides the binary encoding layer:
//! - [`BitField`] - extract/insert fixed-position fields in a 32-bit word
//! - [`CondFlag`] - condition codes and instruction predicate masks
//! - [`Instruction`] - the decoded form of an instruction word

pub mod bitfield;
pub mod cond;
pub mod format;

pub use bitfield::{BitField, FieldRangeError};
pub use cond::{CondFlag, CondParseError};
pub use format::{
    decode, encode, parse_register, EncodeError, Field, Instruction, OpCode, Word,
    NUM_REGISTERS, REG_PC, REG_ZERO,
};
