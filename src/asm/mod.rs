//! Assembler and disassembler for Duck Machine programs.
//!
//! This module provides:
//! - A two-pass assembler (source text → object words)
//! - A disassembler (object words → readable text)
//! - The decimal object file format

pub mod assembler;
pub mod disasm;
pub mod object;

pub use assembler::{assemble, assemble_program, AssemblerError, Program};
pub use disasm::{disassemble, disassemble_word};
pub use object::{load_object, parse_object, save_object, write_object, ObjectError};
