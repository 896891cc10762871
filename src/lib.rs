//! # Duck Machine
//!
//! A simulator for the Duck Machine (DM2022), a small 32-bit instructional
//! computer in the tradition of the Berkeley CCC and the DEC PDP-11.
//!
//! The Duck Machine has 16 registers, a flat word-addressed memory shared
//! by code and data, and a single instruction format in which every
//! instruction is predicated on the condition codes set by the last
//! arithmetic result. Branches are ordinary arithmetic on r15, the
//! program counter.
//!
//! - [`isa`] - instruction word layout, encoding and decoding
//! - [`cpu`] - registers, memory with mapped I/O, and the execution engine
//! - [`asm`] - assembler, disassembler and object file format
//! - [`config`] - machine configuration

pub mod config;
pub mod isa;
pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use config::{ConfigError, MachineConfig};
pub use isa::{decode, encode, CondFlag, Instruction, OpCode, Word};
pub use cpu::{Cpu, CpuError, CpuEvent, CpuState, Memory, Registers, RunSummary};
pub use asm::{assemble, disassemble, load_object, save_object, AssemblerError, ObjectError};
