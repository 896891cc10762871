//! CPU emulation for the Duck Machine.
//!
//! This module implements the DM2022 machine:
//! - a flat memory of 32-bit words, with memory-mapped I/O ports
//! - 16 registers: r0 (always zero), r1-r14, r15 (program counter)
//! - condition codes M, Z, P, V and predicated execution

pub mod alu;
pub mod memory;
pub mod registers;
pub mod execute;

pub use memory::{InputPort, Memory, MemoryError, OutputPort};
pub use registers::Registers;
pub use execute::{Cpu, CpuError, CpuEvent, CpuObserver, CpuState, RunSummary, Snapshot};
