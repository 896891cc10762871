//! Duck Machine CPU registers.
//!
//! The register file has 16 general-purpose 32-bit registers:
//! - r0 always reads as zero; writes to it are discarded
//! - r15 is the program counter
//!
//! Alongside the registers sits the condition-code register, which
//! records the sign (or failure) of the last ALU result.

use serde::{Serialize, Deserialize};

use crate::isa::{CondFlag, NUM_REGISTERS, REG_PC, REG_ZERO};

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    regs: [i32; NUM_REGISTERS],

    /// Condition codes from the last ALU operation.
    pub cond: CondFlag,
}

impl Registers {
    /// Create a register file with every register zeroed and the
    /// condition code set to Z.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
            cond: CondFlag::Z,
        }
    }

    /// Reset all registers to zero and the condition code to Z.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a register. Register 0 always reads as zero.
    ///
    /// Only the low four bits of `index` are used.
    #[inline]
    pub fn read(&self, index: u8) -> i32 {
        match index & 0xF {
            REG_ZERO => 0,
            i => self.regs[usize::from(i)],
        }
    }

    /// Write a register. Writes to register 0 are discarded.
    ///
    /// Returns true if the write redirected control flow (target r15).
    #[inline]
    pub fn write(&mut self, index: u8, value: i32) -> bool {
        match index & 0xF {
            REG_ZERO => false,
            i => {
                self.regs[usize::from(i)] = value;
                i == REG_PC
            }
        }
    }

    /// The program counter (r15).
    #[inline]
    pub fn pc(&self) -> i32 {
        self.regs[usize::from(REG_PC)]
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: i32) {
        self.regs[usize::from(REG_PC)] = addr;
    }

    /// Increment the program counter by one word.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> i32 {
        let old = self.pc();
        self.jump(old.wrapping_add(1));
        old
    }

    /// Snapshot of all 16 registers as architecturally visible.
    pub fn to_array(&self) -> [i32; NUM_REGISTERS] {
        let mut out = self.regs;
        out[usize::from(REG_ZERO)] = 0;
        out
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
