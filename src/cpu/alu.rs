//! Arithmetic logic unit.
//!
//! The ALU applies one operation to a register value and the second
//! operand `rB + disp` and reports a condition code for the result. It
//! holds no state; the CPU decides whether the result and condition code
//! are kept.

use crate::isa::{CondFlag, OpCode};

/// Result of one ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    /// The computed value, or `None` if the operation failed
    /// (division by zero or 32-bit overflow).
    pub value: Option<i32>,
    /// Exactly one of M/Z/P for a value, V for a failure.
    pub cond: CondFlag,
}

impl AluResult {
    /// Narrow an exact result to 32 bits; anything that does not fit is V.
    fn from_exact(value: Option<i64>) -> Self {
        match value.and_then(|v| i32::try_from(v).ok()) {
            Some(v) => Self { value: Some(v), cond: CondFlag::from_result(v) },
            None => Self { value: None, cond: CondFlag::V },
        }
    }
}

/// The second operand, `rB + disp`, computed without wrapping.
///
/// It can lie just outside the 32-bit range; the ALU narrows only the
/// final result.
#[inline]
pub fn operand2(base: i32, disp: i16) -> i64 {
    i64::from(base) + i64::from(disp)
}

/// Apply `op` to `lhs` and `rhs`.
///
/// Arithmetic is exact and the result must fit in 32 bits. For LOAD and
/// STORE the ALU computes the effective address, wrapping on overflow so
/// that the memory bounds check reports the address. HALT produces zero.
pub fn exec(op: OpCode, lhs: i32, rhs: i64) -> AluResult {
    let lhs = i64::from(lhs);
    match op {
        OpCode::Add => AluResult::from_exact(lhs.checked_add(rhs)),
        OpCode::Sub => AluResult::from_exact(lhs.checked_sub(rhs)),
        OpCode::Mul => AluResult::from_exact(lhs.checked_mul(rhs)),
        // i64 division truncates toward zero; a zero divisor fails and
        // i32::MIN / -1 fails to narrow.
        OpCode::Div => AluResult::from_exact(lhs.checked_div(rhs)),
        OpCode::Load | OpCode::Store => {
            AluResult::from_exact(Some(i64::from(effective_address(lhs as i32, rhs as i32))))
        }
        OpCode::Halt => AluResult::from_exact(Some(0)),
    }
}

/// Address arithmetic for LOAD and STORE: `base + offset`, wrapping.
#[inline]
pub const fn effective_address(base: i32, offset: i32) -> i32 {
    base.wrapping_add(offset)
}
