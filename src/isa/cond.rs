//! Condition codes and condition masks.
//!
//! The same four-bit layout serves as the CPU's condition-code register
//! and as the predicate mask carried by every instruction. An instruction
//! executes when its mask shares at least one bit with the current codes.

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A set of condition bits: M (minus), Z (zero), P (positive), V (overflow).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CondFlag(u8);

impl CondFlag {
    pub const NEVER: CondFlag = CondFlag(0);
    pub const M: CondFlag = CondFlag(1);
    pub const Z: CondFlag = CondFlag(2);
    pub const P: CondFlag = CondFlag(4);
    pub const V: CondFlag = CondFlag(8);
    pub const ALWAYS: CondFlag = CondFlag(15);

    /// Single-bit flags in display order.
    const BITS: [(CondFlag, char); 4] = [
        (CondFlag::M, 'M'),
        (CondFlag::Z, 'Z'),
        (CondFlag::P, 'P'),
        (CondFlag::V, 'V'),
    ];

    /// Build from the low four bits of `bits`; higher bits are dropped.
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        CondFlag(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: CondFlag) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: CondFlag) -> bool {
        self.0 & other.0 != 0
    }

    /// Condition code describing the sign of an ALU result.
    pub const fn from_result(value: i32) -> Self {
        if value < 0 {
            CondFlag::M
        } else if value == 0 {
            CondFlag::Z
        } else {
            CondFlag::P
        }
    }

    /// Whether an instruction predicated on `self` runs under `codes`.
    ///
    /// Computes `(mM & M) | (mZ & Z) | (mP & P) | (mV & V)`.
    #[inline]
    pub const fn permits(self, codes: CondFlag) -> bool {
        self.intersects(codes)
    }

    fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("NEVER"),
            1 => Some("M"),
            2 => Some("Z"),
            4 => Some("P"),
            8 => Some("V"),
            15 => Some("ALWAYS"),
            _ => None,
        }
    }
}

impl BitOr for CondFlag {
    type Output = CondFlag;

    fn bitor(self, rhs: CondFlag) -> CondFlag {
        CondFlag(self.0 | rhs.0)
    }
}

impl BitAnd for CondFlag {
    type Output = CondFlag;

    fn bitand(self, rhs: CondFlag) -> CondFlag {
        CondFlag(self.0 & rhs.0)
    }
}

impl fmt::Display for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        for (flag, c) in Self::BITS {
            if self.contains(flag) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CondFlag({})", self)
    }
}

impl FromStr for CondFlag {
    type Err = CondParseError;

    /// Parse `ALWAYS`, `NEVER`, or any combination of `M`, `Z`, `P`, `V`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "ALWAYS" => return Ok(CondFlag::ALWAYS),
            "NEVER" => return Ok(CondFlag::NEVER),
            "" => return Err(CondParseError(s.to_string())),
            _ => {}
        }
        let mut flags = CondFlag::NEVER;
        for c in upper.chars() {
            let bit = Self::BITS
                .iter()
                .find(|(_, name)| *name == c)
                .map(|(flag, _)| *flag)
                .ok_or_else(|| CondParseError(s.to_string()))?;
            flags = flags | bit;
        }
        Ok(flags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition mask: {0}")]
pub struct CondParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_named() {
        assert_eq!(CondFlag::ALWAYS.to_string(), "ALWAYS");
        assert_eq!(CondFlag::NEVER.to_string(), "NEVER");
        assert_eq!(CondFlag::P.to_string(), "P");
    }

    #[test]
    fn test_display_combined() {
        assert_eq!((CondFlag::P | CondFlag::M).to_string(), "MP");
        assert_eq!((CondFlag::Z | CondFlag::P).to_string(), "ZP");
        assert_eq!((CondFlag::M | CondFlag::Z | CondFlag::V).to_string(), "MZV");
    }

    #[test]
    fn test_overlap() {
        let non_zero = CondFlag::P | CondFlag::M;
        assert!(CondFlag::P.permits(non_zero));
        assert!(!CondFlag::Z.permits(non_zero));
        assert!(!CondFlag::NEVER.permits(CondFlag::ALWAYS));
        assert!(CondFlag::ALWAYS.permits(CondFlag::V));
    }

    #[test]
    fn test_from_result() {
        assert_eq!(CondFlag::from_result(-7), CondFlag::M);
        assert_eq!(CondFlag::from_result(0), CondFlag::Z);
        assert_eq!(CondFlag::from_result(i32::MAX), CondFlag::P);
    }

    #[test]
    fn test_parse() {
        assert_eq!("ALWAYS".parse::<CondFlag>().unwrap(), CondFlag::ALWAYS);
        assert_eq!("zp".parse::<CondFlag>().unwrap(), CondFlag::Z | CondFlag::P);
        assert_eq!("MZPV".parse::<CondFlag>().unwrap(), CondFlag::ALWAYS);
        assert!("Q".parse::<CondFlag>().is_err());
        assert!("".parse::<CondFlag>().is_err());
    }
}
