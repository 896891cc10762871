//! Disassembler for Duck Machine programs.
//!
//! Converts object words back to readable assembly.

use crate::isa::format::RESERVED_FIELD;
use crate::isa::{decode, Word};

/// Disassemble a single word to text the assembler accepts.
///
/// Words that are not instructions (an unassigned opcode, or the
/// reserved bit set) print as `DATA <signed value>`.
pub fn disassemble_word(word: Word) -> String {
    let instr = decode(word);
    if instr.op().is_err() || RESERVED_FIELD.extract(word) != 0 {
        return format!("DATA {}", word as i32);
    }
    instr.to_string()
}

/// Disassemble a program into a listing with addresses and raw words.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; Duck Machine Disassembly\n");
    output.push_str("; ------------------------\n\n");

    for (addr, word) in words.iter().enumerate() {
        let line = disassemble_word(*word);
        output.push_str(&format!("{:03}: {:<24}; {}\n", addr, line, *word as i32));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::isa::{CondFlag, Instruction, OpCode};

    #[test]
    fn test_disassemble_halt() {
        let word = Instruction::new(OpCode::Halt, CondFlag::ALWAYS, 0, 0, 0, 0).encode().unwrap();
        assert_eq!(disassemble_word(word), "HALT   r0,r0,r0[0]");
        assert_eq!(disassemble_word(0), "HALT/NEVER   r0,r0,r0[0]");
    }

    #[test]
    fn test_disassemble_predicated() {
        let word = Instruction::new(OpCode::Mul, CondFlag::Z | CondFlag::P, 1, 3, 15, 42)
            .encode()
            .unwrap();
        assert_eq!(disassemble_word(word), "MUL/ZP   r1,r3,r15[42]");
    }

    #[test]
    fn test_non_instructions_are_data() {
        let word: Word = 4 << 26 | 15 << 22;
        assert!(decode(word).to_string().starts_with("OP#4"));
        assert_eq!(disassemble_word(word), format!("DATA {}", word));

        assert_eq!(disassemble_word(u32::MAX), "DATA -1");

        // Reserved bit set on an otherwise valid ADD.
        let add = Instruction::new(OpCode::Add, CondFlag::ALWAYS, 1, 0, 0, 1).encode().unwrap();
        assert_eq!(disassemble_word(add | 1 << 31), format!("DATA {}", (add | 1 << 31) as i32));
    }

    #[test]
    fn test_listing_reassembles() {
        let source = r#"
                LOAD    r1,r0,r0[510]
                SUB/P   r1,r1,r0[-1]
                ADD/M   r15,r0,r15[-2]
                HALT    r0,r0,r0
        minus:  DATA    -1
        odd:    DATA    0x10000000
        high:   DATA    0x80000000
        small:  DATA    5
        "#;
        let words = assemble(source).unwrap();

        let listing = disassemble(&words);
        let text: String = listing
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(_, rest)| format!("{}\n", rest))
            .collect();

        assert_eq!(assemble(&text).unwrap(), words);
        assert!(listing.contains("001: SUB/P   r1,r1,r0[-1]"));
        assert!(listing.contains("004: DATA -1"));
        assert!(listing.contains("005: DATA 268435456"));
        assert!(listing.contains("006: DATA -2147483648"));
    }
}
