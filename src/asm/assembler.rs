//! Two-pass assembler for Duck Machine programs.
//!
//! Syntax:
//! ```text
//! # Comment (';' also starts a comment)
//! again:  LOAD    r1,x            ; Memory operand: r1,r0,r15[x - here]
//!         SUB/P   r1,r1,r0[1]     ; Predicated, fully specified
//!         JUMP/P  again           ; ADD r15,r0,r15[again - here]
//!         STORE   r1,r0,r0[511]   ; Write to the output port
//!         HALT
//! x:      DATA    10              ; A data word, not an instruction
//! ```
//!
//! Every instruction and DATA line occupies one word. Labels resolve to
//! PC-relative displacements, so they must lie within -512..=511 words
//! of the instruction that uses them.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::isa::{encode, parse_register, CondFlag, EncodeError, OpCode, Word, REG_PC, REG_ZERO};

/// An assembled program and its symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Object code, one word per instruction or DATA line.
    pub words: Vec<Word>,
    /// Label addresses.
    pub symbols: BTreeMap<String, i32>,
}

/// Assemble source code to a list of words.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    assemble_program(source).map(|program| program.words)
}

/// Assemble source code, keeping the symbol table.
pub fn assemble_program(source: &str) -> Result<Program, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One parsed source statement.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement {
    /// `OP[/COND] rT,rA,rB[disp]`
    Full {
        op: OpCode,
        cond: CondFlag,
        target: u8,
        src1: u8,
        src2: u8,
        disp: i32,
    },
    /// `OP[/COND] rT,label`
    MemRef {
        op: OpCode,
        cond: CondFlag,
        target: u8,
        label: String,
    },
    /// `JUMP[/COND] label`
    Jump { cond: CondFlag, label: String },
    /// `DATA value`
    Data(Word),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, i32>,
    /// Statements with their address and source line.
    statements: Vec<(i32, Statement, usize)>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            statements: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        // Pass 1: parse, assign addresses, collect labels
        let mut address: i32 = 0;
        for (line_num, line) in source.lines().enumerate() {
            let line_num = line_num + 1;
            let (label, statement) = parse_line(line, line_num)?;

            if let Some(label) = label {
                if self.symbols.insert(label.clone(), address).is_some() {
                    return Err(AssemblerError::DuplicateLabel { line: line_num, label });
                }
            }
            if let Some(statement) = statement {
                self.statements.push((address, statement, line_num));
                address += 1;
            }
        }

        // Pass 2: resolve labels and encode
        let words = self
            .statements
            .iter()
            .map(|(addr, statement, line_num)| self.emit(*addr, statement, *line_num))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Program {
            words,
            symbols: self.symbols.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        })
    }

    fn resolve(&self, label: &str, here: i32, line_num: usize) -> Result<i32, AssemblerError> {
        self.symbols
            .get(label)
            .map(|addr| addr - here)
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line: line_num,
                label: label.to_string(),
            })
    }

    fn emit(&self, here: i32, statement: &Statement, line_num: usize) -> Result<Word, AssemblerError> {
        let (op, cond, target, src1, src2, disp) = match statement {
            Statement::Data(word) => return Ok(*word),
            Statement::Full { op, cond, target, src1, src2, disp } => {
                (*op, *cond, *target, *src1, *src2, *disp)
            }
            Statement::MemRef { op, cond, target, label } => {
                let disp = self.resolve(label, here, line_num)?;
                (*op, *cond, *target, REG_ZERO, REG_PC, disp)
            }
            Statement::Jump { cond, label } => {
                let disp = self.resolve(label, here, line_num)?;
                (OpCode::Add, *cond, REG_PC, REG_ZERO, REG_PC, disp)
            }
        };

        encode(
            op as u32,
            cond.bits() as u32,
            target as u32,
            src1 as u32,
            src2 as u32,
            disp,
        )
        .map_err(|source| AssemblerError::Encode { line: line_num, source })
    }
}

/// Parse one line into an optional label and an optional statement.
fn parse_line(line: &str, line_num: usize) -> Result<(Option<String>, Option<Statement>), AssemblerError> {
    // Remove comments
    let line = match line.find(['#', ';']) {
        Some(idx) => &line[..idx],
        None => line,
    };
    let mut rest = line.trim();

    // Label definition
    let mut label = None;
    if let Some(colon_idx) = rest.find(':') {
        let name = rest[..colon_idx].trim();
        if !is_identifier(name) {
            return Err(syntax(line_num, format!("invalid label '{}'", name)));
        }
        label = Some(name.to_string());
        rest = rest[colon_idx + 1..].trim();
    }

    if rest.is_empty() {
        return Ok((label, None));
    }

    let (head, operands) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };
    // Operands may be written with spaces after commas.
    let operands: String = operands.chars().filter(|c| !c.is_whitespace()).collect();

    let statement = parse_statement(head, &operands, line_num)?;
    Ok((label, Some(statement)))
}

fn parse_statement(head: &str, operands: &str, line_num: usize) -> Result<Statement, AssemblerError> {
    let (mnemonic, cond) = match head.split_once('/') {
        Some((mnemonic, predicate)) => {
            let cond = predicate
                .parse::<CondFlag>()
                .map_err(|e| syntax(line_num, e.to_string()))?;
            (mnemonic, cond)
        }
        None => (head, CondFlag::ALWAYS),
    };
    let upper = mnemonic.to_ascii_uppercase();

    match upper.as_str() {
        "DATA" => {
            if head.contains('/') {
                return Err(syntax(line_num, "DATA cannot be predicated".into()));
            }
            if operands.is_empty() {
                return Err(syntax(line_num, "DATA requires a value".into()));
            }
            Ok(Statement::Data(parse_data(operands, line_num)?))
        }

        "JUMP" => {
            if !is_identifier(operands) {
                return Err(syntax(line_num, "JUMP requires a label".into()));
            }
            Ok(Statement::Jump { cond, label: operands.to_string() })
        }

        _ => {
            let op = OpCode::from_mnemonic(&upper).ok_or_else(|| AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.to_string(),
            })?;
            parse_operands(op, cond, operands, line_num)
        }
    }
}

fn parse_operands(op: OpCode, cond: CondFlag, operands: &str, line_num: usize) -> Result<Statement, AssemblerError> {
    if operands.is_empty() {
        if op == OpCode::Halt {
            return Ok(Statement::Full { op, cond, target: 0, src1: 0, src2: 0, disp: 0 });
        }
        return Err(syntax(line_num, format!("{} requires operands", op)));
    }

    let parts: Vec<&str> = operands.split(',').collect();
    match parts.as_slice() {
        [target, src1, last] => {
            let (src2, disp) = match last.split_once('[') {
                Some((reg, tail)) => {
                    let value = tail
                        .strip_suffix(']')
                        .ok_or_else(|| syntax(line_num, "missing ']' after displacement".into()))?;
                    let disp = parse_int(value, line_num)?;
                    let disp = i32::try_from(disp)
                        .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: disp })?;
                    (reg, disp)
                }
                None => (*last, 0),
            };
            Ok(Statement::Full {
                op,
                cond,
                target: register(target, line_num)?,
                src1: register(src1, line_num)?,
                src2: register(src2, line_num)?,
                disp,
            })
        }
        [target, label] if is_identifier(label) && parse_register(label).is_none() => {
            Ok(Statement::MemRef {
                op,
                cond,
                target: register(target, line_num)?,
                label: label.to_string(),
            })
        }
        _ => Err(syntax(line_num, format!("cannot parse operands '{}'", operands))),
    }
}

fn register(name: &str, line_num: usize) -> Result<u8, AssemblerError> {
    parse_register(name).ok_or_else(|| AssemblerError::UnknownRegister {
        line: line_num,
        register: name.to_string(),
    })
}

/// Parse a DATA value: decimal (possibly negative) or `0x` hex. Negative
/// values are stored as their two's complement bits.
fn parse_data(text: &str, line_num: usize) -> Result<Word, AssemblerError> {
    let value = parse_int(text, line_num)?;
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
    }
    Ok(value as Word)
}

/// Parse `42`, `-7`, or `0x2a`.
fn parse_int(text: &str, line_num: usize) -> Result<i64, AssemblerError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    };
    let magnitude = parsed.map_err(|_| syntax(line_num, format!("invalid number '{}'", text)))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Labels: a letter followed by letters, digits or underscores.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn syntax(line: usize, message: String) -> AssemblerError {
    AssemblerError::Syntax { line, message }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown register on line {line}: {register}")]
    UnknownRegister { line: usize, register: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("cannot encode line {line}: {source}")]
    Encode { line: usize, source: EncodeError },
}
