//! Object file format for Duck Machine programs.
//!
//! An object file is plain text:
//! - One word per line, as a decimal integer (negative values allowed)
//! - Lines starting with `#` or `;` are comments
//! - Blank lines are ignored

use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::isa::Word;

/// Parse object code from text.
pub fn parse_object(text: &str) -> Result<Vec<Word>, ObjectError> {
    let mut words = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let trimmed = line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let value: i64 = trimmed.parse().map_err(|_| ObjectError::Parse {
            line: line_num + 1,
            message: format!("expected a decimal word, found '{}'", trimmed),
        })?;
        if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
            return Err(ObjectError::Parse {
                line: line_num + 1,
                message: format!("{} does not fit in a 32-bit word", value),
            });
        }
        words.push(value as Word);
    }

    Ok(words)
}

/// Load an object file from disk.
pub fn load_object<P: AsRef<Path>>(path: P) -> Result<Vec<Word>, ObjectError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_object(&text)
}

/// Write object code, one signed decimal word per line.
pub fn write_object<W: Write>(out: &mut W, words: &[Word]) -> Result<(), ObjectError> {
    for word in words {
        writeln!(out, "{}", *word as i32)?;
    }
    Ok(())
}

/// Save object code to disk.
pub fn save_object<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ObjectError> {
    let mut file = std::fs::File::create(path.as_ref())?;
    write_object(&mut file, words)
}

/// Errors that can occur while reading or writing object files.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let text = "# Duck Machine object code\n\n1074003969\n-1\n; trailing comment\n  0  \n";
        let words = parse_object(text).unwrap();
        assert_eq!(words, vec![1074003969, u32::MAX, 0]);
    }

    #[test]
    fn test_parse_object_error_line() {
        let err = parse_object("1\n2\nthree\n").unwrap_err();
        assert!(matches!(err, ObjectError::Parse { line: 3, .. }));

        let err = parse_object("4294967296").unwrap_err();
        assert!(matches!(err, ObjectError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_write_object_signed() {
        let mut out = Vec::new();
        write_object(&mut out, &[42, (-17i32) as Word, 0]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42\n-17\n0\n");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("duck-object-{}.obj", std::process::id()));
        let words = vec![7, 0x8000_0000, 3];

        save_object(&path, &words).unwrap();
        let loaded = load_object(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, words);
    }
}
