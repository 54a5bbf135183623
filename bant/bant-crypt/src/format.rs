//! Reader for the line-oriented `Key: Value` records used by the seed database.
//!
//! ```text
//! Filetype: Bandai BANT seeds
//! Version: 2
//! # comment
//! Count: 1
//! Scramble map 0: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
//! ```

use thiserror::Error;

const FILETYPE_KEY: &str = "Filetype";
const VERSION_KEY: &str = "Version";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("line {line}: expected `Key: Value`")]
    Malformed { line: usize },

    #[error("record does not start with `Filetype` and `Version`")]
    MissingHeader,

    #[error("key {0:?} not found")]
    MissingKey(String),

    #[error("key {key:?}: {value:?} is not a valid unsigned integer")]
    InvalidNumber { key: String, value: String },

    #[error("key {key:?}: expected {expected} hex bytes")]
    InvalidHex { key: String, expected: usize },
}

/// Parsed record, entries kept in file order.
#[derive(Debug, Default)]
pub struct KeyValueFile {
    entries: Vec<(String, String)>,
}

impl KeyValueFile {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut entries = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or(FormatError::Malformed { line: idx + 1 })?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            entries.push((key.to_string(), value.to_string()));
        }

        Ok(Self { entries })
    }

    /// Returns the record's file type and version, which must be its first two entries.
    pub fn header(&self) -> Result<(&str, u32), FormatError> {
        match self.entries.as_slice() {
            [(filetype_key, filetype), (version_key, version), ..]
                if filetype_key == FILETYPE_KEY && version_key == VERSION_KEY =>
            {
                Ok((filetype.as_str(), parse_u32(VERSION_KEY, version)?))
            }
            _ => Err(FormatError::MissingHeader),
        }
    }

    pub fn read_string(&self, key: &str) -> Result<&str, FormatError> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| FormatError::MissingKey(key.to_string()))
    }

    pub fn read_u32(&self, key: &str) -> Result<u32, FormatError> {
        parse_u32(key, self.read_string(key)?)
    }

    pub fn read_hex<const N: usize>(&self, key: &str) -> Result<[u8; N], FormatError> {
        parse_hex_bytes(self.read_string(key)?).ok_or_else(|| FormatError::InvalidHex {
            key: key.to_string(),
            expected: N,
        })
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, FormatError> {
    value.trim().parse().map_err(|_| FormatError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse exactly `N` whitespace-separated two-digit hex bytes (`"DE AD BE EF"`).
pub fn parse_hex_bytes<const N: usize>(value: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    let mut tokens = value.split_whitespace();

    for byte in out.iter_mut() {
        let token = tokens.next()?;
        if token.len() != 2 {
            return None;
        }
        hex::decode_to_slice(token, std::slice::from_mut(byte)).ok()?;
    }

    tokens.next().is_none().then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Filetype: Bandai BANT seeds\n\
                          Version: 2\n\
                          \n\
                          # seeds follow\n\
                          Count: 1\n\
                          Name 0: Sample: with colon\n\
                          Scramble map 0: 00 01 02 03\n";

    #[test]
    fn test_header() {
        let file = KeyValueFile::parse(SAMPLE).unwrap();
        assert_eq!(file.header().unwrap(), ("Bandai BANT seeds", 2));
    }

    #[test]
    fn test_value_keeps_everything_after_first_colon() {
        let file = KeyValueFile::parse(SAMPLE).unwrap();
        assert_eq!(file.read_string("Name 0").unwrap(), "Sample: with colon");
    }

    #[test]
    fn test_value_keeps_trailing_spaces() {
        let file = KeyValueFile::parse("Key: secret  \n").unwrap();
        assert_eq!(file.read_string("Key").unwrap(), "secret  ");
    }

    #[test]
    fn test_first_duplicate_key_wins() {
        let file = KeyValueFile::parse("Count: 1\nCount: 2\n").unwrap();
        assert_eq!(file.read_u32("Count").unwrap(), 1);
    }

    #[test]
    fn test_malformed_line() {
        let result = KeyValueFile::parse("Version: 2\nno separator here\n");
        assert_eq!(result.unwrap_err(), FormatError::Malformed { line: 2 });
    }

    #[test]
    fn test_missing_key() {
        let file = KeyValueFile::parse(SAMPLE).unwrap();
        assert!(matches!(file.read_u32("Item ID 0"), Err(FormatError::MissingKey(_))));
    }

    #[test]
    fn test_invalid_number() {
        let file = KeyValueFile::parse("Count: many\n").unwrap();
        assert!(matches!(file.read_u32("Count"), Err(FormatError::InvalidNumber { .. })));
    }

    #[test]
    fn test_read_hex() {
        let file = KeyValueFile::parse(SAMPLE).unwrap();
        assert_eq!(file.read_hex::<4>("Scramble map 0").unwrap(), [0, 1, 2, 3]);
        assert!(matches!(
            file.read_hex::<16>("Scramble map 0"),
            Err(FormatError::InvalidHex { expected: 16, .. })
        ));
    }

    #[test]
    fn test_header_must_come_first() {
        let file =
            KeyValueFile::parse("Count: 1\nFiletype: Bandai BANT seeds\nVersion: 2\n").unwrap();
        assert_eq!(file.header().unwrap_err(), FormatError::MissingHeader);

        let file = KeyValueFile::parse("Version: 2\nFiletype: Bandai BANT seeds\n").unwrap();
        assert_eq!(file.header().unwrap_err(), FormatError::MissingHeader);
    }

    #[test]
    fn test_header_after_comments() {
        let file = KeyValueFile::parse("# seeds\n\nFiletype: x\nVersion: 7\n").unwrap();
        assert_eq!(file.header().unwrap(), ("x", 7));
    }

    #[test]
    fn test_parse_hex_bytes_rejects_signs() {
        assert_eq!(parse_hex_bytes::<1>("+0"), None);
        assert_eq!(parse_hex_bytes::<1>("+F"), None);
        assert_eq!(parse_hex_bytes::<2>("-1 00"), None);
    }

    #[test]
    fn test_parse_hex_bytes_rejects_extra_and_bad_tokens() {
        assert_eq!(parse_hex_bytes::<2>("0a FF"), Some([0x0a, 0xff]));
        assert_eq!(parse_hex_bytes::<2>("0a FF 00"), None);
        assert_eq!(parse_hex_bytes::<2>("0a F"), None);
        assert_eq!(parse_hex_bytes::<2>("0a zz"), None);
    }
}
