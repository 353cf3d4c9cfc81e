//! Byte ↔ hex text codec used for the stored envelope representation.
//!
//! Encoding is always lowercase with two characters per byte and no
//! separators. Decoding accepts either case.

use thiserror::Error;

/// Malformed hex text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The input has an odd number of characters.
    #[error("invalid hex string: odd length {0}")]
    OddLength(usize),

    /// The input contains a character that is not a hex digit.
    #[error("invalid hex character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },
}

/// Encode `bytes` as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex text (either case) into bytes.
///
/// # Errors
///
/// Returns [`FormatError::OddLength`] if `text` has an odd length, or
/// [`FormatError::InvalidCharacter`] naming the first non-hex character.
/// No partial output is ever returned.
pub fn hex_decode(text: &str) -> Result<Vec<u8>, FormatError> {
    if text.len() % 2 != 0 {
        return Err(FormatError::OddLength(text.len()));
    }
    if let Some((index, character)) = text.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(FormatError::InvalidCharacter { character, index });
    }
    hex::decode(text).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => FormatError::InvalidCharacter {
            character: c,
            index,
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            FormatError::OddLength(text.len())
        }
    })
}

/// Render `bytes` as hex split into blocks of `block_size` bytes.
///
/// Diagnostic helper for inspecting an envelope, e.g. `[0a1b, 2c3d, 4e]` for a
/// block size of 2. A `block_size` of zero renders a single block.
pub fn hex_with_block_size(bytes: &[u8], block_size: usize) -> String {
    if bytes.is_empty() {
        return "[]".into();
    }
    let chunk = if block_size == 0 { bytes.len() } else { block_size };
    let blocks: Vec<String> = bytes.chunks(chunk).map(hex::encode).collect();
    format!("[{}]", blocks.join(", "))
}
