//! Trace and span identifier helpers.
//!
//! Identifiers arrive as raw bytes and are displayed as lowercase hex with no
//! separators. The dashboard shows a seven character prefix where space is
//! tight.

/// Number of characters kept by [`to_shortened_id`].
pub const SHORTENED_ID_LENGTH: usize = 7;

/// Encode identifier bytes as lowercase hex (two characters per byte).
///
/// Empty input yields an empty string.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex identifier back into bytes.
///
/// Accepts either case.
pub fn from_hex(id: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(id)
}

/// Shorten an identifier to its first seven characters for display.
#[must_use]
pub fn to_shortened_id(id: &str) -> &str {
    truncate_str(id, SHORTENED_ID_LENGTH)
}

/// Truncate a string to at most `max_chars` characters.
///
/// Borrows the input unchanged when it is already short enough.
#[must_use]
pub fn truncate_str(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &value[..byte_index],
        None => value,
    }
}
