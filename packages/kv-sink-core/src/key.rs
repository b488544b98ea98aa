//! Physical key-space layout.
//!
//! Every key written to the backing store starts with a tag so user records,
//! undo records and the cursor never collide:
//!
//! | space  | layout                                        |
//! |--------|-----------------------------------------------|
//! | user   | `'k'` + raw key                               |
//! | undo   | `'x' 'u'` + big-endian `u64::MAX - block`     |
//! | cursor | `"xc"`                                        |
//!
//! Undo keys are inverted so a forward scan visits the highest block first.

/// Tag byte for user records
pub const USER_KEY_PREFIX: u8 = b'k';

/// Tag bytes for undo records
pub const UNDO_KEY_PREFIX: [u8; 2] = [b'x', b'u'];

/// First key past the undo key space
pub const UNDO_KEY_END: [u8; 2] = [b'x', b'v'];

/// Fixed key holding the cursor
pub const CURSOR_KEY: &[u8] = b"xc";

/// Exclusive end used for open-ended user scans
pub const INFINITE_END_BYTES: [u8; 128] = [0xFF; 128];

const UNDO_KEY_LEN: usize = UNDO_KEY_PREFIX.len() + 8;

/// Encodes a user key.
pub fn user_key(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(USER_KEY_PREFIX);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Decodes a user key, dropping the tag byte.
///
/// Callers check [`is_user_key`] first.
pub fn from_user_key(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[1..]).into_owned()
}

/// Returns true if `bytes` lives in the user key space.
pub fn is_user_key(bytes: &[u8]) -> bool {
    bytes.len() > 1 && bytes[0] == USER_KEY_PREFIX
}

/// Encodes the undo key for `block_number`.
pub fn undo_key(block_number: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(UNDO_KEY_LEN);
    out.extend_from_slice(&UNDO_KEY_PREFIX);
    out.extend_from_slice(&(u64::MAX - block_number).to_be_bytes());
    out
}

/// Returns true if `bytes` is a well-formed undo key.
pub fn is_undo_key(bytes: &[u8]) -> bool {
    bytes.len() == UNDO_KEY_LEN && bytes[..2] == UNDO_KEY_PREFIX
}

/// Recovers the block number from an undo key.
pub fn undo_block_number(bytes: &[u8]) -> Option<u64> {
    if !is_undo_key(bytes) {
        return None;
    }
    let raw: [u8; 8] = bytes[2..].try_into().ok()?;
    Some(u64::MAX - u64::from_be_bytes(raw))
}
