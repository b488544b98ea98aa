//! Resumability checkpoint persisted on every flush.

use std::fmt;
use std::str::FromStr;

use crate::error::SinkError;

/// Opaque upstream token plus the block it was issued for.
///
/// Persisted as `"<token>:<block_id>:<block_number>"`. The token is opaque
/// and may itself contain `:`, so parsing splits from the right.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor {
    pub token: String,
    pub block_id: String,
    pub block_number: u64,
}

impl Cursor {
    pub fn new(token: impl Into<String>, block_id: impl Into<String>, block_number: u64) -> Self {
        Self {
            token: token.into(),
            block_id: block_id.into(),
            block_number,
        }
    }

    /// Cursor with no upstream token, meaning "resume at `block_number + 1`".
    pub fn blank(block_number: u64) -> Self {
        Self {
            token: String::new(),
            block_id: String::new(),
            block_number,
        }
    }

    /// Returns `true` if the cursor carries no upstream token.
    pub fn is_blank(&self) -> bool {
        self.token.is_empty()
    }

    /// First block to ingest when resuming.
    ///
    /// A flushed cursor's block is already applied; a blank cursor marks the
    /// block before the first one to ingest. Both resume one block later.
    pub fn resume_block(&self) -> u64 {
        self.block_number.saturating_add(1)
    }

    /// Wire form stored under the cursor key.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses the stored wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, SinkError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SinkError::InvalidCursor(format!("cursor is not utf-8: {}", e)))?;
        text.parse()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.token, self.block_id, self.block_number)
    }
}

impl FromStr for Cursor {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let (number, block_id, token) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(id), Some(token)) => (n, id, token),
            _ => {
                return Err(SinkError::InvalidCursor(format!(
                    "expected 3 ':'-separated parts in '{}'",
                    s
                )))
            }
        };

        let block_number = number.parse::<u64>().map_err(|e| {
            SinkError::InvalidCursor(format!("invalid block number '{}': {}", number, e))
        })?;

        Ok(Self::new(token, block_id, block_number))
    }
}
