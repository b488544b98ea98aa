//! Operations, batches and the undo record wire format.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SinkError};

/// Kind of a key-value operation.
///
/// `Unset` is the zero value an upstream decoder produces when the kind is
/// missing. It is never valid to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Unset,
    Set,
    Delete,
}

impl OperationKind {
    /// Wire tag of this kind.
    pub fn tag(self) -> u8 {
        match self {
            OperationKind::Unset => 0,
            OperationKind::Set => 1,
            OperationKind::Delete => 2,
        }
    }

    /// Parses a wire tag. Unknown tags yield `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(OperationKind::Unset),
            1 => Some(OperationKind::Set),
            2 => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Unset => write!(f, "UNSET"),
            OperationKind::Set => write!(f, "SET"),
            OperationKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single Set or Delete against a user key.
///
/// For `Delete`, `value` carries the value being removed when the producer
/// knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub key: String,
    pub value: Vec<u8>,
}

impl Operation {
    pub fn set(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Set,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            key: key.into(),
            value: Vec::new(),
        }
    }

    /// Delete carrying the removed value.
    pub fn delete_with_value(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OperationKind::Delete,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Fails with `CorruptOperation` unless this is a Set or a Delete.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            OperationKind::Set | OperationKind::Delete => Ok(()),
            OperationKind::Unset => Err(SinkError::CorruptOperation(format!(
                "invalid operation type {} for key '{}'",
                self.kind, self.key
            ))),
        }
    }
}

/// Ordered operations produced by one block. Later entries for the same key
/// supersede earlier ones.
pub type OperationBatch = Vec<Operation>;

/// A committed user record returned by the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireOperation {
    kind: u8,
    key: String,
    value: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireBatch {
    operations: Vec<WireOperation>,
}

/// Encodes a batch as stored under an undo key.
pub fn encode_batch(operations: &[Operation]) -> Result<Vec<u8>> {
    let wire = WireBatch {
        operations: operations
            .iter()
            .map(|op| WireOperation {
                kind: op.kind.tag(),
                key: op.key.clone(),
                value: op.value.clone(),
            })
            .collect(),
    };
    Ok(bincode::serialize(&wire)?)
}

/// Decodes a stored undo record.
///
/// Any decoding failure, unknown kind tag or `Unset` entry is a
/// `CorruptOperation`.
pub fn decode_batch(bytes: &[u8]) -> Result<OperationBatch> {
    let wire: WireBatch = bincode::deserialize(bytes)
        .map_err(|e| SinkError::CorruptOperation(format!("malformed undo record: {}", e)))?;

    wire.operations
        .into_iter()
        .map(|op| {
            let kind = OperationKind::from_tag(op.kind).ok_or_else(|| {
                SinkError::CorruptOperation(format!(
                    "unknown operation type {} for key '{}'",
                    op.kind, op.key
                ))
            })?;
            let op = Operation {
                kind,
                key: op.key,
                value: op.value,
            };
            op.validate()?;
            Ok(op)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(OperationKind::Set.tag(), 1);
        assert_eq!(OperationKind::Delete.tag(), 2);
        assert_eq!(OperationKind::from_tag(2), Some(OperationKind::Delete));
        assert_eq!(OperationKind::from_tag(9), None);
    }

    #[test]
    fn test_validate_rejects_unset() {
        assert!(Operation::set("a", "1").validate().is_ok());
        assert!(Operation::delete("a").validate().is_ok());

        let unset = Operation {
            kind: OperationKind::Unset,
            key: "a".into(),
            value: vec![],
        };
        assert!(matches!(
            unset.validate(),
            Err(SinkError::CorruptOperation(_))
        ));
    }

    #[test]
    fn test_batch_wire_format_preserves_order() {
        let batch = vec![
            Operation::set("key.2", "value.2"),
            Operation::delete("key.1"),
            Operation::set("key.2", vec![0u8, 255, 7]),
        ];
        let bytes = encode_batch(&batch).unwrap();
        assert_eq!(decode_batch(&bytes).unwrap(), batch);
    }

    #[test]
    fn test_empty_batch_wire_format() {
        let bytes = encode_batch(&[]).unwrap();
        assert!(decode_batch(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let wire = WireBatch {
            operations: vec![WireOperation {
                kind: 3,
                key: "key.1".into(),
                value: vec![],
            }],
        };
        let bytes = bincode::serialize(&wire).unwrap();
        assert!(matches!(
            decode_batch(&bytes),
            Err(SinkError::CorruptOperation(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_batch(&[0xFF, 0xFF, 0xFF]),
            Err(SinkError::CorruptOperation(_))
        ));
    }
}
