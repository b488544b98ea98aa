//! Newline-delimited JSON block source.
//!
//! Each line is one event:
//!
//! ```json
//! {"type":"data","block":3,"finalized_height":1,"cursor":"tok:0x03:3",
//!  "operations":[{"kind":"set","key":"key.1","value":"76616c7565"}]}
//! {"type":"undo","last_valid_block":2,"cursor":"tok:0x02:2"}
//! ```
//!
//! Values are hex-encoded. A missing or unknown `kind` decodes to
//! [`OperationKind::Unset`] and is rejected when the block is applied.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use kv_sink_core::store::classify_io_error;
use kv_sink_core::{Cursor, Operation, OperationKind, SinkError};
use serde::{Deserialize, Serialize};

use crate::block::BlockEvent;
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    Data {
        block: u64,
        finalized_height: u64,
        cursor: String,
        #[serde(default)]
        operations: Vec<RawOperation>,
    },
    Undo {
        last_valid_block: u64,
        cursor: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct RawOperation {
    #[serde(default)]
    kind: String,
    key: String,
    #[serde(default)]
    value: String,
}

fn kind_from_str(kind: &str) -> OperationKind {
    match kind {
        "set" => OperationKind::Set,
        "delete" => OperationKind::Delete,
        _ => OperationKind::Unset,
    }
}

fn kind_to_str(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Set => "set",
        OperationKind::Delete => "delete",
        OperationKind::Unset => "unset",
    }
}

impl RawEvent {
    fn into_event(self) -> Result<BlockEvent> {
        match self {
            RawEvent::Data {
                block,
                finalized_height,
                cursor,
                operations,
            } => {
                let operations = operations
                    .into_iter()
                    .map(|op| {
                        let value = hex::decode(&op.value).map_err(|e| {
                            SinkError::Serialization(format!(
                                "invalid hex value for key '{}': {}",
                                op.key, e
                            ))
                        })?;
                        Ok(Operation {
                            kind: kind_from_str(&op.kind),
                            key: op.key,
                            value,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(BlockEvent::Data {
                    block,
                    finalized_height,
                    operations,
                    cursor: cursor.parse()?,
                })
            }
            RawEvent::Undo {
                last_valid_block,
                cursor,
            } => Ok(BlockEvent::Undo {
                last_valid_block,
                cursor: cursor.parse()?,
            }),
        }
    }
}

fn raw_cursor(cursor: &Cursor) -> String {
    cursor.to_string()
}

/// Encodes `event` as one JSON line, without the trailing newline.
pub fn encode_event(event: &BlockEvent) -> Result<String> {
    let raw = match event {
        BlockEvent::Data {
            block,
            finalized_height,
            operations,
            cursor,
        } => RawEvent::Data {
            block: *block,
            finalized_height: *finalized_height,
            cursor: raw_cursor(cursor),
            operations: operations
                .iter()
                .map(|op| RawOperation {
                    kind: kind_to_str(op.kind).to_string(),
                    key: op.key.clone(),
                    value: hex::encode(&op.value),
                })
                .collect(),
        },
        BlockEvent::Undo {
            last_valid_block,
            cursor,
        } => RawEvent::Undo {
            last_valid_block: *last_valid_block,
            cursor: raw_cursor(cursor),
        },
    };
    serde_json::to_string(&raw).map_err(|e| SinkError::Serialization(e.to_string()))
}

/// Reads [`BlockEvent`]s, one JSON object per line. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<BufReader<R>>,
    line_number: usize,
}

impl JsonLinesSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            classify_io_error(e, &format!("Failed to open {}", path.display()))
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            line_number: 0,
        }
    }
}

impl<R: Read> Iterator for JsonLinesSource<R> {
    type Item = Result<BlockEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(classify_io_error(e, "Failed to read event"))),
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let line_number = self.line_number;
            return Some(
                serde_json::from_str::<RawEvent>(&line)
                    .map_err(|e| {
                        SinkError::Serialization(format!("line {}: {}", line_number, e))
                    })
                    .and_then(RawEvent::into_event),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;

    #[timeout(1000)]
    #[test]
    fn test_parse_events() {
        let input = r#"{"type":"data","block":3,"finalized_height":1,"cursor":"tok:0x03:3","operations":[{"kind":"set","key":"key.1","value":"76616c7565"},{"kind":"delete","key":"key.2"}]}

{"type":"undo","last_valid_block":2,"cursor":"tok:0x02:2"}
"#;
        let events: Vec<BlockEvent> = JsonLinesSource::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            events,
            vec![
                BlockEvent::Data {
                    block: 3,
                    finalized_height: 1,
                    operations: vec![Operation::set("key.1", "value"), Operation::delete("key.2")],
                    cursor: Cursor::new("tok", "0x03", 3),
                },
                BlockEvent::Undo {
                    last_valid_block: 2,
                    cursor: Cursor::new("tok", "0x02", 2),
                },
            ]
        );
    }

    #[timeout(1000)]
    #[test]
    fn test_unknown_kind_decodes_as_unset() {
        let input = r#"{"type":"data","block":1,"finalized_height":0,"cursor":"t:i:1","operations":[{"kind":"merge","key":"a"}]}"#;
        let event = JsonLinesSource::new(input.as_bytes())
            .next()
            .unwrap()
            .unwrap();
        match event {
            BlockEvent::Data { operations, .. } => {
                assert_eq!(operations[0].kind, OperationKind::Unset)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[timeout(1000)]
    #[test]
    fn test_malformed_lines() {
        let mut source = JsonLinesSource::new(
            "{\"type\":\"data\"\n{\"type\":\"undo\",\"last_valid_block\":1,\"cursor\":\"bad\"}\n"
                .as_bytes(),
        );
        assert!(matches!(
            source.next(),
            Some(Err(SinkError::Serialization(msg))) if msg.starts_with("line 1")
        ));
        assert!(matches!(source.next(), Some(Err(SinkError::InvalidCursor(_)))));
        assert!(source.next().is_none());
    }

    #[timeout(1000)]
    #[test]
    fn test_encode_event_is_readable() {
        let event = BlockEvent::Data {
            block: 7,
            finalized_height: 5,
            operations: vec![Operation::set("k", vec![0u8, 1, 2])],
            cursor: Cursor::new("a:b", "0x07", 7),
        };
        let line = encode_event(&event).unwrap();
        let parsed = JsonLinesSource::new(line.as_bytes())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(parsed, event);
    }
}
