//! Log record encoding and replay.

use crate::error::{IndexError, IndexResult};
use crate::mapping::Mapping;
use crate::types::{ResourceId, StorageObjectId};
use std::collections::HashMap;

const KIND_PUT: u8 = 0x01;
const KIND_DELETE: u8 = 0x02;

/// Length prefix size.
const LEN_SIZE: usize = 4;
/// CRC size.
const CRC_SIZE: usize = 4;
/// record_len (4) + kind (1) + three empty length-prefixed strings (12) + crc (4)
const MIN_RECORD_SIZE: usize = LEN_SIZE + 1 + 3 * LEN_SIZE + CRC_SIZE;

/// One entry in the committed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogRecord {
    /// Insert or replace a mapping.
    Put {
        resource_id: ResourceId,
        mapping: Mapping,
    },
    /// Remove a mapping.
    Delete { resource_id: ResourceId },
}

impl LogRecord {
    pub(crate) fn put(resource_id: &ResourceId, mapping: &Mapping) -> Self {
        Self::Put {
            resource_id: resource_id.clone(),
            mapping: mapping.clone(),
        }
    }

    pub(crate) fn delete(resource_id: &ResourceId) -> Self {
        Self::Delete {
            resource_id: resource_id.clone(),
        }
    }

    /// Encodes the record, length prefix and checksum included.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let (kind, key, root, object) = match self {
            Self::Put {
                resource_id,
                mapping,
            } => (
                KIND_PUT,
                resource_id.as_str(),
                mapping.root_resource_id().as_str(),
                mapping.storage_object_id().as_str(),
            ),
            Self::Delete { resource_id } => (KIND_DELETE, resource_id.as_str(), "", ""),
        };

        let record_len = MIN_RECORD_SIZE + key.len() + root.len() + object.len();
        let mut buf = Vec::with_capacity(record_len);
        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.push(kind);
        for field in [key, root, object] {
            buf.extend_from_slice(&(field.len() as u32).to_le_bytes());
            buf.extend_from_slice(field.as_bytes());
        }

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes one checksum-verified record body.
    ///
    /// `record` spans the full record, length prefix and crc included.
    fn decode(record: &[u8]) -> IndexResult<Self> {
        let body = &record[LEN_SIZE..record.len() - CRC_SIZE];
        let kind = body[0];
        let mut cursor = &body[1..];

        let key = take_string(&mut cursor, "resource id")?;
        let root = take_string(&mut cursor, "root resource id")?;
        let object = take_string(&mut cursor, "storage object id")?;
        if !cursor.is_empty() {
            return Err(IndexError::corruption(format!(
                "{} trailing bytes in record",
                cursor.len()
            )));
        }
        if key.is_empty() {
            return Err(IndexError::corruption("record with empty resource id"));
        }

        match kind {
            KIND_PUT => Ok(Self::Put {
                resource_id: ResourceId::new(key),
                mapping: Mapping::new(ResourceId::new(root), StorageObjectId::new(object)),
            }),
            KIND_DELETE => Ok(Self::Delete {
                resource_id: ResourceId::new(key),
            }),
            other => Err(IndexError::corruption(format!(
                "unknown record kind 0x{other:02x}"
            ))),
        }
    }
}

fn take_string(cursor: &mut &[u8], what: &str) -> IndexResult<String> {
    if cursor.len() < LEN_SIZE {
        return Err(IndexError::corruption(format!("truncated {what} length")));
    }
    let (len_bytes, rest) = cursor.split_at(LEN_SIZE);
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if rest.len() < len {
        return Err(IndexError::corruption(format!(
            "{what} of {len} bytes overruns record"
        )));
    }
    let (value, rest) = rest.split_at(len);
    *cursor = rest;
    String::from_utf8(value.to_vec())
        .map_err(|_| IndexError::corruption(format!("{what} is not valid UTF-8")))
}

/// State rebuilt from a log image.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Live mappings, last record per key wins.
    pub(crate) entries: HashMap<ResourceId, Mapping>,
    /// Number of intact records read.
    pub(crate) records: u64,
    /// Length of the intact prefix; anything after it is a torn tail.
    pub(crate) valid_len: u64,
}

/// Returns the length of the checksum-verified record starting at `offset`.
fn framed_record_at(data: &[u8], offset: usize) -> Option<usize> {
    let remaining = data.get(offset..)?;
    if remaining.len() < LEN_SIZE {
        return None;
    }
    let record_len =
        u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
    if record_len < MIN_RECORD_SIZE || record_len > remaining.len() {
        return None;
    }

    let (covered, crc_bytes) = remaining[..record_len].split_at(record_len - CRC_SIZE);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    (crc32fast::hash(covered) == stored).then_some(record_len)
}

/// Replays a full log image.
///
/// An incomplete or checksum-failing record with nothing intact after it is
/// a torn tail, which is what a crash in the middle of an append leaves
/// behind; replay stops there and the caller truncates the log to
/// `valid_len`. A damaged record followed by an intact one, or a record that
/// passes its checksum but does not decode, is real corruption and fails the
/// replay.
pub(crate) fn replay(data: &[u8]) -> IndexResult<Replay> {
    let mut replay = Replay::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let Some(record_len) = framed_record_at(data, offset) else {
            let next_intact =
                (offset + 1..data.len()).find(|&o| framed_record_at(data, o).is_some());
            if let Some(next) = next_intact {
                return Err(IndexError::corruption(format!(
                    "damaged record at offset {offset}, intact record at offset {next}"
                )));
            }
            break;
        };

        let record = &data[offset..offset + record_len];
        let decoded = LogRecord::decode(record).map_err(|e| match e {
            IndexError::Corruption { message } => {
                IndexError::corruption(format!("record at offset {offset}: {message}"))
            }
            other => other,
        })?;

        match decoded {
            LogRecord::Put {
                resource_id,
                mapping,
            } => {
                replay.entries.insert(resource_id, mapping);
            }
            LogRecord::Delete { resource_id } => {
                replay.entries.remove(&resource_id);
            }
        }

        replay.records += 1;
        offset += record_len;
    }

    replay.valid_len = offset as u64;
    Ok(replay)
}
