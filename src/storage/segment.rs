use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use crate::compression::compress::{pack, unpack, CompressionType};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;

pub const SEGMENTS_GEN: &str = "segments.gen";
const SEGMENTS_PREFIX: &str = "segments_";
const SEGMENT_MAGIC: &[u8; 4] = b"JDXS";

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }

    pub fn file_name(&self) -> String {
        format!("{}.seg", self.0)
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        SegmentId::new()
    }
}

/// One buffered index mutation. Segments replay these in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentOp {
    Add(Document),
    DeleteTerm { field: String, term: String },
}

/// Segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,     // Format version
    pub op_count: u32,    // Number of operations
    pub checksum: u32,    // CRC32 of the packed body
    pub compression: CompressionType,
}

impl SegmentHeader {
    pub const VERSION: u32 = 1;
}

/// Encode operations as `[magic][header len u32][header][packed body]`.
pub fn encode_segment(ops: &[SegmentOp], compression: CompressionType) -> Result<Vec<u8>> {
    let body = pack(&bincode::serialize(ops)?, compression)?;

    let mut hasher = Hasher::new();
    hasher.update(&body);

    let header = SegmentHeader {
        version: SegmentHeader::VERSION,
        op_count: ops.len() as u32,
        checksum: hasher.finalize(),
        compression,
    };
    let header = bincode::serialize(&header)?;

    let mut out = Vec::with_capacity(8 + header.len() + body.len());
    out.extend_from_slice(SEGMENT_MAGIC);
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode_segment(bytes: &[u8]) -> Result<Vec<SegmentOp>> {
    if bytes.len() < 8 || &bytes[..4] != SEGMENT_MAGIC {
        return Err(Error::new(ErrorKind::Corrupted, "not a segment file"));
    }
    let header_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body_start = 8 + header_len;
    if bytes.len() < body_start {
        return Err(Error::new(ErrorKind::Corrupted, "segment header truncated"));
    }

    let header: SegmentHeader = bincode::deserialize(&bytes[8..body_start])?;
    if header.version != SegmentHeader::VERSION {
        return Err(Error::new(
            ErrorKind::Corrupted,
            format!("unsupported segment version {}", header.version),
        ));
    }

    let body = &bytes[body_start..];
    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != header.checksum {
        return Err(Error::new(ErrorKind::Corrupted, "segment checksum mismatch"));
    }

    let ops: Vec<SegmentOp> = bincode::deserialize(&unpack(body)?)?;
    if ops.len() != header.op_count as usize {
        return Err(Error::new(ErrorKind::Corrupted, "segment operation count mismatch"));
    }
    Ok(ops)
}

/// Commit descriptor: the segment files making up one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentsFile {
    pub generation: u64,
    pub segments: Vec<String>,
    pub user_data: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl SegmentsFile {
    pub fn file_name(&self) -> String {
        segments_file_name(self.generation)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::new(ErrorKind::Corrupted, format!("segments file: {}", e)))
    }
}

pub fn segments_file_name(generation: u64) -> String {
    format!("{}{}", SEGMENTS_PREFIX, generation)
}

pub fn parse_segments_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENTS_PREFIX)?.parse().ok()
}

pub fn encode_generation(generation: u64) -> Vec<u8> {
    generation.to_le_bytes().to_vec()
}

pub fn decode_generation(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Corrupted, "segments.gen must hold 8 bytes"))?;
    Ok(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Field;

    fn ops() -> Vec<SegmentOp> {
        let mut doc = Document::new();
        doc.add_field(Field::term("$id", "DOC_001"));
        doc.add_field(Field::long("age", 20));
        vec![
            SegmentOp::Add(doc),
            SegmentOp::DeleteTerm { field: "$id".into(), term: "DOC_000".into() },
        ]
    }

    #[test]
    fn segments_survive_encoding() {
        let bytes = encode_segment(&ops(), CompressionType::Zstd).unwrap();
        assert_eq!(decode_segment(&bytes).unwrap(), ops());
    }

    #[test]
    fn corruption_is_detected() {
        let mut bytes = encode_segment(&ops(), CompressionType::LZ4).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert_eq!(decode_segment(&bytes).unwrap_err().kind, ErrorKind::Corrupted);
        assert_eq!(decode_segment(b"nope").unwrap_err().kind, ErrorKind::Corrupted);
    }

    #[test]
    fn segments_file_names_round_trip() {
        assert_eq!(segments_file_name(12), "segments_12");
        assert_eq!(parse_segments_file_name("segments_12"), Some(12));
        assert_eq!(parse_segments_file_name("segments.gen"), None);
        assert_eq!(decode_generation(&encode_generation(7)).unwrap(), 7);
    }
}
