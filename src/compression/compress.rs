use crate::core::error::{Error, ErrorKind, Result};
use serde::{Serialize, Deserialize};

/// Compressed block storage for stored document sources and segment bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    LZ4,      // Fast compression, used for hot stored sources
    Zstd,     // Better ratio, used for segment files
    Snappy,
}

impl CompressionType {
    fn tag(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::LZ4 => 1,
            CompressionType::Zstd => 2,
            CompressionType::Snappy => 3,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::LZ4),
            2 => Ok(CompressionType::Zstd),
            3 => Ok(CompressionType::Snappy),
            other => Err(Error::new(ErrorKind::Corrupted, format!("Unknown compression tag {}", other))),
        }
    }
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),

            CompressionType::LZ4 => lz4_flex::block::compress(data),

            CompressionType::Zstd => {
                zstd::encode_all(data, 3)?  // Level 3 is balanced
            }

            CompressionType::Snappy => {
                let mut encoder = snap::raw::Encoder::new();
                encoder.compress_vec(data)
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?
            }
        };

        Ok(CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        })
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression {
            CompressionType::None => Ok(self.data.clone()),

            CompressionType::LZ4 => {
                lz4_flex::block::decompress(&self.data, self.original_size)
                    .map_err(|e| Error::new(ErrorKind::Corrupted, e.to_string()))
            }

            CompressionType::Zstd => {
                zstd::decode_all(&self.data[..])
                    .map_err(|e| Error::new(ErrorKind::Corrupted, e.to_string()))
            }

            CompressionType::Snappy => {
                let mut decoder = snap::raw::Decoder::new();
                decoder.decompress_vec(&self.data)
                    .map_err(|e| Error::new(ErrorKind::Corrupted, e.to_string()))
            }
        }
    }

    // [ tag: u8 ][ original_size: u32 LE ][ data ... ]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 5);
        out.push(self.compression.tag());
        out.extend_from_slice(&(self.original_size as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 5 {
            return Err(Error::new(ErrorKind::Corrupted, "Compressed block too short"));
        }
        let compression = CompressionType::from_tag(bytes[0])?;
        let original_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        Ok(CompressedBlock {
            data: bytes[5..].to_vec(),
            original_size,
            compression,
        })
    }
}

/// Compress and frame in one step.
pub fn pack(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    Ok(CompressedBlock::compress(data, compression)?.to_bytes())
}

pub fn unpack(bytes: &[u8]) -> Result<Vec<u8>> {
    CompressedBlock::from_bytes(bytes)?.decompress()
}
