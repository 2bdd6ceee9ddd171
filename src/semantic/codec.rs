//! Binary encoding for per-paper embedding blobs.
//!
//! Blob layout (version 1):
//!
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - embedding: [f32; dimensions] (little-endian)
//! - checksum: u32 (CRC32 of every byte before the checksum)

/// Current blob format version
const FORMAT_VERSION: u8 = 1;

/// Prefix size in bytes: version(1) + model_id(32) + dimensions(2)
const PREFIX_SIZE: usize = 35;

/// Trailing checksum size in bytes
const CHECKSUM_SIZE: usize = 4;

/// Errors that can occur while decoding a stored embedding blob.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BlobError {
    #[error("blob truncated: {0} bytes")]
    Truncated(usize),

    #[error("unsupported blob version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("checksum mismatch: blob may be corrupted")]
    ChecksumMismatch,

    #[error("length mismatch: header declares {dimensions} dimensions, payload has {payload} bytes")]
    LengthMismatch { dimensions: usize, payload: usize },

    #[error("component {0} is not a finite number")]
    NonFinite(usize),

    #[error("embedding has {0} dimensions, the format allows at most {max}", max = u16::MAX)]
    TooManyDimensions(usize),

    #[error("embedding is not unit length: norm {0}")]
    NotNormalized(f32),
}

/// Allowed distance of a stored embedding's L2 norm from 1.0
const NORM_TOLERANCE: f32 = 1e-3;

/// A decoded embedding together with the model it was produced by.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEmbedding {
    pub model_id: [u8; 32],
    pub vector: Vec<f32>,
}

impl DecodedEmbedding {
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Stored embeddings are L2-normalized, so dot products stay within [-1, 1].
    pub fn check_unit_norm(&self) -> Result<(), BlobError> {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if (norm - 1.0).abs() <= NORM_TOLERANCE {
            Ok(())
        } else {
            Err(BlobError::NotNormalized(norm))
        }
    }
}

/// Encode an embedding into a self-describing blob.
pub fn encode_embedding(model_id: &[u8; 32], embedding: &[f32]) -> Result<Vec<u8>, BlobError> {
    let dimensions =
        u16::try_from(embedding.len()).map_err(|_| BlobError::TooManyDimensions(embedding.len()))?;

    let mut blob = Vec::with_capacity(PREFIX_SIZE + embedding.len() * 4 + CHECKSUM_SIZE);
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(model_id);
    blob.extend_from_slice(&dimensions.to_le_bytes());
    for &value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }

    let checksum = crc32fast::hash(&blob);
    blob.extend_from_slice(&checksum.to_le_bytes());

    Ok(blob)
}

/// Decode a blob produced by [`encode_embedding`].
pub fn decode_embedding(blob: &[u8]) -> Result<DecodedEmbedding, BlobError> {
    if blob.len() < PREFIX_SIZE + CHECKSUM_SIZE {
        return Err(BlobError::Truncated(blob.len()));
    }

    let version = blob[0];
    if version != FORMAT_VERSION {
        return Err(BlobError::VersionMismatch(version, FORMAT_VERSION));
    }

    let (body, checksum_bytes) = blob.split_at(blob.len() - CHECKSUM_SIZE);
    let stored_checksum = u32::from_le_bytes([
        checksum_bytes[0],
        checksum_bytes[1],
        checksum_bytes[2],
        checksum_bytes[3],
    ]);
    if crc32fast::hash(body) != stored_checksum {
        return Err(BlobError::ChecksumMismatch);
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&body[1..33]);

    let dimensions = u16::from_le_bytes([body[33], body[34]]) as usize;
    let payload = &body[PREFIX_SIZE..];
    if payload.len() != dimensions * 4 {
        return Err(BlobError::LengthMismatch {
            dimensions,
            payload: payload.len(),
        });
    }

    let mut vector = Vec::with_capacity(dimensions);
    for (idx, chunk) in payload.chunks_exact(4).enumerate() {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(BlobError::NonFinite(idx));
        }
        vector.push(value);
    }

    Ok(DecodedEmbedding { model_id, vector })
}
