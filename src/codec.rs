//! Binary form of an enhancement set.
//!
//! `(version, bases, rules)` is serialised with MessagePack, compressed and
//! written as URL-safe base64 without padding. Blobs written by older
//! releases used zlib instead of zstd; decoding tells them apart by the zstd
//! frame magic.

use crate::error::{EnhancerError, Result};
use crate::rules::RuleStructure;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::de::IgnoredAny;
use std::io::{Read, Write};
use tracing::debug;

/// Versions this build can decode
pub const SUPPORTED_VERSIONS: &[u32] = &[2];
/// Version written by the encoder
pub const LATEST_VERSION: u32 = 2;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const ZSTD_LEVEL: i32 = 3;
const MAX_DECOMPRESSED_SIZE: u64 = 50 * 1024 * 1024; // 50 MB

/// `(version, bases, rules)`
pub type EnhancementsStructure = (u32, Vec<String>, Vec<RuleStructure>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Zstd,
    /// Older scheme, still accepted when decoding
    Zlib,
}

impl Compression {
    /// Detect the scheme from the leading bytes of a payload.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::Zlib
        }
    }

    fn compress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compression::Zstd => zstd::encode_all(data, ZSTD_LEVEL),
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }

    fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decompressed = Vec::with_capacity(data.len() * 4);
        match self {
            Compression::Zstd => {
                zstd::stream::read::Decoder::new(data)?
                    .take(MAX_DECOMPRESSED_SIZE)
                    .read_to_end(&mut decompressed)?;
            }
            Compression::Zlib => {
                ZlibDecoder::new(data)
                    .take(MAX_DECOMPRESSED_SIZE)
                    .read_to_end(&mut decompressed)?;
            }
        }
        Ok(decompressed)
    }
}

/// Encode a structure with the default compression.
pub fn encode(structure: &EnhancementsStructure) -> Result<String> {
    encode_with(structure, Compression::default())
}

pub fn encode_with(structure: &EnhancementsStructure, compression: Compression) -> Result<String> {
    let packed = rmp_serde::to_vec(structure)
        .map_err(|e| EnhancerError::decode_with("failed to serialize rule set", e))?;
    let compressed = compression
        .compress(&packed)
        .map_err(|e| EnhancerError::decode_with("failed to compress rule set", e))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode an encoded rule set back into its structure.
///
/// The version is checked before the rules are interpreted, so a blob from a
/// newer release fails with [`EnhancerError::Version`] rather than a
/// structural error.
pub fn decode(encoded: &str) -> Result<EnhancementsStructure> {
    let mut padded = encoded.trim().to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let compressed = URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| EnhancerError::decode_with("invalid base64", e))?;

    let compression = Compression::sniff(&compressed);
    let packed = compression
        .decompress(&compressed)
        .map_err(|e| EnhancerError::decode_with(format!("{compression:?} decompression failed"), e))?;
    debug!("Decoding {} byte {:?} rule set", packed.len(), compression);

    // read the version as a wide signed integer so negative or oversized
    // values still report as a version mismatch
    let (version, _, _): (i64, IgnoredAny, IgnoredAny) = rmp_serde::from_slice(&packed)
        .map_err(|e| EnhancerError::decode_with("malformed rule set header", e))?;
    if !u32::try_from(version).is_ok_and(|v| SUPPORTED_VERSIONS.contains(&v)) {
        return Err(EnhancerError::version(version));
    }

    rmp_serde::from_slice(&packed).map_err(|e| EnhancerError::decode_with("malformed rule set", e))
}
