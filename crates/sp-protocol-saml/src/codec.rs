//! Transport encodings for SAML payloads.
//!
//! The web SSO profile moves XML around as base64 text, optionally
//! DEFLATE-compressed (raw stream, no zlib header). Inbound responses here
//! use base64 + raw DEFLATE; outbound requests use base64 only.
//!
//! Decompression is bounded: a stream that would inflate past
//! [`MAX_INFLATED_SIZE`] fails with `Decompress` instead of being
//! truncated. Truncation would hand the parser a silently incomplete
//! document, which is strictly worse than rejecting.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlSpError, SpResult};

/// Hard cap on decompressed payload size.
///
/// Real-world assertions are a few KiB; 64 KiB leaves two orders of
/// magnitude of headroom while keeping compression-bomb expansion bounded.
pub const MAX_INFLATED_SIZE: usize = 64 * 1024;

/// Decodes standard base64 text into bytes.
///
/// # Errors
///
/// Returns `Decode` on a non-canonical alphabet or bad padding.
pub fn decode_base64(text: &str) -> SpResult<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}

/// Encodes bytes as standard base64 text.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decompresses a raw DEFLATE stream (no zlib/gzip header).
///
/// # Errors
///
/// Returns `Decompress` if the stream is corrupt or the output would
/// exceed [`MAX_INFLATED_SIZE`].
pub fn inflate_raw(data: &[u8]) -> SpResult<Vec<u8>> {
    let decoder = DeflateDecoder::new(data);
    let mut inflated = Vec::new();

    // Read one byte past the cap so a payload exactly at the cap still
    // passes and anything larger is detected without inflating it all.
    decoder
        .take(MAX_INFLATED_SIZE as u64 + 1)
        .read_to_end(&mut inflated)?;

    if inflated.len() > MAX_INFLATED_SIZE {
        return Err(SamlSpError::Decompress(format!(
            "decompressed payload exceeds {MAX_INFLATED_SIZE} byte limit"
        )));
    }

    Ok(inflated)
}

/// Compresses bytes into a raw DEFLATE stream.
///
/// Inverse of [`inflate_raw`], used for request-side encoding and test
/// fixtures.
///
/// # Errors
///
/// Returns `Decompress` if the encoder fails, which indicates an I/O-level
/// fault rather than bad input.
pub fn deflate_raw(data: &[u8]) -> SpResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
