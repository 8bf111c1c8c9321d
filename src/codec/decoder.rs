//! Payload decoder
//!
//! Parses a reassembled, decompressed payload back into a value.

use bytes::Bytes;

use crate::error::{CacheError, Result};
use crate::registry::TypeRegistry;
use crate::value::CacheValue;

use super::header::{PayloadHeader, HEADER_SIZE};

/// Decode a complete payload.
///
/// The payload must already be decompressed: a set compressed flag is
/// reported as corruption rather than guessed at.
pub fn decode_payload(payload: Bytes, registry: &TypeRegistry) -> Result<CacheValue> {
    let header = PayloadHeader::from_bytes(&payload)?;
    if header.compressed {
        return Err(CacheError::Corrupt(
            "payload is still compressed".to_string(),
        ));
    }

    let name_len = header.type_name_len as usize;
    if name_len == 0 {
        return Ok(CacheValue::Bytes(payload.slice(HEADER_SIZE..)));
    }

    let body_start = HEADER_SIZE + name_len;
    if payload.len() < body_start {
        return Err(CacheError::Corrupt(format!(
            "incomplete type name: expected {} bytes, got {}",
            name_len,
            payload.len() - HEADER_SIZE
        )));
    }

    let name = std::str::from_utf8(&payload[HEADER_SIZE..body_start])
        .map_err(|e| CacheError::Corrupt(format!("type name is not UTF-8: {}", e)))?;
    let body = std::str::from_utf8(&payload[body_start..])
        .map_err(|e| CacheError::Corrupt(format!("body of '{}' is not UTF-8: {}", name, e)))?;

    registry.decode(name, body)
}
