//! Chunking
//!
//! Splits a payload too large for a single transport entry into pieces
//! stored under derived keys, and merges the pieces back.
//!
//! ## Key Layout
//! ```text
//! key          chunk 0 (carries the header)
//! key-PART1    chunk 1
//! key-PART2    chunk 2
//! ...
//! ```

use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{PayloadHeader, MAX_CHUNK_COUNT};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Suffix joining a key to its chunk index
pub const PART_SUFFIX: &str = "-PART";

/// Transport key of chunk `index` (chunk 0 lives under the key itself)
pub fn chunk_key(key: &str, index: usize) -> String {
    if index == 0 {
        key.to_string()
    } else {
        format!("{}{}{}", key, PART_SUFFIX, index)
    }
}

/// Compute chunk boundaries for a payload of `total` bytes.
///
/// Up to `threshold` bytes fit in one chunk. Larger payloads are split into
/// the smallest number `n >= 2` of equal pieces no larger than `threshold`.
/// A remainder above `remainder_min` gets a trailing chunk of its own,
/// otherwise it is folded into chunk 0.
pub fn plan_chunks(total: usize, threshold: usize, remainder_min: usize) -> Vec<Range<usize>> {
    if total <= threshold {
        return vec![0..total];
    }

    let mut n = 2;
    while total / n > threshold {
        n += 1;
    }
    let base = total / n;
    let remainder = total % n;

    if remainder > remainder_min {
        let mut ranges: Vec<Range<usize>> = (0..n).map(|i| i * base..(i + 1) * base).collect();
        ranges.push(n * base..total);
        ranges
    } else {
        let mut ranges = Vec::with_capacity(n);
        ranges.push(0..base + remainder);
        for i in 1..n {
            let start = remainder + i * base;
            ranges.push(start..start + base);
        }
        ranges
    }
}

/// Stamp the chunk count into the header and split the payload.
///
/// The returned pieces share the payload's allocation.
pub fn split_payload(mut payload: BytesMut, config: &Config) -> Result<Vec<Bytes>> {
    let ranges = plan_chunks(payload.len(), config.chunk_threshold, config.remainder_chunk_min);
    if ranges.len() > MAX_CHUNK_COUNT {
        return Err(CacheError::ValueTooLarge(format!(
            "{} bytes need {} chunks (max {})",
            payload.len(),
            ranges.len(),
            MAX_CHUNK_COUNT
        )));
    }

    let mut header = PayloadHeader::from_bytes(&payload)?;
    header.chunk_count = ranges.len() as u16;
    header.write_to(&mut payload);

    let payload = payload.freeze();
    Ok(ranges.into_iter().map(|range| payload.slice(range)).collect())
}

/// Number of chunks declared by the header at the start of chunk 0
pub fn declared_chunks(first: &[u8]) -> Result<usize> {
    let header = PayloadHeader::from_bytes(first)?;
    if header.chunk_count == 0 {
        return Err(CacheError::Corrupt("chunk count is zero".to_string()));
    }
    Ok(header.chunk_count as usize)
}

/// Concatenate chunks in index order
pub fn merge_chunks(mut chunks: Vec<Bytes>) -> Bytes {
    if chunks.len() == 1 {
        return chunks.pop().unwrap_or_default();
    }

    let total = chunks.iter().map(Bytes::len).sum();
    let mut merged = BytesMut::with_capacity(total);
    for chunk in &chunks {
        merged.put_slice(chunk);
    }
    merged.freeze()
}
