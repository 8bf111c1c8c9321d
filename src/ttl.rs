//! Expiration handling
//!
//! Callers give an absolute expiration instant; the transport wants a
//! relative number of seconds. Conversion rounds up so an entry never
//! expires before the requested instant.

use std::time::{Duration, SystemTime};

use crate::error::{CacheError, Result};

/// Longest relative TTL the transport accepts (30 days)
pub const MAX_TTL_SECS: u32 = 30 * 24 * 60 * 60;

/// When a cache entry expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Never expires (TTL 0)
    Never,

    /// Expires at the given instant
    At(SystemTime),
}

impl Expiration {
    /// Expire `ttl` from now
    pub fn after(ttl: Duration) -> Self {
        Expiration::At(SystemTime::now() + ttl)
    }

    /// Relative TTL in whole seconds, measured from now
    pub fn ttl_secs(&self) -> Result<u32> {
        self.ttl_secs_at(SystemTime::now())
    }

    /// Relative TTL in whole seconds, measured from `now`.
    ///
    /// Returns 0 for [`Expiration::Never`]. Instants that are not in the
    /// future, or lie more than 30 days ahead, are rejected.
    pub fn ttl_secs_at(&self, now: SystemTime) -> Result<u32> {
        let at = match self {
            Expiration::Never => return Ok(0),
            Expiration::At(at) => *at,
        };

        let remaining = at
            .duration_since(now)
            .ok()
            .filter(|remaining| !remaining.is_zero())
            .ok_or_else(|| {
                CacheError::InvalidArgument("expiration must lie in the future".to_string())
            })?;

        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }

        if secs > MAX_TTL_SECS as u64 {
            return Err(CacheError::InvalidArgument(format!(
                "expiration is {}s ahead (max {}s)",
                secs, MAX_TTL_SECS
            )));
        }
        Ok(secs as u32)
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}
