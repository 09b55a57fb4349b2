//! Message types published by broadcasters.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp (seconds + nanoseconds since the Unix epoch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    /// Whole seconds.
    pub sec: i64,
    /// Nanoseconds within the second, `< 1_000_000_000`.
    pub nanosec: u32,
}

impl Time {
    /// Current system time. Does not allocate.
    #[inline]
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from_duration)
            .unwrap_or_default()
    }

    /// Build from an offset since the epoch.
    pub const fn from_duration(d: Duration) -> Self {
        Self {
            sec: d.as_secs() as i64,
            nanosec: d.subsec_nanos(),
        }
    }

    /// Total nanoseconds since the epoch.
    pub const fn as_nanos(&self) -> i128 {
        self.sec as i128 * 1_000_000_000 + self.nanosec as i128
    }
}

/// Standard metadata attached to every sensor message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Acquisition time of the payload.
    pub stamp: Time,
    /// Coordinate frame the payload is expressed in.
    pub frame_id: String,
}

/// Uncompressed image.
///
/// `data` holds `step * height` bytes, row-major, laid out according to
/// `encoding`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Stamp and frame.
    pub header: Header,
    /// Number of rows.
    pub height: u32,
    /// Number of columns.
    pub width: u32,
    /// Pixel encoding tag (`rgb8`, `bgr8`, `mono16`, ...).
    pub encoding: String,
    /// Non-zero if multi-byte pixel values are big-endian.
    pub is_bigendian: u8,
    /// Row length in bytes.
    pub step: u32,
    /// Raw pixel bytes.
    pub data: Vec<u8>,
}

impl Image {
    /// Expected payload length in bytes (`step * height`), saturating at `usize::MAX`.
    #[inline]
    pub fn expected_len(&self) -> usize {
        (self.step as usize).saturating_mul(self.height as usize)
    }
}
