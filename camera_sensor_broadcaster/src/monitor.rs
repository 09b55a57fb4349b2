//! Frame monitoring for delivered messages.
//!
//! Consumer-side helper: summarizes received images and optionally writes
//! one JSON line per frame.

use broadcaster_common::msgs::{Image, Time};
use serde::Serialize;
use std::io::Write;

/// Metadata of one delivered frame (payload bytes omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    /// Message stamp.
    pub stamp: Time,
    /// Coordinate frame.
    pub frame_id: String,
    /// Rows.
    pub height: u32,
    /// Columns.
    pub width: u32,
    /// Encoding tag.
    pub encoding: String,
    /// Row length in bytes.
    pub step: u32,
    /// Payload length in bytes.
    pub bytes: usize,
    /// Wrapping byte sum of the payload.
    pub checksum: u32,
}

impl FrameSummary {
    /// Summarize `img`.
    pub fn from_image(img: &Image) -> Self {
        Self {
            stamp: img.header.stamp,
            frame_id: img.header.frame_id.clone(),
            height: img.height,
            width: img.width,
            encoding: img.encoding.clone(),
            step: img.step,
            bytes: img.data.len(),
            checksum: img
                .data
                .iter()
                .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b))),
        }
    }

    /// Write this summary as a single JSON line.
    pub fn write_json_line<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_common::msgs::Header;

    fn image() -> Image {
        Image {
            header: Header {
                stamp: Time { sec: 10, nanosec: 5 },
                frame_id: "camera_sensor_frame".into(),
            },
            height: 1,
            width: 3,
            encoding: "mono8".into(),
            is_bigendian: 0,
            step: 3,
            data: vec![200, 100, 1],
        }
    }

    #[test]
    fn summary_fields() {
        let s = FrameSummary::from_image(&image());
        assert_eq!(s.bytes, 3);
        assert_eq!(s.checksum, 301);
        assert_eq!(s.frame_id, "camera_sensor_frame");
    }

    #[test]
    fn json_line_roundtrips_through_serde_json() {
        let mut out = Vec::new();
        FrameSummary::from_image(&image())
            .write_json_line(&mut out)
            .unwrap();

        assert_eq!(out.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["encoding"], "mono8");
        assert_eq!(value["stamp"]["sec"], 10);
        assert_eq!(value["bytes"], 3);
    }
}
