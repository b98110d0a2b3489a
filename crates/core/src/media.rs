//! Media kinds accepted for upload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared kind of an uploaded artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Dashcam / helmet camera footage.
    VideoMp4,
    /// GPS track in GPX format.
    GpsGpx,
    /// Raw sensor log (accelerometer, gyro, cadence...).
    SensorCsv,
    /// Still image or thumbnail.
    ImageJpeg,
}

impl MediaKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoMp4 => "video_mp4",
            Self::GpsGpx => "gps_gpx",
            Self::SensorCsv => "sensor_csv",
            Self::ImageJpeg => "image_jpeg",
        }
    }

    /// Whether a finished artifact of this kind becomes the segment's primary recording.
    ///
    /// The catalog copies size and hash of such artifacts onto the segment record.
    pub fn is_segment_primary(&self) -> bool {
        matches!(self, Self::VideoMp4)
    }
}

impl FromStr for MediaKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "video_mp4" => Ok(Self::VideoMp4),
            "gps_gpx" => Ok(Self::GpsGpx),
            "sensor_csv" => Ok(Self::SensorCsv),
            "image_jpeg" => Ok(Self::ImageJpeg),
            other => Err(crate::Error::InvalidMediaKind(other.to_string())),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
