//! Stream type classification.

use bridge_traits::{MediaTime, TimeRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of stream the current item plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    #[default]
    Unknown,
    OnDemand,
    Live,
    /// Live stream with a seekable window of recent content.
    Dvr,
}

impl StreamType {
    /// Derives the stream type from an item's seekable range and duration.
    ///
    /// Checks are ordered: invalid input first, then liveness, then DVR.
    pub fn classify(seekable: &TimeRange, duration: MediaTime) -> StreamType {
        if !seekable.is_valid() || !duration.is_valid() {
            StreamType::Unknown
        } else if seekable.is_empty() && !duration.is_numeric() {
            StreamType::Live
        } else if duration.is_indefinite() {
            StreamType::Dvr
        } else {
            StreamType::OnDemand
        }
    }

    /// Whether positions inside the stream can be sought to.
    pub fn is_seekable(&self) -> bool {
        matches!(self, StreamType::OnDemand | StreamType::Dvr)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Unknown => "unknown",
            StreamType::OnDemand => "on_demand",
            StreamType::Live => "live",
            StreamType::Dvr => "dvr",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
