use std::time::Duration;

use serde::Serialize;

use crate::manifest::Segment;
use crate::reader::ReaderState;
use crate::stats::StatsSnapshot;

/// Display classification of a known segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Loaded,
    PendingLocked,
    PendingUnlocked,
}

impl From<&Segment> for SegmentStatus {
    fn from(segment: &Segment) -> Self {
        if segment.loaded {
            SegmentStatus::Loaded
        } else if segment.locked {
            SegmentStatus::PendingLocked
        } else {
            SegmentStatus::PendingUnlocked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    pub name: String,
    pub status: SegmentStatus,
}

/// Everything the reporting layer shows for one reader, taken at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct ReaderReport {
    pub id: usize,
    pub state: ReaderState,
    #[serde(serialize_with = "serialize_secs")]
    pub poll_interval: Duration,
    pub in_flight: usize,
    pub stats: StatsSnapshot,
    /// Effective bitrate in Mbps, absent before the first completed download
    pub bitrate_mbps: Option<f64>,
    pub segments: Vec<SegmentReport>,
}

impl ReaderReport {
    pub fn new(
        id: usize,
        state: ReaderState,
        poll_interval: Duration,
        in_flight: usize,
        stats: StatsSnapshot,
        segments: &[Segment],
    ) -> Self {
        Self {
            id,
            state,
            poll_interval,
            in_flight,
            bitrate_mbps: stats.effective_bitrate_mbps(),
            stats,
            segments: segments
                .iter()
                .map(|segment| SegmentReport {
                    name: segment.name.clone(),
                    status: segment.into(),
                })
                .collect(),
        }
    }

    pub fn count(&self, status: SegmentStatus) -> usize {
        self.segments.iter().filter(|s| s.status == status).count()
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
