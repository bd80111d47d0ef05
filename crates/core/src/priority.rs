//! Fast/slow tier partitioning and chunk profiling.
//!
//! Cheap renders go first so users see results early and the error rate
//! is known before the expensive renders start.

use serde::{Deserialize, Serialize};

use crate::task::{ClipDuration, Resolution, VideoModel, VideoTask};

/// Which queue a task is scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueTier {
    Fast,
    Slow,
}

impl QueueTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }
}

/// Slow tier: high resolution AND long duration. Everything else is fast.
pub fn tier_of(task: &VideoTask) -> QueueTier {
    if task.resolution.is_high_tier() && task.duration == ClipDuration::Long {
        QueueTier::Slow
    } else {
        QueueTier::Fast
    }
}

/// A batch split into its two ordered tiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedTasks {
    /// Sorted by ascending duration; equal durations keep input order.
    pub fast: Vec<VideoTask>,
    /// Input order.
    pub slow: Vec<VideoTask>,
}

/// Split `tasks` into the fast and slow tiers.
pub fn partition(tasks: Vec<VideoTask>) -> PartitionedTasks {
    let (mut fast, slow): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .partition(|t| tier_of(t) == QueueTier::Fast);
    // `sort_by_key` is stable.
    fast.sort_by_key(|t| t.duration.secs());
    PartitionedTasks { fast, slow }
}

// ---------------------------------------------------------------------------
// Chunk profile
// ---------------------------------------------------------------------------

/// The task profile used to look up concurrency for a chunk.
///
/// Chunks are assumed homogeneous in model: the first task's model is
/// used for the whole chunk. Resolution is the majority value (ties pick
/// the higher tier) and duration is the rounded mean snapped to the
/// nearest supported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProfile {
    pub model: VideoModel,
    pub resolution: Resolution,
    pub duration: ClipDuration,
}

impl ChunkProfile {
    /// Returns `None` for an empty chunk.
    pub fn from_chunk(chunk: &[VideoTask]) -> Option<Self> {
        let first = chunk.first()?;

        let high = chunk.iter().filter(|t| t.resolution.is_high_tier()).count();
        let resolution = if high * 2 >= chunk.len() {
            Resolution::Hd1080
        } else {
            Resolution::Hd720
        };

        let total_secs: u32 = chunk.iter().map(|t| t.duration.secs()).sum();
        let mean = (f64::from(total_secs) / chunk.len() as f64).round() as u32;

        Some(Self {
            model: first.model,
            resolution,
            duration: ClipDuration::nearest(mean),
        })
    }
}
