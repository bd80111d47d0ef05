//! Credit cost table.
//!
//! Cost is a pure function of model, resolution, and duration.

use crate::task::{ClipDuration, Resolution, VideoModel, VideoTask};
use crate::types::Credits;

/// Multiplier applied to the standard-model price for the premium model.
pub const PREMIUM_MULTIPLIER: Credits = 3;

/// Credits charged for one task.
///
/// | model    | 720p/10s | 720p/15s | 1080p/10s | 1080p/15s |
/// |----------|---------:|---------:|----------:|----------:|
/// | standard | 20       | 30       | 40        | 60        |
/// | premium  | 60       | 90       | 120       | 180       |
pub fn credit_cost(model: VideoModel, resolution: Resolution, duration: ClipDuration) -> Credits {
    let base = match (resolution, duration) {
        (Resolution::Hd720, ClipDuration::Short) => 20,
        (Resolution::Hd720, ClipDuration::Long) => 30,
        (Resolution::Hd1080, ClipDuration::Short) => 40,
        (Resolution::Hd1080, ClipDuration::Long) => 60,
    };
    match model {
        VideoModel::Standard => base,
        VideoModel::Premium => base * PREMIUM_MULTIPLIER,
    }
}

/// Total cost of every task in a batch.
pub fn batch_cost(tasks: &[VideoTask]) -> Credits {
    tasks.iter().map(VideoTask::credit_cost).sum()
}
