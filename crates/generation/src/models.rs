//! Wire types for the generation provider.
//!
//! Every response is wrapped in an envelope of the shape
//! `{"code": 200, "msg": "success", "data": {...}}`.

use clipcart_core::task::{AspectRatio, GenerationMode, Resolution, VideoModel, VideoTask};
use serde::{Deserialize, Serialize};

/// Body of a render submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: VideoModel,
    pub mode: GenerationMode,
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
    pub duration: u32,
}

impl GenerationRequest {
    /// Build the provider request for a task.
    pub fn for_task(task: &VideoTask) -> Self {
        Self {
            model: task.model,
            mode: task.generation_mode(),
            prompt: task.effective_prompt().to_string(),
            image_urls: task.image_url.iter().cloned().collect(),
            aspect_ratio: task.provider_aspect_ratio(),
            quality: Quality::from(task.resolution),
            duration: task.duration.secs(),
        }
    }
}

/// Provider quality setting, derived from resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Standard,
    Hd,
}

impl From<Resolution> for Quality {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Hd720 => Self::Standard,
            Resolution::Hd1080 => Self::Hd,
        }
    }
}

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Returned after a render is queued.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "taskId")]
    pub task_id: String,
}

/// Render lifecycle as reported by the provider.
///
/// The provider is inconsistent about spelling, so several aliases map
/// to each state. Anything unrecognised is [`TaskState::Unknown`] and is
/// treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[serde(alias = "queued", alias = "processing", alias = "running", alias = "generating")]
    Pending,
    #[serde(alias = "success", alias = "succeeded")]
    Completed,
    #[serde(alias = "fail", alias = "error")]
    Failed,
    #[serde(other)]
    Unknown,
}

/// Status of a submitted render.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    #[serde(alias = "taskId")]
    pub task_id: String,
    #[serde(alias = "status")]
    pub state: TaskState,
    #[serde(default, alias = "resultUrl")]
    pub result_url: Option<String>,
    #[serde(default, alias = "errorMessage")]
    pub error_message: Option<String>,
}
