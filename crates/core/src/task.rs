//! Video task input and per-task result types.
//!
//! A [`VideoTask`] corresponds to one row of the spreadsheet a user
//! uploaded. It is owned by the caller and only read by the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Credits, DbId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 4_000;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Generation model tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoModel {
    Standard,
    Premium,
}

impl VideoModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
}

impl Resolution {
    /// `true` for the higher of the two resolution tiers.
    pub fn is_high_tier(self) -> bool {
        matches!(self, Self::Hd1080)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }
}

/// Clip duration. Only two lengths are offered.
///
/// Serialized as the number of seconds; any other number is rejected
/// during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ClipDuration {
    Short,
    Long,
}

impl ClipDuration {
    pub fn secs(self) -> u32 {
        match self {
            Self::Short => 10,
            Self::Long => 15,
        }
    }

    /// Snap an arbitrary number of seconds to the nearest supported
    /// duration. Ties go to [`ClipDuration::Long`].
    pub fn nearest(secs: u32) -> Self {
        let short_gap = secs.abs_diff(Self::Short.secs());
        let long_gap = secs.abs_diff(Self::Long.secs());
        if long_gap <= short_gap {
            Self::Long
        } else {
            Self::Short
        }
    }
}

impl TryFrom<u32> for ClipDuration {
    type Error = CoreError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        match secs {
            10 => Ok(Self::Short),
            15 => Ok(Self::Long),
            other => Err(CoreError::Validation(format!(
                "Unsupported duration {other}s. Must be 10 or 15"
            ))),
        }
    }
}

impl From<ClipDuration> for u32 {
    fn from(value: ClipDuration) -> Self {
        value.secs()
    }
}

/// Aspect ratio values understood by the generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Square,
}

impl AspectRatio {
    /// Map a user-supplied ratio string. Unknown values fall back to
    /// landscape.
    pub fn from_user_input(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("9:16" | "portrait") => Self::Portrait,
            Some("1:1" | "square") => Self::Square,
            _ => Self::Landscape,
        }
    }
}

/// Whether the provider animates a source image or starts from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    TextToVideo,
    ImageToVideo,
}

// ---------------------------------------------------------------------------
// VideoTask
// ---------------------------------------------------------------------------

/// One video to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTask {
    /// Source spreadsheet row this task came from.
    pub row_index: u32,
    pub model: VideoModel,
    pub resolution: Resolution,
    pub duration: ClipDuration,
    pub prompt: String,
    #[serde(default)]
    pub enhanced_prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
}

impl VideoTask {
    /// Validate user-provided fields that the type system does not cover.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Row {}: prompt must not be empty",
                self.row_index
            )));
        }
        if self.prompt.chars().count() > MAX_PROMPT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Row {}: prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters",
                self.row_index
            )));
        }
        if let Some(url) = &self.image_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CoreError::Validation(format!(
                    "Row {}: image URL must be http(s), got '{url}'",
                    self.row_index
                )));
            }
        }
        Ok(())
    }

    /// Credits this task costs when it succeeds.
    pub fn credit_cost(&self) -> Credits {
        crate::cost::credit_cost(self.model, self.resolution, self.duration)
    }

    pub fn generation_mode(&self) -> GenerationMode {
        if self.image_url.is_some() {
            GenerationMode::ImageToVideo
        } else {
            GenerationMode::TextToVideo
        }
    }

    /// The prompt to send: the enhanced variant when present and
    /// non-blank, otherwise the raw prompt.
    pub fn effective_prompt(&self) -> &str {
        match self.enhanced_prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => &self.prompt,
        }
    }

    pub fn provider_aspect_ratio(&self) -> AspectRatio {
        AspectRatio::from_user_input(self.aspect_ratio.as_deref())
    }

    /// Descriptive metadata stored alongside the generated asset.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "product_name": self.product_name,
            "product_description": self.product_description,
            "aspect_ratio": self.provider_aspect_ratio(),
            "resolution": self.resolution,
            "duration_secs": self.duration.secs(),
            "mode": self.generation_mode(),
            "source_image_url": self.image_url,
        })
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// Outcome of one task after all of its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub row_index: u32,
    pub success: bool,
    pub asset_id: Option<DbId>,
    pub video_url: Option<String>,
    pub error: Option<String>,
    /// Attempts made beyond the first. A task that exhausts its retry
    /// budget reports the policy's `max_attempts` instead, so a single
    /// failed attempt under a one-attempt policy reports 1.
    pub retries: u32,
}

impl TaskResult {
    pub fn succeeded(row_index: u32, asset_id: DbId, video_url: String, retries: u32) -> Self {
        Self {
            row_index,
            success: true,
            asset_id: Some(asset_id),
            video_url: Some(video_url),
            error: None,
            retries,
        }
    }

    pub fn failed(row_index: u32, error: impl Into<String>, retries: u32) -> Self {
        Self {
            row_index,
            success: false,
            asset_id: None,
            video_url: None,
            error: Some(error.into()),
            retries,
        }
    }
}
