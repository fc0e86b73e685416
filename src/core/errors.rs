// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining
//
// Propagation policy: only decode-level (AnalysisError) and format-level
// (TemplateError) failures reach the caller. A single sub-analyzer or a
// single photo provider failing is recovered at its own boundary.

use serde::Serialize;
use thiserror::Error;

/// Fatal analysis errors. Anything else is downgraded to a field-level
/// `SubAnalysisError` marker inside the result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Image decode failed: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Analysis task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Analysis sub-stages that can fail independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Color,
    Regions,
    Composition,
    Background,
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalysisStage::Color => "color",
            AnalysisStage::Regions => "regions",
            AnalysisStage::Composition => "composition",
            AnalysisStage::Background => "background",
        };
        f.write_str(name)
    }
}

/// A recovered sub-stage failure. Carried inside `AnalysisResult::errors`
/// while the affected field falls back to its default value.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{stage} analysis failed: {message}")]
pub struct SubAnalysisError {
    pub stage: AnalysisStage,
    pub message: String,
}

impl SubAnalysisError {
    pub fn new(stage: AnalysisStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Stock photo provider errors. Recovered inside the fallback chain
/// (logged, then the chain moves on to the next provider).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No credentials configured for {0}")]
    MissingCredentials(&'static str),

    #[error("API request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("{provider} returned status {status}")]
    BadStatus { provider: &'static str, status: u16 },

    #[error("{0} returned no usable photo")]
    EmptyResponse(&'static str),
}

/// Template synthesis / persistence / rendering errors. Fatal for the
/// operation: a malformed template must not be silently rendered.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unknown style: {0}")]
    UnknownStyle(String),

    #[error("Malformed template: {0}")]
    Format(String),

    #[error("Element tag {tag:?} has no matching placeholder")]
    OrphanElement { tag: String },

    #[error("Element box exceeds {width}x{height} canvas")]
    OutOfCanvas { width: u32, height: u32 },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Template I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("Max palette size must be in [1, 16], got {0}")]
    InvalidPaletteSize(usize),

    #[error("Cache TTL must be > 0 seconds")]
    InvalidCacheTtl,

    #[error("Provider timeout must be in [1, 120] seconds, got {0}")]
    InvalidProviderTimeout(u64),

    #[error("Invalid fonts path: {0}")]
    InvalidFontsPath(String),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type TemplateResult<T> = Result<T, TemplateError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
