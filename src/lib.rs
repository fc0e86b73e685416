// Library exports for the template extraction workflow: image analysis,
// placeholder mapping, template synthesis, and preview rendering.

pub mod core;
pub mod pipeline;
pub mod services;
pub mod template;
pub mod utils;

pub use core::{
    config::Config,
    errors::{AnalysisError, ConfigError, ProviderError, TemplateError},
    types::{
        AnalysisMode, AnalysisResult, Bbox, CompositionReport, Placeholder, PlaceholderKind,
        RegionKind, StockPhotoQuery, StockPhotoResult,
    },
};

pub use pipeline::{ImageAnalyzer, PlaceholderMapper, PreviewRenderer, TemplateSynthesizer};

pub use services::{
    ColorProfiler, CompositionScorer, FontManager, RegionSegmenter, StockPhotoResolver,
};
pub use services::color::ColorProfile;

pub use template::{StyleRegistry, Template};

pub use utils::{image_ops::load_image_from_memory_async, metrics::Metrics};
