pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    AnalysisError, ConfigError, ProviderError, SubAnalysisError, TemplateError,
};
pub use types::{
    AnalysisMode, AnalysisResult, BackgroundInfo, BackgroundKind, Bbox, ColorSwatch,
    CompositionReport, Dimensions, ImageRegion, LayoutInfo, Placeholder, PlaceholderKind,
    RegionKind, StockPhotoQuery, StockPhotoResult, TextRegion,
};
