pub mod color;
pub mod composition;
pub mod font_manager;
pub mod segmentation;
pub mod stock_photo;

// Re-export commonly used services
pub use color::ColorProfiler;
pub use composition::CompositionScorer;
pub use font_manager::FontManager;
pub use segmentation::RegionSegmenter;
pub use stock_photo::StockPhotoResolver;
