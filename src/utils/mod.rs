pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{
    cover_fit, downsample_for_analysis, encode_jpeg_async, load_image_from_memory_async,
};
pub use metrics::Metrics;
