// End-to-end pipeline: analyze an image, map placeholders, synthesize
// a template, and render previews.

pub mod analyzer;
pub mod placeholder;
pub mod preview;
pub mod synthesizer;

pub use analyzer::ImageAnalyzer;
pub use placeholder::PlaceholderMapper;
pub use preview::PreviewRenderer;
pub use synthesizer::TemplateSynthesizer;
