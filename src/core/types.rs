// Shared data model for the analysis -> template -> preview workflow

use serde::{Deserialize, Serialize};

use crate::core::errors::SubAnalysisError;

/// Axis-aligned bounding box in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bbox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// True if the two boxes share at least one pixel.
    pub fn intersects(&self, other: &Bbox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Shrink the box so it fits inside a `width` x `height` canvas.
    /// Returns `None` when the box lies entirely outside the canvas.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Bbox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Bbox::new(self.x, self.y, w, h))
    }
}

/// How much work the analyzer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Downsampled frequency palette only; region sets stay empty.
    Lightweight,
    /// Palette clustering, region segmentation, composition scoring.
    Full,
}

/// Pixel dimensions of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// One dominant color with coverage percentage and a human-readable name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorSwatch {
    pub rgb: [u8; 3],
    pub hex: String,
    pub name: String,
    /// Share of sampled pixels in [0.0, 100.0].
    pub percentage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTemperature {
    Warm,
    Cool,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMood {
    Energetic,
    Natural,
    Calm,
    Cheerful,
    Sophisticated,
    Balanced,
}

/// A detected text area with optional styling hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub bbox: Bbox,
    pub confidence: f32,
    /// Only populated when confidence clears the styling threshold.
    pub estimated_font_size: Option<u32>,
    /// Semantic tag candidate (TITLE, PRICE, ...). First-come unique
    /// within one analysis; later duplicates stay `None`.
    pub suggested_tag: Option<String>,
}

/// Whether a picture region looks like a real photograph or flat
/// placeholder artwork (icons, illustrations, solid panels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    RealPhoto,
    PlaceholderIcon,
}

/// A detected picture area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegion {
    pub bbox: Bbox,
    pub confidence: f32,
    pub kind: RegionKind,
    /// Numeric placeholder tag (IMAGE_1, IMAGE_2, ...), unique within
    /// one analysis.
    pub tag: Option<String>,
}

/// A structural area that is neither text nor a picture (panels, bars).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRegion {
    pub bbox: Bbox,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub regions: Vec<LayoutRegion>,
    pub grid_detected: bool,
    pub layout_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Solid,
    Gradient,
    Pattern,
}

/// Estimated background of the source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundInfo {
    pub color_hex: String,
    pub kind: BackgroundKind,
    /// Luminance variance of border samples.
    pub variance: f64,
}

impl Default for BackgroundInfo {
    fn default() -> Self {
        Self {
            color_hex: "#ffffff".to_string(),
            kind: BackgroundKind::Solid,
            variance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Visual weight (inverted brightness) per image quadrant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuadrantWeights {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl QuadrantWeights {
    pub fn dominant(&self) -> Quadrant {
        let pairs = [
            (Quadrant::TopLeft, self.top_left),
            (Quadrant::TopRight, self.top_right),
            (Quadrant::BottomLeft, self.bottom_left),
            (Quadrant::BottomRight, self.bottom_right),
        ];
        pairs
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(q, _)| q)
            .unwrap_or(Quadrant::TopLeft)
    }

    pub fn balance(&self) -> f32 {
        let vals = [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ];
        let mean = vals.iter().sum::<f32>() / 4.0;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        var.sqrt()
    }
}

/// Composition scores, each guaranteed to be finite and in [0.0, 1.0]
/// except quadrant weights, which are raw inverted-brightness means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionReport {
    pub rule_of_thirds: f32,
    pub vertical_symmetry: f32,
    pub horizontal_symmetry: f32,
    pub quadrant_weights: QuadrantWeights,
    pub dominant_quadrant: Quadrant,
    pub edge_density: f32,
    pub weight_balance: f32,
}

impl Default for CompositionReport {
    fn default() -> Self {
        Self {
            rule_of_thirds: 0.0,
            vertical_symmetry: 0.0,
            horizontal_symmetry: 0.0,
            quadrant_weights: QuadrantWeights::default(),
            dominant_quadrant: Quadrant::TopLeft,
            edge_density: 0.0,
            weight_balance: 0.0,
        }
    }
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub mode: AnalysisMode,
    pub dimensions: Dimensions,
    pub colors: Vec<ColorSwatch>,
    pub color_temperature: ColorTemperature,
    pub color_mood: ColorMood,
    /// Mean channel value over sampled pixels, in [0.0, 255.0].
    pub average_brightness: f32,
    pub text_regions: Vec<TextRegion>,
    pub image_regions: Vec<ImageRegion>,
    pub layout: LayoutInfo,
    pub background: BackgroundInfo,
    pub composition: CompositionReport,
    /// Platform fit score in [0, 100].
    pub platform_score: u8,
    pub recommendations: Vec<String>,
    /// Sub-stage failures recovered during this run.
    pub errors: Vec<SubAnalysisError>,
}

impl AnalysisResult {
    /// Number of distinct placeholder tags present across regions.
    pub fn tagged_region_count(&self) -> usize {
        self.text_regions.len() + self.image_regions.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    Text,
    Image,
}

/// A substitution slot derived from an analyzed region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placeholder {
    /// Stable numeric tag (TEXT_1, IMAGE_2, ...), always present and
    /// unique within a template.
    pub tag: String,
    pub kind: PlaceholderKind,
    pub bbox: Bbox,
    /// Semantic alias (TITLE, PRICE, ...) when the source text matched
    /// a keyword rule and the alias was still unclaimed.
    pub semantic_tag: Option<String>,
    /// Source region classification for image placeholders; drives
    /// stock photo substitution during preview.
    pub region_kind: Option<RegionKind>,
}

impl Placeholder {
    /// Tag used in rendered elements: the semantic alias when one was
    /// claimed, otherwise the numeric tag.
    pub fn effective_tag(&self) -> &str {
        self.semantic_tag.as_deref().unwrap_or(&self.tag)
    }
}

/// Stock photo lookup parameters.
#[derive(Debug, Clone)]
pub struct StockPhotoQuery {
    pub width: u32,
    pub height: u32,
    /// `None` picks a random curated category.
    pub category: Option<String>,
}

/// Resolved photo URL with its origin.
#[derive(Debug, Clone, Serialize)]
pub struct StockPhotoResult {
    pub url: String,
    pub provider: String,
    pub from_cache: bool,
}

/// Broad typographic classification of a font family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontKind {
    SansSerif,
    Serif,
    Monospace,
    Cursive,
}

/// A registered font face.
#[derive(Debug, Clone, Serialize)]
pub struct FontRecord {
    pub family_name: String,
    pub style_name: String,
    pub weight: u16,
    pub italic: bool,
    pub kind: FontKind,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_intersection_and_clamp() {
        let a = Bbox::new(10, 10, 50, 50);
        let b = Bbox::new(40, 40, 50, 50);
        let c = Bbox::new(100, 100, 10, 10);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let clamped = Bbox::new(90, 90, 50, 50).clamp_to(100, 100).unwrap();
        assert_eq!(clamped.width, 10);
        assert_eq!(clamped.height, 10);
        assert!(Bbox::new(200, 0, 10, 10).clamp_to(100, 100).is_none());
    }

    #[test]
    fn dominant_quadrant_picks_heaviest() {
        let w = QuadrantWeights {
            top_left: 10.0,
            top_right: 90.0,
            bottom_left: 20.0,
            bottom_right: 30.0,
        };
        assert_eq!(w.dominant(), Quadrant::TopRight);
    }
}
