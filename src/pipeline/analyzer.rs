// Image analysis orchestration.
//
// Full mode fans the decoded image out to the color, segmentation,
// composition and background stages on blocking threads and joins the
// results. A stage that panics is replaced by its default value plus an
// error marker instead of failing the run. Lightweight mode answers
// from a small downsample and leaves the region sets empty.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{AnalysisError, AnalysisStage, SubAnalysisError};
use crate::core::types::{
    AnalysisMode, AnalysisResult, BackgroundInfo, BackgroundKind, ColorSwatch, CompositionReport,
    Dimensions,
};
use crate::pipeline::placeholder;
use crate::services::color::{swatch_from_rgb, ColorProfile, ColorProfiler};
use crate::services::composition::CompositionScorer;
use crate::services::segmentation::{
    ImageDetector, RegionSegmenter, SegmentationOutput, TextDetector,
};
use crate::utils::Metrics;

/// Border variance thresholds separating solid, gradient and patterned
/// backgrounds.
const SOLID_VARIANCE: f64 = 1000.0;
const GRADIENT_VARIANCE: f64 = 5000.0;

pub struct ImageAnalyzer {
    profiler: Arc<ColorProfiler>,
    segmenter: Arc<RegionSegmenter>,
    scorer: Arc<CompositionScorer>,
    lightweight_sample: u32,
    metrics: Option<Metrics>,
}

impl ImageAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            profiler: Arc::new(ColorProfiler::new(config.analysis.max_colors)),
            segmenter: Arc::new(RegionSegmenter::new(
                config.analysis.text_confidence_threshold,
                config.analysis.style_confidence_threshold,
                config.analysis.min_region_area_frac,
            )),
            scorer: Arc::new(CompositionScorer::new()),
            lightweight_sample: config.analysis.lightweight_sample_size,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Swap the text detection engine, mainly for alternative OCR
    /// backends.
    pub fn with_text_detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.segmenter = Arc::new(self.segmenter.fork().with_text_detector(detector));
        self
    }

    /// Swap in an object detection model for picture regions; without
    /// one the segmenter runs its connected-component analysis.
    pub fn with_image_detector(mut self, detector: Arc<dyn ImageDetector>) -> Self {
        self.segmenter = Arc::new(self.segmenter.fork().with_image_detector(detector));
        self
    }

    /// Analyze encoded image bytes. Only undecodable input is an error;
    /// sub-stage failures degrade to defaults with markers.
    #[instrument(skip(self, bytes), fields(len = bytes.len(), ?mode))]
    pub async fn analyze(
        &self,
        bytes: &[u8],
        mode: AnalysisMode,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let img = decode(bytes).await?;
        let result = match mode {
            AnalysisMode::Full => self.analyze_full(Arc::new(img)).await?,
            AnalysisMode::Lightweight => self.analyze_lightweight(img).await?,
        };
        if let Some(m) = &self.metrics {
            m.record_analysis(started.elapsed(), mode == AnalysisMode::Lightweight);
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            text = result.text_regions.len(),
            images = result.image_regions.len(),
            score = result.platform_score,
            "analysis complete"
        );
        Ok(result)
    }

    /// Full analysis with a deadline. On timeout the run is redone in
    /// lightweight mode rather than failing; undecodable input still
    /// propagates.
    pub async fn analyze_or_degrade(
        &self,
        bytes: &[u8],
        deadline: Duration,
    ) -> Result<AnalysisResult, AnalysisError> {
        match tokio::time::timeout(deadline, self.analyze(bytes, AnalysisMode::Full)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e @ AnalysisError::InvalidImage(_)))
            | Ok(Err(e @ AnalysisError::InvalidDimensions { .. })) => Err(e),
            Ok(Err(e)) => {
                warn!("full analysis failed ({e}), degrading to lightweight");
                self.analyze(bytes, AnalysisMode::Lightweight).await
            }
            Err(_) => {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "full analysis timed out, degrading to lightweight"
                );
                self.analyze(bytes, AnalysisMode::Lightweight).await
            }
        }
    }

    async fn analyze_full(&self, img: Arc<RgbImage>) -> Result<AnalysisResult, AnalysisError> {
        let dimensions = Dimensions {
            width: img.width(),
            height: img.height(),
        };

        let profiler = self.profiler.clone();
        let segmenter = self.segmenter.clone();
        let scorer = self.scorer.clone();

        let color_img = img.clone();
        let seg_img = img.clone();
        let comp_img = img.clone();
        let bg_img = img.clone();

        let color_task = tokio::task::spawn_blocking(move || profiler.profile(&color_img));
        let seg_task = tokio::task::spawn_blocking(move || segmenter.segment(&seg_img));
        let comp_task = tokio::task::spawn_blocking(move || {
            let report = scorer.score(&comp_img);
            let (score, recommendations) = scorer.platform_fit(&comp_img);
            (report, score, recommendations)
        });
        let bg_task = tokio::task::spawn_blocking(move || analyze_background(&bg_img));

        let (color_res, seg_res, comp_res, bg_res) =
            tokio::join!(color_task, seg_task, comp_task, bg_task);

        let mut errors = Vec::new();

        let profile = match color_res {
            Ok(profile) => profile,
            Err(e) => {
                errors.push(SubAnalysisError::new(AnalysisStage::Color, e.to_string()));
                default_profile()
            }
        };
        let segmentation = match seg_res {
            Ok((output, text_error)) => {
                if let Some(msg) = text_error {
                    errors.push(SubAnalysisError::new(AnalysisStage::Regions, msg));
                }
                output
            }
            Err(e) => {
                errors.push(SubAnalysisError::new(AnalysisStage::Regions, e.to_string()));
                SegmentationOutput::default()
            }
        };
        let (composition, platform_score, recommendations) = match comp_res {
            Ok(v) => v,
            Err(e) => {
                errors.push(SubAnalysisError::new(
                    AnalysisStage::Composition,
                    e.to_string(),
                ));
                (CompositionReport::default(), 0, Vec::new())
            }
        };
        let background = match bg_res {
            Ok(bg) => bg,
            Err(e) => {
                errors.push(SubAnalysisError::new(
                    AnalysisStage::Background,
                    e.to_string(),
                ));
                BackgroundInfo::default()
            }
        };

        let mut text_regions = segmentation.text_regions;
        let mut image_regions = segmentation.image_regions;
        // Keep every box inside the canvas before tags are assigned
        text_regions.retain_mut(|r| {
            match r.bbox.clamp_to(dimensions.width, dimensions.height) {
                Some(b) => {
                    r.bbox = b;
                    true
                }
                None => false,
            }
        });
        image_regions.retain_mut(|r| {
            match r.bbox.clamp_to(dimensions.width, dimensions.height) {
                Some(b) => {
                    r.bbox = b;
                    true
                }
                None => false,
            }
        });
        placeholder::assign_tags(&mut text_regions, &mut image_regions);

        if !errors.is_empty() {
            debug!(markers = errors.len(), "analysis finished with degraded stages");
        }

        Ok(AnalysisResult {
            mode: AnalysisMode::Full,
            dimensions,
            colors: profile.swatches,
            color_temperature: profile.temperature,
            color_mood: profile.mood,
            average_brightness: profile.average_brightness,
            text_regions,
            image_regions,
            layout: segmentation.layout,
            background,
            composition,
            platform_score,
            recommendations,
            errors,
        })
    }

    /// Frequency-count palette over a small downsample; regions stay
    /// empty and the background is a solid white stub.
    async fn analyze_lightweight(&self, img: RgbImage) -> Result<AnalysisResult, AnalysisError> {
        let dimensions = Dimensions {
            width: img.width(),
            height: img.height(),
        };
        let sample = self.lightweight_sample.max(8);
        let scorer = self.scorer.clone();

        let assembled = tokio::task::spawn_blocking(move || {
            let small = image::imageops::resize(
                &img,
                sample,
                sample,
                image::imageops::FilterType::Triangle,
            );

            let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
            let mut brightness_sum = 0u64;
            for p in small.pixels() {
                *counts.entry(p.0).or_insert(0) += 1;
                brightness_sum += (p.0[0] as u64 + p.0[1] as u64 + p.0[2] as u64) / 3;
            }
            let total = (sample * sample) as f32;
            let mut ranked: Vec<([u8; 3], usize)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            let colors: Vec<ColorSwatch> = ranked
                .into_iter()
                .take(5)
                .map(|(rgb, count)| {
                    swatch_from_rgb(rgb, (count as f32 / total * 1000.0).round() / 10.0)
                })
                .collect();

            let average_brightness = brightness_sum as f32 / total;
            let (platform_score, recommendations) = scorer.platform_fit(&img);
            (colors, average_brightness, platform_score, recommendations)
        })
        .await
        .map_err(|e| AnalysisError::TaskJoinFailed(e.to_string()))?;

        let (colors, average_brightness, platform_score, recommendations) = assembled;
        Ok(AnalysisResult {
            mode: AnalysisMode::Lightweight,
            dimensions,
            color_temperature: temperature_of(&colors),
            color_mood: crate::core::types::ColorMood::Balanced,
            colors,
            average_brightness,
            text_regions: Vec::new(),
            image_regions: Vec::new(),
            layout: Default::default(),
            background: BackgroundInfo::default(),
            composition: CompositionReport::default(),
            platform_score,
            recommendations,
            errors: Vec::new(),
        })
    }
}

async fn decode(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    let bytes = bytes.to_vec();
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| AnalysisError::TaskJoinFailed(e.to_string()))??;
    let img = decoded.to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(AnalysisError::InvalidDimensions {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(img)
}

fn default_profile() -> ColorProfile {
    ColorProfile {
        swatches: vec![swatch_from_rgb([255, 255, 255], 100.0)],
        temperature: crate::core::types::ColorTemperature::Neutral,
        mood: crate::core::types::ColorMood::Balanced,
        average_brightness: 255.0,
    }
}

fn temperature_of(colors: &[crate::core::types::ColorSwatch]) -> crate::core::types::ColorTemperature {
    use crate::core::types::ColorTemperature;
    let Some(primary) = colors.first() else {
        return ColorTemperature::Neutral;
    };
    let [r, g, b] = primary.rgb;
    if r > g && r > b {
        ColorTemperature::Warm
    } else if b > r && b > g {
        ColorTemperature::Cool
    } else {
        ColorTemperature::Neutral
    }
}

/// Border-sample luminance variance decides solid vs gradient vs pattern;
/// the border mean becomes the suggested background color.
fn analyze_background(img: &RgbImage) -> BackgroundInfo {
    let (w, h) = img.dimensions();
    let mut samples: Vec<[u8; 3]> = Vec::new();
    let stride = ((w.max(h) / 128).max(1)) as usize;
    for x in (0..w).step_by(stride) {
        samples.push(img.get_pixel(x, 0).0);
        samples.push(img.get_pixel(x, h - 1).0);
    }
    for y in (0..h).step_by(stride) {
        samples.push(img.get_pixel(0, y).0);
        samples.push(img.get_pixel(w - 1, y).0);
    }
    if samples.is_empty() {
        return BackgroundInfo::default();
    }

    let n = samples.len() as f64;
    let mut mean = [0.0f64; 3];
    let mut luma_sum = 0.0f64;
    let mut luma_sq = 0.0f64;
    for s in &samples {
        mean[0] += s[0] as f64;
        mean[1] += s[1] as f64;
        mean[2] += s[2] as f64;
        let luma = 0.299 * s[0] as f64 + 0.587 * s[1] as f64 + 0.114 * s[2] as f64;
        luma_sum += luma;
        luma_sq += luma * luma;
    }
    let color = [
        (mean[0] / n).round() as u8,
        (mean[1] / n).round() as u8,
        (mean[2] / n).round() as u8,
    ];
    let mean_luma = luma_sum / n;
    let variance = (luma_sq / n - mean_luma * mean_luma).max(0.0);

    let kind = if variance < SOLID_VARIANCE {
        BackgroundKind::Solid
    } else if variance < GRADIENT_VARIANCE {
        BackgroundKind::Gradient
    } else {
        BackgroundKind::Pattern
    };

    BackgroundInfo {
        color_hex: crate::services::color::rgb_to_hex(color),
        kind,
        variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::segmentation::TextCandidate;
    use image::{DynamicImage, Rgb};
    use std::io::Cursor;

    fn png_bytes(img: RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn analyzer() -> ImageAnalyzer {
        let config = test_config();
        ImageAnalyzer::new(&config)
    }

    fn test_config() -> Config {
        // Env-independent construction for tests
        std::env::remove_var("TEXT_CONFIDENCE_THRESHOLD");
        Config::new().expect("default config")
    }

    #[tokio::test]
    async fn full_analysis_of_solid_image() {
        let bytes = png_bytes(RgbImage::from_pixel(120, 180, Rgb([200, 60, 60])));
        let result = analyzer()
            .analyze(&bytes, AnalysisMode::Full)
            .await
            .unwrap();

        assert_eq!(result.mode, AnalysisMode::Full);
        assert_eq!(result.dimensions.width, 120);
        assert_eq!(result.colors.len(), 1);
        assert!((result.colors[0].percentage - 100.0).abs() < 0.2);
        assert!(result.text_regions.is_empty());
        assert!(result.errors.is_empty());
        // Solid border reads as a solid background of the same color
        assert_eq!(result.background.kind, BackgroundKind::Solid);
        assert_eq!(result.background.color_hex, "#c83c3c");
    }

    #[tokio::test]
    async fn garbage_bytes_are_invalid_image() {
        let err = analyzer()
            .analyze(b"definitely not an image", AnalysisMode::Full)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn lightweight_mode_skips_regions() {
        let mut img = RgbImage::from_pixel(300, 450, Rgb([240, 240, 240]));
        for y in 100..200 {
            for x in 50..150 {
                img.put_pixel(x, y, Rgb([30, 90, 200]));
            }
        }
        let bytes = png_bytes(img);
        let result = analyzer()
            .analyze(&bytes, AnalysisMode::Lightweight)
            .await
            .unwrap();

        assert_eq!(result.mode, AnalysisMode::Lightweight);
        assert!(result.text_regions.is_empty());
        assert!(result.image_regions.is_empty());
        assert!(!result.colors.is_empty());
        assert!(result.colors.len() <= 5);
        assert_eq!(result.background.color_hex, "#ffffff");
        // Most frequent color first
        assert_eq!(result.colors[0].rgb, [240, 240, 240]);
    }

    #[tokio::test]
    async fn zero_deadline_degrades_to_lightweight() {
        let bytes = png_bytes(RgbImage::from_pixel(200, 300, Rgb([100, 150, 100])));
        let result = analyzer()
            .analyze_or_degrade(&bytes, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(result.mode, AnalysisMode::Lightweight);
    }

    #[tokio::test]
    async fn degrade_still_rejects_garbage() {
        let err = analyzer()
            .analyze_or_degrade(b"nope", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn failing_detector_yields_marker_not_error() {
        struct Failing;
        impl TextDetector for Failing {
            fn detect(&self, _: &image::GrayImage) -> anyhow::Result<Vec<TextCandidate>> {
                anyhow::bail!("engine offline")
            }
        }
        let bytes = png_bytes(RgbImage::from_pixel(100, 150, Rgb([120, 120, 220])));
        let result = analyzer()
            .with_text_detector(Arc::new(Failing))
            .analyze(&bytes, AnalysisMode::Full)
            .await
            .unwrap();
        assert!(result.text_regions.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].stage, AnalysisStage::Regions);
        assert!(result.errors[0].message.contains("engine offline"));
    }
}
