// Text and picture region segmentation.
//
// Text detection sits behind a trait so alternative engines can be
// plugged in; the built-in detector finds horizontal strips of dense
// high-frequency edges, which covers typical overlay typography. Picture
// regions come from connected components against the estimated page
// background.

use std::sync::Arc;

use image::{GrayImage, RgbImage};
use tracing::{debug, warn};

use crate::core::types::{Bbox, ImageRegion, LayoutInfo, LayoutRegion, RegionKind, TextRegion};

const EDGE_DIFF_THRESHOLD: i16 = 40;
const MAX_TEXT_REGIONS: usize = 20;
const MAX_IMAGE_REGIONS: usize = 10;
const SEGMENT_MAX_DIM: u32 = 256;
/// Component bbox aspect ratios outside this range are structural, not
/// picture content.
const MIN_ASPECT: f32 = 0.5;
const MAX_ASPECT: f32 = 2.0;

/// A raw text detection before thresholding and tagging.
#[derive(Debug, Clone)]
pub struct TextCandidate {
    pub text: String,
    pub bbox: Bbox,
    pub confidence: f32,
}

/// Pluggable text detection engine.
pub trait TextDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> anyhow::Result<Vec<TextCandidate>>;
}

/// A raw picture-region detection before classification.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub bbox: Bbox,
    pub confidence: f32,
}

/// Pluggable object detection engine for picture regions. Without one
/// the connected-component fallback runs instead.
pub trait ImageDetector: Send + Sync {
    fn detect(&self, img: &RgbImage) -> anyhow::Result<Vec<ImageCandidate>>;
}

/// Edge-run text detector. Finds horizontal bands where short-period
/// luminance transitions are dense, then splits each band into runs.
/// Produces boxes and confidences only; `text` stays empty.
pub struct EdgeRunTextDetector;

impl TextDetector for EdgeRunTextDetector {
    fn detect(&self, gray: &GrayImage) -> anyhow::Result<Vec<TextCandidate>> {
        let (w, h) = gray.dimensions();
        if w < 16 || h < 16 {
            return Ok(Vec::new());
        }

        // Horizontal gradient edge map
        let mut edges = vec![false; (w * h) as usize];
        for y in 0..h {
            for x in 0..w - 1 {
                let a = gray.get_pixel(x, y).0[0] as i16;
                let b = gray.get_pixel(x + 1, y).0[0] as i16;
                if (a - b).abs() > EDGE_DIFF_THRESHOLD {
                    edges[(y * w + x) as usize] = true;
                }
            }
        }

        // Rows where transitions are dense enough to look like glyphs
        let row_min = (w / 20).max(4) as usize;
        let texty: Vec<bool> = (0..h)
            .map(|y| {
                let count = (0..w).filter(|&x| edges[(y * w + x) as usize]).count();
                count >= row_min
            })
            .collect();

        // Group texty rows into strips, tolerating 2-row gaps
        let mut strips: Vec<(u32, u32)> = Vec::new();
        let mut start: Option<u32> = None;
        let mut gap = 0u32;
        for y in 0..h {
            if texty[y as usize] {
                if start.is_none() {
                    start = Some(y);
                }
                gap = 0;
            } else if let Some(s) = start {
                gap += 1;
                if gap > 2 {
                    strips.push((s, y - gap));
                    start = None;
                    gap = 0;
                }
            }
        }
        if let Some(s) = start {
            strips.push((s, h - 1 - gap));
        }

        let mut candidates = Vec::new();
        for (top, bottom) in strips {
            let strip_h = bottom.saturating_sub(top) + 1;
            if strip_h < 4 || strip_h > h / 3 {
                continue;
            }

            // Split the strip into horizontal runs of edge-bearing columns
            let col_has_edge: Vec<bool> = (0..w)
                .map(|x| (top..=bottom).any(|y| edges[(y * w + x) as usize]))
                .collect();
            let gap_tolerance = strip_h.max(4);
            let mut run_start: Option<u32> = None;
            let mut run_gap = 0u32;
            let mut runs: Vec<(u32, u32)> = Vec::new();
            for x in 0..w {
                if col_has_edge[x as usize] {
                    if run_start.is_none() {
                        run_start = Some(x);
                    }
                    run_gap = 0;
                } else if let Some(s) = run_start {
                    run_gap += 1;
                    if run_gap > gap_tolerance {
                        runs.push((s, x - run_gap));
                        run_start = None;
                        run_gap = 0;
                    }
                }
            }
            if let Some(s) = run_start {
                runs.push((s, w - 1 - run_gap));
            }

            for (left, right) in runs {
                let run_w = right.saturating_sub(left) + 1;
                if run_w < 8 {
                    continue;
                }
                let bbox = Bbox::new(left, top, run_w, strip_h);
                let edge_count = (top..=bottom)
                    .flat_map(|y| (left..=right).map(move |x| (x, y)))
                    .filter(|&(x, y)| edges[(y * w + x) as usize])
                    .count();
                let density = edge_count as f32 / bbox.area() as f32;
                let confidence = (density * 5.0).min(1.0);
                candidates.push(TextCandidate {
                    text: String::new(),
                    bbox,
                    confidence,
                });
            }
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(MAX_TEXT_REGIONS);
        Ok(candidates)
    }
}

/// Combined segmentation output before tag assignment.
#[derive(Debug, Clone, Default)]
pub struct SegmentationOutput {
    pub text_regions: Vec<TextRegion>,
    pub image_regions: Vec<ImageRegion>,
    pub layout: LayoutInfo,
}

pub struct RegionSegmenter {
    text_detector: Arc<dyn TextDetector>,
    image_detector: Option<Arc<dyn ImageDetector>>,
    text_threshold: f32,
    style_threshold: f32,
    min_area_frac: f32,
}

impl RegionSegmenter {
    pub fn new(text_threshold: f32, style_threshold: f32, min_area_frac: f32) -> Self {
        Self {
            text_detector: Arc::new(EdgeRunTextDetector),
            image_detector: None,
            text_threshold,
            style_threshold,
            min_area_frac,
        }
    }

    pub fn with_text_detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.text_detector = detector;
        self
    }

    pub fn with_image_detector(mut self, detector: Arc<dyn ImageDetector>) -> Self {
        self.image_detector = Some(detector);
        self
    }

    /// New segmenter sharing this one's thresholds and detectors.
    pub fn fork(&self) -> Self {
        Self {
            text_detector: self.text_detector.clone(),
            image_detector: self.image_detector.clone(),
            text_threshold: self.text_threshold,
            style_threshold: self.style_threshold,
            min_area_frac: self.min_area_frac,
        }
    }

    /// Segment the image into text, picture and structural regions.
    /// Text detector failures degrade to an empty text set; the error
    /// message is returned so the caller can record it.
    pub fn segment(&self, img: &RgbImage) -> (SegmentationOutput, Option<String>) {
        let gray = image::imageops::grayscale(img);

        let (text_regions, text_error) = match self.text_detector.detect(&gray) {
            Ok(candidates) => (self.filter_text(candidates), None),
            Err(e) => {
                warn!("text detection failed, continuing without text regions: {e:#}");
                (Vec::new(), Some(format!("{e:#}")))
            }
        };

        // Configured object detector first, connected components otherwise.
        let detected = self.image_detector.as_ref().and_then(|detector| {
            match detector.detect(img) {
                Ok(candidates) => {
                    Some(self.regions_from_candidates(img, candidates, &text_regions))
                }
                Err(e) => {
                    warn!("image detection failed, falling back to component analysis: {e:#}");
                    None
                }
            }
        });
        let (image_regions, layout_regions) = match detected {
            Some(regions) => (regions, Vec::new()),
            None => self.find_picture_regions(img, &text_regions),
        };
        let layout = build_layout(&image_regions, layout_regions);

        debug!(
            text = text_regions.len(),
            images = image_regions.len(),
            layout_type = %layout.layout_type,
            "segmentation complete"
        );

        (
            SegmentationOutput {
                text_regions,
                image_regions,
                layout,
            },
            text_error,
        )
    }

    fn filter_text(&self, candidates: Vec<TextCandidate>) -> Vec<TextRegion> {
        candidates
            .into_iter()
            .filter(|c| c.confidence >= self.text_threshold)
            .map(|c| {
                let estimated_font_size = (c.confidence >= self.style_threshold)
                    .then(|| estimate_font_size(&c.bbox));
                TextRegion {
                    text: c.text,
                    bbox: c.bbox,
                    confidence: c.confidence,
                    estimated_font_size,
                    suggested_tag: None,
                }
            })
            .collect()
    }

    /// Connected components against the border-estimated background color.
    /// Returns accepted picture regions plus oversized rejects that become
    /// structural layout regions.
    fn find_picture_regions(
        &self,
        img: &RgbImage,
        text_regions: &[TextRegion],
    ) -> (Vec<ImageRegion>, Vec<LayoutRegion>) {
        let small = crate::utils::image_ops::downsample_for_analysis(img, SEGMENT_MAX_DIM);
        let (sw, sh) = small.dimensions();
        if sw < 4 || sh < 4 {
            return (Vec::new(), Vec::new());
        }
        let scale_x = img.width() as f32 / sw as f32;
        let scale_y = img.height() as f32 / sh as f32;

        let bg = border_mean(&small);
        let total = (sw * sh) as usize;

        // Foreground mask: mean channel distance from the background
        let mask: Vec<bool> = small
            .pixels()
            .map(|p| {
                let d = (p.0[0] as i32 - bg[0] as i32).abs()
                    + (p.0[1] as i32 - bg[1] as i32).abs()
                    + (p.0[2] as i32 - bg[2] as i32).abs();
                d / 3 > 30
            })
            .collect();

        let components = label_components(&mask, sw, sh);

        let mut regions = Vec::new();
        let mut layout_regions = Vec::new();
        for comp in components {
            let area_frac = comp.pixel_count as f32 / total as f32;
            if area_frac < self.min_area_frac {
                continue;
            }
            let aspect = comp.bbox.width as f32 / comp.bbox.height.max(1) as f32;

            let full_bbox = Bbox::new(
                (comp.bbox.x as f32 * scale_x) as u32,
                (comp.bbox.y as f32 * scale_y) as u32,
                ((comp.bbox.width as f32 * scale_x) as u32).max(1),
                ((comp.bbox.height as f32 * scale_y) as u32).max(1),
            );

            if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
                if area_frac >= 0.05 {
                    layout_regions.push(LayoutRegion {
                        bbox: full_bbox,
                        label: "panel".to_string(),
                    });
                }
                continue;
            }

            // Skip components that are mostly a detected text region
            let overlapped = text_regions
                .iter()
                .any(|t| overlap_area(&t.bbox, &full_bbox) * 2 > full_bbox.area());
            if overlapped {
                continue;
            }

            let fill = comp.pixel_count as f32 / comp.bbox.area().max(1) as f32;
            let kind = classify_region(&small, &comp.bbox);
            regions.push(ImageRegion {
                bbox: full_bbox,
                confidence: fill.clamp(0.0, 1.0),
                kind,
                tag: None,
            });
        }

        regions.sort_by(|a, b| b.bbox.area().cmp(&a.bbox.area()));
        regions.truncate(MAX_IMAGE_REGIONS);
        (regions, layout_regions)
    }

    /// Turn raw detector candidates into classified picture regions,
    /// applying the same area and text-overlap gates as the component path.
    fn regions_from_candidates(
        &self,
        img: &RgbImage,
        candidates: Vec<ImageCandidate>,
        text_regions: &[TextRegion],
    ) -> Vec<ImageRegion> {
        let total = img.width() as u64 * img.height() as u64;
        let mut regions: Vec<ImageRegion> = candidates
            .into_iter()
            .filter_map(|c| {
                let bbox = c.bbox.clamp_to(img.width(), img.height())?;
                if (bbox.area() as f32) < self.min_area_frac * total as f32 {
                    return None;
                }
                let overlapped = text_regions
                    .iter()
                    .any(|t| overlap_area(&t.bbox, &bbox) * 2 > bbox.area());
                if overlapped {
                    return None;
                }
                let kind = classify_region(img, &bbox);
                Some(ImageRegion {
                    bbox,
                    confidence: c.confidence.clamp(0.0, 1.0),
                    kind,
                    tag: None,
                })
            })
            .collect();

        regions.sort_by(|a, b| b.bbox.area().cmp(&a.bbox.area()));
        regions.truncate(MAX_IMAGE_REGIONS);
        regions
    }
}

struct Component {
    bbox: Bbox,
    pixel_count: usize,
}

/// 4-connected component labeling via BFS flood fill.
fn label_components(mask: &[bool], w: u32, h: u32) -> Vec<Component> {
    let mut visited = vec![false; mask.len()];
    let mut components = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        let mut queue = std::collections::VecDeque::from([start]);
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
        let mut count = 0usize;

        while let Some(idx) = queue.pop_front() {
            let x = (idx as u32) % w;
            let y = (idx as u32) / w;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            count += 1;

            let mut push = |nx: i64, ny: i64| {
                if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                    let nidx = (ny as u32 * w + nx as u32) as usize;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        queue.push_back(nidx);
                    }
                }
            };
            push(x as i64 - 1, y as i64);
            push(x as i64 + 1, y as i64);
            push(x as i64, y as i64 - 1);
            push(x as i64, y as i64 + 1);
        }

        components.push(Component {
            bbox: Bbox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
            pixel_count: count,
        });
    }
    components
}

/// Flat low-saturation regions read as placeholder artwork; everything
/// else is treated as a real photograph.
fn classify_region(img: &RgbImage, bbox: &Bbox) -> RegionKind {
    let mut sum = [0u64; 3];
    let mut sum_luma = 0.0f64;
    let mut sum_luma_sq = 0.0f64;
    let mut n = 0u64;
    for y in bbox.y..bbox.bottom().min(img.height()) {
        for x in bbox.x..bbox.right().min(img.width()) {
            let p = img.get_pixel(x, y).0;
            sum[0] += p[0] as u64;
            sum[1] += p[1] as u64;
            sum[2] += p[2] as u64;
            let luma = 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
            sum_luma += luma;
            sum_luma_sq += luma * luma;
            n += 1;
        }
    }
    if n == 0 {
        return RegionKind::PlaceholderIcon;
    }
    let mean = [sum[0] / n, sum[1] / n, sum[2] / n];
    let saturation = mean.iter().max().unwrap() - mean.iter().min().unwrap();
    let mean_luma = sum_luma / n as f64;
    let variance = (sum_luma_sq / n as f64) - mean_luma * mean_luma;

    // Flat near-gray mid-tone boxes read as stand-in icons, anything
    // colorful or textured as a real photo
    if saturation < 30 && variance < 900.0 && (120.0..=180.0).contains(&mean_luma) {
        RegionKind::PlaceholderIcon
    } else {
        RegionKind::RealPhoto
    }
}

fn border_mean(img: &RgbImage) -> [u8; 3] {
    let (w, h) = img.dimensions();
    let mut sum = [0u64; 3];
    let mut n = 0u64;
    let mut add = |p: &image::Rgb<u8>| {
        sum[0] += p.0[0] as u64;
        sum[1] += p.0[1] as u64;
        sum[2] += p.0[2] as u64;
        n += 1;
    };
    for x in 0..w {
        add(img.get_pixel(x, 0));
        add(img.get_pixel(x, h - 1));
    }
    for y in 1..h.saturating_sub(1) {
        add(img.get_pixel(0, y));
        add(img.get_pixel(w - 1, y));
    }
    if n == 0 {
        return [255, 255, 255];
    }
    [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8]
}

fn overlap_area(a: &Bbox, b: &Bbox) -> u64 {
    if !a.intersects(b) {
        return 0;
    }
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());
    (x2 - x1) as u64 * (y2 - y1) as u64
}

fn build_layout(image_regions: &[ImageRegion], regions: Vec<LayoutRegion>) -> LayoutInfo {
    let grid_detected = detect_grid(image_regions);
    let layout_type = if grid_detected {
        "grid"
    } else if image_regions.is_empty() && regions.is_empty() {
        "simple"
    } else {
        "freeform"
    };
    LayoutInfo {
        regions,
        grid_detected,
        layout_type: layout_type.to_string(),
    }
}

/// A grid needs at least four regions with shared column and row edges.
fn detect_grid(regions: &[ImageRegion]) -> bool {
    if regions.len() < 4 {
        return false;
    }
    const TOLERANCE: i64 = 8;
    let aligned = |vals: Vec<i64>| -> bool {
        vals.iter()
            .any(|&v| vals.iter().filter(|&&o| (o - v).abs() <= TOLERANCE).count() >= 2)
    };
    let xs: Vec<i64> = regions.iter().map(|r| r.bbox.x as i64).collect();
    let ys: Vec<i64> = regions.iter().map(|r| r.bbox.y as i64).collect();
    aligned(xs) && aligned(ys)
}

/// Roughly 70% of the box height, clamped to sane pin typography sizes.
pub fn estimate_font_size(bbox: &Bbox) -> u32 {
    ((bbox.height as f32 * 0.7) as u32).clamp(12, 48)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn segmenter() -> RegionSegmenter {
        RegionSegmenter::new(0.3, 0.5, 0.01)
    }

    #[test]
    fn blank_image_has_no_regions() {
        let img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let (out, err) = segmenter().segment(&img);
        assert!(err.is_none());
        assert!(out.text_regions.is_empty());
        assert!(out.image_regions.is_empty());
        assert_eq!(out.layout.layout_type, "simple");
    }

    #[test]
    fn striped_band_reads_as_text() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 40..60 {
            for x in 0..200 {
                if (x / 2) % 2 == 0 {
                    img.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        let (out, _) = segmenter().segment(&img);
        assert!(!out.text_regions.is_empty());
        let region = &out.text_regions[0];
        assert!(region.confidence >= 0.3);
        assert!(region.bbox.y >= 35 && region.bbox.y <= 45);
        // Dense stripes clear the styling threshold too
        assert!(region.estimated_font_size.is_some());
    }

    #[test]
    fn colorful_square_is_a_real_photo_region() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 50..110 {
            for x in 50..110 {
                img.put_pixel(x, y, Rgb([20, 40, 160]));
            }
        }
        let (out, _) = segmenter().segment(&img);
        assert_eq!(out.image_regions.len(), 1);
        let region = &out.image_regions[0];
        assert_eq!(region.kind, RegionKind::RealPhoto);
        assert!(region.confidence > 0.9);
        assert!(region.bbox.x >= 45 && region.bbox.x <= 55);
        assert!(region.bbox.width >= 55 && region.bbox.width <= 65);
    }

    #[test]
    fn flat_gray_square_is_a_placeholder_icon() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 50..110 {
            for x in 50..110 {
                img.put_pixel(x, y, Rgb([128, 128, 128]));
            }
        }
        let (out, _) = segmenter().segment(&img);
        assert_eq!(out.image_regions.len(), 1);
        assert_eq!(out.image_regions[0].kind, RegionKind::PlaceholderIcon);
    }

    #[test]
    fn failing_detector_degrades_to_empty_text() {
        struct Failing;
        impl TextDetector for Failing {
            fn detect(&self, _: &GrayImage) -> anyhow::Result<Vec<TextCandidate>> {
                anyhow::bail!("engine offline")
            }
        }
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        let (out, err) = segmenter()
            .with_text_detector(Arc::new(Failing))
            .segment(&img);
        assert!(out.text_regions.is_empty());
        assert!(err.unwrap().contains("engine offline"));
    }

    #[test]
    fn configured_detector_supplies_picture_regions() {
        struct Fixed;
        impl ImageDetector for Fixed {
            fn detect(&self, _: &RgbImage) -> anyhow::Result<Vec<ImageCandidate>> {
                Ok(vec![ImageCandidate {
                    bbox: Bbox::new(10, 20, 80, 60),
                    confidence: 0.9,
                }])
            }
        }
        // Blue content in the detected box so it classifies as a photo
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 20..80 {
            for x in 10..90 {
                img.put_pixel(x, y, Rgb([20, 40, 160]));
            }
        }
        let (out, _) = segmenter()
            .with_image_detector(Arc::new(Fixed))
            .segment(&img);
        assert_eq!(out.image_regions.len(), 1);
        let region = &out.image_regions[0];
        assert_eq!(region.bbox, Bbox::new(10, 20, 80, 60));
        assert_eq!(region.kind, RegionKind::RealPhoto);
        assert!((region.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn failing_image_detector_falls_back_to_components() {
        struct Broken;
        impl ImageDetector for Broken {
            fn detect(&self, _: &RgbImage) -> anyhow::Result<Vec<ImageCandidate>> {
                anyhow::bail!("model missing")
            }
        }
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 50..110 {
            for x in 50..110 {
                img.put_pixel(x, y, Rgb([20, 40, 160]));
            }
        }
        let (out, _) = segmenter()
            .with_image_detector(Arc::new(Broken))
            .segment(&img);
        assert_eq!(out.image_regions.len(), 1);
        assert_eq!(out.image_regions[0].kind, RegionKind::RealPhoto);
    }

    #[test]
    fn font_size_estimate_clamps() {
        assert_eq!(estimate_font_size(&Bbox::new(0, 0, 100, 10)), 12);
        assert_eq!(estimate_font_size(&Bbox::new(0, 0, 100, 40)), 28);
        assert_eq!(estimate_font_size(&Bbox::new(0, 0, 100, 400)), 48);
    }
}
