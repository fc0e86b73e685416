// Composition scoring: rule of thirds, symmetry, visual weight and
// platform fit for vertical pin formats.
//
// All scores are clamped to [0.0, 1.0] and NaN-free; correlation over a
// zero-variance half is defined as 0.0.

use image::{GrayImage, RgbImage};
use std::collections::HashSet;
use tracing::debug;

use crate::core::types::{CompositionReport, QuadrantWeights};

const SOBEL_THRESHOLD: i32 = 100;
/// Half-width of the sampling band around each third-line.
const BAND_HALF: u32 = 2;
/// Edge length of the window around each third intersection.
const INTERSECTION_WINDOW: u32 = 21;
/// Sampled palettes below this many distinct colors read as flat.
const MIN_COLOR_DIVERSITY: usize = 100;

pub struct CompositionScorer;

impl CompositionScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, img: &RgbImage) -> CompositionReport {
        let gray = image::imageops::grayscale(img);
        let edges = sobel_edges(&gray);
        let (w, h) = gray.dimensions();

        let rule_of_thirds = thirds_score(&edges, w, h);
        let vertical_symmetry = vertical_symmetry(&gray);
        let horizontal_symmetry = horizontal_symmetry(&gray);
        let quadrant_weights = quadrant_weights(&gray);
        let edge_density = if edges.is_empty() {
            0.0
        } else {
            edges.iter().filter(|&&e| e).count() as f32 / edges.len() as f32
        };

        let report = CompositionReport {
            rule_of_thirds,
            vertical_symmetry,
            horizontal_symmetry,
            dominant_quadrant: quadrant_weights.dominant(),
            weight_balance: quadrant_weights.balance(),
            quadrant_weights,
            edge_density,
        };
        debug!(
            thirds = report.rule_of_thirds,
            v_sym = report.vertical_symmetry,
            edges = report.edge_density,
            "composition scored"
        );
        report
    }

    /// Score how well the image fits vertical pin display, 0..=100, with
    /// an actionable recommendation for every deduction taken.
    pub fn platform_fit(&self, img: &RgbImage) -> (u8, Vec<String>) {
        let (w, h) = img.dimensions();
        let mut score: i32 = 100;
        let mut recommendations = Vec::new();

        let aspect = if h == 0 { 0.0 } else { w as f32 / h as f32 };
        if !(0.5..=0.8).contains(&aspect) {
            score -= 15;
            recommendations.push(
                "Consider using a vertical aspect ratio (2:3 or 1:1.5) for better Pinterest performance"
                    .to_string(),
            );
        }
        if w < 600 {
            score -= 10;
            recommendations.push("Increase image width to at least 600px for better quality".to_string());
        }
        if h < 900 {
            score -= 10;
            recommendations.push("Increase image height to at least 900px for vertical pins".to_string());
        }

        let (brightness, diversity) = brightness_and_diversity(img);
        if brightness < 50.0 {
            score -= 10;
            recommendations.push(
                "Image appears too dark - consider brightening for better visibility".to_string(),
            );
        } else if brightness > 200.0 {
            score -= 5;
            recommendations.push("Image appears too bright - consider adjusting contrast".to_string());
        }
        if diversity < MIN_COLOR_DIVERSITY {
            score -= 5;
            recommendations.push(
                "Consider adding more color variety to make the pin more engaging".to_string(),
            );
        }

        (score.clamp(0, 100) as u8, recommendations)
    }
}

impl Default for CompositionScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary edge map from Sobel gradient magnitude.
fn sobel_edges(gray: &GrayImage) -> Vec<bool> {
    let (w, h) = gray.dimensions();
    let mut edges = vec![false; (w * h) as usize];
    if w < 3 || h < 3 {
        return edges;
    }
    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = -px(x - 1, y - 1) - 2 * px(x - 1, y) - px(x - 1, y + 1)
                + px(x + 1, y - 1)
                + 2 * px(x + 1, y)
                + px(x + 1, y + 1);
            let gy = -px(x - 1, y - 1) - 2 * px(x, y - 1) - px(x + 1, y - 1)
                + px(x - 1, y + 1)
                + 2 * px(x, y + 1)
                + px(x + 1, y + 1);
            let magnitude = ((gx * gx + gy * gy) as f64).sqrt() as i32;
            if magnitude > SOBEL_THRESHOLD {
                edges[(y * w + x) as usize] = true;
            }
        }
    }
    edges
}

/// Mean edge density over the four third-line bands and the four
/// intersection windows.
fn thirds_score(edges: &[bool], w: u32, h: u32) -> f32 {
    if w < 9 || h < 9 {
        return 0.0;
    }
    let v = [w / 3, 2 * w / 3];
    let hz = [h / 3, 2 * h / 3];

    let density = |x0: u32, y0: u32, x1: u32, y1: u32| -> f32 {
        let mut hits = 0usize;
        let mut total = 0usize;
        for y in y0..y1.min(h) {
            for x in x0..x1.min(w) {
                total += 1;
                if edges[(y * w + x) as usize] {
                    hits += 1;
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    };

    let mut samples = Vec::with_capacity(8);
    for &x in &v {
        samples.push(density(x.saturating_sub(BAND_HALF), 0, x + BAND_HALF + 1, h));
    }
    for &y in &hz {
        samples.push(density(0, y.saturating_sub(BAND_HALF), w, y + BAND_HALF + 1));
    }
    let half = INTERSECTION_WINDOW / 2;
    for &x in &v {
        for &y in &hz {
            samples.push(density(
                x.saturating_sub(half),
                y.saturating_sub(half),
                x + half + 1,
                y + half + 1,
            ));
        }
    }

    let score = samples.iter().sum::<f32>() / samples.len() as f32;
    sanitize_score(score)
}

/// Pearson correlation between the left half and the mirrored right half.
fn vertical_symmetry(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    let half = w / 2;
    if half == 0 || h == 0 {
        return 0.0;
    }
    let mut left = Vec::with_capacity((half * h) as usize);
    let mut right = Vec::with_capacity((half * h) as usize);
    for y in 0..h {
        for x in 0..half {
            left.push(gray.get_pixel(x, y).0[0] as f64);
            right.push(gray.get_pixel(w - 1 - x, y).0[0] as f64);
        }
    }
    sanitize_score(pearson(&left, &right) as f32)
}

/// Pearson correlation between the top half and the mirrored bottom half.
fn horizontal_symmetry(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    let half = h / 2;
    if half == 0 || w == 0 {
        return 0.0;
    }
    let mut top = Vec::with_capacity((half * w) as usize);
    let mut bottom = Vec::with_capacity((half * w) as usize);
    for y in 0..half {
        for x in 0..w {
            top.push(gray.get_pixel(x, y).0[0] as f64);
            bottom.push(gray.get_pixel(x, h - 1 - y).0[0] as f64);
        }
    }
    sanitize_score(pearson(&top, &bottom) as f32)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        // Uniform half: correlation undefined, treated as no symmetry signal
        0.0
    } else {
        cov / denom
    }
}

/// Visual weight per quadrant: inverted mean brightness.
fn quadrant_weights(gray: &GrayImage) -> QuadrantWeights {
    let (w, h) = gray.dimensions();
    let mid_x = w / 2;
    let mid_y = h / 2;
    let mean = |x0: u32, y0: u32, x1: u32, y1: u32| -> f32 {
        let mut sum = 0u64;
        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += gray.get_pixel(x, y).0[0] as u64;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            255.0 - sum as f32 / count as f32
        }
    };
    QuadrantWeights {
        top_left: mean(0, 0, mid_x, mid_y),
        top_right: mean(mid_x, 0, w, mid_y),
        bottom_left: mean(0, mid_y, mid_x, h),
        bottom_right: mean(mid_x, mid_y, w, h),
    }
}

/// Mean channel brightness and distinct-color count over strided samples.
fn brightness_and_diversity(img: &RgbImage) -> (f32, usize) {
    let total = (img.width() as usize) * (img.height() as usize);
    if total == 0 {
        return (0.0, 0);
    }
    let stride = (total / 20_000).max(1);
    let mut sum = 0u64;
    let mut count = 0u64;
    let mut distinct = HashSet::new();
    for p in img.pixels().step_by(stride) {
        sum += (p.0[0] as u64 + p.0[1] as u64 + p.0[2] as u64) / 3;
        count += 1;
        distinct.insert(p.0);
    }
    (sum as f32 / count as f32, distinct.len())
}

/// Replace NaN/infinite with 0.0 and clamp to [0.0, 1.0].
fn sanitize_score(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_portrait(w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([
                (x % 256) as u8,
                (y % 256) as u8,
                (((x + y) / 2) % 256) as u8,
            ]);
        }
        img
    }

    #[test]
    fn scores_stay_in_range_for_flat_image() {
        let img = RgbImage::from_pixel(120, 180, Rgb([128, 128, 128]));
        let report = CompositionScorer::new().score(&img);
        // Zero-variance halves: correlation is defined as 0, never NaN
        assert_eq!(report.vertical_symmetry, 0.0);
        assert_eq!(report.horizontal_symmetry, 0.0);
        assert!((0.0..=1.0).contains(&report.rule_of_thirds));
        assert!((0.0..=1.0).contains(&report.edge_density));
        assert!(report.weight_balance.is_finite());
    }

    #[test]
    fn mirrored_image_scores_high_vertical_symmetry() {
        let mut img = RgbImage::new(100, 100);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let mx = if x < 50 { x } else { 99 - x };
            *p = Rgb([(mx * 5) as u8, (y * 2) as u8, 30]);
        }
        let report = CompositionScorer::new().score(&img);
        assert!(report.vertical_symmetry > 0.99);
    }

    #[test]
    fn dark_quadrant_dominates() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([240, 240, 240]));
        for y in 0..50 {
            for x in 50..100 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let report = CompositionScorer::new().score(&img);
        assert_eq!(
            report.dominant_quadrant,
            crate::core::types::Quadrant::TopRight
        );
        assert!(report.weight_balance > 0.0);
    }

    #[test]
    fn optimal_portrait_scores_near_perfect() {
        let img = gradient_portrait(1000, 1500);
        let (score, recommendations) = CompositionScorer::new().platform_fit(&img);
        assert_eq!(score, 100);
        assert!(recommendations.is_empty());
    }

    #[test]
    fn small_landscape_collects_deductions() {
        let img = gradient_portrait(300, 200);
        let (score, recommendations) = CompositionScorer::new().platform_fit(&img);
        // aspect, width and height deductions all apply
        assert!(score <= 65);
        assert!(recommendations.len() >= 3);
    }

    #[test]
    fn flat_dark_image_is_penalized() {
        let img = RgbImage::from_pixel(700, 1000, Rgb([20, 20, 20]));
        let (score, recommendations) = CompositionScorer::new().platform_fit(&img);
        // dark (-10) and low diversity (-5)
        assert_eq!(score, 85);
        assert_eq!(recommendations.len(), 2);
        assert_eq!(
            recommendations[0],
            "Image appears too dark - consider brightening for better visibility"
        );
    }
}
