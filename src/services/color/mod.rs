// Dominant color extraction via k-means clustering.
//
// Pixels are sampled on a stride (never more than ~20k samples), near-black
// and near-white pixels are filtered out before clustering so the palette
// reflects content rather than page background, and centroids are seeded
// with deterministic farthest-point sampling so repeated runs agree.

use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

use crate::core::types::{ColorMood, ColorSwatch, ColorTemperature};

const MAX_SAMPLES: usize = 20_000;
const KMEANS_ITERATIONS: usize = 10;
/// Mean-channel bounds outside which a pixel is treated as background.
const FILTER_LOW: f32 = 20.0;
const FILTER_HIGH: f32 = 235.0;

/// Small CSS color table for human-readable swatch names.
const CSS_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("green", [0, 128, 0]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("navy", [0, 0, 128]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("coral", [255, 127, 80]),
    ("salmon", [250, 128, 114]),
    ("khaki", [240, 230, 140]),
    ("indigo", [75, 0, 130]),
    ("violet", [238, 130, 238]),
    ("turquoise", [64, 224, 208]),
    ("tan", [210, 180, 140]),
    ("skyblue", [135, 206, 235]),
    ("crimson", [220, 20, 60]),
    ("lavender", [230, 230, 250]),
    ("beige", [245, 245, 220]),
    ("mint", [189, 252, 201]),
    ("chocolate", [210, 105, 30]),
    ("tomato", [255, 99, 71]),
    ("orchid", [218, 112, 214]),
    ("slategray", [112, 128, 144]),
    ("seagreen", [46, 139, 87]),
    ("steelblue", [70, 130, 180]),
    ("plum", [221, 160, 221]),
    ("ivory", [255, 255, 240]),
];

/// Full color read of one image.
#[derive(Debug, Clone)]
pub struct ColorProfile {
    pub swatches: Vec<ColorSwatch>,
    pub temperature: ColorTemperature,
    pub mood: ColorMood,
    pub average_brightness: f32,
}

pub struct ColorProfiler {
    max_colors: usize,
}

impl ColorProfiler {
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors: max_colors.clamp(1, 16),
        }
    }

    /// Cluster the image into up to `max_colors` dominant swatches and
    /// derive temperature, mood and brightness. Deterministic for a
    /// given input.
    pub fn profile(&self, img: &RgbImage) -> ColorProfile {
        let samples = sample_pixels(img);
        if samples.is_empty() {
            return ColorProfile {
                swatches: vec![swatch_from_rgb([255, 255, 255], 100.0)],
                temperature: ColorTemperature::Neutral,
                mood: ColorMood::Balanced,
                average_brightness: 255.0,
            };
        }

        let average_brightness = samples
            .iter()
            .map(|p| (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0)
            .sum::<f32>()
            / samples.len() as f32;

        let filtered: Vec<[u8; 3]> = samples
            .iter()
            .copied()
            .filter(|p| {
                let mean = (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0;
                mean > FILTER_LOW && mean < FILTER_HIGH
            })
            .collect();
        // Fully black/white images have nothing left after filtering
        let clustered = if filtered.is_empty() { &samples } else { &filtered };

        let k = self.max_colors.min(clustered.len());
        let swatches = kmeans_palette(clustered, k);
        debug!(
            swatches = swatches.len(),
            brightness = average_brightness,
            "color profile extracted"
        );

        let temperature = classify_temperature(&samples);
        let mood = classify_mood(swatches.first().map(|s| s.rgb).unwrap_or([128, 128, 128]));

        ColorProfile {
            swatches,
            temperature,
            mood,
            average_brightness,
        }
    }
}

/// Stride-sample pixels so huge images stay cheap to cluster.
fn sample_pixels(img: &RgbImage) -> Vec<[u8; 3]> {
    let total = (img.width() as usize) * (img.height() as usize);
    if total == 0 {
        return Vec::new();
    }
    let stride = (total / MAX_SAMPLES).max(1);
    img.pixels()
        .step_by(stride)
        .map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect()
}

/// K-means over RGB with farthest-point seeding. Empty clusters are
/// dropped, so a flat image yields a single 100% swatch.
fn kmeans_palette(pixels: &[[u8; 3]], k: usize) -> Vec<ColorSwatch> {
    if pixels.is_empty() || k == 0 {
        return Vec::new();
    }

    let points: Vec<[f32; 3]> = pixels
        .iter()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();

    let mut centroids = seed_centroids(&points, k);

    let assign = |centroids: &Vec<[f32; 3]>| -> Vec<usize> {
        points
            .par_iter()
            .map(|p| nearest_centroid(p, centroids))
            .collect()
    };

    let mut assignments = assign(&centroids);
    for _ in 1..KMEANS_ITERATIONS {
        // Update step
        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (point, &cluster) in points.iter().zip(&assignments) {
            sums[cluster][0] += point[0] as f64;
            sums[cluster][1] += point[1] as f64;
            sums[cluster][2] += point[2] as f64;
            counts[cluster] += 1;
        }
        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] > 0 {
                centroid[0] = (sums[i][0] / counts[i] as f64) as f32;
                centroid[1] = (sums[i][1] / counts[i] as f64) as f32;
                centroid[2] = (sums[i][2] / counts[i] as f64) as f32;
            }
        }
        assignments = assign(&centroids);
    }

    let mut counts = vec![0usize; centroids.len()];
    for &cluster in &assignments {
        counts[cluster] += 1;
    }

    let total = points.len() as f32;
    let mut swatches: Vec<(usize, ColorSwatch)> = centroids
        .iter()
        .zip(&counts)
        .filter(|(_, &count)| count > 0)
        .map(|(centroid, &count)| {
            let rgb = [
                centroid[0].round().clamp(0.0, 255.0) as u8,
                centroid[1].round().clamp(0.0, 255.0) as u8,
                centroid[2].round().clamp(0.0, 255.0) as u8,
            ];
            let pct = (count as f32 / total * 1000.0).round() / 10.0;
            (count, swatch_from_rgb(rgb, pct))
        })
        .collect();

    swatches.sort_by(|a, b| b.0.cmp(&a.0));
    swatches.into_iter().map(|(_, s)| s).collect()
}

/// Deterministic farthest-point seeding: first point is the first sample,
/// each next centroid is the sample farthest from all chosen so far.
fn seed_centroids(points: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    let mut centroids = vec![points[0]];
    // Seeding over a coarse stride keeps this O(k * n/stride)
    let stride = (points.len() / 2048).max(1);
    while centroids.len() < k {
        let farthest = points
            .iter()
            .step_by(stride)
            .max_by(|a, b| {
                let da = min_dist_sq(a, &centroids);
                let db = min_dist_sq(b, &centroids);
                da.total_cmp(&db)
            })
            .copied()
            .unwrap_or(points[0]);
        centroids.push(farthest);
    }
    centroids
}

fn min_dist_sq(p: &[f32; 3], centroids: &[[f32; 3]]) -> f32 {
    centroids
        .iter()
        .map(|c| dist_sq(p, c))
        .fold(f32::INFINITY, f32::min)
}

fn dist_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn nearest_centroid(p: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

pub fn swatch_from_rgb(rgb: [u8; 3], percentage: f32) -> ColorSwatch {
    ColorSwatch {
        rgb,
        hex: rgb_to_hex(rgb),
        name: closest_color_name(rgb).to_string(),
        percentage,
    }
}

pub fn rgb_to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Nearest entry in the CSS table by squared RGB distance.
pub fn closest_color_name(rgb: [u8; 3]) -> &'static str {
    let p = [rgb[0] as f32, rgb[1] as f32, rgb[2] as f32];
    CSS_COLORS
        .iter()
        .min_by(|a, b| {
            let da = dist_sq(&p, &[a.1[0] as f32, a.1[1] as f32, a.1[2] as f32]);
            let db = dist_sq(&p, &[b.1[0] as f32, b.1[1] as f32, b.1[2] as f32]);
            da.total_cmp(&db)
        })
        .map(|(name, _)| *name)
        .unwrap_or("gray")
}

fn classify_temperature(samples: &[[u8; 3]]) -> ColorTemperature {
    if samples.is_empty() {
        return ColorTemperature::Neutral;
    }
    let mut r = 0u64;
    let mut g = 0u64;
    let mut b = 0u64;
    for p in samples {
        r += p[0] as u64;
        g += p[1] as u64;
        b += p[2] as u64;
    }
    if r > g && r > b {
        ColorTemperature::Warm
    } else if b > r && b > g {
        ColorTemperature::Cool
    } else {
        ColorTemperature::Neutral
    }
}

/// Mood from the primary swatch hue, mirroring common color psychology
/// buckets for pin design.
fn classify_mood(rgb: [u8; 3]) -> ColorMood {
    let [r, g, b] = [rgb[0] as i32, rgb[1] as i32, rgb[2] as i32];
    if r > 200 && g < 120 && b < 120 {
        ColorMood::Energetic
    } else if g > 150 && r < 150 {
        ColorMood::Natural
    } else if b > 150 && r < 150 {
        ColorMood::Calm
    } else if r > 200 && g > 180 && b < 120 {
        ColorMood::Cheerful
    } else if r < 80 && g < 80 && b < 80 {
        ColorMood::Sophisticated
    } else {
        ColorMood::Balanced
    }
}
