// Preview rendering: rasterize a template to an RGBA canvas, filling
// text slots with bound or sample content and image slots with stock
// photos when available.

use std::collections::HashMap;
use std::sync::Arc;

use cosmic_text::{Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics as TextMetrics, Shaping, SwashCache, Wrap};
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::core::errors::TemplateResult;
use crate::core::types::{Bbox, PlaceholderKind, RegionKind, StockPhotoQuery};
use crate::services::font_manager::FontManager;
use crate::services::stock_photo::StockPhotoResolver;
use crate::template::{extract_tag, Element, Template};
use crate::utils::image_ops::{cover_fit, load_image_from_memory_async};
use crate::utils::metrics::Metrics;

/// Sample text substituted for semantic tags that have no explicit
/// binding, so a bare preview still reads like a finished design.
const SAMPLE_CONTENT: &[(&str, &str)] = &[
    ("TITLE", "Sample Title"),
    ("SUBTITLE", "Sample Subtitle"),
    ("DESCRIPTION", "Sample Description Text"),
    ("AUTHOR", "Sample Author"),
    ("DATE", "Sample Date"),
    ("CATEGORY", "Sample Category"),
    ("TAG", "Sample Tag"),
    ("QUOTE", "Sample Quote"),
    ("CTA_TEXT", "Click Here"),
    ("PRICE", "$99"),
    ("DOMAIN", "sample.com"),
    ("SITE_NAME", "Sample Website"),
    ("BRAND_NAME", "Sample Brand"),
    ("URL", "www.sample.com"),
    ("USERNAME", "@sampleuser"),
    ("USER_HANDLE", "@sample"),
    ("FOLLOWERS", "1.2K"),
    ("LIKES", "456"),
    ("SHARES", "123"),
    ("VIEWS", "2.3K"),
    ("RATING", "4.5"),
    ("PERCENTAGE", "85%"),
    ("NUMBER", "42"),
];

/// Sample content for a placeholder tag, if one is defined. Numeric
/// text tags fall back to generic filler.
pub fn sample_for(tag: &str) -> Option<&'static str> {
    SAMPLE_CONTENT
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, s)| *s)
        .or_else(|| tag.starts_with("TEXT_").then_some("Sample Text"))
}

/// Resolve a text element's content: explicit binding wins, then the
/// sample table, then the content verbatim (literal text, or an
/// unresolvable tag left visible for debugging).
pub fn resolve_content(content: &str, bindings: &HashMap<String, String>) -> String {
    match extract_tag(content) {
        Some(tag) => bindings
            .get(tag)
            .cloned()
            .or_else(|| sample_for(tag).map(str::to_string))
            .unwrap_or_else(|| content.to_string()),
        None => content.to_string(),
    }
}

const NEUTRAL_FILL: Rgba<u8> = Rgba([0xe0, 0xe0, 0xe0, 0xff]);
const NEUTRAL_STROKE: Rgba<u8> = Rgba([0xcc, 0xcc, 0xcc, 0xff]);
const LABEL_COLOR: Rgba<u8> = Rgba([0x66, 0x66, 0x66, 0xff]);
const LABEL_FONT_SIZE: f32 = 14.0;
const LINE_HEIGHT_FACTOR: f32 = 1.35;

pub struct PreviewRenderer {
    font_system: Arc<Mutex<FontSystem>>,
    swash_cache: Arc<Mutex<SwashCache>>,
    metrics: Option<Metrics>,
}

impl PreviewRenderer {
    /// A renderer backed by the manager's font database, or system
    /// fonts only when no manager is supplied.
    pub fn new(font_manager: Option<&FontManager>) -> Self {
        let font_system = match font_manager {
            Some(manager) => manager.font_system(),
            None => FontSystem::new(),
        };
        Self {
            font_system: Arc::new(Mutex::new(font_system)),
            swash_cache: Arc::new(Mutex::new(SwashCache::new())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Rasterize a template without any photo material. Image slots
    /// come out as neutral boxes with a dashed border and tag label.
    pub fn render(
        &self,
        template: &Template,
        bindings: &HashMap<String, String>,
    ) -> TemplateResult<RgbaImage> {
        self.render_with_photos(template, bindings, &HashMap::new())
    }

    /// Rasterize a template, compositing `photos` (keyed by placeholder
    /// tag) into matching image slots.
    #[instrument(skip_all, fields(template = %template.id, w = template.width, h = template.height))]
    pub fn render_with_photos(
        &self,
        template: &Template,
        bindings: &HashMap<String, String>,
        photos: &HashMap<String, DynamicImage>,
    ) -> TemplateResult<RgbaImage> {
        template.validate()?;

        let background = parse_hex(&template.background_color);
        let mut canvas = RgbaImage::from_pixel(template.width, template.height, background);

        for element in &template.elements {
            match element {
                Element::ImagePlaceholder { tag, bbox, fill, stroke } => {
                    match lookup_photo(photos, template, tag) {
                        Some(photo) => {
                            let fitted = cover_fit(photo, bbox.width, bbox.height);
                            overlay(&mut canvas, &fitted, bbox.x, bbox.y);
                        }
                        None => {
                            fill_rect(&mut canvas, bbox, parse_hex(fill));
                            dashed_rect(&mut canvas, bbox, parse_hex(stroke));
                            self.draw_label(&mut canvas, bbox, &format!("{{{tag}}}"));
                        }
                    }
                }
                Element::TextPlaceholder { content, bbox, font_family, font_size, fill } => {
                    let text = resolve_content(content, bindings);
                    self.draw_text(
                        &mut canvas,
                        bbox,
                        &text,
                        font_family,
                        *font_size as f32,
                        parse_hex(fill),
                        false,
                    );
                }
                Element::Decorative { bbox, fill, stroke, stroke_width, .. } => {
                    if let Some(fill) = fill {
                        fill_rect(&mut canvas, bbox, parse_hex(fill));
                    }
                    if let Some(stroke) = stroke {
                        stroke_rect(&mut canvas, bbox, parse_hex(stroke), *stroke_width);
                    }
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_preview_rendered();
        }
        debug!(elements = template.elements.len(), "preview rendered");
        Ok(canvas)
    }

    /// Resolve stock photos for every real-photo image slot, then
    /// render. A failed fetch degrades that slot to a neutral box
    /// instead of failing the preview.
    pub async fn render_resolved(
        &self,
        template: &Template,
        bindings: &HashMap<String, String>,
        resolver: &StockPhotoResolver,
        client: &reqwest::Client,
    ) -> TemplateResult<RgbaImage> {
        let photos = fetch_photos(template, resolver, client).await;
        self.render_with_photos(template, bindings, &photos)
    }

    fn draw_label(&self, canvas: &mut RgbaImage, bbox: &Bbox, text: &str) {
        self.draw_text(canvas, bbox, text, "Arial", LABEL_FONT_SIZE, LABEL_COLOR, true);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        bbox: &Bbox,
        text: &str,
        family: &str,
        font_size: f32,
        color: Rgba<u8>,
        centered: bool,
    ) {
        if text.is_empty() || bbox.width == 0 || bbox.height == 0 {
            return;
        }

        let mut font_system = self.font_system.lock();
        let mut swash_cache = self.swash_cache.lock();

        let line_height = font_size * LINE_HEIGHT_FACTOR;
        let mut buffer = Buffer::new(&mut font_system, TextMetrics::new(font_size, line_height));
        buffer.set_size(&mut font_system, Some(bbox.width as f32), None);
        buffer.set_wrap(&mut font_system, Wrap::Word);

        let attrs = Attrs::new().family(Family::Name(family));
        buffer.set_text(&mut font_system, text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut font_system, false);

        let (origin_x, origin_y) = if centered {
            let text_width = buffer
                .layout_runs()
                .map(|run| run.line_w)
                .fold(0.0f32, f32::max);
            let line_count = buffer.layout_runs().count() as f32;
            let text_height = line_count * line_height;
            let x = bbox.x as f32 + ((bbox.width as f32 - text_width) / 2.0).max(0.0);
            let y = bbox.y as f32 + ((bbox.height as f32 - text_height) / 2.0).max(0.0);
            (x, y)
        } else {
            (bbox.x as f32, bbox.y as f32)
        };

        let (canvas_w, canvas_h) = canvas.dimensions();
        let text_color = CosmicColor::rgba(color[0], color[1], color[2], color[3]);
        buffer.draw(
            &mut font_system,
            &mut swash_cache,
            text_color,
            |px_x, px_y, _w, _h, pixel_color| {
                let x = origin_x as i32 + px_x;
                let y = origin_y as i32 + px_y;
                if x < 0 || y < 0 || x >= canvas_w as i32 || y >= canvas_h as i32 {
                    return;
                }
                let alpha = pixel_color.a() as f32 / 255.0;
                if alpha <= 0.0 {
                    return;
                }
                let existing = canvas.get_pixel(x as u32, y as u32);
                let blended = Rgba([
                    (pixel_color.r() as f32 * alpha + existing[0] as f32 * (1.0 - alpha)) as u8,
                    (pixel_color.g() as f32 * alpha + existing[1] as f32 * (1.0 - alpha)) as u8,
                    (pixel_color.b() as f32 * alpha + existing[2] as f32 * (1.0 - alpha)) as u8,
                    existing[3].max(pixel_color.a()),
                ]);
                canvas.put_pixel(x as u32, y as u32, blended);
            },
        );
    }
}

/// Fetch a photo for each real-photo image placeholder. Placeholder
/// icons keep their neutral box, and any fetch failure is logged and
/// skipped.
pub async fn fetch_photos(
    template: &Template,
    resolver: &StockPhotoResolver,
    client: &reqwest::Client,
) -> HashMap<String, DynamicImage> {
    let mut photos = HashMap::new();
    for placeholder in &template.placeholders {
        if placeholder.kind != PlaceholderKind::Image
            || placeholder.region_kind == Some(RegionKind::PlaceholderIcon)
        {
            continue;
        }
        let query = StockPhotoQuery {
            width: placeholder.bbox.width.max(1),
            height: placeholder.bbox.height.max(1),
            category: None,
        };
        let resolved = resolver.resolve(&query).await;
        match download_photo(client, &resolved.url).await {
            Ok(img) => {
                debug!(tag = %placeholder.tag, provider = %resolved.provider, "photo resolved");
                photos.insert(placeholder.tag.clone(), img);
            }
            Err(err) => {
                warn!(tag = %placeholder.tag, url = %resolved.url, error = %err, "photo fetch failed, slot stays neutral");
            }
        }
    }
    photos
}

async fn download_photo(client: &reqwest::Client, url: &str) -> anyhow::Result<DynamicImage> {
    let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;
    load_image_from_memory_async(&bytes).await
}

fn lookup_photo<'a>(
    photos: &'a HashMap<String, DynamicImage>,
    template: &Template,
    tag: &str,
) -> Option<&'a DynamicImage> {
    photos.get(tag).or_else(|| {
        // Elements may reference the semantic alias; map it back to the
        // numeric tag the photo was stored under.
        template
            .placeholders
            .iter()
            .find(|p| p.semantic_tag.as_deref() == Some(tag))
            .and_then(|p| photos.get(&p.tag))
    })
}

/// "#rrggbb" (case-insensitive) to an opaque pixel; anything else
/// falls back to black.
pub fn parse_hex(hex: &str) -> Rgba<u8> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return Rgba([0, 0, 0, 255]);
    }
    let parse = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16);
    match (parse(0..2), parse(2..4), parse(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => Rgba([r, g, b, 255]),
        _ => Rgba([0, 0, 0, 255]),
    }
}

fn fill_rect(canvas: &mut RgbaImage, bbox: &Bbox, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    for y in bbox.y..bbox.bottom().min(h) {
        for x in bbox.x..bbox.right().min(w) {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn stroke_rect(canvas: &mut RgbaImage, bbox: &Bbox, color: Rgba<u8>, stroke_width: u32) {
    let (w, h) = canvas.dimensions();
    let sw = stroke_width.max(1);
    for y in bbox.y..bbox.bottom().min(h) {
        for x in bbox.x..bbox.right().min(w) {
            let edge = x < bbox.x + sw
                || y < bbox.y + sw
                || x + sw >= bbox.right()
                || y + sw >= bbox.bottom();
            if edge {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

/// One-pixel dashed outline, five pixels on and five off.
fn dashed_rect(canvas: &mut RgbaImage, bbox: &Bbox, color: Rgba<u8>) {
    const DASH: u32 = 5;
    let (w, h) = canvas.dimensions();
    let on = |offset: u32| (offset / DASH) % 2 == 0;

    let bottom = bbox.bottom().saturating_sub(1);
    let right = bbox.right().saturating_sub(1);
    for x in bbox.x..bbox.right().min(w) {
        if on(x - bbox.x) {
            if bbox.y < h {
                canvas.put_pixel(x, bbox.y, color);
            }
            if bottom < h {
                canvas.put_pixel(x, bottom, color);
            }
        }
    }
    for y in bbox.y..bbox.bottom().min(h) {
        if on(y - bbox.y) {
            if bbox.x < w {
                canvas.put_pixel(bbox.x, y, color);
            }
            if right < w {
                canvas.put_pixel(right, y, color);
            }
        }
    }
}

fn overlay(canvas: &mut RgbaImage, photo: &RgbaImage, x: u32, y: u32) {
    let (w, h) = canvas.dimensions();
    for (px, py, pixel) in photo.enumerate_pixels() {
        let cx = x + px;
        let cy = y + py;
        if cx < w && cy < h {
            canvas.put_pixel(cx, cy, *pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Placeholder;

    fn image_template() -> Template {
        Template {
            id: "template_test_0001".to_string(),
            width: 200,
            height: 300,
            style_name: "modern".to_string(),
            background_color: "#FFFFFF".to_string(),
            elements: vec![Element::ImagePlaceholder {
                tag: "IMAGE_1".to_string(),
                bbox: Bbox::new(20, 40, 120, 160),
                fill: "#e0e0e0".to_string(),
                stroke: "#cccccc".to_string(),
            }],
            placeholders: vec![Placeholder {
                tag: "IMAGE_1".to_string(),
                kind: PlaceholderKind::Image,
                bbox: Bbox::new(20, 40, 120, 160),
                semantic_tag: None,
                region_kind: Some(RegionKind::RealPhoto),
            }],
        }
    }

    #[test]
    fn binding_beats_sample_content() {
        let mut bindings = HashMap::new();
        bindings.insert("TITLE".to_string(), "Winter Sale".to_string());
        assert_eq!(resolve_content("{TITLE}", &bindings), "Winter Sale");
        assert_eq!(resolve_content("{TITLE}", &HashMap::new()), "Sample Title");
    }

    #[test]
    fn every_assignable_semantic_tag_has_sample_content() {
        // Keep in sync with the classifier's keyword targets and its
        // length fallback tags
        for tag in [
            "TITLE", "SUBTITLE", "DESCRIPTION", "AUTHOR", "DATE", "CATEGORY", "QUOTE",
            "PRICE", "SITE_NAME", "BRAND_NAME", "URL", "USERNAME", "CTA_TEXT", "TAG",
        ] {
            assert!(sample_for(tag).is_some(), "no sample content for {tag}");
        }
    }

    #[test]
    fn numeric_text_tags_get_generic_filler() {
        assert_eq!(resolve_content("{TEXT_3}", &HashMap::new()), "Sample Text");
    }

    #[test]
    fn literal_and_unknown_content_pass_through() {
        let bindings = HashMap::new();
        assert_eq!(resolve_content("Hello world", &bindings), "Hello world");
        // An unknown tag stays visible rather than vanishing.
        assert_eq!(resolve_content("{MYSTERY_TAG}", &bindings), "{MYSTERY_TAG}");
    }

    #[test]
    fn render_fills_background_and_neutral_boxes() {
        let renderer = PreviewRenderer::new(None);
        let template = image_template();
        let canvas = renderer.render(&template, &HashMap::new()).unwrap();

        assert_eq!(canvas.dimensions(), (200, 300));
        // Outside every element: background.
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        // Just inside the image box border, away from the centered
        // label: neutral fill.
        assert_eq!(*canvas.get_pixel(25, 45), Rgba([0xe0, 0xe0, 0xe0, 0xff]));
        // Border corner pixel is the first dash.
        assert_eq!(*canvas.get_pixel(20, 40), Rgba([0xcc, 0xcc, 0xcc, 0xff]));
    }

    #[test]
    fn photos_composite_over_image_slots() {
        let renderer = PreviewRenderer::new(None);
        let template = image_template();
        let green = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            60,
            80,
            Rgba([0, 200, 0, 255]),
        ));
        let mut photos = HashMap::new();
        photos.insert("IMAGE_1".to_string(), green);

        let canvas = renderer
            .render_with_photos(&template, &HashMap::new(), &photos)
            .unwrap();
        assert_eq!(*canvas.get_pixel(80, 120), Rgba([0, 200, 0, 255]));
        // Background untouched.
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn parse_hex_handles_malformed_input() {
        assert_eq!(parse_hex("#FF6B6B"), Rgba([0xff, 0x6b, 0x6b, 255]));
        assert_eq!(parse_hex("FF6B6B"), Rgba([0xff, 0x6b, 0x6b, 255]));
        assert_eq!(parse_hex("#zzz"), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_hex(""), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn decorative_fill_and_stroke() {
        let renderer = PreviewRenderer::new(None);
        let template = Template {
            id: "template_test_0002".to_string(),
            width: 100,
            height: 100,
            style_name: "minimal".to_string(),
            background_color: "#F8F9FA".to_string(),
            elements: vec![Element::Decorative {
                bbox: Bbox::new(10, 10, 50, 50),
                fill: Some("#E9ECEF".to_string()),
                stroke: Some("#6C757D".to_string()),
                stroke_width: 2,
                corner_radius: 0,
            }],
            placeholders: vec![],
        };
        let canvas = renderer.render(&template, &HashMap::new()).unwrap();
        assert_eq!(*canvas.get_pixel(35, 35), Rgba([0xe9, 0xec, 0xef, 0xff]));
        assert_eq!(*canvas.get_pixel(10, 35), Rgba([0x6c, 0x75, 0x7d, 0xff]));
    }
}
