// SVG persistence for templates.
//
// The writer emits one element per line in a fixed attribute order; the
// reader parses exactly that subset back. Image placeholders are a
// dashed rect followed by a centered label carrying the tag, text slots
// are plain <text> nodes, decorations are stroke/fill rects.

use tracing::debug;

use crate::core::errors::{TemplateError, TemplateResult};
use crate::core::types::{Bbox, Placeholder, PlaceholderKind, RegionKind};

use super::{extract_tag, Element, Template};

pub fn to_svg(template: &Template) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" data-id=\"{}\" data-style=\"{}\">\n",
        template.width,
        template.height,
        escape_xml(&template.id),
        escape_xml(&template.style_name),
    ));
    out.push_str(&format!(
        "  <rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"{}\"/>\n",
        template.width, template.height, template.background_color
    ));

    for element in &template.elements {
        match element {
            Element::ImagePlaceholder {
                tag,
                bbox,
                fill,
                stroke,
            } => {
                out.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" stroke-dasharray=\"5,5\"/>\n",
                    bbox.x, bbox.y, bbox.width, bbox.height, fill, stroke
                ));
                let (cx, cy) = bbox.center();
                out.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\" fill=\"#666666\">{{{}}}</text>\n",
                    cx, cy, tag
                ));
            }
            Element::TextPlaceholder {
                content,
                bbox,
                font_family,
                font_size,
                fill,
            } => {
                out.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" data-width=\"{}\" data-height=\"{}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>\n",
                    bbox.x,
                    bbox.y + *font_size.min(&bbox.height),
                    bbox.width,
                    bbox.height,
                    escape_xml(font_family),
                    font_size,
                    fill,
                    escape_xml(content)
                ));
            }
            Element::Decorative {
                bbox,
                fill,
                stroke,
                stroke_width,
                corner_radius,
            } => {
                let fill_attr = fill.as_deref().unwrap_or("none");
                let stroke_attr = stroke.as_deref().unwrap_or("none");
                out.push_str(&format!(
                    "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\" rx=\"{}\"/>\n",
                    bbox.x, bbox.y, bbox.width, bbox.height, fill_attr, stroke_attr, stroke_width, corner_radius
                ));
            }
        }
    }

    out.push_str("</svg>\n");
    out
}

/// Parse a template back from the writer's SVG subset. Anything outside
/// that subset is a format error, not a best-effort guess.
pub fn from_svg(input: &str) -> TemplateResult<Template> {
    let svg_line = input
        .lines()
        .find(|l| l.trim_start().starts_with("<svg"))
        .ok_or_else(|| TemplateError::Format("missing <svg> root".to_string()))?;

    let width = parse_u32_attr(svg_line, "width")?;
    let height = parse_u32_attr(svg_line, "height")?;
    let id = attr(svg_line, "data-id")
        .map(unescape_xml)
        .unwrap_or_else(|| "template".to_string());
    let style_name = attr(svg_line, "data-style")
        .map(unescape_xml)
        .unwrap_or_else(|| "modern".to_string());

    let mut background_color = "#ffffff".to_string();
    let mut background_seen = false;
    let mut elements: Vec<Element> = Vec::new();
    // Dashed rect waiting for its centered tag label
    let mut pending_image: Option<(Bbox, String, String)> = None;

    for raw in input.lines() {
        let line = raw.trim_start();
        if line.starts_with("<rect") {
            if pending_image.is_some() {
                return Err(TemplateError::Format(
                    "image placeholder rect without a tag label".to_string(),
                ));
            }
            let bbox = Bbox::new(
                parse_u32_attr(line, "x")?,
                parse_u32_attr(line, "y")?,
                parse_u32_attr(line, "width")?,
                parse_u32_attr(line, "height")?,
            );
            let fill = attr(line, "fill").unwrap_or("none").to_string();
            let stroke = attr(line, "stroke").map(str::to_string);
            let dashed = attr(line, "stroke-dasharray").is_some();

            if !background_seen
                && bbox.x == 0
                && bbox.y == 0
                && bbox.width == width
                && bbox.height == height
                && !dashed
            {
                background_color = fill;
                background_seen = true;
            } else if dashed {
                pending_image = Some((bbox, fill, stroke.unwrap_or_else(|| "none".to_string())));
            } else {
                elements.push(Element::Decorative {
                    bbox,
                    fill: (fill != "none").then_some(fill),
                    stroke: stroke.filter(|s| s != "none"),
                    stroke_width: attr(line, "stroke-width")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1),
                    corner_radius: attr(line, "rx").and_then(|v| v.parse().ok()).unwrap_or(0),
                });
            }
        } else if line.starts_with("<text") {
            let content = unescape_xml(text_content(line)?);
            if attr(line, "text-anchor") == Some("middle") {
                let (bbox, fill, stroke) = pending_image.take().ok_or_else(|| {
                    TemplateError::Format("centered label without an image rect".to_string())
                })?;
                let tag = extract_tag(&content)
                    .ok_or_else(|| {
                        TemplateError::Format(format!("invalid image tag label {content:?}"))
                    })?
                    .to_string();
                elements.push(Element::ImagePlaceholder {
                    tag,
                    bbox,
                    fill,
                    stroke,
                });
            } else {
                let font_size: u32 = attr(line, "font-size")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(16);
                let x = parse_u32_attr(line, "x")?;
                let baseline = parse_u32_attr(line, "y")?;
                let bbox = Bbox::new(
                    x,
                    baseline.saturating_sub(font_size),
                    attr(line, "data-width")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(width.saturating_sub(x)),
                    attr(line, "data-height")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(font_size + 4),
                );
                elements.push(Element::TextPlaceholder {
                    content,
                    bbox,
                    font_family: attr(line, "font-family")
                        .map(unescape_xml)
                        .unwrap_or_else(|| "Arial".to_string()),
                    font_size,
                    fill: attr(line, "fill").unwrap_or("#000000").to_string(),
                });
            }
        }
    }

    if pending_image.is_some() {
        return Err(TemplateError::Format(
            "unterminated image placeholder".to_string(),
        ));
    }

    let placeholders = placeholders_from_elements(&elements);
    let template = Template {
        id,
        width,
        height,
        style_name,
        background_color,
        elements,
        placeholders,
    };
    template.validate()?;
    debug!(
        id = %template.id,
        elements = template.elements.len(),
        "template parsed from svg"
    );
    Ok(template)
}

/// Rebuild the placeholder list from parsed elements, first occurrence
/// of each tag wins.
fn placeholders_from_elements(elements: &[Element]) -> Vec<Placeholder> {
    let mut seen = std::collections::HashSet::new();
    let mut placeholders = Vec::new();
    for element in elements {
        match element {
            Element::ImagePlaceholder { tag, bbox, .. } => {
                if seen.insert(tag.clone()) {
                    placeholders.push(Placeholder {
                        tag: tag.clone(),
                        kind: PlaceholderKind::Image,
                        bbox: *bbox,
                        semantic_tag: None,
                        region_kind: Some(RegionKind::RealPhoto),
                    });
                }
            }
            Element::TextPlaceholder { content, bbox, .. } => {
                if let Some(tag) = extract_tag(content) {
                    if seen.insert(tag.to_string()) {
                        placeholders.push(Placeholder {
                            tag: tag.to_string(),
                            kind: PlaceholderKind::Text,
                            bbox: *bbox,
                            semantic_tag: None,
                            region_kind: None,
                        });
                    }
                }
            }
            Element::Decorative { .. } => {}
        }
    }
    placeholders
}

/// Value of `name="..."` within a single tag line.
fn attr<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {name}=\"");
    let start = line.find(&needle)? + needle.len();
    let end = line[start..].find('"')? + start;
    Some(&line[start..end])
}

fn parse_u32_attr(line: &str, name: &str) -> TemplateResult<u32> {
    attr(line, name)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| TemplateError::Format(format!("missing or invalid attribute '{name}'")))
}

/// Inner text of a one-line <text>...</text> node.
fn text_content(line: &str) -> TemplateResult<&str> {
    let start = line
        .find('>')
        .ok_or_else(|| TemplateError::Format("unterminated <text> tag".to_string()))?
        + 1;
    let end = line
        .rfind("</text>")
        .ok_or_else(|| TemplateError::Format("missing </text>".to_string()))?;
    if end < start {
        return Err(TemplateError::Format("malformed <text> node".to_string()));
    }
    Ok(&line[start..end])
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape_xml(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template() -> Template {
        Template {
            id: "template_1700000000_0042".into(),
            width: 800,
            height: 1200,
            style_name: "vibrant".into(),
            background_color: "#FF6B6B".into(),
            elements: vec![
                Element::ImagePlaceholder {
                    tag: "IMAGE_1".into(),
                    bbox: Bbox::new(50, 100, 700, 500),
                    fill: "#e0e0e0".into(),
                    stroke: "#cccccc".into(),
                },
                Element::TextPlaceholder {
                    content: "{TITLE}".into(),
                    bbox: Bbox::new(50, 650, 700, 80),
                    font_family: "Impact".into(),
                    font_size: 48,
                    fill: "#FFFFFF".into(),
                },
                Element::TextPlaceholder {
                    content: "Shop now & save".into(),
                    bbox: Bbox::new(50, 760, 300, 40),
                    font_family: "Impact".into(),
                    font_size: 24,
                    fill: "#FFFFFF".into(),
                },
                Element::Decorative {
                    bbox: Bbox::new(10, 10, 780, 1180),
                    fill: None,
                    stroke: Some("#4ECDC4".into()),
                    stroke_width: 2,
                    corner_radius: 15,
                },
            ],
            placeholders: vec![
                Placeholder {
                    tag: "IMAGE_1".into(),
                    kind: PlaceholderKind::Image,
                    bbox: Bbox::new(50, 100, 700, 500),
                    semantic_tag: None,
                    region_kind: Some(RegionKind::RealPhoto),
                },
                Placeholder {
                    tag: "TITLE".into(),
                    kind: PlaceholderKind::Text,
                    bbox: Bbox::new(50, 650, 700, 80),
                    semantic_tag: None,
                    region_kind: None,
                },
            ],
        }
    }

    #[test]
    fn round_trip_preserves_structure() {
        let original = sample_template();
        let svg = to_svg(&original);
        let parsed = from_svg(&svg).unwrap();

        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.style_name, original.style_name);
        assert_eq!(parsed.width, 800);
        assert_eq!(parsed.height, 1200);
        assert_eq!(parsed.background_color, "#FF6B6B");
        assert_eq!(parsed.elements.len(), original.elements.len());
        // Tag set and paint order survive
        assert_eq!(parsed.element_tags(), original.element_tags());
        // Literal text survives with entities unescaped
        assert!(parsed.elements.iter().any(|e| matches!(
            e,
            Element::TextPlaceholder { content, .. } if content == "Shop now & save"
        )));
        // Placeholder set is rebuilt
        let tags: Vec<_> = parsed.placeholders.iter().map(|p| p.tag.as_str()).collect();
        assert_eq!(tags, vec!["IMAGE_1", "TITLE"]);
    }

    #[test]
    fn image_bbox_survives_round_trip() {
        let svg = to_svg(&sample_template());
        let parsed = from_svg(&svg).unwrap();
        let Element::ImagePlaceholder { bbox, .. } = &parsed.elements[0] else {
            panic!("first element should be the image placeholder");
        };
        assert_eq!(*bbox, Bbox::new(50, 100, 700, 500));
    }

    #[test]
    fn missing_root_is_a_format_error() {
        let err = from_svg("<html></html>").unwrap_err();
        assert!(matches!(err, TemplateError::Format(_)));
    }

    #[test]
    fn bad_dimensions_are_a_format_error() {
        let err = from_svg("<svg width=\"abc\" height=\"10\"></svg>").unwrap_err();
        assert!(matches!(err, TemplateError::Format(_)));
    }

    #[test]
    fn dangling_image_rect_is_rejected() {
        let svg = "<svg xmlns=\"x\" width=\"100\" height=\"100\">\n  <rect x=\"0\" y=\"0\" width=\"50\" height=\"50\" fill=\"#eee\" stroke=\"#ccc\" stroke-width=\"2\" stroke-dasharray=\"5,5\"/>\n</svg>\n";
        let err = from_svg(svg).unwrap_err();
        assert!(matches!(err, TemplateError::Format(_)));
    }
}
