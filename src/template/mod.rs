// Template data model: a canvas, a background, ordered elements, and
// the placeholder slots those elements reference.

pub mod style;
pub mod svg;

use serde::{Deserialize, Serialize};

use crate::core::errors::{TemplateError, TemplateResult};
use crate::core::types::{Bbox, Placeholder};

pub use style::{StyleRegistry, StyleSpec};

/// One drawable element. Order is paint order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// A box a photo will be substituted into.
    ImagePlaceholder {
        tag: String,
        bbox: Bbox,
        fill: String,
        stroke: String,
    },
    /// A text slot. `content` is either a brace-wrapped placeholder tag
    /// ("{TITLE}") or literal text.
    TextPlaceholder {
        content: String,
        bbox: Bbox,
        font_family: String,
        font_size: u32,
        fill: String,
    },
    /// Non-substitutable decoration (frames, panels).
    Decorative {
        bbox: Bbox,
        fill: Option<String>,
        stroke: Option<String>,
        stroke_width: u32,
        corner_radius: u32,
    },
}

impl Element {
    pub fn bbox(&self) -> &Bbox {
        match self {
            Element::ImagePlaceholder { bbox, .. } => bbox,
            Element::TextPlaceholder { bbox, .. } => bbox,
            Element::Decorative { bbox, .. } => bbox,
        }
    }

    /// The placeholder tag this element references, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Element::ImagePlaceholder { tag, .. } => Some(tag),
            Element::TextPlaceholder { content, .. } => extract_tag(content),
            Element::Decorative { .. } => None,
        }
    }
}

/// "{TITLE}" -> Some("TITLE"); literal text -> None.
pub fn extract_tag(content: &str) -> Option<&str> {
    let inner = content.strip_prefix('{')?.strip_suffix('}')?;
    let valid = !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    valid.then_some(inner)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub style_name: String,
    pub background_color: String,
    pub elements: Vec<Element>,
    pub placeholders: Vec<Placeholder>,
}

impl Template {
    /// Structural checks: positive canvas, every element inside it, and
    /// every element tag backed by a placeholder (numeric or semantic).
    pub fn validate(&self) -> TemplateResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TemplateError::Format(format!(
                "canvas must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }

        for element in &self.elements {
            let b = element.bbox();
            if b.right() > self.width || b.bottom() > self.height {
                return Err(TemplateError::OutOfCanvas {
                    width: self.width,
                    height: self.height,
                });
            }
            if let Some(tag) = element.tag() {
                let known = self
                    .placeholders
                    .iter()
                    .any(|p| p.tag == tag || p.semantic_tag.as_deref() == Some(tag));
                if !known {
                    return Err(TemplateError::OrphanElement {
                        tag: tag.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All placeholder tags referenced by elements, in paint order.
    pub fn element_tags(&self) -> Vec<&str> {
        self.elements.iter().filter_map(|e| e.tag()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PlaceholderKind;

    fn placeholder(tag: &str, kind: PlaceholderKind) -> Placeholder {
        Placeholder {
            tag: tag.to_string(),
            kind,
            bbox: Bbox::new(10, 10, 100, 50),
            semantic_tag: None,
            region_kind: None,
        }
    }

    #[test]
    fn extract_tag_accepts_only_brace_wrapped_upper() {
        assert_eq!(extract_tag("{TITLE}"), Some("TITLE"));
        assert_eq!(extract_tag("{TEXT_2}"), Some("TEXT_2"));
        assert_eq!(extract_tag("Shop now"), None);
        assert_eq!(extract_tag("{lower}"), None);
        assert_eq!(extract_tag("{}"), None);
    }

    #[test]
    fn orphan_element_tag_fails_validation() {
        let template = Template {
            id: "t1".into(),
            width: 800,
            height: 1200,
            style_name: "modern".into(),
            background_color: "#ffffff".into(),
            elements: vec![Element::TextPlaceholder {
                content: "{TITLE}".into(),
                bbox: Bbox::new(10, 10, 100, 50),
                font_family: "Arial".into(),
                font_size: 24,
                fill: "#333333".into(),
            }],
            placeholders: vec![placeholder("TEXT_1", PlaceholderKind::Text)],
        };
        assert!(matches!(
            template.validate(),
            Err(TemplateError::OrphanElement { tag }) if tag == "TITLE"
        ));
    }

    #[test]
    fn semantic_alias_satisfies_element_reference() {
        let mut p = placeholder("TEXT_1", PlaceholderKind::Text);
        p.semantic_tag = Some("TITLE".into());
        let template = Template {
            id: "t1".into(),
            width: 800,
            height: 1200,
            style_name: "modern".into(),
            background_color: "#ffffff".into(),
            elements: vec![Element::TextPlaceholder {
                content: "{TITLE}".into(),
                bbox: Bbox::new(10, 10, 100, 50),
                font_family: "Arial".into(),
                font_size: 24,
                fill: "#333333".into(),
            }],
            placeholders: vec![p],
        };
        assert!(template.validate().is_ok());
    }

    #[test]
    fn out_of_canvas_element_rejected() {
        let template = Template {
            id: "t1".into(),
            width: 100,
            height: 100,
            style_name: "modern".into(),
            background_color: "#ffffff".into(),
            elements: vec![Element::Decorative {
                bbox: Bbox::new(50, 50, 100, 100),
                fill: None,
                stroke: Some("#000000".into()),
                stroke_width: 2,
                corner_radius: 0,
            }],
            placeholders: vec![],
        };
        assert!(matches!(
            template.validate(),
            Err(TemplateError::OutOfCanvas { .. })
        ));
    }
}
