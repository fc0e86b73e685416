// Template synthesis: analysis + style -> reusable template.
//
// The canvas mirrors the analyzed image so region boxes carry over
// unchanged. Placeholders become dashed image boxes and tagged text
// slots; structural layout regions that do not collide with any
// placeholder become decorative panels.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::{debug, instrument};

use crate::core::errors::TemplateResult;
use crate::core::types::{AnalysisResult, BackgroundKind, PlaceholderKind};
use crate::pipeline::placeholder::PlaceholderMapper;
use crate::services::segmentation::estimate_font_size;
use crate::template::{Element, StyleRegistry, Template};

pub struct TemplateSynthesizer {
    styles: StyleRegistry,
}

impl TemplateSynthesizer {
    pub fn new() -> Self {
        Self {
            styles: StyleRegistry::builtin(),
        }
    }

    pub fn style_names(&self) -> Vec<&str> {
        self.styles.names()
    }

    /// Build a validated template from an analysis. Unknown style names
    /// are an error, never silently mapped to a default.
    #[instrument(skip(self, analysis), fields(style = style_name))]
    pub fn synthesize(
        &self,
        analysis: &AnalysisResult,
        style_name: &str,
    ) -> TemplateResult<Template> {
        let style = self.styles.resolve(style_name)?;
        let width = analysis.dimensions.width;
        let height = analysis.dimensions.height;

        // Solid source backgrounds carry their color into the template,
        // anything busier falls back to the style background
        let background_color = if analysis.background.kind == BackgroundKind::Solid
            && analysis.mode == crate::core::types::AnalysisMode::Full
        {
            analysis.background.color_hex.clone()
        } else {
            style.background_color.clone()
        };

        let placeholders = PlaceholderMapper::map(analysis);

        // Picture boxes paint first so text slots stay on top
        let mut elements = Vec::new();
        for slot in placeholders.iter().filter(|p| p.kind == PlaceholderKind::Image) {
            elements.push(Element::ImagePlaceholder {
                tag: slot.effective_tag().to_string(),
                bbox: slot.bbox,
                fill: "#e0e0e0".to_string(),
                stroke: "#cccccc".to_string(),
            });
        }
        for slot in placeholders.iter().filter(|p| p.kind == PlaceholderKind::Text) {
            elements.push(Element::TextPlaceholder {
                content: format!("{{{}}}", slot.effective_tag()),
                bbox: slot.bbox,
                font_family: style.font_family.clone(),
                font_size: estimate_font_size(&slot.bbox),
                fill: style.text_color.clone(),
            });
        }

        // Structural panels survive only where no placeholder sits
        for region in &analysis.layout.regions {
            let collides = placeholders.iter().any(|p| p.bbox.intersects(&region.bbox));
            if collides {
                continue;
            }
            let Some(bbox) = region.bbox.clamp_to(width, height) else {
                continue;
            };
            elements.push(Element::Decorative {
                bbox,
                fill: None,
                stroke: Some(style.secondary_color.clone()),
                stroke_width: 2,
                corner_radius: style.border_radius,
            });
        }

        let template = Template {
            id: new_template_id(),
            width,
            height,
            style_name: style.name.clone(),
            background_color,
            elements,
            placeholders,
        };
        template.validate()?;
        debug!(
            id = %template.id,
            elements = template.elements.len(),
            slots = template.placeholders.len(),
            "template synthesized"
        );
        Ok(template)
    }
}

impl Default for TemplateSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_template_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let salt: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("template_{secs}_{salt:04}")
}
