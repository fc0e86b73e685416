// Built-in visual styles.
//
// Style names are a closed set; asking for anything else is an error
// rather than a silent default so callers catch typos immediately.

use serde::{Deserialize, Serialize};

use crate::core::errors::{TemplateError, TemplateResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSpec {
    pub name: String,
    pub background_color: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub text_color: String,
    pub font_family: String,
    pub border_radius: u32,
    pub padding: u32,
}

pub struct StyleRegistry {
    styles: Vec<StyleSpec>,
}

impl StyleRegistry {
    pub fn builtin() -> Self {
        let styles = vec![
            StyleSpec {
                name: "modern".to_string(),
                background_color: "#FFFFFF".to_string(),
                primary_color: "#2196F3".to_string(),
                secondary_color: "#FFC107".to_string(),
                text_color: "#333333".to_string(),
                font_family: "Arial".to_string(),
                border_radius: 8,
                padding: 20,
            },
            StyleSpec {
                name: "minimal".to_string(),
                background_color: "#F8F9FA".to_string(),
                primary_color: "#6C757D".to_string(),
                secondary_color: "#E9ECEF".to_string(),
                text_color: "#212529".to_string(),
                font_family: "Helvetica".to_string(),
                border_radius: 0,
                padding: 30,
            },
            StyleSpec {
                name: "vibrant".to_string(),
                background_color: "#FF6B6B".to_string(),
                primary_color: "#4ECDC4".to_string(),
                secondary_color: "#45B7D1".to_string(),
                text_color: "#FFFFFF".to_string(),
                font_family: "Impact".to_string(),
                border_radius: 15,
                padding: 15,
            },
        ];
        Self { styles }
    }

    pub fn resolve(&self, name: &str) -> TemplateResult<&StyleSpec> {
        self.styles
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| TemplateError::UnknownStyle(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.styles.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
