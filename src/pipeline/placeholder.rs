// Placeholder mapping: turns analyzed regions into substitution slots.
//
// Every region gets a numeric tag (TEXT_1, IMAGE_1, ...) in region
// order, so tags are always unique and the mapping is deterministic.
// When a text region's content matches a keyword rule, the semantic
// alias is attached as well, first come first served.

use std::collections::HashSet;

use tracing::debug;

use crate::core::types::{
    AnalysisResult, ImageRegion, Placeholder, PlaceholderKind, TextRegion,
};

/// Keyword rules, checked in order; the first matching rule wins.
const KEYWORD_RULES: &[(&[&str], &str)] = &[
    (&["title", "headline", "heading"], "TITLE"),
    (&["subtitle", "subheading", "tagline"], "SUBTITLE"),
    (&["description", "summary", "about"], "DESCRIPTION"),
    (&["author", "by ", "written"], "AUTHOR"),
    (&["date", "published", "updated"], "DATE"),
    (&["category", "topic", "section"], "CATEGORY"),
    (&["quote", "\""], "QUOTE"),
    (&["price", "$", "cost"], "PRICE"),
    (&["website", "site name", "domain"], "SITE_NAME"),
    (&["brand"], "BRAND_NAME"),
    (&["www.", "http", "url"], "URL"),
    (&["@", "username", "handle"], "USERNAME"),
    (&["click", "shop", "learn more", "sign up", "cta"], "CTA_TEXT"),
];

/// Classify text content into a semantic tag candidate. Matching is
/// case-insensitive substring containment; unmatched text falls back to
/// a length heuristic. Only empty text gets no semantic tag.
pub fn classify_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let trimmed = lower.trim();
    if trimmed.is_empty() {
        return None;
    }
    let by_keyword = KEYWORD_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, tag)| *tag);
    by_keyword.or_else(|| {
        let len = trimmed.chars().count();
        Some(if len > 50 {
            "DESCRIPTION"
        } else if len < 10 {
            "TAG"
        } else {
            "TITLE"
        })
    })
}

/// Assign numeric tags to every region and semantic suggestions to text
/// regions whose alias is still unclaimed. Idempotent.
pub fn assign_tags(text_regions: &mut [TextRegion], image_regions: &mut [ImageRegion]) {
    let mut claimed: HashSet<&'static str> = HashSet::new();
    for region in text_regions.iter_mut() {
        region.suggested_tag = classify_text(&region.text)
            .filter(|tag| claimed.insert(tag))
            .map(str::to_string);
    }
    for (i, region) in image_regions.iter_mut().enumerate() {
        region.tag = Some(format!("IMAGE_{}", i + 1));
    }
}

pub struct PlaceholderMapper;

impl PlaceholderMapper {
    /// Pure mapping from an analysis to placeholder slots. The same
    /// analysis always yields the same slots in the same order.
    pub fn map(analysis: &AnalysisResult) -> Vec<Placeholder> {
        let mut placeholders =
            Vec::with_capacity(analysis.text_regions.len() + analysis.image_regions.len());

        let mut claimed: HashSet<String> = HashSet::new();
        for (i, region) in analysis.text_regions.iter().enumerate() {
            // Respect pre-assigned suggestions; otherwise classify here so
            // hand-built results map the same way
            let semantic = region
                .suggested_tag
                .clone()
                .or_else(|| classify_text(&region.text).map(str::to_string))
                .filter(|tag| claimed.insert(tag.clone()));
            placeholders.push(Placeholder {
                tag: format!("TEXT_{}", i + 1),
                kind: PlaceholderKind::Text,
                bbox: region.bbox,
                semantic_tag: semantic,
                region_kind: None,
            });
        }

        for (i, region) in analysis.image_regions.iter().enumerate() {
            placeholders.push(Placeholder {
                tag: region.tag.clone().unwrap_or_else(|| format!("IMAGE_{}", i + 1)),
                kind: PlaceholderKind::Image,
                bbox: region.bbox,
                semantic_tag: None,
                region_kind: Some(region.kind),
            });
        }

        debug!(slots = placeholders.len(), "placeholders mapped");
        placeholders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        AnalysisMode, BackgroundInfo, Bbox, ColorMood, ColorTemperature, CompositionReport,
        Dimensions, LayoutInfo, RegionKind,
    };

    fn text_region(text: &str) -> TextRegion {
        TextRegion {
            text: text.to_string(),
            bbox: Bbox::new(0, 0, 100, 30),
            confidence: 0.9,
            estimated_font_size: Some(24),
            suggested_tag: None,
        }
    }

    fn analysis(text: Vec<TextRegion>, images: Vec<ImageRegion>) -> AnalysisResult {
        AnalysisResult {
            mode: AnalysisMode::Full,
            dimensions: Dimensions {
                width: 800,
                height: 1200,
            },
            colors: vec![],
            color_temperature: ColorTemperature::Neutral,
            color_mood: ColorMood::Balanced,
            average_brightness: 128.0,
            text_regions: text,
            image_regions: images,
            layout: LayoutInfo::default(),
            background: BackgroundInfo::default(),
            composition: CompositionReport::default(),
            platform_score: 100,
            recommendations: vec![],
            errors: vec![],
        }
    }

    #[test]
    fn keyword_rules_first_match_wins() {
        assert_eq!(classify_text("My Great Headline"), Some("TITLE"));
        assert_eq!(classify_text("only $9.99 today"), Some("PRICE"));
        assert_eq!(classify_text("shop the look"), Some("CTA_TEXT"));
        assert_eq!(classify_text("visit www.example.com"), Some("URL"));
        // "title" rule fires before "description" for mixed content
        assert_eq!(classify_text("title and description"), Some("TITLE"));
        assert_eq!(classify_text(""), None);
        assert_eq!(classify_text("   "), None);
    }

    #[test]
    fn length_fallback_for_unmatched_text() {
        assert_eq!(classify_text("hi"), Some("TAG"));
        assert_eq!(classify_text("plain ordinary words"), Some("TITLE"));
        let long = "a".repeat(60);
        assert_eq!(classify_text(&long), Some("DESCRIPTION"));
    }

    #[test]
    fn mapping_is_deterministic() {
        let a = analysis(
            vec![text_region("Big Title"), text_region("just words")],
            vec![ImageRegion {
                bbox: Bbox::new(10, 10, 200, 200),
                confidence: 0.8,
                kind: RegionKind::RealPhoto,
                tag: None,
            }],
        );
        let first = PlaceholderMapper::map(&a);
        let second = PlaceholderMapper::map(&a);
        let tags = |ps: &[Placeholder]| -> Vec<String> {
            ps.iter().map(|p| p.tag.clone()).collect()
        };
        assert_eq!(tags(&first), tags(&second));
        assert_eq!(tags(&first), vec!["TEXT_1", "TEXT_2", "IMAGE_1"]);
        assert_eq!(first[0].semantic_tag.as_deref(), Some("TITLE"));
        assert_eq!(first[1].semantic_tag, None);
    }

    #[test]
    fn duplicate_semantic_candidates_stay_unique() {
        let a = analysis(
            vec![
                text_region("headline one"),
                text_region("headline two"),
                text_region("price $5"),
            ],
            vec![],
        );
        let placeholders = PlaceholderMapper::map(&a);
        // First headline claims TITLE, second falls back to numeric only
        assert_eq!(placeholders[0].semantic_tag.as_deref(), Some("TITLE"));
        assert_eq!(placeholders[1].semantic_tag, None);
        assert_eq!(placeholders[2].semantic_tag.as_deref(), Some("PRICE"));

        let mut tags: Vec<&str> = placeholders.iter().map(|p| p.effective_tag()).collect();
        let before = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), before);
    }

    #[test]
    fn assign_tags_matches_mapper_output() {
        let mut text = vec![text_region("Big Title"), text_region("Big Title again")];
        let mut images = vec![
            ImageRegion {
                bbox: Bbox::new(0, 0, 50, 50),
                confidence: 0.7,
                kind: RegionKind::PlaceholderIcon,
                tag: None,
            },
            ImageRegion {
                bbox: Bbox::new(60, 0, 50, 50),
                confidence: 0.7,
                kind: RegionKind::RealPhoto,
                tag: None,
            },
        ];
        assign_tags(&mut text, &mut images);
        assert_eq!(text[0].suggested_tag.as_deref(), Some("TITLE"));
        assert_eq!(text[1].suggested_tag, None);
        assert_eq!(images[0].tag.as_deref(), Some("IMAGE_1"));
        assert_eq!(images[1].tag.as_deref(), Some("IMAGE_2"));

        let placeholders = PlaceholderMapper::map(&analysis(text, images));
        assert_eq!(placeholders[0].effective_tag(), "TITLE");
        assert_eq!(placeholders[1].effective_tag(), "TEXT_2");
        assert_eq!(placeholders[3].region_kind, Some(RegionKind::RealPhoto));
    }
}
