// Font Manager - registers uploaded fonts and serves them to rendering

use anyhow::{Context, Result};
use cosmic_text::fontdb;
use cosmic_text::FontSystem;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::types::{FontKind, FontRecord};

/// Font Manager - keeps a fontdb database of registered faces, persists
/// uploads into the fonts directory, and hands byte copies to callers
/// through a small LRU cache.
pub struct FontManager {
    fonts_dir: PathBuf,
    db: RwLock<fontdb::Database>,
    records: RwLock<Vec<FontRecord>>,
    byte_cache: Arc<Mutex<LruCache<String, Vec<u8>>>>,
}

impl FontManager {
    /// Create a manager rooted at `fonts_dir`, loading any font files
    /// already present there. Unreadable files are skipped with a warning.
    pub fn new(fonts_dir: impl AsRef<Path>) -> Result<Self> {
        let fonts_dir = fonts_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&fonts_dir).context("Failed to create fonts directory")?;

        let manager = Self {
            fonts_dir: fonts_dir.clone(),
            db: RwLock::new(fontdb::Database::new()),
            records: RwLock::new(Vec::new()),
            byte_cache: Arc::new(Mutex::new(LruCache::new(NonZeroUsize::new(20).unwrap()))),
        };

        let mut loaded = 0usize;
        if let Ok(entries) = std::fs::read_dir(&fonts_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                    .unwrap_or(false);
                if !is_font {
                    continue;
                }
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        let file_name = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("font.ttf")
                            .to_string();
                        if manager.register_loaded(&file_name, bytes).is_some() {
                            loaded += 1;
                        }
                    }
                    Err(e) => warn!("Skipping unreadable font {}: {}", path.display(), e),
                }
            }
        }

        info!(
            "Font Manager initialized ({} faces, dir: {})",
            loaded,
            fonts_dir.display()
        );
        Ok(manager)
    }

    /// Register a font from uploaded bytes, persisting it into the fonts
    /// directory. Returns the record for the first newly added face.
    pub fn register_font(&self, file_name: &str, bytes: Vec<u8>) -> Result<FontRecord> {
        let safe_name = sanitize_filename(file_name);
        let record = self
            .register_loaded(&safe_name, bytes.clone())
            .ok_or_else(|| anyhow::anyhow!("No usable font face in '{file_name}'"))?;

        let path = self.fonts_dir.join(&safe_name);
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to persist font to {}", path.display()))?;
        self.byte_cache.lock().put(safe_name, bytes);

        info!(
            family = %record.family_name,
            weight = record.weight,
            "font registered"
        );
        Ok(record)
    }

    /// Load bytes into the database and record the first new face.
    fn register_loaded(&self, file_name: &str, bytes: Vec<u8>) -> Option<FontRecord> {
        let mut db = self.db.write();
        let before: Vec<fontdb::ID> = db.faces().map(|f| f.id).collect();
        db.load_font_data(bytes);

        let new_face = db.faces().find(|f| !before.contains(&f.id))?;
        let family_name = new_face
            .families
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let style_name = new_face.post_script_name.clone();
        let kind = if new_face.monospaced {
            FontKind::Monospace
        } else {
            classify_font_kind(&family_name, &style_name)
        };
        let record = FontRecord {
            family_name,
            style_name,
            weight: new_face.weight.0,
            italic: new_face.style != fontdb::Style::Normal,
            kind,
            file_name: file_name.to_string(),
        };
        drop(db);

        self.records.write().push(record.clone());
        debug!(family = %record.family_name, "font face loaded");
        Some(record)
    }

    /// Registered faces in registration order.
    pub fn list_fonts(&self) -> Vec<FontRecord> {
        self.records.read().clone()
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.records
            .read()
            .iter()
            .any(|r| r.family_name.eq_ignore_ascii_case(family))
    }

    /// Font bytes by sanitized file name, via cache or disk.
    pub fn font_bytes(&self, file_name: &str) -> Result<Vec<u8>> {
        let key = sanitize_filename(file_name);
        if let Some(bytes) = self.byte_cache.lock().get(&key) {
            debug!("font '{}' served from memory cache", key);
            return Ok(bytes.clone());
        }
        let path = self.fonts_dir.join(&key);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        self.byte_cache.lock().put(key, bytes.clone());
        Ok(bytes)
    }

    /// Build a text shaping context over the registered faces plus the
    /// system fonts, so previews always have something to render with.
    pub fn font_system(&self) -> FontSystem {
        let mut db = self.db.read().clone();
        db.load_system_fonts();
        FontSystem::new_with_locale_and_db("en-US".to_string(), db)
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.byte_cache.lock();
        (cache.len(), cache.cap().get())
    }
}

/// Name-based typographic classification. Monospaced faces are caught
/// earlier from face metadata; everything unrecognized is sans-serif.
fn classify_font_kind(family_name: &str, style_name: &str) -> FontKind {
    let family = family_name.to_lowercase();
    let style = style_name.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| family.contains(k) || style.contains(k));

    if has(&["mono", "courier", "console", "code"]) {
        FontKind::Monospace
    } else if has(&["times", "georgia", "garamond"]) || family.contains("serif") && !family.contains("sans") {
        FontKind::Serif
    } else if has(&["script", "brush", "hand", "cursive"]) {
        FontKind::Cursive
    } else {
        FontKind::SansSerif
    }
}

/// Sanitize filename to prevent path traversal
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            ' ' => '_',
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Roboto.ttf"), "Roboto.ttf");
        assert_eq!(sanitize_filename("Open Sans.otf"), "Open_Sans.otf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("Font@#$Name.ttf"), "Font---Name.ttf");
    }

    #[test]
    fn empty_dir_initializes_with_no_fonts() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FontManager::new(dir.path()).unwrap();
        assert!(manager.list_fonts().is_empty());
        assert!(!manager.has_family("Arial"));
        assert_eq!(manager.cache_stats().0, 0);
    }

    #[test]
    fn font_kind_follows_family_naming() {
        assert_eq!(classify_font_kind("Courier New", "Regular"), FontKind::Monospace);
        assert_eq!(classify_font_kind("JetBrains Mono", "Medium"), FontKind::Monospace);
        assert_eq!(classify_font_kind("Times New Roman", "Bold"), FontKind::Serif);
        assert_eq!(classify_font_kind("PT Serif", "Regular"), FontKind::Serif);
        assert_eq!(classify_font_kind("Brush Script MT", "Italic"), FontKind::Cursive);
        assert_eq!(classify_font_kind("Roboto", "Regular"), FontKind::SansSerif);
        // "Sans" families never read as serif despite the substring
        assert_eq!(classify_font_kind("Open Sans Serif Display", "Regular"), FontKind::SansSerif);
        assert_eq!(classify_font_kind("Noto Sans", "Regular"), FontKind::SansSerif);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FontManager::new(dir.path()).unwrap();
        let result = manager.register_font("not_a_font.ttf", vec![0u8; 64]);
        assert!(result.is_err());
    }
}
