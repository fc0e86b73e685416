use crate::core::errors::ConfigError;
use std::env;
use std::path::Path;
use tracing::Level;

/// Analysis tuning
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Minimum confidence for a text region to be kept at all
    pub text_confidence_threshold: f32,
    /// Minimum confidence before styling hints (font size) are attached
    pub style_confidence_threshold: f32,
    /// Maximum number of palette clusters
    pub max_colors: usize,
    /// Minimum region area as a fraction of the image area
    pub min_region_area_frac: f32,
    /// Edge length lightweight mode downsamples to
    pub lightweight_sample_size: u32,
}

/// Stock photo provider credentials and networking
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub unsplash_access_key: Option<String>,
    pub pexels_api_key: Option<String>,
    pub pixabay_api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    pub fn any_configured(&self) -> bool {
        self.unsplash_access_key.is_some()
            || self.pexels_api_key.is_some()
            || self.pixabay_api_key.is_some()
    }
}

/// Photo URL cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub photo_ttl_secs: u64,
}

/// Preview rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub fonts_dir: String,
    pub jpeg_quality: u8,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: Level,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub providers: ProviderConfig,
    pub cache: CacheConfig,
    pub render: RenderConfig,
    pub log: LogConfig,
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Ok(Self {
            analysis: AnalysisConfig {
                text_confidence_threshold: env::var("TEXT_CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.3),
                style_confidence_threshold: env::var("STYLE_CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.5),
                max_colors: env::var("MAX_COLORS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8),
                min_region_area_frac: env::var("MIN_REGION_AREA_FRAC")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.01),
                lightweight_sample_size: env::var("LIGHTWEIGHT_SAMPLE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            },
            providers: ProviderConfig {
                unsplash_access_key: non_empty("UNSPLASH_ACCESS_KEY"),
                pexels_api_key: non_empty("PEXELS_API_KEY"),
                pixabay_api_key: non_empty("PIXABAY_API_KEY"),
                request_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                photo_ttl_secs: env::var("PHOTO_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            },
            render: RenderConfig {
                fonts_dir: env::var("FONTS_DIR").unwrap_or_else(|_| "fonts".to_string()),
                jpeg_quality: env::var("JPEG_QUALITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(85),
            },
            log: LogConfig { log_level },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.analysis.text_confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.analysis.text_confidence_threshold,
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.style_confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.analysis.style_confidence_threshold,
            ));
        }

        if !(1..=16).contains(&self.analysis.max_colors) {
            return Err(ConfigError::InvalidPaletteSize(self.analysis.max_colors));
        }

        if self.cache.photo_ttl_secs == 0 {
            return Err(ConfigError::InvalidCacheTtl);
        }

        if !(1..=120).contains(&self.providers.request_timeout_secs) {
            return Err(ConfigError::InvalidProviderTimeout(
                self.providers.request_timeout_secs,
            ));
        }

        // Validate fonts directory parent exists (the dir itself gets created)
        let fonts_path = Path::new(&self.render.fonts_dir);
        if let Some(parent) = fonts_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidFontsPath(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.log.log_level
    }

    pub fn text_confidence_threshold(&self) -> f32 {
        self.analysis.text_confidence_threshold
    }

    pub fn style_confidence_threshold(&self) -> f32 {
        self.analysis.style_confidence_threshold
    }

    pub fn max_colors(&self) -> usize {
        self.analysis.max_colors
    }

    pub fn photo_ttl_secs(&self) -> u64 {
        self.cache.photo_ttl_secs
    }

    pub fn fonts_dir(&self) -> &str {
        &self.render.fonts_dir
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.render.jpeg_quality
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors
