// Stock photo resolution with a provider fallback chain.
//
// Providers are tried in a fixed order (Unsplash, Pexels, Pixabay);
// only providers with configured credentials enter the chain. Every
// miss or failure falls through to the next provider, and when the
// whole chain is exhausted a deterministic-format synthetic URL is
// served so resolution never fails.

pub mod cache;
pub mod providers;

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::core::config::ProviderConfig;
use crate::core::types::{StockPhotoQuery, StockPhotoResult};
use crate::utils::Metrics;

use cache::{CacheStats, PhotoCache};
use providers::Provider;

/// Curated categories used when the caller does not request one.
const DEFAULT_CATEGORIES: &[&str] = &[
    "nature",
    "food",
    "travel",
    "fashion",
    "home decor",
    "fitness",
    "business",
    "technology",
];

pub struct StockPhotoResolver {
    providers: Vec<Provider>,
    cache: PhotoCache,
    client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl StockPhotoResolver {
    pub fn new(config: &ProviderConfig, photo_ttl: Duration) -> anyhow::Result<Self> {
        let mut providers = Vec::new();
        if let Some(key) = &config.unsplash_access_key {
            providers.push(Provider::Unsplash {
                access_key: key.clone(),
            });
        }
        if let Some(key) = &config.pexels_api_key {
            providers.push(Provider::Pexels {
                api_key: key.clone(),
            });
        }
        if let Some(key) = &config.pixabay_api_key {
            providers.push(Provider::Pixabay {
                api_key: key.clone(),
            });
        }
        info!(
            providers = providers.len(),
            ttl_secs = photo_ttl.as_secs(),
            "stock photo resolver ready"
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            providers,
            cache: PhotoCache::new(photo_ttl),
            client,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Walk the provider chain for a photo URL. Total: always returns a
    /// result, falling back to a synthetic placeholder URL when every
    /// provider is unavailable or failing.
    #[instrument(skip(self), fields(w = query.width, h = query.height))]
    pub async fn resolve(&self, query: &StockPhotoQuery) -> StockPhotoResult {
        let category = query
            .category
            .clone()
            .unwrap_or_else(|| random_category().to_string());

        for provider in &self.providers {
            let key = PhotoCache::key(provider.name(), &category, query.width, query.height);
            if let Some(entry) = self.cache.get(&key) {
                debug!(provider = entry.provider, "photo cache hit");
                if let Some(m) = &self.metrics {
                    m.record_cache_hit();
                }
                return StockPhotoResult {
                    url: entry.url,
                    provider: entry.provider.to_string(),
                    from_cache: true,
                };
            }
            if let Some(m) = &self.metrics {
                m.record_cache_miss();
            }

            let started = Instant::now();
            match provider
                .fetch(&self.client, &category, query.width, query.height)
                .await
            {
                Ok(url) => {
                    if let Some(m) = &self.metrics {
                        m.record_provider_call(true, started.elapsed());
                    }
                    self.cache.insert(key, url.clone(), provider.name());
                    return StockPhotoResult {
                        url,
                        provider: provider.name().to_string(),
                        from_cache: false,
                    };
                }
                Err(e) => {
                    if let Some(m) = &self.metrics {
                        m.record_provider_call(false, started.elapsed());
                    }
                    warn!(provider = provider.name(), "provider failed: {e}");
                }
            }
        }

        if let Some(m) = &self.metrics {
            m.record_fallback_url();
        }
        debug!(category, "serving synthetic fallback photo url");
        StockPhotoResult {
            url: fallback_url(query.width, query.height),
            provider: "fallback".to_string(),
            from_cache: false,
        }
    }

    /// Convenience wrapper for themed lookups.
    pub async fn resolve_themed(&self, theme: &str, width: u32, height: u32) -> StockPhotoResult {
        self.resolve(&StockPhotoQuery {
            width,
            height,
            category: Some(theme.to_string()),
        })
        .await
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Issue one small fetch per configured provider and report which
    /// of them currently answer. Results are not cached.
    pub async fn probe_providers(&self) -> Vec<(&'static str, bool)> {
        let mut results = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let healthy = provider.fetch(&self.client, "nature", 100, 100).await.is_ok();
            if !healthy {
                warn!(provider = provider.name(), "provider probe failed");
            }
            results.push((provider.name(), healthy));
        }
        results
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn random_category() -> &'static str {
    let idx = rand::thread_rng().gen_range(0..DEFAULT_CATEGORIES.len());
    DEFAULT_CATEGORIES[idx]
}

/// Synthetic placeholder URL with the requested dimensions baked in.
pub fn fallback_url(width: u32, height: u32) -> String {
    let seed: u32 = rand::thread_rng().gen_range(1..=1000);
    format!("https://picsum.photos/{width}/{height}?random={seed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_credentials() -> ProviderConfig {
        ProviderConfig {
            unsplash_access_key: None,
            pexels_api_key: None,
            pixabay_api_key: None,
            request_timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn empty_chain_serves_synthetic_url() {
        let resolver =
            StockPhotoResolver::new(&no_credentials(), Duration::from_secs(3600)).unwrap();
        assert!(resolver.provider_names().is_empty());

        let result = resolver
            .resolve(&StockPhotoQuery {
                width: 800,
                height: 1200,
                category: Some("nature".into()),
            })
            .await;
        assert_eq!(result.provider, "fallback");
        assert!(!result.from_cache);
        assert!(result.url.starts_with("https://picsum.photos/800/1200?random="));
    }

    #[tokio::test]
    async fn chain_order_follows_configuration() {
        let cfg = ProviderConfig {
            unsplash_access_key: Some("u".into()),
            pexels_api_key: Some("p".into()),
            pixabay_api_key: Some("x".into()),
            request_timeout_secs: 10,
        };
        let resolver = StockPhotoResolver::new(&cfg, Duration::from_secs(3600)).unwrap();
        assert_eq!(resolver.provider_names(), vec!["unsplash", "pexels", "pixabay"]);
    }

    #[tokio::test]
    async fn probe_with_no_providers_is_empty() {
        let resolver =
            StockPhotoResolver::new(&no_credentials(), Duration::from_secs(3600)).unwrap();
        assert!(resolver.probe_providers().await.is_empty());
    }

    #[test]
    fn fallback_url_embeds_dimensions() {
        let url = fallback_url(640, 480);
        assert!(url.starts_with("https://picsum.photos/640/480?random="));
    }
}
