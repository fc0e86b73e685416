use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the pipeline.
///
/// Tracks analysis timings, provider usage, and photo cache performance.
/// Thread-safe and cheap to clone; shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Analysis
    analyses_total: AtomicUsize,
    analyses_degraded: AtomicUsize,
    analysis_duration_ms: RwLock<Vec<u64>>,

    // Provider chain
    provider_calls_success: AtomicUsize,
    provider_calls_failed: AtomicUsize,
    fallback_urls_served: AtomicUsize,
    provider_latency_ms: RwLock<Vec<u64>>,

    // Photo URL cache
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,

    // Rendering
    previews_rendered: AtomicUsize,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                analyses_total: AtomicUsize::new(0),
                analyses_degraded: AtomicUsize::new(0),
                analysis_duration_ms: RwLock::new(Vec::new()),
                provider_calls_success: AtomicUsize::new(0),
                provider_calls_failed: AtomicUsize::new(0),
                fallback_urls_served: AtomicUsize::new(0),
                provider_latency_ms: RwLock::new(Vec::new()),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                previews_rendered: AtomicUsize::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_analysis(&self, duration: Duration, degraded: bool) {
        self.inner.analyses_total.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.inner.analyses_degraded.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .analysis_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_provider_call(&self, success: bool, duration: Duration) {
        if success {
            self.inner
                .provider_calls_success
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner
                .provider_calls_failed
                .fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .provider_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_fallback_url(&self) {
        self.inner.fallback_urls_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preview_rendered(&self) {
        self.inner.previews_rendered.fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let analysis_durations = self.inner.analysis_duration_ms.read();
        let analysis_avg = avg(&analysis_durations);
        let analysis_p95 = percentile(&analysis_durations, 0.95);
        drop(analysis_durations);

        let provider_latency = self.inner.provider_latency_ms.read();
        let provider_avg = avg(&provider_latency);
        drop(provider_latency);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            analyses_total: self.inner.analyses_total.load(Ordering::Relaxed),
            analyses_degraded: self.inner.analyses_degraded.load(Ordering::Relaxed),
            analysis_avg_ms: analysis_avg,
            analysis_p95_ms: analysis_p95,
            provider_calls_success: self.inner.provider_calls_success.load(Ordering::Relaxed),
            provider_calls_failed: self.inner.provider_calls_failed.load(Ordering::Relaxed),
            provider_latency_avg_ms: provider_avg,
            fallback_urls_served: self.inner.fallback_urls_served.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            previews_rendered: self.inner.previews_rendered.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub analyses_total: usize,
    pub analyses_degraded: usize,
    pub analysis_avg_ms: u64,
    pub analysis_p95_ms: u64,
    pub provider_calls_success: usize,
    pub provider_calls_failed: usize,
    pub provider_latency_avg_ms: u64,
    pub fallback_urls_served: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub previews_rendered: usize,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
