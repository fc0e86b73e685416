// Command-line front end: analyze an image, synthesize a template,
// emit template.svg and preview.jpg.
//
// Usage: make_preview <image-path> [style]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use pinforge::core::config::Config;
use pinforge::pipeline::{ImageAnalyzer, PreviewRenderer, TemplateSynthesizer};
use pinforge::services::font_manager::FontManager;
use pinforge::services::stock_photo::StockPhotoResolver;
use pinforge::template::svg;
use pinforge::utils::image_ops::encode_jpeg_async;
use pinforge::utils::metrics::Metrics;

const ANALYSIS_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new().context("failed to load configuration")?;

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::new(format!("pinforge={}", config.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let image_path = match args.next() {
        Some(p) => PathBuf::from(p),
        None => bail!("usage: make_preview <image-path> [style]"),
    };
    let style_name = args.next().unwrap_or_else(|| "modern".to_string());

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("failed to read {}", image_path.display()))?;

    let metrics = Metrics::new();
    let analyzer = ImageAnalyzer::new(&config).with_metrics(metrics.clone());
    let synthesizer = TemplateSynthesizer::new();

    if !synthesizer.style_names().contains(&style_name.as_str()) {
        bail!(
            "unknown style '{}', available: {}",
            style_name,
            synthesizer.style_names().join(", ")
        );
    }

    info!(path = %image_path.display(), style = %style_name, "analyzing");
    let analysis = analyzer.analyze_or_degrade(&bytes, ANALYSIS_DEADLINE).await?;
    for e in &analysis.errors {
        warn!(stage = ?e.stage, "sub-stage degraded: {}", e.message);
    }

    let template = synthesizer.synthesize(&analysis, &style_name)?;
    std::fs::write("template.svg", svg::to_svg(&template))
        .context("failed to write template.svg")?;
    info!(
        id = %template.id,
        elements = template.elements.len(),
        placeholders = template.placeholders.len(),
        "template written to template.svg"
    );

    let font_manager = match FontManager::new(config.fonts_dir()) {
        Ok(fm) => Some(fm),
        Err(e) => {
            warn!("font directory unavailable ({e}), using system fonts");
            None
        }
    };
    let renderer =
        PreviewRenderer::new(font_manager.as_ref()).with_metrics(metrics.clone());

    let resolver = StockPhotoResolver::new(
        &config.providers,
        Duration::from_secs(config.photo_ttl_secs()),
    )?
    .with_metrics(metrics.clone());
    info!(providers = ?resolver.provider_names(), "stock photo chain ready");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.providers.request_timeout_secs))
        .build()?;
    let bindings = std::collections::HashMap::new();
    let canvas = renderer
        .render_resolved(&template, &bindings, &resolver, &client)
        .await?;
    let jpeg = encode_jpeg_async(image::DynamicImage::ImageRgba8(canvas), config.jpeg_quality())
        .await
        .context("failed to encode preview")?;
    std::fs::write("preview.jpg", jpeg).context("failed to write preview.jpg")?;

    let snapshot = metrics.snapshot();
    println!(
        "template.svg + preview.jpg written ({}x{}, style {}, score {}, {} placeholders, {} fallback urls)",
        template.width,
        template.height,
        template.style_name,
        analysis.platform_score,
        template.placeholders.len(),
        snapshot.fallback_urls_served,
    );
    for rec in &analysis.recommendations {
        println!("  note: {rec}");
    }
    Ok(())
}
