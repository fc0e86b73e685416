// Individual stock photo provider clients.
//
// Each provider takes a category plus target dimensions and returns a
// direct image URL. Response shapes are narrowed to exactly the fields
// used.

use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::core::errors::{ProviderError, ProviderResult};

#[derive(Debug, Clone)]
pub enum Provider {
    Unsplash { access_key: String },
    Pexels { api_key: String },
    Pixabay { api_key: String },
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Unsplash { .. } => "unsplash",
            Provider::Pexels { .. } => "pexels",
            Provider::Pixabay { .. } => "pixabay",
        }
    }

    /// Fetch one photo URL for the category at roughly the target size.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        category: &str,
        width: u32,
        height: u32,
    ) -> ProviderResult<String> {
        match self {
            Provider::Unsplash { access_key } => {
                fetch_unsplash(client, access_key, category, width, height).await
            }
            Provider::Pexels { api_key } => fetch_pexels(client, api_key, category).await,
            Provider::Pixabay { api_key } => {
                fetch_pixabay(client, api_key, category, width, height).await
            }
        }
    }
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    custom: Option<String>,
    regular: Option<String>,
}

async fn fetch_unsplash(
    client: &reqwest::Client,
    access_key: &str,
    category: &str,
    width: u32,
    height: u32,
) -> ProviderResult<String> {
    let response = client
        .get("https://api.unsplash.com/photos/random")
        .header("Authorization", format!("Client-ID {access_key}"))
        .query(&[
            ("query", category),
            ("orientation", "portrait"),
            ("w", &width.to_string()),
            ("h", &height.to_string()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::BadStatus {
            provider: "unsplash",
            status: response.status().as_u16(),
        });
    }

    let photo: UnsplashPhoto = response.json().await?;
    let base = photo
        .urls
        .custom
        .or(photo.urls.regular)
        .ok_or(ProviderError::EmptyResponse("unsplash"))?;
    debug!(category, "unsplash photo resolved");
    Ok(format!("{base}&w={width}&h={height}&fit=crop"))
}

#[derive(Deserialize)]
struct PexelsResponse {
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large: Option<String>,
    original: Option<String>,
}

async fn fetch_pexels(
    client: &reqwest::Client,
    api_key: &str,
    category: &str,
) -> ProviderResult<String> {
    let page = rand::thread_rng().gen_range(1..=5).to_string();
    let response = client
        .get("https://api.pexels.com/v1/search")
        .header("Authorization", api_key)
        .query(&[
            ("query", category),
            ("orientation", "portrait"),
            ("per_page", "20"),
            ("page", &page),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::BadStatus {
            provider: "pexels",
            status: response.status().as_u16(),
        });
    }

    let body: PexelsResponse = response.json().await?;
    if body.photos.is_empty() {
        return Err(ProviderError::EmptyResponse("pexels"));
    }
    let idx = rand::thread_rng().gen_range(0..body.photos.len());
    let src = &body.photos[idx].src;
    let url = src
        .large
        .clone()
        .or_else(|| src.original.clone())
        .ok_or(ProviderError::EmptyResponse("pexels"))?;
    debug!(category, "pexels photo resolved");
    Ok(url)
}

#[derive(Deserialize)]
struct PixabayResponse {
    hits: Vec<PixabayHit>,
}

#[derive(Deserialize)]
struct PixabayHit {
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
}

async fn fetch_pixabay(
    client: &reqwest::Client,
    api_key: &str,
    category: &str,
    width: u32,
    height: u32,
) -> ProviderResult<String> {
    let page = rand::thread_rng().gen_range(1..=3).to_string();
    let response = client
        .get("https://pixabay.com/api/")
        .query(&[
            ("key", api_key),
            ("q", category),
            ("image_type", "photo"),
            ("min_width", &width.min(640).to_string()),
            ("min_height", &height.min(480).to_string()),
            ("per_page", "20"),
            ("page", &page),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ProviderError::BadStatus {
            provider: "pixabay",
            status: response.status().as_u16(),
        });
    }

    let body: PixabayResponse = response.json().await?;
    if body.hits.is_empty() {
        return Err(ProviderError::EmptyResponse("pixabay"));
    }
    let idx = rand::thread_rng().gen_range(0..body.hits.len());
    let hit = &body.hits[idx];
    let url = hit
        .large_image_url
        .clone()
        .or_else(|| hit.webformat_url.clone())
        .ok_or(ProviderError::EmptyResponse("pixabay"))?;
    debug!(category, "pixabay photo resolved");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names() {
        let p = Provider::Unsplash {
            access_key: "k".into(),
        };
        assert_eq!(p.name(), "unsplash");
        let p = Provider::Pexels { api_key: "k".into() };
        assert_eq!(p.name(), "pexels");
        let p = Provider::Pixabay { api_key: "k".into() };
        assert_eq!(p.name(), "pixabay");
    }

    #[test]
    fn pixabay_response_parses_renamed_fields() {
        let body = r#"{"hits":[{"webformatURL":"https://cdn/a.jpg","largeImageURL":null}]}"#;
        let parsed: PixabayResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.hits[0].webformat_url.as_deref(),
            Some("https://cdn/a.jpg")
        );
    }

    #[test]
    fn unsplash_response_prefers_custom_url() {
        let body = r#"{"urls":{"custom":"https://u/custom","regular":"https://u/regular"}}"#;
        let parsed: UnsplashPhoto = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.urls.custom.or(parsed.urls.regular).as_deref(),
            Some("https://u/custom")
        );
    }
}
