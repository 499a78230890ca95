//! Image reference resolution.
//!
//! Posts store their featured image either as an absolute URL or as a path
//! relative to the API server (sometimes written with Windows separators by
//! the uploader). [`ImageResolver`] turns both into something fetchable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::config::DEVELOPMENT_API_URL;

/// SVG shown when an image cannot be loaded.
const PLACEHOLDER_SVG: &str = r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="#f3f4f6"/><text x="50%" y="50%" text-anchor="middle" dy="0.3em" font-family="Arial, sans-serif" font-size="18" fill="#9ca3af">Image not found</text></svg>"##;

/// Resolves stored image references against the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResolver {
    base_url: String,
}

impl ImageResolver {
    /// Resolve relative references against `base_url`; without one, the
    /// development server is assumed.
    pub fn new(base_url: Option<&str>) -> Self {
        let base = base_url
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEVELOPMENT_API_URL);
        Self {
            base_url: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn a stored reference into a URL. Empty references resolve to `None`.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(reference.to_string());
        }

        let normalized = reference.replace('\\', "/");
        let path = normalized.strip_prefix('/').unwrap_or(&normalized);

        Some(format!("{}/{}", self.base_url, path))
    }

    /// Resolve an optional reference, as stored on [`crate::api::Post`].
    pub fn resolve_opt(&self, reference: Option<&str>) -> Option<String> {
        reference.and_then(|r| self.resolve(r))
    }
}

/// Inline placeholder image as a `data:` URI.
pub fn placeholder_data_uri() -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(PLACEHOLDER_SVG))
}

/// The URL to display: `fallback` if given, else the built-in placeholder.
pub fn fallback_image(failed_url: &str, fallback: Option<&str>) -> String {
    warn!(url = %failed_url, "Image failed to load");
    match fallback {
        Some(src) if !src.is_empty() => src.to_string(),
        _ => placeholder_data_uri(),
    }
}

/// Check whether an image URL answers with a success status.
///
/// Image hosts are not the blog API, so this uses a bare request with no
/// auth or session headers.
pub async fn is_image_accessible(http: &reqwest::Client, url: &str) -> bool {
    match http.get(url).send().await {
        Ok(response) => {
            let ok = response.status().is_success();
            debug!(url = %url, status = response.status().as_u16(), "Checked image");
            ok
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Image check failed");
            false
        }
    }
}
