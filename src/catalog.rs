use crate::config::Config;
use crate::error::{Result, RungoError};
use crate::models::VersionId;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::sync::LazyLock;
use tracing::debug;

/// Releases older than go1.16 ship a layout the installer does not handle
const MIN_MINOR_VERSION: u64 = 16;

const TOGGLE_CLASS: &str = "toggleButton";

static RELEASE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^go(\d+)\.(\d+)(?:\.(\d+))?$").expect("valid release regex"));

static CLASS_OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?\bclass\s*=\s*["']([^"']*)["'][^>]*>"#)
        .expect("valid tag regex")
});

static SPAN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<span\b[^>]*>(.*?)</span>").expect("valid span regex"));

/// Scrapes the upstream download page for installable Go releases
pub struct ReleaseCatalog {
    client: Client,
    listing_url: String,
    latest_url: String,
}

impl ReleaseCatalog {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            listing_url: config.listing_url(),
            latest_url: config.latest_version_url.clone(),
        }
    }

    /// All installable versions, newest first. Not cached: every call is a
    /// round-trip to the listing page.
    pub async fn list_available_versions(&self) -> Result<Vec<VersionId>> {
        let html = self.get_text(&self.listing_url).await?;
        let versions = parse_release_listing(&html)?;
        debug!("release listing yielded {} versions", versions.len());
        Ok(versions)
    }

    /// Latest stable release as reported by the plain-text version endpoint
    pub async fn latest_version(&self) -> Result<VersionId> {
        let body = self.get_text(&self.latest_url).await?;
        let first_line = body.lines().next().unwrap_or("").trim();

        if first_line.is_empty() {
            return Err(RungoError::ParseFailed(
                "latest version endpoint returned an empty body".to_string(),
            ));
        }

        first_line.parse()
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RungoError::request(url, e))?;

        if response.status() != StatusCode::OK {
            return Err(RungoError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        response.text().await.map_err(|e| RungoError::request(url, e))
    }
}

/// Extract, filter, deduplicate and sort the version labels on the listing
/// page. Fails only when the page carries no toggle elements at all.
pub fn parse_release_listing(html: &str) -> Result<Vec<VersionId>> {
    let labels = toggle_labels(html);
    if labels.is_empty() {
        return Err(RungoError::ParseFailed(format!(
            "no elements with class `{}` found",
            TOGGLE_CLASS
        )));
    }

    let mut versions: Vec<VersionId> = labels
        .iter()
        .filter(|label| {
            RELEASE_LABEL
                .captures(label)
                .and_then(|caps| caps.get(2))
                .and_then(|minor| minor.as_str().parse::<u64>().ok())
                .is_some_and(|minor| minor >= MIN_MINOR_VERSION)
        })
        .filter_map(|label| label.parse::<VersionId>().ok())
        .collect();

    versions.sort();
    versions.dedup();
    versions.reverse();

    Ok(versions)
}

/// Text of the `<span>` inside every element whose class list contains
/// `toggleButton`.
fn toggle_labels(html: &str) -> Vec<String> {
    let mut labels = Vec::new();
    for caps in CLASS_OPEN_TAG.captures_iter(html) {
        let is_toggle = caps[2].split_whitespace().any(|class| class == TOGGLE_CLASS);
        if !is_toggle {
            continue;
        }

        let Some(tag) = caps.get(0) else { continue };
        let rest = &html[tag.end()..];
        let closing = format!("</{}", &caps[1]);
        let body = rest.find(&closing).map(|end| &rest[..end]).unwrap_or(rest);

        let text: String = SPAN_TEXT
            .captures_iter(body)
            .map(|span_caps| span_caps[1].trim().to_string())
            .collect();
        labels.push(text);
    }

    labels
}
