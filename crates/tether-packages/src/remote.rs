//! Remote package registry client
//!
//! Talks to a `plugins/info/1.2` compatible metadata endpoint and downloads
//! release archives into temporary files.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tether_core::types::RegistryConfig;
use tracing::{debug, info};

use crate::host::RemoteMetadata;

/// Raw metadata response; the endpoint reports lookups that miss via `error`
#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    download_link: Option<String>,
}

pub struct RegistryClient {
    client: Client,
    api_url: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(&config.user_agent)
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .context("Failed to create HTTP client")?,
            api_url: config.api_url.clone(),
        })
    }

    /// Metadata request URL for `slug`
    pub fn metadata_url(&self, slug: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid registry URL: {}", self.api_url))?;
        url.query_pairs_mut()
            .append_pair("action", "plugin_information")
            .append_pair("request[slug]", slug)
            .append_pair("request[fields][sections]", "0");
        Ok(url)
    }

    pub fn fetch_metadata(&self, slug: &str) -> Result<RemoteMetadata> {
        let url = self.metadata_url(slug)?;
        debug!("Fetching registry metadata: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to reach registry for {}", slug))?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read registry response")?;

        // A miss is reported as 404 with an `error` body; prefer that message
        match parse_metadata(slug, &body) {
            Ok(metadata) if status.is_success() => Ok(metadata),
            Ok(_) => Err(anyhow!("Registry returned HTTP {} for {}", status, slug)),
            Err(e) if status.is_success() => Err(e),
            Err(e) => Err(e.context(format!("HTTP {}", status))),
        }
    }

    /// Download `url` into a temporary `.zip` file
    pub fn download(&self, url: &str) -> Result<NamedTempFile> {
        info!("Downloading {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to download {}: HTTP {}", url, response.status()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("tether-")
            .suffix(".zip")
            .tempfile()
            .context("Failed to create temporary download file")?;
        let bytes = response
            .copy_to(file.as_file_mut())
            .context("Failed to write download")?;
        file.flush().context("Failed to flush download")?;
        debug!("Downloaded {} bytes to {}", bytes, file.path().display());
        Ok(file)
    }
}

/// Parse a metadata response body
pub fn parse_metadata(slug: &str, body: &str) -> Result<RemoteMetadata> {
    let info: InfoResponse = serde_json::from_str(body)
        .with_context(|| format!("Unexpected registry response for {}", slug))?;

    if let Some(error) = info.error {
        return Err(anyhow!("Registry lookup for {} failed: {}", slug, error));
    }

    let download_link = info
        .download_link
        .filter(|link| !link.is_empty())
        .ok_or_else(|| anyhow!("Registry response for {} has no download link", slug))?;

    Ok(RemoteMetadata {
        slug: info.slug.unwrap_or_else(|| slug.to_string()),
        name: info.name.unwrap_or_default(),
        version: info.version.unwrap_or_default(),
        download_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_url_encodes_request_fields() {
        let client = RegistryClient::new(&RegistryConfig::default()).unwrap();
        let url = client.metadata_url("contact-form-7").unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("action".into(), "plugin_information".into())));
        assert!(query.contains(&("request[slug]".into(), "contact-form-7".into())));
    }

    #[test]
    fn test_parse_metadata_success() {
        let body = r#"{"name":"Contact Form 7","slug":"contact-form-7","version":"6.0.1",
            "download_link":"https://downloads.example.org/contact-form-7.6.0.1.zip"}"#;
        let meta = parse_metadata("contact-form-7", body).unwrap();
        assert_eq!(meta.version, "6.0.1");
        assert!(meta.download_link.ends_with(".zip"));
    }

    #[test]
    fn test_parse_metadata_error_body() {
        let err = parse_metadata("nope", r#"{"error":"Plugin not found."}"#).unwrap_err();
        assert!(err.to_string().contains("Plugin not found."));
    }

    #[test]
    fn test_parse_metadata_requires_download_link() {
        assert!(parse_metadata("x", r#"{"slug":"x","version":"1.0"}"#).is_err());
        assert!(parse_metadata("x", "<html>").is_err());
    }
}
