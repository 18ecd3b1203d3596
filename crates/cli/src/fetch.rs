//! Page and image retrieval from URLs, files, and stdin.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use url::Url;

/// HTTP client configuration for fetching pages and images.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: "Mozilla/5.0 (compatible; Clipmark/1.0)".to_string() }
    }
}

/// Builds the HTTP client shared by every request of one run.
pub fn build_client(config: &FetchConfig) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Returns true if `input` looks like an HTTP(S) URL.
pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn parse_http_url(url: &str) -> anyhow::Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid URL: {} (scheme must be http or https)", url);
    }
    Ok(parsed)
}

/// Fetches an HTML page.
pub async fn fetch_url(client: &Client, url: &str) -> anyhow::Result<String> {
    let parsed = parse_http_url(url)?;
    let response = client
        .get(parsed)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await?
        .error_for_status()?;

    Ok(response.text().await?)
}

/// Fetches the raw bytes of an image.
pub async fn fetch_bytes(client: &Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let parsed = parse_http_url(url)?;
    let response = client.get(parsed).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Reads HTML content from a local file.
pub fn fetch_file(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> anyhow::Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
    Ok(buffer)
}
