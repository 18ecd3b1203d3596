//! Writes a converted page to disk: `<dir>/<title>.md` plus `<dir>/images/`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clipmark_core::{ConversionResult, IMAGES_DIR, ImageEntry};
use reqwest::Client;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{fetch_bytes, is_remote};

/// Longest Markdown file stem written by [`save_clipping`].
pub const MAX_TITLE_LEN: usize = 50;

/// Images fetched or copied at the same time.
const MAX_CONCURRENT_IMAGES: usize = 4;

/// Replaces every character outside `[a-z0-9]` with `_`, lowercases, and keeps
/// at most [`MAX_TITLE_LEN`] characters.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .take(MAX_TITLE_LEN)
        .collect()
}

/// Where image bytes come from.
#[derive(Clone)]
pub struct ImageSource {
    client: Client,
    /// Directory relative sources are resolved against, when the page came from a file.
    local_root: Option<PathBuf>,
}

impl ImageSource {
    pub fn new(client: Client, local_root: Option<PathBuf>) -> Self {
        let local_root = local_root.map(|root| if root.as_os_str().is_empty() { PathBuf::from(".") } else { root });
        Self { client, local_root }
    }

    async fn read(&self, source_url: &str) -> anyhow::Result<Vec<u8>> {
        if is_remote(source_url) {
            return fetch_bytes(&self.client, source_url).await;
        }

        let path = self.local_path(source_url).await?;
        fs::read(&path).await.with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Resolves a local source to a file inside the page directory.
    ///
    /// Absolute paths, `..` components and symlinks that leave the directory
    /// are refused.
    async fn local_path(&self, source_url: &str) -> anyhow::Result<PathBuf> {
        let Some(root) = &self.local_root else {
            bail!("No base location for local image {}", source_url);
        };

        let candidate = if source_url.starts_with("file:") {
            let url = Url::parse(source_url)?;
            url.to_file_path().map_err(|_| anyhow!("Not a local path: {}", source_url))?
        } else {
            let relative = Path::new(source_url.split(['?', '#']).next().unwrap_or_default());
            if relative.as_os_str().is_empty() {
                bail!("Empty image path in {}", source_url);
            }
            if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
                bail!("Refusing image outside the page directory: {}", source_url);
            }
            root.join(relative)
        };

        let root = fs::canonicalize(root).await.with_context(|| format!("Failed to resolve {}", root.display()))?;
        let resolved = fs::canonicalize(&candidate)
            .await
            .with_context(|| format!("Failed to read {}", candidate.display()))?;
        if !resolved.starts_with(&root) {
            bail!("Refusing image outside the page directory: {}", source_url);
        }
        Ok(resolved)
    }
}

/// A failed image, reported without aborting the save.
#[derive(Debug)]
pub struct ImageFailure {
    pub filename: String,
    pub error: anyhow::Error,
}

/// What [`save_clipping`] wrote.
#[derive(Debug)]
pub struct SavedClipping {
    pub markdown_path: PathBuf,
    pub images_saved: usize,
    /// Failures in collection order.
    pub failures: Vec<ImageFailure>,
}

/// Writes the Markdown file and, when `images` is given, every listed image.
pub async fn save_clipping(
    dir: &Path, title: &str, result: &ConversionResult, images: Option<&ImageSource>,
) -> anyhow::Result<SavedClipping> {
    fs::create_dir_all(dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;

    let markdown_path = dir.join(format!("{}.md", sanitize_title(title)));
    fs::write(&markdown_path, &result.markdown)
        .await
        .with_context(|| format!("Failed to write {}", markdown_path.display()))?;

    let mut saved = SavedClipping { markdown_path, images_saved: 0, failures: Vec::new() };
    let Some(source) = images else {
        return Ok(saved);
    };
    if result.images.is_empty() {
        return Ok(saved);
    }

    let images_dir = dir.join(IMAGES_DIR);
    fs::create_dir_all(&images_dir)
        .await
        .with_context(|| format!("Failed to create {}", images_dir.display()))?;

    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_IMAGES));
    let mut tasks = JoinSet::new();
    for (index, entry) in result.images.iter().cloned().enumerate() {
        let source = source.clone();
        let images_dir = images_dir.clone();
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => save_image(&source, &images_dir, &entry).await,
                Err(error) => Err(error.into()),
            };
            (index, entry, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(result.images.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.context("Image task failed")?);
    }
    outcomes.sort_by_key(|(index, ..)| *index);

    for (_, entry, outcome) in outcomes {
        match outcome {
            Ok(()) => saved.images_saved += 1,
            Err(error) => {
                warn!(source = %entry.source_url, %error, "image not saved");
                saved.failures.push(ImageFailure { filename: entry.filename, error });
            }
        }
    }

    debug!(saved = saved.images_saved, failed = saved.failures.len(), "images written");
    Ok(saved)
}

async fn save_image(source: &ImageSource, images_dir: &Path, entry: &ImageEntry) -> anyhow::Result<()> {
    let bytes = source.read(&entry.source_url).await?;
    let target = images_dir.join(&entry.filename);
    fs::write(&target, bytes).await.with_context(|| format!("Failed to write {}", target.display()))
}
