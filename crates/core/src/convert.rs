//! Main conversion API.
//!
//! One request takes a rendered [`Document`], the page's [`PageMetadata`] and
//! the user's [`ConversionSettings`], and returns a [`ConversionResult`]: the
//! Markdown text plus the ordered list of images the host must save under
//! `images/`.
//!
//! # Example
//!
//! ```rust
//! use clipmark_core::{ConversionSettings, convert_html};
//!
//! let html = r#"<html><head><title>Cats</title></head>
//!     <body><p><img src="https://x/a.png?v=2" alt="Cat"></p></body></html>"#;
//! let settings = ConversionSettings::builder().add_frontmatter(false).build();
//!
//! let result = convert_html(html, Some("https://x/cats"), &settings).unwrap();
//! assert!(result.markdown.starts_with("# Cats\n\n"));
//! assert!(result.markdown.contains("![Cat](images/a.png)"));
//! assert_eq!(result.images[0].filename, "a.png");
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::formatters::frontmatter::generate_frontmatter;
use crate::formatters::markdown::{MarkdownRenderer, append_unused_images, build_placeholders};
use crate::images::{ImageEntry, collect_images};
use crate::metadata::PageMetadata;
use crate::normalize::normalize_spaces;
use crate::{Document, Result};

/// Tag applied when the user has not configured any.
pub const DEFAULT_TAG: &str = "web-clipping";

/// Per-request conversion options.
///
/// # Example
///
/// ```rust
/// use clipmark_core::ConversionSettings;
///
/// let settings = ConversionSettings::builder().tag("rust").tag("reading").build();
/// assert!(settings.add_frontmatter);
/// assert_eq!(settings.tags, vec!["rust", "reading"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// Emit a frontmatter block instead of a title heading (default: true).
    #[serde(default = "default_add_frontmatter", alias = "addFrontmatter")]
    pub add_frontmatter: bool,

    /// Tags listed in the frontmatter (default: `["web-clipping"]`).
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

fn default_add_frontmatter() -> bool {
    true
}

fn default_tags() -> Vec<String> {
    vec![DEFAULT_TAG.to_string()]
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self { add_frontmatter: default_add_frontmatter(), tags: default_tags() }
    }
}

impl ConversionSettings {
    /// Creates a new builder for ConversionSettings.
    pub fn builder() -> ConversionSettingsBuilder {
        ConversionSettingsBuilder::new()
    }
}

/// Builder for ConversionSettings.
///
/// Tags added through the builder replace the default tag list.
pub struct ConversionSettingsBuilder {
    settings: ConversionSettings,
    custom_tags: bool,
}

impl ConversionSettingsBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { settings: ConversionSettings::default(), custom_tags: false }
    }

    /// Sets whether to emit frontmatter.
    pub fn add_frontmatter(mut self, value: bool) -> Self {
        self.settings.add_frontmatter = value;
        self
    }

    /// Adds one tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        if !self.custom_tags {
            self.settings.tags.clear();
            self.custom_tags = true;
        }
        self.settings.tags.push(tag.into());
        self
    }

    /// Replaces the tag list.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.tags = tags.into_iter().map(Into::into).collect();
        self.custom_tags = true;
        self
    }

    /// Builds the settings.
    pub fn build(self) -> ConversionSettings {
        self.settings
    }
}

impl Default for ConversionSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete response to one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub markdown: String,
    /// Images to save under `images/<filename>`, in collection order.
    pub images: Vec<ImageEntry>,
}

impl ConversionResult {
    /// Converts the result to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Converts a rendered document to Markdown.
///
/// Never fails: images that cannot be resolved are logged and left out, and
/// images the walk could not place are listed under `## Additional Images`.
pub fn convert(doc: &Document, page: &PageMetadata, settings: &ConversionSettings) -> ConversionResult {
    let images = collect_images(doc);
    let placeholders = build_placeholders(&images);

    let mut markdown = if settings.add_frontmatter {
        generate_frontmatter(page, settings)
    } else {
        format!("# {}\n\n", page.title)
    };

    if let Some(url) = &page.url {
        markdown.push_str(&format!("Source: [{}]({})\n\n", url, url));
    }

    markdown.push_str(&MarkdownRenderer::new(doc, &placeholders).render(doc.body()));
    append_unused_images(&mut markdown, &images);

    debug!(images = images.len(), bytes = markdown.len(), "converted document");

    ConversionResult { markdown: normalize_spaces(&markdown), images: images.iter().map(ImageEntry::from).collect() }
}

/// Parses `html` (served at `url`, if known) and converts it, dated today.
///
/// # Errors
///
/// Returns [`crate::ClipmarkError::InvalidUrl`] if `url` is not an absolute URL.
pub fn convert_html(html: &str, url: Option<&str>, settings: &ConversionSettings) -> Result<ConversionResult> {
    let doc = match url {
        Some(url) => Document::parse_with_url(html, url)?,
        None => Document::parse(html)?,
    };
    let page = doc.extract_page_metadata();
    Ok(convert(&doc, &page, settings))
}
