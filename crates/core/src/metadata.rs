use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::Document;

/// Title used when a page has no usable `<title>`.
pub const UNTITLED: &str = "Untitled";

/// Page-level facts the preamble needs, passed explicitly into [`crate::convert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub url: Option<String>,
    /// `<meta name="description">` content.
    pub description: Option<String>,
    /// `<meta property="og:description">` content.
    pub og_description: Option<String>,
    /// Date written into the frontmatter.
    pub saved_on: Date,
}

impl PageMetadata {
    /// Metadata for a page with only a title, saved today.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            description: None,
            og_description: None,
            saved_on: OffsetDateTime::now_utc().date(),
        }
    }

    /// Description with fallback:
    /// 1. Meta `description`
    /// 2. Open Graph `og:description`
    /// 3. `Page saved from <url>`
    pub fn effective_description(&self) -> String {
        [&self.description, &self.og_description]
            .into_iter()
            .flatten()
            .map(|d| d.trim())
            .find(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Page saved from {}", self.url.as_deref().unwrap_or("an unknown location")))
    }
}

impl Document {
    /// Extract everything the preamble needs, dated today.
    pub fn extract_page_metadata(&self) -> PageMetadata {
        let title = self.title().filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.to_string());

        PageMetadata {
            title,
            url: self.url().map(|u| u.to_string()),
            description: self.meta_content("description"),
            og_description: self.meta_content("og:description"),
            saved_on: OffsetDateTime::now_utc().date(),
        }
    }
}
