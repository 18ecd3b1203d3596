//! Image collection.
//!
//! One pass over the rendered tree finds every image the Markdown should
//! reference: inline `<img>` elements first, then CSS background images, each
//! group in document order. Every distinct source URL becomes one
//! [`ImageDescriptor`] with a filename that is safe to use under `images/`.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::dom_tree::Element;
use crate::{Document, Result};

/// Folder, relative to the Markdown file, that holds saved images.
pub const IMAGES_DIR: &str = "images";

/// Images narrower and shorter than this many pixels are treated as trackers,
/// spacers or icons unless they carry alt text.
pub const MIN_IMAGE_DIMENSION: u32 = 20;

const DEFAULT_EXTENSION: &str = "jpg";
const DEFAULT_ALT: &str = "image";
const BACKGROUND_ALT: &str = "Background Image";

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*['"]?([^'"()]+)['"]?\s*\)"#).expect("valid CSS url() pattern"));

/// Where an image was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    /// An `<img>` element.
    Inline,
    /// A CSS `background-image`.
    Background,
}

/// One distinct image of the page, identified by its resolved source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub source_url: String,
    /// Safe file name under [`IMAGES_DIR`].
    pub filename: String,
    /// The `alt` attribute of the originating `<img>`, when present and non-empty.
    pub alt: Option<String>,
    pub origin: ImageOrigin,
    /// `img_<n>` or `bg_img_<n>`, where `n` is the element's position among
    /// its kind.
    pub id: String,
}

impl ImageDescriptor {
    /// Alt text used in the Markdown reference.
    pub fn alt_text(&self) -> &str {
        match self.origin {
            ImageOrigin::Background => BACKGROUND_ALT,
            ImageOrigin::Inline => self.alt.as_deref().unwrap_or(DEFAULT_ALT),
        }
    }

    /// Path of the saved image relative to the Markdown file.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", IMAGES_DIR, self.filename)
    }

    /// Markdown image syntax pointing at the saved copy.
    pub fn placeholder(&self) -> String {
        format!("![{}]({})", self.alt_text(), self.relative_path())
    }
}

/// The part of an [`ImageDescriptor`] the host needs to save the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub source_url: String,
    pub filename: String,
}

impl From<&ImageDescriptor> for ImageEntry {
    fn from(image: &ImageDescriptor) -> Self {
        Self { source_url: image.source_url.clone(), filename: image.filename.clone() }
    }
}

/// Collects the deduplicated, ordered image list of a document.
///
/// Inline images come first, then background images. A failure on one image
/// is logged and that image is skipped.
pub fn collect_images(doc: &Document) -> Vec<ImageDescriptor> {
    let mut collector = ImageCollector::new(doc);

    for (index, img) in doc.root().descendants_by_tag("img").into_iter().enumerate() {
        if let Err(e) = collector.add_inline(index, img) {
            warn!(id = %format!("img_{}", index), error = %e, "skipping image");
        }
    }

    let mut styled = Vec::new();
    doc.root().walk(&mut |el| {
        if el.layout.background_image.is_some() {
            styled.push(el);
        }
    });

    for (index, el) in styled.into_iter().enumerate() {
        if let Err(e) = collector.add_background(index, el) {
            warn!(id = %format!("bg_img_{}", index), error = %e, "skipping background image");
        }
    }

    debug!(count = collector.images.len(), "collected images");
    collector.images
}

struct ImageCollector<'a> {
    doc: &'a Document,
    images: Vec<ImageDescriptor>,
    seen_sources: HashSet<String>,
    used_filenames: HashSet<String>,
}

impl<'a> ImageCollector<'a> {
    fn new(doc: &'a Document) -> Self {
        Self { doc, images: Vec::new(), seen_sources: HashSet::new(), used_filenames: HashSet::new() }
    }

    fn add_inline(&mut self, index: usize, img: &Element) -> Result<()> {
        let Some(raw) = img.non_empty_attr("src") else {
            return Ok(());
        };
        if is_data_uri(raw) {
            return Ok(());
        }

        let source_url = self.doc.resolve_url(raw)?;
        if self.seen_sources.contains(&source_url) {
            return Ok(());
        }

        let alt = img.attr("alt").filter(|a| !a.is_empty()).map(str::to_string);
        if alt.is_none() && is_tiny(img) {
            trace!(source = %source_url, "skipping tiny image");
            return Ok(());
        }

        let filename = derive_filename(&source_url, "image", index);
        self.push(source_url, filename, alt, ImageOrigin::Inline, format!("img_{}", index));
        Ok(())
    }

    fn add_background(&mut self, index: usize, el: &Element) -> Result<()> {
        let Some(value) = el.layout.background_image.as_deref() else {
            return Ok(());
        };
        let Some(raw) = first_css_url(value) else {
            return Ok(());
        };
        if is_data_uri(raw) {
            return Ok(());
        }

        let source_url = self.doc.resolve_url(raw)?;
        if self.seen_sources.contains(&source_url) {
            return Ok(());
        }

        let filename = derive_filename(&source_url, "bg_image", index);
        self.push(source_url, filename, None, ImageOrigin::Background, format!("bg_img_{}", index));
        Ok(())
    }

    fn push(&mut self, source_url: String, filename: String, alt: Option<String>, origin: ImageOrigin, id: String) {
        let filename = self.claim_filename(filename);
        self.seen_sources.insert(source_url.clone());
        self.images.push(ImageDescriptor { source_url, filename, alt, origin, id });
    }

    /// Returns `filename`, or `stem_N.ext` with the smallest free `N >= 2`
    /// when another source already took it.
    fn claim_filename(&mut self, filename: String) -> String {
        if self.used_filenames.insert(filename.clone()) {
            return filename;
        }

        let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename.as_str(), DEFAULT_EXTENSION));
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}.{}", stem, n, ext);
            if self.used_filenames.insert(candidate.clone()) {
                debug!(original = %filename, renamed = %candidate, "filename collision");
                return candidate;
            }
            n += 1;
        }
    }
}

fn is_data_uri(src: &str) -> bool {
    src.trim_start().get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Both rendered dimensions are known and below [`MIN_IMAGE_DIMENSION`].
fn is_tiny(img: &Element) -> bool {
    matches!(
        (img.layout.width, img.layout.height),
        (Some(w), Some(h)) if w < MIN_IMAGE_DIMENSION && h < MIN_IMAGE_DIMENSION
    )
}

/// Extracts the first `url(...)` token of a CSS value; `none` has none.
pub fn first_css_url(value: &str) -> Option<&str> {
    if value.trim().eq_ignore_ascii_case("none") {
        return None;
    }
    CSS_URL
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Derives a safe file name from a source URL.
///
/// Takes the last path segment without query or fragment, replaces every
/// character outside `[A-Za-z0-9._-]` with `_` and appends `.jpg` when no
/// alphanumeric extension remains. An empty segment falls back to
/// `<fallback_stem>_<index>.jpg`.
///
/// # Example
///
/// ```rust
/// use clipmark_core::derive_filename;
///
/// assert_eq!(derive_filename("https://x/a.png?v=2", "image", 0), "a.png");
/// assert_eq!(derive_filename("https://x/photos/my cat", "image", 0), "my_20cat.jpg");
/// assert_eq!(derive_filename("https://x/", "image", 3), "image_3.jpg");
/// ```
pub fn derive_filename(source_url: &str, fallback_stem: &str, index: usize) -> String {
    let segment = match Url::parse(source_url) {
        Ok(url) => url.path_segments().and_then(|segments| segments.last()).unwrap_or("").to_string(),
        Err(_) => {
            let path = source_url.split(['?', '#']).next().unwrap_or("");
            path.rsplit('/').next().unwrap_or("").to_string()
        }
    };

    if segment.is_empty() {
        return format!("{}_{}.{}", fallback_stem, index, DEFAULT_EXTENSION);
    }

    let mut filename: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    if !has_extension(&filename) {
        filename.push('.');
        filename.push_str(DEFAULT_EXTENSION);
    }
    filename
}

fn has_extension(filename: &str) -> bool {
    filename.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn collect(html: &str) -> Vec<ImageDescriptor> {
        collect_images(&Document::parse(html).unwrap())
    }

    fn is_safe_filename(name: &str) -> bool {
        Regex::new(r"^[A-Za-z0-9._-]+\.[A-Za-z0-9]+$").unwrap().is_match(name)
    }

    #[rstest]
    #[case("https://x/a.png?v=2", "a.png")]
    #[case("https://x/a.png#frag", "a.png")]
    #[case("https://x/path/photo", "photo.jpg")]
    #[case("https://x/%C3%A9t%C3%A9.webp", "_C3_A9t_C3_A9.webp")]
    #[case("https://x/archive.tar.gz", "archive.tar.gz")]
    #[case("https://x/trailing.", "trailing..jpg")]
    #[case("https://x/.hidden", ".hidden.jpg")]
    #[case("https://x/v.1-final", "v.1-final.jpg")]
    #[case("images/local shot.png?x=1", "local_shot.png")]
    #[case("https://x/", "image_7.jpg")]
    fn test_derive_filename(#[case] source: &str, #[case] expected: &str) {
        let filename = derive_filename(source, "image", 7);
        assert_eq!(filename, expected);
        assert!(is_safe_filename(&filename));
    }

    #[test]
    fn test_inline_then_background_order() {
        let images = collect(
            r#"<body>
                <div style="background-image: url('https://x/hero.jpg')"></div>
                <img src="https://x/a.png" alt="A">
                <img src="https://x/b.png">
            </body>"#,
        );

        let sources: Vec<_> = images.iter().map(|i| i.source_url.as_str()).collect();
        assert_eq!(sources, ["https://x/a.png", "https://x/b.png", "https://x/hero.jpg"]);
        assert_eq!(images[0].id, "img_0");
        assert_eq!(images[1].id, "img_1");
        assert_eq!(images[2].id, "bg_img_0");
        assert_eq!(images[2].origin, ImageOrigin::Background);
        assert_eq!(images[2].alt_text(), "Background Image");
    }

    #[test]
    fn test_dedup_by_source() {
        let images = collect(r#"<img src="https://x/a.png"><p><img src="https://x/a.png" alt="again"></p>"#);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].alt, None);
    }

    #[test]
    fn test_background_matching_inline_is_not_duplicated() {
        let images = collect(r#"<img src="https://x/a.png"><div style="background: url(https://x/a.png)"></div>"#);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].origin, ImageOrigin::Inline);
    }

    #[test]
    fn test_skips_data_uris() {
        let images = collect(
            r#"<img src="data:image/png;base64,AAAA"><div style="background-image: url(DATA:image/gif;base64,R0)"></div>"#,
        );
        assert!(images.is_empty());
    }

    #[test]
    fn test_tiny_images_need_alt_text() {
        let images = collect(
            r#"<img src="https://x/pixel.gif" width="1" height="1">
               <img src="https://x/icon.png" width="16" height="16" alt="Warning">
               <img src="https://x/wide.png" width="300" height="1">
               <img src="https://x/unknown.png">"#,
        );
        let names: Vec<_> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, ["icon.png", "wide.png", "unknown.png"]);
    }

    #[test]
    fn test_tiny_duplicate_does_not_block_later_copy() {
        let images = collect(r#"<img src="https://x/a.png" width="5" height="5"><img src="https://x/a.png">"#);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "img_1");
    }

    #[test]
    fn test_malformed_source_is_skipped_not_fatal() {
        let doc = Document::parse_with_url(
            r#"<img src="http://[::1/broken.png"><img src="/ok.png">"#,
            "https://example.com/",
        )
        .unwrap();
        let images = collect_images(&doc);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].source_url, "https://example.com/ok.png");
        assert_eq!(images[0].id, "img_1");
    }

    #[test]
    fn test_filename_collisions_are_uniquified() {
        let images = collect(
            r#"<img src="https://a.example/photo.png">
               <img src="https://b.example/photo.png">
               <img src="https://c.example/photo.png">"#,
        );
        let names: Vec<_> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, ["photo.png", "photo_2.png", "photo_3.png"]);
    }

    #[test]
    fn test_first_css_url() {
        assert_eq!(first_css_url(r#"url("https://x/a.png")"#), Some("https://x/a.png"));
        assert_eq!(first_css_url("url(a.png), url(b.png)"), Some("a.png"));
        assert_eq!(first_css_url("none"), None);
        assert_eq!(first_css_url("linear-gradient(red, blue)"), None);
    }

    #[test]
    fn test_placeholder() {
        let image = ImageDescriptor {
            source_url: "https://x/a.png".to_string(),
            filename: "a.png".to_string(),
            alt: Some("Cat".to_string()),
            origin: ImageOrigin::Inline,
            id: "img_0".to_string(),
        };
        assert_eq!(image.placeholder(), "![Cat](images/a.png)");
        assert_eq!(ImageDescriptor { alt: None, ..image }.placeholder(), "![image](images/a.png)");
    }
}
