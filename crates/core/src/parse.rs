//! HTML parsing into the rendered tree.
//!
//! This module provides the [`Document`] type: the rendered tree of one page
//! together with the page URL used to resolve image and link sources.
//!
//! # Example
//!
//! ```rust
//! use clipmark_core::Document;
//!
//! let html = r#"
//!     <html>
//!         <head><title>Title</title></head>
//!         <body>
//!             <p>Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! assert_eq!(doc.title(), Some("Title".to_string()));
//! assert_eq!(doc.body().tag, "body");
//! ```

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::{ParseError, Url};

use crate::dom_tree::{Element, Node, layout_from_markup};
use crate::{ClipmarkError, Result};

/// A rendered page: the tree rooted at `<html>` plus its URL.
///
/// # Example
///
/// ```rust
/// use clipmark_core::Document;
///
/// let doc = Document::parse_with_url(r#"<img src="/a.png">"#, "https://example.com/post/").unwrap();
/// assert_eq!(doc.resolve_url("/a.png").unwrap(), "https://example.com/a.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    root: Element,
    #[serde(default, with = "optional_url")]
    url: Option<Url>,
}

impl Document {
    /// Wraps an already-rendered tree, e.g. one produced by a browser host.
    pub fn from_root(root: Element, url: Option<Url>) -> Self {
        Self { root, url }
    }

    /// Parses HTML from a string, approximating layout from the markup.
    ///
    /// Relative sources stay relative because no page URL is known.
    ///
    /// # Example
    ///
    /// ```rust
    /// use clipmark_core::Document;
    ///
    /// let doc = Document::parse("<html><body><h1>Title</h1></body></html>").unwrap();
    /// assert_eq!(doc.body().text_content(), "Title");
    /// ```
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { root: convert_element(html.root_element(), 0), url: None })
    }

    /// Parses HTML from a string served at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipmarkError::InvalidUrl`] if `url` is not an absolute URL.
    pub fn parse_with_url(html: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ClipmarkError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut doc = Self::parse(html)?;
        doc.url = Some(url);
        Ok(doc)
    }

    /// Loads a rendered-tree snapshot serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClipmarkError::Snapshot`] if the JSON does not describe a document.
    pub fn from_snapshot(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the rendered tree as a JSON snapshot.
    pub fn to_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The document element (`<html>`).
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The `<body>` element, or the root when the tree has none.
    pub fn body(&self) -> &Element {
        self.root.child_elements().find(|el| el.tag == "body").unwrap_or(&self.root)
    }

    /// The page URL, if known.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Gets the title of the document.
    ///
    /// Returns the content of the first `<title>` element, with whitespace
    /// runs collapsed the way browsers report `document.title`.
    pub fn title(&self) -> Option<String> {
        let title = self.root.descendants_by_tag("title").into_iter().next()?;
        Some(title.text_content().split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Resolves a raw `src`/`href` value the way the browser reports
    /// `img.src` and `a.href`.
    ///
    /// With a page URL, the value is joined against it. Without one, absolute
    /// URLs are normalized and relative references are returned verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ClipmarkError::InvalidUrl`] if the value is malformed.
    pub fn resolve_url(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        let resolved = match &self.url {
            Some(base) => base.join(raw).map(String::from),
            None => match Url::parse(raw) {
                Ok(url) => Ok(url.into()),
                Err(ParseError::RelativeUrlWithoutBase) => Ok(raw.to_string()),
                Err(e) => Err(e),
            },
        };
        resolved.map_err(|e| ClipmarkError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Gets the `content` of the first `<meta>` whose `name` or `property`
    /// equals `key` (case-insensitive).
    pub fn meta_content(&self, key: &str) -> Option<String> {
        self.root.descendants_by_tag("meta").into_iter().find_map(|meta| {
            let matches = ["name", "property"]
                .iter()
                .any(|attr| meta.attr(attr).is_some_and(|v| v.eq_ignore_ascii_case(key)));
            if matches { meta.attr("content").map(str::to_string) } else { None }
        })
    }
}

/// Deepest element nesting copied into the rendered tree.
///
/// Elements at this depth keep their text but lose their child elements, which
/// bounds the recursion of every later walk over the tree.
pub const MAX_TREE_DEPTH: usize = 512;

/// Copies a scraper element and its subtree into the rendered tree.
fn convert_element(element: ElementRef<'_>, depth: usize) -> Element {
    let tag = element.value().name().to_lowercase();
    let attributes: BTreeMap<String, String> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_lowercase(), value.to_string()))
        .collect();
    let layout = layout_from_markup(&tag, &attributes);

    if depth >= MAX_TREE_DEPTH {
        warn!(depth, tag = %tag, "flattened deeply nested subtree");
        let text: String = element.text().collect();
        return Element { tag, attributes, children: vec![Node::Text(text)], layout };
    }

    let mut children = Vec::new();
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => children.push(Node::Text(text.to_string())),
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    children.push(Node::Element(convert_element(child_el, depth + 1)));
                }
            }
            _ => {}
        }
    }

    Element { tag, attributes, children, layout }
}

mod optional_url {
    use serde::{Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S: Serializer>(url: &Option<Url>, serializer: S) -> Result<S::Ok, S::Error> {
        match url {
            Some(url) => serializer.serialize_some(url.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Url>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| Url::parse(&s).map_err(serde::de::Error::custom)).transpose()
    }
}
