//! The rendered tree consumed by the converter.
//!
//! A page reaches the core as a tree of [`Node`]s: elements carrying their tag,
//! attributes, children and the slice of computed [`Layout`] the converter
//! consults, plus text nodes. The tree is a plain value, so a host with a live
//! browser can serialize its own snapshot while [`crate::Document::parse`]
//! approximates one from static markup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tags that never produce a layout box.
const NON_RENDERED_TAGS: &[&str] = &[
    "head", "title", "meta", "link", "base", "script", "style", "noscript", "template",
];

/// A node in the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// DOM `textContent` of this node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in &el.children {
                    child.push_text(out);
                }
            }
        }
    }
}

/// Computed layout and style facts for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// The element has no layout box (`display: none`, never-rendered tag, ...).
    #[serde(default)]
    pub hidden: bool,
    /// Rendered width in CSS pixels, when known.
    #[serde(default)]
    pub width: Option<u32>,
    /// Rendered height in CSS pixels, when known.
    #[serde(default)]
    pub height: Option<u32>,
    /// Computed `background-image` value, e.g. `url("hero.jpg")` or `none`.
    #[serde(default)]
    pub background_image: Option<String>,
}

/// An element of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub layout: Layout,
}

impl Element {
    /// Creates an element with no attributes, children or layout facts.
    pub fn new(tag: impl Into<String>) -> Self {
        let tag: String = tag.into();
        Self { tag: tag.to_lowercase(), attributes: BTreeMap::new(), children: Vec::new(), layout: Layout::default() }
    }

    /// Adds an attribute, returning the element for chaining.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_lowercase(), value.to_string());
        self
    }

    /// Appends a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends a text node.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    /// Replaces the layout facts.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Gets an attribute only when it is present and not blank.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Concatenation of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.push_text(&mut out);
        }
        out
    }

    /// Child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Visits this element and every descendant element in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }

    /// Descendant elements with the given tag, in document order.
    pub fn descendants_by_tag<'a>(&'a self, tag: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in self.child_elements() {
            child.walk(&mut |el| {
                if el.tag == tag {
                    found.push(el);
                }
            });
        }
        found
    }
}

/// Approximates an element's computed layout from its markup.
///
/// Only what static HTML can express is considered: never-rendered tags, the
/// `hidden` attribute, inline `display: none`, explicit dimensions and inline
/// background images. `visibility: hidden` keeps its layout box, so it does
/// not hide the element.
pub fn layout_from_markup(tag: &str, attributes: &BTreeMap<String, String>) -> Layout {
    let style = attributes.get("style").map(|s| parse_inline_style(s)).unwrap_or_default();
    let declared = |name: &str| declared_value(&style, name);

    let hidden = NON_RENDERED_TAGS.contains(&tag)
        || attributes.contains_key("hidden")
        || (tag == "input" && attributes.get("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")))
        || declared("display").is_some_and(|v| v.eq_ignore_ascii_case("none"));

    let width = attributes.get("width").and_then(|v| parse_pixels(v)).or_else(|| declared("width").and_then(parse_pixels));
    let height = attributes
        .get("height")
        .and_then(|v| parse_pixels(v))
        .or_else(|| declared("height").and_then(parse_pixels));

    let background_image = declared("background-image")
        .or_else(|| declared("background").filter(|v| v.to_ascii_lowercase().contains("url(")))
        .map(str::to_string);

    Layout { hidden, width, height, background_image }
}

/// Splits an inline `style` attribute into `(property, value)` pairs.
///
/// Property names are lowercased; `!important` is dropped from values.
pub fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    split_declarations(style)
        .into_iter()
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if prop.is_empty() || value.is_empty() { None } else { Some((prop, value.to_string())) }
        })
        .collect()
}

/// Splits on `;` outside of quotes and parentheses, so `url(data:...;base64,...)`
/// stays one declaration.
fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

/// Last declared value of `name`, matching the CSS cascade within one attribute.
fn declared_value<'a>(style: &'a [(String, String)], name: &str) -> Option<&'a str> {
    style.iter().rev().find(|(prop, _)| prop == name).map(|(_, value)| value.as_str())
}

/// Parses a pixel length such as `16`, `16px` or `16.5px`.
///
/// Percentages and other units are not pixel lengths and yield `None`.
fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    let parsed: f64 = number.parse().ok()?;
    if parsed.is_finite() && parsed >= 0.0 { Some(parsed.round() as u32) } else { None }
}
