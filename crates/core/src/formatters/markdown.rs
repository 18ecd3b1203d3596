//! Tree-to-Markdown rendering.
//!
//! [`MarkdownRenderer`] walks the rendered tree depth-first. Each element tag
//! maps to a [`Strategy`]; text nodes contribute their trimmed text. Images are
//! placed through a lookup table built from the collected images before the
//! walk starts.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::Document;
use crate::dom_tree::{Element, Node};
use crate::images::ImageDescriptor;

/// Heading that introduces images the walk never placed.
pub const ADDITIONAL_IMAGES_HEADING: &str = "## Additional Images";

/// How an element is turned into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `h1`..`h6`: hashes plus the element's full text.
    Heading(usize),
    Paragraph,
    Image,
    Link,
    List { ordered: bool },
    LineBreak,
    Strong,
    Emphasis,
    InlineCode,
    Preformatted,
    Blockquote,
    /// `div`, `section`, `article`, `main`, `span`: children only.
    Container,
    Table,
    /// `th`/`td` reached outside a table: children only.
    TableCell,
    /// Any other tag: children only.
    Fallback,
}

impl Strategy {
    /// Looks up the strategy for a lowercase tag name.
    pub fn for_tag(tag: &str) -> Self {
        match tag {
            "h1" => Strategy::Heading(1),
            "h2" => Strategy::Heading(2),
            "h3" => Strategy::Heading(3),
            "h4" => Strategy::Heading(4),
            "h5" => Strategy::Heading(5),
            "h6" => Strategy::Heading(6),
            "p" => Strategy::Paragraph,
            "img" => Strategy::Image,
            "a" => Strategy::Link,
            "ul" => Strategy::List { ordered: false },
            "ol" => Strategy::List { ordered: true },
            "br" => Strategy::LineBreak,
            "strong" | "b" => Strategy::Strong,
            "em" | "i" => Strategy::Emphasis,
            "code" => Strategy::InlineCode,
            "pre" => Strategy::Preformatted,
            "blockquote" => Strategy::Blockquote,
            "div" | "section" | "article" | "main" | "span" => Strategy::Container,
            "table" => Strategy::Table,
            "th" | "td" => Strategy::TableCell,
            _ => Strategy::Fallback,
        }
    }
}

/// Maps each image's source URL to its Markdown placeholder.
pub fn build_placeholders(images: &[ImageDescriptor]) -> HashMap<String, String> {
    images.iter().map(|image| (image.source_url.clone(), image.placeholder())).collect()
}

/// Renders the rendered tree of one document to Markdown.
///
/// The placeholder table is read-only during the walk. Each image is placed at
/// its first occurrence only.
pub struct MarkdownRenderer<'a> {
    doc: &'a Document,
    placeholders: &'a HashMap<String, String>,
    placed: HashSet<String>,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(doc: &'a Document, placeholders: &'a HashMap<String, String>) -> Self {
        Self { doc, placeholders, placed: HashSet::new() }
    }

    /// Renders `root` and its subtree.
    pub fn render(mut self, root: &Element) -> String {
        self.render_element(root, 0)
    }

    fn render_node(&mut self, node: &Node, depth: usize) -> String {
        match node {
            Node::Element(el) => self.render_element(el, depth),
            Node::Text(text) => {
                let text = text.trim();
                if text.is_empty() { String::new() } else { format!("{} ", text) }
            }
        }
    }

    fn render_children(&mut self, el: &Element, depth: usize) -> String {
        let mut out = String::new();
        for child in &el.children {
            out.push_str(&self.render_node(child, depth + 1));
        }
        out
    }

    fn render_element(&mut self, el: &Element, depth: usize) -> String {
        if el.layout.hidden && el.tag != "body" && el.tag != "html" {
            trace!(depth, tag = %el.tag, "pruned hidden subtree");
            return String::new();
        }

        match Strategy::for_tag(&el.tag) {
            Strategy::Heading(level) => format!("{} {}\n\n", "#".repeat(level), el.text_content().trim()),
            Strategy::Paragraph => format!("{}\n\n", self.render_children(el, depth).trim()),
            Strategy::Image => self.render_image(el),
            Strategy::Link => self.render_link(el, depth),
            Strategy::List { ordered } => self.render_list(el, ordered, depth),
            Strategy::LineBreak => "\n".to_string(),
            Strategy::Strong => wrap_inline(&self.render_children(el, depth), "**"),
            Strategy::Emphasis => wrap_inline(&self.render_children(el, depth), "*"),
            Strategy::InlineCode => format!("`{}`", el.text_content().trim()),
            Strategy::Preformatted => format!("```\n{}\n```\n\n", el.text_content().trim()),
            Strategy::Blockquote => render_quote(&self.render_children(el, depth)),
            Strategy::Table => self.render_table(el, depth),
            Strategy::Container | Strategy::TableCell | Strategy::Fallback => self.render_children(el, depth),
        }
    }

    fn render_image(&mut self, img: &Element) -> String {
        let Some(source) = img.non_empty_attr("src").and_then(|raw| self.doc.resolve_url(raw).ok()) else {
            return String::new();
        };

        let Some(placeholder) = self.placeholders.get(&source) else {
            return String::new();
        };
        if self.placed.insert(source) { format!("{}\n\n", placeholder) } else { String::new() }
    }

    fn render_link(&mut self, link: &Element, depth: usize) -> String {
        let Some(raw) = link.non_empty_attr("href") else {
            return self.render_children(link, depth);
        };
        let href = self.doc.resolve_url(raw).unwrap_or_else(|_| raw.to_string());

        let text = link.text_content();
        let text = text.trim();
        let text = if text.is_empty() { href.as_str() } else { text };
        format!("[{}]({})", text, href)
    }

    fn render_list(&mut self, list: &Element, ordered: bool, depth: usize) -> String {
        let mut out = String::new();
        let items = list.child_elements().filter(|el| el.tag == "li" && !el.layout.hidden);

        for (index, item) in items.enumerate() {
            let content = self.render_children(item, depth + 1);
            if ordered {
                out.push_str(&format!("{}. {}\n", index + 1, content.trim()));
            } else {
                out.push_str(&format!("- {}\n", content.trim()));
            }
        }

        out.push('\n');
        out
    }

    fn render_table(&mut self, table: &Element, depth: usize) -> String {
        let mut out = String::from("\n\n");
        let rows = table_rows(table);
        let Some((first, rest)) = rows.split_first() else {
            return out;
        };

        let headers: Vec<&Element> = cells(first, &["th"]);
        let headers = if headers.is_empty() { cells(first, &["td"]) } else { headers };

        let header_line: Vec<String> = headers.iter().map(|cell| self.render_cell(cell, depth)).collect();
        out.push_str(&table_row(&header_line));
        out.push_str(&table_row(&vec!["---".to_string(); headers.len()]));

        for row in rest {
            let line: Vec<String> = cells(row, &["th", "td"])
                .iter()
                .map(|cell| self.render_cell(cell, depth))
                .collect();
            out.push_str(&table_row(&line));
        }

        out.push('\n');
        out
    }

    /// A cell is always a single line in the output.
    fn render_cell(&mut self, cell: &Element, depth: usize) -> String {
        let content = self.render_children(cell, depth + 1);
        escape_pipe(&content.trim().replace('\n', " "))
    }
}

/// Wraps trimmed inline content in `marker`; empty content renders nothing.
fn wrap_inline(content: &str, marker: &str) -> String {
    let content = content.trim();
    if content.is_empty() { String::new() } else { format!("{marker}{content}{marker}") }
}

/// Prefixes every line of the quoted content with `> `.
fn render_quote(content: &str) -> String {
    let quoted: Vec<String> = content.trim().split('\n').map(|line| format!("> {}", line)).collect();
    format!("{}\n\n", quoted.join("\n"))
}

/// Rows of `table` in document order, excluding rows of nested tables.
fn table_rows(table: &Element) -> Vec<&Element> {
    fn visit<'a>(el: &'a Element, rows: &mut Vec<&'a Element>) {
        for child in el.child_elements() {
            match child.tag.as_str() {
                "tr" if !child.layout.hidden => rows.push(child),
                "tr" | "table" => {}
                _ => visit(child, rows),
            }
        }
    }

    let mut rows = Vec::new();
    visit(table, &mut rows);
    rows
}

fn cells<'a>(row: &'a Element, tags: &[&str]) -> Vec<&'a Element> {
    row.child_elements()
        .filter(|cell| tags.contains(&cell.tag.as_str()) && !cell.layout.hidden)
        .collect()
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}

/// Escape pipe characters for Markdown tables
fn escape_pipe(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Appends every image whose path never made it into `markdown` under
/// [`ADDITIONAL_IMAGES_HEADING`], in collection order.
pub fn append_unused_images(markdown: &mut String, images: &[ImageDescriptor]) {
    let unused: Vec<&ImageDescriptor> = images
        .iter()
        .filter(|image| !markdown.contains(&format!("({})", image.relative_path())))
        .collect();

    if unused.is_empty() {
        return;
    }

    markdown.push_str(&format!("\n{}\n\n", ADDITIONAL_IMAGES_HEADING));
    for image in unused {
        markdown.push_str(&format!("{}\n\n", image.placeholder()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::collect_images;

    fn render(html: &str) -> String {
        let doc = Document::parse(html).unwrap();
        let images = collect_images(&doc);
        let placeholders = build_placeholders(&images);
        MarkdownRenderer::new(&doc, &placeholders).render(doc.body())
    }

    #[test]
    fn test_strategy_table() {
        assert_eq!(Strategy::for_tag("h3"), Strategy::Heading(3));
        assert_eq!(Strategy::for_tag("b"), Strategy::Strong);
        assert_eq!(Strategy::for_tag("i"), Strategy::Emphasis);
        assert_eq!(Strategy::for_tag("ol"), Strategy::List { ordered: true });
        assert_eq!(Strategy::for_tag("section"), Strategy::Container);
        assert_eq!(Strategy::for_tag("td"), Strategy::TableCell);
        assert_eq!(Strategy::for_tag("custom-widget"), Strategy::Fallback);
    }

    #[test]
    fn test_heading_and_inline_formatting() {
        let md = render("<h1>Title</h1><p>Hello <b>world</b></p>");
        assert_eq!(md, "# Title\n\nHello **world**\n\n");
    }

    #[test]
    fn test_heading_flattens_nested_markup() {
        let md = render("<h2>Big <em>news</em></h2>");
        assert_eq!(md, "## Big news\n\n");
    }

    #[test]
    fn test_emphasis_and_code() {
        let md = render("<p><i>it</i> and <code> x + 1 </code></p>");
        assert_eq!(md, "*it*and `x + 1`\n\n");
    }

    #[test]
    fn test_link_with_text_and_fallback() {
        let md = render(r#"<p><a href="https://example.com"> Example </a><a href="https://e.com/x"></a></p>"#);
        assert_eq!(md, "[Example](https://example.com/)[https://e.com/x](https://e.com/x)\n\n");
    }

    #[test]
    fn test_anchor_without_href_renders_children() {
        let md = render(r#"<p><a name="top"><b>Top</b></a></p>"#);
        assert_eq!(md, "**Top**\n\n");
    }

    #[test]
    fn test_unordered_and_ordered_lists() {
        let md = render("<ul><li>One</li><li><b>Two</b></li></ul><ol><li>First</li><li>Second</li></ol>");
        assert_eq!(md, "- One\n- **Two**\n\n1. First\n2. Second\n\n");
    }

    #[test]
    fn test_line_break() {
        let md = render("<p>a<br>b</p>");
        assert_eq!(md, "a \nb\n\n");
    }

    #[test]
    fn test_preformatted_block() {
        let md = render("<pre><code>fn main() {}\n</code></pre>");
        assert_eq!(md, "```\nfn main() {}\n```\n\n");
    }

    #[test]
    fn test_blockquote_prefixes_every_line() {
        let md = render("<blockquote><p>One</p><p>Two</p></blockquote>");
        assert_eq!(md, "> One\n> \n> Two\n\n");
    }

    #[test]
    fn test_table_with_header_cells() {
        let md = render("<table><tr><th>Name</th><th>Age</th></tr><tr><td>Ann</td><td>30</td></tr></table>");
        assert_eq!(md, "\n\n| Name | Age |\n| --- | --- |\n| Ann | 30 |\n\n");
    }

    #[test]
    fn test_table_without_header_cells_promotes_first_row() {
        let md = render("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
        assert_eq!(md, "\n\n| a | b |\n| --- | --- |\n| c | d |\n\n");
    }

    #[test]
    fn test_table_cells_are_single_line_and_escaped() {
        let md = render("<table><tr><th>x</th></tr><tr><td><p>one</p><p>a|b</p></td></tr></table>");
        assert!(md.contains("| one  a\\|b |\n"));
    }

    #[test]
    fn test_hidden_subtrees_are_pruned() {
        let md = render(r#"<p>Shown</p><div hidden><p>Secret</p></div><script>var x = 1;</script>"#);
        assert_eq!(md, "Shown\n\n");
    }

    #[test]
    fn test_image_placed_once_with_alt() {
        let md = render(r#"<p><img src="https://x/a.png?v=2" alt="Cat"></p><img src="https://x/a.png?v=2">"#);
        assert_eq!(md, "![Cat](images/a.png)\n\n");
    }

    #[test]
    fn test_tiny_image_without_placeholder_emits_nothing() {
        let md = render(r#"<p>x<img src="https://x/p.gif" width="1" height="1"></p>"#);
        assert_eq!(md, "x\n\n");
    }

    #[test]
    fn test_append_unused_images() {
        let doc = Document::parse(
            r#"<p><img src="https://x/a.png"></p><div hidden><img src="https://x/b.png" alt="B"></div>"#,
        )
        .unwrap();
        let images = collect_images(&doc);
        let placeholders = build_placeholders(&images);
        let mut md = MarkdownRenderer::new(&doc, &placeholders).render(doc.body());

        append_unused_images(&mut md, &images);
        assert_eq!(md, "![image](images/a.png)\n\n\n## Additional Images\n\n![B](images/b.png)\n\n");
    }

    #[test]
    fn test_append_unused_images_noop_when_all_placed() {
        let mut md = "![image](images/a.png)\n\n".to_string();
        let images = collect_images(&Document::parse(r#"<img src="https://x/a.png">"#).unwrap());
        append_unused_images(&mut md, &images);
        assert!(!md.contains(ADDITIONAL_IMAGES_HEADING));
    }

    #[test]
    fn test_escape_pipe() {
        assert_eq!(escape_pipe("foo|bar"), r"foo\|bar");
        assert_eq!(escape_pipe("no pipes"), "no pipes");
    }
}
