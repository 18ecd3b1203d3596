use crate::convert::ConversionSettings;
use crate::metadata::PageMetadata;

/// Characters that carry structure in the block (`:`) or in Markdown (`#`, `*`).
const STRIPPED_SYMBOLS: &[char] = &[':', '#', '*'];

/// Generate the YAML-style frontmatter block, including the trailing blank line.
///
/// ```text
/// ---
/// title: <title>
/// description: <description>
/// tags:
///   - <tag>
/// published: true
/// date: YYYY-MM-DD
/// ---
/// ```
pub fn generate_frontmatter(page: &PageMetadata, settings: &ConversionSettings) -> String {
    let mut frontmatter = String::from("---\n");

    frontmatter.push_str(&format!("title: {}\n", strip_symbols(&page.title)));
    frontmatter.push_str(&format!(
        "description: {}\n",
        strip_symbols(&page.effective_description())
    ));

    frontmatter.push_str("tags:\n");
    for tag in &settings.tags {
        frontmatter.push_str(&format!("  - {}\n", tag));
    }

    frontmatter.push_str("published: true\n");
    frontmatter.push_str(&format!("date: {}\n", page.saved_on));
    frontmatter.push_str("---\n\n");

    frontmatter
}

/// Removes `:`, `#` and `*`, and folds line breaks so each key stays on one line.
fn strip_symbols(s: &str) -> String {
    s.chars()
        .filter(|c| !STRIPPED_SYMBOLS.contains(c))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
