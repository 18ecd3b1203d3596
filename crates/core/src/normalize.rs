//! Whitespace normalization for the final Markdown.

/// Returns true for the exotic spaces browsers leave in rendered text:
/// NBSP, U+2000..=U+200B, U+202F, U+205F and U+3000.
fn is_exotic_space(c: char) -> bool {
    matches!(c, '\u{00A0}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}' | '\u{3000}')
}

/// Replaces every exotic space with an ASCII space.
///
/// The output never contains an exotic space, so applying this twice is the
/// same as applying it once.
///
/// # Example
///
/// ```rust
/// use clipmark_core::normalize_spaces;
///
/// assert_eq!(normalize_spaces("a\u{00A0}b\u{3000}c"), "a b c");
/// ```
pub fn normalize_spaces(s: &str) -> String {
    s.chars().map(|c| if is_exotic_space(c) { ' ' } else { c }).collect()
}
