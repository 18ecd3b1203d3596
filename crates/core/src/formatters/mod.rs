pub mod frontmatter;
pub mod markdown;

pub use frontmatter::generate_frontmatter;
pub use markdown::{ADDITIONAL_IMAGES_HEADING, MarkdownRenderer, Strategy, append_unused_images, build_placeholders};
