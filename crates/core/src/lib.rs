pub mod convert;
pub mod dom_tree;
pub mod error;
pub mod formatters;
pub mod images;
pub mod metadata;
pub mod normalize;
pub mod parse;

pub use convert::{ConversionResult, ConversionSettings, ConversionSettingsBuilder, DEFAULT_TAG, convert, convert_html};
pub use dom_tree::{Element, Layout, Node};
pub use error::{ClipmarkError, Result};
pub use formatters::{
    ADDITIONAL_IMAGES_HEADING, MarkdownRenderer, Strategy, append_unused_images, build_placeholders,
    generate_frontmatter,
};
pub use images::{
    IMAGES_DIR, ImageDescriptor, ImageEntry, ImageOrigin, MIN_IMAGE_DIMENSION, collect_images, derive_filename,
};
pub use metadata::PageMetadata;
pub use normalize::normalize_spaces;
pub use parse::{Document, MAX_TREE_DEPTH};
