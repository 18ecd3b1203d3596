//! Error types for Clipmark operations.
//!
//! The conversion pipeline itself never fails: per-image problems are logged
//! and skipped. [`ClipmarkError`] covers the edges around it, namely parsing
//! the page URL and loading a rendered-tree snapshot.
//!
//! # Example
//!
//! ```rust
//! use clipmark_core::{ClipmarkError, Document};
//!
//! match Document::parse_with_url("<p>Hi</p>", "not a url") {
//!     Err(ClipmarkError::InvalidUrl(reason)) => println!("bad page URL: {}", reason),
//!     Err(e) => println!("Error: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use thiserror::Error;

/// Main error type for Clipmark operations.
#[derive(Error, Debug)]
pub enum ClipmarkError {
    /// Invalid URL provided.
    ///
    /// Returned when a page URL cannot be parsed, or when an image or link
    /// source cannot be resolved against it.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A rendered-tree snapshot could not be read or written.
    #[error("Invalid document snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result type alias for ClipmarkError.
///
/// This is a convenience alias for `std::result::Result<T, ClipmarkError>`.
pub type Result<T> = std::result::Result<T, ClipmarkError>;
