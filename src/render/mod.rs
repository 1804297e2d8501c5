//! Markdown rendering.
//!
//! Two output formats are supported, both built on the `pulldown-cmark`
//! event stream with the GFM table, strikethrough and task list extensions:
//!
//! - [`html`]: HTML, via the parser's own HTML writer
//! - [`confluence`]: Confluence wiki markup
//!
//! Both reject input over the configured size limit before parsing. The
//! wiki markup converter also rejects NUL, which it reserves for
//! placeholders; the HTML renderer accepts any text.

pub mod confluence;
pub mod html;

pub use confluence::{convert, ConvertOptions, KNOWN_THEMES};
pub use html::render;

use pulldown_cmark::Options;
use thiserror::Error;

/// Default upper bound on Markdown input size (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Errors that can occur while rendering Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The input is larger than the configured limit.
    #[error("Markdown input is too large: {size} bytes (limit {limit} bytes)")]
    InputTooLarge {
        /// Input size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The input contains a NUL character, which the wiki markup converter
    /// cannot carry.
    #[error("Markdown input contains a NUL character at byte offset {offset}")]
    NulCharacter {
        /// Byte offset of the first NUL.
        offset: usize,
    },
}

/// Parser extensions shared by every output format.
pub(crate) fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Checks `markdown` against the input size limit.
///
/// # Errors
///
/// Returns [`RenderError::InputTooLarge`] if the input exceeds `limit` bytes.
pub fn check_size(markdown: &str, limit: usize) -> Result<(), RenderError> {
    if markdown.len() > limit {
        return Err(RenderError::InputTooLarge {
            size: markdown.len(),
            limit,
        });
    }
    Ok(())
}
