//! Markdown to HTML.

use pulldown_cmark::{html, Parser};

use super::{check_size, parser_options, RenderError, DEFAULT_MAX_INPUT_BYTES};

/// Renders Markdown to HTML using the default input limit.
///
/// Blank input renders to an empty string. Any text is valid Markdown, so
/// the only failure is oversized input.
///
/// # Errors
///
/// Returns [`RenderError::InputTooLarge`] for input over 1 MiB.
pub fn render(markdown: &str) -> Result<String, RenderError> {
    render_limited(markdown, DEFAULT_MAX_INPUT_BYTES)
}

/// Renders Markdown to HTML, rejecting input larger than `max_input_bytes`.
///
/// # Errors
///
/// Returns [`RenderError::InputTooLarge`] if the input exceeds the limit.
pub fn render_limited(markdown: &str, max_input_bytes: usize) -> Result<String, RenderError> {
    check_size(markdown, max_input_bytes)?;

    if markdown.trim().is_empty() {
        return Ok(String::new());
    }

    let parser = Parser::new_ext(markdown, parser_options());
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);

    tracing::debug!(
        input_bytes = markdown.len(),
        output_bytes = output.len(),
        "Rendered Markdown to HTML"
    );

    Ok(output)
}
