//! Markdown to Confluence wiki markup.
//!
//! The converter walks the `pulldown-cmark` event stream and writes wiki
//! markup directly:
//!
//! | Markdown            | Wiki markup                          |
//! |---------------------|--------------------------------------|
//! | `# Title`           | `h1. Title`                          |
//! | `**bold**`          | `*bold*`                             |
//! | `*italic*`          | `_italic_`                           |
//! | `~~struck~~`        | `-struck-`                           |
//! | `` `code` ``        | `{{code}}`                           |
//! | `[text](url)`       | `[text\|url]`                        |
//! | `![alt](url)`       | `!url\|alt=alt!`                     |
//! | `> quote`           | `{quote}...{quote}`                  |
//! | fenced code         | `{code:language=...}...{code}`       |
//! | `- item` / `1. item`| `* item` / `# item` (nested: `**`, `*#`) |
//! | `- [x] done`        | `* (/) done`                         |
//! | tables              | `\|\| head \|\|` / `\| cell \|`      |
//!
//! Code blocks and code spans are swapped for NUL-delimited placeholders
//! while the output is post-processed, so the clean-up passes never touch
//! their contents. Input containing NUL is rejected up front, which keeps
//! the placeholders unambiguous.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, LinkType, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use tracing::debug;

use super::{check_size, parser_options, RenderError, DEFAULT_MAX_INPUT_BYTES};

/// Code block themes understood by Confluence.
pub const KNOWN_THEMES: [&str; 7] = [
    "DJango",
    "Emacs",
    "FadeToGrey",
    "Midnight",
    "RDark",
    "Eclipse",
    "Confluence",
];

/// Returns `true` if `theme` names one of the [`KNOWN_THEMES`] (case-insensitive).
#[must_use]
pub fn is_known_theme(theme: &str) -> bool {
    KNOWN_THEMES.iter().any(|t| t.eq_ignore_ascii_case(theme))
}

/// Options controlling the conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    theme: Option<String>,
    max_input_bytes: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            theme: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl ConvertOptions {
    /// Options that apply `theme` to every code block.
    ///
    /// A blank theme means no theme.
    #[must_use]
    pub fn with_theme(theme: impl Into<String>) -> Self {
        Self::default().theme(Some(theme.into()))
    }

    /// Replaces the code block theme. Blank values clear it.
    #[must_use]
    pub fn theme(mut self, theme: Option<String>) -> Self {
        self.theme = theme
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Sets the maximum accepted input size in bytes.
    #[must_use]
    pub const fn max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    /// The code block theme, if any.
    #[must_use]
    pub fn code_theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    /// The maximum accepted input size in bytes.
    #[must_use]
    pub const fn input_limit(&self) -> usize {
        self.max_input_bytes
    }
}

/// Converts Markdown to Confluence wiki markup.
///
/// Blank input converts to an empty string. Any other output is trimmed and
/// terminated by a single newline.
///
/// # Errors
///
/// Returns [`RenderError::InputTooLarge`] if the input exceeds the limit and
/// [`RenderError::NulCharacter`] if it contains `\0`.
pub fn convert(markdown: &str, options: &ConvertOptions) -> Result<String, RenderError> {
    check_size(markdown, options.max_input_bytes)?;
    if let Some(offset) = markdown.find('\0') {
        return Err(RenderError::NulCharacter { offset });
    }

    if markdown.trim().is_empty() {
        return Ok(String::new());
    }

    let mut writer = WikiWriter::new(options);
    for event in Parser::new_ext(markdown, parser_options()) {
        writer.event(event);
    }
    let (raw, protected) = writer.finish();
    let output = post_process(&raw, &protected);

    debug!(
        input_bytes = markdown.len(),
        output_bytes = output.len(),
        "Converted Markdown to wiki markup"
    );

    Ok(output)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    const fn marker(self) -> char {
        match self {
            Self::Bullet => '*',
            Self::Ordered => '#',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Item,
    Quote,
}

/// Inline content captured for a link or image until its end tag.
struct Capture {
    target: CaptureTarget,
    text: String,
}

enum CaptureTarget {
    Link { url: String, email: bool },
    Image { url: String },
}

struct CodeCapture {
    language: Option<String>,
    text: String,
}

#[derive(Default)]
struct TableState {
    in_head: bool,
    cell_index: usize,
}

struct WikiWriter<'a> {
    options: &'a ConvertOptions,
    output: String,
    captures: Vec<Capture>,
    protected: Vec<String>,
    lists: Vec<ListKind>,
    containers: Vec<Container>,
    code: Option<CodeCapture>,
    table: TableState,
}

impl<'a> WikiWriter<'a> {
    fn new(options: &'a ConvertOptions) -> Self {
        Self {
            options,
            output: String::new(),
            captures: Vec::new(),
            protected: Vec::new(),
            lists: Vec::new(),
            containers: Vec::new(),
            code: None,
            table: TableState::default(),
        }
    }

    fn out(&mut self) -> &mut String {
        match self.captures.last_mut() {
            Some(capture) => &mut capture.text,
            None => &mut self.output,
        }
    }

    fn push(&mut self, s: &str) {
        self.out().push_str(s);
    }

    fn ensure_newline(&mut self) {
        let out = self.out();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    /// Stores `content` out of band and returns its placeholder.
    fn protect(&mut self, content: String) -> String {
        let index = self.protected.len();
        self.protected.push(content);
        format!("\0{index}\0")
    }

    fn in_item(&self) -> bool {
        self.containers.last() == Some(&Container::Item)
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(code) = self.code.as_mut() {
                    code.text.push_str(&text);
                } else {
                    self.push(&escape_text(&text));
                }
            }
            Event::Code(code) => {
                let span = format!("{{{{{}}}}}", escape_code(&code));
                let placeholder = self.protect(span);
                self.push(&placeholder);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push(&html),
            Event::SoftBreak | Event::HardBreak => self.push("\n"),
            Event::Rule => self.push("----\n\n"),
            Event::TaskListMarker(done) => self.push(if done { "(/) " } else { "(x) " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                let heading = format!("h{}. ", heading_number(level));
                self.push(&heading);
            }
            Tag::BlockQuote(_) => {
                self.push("{quote}\n");
                self.containers.push(Container::Quote);
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => Some(info.trim().to_string()),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeCapture {
                    language,
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                if !self.lists.is_empty() {
                    self.ensure_newline();
                }
                self.lists.push(if start.is_some() {
                    ListKind::Ordered
                } else {
                    ListKind::Bullet
                });
            }
            Tag::Item => {
                let mut prefix: String = self.lists.iter().map(|kind| kind.marker()).collect();
                if prefix.is_empty() {
                    prefix.push('*');
                }
                prefix.push(' ');
                self.push(&prefix);
                self.containers.push(Container::Item);
            }
            Tag::TableHead => {
                self.table = TableState {
                    in_head: true,
                    cell_index: 0,
                };
                self.push("|| ");
            }
            Tag::TableRow => {
                self.table.cell_index = 0;
                self.push("| ");
            }
            Tag::TableCell => {
                if self.table.cell_index > 0 {
                    self.push(if self.table.in_head { " || " } else { " | " });
                }
                self.table.cell_index += 1;
            }
            Tag::Emphasis => self.push("_"),
            Tag::Strong => self.push("*"),
            Tag::Strikethrough => self.push("-"),
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => self.captures.push(Capture {
                target: CaptureTarget::Link {
                    url: dest_url.to_string(),
                    email: link_type == LinkType::Email,
                },
                text: String::new(),
            }),
            Tag::Image { dest_url, .. } => self.captures.push(Capture {
                target: CaptureTarget::Image {
                    url: dest_url.to_string(),
                },
                text: String::new(),
            }),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                // Paragraphs of loose list items stay on the item line.
                if !self.in_item() {
                    self.push("\n\n");
                }
            }
            TagEnd::Heading(_) => self.push("\n\n"),
            TagEnd::BlockQuote(_) => {
                let out = self.out();
                let len = out.trim_end_matches('\n').len();
                out.truncate(len);
                self.push("\n{quote}\n\n");
                self.containers.pop();
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let block = self.code_block(code);
                    let placeholder = self.protect(block);
                    self.push(&placeholder);
                    self.push("\n\n");
                }
            }
            TagEnd::HtmlBlock => self.ensure_newline(),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.push("\n");
                }
            }
            TagEnd::Item => {
                self.ensure_newline();
                self.containers.pop();
            }
            TagEnd::TableHead => {
                self.push(" ||\n");
                self.table.in_head = false;
            }
            TagEnd::TableRow => self.push(" |\n"),
            TagEnd::Table => self.push("\n"),
            TagEnd::Emphasis => self.push("_"),
            TagEnd::Strong => self.push("*"),
            TagEnd::Strikethrough => self.push("-"),
            TagEnd::Link | TagEnd::Image => {
                if let Some(capture) = self.captures.pop() {
                    let rendered = render_capture(capture);
                    self.push(&rendered);
                }
            }
            _ => {}
        }
    }

    fn code_block(&self, code: CodeCapture) -> String {
        let text = code.text.strip_suffix('\n').unwrap_or(&code.text);

        let mut params = Vec::new();
        match code.language.as_deref() {
            Some("mermaid") => {
                params.push("language=text".to_string());
                params.push("title=mermaid".to_string());
                params.push("collapse=true".to_string());
            }
            Some(lang) if !lang.is_empty() => params.push(format!("language={lang}")),
            _ => {}
        }
        if let Some(theme) = self.options.code_theme() {
            params.push(format!("theme={theme}"));
        }

        if params.is_empty() {
            format!("{{code}}\n{text}\n{{code}}")
        } else {
            format!("{{code:{}}}\n{text}\n{{code}}", params.join("|"))
        }
    }

    fn finish(mut self) -> (String, Vec<String>) {
        // Unclosed captures cannot come out of the parser, but never drop text.
        while let Some(capture) = self.captures.pop() {
            let text = capture.text;
            self.push(&text);
        }
        (self.output, self.protected)
    }
}

fn render_capture(capture: Capture) -> String {
    match capture.target {
        CaptureTarget::Link { url, email: true } => format!("[mailto:{url}]"),
        CaptureTarget::Link { url, email: false } => {
            if capture.text.is_empty() || capture.text == url {
                format!("[{url}]")
            } else {
                format!("[{}|{url}]", capture.text)
            }
        }
        CaptureTarget::Image { url } => {
            if capture.text.is_empty() {
                format!("!{url}!")
            } else {
                format!("!{url}|alt={}!", capture.text)
            }
        }
    }
}

const fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Braces start macros in wiki markup.
fn escape_text(text: &str) -> String {
    text.replace('{', "\\{").replace('}', "\\}")
}

fn escape_code(code: &str) -> String {
    code.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

fn residual_bold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(\S|\S.*?\S)\*\*").expect("valid regex"))
}

fn excess_newlines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x00(\d+)\x00").expect("valid regex"))
}

/// Clean-up passes over the raw markup, then placeholder restoration.
fn post_process(raw: &str, protected: &[String]) -> String {
    let text = residual_bold().replace_all(raw, "*$1*");
    let text = excess_newlines().replace_all(&text, "\n\n");
    let text = placeholder().replace_all(&text, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| protected.get(i))
            .cloned()
            .unwrap_or_default()
    });

    let mut output = text.trim().to_string();
    output.push('\n');
    output
}
