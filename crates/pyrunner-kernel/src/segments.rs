//! Split an assistant reply into prose and fenced code segments.
//!
//! A code segment is whatever sits between a pair of triple-backtick
//! fences. An opening fence may carry a language hint (```` ```python ````)
//! which is stripped when it is a single word followed by a newline.
//! Prose is kept byte for byte. An unclosed fence turns the rest of the
//! reply into code.

const FENCE: &str = "```";

/// A fenced block from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSnippet {
    pub code: String,
    pub language: Option<String>,
}

impl CodeSnippet {
    /// Text placed on the clipboard. Copying changes no state.
    pub fn copy_text(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// One piece of a decomposed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose(String),
    Code(CodeSnippet),
}

impl Segment {
    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Segment::Prose(text) => text,
            Segment::Code(snippet) => &snippet.code,
        }
    }

    pub fn as_code(&self) -> Option<&CodeSnippet> {
        match self {
            Segment::Code(snippet) => Some(snippet),
            Segment::Prose(_) => None,
        }
    }
}

/// Tokenize a reply into ordered segments. Empty segments are dropped.
pub fn parse_segments(reply: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = reply;

    while let Some(open) = rest.find(FENCE) {
        push_prose(&mut segments, &rest[..open]);

        let after_open = &rest[open + FENCE.len()..];
        let (language, body_start) = split_language(after_open);

        match body_start.find(FENCE) {
            Some(close) => {
                push_code(&mut segments, &body_start[..close], language);
                rest = &body_start[close + FENCE.len()..];
            }
            None => {
                push_code(&mut segments, body_start, language);
                rest = "";
            }
        }
    }

    push_prose(&mut segments, rest);
    segments
}

/// Code snippets of a reply, in order. Indexes used by insert/copy.
pub fn code_snippets(segments: &[Segment]) -> Vec<&CodeSnippet> {
    segments.iter().filter_map(Segment::as_code).collect()
}

fn split_language(after_open: &str) -> (Option<String>, &str) {
    let hint_len = after_open
        .find(|c: char| !is_language_char(c))
        .unwrap_or(after_open.len());
    if hint_len == 0 {
        return (None, after_open);
    }
    match strip_newline_prefix(&after_open[hint_len..]) {
        Some(body) => (Some(after_open[..hint_len].to_string()), body),
        None => (None, after_open),
    }
}

fn strip_newline_prefix(text: &str) -> Option<&str> {
    text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n'))
}

fn is_language_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-')
}

fn push_prose(segments: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        segments.push(Segment::Prose(text.to_string()));
    }
}

fn push_code(segments: &mut Vec<Segment>, body: &str, language: Option<String>) {
    let body = strip_newline_prefix(body).unwrap_or(body);
    let body = body
        .strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body);
    if !body.is_empty() {
        segments.push(Segment::Code(CodeSnippet {
            code: body.to_string(),
            language,
        }));
    }
}
