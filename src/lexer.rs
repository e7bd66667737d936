use std::fmt;
use std::sync::Arc;

use crate::chars;
use crate::token::{Source, Span, Token, TokenKind};

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// `{%` without a matching `%}`.
    UnterminatedTag { snippet: String },
    /// `{{` without a matching `}}`.
    UnterminatedOutput { snippet: String },
    /// `{% raw %}` without a matching `{% endraw %}`.
    UnterminatedRaw,
    /// Quoted string without its closing quote.
    UnterminatedQuote,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedTag { snippet } => write!(f, "tag {snippet} not closed"),
            Self::UnterminatedOutput { snippet } => write!(f, "output {snippet} not closed"),
            Self::UnterminatedRaw => write!(f, "raw block not closed"),
            Self::UnterminatedQuote => write!(f, "unterminated quoted string"),
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {}", span.location())]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Delimiters and whitespace control settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexOptions {
    pub tag_left: String,
    pub tag_right: String,
    pub output_left: String,
    pub output_right: String,
    pub trim_tag_left: bool,
    pub trim_tag_right: bool,
    pub trim_output_left: bool,
    pub trim_output_right: bool,
    /// Trim every adjacent blank, newlines included. When off, only
    /// inline blanks and a single newline are consumed.
    pub greedy: bool,
}

impl Default for LexOptions {
    fn default() -> Self {
        Self {
            tag_left: "{%".to_string(),
            tag_right: "%}".to_string(),
            output_left: "{{".to_string(),
            output_right: "}}".to_string(),
            trim_tag_left: false,
            trim_tag_right: false,
            trim_output_left: false,
            trim_output_right: false,
            greedy: true,
        }
    }
}

/// Tokenize template text with default delimiters.
///
/// # Errors
///
/// Returns `LexError` on an unterminated tag, output or raw block.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    tokenize_source(&Source::new(None, input), &LexOptions::default())
}

/// Tokenize a shared source with the given delimiters, then apply
/// whitespace control.
///
/// # Errors
///
/// Returns `LexError` on an unterminated tag, output or raw block.
pub fn tokenize_source(source: &Arc<Source>, options: &LexOptions) -> Result<Vec<Token>, LexError> {
    let mut tokens = Lexer::new(source, options).tokenize()?;
    whitespace_control(&mut tokens, options.greedy);
    Ok(tokens)
}

struct Lexer<'a> {
    source: &'a Arc<Source>,
    input: &'a str,
    options: &'a LexOptions,
    pos: usize,
    /// Start of the open `{% raw %}` tag while inside a raw block.
    raw_begin: Option<usize>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a Arc<Source>, options: &'a LexOptions) -> Self {
        Self {
            source,
            input: &source.text,
            options,
            pos: 0,
            raw_begin: None,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while self.pos < self.input.len() {
            let token = if self.raw_begin.is_some() {
                self.read_raw_content()?
            } else if self.at(&self.options.output_left) && self.output_first() {
                self.read_output()?
            } else if self.at(&self.options.tag_left) {
                let tag = self.read_tag()?;
                if tag.is_tag("raw") {
                    self.raw_begin = Some(tag.span.start);
                }
                tag
            } else if self.at(&self.options.output_left) {
                self.read_output()?
            } else {
                self.read_html()
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn at(&self, delimiter: &str) -> bool {
        self.input[self.pos..].starts_with(delimiter)
    }

    /// With overlapping delimiters, the longer one decides.
    fn output_first(&self) -> bool {
        !self.at(&self.options.tag_left)
            || self.options.output_left.len() >= self.options.tag_left.len()
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.source, start..end)
    }

    fn snippet(&self, start: usize) -> String {
        let rest = &self.input[start..];
        let end = rest
            .char_indices()
            .nth(16)
            .map_or(rest.len(), |(i, _)| i);
        let mut s = rest[..end].replace('\n', " ");
        if end < rest.len() {
            s.push_str("...");
        }
        format!("\"{s}\"")
    }

    fn read_html(&mut self) -> Token {
        let start = self.pos;
        let tag = &self.options.tag_left;
        let output = &self.options.output_left;
        let rest = &self.input[start..];
        let next = [rest.find(tag.as_str()), rest.find(output.as_str())]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rest.len());
        self.pos = start + next;
        Token {
            kind: TokenKind::Html {
                value: start..self.pos,
            },
            span: self.span(start, self.pos),
            trim_left: false,
            trim_right: false,
        }
    }

    /// Find `delimiter` from `from`. Tags end at the first delimiter, so
    /// free text such as `{% # don't %}` cannot run past it. Outputs skip
    /// quoted strings (honouring backslash escapes) so that `{{ "}}" }}` stays
    /// one token; a quote that is never closed is taken literally.
    fn find_closing(&self, from: usize, delimiter: &str, quoted: bool) -> Option<usize> {
        if !quoted {
            return self.input[from..].find(delimiter).map(|i| from + i);
        }
        let mut pos = from;
        while pos < self.input.len() {
            let rest = &self.input[pos..];
            if rest.starts_with(delimiter) {
                return Some(pos);
            }
            let c = rest.chars().next()?;
            if chars::is_quote(c) {
                if let Some(close) = closing_quote(&rest[c.len_utf8()..], c) {
                    pos += c.len_utf8() + close + c.len_utf8();
                    continue;
                }
            }
            pos += c.len_utf8();
        }
        None
    }

    /// Inner content bounds and trim markers between `open` and `close`.
    fn delimited(&self, start: usize, open: &str, close_at: usize) -> (usize, usize, bool, bool) {
        let mut inner_start = start + open.len();
        let mut inner_end = close_at;
        let trim_left = self.input[inner_start..close_at].starts_with('-');
        if trim_left {
            inner_start += 1;
        }
        let trim_right = inner_end > inner_start && self.input[..inner_end].ends_with('-');
        if trim_right {
            inner_end -= 1;
        }
        (inner_start, inner_end, trim_left, trim_right)
    }

    fn read_tag(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let open = self.options.tag_left.as_str();
        let close = self.options.tag_right.as_str();
        let Some(close_at) = self.find_closing(start + open.len(), close, false) else {
            return Err(LexError {
                kind: LexErrorKind::UnterminatedTag {
                    snippet: self.snippet(start),
                },
                span: self.span(start, self.input.len()),
            });
        };
        let (inner_start, inner_end, trim_left, trim_right) =
            self.delimited(start, open, close_at);
        self.pos = close_at + close.len();

        let (name, args_start) = read_tag_name(self.input, inner_start, inner_end);
        Ok(Token {
            kind: TokenKind::Tag {
                name,
                args: args_start..inner_end,
            },
            span: self.span(start, self.pos),
            trim_left: trim_left || self.options.trim_tag_left,
            trim_right: trim_right || self.options.trim_tag_right,
        })
    }

    fn read_output(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let open = self.options.output_left.as_str();
        let close = self.options.output_right.as_str();
        let Some(close_at) = self.find_closing(start + open.len(), close, true) else {
            return Err(LexError {
                kind: LexErrorKind::UnterminatedOutput {
                    snippet: self.snippet(start),
                },
                span: self.span(start, self.input.len()),
            });
        };
        let (inner_start, inner_end, trim_left, trim_right) =
            self.delimited(start, open, close_at);
        self.pos = close_at + close.len();

        Ok(Token {
            kind: TokenKind::Output {
                content: inner_start..inner_end,
            },
            span: self.span(start, self.pos),
            trim_left: trim_left || self.options.trim_output_left,
            trim_right: trim_right || self.options.trim_output_right,
        })
    }

    /// Inside `{% raw %}`: everything up to the next `{% endraw %}` is a
    /// single HTML token, other delimiters included. The `endraw` tag
    /// itself is then read as a normal tag.
    fn read_raw_content(&mut self) -> Result<Token, LexError> {
        let begin = self.pos;
        let open = self.options.tag_left.as_str();
        let mut search = begin;

        while let Some(found) = self.input[search..].find(open) {
            let left = search + found;
            let mut p = left + open.len();
            if self.input[p..].starts_with('-') {
                p += 1;
            }
            p += self.input[p..]
                .chars()
                .take_while(|c| chars::is_blank(*c))
                .map(char::len_utf8)
                .sum::<usize>();
            let rest = &self.input[p..];
            let is_endraw = rest.starts_with("endraw")
                && rest["endraw".len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !chars::is_word(c));
            if is_endraw && self.input[p..].contains(self.options.tag_right.as_str()) {
                if left == begin {
                    self.raw_begin = None;
                    return self.read_tag();
                }
                self.pos = left;
                return Ok(Token {
                    kind: TokenKind::Html { value: begin..left },
                    span: self.span(begin, left),
                    trim_left: false,
                    trim_right: false,
                });
            }
            search = left + open.len();
        }

        let raw_start = self.raw_begin.unwrap_or(begin);
        Err(LexError {
            kind: LexErrorKind::UnterminatedRaw,
            span: self.span(raw_start, self.input.len()),
        })
    }
}

/// Byte offset of the quote closing a string that starts just before
/// `rest`, stepping over backslash escapes.
fn closing_quote(rest: &str, quote: char) -> Option<usize> {
    let mut iter = rest.char_indices();
    while let Some((i, c)) = iter.next() {
        if c == '\\' {
            iter.next();
        } else if c == quote {
            return Some(i);
        }
    }
    None
}

/// Split tag content into its name and the start of its arguments.
/// `#` is a complete name on its own, for inline comments.
fn read_tag_name(input: &str, start: usize, end: usize) -> (String, usize) {
    let content = &input[start..end];
    let skipped = content.len() - content.trim_start_matches(chars::is_blank).len();
    let name_start = start + skipped;
    let rest = &input[name_start..end];
    if rest.starts_with('#') {
        return ("#".to_string(), name_start + 1);
    }
    let len: usize = rest
        .chars()
        .take_while(|c| chars::is_word(*c))
        .map(char::len_utf8)
        .sum();
    (rest[..len].to_string(), name_start + len)
}

/// Split the body of a `{% liquid %}` tag into one tag token per
/// non-blank line.
#[must_use]
pub fn tokenize_liquid_lines(token: &Token) -> Vec<Token> {
    let source = &token.span.source;
    let range = token.inner_range();
    let mut tokens = Vec::new();
    let mut line_start = range.start;

    for line in source.text[range.clone()].split('\n') {
        let line_end = line_start + line.len();
        if !line.trim().is_empty() {
            let (name, args_start) = read_tag_name(&source.text, line_start, line_end);
            let skipped = line.len() - line.trim_start().len();
            tokens.push(Token {
                kind: TokenKind::Tag {
                    name,
                    args: args_start..line_end,
                },
                span: Span::new(source, line_start + skipped..line_end),
                trim_left: false,
                trim_right: false,
            });
        }
        line_start = line_end + 1;
    }

    tokens
}

/// Apply trim flags to neighbouring HTML tokens. Raw blocks are opaque:
/// neither the `raw` tag's right trim nor the `endraw` tag's left trim
/// reaches into the raw content.
fn whitespace_control(tokens: &mut [Token], greedy: bool) {
    let mut in_raw = false;
    for i in 0..tokens.len() {
        if matches!(tokens[i].kind, TokenKind::Html { .. }) {
            continue;
        }
        if !in_raw && tokens[i].trim_left && i > 0 {
            trim_trailing(&mut tokens[i - 1], greedy);
        }
        if tokens[i].is_tag("raw") {
            in_raw = true;
        } else if tokens[i].is_tag("endraw") {
            in_raw = false;
        }
        if !in_raw && tokens[i].trim_right && i + 1 < tokens.len() {
            trim_leading(&mut tokens[i + 1], greedy);
        }
    }
}

fn trim_trailing(token: &mut Token, greedy: bool) {
    let TokenKind::Html { value } = &mut token.kind else {
        return;
    };
    let text = &token.span.source.text[value.clone()];
    let kept = if greedy {
        text.trim_end_matches(chars::is_blank)
    } else {
        text.trim_end_matches(chars::is_inline_blank)
    };
    value.end = value.start + kept.len();
}

fn trim_leading(token: &mut Token, greedy: bool) {
    let TokenKind::Html { value } = &mut token.kind else {
        return;
    };
    let text = &token.span.source.text[value.clone()];
    let mut kept = if greedy {
        text.trim_start_matches(chars::is_blank)
    } else {
        text.trim_start_matches(chars::is_inline_blank)
    };
    if !greedy {
        kept = kept.strip_prefix('\n').unwrap_or(kept);
    }
    value.start = value.end - kept.len();
}
