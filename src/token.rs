use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Template text shared by every token and span cut from it.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub name: Option<String>,
    pub text: String,
}

impl Source {
    #[must_use]
    pub fn new(name: Option<&str>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.map(str::to_string),
            text: text.into(),
        })
    }
}

/// Byte range into a template source.
///
/// Line and column are not stored: they are recovered by scanning the
/// preceding text, and only when an error is actually displayed.
#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    pub source: Arc<Source>,
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(source: &Arc<Source>, range: Range<usize>) -> Self {
        Self {
            source: Arc::clone(source),
            start: range.start,
            end: range.end,
        }
    }

    /// The exact source slice covered by this span.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.source.text[self.start..self.end]
    }

    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.source.name.as_deref()
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// 1-based line and column (in characters) of the span start.
    #[must_use]
    pub fn line_column(&self) -> (usize, usize) {
        let before = &self.source.text[..self.start];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }

    /// Source lines around the span start with a caret under the column.
    ///
    /// ```text
    ///    1| {% if a %}
    /// >> 2| {% bogus %}
    ///       ^
    ///    3| {% endif %}
    /// ```
    #[must_use]
    pub fn excerpt(&self) -> String {
        let (line, column) = self.line_column();
        let lines: Vec<&str> = self.source.text.split('\n').collect();
        let first = line.saturating_sub(2).max(1);
        let last = (line + 2).min(lines.len());
        let width = last.to_string().len();

        let mut out = String::new();
        for number in first..=last {
            if !out.is_empty() {
                out.push('\n');
            }
            let marker = if number == line { ">> " } else { "   " };
            let gutter = format!("{marker}{number:>width$}| ");
            out.push_str(&gutter);
            out.push_str(lines[number - 1]);
            if number == line {
                out.push('\n');
                out.push_str(&" ".repeat(gutter.len() + column - 1));
                out.push('^');
            }
        }
        out
    }

    /// Displayable "line L, column C[ in FILE]" suffix for error messages.
    #[must_use]
    pub const fn location(&self) -> Location<'_> {
        Location(self)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}",
            self.file().unwrap_or("<inline>"),
            self.start,
            self.end
        )
    }
}

/// Lazily formatted position of a [`Span`].
pub struct Location<'a>(&'a Span);

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, column) = self.0.line_column();
        write!(f, "line {line}, column {column}")?;
        if let Some(file) = self.0.file() {
            write!(f, " in {file}")?;
        }
        Ok(())
    }
}

/// Top-level token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text between delimiters. `value` is what remains after
    /// whitespace control trimmed the edges.
    Html { value: Range<usize> },
    /// `{% name args %}`.
    Tag { name: String, args: Range<usize> },
    /// `{{ content }}`.
    Output { content: Range<usize> },
}

/// A single top-level token with its kind, source span, and trim flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub trim_left: bool,
    pub trim_right: bool,
}

impl Token {
    /// Full source text of the token, delimiters included.
    #[must_use]
    pub fn text(&self) -> &str {
        self.span.text()
    }

    /// Tag name, for tag tokens.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Tag { name, .. } => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_tag(&self, tag: &str) -> bool {
        self.name() == Some(tag)
    }

    /// Rendered text of an HTML token after trimming.
    #[must_use]
    pub fn html_value(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Html { value } => Some(&self.span.source.text[value.clone()]),
            _ => None,
        }
    }

    /// Byte range of the expression part: tag arguments or output content.
    #[must_use]
    pub fn inner_range(&self) -> Range<usize> {
        match &self.kind {
            TokenKind::Html { value } => value.clone(),
            TokenKind::Tag { args, .. } => args.clone(),
            TokenKind::Output { content } => content.clone(),
        }
    }

    #[must_use]
    pub fn inner_text(&self) -> &str {
        &self.span.source.text[self.inner_range()]
    }
}
