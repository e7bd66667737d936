use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::lexer::tokenize_source;
use crate::limiter::{LimitKind, Limiter};
use crate::options::Options;
use crate::render::{Node, Output};
use crate::tags;
use crate::token::{Source, Span, Token, TokenKind};

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No tag registered under this name.
    UnknownTag { name: String },
    /// A branch or end tag outside the block it belongs to.
    UnexpectedTag { name: String },
    /// Block tag whose end tag never appears.
    TagNotClosed { tag: String },
    /// Malformed tag arguments.
    InvalidSyntax { message: String },
    /// Operators without their operands.
    InvalidExpression { text: String },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag { name } => write!(f, "tag \"{name}\" not found"),
            Self::UnexpectedTag { name } => write!(f, "unexpected tag \"{name}\""),
            Self::TagNotClosed { tag } => write!(f, "tag {tag} not closed"),
            Self::InvalidSyntax { message } => f.write_str(message),
            Self::InvalidExpression { text } => write!(f, "invalid expression \"{text}\""),
        }
    }
}

/// Error produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {}", span.location())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// A parsed template: its node tree and the source it was cut from.
#[derive(Debug)]
pub struct Template {
    pub nodes: Vec<Node>,
    pub source: Arc<Source>,
}

impl Template {
    /// File name given at parse time.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.source.name.as_deref()
    }
}

/// Builds a node from a tag token, consuming body tokens from the
/// stream as needed.
pub type TagParser = fn(&Token, &mut ParseStream<'_>) -> Result<Node, Error>;

/// Tag name to parser table, consulted once per tag at parse time.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    parsers: HashMap<String, TagParser>,
}

impl TagRegistry {
    /// Registry holding every built-in tag.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        tags::register_builtin(&mut registry);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, parser: TagParser) {
        self.parsers.insert(name.into(), parser);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<TagParser> {
        self.parsers.get(name).copied()
    }
}

pub struct Parser<'a> {
    options: &'a Options,
    tags: &'a TagRegistry,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub const fn new(options: &'a Options, tags: &'a TagRegistry) -> Self {
        Self { options, tags }
    }

    #[must_use]
    pub const fn options(&self) -> &'a Options {
        self.options
    }

    /// Parse template text. `file` names the source in diagnostics and
    /// anchors relative partial references.
    ///
    /// # Errors
    ///
    /// Returns a lex, parse or parse-limit error.
    pub fn parse(&self, text: &str, file: Option<&str>) -> Result<Template, Error> {
        let source = Source::new(file, text);
        let nodes = self.parse_source(&source)?;
        Ok(Template { nodes, source })
    }

    pub(crate) fn parse_source(&self, source: &Arc<Source>) -> Result<Vec<Node>, Error> {
        Limiter::new(LimitKind::Parse, self.options.parse_limit).charge(source.text.len())?;
        let tokens = tokenize_source(source, &self.options.lex_options())?;
        tracing::trace!(file = ?source.name, tokens = tokens.len(), "tokenized");
        ParseStream::new(self, tokens).parse_rest()
    }
}

/// What [`ParseStream::next_event`] produced.
#[derive(Debug)]
pub enum ParseEvent {
    /// A node for the current body.
    Node(Node),
    /// One of the requested stop tags, handed back unparsed.
    Tag(Token),
    /// No tokens left.
    End,
}

/// Token queue shared by a tag and the tags nested in its body.
pub struct ParseStream<'p> {
    parser: &'p Parser<'p>,
    tokens: VecDeque<Token>,
}

impl<'p> ParseStream<'p> {
    #[must_use]
    pub fn new(parser: &'p Parser<'p>, tokens: impl Into<VecDeque<Token>>) -> Self {
        Self {
            parser,
            tokens: tokens.into(),
        }
    }

    #[must_use]
    pub const fn parser(&self) -> &'p Parser<'p> {
        self.parser
    }

    #[must_use]
    pub const fn options(&self) -> &'p Options {
        self.parser.options
    }

    /// Raw access for tags whose body is not parsed, such as `comment`.
    pub fn next_token(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    /// Advance one step. Tags named in `stops` are returned as-is for
    /// the enclosing tag to handle; anything else is parsed, nested
    /// blocks included.
    pub fn next_event(&mut self, stops: &[&str]) -> Result<ParseEvent, Error> {
        let Some(token) = self.tokens.pop_front() else {
            return Ok(ParseEvent::End);
        };
        if token.name().is_some_and(|name| stops.contains(&name)) {
            return Ok(ParseEvent::Tag(token));
        }
        self.parse_token(&token).map(ParseEvent::Node)
    }

    /// Parse the body of `open` up to the first of `stops`.
    ///
    /// # Errors
    ///
    /// Fails with `TagNotClosed` on `open` if the tokens run out first.
    pub fn read_until(&mut self, open: &Token, stops: &[&str]) -> Result<(Vec<Node>, Token), Error> {
        let mut nodes = Vec::new();
        loop {
            match self.next_event(stops)? {
                ParseEvent::Node(node) => nodes.push(node),
                ParseEvent::Tag(stop) => return Ok((nodes, stop)),
                ParseEvent::End => return Err(not_closed(open)),
            }
        }
    }

    /// Parse every remaining token.
    pub fn parse_rest(&mut self) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        loop {
            match self.next_event(&[])? {
                ParseEvent::Node(node) => nodes.push(node),
                ParseEvent::Tag(_) | ParseEvent::End => return Ok(nodes),
            }
        }
    }

    pub fn parse_token(&mut self, token: &Token) -> Result<Node, Error> {
        match &token.kind {
            TokenKind::Html { .. } => Ok(Node::Html(
                token.html_value().unwrap_or_default().to_string(),
            )),
            TokenKind::Output { .. } => Ok(Node::Output(Output::parse(token)?)),
            TokenKind::Tag { name, .. } => match self.parser.tags.get(name) {
                Some(parse) => parse(token, self),
                None => Err(misplaced(name, &token.span)),
            },
        }
    }
}

/// Error for a tag token nobody claimed.
fn misplaced(name: &str, span: &Span) -> Error {
    let branch = matches!(name, "else" | "elsif" | "when") || name.starts_with("end");
    let kind = if branch {
        ParseErrorKind::UnexpectedTag {
            name: name.to_string(),
        }
    } else {
        ParseErrorKind::UnknownTag {
            name: name.to_string(),
        }
    };
    ParseError {
        kind,
        span: span.clone(),
    }
    .into()
}

/// `TagNotClosed` located on the opening tag.
#[must_use]
pub fn not_closed(open: &Token) -> Error {
    ParseError {
        kind: ParseErrorKind::TagNotClosed {
            tag: open.text().to_string(),
        },
        span: open.span.clone(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Template, Error> {
        let options = Options::default();
        let tags = TagRegistry::builtin();
        Parser::new(&options, &tags).parse(text, None)
    }

    fn parse_kind(text: &str) -> ParseErrorKind {
        match parse(text) {
            Err(Error::Parse(e)) => e.kind,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn html_and_output_nodes() {
        let t = parse("a{{ b }}c").expect("should parse");
        assert_eq!(t.nodes.len(), 3);
        assert!(matches!(t.nodes[1], Node::Output(_)));
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(
            parse_kind("{% bogus %}"),
            ParseErrorKind::UnknownTag {
                name: "bogus".to_string()
            }
        );
    }

    #[test]
    fn stray_end_tag() {
        assert_eq!(
            parse_kind("{% endif %}"),
            ParseErrorKind::UnexpectedTag {
                name: "endif".to_string()
            }
        );
    }

    #[test]
    fn unclosed_block() {
        let err = parse("x\n{% if a %}y").unwrap_err();
        assert_eq!(err.to_string(), "tag {% if a %} not closed at line 2, column 1");
    }

    #[test]
    fn parse_limit() {
        let options = Options {
            parse_limit: Some(4),
            ..Options::default()
        };
        let tags = TagRegistry::builtin();
        let err = Parser::new(&options, &tags)
            .parse("hello", None)
            .unwrap_err();
        assert!(err.is_limit());
    }
}
