use std::fmt;

use crate::lexer::LexError;
use crate::limiter::LimitError;
use crate::parser::ParseError;
use crate::token::Span;

/// Classifies a render-time failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// Strict variables: `path` is the prefix that failed to resolve
    /// within `expression`.
    UndefinedVariable { path: String, expression: String },
    /// Strict filters: filter name not registered.
    UndefinedFilter { name: String },
    /// A filter reported an error.
    Filter { name: String, message: String },
    /// No candidate path exists for a partial or layout.
    PartialNotFound { name: String, roots: Vec<String> },
    /// A file reference evaluated to an empty name.
    IllegalFilePath { text: String },
    /// The synchronous driver met a computation that would suspend.
    AsyncInSync,
    /// Raised by a custom tag or filter.
    Custom(String),
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable { path, expression } if path == expression => {
                write!(f, "undefined variable: {path}")
            }
            Self::UndefinedVariable { path, expression } => {
                write!(f, "undefined variable: {path} in {expression}")
            }
            Self::UndefinedFilter { name } => write!(f, "undefined filter: {name}"),
            Self::Filter { name, message } => write!(f, "filter {name}: {message}"),
            Self::PartialNotFound { name, roots } => {
                write!(f, "failed to lookup \"{name}\" in \"{}\"", roots.join(","))
            }
            Self::IllegalFilePath { text } => write!(f, "illegal file path \"{text}\""),
            Self::AsyncInSync => write!(f, "asynchronous value in synchronous render"),
            Self::Custom(message) => f.write_str(message),
        }
    }
}

/// Error raised while rendering, with the span of the node that failed
/// once it is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub span: Option<Span>,
}

impl RenderError {
    #[must_use]
    pub const fn new(kind: RenderErrorKind) -> Self {
        Self { kind, span: None }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(span) = &self.span {
            write!(f, " at {}", span.location())?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {}

/// Unified error type for every stage of the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A lexer error.
    #[error("{0}")]
    Lex(#[from] LexError),
    /// A parser error.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// A render error.
    #[error("{0}")]
    Render(#[from] RenderError),
    /// A memory, time or parse budget ran out. Never aggregated.
    #[error("{0}")]
    LimitExceeded(#[from] LimitError),
    /// Errors collected under `catchAllErrors`.
    #[error("{} render errors: {}", .0.len(), join(.0))]
    Aggregate(Vec<Error>),
    /// Reading a template file failed.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<RenderErrorKind> for Error {
    fn from(kind: RenderErrorKind) -> Self {
        Self::Render(RenderError::new(kind))
    }
}

impl Error {
    /// Error with a free-form message, for custom tags and filters.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        RenderErrorKind::Custom(message.into()).into()
    }

    /// Source location of the failure, when known.
    #[must_use]
    pub const fn span(&self) -> Option<&Span> {
        match self {
            Self::Lex(e) => Some(&e.span),
            Self::Parse(e) => Some(&e.span),
            Self::Render(e) => e.span.as_ref(),
            Self::LimitExceeded(_) | Self::Aggregate(_) | Self::Io { .. } => None,
        }
    }

    /// Source excerpt around the failure, rendered on demand.
    #[must_use]
    pub fn excerpt(&self) -> Option<String> {
        self.span().map(Span::excerpt)
    }

    #[must_use]
    pub const fn is_limit(&self) -> bool {
        matches!(self, Self::LimitExceeded(_))
    }

    /// Attach `span` to a render error that has no location yet.
    #[must_use]
    pub fn located(self, span: &Span) -> Self {
        match self {
            Self::Render(RenderError { kind, span: None }) => Self::Render(RenderError {
                kind,
                span: Some(span.clone()),
            }),
            other => other,
        }
    }
}
