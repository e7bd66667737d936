//! Node tree and the render loop shared by both drivers.
//!
//! Every render function is `async`. The synchronous driver polls the
//! top-level future once and fails if anything is still pending; the
//! asynchronous driver awaits it. Tags never know which one is running.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll, Waker};

use async_trait::async_trait;

use crate::analysis::Analyzer;
use crate::context::Context;
use crate::error::{Error, RenderErrorKind};
use crate::expression::FilteredValue;
use crate::options::OutputEscape;
use crate::tags::assign::Assign;
use crate::tags::capture::Capture;
use crate::tags::case::Case;
use crate::tags::conditional::Conditional;
use crate::tags::counter::Counter;
use crate::tags::cycle::Cycle;
use crate::tags::echo::Echo;
use crate::tags::for_loop::For;
use crate::tags::layout::{Block, Layout};
use crate::tags::liquid_tag::LiquidTag;
use crate::tags::partial::{Include, RenderPartial};
use crate::tags::raw::Raw;
use crate::tags::tablerow::Tablerow;
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>>;

/// Sink for rendered text.
pub trait Emitter {
    fn write_str(&mut self, s: &str) -> Result<(), Error>;

    /// Called between top-level nodes by streaming renders.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl Emitter for String {
    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.push_str(s);
        Ok(())
    }
}

/// Emitter over any [`io::Write`].
#[derive(Debug)]
pub struct WriteEmitter<W> {
    writer: W,
}

impl<W: io::Write> WriteEmitter<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn io_error(e: &io::Error) -> Error {
    Error::Io {
        path: "<output>".to_string(),
        message: e.to_string(),
    }
}

impl<W: io::Write> Emitter for WriteEmitter<W> {
    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.writer.write_all(s.as_bytes()).map_err(|e| io_error(&e))
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush().map_err(|e| io_error(&e))
    }
}

/// A tag implemented outside this crate. Register a [`TagParser`]
/// returning [`Node::Custom`].
///
/// [`TagParser`]: crate::parser::TagParser
#[async_trait(?Send)]
pub trait Tag: fmt::Debug + Send + Sync {
    async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error>;

    fn span(&self) -> Option<&Span> {
        None
    }

    /// Report variables used and bound by this tag.
    fn analyze(&self, _analyzer: &mut Analyzer) {}
}

/// `{{ value | filters }}`
#[derive(Debug)]
pub struct Output {
    pub value: FilteredValue,
    pub span: Span,
}

impl Output {
    pub fn parse(token: &Token) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let value = tokenizer.read_filtered_value()?;
        tokenizer.expect_end()?;
        Ok(Self {
            value,
            span: token.span.clone(),
        })
    }

    async fn render(&self, ctx: &Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let value = self.value.value(ctx, false).await?;
        if self.value.is_raw() {
            return out.write_str(&value.to_output());
        }
        match &ctx.config().output_escape {
            OutputEscape::None => out.write_str(&value.to_output()),
            OutputEscape::Escape => out.write_str(&escape_html(&value.to_output())),
            OutputEscape::Json => out.write_str(&value.to_json().to_string()),
            OutputEscape::Custom(escape) => out.write_str(&escape(&value.to_output())),
        }
    }
}

/// HTML entity escaping used by `outputEscape: escape`.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// One renderable unit of a parsed template.
#[derive(Debug)]
pub enum Node {
    Html(String),
    Output(Output),
    Assign(Assign),
    Capture(Capture),
    If(Conditional),
    Unless(Conditional),
    Case(Case),
    For(For),
    Tablerow(Tablerow),
    Cycle(Cycle),
    Increment(Counter),
    Decrement(Counter),
    Break(Span),
    Continue(Span),
    Echo(Echo),
    Include(Include),
    Render(RenderPartial),
    Layout(Layout),
    Block(Block),
    Raw(Raw),
    Comment,
    InlineComment,
    Liquid(LiquidTag),
    Custom(Box<dyn Tag>),
}

impl Node {
    /// Source location used to anchor render errors.
    #[must_use]
    pub fn span(&self) -> Option<&Span> {
        match self {
            Self::Html(_) | Self::Comment | Self::InlineComment | Self::Raw(_) => None,
            Self::Output(n) => Some(&n.span),
            Self::Assign(n) => Some(&n.span),
            Self::Capture(n) => Some(&n.span),
            Self::If(n) | Self::Unless(n) => Some(&n.span),
            Self::Case(n) => Some(&n.span),
            Self::For(n) => Some(&n.span),
            Self::Tablerow(n) => Some(&n.span),
            Self::Cycle(n) => Some(&n.span),
            Self::Increment(n) | Self::Decrement(n) => Some(&n.span),
            Self::Break(span) | Self::Continue(span) => Some(span),
            Self::Echo(n) => Some(&n.span),
            Self::Include(n) => Some(&n.span),
            Self::Render(n) => Some(&n.span),
            Self::Layout(n) => Some(&n.span),
            Self::Block(n) => Some(&n.span),
            Self::Liquid(n) => Some(&n.span),
            Self::Custom(tag) => tag.span(),
        }
    }

    /// Render this node. Boxed so nested node lists can recurse.
    pub fn render<'a>(&'a self, ctx: &'a mut Context<'_>, out: &'a mut dyn Emitter) -> RenderFuture<'a> {
        Box::pin(async move {
            match self {
                Self::Html(text) => out.write_str(text),
                Self::Raw(raw) => out.write_str(&raw.text),
                Self::Comment | Self::InlineComment => Ok(()),
                Self::Output(node) => node.render(ctx, out).await,
                Self::Assign(node) => node.render(ctx).await,
                Self::Capture(node) => node.render(ctx).await,
                Self::If(node) | Self::Unless(node) => node.render(ctx, out).await,
                Self::Case(node) => node.render(ctx, out).await,
                Self::For(node) => node.render(ctx, out).await,
                Self::Tablerow(node) => node.render(ctx, out).await,
                Self::Cycle(node) => node.render(ctx, out),
                Self::Increment(node) => node.increment(ctx, out),
                Self::Decrement(node) => node.decrement(ctx, out),
                Self::Break(_) => {
                    ctx.set_interrupt(crate::context::Interrupt::Break);
                    Ok(())
                }
                Self::Continue(_) => {
                    ctx.set_interrupt(crate::context::Interrupt::Continue);
                    Ok(())
                }
                Self::Echo(node) => node.render(ctx, out).await,
                Self::Include(node) => node.render(ctx, out).await,
                Self::Render(node) => node.render(ctx, out).await,
                Self::Layout(node) => node.render(ctx, out).await,
                Self::Block(node) => node.render(ctx, out).await,
                Self::Liquid(node) => render_templates(&node.body, ctx, out).await,
                Self::Custom(tag) => tag.render(ctx, out).await,
            }
        })
    }
}

/// Render `nodes` in order.
///
/// The render deadline is checked before each node. A pending `break`
/// or `continue` stops the sequence so the enclosing loop can see it.
/// Under `catchAllErrors`, failing nodes are skipped and their errors
/// returned together at the end; limit errors always abort.
pub async fn render_templates(
    nodes: &[Node],
    ctx: &mut Context<'_>,
    out: &mut dyn Emitter,
) -> Result<(), Error> {
    render_sequence(nodes, ctx, out, false).await
}

pub(crate) async fn render_sequence(
    nodes: &[Node],
    ctx: &mut Context<'_>,
    out: &mut dyn Emitter,
    flush: bool,
) -> Result<(), Error> {
    let mut errors = Vec::new();
    for node in nodes {
        ctx.session().deadline.check()?;
        if let Err(err) = node.render(ctx, out).await {
            let err = match node.span() {
                Some(span) => err.located(span),
                None => err,
            };
            if err.is_limit() || !ctx.config().catch_all_errors {
                return Err(err);
            }
            match err {
                Error::Aggregate(inner) => errors.extend(inner),
                other => errors.push(other),
            }
        }
        if flush {
            out.flush()?;
        }
        if ctx.is_interrupted() {
            break;
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Aggregate(errors))
    }
}

/// Synchronous driver: poll once, never wait.
pub(crate) fn drive_sync<T>(future: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
    let mut future = std::pin::pin!(future);
    let mut cx = TaskContext::from_waker(Waker::noop());
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(result) => result,
        Poll::Pending => Err(RenderErrorKind::AsyncInSync.into()),
    }
}
