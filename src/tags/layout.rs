//! `layout` and `block`: single-chain template inheritance.
//!
//! A child template's `layout` tag renders the rest of the child in
//! store mode, where each `block` records its body instead of printing
//! it. The layout file then renders in output mode, and each of its
//! blocks prints the most derived stored body, with `block.super`
//! bound to the next body down the chain.

use std::sync::Arc;

use crate::analysis::references_root;
use crate::context::Context;
use crate::error::Error;
use crate::expression::{Hash, ValueExpr};
use crate::loader::LookupType;
use crate::parser::ParseStream;
use crate::render::{Emitter, Node, RenderFuture, render_templates};
use crate::tags::partial::{FileRef, read_file_ref};
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;
use crate::value::{Object, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockMode {
    /// Blocks print their content.
    #[default]
    Output,
    /// Blocks record their content for a layout.
    Store,
}

/// One stored override for a block name.
#[derive(Debug, Clone)]
pub enum BlockLayer {
    /// Pre-rendered child content, used for the anonymous block.
    Html(String),
    Nodes {
        body: Arc<[Node]>,
        /// Whether the body reads `block`, so `block.super` must be
        /// rendered before it.
        uses_super: bool,
    },
}

/// `{% layout file key: value %}` followed by the rest of the template.
#[derive(Debug)]
pub struct Layout {
    /// `None` for `layout none`.
    pub file: Option<FileRef>,
    pub args: Hash,
    pub body: Vec<Node>,
    pub span: Span,
}

impl Layout {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let file = read_file_ref(&mut tokenizer, token, stream)?;
        let args = tokenizer.read_hash()?;
        tokenizer.expect_end()?;
        let body = stream.parse_rest()?;
        Ok(Self {
            file,
            args,
            body,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let Some(file) = &self.file else {
            ctx.registers_mut().block_mode = BlockMode::Output;
            return render_templates(&self.body, ctx, out).await;
        };
        let name = file.render(ctx).await?;
        let layout = ctx
            .engine()
            .load_template(&name, LookupType::Layouts, self.span.file(), ctx.is_sync())
            .await?;

        ctx.registers_mut().block_mode = BlockMode::Store;
        let mut html = String::new();
        render_templates(&self.body, ctx, &mut html).await?;
        let registers = ctx.registers_mut();
        registers
            .blocks
            .entry(String::new())
            .or_insert_with(|| vec![BlockLayer::Html(html)]);
        registers.block_mode = BlockMode::Output;

        let args = self.args.render(ctx)?;
        ctx.push(args);
        let result = render_templates(&layout.nodes, ctx, out).await;
        ctx.pop();
        result
    }
}

/// `{% block name %}...{% endblock %}`. The name may be omitted.
#[derive(Debug)]
pub struct Block {
    pub name: String,
    pub body: Arc<[Node]>,
    pub uses_super: bool,
    pub span: Span,
}

impl Block {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let name = match tokenizer.read_identifier() {
            Some(name) => name,
            None => match tokenizer.read_value()? {
                Some(ValueExpr::Literal {
                    value: Value::String(name),
                    ..
                }) => name,
                Some(_) => return Err(tokenizer.error("expected block name")),
                None => String::new(),
            },
        };
        tokenizer.expect_end()?;
        let (body, _) = stream.read_until(token, &["endblock"])?;
        let uses_super = references_root(&body, "block");
        Ok(Self {
            name,
            body: body.into(),
            uses_super,
            span: token.span.clone(),
        })
    }

    fn layer(&self) -> BlockLayer {
        BlockLayer::Nodes {
            body: Arc::clone(&self.body),
            uses_super: self.uses_super,
        }
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        if ctx.registers().block_mode == BlockMode::Store {
            ctx.registers_mut()
                .blocks
                .entry(self.name.clone())
                .or_default()
                .push(self.layer());
            return Ok(());
        }
        let mut chain = ctx
            .registers()
            .blocks
            .get(&self.name)
            .cloned()
            .unwrap_or_default();
        chain.push(self.layer());
        render_chain(&chain, ctx, out).await
    }
}

/// Render the first layer, with the rest of the chain as its
/// `block.super`.
fn render_chain<'a>(
    chain: &'a [BlockLayer],
    ctx: &'a mut Context<'_>,
    out: &'a mut dyn Emitter,
) -> RenderFuture<'a> {
    Box::pin(async move {
        let Some((first, rest)) = chain.split_first() else {
            return Ok(());
        };
        match first {
            BlockLayer::Html(html) => out.write_str(html),
            BlockLayer::Nodes { body, uses_super } => {
                let mut parent = String::new();
                if *uses_super {
                    render_chain(rest, ctx, &mut parent).await?;
                }
                let block = Object::from_iter([("super".to_string(), Value::String(parent))]);
                ctx.push(Object::from_iter([("block".to_string(), Value::Object(block))]));
                let result = render_templates(body, ctx, out).await;
                ctx.pop();
                result
            }
        }
    })
}
