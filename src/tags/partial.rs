//! `include` and `render`, plus the file reference syntax they share
//! with `layout`.

use crate::context::Context;
use crate::error::{Error, RenderErrorKind};
use crate::expression::{Hash, ValueExpr};
use crate::loader::LookupType;
use crate::parser::ParseStream;
use crate::render::{Emitter, Node, render_templates};
use crate::tags::for_loop::{loop_object, to_items};
use crate::token::{Source, Span, Token};
use crate::tokenizer::Tokenizer;
use crate::value::{Object, Value};

/// How a tag names the file it loads.
#[derive(Debug)]
pub enum FileRef {
    /// Fixed name.
    Literal(String),
    /// Quoted name containing output or tag markup, rendered first.
    Template(Vec<Node>),
    /// Variable or other value, evaluated at render time.
    Value(ValueExpr),
}

/// Read a file reference. Returns `None` for the keyword `none`.
///
/// With `dynamicPartials`, the name is a value: a quoted string is
/// fixed unless it contains markup, and anything else is evaluated.
/// Without it, the name is the raw text up to the next blank or comma.
pub(crate) fn read_file_ref(
    tokenizer: &mut Tokenizer<'_>,
    token: &Token,
    stream: &ParseStream<'_>,
) -> Result<Option<FileRef>, Error> {
    let options = stream.options();
    if !options.dynamic_partials {
        let Some((name, _)) = tokenizer.read_file_name() else {
            return Err(tokenizer.error("expected file name"));
        };
        if name == "none" {
            return Ok(None);
        }
        let name = name.trim_matches(|c| c == '"' || c == '\'').to_string();
        return Ok(Some(FileRef::Literal(name)));
    }

    tokenizer.skip_blank();
    let start = tokenizer.position();
    if tokenizer.eat_word("none") {
        return Ok(None);
    }
    tokenizer.reset(start);
    match tokenizer.read_value()? {
        Some(ValueExpr::Literal {
            value: Value::String(name),
            ..
        }) => {
            let markup = name.contains(&options.output_delimiter_left)
                || name.contains(&options.tag_delimiter_left);
            if !markup {
                return Ok(Some(FileRef::Literal(name)));
            }
            let source = Source::new(token.span.file(), name);
            let nodes = stream.parser().parse_source(&source)?;
            Ok(Some(FileRef::Template(nodes)))
        }
        Some(value) => Ok(Some(FileRef::Value(value))),
        None => Err(tokenizer.error("expected file name")),
    }
}

impl FileRef {
    /// Name to look up. An empty name is an illegal path.
    pub async fn render(&self, ctx: &mut Context<'_>) -> Result<String, Error> {
        let name = match self {
            Self::Literal(name) => name.clone(),
            Self::Template(nodes) => {
                let mut name = String::new();
                render_templates(nodes, ctx, &mut name).await?;
                name
            }
            Self::Value(expr) => expr.evaluate(ctx, false)?.to_output().into_owned(),
        };
        if name.is_empty() {
            let text = match self {
                Self::Value(expr) => expr.text().to_string(),
                _ => name,
            };
            return Err(RenderErrorKind::IllegalFilePath { text }.into());
        }
        Ok(name)
    }
}

fn required(file: Option<FileRef>, tokenizer: &Tokenizer<'_>) -> Result<FileRef, Error> {
    file.ok_or_else(|| tokenizer.error("illegal file path \"none\""))
}

/// A `with value [as alias]` or `for value [as alias]` clause.
#[derive(Debug)]
pub struct Binding {
    pub value: ValueExpr,
    pub alias: Option<String>,
}

/// Read `keyword value [as alias]` if the input continues with one of
/// `keywords`. A keyword followed by `:` is a hash key and is left.
fn read_binding(tokenizer: &mut Tokenizer<'_>, keywords: &[&str]) -> Result<Option<(String, Binding)>, Error> {
    tokenizer.skip_blank();
    tokenizer.eat(",");
    tokenizer.skip_blank();
    let begin = tokenizer.position();
    let Some(keyword) = tokenizer.read_identifier() else {
        return Ok(None);
    };
    tokenizer.skip_blank();
    if !keywords.contains(&keyword.as_str()) || tokenizer.peek() == Some(':') {
        tokenizer.reset(begin);
        return Ok(None);
    }
    let Some(value) = tokenizer.read_value()? else {
        tokenizer.reset(begin);
        return Ok(None);
    };
    tokenizer.skip_blank();
    let before_as = tokenizer.position();
    let alias = if tokenizer.eat_word("as") {
        Some(
            tokenizer
                .read_identifier()
                .ok_or_else(|| tokenizer.error("expected alias after \"as\""))?,
        )
    } else {
        tokenizer.reset(before_as);
        None
    };
    Ok(Some((keyword, Binding { value, alias })))
}

/// `{% include file [with value [as alias]] key: value %}`
///
/// Renders the partial in the caller's context, so it sees and can
/// assign the caller's variables.
#[derive(Debug)]
pub struct Include {
    pub file: FileRef,
    pub with: Option<Binding>,
    pub hash: Hash,
    pub span: Span,
}

impl Include {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let file = read_file_ref(&mut tokenizer, token, stream)?;
        let file = required(file, &tokenizer)?;
        let with = read_binding(&mut tokenizer, &["with"])?.map(|(_, binding)| binding);
        let hash = tokenizer.read_hash()?;
        tokenizer.expect_end()?;
        Ok(Self {
            file,
            with,
            hash,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let name = self.file.render(ctx).await?;
        let mut scope = self.hash.render(ctx)?;
        if let Some(with) = &self.with {
            let key = with.alias.clone().unwrap_or_else(|| name.clone());
            scope.insert(key, with.value.evaluate(ctx, false)?);
        }
        let template = ctx
            .engine()
            .load_template(&name, LookupType::Partials, self.span.file(), ctx.is_sync())
            .await?;

        let saved = ctx.registers_mut().take_blocks();
        ctx.push(scope);
        let result = render_templates(&template.nodes, ctx, out).await;
        ctx.pop();
        ctx.registers_mut().restore_blocks(saved);
        result
    }
}

/// `{% render file [with value | for value] [as alias] key: value %}`
///
/// Renders the partial in an isolated context holding only the hash,
/// the binding and, for `for`, a `forloop` object.
#[derive(Debug)]
pub struct RenderPartial {
    pub file: FileRef,
    pub with: Option<Binding>,
    pub each: Option<Binding>,
    pub hash: Hash,
    pub span: Span,
}

impl RenderPartial {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let file = read_file_ref(&mut tokenizer, token, stream)?;
        let file = required(file, &tokenizer)?;
        let mut with = None;
        let mut each = None;
        while let Some((keyword, binding)) = read_binding(&mut tokenizer, &["with", "for"])? {
            if keyword == "with" {
                with = Some(binding);
            } else {
                each = Some(binding);
            }
        }
        let hash = tokenizer.read_hash()?;
        tokenizer.expect_end()?;
        Ok(Self {
            file,
            with,
            each,
            hash,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let name = self.file.render(ctx).await?;
        let mut scope: Object = self.hash.render(ctx)?;
        if let Some(with) = &self.with {
            let key = with.alias.clone().unwrap_or_else(|| name.clone());
            scope.insert(key, with.value.evaluate(ctx, false)?);
        }
        let items = match &self.each {
            Some(each) => {
                let items = to_items(&each.value.evaluate(ctx, false)?);
                ctx.charge(items.len())?;
                Some((each, items))
            }
            None => None,
        };
        let template = ctx
            .engine()
            .load_template(&name, LookupType::Partials, self.span.file(), ctx.is_sync())
            .await?;

        let mut child = ctx.spawn(scope);
        let Some((each, items)) = items else {
            return render_templates(&template.nodes, &mut child, out).await;
        };
        let alias = each.alias.clone().unwrap_or_else(|| name.clone());
        let length = items.len();
        for (index0, item) in items.into_iter().enumerate() {
            let mut forloop = loop_object(index0, length);
            forloop.insert("name".to_string(), Value::from(each.value.text()));
            let scope = child.bottom_mut();
            scope.insert(alias.clone(), item);
            scope.insert("forloop".to_string(), Value::Object(forloop));
            render_templates(&template.nodes, &mut child, out).await?;
        }
        Ok(())
    }
}
