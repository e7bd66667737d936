//! `for` loops and the collection helpers shared with `tablerow`.

use std::borrow::Cow;

use crate::context::{Context, Interrupt};
use crate::error::Error;
use crate::expression::{Hash, ValueExpr};
use crate::parser::ParseStream;
use crate::render::{Emitter, Node, render_templates};
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;
use crate::value::{Object, Value};

/// `{% for item in collection reversed offset:n limit:n %}`
#[derive(Debug)]
pub struct For {
    pub variable: String,
    pub collection: ValueExpr,
    pub modifiers: Hash,
    pub body: Vec<Node>,
    pub otherwise: Option<Vec<Node>>,
    pub span: Span,
}

/// Header shared by `for` and `tablerow`: `var in collection hash`.
pub(crate) fn read_header(token: &Token) -> Result<(String, ValueExpr, Hash), Error> {
    let mut tokenizer = Tokenizer::for_token(token);
    let tag = token.name().unwrap_or("for");
    let variable = tokenizer
        .read_identifier()
        .ok_or_else(|| tokenizer.error(format!("expected variable name in {tag}")))?;
    tokenizer.skip_blank();
    if !tokenizer.eat_word("in") {
        return Err(tokenizer.error(format!("expected \"in\" in {tag}")));
    }
    let collection = tokenizer
        .read_value()?
        .ok_or_else(|| tokenizer.error(format!("expected collection in {tag}")))?;
    let modifiers = tokenizer.read_hash()?;
    tokenizer.expect_end()?;
    Ok((variable, collection, modifiers))
}

/// Items a collection iterates over. Maps yield `[key, value]` pairs,
/// a non-empty string yields itself once, and scalars yield nothing.
pub(crate) fn to_items(value: &Value) -> Vec<Value> {
    match value.to_value().as_ref() {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
            .collect(),
        Value::String(s) if !s.is_empty() => vec![Value::String(s.clone())],
        _ => Vec::new(),
    }
}

/// Non-negative integer modifier, if present.
fn count(modifiers: &Object, key: &str) -> Option<usize> {
    modifiers
        .get(key)
        .and_then(Value::as_integer)
        .map(|n| usize::try_from(n).unwrap_or(0))
}

/// Offset, then limit, then reverse.
pub(crate) fn slice(mut items: Vec<Value>, modifiers: &Object) -> Vec<Value> {
    let offset = count(modifiers, "offset").unwrap_or(0).min(items.len());
    items.drain(..offset);
    if let Some(limit) = count(modifiers, "limit") {
        items.truncate(limit);
    }
    if modifiers.get("reversed").is_some_and(Value::is_truthy) {
        items.reverse();
    }
    items
}

/// Per-iteration loop object.
pub(crate) fn loop_object(index0: usize, length: usize) -> Object {
    let mut object = Object::with_capacity(10);
    object.insert("length".to_string(), Value::from(length));
    object.insert("index".to_string(), Value::from(index0 + 1));
    object.insert("index0".to_string(), Value::from(index0));
    object.insert("rindex".to_string(), Value::from(length - index0));
    object.insert("rindex0".to_string(), Value::from(length - index0 - 1));
    object.insert("first".to_string(), Value::Bool(index0 == 0));
    object.insert("last".to_string(), Value::Bool(index0 + 1 == length));
    object
}

impl For {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let (variable, collection, modifiers) = read_header(token)?;
        let (body, stop) = stream.read_until(token, &["else", "endfor"])?;
        let otherwise = if stop.is_tag("else") {
            Some(stream.read_until(token, &["endfor"])?.0)
        } else {
            None
        };
        Ok(Self {
            variable,
            collection,
            modifiers,
            body,
            otherwise,
            span: token.span.clone(),
        })
    }

    /// Key for `forloop.name` and `offset: continue` bookkeeping.
    fn name(&self) -> String {
        format!("{}-{}", self.variable, self.collection.text())
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let collection = self.collection.evaluate(ctx, false)?;
        let name = self.name();

        // `offset: continue` reads the resume point through a scope
        let resume = ctx.registers().for_offsets.get(&name).copied().unwrap_or(0);
        ctx.push(Object::from_iter([("continue".to_string(), Value::from(resume))]));
        let modifiers = self.modifiers.render(ctx);
        ctx.pop();
        let modifiers = modifiers?;

        let items = to_items(&collection);
        ctx.charge(items.len())?;
        let offset = count(&modifiers, "offset").unwrap_or(0);
        let items = slice(items, &modifiers);
        ctx.registers_mut()
            .for_offsets
            .insert(name.clone(), offset + items.len());

        if items.is_empty() {
            return match &self.otherwise {
                Some(body) => render_templates(body, ctx, out).await,
                None => Ok(()),
            };
        }

        let parent = ctx.find("forloop").map(Cow::into_owned);
        ctx.push(Object::new());
        let result = self.iterate(items, &name, parent, ctx, out).await;
        ctx.pop();
        result
    }

    async fn iterate(
        &self,
        items: Vec<Value>,
        name: &str,
        parent: Option<Value>,
        ctx: &mut Context<'_>,
        out: &mut dyn Emitter,
    ) -> Result<(), Error> {
        let length = items.len();
        for (index0, item) in items.into_iter().enumerate() {
            let mut forloop = loop_object(index0, length);
            forloop.insert("name".to_string(), Value::from(name));
            forloop.insert("parentloop".to_string(), parent.clone().unwrap_or_default());
            let scope = ctx.top_mut();
            scope.insert(self.variable.clone(), item);
            scope.insert("forloop".to_string(), Value::Object(forloop));

            render_templates(&self.body, ctx, out).await?;
            if ctx.take_interrupt() == Some(Interrupt::Break) {
                break;
            }
        }
        Ok(())
    }
}
