//! `if` and `unless`.

use crate::context::Context;
use crate::error::Error;
use crate::expression::Expression;
use crate::parser::{ParseEvent, ParseStream, not_closed};
use crate::render::{Emitter, Node, render_templates};
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

#[derive(Debug)]
pub struct Branch {
    pub condition: Expression,
    pub body: Vec<Node>,
}

/// Ordered branches plus an optional `else` body. For `unless` only
/// the first condition is negated; `elsif` branches test as written.
#[derive(Debug)]
pub struct Conditional {
    pub branches: Vec<Branch>,
    pub otherwise: Option<Vec<Node>>,
    pub negate: bool,
    pub span: Span,
}

fn read_condition(token: &Token) -> Result<Expression, Error> {
    let mut tokenizer = Tokenizer::for_token(token);
    let condition = tokenizer.read_expression()?;
    if condition.is_empty() {
        return Err(tokenizer.error(format!(
            "expected condition in {}",
            token.name().unwrap_or("if")
        )));
    }
    tokenizer.expect_end()?;
    Ok(condition)
}

impl Conditional {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>, negate: bool) -> Result<Self, Error> {
        let end = if negate { "endunless" } else { "endif" };
        let mut branches = Vec::new();
        let mut pending = Some(read_condition(token)?);
        let mut body = Vec::new();
        let mut otherwise = None;

        loop {
            match stream.next_event(&["elsif", "else", end])? {
                ParseEvent::Node(node) => body.push(node),
                ParseEvent::End => return Err(not_closed(token)),
                ParseEvent::Tag(tag) => {
                    let finished = std::mem::take(&mut body);
                    match pending.take() {
                        Some(condition) => branches.push(Branch {
                            condition,
                            body: finished,
                        }),
                        None if otherwise.is_none() => otherwise = Some(finished),
                        None => {}
                    }
                    if tag.is_tag(end) {
                        break;
                    }
                    if otherwise.is_some() {
                        return Err(Tokenizer::for_token(&tag)
                            .error(format!("unexpected \"{}\" after else", tag.name().unwrap_or(""))));
                    }
                    if tag.is_tag("elsif") {
                        pending = Some(read_condition(&tag)?);
                    } else {
                        Tokenizer::for_token(&tag).expect_end()?;
                    }
                }
            }
        }

        Ok(Self {
            branches,
            otherwise,
            negate,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let lenient = ctx.config().lenient_if;
        for (i, branch) in self.branches.iter().enumerate() {
            let negate = self.negate && i == 0;
            if branch.condition.is_truthy(ctx, lenient)? != negate {
                return render_templates(&branch.body, ctx, out).await;
            }
        }
        match &self.otherwise {
            Some(body) => render_templates(body, ctx, out).await,
            None => Ok(()),
        }
    }
}
