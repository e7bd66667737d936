use crate::context::Context;
use crate::error::Error;
use crate::expression::ValueExpr;
use crate::render::Emitter;
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

/// `{% cycle 'a', 'b' %}` or `{% cycle group: 'a', 'b' %}`
#[derive(Debug)]
pub struct Cycle {
    pub group: Option<ValueExpr>,
    pub candidates: Vec<ValueExpr>,
    pub span: Span,
}

impl Cycle {
    pub fn parse(token: &Token) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let mut group = None;
        let mut candidates = Vec::new();

        let first = tokenizer.read_value()?;
        tokenizer.skip_blank();
        if tokenizer.eat(":") {
            group = first;
        } else if let Some(first) = first {
            candidates.push(first);
            tokenizer.skip_blank();
            tokenizer.eat(",");
        }
        loop {
            let Some(value) = tokenizer.read_value()? else {
                break;
            };
            candidates.push(value);
            tokenizer.skip_blank();
            if !tokenizer.eat(",") {
                break;
            }
        }
        tokenizer.expect_end()?;
        if candidates.is_empty() {
            return Err(tokenizer.error("expected values in cycle"));
        }
        Ok(Self {
            group,
            candidates,
            span: token.span.clone(),
        })
    }

    /// Position key: the group value plus the candidate texts.
    fn key(&self, ctx: &Context<'_>) -> Result<String, Error> {
        let group = match &self.group {
            Some(group) => group.evaluate(ctx, false)?.to_output().into_owned(),
            None => String::new(),
        };
        let texts: Vec<&str> = self.candidates.iter().map(ValueExpr::text).collect();
        Ok(format!("cycle:{group}:{}", texts.join(",")))
    }

    pub fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let key = self.key(ctx)?;
        let cycles = &mut ctx.registers_mut().cycles;
        let index = cycles.get(&key).copied().unwrap_or(0) % self.candidates.len();
        cycles.insert(key, (index + 1) % self.candidates.len());
        let value = self.candidates[index].evaluate(ctx, false)?;
        out.write_str(&value.to_output())
    }
}
