//! `increment` and `decrement`.
//!
//! Counters live in the register map, apart from `assign` variables,
//! and both tags share one counter per name.

use crate::context::Context;
use crate::error::Error;
use crate::render::Emitter;
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

#[derive(Debug)]
pub struct Counter {
    pub variable: String,
    pub span: Span,
}

impl Counter {
    pub fn parse(token: &Token) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let variable = tokenizer.read_identifier().ok_or_else(|| {
            tokenizer.error(format!(
                "expected variable name in {}",
                token.name().unwrap_or("increment")
            ))
        })?;
        tokenizer.expect_end()?;
        Ok(Self {
            variable,
            span: token.span.clone(),
        })
    }

    /// Print the current value, then add one.
    pub fn increment(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let counter = ctx
            .registers_mut()
            .counters
            .entry(self.variable.clone())
            .or_insert(0);
        let shown = *counter;
        *counter += 1;
        out.write_str(&shown.to_string())
    }

    /// Subtract one, then print.
    pub fn decrement(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let counter = ctx
            .registers_mut()
            .counters
            .entry(self.variable.clone())
            .or_insert(0);
        *counter -= 1;
        out.write_str(&counter.to_string())
    }
}
