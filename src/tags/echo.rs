use crate::context::Context;
use crate::error::Error;
use crate::expression::FilteredValue;
use crate::render::Emitter;
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

/// `{% echo value | filters %}`. Like an output but never escaped; an
/// empty `echo` prints nothing.
#[derive(Debug)]
pub struct Echo {
    pub value: FilteredValue,
    pub span: Span,
}

impl Echo {
    pub fn parse(token: &Token) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let value = tokenizer.read_filtered_value()?;
        tokenizer.expect_end()?;
        Ok(Self {
            value,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let value = self.value.value(ctx, false).await?;
        out.write_str(&value.to_output())
    }
}
