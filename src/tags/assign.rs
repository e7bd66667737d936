use crate::context::Context;
use crate::error::Error;
use crate::expression::FilteredValue;
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

/// `{% assign name = value | filters %}`
#[derive(Debug)]
pub struct Assign {
    pub key: String,
    pub value: FilteredValue,
    pub span: Span,
}

impl Assign {
    pub fn parse(token: &Token) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let key = tokenizer
            .read_identifier()
            .ok_or_else(|| tokenizer.error("expected variable name in assign"))?;
        tokenizer.skip_blank();
        if !tokenizer.eat("=") {
            return Err(tokenizer.error("expected \"=\" in assign"));
        }
        let value = tokenizer.read_filtered_value()?;
        if value.initial.is_empty() {
            return Err(tokenizer.error("expected value in assign"));
        }
        tokenizer.expect_end()?;
        Ok(Self {
            key,
            value,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let value = self.value.value(ctx, false).await?;
        ctx.bottom_mut().insert(self.key.clone(), value);
        Ok(())
    }
}
