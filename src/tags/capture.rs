use crate::context::Context;
use crate::error::Error;
use crate::expression::ValueExpr;
use crate::parser::ParseStream;
use crate::render::{Node, render_templates};
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// `{% capture name %}...{% endcapture %}`
#[derive(Debug)]
pub struct Capture {
    pub key: String,
    pub body: Vec<Node>,
    pub span: Span,
}

impl Capture {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let key = match tokenizer.read_identifier() {
            Some(key) => key,
            None => match tokenizer.read_value()? {
                Some(ValueExpr::Literal {
                    value: Value::String(key),
                    ..
                }) => key,
                _ => return Err(tokenizer.error("expected variable name in capture")),
            },
        };
        tokenizer.expect_end()?;
        let (body, _) = stream.read_until(token, &["endcapture"])?;
        Ok(Self {
            key,
            body,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        let mut buffer = String::new();
        render_templates(&self.body, ctx, &mut buffer).await?;
        ctx.charge(buffer.len())?;
        ctx.bottom_mut().insert(self.key.clone(), Value::String(buffer));
        Ok(())
    }
}
