use crate::error::Error;
use crate::lexer::tokenize_liquid_lines;
use crate::parser::ParseStream;
use crate::render::Node;
use crate::token::{Span, Token};

/// `{% liquid %}`: one tag per line, no delimiters.
#[derive(Debug)]
pub struct LiquidTag {
    pub body: Vec<Node>,
    pub span: Span,
}

impl LiquidTag {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let tokens = tokenize_liquid_lines(token);
        let body = ParseStream::new(stream.parser(), tokens).parse_rest()?;
        Ok(Self {
            body,
            span: token.span.clone(),
        })
    }
}
