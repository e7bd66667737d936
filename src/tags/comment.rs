//! `{% comment %}` blocks and `{% # ... %}` inline comments.

use crate::error::Error;
use crate::parser::{ParseStream, not_closed};
use crate::render::Node;
use crate::token::Token;
use crate::tokenizer::Tokenizer;

/// Skip tokens up to `endcomment` without parsing them. Nested
/// `comment` blocks must balance.
pub fn parse_block(token: &Token, stream: &mut ParseStream<'_>) -> Result<Node, Error> {
    let mut depth = 0usize;
    loop {
        let Some(next) = stream.next_token() else {
            return Err(not_closed(token));
        };
        if next.is_tag("comment") {
            depth += 1;
        } else if next.is_tag("endcomment") {
            if depth == 0 {
                return Ok(Node::Comment);
            }
            depth -= 1;
        }
    }
}

/// Every line of a multi-line inline comment must start with `#`.
pub fn parse_inline(token: &Token, _stream: &mut ParseStream<'_>) -> Result<Node, Error> {
    let text = token.inner_text();
    let mut offset = token.inner_range().start;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 && !line.trim().is_empty() && !line.trim_start().starts_with('#') {
            let start = offset + (line.len() - line.trim_start().len());
            let mut tokenizer = Tokenizer::new(&token.span.source, start..start + line.trim_start().len());
            tokenizer.skip_blank();
            return Err(tokenizer.error("every line of an inline comment must start with '#'"));
        }
        offset += line.len() + 1;
    }
    Ok(Node::InlineComment)
}
