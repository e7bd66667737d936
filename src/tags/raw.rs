use crate::error::Error;
use crate::parser::{ParseStream, not_closed};
use crate::token::Token;

/// `{% raw %}...{% endraw %}`: the lexer hands the body over as a
/// single HTML token, delimiters included.
#[derive(Debug)]
pub struct Raw {
    pub text: String,
}

impl Raw {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut text = String::new();
        loop {
            let Some(next) = stream.next_token() else {
                return Err(not_closed(token));
            };
            if next.is_tag("endraw") {
                return Ok(Self { text });
            }
            text.push_str(next.html_value().unwrap_or_else(|| next.text()));
        }
    }
}
