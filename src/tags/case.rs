use crate::context::Context;
use crate::error::Error;
use crate::expression::{Expression, ValueExpr};
use crate::parser::{ParseEvent, ParseStream, not_closed};
use crate::render::{Emitter, Node, render_templates};
use crate::token::{Span, Token};
use crate::tokenizer::Tokenizer;

#[derive(Debug)]
pub struct When {
    pub values: Vec<ValueExpr>,
    pub body: Vec<Node>,
}

/// `{% case x %}{% when a, b or c %}...{% else %}...{% endcase %}`
///
/// Every matching `when` renders; `else` renders only when none did.
#[derive(Debug)]
pub struct Case {
    pub value: Expression,
    pub whens: Vec<When>,
    pub otherwise: Option<Vec<Node>>,
    pub span: Span,
}

fn read_when_values(token: &Token) -> Result<Vec<ValueExpr>, Error> {
    let mut tokenizer = Tokenizer::for_token(token);
    let mut values = Vec::new();
    loop {
        let Some(value) = tokenizer.read_value()? else {
            return Err(tokenizer.error("expected value in when"));
        };
        values.push(value);
        tokenizer.skip_blank();
        if !(tokenizer.eat(",") || tokenizer.eat_word("or")) {
            break;
        }
    }
    tokenizer.expect_end()?;
    Ok(values)
}

impl Case {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let mut tokenizer = Tokenizer::for_token(token);
        let value = tokenizer.read_expression()?;
        if value.is_empty() {
            return Err(tokenizer.error("expected value in case"));
        }
        tokenizer.expect_end()?;

        let mut whens: Vec<When> = Vec::new();
        let mut otherwise: Option<Vec<Node>> = None;
        loop {
            match stream.next_event(&["when", "else", "endcase"])? {
                ParseEvent::End => return Err(not_closed(token)),
                ParseEvent::Node(node) => {
                    // content before the first `when` never renders
                    if let Some(body) = otherwise.as_mut() {
                        body.push(node);
                    } else if let Some(when) = whens.last_mut() {
                        when.body.push(node);
                    }
                }
                ParseEvent::Tag(tag) => {
                    if tag.is_tag("endcase") {
                        break;
                    }
                    if otherwise.is_some() {
                        return Err(Tokenizer::for_token(&tag)
                            .error(format!("unexpected \"{}\" after else", tag.name().unwrap_or(""))));
                    }
                    if tag.is_tag("when") {
                        whens.push(When {
                            values: read_when_values(&tag)?,
                            body: Vec::new(),
                        });
                    } else {
                        Tokenizer::for_token(&tag).expect_end()?;
                        otherwise = Some(Vec::new());
                    }
                }
            }
        }

        Ok(Self {
            value,
            whens,
            otherwise,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let target = self.value.evaluate(ctx, false)?;
        let mut matched = false;
        for when in &self.whens {
            let mut hit = false;
            for candidate in &when.values {
                if candidate.evaluate(ctx, false)?.equals(&target) {
                    hit = true;
                    break;
                }
            }
            if hit {
                matched = true;
                render_templates(&when.body, ctx, out).await?;
            }
        }
        match &self.otherwise {
            Some(body) if !matched => render_templates(body, ctx, out).await,
            _ => Ok(()),
        }
    }
}
