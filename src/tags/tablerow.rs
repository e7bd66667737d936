use crate::context::{Context, Interrupt};
use crate::error::Error;
use crate::expression::{Hash, ValueExpr};
use crate::parser::ParseStream;
use crate::render::{Emitter, Node, render_templates};
use crate::tags::for_loop::{loop_object, read_header, slice, to_items};
use crate::token::{Span, Token};
use crate::value::{Object, Value};

/// `{% tablerow item in collection cols:n offset:n limit:n %}`
///
/// Emits `<tr class="rowN">` rows of `<td class="colN">` cells.
#[derive(Debug)]
pub struct Tablerow {
    pub variable: String,
    pub collection: ValueExpr,
    pub modifiers: Hash,
    pub body: Vec<Node>,
    pub span: Span,
}

fn tablerow_loop(index0: usize, length: usize, cols: usize) -> Object {
    let col0 = index0 % cols;
    let mut object = loop_object(index0, length);
    object.insert("col".to_string(), Value::from(col0 + 1));
    object.insert("col0".to_string(), Value::from(col0));
    object.insert("col_first".to_string(), Value::Bool(col0 == 0));
    object.insert("col_last".to_string(), Value::Bool(col0 + 1 == cols));
    object.insert("row".to_string(), Value::from(index0 / cols + 1));
    object
}

impl Tablerow {
    pub fn parse(token: &Token, stream: &mut ParseStream<'_>) -> Result<Self, Error> {
        let (variable, collection, modifiers) = read_header(token)?;
        let (body, _) = stream.read_until(token, &["endtablerow"])?;
        Ok(Self {
            variable,
            collection,
            modifiers,
            body,
            span: token.span.clone(),
        })
    }

    pub async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        let collection = self.collection.evaluate(ctx, false)?;
        let mut modifiers = self.modifiers.render(ctx)?;
        // tablerow never reverses
        modifiers.shift_remove("reversed");

        let items = to_items(&collection);
        ctx.charge(items.len())?;
        let items = slice(items, &modifiers);
        let length = items.len();
        let cols = modifiers
            .get("cols")
            .and_then(Value::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(length.max(1));

        ctx.push(Object::new());
        let result = self.rows(items, cols, ctx, out).await;
        ctx.pop();
        result?;
        if length > 0 {
            out.write_str("</tr>")?;
        }
        Ok(())
    }

    async fn rows(
        &self,
        items: Vec<Value>,
        cols: usize,
        ctx: &mut Context<'_>,
        out: &mut dyn Emitter,
    ) -> Result<(), Error> {
        let length = items.len();
        for (index0, item) in items.into_iter().enumerate() {
            let tablerowloop = tablerow_loop(index0, length, cols);
            let scope = ctx.top_mut();
            scope.insert(self.variable.clone(), item);
            scope.insert("tablerowloop".to_string(), Value::Object(tablerowloop));

            if index0 % cols == 0 {
                if index0 > 0 {
                    out.write_str("</tr>")?;
                }
                out.write_str(&format!("<tr class=\"row{}\">", index0 / cols + 1))?;
            }
            out.write_str(&format!("<td class=\"col{}\">", index0 % cols + 1))?;
            render_templates(&self.body, ctx, out).await?;
            out.write_str("</td>")?;
            if ctx.take_interrupt() == Some(Interrupt::Break) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_wrap_into_rows() {
        let l = tablerow_loop(4, 5, 2);
        assert_eq!(l["row"], Value::from(3));
        assert_eq!(l["col"], Value::from(1));
        assert_eq!(l["col_first"], Value::Bool(true));
        assert_eq!(l["col_last"], Value::Bool(false));
        assert_eq!(l["last"], Value::Bool(true));
    }
}
