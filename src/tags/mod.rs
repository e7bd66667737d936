//! Built-in tags, one module per tag family.

pub mod assign;
pub mod capture;
pub mod case;
pub mod comment;
pub mod conditional;
pub mod counter;
pub mod cycle;
pub mod echo;
pub mod for_loop;
pub mod layout;
pub mod liquid_tag;
pub mod partial;
pub mod raw;
pub mod tablerow;

use crate::parser::TagRegistry;
use crate::render::Node;
use crate::tokenizer::Tokenizer;

pub(crate) fn register_builtin(registry: &mut TagRegistry) {
    registry.register("assign", |token, _| Ok(Node::Assign(assign::Assign::parse(token)?)));
    registry.register("capture", |token, stream| {
        Ok(Node::Capture(capture::Capture::parse(token, stream)?))
    });
    registry.register("if", |token, stream| {
        Ok(Node::If(conditional::Conditional::parse(token, stream, false)?))
    });
    registry.register("unless", |token, stream| {
        Ok(Node::Unless(conditional::Conditional::parse(token, stream, true)?))
    });
    registry.register("case", |token, stream| Ok(Node::Case(case::Case::parse(token, stream)?)));
    registry.register("for", |token, stream| {
        Ok(Node::For(for_loop::For::parse(token, stream)?))
    });
    registry.register("tablerow", |token, stream| {
        Ok(Node::Tablerow(tablerow::Tablerow::parse(token, stream)?))
    });
    registry.register("cycle", |token, _| Ok(Node::Cycle(cycle::Cycle::parse(token)?)));
    registry.register("increment", |token, _| {
        Ok(Node::Increment(counter::Counter::parse(token)?))
    });
    registry.register("decrement", |token, _| {
        Ok(Node::Decrement(counter::Counter::parse(token)?))
    });
    registry.register("break", |token, _| {
        no_arguments(token)?;
        Ok(Node::Break(token.span.clone()))
    });
    registry.register("continue", |token, _| {
        no_arguments(token)?;
        Ok(Node::Continue(token.span.clone()))
    });
    registry.register("echo", |token, _| Ok(Node::Echo(echo::Echo::parse(token)?)));
    registry.register("include", |token, stream| {
        Ok(Node::Include(partial::Include::parse(token, stream)?))
    });
    registry.register("render", |token, stream| {
        Ok(Node::Render(partial::RenderPartial::parse(token, stream)?))
    });
    registry.register("layout", |token, stream| {
        Ok(Node::Layout(layout::Layout::parse(token, stream)?))
    });
    registry.register("block", |token, stream| {
        Ok(Node::Block(layout::Block::parse(token, stream)?))
    });
    registry.register("raw", |token, stream| Ok(Node::Raw(raw::Raw::parse(token, stream)?)));
    registry.register("comment", comment::parse_block);
    registry.register("#", comment::parse_inline);
    registry.register("liquid", |token, stream| {
        Ok(Node::Liquid(liquid_tag::LiquidTag::parse(token, stream)?))
    });
}

fn no_arguments(token: &crate::token::Token) -> Result<(), crate::error::Error> {
    Tokenizer::for_token(token).expect_end()
}
