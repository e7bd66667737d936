//! Synchronous and asynchronous drivers, custom tags and filters.

mod common;

use async_trait::async_trait;
use common::{SlowUpcase, engine, engine_with_files};
use liquid_rs::render::render_templates;
use liquid_rs::{
    Context, Emitter, Error, Liquid, Node, Options, ParseStream, RenderErrorKind, RenderOptions,
    Tag, Token, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const TEMPLATE: &str = "{% assign total = 0 %}\
    {% for item in items %}{% cycle 'odd', 'even' %}:{{ item.name }}\
    {% if item.tags contains 'sale' %}*{% endif %}{% increment n %};{% endfor %}\
    {% capture c %}{{ items.size }}{% endcapture %}[{{ c }}]\
    {% case items.first.name %}{% when 'a' %}A{% else %}?{% endcase %}";

fn data() -> serde_json::Value {
    json!({"items": [
        {"name": "a", "tags": ["sale"]},
        {"name": "b", "tags": []},
        {"name": "c", "tags": ["new", "sale"]},
    ]})
}

// -----------------------------------------------------------
// Driver equivalence
// -----------------------------------------------------------

#[test]
fn sync_and_async_agree() {
    let engine = engine();
    let template = engine.parse(TEMPLATE, None).expect("parse");
    let sync = engine.render(&template, data()).expect("sync render");
    let async_out = pollster::block_on(engine.render_async(&template, data(), RenderOptions::default()))
        .expect("async render");
    assert_eq!(sync, "odd:a*0;even:b1;odd:c*2;[3]A");
    assert_eq!(sync, async_out);
}

#[test]
fn sync_and_async_agree_with_partials() {
    let engine = engine_with_files(&[
        ("page.liquid", "{% layout 'base' %}{% block b %}{% render 'item' for items %}{% endblock %}"),
        ("base.liquid", "<{% block b %}{% endblock %}>"),
        ("item.liquid", "{{ item.name }}"),
    ]);
    let sync = engine.render_file("page", data()).expect("sync render");
    let async_out = pollster::block_on(engine.render_file_async("page", data())).expect("async render");
    assert_eq!(sync, "<abc>");
    assert_eq!(sync, async_out);
}

#[test]
fn templates_render_repeatedly() {
    let engine = engine();
    let template = engine.parse("{% increment n %}{{ x }}", None).expect("parse");
    assert_eq!(engine.render(&template, json!({"x": 1})), Ok("01".to_string()));
    assert_eq!(engine.render(&template, json!({"x": 2})), Ok("02".to_string()));
}

// -----------------------------------------------------------
// Asynchronous filters
// -----------------------------------------------------------

#[test]
fn async_filter_needs_async_driver() {
    let mut engine = engine();
    engine.register_filter("shout", SlowUpcase);
    let template = engine.parse("{{ 'hi' | shout }}", None).expect("parse");

    let err = engine.render(&template, json!({})).unwrap_err();
    assert!(
        matches!(&err, Error::Render(e) if e.kind == RenderErrorKind::AsyncInSync),
        "got {err:?}"
    );

    let out = pollster::block_on(engine.render_async(&template, json!({}), RenderOptions::default()));
    assert_eq!(out, Ok("HI".to_string()));
}

#[test]
fn async_filter_inside_loop() {
    let mut engine = engine();
    engine.register_filter("shout", SlowUpcase);
    let template = engine
        .parse("{% for x in list %}{{ x | shout }}{% endfor %}", None)
        .expect("parse");
    let out = pollster::block_on(engine.render_async(
        &template,
        json!({"list": ["a", "b"]}),
        RenderOptions::default(),
    ));
    assert_eq!(out, Ok("AB".to_string()));
}

// -----------------------------------------------------------
// Custom tags
// -----------------------------------------------------------

/// `{% repeat n %}body{% endrepeat %}`
#[derive(Debug)]
struct Repeat {
    times: usize,
    body: Vec<Node>,
}

#[async_trait(?Send)]
impl Tag for Repeat {
    async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
        for _ in 0..self.times {
            render_templates(&self.body, ctx, out).await?;
        }
        Ok(())
    }
}

fn parse_repeat(token: &Token, stream: &mut ParseStream<'_>) -> Result<Node, Error> {
    let times = token
        .inner_text()
        .trim()
        .parse()
        .map_err(|_| Error::custom("repeat needs a count"))?;
    let (body, _) = stream.read_until(token, &["endrepeat"])?;
    Ok(Node::Custom(Box::new(Repeat { times, body })))
}

#[test]
fn custom_block_tag() {
    let mut engine = Liquid::new(Options::default());
    engine.register_tag("repeat", parse_repeat);
    let out = engine.parse_and_render("{% repeat 3 %}{{ x }}{% endrepeat %}", json!({"x": "ab"}));
    assert_eq!(out, Ok("ababab".to_string()));
}

#[test]
fn custom_tag_sees_registers() {
    #[derive(Debug)]
    struct Hits;

    #[async_trait(?Send)]
    impl Tag for Hits {
        async fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Emitter) -> Result<(), Error> {
            let registers = ctx.registers_mut();
            let hits = registers.get::<u32>("hits").copied().unwrap_or(0) + 1;
            registers.set("hits", hits);
            out.write_str(&hits.to_string())
        }
    }

    let mut engine = Liquid::new(Options::default());
    engine.register_tag("hits", |_token, _stream| Ok(Node::Custom(Box::new(Hits))));
    assert_eq!(
        engine.parse_and_render("{% hits %}{% hits %}{% hits %}", json!({})),
        Ok("123".to_string())
    );
}

#[test]
fn unclosed_custom_block() {
    let mut engine = Liquid::new(Options::default());
    engine.register_tag("repeat", parse_repeat);
    assert!(engine.parse("{% repeat 2 %}x", None).is_err());
}

// -----------------------------------------------------------
// Drops
// -----------------------------------------------------------

#[derive(Debug)]
struct Product;

impl liquid_rs::ObjectLike for Product {
    fn get(&self, key: &str) -> Option<Value> {
        match key {
            "title" => Some(Value::from("Drop")),
            _ => None,
        }
    }
}

#[test]
fn drops_resolve_properties() {
    let engine = engine();
    let template = engine.parse("{{ p.title }}|{{ p.nope }}", None).expect("parse");
    let data: Value = [("p", Value::drop(Product))].into_iter().collect();
    assert_eq!(engine.render(&template, data), Ok("Drop|".to_string()));
}
