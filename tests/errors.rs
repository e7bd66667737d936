//! Error kinds, locations and aggregation.

mod common;

use std::time::Duration;

use common::{engine, register_repeat, try_render};
use liquid_rs::context::Context;
use liquid_rs::options::RenderConfig;
use liquid_rs::render::render_templates;
use liquid_rs::{
    Error, LexErrorKind, LimitKind, Liquid, Options, ParseErrorKind, RenderErrorKind,
    RenderOptions, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn strict() -> Liquid {
    Liquid::new(Options {
        strict_variables: true,
        ..Options::default()
    })
}

fn render_kind(err: &Error) -> &RenderErrorKind {
    match err {
        Error::Render(e) => &e.kind,
        other => panic!("expected render error, got {other:?}"),
    }
}

// -----------------------------------------------------------
// Lex and parse errors.
// -----------------------------------------------------------

#[test]
fn unterminated_output() {
    let err = engine().parse("ab\n  {{ x", None).unwrap_err();
    let Error::Lex(lex) = &err else {
        panic!("expected lex error, got {err:?}");
    };
    assert!(matches!(lex.kind, LexErrorKind::UnterminatedOutput { .. }));
    assert_eq!(lex.span.line_column(), (2, 3));
}

#[test]
fn unknown_tag_location_and_excerpt() {
    let err = engine()
        .parse("{% if a %}\n{% bogus %}\n{% endif %}", Some("page.liquid"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "tag \"bogus\" not found at line 2, column 1 in page.liquid"
    );
    assert_eq!(
        err.excerpt().expect("excerpt"),
        "   1| {% if a %}\n>> 2| {% bogus %}\n      ^\n   3| {% endif %}"
    );
}

#[test]
fn unclosed_block_names_open_tag() {
    let err = engine().parse("{% for x in y %}body", None).unwrap_err();
    assert!(matches!(
        &err,
        Error::Parse(e) if matches!(&e.kind, ParseErrorKind::TagNotClosed { tag } if tag == "{% for x in y %}")
    ));
}

#[test]
fn misplaced_branch_tags() {
    for text in ["{% else %}", "{% endfor %}", "{% when 1 %}"] {
        let err = engine().parse(text, None).unwrap_err();
        assert!(
            matches!(&err, Error::Parse(e) if matches!(e.kind, ParseErrorKind::UnexpectedTag { .. })),
            "{text}: {err:?}"
        );
    }
}

#[test]
fn else_after_else_is_rejected() {
    assert!(
        engine()
            .parse("{% if a %}1{% else %}2{% else %}3{% endif %}", None)
            .is_err()
    );
    assert!(
        engine()
            .parse("{% if a %}1{% else %}2{% elsif b %}3{% endif %}", None)
            .is_err()
    );
}

#[test]
fn invalid_expressions() {
    for text in ["{% if 1 == %}{% endif %}", "{% assign = 1 %}", "{{ a b }}"] {
        assert!(engine().parse(text, None).is_err(), "{text} should not parse");
    }
}

#[test]
fn inline_comment_lines_need_hash() {
    assert!(engine().parse("{% # one\n two %}", None).is_err());
}

#[test]
fn parse_limit_applies_per_source() {
    let engine = Liquid::new(Options {
        parse_limit: Some(10),
        ..Options::default()
    });
    assert!(engine.parse("short", None).is_ok());
    let err = engine.parse("definitely too long", None).unwrap_err();
    assert!(matches!(&err, Error::LimitExceeded(e) if e.kind == LimitKind::Parse));
}

// -----------------------------------------------------------
// Strict variables and filters.
// -----------------------------------------------------------

#[test]
fn strict_variables_name_the_path() {
    let err = try_render(&strict(), "{{ missing.path }}", json!({})).unwrap_err();
    assert_eq!(
        render_kind(&err),
        &RenderErrorKind::UndefinedVariable {
            path: "missing".to_string(),
            expression: "missing.path".to_string(),
        }
    );
    assert!(err.to_string().contains("missing.path"), "{err}");
}

#[test]
fn strict_variables_failing_segment() {
    let err = try_render(&strict(), "{{ a.b.c }}", json!({"a": {"x": 1}})).unwrap_err();
    assert_eq!(
        render_kind(&err),
        &RenderErrorKind::UndefinedVariable {
            path: "a.b".to_string(),
            expression: "a.b.c".to_string(),
        }
    );
}

#[test]
fn non_strict_renders_empty() {
    assert_eq!(try_render(&engine(), "{{ missing.path }}", json!({})), Ok(String::new()));
}

#[test]
fn strict_per_render_override() {
    let engine = engine();
    let template = engine.parse("{{ nope }}", None).expect("parse");
    let options = RenderOptions {
        strict_variables: Some(true),
        ..RenderOptions::default()
    };
    assert!(engine.render_with(&template, json!({}), options).is_err());
    assert_eq!(engine.render(&template, json!({})), Ok(String::new()));
}

#[test]
fn lenient_if_tolerates_undefined_condition() {
    let mut engine = Liquid::new(Options {
        strict_variables: true,
        lenient_if: true,
        ..Options::default()
    });
    engine.register_filter_fn("default", |input, args, _ctx| {
        if input.is_truthy() {
            Ok(input)
        } else {
            Ok(args.get(0).cloned().unwrap_or_default())
        }
    });
    assert_eq!(
        try_render(&engine, "{% if missing %}y{% else %}n{% endif %}", json!({})),
        Ok("n".to_string())
    );
    assert_eq!(
        try_render(&engine, "{{ missing | default: 'd' }}", json!({})),
        Ok("d".to_string())
    );
    assert!(try_render(&engine, "{% if missing == 1 %}{% endif %}", json!({})).is_err());
}

#[test]
fn strict_filters() {
    let engine = Liquid::new(Options {
        strict_filters: true,
        ..Options::default()
    });
    let err = try_render(&engine, "{{ 'x' | nope }}", json!({})).unwrap_err();
    assert_eq!(
        render_kind(&err),
        &RenderErrorKind::UndefinedFilter {
            name: "nope".to_string()
        }
    );
}

#[test]
fn filter_errors_carry_filter_name() {
    let mut engine = engine();
    engine.register_filter_fn("fail", |_input, _args, _ctx| Err(Error::custom("bad input")));
    let err = try_render(&engine, "ok {{ 1 | fail }}", json!({})).unwrap_err();
    assert_eq!(err.to_string(), "filter fail: bad input at line 1, column 4");
}

// -----------------------------------------------------------
// catchAllErrors.
// -----------------------------------------------------------

#[test]
fn catch_all_collects_every_node_error() {
    let engine = Liquid::new(Options {
        strict_variables: true,
        catch_all_errors: true,
        ..Options::default()
    });
    let err = try_render(&engine, "{{ a }}ok{% if true %}{{ b }}{% endif %}", json!({})).unwrap_err();
    let Error::Aggregate(errors) = &err else {
        panic!("expected aggregate, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, Error::Render(_))));
    assert!(err.to_string().starts_with("2 render errors: "), "{err}");
}

#[test]
fn limits_are_never_aggregated() {
    let mut engine = Liquid::new(Options {
        strict_variables: true,
        catch_all_errors: true,
        memory_limit: Some(5),
        ..Options::default()
    });
    register_repeat(&mut engine);
    let err = try_render(&engine, "{{ a }}{{ 'abc' | repeat: 3 }}{{ b }}", json!({})).unwrap_err();
    assert!(err.is_limit(), "{err:?}");
}

// -----------------------------------------------------------
// Resource limits.
// -----------------------------------------------------------

#[test]
fn memory_limit_stops_filter_output() {
    let mut engine = Liquid::new(Options {
        memory_limit: Some(8),
        ..Options::default()
    });
    register_repeat(&mut engine);
    let template = engine
        .parse("before|{{ 'abc' | repeat: 3 }}|after", None)
        .expect("parse");

    let config = RenderConfig::new(engine.options(), &RenderOptions::default());
    let mut ctx = Context::new(&engine, config, Value::Nil, false);
    let mut out = String::new();
    let err = pollster::block_on(render_templates(&template.nodes, &mut ctx, &mut out)).unwrap_err();
    assert!(matches!(&err, Error::LimitExceeded(e) if e.kind == LimitKind::Memory));
    assert_eq!(out, "before|");
}

#[test]
fn memory_limit_covers_ranges_and_loops() {
    let engine = Liquid::new(Options {
        memory_limit: Some(100),
        ..Options::default()
    });
    assert!(try_render(&engine, "{% for i in (1..40) %}{% endfor %}", json!({})).is_ok());
    let err = try_render(&engine, "{% for i in (1..1000000000) %}{% endfor %}", json!({})).unwrap_err();
    assert!(err.is_limit());
}

#[test]
fn memory_limit_covers_captured_text() {
    let engine = Liquid::new(Options {
        memory_limit: Some(10),
        ..Options::default()
    });
    assert_eq!(
        try_render(&engine, "{% capture c %}short{% endcapture %}{{ c }}", json!({})),
        Ok("short".to_string())
    );
    let err = try_render(
        &engine,
        "{% capture c %}far too long for it{% endcapture %}",
        json!({}),
    )
    .unwrap_err();
    assert!(matches!(&err, Error::LimitExceeded(e) if e.kind == LimitKind::Memory));
}

#[test]
fn render_limit_is_checked_between_nodes() {
    let mut engine = Liquid::new(Options {
        render_limit: Some(1),
        ..Options::default()
    });
    engine.register_filter_fn("sleep", |input, _args, _ctx| {
        std::thread::sleep(Duration::from_millis(5));
        Ok(input)
    });
    let err = try_render(&engine, "{{ 1 | sleep }}{{ 2 }}", json!({})).unwrap_err();
    assert!(matches!(&err, Error::LimitExceeded(e) if e.kind == LimitKind::Render));
}

#[test]
fn spawned_render_shares_budget() {
    let fs = common::memory_fs(&[
        ("page.liquid", "{% render 'big' %}{% render 'big' %}"),
        ("big.liquid", "{% for i in (1..6) %}{% endfor %}"),
    ]);
    let options = Options {
        memory_limit: Some(30),
        ..common::liquid_options()
    };
    let engine = Liquid::with_fs(options, std::sync::Arc::new(fs));
    assert!(engine.render_file("page", json!({})).is_ok());

    let options = Options {
        memory_limit: Some(20),
        ..common::liquid_options()
    };
    let fs = common::memory_fs(&[
        ("page.liquid", "{% render 'big' %}{% render 'big' %}"),
        ("big.liquid", "{% for i in (1..6) %}{% endfor %}"),
    ]);
    let engine = Liquid::with_fs(options, std::sync::Arc::new(fs));
    assert!(engine.render_file("page", json!({})).unwrap_err().is_limit());
}
