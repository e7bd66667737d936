//! Rendering behaviour of the built-in tags and output.

mod common;

use common::{engine, render, try_render};
use liquid_rs::{Liquid, Options, OutputEscape, RenderOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

// -----------------------------------------------------------
// Output and literals.
// -----------------------------------------------------------

#[test]
fn html_only_is_unchanged() {
    let text = "<p>plain text, no markup</p>\n  trailing  ";
    assert_eq!(render(text, json!({})), text);
}

#[test]
fn adjacent_outputs() {
    assert_eq!(render("{{ 1 }}{{ 2 }}", json!({})), "12");
}

#[test]
fn literals_render() {
    assert_eq!(
        render("{{ 'a' }}|{{ \"b\" }}|{{ 1.5 }}|{{ true }}|{{ nil }}|", json!({})),
        "a|b|1.5|true||"
    );
}

#[test]
fn property_chains() {
    let data = json!({"a": {"b": [10, 20, {"c": "deep"}]}, "k": "b"});
    assert_eq!(render("{{ a.b[2].c }}", data.clone()), "deep");
    assert_eq!(render("{{ a.b[-1].c }}", data.clone()), "deep");
    assert_eq!(render("{{ a[k].first }}", data.clone()), "10");
    assert_eq!(render("{{ a.b.size }}", data.clone()), "3");
    assert_eq!(render("{{ a['b'].last.c }}", data), "deep");
}

#[test]
fn missing_variable_is_empty() {
    assert_eq!(render("[{{ missing.path }}]", json!({})), "[]");
}

#[test]
fn ranges_render_as_concatenation() {
    assert_eq!(render("{{ (1..4) }}", json!({})), "1234");
    assert_eq!(render("{% assign n = 3 %}{{ (1..n) }}", json!({})), "123");
}

#[test]
fn whitespace_control() {
    assert_eq!(
        render("a  {%- assign x = 1 -%}  \n b {{- x -}} c", json!({})),
        "ab1c"
    );
}

#[test]
fn unknown_filter_passes_through() {
    assert_eq!(render("{{ 'x' | nope: 1 }}", json!({})), "x");
}

#[test]
fn registered_filter_receives_arguments() {
    let mut engine = engine();
    engine.register_filter_fn("wrap", |input, args, _ctx| {
        let left = args.get(0).map(|v| v.to_output().into_owned()).unwrap_or_default();
        let right = args
            .named("right")
            .map(|v| v.to_output().into_owned())
            .unwrap_or_default();
        Ok(format!("{left}{}{right}", input.to_output()).into())
    });
    let out = try_render(&engine, "{{ name | wrap: '<', right: '>' }}", json!({"name": "n"}));
    assert_eq!(out.expect("render"), "<n>");
}

// -----------------------------------------------------------
// Escaping.
// -----------------------------------------------------------

#[test]
fn output_escape_modes() {
    let escaped = Liquid::new(Options {
        output_escape: OutputEscape::Escape,
        ..Options::default()
    });
    let data = json!({"v": "<b>&</b>"});
    assert_eq!(
        try_render(&escaped, "{{ v }}", data.clone()).expect("render"),
        "&lt;b&gt;&amp;&lt;/b&gt;"
    );
    assert_eq!(
        try_render(&escaped, "{{ v | raw }}", data.clone()).expect("render"),
        "<b>&</b>"
    );

    let json_engine = Liquid::new(Options {
        output_escape: OutputEscape::Json,
        ..Options::default()
    });
    assert_eq!(
        try_render(&json_engine, "{{ v }}", data).expect("render"),
        "\"<b>&</b>\""
    );
}

#[test]
fn render_options_override_escape() {
    let engine = engine();
    let template = engine.parse("{{ v }}", None).expect("parse");
    let options = RenderOptions {
        output_escape: Some(OutputEscape::Escape),
        ..RenderOptions::default()
    };
    let out = engine
        .render_with(&template, json!({"v": "a<b"}), options)
        .expect("render");
    assert_eq!(out, "a&lt;b");
}

// -----------------------------------------------------------
// assign, capture, echo.
// -----------------------------------------------------------

#[test]
fn assign_then_output() {
    assert_eq!(render("{% assign x = 3 %}{{ x }}", json!({})), "3");
}

#[test]
fn assign_with_filters() {
    let mut engine = engine();
    engine.register_filter_fn("upcase", |input, _args, _ctx| {
        Ok(input.to_output().to_uppercase().into())
    });
    let out = try_render(&engine, "{% assign x = 'hi' | upcase %}{{ x }}", json!({}));
    assert_eq!(out.expect("render"), "HI");
}

#[test]
fn capture_collects_body() {
    assert_eq!(
        render("{% capture x %}Hello{% endcapture %}{{ x }}", json!({})),
        "Hello"
    );
    assert_eq!(
        render(
            "{% capture 'greeting' %}Hi {{ name }}{% endcapture %}[{{ greeting }}]",
            json!({"name": "Ann"})
        ),
        "[Hi Ann]"
    );
}

#[test]
fn echo_outputs_value() {
    assert_eq!(render("{% echo 'a' %}{% echo x %}", json!({"x": 2})), "a2");
}

#[test]
fn assign_shadows_data() {
    assert_eq!(
        render("{{ x }}{% assign x = 'local' %}{{ x }}", json!({"x": "data"})),
        "datalocal"
    );
}

// -----------------------------------------------------------
// Conditionals.
// -----------------------------------------------------------

#[test]
fn if_else() {
    assert_eq!(render("{% if false %}A{% else %}B{% endif %}", json!({})), "B");
    assert_eq!(render("{% if true %}A{% else %}B{% endif %}", json!({})), "A");
}

#[test]
fn elsif_chain() {
    let text = "{% if n == 1 %}one{% elsif n == 2 %}two{% else %}many{% endif %}";
    assert_eq!(render(text, json!({"n": 1})), "one");
    assert_eq!(render(text, json!({"n": 2})), "two");
    assert_eq!(render(text, json!({"n": 5})), "many");
}

#[test]
fn unless_negates_first_branch() {
    let text = "{% unless a %}no a{% elsif b %}b{% else %}else{% endunless %}";
    assert_eq!(render(text, json!({"a": false})), "no a");
    assert_eq!(render(text, json!({"a": true, "b": true})), "b");
    assert_eq!(render(text, json!({"a": true})), "else");
}

#[test]
fn operators() {
    let cases = [
        ("1 < 2 and 2 < 3", "y"),
        ("1 > 2 or 2 > 3", "n"),
        ("'abc' contains 'b'", "y"),
        ("list contains 2", "y"),
        ("list contains 9", "n"),
        ("not false", "y"),
        ("1 != 1", "n"),
        ("2 >= 2", "y"),
        ("list == other", "y"),
        ("empty_list == empty", "y"),
        ("blank_text == blank", "y"),
        ("nil == missing", "y"),
        ("true and false or true", "y"),
    ];
    let data = json!({
        "list": [1, 2, 3],
        "other": [1, 2, 3],
        "empty_list": [],
        "blank_text": "   ",
    });
    for (expr, expected) in cases {
        let text = format!("{{% if {expr} %}}y{{% else %}}n{{% endif %}}");
        assert_eq!(render(&text, data.clone()), expected, "expression: {expr}");
    }
}

#[test]
fn truthiness() {
    let text = "{% if v %}t{% else %}f{% endif %}";
    assert_eq!(render(text, json!({"v": 0})), "t");
    assert_eq!(render(text, json!({"v": ""})), "t");
    assert_eq!(render(text, json!({"v": []})), "t");
    assert_eq!(render(text, json!({"v": false})), "f");
    assert_eq!(render(text, json!({"v": null})), "f");
    assert_eq!(render(text, json!({})), "f");
}

#[test]
fn case_when() {
    let text = "{% case x %}{% when 1, 2 %}low{% when 3 or 4 %}mid{% else %}high{% endcase %}";
    assert_eq!(render(text, json!({"x": 2})), "low");
    assert_eq!(render(text, json!({"x": 4})), "mid");
    assert_eq!(render(text, json!({"x": 9})), "high");
}

#[test]
fn case_renders_every_matching_when() {
    let text = "{% case x %}{% when 'a' %}1{% when 'a' %}2{% else %}3{% endcase %}";
    assert_eq!(render(text, json!({"x": "a"})), "12");
}

// -----------------------------------------------------------
// Loops.
// -----------------------------------------------------------

#[test]
fn for_over_range() {
    assert_eq!(render("{% for i in (1..3) %}{{ i }}{% endfor %}", json!({})), "123");
    assert_eq!(
        render("{% for i in (1..3) limit:2 %}{{ i }}{% endfor %}", json!({})),
        "12"
    );
    assert_eq!(
        render("{% for i in (1..3) offset:1 %}{{ i }}{% endfor %}", json!({})),
        "23"
    );
    assert_eq!(
        render("{% for i in (1..3) reversed %}{{ i }}{% endfor %}", json!({})),
        "321"
    );
}

#[test]
fn for_else_on_empty() {
    let text = "{% for x in items %}{{ x }}{% else %}none{% endfor %}";
    assert_eq!(render(text, json!({"items": []})), "none");
    assert_eq!(render(text, json!({})), "none");
    assert_eq!(render(text, json!({"items": ["a"]})), "a");
}

#[test]
fn forloop_object() {
    let text = "{% for x in list %}{{ forloop.index }}/{{ forloop.rindex0 }}\
                {% if forloop.first %}F{% endif %}{% if forloop.last %}L{% endif %} {% endfor %}";
    assert_eq!(
        render(text, json!({"list": ["a", "b", "c"]})),
        "1/2F 2/1 3/0L "
    );
}

#[test]
fn forloop_parentloop_and_name() {
    let text = "{% for a in (1..2) %}{% for b in (1..2) %}\
                {{ forloop.parentloop.index }}{{ forloop.index }} {% endfor %}{% endfor %}";
    assert_eq!(render(text, json!({})), "11 12 21 22 ");
    assert_eq!(
        render("{% for x in list %}{{ forloop.name }}{% endfor %}", json!({"list": [1]})),
        "x-list"
    );
}

#[test]
fn for_over_object_yields_pairs() {
    let text = "{% for pair in obj %}{{ pair[0] }}={{ pair[1] }};{% endfor %}";
    assert_eq!(render(text, json!({"obj": {"a": 1, "b": 2}})), "a=1;b=2;");
}

#[test]
fn break_and_continue() {
    let text = "{% for i in (1..6) %}{% if i == 2 %}{% continue %}{% endif %}\
                {% if i == 5 %}{% break %}{% endif %}{{ i }}{% endfor %}";
    assert_eq!(render(text, json!({})), "134");
}

#[test]
fn break_only_leaves_inner_loop() {
    let text = "{% for a in (1..2) %}{% for b in (1..3) %}{% if b == 2 %}{% break %}{% endif %}\
                {{ a }}{{ b }} {% endfor %}{% endfor %}";
    assert_eq!(render(text, json!({})), "11 21 ");
}

#[test]
fn offset_continue_resumes() {
    let text = "{% for i in list limit:2 %}{{ i }}{% endfor %}|\
                {% for i in list offset:continue limit:2 %}{{ i }}{% endfor %}|\
                {% for i in list offset:continue %}{{ i }}{% endfor %}";
    assert_eq!(render(text, json!({"list": [1, 2, 3, 4, 5]})), "12|34|5");
}

#[test]
fn tablerow_layout() {
    let text = "{% tablerow x in list cols:2 %}{{ x }}{% endtablerow %}";
    assert_eq!(
        render(text, json!({"list": [1, 2, 3]})),
        "<tr class=\"row1\"><td class=\"col1\">1</td><td class=\"col2\">2</td></tr>\
         <tr class=\"row2\"><td class=\"col1\">3</td></tr>"
    );
    assert_eq!(render(text, json!({"list": []})), "");
}

// -----------------------------------------------------------
// Stateful tags.
// -----------------------------------------------------------

#[test]
fn cycle_by_candidates_and_group() {
    assert_eq!(
        render(
            "{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}",
            json!({})
        ),
        "abca"
    );
    assert_eq!(
        render(
            "{% cycle 'g1': 'x', 'y' %}{% cycle 'g2': 'x', 'y' %}{% cycle 'g1': 'x', 'y' %}",
            json!({})
        ),
        "xxy"
    );
}

#[test]
fn increment_and_decrement() {
    assert_eq!(
        render(
            "{% increment n %}{% increment n %}{% decrement n %}{% decrement m %}",
            json!({})
        ),
        "011-1"
    );
}

#[test]
fn counters_are_separate_from_assign() {
    assert_eq!(
        render("{% assign n = 10 %}{% increment n %}{{ n }}", json!({})),
        "010"
    );
}

// -----------------------------------------------------------
// raw, comments, liquid.
// -----------------------------------------------------------

#[test]
fn raw_keeps_markup() {
    assert_eq!(
        render("{% raw %}{{ x }}{% if %}{% endraw %}", json!({"x": 1})),
        "{{ x }}{% if %}"
    );
}

#[test]
fn comments_render_nothing() {
    assert_eq!(
        render(
            "a{% comment %}{% if %}{% comment %}x{% endcomment %}{% endcomment %}b",
            json!({})
        ),
        "ab"
    );
    assert_eq!(render("a{% # note %}b", json!({})), "ab");
    assert_eq!(render("a{%- # one\n  # two -%}b", json!({})), "ab");
}

#[test]
fn apostrophes_in_tags_stay_in_the_tag() {
    assert_eq!(render("{% # don't %}a{{ 'x' }}b", json!({})), "axb");
    assert_eq!(
        render("{% # don't %}A's{% assign x = 1 %}B{{ x }}", json!({})),
        "A'sB1"
    );
}

#[test]
fn escaped_quotes_in_output_strings() {
    assert_eq!(render(r#"{{ "a\"}}b" }}"#, json!({})), r#"a"}}b"#);
}

#[test]
fn liquid_tag_lines() {
    let text = "{% liquid\n  assign xs = list\n  for x in xs\n    echo x\n  endfor\n%}";
    assert_eq!(render(text, json!({"list": [1, 2]})), "12");
}

// -----------------------------------------------------------
// Custom delimiters and globals.
// -----------------------------------------------------------

#[test]
fn custom_delimiters() {
    let engine = Liquid::new(Options {
        tag_delimiter_left: "<%".to_string(),
        tag_delimiter_right: "%>".to_string(),
        output_delimiter_left: "[[".to_string(),
        output_delimiter_right: "]]".to_string(),
        ..Options::default()
    });
    let out = try_render(&engine, "<% assign a = 1 %>[[ a ]]{{ a }}", json!({}));
    assert_eq!(out.expect("render"), "1{{ a }}");
}

#[test]
fn globals_sit_below_data() {
    let mut options = Options::default();
    options.globals.insert("site".to_string(), "global".into());
    options.globals.insert("name".to_string(), "global".into());
    let engine = Liquid::new(options);
    let out = try_render(&engine, "{{ site }} {{ name }}", json!({"name": "data"}));
    assert_eq!(out.expect("render"), "global data");
}

#[test]
fn streaming_to_writer() {
    let engine = engine();
    let template = engine.parse("a{{ b }}c", None).expect("parse");
    let out = engine
        .render_to_writer(&template, json!({"b": "B"}), RenderOptions::default(), Vec::new())
        .expect("render");
    assert_eq!(out, b"aBc");
}
