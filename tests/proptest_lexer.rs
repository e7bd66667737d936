//! Property-based tests with proptest.
//!
//! Generate random mixes of HTML, tags and outputs and check that the
//! lexer loses no source text, and that markup-free text renders as
//! itself.

use liquid_rs::{Liquid, Options, tokenize};
use proptest::prelude::*;
use serde_json::json;

// -- Leaf strategies --

/// HTML run: no `{`, so it never opens a delimiter.
fn html() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 <>/=\"'\n\t.,%}-]{1,12}"
}

/// Tag or variable name. `raw` is left out, since it changes how the
/// following text is lexed.
fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,6}".prop_filter("raw opens a raw block", |n| n != "raw")
}

fn trim() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just("-")]
}

fn tag() -> impl Strategy<Value = String> {
    (trim(), name(), "[a-z0-9 .]{0,10}", trim())
        .prop_map(|(l, n, args, r)| format!("{{%{l} {n} {args} {r}%}}"))
}

fn output() -> impl Strategy<Value = String> {
    (trim(), name(), trim()).prop_map(|(l, n, r)| format!("{{{{{l} {n} {r}}}}}"))
}

fn piece() -> impl Strategy<Value = String> {
    prop_oneof![3 => html(), 1 => tag(), 1 => output()]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(piece(), 0..16).prop_map(|pieces| pieces.concat())
}

// -- Properties --

proptest! {
    #[test]
    fn token_spans_reassemble_source(input in document()) {
        let tokens = tokenize(&input).expect("generated input should lex");
        let joined: String = tokens.iter().map(|t| t.span.text()).collect();
        prop_assert_eq!(joined, input);
    }

    #[test]
    fn token_spans_are_contiguous(input in document()) {
        let tokens = tokenize(&input).expect("generated input should lex");
        let mut end = 0;
        for token in &tokens {
            prop_assert_eq!(token.span.start, end);
            prop_assert!(token.span.end > token.span.start);
            end = token.span.end;
        }
        prop_assert_eq!(end, input.len());
    }

    #[test]
    fn markup_free_text_renders_unchanged(input in "[^{]{0,64}") {
        let engine = Liquid::new(Options::default());
        let template = engine.parse(&input, None).expect("plain text should parse");
        let output = engine.render(&template, json!({})).expect("plain text should render");
        prop_assert_eq!(output, input);
    }
}
