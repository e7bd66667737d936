//! Engine and per-render configuration.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::lexer::LexOptions;
use crate::value::Object;

/// Custom escape function for `outputEscape`.
pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Escaping applied to `{{ }}` output. Skipped when the last filter is
/// `raw`.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEscape {
    #[default]
    None,
    /// HTML entity escaping of `& < > " '`.
    Escape,
    /// JSON encoding of the output value.
    Json,
    #[serde(skip_deserializing)]
    Custom(EscapeFn),
}

impl fmt::Debug for OutputEscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Escape => f.write_str("Escape"),
            Self::Json => f.write_str("Json"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Engine-wide options. Deserializes from camelCase JSON.
///
/// ```
/// use liquid_rs::Options;
///
/// let options: Options = serde_json::from_str(
///     r#"{"root": ["views"], "extname": ".liquid", "strictVariables": true}"#,
/// ).unwrap();
/// assert_eq!(options.root, ["views"]);
/// assert!(options.strict_variables);
/// assert!(options.dynamic_partials);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Directories searched for templates rendered by name.
    #[serde(deserialize_with = "one_or_many")]
    pub root: Vec<String>,
    /// Directories for `include` and `render`. Defaults to `root`.
    #[serde(deserialize_with = "maybe_one_or_many")]
    pub partials: Option<Vec<String>>,
    /// Directories for `layout`. Defaults to `root`.
    #[serde(deserialize_with = "maybe_one_or_many")]
    pub layouts: Option<Vec<String>>,
    /// Appended to file names that have no extension.
    pub extname: String,
    /// Resolve `./` and `../` names against the including file.
    pub relative_reference: bool,
    /// Only accept candidates inside a configured root.
    pub enforce_root: bool,
    /// Partial cache capacity. `None` or `0` disables caching.
    pub cache: Option<usize>,
    /// Treat partial names as expressions (`'name'`, `var`) rather
    /// than bare words.
    pub dynamic_partials: bool,
    pub strict_variables: bool,
    pub strict_filters: bool,
    /// Ignore inherited properties of drops.
    pub own_property_only: bool,
    /// Tolerate undefined variables in single-operand conditions and
    /// `default` pipelines under strict variables.
    pub lenient_if: bool,
    pub trim_tag_left: bool,
    pub trim_tag_right: bool,
    pub trim_output_left: bool,
    pub trim_output_right: bool,
    pub greedy: bool,
    pub tag_delimiter_left: String,
    pub tag_delimiter_right: String,
    pub output_delimiter_left: String,
    pub output_delimiter_right: String,
    pub memory_limit: Option<u64>,
    /// Milliseconds.
    pub render_limit: Option<u64>,
    /// Bytes of source per parse.
    pub parse_limit: Option<u64>,
    pub output_escape: OutputEscape,
    pub catch_all_errors: bool,
    #[serde(skip)]
    pub globals: Object,
}

impl Default for Options {
    fn default() -> Self {
        let lex = LexOptions::default();
        Self {
            root: vec![".".to_string()],
            partials: None,
            layouts: None,
            extname: String::new(),
            relative_reference: true,
            enforce_root: false,
            cache: None,
            dynamic_partials: true,
            strict_variables: false,
            strict_filters: false,
            own_property_only: true,
            lenient_if: false,
            trim_tag_left: lex.trim_tag_left,
            trim_tag_right: lex.trim_tag_right,
            trim_output_left: lex.trim_output_left,
            trim_output_right: lex.trim_output_right,
            greedy: lex.greedy,
            tag_delimiter_left: lex.tag_left,
            tag_delimiter_right: lex.tag_right,
            output_delimiter_left: lex.output_left,
            output_delimiter_right: lex.output_right,
            memory_limit: None,
            render_limit: None,
            parse_limit: None,
            output_escape: OutputEscape::None,
            catch_all_errors: false,
            globals: Object::new(),
        }
    }
}

impl Options {
    #[must_use]
    pub fn lex_options(&self) -> LexOptions {
        LexOptions {
            tag_left: self.tag_delimiter_left.clone(),
            tag_right: self.tag_delimiter_right.clone(),
            output_left: self.output_delimiter_left.clone(),
            output_right: self.output_delimiter_right.clone(),
            trim_tag_left: self.trim_tag_left,
            trim_tag_right: self.trim_tag_right,
            trim_output_left: self.trim_output_left,
            trim_output_right: self.trim_output_right,
            greedy: self.greedy,
        }
    }

    #[must_use]
    pub fn partial_roots(&self) -> &[String] {
        self.partials.as_deref().unwrap_or(&self.root)
    }

    #[must_use]
    pub fn layout_roots(&self) -> &[String] {
        self.layouts.as_deref().unwrap_or(&self.root)
    }
}

/// Per-call overrides of the render-related options.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub strict_variables: Option<bool>,
    pub strict_filters: Option<bool>,
    pub own_property_only: Option<bool>,
    pub memory_limit: Option<u64>,
    pub render_limit: Option<u64>,
    pub globals: Option<Object>,
    pub output_escape: Option<OutputEscape>,
    pub catch_all_errors: Option<bool>,
}

/// Effective settings for one render: engine options with the call's
/// overrides applied.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub strict_variables: bool,
    pub strict_filters: bool,
    pub own_property_only: bool,
    pub lenient_if: bool,
    pub memory_limit: Option<u64>,
    pub render_limit: Option<u64>,
    pub globals: Object,
    pub output_escape: OutputEscape,
    pub catch_all_errors: bool,
}

impl RenderConfig {
    #[must_use]
    pub fn new(options: &Options, overrides: &RenderOptions) -> Self {
        Self {
            strict_variables: overrides
                .strict_variables
                .unwrap_or(options.strict_variables),
            strict_filters: overrides.strict_filters.unwrap_or(options.strict_filters),
            own_property_only: overrides
                .own_property_only
                .unwrap_or(options.own_property_only),
            lenient_if: options.lenient_if,
            memory_limit: overrides.memory_limit.or(options.memory_limit),
            render_limit: overrides.render_limit.or(options.render_limit),
            globals: overrides
                .globals
                .clone()
                .unwrap_or_else(|| options.globals.clone()),
            output_escape: overrides
                .output_escape
                .clone()
                .unwrap_or_else(|| options.output_escape.clone()),
            catch_all_errors: overrides
                .catch_all_errors
                .unwrap_or(options.catch_all_errors),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    OneOrMany::deserialize(deserializer).map(Into::into)
}

fn maybe_one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Option::<OneOrMany>::deserialize(deserializer).map(|v| v.map(Into::into))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.root, ["."]);
        assert!(options.relative_reference);
        assert!(options.own_property_only);
        assert!(options.greedy);
        assert_eq!(options.tag_delimiter_left, "{%");
        assert_eq!(options.partial_roots(), ["."]);
    }

    #[test]
    fn deserialize_camel_case() {
        let options: Options = serde_json::from_str(
            r#"{
                "root": "views",
                "partials": ["views/partials"],
                "cache": 16,
                "outputEscape": "escape",
                "memoryLimit": 1000,
                "trimTagRight": true
            }"#,
        )
        .expect("valid options");
        assert_eq!(options.root, ["views"]);
        assert_eq!(options.partial_roots(), ["views/partials"]);
        assert_eq!(options.layout_roots(), ["views"]);
        assert_eq!(options.cache, Some(16));
        assert!(matches!(options.output_escape, OutputEscape::Escape));
        assert_eq!(options.memory_limit, Some(1000));
        assert!(options.lex_options().trim_tag_right);
    }

    #[test]
    fn overrides_apply() {
        let options = Options {
            strict_variables: true,
            memory_limit: Some(5),
            ..Options::default()
        };
        let config = RenderConfig::new(
            &options,
            &RenderOptions {
                strict_variables: Some(false),
                ..RenderOptions::default()
            },
        );
        assert!(!config.strict_variables);
        assert_eq!(config.memory_limit, Some(5));
    }
}
