//! Liquid template engine: lexer, parser, renderer and static analyzer.
//!
//! Templates are parsed once into a node tree and rendered any number
//! of times, either synchronously or asynchronously. Partials and
//! layouts are loaded through a pluggable [`FileSystem`] and cached.
//!
//! # Quick start
//!
//! ## Render a template
//!
//! ```
//! use liquid_rs::{Liquid, Options};
//! use serde_json::json;
//!
//! let mut engine = Liquid::new(Options::default());
//! engine.register_filter_fn("upcase", |input, _args, _ctx| {
//!     Ok(input.to_output().to_uppercase().into())
//! });
//!
//! let template = engine.parse("Hello {{ name | upcase }}!", None).unwrap();
//! let output = engine.render(&template, json!({"name": "liquid"})).unwrap();
//! assert_eq!(output, "Hello LIQUID!");
//! ```
//!
//! ## Load partials from memory
//!
//! ```
//! use std::sync::Arc;
//! use liquid_rs::{Liquid, MemoryFs, Options};
//! use serde_json::json;
//!
//! let fs = MemoryFs::new()
//!     .with_file("card.liquid", "[{{ title }}]")
//!     .with_file("page.liquid", "{% render 'card', title: heading %}");
//! let options = Options {
//!     extname: ".liquid".to_string(),
//!     ..Options::default()
//! };
//! let engine = Liquid::with_fs(options, Arc::new(fs));
//!
//! let output = engine.render_file("page", json!({"heading": "Hi"})).unwrap();
//! assert_eq!(output, "[Hi]");
//! ```
//!
//! ## Find the variables a template needs
//!
//! ```
//! use liquid_rs::{Liquid, Options};
//!
//! let engine = Liquid::new(Options::default());
//! let template = engine
//!     .parse("{% for p in products %}{{ p.title }}{% endfor %}{{ shop.name }}", None)
//!     .unwrap();
//! assert_eq!(engine.global_variables(&template), ["products", "shop.name"]);
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod analysis;
pub mod cache;
pub mod chars;
pub mod context;
pub mod error;
pub mod expression;
pub mod filter;
pub mod fs;
pub mod lexer;
pub mod limiter;
pub mod loader;
pub mod options;
pub mod parser;
pub mod render;
pub mod tags;
pub mod token;
pub mod tokenizer;
pub mod trie;
pub mod value;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

pub use analysis::{Analyzer, global_variables, variables};
pub use cache::{CacheKey, PartialCache};
pub use context::Context;
pub use error::{Error, RenderError, RenderErrorKind};
pub use filter::{Filter, FilterArgs, FnFilter};
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use lexer::{LexError, LexErrorKind, LexOptions, tokenize};
pub use limiter::{LimitError, LimitKind};
pub use loader::LookupType;
pub use options::{Options, OutputEscape, RenderOptions};
pub use parser::{ParseError, ParseErrorKind, ParseStream, Parser, TagParser, TagRegistry, Template};
pub use render::{Emitter, Node, Tag, WriteEmitter};
pub use token::{Source, Span, Token, TokenKind};
pub use value::{Object, ObjectLike, Value};

use loader::Loader;
use options::RenderConfig;
use render::{drive_sync, render_sequence};

/// The engine: options, registered tags and filters, the file system
/// partials are read from and the partial cache.
pub struct Liquid {
    options: Options,
    tags: TagRegistry,
    filters: HashMap<String, Box<dyn Filter>>,
    fs: Arc<dyn FileSystem>,
    cache: Option<PartialCache>,
}

impl fmt::Debug for Liquid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liquid")
            .field("options", &self.options)
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("fs", &self.fs)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Liquid {
    /// Engine reading partials from disk.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_fs(options, Arc::new(LocalFs))
    }

    #[must_use]
    pub fn with_fs(options: Options, fs: Arc<dyn FileSystem>) -> Self {
        let cache = options
            .cache
            .filter(|capacity| *capacity > 0)
            .map(PartialCache::new);
        let mut filters: HashMap<String, Box<dyn Filter>> = HashMap::new();
        filters.insert("raw".to_string(), Box::new(filter::Raw));
        Self {
            options,
            tags: TagRegistry::builtin(),
            filters,
            fs,
            cache,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&PartialCache> {
        self.cache.as_ref()
    }

    pub fn register_filter(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Box::new(filter));
    }

    /// Register a synchronous closure as a filter.
    pub fn register_filter_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, &FilterArgs, &Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.register_filter(name, FnFilter(f));
    }

    /// Register or replace a tag. The parser is consulted once per tag
    /// occurrence at parse time.
    pub fn register_tag(&mut self, name: impl Into<String>, parser: TagParser) {
        self.tags.register(name, parser);
    }

    pub(crate) fn filter(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(AsRef::as_ref)
    }

    #[must_use]
    pub const fn parser(&self) -> Parser<'_> {
        Parser::new(&self.options, &self.tags)
    }

    /// Parse template text. `file` names the template in error messages
    /// and anchors `./` and `../` partial references.
    pub fn parse(&self, text: &str, file: Option<&str>) -> Result<Template, Error> {
        self.parser().parse(text, file)
    }

    /// Look up `name` under the configured roots and parse it.
    pub fn parse_file(&self, name: &str) -> Result<Arc<Template>, Error> {
        drive_sync(self.load_template(name, LookupType::Root, None, true))
    }

    pub async fn parse_file_async(&self, name: &str) -> Result<Arc<Template>, Error> {
        self.load_template(name, LookupType::Root, None, false).await
    }

    /// Resolve, read and parse a template file, going through the cache.
    ///
    /// A failed load leaves nothing in the cache.
    pub async fn load_template(
        &self,
        name: &str,
        lookup: LookupType,
        current: Option<&str>,
        sync: bool,
    ) -> Result<Arc<Template>, Error> {
        let loader = Loader::new(self.fs.as_ref(), &self.options);
        let key = match current.filter(|_| loader.is_relative(name)) {
            Some(current) => CacheKey::Relative {
                current: current.to_string(),
                name: name.to_string(),
            },
            None => CacheKey::Lookup(lookup, name.to_string()),
        };
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            tracing::debug!(name, %lookup, "template cache hit");
            return Ok(hit);
        }

        let loaded = async {
            let path = loader.lookup(name, lookup, current, sync).await?;
            let text = loader.read(&path, sync).await?;
            tracing::debug!(%path, "parsing template file");
            self.parse(&text, Some(&path)).map(Arc::new)
        }
        .await;

        let Some(cache) = &self.cache else {
            return loaded;
        };
        match loaded {
            Ok(template) => {
                tracing::trace!(name, %lookup, "template cached");
                cache.insert(key, Arc::clone(&template));
                Ok(template)
            }
            Err(err) => {
                cache.remove(&key);
                Err(err)
            }
        }
    }

    async fn render_nodes(
        &self,
        template: &Template,
        data: Value,
        options: &RenderOptions,
        sync: bool,
        out: &mut dyn Emitter,
        flush: bool,
    ) -> Result<(), Error> {
        let config = RenderConfig::new(&self.options, options);
        let mut ctx = Context::new(self, config, data, sync);
        tracing::debug!(file = ?template.name(), sync, "render start");
        let result = render_sequence(&template.nodes, &mut ctx, out, flush).await;
        tracing::debug!(
            file = ?template.name(),
            ok = result.is_ok(),
            memory = ctx.session().memory.used(),
            "render finish"
        );
        result
    }

    /// Render with the synchronous driver.
    pub fn render(&self, template: &Template, data: impl Into<Value>) -> Result<String, Error> {
        self.render_with(template, data, RenderOptions::default())
    }

    pub fn render_with(
        &self,
        template: &Template,
        data: impl Into<Value>,
        options: RenderOptions,
    ) -> Result<String, Error> {
        let mut out = String::new();
        drive_sync(self.render_nodes(template, data.into(), &options, true, &mut out, false))?;
        Ok(out)
    }

    /// Render with the asynchronous driver, awaiting asynchronous
    /// filters and file reads.
    pub async fn render_async(
        &self,
        template: &Template,
        data: impl Into<Value>,
        options: RenderOptions,
    ) -> Result<String, Error> {
        let mut out = String::new();
        self.render_nodes(template, data.into(), &options, false, &mut out, false)
            .await?;
        Ok(out)
    }

    /// Stream output to `writer`, flushing after each top-level node.
    pub fn render_to_writer<W: io::Write>(
        &self,
        template: &Template,
        data: impl Into<Value>,
        options: RenderOptions,
        writer: W,
    ) -> Result<W, Error> {
        let mut emitter = WriteEmitter::new(writer);
        drive_sync(self.render_nodes(template, data.into(), &options, true, &mut emitter, true))?;
        emitter.flush()?;
        Ok(emitter.into_inner())
    }

    pub fn parse_and_render(&self, text: &str, data: impl Into<Value>) -> Result<String, Error> {
        let template = self.parse(text, None)?;
        self.render(&template, data)
    }

    pub fn render_file(&self, name: &str, data: impl Into<Value>) -> Result<String, Error> {
        let template = self.parse_file(name)?;
        self.render(&template, data)
    }

    pub async fn render_file_async(
        &self,
        name: &str,
        data: impl Into<Value>,
    ) -> Result<String, Error> {
        let template = self.parse_file_async(name).await?;
        self.render_async(&template, data, RenderOptions::default())
            .await
    }

    /// Every variable path the template reads.
    #[must_use]
    pub fn variables(&self, template: &Template) -> Vec<String> {
        analysis::variables(&template.nodes)
    }

    /// Variable paths that must come from render data or globals.
    #[must_use]
    pub fn global_variables(&self, template: &Template) -> Vec<String> {
        analysis::global_variables(&template.nodes)
    }
}
