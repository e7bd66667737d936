//! Static variable analysis over a parsed node tree.
//!
//! Paths are reported as written: `a.b`, `a[0]`, `a[b]`. A dynamic
//! index also reports the variables inside it. Partials loaded by
//! `include` and `render` are not followed.

use std::collections::HashSet;

use crate::expression::{
    ExprToken, Expression, FilterArg, FilteredValue, Hash, Prop, PropertyPath, Root, ValueExpr,
};
use crate::render::Node;
use crate::tags::partial::{Binding, FileRef};
use crate::value::Value;

/// One variable reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub path: String,
    pub root: String,
    /// Not bound by an enclosing loop, block, partial binding or an
    /// earlier `assign`/`capture`.
    pub global: bool,
}

/// Walks nodes, tracking which names are locally bound.
#[derive(Debug)]
pub struct Analyzer {
    locals: Vec<HashSet<String>>,
    references: Vec<Reference>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locals: vec![HashSet::new()],
            references: Vec::new(),
        }
    }

    /// Every reference, in source order, duplicates included.
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Bind `name` for the rest of the template, like `assign`.
    pub fn bind_template(&mut self, name: &str) {
        if let Some(scope) = self.locals.first_mut() {
            scope.insert(name.to_string());
        }
    }

    /// Run `f` with `names` bound in a nested scope.
    pub fn scoped(&mut self, names: &[&str], f: impl FnOnce(&mut Self)) {
        self.locals
            .push(names.iter().map(|n| (*n).to_string()).collect());
        f(self);
        self.locals.pop();
    }

    fn is_local(&self, root: &str) -> bool {
        self.locals.iter().any(|scope| scope.contains(root))
    }

    pub fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    pub fn node(&mut self, node: &Node) {
        match node {
            Node::Html(_)
            | Node::Raw(_)
            | Node::Comment
            | Node::InlineComment
            | Node::Break(_)
            | Node::Continue(_)
            | Node::Increment(_)
            | Node::Decrement(_) => {}
            Node::Output(output) => self.filtered(&output.value),
            Node::Echo(echo) => self.filtered(&echo.value),
            Node::Assign(assign) => {
                self.filtered(&assign.value);
                self.bind_template(&assign.key);
            }
            Node::Capture(capture) => {
                self.nodes(&capture.body);
                self.bind_template(&capture.key);
            }
            Node::If(conditional) | Node::Unless(conditional) => {
                for branch in &conditional.branches {
                    self.expression(&branch.condition);
                    self.nodes(&branch.body);
                }
                if let Some(body) = &conditional.otherwise {
                    self.nodes(body);
                }
            }
            Node::Case(case) => {
                self.expression(&case.value);
                for when in &case.whens {
                    for value in &when.values {
                        self.value(value);
                    }
                    self.nodes(&when.body);
                }
                if let Some(body) = &case.otherwise {
                    self.nodes(body);
                }
            }
            Node::For(each) => {
                self.value(&each.collection);
                for (key, value) in &each.modifiers.entries {
                    match value {
                        Some(value) if !(key == "offset" && value.text() == "continue") => {
                            self.value(value);
                        }
                        _ => {}
                    }
                }
                self.scoped(&[each.variable.as_str(), "forloop"], |a| {
                    a.nodes(&each.body);
                });
                if let Some(body) = &each.otherwise {
                    self.nodes(body);
                }
            }
            Node::Tablerow(table) => {
                self.value(&table.collection);
                self.hash(&table.modifiers);
                self.scoped(&[table.variable.as_str(), "tablerowloop"], |a| {
                    a.nodes(&table.body);
                });
            }
            Node::Cycle(cycle) => {
                if let Some(group) = &cycle.group {
                    self.value(group);
                }
                for candidate in &cycle.candidates {
                    self.value(candidate);
                }
            }
            Node::Include(include) => {
                self.file(&include.file);
                self.binding(include.with.as_ref());
                self.hash(&include.hash);
            }
            Node::Render(render) => {
                self.file(&render.file);
                self.binding(render.with.as_ref());
                self.binding(render.each.as_ref());
                self.hash(&render.hash);
            }
            Node::Layout(layout) => {
                if let Some(file) = &layout.file {
                    self.file(file);
                }
                self.hash(&layout.args);
                self.nodes(&layout.body);
            }
            Node::Block(block) => self.scoped(&["block"], |a| a.nodes(&block.body)),
            Node::Liquid(liquid) => self.nodes(&liquid.body),
            Node::Custom(tag) => tag.analyze(self),
        }
    }

    fn file(&mut self, file: &FileRef) {
        match file {
            FileRef::Literal(_) => {}
            FileRef::Template(nodes) => self.nodes(nodes),
            FileRef::Value(value) => self.value(value),
        }
    }

    fn binding(&mut self, binding: Option<&Binding>) {
        if let Some(binding) = binding {
            self.value(&binding.value);
        }
    }

    pub fn hash(&mut self, hash: &Hash) {
        for value in hash.values() {
            self.value(value);
        }
    }

    pub fn expression(&mut self, expression: &Expression) {
        for token in &expression.postfix {
            if let ExprToken::Operand(value) = token {
                self.value(value);
            }
        }
    }

    pub fn filtered(&mut self, value: &FilteredValue) {
        self.expression(&value.initial);
        for filter in &value.filters {
            for arg in &filter.args {
                match arg {
                    FilterArg::Positional(v) | FilterArg::Named(_, v) => self.value(v),
                }
            }
        }
    }

    pub fn value(&mut self, value: &ValueExpr) {
        match value {
            ValueExpr::Literal { .. } => {}
            ValueExpr::Range { low, high, .. } => {
                self.value(low);
                self.value(high);
            }
            ValueExpr::Path(path) => self.path(path),
        }
    }

    fn path(&mut self, path: &PropertyPath) {
        let root = match &path.root {
            Root::Variable(name) => Some(name.clone()),
            Root::Index(expr) => match expr.as_ref() {
                ValueExpr::Literal {
                    value: Value::String(name),
                    ..
                } => Some(name.clone()),
                other => {
                    self.value(other);
                    None
                }
            },
            Root::Value(expr) => {
                self.value(expr);
                None
            }
        };

        let mut text = root.clone().unwrap_or_default();
        let mut nested = Vec::new();
        for prop in &path.props {
            match prop {
                Prop::Key(key) => {
                    text.push('.');
                    text.push_str(key);
                }
                Prop::Index(ValueExpr::Literal { value, .. }) => match value {
                    Value::String(key) if is_plain_key(key) => {
                        text.push('.');
                        text.push_str(key);
                    }
                    Value::String(key) => {
                        text.push_str(&format!("[\"{key}\"]"));
                    }
                    other => {
                        text.push('[');
                        text.push_str(&other.to_output());
                        text.push(']');
                    }
                },
                Prop::Index(expr) => {
                    text.push('[');
                    text.push_str(expr.text());
                    text.push(']');
                    nested.push(expr);
                }
            }
        }

        if let Some(root) = root {
            let global = !self.is_local(&root);
            self.references.push(Reference {
                path: text,
                root,
                global,
            });
        }
        for expr in nested {
            self.value(expr);
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn unique<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .filter(|p| seen.insert(*p))
        .map(str::to_string)
        .collect()
}

/// Every variable path, unique, in order of first appearance.
#[must_use]
pub fn variables(nodes: &[Node]) -> Vec<String> {
    let mut analyzer = Analyzer::new();
    analyzer.nodes(nodes);
    unique(analyzer.references.iter().map(|r| r.path.as_str()))
}

/// The subset of [`variables`] that must come from render data or
/// globals.
#[must_use]
pub fn global_variables(nodes: &[Node]) -> Vec<String> {
    let mut analyzer = Analyzer::new();
    analyzer.nodes(nodes);
    unique(
        analyzer
            .references
            .iter()
            .filter(|r| r.global)
            .map(|r| r.path.as_str()),
    )
}

/// Whether any path in `nodes` starts at the variable `name`.
#[must_use]
pub fn references_root(nodes: &[Node], name: &str) -> bool {
    let mut analyzer = Analyzer::new();
    analyzer.nodes(nodes);
    analyzer.references.iter().any(|r| r.root == name)
}
