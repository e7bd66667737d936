//! Expression nodes and their evaluation.
//!
//! Operator expressions are stored in postfix order, converted once at
//! parse time, and evaluated with a small stack machine.

use std::fmt;

use crate::context::Context;
use crate::error::{Error, RenderError, RenderErrorKind};
use crate::filter::FilterArgs;
use crate::token::Span;
use crate::value::{Object, Value};

/// A single value: literal, variable path or range.
#[derive(Debug, Clone)]
pub enum ValueExpr {
    Literal { value: Value, span: Span },
    Path(PropertyPath),
    Range {
        low: Box<ValueExpr>,
        high: Box<ValueExpr>,
        span: Span,
    },
}

/// `root.key[index]...`
#[derive(Debug, Clone)]
pub struct PropertyPath {
    pub root: Root,
    pub props: Vec<Prop>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Root {
    /// Looked up in the context: `name`.
    Variable(String),
    /// Looked up in the context by a computed key: `["name"]`, `[var]`.
    Index(Box<ValueExpr>),
    /// Properties read from a value: `"abc".size`, `(1..3).first`.
    Value(Box<ValueExpr>),
}

#[derive(Debug, Clone)]
pub enum Prop {
    Key(String),
    Index(ValueExpr),
}

impl ValueExpr {
    #[must_use]
    pub const fn span(&self) -> &Span {
        match self {
            Self::Literal { span, .. } | Self::Range { span, .. } => span,
            Self::Path(path) => &path.span,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.span().text()
    }

    /// Evaluate against `ctx`. With `lenient`, an undefined variable is
    /// nil even in strict mode.
    pub fn evaluate(&self, ctx: &Context<'_>, lenient: bool) -> Result<Value, Error> {
        match self {
            Self::Literal { value, .. } => Ok(value.clone()),
            Self::Path(path) => path.evaluate(ctx, lenient),
            Self::Range { low, high, .. } => {
                let low = low.evaluate(ctx, lenient)?.as_integer().unwrap_or(0);
                let high = high.evaluate(ctx, lenient)?.as_integer().unwrap_or(0);
                let count = high.saturating_sub(low).saturating_add(1).max(0);
                ctx.charge(usize::try_from(count).unwrap_or(usize::MAX))?;
                Ok(Value::Array((low..=high).map(Value::Integer).collect()))
            }
        }
    }
}

impl PropertyPath {
    fn evaluate(&self, ctx: &Context<'_>, lenient: bool) -> Result<Value, Error> {
        let mut keys = Vec::with_capacity(self.props.len() + 1);
        let base = match &self.root {
            Root::Variable(name) => {
                keys.push(Value::String(name.clone()));
                None
            }
            Root::Index(expr) => {
                keys.push(expr.evaluate(ctx, lenient)?);
                None
            }
            Root::Value(expr) => Some(expr.evaluate(ctx, lenient)?),
        };
        for prop in &self.props {
            keys.push(match prop {
                Prop::Key(key) => Value::String(key.clone()),
                Prop::Index(expr) => expr.evaluate(ctx, lenient)?,
            });
        }
        ctx.resolve(base.as_ref(), &keys, self.span.text(), lenient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    Not,
    And,
    Or,
}

impl Operator {
    /// Comparisons bind tighter than `not`, which binds tighter than
    /// `and` and `or`.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Eq | Self::Ne | Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Contains => 2,
            Self::Not => 1,
            Self::And | Self::Or => 0,
        }
    }

    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Not)
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::{Greater, Less};
        match self {
            Self::Eq => lhs.equals(rhs),
            Self::Ne => !lhs.equals(rhs),
            Self::Lt => lhs.compare(rhs) == Some(Less),
            Self::Gt => lhs.compare(rhs) == Some(Greater),
            Self::Le => lhs.compare(rhs).is_some_and(|o| o != Greater) || lhs.equals(rhs),
            Self::Ge => lhs.compare(rhs).is_some_and(|o| o != Less) || lhs.equals(rhs),
            Self::Contains => lhs.contains(rhs),
            Self::Not => !rhs.is_truthy(),
            Self::And => lhs.is_truthy() && rhs.is_truthy(),
            Self::Or => lhs.is_truthy() || rhs.is_truthy(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Contains => "contains",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

#[derive(Debug, Clone)]
pub enum ExprToken {
    Operand(ValueExpr),
    Operator(Operator, Span),
}

/// Operator expression in postfix order.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub postfix: Vec<ExprToken>,
}

impl Expression {
    /// Reorder infix tokens into postfix with the shunting-yard
    /// algorithm. Binary operators are left-associative; a prefix
    /// `not` waits on the stack for its operand.
    #[must_use]
    pub fn from_infix(tokens: Vec<ExprToken>) -> Self {
        let mut postfix = Vec::with_capacity(tokens.len());
        let mut ops: Vec<(Operator, Span)> = Vec::new();

        for token in tokens {
            match token {
                ExprToken::Operand(_) => postfix.push(token),
                ExprToken::Operator(op, span) => {
                    if !op.is_unary() {
                        while let Some((top, _)) = ops.last() {
                            if top.precedence() < op.precedence() {
                                break;
                            }
                            if let Some((top, top_span)) = ops.pop() {
                                postfix.push(ExprToken::Operator(top, top_span));
                            }
                        }
                    }
                    ops.push((op, span));
                }
            }
        }
        while let Some((op, span)) = ops.pop() {
            postfix.push(ExprToken::Operator(op, span));
        }

        Self { postfix }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// The only operand, if this expression has no operators.
    #[must_use]
    pub fn single(&self) -> Option<&ValueExpr> {
        match self.postfix.as_slice() {
            [ExprToken::Operand(value)] => Some(value),
            _ => None,
        }
    }

    /// Check that every operator has its operands and exactly one value
    /// remains. Returns the offending operator's span otherwise.
    pub(crate) fn validate(&self) -> Result<(), Option<Span>> {
        let mut depth = 0usize;
        for token in &self.postfix {
            match token {
                ExprToken::Operand(_) => depth += 1,
                ExprToken::Operator(op, span) => {
                    let needed = if op.is_unary() { 1 } else { 2 };
                    if depth < needed {
                        return Err(Some(span.clone()));
                    }
                    depth -= needed - 1;
                }
            }
        }
        if depth > 1 || (depth == 0 && !self.postfix.is_empty()) {
            return Err(None);
        }
        Ok(())
    }

    /// Evaluate the postfix sequence. Both operands of `and` and `or`
    /// are always evaluated. `lenient` only applies when the expression
    /// is a single operand.
    pub fn evaluate(&self, ctx: &Context<'_>, lenient: bool) -> Result<Value, Error> {
        let lenient = lenient && self.postfix.len() == 1;
        let mut stack: Vec<Value> = Vec::new();

        for token in &self.postfix {
            match token {
                ExprToken::Operand(value) => stack.push(value.evaluate(ctx, lenient)?),
                ExprToken::Operator(op, _) => {
                    let rhs = stack.pop().unwrap_or_default();
                    let lhs = if op.is_unary() {
                        Value::Nil
                    } else {
                        stack.pop().unwrap_or_default()
                    };
                    stack.push(Value::Bool(op.apply(&lhs, &rhs)));
                }
            }
        }

        Ok(stack.pop().unwrap_or_default())
    }

    /// Evaluate and test truthiness.
    pub fn is_truthy(&self, ctx: &Context<'_>, lenient: bool) -> Result<bool, Error> {
        Ok(self.evaluate(ctx, lenient)?.is_truthy())
    }
}

#[derive(Debug, Clone)]
pub enum FilterArg {
    Positional(ValueExpr),
    Named(String, ValueExpr),
}

/// `| name: arg, key: value`
#[derive(Debug, Clone)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<FilterArg>,
    pub span: Span,
}

impl FilterCall {
    /// Unregistered filters pass the input through, unless strict
    /// filters are enabled.
    async fn apply(&self, input: Value, ctx: &Context<'_>) -> Result<Value, Error> {
        let Some(filter) = ctx.engine().filter(&self.name) else {
            if ctx.config().strict_filters {
                return Err(RenderErrorKind::UndefinedFilter {
                    name: self.name.clone(),
                }
                .into());
            }
            return Ok(input);
        };

        let mut args = FilterArgs::default();
        for arg in &self.args {
            match arg {
                FilterArg::Positional(expr) => args.positional.push(expr.evaluate(ctx, false)?),
                FilterArg::Named(key, expr) => {
                    args.named.push((key.clone(), expr.evaluate(ctx, false)?));
                }
            }
        }

        tracing::trace!(filter = %self.name, "apply filter");
        filter
            .call(input, &args, ctx)
            .await
            .map_err(|err| match err {
                Error::Render(e) if e.span.is_none() => match e.kind {
                    RenderErrorKind::Custom(message) => RenderErrorKind::Filter {
                        name: self.name.clone(),
                        message,
                    }
                    .into(),
                    kind => Error::Render(RenderError::new(kind)),
                },
                other => other,
            })
    }
}

/// An expression followed by a filter pipeline.
#[derive(Debug, Clone)]
pub struct FilteredValue {
    pub initial: Expression,
    pub filters: Vec<FilterCall>,
    pub span: Span,
}

impl FilteredValue {
    /// With `lenientIf`, a pipeline starting with `default` tolerates
    /// an undefined initial value.
    pub async fn value(&self, ctx: &Context<'_>, lenient: bool) -> Result<Value, Error> {
        let lenient = lenient
            || (ctx.config().lenient_if
                && self.filters.first().is_some_and(|f| f.name == "default"));
        let mut value = self.initial.evaluate(ctx, lenient)?;
        for filter in &self.filters {
            value = filter.apply(value, ctx).await?;
        }
        Ok(value)
    }

    /// Whether the pipeline ends with the `raw` marker.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.filters.last().is_some_and(|f| f.name == "raw")
    }
}

/// `key: value, flag` argument list. A bare key is `true`.
#[derive(Debug, Clone, Default)]
pub struct Hash {
    pub entries: Vec<(String, Option<ValueExpr>)>,
}

impl Hash {
    pub fn render(&self, ctx: &Context<'_>) -> Result<Object, Error> {
        let mut out = Object::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            let value = match value {
                Some(expr) => expr.evaluate(ctx, false)?,
                None => Value::Bool(true),
            };
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Option<ValueExpr>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn values(&self) -> impl Iterator<Item = &ValueExpr> {
        self.entries.iter().filter_map(|(_, v)| v.as_ref())
    }
}
