//! Expression reader over the content of a tag or output token.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

use crate::chars;
use crate::error::Error;
use crate::expression::{
    ExprToken, Expression, FilterArg, FilterCall, FilteredValue, Hash, Operator, Prop,
    PropertyPath, Root, ValueExpr,
};
use crate::lexer::{LexError, LexErrorKind};
use crate::parser::{ParseError, ParseErrorKind};
use crate::token::{Source, Span, Token};
use crate::trie::Trie;
use crate::value::{BlankDrop, EmptyDrop, Value};

static OPERATORS: LazyLock<Trie<Operator>> = LazyLock::new(|| {
    Trie::new([
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        ("<>", Operator::Ne),
        ("<", Operator::Lt),
        (">", Operator::Gt),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("contains", Operator::Contains),
        ("not", Operator::Not),
        ("and", Operator::And),
        ("or", Operator::Or),
    ])
});

#[derive(Debug, Clone, Copy)]
enum Literal {
    True,
    False,
    Nil,
    Empty,
    Blank,
}

static LITERALS: LazyLock<Trie<Literal>> = LazyLock::new(|| {
    Trie::new([
        ("true", Literal::True),
        ("false", Literal::False),
        ("nil", Literal::Nil),
        ("null", Literal::Nil),
        ("empty", Literal::Empty),
        ("blank", Literal::Blank),
    ])
});

/// Cursor over a byte range of a template source.
pub struct Tokenizer<'a> {
    source: &'a Arc<Source>,
    input: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(source: &'a Arc<Source>, range: Range<usize>) -> Self {
        Self {
            source,
            input: &source.text,
            pos: range.start,
            end: range.end,
        }
    }

    /// Reader over a tag's arguments or an output's content.
    #[must_use]
    pub fn for_token(token: &'a Token) -> Self {
        Self::new(&token.span.source, token.inner_range())
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub const fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..self.end]
    }

    /// Unread text, without surrounding blanks.
    #[must_use]
    pub fn remaining(&self) -> &'a str {
        self.rest().trim_matches(chars::is_blank)
    }

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_blank(&mut self) {
        while self.peek().is_some_and(chars::is_blank) {
            self.bump();
        }
    }

    /// True once only blanks remain.
    pub fn is_end(&mut self) -> bool {
        self.skip_blank();
        self.pos >= self.end
    }

    #[must_use]
    pub fn span_from(&self, start: usize) -> Span {
        Span::new(self.source, start..self.pos)
    }

    /// Consume `s` if the input continues with it.
    pub fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consume the keyword `word` when it stands alone.
    pub fn eat_word(&mut self, word: &str) -> bool {
        let rest = self.rest();
        let bounded = rest.starts_with(word)
            && rest[word.len()..]
                .chars()
                .next()
                .is_none_or(|c| !chars::is_word(c));
        if bounded {
            self.pos += word.len();
        }
        bounded
    }

    /// Parse error at the current position.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Error {
        let end = (self.pos + self.rest().chars().next().map_or(0, char::len_utf8)).min(self.end);
        ParseError {
            kind: ParseErrorKind::InvalidSyntax {
                message: message.into(),
            },
            span: Span::new(self.source, self.pos..end),
        }
        .into()
    }

    /// Fail unless only blanks remain.
    pub fn expect_end(&mut self) -> Result<(), Error> {
        if self.is_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected \"{}\"", self.remaining())))
        }
    }

    pub fn read_identifier(&mut self) -> Option<String> {
        self.skip_blank();
        let start = self.pos;
        while self.peek().is_some_and(chars::is_word) {
            self.bump();
        }
        (self.pos > start).then(|| self.input[start..self.pos].to_string())
    }

    fn read_operator(&mut self) -> Option<(Operator, Span)> {
        self.skip_blank();
        let (op, len) = OPERATORS.longest_match(self.rest())?;
        let start = self.pos;
        self.pos += len;
        Some((op, self.span_from(start)))
    }

    fn read_literal(&mut self) -> Option<ValueExpr> {
        let (literal, len) = LITERALS.longest_match(self.rest())?;
        let start = self.pos;
        self.pos += len;
        let value = match literal {
            Literal::True => Value::Bool(true),
            Literal::False => Value::Bool(false),
            Literal::Nil => Value::Nil,
            Literal::Empty => Value::drop(EmptyDrop),
            Literal::Blank => Value::drop(BlankDrop),
        };
        Some(ValueExpr::Literal {
            value,
            span: self.span_from(start),
        })
    }

    /// Signed integer or decimal. Rejected when an identifier character
    /// follows, so `1st` reads as a variable.
    fn read_number(&mut self) -> Option<ValueExpr> {
        let mut n = 0;
        let mut digits = false;
        let mut decimal = false;
        if self.peek().is_some_and(chars::is_sign) {
            n += 1;
        }
        while let Some(c) = self.peek_at(n) {
            if chars::is_digit(c) {
                digits = true;
            } else if c == '.' && self.peek_at(n + 1) != Some('.') {
                if decimal || !digits {
                    return None;
                }
                decimal = true;
            } else {
                break;
            }
            n += 1;
        }
        if !digits || self.peek_at(n).is_some_and(chars::is_word) {
            return None;
        }

        // every char counted above is ASCII
        let start = self.pos;
        let text = &self.input[start..start + n];
        let value = if decimal {
            Value::Float(text.parse().ok()?)
        } else {
            text.parse()
                .map_or_else(|_| Value::Float(text.parse().unwrap_or(f64::NAN)), Value::Integer)
        };
        self.pos += n;
        Some(ValueExpr::Literal {
            value,
            span: self.span_from(start),
        })
    }

    fn read_quoted(&mut self) -> Result<Option<ValueExpr>, Error> {
        let Some(quote) = self.peek().filter(|c| chars::is_quote(*c)) else {
            return Ok(None);
        };
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedQuote,
                        span: Span::new(self.source, start..self.end),
                    }
                    .into());
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }
        let raw = &self.input[start + 1..self.pos - 1];
        Ok(Some(ValueExpr::Literal {
            value: Value::String(unescape(raw)),
            span: self.span_from(start),
        }))
    }

    fn read_range(&mut self) -> Result<Option<ValueExpr>, Error> {
        if self.peek() != Some('(') {
            return Ok(None);
        }
        let start = self.pos;
        self.bump();
        let low = self.read_value()?.ok_or_else(|| self.error("invalid range start"))?;
        self.skip_blank();
        if !self.eat("..") {
            return Err(self.error("expected \"..\" in range"));
        }
        let high = self.read_value()?.ok_or_else(|| self.error("invalid range end"))?;
        self.skip_blank();
        if !self.eat(")") {
            return Err(self.error("expected \")\" to close range"));
        }
        Ok(Some(ValueExpr::Range {
            low: Box::new(low),
            high: Box::new(high),
            span: self.span_from(start),
        }))
    }

    /// `[index]` and `.key` segments. Without a `base`, the first
    /// segment may be a bare identifier naming the root variable.
    fn read_properties(
        &mut self,
        start: usize,
        base: Option<ValueExpr>,
    ) -> Result<Option<ValueExpr>, Error> {
        let mut root = base.map(|b| Root::Value(Box::new(b)));
        let mut props = Vec::new();

        loop {
            if self.peek() == Some('[') {
                self.bump();
                let index = self
                    .read_value()?
                    .ok_or_else(|| self.error("expected value in brackets"))?;
                self.skip_blank();
                if !self.eat("]") {
                    return Err(self.error("expected \"]\""));
                }
                if root.is_none() {
                    root = Some(Root::Index(Box::new(index)));
                } else {
                    props.push(Prop::Index(index));
                }
                continue;
            }
            if root.is_none() {
                if let Some(name) = self.read_name() {
                    root = Some(Root::Variable(name));
                    continue;
                }
            }
            if root.is_some() && self.peek() == Some('.') && self.peek_at(1) != Some('.') {
                let dot = self.pos;
                self.bump();
                match self.read_name() {
                    Some(key) => props.push(Prop::Key(key)),
                    None => {
                        self.reset(dot);
                        break;
                    }
                }
                continue;
            }
            break;
        }

        let Some(root) = root else {
            return Ok(None);
        };
        if let Root::Value(base) = root {
            if props.is_empty() {
                return Ok(Some(*base));
            }
            return Ok(Some(ValueExpr::Path(PropertyPath {
                root: Root::Value(base),
                props,
                span: self.span_from(start),
            })));
        }
        Ok(Some(ValueExpr::Path(PropertyPath {
            root,
            props,
            span: self.span_from(start),
        })))
    }

    /// Identifier without skipping blanks first.
    fn read_name(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(chars::is_word) {
            self.bump();
        }
        (self.pos > start).then(|| self.input[start..self.pos].to_string())
    }

    /// One value: literal, string, range, number or variable path, with
    /// any trailing property accesses.
    pub fn read_value(&mut self) -> Result<Option<ValueExpr>, Error> {
        self.skip_blank();
        let start = self.pos;
        let base = match self.read_literal() {
            Some(v) => Some(v),
            None => match self.read_quoted()? {
                Some(v) => Some(v),
                None => match self.read_range()? {
                    Some(v) => Some(v),
                    None => self.read_number(),
                },
            },
        };
        self.read_properties(start, base)
    }

    /// Alternating values and operators, converted to postfix. Reading
    /// stops at the first token that is neither.
    pub fn read_expression(&mut self) -> Result<Expression, Error> {
        let start = self.pos;
        let mut tokens = Vec::new();
        loop {
            if let Some((op, span)) = self.read_operator() {
                tokens.push(ExprToken::Operator(op, span));
                continue;
            }
            if let Some(value) = self.read_value()? {
                tokens.push(ExprToken::Operand(value));
                continue;
            }
            break;
        }

        let expression = Expression::from_infix(tokens);
        if let Err(span) = expression.validate() {
            let span = span.unwrap_or_else(|| self.span_from(start));
            return Err(ParseError {
                kind: ParseErrorKind::InvalidExpression {
                    text: self.input[start..self.pos].trim().to_string(),
                },
                span,
            }
            .into());
        }
        Ok(expression)
    }

    /// `expression | filter: args | filter ...`
    pub fn read_filtered_value(&mut self) -> Result<FilteredValue, Error> {
        self.skip_blank();
        let start = self.pos;
        let initial = self.read_expression()?;
        let mut filters = Vec::new();
        while let Some(filter) = self.read_filter()? {
            filters.push(filter);
        }
        if initial.is_empty() && !filters.is_empty() {
            return Err(self.error("missing value before filter"));
        }
        Ok(FilteredValue {
            initial,
            filters,
            span: self.span_from(start),
        })
    }

    fn read_filter(&mut self) -> Result<Option<FilterCall>, Error> {
        self.skip_blank();
        if self.peek() != Some('|') {
            return Ok(None);
        }
        let start = self.pos;
        self.bump();
        let Some(name) = self.read_identifier() else {
            return Err(self.error("expected filter name"));
        };

        let mut args = Vec::new();
        self.skip_blank();
        if self.eat(":") {
            loop {
                if let Some(arg) = self.read_filter_arg()? {
                    args.push(arg);
                }
                self.skip_blank();
                if !self.eat(",") {
                    break;
                }
            }
        }
        if !self.is_end() && self.peek() != Some('|') {
            return Err(self.error(format!("unexpected character in filter \"{name}\"")));
        }
        Ok(Some(FilterCall {
            name,
            args,
            span: self.span_from(start),
        }))
    }

    fn read_filter_arg(&mut self) -> Result<Option<FilterArg>, Error> {
        let Some(key) = self.read_value()? else {
            return Ok(None);
        };
        self.skip_blank();
        if !self.eat(":") {
            return Ok(Some(FilterArg::Positional(key)));
        }
        let value = self
            .read_value()?
            .ok_or_else(|| self.error("expected value for named argument"))?;
        Ok(Some(FilterArg::Named(key.text().to_string(), value)))
    }

    /// `key: value, flag, other: value` until something else appears.
    pub fn read_hash(&mut self) -> Result<Hash, Error> {
        let mut hash = Hash::default();
        loop {
            self.skip_blank();
            self.eat(",");
            let Some(name) = self.read_identifier() else {
                break;
            };
            self.skip_blank();
            let value = if self.eat(":") {
                Some(
                    self.read_value()?
                        .ok_or_else(|| self.error(format!("expected value for \"{name}\"")))?,
                )
            } else {
                None
            };
            hash.entries.push((name, value));
        }
        Ok(hash)
    }

    /// Unquoted file name: everything up to a blank or comma.
    pub fn read_file_name(&mut self) -> Option<(String, Span)> {
        self.skip_blank();
        let start = self.pos;
        while self.peek().is_some_and(|c| !chars::is_blank(c) && c != ',') {
            self.bump();
        }
        (self.pos > start).then(|| (self.input[start..self.pos].to_string(), self.span_from(start)))
    }
}

/// Resolve escapes in a quoted string body: `\b \f \n \r \t \v`,
/// `\uXXXX`, octal `\0`..`\377`, and any other escaped char as itself.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut iter = raw.chars().peekable();
    while let Some(c) = iter.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = iter.next() else {
            break;
        };
        match next {
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    match iter.peek().and_then(|h| h.to_digit(16)) {
                        Some(d) => {
                            code = code * 16 + d;
                            iter.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match iter.peek().and_then(|o| o.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            iter.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
    }
    out
}
