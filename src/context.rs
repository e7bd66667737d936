//! Variable scopes and per-render state.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::Liquid;
use crate::error::{Error, RenderErrorKind};
use crate::limiter::{Deadline, LimitKind, Limiter};
use crate::options::RenderConfig;
use crate::tags::layout::{BlockLayer, BlockMode};
use crate::value::{Object, Value};

/// State shared by a top-level render and every context spawned from
/// it. A runaway partial trips the budget of the render that started it.
#[derive(Debug)]
pub struct RenderSession {
    pub memory: Limiter,
    pub deadline: Deadline,
    /// Set for the synchronous driver, which never awaits.
    pub sync: bool,
}

/// Pending `break` or `continue`, consumed by the innermost loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Break,
    Continue,
}

/// Per-context bookkeeping for stateful tags.
#[derive(Default)]
pub struct Registers {
    /// `cycle` positions, by group key.
    pub cycles: HashMap<String, usize>,
    /// `offset: continue` resume points, by loop key.
    pub for_offsets: HashMap<String, usize>,
    /// `increment` and `decrement` counters.
    pub counters: HashMap<String, i64>,
    pub block_mode: BlockMode,
    /// Block overrides collected while rendering a layout child, most
    /// derived first.
    pub blocks: HashMap<String, Vec<BlockLayer>>,
    custom: HashMap<String, Box<dyn Any>>,
}

impl Registers {
    /// Value stored by a custom tag.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.custom.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.custom.get_mut(key)?.downcast_mut()
    }

    pub fn set<T: 'static>(&mut self, key: impl Into<String>, value: T) {
        self.custom.insert(key.into(), Box::new(value));
    }

    /// Detach block state, leaving a fresh output-mode state behind.
    pub fn take_blocks(&mut self) -> (BlockMode, HashMap<String, Vec<BlockLayer>>) {
        (
            std::mem::take(&mut self.block_mode),
            std::mem::take(&mut self.blocks),
        )
    }

    pub fn restore_blocks(&mut self, saved: (BlockMode, HashMap<String, Vec<BlockLayer>>)) {
        (self.block_mode, self.blocks) = saved;
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registers")
            .field("cycles", &self.cycles)
            .field("for_offsets", &self.for_offsets)
            .field("counters", &self.counters)
            .field("block_mode", &self.block_mode)
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Variable resolution environment for one render.
///
/// Names resolve against the innermost scope that defines them, then
/// the render data, then the engine globals.
pub struct Context<'e> {
    engine: &'e Liquid,
    config: Rc<RenderConfig>,
    session: Rc<RenderSession>,
    environment: Value,
    scopes: Vec<Object>,
    registers: Registers,
    interrupt: Option<Interrupt>,
}

impl<'e> Context<'e> {
    #[must_use]
    pub fn new(engine: &'e Liquid, config: RenderConfig, data: Value, sync: bool) -> Self {
        let session = RenderSession {
            memory: Limiter::new(LimitKind::Memory, config.memory_limit),
            deadline: Deadline::new(config.render_limit.map(Duration::from_millis)),
            sync,
        };
        Self {
            engine,
            config: Rc::new(config),
            session: Rc::new(session),
            environment: data,
            scopes: vec![Object::new()],
            registers: Registers::default(),
            interrupt: None,
        }
    }

    /// Isolated child context: `scope` is its only local binding set and
    /// the caller's data, scopes and registers are invisible. Limits and
    /// globals are shared.
    #[must_use]
    pub fn spawn(&self, scope: Object) -> Self {
        Self {
            engine: self.engine,
            config: Rc::clone(&self.config),
            session: Rc::clone(&self.session),
            environment: Value::Nil,
            scopes: vec![scope],
            registers: Registers::default(),
            interrupt: None,
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &'e Liquid {
        self.engine
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.session.sync
    }

    /// Charge `amount` against the memory budget before allocating it.
    pub fn charge(&self, amount: usize) -> Result<(), Error> {
        Ok(self.session.memory.charge(amount)?)
    }

    pub fn push(&mut self, scope: Object) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<Object> {
        // the bottom scope belongs to the whole render
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Outermost scope, where `assign` and `capture` write.
    pub fn bottom_mut(&mut self) -> &mut Object {
        if self.scopes.is_empty() {
            self.scopes.push(Object::new());
        }
        &mut self.scopes[0]
    }

    /// Innermost scope.
    pub fn top_mut(&mut self) -> &mut Object {
        if self.scopes.is_empty() {
            self.scopes.push(Object::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }

    pub const fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub const fn set_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt = Some(interrupt);
    }

    pub const fn take_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupt.take()
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        self.interrupt.is_some()
    }

    /// Look up a top-level name without strict-mode errors.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Some(value) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return Some(Cow::Borrowed(value));
        }
        if let Some(value) = self
            .environment
            .property(&Value::from(name), self.config.own_property_only)
        {
            return Some(value);
        }
        self.config.globals.get(name).map(Cow::Borrowed)
    }

    /// Resolve a property chain. Without a `base`, `keys[0]` names the
    /// root variable. `expression` is the source text, for errors.
    pub fn resolve(
        &self,
        base: Option<&Value>,
        keys: &[Value],
        expression: &str,
        lenient: bool,
    ) -> Result<Value, Error> {
        let own_only = self.config.own_property_only;
        let (start, rest, consumed) = match base {
            Some(value) => (Some(Cow::Borrowed(value)), keys, 0),
            None => {
                let Some((root, rest)) = keys.split_first() else {
                    return Ok(Value::Nil);
                };
                (self.find(&root.to_output()), rest, 1)
            }
        };

        let Some(start) = start else {
            return self.undefined(base.is_some(), keys, 1, expression, lenient);
        };
        match walk(&start, rest, own_only) {
            Ok(value) => Ok(value.into_owned()),
            Err(depth) => {
                self.undefined(base.is_some(), keys, consumed + depth + 1, expression, lenient)
            }
        }
    }

    fn undefined(
        &self,
        from_value: bool,
        keys: &[Value],
        count: usize,
        expression: &str,
        lenient: bool,
    ) -> Result<Value, Error> {
        if lenient || !self.config.strict_variables {
            return Ok(Value::Nil);
        }
        let path = if from_value {
            expression.to_string()
        } else {
            keys[..count.min(keys.len())]
                .iter()
                .map(|k| k.to_output().into_owned())
                .collect::<Vec<_>>()
                .join(".")
        };
        Err(RenderErrorKind::UndefinedVariable {
            path,
            expression: expression.to_string(),
        }
        .into())
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scopes", &self.scopes)
            .field("registers", &self.registers)
            .field("sync", &self.session.sync)
            .finish_non_exhaustive()
    }
}

/// Follow `keys` from `value`. On failure, returns how many keys
/// resolved before the missing one.
fn walk<'v>(value: &'v Value, keys: &[Value], own_only: bool) -> Result<Cow<'v, Value>, usize> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(Cow::Borrowed(value));
    };
    match value.property(key, own_only) {
        None => Err(0),
        Some(Cow::Borrowed(next)) => walk(next, rest, own_only).map_err(|d| d + 1),
        Some(Cow::Owned(next)) => walk(&next, rest, own_only)
            .map(|v| Cow::Owned(v.into_owned()))
            .map_err(|d| d + 1),
    }
}
