//! Filter collaborator interface.

use std::fmt;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;
use crate::value::Value;

/// Evaluated arguments of a filter call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterArgs {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl FilterArgs {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    #[must_use]
    pub fn named(&self, key: &str) -> Option<&Value> {
        self.named.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A named post-processing function applied with `| name: args`.
///
/// Filters that build strings or arrays should charge their output size
/// with [`Context::charge`] before producing it.
#[async_trait(?Send)]
pub trait Filter: Send + Sync {
    async fn call(&self, input: Value, args: &FilterArgs, ctx: &Context<'_>)
    -> Result<Value, Error>;
}

/// Adapter for plain synchronous closures.
pub struct FnFilter<F>(pub F);

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFilter")
    }
}

#[async_trait(?Send)]
impl<F> Filter for FnFilter<F>
where
    F: Fn(Value, &FilterArgs, &Context<'_>) -> Result<Value, Error> + Send + Sync,
{
    async fn call(
        &self,
        input: Value,
        args: &FilterArgs,
        ctx: &Context<'_>,
    ) -> Result<Value, Error> {
        (self.0)(input, args, ctx)
    }
}

/// `raw`: identity that marks an output as exempt from escaping.
#[derive(Debug)]
pub struct Raw;

#[async_trait(?Send)]
impl Filter for Raw {
    async fn call(
        &self,
        input: Value,
        _args: &FilterArgs,
        _ctx: &Context<'_>,
    ) -> Result<Value, Error> {
        Ok(input)
    }
}
