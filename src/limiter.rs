//! Resource budgets for a single render or parse.

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Cumulative length of strings, arrays and ranges produced.
    Memory,
    /// Wall-clock render time in milliseconds.
    Render,
    /// Source length in bytes.
    Parse,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Render => f.write_str("render"),
            Self::Parse => f.write_str("parse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} limit exceeded (limit {limit})")]
pub struct LimitError {
    pub kind: LimitKind,
    pub limit: u64,
}

/// Monotonic counter checked against an optional bound.
///
/// Charges are made before the corresponding allocation, so an
/// oversized request fails without allocating.
#[derive(Debug)]
pub struct Limiter {
    kind: LimitKind,
    limit: Option<u64>,
    used: Cell<u64>,
}

impl Limiter {
    #[must_use]
    pub const fn new(kind: LimitKind, limit: Option<u64>) -> Self {
        Self {
            kind,
            limit,
            used: Cell::new(0),
        }
    }

    /// Add `amount` to the counter.
    ///
    /// # Errors
    ///
    /// Returns `LimitError` when the total would exceed the bound. The
    /// counter is left unchanged in that case.
    pub fn charge(&self, amount: usize) -> Result<(), LimitError> {
        let amount = u64::try_from(amount).unwrap_or(u64::MAX);
        let total = self.used.get().saturating_add(amount);
        if let Some(limit) = self.limit {
            if total > limit {
                tracing::debug!(kind = %self.kind, limit, requested = amount, "limit exceeded");
                return Err(LimitError {
                    kind: self.kind,
                    limit,
                });
            }
        }
        self.used.set(total);
        Ok(())
    }

    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used.get()
    }
}

/// Fixed render deadline, checked between sibling nodes.
#[derive(Debug)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    #[must_use]
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// # Errors
    ///
    /// Returns `LimitError` once the deadline has passed.
    pub fn check(&self) -> Result<(), LimitError> {
        match self.limit {
            Some(limit) if self.start.elapsed() > limit => {
                tracing::debug!(limit_ms = limit.as_millis(), "render deadline passed");
                Err(LimitError {
                    kind: LimitKind::Render,
                    limit: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
            _ => Ok(()),
        }
    }
}
