//! # Routine — Update Logic That Spans Several Steps
//!
//! A [`Routine`] is an explicit resumable computation. The scheduler calls
//! [`resume`](Routine::resume) once per pull until it reports
//! [`Resume::Complete`]; every [`Resume::Yield`] ends the current step and the
//! next pull picks up right there.
//!
//! ## Composition
//!
//! A routine can delegate with [`Resume::Call`]. The callee runs immediately in
//! the same step; its yields become yields of the outer sequence; when it
//! completes the caller is resumed, again in the same step. The scheduler keeps
//! a small stack per behavior, so "one routine with five yields" and "a
//! routine calling two sub-routines with five yields between them" look the
//! same from the outside.
//!
//! ```text
//!  on_update ──Run──▶ Walk ──Call──▶ wait_steps(2)
//!                      │               yield  (step ends)
//!                      │               yield  (step ends)
//!                      │◀──Complete────┘
//!                      Complete               (step ends, update done)
//! ```
//!
//! Routines are owned by the step sequence, not by the behavior. If the driver
//! abandons the frame, in-flight routines are dropped with it and the next
//! frame calls `on_update` from the top.

use std::collections::VecDeque;

use super::context::HookContext;
use crate::error::BehaviorError;

/// Outcome of one [`Routine::resume`] call.
pub enum Resume {
    /// Suspend; resume here on the next pull.
    Yield,
    /// Finished.
    Complete,
    /// Run this sub-routine to completion, then resume the caller.
    Call(Box<dyn Routine>),
}

impl Resume {
    pub fn call(routine: impl Routine + 'static) -> Self {
        Self::Call(Box::new(routine))
    }
}

impl std::fmt::Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yield => f.write_str("Yield"),
            Self::Complete => f.write_str("Complete"),
            Self::Call(_) => f.write_str("Call(..)"),
        }
    }
}

/// A resumable computation driven by the scheduler.
///
/// `cx` gives access to the owning entity's behaviors, including the owner
/// itself via [`HookContext::owner_mut`].
pub trait Routine {
    fn resume(&mut self, cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError>;
}

impl Routine for Box<dyn Routine> {
    fn resume(&mut self, cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError> {
        (**self).resume(cx)
    }
}

// ── Combinators ───────────────────────────────────────────────────────

/// A routine backed by a closure. The closure is called once per resume.
pub struct FromFn<F> {
    f: F,
}

impl<F> Routine for FromFn<F>
where
    F: FnMut(&mut HookContext<'_>) -> Result<Resume, BehaviorError>,
{
    fn resume(&mut self, cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError> {
        (self.f)(cx)
    }
}

/// Build a routine from a closure.
///
/// ```ignore
/// let mut left = 3;
/// routine::from_fn(move |_cx| {
///     left -= 1;
///     Ok(if left == 0 { Resume::Complete } else { Resume::Yield })
/// })
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut HookContext<'_>) -> Result<Resume, BehaviorError>,
{
    FromFn { f }
}

/// Yields `count` times, then completes.
#[derive(Debug, Clone, Copy)]
pub struct WaitSteps {
    remaining: u32,
}

pub fn wait_steps(count: u32) -> WaitSteps {
    WaitSteps { remaining: count }
}

impl Routine for WaitSteps {
    fn resume(&mut self, _cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError> {
        if self.remaining == 0 {
            return Ok(Resume::Complete);
        }
        self.remaining -= 1;
        Ok(Resume::Yield)
    }
}

/// Runs `body(i)` then yields, for `i` in `0..count`. Handy for per-frame
/// animation stepping.
pub struct Repeat<F> {
    index: u32,
    count: u32,
    body: F,
}

pub fn repeat<F>(count: u32, body: F) -> Repeat<F>
where
    F: FnMut(u32, &mut HookContext<'_>) -> Result<(), BehaviorError>,
{
    Repeat {
        index: 0,
        count,
        body,
    }
}

impl<F> Routine for Repeat<F>
where
    F: FnMut(u32, &mut HookContext<'_>) -> Result<(), BehaviorError>,
{
    fn resume(&mut self, cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError> {
        if self.index >= self.count {
            return Ok(Resume::Complete);
        }
        (self.body)(self.index, cx)?;
        self.index += 1;
        Ok(Resume::Yield)
    }
}

/// Runs child routines one after another, flattening their yields.
#[derive(Default)]
pub struct Sequence {
    queue: VecDeque<Box<dyn Routine>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, routine: impl Routine + 'static) -> Self {
        self.queue.push_back(Box::new(routine));
        self
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

pub fn sequence(routines: Vec<Box<dyn Routine>>) -> Sequence {
    Sequence {
        queue: routines.into(),
    }
}

impl Routine for Sequence {
    fn resume(&mut self, _cx: &mut HookContext<'_>) -> Result<Resume, BehaviorError> {
        match self.queue.pop_front() {
            Some(next) => Ok(Resume::Call(next)),
            None => Ok(Resume::Complete),
        }
    }
}
