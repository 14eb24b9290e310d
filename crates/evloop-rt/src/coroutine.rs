// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Suspendable functions.
//!
//! A coroutine runs until its next suspension point and reports one
//! [`Outcome`]. The scheduler resumes it later with a [`Pending`] input:
//! nothing on the first dispatch, the value it yielded last time, the
//! result of a delegated child, or the resource it waited on once that
//! resource is ready.

use std::fmt;
use std::rc::Rc;

use crate::error::TaskError;
use crate::resource::{Pollable, Resource};

/// Boxed coroutine as stored in task records and continuation stacks.
pub type BoxCoroutine<V> = Box<dyn Coroutine<V>>;

/// Input supplied on resumption. Also what a task record carries
/// between dispatch steps.
pub enum Pending<V> {
    /// Fresh start, or a yield/return that carried no value.
    Absent,
    Value(V),
    /// A resource the task is parked on. Handed back once ready.
    Resource(Resource),
}

impl<V> Pending<V> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Pending::Absent)
    }

    /// The plain value, if any. Resources map to `None`.
    pub fn into_value(self) -> Option<V> {
        match self {
            Pending::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Pending::Resource(r) => Some(r),
            _ => None,
        }
    }
}

impl<V> From<Option<V>> for Pending<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Pending::Value(v),
            None => Pending::Absent,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Pending<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Absent => f.write_str("Absent"),
            Pending::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Pending::Resource(r) => write!(f, "Resource(fd={})", r.token()),
        }
    }
}

/// What a coroutine produced at a suspension point.
pub enum Outcome<V> {
    /// Plain value, threaded back verbatim on the next resumption.
    Value(Option<V>),
    /// Park until the resource is readable.
    AwaitResource(Resource),
    /// Delegate to a child. Its final value becomes the result of this
    /// suspension point.
    AwaitChild(BoxCoroutine<V>),
    /// Finished with a final value.
    Done(Option<V>),
}

impl<V> Outcome<V> {
    /// Yield without a value. Used for plain "let others run" suspensions.
    pub fn tick() -> Self {
        Outcome::Value(None)
    }

    pub fn value(v: V) -> Self {
        Outcome::Value(Some(v))
    }

    pub fn done(v: V) -> Self {
        Outcome::Done(Some(v))
    }

    pub fn await_resource<R: Pollable + 'static>(resource: Rc<R>) -> Self {
        Outcome::AwaitResource(resource)
    }

    pub fn await_child(child: impl Coroutine<V> + 'static) -> Self {
        Outcome::AwaitChild(Box::new(child))
    }
}

impl<V: fmt::Debug> fmt::Debug for Outcome<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Outcome::AwaitResource(r) => write!(f, "AwaitResource(fd={})", r.token()),
            Outcome::AwaitChild(c) => write!(f, "AwaitChild({})", c.name()),
            Outcome::Done(v) => f.debug_tuple("Done").field(v).finish(),
        }
    }
}

/// A suspendable function driven by [`EventLoop`](crate::EventLoop).
///
/// `resume` runs until the next suspension point. Returning `Err`
/// aborts the task; there is no recovery inside the coroutine.
/// Coroutines must not block: I/O goes through
/// [`Outcome::AwaitResource`].
pub trait Coroutine<V> {
    fn resume(&mut self, input: Pending<V>) -> Result<Outcome<V>, TaskError>;

    /// True once the coroutine has returned `Done`. A completed coroutine
    /// is not a valid task.
    fn is_complete(&self) -> bool {
        false
    }

    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<V, C: Coroutine<V> + ?Sized> Coroutine<V> for Box<C> {
    fn resume(&mut self, input: Pending<V>) -> Result<Outcome<V>, TaskError> {
        (**self).resume(input)
    }

    fn is_complete(&self) -> bool {
        (**self).is_complete()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<V> fmt::Debug for dyn Coroutine<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.name())
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Coroutine backed by a closure holding its own state machine.
pub struct FnCoroutine<F> {
    name: String,
    step: F,
    complete: bool,
}

/// Wrap a closure as a coroutine. The closure is called once per
/// resumption; after it returns `Done` further resumptions fail with
/// [`TaskError::Exhausted`].
pub fn from_fn<V, F>(name: impl Into<String>, step: F) -> FnCoroutine<F>
where
    F: FnMut(Pending<V>) -> Result<Outcome<V>, TaskError>,
{
    FnCoroutine {
        name: name.into(),
        step,
        complete: false,
    }
}

impl<V, F> Coroutine<V> for FnCoroutine<F>
where
    F: FnMut(Pending<V>) -> Result<Outcome<V>, TaskError>,
{
    fn resume(&mut self, input: Pending<V>) -> Result<Outcome<V>, TaskError> {
        if self.complete {
            return Err(TaskError::Exhausted);
        }
        let outcome = (self.step)(input)?;
        if matches!(outcome, Outcome::Done(_)) {
            self.complete = true;
        }
        Ok(outcome)
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_tracks_completion() {
        let mut calls = 0;
        let mut co = from_fn("twice", move |_input: Pending<i32>| {
            calls += 1;
            if calls == 2 {
                Ok(Outcome::done(calls))
            } else {
                Ok(Outcome::tick())
            }
        });

        assert!(matches!(co.resume(Pending::Absent), Ok(Outcome::Value(None))));
        assert!(!co.is_complete());
        assert!(matches!(co.resume(Pending::Absent), Ok(Outcome::Done(Some(2)))));
        assert!(co.is_complete());
        assert!(matches!(co.resume(Pending::Absent), Err(TaskError::Exhausted)));
        assert_eq!(co.name(), "twice");
    }

    #[test]
    fn errors_propagate_without_completing() {
        let mut co = from_fn("fails", |_input: Pending<()>| Err(TaskError::failed("bad input")));
        assert!(co.resume(Pending::Absent).is_err());
        assert!(!co.is_complete());
    }

    #[test]
    fn pending_from_option() {
        let p: Pending<u8> = Some(3).into();
        assert_eq!(p.into_value(), Some(3));
        let p: Pending<u8> = None.into();
        assert!(p.is_absent());
    }
}
