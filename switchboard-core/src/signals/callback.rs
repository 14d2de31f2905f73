//! Callbacks that can be connected to a signal.
//!
//! Rust closures have no identity of their own, so a [`Callback`] wraps one
//! together with a [`CallbackId`]. Clones share the id and count as the same
//! callback for uniqueness checks and disconnection.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CallbackError;

/// Unique identifier for a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Generate a new unique callback ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback#{}", self.0)
    }
}

type ErasedFn = dyn Fn(&dyn Any) -> Result<(), CallbackError>;

/// Argument-erased form stored in connection nodes.
#[derive(Clone)]
pub(crate) struct ErasedCallback {
    id: CallbackId,
    func: Rc<ErasedFn>,
}

impl ErasedCallback {
    pub(crate) fn id(&self) -> CallbackId {
        self.id
    }

    /// Invoke with type-erased arguments.
    ///
    /// The wrapped function checks the argument type itself; see
    /// [`Callback::new`].
    pub(crate) fn invoke(&self, args: &dyn Any) -> Result<(), CallbackError> {
        (self.func)(args)
    }
}

impl fmt::Debug for ErasedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErasedCallback").field(&self.id).finish()
    }
}

/// A connectable callback receiving `&A`.
///
/// # Example
///
/// ```rust,ignore
/// let on_tick = Callback::new(|n: &u32| {
///     println!("tick {n}");
///     Ok(())
/// });
/// ```
pub struct Callback<A: 'static> {
    erased: ErasedCallback,
    _args: PhantomData<fn(&A)>,
}

impl<A: 'static> Callback<A> {
    /// Wrap a fallible function.
    ///
    /// An `Err` returned from the function aborts the emission that invoked
    /// it and is handed back to the `emit` caller.
    ///
    /// Tokens fix the argument type of a signal, so the downcast of the
    /// erased arguments only misses if the callback is reached through a
    /// foreign token. The call is then skipped and reports `Ok`.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&A) -> Result<(), CallbackError> + 'static,
    {
        let func: Rc<ErasedFn> = Rc::new(move |args: &dyn Any| match args.downcast_ref::<A>() {
            Some(args) => func(args),
            None => Ok(()),
        });

        Self {
            erased: ErasedCallback {
                id: CallbackId::new(),
                func,
            },
            _args: PhantomData,
        }
    }

    /// Wrap a function that cannot fail.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&A) + 'static,
    {
        Self::new(move |args| {
            func(args);
            Ok(())
        })
    }

    /// Get the callback's unique ID.
    pub fn id(&self) -> CallbackId {
        self.erased.id
    }

    /// Call the function directly, outside of any emission.
    pub fn call(&self, args: &A) -> Result<(), CallbackError> {
        self.erased.invoke(args)
    }

    pub(crate) fn erased(&self) -> &ErasedCallback {
        &self.erased
    }
}

impl<A: 'static> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            erased: self.erased.clone(),
            _args: PhantomData,
        }
    }
}

impl<A: 'static> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.erased.id == other.erased.id
    }
}

impl<A: 'static> Eq for Callback<A> {}

impl<A: 'static> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.erased.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn clones_share_identity() {
        let a = Callback::from_fn(|_: &i32| {});
        let b = a.clone();
        let c = Callback::from_fn(|_: &i32| {});

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn call_forwards_arguments() {
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let callback = Callback::from_fn(move |v: &i32| seen_clone.set(*v));

        callback.call(&7).unwrap();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn erased_invoke_skips_foreign_arguments() {
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let callback = Callback::from_fn(move |_: &i32| hits_clone.set(hits_clone.get() + 1));

        callback.erased().invoke(&"not an i32").unwrap();
        assert_eq!(hits.get(), 0);

        callback.erased().invoke(&1_i32).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn errors_are_returned() {
        let callback = Callback::new(|_: &()| Err("boom".into()));
        let err = callback.call(&()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
