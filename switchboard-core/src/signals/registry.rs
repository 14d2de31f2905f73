//! Signal Registry
//!
//! The registry is the dispatch engine. It owns the connection store and
//! implements connect, disconnect, emit and the bulk teardown operations on
//! top of it.
//!
//! # How Emission Works
//!
//! 1. The owner's entry records one more walker and we snapshot its head,
//!    tail and epoch.
//!
//! 2. The list is walked from head to the snapshotted tail. Connections
//!    added by a callback land after the tail and wait for the next emit.
//!
//! 3. Each step borrows the store just long enough to clone the callback,
//!    then releases it before calling out. Callbacks are free to connect,
//!    disconnect, emit or tear down anything, including the list being
//!    walked.
//!
//! 4. A drop guard leaves the walk on every exit path. The last walker out
//!    of a list that collected tombstones compacts it.
//!
//! Removed callbacks are never dropped while the store is borrowed. The
//! store hands them back in a [`Released`] buffer and each operation drops
//! it after its borrow ends, so a closure that owns an [`Endpoint`] may
//! reenter the registry from its destructor.
//!
//! [`Endpoint`]: super::Endpoint
//!
//! # Threading
//!
//! A registry is single-threaded (`!Sync`). Callbacks are `Rc`-based and are
//! never moved between threads. Hosts that need signals on several threads
//! keep one registry per thread; see [`global`](super::global).

use std::cell::RefCell;
use std::fmt;

use super::callback::Callback;
use super::context::ActiveEmission;
use super::handle::SignalHandle;
use super::identity::{HasObjectId, ObjectId, ReceiverKey};
use super::store::{RegistryStats, Released, Store};
use super::token::Token;
use crate::config::RegistryConfig;
use crate::error::SignalError;

/// Connection registry and dispatch engine.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Registry::new();
/// let button = ObjectId::new();
/// let clicked = Token::<u32>::new("clicked");
///
/// let on_click = Callback::from_fn(|n: &u32| println!("clicked {n} times"));
/// registry.connect(button, clicked, &on_click, None);
///
/// registry.emit(button, clicked, &1)?;
/// ```
pub struct Registry {
    store: RefCell<Store>,
}

impl Registry {
    /// Create an empty registry with default capacities.
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Create an empty registry sized by `config`.
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            store: RefCell::new(Store::new(config)),
        }
    }

    /// Connect `callback` to signal `token` on `owner`.
    ///
    /// `context`, when given, is the receiver the connection is filed under
    /// for [`disconnect_receiver`](Self::disconnect_receiver); otherwise the
    /// callback itself is. Returns `false` if the identical connection
    /// already exists.
    pub fn connect<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
        callback: &Callback<A>,
        context: Option<ObjectId>,
    ) -> bool {
        let owner = owner.object_id();
        let mut store = self.store.borrow_mut();

        if store
            .find_live(owner, token.id(), callback.id(), context)
            .is_some()
        {
            return false;
        }

        store.insert(
            owner,
            token.id(),
            token.name(),
            callback.erased().clone(),
            context,
        );
        tracing::trace!(
            owner = %owner,
            signal = token.name(),
            callback = %callback.id(),
            "connected"
        );
        true
    }

    /// Remove the connection made by the matching [`connect`](Self::connect).
    ///
    /// The connection stops firing immediately, even in an emission that is
    /// already in progress. Returns `false` if no such connection exists.
    pub fn disconnect<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
        callback: &Callback<A>,
        context: Option<ObjectId>,
    ) -> bool {
        let owner = owner.object_id();
        let mut released = Released::new();
        {
            let mut store = self.store.borrow_mut();
            let Some(key) = store.find_live(owner, token.id(), callback.id(), context) else {
                return false;
            };
            store.remove(key, &mut released);
        }
        drop(released);
        tracing::trace!(
            owner = %owner,
            signal = token.name(),
            callback = %callback.id(),
            "disconnected"
        );
        true
    }

    /// Fire signal `token` on `owner`, invoking every live matching
    /// connection in connect order.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Callback`] with the first callback error; the
    /// callbacks after it are not invoked.
    pub fn emit<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
        args: &A,
    ) -> Result<(), SignalError> {
        let owner = owner.object_id();
        let Some(bounds) = self.store.borrow_mut().begin_walk(owner) else {
            return Ok(());
        };
        tracing::trace!(owner = %owner, signal = token.name(), "emit");

        let emission = ActiveEmission::enter(owner);
        let _walk = WalkGuard {
            registry: self,
            owner,
            epoch: bounds.epoch,
        };

        let mut cursor = bounds.head;
        while let Some(key) = cursor {
            let Some(step) = self.store.borrow_mut().step(owner, key, token.id()) else {
                // Slot freed under us: the owner was torn down.
                break;
            };

            if let Some((callback, receiver, signal)) = step.callback {
                emission.set_receiver(receiver);
                callback
                    .invoke(args)
                    .map_err(|source| SignalError::Callback {
                        signal,
                        owner,
                        source,
                    })?;
            }

            if Some(key) == bounds.tail {
                break;
            }
            cursor = match self.store.borrow().next_of(key) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(())
    }

    /// Remove every connection `owner` emits to.
    ///
    /// Safe to call from a callback of `owner` itself: the running emission
    /// stops at the next step. Returns the number of live connections
    /// removed.
    pub fn disconnect_emitter(&self, owner: impl HasObjectId) -> usize {
        let owner = owner.object_id();
        let mut released = Released::new();
        let removed = self
            .store
            .borrow_mut()
            .remove_emitter(owner, &mut released);
        drop(released);

        let Some(removed) = removed else {
            return 0;
        };
        tracing::debug!(owner = %owner, removed, "disconnected emitter");
        removed
    }

    /// Remove every connection filed under `receiver`, across all emitters.
    ///
    /// The connections stop firing at once; their nodes are reclaimed when
    /// each owner next compacts. Returns the number of connections removed.
    pub fn disconnect_receiver(&self, receiver: impl Into<ReceiverKey>) -> usize {
        let receiver = receiver.into();
        let mut released = Released::new();
        let removed = self
            .store
            .borrow_mut()
            .remove_receiver(receiver, &mut released);
        drop(released);

        let Some(removed) = removed else {
            return 0;
        };
        tracing::debug!(receiver = %receiver, removed, "disconnected receiver");
        removed
    }

    /// Remove every connection made without a context for `callback`.
    pub fn disconnect_callback<A: 'static>(&self, callback: &Callback<A>) -> usize {
        self.disconnect_receiver(ReceiverKey::Callback(callback.id()))
    }

    /// Remove every connection in which `object` is the emitter or the
    /// context receiver.
    pub fn clear_signal_data(&self, object: impl HasObjectId) -> usize {
        let object = object.object_id();
        self.disconnect_emitter(object) + self.disconnect_receiver(object)
    }

    /// Compact every owner that holds tombstones and is not being emitted.
    ///
    /// Emission compacts on its own; this reclaims tombstones left on owners
    /// that have not emitted since. Returns the number of nodes freed.
    pub fn compact(&self) -> usize {
        let mut released = Released::new();
        let freed: usize = {
            let mut store = self.store.borrow_mut();
            store
                .idle_dirty_emitters()
                .into_iter()
                .map(|owner| store.compact(owner, &mut released))
                .sum()
        };
        drop(released);
        if freed > 0 {
            tracing::debug!(freed, "compacted registry");
        }
        freed
    }

    /// Whether the given connection exists and is live.
    pub fn is_connected<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
        callback: &Callback<A>,
        context: Option<ObjectId>,
    ) -> bool {
        self.store
            .borrow()
            .find_live(owner.object_id(), token.id(), callback.id(), context)
            .is_some()
    }

    /// Number of live connections to `token` on `owner`.
    pub fn connection_count<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
    ) -> usize {
        self.store
            .borrow()
            .live_count(owner.object_id(), Some(token.id()))
    }

    /// Whether `owner` has any live outgoing connection.
    pub fn has_connections(&self, owner: impl HasObjectId) -> bool {
        self.store.borrow().live_count(owner.object_id(), None) > 0
    }

    /// Whether `receiver` has any live incoming connection.
    pub fn has_receiver(&self, receiver: impl Into<ReceiverKey>) -> bool {
        self.store.borrow().has_receiver(receiver.into())
    }

    /// Whether `owner` currently has an emitter entry, live or not.
    pub fn has_emitter_entry(&self, owner: impl HasObjectId) -> bool {
        self.store.borrow().has_emitter(owner.object_id())
    }

    /// Counts of the registry contents.
    pub fn stats(&self) -> RegistryStats {
        self.store.borrow().stats()
    }

    /// A handle to signal `token` on `owner`.
    pub fn signal<A: 'static>(
        &self,
        owner: impl HasObjectId,
        token: Token<A>,
    ) -> SignalHandle<'_, A> {
        SignalHandle::new(self, owner.object_id(), token)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Leaves an emission walk when dropped, on success, error or unwind.
struct WalkGuard<'r> {
    registry: &'r Registry,
    owner: ObjectId,
    epoch: u64,
}

impl Drop for WalkGuard<'_> {
    fn drop(&mut self) {
        let mut released = Released::new();
        let freed = self
            .registry
            .store
            .borrow_mut()
            .end_walk(self.owner, self.epoch, &mut released);
        drop(released);
        if let Some(freed) = freed {
            tracing::debug!(owner = %self.owner, freed, "compacted emitter");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
