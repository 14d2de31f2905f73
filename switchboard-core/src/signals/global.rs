//! Thread-default registry.
//!
//! Most hosts only ever need one registry per thread. These free functions
//! operate on a lazily created, thread-local [`Registry`] so that emitters
//! and receivers do not have to carry a registry reference around.

use super::callback::Callback;
use super::identity::{HasObjectId, ObjectId, ReceiverKey};
use super::registry::Registry;
use super::token::Token;
use crate::error::SignalError;

thread_local! {
    static DEFAULT_REGISTRY: Registry = Registry::new();
}

/// Run `f` with this thread's default registry.
pub fn with_default<R>(f: impl FnOnce(&Registry) -> R) -> R {
    DEFAULT_REGISTRY.with(f)
}

/// [`Registry::connect`] on the default registry.
pub fn connect<A: 'static>(
    owner: impl HasObjectId,
    token: Token<A>,
    callback: &Callback<A>,
    context: Option<ObjectId>,
) -> bool {
    with_default(|registry| registry.connect(owner, token, callback, context))
}

/// [`Registry::disconnect`] on the default registry.
pub fn disconnect<A: 'static>(
    owner: impl HasObjectId,
    token: Token<A>,
    callback: &Callback<A>,
    context: Option<ObjectId>,
) -> bool {
    with_default(|registry| registry.disconnect(owner, token, callback, context))
}

/// [`Registry::emit`] on the default registry.
pub fn emit<A: 'static>(
    owner: impl HasObjectId,
    token: Token<A>,
    args: &A,
) -> Result<(), SignalError> {
    with_default(|registry| registry.emit(owner, token, args))
}

/// [`Registry::disconnect_emitter`] on the default registry.
pub fn disconnect_emitter(owner: impl HasObjectId) -> usize {
    with_default(|registry| registry.disconnect_emitter(owner))
}

/// [`Registry::disconnect_receiver`] on the default registry.
pub fn disconnect_receiver(receiver: impl Into<ReceiverKey>) -> usize {
    with_default(|registry| registry.disconnect_receiver(receiver))
}

/// [`Registry::clear_signal_data`] on the default registry.
///
/// Does nothing once the thread's registry has been destroyed, which happens
/// when an [`Endpoint`](super::Endpoint) outlives it during thread teardown.
pub fn clear_signal_data(object: impl HasObjectId) -> usize {
    let object = object.object_id();
    DEFAULT_REGISTRY
        .try_with(|registry| registry.clear_signal_data(object))
        .unwrap_or(0)
}
