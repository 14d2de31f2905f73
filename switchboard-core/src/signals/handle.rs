//! Signal handles bound to one owner.
//!
//! A [`SignalHandle`] is what a signal "property" on an instance resolves to:
//! the registry, the owner and the token packaged together, so callers write
//! `slider.moved().connect(&cb)` instead of threading all three through.

use std::fmt;

use super::callback::Callback;
use super::identity::{HasObjectId, ObjectId};
use super::registry::Registry;
use super::token::Token;
use crate::error::SignalError;

/// Lightweight handle to signal `token` on `owner`.
///
/// # Example
///
/// ```rust,ignore
/// struct Slider {
///     id: ObjectId,
/// }
///
/// impl Slider {
///     fn moved<'r>(&self, registry: &'r Registry) -> SignalHandle<'r, f32> {
///         let token = declare_signal::<Slider, f32>("moved").expect("declared once");
///         registry.signal(self.id, token)
///     }
/// }
/// ```
pub struct SignalHandle<'r, A: 'static> {
    registry: &'r Registry,
    owner: ObjectId,
    token: Token<A>,
}

impl<'r, A: 'static> SignalHandle<'r, A> {
    pub(crate) fn new(registry: &'r Registry, owner: ObjectId, token: Token<A>) -> Self {
        Self {
            registry,
            owner,
            token,
        }
    }

    /// The emitting object.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// The signal token.
    pub fn token(&self) -> Token<A> {
        self.token
    }

    /// Connect a callback with no context.
    pub fn connect(&self, callback: &Callback<A>) -> bool {
        self.registry.connect(self.owner, self.token, callback, None)
    }

    /// Connect a callback filed under `context`.
    pub fn connect_with(&self, callback: &Callback<A>, context: impl HasObjectId) -> bool {
        self.registry
            .connect(self.owner, self.token, callback, Some(context.object_id()))
    }

    /// Disconnect a callback connected with no context.
    pub fn disconnect(&self, callback: &Callback<A>) -> bool {
        self.registry
            .disconnect(self.owner, self.token, callback, None)
    }

    /// Disconnect a callback connected under `context`.
    pub fn disconnect_with(&self, callback: &Callback<A>, context: impl HasObjectId) -> bool {
        self.registry
            .disconnect(self.owner, self.token, callback, Some(context.object_id()))
    }

    /// Fire the signal.
    pub fn emit(&self, args: &A) -> Result<(), SignalError> {
        self.registry.emit(self.owner, self.token, args)
    }

    /// Number of live connections to this signal.
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count(self.owner, self.token)
    }
}

impl<A: 'static> Clone for SignalHandle<'_, A> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            owner: self.owner,
            token: self.token,
        }
    }
}

impl<A: 'static> fmt::Debug for SignalHandle<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHandle")
            .field("owner", &self.owner)
            .field("token", &self.token)
            .finish()
    }
}
