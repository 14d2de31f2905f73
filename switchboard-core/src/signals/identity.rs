//! Identity types for emitters and receivers.
//!
//! The registry never holds on to the objects it connects. Every emitter and
//! every context receiver is represented by an [`ObjectId`], a plain number
//! handed out by an atomic counter. Hosts store the id next to their own data
//! and pass it to the registry; dropping the object does not require the
//! registry to let go of anything, though [`Endpoint`] exists for hosts that
//! want connections torn down automatically.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::callback::CallbackId;

/// Process-unique identity of an emitter or receiver object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Generate a new unique object ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Types that carry an object identity.
///
/// Implement this on host types so they can be passed wherever the registry
/// expects an emitter or receiver.
pub trait HasObjectId {
    /// The identity used as registry key.
    fn object_id(&self) -> ObjectId;
}

impl HasObjectId for ObjectId {
    fn object_id(&self) -> ObjectId {
        *self
    }
}

impl<T: HasObjectId + ?Sized> HasObjectId for &T {
    fn object_id(&self) -> ObjectId {
        (**self).object_id()
    }
}

/// The key a connection is filed under in the receiver registry.
///
/// A connection made with a context belongs to that context object. Without
/// one, the callback itself is the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKey {
    /// An explicit context object.
    Context(ObjectId),
    /// A context-less callback.
    Callback(CallbackId),
}

impl ReceiverKey {
    /// Resolve the receiver for a (callback, context) pair.
    pub(crate) fn resolve(callback: CallbackId, context: Option<ObjectId>) -> Self {
        match context {
            Some(id) => ReceiverKey::Context(id),
            None => ReceiverKey::Callback(callback),
        }
    }

    /// The context object, if this receiver is one.
    pub fn context(&self) -> Option<ObjectId> {
        match self {
            ReceiverKey::Context(id) => Some(*id),
            ReceiverKey::Callback(_) => None,
        }
    }
}

impl From<ObjectId> for ReceiverKey {
    fn from(id: ObjectId) -> Self {
        ReceiverKey::Context(id)
    }
}

impl fmt::Display for ReceiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverKey::Context(id) => fmt::Display::fmt(id, f),
            ReceiverKey::Callback(id) => fmt::Display::fmt(id, f),
        }
    }
}

/// An owned object identity bound to the thread's default registry.
///
/// When dropped, every connection in which this object is the emitter or the
/// context receiver is removed from the default registry.
///
/// # Example
///
/// ```rust,ignore
/// struct Button {
///     endpoint: Endpoint,
/// }
///
/// let button = Button { endpoint: Endpoint::new() };
/// // connect through button.endpoint.id() ...
/// drop(button); // connections gone
/// ```
#[derive(Debug, Default)]
pub struct Endpoint {
    id: ObjectId,
}

impl Endpoint {
    /// Create an endpoint with a fresh identity.
    pub fn new() -> Self {
        Self { id: ObjectId::new() }
    }

    /// The identity of this endpoint.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl HasObjectId for Endpoint {
    fn object_id(&self) -> ObjectId {
        self.id
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        super::global::clear_signal_data(self.id);
    }
}
