//! Connection nodes.
//!
//! A connection is a member of two lists at once: the ordered, singly linked
//! list of its owner (the emitter) and the unordered, doubly linked list of
//! its receiver. Both are threaded through the node itself, so removal from
//! either side is O(1) once the node is known.

use super::callback::{CallbackId, ErasedCallback};
use super::identity::{ObjectId, ReceiverKey};
use super::token::TokenId;

/// Address of a connection in the registry arena.
///
/// The stamp is unique per allocation. A key whose slot has been freed, or
/// freed and reused, no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionKey {
    pub(crate) index: usize,
    pub(crate) stamp: u64,
}

/// One (owner, token, callback, context) subscription.
#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) stamp: u64,
    pub(crate) owner: ObjectId,
    pub(crate) token: TokenId,
    pub(crate) signal: &'static str,
    /// `None` marks a tombstone.
    pub(crate) callback: Option<ErasedCallback>,
    pub(crate) context: Option<ObjectId>,
    pub(crate) receiver: ReceiverKey,

    /// Next connection of the same owner.
    pub(crate) next: Option<ConnectionKey>,

    pub(crate) receiver_prev: Option<ConnectionKey>,
    pub(crate) receiver_next: Option<ConnectionKey>,
}

impl Connection {
    pub(crate) fn new(
        stamp: u64,
        owner: ObjectId,
        token: TokenId,
        signal: &'static str,
        callback: ErasedCallback,
        context: Option<ObjectId>,
    ) -> Self {
        let receiver = ReceiverKey::resolve(callback.id(), context);
        Self {
            stamp,
            owner,
            token,
            signal,
            callback: Some(callback),
            context,
            receiver,
            next: None,
            receiver_prev: None,
            receiver_next: None,
        }
    }

    /// Whether the connection still delivers.
    pub(crate) fn is_live(&self) -> bool {
        self.callback.is_some()
    }

    /// Whether this is the live connection for (token, callback, context).
    pub(crate) fn matches(
        &self,
        token: TokenId,
        callback: CallbackId,
        context: Option<ObjectId>,
    ) -> bool {
        self.token == token
            && self.context == context
            && self
                .callback
                .as_ref()
                .is_some_and(|cb| cb.id() == callback)
    }

    /// Clear callback and context. The node stays linked on the emitter side.
    ///
    /// The callback is handed back so the caller can drop it outside any
    /// borrow of the store.
    #[must_use]
    pub(crate) fn tombstone(&mut self) -> Option<ErasedCallback> {
        self.context = None;
        self.callback.take()
    }

    pub(crate) fn clear_receiver_links(&mut self) {
        self.receiver_prev = None;
        self.receiver_next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{Callback, Token};

    fn connection(context: Option<ObjectId>) -> (Connection, Callback<()>, Token<()>) {
        let token = Token::<()>::new("ping");
        let callback = Callback::from_fn(|_: &()| {});
        let conn = Connection::new(
            1,
            ObjectId::new(),
            token.id(),
            token.name(),
            callback.erased().clone(),
            context,
        );
        (conn, callback, token)
    }

    #[test]
    fn matches_full_triple() {
        let context = ObjectId::new();
        let (conn, callback, token) = connection(Some(context));

        assert!(conn.matches(token.id(), callback.id(), Some(context)));
        assert!(!conn.matches(token.id(), callback.id(), None));
        assert!(!conn.matches(
            Token::<()>::new("ping").id(),
            callback.id(),
            Some(context)
        ));
        assert_eq!(conn.receiver, ReceiverKey::Context(context));
    }

    #[test]
    fn tombstone_stops_matching() {
        let (mut conn, callback, token) = connection(None);
        assert!(conn.is_live());
        assert_eq!(conn.receiver, ReceiverKey::Callback(callback.id()));

        let released = conn.tombstone();

        assert_eq!(released.map(|cb| cb.id()), Some(callback.id()));
        assert!(!conn.is_live());
        assert!(conn.tombstone().is_none());
        assert!(!conn.matches(token.id(), callback.id(), None));
    }
}
