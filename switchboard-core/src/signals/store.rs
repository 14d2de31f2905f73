//! Connection storage: the arena plus the emitter and receiver registries.
//!
//! # Layout
//!
//! Connections live in a [`Slab`]. The emitter registry maps an owner to the
//! head and tail of its ordered list; the receiver registry maps a receiver
//! to the head of its unordered list. Nothing in here runs callbacks, so
//! every method completes without reentering the store.
//!
//! # Tombstones
//!
//! Removing a connection while an emission may be walking the owner's list
//! only clears its callback. The node is spliced out later by [`Store::compact`],
//! which the dispatcher runs once no emission is walking that list.
//!
//! # Released callbacks
//!
//! Callbacks are user closures and may own values whose `Drop` calls back
//! into the registry. Every method that removes a connection moves the
//! callback into a [`Released`] buffer instead of dropping it, and the
//! registry drops that buffer after its borrow of the store has ended.

use std::collections::HashMap;

use serde::Serialize;
use slab::Slab;
use smallvec::SmallVec;

use super::callback::{CallbackId, ErasedCallback};
use super::connection::{Connection, ConnectionKey};
use super::identity::{ObjectId, ReceiverKey};
use super::token::TokenId;
use crate::config::RegistryConfig;

/// Callbacks taken out of removed connections, waiting to be dropped.
pub(crate) type Released = SmallVec<[ErasedCallback; 4]>;

/// Per-owner list head plus dispatch bookkeeping.
#[derive(Debug)]
pub(crate) struct EmitterEntry {
    /// Distinguishes this entry from a later one created for the same owner.
    pub(crate) epoch: u64,
    pub(crate) head: Option<ConnectionKey>,
    pub(crate) tail: Option<ConnectionKey>,
    /// Number of emissions currently walking this list.
    pub(crate) depth: u32,
    /// The list contains at least one tombstone.
    pub(crate) dirty: bool,
}

/// What an emission needs to walk an owner's list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkBounds {
    pub(crate) epoch: u64,
    pub(crate) head: Option<ConnectionKey>,
    pub(crate) tail: Option<ConnectionKey>,
}

/// One step of an emission walk.
pub(crate) struct Step {
    pub(crate) callback: Option<(ErasedCallback, ReceiverKey, &'static str)>,
}

/// Point-in-time counts of the registry contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Connections that still deliver.
    pub live_connections: usize,
    /// Removed connections not yet compacted out of their owner's list.
    pub tombstones: usize,
    /// Owners with an emitter entry.
    pub emitters: usize,
    /// Receivers with at least one live connection.
    pub receivers: usize,
}

#[derive(Debug)]
pub(crate) struct Store {
    connections: Slab<Connection>,
    emitters: HashMap<ObjectId, EmitterEntry>,
    receivers: HashMap<ReceiverKey, ConnectionKey>,
    next_stamp: u64,
}

impl Store {
    pub(crate) fn new(config: &RegistryConfig) -> Self {
        Self {
            connections: Slab::with_capacity(config.connection_capacity),
            emitters: HashMap::with_capacity(config.emitter_capacity),
            receivers: HashMap::with_capacity(config.receiver_capacity),
            next_stamp: 0,
        }
    }

    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    pub(crate) fn get(&self, key: ConnectionKey) -> Option<&Connection> {
        self.connections
            .get(key.index)
            .filter(|conn| conn.stamp == key.stamp)
    }

    fn get_mut(&mut self, key: ConnectionKey) -> Option<&mut Connection> {
        self.connections
            .get_mut(key.index)
            .filter(|conn| conn.stamp == key.stamp)
    }

    pub(crate) fn has_emitter(&self, owner: ObjectId) -> bool {
        self.emitters.contains_key(&owner)
    }

    pub(crate) fn has_receiver(&self, receiver: ReceiverKey) -> bool {
        self.receivers.contains_key(&receiver)
    }

    /// Linear scan of the owner's list for a live match.
    pub(crate) fn find_live(
        &self,
        owner: ObjectId,
        token: TokenId,
        callback: CallbackId,
        context: Option<ObjectId>,
    ) -> Option<ConnectionKey> {
        let mut cursor = self.emitters.get(&owner)?.head;
        while let Some(key) = cursor {
            let conn = self.get(key)?;
            if conn.matches(token, callback, context) {
                return Some(key);
            }
            cursor = conn.next;
        }
        None
    }

    /// Allocate a connection, append it to the owner's list and push it on
    /// its receiver's list.
    pub(crate) fn insert(
        &mut self,
        owner: ObjectId,
        token: TokenId,
        signal: &'static str,
        callback: ErasedCallback,
        context: Option<ObjectId>,
    ) -> ConnectionKey {
        let stamp = self.stamp();
        let conn = Connection::new(stamp, owner, token, signal, callback, context);
        let receiver = conn.receiver;
        let key = ConnectionKey {
            index: self.connections.insert(conn),
            stamp,
        };

        // Emitter side: append at the tail.
        let previous_tail = match self.emitters.get_mut(&owner) {
            Some(entry) => entry.tail.replace(key),
            None => {
                let epoch = self.stamp();
                self.emitters.insert(
                    owner,
                    EmitterEntry {
                        epoch,
                        head: Some(key),
                        tail: Some(key),
                        depth: 0,
                        dirty: false,
                    },
                );
                None
            }
        };
        if let Some(tail) = previous_tail.and_then(|tail| self.get_mut(tail)) {
            tail.next = Some(key);
        }

        // Receiver side: push at the head.
        let previous_head = self.receivers.insert(receiver, key);
        if let Some(head) = previous_head {
            if let Some(old) = self.get_mut(head) {
                old.receiver_prev = Some(key);
            }
            if let Some(conn) = self.get_mut(key) {
                conn.receiver_next = Some(head);
            }
        }

        key
    }

    /// Remove a connection from its receiver's list in O(1).
    fn unlink_receiver(&mut self, key: ConnectionKey) {
        let Some(conn) = self.get_mut(key) else {
            return;
        };
        let (prev, next, receiver) = (conn.receiver_prev, conn.receiver_next, conn.receiver);
        conn.clear_receiver_links();

        match prev {
            Some(prev) => {
                if let Some(prev) = self.get_mut(prev) {
                    prev.receiver_next = next;
                }
            }
            None => match next {
                Some(next) => {
                    self.receivers.insert(receiver, next);
                }
                None => {
                    if self.receivers.get(&receiver) == Some(&key) {
                        self.receivers.remove(&receiver);
                    }
                }
            },
        }
        if let Some(next) = next.and_then(|next| self.get_mut(next)) {
            next.receiver_prev = prev;
        }
    }

    /// Unlink from the receiver side and tombstone; the emitter list is left
    /// alone and the owner is flagged for compaction.
    pub(crate) fn remove(&mut self, key: ConnectionKey, released: &mut Released) {
        self.unlink_receiver(key);
        let Some(conn) = self.get_mut(key) else {
            return;
        };
        released.extend(conn.tombstone());
        let owner = conn.owner;
        if let Some(entry) = self.emitters.get_mut(&owner) {
            entry.dirty = true;
        }
    }

    /// Drop the owner's entry, tombstoning and freeing all of its connections.
    ///
    /// Returns the number of live connections removed, or `None` if the owner
    /// had no entry.
    pub(crate) fn remove_emitter(
        &mut self,
        owner: ObjectId,
        released: &mut Released,
    ) -> Option<usize> {
        let entry = self.emitters.remove(&owner)?;

        let mut keys: SmallVec<[ConnectionKey; 8]> = SmallVec::new();
        let mut cursor = entry.head;
        while let Some(key) = cursor {
            let Some(conn) = self.get(key) else {
                break;
            };
            keys.push(key);
            cursor = conn.next;
        }

        let mut removed = 0;
        for key in keys {
            if self.get(key).is_some_and(Connection::is_live) {
                self.unlink_receiver(key);
                removed += 1;
            }
            // Freeing the slot invalidates the key, so an emission still
            // positioned on it stops instead of following stale links.
            let conn = self.connections.remove(key.index);
            released.extend(conn.callback);
        }
        Some(removed)
    }

    /// Drop the receiver's entry, tombstoning every connection in its list.
    ///
    /// The nodes stay in their owners' lists until those owners compact.
    /// Returns the number of connections removed, or `None` if the receiver
    /// had no entry.
    pub(crate) fn remove_receiver(
        &mut self,
        receiver: ReceiverKey,
        released: &mut Released,
    ) -> Option<usize> {
        let mut cursor = Some(self.receivers.remove(&receiver)?);

        let mut removed = 0;
        while let Some(key) = cursor {
            let Some(conn) = self.get_mut(key) else {
                break;
            };
            cursor = conn.receiver_next;
            conn.clear_receiver_links();
            released.extend(conn.tombstone());
            let owner = conn.owner;
            if let Some(entry) = self.emitters.get_mut(&owner) {
                entry.dirty = true;
            }
            removed += 1;
        }
        Some(removed)
    }

    /// Enter an emission on `owner`, returning the bounds of the walk.
    pub(crate) fn begin_walk(&mut self, owner: ObjectId) -> Option<WalkBounds> {
        let entry = self.emitters.get_mut(&owner)?;
        entry.depth += 1;
        Some(WalkBounds {
            epoch: entry.epoch,
            head: entry.head,
            tail: entry.tail,
        })
    }

    /// Read the connection under the cursor.
    ///
    /// Returns `None` if the slot was freed under the walk. Tombstones seen
    /// here flag the owner for compaction.
    pub(crate) fn step(
        &mut self,
        owner: ObjectId,
        key: ConnectionKey,
        token: TokenId,
    ) -> Option<Step> {
        let conn = self.get(key)?;
        let live = conn.is_live();
        let callback = conn
            .callback
            .as_ref()
            .filter(|_| conn.token == token)
            .map(|cb| (cb.clone(), conn.receiver, conn.signal));

        if !live {
            if let Some(entry) = self.emitters.get_mut(&owner) {
                entry.dirty = true;
            }
        }
        Some(Step { callback })
    }

    /// Successor of `key` in its owner's list, if `key` still resolves.
    pub(crate) fn next_of(&self, key: ConnectionKey) -> Option<Option<ConnectionKey>> {
        self.get(key).map(|conn| conn.next)
    }

    /// Leave an emission. Compacts when the last walker leaves a dirty list.
    ///
    /// An entry with a different epoch was created after the walked one was
    /// torn down and is not touched.
    pub(crate) fn end_walk(
        &mut self,
        owner: ObjectId,
        epoch: u64,
        released: &mut Released,
    ) -> Option<usize> {
        let entry = self.emitters.get_mut(&owner)?;
        if entry.epoch != epoch {
            return None;
        }
        entry.depth = entry.depth.saturating_sub(1);
        if entry.depth == 0 && entry.dirty {
            Some(self.compact(owner, released))
        } else {
            None
        }
    }

    /// Splice every tombstone out of the owner's list and free it.
    ///
    /// Must only run when no emission is walking the list. Removes the entry
    /// if nothing remains. Returns the number of nodes freed.
    pub(crate) fn compact(&mut self, owner: ObjectId, released: &mut Released) -> usize {
        let Some(entry) = self.emitters.get(&owner) else {
            return 0;
        };
        debug_assert_eq!(entry.depth, 0, "compacting a list under iteration");

        let mut freed = 0;
        let mut head = None;
        let mut last: Option<ConnectionKey> = None;
        let mut cursor = entry.head;
        while let Some(key) = cursor {
            let Some(conn) = self.get(key) else {
                break;
            };
            cursor = conn.next;
            if conn.is_live() {
                match last.and_then(|last| self.get_mut(last)) {
                    Some(prev) => prev.next = Some(key),
                    None => head = Some(key),
                }
                last = Some(key);
            } else {
                let conn = self.connections.remove(key.index);
                released.extend(conn.callback);
                freed += 1;
            }
        }
        if let Some(tail) = last.and_then(|last| self.get_mut(last)) {
            tail.next = None;
        }

        if head.is_none() {
            self.emitters.remove(&owner);
        } else if let Some(entry) = self.emitters.get_mut(&owner) {
            entry.head = head;
            entry.tail = last;
            entry.dirty = false;
        }
        freed
    }

    /// Owners that have tombstones and no emission in progress.
    pub(crate) fn idle_dirty_emitters(&self) -> Vec<ObjectId> {
        self.emitters
            .iter()
            .filter(|(_, entry)| entry.dirty && entry.depth == 0)
            .map(|(owner, _)| *owner)
            .collect()
    }

    /// Number of live connections of `owner`, optionally for one token.
    pub(crate) fn live_count(&self, owner: ObjectId, token: Option<TokenId>) -> usize {
        let mut count = 0;
        let mut cursor = self.emitters.get(&owner).and_then(|entry| entry.head);
        while let Some(key) = cursor {
            let Some(conn) = self.get(key) else {
                break;
            };
            if conn.is_live() && token.map_or(true, |t| t == conn.token) {
                count += 1;
            }
            cursor = conn.next;
        }
        count
    }

    pub(crate) fn stats(&self) -> RegistryStats {
        let live = self.connections.iter().filter(|(_, c)| c.is_live()).count();
        RegistryStats {
            live_connections: live,
            tombstones: self.connections.len() - live,
            emitters: self.emitters.len(),
            receivers: self.receivers.len(),
        }
    }
}
