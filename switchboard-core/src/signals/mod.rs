//! Signals and Connections
//!
//! This module implements the connection registry: emitters expose signals,
//! receivers connect callbacks to them, and emitting a signal invokes those
//! callbacks synchronously in the order they were connected.
//!
//! # Concepts
//!
//! ## Tokens
//!
//! A signal is identified by its owner and a [`Token`]. Tokens are unique per
//! declared signal and carry the argument type, so `emit` and the connected
//! callbacks always agree on what is passed.
//!
//! ## Connections
//!
//! A connection is one (owner, token, callback, context) subscription. It
//! sits in two lists at once: the owner's ordered list, walked by `emit`,
//! and its receiver's list, walked when the receiver is torn down. Either
//! endpoint can therefore drop all of its connections without scanning the
//! other side.
//!
//! ## Receivers
//!
//! A connection belongs to its context object if one was given, and to the
//! callback itself otherwise. [`Registry::disconnect_receiver`] removes all
//! connections of one receiver across every emitter.
//!
//! # Implementation Notes
//!
//! Mutation during emission is made safe by never splicing a node out of a
//! list that is being walked. Removed connections become tombstones that
//! emission skips; the last emission to leave a list compacts it. Nodes live
//! in an arena and are addressed by stamped keys, so a walk positioned on a
//! freed node notices rather than following stale links.

mod callback;
mod connection;
mod context;
pub mod global;
mod handle;
mod identity;
mod registry;
mod store;
mod token;

pub use callback::{Callback, CallbackId};
pub use context::{current_emitting_owner, ActiveEmission};
pub use handle::SignalHandle;
pub use identity::{Endpoint, HasObjectId, ObjectId, ReceiverKey};
pub use registry::Registry;
pub use store::RegistryStats;
pub use token::{declare_signal, declared_signals, Token, TokenId};
