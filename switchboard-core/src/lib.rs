//! Switchboard Core
//!
//! This crate provides an in-process signal/slot registry. Objects expose
//! named signals; callbacks subscribe to them and are invoked synchronously
//! when a signal fires.
//!
//! It implements:
//!
//! - A connection registry indexed by both emitter and receiver
//! - Reentrant-safe dispatch (connect, disconnect and emit from callbacks)
//! - Bulk teardown by either endpoint
//! - An active-emission context for discovering the current emitter
//!
//! # Architecture
//!
//! - `signals`: tokens, callbacks, the registry and its dispatch engine
//! - `config`: storage sizing for a registry
//! - `error`: the error type returned by emission and declaration
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard_core::signals::{Callback, ObjectId, Registry, Token};
//!
//! let registry = Registry::new();
//! let timer = ObjectId::new();
//! let tick = Token::<u64>::new("tick");
//!
//! let on_tick = Callback::from_fn(|n: &u64| println!("tick {n}"));
//! registry.connect(timer, tick, &on_tick, None);
//!
//! registry.emit(timer, tick, &1)?;
//! // prints: "tick 1"
//! ```

pub mod config;
pub mod error;
pub mod signals;

pub use config::RegistryConfig;
pub use error::{CallbackError, SignalError};
