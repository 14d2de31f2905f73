//! Active-Emission Context
//!
//! Tracks which emitter is currently dispatching, so a callback can discover
//! who fired it without the emitter being passed along explicitly.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Every emission pushes a frame for
//! its owner and pops it when the returned guard drops, including while a
//! panic unwinds. A callback that emits on another owner therefore sees that
//! owner for the duration of the nested emission and its own emitter again
//! afterwards.
//!
//! Only the innermost frame is observable; the stack is not a history.

use std::cell::RefCell;

use super::identity::{ObjectId, ReceiverKey};

thread_local! {
    static EMISSION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    owner: ObjectId,
    /// Receiver of the connection being invoked, once one is.
    receiver: Option<ReceiverKey>,
}

/// Guard that pops the emission frame when dropped.
///
/// Only the registry pushes frames; hosts read the stack through the
/// associated functions.
///
/// ```compile_fail
/// use switchboard_core::signals::{ActiveEmission, ObjectId};
///
/// let _frame = ActiveEmission::enter(ObjectId::new());
/// ```
#[must_use = "the emission frame is popped when the guard drops"]
pub struct ActiveEmission {
    owner: ObjectId,
}

impl ActiveEmission {
    /// Enter an emission for `owner`.
    pub(crate) fn enter(owner: ObjectId) -> Self {
        EMISSION_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                owner,
                receiver: None,
            });
        });

        Self { owner }
    }

    /// Record the receiver about to be invoked in the innermost frame.
    pub(crate) fn set_receiver(&self, receiver: ReceiverKey) {
        EMISSION_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.receiver = Some(receiver);
            }
        });
    }

    /// The emitter currently dispatching on this thread, if any.
    pub fn current_emitter() -> Option<ObjectId> {
        EMISSION_STACK.with(|stack| stack.borrow().last().map(|frame| frame.owner))
    }

    /// The receiver of the connection currently being invoked, if any.
    pub fn current_receiver() -> Option<ReceiverKey> {
        EMISSION_STACK.with(|stack| stack.borrow().last().and_then(|frame| frame.receiver))
    }

    /// Check whether any emission is in progress on this thread.
    pub fn is_active() -> bool {
        EMISSION_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Number of nested emissions in progress on this thread.
    pub fn depth() -> usize {
        EMISSION_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ActiveEmission {
    fn drop(&mut self) {
        EMISSION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.owner, self.owner,
                    "ActiveEmission mismatch: expected {}, got {}",
                    self.owner, frame.owner
                );
            }
        });
    }
}

/// The emitter of the signal currently being dispatched, or `None`.
pub fn current_emitting_owner() -> Option<ObjectId> {
    ActiveEmission::current_emitter()
}
