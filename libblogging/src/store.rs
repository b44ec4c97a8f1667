//! Observable state cells, one-shot effects and action dispatch results
//!
//! Every controller owns exactly one [`StateCell`]. Views never mutate it;
//! they read [`StateCell::current`], follow changes through
//! [`StateCell::watch`], [`StateCell::stream`] or a callback
//! [`Subscription`], and talk back only through controller methods.
//!
//! Updates always replace the whole snapshot under the channel lock, so an
//! observer never sees half of a transition. A slow observer may skip
//! intermediate snapshots; that is why anything that must be seen exactly
//! once lives in an [`Effect`] that stays pending until acknowledged.

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{BackendError, BackendResult, Result, ValidationError};

/// Single-owner container for a screen's current snapshot
#[derive(Debug)]
pub struct StateCell<S> {
    sender: watch::Sender<S>,
}

impl<S> StateCell<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Clone of the latest published snapshot
    pub fn current(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Raw receiver for async consumers
    pub fn watch(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }

    /// Stream yielding the current snapshot, then every later replacement
    ///
    /// Ends once the cell is dropped.
    pub fn stream(&self) -> impl Stream<Item = S> + Send + 'static {
        let receiver = self.sender.subscribe();
        stream::unfold((receiver, true), |(mut receiver, first)| async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let snapshot = receiver.borrow_and_update().clone();
            Some((snapshot, (receiver, false)))
        })
    }

    /// Invoke `callback` with the current snapshot and then with each
    /// replacement, on a task spawned onto `runtime`.
    pub fn subscribe<F>(&self, runtime: &Handle, mut callback: F) -> Subscription
    where
        F: FnMut(S) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let task = runtime.spawn(async move {
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                callback(snapshot);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        });
        Subscription { task }
    }

    /// Wait until a published snapshot satisfies `predicate` and return it
    pub async fn wait_until<P>(&self, predicate: P) -> S
    where
        P: FnMut(&S) -> bool,
    {
        let mut receiver = self.sender.subscribe();
        // The guard borrows `receiver`; clone out of it before both drop
        let snapshot = match receiver.wait_for(predicate).await {
            Ok(guard) => (*guard).clone(),
            // Unreachable while `self` holds the sender
            Err(_) => self.current(),
        };
        snapshot
    }

    /// Publish the snapshot computed from the current one
    pub(crate) fn replace<F>(&self, next: F)
    where
        F: FnOnce(&S) -> S,
    {
        self.sender.send_modify(|state| {
            let replacement = next(state);
            *state = replacement;
        });
    }

    /// Atomic check-and-replace: publishes only when `next` returns `Some`.
    pub(crate) fn replace_if<F>(&self, next: F) -> bool
    where
        F: FnOnce(&S) -> Option<S>,
    {
        self.sender.send_if_modified(|state| match next(state) {
            Some(replacement) => {
                *state = replacement;
                true
            }
            None => false,
        })
    }
}

/// A screen snapshot that knows whether an operation is in flight
pub trait Snapshot: Clone + Send + Sync + 'static {
    fn is_busy(&self) -> bool;
}

impl<S: Snapshot> StateCell<S> {
    /// Wait until no operation is in flight and return that snapshot
    pub async fn settled(&self) -> S {
        self.wait_until(|state| !state.is_busy()).await
    }
}

/// Handle to a callback subscription; delivery stops when it is dropped
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A one-shot signal riding inside a snapshot
///
/// Set to `Pending` exactly once by the event that triggers it and cleared
/// back to `Consumed` only by the view's explicit acknowledgment, so holding
/// or re-rendering a snapshot can never fire it twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Effect<T> {
    Consumed,
    Pending(T),
}

impl<T> Default for Effect<T> {
    fn default() -> Self {
        Effect::Consumed
    }
}

impl<T> Effect<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Effect::Pending(_))
    }

    pub fn pending(&self) -> Option<&T> {
        match self {
            Effect::Pending(value) => Some(value),
            Effect::Consumed => None,
        }
    }

    /// Mark the effect as handled, whatever value it holds
    pub fn acknowledge(&mut self) {
        *self = Effect::Consumed;
    }

    /// Clear the effect only if it still holds the value the caller saw
    ///
    /// Returns `false`, leaving the effect untouched, when it was already
    /// consumed or has since been replaced by a different value.
    pub fn acknowledge_if<Q>(&mut self, seen: &Q) -> bool
    where
        T: PartialEq<Q>,
        Q: ?Sized,
    {
        match self {
            Effect::Pending(value) if *value == *seen => {
                *self = Effect::Consumed;
                true
            }
            _ => false,
        }
    }
}

/// What happened when a view invoked an asynchronous action
#[must_use = "a started operation can be awaited with `finished()`"]
#[derive(Debug)]
pub enum Dispatch {
    /// Operation is running on its own task and will apply its result
    Started(JoinHandle<BackendResult<()>>),
    /// Rejected: an operation of this controller is already in flight
    Busy,
    /// Rejected locally; the error is already in the snapshot
    Invalid(ValidationError),
    /// Rejected: the previous success effect has not been acknowledged
    Unacknowledged,
    /// Nothing to do in the controller's current mode; state is unchanged
    Skipped,
}

impl Dispatch {
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started(_))
    }

    /// Wait for a started operation to apply its result; no-op otherwise
    pub async fn finished(self) {
        let _ = self.outcome().await;
    }

    /// Wait for the action to settle and report how it ended
    ///
    /// The error is the same one already rendered into the snapshot.
    /// Refusals for a busy or unacknowledged controller are not failures.
    /// A task that died without reporting comes back as
    /// `BackendError::Aborted`.
    pub async fn outcome(self) -> Result<()> {
        match self {
            Dispatch::Started(task) => match task.await {
                Ok(result) => result.map_err(Into::into),
                Err(e) => {
                    warn!("controller operation ended abnormally: {}", e);
                    Err(BackendError::Aborted(e.to_string()).into())
                }
            },
            Dispatch::Invalid(error) => Err(error.into()),
            Dispatch::Busy | Dispatch::Unacknowledged | Dispatch::Skipped => Ok(()),
        }
    }
}
