//! Per-screen controllers
//!
//! A controller owns one [`StateCell`] and exposes action methods. Action
//! methods never block: they decide synchronously whether the action may
//! start, publish the resulting snapshot, and spawn the backend call onto
//! the runtime. The returned [`Dispatch`] tells the caller what happened.
//!
//! Started operations are detached. They hold their own clone of the
//! controller, so the result is always applied, even after the screen
//! that started it has gone away.

pub mod auth;
pub mod detail;
pub mod editor;
pub mod feed;
pub mod register;

pub use auth::{AuthController, AuthState};
pub use detail::{DetailController, DetailState};
pub use editor::{EditorController, EditorState};
pub use feed::{FeedController, FeedState};
pub use register::{RegisterController, RegisterState};

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult, ValidationError};
use crate::events::{Event, EventBus, Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell, Subscription};

/// Read side shared by every controller
pub trait Controller {
    type State: Snapshot;

    fn state(&self) -> &StateCell<Self::State>;

    fn runtime(&self) -> &Handle;

    fn current(&self) -> Self::State {
        self.state().current()
    }

    /// Deliver the current snapshot and every later one to `callback`
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(Self::State) + Send + 'static,
    {
        self.state().subscribe(self.runtime(), callback)
    }
}

/// Everything a controller needs besides its own state
#[derive(Clone)]
pub struct ControllerContext {
    backend: Arc<dyn Backend>,
    events: EventBus,
    runtime: Handle,
    display_name: String,
}

impl ControllerContext {
    pub fn new(
        backend: Arc<dyn Backend>,
        events: EventBus,
        runtime: Handle,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            events,
            runtime,
            display_name: display_name.into(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Author name for content written in this session
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn spawn<F>(&self, operation: F) -> JoinHandle<BackendResult<()>>
    where
        F: Future<Output = BackendResult<()>> + Send + 'static,
    {
        self.runtime.spawn(operation)
    }

    pub(crate) fn tracker(
        &self,
        screen: ScreenKind,
        operation: Operation,
        key: Option<&str>,
    ) -> OperationTracker {
        OperationTracker {
            events: self.events.clone(),
            screen,
            operation,
            key: key.map(str::to_string),
        }
    }
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("display_name", &self.display_name)
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Emits the lifecycle events of one operation
#[derive(Debug, Clone)]
pub(crate) struct OperationTracker {
    events: EventBus,
    screen: ScreenKind,
    operation: Operation,
    key: Option<String>,
}

impl OperationTracker {
    pub(crate) fn started(&self) {
        debug!(screen = ?self.screen, operation = ?self.operation, key = ?self.key, "operation started");
        self.events.emit(Event::OperationStarted {
            screen: self.screen,
            operation: self.operation,
            key: self.key.clone(),
        });
    }

    pub(crate) fn completed(&self) {
        self.events.emit(Event::OperationCompleted {
            screen: self.screen,
            operation: self.operation,
            key: self.key.clone(),
        });
    }

    pub(crate) fn failed(&self, error: &BackendError) {
        self.events.emit(Event::OperationFailed {
            screen: self.screen,
            operation: self.operation,
            key: self.key.clone(),
            error: error.to_string(),
            retryable: error.is_transient(),
        });
    }

    /// Report a refused action and hand the dispatch back
    pub(crate) fn refused(&self, dispatch: Dispatch) -> Dispatch {
        let reason = match &dispatch {
            Dispatch::Busy => "operation already in flight".to_string(),
            Dispatch::Unacknowledged => "previous result not acknowledged".to_string(),
            Dispatch::Invalid(e) => e.to_string(),
            Dispatch::Started(_) | Dispatch::Skipped => return dispatch,
        };
        debug!(screen = ?self.screen, operation = ?self.operation, key = ?self.key, %reason, "action rejected");
        self.events.emit(Event::ActionRejected {
            screen: self.screen,
            operation: self.operation,
            key: self.key.clone(),
            reason,
        });
        dispatch
    }
}

/// Verdict of an action's synchronous guard
pub(crate) enum Gate<S, R> {
    Busy,
    Unacknowledged,
    /// Publish `S`, which carries the validation error, and stop
    Invalid(ValidationError, S),
    /// Publish `S`, which marks the operation in flight, and start with `R`
    Start(S, R),
}

/// Run `decide` against the current snapshot under the cell's lock
///
/// Check and transition happen in one step, so two callers racing on the
/// same controller can never both start.
pub(crate) fn admit<S, R, F>(cell: &StateCell<S>, decide: F) -> Result<R, Dispatch>
where
    S: Clone + Send + Sync + 'static,
    F: FnOnce(&S) -> Gate<S, R>,
{
    let mut verdict = None;
    cell.replace_if(|state| match decide(state) {
        Gate::Busy => {
            verdict = Some(Err(Dispatch::Busy));
            None
        }
        Gate::Unacknowledged => {
            verdict = Some(Err(Dispatch::Unacknowledged));
            None
        }
        Gate::Invalid(error, next) => {
            verdict = Some(Err(Dispatch::Invalid(error)));
            Some(next)
        }
        Gate::Start(next, request) => {
            verdict = Some(Ok(request));
            Some(next)
        }
    });
    verdict.unwrap_or(Err(Dispatch::Busy))
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Await a backend call, turning a panic inside it into `BackendError::Aborted`
///
/// Controllers match on the result to clear their in-flight flag, so a
/// misbehaving backend cannot leave a screen busy forever.
pub(crate) async fn guarded<T, F>(call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(%message, "backend call panicked");
            Err(BackendError::Aborted(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "backend call panicked".to_string()
}

/// Clear the effect picked by `field` only if it still holds `seen`
///
/// Returns whether this call consumed it. A screen acting on an older
/// snapshot gets `false` and must not act, since the value it saw has
/// already been handled or replaced by a newer one.
pub(crate) fn acknowledge<S, T, Q, F>(cell: &StateCell<S>, seen: &Q, field: F) -> bool
where
    S: Clone + Send + Sync + 'static,
    T: PartialEq<Q>,
    Q: ?Sized,
    F: FnOnce(&mut S) -> &mut Effect<T>,
{
    cell.replace_if(|state| {
        let mut next = state.clone();
        field(&mut next).acknowledge_if(seen).then_some(next)
    })
}
