//! Event bus for operation tracking
//!
//! Controllers report every asynchronous operation they start, finish or
//! refuse. Nothing in the state machines depends on these events; they exist
//! for logging, diagnostics and tests that want a timeline across screens.
//!
//! The bus is a `tokio::sync::broadcast` channel: emitting with nobody
//! listening is free, and a lagging subscriber loses the oldest events
//! instead of blocking a controller.
//!
//! ```
//! use libblogging::events::{Event, EventBus, Operation, ScreenKind};
//!
//! # async fn example() {
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::OperationStarted {
//!     screen: ScreenKind::Home,
//!     operation: Operation::LoadFeed,
//!     key: None,
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the per-subscriber backlog before old events are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Which controller an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    Login,
    Register,
    Home,
    PostDetail,
    Editor,
}

/// Asynchronous operations a controller can run against the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Authenticate,
    Register,
    LoadFeed,
    LoadDetail,
    PostComment,
    DeletePost,
    LoadForEdit,
    SavePost,
    UpdatePost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    OperationStarted {
        screen: ScreenKind,
        operation: Operation,
        /// Post id for keyed screens
        key: Option<String>,
    },

    OperationCompleted {
        screen: ScreenKind,
        operation: Operation,
        key: Option<String>,
    },

    OperationFailed {
        screen: ScreenKind,
        operation: Operation,
        key: Option<String>,
        error: String,
        retryable: bool,
    },

    /// The action was refused before any backend call
    ActionRejected {
        screen: ScreenKind,
        operation: Operation,
        key: Option<String>,
        reason: String,
    },
}

impl Event {
    pub fn screen(&self) -> ScreenKind {
        match self {
            Event::OperationStarted { screen, .. }
            | Event::OperationCompleted { screen, .. }
            | Event::OperationFailed { screen, .. }
            | Event::ActionRejected { screen, .. } => *screen,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Event::OperationStarted { operation, .. }
            | Event::OperationCompleted { operation, .. }
            | Event::OperationFailed { operation, .. }
            | Event::ActionRejected { operation, .. } => *operation,
        }
    }
}
