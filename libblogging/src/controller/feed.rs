//! Home feed controller

use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{acknowledge, admit, guarded, Controller, ControllerContext, Gate};
use crate::events::{Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell};
use crate::types::Post;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedState {
    pub posts: Vec<Post>,
    pub is_loading: bool,
    pub error_message: Effect<String>,
}

impl Snapshot for FeedState {
    fn is_busy(&self) -> bool {
        self.is_loading
    }
}

#[derive(Debug, Clone)]
pub struct FeedController {
    state: Arc<StateCell<FeedState>>,
    context: ControllerContext,
}

impl FeedController {
    /// Idle controller with an empty list; nothing is fetched
    pub fn new(context: ControllerContext) -> Self {
        Self {
            state: Arc::new(StateCell::new(FeedState::default())),
            context,
        }
    }

    /// Controller whose first load is already in flight
    pub fn open(context: ControllerContext) -> Self {
        let controller = Self::new(context);
        // The initial load can only be refused by a concurrent load
        let _ = controller.load();
        controller
    }

    /// Replace the list with a fresh fetch
    ///
    /// A failed fetch keeps whatever list was already shown.
    pub fn load(&self) -> Dispatch {
        let tracker = self.context.tracker(ScreenKind::Home, Operation::LoadFeed, None);

        let admitted = admit(&self.state, |s| {
            if s.is_loading {
                return Gate::Busy;
            }
            Gate::Start(
                FeedState {
                    is_loading: true,
                    ..s.clone()
                },
                (),
            )
        });
        if let Err(refused) = admitted {
            return tracker.refused(refused);
        }

        tracker.started();
        let controller = self.clone();
        Dispatch::Started(self.context.spawn(async move {
            match guarded(controller.context.backend().fetch_posts()).await {
                Ok(posts) => {
                    info!(count = posts.len(), "feed loaded");
                    tracker.completed();
                    controller.state.replace(|s| FeedState {
                        posts,
                        is_loading: false,
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!("feed load failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| FeedState {
                        is_loading: false,
                        error_message: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    pub fn refresh(&self) -> Dispatch {
        self.load()
    }

    /// Claim `message` for display; `false` if it is no longer pending
    pub fn error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.error_message)
    }
}

impl Controller for FeedController {
    type State = FeedState;

    fn state(&self) -> &StateCell<FeedState> {
        &self.state
    }

    fn runtime(&self) -> &Handle {
        self.context.runtime()
    }
}
