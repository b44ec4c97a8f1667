//! Post detail controller: one post, its comments, commenting and deletion
//!
//! The controller is keyed by a post id fixed at construction. Loading,
//! commenting and deleting share one single-flight guard: while any of them
//! is in flight every other action on the same controller is refused.

use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{acknowledge, admit, guarded, is_blank, Controller, ControllerContext, Gate};
use crate::error::ValidationError;
use crate::events::{Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell};
use crate::types::{Comment, FullPost};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailState {
    pub post: Option<FullPost>,
    pub comments: Vec<Comment>,
    pub is_loading: bool,
    pub error_message: Effect<String>,
    pub new_comment_draft: String,
    pub is_comment_posting: bool,
    pub comment_error: Effect<String>,
    pub is_owner: bool,
    pub is_deleting: bool,
}

impl Snapshot for DetailState {
    fn is_busy(&self) -> bool {
        self.is_loading || self.is_comment_posting || self.is_deleting
    }
}

#[derive(Debug, Clone)]
pub struct DetailController {
    post_id: Arc<str>,
    state: Arc<StateCell<DetailState>>,
    context: ControllerContext,
}

impl DetailController {
    pub fn new(context: ControllerContext, post_id: impl Into<String>) -> Self {
        Self {
            post_id: Arc::from(post_id.into()),
            state: Arc::new(StateCell::new(DetailState::default())),
            context,
        }
    }

    /// Controller whose first load is already in flight
    pub fn open(context: ControllerContext, post_id: impl Into<String>) -> Self {
        let controller = Self::new(context, post_id);
        let _ = controller.load();
        controller
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Fetch post, comments and ownership as one replacement
    ///
    /// While in flight the previous `post` stays visible. A failure leaves
    /// it untouched (`None` on the first load).
    pub fn load(&self) -> Dispatch {
        let tracker = self.context.tracker(
            ScreenKind::PostDetail,
            Operation::LoadDetail,
            Some(self.post_id()),
        );

        let admitted = admit(&self.state, |s| {
            if s.is_busy() {
                return Gate::Busy;
            }
            Gate::Start(
                DetailState {
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
            let post_id = controller.post_id.clone();
            match guarded(controller.context.backend().fetch_post_detail(&post_id)).await {
                Ok(detail) => {
                    info!(post_id = %post_id, comments = detail.comments.len(), "post loaded");
                    tracker.completed();
                    controller.state.replace(|s| DetailState {
                        post: Some(detail.post),
                        comments: detail.comments,
                        is_owner: detail.is_owner,
                        is_loading: false,
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(post_id = %post_id, "post load failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| DetailState {
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

    pub fn update_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.replace(|s| DetailState {
            new_comment_draft: text,
            comment_error: Effect::Consumed,
            ..s.clone()
        });
    }

    /// Send the draft as a new comment, appended last on success
    pub fn post_comment(&self) -> Dispatch {
        let tracker = self.context.tracker(
            ScreenKind::PostDetail,
            Operation::PostComment,
            Some(self.post_id()),
        );

        let admitted = admit(&self.state, |s| {
            if s.is_busy() {
                return Gate::Busy;
            }
            if is_blank(&s.new_comment_draft) {
                let error = ValidationError::EmptyComment;
                return Gate::Invalid(
                    error.clone(),
                    DetailState {
                        comment_error: Effect::Pending(error.to_string()),
                        ..s.clone()
                    },
                );
            }
            Gate::Start(
                DetailState {
                    is_comment_posting: true,
                    comment_error: Effect::Consumed,
                    ..s.clone()
                },
                s.new_comment_draft.trim().to_string(),
            )
        });
        let text = match admitted {
            Ok(text) => text,
            Err(refused) => return tracker.refused(refused),
        };

        tracker.started();
        let controller = self.clone();
        Dispatch::Started(self.context.spawn(async move {
            let post_id = controller.post_id.clone();
            let author = controller.context.display_name();
            let result =
                guarded(controller.context.backend().add_comment(&post_id, author, &text)).await;

            match result {
                Ok(comment) => {
                    info!(post_id = %post_id, comment_id = %comment.id, "comment posted");
                    tracker.completed();
                    controller.state.replace(|s| {
                        let mut comments = s.comments.clone();
                        comments.push(comment);
                        DetailState {
                            comments,
                            new_comment_draft: String::new(),
                            is_comment_posting: false,
                            ..s.clone()
                        }
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(post_id = %post_id, "comment failed: {}", e);
                    tracker.failed(&e);
                    // Draft is kept so the user can retry
                    controller.state.replace(|s| DetailState {
                        is_comment_posting: false,
                        comment_error: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    /// Delete the post and call `on_success` once it is gone
    ///
    /// The controller does not navigate; `on_success` decides where to go.
    /// It is not called on failure, which lands in `error_message`.
    pub fn delete_post<F>(&self, on_success: F) -> Dispatch
    where
        F: FnOnce() + Send + 'static,
    {
        let tracker = self.context.tracker(
            ScreenKind::PostDetail,
            Operation::DeletePost,
            Some(self.post_id()),
        );

        let admitted = admit(&self.state, |s| {
            if s.is_busy() {
                return Gate::Busy;
            }
            Gate::Start(
                DetailState {
                    is_deleting: true,
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
            let post_id = controller.post_id.clone();
            match guarded(controller.context.backend().delete_post(&post_id)).await {
                Ok(()) => {
                    info!(post_id = %post_id, "post deleted");
                    tracker.completed();
                    controller.state.replace(|s| DetailState {
                        is_deleting: false,
                        ..s.clone()
                    });
                    on_success();
                    Ok(())
                }
                Err(e) => {
                    warn!(post_id = %post_id, "delete failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| DetailState {
                        is_deleting: false,
                        error_message: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    pub fn comment_error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.comment_error)
    }

    pub fn error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.error_message)
    }
}

impl Controller for DetailController {
    type State = DetailState;

    fn state(&self) -> &StateCell<DetailState> {
        &self.state
    }

    fn runtime(&self) -> &Handle {
        self.context.runtime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::events::EventBus;

    fn context() -> ControllerContext {
        ControllerContext::new(
            Arc::new(SimulatedBackend::instant()),
            EventBus::default(),
            Handle::current(),
            "Current User",
        )
    }

    #[tokio::test]
    async fn test_open_loads_post_comments_and_ownership() {
        let detail = DetailController::open(context(), "1");
        assert!(detail.current().is_loading);
        assert_eq!(detail.current().post, None);

        let state = detail.state().settled().await;
        assert_eq!(state.post.as_ref().map(|p| p.id.as_str()), Some("1"));
        assert_eq!(state.comments.len(), 2);
        assert!(state.is_owner);
    }

    #[tokio::test]
    async fn test_blank_comment_is_invalid() {
        let detail = DetailController::new(context(), "2");
        detail.update_draft("   ");

        assert!(matches!(
            detail.post_comment(),
            Dispatch::Invalid(ValidationError::EmptyComment)
        ));
        let state = detail.current();
        assert!(!state.is_comment_posting);
        assert!(state.comment_error.is_pending());

        detail.update_draft("now with text");
        assert!(!detail.current().comment_error.is_pending());
    }

    #[tokio::test]
    async fn test_comment_rejected_while_loading() {
        let detail = DetailController::open(context(), "2");
        detail.update_draft("too early");

        assert!(matches!(detail.post_comment(), Dispatch::Busy));
        assert!(matches!(detail.delete_post(|| {}), Dispatch::Busy));
    }

    #[tokio::test]
    async fn test_comment_author_is_session_user() {
        let detail = DetailController::open(context(), "4");
        detail.state().settled().await;

        detail.update_draft("hello");
        detail.post_comment().finished().await;

        let state = detail.current();
        let last = state.comments.last().unwrap();
        assert_eq!(last.author, "Current User");
        assert_eq!(last.text, "hello");
        assert_eq!(state.new_comment_draft, "");
    }
}
