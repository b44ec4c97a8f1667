//! Create / edit post controller
//!
//! Constructed with an optional post id. With one it runs in edit mode and
//! fetches the existing title and content first; without one it starts
//! empty in create mode. Loading and saving share `is_loading`, so a save
//! can never overtake the initial load.

use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{acknowledge, admit, guarded, is_blank, Controller, ControllerContext, Gate};
use crate::error::ValidationError;
use crate::events::{Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell};

pub const CREATE_TITLE: &str = "Create";
pub const EDIT_TITLE: &str = "Edit";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditorState {
    pub title: String,
    pub content: String,
    pub is_loading: bool,
    pub error: Effect<String>,
    pub is_edit_mode: bool,
    /// Id of the post being edited; `None` in create mode
    pub post_id: Option<String>,
    /// Pending with the saved post's id until the screen acknowledges
    pub saved: Effect<String>,
    pub page_title: String,
}

impl Snapshot for EditorState {
    fn is_busy(&self) -> bool {
        self.is_loading
    }
}

#[derive(Debug, Clone)]
pub struct EditorController {
    state: Arc<StateCell<EditorState>>,
    context: ControllerContext,
}

impl EditorController {
    /// Editor in the mode implied by `post_id`, without fetching anything
    pub fn new(context: ControllerContext, post_id: Option<String>) -> Self {
        let initial = EditorState {
            is_edit_mode: post_id.is_some(),
            page_title: if post_id.is_some() { EDIT_TITLE } else { CREATE_TITLE }.to_string(),
            post_id,
            ..Default::default()
        };
        Self {
            state: Arc::new(StateCell::new(initial)),
            context,
        }
    }

    /// Editor ready for input; in edit mode the existing post is loading
    pub fn open(context: ControllerContext, post_id: Option<String>) -> Self {
        let controller = Self::new(context, post_id);
        if controller.current().is_edit_mode {
            let _ = controller.load();
        }
        controller
    }

    /// Fetch the post being edited, replacing title and content
    ///
    /// Returns `Dispatch::Skipped` in create mode, where there is nothing to
    /// fetch.
    pub fn load(&self) -> Dispatch {
        // The mode is fixed at construction
        let Some(post_id) = self.current().post_id else {
            debug!("create mode has no post to load");
            return Dispatch::Skipped;
        };

        let tracker = self.context.tracker(
            ScreenKind::Editor,
            Operation::LoadForEdit,
            Some(post_id.as_str()),
        );
        let admitted = admit(&self.state, |s| {
            if s.is_loading {
                return Gate::Busy;
            }
            Gate::Start(
                EditorState {
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
            match guarded(controller.context.backend().fetch_post_for_edit(&post_id)).await {
                Ok(draft) => {
                    info!(post_id = %post_id, "post loaded for editing");
                    tracker.completed();
                    controller.state.replace(|s| EditorState {
                        title: draft.title,
                        content: draft.content,
                        is_loading: false,
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(post_id = %post_id, "loading post for editing failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| EditorState {
                        is_loading: false,
                        error: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    pub fn update_title(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.replace(|s| EditorState {
            title: text,
            error: Effect::Consumed,
            ..s.clone()
        });
    }

    pub fn update_content(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.replace(|s| EditorState {
            content: text,
            error: Effect::Consumed,
            ..s.clone()
        });
    }

    /// Create the post, or update it in edit mode
    pub fn save_or_update(&self) -> Dispatch {
        let current = self.current();
        let operation = if current.is_edit_mode {
            Operation::UpdatePost
        } else {
            Operation::SavePost
        };
        let tracker = self
            .context
            .tracker(ScreenKind::Editor, operation, current.post_id.as_deref());

        let admitted = admit(&self.state, |s| {
            if s.is_loading {
                return Gate::Busy;
            }
            if s.saved.is_pending() {
                return Gate::Unacknowledged;
            }
            if is_blank(&s.title) || is_blank(&s.content) {
                let error = ValidationError::EmptyTitleOrContent;
                return Gate::Invalid(
                    error.clone(),
                    EditorState {
                        error: Effect::Pending(error.to_string()),
                        ..s.clone()
                    },
                );
            }
            Gate::Start(
                EditorState {
                    is_loading: true,
                    error: Effect::Consumed,
                    ..s.clone()
                },
                (s.post_id.clone(), s.title.trim().to_string(), s.content.clone()),
            )
        });
        let (post_id, title, content) = match admitted {
            Ok(request) => request,
            Err(refused) => return tracker.refused(refused),
        };

        tracker.started();
        let controller = self.clone();
        Dispatch::Started(self.context.spawn(async move {
            let backend = controller.context.backend();
            let result = match &post_id {
                Some(id) => guarded(backend.update_post(id, &title, &content))
                    .await
                    .map(|()| id.clone()),
                None => guarded(backend.save_post(&title, &content)).await,
            };

            match result {
                Ok(saved_id) => {
                    info!(post_id = %saved_id, "post saved");
                    tracker.completed();
                    controller.state.replace(|s| EditorState {
                        is_loading: false,
                        saved: Effect::Pending(saved_id),
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(post_id = ?post_id, "saving post failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| EditorState {
                        is_loading: false,
                        error: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    /// Claim the save of `post_id`; `false` if already claimed
    pub fn save_effect_acknowledged(&self, post_id: &str) -> bool {
        acknowledge(&self.state, post_id, |s| &mut s.saved)
    }

    pub fn error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.error)
    }
}

impl Controller for EditorController {
    type State = EditorState;

    fn state(&self) -> &StateCell<EditorState> {
        &self.state
    }

    fn runtime(&self) -> &Handle {
        self.context.runtime()
    }
}
