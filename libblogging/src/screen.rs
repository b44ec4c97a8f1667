//! Screen glue: turns pending effects into navigation and messages
//!
//! For every effect pending in the snapshot it was handed, a screen first
//! acknowledges that exact value on the controller and acts only when the
//! acknowledgment succeeds. A held or outdated snapshot, or a second
//! consumer racing on the same controller, therefore never repeats a
//! navigation or message, and never clears a newer effect it did not see.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::controller::{
    AuthController, AuthState, Controller, DetailController, DetailState, EditorController,
    EditorState, FeedController, FeedState, RegisterController, RegisterState,
};
use crate::navigation::{NavigationRequest, Navigator, PopUpTo, Route};
use crate::store::{Dispatch, Subscription};

/// Short transient messages (a snackbar on a phone, stderr in a terminal)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that keeps every message, in order
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<String>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MessageLog {
    fn notify(&self, message: &str) {
        debug!(%message, "notify");
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// A view over one controller that consumes its effects
pub trait Screen: Clone + Send + Sync + 'static {
    type Controller: Controller;

    fn controller(&self) -> &Self::Controller;

    /// Act on and acknowledge every pending effect in `state`
    fn consume(&self, state: &<Self::Controller as Controller>::State);

    /// Consume effects from the latest snapshot
    fn consume_current(&self) {
        self.consume(&self.controller().current());
    }

    /// Consume effects from every snapshot the controller publishes
    fn bind(&self) -> Subscription {
        let screen = self.clone();
        self.controller()
            .subscribe(move |state| screen.consume(&state))
    }
}

/// Collaborators shared by all screens of one app
#[derive(Clone)]
pub struct Host {
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
}

impl Host {
    pub fn new(navigator: Arc<dyn Navigator>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            navigator,
            notifier,
        }
    }
}

#[derive(Clone)]
pub struct LoginScreen {
    controller: AuthController,
    host: Host,
}

impl LoginScreen {
    pub fn new(controller: AuthController, host: Host) -> Self {
        Self { controller, host }
    }

    pub fn go_to_register(&self) {
        self.host
            .navigator
            .navigate_to(NavigationRequest::to(Route::Register));
    }
}

impl Screen for LoginScreen {
    type Controller = AuthController;

    fn controller(&self) -> &AuthController {
        &self.controller
    }

    fn consume(&self, state: &AuthState) {
        if let Some(user) = state.login_success.pending() {
            if self.controller.login_effect_acknowledged(user) {
                self.host.navigator.navigate_to(
                    NavigationRequest::to(Route::Home).popping(PopUpTo::inclusive(Route::Login)),
                );
            }
        }
        if let Some(error) = state.login_error.pending() {
            if self.controller.error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
    }
}

#[derive(Clone)]
pub struct RegisterScreen {
    controller: RegisterController,
    host: Host,
}

impl RegisterScreen {
    pub fn new(controller: RegisterController, host: Host) -> Self {
        Self { controller, host }
    }

    /// Back to the login screen without registering
    pub fn go_to_login(&self) {
        self.host.navigator.go_back();
    }
}

impl Screen for RegisterScreen {
    type Controller = RegisterController;

    fn controller(&self) -> &RegisterController {
        &self.controller
    }

    fn consume(&self, state: &RegisterState) {
        if let Some(user) = state.registered.pending() {
            if self.controller.registered_effect_acknowledged(user) {
                self.host
                    .notifier
                    .notify(&format!("Welcome, {}! Please sign in.", user.display_name));
                self.host.navigator.navigate_to(
                    NavigationRequest::to(Route::Login).popping(PopUpTo::inclusive(Route::Login)),
                );
            }
        }
        if let Some(error) = state.error.pending() {
            if self.controller.error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
    }
}

#[derive(Clone)]
pub struct HomeScreen {
    controller: FeedController,
    host: Host,
}

impl HomeScreen {
    pub fn new(controller: FeedController, host: Host) -> Self {
        Self { controller, host }
    }

    pub fn open_post(&self, post_id: &str) {
        self.host
            .navigator
            .navigate_to(NavigationRequest::to(Route::PostDetail(post_id.to_string())));
    }

    pub fn create_post(&self) {
        self.host
            .navigator
            .navigate_to(NavigationRequest::to(Route::CreatePost));
    }
}

impl Screen for HomeScreen {
    type Controller = FeedController;

    fn controller(&self) -> &FeedController {
        &self.controller
    }

    fn consume(&self, state: &FeedState) {
        if let Some(error) = state.error_message.pending() {
            if self.controller.error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
    }
}

#[derive(Clone)]
pub struct PostDetailScreen {
    controller: DetailController,
    host: Host,
}

impl PostDetailScreen {
    pub fn new(controller: DetailController, host: Host) -> Self {
        Self { controller, host }
    }

    /// Delete the post and leave the screen once it is gone
    pub fn delete(&self) -> Dispatch {
        let navigator = self.host.navigator.clone();
        self.controller.delete_post(move || {
            navigator.go_back();
        })
    }

    /// Open the editor for this post; only offered to the owner
    pub fn edit(&self) -> bool {
        if !self.controller.current().is_owner {
            return false;
        }
        self.host.navigator.navigate_to(NavigationRequest::to(Route::EditPost(
            self.controller.post_id().to_string(),
        )));
        true
    }

    pub fn back(&self) {
        self.host.navigator.go_back();
    }
}

impl Screen for PostDetailScreen {
    type Controller = DetailController;

    fn controller(&self) -> &DetailController {
        &self.controller
    }

    fn consume(&self, state: &DetailState) {
        if let Some(error) = state.error_message.pending() {
            if self.controller.error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
        if let Some(error) = state.comment_error.pending() {
            if self.controller.comment_error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
    }
}

#[derive(Clone)]
pub struct EditorScreen {
    controller: EditorController,
    host: Host,
}

impl EditorScreen {
    pub fn new(controller: EditorController, host: Host) -> Self {
        Self { controller, host }
    }

    pub fn back(&self) {
        self.host.navigator.go_back();
    }
}

impl Screen for EditorScreen {
    type Controller = EditorController;

    fn controller(&self) -> &EditorController {
        &self.controller
    }

    fn consume(&self, state: &EditorState) {
        if let Some(saved_id) = state.saved.pending() {
            if self.controller.save_effect_acknowledged(saved_id) {
                match &state.post_id {
                    // Edited: show the detail screen again, freshly created
                    Some(post_id) => {
                        let detail = Route::PostDetail(post_id.clone());
                        self.host.navigator.replace_back_stack_to(&detail, true);
                        self.host.navigator.navigate_to(NavigationRequest::to(detail));
                    }
                    None => {
                        debug!(post_id = %saved_id, "created post, leaving editor");
                        self.host.navigator.go_back();
                    }
                }
            }
        }
        if let Some(error) = state.error.pending() {
            if self.controller.error_acknowledged(error) {
                self.host.notifier.notify(error);
            }
        }
    }
}
