//! Login screen controller

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{acknowledge, admit, guarded, is_blank, Controller, ControllerContext, Gate};
use crate::error::ValidationError;
use crate::events::{Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell};
use crate::types::User;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub email_or_username: String,
    #[serde(skip)]
    pub password: String,
    pub is_loading: bool,
    pub login_error: Effect<String>,
    /// Set once per successful login; the screen navigates home on it
    pub login_success: Effect<User>,
}

impl Snapshot for AuthState {
    fn is_busy(&self) -> bool {
        self.is_loading
    }
}

#[derive(Debug, Clone)]
pub struct AuthController {
    state: Arc<StateCell<AuthState>>,
    context: ControllerContext,
}

impl AuthController {
    pub fn new(context: ControllerContext) -> Self {
        Self {
            state: Arc::new(StateCell::new(AuthState::default())),
            context,
        }
    }

    pub fn update_email_or_username(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.replace(|s| AuthState {
            email_or_username: text,
            login_error: Effect::Consumed,
            ..s.clone()
        });
    }

    pub fn update_password(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.replace(|s| AuthState {
            password: text,
            login_error: Effect::Consumed,
            ..s.clone()
        });
    }

    pub fn attempt_login(&self) -> Dispatch {
        let tracker = self
            .context
            .tracker(ScreenKind::Login, Operation::Authenticate, None);

        let admitted = admit(&self.state, |s| {
            if s.is_loading {
                return Gate::Busy;
            }
            if s.login_success.is_pending() {
                return Gate::Unacknowledged;
            }
            if is_blank(&s.email_or_username) || is_blank(&s.password) {
                let error = ValidationError::CredentialsRequired;
                return Gate::Invalid(
                    error.clone(),
                    AuthState {
                        login_error: Effect::Pending(error.to_string()),
                        ..s.clone()
                    },
                );
            }
            Gate::Start(
                AuthState {
                    is_loading: true,
                    login_error: Effect::Consumed,
                    ..s.clone()
                },
                (s.email_or_username.trim().to_string(), s.password.clone()),
            )
        });

        let (identifier, password) = match admitted {
            Ok(credentials) => credentials,
            Err(refused) => return tracker.refused(refused),
        };

        tracker.started();
        let controller = self.clone();
        Dispatch::Started(self.context.spawn(async move {
            let result =
                guarded(controller.context.backend().authenticate(&identifier, &password)).await;

            match result {
                Ok(user) => {
                    info!(user = %user.display_name, "login succeeded");
                    tracker.completed();
                    controller.state.replace(|s| AuthState {
                        is_loading: false,
                        login_success: Effect::Pending(user),
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(identifier = %identifier, "login failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| AuthState {
                        is_loading: false,
                        login_error: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    /// Claim the success effect for `user` before navigating away
    ///
    /// Returns `false` when that success was already claimed, in which case
    /// the caller must not navigate again.
    pub fn login_effect_acknowledged(&self, user: &User) -> bool {
        acknowledge(&self.state, user, |s| &mut s.login_success)
    }

    /// Claim `message` for display; `false` if it is no longer pending
    pub fn error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.login_error)
    }
}

impl Controller for AuthController {
    type State = AuthState;

    fn state(&self) -> &StateCell<AuthState> {
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

    fn controller() -> AuthController {
        let context = ControllerContext::new(
            Arc::new(SimulatedBackend::instant()),
            EventBus::default(),
            Handle::current(),
            "Current User",
        );
        AuthController::new(context)
    }

    #[tokio::test]
    async fn test_blank_password_is_rejected_synchronously() {
        let auth = controller();
        auth.update_email_or_username("user");

        let dispatch = auth.attempt_login();
        assert!(matches!(
            dispatch,
            Dispatch::Invalid(ValidationError::CredentialsRequired)
        ));

        let state = auth.current();
        assert!(!state.is_loading);
        assert_eq!(
            state.login_error,
            Effect::Pending("credentials required".to_string())
        );
    }

    #[tokio::test]
    async fn test_editing_clears_stale_error() {
        let auth = controller();
        let _ = auth.attempt_login();
        assert!(auth.current().login_error.is_pending());

        auth.update_password("p");
        assert_eq!(auth.current().login_error, Effect::Consumed);
    }

    #[tokio::test]
    async fn test_successful_login_sets_effect_until_acknowledged() {
        let auth = controller();
        auth.update_email_or_username("user");
        auth.update_password("pass");

        auth.attempt_login().finished().await;
        let state = auth.current();
        assert!(!state.is_loading);
        assert_eq!(
            state.login_success.pending().map(|u| u.display_name.as_str()),
            Some("Current User")
        );

        // A held success blocks a second submit
        assert!(matches!(auth.attempt_login(), Dispatch::Unacknowledged));

        let user = state.login_success.pending().cloned().unwrap();
        assert!(auth.login_effect_acknowledged(&user));
        assert_eq!(auth.current().login_success, Effect::Consumed);
        assert!(!auth.login_effect_acknowledged(&user));
    }

    #[tokio::test]
    async fn test_password_is_not_serialized() {
        let auth = controller();
        auth.update_password("hunter2");

        let json = serde_json::to_value(auth.current()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["is_loading"], false);
    }
}
