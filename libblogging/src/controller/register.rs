//! Registration screen controller

use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{acknowledge, admit, guarded, is_blank, Controller, ControllerContext, Gate};
use crate::error::ValidationError;
use crate::events::{Operation, ScreenKind};
use crate::store::{Dispatch, Effect, Snapshot, StateCell};
use crate::types::{Registration, User};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterState {
    pub full_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub is_loading: bool,
    pub error: Effect<String>,
    pub registered: Effect<User>,
}

impl Snapshot for RegisterState {
    fn is_busy(&self) -> bool {
        self.is_loading
    }
}

impl RegisterState {
    fn validate(&self) -> Result<Registration, ValidationError> {
        if is_blank(&self.full_name) || is_blank(&self.email) || self.password.is_empty() {
            return Err(ValidationError::IncompleteRegistration);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(Registration {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegisterController {
    state: Arc<StateCell<RegisterState>>,
    context: ControllerContext,
}

impl RegisterController {
    pub fn new(context: ControllerContext) -> Self {
        Self {
            state: Arc::new(StateCell::new(RegisterState::default())),
            context,
        }
    }

    fn edit<F>(&self, apply: F)
    where
        F: FnOnce(&mut RegisterState),
    {
        self.state.replace(|s| {
            let mut next = s.clone();
            apply(&mut next);
            next.error.acknowledge();
            next
        });
    }

    pub fn update_full_name(&self, text: impl Into<String>) {
        let text = text.into();
        self.edit(|s| s.full_name = text);
    }

    pub fn update_email(&self, text: impl Into<String>) {
        let text = text.into();
        self.edit(|s| s.email = text);
    }

    pub fn update_password(&self, text: impl Into<String>) {
        let text = text.into();
        self.edit(|s| s.password = text);
    }

    pub fn update_confirm_password(&self, text: impl Into<String>) {
        let text = text.into();
        self.edit(|s| s.confirm_password = text);
    }

    pub fn register(&self) -> Dispatch {
        let tracker = self
            .context
            .tracker(ScreenKind::Register, Operation::Register, None);

        let admitted = admit(&self.state, |s| {
            if s.is_loading {
                return Gate::Busy;
            }
            if s.registered.is_pending() {
                return Gate::Unacknowledged;
            }
            match s.validate() {
                Err(error) => Gate::Invalid(
                    error.clone(),
                    RegisterState {
                        error: Effect::Pending(error.to_string()),
                        ..s.clone()
                    },
                ),
                Ok(registration) => Gate::Start(
                    RegisterState {
                        is_loading: true,
                        error: Effect::Consumed,
                        ..s.clone()
                    },
                    registration,
                ),
            }
        });

        let registration = match admitted {
            Ok(registration) => registration,
            Err(refused) => return tracker.refused(refused),
        };

        tracker.started();
        let controller = self.clone();
        Dispatch::Started(self.context.spawn(async move {
            match guarded(controller.context.backend().register(&registration)).await {
                Ok(user) => {
                    info!(email = %registration.email, "account registered");
                    tracker.completed();
                    controller.state.replace(|s| RegisterState {
                        is_loading: false,
                        registered: Effect::Pending(user),
                        ..s.clone()
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(email = %registration.email, "registration failed: {}", e);
                    tracker.failed(&e);
                    controller.state.replace(|s| RegisterState {
                        is_loading: false,
                        error: Effect::Pending(e.to_string()),
                        ..s.clone()
                    });
                    Err(e)
                }
            }
        }))
    }

    /// Claim the registration of `user`; `false` if already claimed
    pub fn registered_effect_acknowledged(&self, user: &User) -> bool {
        acknowledge(&self.state, user, |s| &mut s.registered)
    }

    pub fn error_acknowledged(&self, message: &str) -> bool {
        acknowledge(&self.state, message, |s| &mut s.error)
    }
}

impl Controller for RegisterController {
    type State = RegisterState;

    fn state(&self) -> &StateCell<RegisterState> {
        &self.state
    }

    fn runtime(&self) -> &Handle {
        self.context.runtime()
    }
}
