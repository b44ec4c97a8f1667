//! Application facade
//!
//! `BloggingApp` owns the shared collaborators (backend, event bus, runtime
//! handle, session settings) and hands out controllers wired to them. Every
//! screen of one app talks to the same backend, so a post created through
//! the editor shows up in the next feed load.
//!
//! # Example
//!
//! ```no_run
//! use libblogging::app::BloggingApp;
//! use libblogging::controller::Controller;
//!
//! # async fn example() -> libblogging::Result<()> {
//! let app = BloggingApp::new()?;
//!
//! let feed = app.feed();
//! let state = feed.state().settled().await;
//! println!("{} posts", state.posts.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tokio::runtime::Handle;

use crate::backend::{Backend, SimulatedBackend};
use crate::config::Config;
use crate::controller::{
    AuthController, ControllerContext, DetailController, EditorController, FeedController,
    RegisterController,
};
use crate::events::{EventBus, EventReceiver};
use crate::Result;

#[derive(Debug, Clone)]
pub struct BloggingApp {
    context: ControllerContext,
    config: Arc<Config>,
}

impl BloggingApp {
    /// App over the simulated backend, configured from the default location
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// App over the simulated backend described by `config`
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = Arc::new(SimulatedBackend::from_config(&config)?);
        Ok(Self::with_backend(backend, config, Handle::current()))
    }

    /// App over any backend, spawning operations onto `runtime`
    pub fn with_backend(backend: Arc<dyn Backend>, config: Config, runtime: Handle) -> Self {
        let context = ControllerContext::new(
            backend,
            EventBus::default(),
            runtime,
            config.session.display_name.clone(),
        );
        Self {
            context,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &ControllerContext {
        &self.context
    }

    /// Receive lifecycle events from every controller this app creates
    pub fn subscribe(&self) -> EventReceiver {
        self.context.events().subscribe()
    }

    pub fn login(&self) -> AuthController {
        AuthController::new(self.context.clone())
    }

    pub fn register(&self) -> RegisterController {
        RegisterController::new(self.context.clone())
    }

    /// Feed controller with its first load in flight
    pub fn feed(&self) -> FeedController {
        FeedController::open(self.context.clone())
    }

    /// Detail controller for `post_id` with its first load in flight
    pub fn post_detail(&self, post_id: impl Into<String>) -> DetailController {
        DetailController::open(self.context.clone(), post_id)
    }

    /// Editor in create mode (`None`) or loading `post_id` for editing
    pub fn editor(&self, post_id: Option<String>) -> EditorController {
        EditorController::open(self.context.clone(), post_id)
    }
}
