//! Blogging - screen controllers for a small blogging app
//!
//! Each screen (login, register, feed, post detail, editor) is driven by a
//! controller that owns an observable snapshot and runs its asynchronous
//! actions as explicit state transitions. One-shot outcomes such as
//! "navigate home" or "show this error" ride in the snapshot as
//! [`store::Effect`]s and stay pending until the screen acknowledges them.

pub mod app;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod logging;
pub mod navigation;
pub mod screen;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use app::BloggingApp;
pub use config::Config;
pub use controller::Controller;
pub use error::{BackendError, BlogError, Result, ValidationError};
pub use navigation::{BackStack, Navigator, Route};
pub use store::{Dispatch, Effect, StateCell};
pub use types::{Comment, FullPost, Post, User};
