//! Backend contract consumed by the screen controllers
//!
//! The controllers only ever see `Arc<dyn Backend>`; a real network client
//! and the in-memory [`simulated::SimulatedBackend`] are interchangeable.
//! Every operation is asynchronous and may fail with a [`BackendError`].
//!
//! [`BackendError`]: crate::error::BackendError

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{Comment, Post, PostDetail, PostDraft, Registration, User};

pub mod simulated;

pub use simulated::SimulatedBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Check a username/email and password pair
    ///
    /// # Errors
    ///
    /// `BackendError::InvalidCredentials` when the pair is not recognised.
    async fn authenticate(&self, identifier: &str, password: &str) -> BackendResult<User>;

    /// Create an account
    async fn register(&self, registration: &Registration) -> BackendResult<User>;

    /// The full feed, newest state; callers replace rather than merge
    async fn fetch_posts(&self) -> BackendResult<Vec<Post>>;

    /// Post, its comments and the ownership flag as one result
    async fn fetch_post_detail(&self, post_id: &str) -> BackendResult<PostDetail>;

    /// Append a comment and return it as stored
    async fn add_comment(&self, post_id: &str, author: &str, text: &str) -> BackendResult<Comment>;

    /// Create a post and return its id
    async fn save_post(&self, title: &str, content: &str) -> BackendResult<String>;

    async fn update_post(&self, post_id: &str, title: &str, content: &str) -> BackendResult<()>;

    async fn delete_post(&self, post_id: &str) -> BackendResult<()>;

    /// Current title and content of a post about to be edited
    async fn fetch_post_for_edit(&self, post_id: &str) -> BackendResult<PostDraft>;
}
