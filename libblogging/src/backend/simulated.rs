//! In-memory backend with artificial latency
//!
//! Stands in for real network and storage I/O. Every operation sleeps for
//! its configured latency, counts the call, and can be told to fail so the
//! controllers' error paths are reachable from tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::Backend;
use crate::config::{Config, Latencies};
use crate::error::{BackendError, BackendResult, Result};
use crate::events::Operation;
use crate::types::{excerpt_of, Comment, FullPost, Post, PostDetail, PostDraft, Registration, User};

/// Maximum excerpt length for posts created through the backend
const EXCERPT_CHARS: usize = 80;

const SEED_DATE: &str = "30 May 2025";

#[derive(Debug, Clone)]
struct StoredPost {
    id: String,
    title: String,
    excerpt: String,
    content: String,
    author: String,
    date: String,
    owned: bool,
}

impl StoredPost {
    fn summary(&self) -> Post {
        Post {
            id: self.id.clone(),
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Account {
    identifiers: Vec<String>,
    password: String,
    user: User,
}

#[derive(Debug, Default)]
struct Store {
    posts: Vec<StoredPost>,
    comments: HashMap<String, Vec<Comment>>,
    accounts: Vec<Account>,
}

pub struct SimulatedBackend {
    latencies: Latencies,
    session_user: String,
    store: Mutex<Store>,
    calls: Mutex<HashMap<Operation, usize>>,
    failures: Mutex<HashMap<Operation, VecDeque<BackendError>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedBackend {
    /// Build the backend described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let latencies = config.simulation.latencies()?;
        Ok(Self::seeded(
            latencies,
            &config.simulation.username,
            &config.simulation.password,
            &config.session.display_name,
        ))
    }

    /// Stock data and credentials (`user` / `pass`) with the given latencies
    pub fn with_latencies(latencies: Latencies) -> Self {
        Self::seeded(latencies, "user", "pass", "Current User")
    }

    /// Stock data with no artificial delay
    pub fn instant() -> Self {
        Self::with_latencies(Latencies::zero())
    }

    fn seeded(latencies: Latencies, username: &str, password: &str, display_name: &str) -> Self {
        let seeds = [
            (
                "1",
                "A Great Jetpack Compose Tutorial",
                "A short preview of a Jetpack Compose tutorial that is very easy to follow...",
                "Andi Developer",
            ),
            (
                "2",
                "Productive Coding Tips",
                "A few tips to make your coding more productive and fun every day.",
                "Budi Koder",
            ),
            (
                "3",
                "Learning Kotlin from Scratch",
                "A complete guide for beginners who want to master the Kotlin language.",
                "Citra Programmer",
            ),
            (
                "4",
                "What Is an API?",
                "A simple explanation of APIs and how they are used in software development.",
                "Dani SysAdmin",
            ),
            (
                "5",
                "Latest Gaming Laptop Review",
                "An in-depth look at the performance and features of every gamer's dream laptop.",
                "Eva TechReviewer",
            ),
        ];

        let mut store = Store::default();
        for (id, title, excerpt, author) in seeds {
            store.posts.push(StoredPost {
                id: id.to_string(),
                title: title.to_string(),
                excerpt: excerpt.to_string(),
                content: format!(
                    "{} This is the full content of post {}. Lorem ipsum dolor sit amet, \
                     consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore \
                     et dolore magna aliqua.",
                    excerpt, id
                ),
                author: author.to_string(),
                date: SEED_DATE.to_string(),
                owned: id == "1",
            });
            store.comments.insert(
                id.to_string(),
                vec![
                    Comment {
                        id: format!("c1_{}", id),
                        post_id: id.to_string(),
                        author: "User A".to_string(),
                        text: format!("Thanks for writing post {}.", id),
                        date: SEED_DATE.to_string(),
                    },
                    Comment {
                        id: format!("c2_{}", id),
                        post_id: id.to_string(),
                        author: "User B".to_string(),
                        text: "Great, this was useful!".to_string(),
                        date: SEED_DATE.to_string(),
                    },
                ],
            );
        }
        store.accounts.push(Account {
            identifiers: vec![username.to_string()],
            password: password.to_string(),
            user: User {
                id: "u1".to_string(),
                display_name: display_name.to_string(),
            },
        });

        Self {
            latencies,
            session_user: display_name.to_string(),
            store: Mutex::new(store),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next call of `operation` fail with `error`
    ///
    /// Failures queue up: calling this twice fails the next two calls.
    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        lock(&self.failures)
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// How many times `operation` has been invoked
    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.calls).get(&operation).copied().unwrap_or(0)
    }

    /// Display name used for the seeded account
    pub fn session_user(&self) -> &str {
        &self.session_user
    }

    /// Count the call, wait out the latency, then apply any injected failure
    async fn enter(&self, operation: Operation, latency: Duration) -> BackendResult<()> {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
        debug!(?operation, ?latency, "simulated backend call");

        if !latency.is_zero() {
            sleep(latency).await;
        }

        let injected = lock(&self.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(post_id: &str) -> BackendError {
    BackendError::NotFound(format!("post {}", post_id))
}

#[async_trait]
impl Backend for SimulatedBackend {
    async fn authenticate(&self, identifier: &str, password: &str) -> BackendResult<User> {
        self.enter(Operation::Authenticate, self.latencies.authenticate)
            .await?;

        let store = lock(&self.store);
        store
            .accounts
            .iter()
            .find(|account| {
                account.password == password
                    && account.identifiers.iter().any(|id| id == identifier)
            })
            .map(|account| account.user.clone())
            .ok_or(BackendError::InvalidCredentials)
    }

    async fn register(&self, registration: &Registration) -> BackendResult<User> {
        self.enter(Operation::Register, self.latencies.register)
            .await?;

        let mut store = lock(&self.store);
        let taken = store
            .accounts
            .iter()
            .any(|account| account.identifiers.contains(&registration.email));
        if taken {
            return Err(BackendError::Rejected(format!(
                "{} is already registered",
                registration.email
            )));
        }

        let user = User {
            id: format!("u{}", store.accounts.len() + 1),
            display_name: registration.full_name.clone(),
        };
        store.accounts.push(Account {
            identifiers: vec![registration.email.clone()],
            password: registration.password.clone(),
            user: user.clone(),
        });
        Ok(user)
    }

    async fn fetch_posts(&self) -> BackendResult<Vec<Post>> {
        self.enter(Operation::LoadFeed, self.latencies.fetch_posts)
            .await?;

        let store = lock(&self.store);
        Ok(store.posts.iter().map(StoredPost::summary).collect())
    }

    async fn fetch_post_detail(&self, post_id: &str) -> BackendResult<PostDetail> {
        self.enter(Operation::LoadDetail, self.latencies.post_detail)
            .await?;

        let store = lock(&self.store);
        let stored = store
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .ok_or_else(|| not_found(post_id))?;

        Ok(PostDetail {
            post: FullPost {
                id: stored.id.clone(),
                title: stored.title.clone(),
                content: stored.content.clone(),
                author: stored.author.clone(),
                date: stored.date.clone(),
                is_owned_by_current_user: stored.owned,
            },
            comments: store.comments.get(post_id).cloned().unwrap_or_default(),
            is_owner: stored.owned,
        })
    }

    async fn add_comment(&self, post_id: &str, author: &str, text: &str) -> BackendResult<Comment> {
        self.enter(Operation::PostComment, self.latencies.add_comment)
            .await?;

        let mut store = lock(&self.store);
        if !store.posts.iter().any(|p| p.id == post_id) {
            return Err(not_found(post_id));
        }

        let comment = Comment {
            id: format!("c_{}", uuid::Uuid::new_v4()),
            post_id: post_id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            date: chrono::Utc::now().format("%d %B %Y %H:%M").to_string(),
        };
        store
            .comments
            .entry(post_id.to_string())
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    async fn save_post(&self, title: &str, content: &str) -> BackendResult<String> {
        self.enter(Operation::SavePost, self.latencies.save).await?;

        let mut store = lock(&self.store);
        let next_id = store
            .posts
            .iter()
            .filter_map(|p| p.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = next_id.to_string();

        store.posts.push(StoredPost {
            id: id.clone(),
            title: title.to_string(),
            excerpt: excerpt_of(content, EXCERPT_CHARS),
            content: content.to_string(),
            author: self.session_user.clone(),
            date: chrono::Utc::now().format("%d %B %Y").to_string(),
            owned: true,
        });
        Ok(id)
    }

    async fn update_post(&self, post_id: &str, title: &str, content: &str) -> BackendResult<()> {
        self.enter(Operation::UpdatePost, self.latencies.save)
            .await?;

        let mut store = lock(&self.store);
        let stored = store
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| not_found(post_id))?;
        stored.title = title.to_string();
        stored.excerpt = excerpt_of(content, EXCERPT_CHARS);
        stored.content = content.to_string();
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> BackendResult<()> {
        self.enter(Operation::DeletePost, self.latencies.delete)
            .await?;

        let mut store = lock(&self.store);
        let before = store.posts.len();
        store.posts.retain(|p| p.id != post_id);
        if store.posts.len() == before {
            return Err(not_found(post_id));
        }
        store.comments.remove(post_id);
        Ok(())
    }

    async fn fetch_post_for_edit(&self, post_id: &str) -> BackendResult<PostDraft> {
        self.enter(Operation::LoadForEdit, self.latencies.load_for_edit)
            .await?;

        let store = lock(&self.store);
        store
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .map(|p| PostDraft {
                title: p.title.clone(),
                content: p.content.clone(),
            })
            .ok_or_else(|| not_found(post_id))
    }
}
