//! Domain entities passed between the backend, the controllers and the views
//!
//! All of these are immutable values: the backend creates them and
//! controllers replace them wholesale, never field by field.

use serde::{Deserialize, Serialize};

/// Feed list item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
}

/// Detail view of one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: String,
    pub is_owned_by_current_user: bool,
}

/// A comment; `post_id` names the one post it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub text: String,
    pub date: String,
}

/// An authenticated (or freshly registered) account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

/// Everything the detail screen loads in one logical operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub post: FullPost,
    pub comments: Vec<Comment>,
    pub is_owner: bool,
}

/// Editable fields of an existing post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

/// Registration form payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Shorten `content` to at most `max_chars` characters on a word boundary,
/// appending "..." when anything was cut.
pub fn excerpt_of(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let cut: String = trimmed.chars().take(max_chars).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}
