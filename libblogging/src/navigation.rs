//! Route table and the navigator contract
//!
//! Controllers never navigate. Screens read a pending effect from a
//! snapshot, call a [`Navigator`], and then acknowledge the effect.
//! [`BackStack`] is an in-memory navigator for headless drivers and tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// A destination in the app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Route {
    Login,
    Register,
    Home,
    PostDetail(String),
    CreatePost,
    EditPost(String),
}

impl Route {
    /// Post id carried by keyed routes
    pub fn post_id(&self) -> Option<&str> {
        match self {
            Route::PostDetail(id) | Route::EditPost(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "login"),
            Route::Register => write!(f, "register"),
            Route::Home => write!(f, "home"),
            Route::PostDetail(id) => write!(f, "post_detail/{}", id),
            Route::CreatePost => write!(f, "create_post"),
            Route::EditPost(id) => write!(f, "edit_post/{}", id),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown route: {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyed = |id: &str| {
            if id.is_empty() || id.contains('/') {
                Err(UnknownRoute(s.to_string()))
            } else {
                Ok(id.to_string())
            }
        };

        match s {
            "login" => Ok(Route::Login),
            "register" => Ok(Route::Register),
            "home" => Ok(Route::Home),
            "create_post" => Ok(Route::CreatePost),
            _ => {
                if let Some(id) = s.strip_prefix("post_detail/") {
                    keyed(id).map(Route::PostDetail)
                } else if let Some(id) = s.strip_prefix("edit_post/") {
                    keyed(id).map(Route::EditPost)
                } else {
                    Err(UnknownRoute(s.to_string()))
                }
            }
        }
    }
}

impl TryFrom<String> for Route {
    type Error = UnknownRoute;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        route.to_string()
    }
}

/// Pop entries off the stack before pushing a new destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopUpTo {
    pub route: Route,
    /// Also remove `route` itself
    pub inclusive: bool,
}

impl PopUpTo {
    pub fn inclusive(route: Route) -> Self {
        Self {
            route,
            inclusive: true,
        }
    }
}

/// A transient "go there" request handed to a navigator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub route: Route,
    pub pop_up_to: Option<PopUpTo>,
}

impl NavigationRequest {
    pub fn to(route: Route) -> Self {
        Self {
            route,
            pop_up_to: None,
        }
    }

    pub fn popping(mut self, pop_up_to: PopUpTo) -> Self {
        self.pop_up_to = Some(pop_up_to);
        self
    }
}

/// Destination switching, implemented by whatever hosts the screens
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, request: NavigationRequest);

    /// Pop the top entry; returns false when nothing was popped
    fn go_back(&self) -> bool;

    /// Pop everything above `route` (and `route` too when `inclusive`).
    /// Leaves the stack alone when `route` is not on it.
    fn replace_back_stack_to(&self, route: &Route, inclusive: bool) -> bool;
}

/// In-memory navigator: a plain stack of routes
#[derive(Debug)]
pub struct BackStack {
    entries: Mutex<Vec<Route>>,
}

impl BackStack {
    /// Stack holding only `start`
    pub fn new(start: Route) -> Self {
        Self {
            entries: Mutex::new(vec![start]),
        }
    }

    pub fn entries(&self) -> Vec<Route> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current(&self) -> Option<Route> {
        self.entries().last().cloned()
    }
}

impl Default for BackStack {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}

fn pop_to(entries: &mut Vec<Route>, route: &Route, inclusive: bool) -> bool {
    match entries.iter().rposition(|r| r == route) {
        Some(pos) => {
            let keep = if inclusive { pos } else { pos + 1 };
            entries.truncate(keep);
            true
        }
        None => false,
    }
}

impl Navigator for BackStack {
    fn navigate_to(&self, request: NavigationRequest) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pop) = &request.pop_up_to {
            pop_to(&mut entries, &pop.route, pop.inclusive);
        }
        // Single top: navigating to the current destination does not stack it
        if entries.last() != Some(&request.route) {
            entries.push(request.route.clone());
        }
        debug!(route = %request.route, depth = entries.len(), "navigated");
    }

    fn go_back(&self) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let popped = entries.pop();
        debug!(popped = ?popped.as_ref().map(Route::to_string), "back");
        popped.is_some()
    }

    fn replace_back_stack_to(&self, route: &Route, inclusive: bool) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        pop_to(&mut entries, route, inclusive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_strings() {
        let routes = [
            (Route::Login, "login"),
            (Route::Register, "register"),
            (Route::Home, "home"),
            (Route::PostDetail("7".to_string()), "post_detail/7"),
            (Route::CreatePost, "create_post"),
            (Route::EditPost("7".to_string()), "edit_post/7"),
        ];

        for (route, text) in routes {
            assert_eq!(route.to_string(), text);
            assert_eq!(text.parse::<Route>().unwrap(), route);
        }
    }

    #[test]
    fn test_route_parse_rejects_unknown() {
        assert!("settings".parse::<Route>().is_err());
        assert!("post_detail/".parse::<Route>().is_err());
        assert!("edit_post/1/2".parse::<Route>().is_err());
    }

    #[test]
    fn test_post_id_extraction() {
        assert_eq!(Route::PostDetail("3".to_string()).post_id(), Some("3"));
        assert_eq!(Route::EditPost("4".to_string()).post_id(), Some("4"));
        assert_eq!(Route::Home.post_id(), None);
    }

    #[test]
    fn test_login_replaces_itself_with_home() {
        let stack = BackStack::default();

        stack.navigate_to(
            NavigationRequest::to(Route::Home).popping(PopUpTo::inclusive(Route::Login)),
        );
        assert_eq!(stack.entries(), vec![Route::Home]);
    }

    #[test]
    fn test_register_returns_to_single_login() {
        let stack = BackStack::default();
        stack.navigate_to(NavigationRequest::to(Route::Register));

        stack.navigate_to(
            NavigationRequest::to(Route::Login).popping(PopUpTo::inclusive(Route::Login)),
        );
        assert_eq!(stack.entries(), vec![Route::Login]);
    }

    #[test]
    fn test_replace_back_stack_to() {
        let stack = BackStack::new(Route::Home);
        let detail = Route::PostDetail("1".to_string());
        stack.navigate_to(NavigationRequest::to(detail.clone()));
        stack.navigate_to(NavigationRequest::to(Route::EditPost("1".to_string())));

        assert!(stack.replace_back_stack_to(&detail, true));
        assert_eq!(stack.entries(), vec![Route::Home]);

        // Absent route leaves the stack untouched
        assert!(!stack.replace_back_stack_to(&Route::CreatePost, false));
        assert_eq!(stack.current(), Some(Route::Home));
    }

    #[test]
    fn test_go_back_on_empty_stack() {
        let stack = BackStack::new(Route::Home);
        assert!(stack.go_back());
        assert!(!stack.go_back());
        assert_eq!(stack.current(), None);
    }

    #[test]
    fn test_route_serializes_as_string() {
        let json = serde_json::to_string(&Route::PostDetail("2".to_string())).unwrap();
        assert_eq!(json, "\"post_detail/2\"");

        let route: Route = serde_json::from_str("\"home\"").unwrap();
        assert_eq!(route, Route::Home);
    }
}
