//! Integration tests for the screen controllers
//!
//! Runs against the simulated backend with its stock latencies on a paused
//! clock, so "2 seconds later" is deterministic and instant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use libblogging::backend::{Backend, SimulatedBackend};
use libblogging::config::Config;
use libblogging::controller::{
    AuthController, ControllerContext, DetailController, EditorController, FeedController,
    RegisterController,
};
use libblogging::error::{BackendError, BackendResult, BlogError, ValidationError};
use libblogging::events::{Event, EventBus, Operation};
use libblogging::{Controller, Dispatch, Effect};
use libblogging::types::{Comment, Post, PostDetail, PostDraft, Registration, User};
use tokio::runtime::Handle;

/// Backend with the default (slow) latencies plus a context over it
fn setup() -> (Arc<SimulatedBackend>, ControllerContext) {
    let latencies = Config::default().simulation.latencies().unwrap();
    let backend = Arc::new(SimulatedBackend::with_latencies(latencies));
    let shared: Arc<dyn Backend> = backend.clone();
    let context = ControllerContext::new(shared, EventBus::default(), Handle::current(), "Current User");
    (backend, context)
}

fn record<C>(controller: &C) -> (Arc<Mutex<Vec<C::State>>>, libblogging::store::Subscription)
where
    C: Controller,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = controller.subscribe(move |state| sink.lock().unwrap().push(state));
    (seen, subscription)
}

#[tokio::test(start_paused = true)]
async fn test_login_with_known_pair_succeeds() {
    let (_backend, context) = setup();
    let auth = AuthController::new(context);
    auth.update_email_or_username("user");
    auth.update_password("pass");

    let dispatch = auth.attempt_login();
    assert!(dispatch.is_started());
    assert!(auth.current().is_loading);

    // Still in flight halfway through the simulated latency
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(auth.current().is_loading);

    dispatch.finished().await;
    let state = auth.current();
    assert!(!state.is_loading);
    assert!(state.login_success.is_pending());
    assert_eq!(state.login_error, Effect::Consumed);
}

#[tokio::test(start_paused = true)]
async fn test_login_with_wrong_password_fails() {
    let (_backend, context) = setup();
    let auth = AuthController::new(context);
    auth.update_email_or_username("user");
    auth.update_password("wrong");

    auth.attempt_login().finished().await;

    let state = auth.current();
    assert!(!state.is_loading);
    assert_eq!(
        state.login_error,
        Effect::Pending("invalid credentials".to_string())
    );
    assert!(!state.login_success.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_login_submit_is_rejected() {
    let (backend, context) = setup();
    let auth = AuthController::new(context);
    auth.update_email_or_username("user");
    auth.update_password("pass");

    let first = auth.attempt_login();
    let second = auth.attempt_login();
    assert!(first.is_started());
    assert!(matches!(second, Dispatch::Busy));

    first.finished().await;
    assert_eq!(backend.call_count(Operation::Authenticate), 1);
}

#[tokio::test(start_paused = true)]
async fn test_validation_error_never_enters_loading() {
    let (backend, context) = setup();
    let auth = AuthController::new(context);
    let (seen, _subscription) = record(&auth);

    auth.update_email_or_username("user");
    let dispatch = auth.attempt_login();
    assert!(matches!(
        dispatch,
        Dispatch::Invalid(ValidationError::CredentialsRequired)
    ));
    // Error is visible before the call returns
    assert_eq!(
        auth.current().login_error,
        Effect::Pending("credentials required".to_string())
    );

    auth.state()
        .wait_until(|s| s.login_error.is_pending())
        .await;
    tokio::task::yield_now().await;

    assert!(seen.lock().unwrap().iter().all(|s| !s.is_loading));
    assert_eq!(backend.call_count(Operation::Authenticate), 0);
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_effect_stays_cleared() {
    let (_backend, context) = setup();
    let auth = AuthController::new(context);
    auth.update_email_or_username("user");
    auth.update_password("pass");
    auth.attempt_login().finished().await;

    let user = auth.current().login_success.pending().cloned().unwrap();
    assert!(auth.login_effect_acknowledged(&user));
    assert_eq!(auth.current().login_success, Effect::Consumed);

    // Unrelated emissions do not bring it back
    auth.update_email_or_username("someone else");
    auth.update_password("other");
    assert_eq!(auth.current().login_success, Effect::Consumed);

    // And a new login may fire it again
    auth.update_email_or_username("user");
    auth.update_password("pass");
    assert!(auth.attempt_login().is_started());
}

#[tokio::test(start_paused = true)]
async fn test_feed_refresh_failure_keeps_previous_posts() {
    let (backend, context) = setup();
    for id in ["3", "4", "5"] {
        backend.delete_post(id).await.unwrap();
    }

    let feed = FeedController::open(context);
    let loaded = feed.state().settled().await;
    let ids: Vec<_> = loaded.posts.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    backend.fail_next(
        Operation::LoadFeed,
        BackendError::Network("connection reset".to_string()),
    );
    feed.refresh().finished().await;

    let state = feed.current();
    assert_eq!(state.posts, loaded.posts);
    assert_eq!(
        state.error_message,
        Effect::Pending("network error: connection reset".to_string())
    );
    assert!(!state.is_loading);

    assert!(feed.error_acknowledged("network error: connection reset"));
    assert_eq!(feed.current().error_message, Effect::Consumed);
}

#[tokio::test(start_paused = true)]
async fn test_comment_is_appended_last() {
    let (_backend, context) = setup();
    let detail = DetailController::open(context, "1");
    let before = detail.state().settled().await.comments;
    assert_eq!(before.len(), 2);

    detail.update_draft("hi");
    let dispatch = detail.post_comment();
    assert!(detail.current().is_comment_posting);
    dispatch.finished().await;

    let state = detail.current();
    assert_eq!(state.comments.len(), 3);
    assert_eq!(&state.comments[..2], &before[..]);
    assert_eq!(state.comments[2].text, "hi");
    assert_eq!(state.comments[2].post_id, "1");
    assert_eq!(state.new_comment_draft, "");
    assert!(!state.is_comment_posting);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_comment_is_rejected() {
    let (backend, context) = setup();
    let detail = DetailController::open(context, "2");
    detail.state().settled().await;

    detail.update_draft("first");
    let first = detail.post_comment();
    detail.update_draft("second");
    assert!(matches!(detail.post_comment(), Dispatch::Busy));
    assert!(matches!(detail.refresh(), Dispatch::Busy));

    first.finished().await;
    assert_eq!(backend.call_count(Operation::PostComment), 1);
    assert_eq!(detail.current().comments.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_comment_keeps_draft() {
    let (backend, context) = setup();
    let detail = DetailController::open(context, "2");
    detail.state().settled().await;

    backend.fail_next(
        Operation::PostComment,
        BackendError::Rejected("comments closed".to_string()),
    );
    detail.update_draft("keep me");
    detail.post_comment().finished().await;

    let state = detail.current();
    assert_eq!(state.comments.len(), 2);
    assert_eq!(state.new_comment_draft, "keep me");
    assert_eq!(
        state.comment_error,
        Effect::Pending("request rejected: comments closed".to_string())
    );

    assert!(detail.comment_error_acknowledged("request rejected: comments closed"));
    assert_eq!(detail.current().comment_error, Effect::Consumed);
}

#[tokio::test(start_paused = true)]
async fn test_detail_load_failure_leaves_post_empty() {
    let (_backend, context) = setup();
    let detail = DetailController::open(context, "404");

    let state = detail.state().settled().await;
    assert_eq!(state.post, None);
    assert!(state.comments.is_empty());
    assert_eq!(
        state.error_message,
        Effect::Pending("not found: post 404".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_detail_refresh_keeps_post_visible() {
    let (_backend, context) = setup();
    let detail = DetailController::open(context, "3");
    let loaded = detail.state().settled().await;

    let dispatch = detail.refresh();
    let during = detail.current();
    assert!(during.is_loading);
    assert_eq!(during.post, loaded.post);

    dispatch.finished().await;
    assert_eq!(detail.current().post, loaded.post);
}

#[tokio::test(start_paused = true)]
async fn test_delete_calls_back_exactly_once() {
    let (backend, context) = setup();
    let detail = DetailController::open(context, "1");
    detail.state().settled().await;

    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let dispatch = detail.delete_post(move || *counter.lock().unwrap() += 1);
    assert!(detail.current().is_deleting);
    assert!(matches!(detail.delete_post(|| {}), Dispatch::Busy));

    dispatch.finished().await;
    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(!detail.current().is_deleting);
    assert!(backend.fetch_post_detail("1").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_does_not_call_back() {
    let (backend, context) = setup();
    let detail = DetailController::open(context, "1");
    detail.state().settled().await;
    backend.fail_next(
        Operation::DeletePost,
        BackendError::Network("offline".to_string()),
    );

    let called = Arc::new(Mutex::new(false));
    let flag = called.clone();
    detail
        .delete_post(move || *flag.lock().unwrap() = true)
        .finished()
        .await;

    assert!(!*called.lock().unwrap());
    assert_eq!(
        detail.current().error_message,
        Effect::Pending("network error: offline".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_edit_mode_populates_fields_before_saved() {
    let (backend, context) = setup();
    let editor = EditorController::open(context, Some("1".to_string()));
    let (seen, _subscription) = record(&editor);

    // Saving is refused until the existing post has arrived
    assert!(matches!(editor.save_or_update(), Dispatch::Busy));

    let loaded = editor.state().settled().await;
    assert_eq!(loaded.title, "A Great Jetpack Compose Tutorial");
    assert!(!loaded.saved.is_pending());

    editor.update_title("Compose, Revisited");
    editor.save_or_update().finished().await;
    assert_eq!(editor.current().saved, Effect::Pending("1".to_string()));
    tokio::task::yield_now().await;

    for state in seen.lock().unwrap().iter() {
        if state.saved.is_pending() {
            assert!(!state.title.is_empty());
            assert!(!state.content.is_empty());
        }
    }
    assert_eq!(backend.call_count(Operation::UpdatePost), 1);
    assert_eq!(backend.call_count(Operation::SavePost), 0);

    let draft = backend.fetch_post_for_edit("1").await.unwrap();
    assert_eq!(draft.title, "Compose, Revisited");
}

#[tokio::test(start_paused = true)]
async fn test_create_mode_saves_new_post() {
    let (backend, context) = setup();
    let editor = EditorController::open(context, None);

    let initial = editor.current();
    assert!(!initial.is_edit_mode);
    assert_eq!(initial.title, "");
    assert_eq!(initial.content, "");

    editor.update_title("Brand new");
    editor.update_content("Written from scratch");
    let dispatch = editor.save_or_update();
    assert!(matches!(editor.save_or_update(), Dispatch::Busy));
    dispatch.finished().await;

    assert_eq!(editor.current().saved, Effect::Pending("6".to_string()));
    // A second save waits for the first to be acknowledged
    assert!(matches!(editor.save_or_update(), Dispatch::Unacknowledged));

    assert!(editor.save_effect_acknowledged("6"));
    assert_eq!(editor.current().saved, Effect::Consumed);
    assert_eq!(backend.call_count(Operation::SavePost), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_then_login() {
    let (_backend, context) = setup();
    let register = RegisterController::new(context.clone());
    register.update_full_name("Rina Writer");
    register.update_email("rina@example.com");
    register.update_password("secret");
    register.update_confirm_password("secret");

    register.register().finished().await;
    let user = register.current().registered.pending().cloned().unwrap();
    assert_eq!(user.display_name, "Rina Writer");

    let auth = AuthController::new(context);
    auth.update_email_or_username("rina@example.com");
    auth.update_password("secret");
    auth.attempt_login().finished().await;
    assert_eq!(auth.current().login_success, Effect::Pending(user));
}

#[tokio::test(start_paused = true)]
async fn test_register_password_mismatch() {
    let (_backend, context) = setup();
    let register = RegisterController::new(context);
    register.update_full_name("Rina Writer");
    register.update_email("rina@example.com");
    register.update_password("secret");
    register.update_confirm_password("secrets");

    assert!(matches!(
        register.register(),
        Dispatch::Invalid(ValidationError::PasswordMismatch)
    ));
    let state = register.current();
    assert!(!state.is_loading);
    assert_eq!(state.error, Effect::Pending("passwords do not match".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_controllers_run_independently() {
    let (_backend, context) = setup();
    let feed = FeedController::open(context.clone());
    let detail = DetailController::open(context.clone(), "2");
    let editor = EditorController::open(context, Some("3".to_string()));

    assert!(detail.current().is_loading);
    assert!(editor.current().is_loading);

    let (feed_state, detail_state, editor_state) = tokio::join!(
        feed.state().settled(),
        detail.state().settled(),
        editor.state().settled(),
    );
    assert_eq!(feed_state.posts.len(), 5);
    assert!(detail_state.post.is_some());
    assert_eq!(editor_state.title, "Learning Kotlin from Scratch");
}

#[tokio::test(start_paused = true)]
async fn test_operation_completes_after_controller_is_dropped() {
    let (_backend, context) = setup();
    let auth = AuthController::new(context);
    auth.update_email_or_username("user");
    auth.update_password("pass");
    let mut receiver = auth.state().watch();

    let dispatch = auth.attempt_login();
    drop(auth);

    dispatch.finished().await;
    let state = receiver.borrow_and_update().clone();
    assert!(!state.is_loading);
    assert!(state.login_success.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_event_timeline_for_rejected_and_completed_actions() {
    let (_backend, context) = setup();
    let mut events = context.events().subscribe();
    let feed = FeedController::open(context);

    let _ = feed.refresh();
    feed.state().settled().await;

    let timeline: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(timeline.len(), 3);
    assert!(matches!(timeline[0], Event::OperationStarted { .. }));
    assert!(matches!(
        &timeline[1],
        Event::ActionRejected { reason, .. } if reason == "operation already in flight"
    ));
    assert!(matches!(timeline[2], Event::OperationCompleted { .. }));
}

/// Backend whose every call panics instead of returning
struct PanickingBackend;

#[async_trait]
impl Backend for PanickingBackend {
    async fn authenticate(&self, _identifier: &str, _password: &str) -> BackendResult<User> {
        panic!("authenticate exploded")
    }

    async fn register(&self, _registration: &Registration) -> BackendResult<User> {
        panic!("register exploded")
    }

    async fn fetch_posts(&self) -> BackendResult<Vec<Post>> {
        panic!("feed exploded")
    }

    async fn fetch_post_detail(&self, _post_id: &str) -> BackendResult<PostDetail> {
        panic!("detail exploded")
    }

    async fn add_comment(&self, _post_id: &str, _author: &str, _text: &str) -> BackendResult<Comment> {
        panic!("comment exploded")
    }

    async fn save_post(&self, _title: &str, _content: &str) -> BackendResult<String> {
        panic!("save exploded")
    }

    async fn update_post(&self, _post_id: &str, _title: &str, _content: &str) -> BackendResult<()> {
        panic!("update exploded")
    }

    async fn delete_post(&self, _post_id: &str) -> BackendResult<()> {
        panic!("delete exploded")
    }

    async fn fetch_post_for_edit(&self, _post_id: &str) -> BackendResult<PostDraft> {
        panic!("edit load exploded")
    }
}

#[tokio::test]
async fn test_panicking_backend_never_leaves_controller_busy() {
    let backend: Arc<dyn Backend> = Arc::new(PanickingBackend);
    let context = ControllerContext::new(backend, EventBus::default(), Handle::current(), "Current User");

    let feed = FeedController::open(context.clone());
    let state = feed.state().settled().await;
    assert_eq!(
        state.error_message,
        Effect::Pending("operation aborted: feed exploded".to_string())
    );
    assert!(matches!(
        feed.refresh().outcome().await,
        Err(BlogError::Backend(BackendError::Aborted(_)))
    ));
    assert!(!feed.current().is_loading);

    let detail = DetailController::new(context.clone(), "1");
    let deleted = Arc::new(Mutex::new(false));
    let flag = deleted.clone();
    let outcome = detail
        .delete_post(move || *flag.lock().unwrap() = true)
        .outcome()
        .await;
    assert!(matches!(outcome, Err(BlogError::Backend(BackendError::Aborted(_)))));
    assert!(!detail.current().is_deleting);
    assert!(!*deleted.lock().unwrap());

    let editor = EditorController::open(context, Some("1".to_string()));
    let state = editor.state().settled().await;
    assert_eq!(
        state.error,
        Effect::Pending("operation aborted: edit load exploded".to_string())
    );
}
