//! blogging - drive the blogging app screens from the command line

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libblogging::controller::{
    Controller, DetailController, DetailState, EditorController, EditorState, FeedController,
    FeedState,
};
use libblogging::events::Event;
use libblogging::logging;
use libblogging::navigation::{BackStack, NavigationRequest, Navigator, Route};
use libblogging::screen::{
    EditorScreen, HomeScreen, Host, LoginScreen, MessageLog, PostDetailScreen, RegisterScreen,
    Screen,
};
use libblogging::{BlogError, BloggingApp, Config};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "blogging")]
#[command(version, about = "Drive the blogging app screens headlessly")]
#[command(long_about = r#"Drive the blogging app screens headlessly.

Every command opens the screens it needs against a freshly seeded simulated
backend, waits for their operations to settle, follows the resulting
navigation, and prints the final screen state and back stack.

EXAMPLES:
    # Sign in with the built-in account
    blogging login user pass

    # List the feed as JSON
    blogging --format json feed | jq '.state.posts[].title'

    # Comment on a post
    blogging comment 2 "Nice write-up"

    # Walk through every screen in one session
    blogging tour

CONFIGURATION:
    BLOGGING_CONFIG      Config file (default: ~/.config/blogging/config.toml)
    BLOGGING_LOG_FORMAT  text, json or pretty
    BLOGGING_LOG_LEVEL   error, warn, info, debug or trace

EXIT CODES:
    0 - Success
    1 - Backend or configuration error
    2 - Invalid credentials
    3 - Invalid input
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and go to the home screen
    Login {
        /// Email or username
        user: String,
        password: String,
    },

    /// Create an account and return to the login screen
    Register {
        name: String,
        email: String,
        password: String,
        /// Must match PASSWORD
        confirm: String,
    },

    /// Load the home feed
    Feed,

    /// Show one post with its comments
    Show {
        /// Post id
        id: String,
    },

    /// Comment on a post
    Comment {
        /// Post id
        id: String,
        text: String,
    },

    /// Write a new post
    Create { title: String, content: String },

    /// Change the title and content of a post you own
    Edit {
        /// Post id
        id: String,
        title: String,
        content: String,
    },

    /// Delete a post you own
    Delete {
        /// Post id
        id: String,
    },

    /// Log in, read, comment, edit, delete and create in one session
    Tour,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

/// Final state of one screen after a command
#[derive(Debug, Serialize)]
struct Report<S: Serialize> {
    screen: &'static str,
    state: S,
    back_stack: Vec<Route>,
    messages: Vec<String>,
}

/// One app plus the navigator and notifier its screens share
struct Session {
    app: BloggingApp,
    stack: Arc<BackStack>,
    messages: Arc<MessageLog>,
    format: Format,
}

impl Session {
    fn new(app: BloggingApp, start: &[Route], format: Format) -> Self {
        let (first, rest) = match start.split_first() {
            Some((first, rest)) => (first.clone(), rest),
            None => (Route::Login, &[][..]),
        };
        let stack = Arc::new(BackStack::new(first));
        for route in rest {
            stack.navigate_to(NavigationRequest::to(route.clone()));
        }
        Self {
            app,
            stack,
            messages: Arc::new(MessageLog::new()),
            format,
        }
    }

    fn host(&self) -> Host {
        Host::new(self.stack.clone(), self.messages.clone())
    }

    fn report<S: Serialize>(&self, screen: &'static str, state: S) -> Report<S> {
        Report {
            screen,
            state,
            back_stack: self.stack.entries(),
            messages: self.messages.messages(),
        }
    }

    fn emit<S, F>(&self, report: &Report<S>, render: F) -> Result<()>
    where
        S: Serialize,
        F: FnOnce(&S),
    {
        match self.format {
            Format::Json => {
                let json = serde_json::to_string_pretty(report)?;
                println!("{}", json);
            }
            Format::Text => {
                render(&report.state);
                for message in &report.messages {
                    println!("! {}", message);
                }
                println!("Back stack: {}", format_stack(&report.back_stack));
            }
        }
        Ok(())
    }
}

fn format_stack(routes: &[Route]) -> String {
    if routes.is_empty() {
        return "(empty)".to_string();
    }
    routes
        .iter()
        .map(Route::to_string)
        .collect::<Vec<_>>()
        .join(" > ")
}

fn render_feed(state: &FeedState) {
    if state.posts.is_empty() {
        println!("No posts.");
    }
    for post in &state.posts {
        println!("{} | {} | {}", post.id, post.title, post.author);
        println!("    {}", post.excerpt);
    }
}

fn render_detail(state: &DetailState) {
    match &state.post {
        Some(post) => {
            println!("{}", post.title);
            println!("by {} on {}", post.author, post.date);
            if state.is_owner {
                println!("(you own this post)");
            }
            println!();
            println!("{}", post.content);
            println!();
            println!("Comments ({}):", state.comments.len());
            for comment in &state.comments {
                println!("  - {} ({}): {}", comment.author, comment.date, comment.text);
            }
        }
        None => println!("Post not available."),
    }
}

fn render_editor(state: &EditorState) {
    let target = state.post_id.as_deref().unwrap_or("new");
    println!("{} post {}", state.page_title, target);
    println!("Title: {}", state.title);
    println!("Content: {}", state.content);
}

async fn login(session: &Session, user: String, password: String) -> Result<()> {
    let controller = session.app.login();
    let screen = LoginScreen::new(controller.clone(), session.host());
    controller.update_email_or_username(user);
    controller.update_password(password);

    let outcome = controller.attempt_login().outcome().await;
    let state = controller.current();
    screen.consume_current();

    session.emit(&session.report("login", &state), |state| {
        if let Some(user) = state.login_success.pending() {
            println!("Signed in as {}", user.display_name);
        }
    })?;
    outcome.context("Login failed")
}

async fn register(
    session: &Session,
    name: String,
    email: String,
    password: String,
    confirm: String,
) -> Result<()> {
    let controller = session.app.register();
    let screen = RegisterScreen::new(controller.clone(), session.host());
    controller.update_full_name(name);
    controller.update_email(email);
    controller.update_password(password);
    controller.update_confirm_password(confirm);

    let outcome = controller.register().outcome().await;
    let state = controller.current();
    screen.consume_current();

    session.emit(&session.report("register", &state), |state| {
        if let Some(user) = state.registered.pending() {
            println!("Registered {} ({})", user.display_name, user.id);
        }
    })?;
    outcome.context("Registration failed")
}

async fn feed(session: &Session) -> Result<()> {
    let controller = FeedController::new(session.app.context().clone());
    let screen = HomeScreen::new(controller.clone(), session.host());

    let outcome = controller.load().outcome().await;
    screen.consume_current();

    session.emit(&session.report("home", controller.current()), render_feed)?;
    outcome.context("Failed to load feed")
}

/// Detail screen for `id` with its first load settled
async fn open_detail(session: &Session, id: &str) -> (PostDetailScreen, libblogging::Result<()>) {
    let controller = DetailController::new(session.app.context().clone(), id);
    let screen = PostDetailScreen::new(controller.clone(), session.host());
    let outcome = controller.load().outcome().await;
    (screen, outcome)
}

async fn show(session: &Session, id: String) -> Result<()> {
    let (screen, outcome) = open_detail(session, &id).await;
    screen.consume_current();

    let state = screen.controller().current();
    session.emit(&session.report("post_detail", state), render_detail)?;
    outcome.with_context(|| format!("Failed to load post {}", id))
}

async fn comment(session: &Session, id: String, text: String) -> Result<()> {
    let (screen, loaded) = open_detail(session, &id).await;
    let outcome = match loaded {
        Ok(()) => {
            screen.controller().update_draft(text);
            screen.controller().post_comment().outcome().await
        }
        Err(e) => Err(e),
    };
    screen.consume_current();

    let state = screen.controller().current();
    session.emit(&session.report("post_detail", state), render_detail)?;
    outcome.with_context(|| format!("Failed to comment on post {}", id))
}

async fn delete(session: &Session, id: String) -> Result<()> {
    let (screen, loaded) = open_detail(session, &id).await;
    let outcome = match loaded {
        Ok(()) => screen.delete().outcome().await,
        Err(e) => Err(e),
    };
    screen.consume_current();

    let state = screen.controller().current();
    session.emit(&session.report("post_detail", state), |_| {
        if outcome.is_ok() {
            println!("Deleted post {}", id);
        }
    })?;
    outcome.with_context(|| format!("Failed to delete post {}", id))
}

async fn save(session: &Session, post_id: Option<String>, title: String, content: String) -> Result<()> {
    let controller = EditorController::new(session.app.context().clone(), post_id.clone());
    let screen = EditorScreen::new(controller.clone(), session.host());

    let loaded = match &post_id {
        Some(_) => controller.load().outcome().await,
        None => Ok(()),
    };
    let outcome = match loaded {
        Ok(()) => {
            controller.update_title(title);
            controller.update_content(content);
            controller.save_or_update().outcome().await
        }
        Err(e) => Err(e),
    };
    let state = controller.current();
    screen.consume_current();

    session.emit(&session.report("editor", &state), |state| {
        render_editor(state);
        if let Some(id) = state.saved.pending() {
            println!("Saved post {}", id);
        }
    })?;
    outcome.context("Failed to save post")
}

/// Print a tour step in the chosen format
fn step<S: Serialize>(session: &Session, name: &str, state: &S) -> Result<()> {
    match session.format {
        Format::Json => {
            let value = serde_json::json!({
                "step": name,
                "route": session.stack.current(),
                "state": state,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
        Format::Text => {
            let route = session
                .stack
                .current()
                .map(|r| r.to_string())
                .unwrap_or_default();
            println!("==> {} [{}]", name, route);
        }
    }
    Ok(())
}

async fn tour(session: &Session) -> Result<()> {
    let app = &session.app;

    // Login
    let auth = app.login();
    let login = LoginScreen::new(auth.clone(), session.host());
    let username = app.config().simulation.username.clone();
    let password = app.config().simulation.password.clone();
    auth.update_email_or_username(username);
    auth.update_password(password);
    auth.attempt_login()
        .outcome()
        .await
        .context("Tour login failed")?;
    login.consume_current();
    step(session, "logged in", &auth.current())?;

    // Home
    let home = HomeScreen::new(app.feed(), session.host());
    let feed_state = home.controller().state().settled().await;
    home.consume_current();
    step(session, "feed loaded", &feed_state)?;

    let owned = feed_state
        .posts
        .first()
        .map(|p| p.id.clone())
        .context("Feed is empty")?;
    home.open_post(&owned);

    // Detail: comment, then edit
    let detail = PostDetailScreen::new(app.post_detail(owned.clone()), session.host());
    detail.controller().state().settled().await;
    detail.controller().update_draft("Visited on the tour");
    detail.controller().post_comment().outcome().await?;
    detail.consume_current();
    step(session, "commented", &detail.controller().current())?;

    if detail.edit() {
        let editor = EditorScreen::new(app.editor(Some(owned.clone())), session.host());
        let loaded = editor.controller().state().settled().await;
        editor
            .controller()
            .update_title(format!("{} (edited)", loaded.title));
        editor.controller().save_or_update().outcome().await?;
        let saved = editor.controller().current();
        editor.consume_current();
        step(session, "edited", &saved)?;
    }

    // Back on the detail screen, freshly loaded
    let detail = PostDetailScreen::new(app.post_detail(owned.clone()), session.host());
    detail.controller().state().settled().await;
    detail.delete().outcome().await?;
    detail.consume_current();
    step(session, "deleted", &detail.controller().current())?;

    // Create
    home.create_post();
    let editor = EditorScreen::new(app.editor(None), session.host());
    editor.controller().update_title("Written on the tour");
    editor
        .controller()
        .update_content("A post created by walking through every screen.");
    editor.controller().save_or_update().outcome().await?;
    let created = editor.controller().current();
    editor.consume_current();
    step(session, "created", &created)?;

    home.controller().refresh().outcome().await?;
    home.consume_current();
    let final_state = home.controller().current();
    step(session, "feed refreshed", &final_state)?;

    if session.format == Format::Text {
        render_feed(&final_state);
        println!("Back stack: {}", format_stack(&session.stack.entries()));
    }
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<BlogError>())
        .map(BlogError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> Result<()> {
    let format = match cli.format.as_str() {
        "json" => Format::Json,
        _ => Format::Text,
    };

    let config = Config::load().context("Failed to load configuration")?;
    let app = BloggingApp::from_config(config).context("Failed to start backend")?;

    if cli.verbose {
        let mut events = app.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    let detail_stack = |id: &str| vec![Route::Home, Route::PostDetail(id.to_string())];

    match cli.command {
        Commands::Login { user, password } => {
            let session = Session::new(app, &[Route::Login], format);
            login(&session, user, password).await
        }
        Commands::Register {
            name,
            email,
            password,
            confirm,
        } => {
            let session = Session::new(app, &[Route::Login, Route::Register], format);
            register(&session, name, email, password, confirm).await
        }
        Commands::Feed => {
            let session = Session::new(app, &[Route::Home], format);
            feed(&session).await
        }
        Commands::Show { id } => {
            let session = Session::new(app, &detail_stack(&id), format);
            show(&session, id).await
        }
        Commands::Comment { id, text } => {
            let session = Session::new(app, &detail_stack(&id), format);
            comment(&session, id, text).await
        }
        Commands::Create { title, content } => {
            let session = Session::new(app, &[Route::Home, Route::CreatePost], format);
            save(&session, None, title, content).await
        }
        Commands::Edit { id, title, content } => {
            let mut routes = detail_stack(&id);
            routes.push(Route::EditPost(id.clone()));
            let session = Session::new(app, &routes, format);
            save(&session, Some(id), title, content).await
        }
        Commands::Delete { id } => {
            let session = Session::new(app, &detail_stack(&id), format);
            delete(&session, id).await
        }
        Commands::Tour => {
            let session = Session::new(app, &[Route::Login], format);
            tour(&session).await
        }
    }
}

fn log_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::debug!(target: "blogging::events", "{}", json),
        Err(e) => tracing::warn!("unserializable event: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::config_from_env(cli.verbose).init();
    tracing::debug!("blogging started with args: {:?}", cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}
