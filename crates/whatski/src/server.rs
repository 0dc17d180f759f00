//! HTTP routes of the chat page.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use whatski_core::Message;

use crate::page;
use crate::sessions::{SessionStore, SharedSession};

/// The name of the cookie that identifies a browser session.
pub const SESSION_COOKIE: &str = "whatski_session";

const OFFLINE_BANNER: &str = "The ski advisor is unreachable right now. \
    Your next message will try to connect again.";

/// State shared by all routes.
#[derive(Clone)]
pub struct AppState {
    sessions: SessionStore,
}

impl AppState {
    /// Creates the state over a session store.
    #[inline]
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    fn session_for(&self, jar: CookieJar) -> (CookieJar, SharedSession) {
        let id = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
        let (id, session) = self.sessions.get_or_create(id);
        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        (jar.add(cookie), session)
    }
}

/// Creates the router serving the chat page and its JSON API.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat_form))
        .route("/api/transcript", get(transcript))
        .route("/api/chat", post(chat_json))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    ok: bool,
    reply: Option<Message>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

async fn index(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, session) = state.session_for(jar);
    let session = session.lock().await;
    let banner = match session.create_session().await {
        Ok(_) => None,
        Err(err) => {
            warn!("cannot create conversation thread: {err}");
            Some(OFFLINE_BANNER)
        }
    };
    (jar, Html(page::render(session.transcript(), banner))).into_response()
}

async fn chat_form(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<ChatRequest>,
) -> Response {
    let (jar, session) = state.session_for(jar);
    let prompt = req.prompt.trim();
    if !prompt.is_empty() {
        session.lock().await.send_message(prompt).await;
    }
    (jar, Redirect::to("/#latest")).into_response()
}

async fn chat_json(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ChatRequest>,
) -> Response {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        let body = ErrorResponse {
            error: "prompt must not be blank",
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let (jar, session) = state.session_for(jar);
    let mut session = session.lock().await;
    let outcome = session.send_message(prompt).await;
    let body = ChatResponse {
        ok: outcome.is_replied(),
        reply: session.last_message().cloned(),
    };
    (jar, Json(body)).into_response()
}

async fn transcript(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, session) = state.session_for(jar);
    let session = session.lock().await;
    (jar, Json(session.transcript().clone())).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}
