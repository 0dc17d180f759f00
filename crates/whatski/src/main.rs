//! The WhatSki chat server.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use whatski::core::ChatSessionBuilder;
use whatski::{AppState, Config, SessionStore, create_router};
use whatski_openai_model::OpenAIProvider;

const DEFAULT_LOG_FILTER: &str = "whatski=info,whatski_core=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("loaded {config:?}");

    let provider = OpenAIProvider::new(config.openai_config());
    let template = ChatSessionBuilder::with_assistant_provider(provider)
        .with_poll_policy(config.poll.clone())
        .with_message_limit(config.message_limit);
    let sessions = SessionStore::new(template, config.session_ttl);
    let sweeper = sessions.spawn_sweeper();

    let listener = match TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("cannot listen on {}: {err}", config.bind);
            return ExitCode::FAILURE;
        }
    };
    info!("WhatSki is listening on http://{}", config.bind);

    let app = create_router(AppState::new(sessions));
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
