//! HTTP listener and startup sequence.

use std::sync::Arc;

use axum::{Router, routing::any};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::error::{RelayError, RelayResult};
use crate::handler::{AppState, TEMPLATE_NAME, handle_webhook};
use crate::sender::build_sender;
use crate::template::Template;

/// Address the relay listens on.
pub const LISTEN_ADDR: &str = "0.0.0.0:5555";

/// Router sending every method and path to the webhook handler.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", any(handle_webhook))
        .fallback(handle_webhook)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after `shutdown` fires.
///
/// # Errors
///
/// Returns [`RelayError::Serve`] if the server stops with an I/O error.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> RelayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(RelayError::Serve)
}

/// Start the relay and run until Ctrl+C.
///
/// Compiles the template, builds and verifies the Telegram client, then
/// binds [`LISTEN_ADDR`]. Any failure along the way is returned before the
/// listener accepts a connection.
///
/// # Errors
///
/// Returns the first startup failure, or a server I/O error.
pub async fn run(config: Config) -> RelayResult<()> {
    let template = Template::parse(TEMPLATE_NAME, &config.template)?;
    info!(template = template.name(), "template compiled");

    let sender = build_sender(&config)?;
    let username = sender.verify().await?;
    info!(bot = %username, "authorized on Telegram");

    let state = Arc::new(AppState {
        chat_id: config.chat_id,
        template,
        sender: Arc::new(sender),
    });

    let listener = TcpListener::bind(LISTEN_ADDR)
        .await
        .map_err(|source| RelayError::Bind {
            addr: LISTEN_ADDR.to_string(),
            source,
        })?;
    info!("Listening :5555");

    serve(listener, state, shutdown_signal()).await?;
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown requested");
}
