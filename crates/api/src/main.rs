use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintfolio_core::bot::{self, Update};
use mintfolio_core::notify::{telegram::TelegramNotifier, Notifier};
use mintfolio_core::storage::subscribers::{PgSubscriberStore, SubscriberStore};

const GET_PLACEHOLDER: &str = "You are not supposed to be here!";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = mintfolio_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if let Err(e) = run(&settings).await {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "api exited with error");
        return Err(e);
    }
    Ok(())
}

async fn run(settings: &mintfolio_core::config::Settings) -> anyhow::Result<()> {
    // A database we cannot reach at startup is fatal.
    let db_url = settings.require_database_url()?;
    let pool = mintfolio_core::storage::connect(db_url).await?;
    mintfolio_core::storage::migrate(&pool).await?;
    tracing::info!("connected to database");

    let notifier = TelegramNotifier::from_settings(settings)?;

    let state = AppState {
        store: Arc::new(PgSubscriberStore::new(pool)),
        notifier: Arc::new(notifier),
    };

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port_or_default()));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SubscriberStore>,
    notifier: Arc<dyn Notifier>,
}

fn app(state: AppState) -> Router {
    Router::new()
        // GET /healthz is the liveness check; any other method there is a webhook call.
        .route("/healthz", get(healthz).fallback(webhook))
        .fallback(webhook)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Every path lands here. POST carries a Telegram update; GET gets a placeholder.
async fn webhook(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    match method {
        Method::POST => handle_update(&state, &body).await,
        Method::GET => GET_PLACEHOLDER.into_response(),
        _ => (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response(),
    }
}

async fn handle_update(state: &AppState, body: &[u8]) -> Response {
    tracing::info!(
        received_at = %chrono::Utc::now().to_rfc3339(),
        body = %String::from_utf8_lossy(body),
        "webhook update"
    );

    match process_update(state, body).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "webhook update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": "Internal Server Error" })),
            )
                .into_response()
        }
    }
}

async fn process_update(state: &AppState, body: &[u8]) -> anyhow::Result<()> {
    let update: Update = serde_json::from_slice(body).context("malformed update payload")?;
    let message = update.message;

    bot::handle(
        state.store.as_ref(),
        state.notifier.as_ref(),
        message.from.id,
        message.text.as_deref(),
        message.chat.id,
    )
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &mintfolio_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
