use anyhow::Context;
use shopster_api::{
    app_router,
    config::{init_tracing, load_config},
    db, events,
    services::{
        notifications::{EmailNotifier, LogMailer},
        search::{LogSearchBackend, SearchIndexer},
    },
    AppState,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level);

    let pool = db::establish_connection(&config)
        .await
        .context("failed to connect to database")?;
    let db = Arc::new(pool);

    if config.auto_create_schema {
        db::create_schema(&db)
            .await
            .context("failed to bootstrap schema")?;
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let event_sender = Arc::new(events::EventSender::new(tx));

    let mut hooks: Vec<Arc<dyn events::PostCommitHook>> = vec![Arc::new(EmailNotifier::new(
        db.clone(),
        Arc::new(LogMailer),
        config.frontend_password_reset_url.clone(),
    ))];
    if config.search_sync_enabled {
        hooks.push(Arc::new(SearchIndexer::new(
            db.clone(),
            Arc::new(LogSearchBackend),
        )));
    }
    let event_processor = tokio::spawn(events::process_events(rx, hooks));

    let state = Arc::new(AppState::new(db, config.clone(), event_sender));

    let cors = build_cors(config.cors_allowed_origins.as_deref())?;
    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, environment = %config.environment, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    event_processor.abort();
    info!("shutdown complete");
    Ok(())
}

fn build_cors(origins: Option<&str>) -> anyhow::Result<CorsLayer> {
    match origins {
        Some(list) if !list.trim().is_empty() => {
            let parsed = list
                .split(',')
                .map(|o| o.trim().parse::<axum::http::HeaderValue>())
                .collect::<Result<Vec<_>, _>>()
                .context("invalid CORS origin")?;
            Ok(CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any))
        }
        _ => Ok(CorsLayer::permissive()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
