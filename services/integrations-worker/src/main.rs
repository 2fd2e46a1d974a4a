//! integrations-worker entry point.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use integrations_worker::{consumer, routes, state::AppState};
use qf_config::settings::Settings;
use qf_integrations::{WebhookKbSink, WebhookTicketSink};
use tokio::sync::watch;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let settings = Settings::from_env().context("load settings")?;
    let pool = qf_bus::connect(&settings.database_url)
        .await
        .context("connect to postgres")?;

    let sinks = qf_config::secrets::resolve_integration_sinks();
    let tickets = WebhookTicketSink::new(sinks.ticket_url);
    let kb = WebhookKbSink::new(sinks.kb_url);

    let prometheus = qf_http::install_prometheus();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let port = settings.port;
    let shutdown_deadline = settings.shutdown_deadline;
    let state = Arc::new(AppState {
        pool,
        settings,
        tickets,
        kb,
    });

    consumer::spawn(Arc::clone(&state), shutdown_rx.clone());

    let app = routes::build_router(Arc::clone(&state))
        .layer(axum::Extension(prometheus))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("integrations-worker listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_tx, shutdown_deadline))
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn wait_for_shutdown(shutdown_tx: watch::Sender<bool>, deadline: std::time::Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(deadline).await;
}
