//! executor-worker entry point.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use executor_worker::{consumer, routes, state::AppState};
use qf_config::settings::{Exchange, Settings};
use qf_exec::{Adapter, ExecutionGateway, LiveAdapter, PaperAdapter};
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
    qf_kv::migrate(&pool).await.context("run qf-kv migrations")?;

    let adapter = build_adapter(&settings).context("build exchange adapter")?;
    let gateway = ExecutionGateway::new(adapter);

    let prometheus = qf_http::install_prometheus();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let port = settings.port;
    let shutdown_deadline = settings.shutdown_deadline;
    let state = Arc::new(AppState {
        pool,
        settings,
        gateway,
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
    info!("executor-worker listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_tx, shutdown_deadline))
        .await
        .context("server crashed")?;

    Ok(())
}

/// `EXCHANGE=paper` needs only the configured price/fee/slippage; `binance`/
/// `coinbase` resolve live credentials and an `EXCHANGE_URL` base (spec.md
/// §6's externalized exchange adapter interface does not enumerate a base
/// URL env var, so this follows the `*_URL` sibling-service convention).
fn build_adapter(settings: &Settings) -> anyhow::Result<Adapter> {
    match settings.exchange {
        Exchange::Paper => Ok(Adapter::Paper(PaperAdapter {
            price_default: settings.paper_price_default,
            fee_bps: settings.exchange_fee_bps,
            slippage_bps: settings.slippage_bps,
            profit_per_trade: std::env::var("PROFIT_PER_TRADE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5.0),
        })),
        Exchange::Binance | Exchange::Coinbase => {
            let name = if settings.exchange == Exchange::Binance {
                "binance"
            } else {
                "coinbase"
            };
            let secrets = qf_config::secrets::resolve_exchange_secrets(name)?;
            let base_url = std::env::var("EXCHANGE_URL")
                .context("EXCHANGE_URL must be set for a live exchange")?;
            Ok(Adapter::Live(LiveAdapter::new(
                base_url,
                secrets.api_key.unwrap_or_default(),
                secrets.api_secret.unwrap_or_default(),
            )))
        }
    }
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
