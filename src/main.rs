//! market-indexer entry point.
//!
//! Wires configuration, PostgreSQL, the HyperSync log source, the JSON-RPC
//! chain client and the notification bus together, then runs the ingestion
//! loop and the operations endpoint until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use market_indexer::api;
use market_indexer::app_state::AppState;
use market_indexer::chain::{ChainState, RetryingChainState, RpcChainClient};
use market_indexer::config::IndexerConfig;
use market_indexer::domain::NotificationBus;
use market_indexer::enrichment::{HttpMetadataSource, MetadataSource, NoMetadata};
use market_indexer::http::build_client;
use market_indexer::persistence::{PostgresStore, Store};
use market_indexer::retry::RetryPolicy;
use market_indexer::service::{Ingestor, Notifier, PersistingNotifier, Reconciler};
use market_indexer::source::{HyperSyncClient, LogSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IndexerConfig::from_env().context("failed to load configuration")?;
    init_tracing(config.json_logs);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        contract = %config.hypersync.contract_address,
        start_block = config.start_block,
        "starting market-indexer"
    );

    // Persistence
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    let postgres = PostgresStore::new(pool.clone());
    if config.run_migrations {
        postgres.migrate().await.context("failed to run migrations")?;
        tracing::info!("migrations applied");
    }
    let store: Arc<dyn Store> = Arc::new(postgres);

    // External collaborators
    let cancel = CancellationToken::new();
    let retry = RetryPolicy::new(config.retry.clone(), cancel.clone());
    let http = build_client(config.http_timeout)?;

    let source: Arc<dyn LogSource> = Arc::new(HyperSyncClient::new(
        http.clone(),
        config.hypersync.clone(),
        retry.clone(),
    ));
    let chain: Arc<dyn ChainState> = Arc::new(RetryingChainState::new(
        RpcChainClient::new(
            http.clone(),
            config.rpc_url.clone(),
            config.hypersync.contract_address,
        ),
        retry,
    ));
    let metadata: Arc<dyn MetadataSource> = match &config.metadata_url {
        Some(url) => Arc::new(HttpMetadataSource::new(http, url.clone())),
        None => {
            tracing::info!("METADATA_URL not set, listings are created without metadata");
            Arc::new(NoMetadata)
        }
    };
    let bus = NotificationBus::new(config.notification_bus_capacity);
    let notifier: Arc<dyn Notifier> =
        Arc::new(PersistingNotifier::new(Arc::clone(&store), bus));

    // Ingestion loop
    let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&chain), metadata, notifier);
    let ingestor = Ingestor::new(
        source,
        Arc::clone(&store),
        chain,
        reconciler,
        config.start_block,
        config.poll.clone(),
        cancel.clone(),
    );
    let ingestion = tokio::spawn(async move { ingestor.run().await });

    // Operations endpoint
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            store,
            start_block: config.start_block,
        });
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "operations endpoint listening");

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown requested");
    cancel.cancel();

    if let Err(err) = ingestion.await {
        tracing::error!(error = %err, "ingestion task panicked");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "operations endpoint failed"),
        Err(err) => tracing::error!(error = %err, "operations endpoint task panicked"),
    }
    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
