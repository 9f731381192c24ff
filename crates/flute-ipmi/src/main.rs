mod args;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use flute_bmc::RedfishClient;
use flute_common::telemetry::init_tracing;
use flute_ipmi::{metrics, InventoryScheduler, SharedMetrics};
use flute_store::MySqlInventoryStore;

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let provider = init_tracing(
        "flute-ipmi",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );
    tracing::info!("flute-ipmi starting...");

    let store = MySqlInventoryStore::connect(&args.database_url, args.db_max_connections)
        .await
        .context("failed to connect to inventory database")?;
    tracing::info!("connected to inventory database");

    let bmc = RedfishClient::new(args.redfish_config()).context("failed to build BMC client")?;

    let config = args.ipmi_config();
    let shared_metrics = Arc::new(SharedMetrics::default());
    let scheduler = Arc::new(InventoryScheduler::new(
        Arc::new(store.clone()),
        Arc::new(bmc),
        config,
        shared_metrics.clone(),
    ));
    let tasks = scheduler.start();

    let listener = tokio::net::TcpListener::bind(&args.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", args.metrics_addr))?;
    tracing::info!(addr=%args.metrics_addr, "serving /metrics and /healthz");
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics::router(shared_metrics)).await {
            tracing::error!(error=%e, "metrics server failed");
        }
    });

    wait_for_shutdown(tokio::signal::ctrl_c()).await;

    for task in tasks {
        task.shutdown().await;
    }
    server.abort();
    store.close().await;

    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
    }
    Ok(())
}

/// Resolve once shutdown is requested. A broken signal listener also counts,
/// so the cycles are still stopped and traces flushed.
async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("shutdown requested, waiting for in-flight passes"),
        Err(e) => tracing::error!(error=%e, "failed to listen for ctrl-c, shutting down"),
    }
}
