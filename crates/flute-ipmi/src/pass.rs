use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use flute_bmc::BmcClient;
use flute_common::{ActiveNode, NodeDetail, NodeInventory, NodeStatusUpdate, ReconcileError};
use flute_store::InventoryStore;

use crate::collector::{collect_detail, collect_inventory, collect_status};
use crate::config::IpmiConfig;
use crate::reconcile::{write_detail, write_inventory, write_status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Identity and hardware capability.
    Full,
    /// Power state only.
    Status,
    /// Processor model and topology.
    Detail,
}

impl PassKind {
    pub const ALL: [PassKind; 3] = [PassKind::Full, PassKind::Status, PassKind::Detail];

    pub fn as_str(self) -> &'static str {
        match self {
            PassKind::Full => "full",
            PassKind::Status => "status",
            PassKind::Detail => "detail",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one completed pass: the records written, in enumeration order,
/// and how many nodes were skipped.
#[derive(Debug, Clone)]
pub struct PassReport<T> {
    pub kind: PassKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub updated: Vec<T>,
    pub failed: usize,
}

impl<T> PassReport<T> {
    pub fn empty(kind: PassKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            started_at: now,
            finished_at: now,
            updated: Vec::new(),
            failed: 0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.updated.len() + self.failed
    }
}

/// Enumerate active nodes once, then handle them one at a time. A failing
/// node is logged and skipped; only enumeration failure aborts the pass.
async fn run_pass<T, F, Fut>(
    kind: PassKind,
    store: &dyn InventoryStore,
    mut per_node: F,
) -> Result<PassReport<T>, ReconcileError>
where
    F: FnMut(ActiveNode) -> Fut,
    Fut: Future<Output = Result<T, ReconcileError>>,
{
    let started_at = Utc::now();
    let nodes = store.list_active_nodes().await.map_err(|e| {
        error!(pass=%kind, error=%e, "failed to enumerate active nodes");
        ReconcileError::Enumeration(e)
    })?;
    debug!(pass=%kind, nodes = nodes.len(), "pass started");

    let mut updated = Vec::with_capacity(nodes.len());
    let mut failed = 0;
    for node in nodes {
        let bmc_ip = node.bmc_ip.clone();
        match per_node(node).await {
            Ok(record) => updated.push(record),
            Err(e) => {
                failed += 1;
                warn!(pass=%kind, %bmc_ip, error_kind = e.kind(), error=%e, "node skipped");
            }
        }
    }

    let report = PassReport {
        kind,
        started_at,
        finished_at: Utc::now(),
        updated,
        failed,
    };
    info!(
        pass=%kind,
        updated = report.updated.len(),
        failed = report.failed,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "pass finished"
    );
    Ok(report)
}

/// Refresh MAC addresses, CPU cores and memory of every active node.
///
/// The node row is keyed by the UUID the controller reports, not the one
/// enumerated from the store.
pub async fn run_full_pass(
    store: &dyn InventoryStore,
    bmc: &dyn BmcClient,
    config: &IpmiConfig,
) -> Result<PassReport<NodeInventory>, ReconcileError> {
    run_pass(PassKind::Full, store, move |node| async move {
        let inventory = collect_inventory(bmc, config, &node.bmc_ip).await?;
        write_inventory(store, &inventory, config.debug).await?;
        Ok(inventory)
    })
    .await
}

/// Refresh the power state of every active node.
pub async fn run_status_pass(
    store: &dyn InventoryStore,
    bmc: &dyn BmcClient,
    config: &IpmiConfig,
) -> Result<PassReport<NodeStatusUpdate>, ReconcileError> {
    run_pass(PassKind::Status, store, move |node| async move {
        let update = collect_status(bmc, &node).await?;
        write_status(store, &node.bmc_ip, &update, config.debug).await?;
        Ok(update)
    })
    .await
}

/// Refresh processor model, socket count and thread count of every active
/// node, creating its detail row on first success.
pub async fn run_detail_pass(
    store: &dyn InventoryStore,
    bmc: &dyn BmcClient,
    config: &IpmiConfig,
) -> Result<PassReport<NodeDetail>, ReconcileError> {
    run_pass(PassKind::Detail, store, move |node| async move {
        let detail = collect_detail(bmc, &node).await?;
        write_detail(store, &node.bmc_ip, &detail, config.debug).await?;
        Ok(detail)
    })
    .await
}
