use tracing::{debug, info};

use flute_common::{NodeDetail, NodeInventory, NodeStatusUpdate, ReconcileError};
use flute_store::InventoryStore;

/// How a detail record landed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailWrite {
    Inserted,
    Updated,
}

/// An update keyed by UUID that matched nothing means the controller reported
/// an identity the inventory does not know.
fn require_row(
    bmc_ip: &str,
    what: &'static str,
    uuid: &uuid::Uuid,
    rows: u64,
) -> Result<(), ReconcileError> {
    if rows == 0 {
        return Err(ReconcileError::persistence(
            bmc_ip,
            what,
            anyhow::anyhow!("no node row for uuid {uuid}"),
        ));
    }
    Ok(())
}

fn log_write(debug_on: bool, table: &str, uuid: &uuid::Uuid, rows: u64) {
    if debug_on {
        info!(table, %uuid, rows_affected = rows, "write result");
    } else {
        debug!(table, %uuid, rows_affected = rows, "write result");
    }
}

pub async fn write_inventory(
    store: &dyn InventoryStore,
    inventory: &NodeInventory,
    debug_on: bool,
) -> Result<(), ReconcileError> {
    let rows = store
        .update_node_inventory(inventory)
        .await
        .map_err(|e| ReconcileError::persistence(&inventory.bmc_ip, "node inventory", e))?;
    log_write(debug_on, "node", &inventory.uuid, rows);
    require_row(&inventory.bmc_ip, "node inventory", &inventory.uuid, rows)
}

pub async fn write_status(
    store: &dyn InventoryStore,
    bmc_ip: &str,
    update: &NodeStatusUpdate,
    debug_on: bool,
) -> Result<(), ReconcileError> {
    let rows = store
        .update_node_status(update)
        .await
        .map_err(|e| ReconcileError::persistence(bmc_ip, "node status", e))?;
    log_write(debug_on, "node", &update.uuid, rows);
    require_row(bmc_ip, "node status", &update.uuid, rows)
}

/// Insert the detail row on first sight, update it in place afterwards.
pub async fn write_detail(
    store: &dyn InventoryStore,
    bmc_ip: &str,
    detail: &NodeDetail,
    debug_on: bool,
) -> Result<DetailWrite, ReconcileError> {
    let exists = store
        .node_detail_exists(detail.node_uuid)
        .await
        .map_err(|e| ReconcileError::persistence(bmc_ip, "node detail lookup", e))?;

    if exists {
        let rows = store
            .update_node_detail(detail)
            .await
            .map_err(|e| ReconcileError::persistence(bmc_ip, "node detail", e))?;
        log_write(debug_on, "node_detail", &detail.node_uuid, rows);
        return Ok(DetailWrite::Updated);
    }

    info!(uuid=%detail.node_uuid, %bmc_ip, "inserting new node_detail");
    let rows = store
        .insert_node_detail(detail)
        .await
        .map_err(|e| ReconcileError::persistence(bmc_ip, "node detail", e))?;
    log_write(debug_on, "node_detail", &detail.node_uuid, rows);
    Ok(DetailWrite::Inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use flute_store::MemoryInventoryStore;
    use uuid::Uuid;

    fn detail(uuid: Uuid, model: &str) -> NodeDetail {
        NodeDetail {
            node_uuid: uuid,
            cpu_model: model.to_string(),
            cpu_processors: 2,
            cpu_threads: 4,
        }
    }

    #[tokio::test]
    async fn detail_insert_then_update() {
        let store = MemoryInventoryStore::new();
        let uuid = Uuid::new_v4();

        let first = write_detail(&store, "10.0.0.1", &detail(uuid, "X"), false)
            .await
            .unwrap();
        let second = write_detail(&store, "10.0.0.1", &detail(uuid, "Y"), true)
            .await
            .unwrap();

        assert_eq!(first, DetailWrite::Inserted);
        assert_eq!(second, DetailWrite::Updated);
        assert_eq!(store.node_detail_count().await, 1);
        assert_eq!(store.node_detail(uuid).await.unwrap().cpu_model, "Y");
    }

    #[tokio::test]
    async fn update_matching_no_row_is_a_failure() {
        let store = MemoryInventoryStore::new();
        let inventory = NodeInventory {
            uuid: Uuid::new_v4(),
            bmc_ip: "10.0.0.1".to_string(),
            bmc_mac_addr: "aa".to_string(),
            pxe_mac_addr: "bb".to_string(),
            cpu_cores: 8,
            memory: 1024,
        };

        let err = write_inventory(&store, &inventory, false).await.unwrap_err();
        assert_eq!(err.kind(), "persistence");

        let update = NodeStatusUpdate {
            uuid: inventory.uuid,
            status: flute_common::PowerState::On,
        };
        let err = write_status(&store, "10.0.0.1", &update, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "persistence");
    }

    #[tokio::test]
    async fn failed_lookup_writes_nothing() {
        let store = FlakyStore::new(MemoryInventoryStore::new());
        let uuid = Uuid::new_v4();
        store.fail_writes_for(uuid).await;

        let err = write_detail(&store, "10.0.0.1", &detail(uuid, "X"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(store.inner().node_detail_count().await, 0);
    }
}
