use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use flute_common::{ActiveNode, NodeDetail, NodeInventory, NodeStatusUpdate};

/// Persistent node inventory.
///
/// Write methods return the number of rows affected. Each call is its own unit
/// of work; nothing spans more than one node.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// `(uuid, bmc_ip)` of every node with `active = 1`.
    async fn list_active_nodes(&self) -> Result<Vec<ActiveNode>>;

    /// Overwrite BMC MAC, PXE MAC, CPU cores and memory of the node keyed by `uuid`.
    async fn update_node_inventory(&self, inventory: &NodeInventory) -> Result<u64>;

    async fn update_node_status(&self, update: &NodeStatusUpdate) -> Result<u64>;

    async fn node_detail_exists(&self, node_uuid: Uuid) -> Result<bool>;
    async fn insert_node_detail(&self, detail: &NodeDetail) -> Result<u64>;
    async fn update_node_detail(&self, detail: &NodeDetail) -> Result<u64>;
}
