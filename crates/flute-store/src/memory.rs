use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use flute_common::{ActiveNode, Node, NodeDetail, NodeInventory, NodeStatusUpdate};

use crate::types::InventoryStore;

/// In-memory [`InventoryStore`]. Mirrors the table semantics of the MySQL
/// store, including the unique key on `node_detail.node_uuid`.
#[derive(Debug, Clone)]
pub struct MemoryInventoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<Uuid, Node>,
    details: BTreeMap<Uuid, NodeDetail>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Provision a node row, replacing any row with the same UUID.
    pub async fn insert_node(&self, node: Node) {
        self.inner.write().await.nodes.insert(node.uuid, node);
    }

    pub async fn set_active(&self, uuid: Uuid, active: bool) {
        if let Some(node) = self.inner.write().await.nodes.get_mut(&uuid) {
            node.active = active;
        }
    }

    pub async fn node(&self, uuid: Uuid) -> Option<Node> {
        self.inner.read().await.nodes.get(&uuid).cloned()
    }

    pub async fn node_detail(&self, uuid: Uuid) -> Option<NodeDetail> {
        self.inner.read().await.details.get(&uuid).cloned()
    }

    pub async fn node_detail_count(&self) -> usize {
        self.inner.read().await.details.len()
    }
}

impl Default for MemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn list_active_nodes(&self) -> Result<Vec<ActiveNode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.active)
            .map(|n| ActiveNode {
                uuid: n.uuid,
                bmc_ip: n.bmc_ip.clone(),
            })
            .collect())
    }

    async fn update_node_inventory(&self, inventory: &NodeInventory) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(node) = inner.nodes.get_mut(&inventory.uuid) else {
            return Ok(0);
        };
        node.bmc_mac_addr = inventory.bmc_mac_addr.clone();
        node.pxe_mac_addr = inventory.pxe_mac_addr.clone();
        node.cpu_cores = inventory.cpu_cores;
        node.memory = inventory.memory;
        Ok(1)
    }

    async fn update_node_status(&self, update: &NodeStatusUpdate) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(node) = inner.nodes.get_mut(&update.uuid) else {
            return Ok(0);
        };
        node.status = update.status;
        Ok(1)
    }

    async fn node_detail_exists(&self, node_uuid: Uuid) -> Result<bool> {
        Ok(self.inner.read().await.details.contains_key(&node_uuid))
    }

    async fn insert_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        let mut inner = self.inner.write().await;
        if inner.details.contains_key(&detail.node_uuid) {
            bail!("duplicate node_detail for node {}", detail.node_uuid);
        }
        inner.details.insert(detail.node_uuid, detail.clone());
        Ok(1)
    }

    async fn update_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.details.get_mut(&detail.node_uuid) else {
            return Ok(0);
        };
        row.cpu_model = detail.cpu_model.clone();
        row.cpu_processors = detail.cpu_processors;
        row.cpu_threads = detail.cpu_threads;
        Ok(1)
    }
}
