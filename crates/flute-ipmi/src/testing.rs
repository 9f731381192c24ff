//! Fixtures shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use flute_bmc::Controller;
use flute_common::{ActiveNode, Node, NodeDetail, NodeInventory, NodeStatusUpdate, PowerState};
use flute_store::{InventoryStore, MemoryInventoryStore};

pub const IP_A: &str = "10.10.0.11";
pub const IP_B: &str = "10.10.0.12";
pub const IP_C: &str = "10.10.0.13";

/// Two sockets, 8 cores, 16 threads, 16 GiB, powered on.
pub fn controller(serial_no: &str, uuid: Uuid) -> Controller {
    Controller {
        serial_no: serial_no.to_string(),
        uuid,
        bmc_nics: vec!["0c:c4:7a:00:00:01".to_string()],
        host_nics: vec![
            "0c:c4:7a:00:01:01".to_string(),
            "0c:c4:7a:00:01:02".to_string(),
        ],
        processors: 2,
        cores_per_processor: 4,
        threads_per_processor: 8,
        processor_model: "Intel(R) Xeon(R) Silver 4110".to_string(),
        memory: 16 << 30,
        power_state: PowerState::On,
    }
}

/// A freshly provisioned, active node with nothing probed yet.
pub fn node_row(uuid: Uuid, bmc_ip: &str) -> Node {
    Node {
        uuid,
        bmc_ip: bmc_ip.to_string(),
        bmc_mac_addr: String::new(),
        pxe_mac_addr: String::new(),
        cpu_cores: 0,
        memory: 0,
        status: PowerState::Unknown,
        active: true,
    }
}

/// Memory store that can be told to fail enumeration or writes for given nodes.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryInventoryStore,
    fail_enumeration: Arc<AtomicBool>,
    failing: Arc<RwLock<HashSet<Uuid>>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryInventoryStore) -> Self {
        Self {
            inner,
            fail_enumeration: Arc::new(AtomicBool::new(false)),
            failing: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn inner(&self) -> &MemoryInventoryStore {
        &self.inner
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub async fn fail_writes_for(&self, uuid: Uuid) {
        self.failing.write().await.insert(uuid);
    }

    async fn check(&self, uuid: Uuid) -> Result<()> {
        if self.failing.read().await.contains(&uuid) {
            bail!("connection reset while writing node {uuid}");
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn list_active_nodes(&self) -> Result<Vec<ActiveNode>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        self.inner.list_active_nodes().await
    }

    async fn update_node_inventory(&self, inventory: &NodeInventory) -> Result<u64> {
        self.check(inventory.uuid).await?;
        self.inner.update_node_inventory(inventory).await
    }

    async fn update_node_status(&self, update: &NodeStatusUpdate) -> Result<u64> {
        self.check(update.uuid).await?;
        self.inner.update_node_status(update).await
    }

    async fn node_detail_exists(&self, node_uuid: Uuid) -> Result<bool> {
        self.check(node_uuid).await?;
        self.inner.node_detail_exists(node_uuid).await
    }

    async fn insert_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        self.check(detail.node_uuid).await?;
        self.inner.insert_node_detail(detail).await
    }

    async fn update_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        self.check(detail.node_uuid).await?;
        self.inner.update_node_detail(detail).await
    }
}
