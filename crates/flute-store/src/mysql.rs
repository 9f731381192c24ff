use anyhow::Result;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use flute_common::{ActiveNode, NodeDetail, NodeInventory, NodeStatusUpdate};

use crate::types::InventoryStore;

/// [`InventoryStore`] over the `node` and `node_detail` tables.
#[derive(Clone)]
pub struct MySqlInventoryStore {
    pool: MySqlPool,
}

impl MySqlInventoryStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl InventoryStore for MySqlInventoryStore {
    async fn list_active_nodes(&self) -> Result<Vec<ActiveNode>> {
        let rows = sqlx::query("select uuid, bmc_ip from node where active = 1")
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_uuid: String = match row.try_get("uuid") {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error=%e, "failed to read node uuid, skipping row");
                    continue;
                }
            };
            let bmc_ip: String = match row.try_get("bmc_ip") {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(uuid=%raw_uuid, error=%e, "failed to read node bmc_ip, skipping row");
                    continue;
                }
            };
            match Uuid::parse_str(&raw_uuid) {
                Ok(uuid) => out.push(ActiveNode { uuid, bmc_ip }),
                Err(e) => {
                    tracing::warn!(uuid=%raw_uuid, %bmc_ip, error=%e, "malformed node uuid, skipping row");
                }
            }
        }
        Ok(out)
    }

    async fn update_node_inventory(&self, inventory: &NodeInventory) -> Result<u64> {
        let result = sqlx::query(
            "update node set bmc_mac_addr = ?, pxe_mac_addr = ?, cpu_cores = ?, memory = ? where uuid = ?",
        )
        .bind(&inventory.bmc_mac_addr)
        .bind(&inventory.pxe_mac_addr)
        .bind(inventory.cpu_cores)
        .bind(inventory.memory)
        .bind(inventory.uuid.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_node_status(&self, update: &NodeStatusUpdate) -> Result<u64> {
        let result = sqlx::query("update node set status = ? where uuid = ?")
            .bind(update.status.as_str())
            .bind(update.uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn node_detail_exists(&self, node_uuid: Uuid) -> Result<bool> {
        let row = sqlx::query("select node_uuid from node_detail where node_uuid = ?")
            .bind(node_uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        let result = sqlx::query(
            "insert into node_detail(node_uuid, cpu_model, cpu_processors, cpu_threads) values (?, ?, ?, ?)",
        )
        .bind(detail.node_uuid.to_string())
        .bind(&detail.cpu_model)
        .bind(detail.cpu_processors)
        .bind(detail.cpu_threads)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_node_detail(&self, detail: &NodeDetail) -> Result<u64> {
        let result = sqlx::query(
            "update node_detail set cpu_model = ?, cpu_processors = ?, cpu_threads = ? where node_uuid = ?",
        )
        .bind(&detail.cpu_model)
        .bind(detail.cpu_processors)
        .bind(detail.cpu_threads)
        .bind(detail.node_uuid.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
