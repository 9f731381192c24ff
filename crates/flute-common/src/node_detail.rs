use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processor topology of a node, one row per node UUID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDetail {
    pub node_uuid: Uuid,
    pub cpu_model: String,
    pub cpu_processors: u32,
    pub cpu_threads: u32,
}
