pub mod error;
pub mod node;
pub mod node_detail;
pub mod telemetry;

pub use error::ReconcileError;
pub use node::{ActiveNode, Node, NodeInventory, NodeStatusUpdate, PowerState};
pub use node_detail::NodeDetail;
