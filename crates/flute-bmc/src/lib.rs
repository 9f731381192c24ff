pub mod memory;
pub mod redfish;
pub mod types;

pub use memory::{Controller, MemoryBmc};
pub use redfish::{RedfishClient, RedfishConfig};
pub use types::{BmcClient, ProbeError, ProbeStep};
