pub mod collector;
pub mod config;
pub mod guard;
pub mod metrics;
pub mod pass;
pub mod reconcile;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use config::IpmiConfig;
pub use guard::{PassGuard, PassPermit};
pub use metrics::SharedMetrics;
pub use pass::{run_detail_pass, run_full_pass, run_status_pass, PassKind, PassReport};
pub use scheduler::{InventoryScheduler, PassOutcome, PeriodicTask};
