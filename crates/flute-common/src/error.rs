use thiserror::Error;

/// Failures raised while reconciling the node inventory.
///
/// Only `Enumeration` ever reaches the caller of a pass. `Probe` and
/// `Persistence` are per-node: the node is logged and skipped.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to enumerate active nodes: {0}")]
    Enumeration(#[source] anyhow::Error),

    #[error("probe `{step}` failed for bmc {bmc_ip}: {source}")]
    Probe {
        bmc_ip: String,
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist {what} for bmc {bmc_ip}: {source}")]
    Persistence {
        bmc_ip: String,
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ReconcileError {
    pub fn probe(bmc_ip: &str, step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        ReconcileError::Probe {
            bmc_ip: bmc_ip.to_string(),
            step,
            source: source.into(),
        }
    }

    pub fn persistence(bmc_ip: &str, what: &'static str, source: anyhow::Error) -> Self {
        ReconcileError::Persistence {
            bmc_ip: bmc_ip.to_string(),
            what,
            source,
        }
    }

    /// Short label used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Enumeration(_) => "enumeration",
            ReconcileError::Probe { .. } => "probe",
            ReconcileError::Persistence { .. } => "persistence",
        }
    }
}
