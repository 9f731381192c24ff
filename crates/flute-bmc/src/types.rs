use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use flute_common::PowerState;

/// The individual lookups a pass can issue against a management controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStep {
    SerialNo,
    Uuid,
    BmcMac,
    PxeMac,
    Processors,
    ProcessorCores,
    ProcessorThreads,
    ProcessorModel,
    TotalSystemMemory,
    PowerState,
}

impl ProbeStep {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStep::SerialNo => "serial_no",
            ProbeStep::Uuid => "uuid",
            ProbeStep::BmcMac => "bmc_mac",
            ProbeStep::PxeMac => "pxe_mac",
            ProbeStep::Processors => "processors",
            ProbeStep::ProcessorCores => "processor_cores",
            ProbeStep::ProcessorThreads => "processor_threads",
            ProbeStep::ProcessorModel => "processor_model",
            ProbeStep::TotalSystemMemory => "total_system_memory",
            ProbeStep::PowerState => "power_state",
        }
    }

    pub fn nic(is_bmc_interface: bool) -> Self {
        if is_bmc_interface {
            ProbeStep::BmcMac
        } else {
            ProbeStep::PxeMac
        }
    }
}

impl fmt::Display for ProbeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Protocol { url: String, reason: String },

    #[error("no management controller reachable at {bmc_ip}")]
    Unreachable { bmc_ip: String },

    #[error("{step} probe rejected by {bmc_ip}")]
    Rejected { bmc_ip: String, step: ProbeStep },
}

/// Probe operations against one node's management controller.
///
/// Every call is keyed by the controller address. System-scoped lookups also
/// take the serial number returned by [`BmcClient::serial_no`].
#[async_trait]
pub trait BmcClient: Send + Sync {
    async fn serial_no(&self, bmc_ip: &str) -> Result<String, ProbeError>;
    async fn uuid(&self, bmc_ip: &str, serial_no: &str) -> Result<Uuid, ProbeError>;

    /// MAC address of NIC `nic_index`, on the controller itself when
    /// `is_bmc_interface` is set, otherwise on the host.
    async fn nic_mac(
        &self,
        bmc_ip: &str,
        nic_index: u32,
        is_bmc_interface: bool,
    ) -> Result<String, ProbeError>;

    async fn processors(&self, bmc_ip: &str, serial_no: &str) -> Result<u32, ProbeError>;

    /// Total cores across the first `processors` sockets.
    async fn processor_cores(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError>;

    /// Total hardware threads across the first `processors` sockets.
    async fn processor_threads(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError>;

    async fn processor_model(&self, bmc_ip: &str, serial_no: &str) -> Result<String, ProbeError>;

    /// Installed memory in bytes.
    async fn total_system_memory(&self, bmc_ip: &str, serial_no: &str)
        -> Result<u64, ProbeError>;

    async fn power_state(&self, bmc_ip: &str, serial_no: &str) -> Result<PowerState, ProbeError>;
}
