use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use flute_common::PowerState;

use crate::types::{BmcClient, ProbeError, ProbeStep};

/// Scripted controller state served by [`MemoryBmc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub serial_no: String,
    pub uuid: Uuid,
    /// Controller NICs, addressed by 1-based index.
    pub bmc_nics: Vec<String>,
    /// Host NICs, addressed by 1-based index.
    pub host_nics: Vec<String>,
    pub processors: u32,
    pub cores_per_processor: u32,
    pub threads_per_processor: u32,
    pub processor_model: String,
    pub memory: u64,
    pub power_state: PowerState,
}

/// In-memory [`BmcClient`] with per-address failure injection.
///
/// Every probe is recorded, so callers can assert which controllers a pass
/// touched.
#[derive(Debug, Clone)]
pub struct MemoryBmc {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    controllers: HashMap<String, Controller>,
    failures: HashSet<(String, ProbeStep)>,
    calls: Vec<(String, ProbeStep)>,
}

impl MemoryBmc {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub async fn set_controller(&self, bmc_ip: &str, controller: Controller) {
        self.inner
            .write()
            .await
            .controllers
            .insert(bmc_ip.to_string(), controller);
    }

    /// Replace a controller's state in place. No-op for unknown addresses.
    pub async fn update_controller(&self, bmc_ip: &str, f: impl FnOnce(&mut Controller)) {
        if let Some(c) = self.inner.write().await.controllers.get_mut(bmc_ip) {
            f(c);
        }
    }

    /// Make `step` fail for `bmc_ip` until [`MemoryBmc::clear_failures`].
    pub async fn fail(&self, bmc_ip: &str, step: ProbeStep) {
        self.inner
            .write()
            .await
            .failures
            .insert((bmc_ip.to_string(), step));
    }

    pub async fn clear_failures(&self) {
        self.inner.write().await.failures.clear();
    }

    /// Every probe issued so far, in order.
    pub async fn calls(&self) -> Vec<(String, ProbeStep)> {
        self.inner.read().await.calls.clone()
    }

    /// Distinct controller addresses probed so far.
    pub async fn probed_addresses(&self) -> HashSet<String> {
        self.inner
            .read()
            .await
            .calls
            .iter()
            .map(|(ip, _)| ip.clone())
            .collect()
    }

    async fn lookup<T>(
        &self,
        bmc_ip: &str,
        step: ProbeStep,
        serial_no: Option<&str>,
        read: impl FnOnce(&Controller) -> Result<T, String>,
    ) -> Result<T, ProbeError> {
        let mut inner = self.inner.write().await;
        inner.calls.push((bmc_ip.to_string(), step));

        if inner.failures.contains(&(bmc_ip.to_string(), step)) {
            return Err(ProbeError::Rejected {
                bmc_ip: bmc_ip.to_string(),
                step,
            });
        }

        let controller = inner
            .controllers
            .get(bmc_ip)
            .ok_or_else(|| ProbeError::Unreachable {
                bmc_ip: bmc_ip.to_string(),
            })?;

        if let Some(serial) = serial_no {
            if serial != controller.serial_no {
                return Err(ProbeError::Protocol {
                    url: bmc_ip.to_string(),
                    reason: format!("no system with serial {serial}"),
                });
            }
        }

        read(controller).map_err(|reason| ProbeError::Protocol {
            url: bmc_ip.to_string(),
            reason,
        })
    }
}

impl Default for MemoryBmc {
    fn default() -> Self {
        Self::new()
    }
}

fn check_sockets(c: &Controller, processors: u32) -> Result<(), String> {
    if processors > c.processors {
        return Err(format!(
            "requested {processors} processors, system has {}",
            c.processors
        ));
    }
    Ok(())
}

fn scaled(processors: u32, per_processor: u32) -> Result<u32, String> {
    processors
        .checked_mul(per_processor)
        .ok_or_else(|| format!("{processors} x {per_processor} overflows"))
}

#[async_trait]
impl BmcClient for MemoryBmc {
    async fn serial_no(&self, bmc_ip: &str) -> Result<String, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::SerialNo, None, |c| Ok(c.serial_no.clone()))
            .await
    }

    async fn uuid(&self, bmc_ip: &str, serial_no: &str) -> Result<Uuid, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::Uuid, Some(serial_no), |c| Ok(c.uuid))
            .await
    }

    async fn nic_mac(
        &self,
        bmc_ip: &str,
        nic_index: u32,
        is_bmc_interface: bool,
    ) -> Result<String, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::nic(is_bmc_interface), None, |c| {
            let nics = if is_bmc_interface {
                &c.bmc_nics
            } else {
                &c.host_nics
            };
            nic_index
                .checked_sub(1)
                .and_then(|i| nics.get(i as usize))
                .cloned()
                .ok_or_else(|| format!("no NIC with index {nic_index}"))
        })
        .await
    }

    async fn processors(&self, bmc_ip: &str, serial_no: &str) -> Result<u32, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::Processors, Some(serial_no), |c| {
            Ok(c.processors)
        })
        .await
    }

    async fn processor_cores(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::ProcessorCores, Some(serial_no), |c| {
            check_sockets(c, processors)?;
            scaled(processors, c.cores_per_processor)
        })
        .await
    }

    async fn processor_threads(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::ProcessorThreads, Some(serial_no), |c| {
            check_sockets(c, processors)?;
            scaled(processors, c.threads_per_processor)
        })
        .await
    }

    async fn processor_model(&self, bmc_ip: &str, serial_no: &str) -> Result<String, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::ProcessorModel, Some(serial_no), |c| {
            Ok(c.processor_model.clone())
        })
        .await
    }

    async fn total_system_memory(
        &self,
        bmc_ip: &str,
        serial_no: &str,
    ) -> Result<u64, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::TotalSystemMemory, Some(serial_no), |c| {
            Ok(c.memory)
        })
        .await
    }

    async fn power_state(&self, bmc_ip: &str, serial_no: &str) -> Result<PowerState, ProbeError> {
        self.lookup(bmc_ip, ProbeStep::PowerState, Some(serial_no), |c| {
            Ok(c.power_state)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> Controller {
        Controller {
            serial_no: "S1".to_string(),
            uuid: Uuid::new_v4(),
            bmc_nics: vec!["aa:bb:cc:00:00:01".to_string()],
            host_nics: vec![
                "aa:bb:cc:00:01:01".to_string(),
                "aa:bb:cc:00:01:02".to_string(),
            ],
            processors: 2,
            cores_per_processor: 4,
            threads_per_processor: 8,
            processor_model: "Xeon".to_string(),
            memory: 16 << 30,
            power_state: PowerState::On,
        }
    }

    #[tokio::test]
    async fn nic_index_is_one_based() {
        let bmc = MemoryBmc::new();
        bmc.set_controller("10.0.0.1", controller()).await;

        let mac = bmc.nic_mac("10.0.0.1", 2, false).await.unwrap();
        assert_eq!(mac, "aa:bb:cc:00:01:02");
        assert!(bmc.nic_mac("10.0.0.1", 0, true).await.is_err());
        assert!(bmc.nic_mac("10.0.0.1", 2, true).await.is_err());
    }

    #[tokio::test]
    async fn wrong_serial_is_a_protocol_error() {
        let bmc = MemoryBmc::new();
        bmc.set_controller("10.0.0.1", controller()).await;

        let err = bmc.uuid("10.0.0.1", "S2").await.unwrap_err();
        assert!(matches!(err, ProbeError::Protocol { .. }));
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_cleared() {
        let bmc = MemoryBmc::new();
        bmc.set_controller("10.0.0.1", controller()).await;
        bmc.fail("10.0.0.1", ProbeStep::SerialNo).await;

        assert!(matches!(
            bmc.serial_no("10.0.0.1").await,
            Err(ProbeError::Rejected { step: ProbeStep::SerialNo, .. })
        ));

        bmc.clear_failures().await;
        assert_eq!(bmc.serial_no("10.0.0.1").await.unwrap(), "S1");
        assert_eq!(bmc.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn cores_and_threads_scale_with_sockets() {
        let bmc = MemoryBmc::new();
        bmc.set_controller("10.0.0.1", controller()).await;

        assert_eq!(bmc.processor_cores("10.0.0.1", "S1", 2).await.unwrap(), 8);
        assert_eq!(bmc.processor_threads("10.0.0.1", "S1", 1).await.unwrap(), 8);
        assert!(bmc.processor_cores("10.0.0.1", "S1", 3).await.is_err());
    }

    #[tokio::test]
    async fn oversized_topology_is_a_protocol_error() {
        let bmc = MemoryBmc::new();
        let mut c = controller();
        c.cores_per_processor = u32::MAX;
        bmc.set_controller("10.0.0.1", c).await;

        assert!(matches!(
            bmc.processor_cores("10.0.0.1", "S1", 2).await,
            Err(ProbeError::Protocol { .. })
        ));
        assert_eq!(bmc.processor_threads("10.0.0.1", "S1", 2).await.unwrap(), 16);
    }

    #[tokio::test]
    async fn unknown_address_is_unreachable() {
        let bmc = MemoryBmc::new();
        assert!(matches!(
            bmc.serial_no("10.0.0.9").await,
            Err(ProbeError::Unreachable { .. })
        ));
        assert!(bmc.probed_addresses().await.contains("10.0.0.9"));
    }
}
