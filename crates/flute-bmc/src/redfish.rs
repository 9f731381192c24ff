use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use flute_common::PowerState;

use crate::types::{BmcClient, ProbeError};

const SYSTEMS: &str = "/redfish/v1/Systems";
const MANAGERS: &str = "/redfish/v1/Managers";

const GIB: f64 = (1u64 << 30) as f64;

#[derive(Debug, Clone)]
pub struct RedfishConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// Controllers ship self-signed certificates more often than not.
    pub accept_invalid_certs: bool,
}

impl Default for RedfishConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
        }
    }
}

/// [`BmcClient`] over the DMTF Redfish REST API.
///
/// The "serial number" handed between probes is the system member id under
/// `/redfish/v1/Systems`, which is what system-scoped resources are keyed by.
#[derive(Debug, Clone)]
pub struct RedfishClient {
    http: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
}

impl RedfishClient {
    pub fn new(config: RedfishConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            username: config.username,
            password: config.password,
        })
    }

    async fn get_json(&self, bmc_ip: &str, path: &str) -> Result<Value, ProbeError> {
        let url = format!("https://{bmc_ip}{path}");
        tracing::trace!(%url, "redfish GET");
        let mut req = self.http.get(&url);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_ref());
        }

        let resp = req.send().await.map_err(|source| ProbeError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url,
                status: status.as_u16(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|source| ProbeError::Transport { url, source })
    }

    async fn system(&self, bmc_ip: &str, serial_no: &str) -> Result<Value, ProbeError> {
        self.get_json(bmc_ip, &format!("{SYSTEMS}/{serial_no}")).await
    }

    /// `@odata.id` of the `index`-th member of a collection resource.
    async fn nth_member(
        &self,
        bmc_ip: &str,
        collection: &str,
        index: usize,
    ) -> Result<String, ProbeError> {
        let doc = self.get_json(bmc_ip, collection).await?;
        member_path(&doc, index).ok_or_else(|| ProbeError::Protocol {
            url: format!("https://{bmc_ip}{collection}"),
            reason: format!("collection has no member #{index}"),
        })
    }

    /// Sum an integer property over the first `processors` processor resources.
    async fn sum_processors(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
        field: &str,
    ) -> Result<u32, ProbeError> {
        let collection = format!("{SYSTEMS}/{serial_no}/Processors");
        let doc = self.get_json(bmc_ip, &collection).await?;

        let mut total = 0u32;
        for index in 0..processors as usize {
            let path = member_path(&doc, index).ok_or_else(|| ProbeError::Protocol {
                url: format!("https://{bmc_ip}{collection}"),
                reason: format!("expected {processors} processors, found {index}"),
            })?;
            let proc_doc = self.get_json(bmc_ip, &path).await?;
            let count = u32_at(&proc_doc, &format!("/{field}"))
                .ok_or_else(|| missing(bmc_ip, &path, field))?;
            total = add_count(total, count)
                .ok_or_else(|| implausible(bmc_ip, &collection, field))?;
        }
        Ok(total)
    }
}

fn add_count(total: u32, count: u32) -> Option<u32> {
    total.checked_add(count)
}

fn implausible(bmc_ip: &str, path: &str, field: &str) -> ProbeError {
    ProbeError::Protocol {
        url: format!("https://{bmc_ip}{path}"),
        reason: format!("`{field}` total overflows"),
    }
}

fn missing(bmc_ip: &str, path: &str, field: &str) -> ProbeError {
    ProbeError::Protocol {
        url: format!("https://{bmc_ip}{path}"),
        reason: format!("missing or malformed `{field}`"),
    }
}

fn member_path(collection: &Value, index: usize) -> Option<String> {
    collection
        .get("Members")?
        .get(index)?
        .get("@odata.id")?
        .as_str()
        .map(|s| s.trim_end_matches('/').to_string())
}

fn member_id(collection: &Value, index: usize) -> Option<String> {
    let path = member_path(collection, index)?;
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn u32_at(doc: &Value, pointer: &str) -> Option<u32> {
    doc.pointer(pointer)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
}

fn str_at<'a>(doc: &'a Value, pointer: &str) -> Option<&'a str> {
    doc.pointer(pointer)?.as_str().filter(|s| !s.is_empty())
}

fn gib_to_bytes(gib: f64) -> u64 {
    (gib * GIB).round() as u64
}

#[async_trait]
impl BmcClient for RedfishClient {
    async fn serial_no(&self, bmc_ip: &str) -> Result<String, ProbeError> {
        let doc = self.get_json(bmc_ip, SYSTEMS).await?;
        member_id(&doc, 0).ok_or_else(|| missing(bmc_ip, SYSTEMS, "Members"))
    }

    async fn uuid(&self, bmc_ip: &str, serial_no: &str) -> Result<Uuid, ProbeError> {
        let doc = self.system(bmc_ip, serial_no).await?;
        let raw = str_at(&doc, "/UUID").ok_or_else(|| missing(bmc_ip, SYSTEMS, "UUID"))?;
        Uuid::parse_str(raw).map_err(|e| ProbeError::Protocol {
            url: format!("https://{bmc_ip}{SYSTEMS}/{serial_no}"),
            reason: format!("invalid UUID {raw:?}: {e}"),
        })
    }

    async fn nic_mac(
        &self,
        bmc_ip: &str,
        nic_index: u32,
        is_bmc_interface: bool,
    ) -> Result<String, ProbeError> {
        let root = if is_bmc_interface { MANAGERS } else { SYSTEMS };
        let owner = self.nth_member(bmc_ip, root, 0).await?;

        let position = nic_index.checked_sub(1).ok_or_else(|| ProbeError::Protocol {
            url: format!("https://{bmc_ip}{owner}"),
            reason: "NIC indices start at 1".to_string(),
        })?;
        let nic = self
            .nth_member(bmc_ip, &format!("{owner}/EthernetInterfaces"), position as usize)
            .await?;

        let doc = self.get_json(bmc_ip, &nic).await?;
        str_at(&doc, "/MACAddress")
            .or_else(|| str_at(&doc, "/PermanentMACAddress"))
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| missing(bmc_ip, &nic, "MACAddress"))
    }

    async fn processors(&self, bmc_ip: &str, serial_no: &str) -> Result<u32, ProbeError> {
        let doc = self.system(bmc_ip, serial_no).await?;
        u32_at(&doc, "/ProcessorSummary/Count")
            .ok_or_else(|| missing(bmc_ip, SYSTEMS, "ProcessorSummary.Count"))
    }

    async fn processor_cores(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError> {
        self.sum_processors(bmc_ip, serial_no, processors, "TotalCores")
            .await
    }

    async fn processor_threads(
        &self,
        bmc_ip: &str,
        serial_no: &str,
        processors: u32,
    ) -> Result<u32, ProbeError> {
        self.sum_processors(bmc_ip, serial_no, processors, "TotalThreads")
            .await
    }

    async fn processor_model(&self, bmc_ip: &str, serial_no: &str) -> Result<String, ProbeError> {
        let doc = self.system(bmc_ip, serial_no).await?;
        str_at(&doc, "/ProcessorSummary/Model")
            .map(|s| s.trim().to_string())
            .ok_or_else(|| missing(bmc_ip, SYSTEMS, "ProcessorSummary.Model"))
    }

    async fn total_system_memory(
        &self,
        bmc_ip: &str,
        serial_no: &str,
    ) -> Result<u64, ProbeError> {
        let doc = self.system(bmc_ip, serial_no).await?;
        doc.pointer("/MemorySummary/TotalSystemMemoryGiB")
            .and_then(Value::as_f64)
            .map(gib_to_bytes)
            .ok_or_else(|| missing(bmc_ip, SYSTEMS, "MemorySummary.TotalSystemMemoryGiB"))
    }

    async fn power_state(&self, bmc_ip: &str, serial_no: &str) -> Result<PowerState, ProbeError> {
        let doc = self.system(bmc_ip, serial_no).await?;
        str_at(&doc, "/PowerState")
            .map(PowerState::from)
            .ok_or_else(|| missing(bmc_ip, SYSTEMS, "PowerState"))
    }
}
