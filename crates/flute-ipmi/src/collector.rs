//! Per-node probe sequences. Each collector stops at the first failing probe,
//! so a node either yields a complete candidate record or nothing.

use flute_bmc::{BmcClient, ProbeError, ProbeStep};
use flute_common::{ActiveNode, NodeDetail, NodeInventory, NodeStatusUpdate, ReconcileError};

use crate::config::IpmiConfig;

fn failed(bmc_ip: &str, step: ProbeStep) -> impl FnOnce(ProbeError) -> ReconcileError + '_ {
    move |e| ReconcileError::probe(bmc_ip, step.as_str(), e)
}

/// Serial → UUID → BMC MAC → PXE MAC → processors → cores → memory.
pub async fn collect_inventory(
    bmc: &dyn BmcClient,
    config: &IpmiConfig,
    bmc_ip: &str,
) -> Result<NodeInventory, ReconcileError> {
    let serial_no = bmc
        .serial_no(bmc_ip)
        .await
        .map_err(failed(bmc_ip, ProbeStep::SerialNo))?;
    let uuid = bmc
        .uuid(bmc_ip, &serial_no)
        .await
        .map_err(failed(bmc_ip, ProbeStep::Uuid))?;
    let bmc_mac_addr = bmc
        .nic_mac(bmc_ip, config.bmc_nic_index, true)
        .await
        .map_err(failed(bmc_ip, ProbeStep::BmcMac))?;
    let pxe_mac_addr = bmc
        .nic_mac(bmc_ip, config.pxe_nic_index, false)
        .await
        .map_err(failed(bmc_ip, ProbeStep::PxeMac))?;
    let processors = bmc
        .processors(bmc_ip, &serial_no)
        .await
        .map_err(failed(bmc_ip, ProbeStep::Processors))?;
    let cpu_cores = bmc
        .processor_cores(bmc_ip, &serial_no, processors)
        .await
        .map_err(failed(bmc_ip, ProbeStep::ProcessorCores))?;
    let memory = bmc
        .total_system_memory(bmc_ip, &serial_no)
        .await
        .map_err(failed(bmc_ip, ProbeStep::TotalSystemMemory))?;

    Ok(NodeInventory {
        uuid,
        bmc_ip: bmc_ip.to_string(),
        bmc_mac_addr,
        pxe_mac_addr,
        cpu_cores,
        memory,
    })
}

/// Serial → power state.
pub async fn collect_status(
    bmc: &dyn BmcClient,
    node: &ActiveNode,
) -> Result<NodeStatusUpdate, ReconcileError> {
    let ip = node.bmc_ip.as_str();
    let serial_no = bmc
        .serial_no(ip)
        .await
        .map_err(failed(ip, ProbeStep::SerialNo))?;
    let status = bmc
        .power_state(ip, &serial_no)
        .await
        .map_err(failed(ip, ProbeStep::PowerState))?;

    Ok(NodeStatusUpdate {
        uuid: node.uuid,
        status,
    })
}

/// Serial → processor model → processors → threads.
pub async fn collect_detail(
    bmc: &dyn BmcClient,
    node: &ActiveNode,
) -> Result<NodeDetail, ReconcileError> {
    let ip = node.bmc_ip.as_str();
    let serial_no = bmc
        .serial_no(ip)
        .await
        .map_err(failed(ip, ProbeStep::SerialNo))?;
    let cpu_model = bmc
        .processor_model(ip, &serial_no)
        .await
        .map_err(failed(ip, ProbeStep::ProcessorModel))?;
    let cpu_processors = bmc
        .processors(ip, &serial_no)
        .await
        .map_err(failed(ip, ProbeStep::Processors))?;
    let cpu_threads = bmc
        .processor_threads(ip, &serial_no, cpu_processors)
        .await
        .map_err(failed(ip, ProbeStep::ProcessorThreads))?;

    Ok(NodeDetail {
        node_uuid: node.uuid,
        cpu_model,
        cpu_processors,
        cpu_threads,
    })
}
