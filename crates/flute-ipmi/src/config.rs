use std::time::Duration;

/// Settings the reconciliation passes and their schedules consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpmiConfig {
    /// Log every write result at info instead of debug.
    pub debug: bool,
    /// NIC index of the controller's own management interface.
    pub bmc_nic_index: u32,
    /// NIC index of the host interface the node PXE boots from.
    pub pxe_nic_index: u32,
    pub check_all_interval: Duration,
    /// `None` leaves the status pass unscheduled.
    pub check_status_interval: Option<Duration>,
    /// `None` leaves the detail pass unscheduled.
    pub check_detail_interval: Option<Duration>,
}

impl Default for IpmiConfig {
    fn default() -> Self {
        Self {
            debug: false,
            bmc_nic_index: 1,
            pxe_nic_index: 1,
            check_all_interval: Duration::from_secs(60),
            check_status_interval: None,
            check_detail_interval: None,
        }
    }
}
