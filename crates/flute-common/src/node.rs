use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Power state as reported by the management controller.
///
/// Persisted by its Redfish name (`"On"`, `"Off"`, ...) in the `node.status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PowerState {
    On,
    Off,
    PoweringOn,
    PoweringOff,
    #[default]
    Unknown,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "On",
            PowerState::Off => "Off",
            PowerState::PoweringOn => "PoweringOn",
            PowerState::PoweringOff => "PoweringOff",
            PowerState::Unknown => "Unknown",
        }
    }
}

impl From<&str> for PowerState {
    fn from(s: &str) -> Self {
        match s.trim() {
            "On" | "on" => PowerState::On,
            "Off" | "off" => PowerState::Off,
            "PoweringOn" => PowerState::PoweringOn,
            "PoweringOff" => PowerState::PoweringOff,
            _ => PowerState::Unknown,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bare-metal node as stored in the inventory.
///
/// Rows are created by provisioning. Reconciliation only ever touches the MAC
/// addresses, `cpu_cores`, `memory` and `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub uuid: Uuid,
    pub bmc_ip: String,
    pub bmc_mac_addr: String,
    pub pxe_mac_addr: String,
    pub cpu_cores: u32,
    /// Total system memory in bytes.
    pub memory: u64,
    pub status: PowerState,
    pub active: bool,
}

/// One row of the active-node enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNode {
    pub uuid: Uuid,
    pub bmc_ip: String,
}

/// Candidate record assembled by a full inventory pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInventory {
    pub uuid: Uuid,
    pub bmc_ip: String,
    pub bmc_mac_addr: String,
    pub pxe_mac_addr: String,
    pub cpu_cores: u32,
    pub memory: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeStatusUpdate {
    pub uuid: Uuid,
    pub status: PowerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_state_parses_redfish_names() {
        assert_eq!(PowerState::from("On"), PowerState::On);
        assert_eq!(PowerState::from(" Off "), PowerState::Off);
        assert_eq!(PowerState::from("PoweringOn"), PowerState::PoweringOn);
        assert_eq!(PowerState::from("Paused"), PowerState::Unknown);
    }

    #[test]
    fn power_state_display_matches_column_value() {
        assert_eq!(PowerState::PoweringOff.to_string(), "PoweringOff");
        assert_eq!(PowerState::from(PowerState::On.as_str()), PowerState::On);
    }
}
