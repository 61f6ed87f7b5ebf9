//! Configuration structures for the CU-UP
//!
//! Loading from YAML and validation live in `nextgsim_cu_up::config_loader`;
//! this module only defines the serde shape.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::MAX_NUM_PDU_SESSIONS_PER_UE;

/// Network interfaces the CU-UP terminates user plane tunnels on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceConfig {
    /// Local address advertised for N3 (NG-U) downlink tunnels
    pub n3_bind_addr: IpAddr,
    /// Local address advertised for F1-U uplink tunnels
    pub f1u_bind_addr: IpAddr,
    /// UPF GTP-U port (default: 2152)
    #[serde(default = "default_gtp_port")]
    pub upf_port: u16,
}

impl Default for NetworkInterfaceConfig {
    fn default() -> Self {
        Self {
            n3_bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            f1u_bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            upf_port: default_gtp_port(),
        }
    }
}

fn default_gtp_port() -> u16 {
    2152
}

fn default_max_pdu_sessions_per_ue() -> usize {
    MAX_NUM_PDU_SESSIONS_PER_UE
}

fn default_max_nof_ues() -> usize {
    1024
}

/// CU-UP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuUpConfig {
    /// Network interface configuration
    pub network: NetworkInterfaceConfig,
    /// Maximum number of PDU sessions per UE
    #[serde(default = "default_max_pdu_sessions_per_ue")]
    pub max_pdu_sessions_per_ue: usize,
    /// Maximum number of concurrently served UEs
    #[serde(default = "default_max_nof_ues")]
    pub max_nof_ues: usize,
    /// UE inactivity timer in milliseconds (0 disables it)
    #[serde(default)]
    pub ue_inactivity_timer_ms: u64,
}

impl Default for CuUpConfig {
    fn default() -> Self {
        Self {
            network: NetworkInterfaceConfig::default(),
            max_pdu_sessions_per_ue: default_max_pdu_sessions_per_ue(),
            max_nof_ues: default_max_nof_ues(),
            ue_inactivity_timer_ms: 0,
        }
    }
}

impl CuUpConfig {
    /// Parses a configuration from YAML. Missing optional fields take their
    /// defaults; no range validation is done here.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: CuUpConfig = serde_yaml::from_str(yaml)?;
        if config.network.n3_bind_addr.is_ipv4() != config.network.f1u_bind_addr.is_ipv4() {
            return Err(Error::Config(
                "n3_bind_addr and f1u_bind_addr must use the same IP version".to_string(),
            ));
        }
        Ok(config)
    }
}
