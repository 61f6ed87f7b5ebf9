//! Control plane request items
//!
//! In-memory forms of the E1AP bearer context items the PDU session
//! manager consumes. Decoding from the wire is done elsewhere.

use serde::{Deserialize, Serialize};

use nextgsim_common::{DrbId, PduSessionId, QosFlowId, UpTransportLayerInfo};

/// PDCP sequence number length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdcpSnSize {
    /// 12-bit sequence numbers
    Size12,
    /// 18-bit sequence numbers
    #[default]
    Size18,
}

impl PdcpSnSize {
    /// Number of bits of the sequence number.
    pub fn bits(self) -> u8 {
        match self {
            PdcpSnSize::Size12 => 12,
            PdcpSnSize::Size18 => 18,
        }
    }
}

/// RLC mode carrying the DRB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RlcMode {
    /// Acknowledged mode
    #[default]
    Am,
    /// Unacknowledged mode
    Um,
}

/// PDCP configuration of a DRB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdcpConfig {
    /// Uplink sequence number size
    pub sn_size_ul: PdcpSnSize,
    /// Downlink sequence number size
    pub sn_size_dl: PdcpSnSize,
    /// RLC mode of the bearer
    pub rlc_mode: RlcMode,
    /// Discard timer in milliseconds (`None` = infinity)
    pub discard_timer_ms: Option<u32>,
    /// Reordering timer in milliseconds
    pub t_reordering_ms: Option<u32>,
    /// Whether integrity protection is active
    pub integrity_protection: bool,
    /// Whether ciphering is active
    pub ciphering: bool,
}

impl Default for PdcpConfig {
    fn default() -> Self {
        Self {
            sn_size_ul: PdcpSnSize::Size18,
            sn_size_dl: PdcpSnSize::Size18,
            rlc_mode: RlcMode::Am,
            discard_timer_ms: None,
            t_reordering_ms: Some(100),
            integrity_protection: false,
            ciphering: true,
        }
    }
}

/// SDAP configuration of a DRB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SdapConfig {
    /// Whether this DRB is the default DRB of the session
    pub default_drb: bool,
    /// Whether uplink SDAP headers are present
    pub sdap_header_ul: bool,
    /// Whether downlink SDAP headers are present
    pub sdap_header_dl: bool,
}

/// QoS flow to be set up on a DRB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosFlowToSetupItem {
    /// QoS flow identifier
    pub qos_flow_id: QosFlowId,
    /// 5G QoS identifier of the flow
    pub five_qi: u16,
}

impl QosFlowToSetupItem {
    /// Creates a QoS flow item.
    pub fn new(qos_flow_id: QosFlowId, five_qi: u16) -> Self {
        Self {
            qos_flow_id,
            five_qi,
        }
    }
}

/// DRB to be set up inside a PDU session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbToSetupItem {
    /// DRB identity
    pub drb_id: DrbId,
    /// PDCP configuration
    #[serde(default)]
    pub pdcp_config: PdcpConfig,
    /// SDAP configuration
    #[serde(default)]
    pub sdap_config: SdapConfig,
    /// QoS flows mapped onto the DRB
    #[serde(default)]
    pub qos_flows_to_setup: Vec<QosFlowToSetupItem>,
}

impl DrbToSetupItem {
    /// Creates a DRB item with default PDCP/SDAP configuration.
    pub fn new(drb_id: DrbId) -> Self {
        Self {
            drb_id,
            pdcp_config: PdcpConfig::default(),
            sdap_config: SdapConfig::default(),
            qos_flows_to_setup: Vec::new(),
        }
    }

    /// Adds a QoS flow to the item.
    pub fn with_qos_flow(mut self, qos_flow_id: QosFlowId, five_qi: u16) -> Self {
        self.qos_flows_to_setup
            .push(QosFlowToSetupItem::new(qos_flow_id, five_qi));
        self
    }
}

/// Existing DRB to be modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbToModifyItem {
    /// DRB identity
    pub drb_id: DrbId,
    /// New downlink F1-U tunnel(s); the first one is applied
    #[serde(default)]
    pub dl_up_params: Vec<UpTransportLayerInfo>,
    /// QoS flows to unmap from the DRB
    #[serde(default)]
    pub qos_flows_to_remove: Vec<QosFlowId>,
}

impl DrbToModifyItem {
    /// Creates a modification moving the downlink tunnel.
    pub fn with_dl_tunnel(drb_id: DrbId, dl_tunnel: UpTransportLayerInfo) -> Self {
        Self {
            drb_id,
            dl_up_params: vec![dl_tunnel],
            qos_flows_to_remove: Vec::new(),
        }
    }
}

/// PDU session resource to set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSessionToSetupItem {
    /// PDU session identity
    pub pdu_session_id: PduSessionId,
    /// Uplink NG-U tunnel at the UPF
    pub ul_tunnel_info: UpTransportLayerInfo,
    /// DRBs to set up in the session
    #[serde(default)]
    pub drbs_to_setup: Vec<DrbToSetupItem>,
}

impl PduSessionToSetupItem {
    /// Creates a session item without DRBs.
    pub fn new(pdu_session_id: PduSessionId, ul_tunnel_info: UpTransportLayerInfo) -> Self {
        Self {
            pdu_session_id,
            ul_tunnel_info,
            drbs_to_setup: Vec::new(),
        }
    }

    /// Adds a DRB to the item.
    pub fn with_drb(mut self, drb: DrbToSetupItem) -> Self {
        self.drbs_to_setup.push(drb);
        self
    }
}

/// PDU session resource to modify.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PduSessionToModifyItem {
    /// PDU session identity
    pub pdu_session_id: PduSessionId,
    /// DRBs to add
    pub drbs_to_setup: Vec<DrbToSetupItem>,
    /// DRBs to modify
    pub drbs_to_modify: Vec<DrbToModifyItem>,
    /// DRBs to remove
    pub drbs_to_remove: Vec<DrbId>,
}

impl PduSessionToModifyItem {
    /// Creates an empty modification for a session.
    pub fn new(pdu_session_id: PduSessionId) -> Self {
        Self {
            pdu_session_id,
            ..Default::default()
        }
    }
}
