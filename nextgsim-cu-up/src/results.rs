//! Procedure results returned to the control plane
//!
//! Results are plain values built fresh for every request. Every level
//! carries its own `success` flag, so a caller has to look at each level
//! it cares about: a session can be set up while some of its DRBs fail.

use nextgsim_common::{Cause, DrbId, PduSessionId, QosFlowId, UpTransportLayerInfo};

/// Outcome of setting up one QoS flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosFlowSetupResult {
    /// Whether the flow was mapped
    pub success: bool,
    /// QoS flow identifier
    pub qos_flow_id: QosFlowId,
    /// Failure cause
    pub cause: Option<Cause>,
}

impl QosFlowSetupResult {
    /// A successfully mapped flow.
    pub fn succeeded(qos_flow_id: QosFlowId) -> Self {
        Self {
            success: true,
            qos_flow_id,
            cause: None,
        }
    }

    /// A flow that could not be mapped.
    pub fn failed(qos_flow_id: QosFlowId, cause: Cause) -> Self {
        Self {
            success: false,
            qos_flow_id,
            cause: Some(cause),
        }
    }
}

/// Outcome of setting up one DRB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbSetupResult {
    /// Whether the DRB was set up
    pub success: bool,
    /// DRB identity
    pub drb_id: DrbId,
    /// Failure cause
    pub cause: Option<Cause>,
    /// Local F1-U uplink tunnel, on success
    pub gtp_tunnel: Option<UpTransportLayerInfo>,
    /// Per QoS flow outcomes
    pub qos_flow_results: Vec<QosFlowSetupResult>,
}

impl DrbSetupResult {
    /// A DRB that could not be set up.
    pub fn failed(drb_id: DrbId, cause: Cause) -> Self {
        Self {
            success: false,
            drb_id,
            cause: Some(cause),
            gtp_tunnel: None,
            qos_flow_results: Vec::new(),
        }
    }
}

/// Outcome of modifying one DRB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbModifiedResult {
    /// Whether the modification was applied
    pub success: bool,
    /// DRB identity
    pub drb_id: DrbId,
    /// Failure cause
    pub cause: Option<Cause>,
    /// QoS flows unmapped from the DRB
    pub removed_qos_flows: Vec<QosFlowId>,
}

impl DrbModifiedResult {
    /// A modification that could not be applied.
    pub fn failed(drb_id: DrbId, cause: Cause) -> Self {
        Self {
            success: false,
            drb_id,
            cause: Some(cause),
            removed_qos_flows: Vec::new(),
        }
    }
}

/// Outcome of setting up a PDU session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionSetupResult {
    /// Whether the session was created
    pub success: bool,
    /// PDU session identity
    pub pdu_session_id: PduSessionId,
    /// Failure cause
    pub cause: Option<Cause>,
    /// Local NG-U downlink tunnel, on success
    pub gtp_tunnel: Option<UpTransportLayerInfo>,
    /// Per DRB outcomes
    pub drb_setup_results: Vec<DrbSetupResult>,
}

impl PduSessionSetupResult {
    /// A session that could not be created.
    pub fn failed(pdu_session_id: PduSessionId, cause: Cause) -> Self {
        Self {
            success: false,
            pdu_session_id,
            cause: Some(cause),
            gtp_tunnel: None,
            drb_setup_results: Vec::new(),
        }
    }
}

/// Outcome of modifying a PDU session.
///
/// `success` reports that the request was processed, not that every item
/// succeeded; item outcomes are in the per-DRB lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionModificationResult {
    /// Whether the request was processed
    pub success: bool,
    /// PDU session identity
    pub pdu_session_id: PduSessionId,
    /// Failure cause
    pub cause: Option<Cause>,
    /// Outcomes of DRBs added
    pub drb_setup_results: Vec<DrbSetupResult>,
    /// Outcomes of DRBs modified
    pub drb_modification_results: Vec<DrbModifiedResult>,
    /// DRBs actually removed
    pub drb_removed: Vec<DrbId>,
}

impl PduSessionModificationResult {
    /// A modification rejected as a whole.
    pub fn failed(pdu_session_id: PduSessionId, cause: Cause) -> Self {
        Self {
            success: false,
            pdu_session_id,
            cause: Some(cause),
            drb_setup_results: Vec::new(),
            drb_modification_results: Vec::new(),
            drb_removed: Vec::new(),
        }
    }
}

/// Outcome of releasing a PDU session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseResult {
    /// Whether the session existed and was released
    pub success: bool,
    /// PDU session identity
    pub pdu_session_id: PduSessionId,
    /// Failure cause
    pub cause: Option<Cause>,
    /// DRBs whose F1-U bearer was disconnected
    pub disconnected_drbs: Vec<DrbId>,
}
