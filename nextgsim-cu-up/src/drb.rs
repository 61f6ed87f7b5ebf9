//! DRB and QoS flow contexts
//!
//! A [`DrbContext`] owns the PDCP entity and F1-U bearer of one DRB, the
//! adapters wiring them together, and the QoS flows mapped onto it.
//! Dropping the context disconnects the F1-U bearer from its gateway
//! before the entities are released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use nextgsim_common::{DrbId, GtpTeid, QosFlowId, UeIndex};

use crate::adapters::{
    F1uToPdcpAdapter, PdcpControlEvents, PdcpRxToE1apAdapter, PdcpToF1uAdapter,
    PdcpToSdapAdapter, PdcpTxToE1apAdapter, SdapToPdcpAdapter,
};
use crate::interfaces::{F1uBearer, F1uCuUpGateway, PdcpEntity};
use crate::qos::{lookup_5qi, FiveQiCharacteristics};

/// One QoS flow mapped onto a DRB.
pub struct QosFlowContext {
    qos_flow_id: QosFlowId,
    five_qi: u16,
    sdap_to_pdcp_adapter: Arc<SdapToPdcpAdapter>,
}

impl QosFlowContext {
    /// Creates the context with an unbound SDAP → PDCP adapter.
    pub fn new(qos_flow_id: QosFlowId, five_qi: u16) -> Self {
        Self {
            qos_flow_id,
            five_qi,
            sdap_to_pdcp_adapter: Arc::new(SdapToPdcpAdapter::new()),
        }
    }

    /// QoS flow identifier.
    pub fn qos_flow_id(&self) -> QosFlowId {
        self.qos_flow_id
    }

    /// 5QI of the flow.
    pub fn five_qi(&self) -> u16 {
        self.five_qi
    }

    /// Standardized characteristics of the flow's 5QI, if any.
    pub fn characteristics(&self) -> Option<FiveQiCharacteristics> {
        lookup_5qi(self.five_qi)
    }

    /// Adapter the SDAP entity uses to reach the DRB's PDCP.
    pub fn sdap_to_pdcp_adapter(&self) -> &Arc<SdapToPdcpAdapter> {
        &self.sdap_to_pdcp_adapter
    }
}

impl fmt::Debug for QosFlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QosFlowContext")
            .field("qos_flow_id", &self.qos_flow_id)
            .field("five_qi", &self.five_qi)
            .finish()
    }
}

/// Adapters of one DRB, created before the entities they connect.
pub struct DrbAdapters {
    /// PDCP → F1-U (downlink PDUs)
    pub pdcp_to_f1u: Arc<PdcpToF1uAdapter>,
    /// F1-U → PDCP (uplink PDUs and delivery status)
    pub f1u_to_pdcp: Arc<F1uToPdcpAdapter>,
    /// PDCP → SDAP (uplink SDUs)
    pub pdcp_to_sdap: Arc<PdcpToSdapAdapter>,
    /// PDCP TX control → E1AP
    pub pdcp_tx_to_e1ap: Arc<PdcpTxToE1apAdapter>,
    /// PDCP RX control → E1AP
    pub pdcp_rx_to_e1ap: Arc<PdcpRxToE1apAdapter>,
    /// Control events raised through the E1AP adapters
    pub control_events: Arc<PdcpControlEvents>,
}

impl DrbAdapters {
    /// Creates a set of unbound adapters.
    pub fn new() -> Self {
        let control_events = Arc::new(PdcpControlEvents::default());
        Self {
            pdcp_to_f1u: Arc::new(PdcpToF1uAdapter::new()),
            f1u_to_pdcp: Arc::new(F1uToPdcpAdapter::new()),
            pdcp_to_sdap: Arc::new(PdcpToSdapAdapter::new()),
            pdcp_tx_to_e1ap: Arc::new(PdcpTxToE1apAdapter::new(control_events.clone())),
            pdcp_rx_to_e1ap: Arc::new(PdcpRxToE1apAdapter::new(control_events.clone())),
            control_events,
        }
    }
}

impl Default for DrbAdapters {
    fn default() -> Self {
        Self::new()
    }
}

/// Protocol stack of one DRB.
pub struct DrbContext {
    drb_id: DrbId,
    ue_index: UeIndex,
    f1u_ul_teid: GtpTeid,
    adapters: DrbAdapters,
    pdcp: Box<dyn PdcpEntity>,
    f1u: Box<dyn F1uBearer>,
    f1u_gw: Arc<dyn F1uCuUpGateway>,
    f1u_connected: bool,
    qos_flows: HashMap<QosFlowId, QosFlowContext>,
}

impl DrbContext {
    /// Assembles a DRB from its already created entities.
    pub fn new(
        drb_id: DrbId,
        ue_index: UeIndex,
        f1u_ul_teid: GtpTeid,
        adapters: DrbAdapters,
        pdcp: Box<dyn PdcpEntity>,
        f1u: Box<dyn F1uBearer>,
        f1u_gw: Arc<dyn F1uCuUpGateway>,
    ) -> Self {
        Self {
            drb_id,
            ue_index,
            f1u_ul_teid,
            adapters,
            pdcp,
            f1u,
            f1u_gw,
            f1u_connected: true,
            qos_flows: HashMap::new(),
        }
    }

    /// DRB identity.
    pub fn drb_id(&self) -> DrbId {
        self.drb_id
    }

    /// Local F1-U uplink TEID.
    pub fn f1u_ul_teid(&self) -> GtpTeid {
        self.f1u_ul_teid
    }

    /// The DRB's adapters.
    pub fn adapters(&self) -> &DrbAdapters {
        &self.adapters
    }

    /// PDCP control events raised so far.
    pub fn control_events(&self) -> &PdcpControlEvents {
        &self.adapters.control_events
    }

    /// The PDCP entity.
    pub fn pdcp(&self) -> &dyn PdcpEntity {
        self.pdcp.as_ref()
    }

    /// The CU-UP side of the F1-U bearer.
    pub fn f1u(&self) -> &dyn F1uBearer {
        self.f1u.as_ref()
    }

    /// Cross-connects F1-U and PDCP in both directions.
    pub fn connect_f1u_and_pdcp(&self) {
        self.adapters.f1u_to_pdcp.connect_pdcp(
            &self.pdcp.rx_lower_interface(),
            &self.pdcp.tx_lower_interface(),
        );
        self.adapters
            .pdcp_to_f1u
            .connect_f1u(&self.f1u.tx_sdu_handler());
    }

    /// Adds a QoS flow, replacing a previous context with the same QFI.
    pub fn add_qos_flow(&mut self, flow: QosFlowContext) -> &QosFlowContext {
        let qfi = flow.qos_flow_id();
        self.qos_flows.insert(qfi, flow);
        &self.qos_flows[&qfi]
    }

    /// Removes a QoS flow context.
    pub fn remove_qos_flow(&mut self, qfi: QosFlowId) -> Option<QosFlowContext> {
        self.qos_flows.remove(&qfi)
    }

    /// Looks up a QoS flow context.
    pub fn qos_flow(&self, qfi: QosFlowId) -> Option<&QosFlowContext> {
        self.qos_flows.get(&qfi)
    }

    /// Returns true if the QoS flow is mapped onto this DRB.
    pub fn has_qos_flow(&self, qfi: QosFlowId) -> bool {
        self.qos_flows.contains_key(&qfi)
    }

    /// QoS flows mapped onto this DRB, in ascending order.
    pub fn qos_flow_ids(&self) -> Vec<QosFlowId> {
        let mut ids: Vec<_> = self.qos_flows.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns true until the F1-U bearer has been disconnected.
    pub fn is_f1u_connected(&self) -> bool {
        self.f1u_connected
    }

    /// Disconnects the F1-U bearer from its gateway. Idempotent.
    pub fn disconnect_f1u(&mut self) {
        if !self.f1u_connected {
            return;
        }
        debug!(
            ue_index = %self.ue_index,
            drb_id = %self.drb_id,
            "Disconnecting CU bearer with UL-TEID={}",
            self.f1u_ul_teid
        );
        self.f1u_gw.disconnect_cu_bearer(self.f1u_ul_teid);
        self.f1u_connected = false;
    }
}

impl Drop for DrbContext {
    fn drop(&mut self) {
        self.disconnect_f1u();
    }
}

impl fmt::Debug for DrbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrbContext")
            .field("drb_id", &self.drb_id)
            .field("ue_index", &self.ue_index)
            .field("f1u_ul_teid", &self.f1u_ul_teid)
            .field("f1u_connected", &self.f1u_connected)
            .field("qos_flows", &self.qos_flow_ids())
            .finish()
    }
}
