//! PDU session context
//!
//! A [`PduSession`] owns the SDAP entity, the NG-U tunnel and the DRBs of
//! one session. Once its tunnel is registered at the receive demultiplexer
//! the registration lives as long as the session: dropping the session
//! unregisters it, then releases the DRBs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use nextgsim_common::{DrbId, GtpTeid, PduSessionId, QosFlowId, UeIndex, UpTransportLayerInfo};

use crate::adapters::{GtpuToSdapAdapter, SdapToGtpuAdapter};
use crate::drb::{DrbContext, QosFlowContext};
use crate::interfaces::{GtpuDemuxCtrl, GtpuTunnel, SdapEntity, SdapTxPduNotifier};
use crate::requests::SdapConfig;

/// Adapters between SDAP and GTP-U, created before both entities.
pub struct SessionAdapters {
    /// SDAP → GTP-U (uplink)
    pub sdap_to_gtpu: Arc<SdapToGtpuAdapter>,
    /// GTP-U → SDAP (downlink)
    pub gtpu_to_sdap: Arc<GtpuToSdapAdapter>,
}

impl SessionAdapters {
    /// Creates unbound adapters.
    pub fn new() -> Self {
        Self {
            sdap_to_gtpu: Arc::new(SdapToGtpuAdapter::new()),
            gtpu_to_sdap: Arc::new(GtpuToSdapAdapter::new()),
        }
    }
}

impl Default for SessionAdapters {
    fn default() -> Self {
        Self::new()
    }
}

/// Protocol stack of one PDU session.
pub struct PduSession {
    pdu_session_id: PduSessionId,
    ue_index: UeIndex,
    ul_tunnel_info: UpTransportLayerInfo,
    local_teid: GtpTeid,
    adapters: SessionAdapters,
    sdap: Box<dyn SdapEntity>,
    gtpu: Box<dyn GtpuTunnel>,
    gtpu_rx_demux: Arc<dyn GtpuDemuxCtrl>,
    demux_registered: bool,
    drbs: HashMap<DrbId, DrbContext>,
}

impl PduSession {
    /// Assembles a session from its already created entities.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pdu_session_id: PduSessionId,
        ue_index: UeIndex,
        ul_tunnel_info: UpTransportLayerInfo,
        local_teid: GtpTeid,
        adapters: SessionAdapters,
        sdap: Box<dyn SdapEntity>,
        gtpu: Box<dyn GtpuTunnel>,
        gtpu_rx_demux: Arc<dyn GtpuDemuxCtrl>,
    ) -> Self {
        Self {
            pdu_session_id,
            ue_index,
            ul_tunnel_info,
            local_teid,
            adapters,
            sdap,
            gtpu,
            gtpu_rx_demux,
            demux_registered: false,
            drbs: HashMap::new(),
        }
    }

    /// PDU session identity.
    pub fn pdu_session_id(&self) -> PduSessionId {
        self.pdu_session_id
    }

    /// Owning UE.
    pub fn ue_index(&self) -> UeIndex {
        self.ue_index
    }

    /// Uplink tunnel at the UPF.
    pub fn ul_tunnel_info(&self) -> UpTransportLayerInfo {
        self.ul_tunnel_info
    }

    /// Local NG-U TEID.
    pub fn local_teid(&self) -> GtpTeid {
        self.local_teid
    }

    /// The session's adapters.
    pub fn adapters(&self) -> &SessionAdapters {
        &self.adapters
    }

    /// The SDAP entity.
    pub fn sdap(&self) -> &dyn SdapEntity {
        self.sdap.as_ref()
    }

    /// Mutable access to the SDAP entity.
    pub fn sdap_mut(&mut self) -> &mut dyn SdapEntity {
        self.sdap.as_mut()
    }

    /// The NG-U tunnel.
    pub fn gtpu(&self) -> &dyn GtpuTunnel {
        self.gtpu.as_ref()
    }

    /// Cross-connects SDAP and GTP-U in both directions.
    pub fn connect_sdap_and_gtpu(&self) {
        self.adapters
            .sdap_to_gtpu
            .connect_gtpu(&self.gtpu.tx_lower_layer_interface());
        self.adapters
            .gtpu_to_sdap
            .connect_sdap(&self.sdap.tx_sdu_handler());
    }

    /// Registers the NG-U tunnel at the receive demultiplexer.
    ///
    /// Returns false if the local TEID is already in use.
    pub fn register_tunnel(&mut self) -> bool {
        assert!(
            !self.demux_registered,
            "PDU session {} registered its tunnel twice",
            self.pdu_session_id
        );
        self.demux_registered = self
            .gtpu_rx_demux
            .add_tunnel(self.local_teid, self.gtpu.rx_upper_layer_interface());
        self.demux_registered
    }

    /// Returns true while the tunnel is registered at the demultiplexer.
    pub fn is_tunnel_registered(&self) -> bool {
        self.demux_registered
    }

    /// Looks up a DRB.
    pub fn drb(&self, drb_id: DrbId) -> Option<&DrbContext> {
        self.drbs.get(&drb_id)
    }

    /// Looks up a DRB mutably.
    pub fn drb_mut(&mut self, drb_id: DrbId) -> Option<&mut DrbContext> {
        self.drbs.get_mut(&drb_id)
    }

    /// Returns true if the DRB exists.
    pub fn has_drb(&self, drb_id: DrbId) -> bool {
        self.drbs.contains_key(&drb_id)
    }

    /// Adds a DRB. The DRB ID must not be in use.
    pub fn insert_drb(&mut self, drb: DrbContext) {
        let drb_id = drb.drb_id();
        let previous = self.drbs.insert(drb_id, drb);
        assert!(
            previous.is_none(),
            "DRB {} inserted twice into PDU session {}",
            drb_id,
            self.pdu_session_id
        );
    }

    /// Removes a DRB, returning it so the caller controls when it is dropped.
    pub fn remove_drb(&mut self, drb_id: DrbId) -> Option<DrbContext> {
        self.drbs.remove(&drb_id)
    }

    /// Iterates over the DRBs mutably.
    pub fn drbs_mut(&mut self) -> impl Iterator<Item = &mut DrbContext> {
        self.drbs.values_mut()
    }

    /// DRB identities of the session, in ascending order.
    pub fn drb_ids(&self) -> Vec<DrbId> {
        let mut ids: Vec<_> = self.drbs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of DRBs.
    pub fn nof_drbs(&self) -> usize {
        self.drbs.len()
    }

    /// Maps a QoS flow onto a DRB of this session and wires SDAP and the
    /// DRB's PDCP together for it.
    ///
    /// A flow already mapped onto another DRB of the session is moved, so a
    /// flow always belongs to exactly one DRB.
    pub fn map_qos_flow(&mut self, drb_id: DrbId, flow: QosFlowContext, config: &SdapConfig) {
        let qfi = flow.qos_flow_id();
        if let Some(previous) = self.find_qos_flow(qfi).filter(|&id| id != drb_id) {
            info!(
                ue_index = %self.ue_index,
                psi = %self.pdu_session_id,
                "Remapping QoS flow {} from DRB {} to DRB {}",
                qfi,
                previous,
                drb_id
            );
            if let Some(old) = self.drbs.get_mut(&previous) {
                old.remove_qos_flow(qfi);
            }
        }

        let Some(drb) = self.drbs.get_mut(&drb_id) else {
            panic!(
                "QoS flow {} mapped onto unknown DRB {} in PDU session {}",
                qfi, drb_id, self.pdu_session_id
            );
        };

        let tx_pdu_notifier: Arc<dyn SdapTxPduNotifier> = flow.sdap_to_pdcp_adapter().clone();
        self.sdap.add_mapping(qfi, drb_id, config, tx_pdu_notifier);
        flow.sdap_to_pdcp_adapter()
            .connect_pdcp(&drb.pdcp().tx_upper_data_interface());
        drb.adapters()
            .pdcp_to_sdap
            .connect_sdap(&self.sdap.rx_pdu_handler(drb_id));
        drb.add_qos_flow(flow);
    }

    /// Unmaps a single QoS flow from a DRB. Returns false if the flow was
    /// not mapped onto that DRB.
    pub fn unmap_qos_flow(&mut self, drb_id: DrbId, qfi: QosFlowId) -> bool {
        let Some(drb) = self.drbs.get_mut(&drb_id) else {
            return false;
        };
        if drb.remove_qos_flow(qfi).is_none() {
            return false;
        }
        self.sdap.remove_flow_mapping(qfi);
        true
    }

    /// Unmaps every QoS flow that uses the DRB from SDAP.
    pub fn unmap_drb(&mut self, drb_id: DrbId) {
        self.sdap.remove_mapping(drb_id);
    }

    /// Finds the DRB a QoS flow is currently mapped onto.
    pub fn find_qos_flow(&self, qfi: QosFlowId) -> Option<DrbId> {
        self.drbs
            .values()
            .find(|drb| drb.has_qos_flow(qfi))
            .map(DrbContext::drb_id)
    }
}

impl Drop for PduSession {
    fn drop(&mut self) {
        if self.demux_registered {
            debug!(
                ue_index = %self.ue_index,
                psi = %self.pdu_session_id,
                "Removing tunnel TEID={} from demux",
                self.local_teid
            );
            self.gtpu_rx_demux.remove_tunnel(self.local_teid);
        }
    }
}

impl fmt::Debug for PduSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PduSession")
            .field("pdu_session_id", &self.pdu_session_id)
            .field("ue_index", &self.ue_index)
            .field("local_teid", &self.local_teid)
            .field("ul_tunnel_info", &self.ul_tunnel_info)
            .field("demux_registered", &self.demux_registered)
            .field("drbs", &self.drb_ids())
            .finish()
    }
}
