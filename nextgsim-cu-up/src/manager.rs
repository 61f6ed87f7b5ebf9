//! PDU session manager
//!
//! Owns the PDU sessions of one UE and runs the setup, modification and
//! release procedures on them. Every procedure returns a structured result;
//! session, DRB and QoS flow level failures never surface as errors.
//!
//! The manager is driven from a single executor context per UE and does no
//! locking of its own. The receive demultiplexer and the F1-U gateway are
//! shared between UEs and synchronise internally.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use nextgsim_common::{
    Cause, DrbId, NetworkInterfaceConfig, PduSessionId, UeIndex, UpTransportLayerInfo,
};

use crate::drb::{DrbAdapters, DrbContext, QosFlowContext};
use crate::interfaces::{
    EntityFactory, F1uCuUpGateway, GtpuDemuxCtrl, GtpuTunnelNguConfig,
    GtpuTunnelNguCreationMessage, GtpuTunnelTxUpperLayerNotifier, PdcpEntityCreationMessage,
    SdapEntityCreationMessage,
};
use crate::requests::{DrbToModifyItem, DrbToSetupItem, PduSessionToModifyItem, PduSessionToSetupItem};
use crate::results::{
    DrbModifiedResult, DrbSetupResult, PduSessionModificationResult, PduSessionReleaseResult,
    PduSessionSetupResult, QosFlowSetupResult,
};
use crate::session::{PduSession, SessionAdapters};
use crate::teid::{allocate_bearer_teid, allocate_session_teid};
use crate::timers::{TimerFactory, UniqueTimer};

/// Collaborators shared by every UE of the CU-UP.
#[derive(Clone)]
pub struct CuUpDependencies {
    /// Creates PDCP, SDAP and GTP-U entities
    pub factory: Arc<dyn EntityFactory>,
    /// F1-U gateway towards the DU
    pub f1u_gw: Arc<dyn F1uCuUpGateway>,
    /// N3 sink for encapsulated uplink PDUs
    pub gtpu_tx_notifier: Arc<dyn GtpuTunnelTxUpperLayerNotifier>,
    /// Receive-side TEID demultiplexer
    pub gtpu_rx_demux: Arc<dyn GtpuDemuxCtrl>,
}

/// Everything the procedures need besides the session map.
struct ManagerContext {
    ue_index: UeIndex,
    net_config: NetworkInterfaceConfig,
    max_pdu_sessions: usize,
    ue_inactivity_timer: Arc<UniqueTimer>,
    timers: TimerFactory,
    deps: CuUpDependencies,
}

/// Manages the PDU sessions of one UE.
pub struct PduSessionManager {
    ctx: ManagerContext,
    pdu_sessions: HashMap<PduSessionId, PduSession>,
}

impl PduSessionManager {
    /// Creates an empty manager for `ue_index`.
    pub fn new(
        ue_index: UeIndex,
        net_config: NetworkInterfaceConfig,
        max_pdu_sessions: usize,
        ue_inactivity_timer: Arc<UniqueTimer>,
        timers: TimerFactory,
        deps: CuUpDependencies,
    ) -> Self {
        Self {
            ctx: ManagerContext {
                ue_index,
                net_config,
                max_pdu_sessions,
                ue_inactivity_timer,
                timers,
                deps,
            },
            pdu_sessions: HashMap::new(),
        }
    }

    /// UE served by this manager.
    pub fn ue_index(&self) -> UeIndex {
        self.ctx.ue_index
    }

    /// Sets up a PDU session and its DRBs.
    ///
    /// The session is kept as soon as the session level steps succeed, even
    /// if some of its DRBs fail; DRB outcomes are reported per item.
    pub fn setup_pdu_session(&mut self, item: &PduSessionToSetupItem) -> PduSessionSetupResult {
        let psi = item.pdu_session_id;
        let ue_index = self.ctx.ue_index;

        if self.pdu_sessions.contains_key(&psi) {
            error!(%ue_index, %psi, "PDU session already exists");
            return PduSessionSetupResult::failed(psi, Cause::RadioNetwork);
        }
        if self.pdu_sessions.len() >= self.ctx.max_pdu_sessions {
            error!(
                %ue_index,
                %psi,
                "PDU session limit of {} reached",
                self.ctx.max_pdu_sessions
            );
            return PduSessionSetupResult::failed(psi, Cause::RadioNetwork);
        }

        let mut session = self.ctx.create_session(item);
        if !session.register_tunnel() {
            error!(
                %ue_index,
                %psi,
                teid = %session.local_teid(),
                "Failed to register tunnel at the GTP-U demux"
            );
            return PduSessionSetupResult::failed(psi, Cause::RadioNetwork);
        }

        let drb_setup_results = item
            .drbs_to_setup
            .iter()
            .map(|drb| self.ctx.setup_drb(&mut session, drb))
            .collect();

        let gtp_tunnel = UpTransportLayerInfo::new(self.ctx.net_config.n3_bind_addr, session.local_teid());
        info!(
            %ue_index,
            %psi,
            "PDU session set up, N3 tunnel {} DRBs {:?}",
            gtp_tunnel,
            session.drb_ids()
        );
        self.pdu_sessions.insert(psi, session);

        PduSessionSetupResult {
            success: true,
            pdu_session_id: psi,
            cause: None,
            gtp_tunnel: Some(gtp_tunnel),
            drb_setup_results,
        }
    }

    /// Adds, modifies and removes DRBs of an existing PDU session.
    ///
    /// `success` of the result reports that the request was processed;
    /// individual items can still have failed.
    pub fn modify_pdu_session(&mut self, item: &PduSessionToModifyItem) -> PduSessionModificationResult {
        let psi = item.pdu_session_id;
        let ue_index = self.ctx.ue_index;

        let Some(session) = self.pdu_sessions.get_mut(&psi) else {
            error!(%ue_index, %psi, "Cannot modify unknown PDU session");
            return PduSessionModificationResult::failed(psi, Cause::Misc);
        };

        let drb_setup_results = item
            .drbs_to_setup
            .iter()
            .map(|drb| self.ctx.setup_drb(session, drb))
            .collect();

        let drb_modification_results = item
            .drbs_to_modify
            .iter()
            .map(|drb| self.ctx.modify_drb(session, drb))
            .collect();

        let mut drb_removed = Vec::new();
        for &drb_id in &item.drbs_to_remove {
            if !session.has_drb(drb_id) {
                warn!(%ue_index, %psi, %drb_id, "Cannot remove unknown DRB");
                continue;
            }
            // SDAP must stop using the DRB before its PDCP goes away
            session.unmap_drb(drb_id);
            if let Some(drb) = session.remove_drb(drb_id) {
                assert_eq!(drb.drb_id(), drb_id, "DRB map entry does not match its key");
                drop(drb);
            }
            info!(%ue_index, %psi, %drb_id, "DRB removed");
            drb_removed.push(drb_id);
        }

        PduSessionModificationResult {
            success: true,
            pdu_session_id: psi,
            cause: None,
            drb_setup_results,
            drb_modification_results,
            drb_removed,
        }
    }

    /// Releases a PDU session and all of its DRBs.
    pub fn remove_pdu_session(&mut self, psi: PduSessionId) -> PduSessionReleaseResult {
        let ue_index = self.ctx.ue_index;

        let Some(session) = self.pdu_sessions.get_mut(&psi) else {
            warn!(%ue_index, %psi, "Cannot release unknown PDU session");
            return PduSessionReleaseResult {
                success: false,
                pdu_session_id: psi,
                cause: Some(Cause::Misc),
                disconnected_drbs: Vec::new(),
            };
        };

        let mut disconnected_drbs = Vec::with_capacity(session.nof_drbs());
        for drb in session.drbs_mut() {
            drb.disconnect_f1u();
            disconnected_drbs.push(drb.drb_id());
        }
        disconnected_drbs.sort_unstable();
        self.pdu_sessions.remove(&psi);

        info!(%ue_index, %psi, "PDU session released");
        PduSessionReleaseResult {
            success: true,
            pdu_session_id: psi,
            cause: None,
            disconnected_drbs,
        }
    }

    /// Releases every PDU session of the UE.
    pub fn remove_all_pdu_sessions(&mut self) -> Vec<PduSessionReleaseResult> {
        self.pdu_session_ids()
            .into_iter()
            .map(|psi| self.remove_pdu_session(psi))
            .collect()
    }

    /// Number of active PDU sessions.
    pub fn nof_pdu_sessions(&self) -> usize {
        self.pdu_sessions.len()
    }

    /// Looks up a PDU session.
    pub fn pdu_session(&self, psi: PduSessionId) -> Option<&PduSession> {
        self.pdu_sessions.get(&psi)
    }

    /// Identities of the active PDU sessions, in ascending order.
    pub fn pdu_session_ids(&self) -> Vec<PduSessionId> {
        let mut ids: Vec<_> = self.pdu_sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl ManagerContext {
    /// Creates the SDAP entity and NG-U tunnel of a session and wires them.
    fn create_session(&self, item: &PduSessionToSetupItem) -> PduSession {
        let psi = item.pdu_session_id;
        let local_teid = allocate_session_teid(self.ue_index, psi);
        debug!(ue_index = %self.ue_index, %psi, "Allocated N3 TEID={}", local_teid);

        let adapters = SessionAdapters::new();

        let sdap = self
            .deps
            .factory
            .create_sdap_entity(SdapEntityCreationMessage {
                ue_index: self.ue_index,
                pdu_session_id: psi,
                ue_inactivity_timer: Arc::clone(&self.ue_inactivity_timer),
                rx_sdu_notifier: adapters.sdap_to_gtpu.clone(),
            });

        let peer_addr = SocketAddr::new(item.ul_tunnel_info.address, self.net_config.upf_port);
        let gtpu = self
            .deps
            .factory
            .create_gtpu_tunnel_ngu(GtpuTunnelNguCreationMessage {
                ue_index: self.ue_index,
                config: GtpuTunnelNguConfig {
                    peer_teid: item.ul_tunnel_info.teid,
                    peer_addr,
                    local_teid,
                },
                rx_lower: adapters.gtpu_to_sdap.clone(),
                tx_upper: self.deps.gtpu_tx_notifier.clone(),
            });

        let session = PduSession::new(
            psi,
            self.ue_index,
            item.ul_tunnel_info,
            local_teid,
            adapters,
            sdap,
            gtpu,
            self.deps.gtpu_rx_demux.clone(),
        );
        session.connect_sdap_and_gtpu();
        session
    }

    /// Creates one DRB with its PDCP entity and F1-U bearer and maps the
    /// requested QoS flows onto it.
    fn setup_drb(&self, session: &mut PduSession, item: &DrbToSetupItem) -> DrbSetupResult {
        let ue_index = self.ue_index;
        let psi = session.pdu_session_id();
        let drb_id = item.drb_id;

        if session.has_drb(drb_id) {
            error!(%ue_index, %psi, %drb_id, "DRB already exists");
            return DrbSetupResult::failed(drb_id, Cause::RadioNetwork);
        }
        if item.qos_flows_to_setup.is_empty() {
            error!(%ue_index, %psi, %drb_id, "DRB has no QoS flows to set up");
            return DrbSetupResult::failed(drb_id, Cause::Protocol);
        }

        let adapters = DrbAdapters::new();
        let pdcp = self
            .deps
            .factory
            .create_pdcp_entity(PdcpEntityCreationMessage {
                ue_index,
                rb_id: drb_id,
                config: item.pdcp_config.clone(),
                tx_lower: adapters.pdcp_to_f1u.clone(),
                tx_upper_cn: adapters.pdcp_tx_to_e1ap.clone(),
                rx_upper_dn: adapters.pdcp_to_sdap.clone(),
                rx_upper_cn: adapters.pdcp_rx_to_e1ap.clone(),
                timers: self.timers.clone(),
            });
        adapters.pdcp_tx_to_e1ap.connect_e1ap(ue_index, drb_id);
        adapters.pdcp_rx_to_e1ap.connect_e1ap(ue_index, drb_id);

        let f1u_ul_teid = allocate_bearer_teid(ue_index, psi, drb_id);
        let f1u = self.deps.f1u_gw.create_cu_bearer(
            ue_index,
            f1u_ul_teid,
            adapters.f1u_to_pdcp.clone(),
            adapters.f1u_to_pdcp.clone(),
            self.timers.clone(),
        );

        let drb = DrbContext::new(
            drb_id,
            ue_index,
            f1u_ul_teid,
            adapters,
            pdcp,
            f1u,
            self.deps.f1u_gw.clone(),
        );
        drb.connect_f1u_and_pdcp();
        session.insert_drb(drb);

        let mut qos_flow_results = Vec::with_capacity(item.qos_flows_to_setup.len());
        for flow in &item.qos_flows_to_setup {
            let context = QosFlowContext::new(flow.qos_flow_id, flow.five_qi);
            match context.characteristics() {
                Some(chars) => debug!(
                    %ue_index,
                    %psi,
                    %drb_id,
                    "Mapping QoS flow {} (5QI={} {} prio={})",
                    flow.qos_flow_id,
                    flow.five_qi,
                    chars.resource_type,
                    chars.priority
                ),
                None => debug!(
                    %ue_index,
                    %psi,
                    %drb_id,
                    "Mapping QoS flow {} (5QI={})",
                    flow.qos_flow_id,
                    flow.five_qi
                ),
            }
            session.map_qos_flow(drb_id, context, &item.sdap_config);
            qos_flow_results.push(QosFlowSetupResult::succeeded(flow.qos_flow_id));
        }

        let gtp_tunnel = UpTransportLayerInfo::new(self.net_config.f1u_bind_addr, f1u_ul_teid);
        info!(%ue_index, %psi, %drb_id, "DRB set up, F1-U tunnel {}", gtp_tunnel);

        DrbSetupResult {
            success: true,
            drb_id,
            cause: None,
            gtp_tunnel: Some(gtp_tunnel),
            qos_flow_results,
        }
    }

    /// Applies one DRB-to-modify item.
    fn modify_drb(&self, session: &mut PduSession, item: &DrbToModifyItem) -> DrbModifiedResult {
        let ue_index = self.ue_index;
        let psi = session.pdu_session_id();
        let drb_id: DrbId = item.drb_id;

        let Some(drb) = session.drb(drb_id) else {
            warn!(%ue_index, %psi, %drb_id, "Cannot modify unknown DRB");
            return DrbModifiedResult::failed(drb_id, Cause::RadioNetwork);
        };
        assert_eq!(drb.drb_id(), drb_id, "DRB map entry does not match its key");

        let Some(dl_tunnel) = item.dl_up_params.first() else {
            warn!(%ue_index, %psi, %drb_id, "DRB modification without DL UP parameters");
            return DrbModifiedResult::failed(drb_id, Cause::Protocol);
        };
        if item.dl_up_params.len() > 1 {
            debug!(
                %ue_index,
                %psi,
                %drb_id,
                "Using first of {} DL UP parameters",
                item.dl_up_params.len()
            );
        }

        let f1u_ul_teid = drb.f1u_ul_teid();
        debug!(
            %ue_index,
            %psi,
            %drb_id,
            "Attaching DL-TEID={} to UL-TEID={}",
            dl_tunnel.teid,
            f1u_ul_teid
        );
        self.deps.f1u_gw.attach_dl_teid(f1u_ul_teid, dl_tunnel.teid);

        let mut removed_qos_flows = Vec::new();
        for &qfi in &item.qos_flows_to_remove {
            if session.unmap_qos_flow(drb_id, qfi) {
                removed_qos_flows.push(qfi);
            } else {
                warn!(%ue_index, %psi, %drb_id, "QoS flow {} is not mapped onto the DRB", qfi);
            }
        }

        DrbModifiedResult {
            success: true,
            drb_id,
            cause: None,
            removed_qos_flows,
        }
    }
}

impl std::fmt::Debug for PduSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PduSessionManager")
            .field("ue_index", &self.ctx.ue_index)
            .field("pdu_sessions", &self.pdu_session_ids())
            .finish()
    }
}
