//! Collaborator contracts
//!
//! The CU-UP core wires protocol entities together but does not implement
//! them. Each layer is reached through small capability traits: a layer
//! exposes *interfaces* (what it receives) and is driven through
//! *notifiers* (what it emits). Adapters in [`crate::adapters`] implement
//! the notifiers and forward into the next layer's interfaces.
//!
//! Entities hand their interfaces out as `Arc<dyn …>` and must keep them
//! alive for as long as the entity itself lives; adapters only hold weak
//! references to them.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use nextgsim_common::{DrbId, GtpTeid, PduSessionId, QosFlowId, UeIndex};

use crate::requests::{PdcpConfig, SdapConfig};
use crate::timers::{TimerFactory, UniqueTimer};

// ============================================================================
// PDCP
// ============================================================================

/// PDCP downlink entry point for SDUs coming from SDAP.
pub trait PdcpTxUpperDataInterface: Send + Sync {
    /// Handle a downlink SDU.
    fn handle_sdu(&self, sdu: Bytes);
}

/// PDCP uplink entry point for PDUs coming from F1-U.
pub trait PdcpRxLowerInterface: Send + Sync {
    /// Handle an uplink PDU.
    fn handle_pdu(&self, pdu: Bytes);
}

/// PDCP downlink status input from the lower layers.
pub trait PdcpTxLowerInterface: Send + Sync {
    /// Highest PDCP SN transmitted by the DU.
    fn handle_transmit_notification(&self, highest_sn: u32);
    /// Highest PDCP SN successfully delivered by the DU.
    fn handle_delivery_notification(&self, highest_sn: u32);
}

/// Downlink PDUs leaving PDCP towards F1-U.
pub trait PdcpTxLowerNotifier: Send + Sync {
    /// A PDU is ready for transmission.
    fn on_new_pdu(&self, pdu: Bytes, is_retx: bool);
    /// A previously submitted PDU must be discarded.
    fn on_discard_pdu(&self, pdcp_sn: u32);
}

/// Uplink SDUs leaving PDCP towards SDAP.
pub trait PdcpRxUpperDataNotifier: Send + Sync {
    /// An uplink SDU was reassembled.
    fn on_new_sdu(&self, sdu: Bytes);
}

/// Control events raised by the PDCP transmitting side.
pub trait PdcpTxUpperControlNotifier: Send + Sync {
    /// Unrecoverable protocol failure.
    fn on_protocol_failure(&self);
    /// The TX COUNT reached its maximum.
    fn on_max_count_reached(&self);
}

/// Control events raised by the PDCP receiving side.
pub trait PdcpRxUpperControlNotifier: Send + Sync {
    /// Unrecoverable protocol failure.
    fn on_protocol_failure(&self);
    /// Integrity verification of a PDU failed.
    fn on_integrity_failure(&self);
    /// The RX COUNT reached its maximum.
    fn on_max_count_reached(&self);
}

/// A PDCP entity of one DRB.
pub trait PdcpEntity: Send {
    /// Uplink input from F1-U.
    fn rx_lower_interface(&self) -> Arc<dyn PdcpRxLowerInterface>;
    /// Delivery status input from F1-U.
    fn tx_lower_interface(&self) -> Arc<dyn PdcpTxLowerInterface>;
    /// Downlink input from SDAP.
    fn tx_upper_data_interface(&self) -> Arc<dyn PdcpTxUpperDataInterface>;
}

/// Everything needed to instantiate a PDCP entity.
pub struct PdcpEntityCreationMessage {
    /// Owning UE
    pub ue_index: UeIndex,
    /// Radio bearer the entity serves
    pub rb_id: DrbId,
    /// Bearer configuration
    pub config: PdcpConfig,
    /// Downlink PDU sink (F1-U side)
    pub tx_lower: Arc<dyn PdcpTxLowerNotifier>,
    /// TX control event sink
    pub tx_upper_cn: Arc<dyn PdcpTxUpperControlNotifier>,
    /// Uplink SDU sink (SDAP side)
    pub rx_upper_dn: Arc<dyn PdcpRxUpperDataNotifier>,
    /// RX control event sink
    pub rx_upper_cn: Arc<dyn PdcpRxUpperControlNotifier>,
    /// Timers for reordering and discard
    pub timers: TimerFactory,
}

// ============================================================================
// SDAP
// ============================================================================

/// SDAP downlink entry point for SDUs coming from GTP-U.
pub trait SdapTxSduHandler: Send + Sync {
    /// Handle a downlink SDU belonging to a QoS flow.
    fn handle_sdu(&self, sdu: Bytes, qfi: QosFlowId);
}

/// SDAP uplink entry point for PDUs coming from the PDCP of one DRB.
pub trait SdapRxPduHandler: Send + Sync {
    /// Handle an uplink PDU.
    fn handle_pdu(&self, pdu: Bytes);
}

/// Uplink SDUs leaving SDAP towards GTP-U.
pub trait SdapRxSduNotifier: Send + Sync {
    /// An uplink SDU of a QoS flow is ready.
    fn on_new_sdu(&self, sdu: Bytes, qfi: QosFlowId);
}

/// Downlink PDUs leaving SDAP towards the PDCP of the mapped DRB.
pub trait SdapTxPduNotifier: Send + Sync {
    /// A downlink PDU is ready.
    fn on_new_pdu(&self, pdu: Bytes);
}

/// The SDAP entity of one PDU session.
pub trait SdapEntity: Send {
    /// Map a QoS flow onto a DRB.
    fn add_mapping(
        &mut self,
        qfi: QosFlowId,
        drb_id: DrbId,
        config: &SdapConfig,
        tx_pdu_notifier: Arc<dyn SdapTxPduNotifier>,
    );
    /// Unmap one QoS flow.
    fn remove_flow_mapping(&mut self, qfi: QosFlowId);
    /// Unmap every QoS flow that uses the DRB.
    fn remove_mapping(&mut self, drb_id: DrbId);
    /// Uplink input for PDUs of the given DRB.
    fn rx_pdu_handler(&self, drb_id: DrbId) -> Arc<dyn SdapRxPduHandler>;
    /// Downlink input from GTP-U.
    fn tx_sdu_handler(&self) -> Arc<dyn SdapTxSduHandler>;
}

/// Everything needed to instantiate an SDAP entity.
pub struct SdapEntityCreationMessage {
    /// Owning UE
    pub ue_index: UeIndex,
    /// Session the entity serves
    pub pdu_session_id: PduSessionId,
    /// UE inactivity timer, restarted on user plane activity
    pub ue_inactivity_timer: Arc<UniqueTimer>,
    /// Uplink SDU sink (GTP-U side)
    pub rx_sdu_notifier: Arc<dyn SdapRxSduNotifier>,
}

// ============================================================================
// GTP-U (NG-U)
// ============================================================================

/// GTP-U uplink entry point for SDUs coming from SDAP.
pub trait GtpuTunnelTxLowerLayerInterface: Send + Sync {
    /// Encapsulate and send an uplink SDU.
    fn handle_sdu(&self, sdu: Bytes, qfi: QosFlowId);
}

/// GTP-U downlink entry point; this is what the receive demultiplexer
/// dispatches to.
pub trait GtpuTunnelRxUpperLayerInterface: Send + Sync {
    /// Handle a received GTP-U PDU.
    fn handle_pdu(&self, pdu: Bytes, src: SocketAddr);
}

/// Downlink SDUs leaving GTP-U towards SDAP.
pub trait GtpuTunnelRxLowerLayerNotifier: Send + Sync {
    /// A decapsulated downlink SDU is ready.
    fn on_new_sdu(&self, sdu: Bytes, qfi: QosFlowId);
}

/// Encapsulated uplink PDUs leaving GTP-U towards the N3 gateway.
pub trait GtpuTunnelTxUpperLayerNotifier: Send + Sync {
    /// An encapsulated PDU must be sent to the peer.
    fn on_new_pdu(&self, pdu: Bytes, peer: SocketAddr);
}

/// The NG-U GTP-U tunnel of one PDU session.
pub trait GtpuTunnel: Send {
    /// Uplink input from SDAP.
    fn tx_lower_layer_interface(&self) -> Arc<dyn GtpuTunnelTxLowerLayerInterface>;
    /// Downlink input from the demultiplexer.
    fn rx_upper_layer_interface(&self) -> Arc<dyn GtpuTunnelRxUpperLayerInterface>;
}

/// NG-U tunnel endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtpuTunnelNguConfig {
    /// TEID allocated by the UPF
    pub peer_teid: GtpTeid,
    /// UPF address and port
    pub peer_addr: SocketAddr,
    /// TEID allocated locally
    pub local_teid: GtpTeid,
}

/// Everything needed to instantiate an NG-U tunnel.
pub struct GtpuTunnelNguCreationMessage {
    /// Owning UE
    pub ue_index: UeIndex,
    /// Tunnel endpoints
    pub config: GtpuTunnelNguConfig,
    /// Downlink SDU sink (SDAP side)
    pub rx_lower: Arc<dyn GtpuTunnelRxLowerLayerNotifier>,
    /// Encapsulated PDU sink (network side)
    pub tx_upper: Arc<dyn GtpuTunnelTxUpperLayerNotifier>,
}

/// Receive-side demultiplexer routing GTP-U PDUs by local TEID.
///
/// Shared by all UEs; implementations handle concurrent access.
pub trait GtpuDemuxCtrl: Send + Sync {
    /// Register a tunnel. Returns false if the TEID is already taken.
    fn add_tunnel(&self, teid: GtpTeid, handler: Arc<dyn GtpuTunnelRxUpperLayerInterface>) -> bool;
    /// Unregister a tunnel. Returns false if the TEID was unknown.
    fn remove_tunnel(&self, teid: GtpTeid) -> bool;
}

// ============================================================================
// F1-U
// ============================================================================

/// F1-U downlink entry point for PDUs coming from PDCP.
pub trait F1uTxSduHandler: Send + Sync {
    /// Send a downlink PDCP PDU to the DU.
    fn handle_sdu(&self, pdu: Bytes, is_retx: bool);
    /// Ask the DU to discard a PDCP PDU.
    fn discard_sdu(&self, pdcp_sn: u32);
}

/// Uplink PDUs leaving F1-U towards PDCP.
pub trait F1uRxSduNotifier: Send + Sync {
    /// An uplink PDCP PDU was received from the DU.
    fn on_new_sdu(&self, pdu: Bytes);
}

/// Downlink delivery status reported by the DU.
pub trait F1uRxDeliveryNotifier: Send + Sync {
    /// Highest PDCP SN transmitted by the DU.
    fn on_transmit_notification(&self, highest_sn: u32);
    /// Highest PDCP SN delivered by the DU.
    fn on_delivery_notification(&self, highest_sn: u32);
}

/// CU-UP side of one F1-U bearer.
pub trait F1uBearer: Send {
    /// Downlink input from PDCP.
    fn tx_sdu_handler(&self) -> Arc<dyn F1uTxSduHandler>;
}

/// Gateway connecting CU-UP bearers to DU bearers.
///
/// Shared by all UEs; implementations handle concurrent access.
pub trait F1uCuUpGateway: Send + Sync {
    /// Create the CU-UP side of a bearer, reachable at `ul_teid`.
    fn create_cu_bearer(
        &self,
        ue_index: UeIndex,
        ul_teid: GtpTeid,
        rx_sdu_notifier: Arc<dyn F1uRxSduNotifier>,
        rx_delivery_notifier: Arc<dyn F1uRxDeliveryNotifier>,
        timers: TimerFactory,
    ) -> Box<dyn F1uBearer>;
    /// Attach the DU-allocated downlink TEID to the bearer.
    fn attach_dl_teid(&self, ul_teid: GtpTeid, dl_teid: GtpTeid);
    /// Disconnect the bearer from the gateway.
    fn disconnect_cu_bearer(&self, ul_teid: GtpTeid);
}

// ============================================================================
// Factories
// ============================================================================

/// Instantiates protocol entities.
pub trait EntityFactory: Send + Sync {
    /// Create a PDCP entity.
    fn create_pdcp_entity(&self, msg: PdcpEntityCreationMessage) -> Box<dyn PdcpEntity>;
    /// Create an SDAP entity.
    fn create_sdap_entity(&self, msg: SdapEntityCreationMessage) -> Box<dyn SdapEntity>;
    /// Create an NG-U GTP-U tunnel.
    fn create_gtpu_tunnel_ngu(&self, msg: GtpuTunnelNguCreationMessage) -> Box<dyn GtpuTunnel>;
}
