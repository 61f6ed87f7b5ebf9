//! Layer adapters
//!
//! Each adapter implements exactly one notifier of one layer and forwards
//! into an interface of the neighbouring layer. Adapters are created
//! unbound, handed to the factories, and bound afterwards with their
//! `connect_*` method, so layers can be created in any order.
//!
//! Peers are held through `Weak` references: an adapter never keeps the
//! entity it feeds alive. Forwarding through an adapter that was never
//! connected is a wiring bug and panics. Forwarding after the peer was
//! torn down drops the SDU with a warning.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use bytes::Bytes;
use tracing::{trace, warn};

use nextgsim_common::{Direction, DrbId, HexDump, QosFlowId, UeIndex};

use crate::interfaces::{
    F1uRxDeliveryNotifier, F1uRxSduNotifier, F1uTxSduHandler, GtpuTunnelRxLowerLayerNotifier,
    GtpuTunnelTxLowerLayerInterface, PdcpRxLowerInterface, PdcpRxUpperControlNotifier,
    PdcpRxUpperDataNotifier, PdcpTxLowerInterface, PdcpTxLowerNotifier,
    PdcpTxUpperControlNotifier, PdcpTxUpperDataInterface, SdapRxPduHandler, SdapRxSduNotifier,
    SdapTxPduNotifier, SdapTxSduHandler,
};

/// Non-owning binding to a peer interface.
struct Peer<T: ?Sized> {
    name: &'static str,
    slot: RwLock<Option<Weak<T>>>,
}

impl<T: ?Sized> Peer<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: RwLock::new(None),
        }
    }

    fn bind(&self, peer: &Arc<T>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::downgrade(peer));
    }

    fn is_bound(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Resolves the peer. Panics if the adapter was never connected.
    fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        let Some(peer) = slot.as_ref() else {
            panic!("{}: adapter used before being connected", self.name);
        };
        let peer = peer.upgrade();
        if peer.is_none() {
            warn!(adapter = self.name, "Peer is gone, dropping SDU");
        }
        peer
    }
}

// ============================================================================
// Session level
// ============================================================================

/// GTP-U → SDAP (downlink).
pub struct GtpuToSdapAdapter {
    sdap: Peer<dyn SdapTxSduHandler>,
}

impl GtpuToSdapAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            sdap: Peer::new("gtpu->sdap"),
        }
    }

    /// Binds the SDAP downlink input.
    pub fn connect_sdap(&self, sdap_handler: &Arc<dyn SdapTxSduHandler>) {
        self.sdap.bind(sdap_handler);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.sdap.is_bound()
    }
}

impl Default for GtpuToSdapAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GtpuTunnelRxLowerLayerNotifier for GtpuToSdapAdapter {
    fn on_new_sdu(&self, sdu: Bytes, qfi: QosFlowId) {
        trace!(dir = %Direction::Dl, %qfi, sdu = %HexDump(&sdu), "GTP-U -> SDAP");
        if let Some(sdap) = self.sdap.get() {
            sdap.handle_sdu(sdu, qfi);
        }
    }
}

/// SDAP → GTP-U (uplink).
pub struct SdapToGtpuAdapter {
    gtpu: Peer<dyn GtpuTunnelTxLowerLayerInterface>,
}

impl SdapToGtpuAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            gtpu: Peer::new("sdap->gtpu"),
        }
    }

    /// Binds the GTP-U uplink input.
    pub fn connect_gtpu(&self, gtpu_handler: &Arc<dyn GtpuTunnelTxLowerLayerInterface>) {
        self.gtpu.bind(gtpu_handler);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.gtpu.is_bound()
    }
}

impl Default for SdapToGtpuAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SdapRxSduNotifier for SdapToGtpuAdapter {
    fn on_new_sdu(&self, sdu: Bytes, qfi: QosFlowId) {
        trace!(dir = %Direction::Ul, %qfi, sdu = %HexDump(&sdu), "SDAP -> GTP-U");
        if let Some(gtpu) = self.gtpu.get() {
            gtpu.handle_sdu(sdu, qfi);
        }
    }
}

// ============================================================================
// QoS flow level
// ============================================================================

/// SDAP → PDCP (downlink), one per QoS flow.
pub struct SdapToPdcpAdapter {
    pdcp: Peer<dyn PdcpTxUpperDataInterface>,
}

impl SdapToPdcpAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            pdcp: Peer::new("sdap->pdcp"),
        }
    }

    /// Binds the PDCP downlink input of the mapped DRB.
    pub fn connect_pdcp(&self, pdcp_handler: &Arc<dyn PdcpTxUpperDataInterface>) {
        self.pdcp.bind(pdcp_handler);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.pdcp.is_bound()
    }
}

impl Default for SdapToPdcpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SdapTxPduNotifier for SdapToPdcpAdapter {
    fn on_new_pdu(&self, pdu: Bytes) {
        trace!(dir = %Direction::Dl, pdu = %HexDump(&pdu), "SDAP -> PDCP");
        if let Some(pdcp) = self.pdcp.get() {
            pdcp.handle_sdu(pdu);
        }
    }
}

// ============================================================================
// DRB level
// ============================================================================

/// PDCP → SDAP (uplink).
pub struct PdcpToSdapAdapter {
    sdap: Peer<dyn SdapRxPduHandler>,
}

impl PdcpToSdapAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            sdap: Peer::new("pdcp->sdap"),
        }
    }

    /// Binds the SDAP uplink input of the DRB. Rebinding is allowed, as the
    /// binding is refreshed for every QoS flow mapped onto the DRB.
    pub fn connect_sdap(&self, sdap_handler: &Arc<dyn SdapRxPduHandler>) {
        self.sdap.bind(sdap_handler);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.sdap.is_bound()
    }
}

impl Default for PdcpToSdapAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdcpRxUpperDataNotifier for PdcpToSdapAdapter {
    fn on_new_sdu(&self, sdu: Bytes) {
        trace!(dir = %Direction::Ul, sdu = %HexDump(&sdu), "PDCP -> SDAP");
        if let Some(sdap) = self.sdap.get() {
            sdap.handle_pdu(sdu);
        }
    }
}

/// PDCP → F1-U (downlink).
pub struct PdcpToF1uAdapter {
    f1u: Peer<dyn F1uTxSduHandler>,
}

impl PdcpToF1uAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            f1u: Peer::new("pdcp->f1u"),
        }
    }

    /// Binds the F1-U downlink input.
    pub fn connect_f1u(&self, f1u_handler: &Arc<dyn F1uTxSduHandler>) {
        self.f1u.bind(f1u_handler);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.f1u.is_bound()
    }
}

impl Default for PdcpToF1uAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdcpTxLowerNotifier for PdcpToF1uAdapter {
    fn on_new_pdu(&self, pdu: Bytes, is_retx: bool) {
        trace!(dir = %Direction::Dl, is_retx, pdu = %HexDump(&pdu), "PDCP -> F1-U");
        if let Some(f1u) = self.f1u.get() {
            f1u.handle_sdu(pdu, is_retx);
        }
    }

    fn on_discard_pdu(&self, pdcp_sn: u32) {
        if let Some(f1u) = self.f1u.get() {
            f1u.discard_sdu(pdcp_sn);
        }
    }
}

/// F1-U → PDCP: uplink PDUs plus downlink delivery status.
pub struct F1uToPdcpAdapter {
    rx_lower: Peer<dyn PdcpRxLowerInterface>,
    tx_lower: Peer<dyn PdcpTxLowerInterface>,
}

impl F1uToPdcpAdapter {
    /// Creates an unbound adapter.
    pub fn new() -> Self {
        Self {
            rx_lower: Peer::new("f1u->pdcp(rx)"),
            tx_lower: Peer::new("f1u->pdcp(tx)"),
        }
    }

    /// Binds the PDCP uplink input and delivery status input.
    pub fn connect_pdcp(
        &self,
        rx_lower: &Arc<dyn PdcpRxLowerInterface>,
        tx_lower: &Arc<dyn PdcpTxLowerInterface>,
    ) {
        self.rx_lower.bind(rx_lower);
        self.tx_lower.bind(tx_lower);
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.rx_lower.is_bound() && self.tx_lower.is_bound()
    }
}

impl Default for F1uToPdcpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl F1uRxSduNotifier for F1uToPdcpAdapter {
    fn on_new_sdu(&self, pdu: Bytes) {
        trace!(dir = %Direction::Ul, pdu = %HexDump(&pdu), "F1-U -> PDCP");
        if let Some(pdcp) = self.rx_lower.get() {
            pdcp.handle_pdu(pdu);
        }
    }
}

impl F1uRxDeliveryNotifier for F1uToPdcpAdapter {
    fn on_transmit_notification(&self, highest_sn: u32) {
        if let Some(pdcp) = self.tx_lower.get() {
            pdcp.handle_transmit_notification(highest_sn);
        }
    }

    fn on_delivery_notification(&self, highest_sn: u32) {
        if let Some(pdcp) = self.tx_lower.get() {
            pdcp.handle_delivery_notification(highest_sn);
        }
    }
}

// ============================================================================
// PDCP control events
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct BearerTag {
    ue_index: UeIndex,
    drb_id: DrbId,
}

/// Counters of PDCP control events raised on one DRB.
#[derive(Debug, Default)]
pub struct PdcpControlEvents {
    protocol_failures: AtomicU32,
    integrity_failures: AtomicU32,
    max_count_reached: AtomicU32,
}

impl PdcpControlEvents {
    /// Number of protocol failures.
    pub fn protocol_failures(&self) -> u32 {
        self.protocol_failures.load(Ordering::Relaxed)
    }

    /// Number of integrity check failures.
    pub fn integrity_failures(&self) -> u32 {
        self.integrity_failures.load(Ordering::Relaxed)
    }

    /// Number of COUNT wrap-around events.
    pub fn max_count_reached(&self) -> u32 {
        self.max_count_reached.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// PDCP TX control events → E1AP.
pub struct PdcpTxToE1apAdapter {
    bearer: OnceLock<BearerTag>,
    events: Arc<PdcpControlEvents>,
}

impl PdcpTxToE1apAdapter {
    /// Creates an unbound adapter recording into `events`.
    pub fn new(events: Arc<PdcpControlEvents>) -> Self {
        Self {
            bearer: OnceLock::new(),
            events,
        }
    }

    /// Binds the adapter to the bearer it reports for.
    pub fn connect_e1ap(&self, ue_index: UeIndex, drb_id: DrbId) {
        let bound = self.bearer.set(BearerTag { ue_index, drb_id });
        assert!(bound.is_ok(), "pdcp-tx->e1ap: adapter connected twice");
    }

    fn bearer(&self) -> BearerTag {
        *self
            .bearer
            .get()
            .expect("pdcp-tx->e1ap: adapter used before being connected")
    }
}

impl PdcpTxUpperControlNotifier for PdcpTxToE1apAdapter {
    fn on_protocol_failure(&self) {
        let BearerTag { ue_index, drb_id } = self.bearer();
        warn!(%ue_index, %drb_id, "PDCP TX protocol failure");
        PdcpControlEvents::bump(&self.events.protocol_failures);
    }

    fn on_max_count_reached(&self) {
        let BearerTag { ue_index, drb_id } = self.bearer();
        warn!(%ue_index, %drb_id, "PDCP TX COUNT reached maximum");
        PdcpControlEvents::bump(&self.events.max_count_reached);
    }
}

/// PDCP RX control events → E1AP.
pub struct PdcpRxToE1apAdapter {
    bearer: OnceLock<BearerTag>,
    events: Arc<PdcpControlEvents>,
}

impl PdcpRxToE1apAdapter {
    /// Creates an unbound adapter recording into `events`.
    pub fn new(events: Arc<PdcpControlEvents>) -> Self {
        Self {
            bearer: OnceLock::new(),
            events,
        }
    }

    /// Binds the adapter to the bearer it reports for.
    pub fn connect_e1ap(&self, ue_index: UeIndex, drb_id: DrbId) {
        let bound = self.bearer.set(BearerTag { ue_index, drb_id });
        assert!(bound.is_ok(), "pdcp-rx->e1ap: adapter connected twice");
    }

    fn bearer(&self) -> BearerTag {
        *self
            .bearer
            .get()
            .expect("pdcp-rx->e1ap: adapter used before being connected")
    }
}

impl PdcpRxUpperControlNotifier for PdcpRxToE1apAdapter {
    fn on_protocol_failure(&self) {
        let BearerTag { ue_index, drb_id } = self.bearer();
        warn!(%ue_index, %drb_id, "PDCP RX protocol failure");
        PdcpControlEvents::bump(&self.events.protocol_failures);
    }

    fn on_integrity_failure(&self) {
        let BearerTag { ue_index, drb_id } = self.bearer();
        warn!(%ue_index, %drb_id, "PDCP RX integrity failure");
        PdcpControlEvents::bump(&self.events.integrity_failures);
    }

    fn on_max_count_reached(&self) {
        let BearerTag { ue_index, drb_id } = self.bearer();
        warn!(%ue_index, %drb_id, "PDCP RX COUNT reached maximum");
        PdcpControlEvents::bump(&self.events.max_count_reached);
    }
}
