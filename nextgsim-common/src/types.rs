//! Identifier and transport types shared by the CU-UP crates
//!
//! The identifier newtypes are sized to the bit-fields used when local
//! TEIDs are synthesized (16-bit UE index, 8-bit PDU session ID, 8-bit
//! DRB ID), so an out-of-range identifier cannot be expressed.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Default upper bound on concurrently active PDU sessions of one UE.
pub const MAX_NUM_PDU_SESSIONS_PER_UE: usize = 8;

/// Highest DRB identity (TS 38.331 `DRB-Identity`).
pub const MAX_DRB_ID: u8 = 32;

/// Highest QoS Flow Identifier (TS 38.413).
pub const MAX_QOS_FLOW_ID: u8 = 63;

/// CU-UP local UE index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct UeIndex(pub u16);

impl UeIndex {
    /// Returns the raw index.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for UeIndex {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Debug for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UeIndex({})", self.0)
    }
}

impl fmt::Display for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PDU session identity (0-255, TS 38.413).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PduSessionId(pub u8);

impl PduSessionId {
    /// Returns the raw identity.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for PduSessionId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Debug for PduSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PduSessionId({})", self.0)
    }
}

impl fmt::Display for PduSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data radio bearer identity (1-32).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DrbId(u8);

impl DrbId {
    /// Creates a DRB ID, returning `None` outside 1..=32.
    pub fn new(value: u8) -> Option<Self> {
        (1..=MAX_DRB_ID).contains(&value).then_some(Self(value))
    }

    /// Returns the raw identity.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DrbId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("DRB ID {value} outside 1..={MAX_DRB_ID}"))
    }
}

impl From<DrbId> for u8 {
    fn from(id: DrbId) -> Self {
        id.0
    }
}

impl fmt::Debug for DrbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DrbId({})", self.0)
    }
}

impl fmt::Display for DrbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// QoS Flow Identifier (0-63).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QosFlowId(u8);

impl QosFlowId {
    /// Creates a QFI, returning `None` above 63.
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_QOS_FLOW_ID).then_some(Self(value))
    }

    /// Returns the raw identifier.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for QosFlowId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("QFI {value} exceeds {MAX_QOS_FLOW_ID}"))
    }
}

impl From<QosFlowId> for u8 {
    fn from(id: QosFlowId) -> Self {
        id.0
    }
}

impl fmt::Debug for QosFlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QosFlowId({})", self.0)
    }
}

impl fmt::Display for QosFlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GTP-U Tunnel Endpoint Identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GtpTeid(pub u32);

impl GtpTeid {
    /// Returns the raw TEID.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for GtpTeid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for GtpTeid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GtpTeid({:#x})", self.0)
    }
}

impl fmt::Display for GtpTeid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// User plane transport layer information: a transport address plus TEID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpTransportLayerInfo {
    /// Transport layer address
    pub address: IpAddr,
    /// GTP-U tunnel endpoint identifier
    pub teid: GtpTeid,
}

impl UpTransportLayerInfo {
    /// Creates new transport layer information.
    pub fn new(address: IpAddr, teid: GtpTeid) -> Self {
        Self { address, teid }
    }
}

impl fmt::Display for UpTransportLayerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/teid={}", self.address, self.teid)
    }
}

/// Failure cause attached to unsuccessful results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cause {
    /// Generic bearer or resource failure
    RadioNetwork,
    /// Transport resource failure
    Transport,
    /// Malformed or invalid request from the peer
    Protocol,
    /// Request addressed an unknown context
    Misc,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork => write!(f, "radio_network"),
            Cause::Transport => write!(f, "transport"),
            Cause::Protocol => write!(f, "protocol"),
            Cause::Misc => write!(f, "misc"),
        }
    }
}
