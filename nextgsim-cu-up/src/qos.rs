//! Standardized 5QI characteristics (TS 23.501 Table 5.7.4-1)
//!
//! Used to annotate QoS flow contexts and their log lines; the CU-UP does
//! not enforce QoS itself.

use std::fmt;

/// QoS resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosResourceType {
    /// Guaranteed Bit Rate
    Gbr,
    /// Non-GBR
    NonGbr,
    /// Delay-critical GBR
    DelayCriticalGbr,
}

impl fmt::Display for QosResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosResourceType::Gbr => write!(f, "GBR"),
            QosResourceType::NonGbr => write!(f, "non-GBR"),
            QosResourceType::DelayCriticalGbr => write!(f, "DC-GBR"),
        }
    }
}

/// Characteristics of a standardized 5QI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveQiCharacteristics {
    /// 5QI value
    pub five_qi: u16,
    /// Resource type
    pub resource_type: QosResourceType,
    /// Default priority level (lower = higher priority)
    pub priority: u8,
    /// Packet delay budget in milliseconds
    pub packet_delay_budget_ms: u32,
}

/// Looks up a standardized 5QI. Operator-specific values return `None`.
pub fn lookup_5qi(five_qi: u16) -> Option<FiveQiCharacteristics> {
    use QosResourceType::*;

    let (resource_type, priority, packet_delay_budget_ms) = match five_qi {
        1 => (Gbr, 20, 100),
        2 => (Gbr, 40, 150),
        3 => (Gbr, 30, 50),
        4 => (Gbr, 50, 300),
        65 => (Gbr, 7, 75),
        66 => (Gbr, 20, 100),
        67 => (Gbr, 15, 100),
        5 => (NonGbr, 10, 100),
        6 => (NonGbr, 60, 300),
        7 => (NonGbr, 70, 100),
        8 => (NonGbr, 80, 300),
        9 => (NonGbr, 90, 300),
        69 => (NonGbr, 5, 60),
        70 => (NonGbr, 55, 200),
        82 => (DelayCriticalGbr, 19, 10),
        83 => (DelayCriticalGbr, 22, 10),
        84 => (DelayCriticalGbr, 24, 30),
        85 => (DelayCriticalGbr, 21, 5),
        _ => return None,
    };

    Some(FiveQiCharacteristics {
        five_qi,
        resource_type,
        priority,
        packet_delay_budget_ms,
    })
}
