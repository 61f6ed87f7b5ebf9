//! Local TEID allocation
//!
//! Local TEIDs are concatenations of identifier bit-fields:
//!
//! ```text
//! N3 (session):  0x00 | ue_index (16) | psi (8)
//! F1-U (bearer): ue_index (16) | psi (8) | drb_id (8)
//! ```
//!
//! Allocation is a pure function. Uniqueness holds as long as UE indexes
//! are unique within the CU-UP, which `UeManager` guarantees.

use nextgsim_common::{DrbId, GtpTeid, PduSessionId, UeIndex};

/// Allocates the N3 (NG-U) local TEID for a PDU session.
#[inline]
pub fn allocate_session_teid(ue_index: UeIndex, psi: PduSessionId) -> GtpTeid {
    let mut teid = u32::from(ue_index.value());
    teid <<= 8;
    teid |= u32::from(psi.value());
    GtpTeid(teid)
}

/// Allocates the F1-U uplink local TEID for a DRB.
#[inline]
pub fn allocate_bearer_teid(ue_index: UeIndex, psi: PduSessionId, drb_id: DrbId) -> GtpTeid {
    let mut teid = allocate_session_teid(ue_index, psi).value();
    teid <<= 8;
    teid |= u32::from(drb_id.value());
    GtpTeid(teid)
}
