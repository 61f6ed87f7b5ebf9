//! CU-UP error types

use nextgsim_common::UeIndex;
use thiserror::Error;

/// Errors surfaced by the UE manager and the CU-UP task.
///
/// Session, DRB and QoS flow outcomes are not errors; they are reported in
/// the procedure results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CuUpError {
    /// No free UE index is left
    #[error("UE limit of {0} reached")]
    UeLimitReached(usize),

    /// The UE index does not belong to any UE context
    #[error("Unknown UE {0}")]
    UnknownUe(UeIndex),

    /// The CU-UP task is no longer running
    #[error("CU-UP task channel closed")]
    TaskClosed,
}

/// Result type for CU-UP operations.
pub type Result<T> = std::result::Result<T, CuUpError>;
