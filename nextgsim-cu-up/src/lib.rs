//! CU-UP bearer management for nextgsim
//!
//! This crate implements the bearer-management core of a CU-UP: it sets up,
//! modifies and releases PDU sessions and their DRBs, and wires together the
//! per-bearer protocol stack (SDAP, PDCP, GTP-U, F1-U) of each.
//!
//! The protocol entities themselves are not implemented here. They are
//! created through an [`interfaces::EntityFactory`] and connected with the
//! adapters of [`adapters`]; the GTP-U receive demultiplexer and the F1-U
//! gateway are injected as shared collaborators.
//!
//! # Layout
//!
//! - [`teid`]: local TEID allocation
//! - [`adapters`]: layer-to-layer adapters
//! - [`drb`], [`session`]: DRB and PDU session contexts
//! - [`manager`]: per-UE PDU session manager
//! - [`ue`], [`cu_up`]: UE contexts and bearer context procedures
//! - [`task`]: the CU-UP actor
//! - [`config_loader`]: YAML configuration loading and validation

pub mod adapters;
pub mod config_loader;
pub mod cu_up;
pub mod drb;
pub mod error;
pub mod interfaces;
pub mod manager;
pub mod qos;
pub mod requests;
pub mod results;
pub mod session;
pub mod task;
pub mod teid;
pub mod timers;
pub mod ue;

pub use config_loader::{
    load_and_validate_cu_up_config, load_cu_up_config, load_cu_up_config_from_str,
    validate_cu_up_config, ConfigError, ConfigValidationError,
};
pub use cu_up::{
    BearerContextInactivityNotification, BearerContextModificationRequest,
    BearerContextModificationResponse, BearerContextReleaseCommand, BearerContextReleaseComplete,
    BearerContextSetupRequest, BearerContextSetupResponse, CuUp,
};
pub use error::CuUpError;
pub use manager::{CuUpDependencies, PduSessionManager};
pub use requests::{
    DrbToModifyItem, DrbToSetupItem, PdcpConfig, PduSessionToModifyItem, PduSessionToSetupItem,
    QosFlowToSetupItem, SdapConfig,
};
pub use results::{
    DrbModifiedResult, DrbSetupResult, PduSessionModificationResult, PduSessionReleaseResult,
    PduSessionSetupResult, QosFlowSetupResult,
};
pub use task::{CuUpHandle, CuUpMessage, CuUpTask, TaskMessage};
pub use teid::{allocate_bearer_teid, allocate_session_teid};
pub use timers::{TimerFactory, UniqueTimer};
pub use ue::{UeContext, UeManager};
