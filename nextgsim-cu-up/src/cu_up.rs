//! Bearer context procedures
//!
//! [`CuUp`] is the entry point of the control plane: it turns bearer context
//! setup, modification and release requests into UE and PDU session
//! operations and collects the per-session results into the responses.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use nextgsim_common::{Cause, CuUpConfig, PduSessionId, UeIndex};

use crate::error::{CuUpError, Result};
use crate::manager::CuUpDependencies;
use crate::requests::{PduSessionToModifyItem, PduSessionToSetupItem};
use crate::results::{PduSessionModificationResult, PduSessionReleaseResult, PduSessionSetupResult};
use crate::timers::TimerFactory;
use crate::ue::UeManager;

/// Bearer context setup request for a new UE.
#[derive(Debug, Clone, Default)]
pub struct BearerContextSetupRequest {
    /// PDU sessions to set up
    pub pdu_session_resource_to_setup_list: Vec<PduSessionToSetupItem>,
}

/// Bearer context setup response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerContextSetupResponse {
    /// Whether the UE context was created
    pub success: bool,
    /// Index of the created UE
    pub ue_index: Option<UeIndex>,
    /// Failure cause
    pub cause: Option<Cause>,
    /// Sessions that were set up
    pub pdu_session_resource_setup_list: Vec<PduSessionSetupResult>,
    /// Sessions that failed
    pub pdu_session_resource_failed_list: Vec<PduSessionSetupResult>,
}

impl BearerContextSetupResponse {
    fn failed(cause: Cause) -> Self {
        Self {
            success: false,
            ue_index: None,
            cause: Some(cause),
            pdu_session_resource_setup_list: Vec::new(),
            pdu_session_resource_failed_list: Vec::new(),
        }
    }
}

/// Bearer context modification request for an existing UE.
#[derive(Debug, Clone, Default)]
pub struct BearerContextModificationRequest {
    /// Target UE
    pub ue_index: UeIndex,
    /// PDU sessions to add
    pub pdu_session_resource_to_setup_list: Vec<PduSessionToSetupItem>,
    /// PDU sessions to modify
    pub pdu_session_resource_to_modify_list: Vec<PduSessionToModifyItem>,
    /// PDU sessions to release
    pub pdu_session_resource_to_remove_list: Vec<PduSessionId>,
}

/// Bearer context modification response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerContextModificationResponse {
    /// Whether the request was processed
    pub success: bool,
    /// Failure cause
    pub cause: Option<Cause>,
    /// Sessions that were added
    pub pdu_session_resource_setup_list: Vec<PduSessionSetupResult>,
    /// Sessions that could not be added
    pub pdu_session_resource_failed_list: Vec<PduSessionSetupResult>,
    /// Sessions that were modified
    pub pdu_session_resource_modified_list: Vec<PduSessionModificationResult>,
    /// Sessions that could not be modified
    pub pdu_session_resource_failed_to_modify_list: Vec<PduSessionModificationResult>,
    /// Outcomes of the session releases
    pub pdu_session_resource_released_list: Vec<PduSessionReleaseResult>,
}

impl BearerContextModificationResponse {
    fn new() -> Self {
        Self {
            success: true,
            cause: None,
            pdu_session_resource_setup_list: Vec::new(),
            pdu_session_resource_failed_list: Vec::new(),
            pdu_session_resource_modified_list: Vec::new(),
            pdu_session_resource_failed_to_modify_list: Vec::new(),
            pdu_session_resource_released_list: Vec::new(),
        }
    }

    fn failed(cause: Cause) -> Self {
        Self {
            success: false,
            cause: Some(cause),
            ..Self::new()
        }
    }
}

/// Bearer context release command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerContextReleaseCommand {
    /// UE to release
    pub ue_index: UeIndex,
}

/// Bearer context release complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerContextReleaseComplete {
    /// Released UE
    pub ue_index: UeIndex,
    /// Outcomes of the session releases
    pub released_pdu_sessions: Vec<PduSessionReleaseResult>,
}

/// Raised when a UE stayed inactive for the configured time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerContextInactivityNotification {
    /// Inactive UE
    pub ue_index: UeIndex,
}

/// The CU-UP bearer context handler.
#[derive(Debug)]
pub struct CuUp {
    ue_mgr: UeManager,
}

impl CuUp {
    /// Creates the CU-UP. Inactivity notifications are delivered on the
    /// returned receiver.
    pub fn new(
        config: CuUpConfig,
        deps: CuUpDependencies,
        timers: TimerFactory,
    ) -> (Self, mpsc::UnboundedReceiver<BearerContextInactivityNotification>) {
        let (inactivity_tx, inactivity_rx) = mpsc::unbounded_channel();
        info!(
            "CU-UP N3={} F1-U={} max UEs={}",
            config.network.n3_bind_addr,
            config.network.f1u_bind_addr,
            config.max_nof_ues
        );
        let cu_up = Self {
            ue_mgr: UeManager::new(config, timers, deps, inactivity_tx),
        };
        (cu_up, inactivity_rx)
    }

    /// The UE manager.
    pub fn ue_manager(&self) -> &UeManager {
        &self.ue_mgr
    }

    /// Number of UE contexts.
    pub fn nof_ues(&self) -> usize {
        self.ue_mgr.nof_ues()
    }

    /// Creates a UE context and sets up its PDU sessions.
    pub fn handle_bearer_context_setup_request(
        &mut self,
        req: &BearerContextSetupRequest,
    ) -> BearerContextSetupResponse {
        if let Err(reason) = check_unique_session_ids(
            req.pdu_session_resource_to_setup_list
                .iter()
                .map(|item| item.pdu_session_id),
        ) {
            error!("Rejecting bearer context setup: {}", reason);
            return BearerContextSetupResponse::failed(Cause::Protocol);
        }
        if req.pdu_session_resource_to_setup_list.is_empty() {
            error!("Rejecting bearer context setup without PDU sessions");
            return BearerContextSetupResponse::failed(Cause::Protocol);
        }

        let ue_index = match self.ue_mgr.add_ue() {
            Ok(ue_index) => ue_index,
            Err(e) => {
                error!("Could not create UE context: {}", e);
                return BearerContextSetupResponse::failed(Cause::RadioNetwork);
            }
        };
        let Some(ue) = self.ue_mgr.find_ue_mut(ue_index) else {
            panic!("UE {} vanished right after creation", ue_index);
        };

        let mut response = BearerContextSetupResponse {
            success: true,
            ue_index: Some(ue_index),
            cause: None,
            pdu_session_resource_setup_list: Vec::new(),
            pdu_session_resource_failed_list: Vec::new(),
        };
        for item in &req.pdu_session_resource_to_setup_list {
            let result = ue.pdu_session_manager_mut().setup_pdu_session(item);
            if result.success {
                response.pdu_session_resource_setup_list.push(result);
            } else {
                response.pdu_session_resource_failed_list.push(result);
            }
        }

        info!(
            %ue_index,
            "Bearer context set up: {} sessions ok, {} failed",
            response.pdu_session_resource_setup_list.len(),
            response.pdu_session_resource_failed_list.len()
        );
        response
    }

    /// Adds, modifies and releases PDU sessions of an existing UE.
    pub fn handle_bearer_context_modification_request(
        &mut self,
        req: &BearerContextModificationRequest,
    ) -> BearerContextModificationResponse {
        let ue_index = req.ue_index;

        let setup_ids = req
            .pdu_session_resource_to_setup_list
            .iter()
            .map(|item| item.pdu_session_id);
        let modify_ids = req
            .pdu_session_resource_to_modify_list
            .iter()
            .map(|item| item.pdu_session_id);
        if let Err(reason) = check_unique_session_ids(setup_ids.chain(modify_ids)) {
            error!(%ue_index, "Rejecting bearer context modification: {}", reason);
            return BearerContextModificationResponse::failed(Cause::Protocol);
        }

        let Some(ue) = self.ue_mgr.find_ue_mut(ue_index) else {
            error!(%ue_index, "Bearer context modification for unknown UE");
            return BearerContextModificationResponse::failed(Cause::Misc);
        };
        let manager = ue.pdu_session_manager_mut();

        let mut response = BearerContextModificationResponse::new();
        for item in &req.pdu_session_resource_to_setup_list {
            let result = manager.setup_pdu_session(item);
            if result.success {
                response.pdu_session_resource_setup_list.push(result);
            } else {
                response.pdu_session_resource_failed_list.push(result);
            }
        }
        for item in &req.pdu_session_resource_to_modify_list {
            let result = manager.modify_pdu_session(item);
            if result.success {
                response.pdu_session_resource_modified_list.push(result);
            } else {
                response.pdu_session_resource_failed_to_modify_list.push(result);
            }
        }
        for &psi in &req.pdu_session_resource_to_remove_list {
            response
                .pdu_session_resource_released_list
                .push(manager.remove_pdu_session(psi));
        }

        response
    }

    /// Releases every PDU session of a UE, then the UE itself.
    pub fn handle_bearer_context_release_command(
        &mut self,
        cmd: &BearerContextReleaseCommand,
    ) -> Result<BearerContextReleaseComplete> {
        let ue_index = cmd.ue_index;
        let Some(ue) = self.ue_mgr.find_ue_mut(ue_index) else {
            warn!(%ue_index, "Bearer context release for unknown UE");
            return Err(CuUpError::UnknownUe(ue_index));
        };

        let released_pdu_sessions = ue.pdu_session_manager_mut().remove_all_pdu_sessions();
        self.ue_mgr.remove_ue(ue_index);

        Ok(BearerContextReleaseComplete {
            ue_index,
            released_pdu_sessions,
        })
    }
}

/// Rejects requests naming the same PDU session more than once.
fn check_unique_session_ids(
    ids: impl Iterator<Item = PduSessionId>,
) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for psi in ids {
        if !seen.insert(psi) {
            return Err(format!("PDU session {} listed twice", psi));
        }
    }
    Ok(())
}
