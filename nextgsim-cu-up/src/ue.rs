//! UE contexts
//!
//! Each UE served by the CU-UP gets a context holding its PDU session
//! manager and its inactivity timer. UE indexes are allocated lowest-free
//! first and are reused after release.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use nextgsim_common::{CuUpConfig, UeIndex};

use crate::cu_up::BearerContextInactivityNotification;
use crate::error::{CuUpError, Result};
use crate::manager::{CuUpDependencies, PduSessionManager};
use crate::timers::{TimerFactory, UniqueTimer};

/// Context of one UE.
pub struct UeContext {
    ue_index: UeIndex,
    pdu_session_manager: PduSessionManager,
    inactivity_timer: Arc<UniqueTimer>,
}

impl UeContext {
    /// UE index.
    pub fn ue_index(&self) -> UeIndex {
        self.ue_index
    }

    /// The UE's PDU session manager.
    pub fn pdu_session_manager(&self) -> &PduSessionManager {
        &self.pdu_session_manager
    }

    /// Mutable access to the UE's PDU session manager.
    pub fn pdu_session_manager_mut(&mut self) -> &mut PduSessionManager {
        &mut self.pdu_session_manager
    }

    /// The UE inactivity timer. SDAP entities restart it on traffic.
    pub fn inactivity_timer(&self) -> &Arc<UniqueTimer> {
        &self.inactivity_timer
    }
}

impl std::fmt::Debug for UeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UeContext")
            .field("ue_index", &self.ue_index)
            .field("pdu_sessions", &self.pdu_session_manager.pdu_session_ids())
            .field("inactivity_timer", &self.inactivity_timer)
            .finish()
    }
}

/// Owns the UE contexts of the CU-UP.
pub struct UeManager {
    config: CuUpConfig,
    timers: TimerFactory,
    deps: CuUpDependencies,
    inactivity_tx: mpsc::UnboundedSender<BearerContextInactivityNotification>,
    ues: BTreeMap<UeIndex, UeContext>,
}

impl UeManager {
    /// Creates an empty UE manager.
    pub fn new(
        config: CuUpConfig,
        timers: TimerFactory,
        deps: CuUpDependencies,
        inactivity_tx: mpsc::UnboundedSender<BearerContextInactivityNotification>,
    ) -> Self {
        Self {
            config,
            timers,
            deps,
            inactivity_tx,
            ues: BTreeMap::new(),
        }
    }

    /// Creates a UE context at the lowest free UE index.
    pub fn add_ue(&mut self) -> Result<UeIndex> {
        let ue_index = self
            .allocate_ue_index()
            .ok_or(CuUpError::UeLimitReached(self.config.max_nof_ues))?;

        let inactivity_timer = Arc::new(self.timers.create_timer());
        if self.config.ue_inactivity_timer_ms > 0 {
            let tx = self.inactivity_tx.clone();
            inactivity_timer.set(
                Duration::from_millis(self.config.ue_inactivity_timer_ms),
                move || {
                    debug!(%ue_index, "UE inactivity timer expired");
                    // The receiver is gone only while the CU-UP shuts down
                    let _ = tx.send(BearerContextInactivityNotification { ue_index });
                },
            );
            inactivity_timer.run();
        }

        let pdu_session_manager = PduSessionManager::new(
            ue_index,
            self.config.network.clone(),
            self.config.max_pdu_sessions_per_ue,
            Arc::clone(&inactivity_timer),
            self.timers.clone(),
            self.deps.clone(),
        );

        self.ues.insert(
            ue_index,
            UeContext {
                ue_index,
                pdu_session_manager,
                inactivity_timer,
            },
        );
        info!(%ue_index, "UE created ({} active)", self.ues.len());
        Ok(ue_index)
    }

    /// Removes a UE context. Its PDU sessions are released when the
    /// returned context is dropped.
    pub fn remove_ue(&mut self, ue_index: UeIndex) -> Option<UeContext> {
        let Some(ue) = self.ues.remove(&ue_index) else {
            warn!(%ue_index, "Cannot remove unknown UE");
            return None;
        };
        ue.inactivity_timer.stop();
        info!(%ue_index, "UE removed ({} active)", self.ues.len());
        Some(ue)
    }

    /// Looks up a UE context.
    pub fn find_ue(&self, ue_index: UeIndex) -> Option<&UeContext> {
        self.ues.get(&ue_index)
    }

    /// Looks up a UE context mutably.
    pub fn find_ue_mut(&mut self, ue_index: UeIndex) -> Option<&mut UeContext> {
        self.ues.get_mut(&ue_index)
    }

    /// Number of UE contexts.
    pub fn nof_ues(&self) -> usize {
        self.ues.len()
    }

    /// Indexes of all UE contexts, in ascending order.
    pub fn ue_indexes(&self) -> Vec<UeIndex> {
        self.ues.keys().copied().collect()
    }

    fn allocate_ue_index(&self) -> Option<UeIndex> {
        if self.ues.len() >= self.config.max_nof_ues {
            return None;
        }
        (0..self.config.max_nof_ues)
            .map_while(|i| u16::try_from(i).ok())
            .map(UeIndex)
            .find(|index| !self.ues.contains_key(index))
    }
}

impl std::fmt::Debug for UeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UeManager")
            .field("max_nof_ues", &self.config.max_nof_ues)
            .field("ues", &self.ue_indexes())
            .finish()
    }
}
