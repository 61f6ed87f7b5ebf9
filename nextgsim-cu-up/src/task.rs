//! CU-UP task
//!
//! Runs [`CuUp`] as an actor so that every bearer context procedure
//! executes on one executor context, one after the other. Callers talk to
//! it through a [`CuUpHandle`]; each request carries a oneshot channel for
//! its response.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cu_up::{
    BearerContextModificationRequest, BearerContextModificationResponse,
    BearerContextReleaseCommand, BearerContextReleaseComplete, BearerContextSetupRequest,
    BearerContextSetupResponse, CuUp,
};
use crate::error::{CuUpError, Result};

/// Default capacity of the task's message channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Creates a new message envelope containing the given payload.
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    /// Creates a shutdown signal.
    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }

    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }
}

/// Messages for the CU-UP task.
#[derive(Debug)]
pub enum CuUpMessage {
    /// Bearer context setup
    BearerContextSetup {
        /// Request
        request: BearerContextSetupRequest,
        /// Response channel
        response_tx: oneshot::Sender<BearerContextSetupResponse>,
    },
    /// Bearer context modification
    BearerContextModification {
        /// Request
        request: BearerContextModificationRequest,
        /// Response channel
        response_tx: oneshot::Sender<BearerContextModificationResponse>,
    },
    /// Bearer context release
    BearerContextRelease {
        /// Command
        command: BearerContextReleaseCommand,
        /// Response channel
        response_tx: oneshot::Sender<Result<BearerContextReleaseComplete>>,
    },
    /// Number of active UEs
    NofUes {
        /// Response channel
        response_tx: oneshot::Sender<usize>,
    },
}

/// The CU-UP actor.
pub struct CuUpTask {
    cu_up: CuUp,
    rx: mpsc::Receiver<TaskMessage<CuUpMessage>>,
}

impl CuUpTask {
    /// Creates the task and the handle used to reach it.
    pub fn new(cu_up: CuUp, capacity: usize) -> (Self, CuUpHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { cu_up, rx }, CuUpHandle { tx })
    }

    /// Processes messages until shutdown or until every handle is dropped.
    /// Returns the CU-UP so its final state can be inspected.
    pub async fn run(mut self) -> CuUp {
        info!("CU-UP task started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                TaskMessage::Message(msg) => self.handle_message(msg),
                TaskMessage::Shutdown => {
                    info!("CU-UP task received shutdown signal");
                    break;
                }
            }
        }

        info!("CU-UP task stopped ({} UEs left)", self.cu_up.nof_ues());
        self.cu_up
    }

    fn handle_message(&mut self, msg: CuUpMessage) {
        match msg {
            CuUpMessage::BearerContextSetup {
                request,
                response_tx,
            } => {
                let response = self.cu_up.handle_bearer_context_setup_request(&request);
                reply(response_tx, response);
            }
            CuUpMessage::BearerContextModification {
                request,
                response_tx,
            } => {
                let response = self
                    .cu_up
                    .handle_bearer_context_modification_request(&request);
                reply(response_tx, response);
            }
            CuUpMessage::BearerContextRelease {
                command,
                response_tx,
            } => {
                let response = self.cu_up.handle_bearer_context_release_command(&command);
                reply(response_tx, response);
            }
            CuUpMessage::NofUes { response_tx } => {
                reply(response_tx, self.cu_up.nof_ues());
            }
        }
    }
}

fn reply<T>(response_tx: oneshot::Sender<T>, response: T) {
    if response_tx.send(response).is_err() {
        debug!("Requester dropped before the response was sent");
    }
}

/// Cloneable handle to a running [`CuUpTask`].
#[derive(Debug, Clone)]
pub struct CuUpHandle {
    tx: mpsc::Sender<TaskMessage<CuUpMessage>>,
}

impl CuUpHandle {
    /// Runs a bearer context setup.
    pub async fn bearer_context_setup(
        &self,
        request: BearerContextSetupRequest,
    ) -> Result<BearerContextSetupResponse> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(CuUpMessage::BearerContextSetup {
            request,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| CuUpError::TaskClosed)
    }

    /// Runs a bearer context modification.
    pub async fn bearer_context_modification(
        &self,
        request: BearerContextModificationRequest,
    ) -> Result<BearerContextModificationResponse> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(CuUpMessage::BearerContextModification {
            request,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| CuUpError::TaskClosed)
    }

    /// Runs a bearer context release.
    pub async fn bearer_context_release(
        &self,
        command: BearerContextReleaseCommand,
    ) -> Result<BearerContextReleaseComplete> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(CuUpMessage::BearerContextRelease {
            command,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| CuUpError::TaskClosed)?
    }

    /// Queries the number of active UEs.
    pub async fn nof_ues(&self) -> Result<usize> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(CuUpMessage::NofUes { response_tx }).await?;
        response_rx.await.map_err(|_| CuUpError::TaskClosed)
    }

    /// Asks the task to stop after the messages already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(TaskMessage::shutdown())
            .await
            .map_err(|_| CuUpError::TaskClosed)
    }

    async fn send(&self, msg: CuUpMessage) -> Result<()> {
        self.tx.send(TaskMessage::message(msg)).await.map_err(|_| {
            warn!("CU-UP task is not running");
            CuUpError::TaskClosed
        })
    }
}
