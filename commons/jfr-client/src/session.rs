use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::RecordingBackend;
use crate::client::CommandChannel;
use crate::config::BackendConfig;
use crate::correlation::IdGenerator;
use crate::error::{ClientError, TransportError};

/// The one backend session shared by every reconciliation of an operator
/// instance. Connects on demand; a guard must be held to issue commands.
pub struct SharedSession {
    cfg: BackendConfig,
    ids: Arc<dyn IdGenerator>,
    cancel: CancellationToken,
    slot: Mutex<Option<CommandChannel>>,
}

impl SharedSession {
    pub fn new(
        cfg: BackendConfig,
        ids: Arc<dyn IdGenerator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            ids,
            cancel,
            slot: Mutex::new(None),
        }
    }

    /// Wait for exclusive use of the session, connecting first if no live
    /// channel exists. The lock is released when the guard drops.
    pub async fn acquire(&self) -> Result<SessionGuard<'_>, ClientError> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            debug!(backend = %self.cfg.url, "no live channel; connecting");
            let channel = CommandChannel::connect(
                &self.cfg,
                self.ids.clone(),
                self.cancel.clone(),
            )
            .await?;
            *slot = Some(channel);
        }
        Ok(SessionGuard { slot })
    }

    /// Whether a connected channel is currently parked in the session.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// Exclusive handle on the shared session for one unit of work.
pub struct SessionGuard<'a> {
    slot: MutexGuard<'a, Option<CommandChannel>>,
}

impl SessionGuard<'_> {
    pub fn channel(&mut self) -> Result<&mut CommandChannel, ClientError> {
        self.slot
            .as_mut()
            .ok_or(ClientError::Transport(TransportError::Closed))
    }

    /// Close and drop the channel; the next `acquire` reconnects and
    /// rediscovers the command base URL.
    pub async fn invalidate(&mut self) {
        if let Some(mut channel) = self.slot.take() {
            channel.close().await;
            info!("command channel discarded; next use reconnects");
        }
    }

    /// Drop the channel when `err` says it cannot be trusted any more.
    pub async fn settle(&mut self, err: &ClientError) {
        if err.invalidates_session() {
            warn!(error = %err, "backend session invalidated");
            self.invalidate().await;
        }
    }
}
