//! Credential-reset servicing.
//!
//! The door controller never talks to the network stack directly: when the
//! repeat-gesture counter fires it sends a provisioning message, and the
//! task here invokes the store behind the [`CredentialStore`] seam. The
//! real store wipes stored credentials and restarts pairing; the simulated
//! one just counts invocations.

use latchkey_fabric::{Inbox, RecvWait};
use latchkey_types::{ChannelError, Message, ProvisioningCommand};
use tracing::{debug, info, warn};

use crate::broker::TransportError;

/// Storage of the device's network credentials.
pub trait CredentialStore: Send {
    /// Forget stored credentials and restart pairing.
    fn clear_credentials(&mut self) -> Result<(), TransportError>;
}

/// In-process store for tests and headless runs.
#[derive(Default)]
pub struct SimCredentialStore {
    clears: usize,
}

impl SimCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times credentials have been cleared.
    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl CredentialStore for SimCredentialStore {
    fn clear_credentials(&mut self) -> Result<(), TransportError> {
        self.clears += 1;
        info!("credentials cleared (simulated)");
        Ok(())
    }
}

/// Consumer loop for the provisioning channel.
pub async fn run_provisioning(mut store: Box<dyn CredentialStore>, mut inbox: Inbox) {
    info!("provisioning task started");
    loop {
        match inbox.recv(RecvWait::Forever).await {
            Ok(Message::Provisioning(ProvisioningCommand::ClearCredentials)) => {
                info!("clearing stored credentials");
                if let Err(err) = store.clear_credentials() {
                    warn!(%err, "credential clear failed");
                }
            }
            Ok(other) => {
                debug!(?other, "message not addressed to provisioning, ignoring");
            }
            Err(ChannelError::InvalidChannel) => {
                warn!("provisioning channel closed, stopping task");
                break;
            }
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_fabric::{ChannelId, Fabric, SendWait};
    use std::sync::{Arc, Mutex};

    /// Store double sharing its clear count with the test.
    #[derive(Clone, Default)]
    struct SharedStore(Arc<Mutex<SimCredentialStore>>);

    impl CredentialStore for SharedStore {
        fn clear_credentials(&mut self) -> Result<(), TransportError> {
            self.0.lock().unwrap().clear_credentials()
        }
    }

    #[tokio::test]
    async fn clear_request_invokes_the_store_once() {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        let store = SharedStore::default();
        let task = tokio::spawn(run_provisioning(
            Box::new(store.clone()),
            inboxes.provisioning,
        ));

        fabric
            .send(
                ChannelId::Provisioning,
                Message::Provisioning(ProvisioningCommand::ClearCredentials),
                SendWait::NoWait,
            )
            .await
            .unwrap();

        for _ in 0..100 {
            if store.0.lock().unwrap().clears() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.0.lock().unwrap().clears(), 1);
        task.abort();
    }

    #[tokio::test]
    async fn unrelated_messages_do_not_clear() {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        let store = SharedStore::default();
        let task = tokio::spawn(run_provisioning(
            Box::new(store.clone()),
            inboxes.provisioning,
        ));

        fabric
            .send(
                ChannelId::Provisioning,
                Message::StatusUpdate { is_open: true },
                SendWait::NoWait,
            )
            .await
            .unwrap();

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(store.0.lock().unwrap().clears(), 0);
        task.abort();
    }
}
