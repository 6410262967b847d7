use crate::domain::{ConnectionStatus, LifecycleState, Ownership};
use crate::ports::RemoteStore;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use shared::{Error, Result};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type ConnectFuture = Shared<BoxFuture<'static, Result<()>>>;

/// In-flight connect attempt, tagged so only the attempt that was awaited gets cleared.
struct PendingConnect {
    attempt: u64,
    future: ConnectFuture,
}

#[derive(Default)]
struct StartGate {
    attempts: u64,
    pending: Option<PendingConnect>,
}

/// Control plane: owns the start/stop/readiness lifecycle around a remote store handle
pub struct Connection<S: RemoteStore> {
    client: Arc<S>,
    ownership: Ownership,
    gate: Mutex<StartGate>,
}

impl<S: RemoteStore> Connection<S> {
    /// Wrap a caller-owned handle. `stop()` will leave it open.
    pub fn borrowed(client: Arc<S>) -> Self {
        Self::with_ownership(client, Ownership::Borrowed)
    }

    /// Take ownership of a handle. `stop()` disconnects it.
    pub fn owned(client: S) -> Self {
        Self::with_ownership(Arc::new(client), Ownership::Owned)
    }

    fn with_ownership(client: Arc<S>, ownership: Ownership) -> Self {
        Self {
            client,
            ownership,
            gate: Mutex::new(StartGate::default()),
        }
    }

    pub fn client(&self) -> &Arc<S> {
        &self.client
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn status(&self) -> ConnectionStatus {
        self.client.status()
    }

    pub fn state(&self) -> LifecycleState {
        self.status().into()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ConnectionStatus::Ready
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Connect the handle if it has never been connected.
    ///
    /// Concurrent callers share a single connect attempt and all observe its
    /// outcome. Any status other than `wait` makes this a no-op.
    pub async fn start(&self) -> Result<()> {
        let (attempt, connect) = {
            let mut gate = self.gate.lock().await;
            match gate.pending.as_ref() {
                Some(pending) => (pending.attempt, pending.future.clone()),
                None => {
                    let status = self.client.status();
                    if status != ConnectionStatus::Wait {
                        debug!("Remote store status is '{}', skipping connect", status);
                        return Ok(());
                    }

                    gate.attempts += 1;
                    let attempt = gate.attempts;
                    let client = Arc::clone(&self.client);
                    let future = async move { client.connect().await }.boxed().shared();
                    gate.pending = Some(PendingConnect {
                        attempt,
                        future: future.clone(),
                    });

                    info!("Connecting to remote store (attempt {})", attempt);
                    (attempt, future)
                }
            }
        };

        let result = connect.await;

        {
            let mut gate = self.gate.lock().await;
            if gate.pending.as_ref().is_some_and(|p| p.attempt == attempt) {
                gate.pending = None;
            }
        }

        match &result {
            Ok(()) => debug!("Remote store connection attempt {} settled", attempt),
            Err(e) => warn!("Remote store connection attempt {} failed: {}", attempt, e),
        }

        result
    }

    /// Tear the connection down if this adapter owns it.
    pub async fn stop(&self) -> Result<()> {
        match self.ownership {
            Ownership::Borrowed => {
                debug!("Remote store connection is caller-owned, leaving it open");
                Ok(())
            }
            Ownership::Owned if self.state() == LifecycleState::Closed => Ok(()),
            Ownership::Owned => {
                info!("Disconnecting owned remote store connection");
                self.client.disconnect().await
            }
        }
    }
}

impl<S: RemoteStore> Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status())
            .field("ownership", &self.ownership)
            .finish()
    }
}
