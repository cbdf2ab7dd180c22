use tokio::sync::watch;

/// Orchestrator lifecycle states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Built,
    Binding,
    Serving,
    Draining,
    Stopped,
}

/// What a shutdown request should do once draining completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// Drain, then re-enter `Binding` on the same address.
    Restart,
    /// Drain, then stop for good.
    Stop,
}

/// Shared lifecycle cell: publishes the current state on a watch channel and
/// accepts shutdown requests.
///
/// Shutdown is a single-shot transition per serve cycle: the first request
/// wins, except that a pending `Restart` can still be upgraded to `Stop`.
/// Repeated requests are no-ops, so re-entrant shutdown paths (such as a
/// close callback firing during drain) cannot recurse.
pub struct Lifecycle {
    state_tx: watch::Sender<LifecycleState>,
    shutdown_tx: watch::Sender<Option<ShutdownKind>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Built);
        let (shutdown_tx, _) = watch::channel(None);
        Self { state_tx, shutdown_tx }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    pub fn is_serving(&self) -> bool {
        self.state() == LifecycleState::Serving
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Wait until the given state is reached (returns immediately if it
    /// already has been).
    pub async fn wait_for(&self, target: LifecycleState) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    pub(crate) fn transition(&self, state: LifecycleState) {
        self.state_tx.send_replace(state);
    }

    /// Request shutdown. Idempotent within a serve cycle.
    pub fn request_shutdown(&self, kind: ShutdownKind) {
        self.shutdown_tx.send_if_modified(|current| match (*current, kind) {
            (None, _) => {
                *current = Some(kind);
                true
            }
            (Some(ShutdownKind::Restart), ShutdownKind::Stop) => {
                *current = Some(ShutdownKind::Stop);
                true
            }
            _ => false,
        });
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<Option<ShutdownKind>> {
        self.shutdown_tx.subscribe()
    }

    /// Re-arm shutdown for the next serve cycle after a restart.
    pub(crate) fn reset_shutdown(&self) {
        self.shutdown_tx.send_replace(None);
    }
}
