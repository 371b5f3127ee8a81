//! Fleet supervisor: one unit per assignment, restarted independently.
//!
//! Each unit is a tokio task that runs [`GatewaySession`]s one after another
//! for a single credential. A unit only starts the next session after the
//! previous one has closed, so an assignment never has two live connections.
//! Rejection ends the unit for good; cancellation ends every unit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use onliner_core::{Credential, PresenceSpec};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::observer::SessionObserver;
use crate::session::{CloseReason, Disposition, GatewaySession, SessionConfig};
use crate::shutdown::{self, ShutdownHandle, ShutdownListener};
use crate::transport::Connector;

/// One credential paired with the presence it advertises.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub credential: Credential,
    pub presence: PresenceSpec,
}

impl Assignment {
    pub fn new(credential: Credential, presence: PresenceSpec) -> Self {
        Self {
            credential,
            presence,
        }
    }
}

/// Where a unit is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    /// A session is in progress.
    Running { attempt: u32 },
    /// Sleeping before the next attempt.
    Waiting { attempt: u32, delay: Duration },
    /// The gateway refused the credential. Terminal.
    Rejected,
    /// Stopped by shutdown. Terminal.
    Cancelled,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

/// Supervisor bookkeeping for one assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub index: usize,
    pub credential_ref: String,
    pub state: UnitState,
    /// Sessions started so far.
    pub attempts: u32,
    /// Sessions started after a previous one failed.
    pub restarts: u32,
    pub last_reason: Option<CloseReason>,
    /// Last identity the gateway returned for this credential.
    pub identity: Option<String>,
}

impl UnitStatus {
    fn new(index: usize, credential_ref: String) -> Self {
        Self {
            index,
            credential_ref,
            state: UnitState::Waiting {
                attempt: 0,
                delay: Duration::ZERO,
            },
            attempts: 0,
            restarts: 0,
            last_reason: None,
            identity: None,
        }
    }

    /// Identity if known, otherwise the credential reference.
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.credential_ref)
    }
}

type StatusMap = Arc<Mutex<HashMap<usize, UnitStatus>>>;

/// Final state of every unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetReport {
    pub units: Vec<UnitStatus>,
}

impl FleetReport {
    pub fn rejected(&self) -> impl Iterator<Item = &UnitStatus> {
        self.units.iter().filter(|u| u.state == UnitState::Rejected)
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &UnitStatus> {
        self.units.iter().filter(|u| u.state == UnitState::Cancelled)
    }

    pub fn total_restarts(&self) -> u64 {
        self.units.iter().map(|u| u.restarts as u64).sum()
    }
}

/// Starts and owns the units for a fleet.
pub struct SessionSupervisor {
    connector: Arc<dyn Connector>,
    config: Arc<SessionConfig>,
    backoff: BackoffPolicy,
    observer: Arc<dyn SessionObserver>,
}

impl SessionSupervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: SessionConfig,
        backoff: BackoffPolicy,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            connector,
            config: Arc::new(config),
            backoff,
            observer,
        }
    }

    /// Start one unit per assignment. Must be called inside a tokio runtime.
    pub fn spawn(&self, assignments: Vec<Assignment>) -> Fleet {
        let (handle, listener) = shutdown::channel();
        let initial: HashMap<usize, UnitStatus> = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| (i, UnitStatus::new(i, a.credential.fingerprint())))
            .collect();
        let status: StatusMap = Arc::new(Mutex::new(initial));

        tracing::info!(units = assignments.len(), "starting fleet");

        let units = assignments
            .into_iter()
            .enumerate()
            .map(|(index, assignment)| {
                let unit = Unit {
                    index,
                    assignment,
                    connector: self.connector.clone(),
                    config: self.config.clone(),
                    observer: self.observer.clone(),
                    backoff: Backoff::new(self.backoff.clone()),
                    shutdown: listener.clone(),
                    status: status.clone(),
                };
                (index, tokio::spawn(unit.run()))
            })
            .collect();

        Fleet {
            units,
            shutdown: handle,
            status,
        }
    }
}

struct Unit {
    index: usize,
    assignment: Assignment,
    connector: Arc<dyn Connector>,
    config: Arc<SessionConfig>,
    observer: Arc<dyn SessionObserver>,
    backoff: Backoff,
    shutdown: ShutdownListener,
    status: StatusMap,
}

impl Unit {
    async fn update(&self, f: impl FnOnce(&mut UnitStatus)) -> UnitStatus {
        let mut map = self.status.lock().await;
        let entry = map
            .entry(self.index)
            .or_insert_with(|| UnitStatus::new(self.index, self.assignment.credential.fingerprint()));
        f(entry);
        entry.clone()
    }

    async fn run(mut self) -> UnitStatus {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_triggered() {
                return self.update(|s| s.state = UnitState::Cancelled).await;
            }

            attempt += 1;
            self.update(|s| {
                s.attempts = attempt;
                s.state = UnitState::Running { attempt };
            })
            .await;

            let mut session = GatewaySession::new(
                self.assignment.credential.clone(),
                self.assignment.presence.clone(),
                self.config.clone(),
                self.observer.clone(),
            );
            let outcome = session.run(self.connector.as_ref(), &mut self.shutdown).await;

            let reason = outcome.reason;
            let identity = outcome.identity.clone();
            let status = self
                .update(|s| {
                    s.last_reason = Some(reason);
                    if identity.is_some() {
                        s.identity = identity;
                    }
                })
                .await;

            match reason.disposition() {
                Disposition::Reject => {
                    tracing::warn!(
                        unit = self.index,
                        session = %status.label(),
                        "credential rejected, not restarting"
                    );
                    return self.update(|s| s.state = UnitState::Rejected).await;
                }
                Disposition::Stop => {
                    return self.update(|s| s.state = UnitState::Cancelled).await;
                }
                Disposition::Retry => {}
            }

            if outcome.reached_live {
                self.backoff.reset();
            }
            let delay = self.backoff.next_delay();
            tracing::info!(
                unit = self.index,
                session = %status.label(),
                reason = %reason,
                detail = outcome.detail.as_deref().unwrap_or(""),
                delay_ms = delay.as_millis() as u64,
                "session lost, reconnecting"
            );
            self.update(|s| s.state = UnitState::Waiting { attempt, delay }).await;

            if !delay.is_zero() {
                let cancelled = tokio::select! {
                    biased;
                    _ = self.shutdown.triggered() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    return self.update(|s| s.state = UnitState::Cancelled).await;
                }
            }
            self.update(|s| s.restarts += 1).await;
        }
    }
}

/// Handle to a running fleet.
pub struct Fleet {
    units: Vec<(usize, JoinHandle<UnitStatus>)>,
    shutdown: ShutdownHandle,
    status: StatusMap,
}

impl Fleet {
    /// Snapshot of every unit, ordered by assignment index.
    pub async fn status(&self) -> Vec<UnitStatus> {
        let map = self.status.lock().await;
        let mut units: Vec<UnitStatus> = map.values().cloned().collect();
        units.sort_by_key(|u| u.index);
        units
    }

    /// Stop restarting and close every live connection.
    pub fn cancel(&self) {
        tracing::info!("cancelling fleet");
        self.shutdown.trigger();
    }

    /// A handle that cancels this fleet from elsewhere.
    pub fn canceller(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// True once every unit reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.units.iter().all(|(_, h)| h.is_finished())
    }

    /// Wait for every unit to finish.
    pub async fn wait(self) -> FleetReport {
        let mut units = Vec::with_capacity(self.units.len());
        for (index, handle) in self.units {
            match handle.await {
                Ok(status) => units.push(status),
                Err(e) => {
                    tracing::error!(unit = index, error = %e, "unit task failed");
                    let map = self.status.lock().await;
                    if let Some(status) = map.get(&index) {
                        units.push(status.clone());
                    }
                }
            }
        }
        FleetReport { units }
    }
}
