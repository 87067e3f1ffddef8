//! Process-wide mapping from session id to channel

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::{mpsc, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{Channel, ChannelState, CloseReason, SessionEvent, SessionId};
use crate::error::{McpError, McpResult};

/// Number of closed session ids remembered for diagnostics
const RETIRED_CAPACITY: usize = 4096;

/// Result of removing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The session was open and is now gone
    Removed,
    /// The id was issued here but the session is already closed
    AlreadyClosed,
    /// The id was never issued (or is too old to remember)
    Unknown,
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<SessionId, Arc<Channel>>,
    retired: HashSet<SessionId>,
    retired_order: VecDeque<SessionId>,
}

impl RegistryState {
    fn retire(&mut self, session_id: SessionId) {
        if self.retired.insert(session_id.clone()) {
            self.retired_order.push_back(session_id);
        }
        while self.retired_order.len() > RETIRED_CAPACITY {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }

    fn take(&mut self, session_id: &str) -> Result<Arc<Channel>, RemoveOutcome> {
        match self.active.remove_entry(session_id) {
            Some((key, channel)) => {
                self.retire(key);
                Ok(channel)
            }
            None if self.retired.contains(session_id) => Err(RemoveOutcome::AlreadyClosed),
            None => Err(RemoveOutcome::Unknown),
        }
    }
}

/// Session registry. Owned by the router and shared through `Arc`.
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create an empty registry and the receiver for its lifecycle events
    pub fn new(max_sessions: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            state: RwLock::new(RegistryState::default()),
            events,
            max_sessions,
        });
        (registry, receiver)
    }

    /// Sender channels use to report lifecycle events
    pub fn event_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events.clone()
    }

    /// Bind a fresh id to an initializing channel and register it
    pub async fn create(&self, channel: Arc<Channel>) -> McpResult<SessionId> {
        let mut state = self.state.write().await;
        if state.active.len() >= self.max_sessions {
            warn!(max_sessions = self.max_sessions, "Session capacity exhausted");
            return Err(McpError::ConnectionSetup {
                message: format!("session capacity of {} reached", self.max_sessions),
            });
        }

        let session_id = loop {
            let candidate = SessionId::generate();
            if !state.active.contains_key(&candidate) && !state.retired.contains(&candidate) {
                break candidate;
            }
        };

        if !channel.activate(session_id.clone()) {
            return Err(McpError::ConnectionSetup {
                message: "channel is not awaiting initialization".to_string(),
            });
        }
        state.active.insert(session_id.clone(), channel);
        Ok(session_id)
    }

    /// Resolve an id to its channel; closed channels are never returned
    pub async fn lookup(&self, session_id: &str) -> Option<Arc<Channel>> {
        let state = self.state.read().await;
        state
            .active
            .get(session_id)
            .filter(|channel| channel.state() == ChannelState::Active)
            .cloned()
    }

    /// Drop the entry for `session_id`, closing the channel if still open
    pub async fn remove(&self, session_id: &str) -> RemoveOutcome {
        self.close(session_id, CloseReason::ClientRequested).await
    }

    /// Close the channel and remove its entry
    pub async fn close(&self, session_id: &str, reason: CloseReason) -> RemoveOutcome {
        let mut state = self.state.write().await;
        match state.take(session_id) {
            Ok(channel) => {
                channel.close(reason);
                RemoveOutcome::Removed
            }
            Err(outcome) => outcome,
        }
    }

    /// Close every open session, returning how many were closed
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let mut state = self.state.write().await;
        let drained: Vec<(SessionId, Arc<Channel>)> = state.active.drain().collect();
        let count = drained.len();
        for (session_id, channel) in drained {
            channel.close(reason);
            state.retire(session_id);
        }
        if count > 0 {
            info!(count, %reason, "Closed all sessions");
        }
        count
    }

    /// Close sessions idle for at least `idle_timeout`, sparing those with a
    /// live push stream or a request still in progress
    pub async fn expire_idle(&self, idle_timeout: Duration) -> Vec<SessionId> {
        let mut state = self.state.write().await;
        let expired: Vec<SessionId> = state
            .active
            .iter()
            .filter(|(_, channel)| channel.is_expirable(idle_timeout))
            .map(|(session_id, _)| session_id.clone())
            .collect();

        for session_id in &expired {
            if let Ok(channel) = state.take(session_id.as_str()) {
                channel.close(CloseReason::Expired);
            }
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.active.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.active.is_empty()
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.state.read().await.active.keys().cloned().collect()
    }

    /// Apply a lifecycle event. Closed channels lose their entry.
    pub async fn apply_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Created { session_id } => {
                debug!(session_id = %session_id, "Session registered");
            }
            SessionEvent::Closed { session_id, reason } => {
                let mut state = self.state.write().await;
                let still_mapped = state
                    .active
                    .get(session_id.as_str())
                    .is_some_and(|channel| channel.state() == ChannelState::Closed);
                if still_mapped {
                    let _ = state.take(session_id.as_str());
                    debug!(session_id = %session_id, %reason, "Reaped closed session");
                }
            }
        }
    }

    /// Spawn the task that removes entries of channels closed out of band.
    ///
    /// Holds the registry weakly and exits once it is dropped.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.apply_event(event).await;
            }
            debug!("Session reaper stopped");
        })
    }

    /// Spawn the periodic idle-session sweeper. A zero `idle_timeout` or
    /// `interval` disables expiry and nothing is spawned.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        idle_timeout: Duration,
        interval: Duration,
    ) -> Option<JoinHandle<()>> {
        if idle_timeout.is_zero() || interval.is_zero() {
            debug!("Idle session expiry disabled");
            return None;
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let expired = registry.expire_idle(idle_timeout).await;
                if !expired.is_empty() {
                    info!(count = expired.len(), "Expired idle sessions");
                }
            }
            debug!("Session sweeper stopped");
        }))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}
