use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

use crate::config::IceServerDescriptor;
use crate::error::FailureReason;
use crate::peer::IceCandidate;
use crate::resolver::SignalingEndpoints;

/// Negotiation role. Only the viewer side is implemented; the viewer always
/// initiates the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Viewer,
}

/// Session lifecycle. States are only ever entered once, in graph order;
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Resolving,
    ConnectingSignaling,
    Negotiating,
    Connected,
    Closed,
    Failed(FailureReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }

    fn rank(&self) -> u8 {
        match self {
            SessionState::Init => 0,
            SessionState::Resolving => 1,
            SessionState::ConnectingSignaling => 2,
            SessionState::Negotiating => 3,
            SessionState::Connected => 4,
            SessionState::Closed => 5,
            SessionState::Failed(_) => 6,
        }
    }

    /// Forward-only progression: a state is never re-entered, and nothing
    /// follows a terminal state.
    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            SessionState::Closed | SessionState::Failed(_) => true,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

fn session_id() -> String {
    format!("viewer-{}", hex::encode(rand::rng().random::<[u8; 8]>()))
}

/// One connection attempt. Mutated only by the orchestrator in response to
/// signaling events and peer callbacks.
pub struct Session {
    pub id: String,
    pub role: Role,
    pub state: SessionState,
    pub endpoints: Option<SignalingEndpoints>,
    pub ice_servers: Vec<IceServerDescriptor>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    local_description: Option<String>,
    remote_description: Option<String>,
    pending_local: VecDeque<IceCandidate>,
    pending_remote: VecDeque<IceCandidate>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: session_id(),
            role: Role::Viewer,
            state: SessionState::Init,
            endpoints: None,
            ice_servers: Vec::new(),
            created_at: Utc::now(),
            closed_at: None,
            local_description: None,
            remote_description: None,
            pending_local: VecDeque::new(),
            pending_remote: VecDeque::new(),
        }
    }

    /// Advance the state machine. Returns false (and leaves the state alone)
    /// when the transition would revisit or leave a terminal state.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_advance_to(&next) {
            warn!(session = %self.id, from = ?self.state, to = ?next, "rejected state transition");
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.closed_at = Some(Utc::now());
        }
        true
    }

    /// Record the local description; set at most once.
    pub fn set_local_description(&mut self, sdp: String) -> bool {
        if self.local_description.is_some() {
            return false;
        }
        self.local_description = Some(sdp);
        true
    }

    /// Record the remote description; set at most once.
    pub fn set_remote_description(&mut self, sdp: String) -> bool {
        if self.remote_description.is_some() {
            return false;
        }
        self.remote_description = Some(sdp);
        true
    }

    pub fn local_description(&self) -> Option<&str> {
        self.local_description.as_deref()
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description.is_some()
    }

    /// Queue a local candidate generated before the channel opened.
    pub fn queue_local_candidate(&mut self, candidate: IceCandidate) {
        self.pending_local.push_back(candidate);
    }

    /// Drain queued local candidates in generation order.
    pub fn drain_local_candidates(&mut self) -> Vec<IceCandidate> {
        self.pending_local.drain(..).collect()
    }

    /// Queue a remote candidate that arrived before the answer.
    pub fn queue_remote_candidate(&mut self, candidate: IceCandidate) {
        self.pending_remote.push_back(candidate);
    }

    /// Drain queued remote candidates in arrival order.
    pub fn drain_remote_candidates(&mut self) -> Vec<IceCandidate> {
        self.pending_remote.drain(..).collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_progress_forward_only() {
        let mut session = Session::new();
        assert_eq!(session.state, SessionState::Init);
        assert!(session.transition(SessionState::Resolving));
        assert!(session.transition(SessionState::ConnectingSignaling));
        // skipping ahead is rejected
        assert!(!session.transition(SessionState::Connected));
        // going back is rejected
        assert!(!session.transition(SessionState::Resolving));
        assert!(session.transition(SessionState::Negotiating));
        assert!(session.transition(SessionState::Connected));
        assert!(session.transition(SessionState::Closed));
        assert!(session.closed_at.is_some());
        // nothing leaves a terminal state
        assert!(!session.transition(SessionState::Failed(FailureReason::SignalingLost)));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        for prepare in 0..5 {
            let mut session = Session::new();
            let path = [
                SessionState::Resolving,
                SessionState::ConnectingSignaling,
                SessionState::Negotiating,
                SessionState::Connected,
            ];
            for state in path.iter().take(prepare) {
                assert!(session.transition(*state));
            }
            assert!(session.transition(SessionState::Failed(FailureReason::SignalingLost)));
            assert!(session.state.is_terminal());
        }
    }

    #[test]
    fn descriptions_are_set_at_most_once() {
        let mut session = Session::new();
        assert!(session.set_local_description("v=0 offer".into()));
        assert!(!session.set_local_description("v=0 other".into()));
        assert_eq!(session.local_description(), Some("v=0 offer"));

        assert!(session.set_remote_description("v=0 answer".into()));
        assert!(!session.set_remote_description("v=0 other".into()));
        assert!(session.remote_description_set());
    }

    #[test]
    fn candidate_queues_preserve_order() {
        let mut session = Session::new();
        for i in 0..3 {
            session.queue_local_candidate(IceCandidate {
                candidate: format!("candidate:{i}"),
                sdp_mid: None,
                sdp_mline_index: None,
            });
        }
        let drained = session.drain_local_candidates();
        let order: Vec<_> = drained.iter().map(|c| c.candidate.as_str()).collect();
        assert_eq!(order, ["candidate:0", "candidate:1", "candidate:2"]);
        assert!(session.drain_local_candidates().is_empty());
    }

    #[test]
    fn session_ids_are_viewer_scoped_and_unique() {
        let a = Session::new();
        let b = Session::new();
        assert!(a.id.starts_with("viewer-"));
        assert_ne!(a.id, b.id);
    }
}
