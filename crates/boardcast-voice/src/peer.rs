//! Peer link state: one entry per remote voice participant.

use boardcast_core::protocol::{IceCandidateInit, SessionDescription};
use serde::{Deserialize, Serialize};

/// Connection lifecycle of a peer link.
///
/// `Disconnected` is an observed platform transition, not a resting state:
/// the supervisor treats it like `Failed` and rebuilds the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Offer-glare resolution: participant ids are totally ordered and the
/// smaller side always initiates, so both sides converge on one link.
pub fn is_initiator(local_id: &str, remote_id: &str) -> bool {
    local_id < remote_id
}

/// Signaling and media state associated with one remote participant.
///
/// Exactly one link exists per remote participant; closing it tears down
/// the participant's media.
#[derive(Debug, Clone)]
pub struct PeerLink {
    participant: String,
    state: LinkState,
    initiator: bool,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    /// Candidates that arrived before the remote description; flushed in
    /// arrival order once it is applied.
    pending_candidates: Vec<IceCandidateInit>,
}

impl PeerLink {
    pub fn new(participant: impl Into<String>, initiator: bool) -> Self {
        Self {
            participant: participant.into(),
            state: LinkState::New,
            initiator,
            local_description: None,
            remote_description: None,
            pending_candidates: Vec::new(),
        }
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description.is_some()
    }

    pub fn set_local_description(&mut self, description: SessionDescription) {
        self.local_description = Some(description);
    }

    /// Apply the remote description and drain candidates that were buffered
    /// while it was missing, in arrival order.
    pub fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Vec<IceCandidateInit> {
        self.remote_description = Some(description);
        std::mem::take(&mut self.pending_candidates)
    }

    /// Hold a candidate that arrived ahead of the remote description.
    pub fn buffer_candidate(&mut self, candidate: IceCandidateInit) {
        self.pending_candidates.push(candidate);
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Whether the supervisor should tear this link down and rebuild it.
    pub fn needs_restart(&self) -> bool {
        matches!(self.state, LinkState::Failed | LinkState::Disconnected)
    }
}
