//! Voice session management.
//!
//! [`VoiceSessionManager`] owns local capture state, the peer-link map,
//! offer/answer role negotiation and reconnection. It is a state machine:
//! operations and incoming events mutate it synchronously, side effects
//! leave as queued [`MediaCommand`]s (for the platform media driver) and
//! [`Payload`]s (for the signaling channel). Media completions re-enter via
//! [`VoiceSessionManager::handle_media`] carrying the session epoch they
//! were issued under; completions from a torn-down session are discarded.

use crate::error::VoiceError;
use crate::media::{CaptureConstraints, MediaCommand, MediaEvent, RtcConfig};
use crate::peer::{LinkState, PeerLink, is_initiator};
use crate::sdp::boost_audio_quality;
use boardcast_core::protocol::{Payload, SdpKind, SessionDescription};
use std::collections::HashMap;

/// Interval at which the embedder should drive the reconnection supervisor
/// ([`VoiceSessionManager::tick`]).
pub const SUPERVISOR_INTERVAL_SECS: u64 = 10;

/// Lifecycle of the local audio capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Requesting,
    Active,
    /// Terminal for this session: denial is reported once and not retried.
    Denied,
}

/// Role of a participant relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    Local,
    Remote,
}

/// Snapshot of one room participant for the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub role: ParticipantRole,
    /// Remote mute state is not carried by the protocol; only the local
    /// participant reports a live value here.
    pub mic_enabled: bool,
    pub connection_state: LinkState,
}

/// Playback sink bookkeeping for one remote participant.
#[derive(Debug, Clone, Copy, Default)]
struct PlaybackSink {
    needs_resume: bool,
}

/// The voice session: local capture, peer links, and negotiation state.
///
/// Created per join and torn down on leave; callers hold it by handle and
/// inject the signaling channel and media driver at the edges.
pub struct VoiceSessionManager {
    local_id: String,
    room: Option<String>,
    /// Bumped on every join and leave; media completions carrying an older
    /// epoch belong to a torn-down session and are dropped.
    epoch: u64,
    capture: CaptureState,
    mic_enabled: bool,
    remote_audio_enabled: bool,
    volume: f64,
    constraints: CaptureConstraints,
    rtc_config: RtcConfig,
    peers: HashMap<String, PeerLink>,
    sinks: HashMap<String, PlaybackSink>,
    commands: Vec<MediaCommand>,
    outgoing: Vec<Payload>,
    reports: Vec<VoiceError>,
}

impl VoiceSessionManager {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self::with_config(local_id, CaptureConstraints::default(), RtcConfig::default())
    }

    pub fn with_config(
        local_id: impl Into<String>,
        constraints: CaptureConstraints,
        rtc_config: RtcConfig,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            room: None,
            epoch: 0,
            capture: CaptureState::Inactive,
            mic_enabled: false,
            remote_audio_enabled: true,
            volume: 1.0,
            constraints,
            rtc_config,
            peers: HashMap::new(),
            sinks: HashMap::new(),
            commands: Vec::new(),
            outgoing: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Current session epoch; the media driver stamps completions with it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture
    }

    pub fn microphone_enabled(&self) -> bool {
        self.mic_enabled
    }

    pub fn remote_audio_enabled(&self) -> bool {
        self.remote_audio_enabled
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn peer_state(&self, peer: &str) -> Option<LinkState> {
        self.peers.get(peer).map(|link| link.state())
    }

    /// Everyone in the voice room, local participant first.
    pub fn participants(&self) -> Vec<Participant> {
        let mut all = vec![Participant {
            id: self.local_id.clone(),
            role: ParticipantRole::Local,
            mic_enabled: self.mic_enabled,
            connection_state: match self.capture {
                CaptureState::Active => LinkState::Connected,
                _ => LinkState::New,
            },
        }];

        for link in self.peers.values() {
            all.push(Participant {
                id: link.participant().to_string(),
                role: ParticipantRole::Remote,
                mic_enabled: false,
                connection_state: link.state(),
            });
        }
        all
    }

    // --- Operations ---

    /// Join a voice room: acquire capture (tracks start muted), then
    /// announce presence once the capture completion arrives.
    pub fn join(&mut self, room: &str) {
        if self.room.is_some() {
            self.leave();
        }

        self.epoch += 1;
        self.room = Some(room.to_string());
        self.capture = CaptureState::Requesting;
        self.mic_enabled = false;
        self.commands.push(MediaCommand::AcquireCapture {
            constraints: self.constraints.clone(),
        });
        log::info!("joining voice room {room}");
    }

    /// Leave the room: close every peer link, release capture, remove
    /// playback sinks and announce departure.
    pub fn leave(&mut self) {
        let Some(room) = self.room.take() else {
            return;
        };

        for peer in self.peers.keys() {
            self.commands.push(MediaCommand::CloseLink { peer: peer.clone() });
        }
        self.peers.clear();

        for peer in self.sinks.keys() {
            self.commands.push(MediaCommand::RemoveSink { peer: peer.clone() });
        }
        self.sinks.clear();

        if self.capture != CaptureState::Inactive {
            self.commands.push(MediaCommand::ReleaseCapture);
        }
        self.capture = CaptureState::Inactive;
        self.mic_enabled = false;

        self.outgoing.push(Payload::Leave { room: room.clone() });
        self.epoch += 1;
        log::info!("left voice room {room}");
    }

    /// Toggle the local microphone. Returns the new enabled state; stays
    /// disabled while no capture stream is active.
    pub fn toggle_microphone(&mut self) -> bool {
        if self.capture != CaptureState::Active {
            log::warn!("microphone toggle ignored: no active capture");
            return false;
        }

        self.mic_enabled = !self.mic_enabled;
        self.commands.push(MediaCommand::SetCaptureEnabled {
            enabled: self.mic_enabled,
        });
        self.mic_enabled
    }

    /// Toggle all remote playback. Returns the new enabled state.
    pub fn toggle_remote_audio(&mut self) -> bool {
        self.remote_audio_enabled = !self.remote_audio_enabled;
        self.commands.push(MediaCommand::SetSinksMuted {
            muted: !self.remote_audio_enabled,
        });
        self.remote_audio_enabled
    }

    /// Set playback volume, clamped to [0, 1]. Returns the applied value.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        self.volume = volume.clamp(0.0, 1.0);
        self.commands.push(MediaCommand::SetSinkVolume {
            volume: self.volume,
        });
        self.volume
    }

    /// Retry playback for a sink previously blocked by autoplay policy.
    /// Returns whether a retry was issued.
    pub fn resume_playback(&mut self, peer: &str) -> bool {
        match self.sinks.get_mut(peer) {
            Some(sink) if sink.needs_resume => {
                sink.needs_resume = false;
                self.commands.push(MediaCommand::ResumeSink {
                    peer: peer.to_string(),
                });
                true
            }
            _ => false,
        }
    }

    // --- Incoming signaling ---

    /// Apply one payload received from the signaling channel.
    pub fn handle_signal(&mut self, payload: Payload) {
        if self.room.is_none() {
            log::debug!("dropping signaling payload: no active voice session");
            return;
        }

        match payload {
            Payload::PeerJoined { user_id } => {
                if user_id == self.local_id {
                    return;
                }
                log::info!("peer joined voice room: {user_id}");
                self.open_link(&user_id);
            }
            Payload::Offer {
                target_user_id,
                user_id,
                offer,
                ..
            } => {
                if target_user_id != self.local_id {
                    return;
                }
                self.apply_offer(&user_id, offer);
            }
            Payload::Answer {
                target_user_id,
                user_id,
                answer,
                ..
            } => {
                if target_user_id != self.local_id {
                    return;
                }
                self.apply_remote_description(&user_id, answer);
            }
            Payload::IceCandidate {
                target_user_id,
                user_id,
                candidate,
                ..
            } => {
                if target_user_id != self.local_id {
                    return;
                }
                // Candidates may legitimately beat both the remote
                // description and the peer-joined notification; reuse or
                // create the link and buffer until the description lands.
                if !self.peers.contains_key(&user_id) {
                    self.open_link(&user_id);
                }
                let link = match self.peers.get_mut(&user_id) {
                    Some(link) => link,
                    None => return,
                };
                if link.has_remote_description() {
                    self.commands.push(MediaCommand::AddIceCandidate {
                        peer: user_id,
                        candidate,
                    });
                } else {
                    link.buffer_candidate(candidate);
                }
            }
            Payload::PeerLeft { user_id } => {
                log::info!("peer left voice room: {user_id}");
                self.close_link(&user_id);
            }
            // Join/Leave echoes and drawing payloads are not this
            // subsystem's concern.
            _ => {}
        }
    }

    // --- Media completions ---

    /// Apply one completion from the platform media driver.
    ///
    /// Completions carrying a stale epoch were issued before a leave() and
    /// must not mutate the current session.
    pub fn handle_media(&mut self, event: MediaEvent) {
        if event.epoch() != self.epoch {
            log::debug!("discarding stale media completion: {event:?}");
            return;
        }

        match event {
            MediaEvent::CaptureReady { .. } => {
                self.capture = CaptureState::Active;
                // Tracks start disabled: presence in the room does not mean
                // the microphone is live.
                self.commands
                    .push(MediaCommand::SetCaptureEnabled { enabled: false });
                if let Some(room) = &self.room {
                    self.outgoing.push(Payload::Join { room: room.clone() });
                }
            }
            MediaEvent::CaptureDenied { reason, .. } => {
                self.capture = CaptureState::Denied;
                log::error!("audio capture denied: {reason}");
                self.reports.push(VoiceError::DeviceAccessDenied(reason));
            }
            MediaEvent::OfferCreated { peer, sdp, .. } => {
                self.apply_local_description(&peer, SdpKind::Offer, sdp);
            }
            MediaEvent::AnswerCreated { peer, sdp, .. } => {
                self.apply_local_description(&peer, SdpKind::Answer, sdp);
            }
            MediaEvent::IceCandidateGathered {
                peer, candidate, ..
            } => {
                // Forwarded immediately; buffering is the receiver's job.
                if let Some(room) = &self.room {
                    self.outgoing.push(Payload::IceCandidate {
                        target_user_id: peer,
                        user_id: self.local_id.clone(),
                        candidate,
                        room: room.clone(),
                    });
                }
            }
            MediaEvent::LinkStateChanged { peer, state, .. } => {
                if let Some(link) = self.peers.get_mut(&peer) {
                    link.set_state(state);
                    if state == LinkState::Failed {
                        log::warn!("peer connection to {peer} failed; supervisor will rebuild");
                        self.reports.push(VoiceError::PeerConnectionFailed { peer });
                    }
                }
            }
            MediaEvent::RemoteTrack { peer, .. } => {
                log::info!("remote track from {peer}");
                self.sinks.insert(peer.clone(), PlaybackSink::default());
                self.commands.push(MediaCommand::AttachSink {
                    peer,
                    volume: self.volume,
                    muted: !self.remote_audio_enabled,
                });
            }
            MediaEvent::AutoplayBlocked { peer, .. } => {
                log::warn!("autoplay blocked for {peer}; exposing resume affordance");
                self.sinks.entry(peer.clone()).or_default().needs_resume = true;
                self.reports.push(VoiceError::AutoplayBlocked(peer));
            }
        }
    }

    // --- Supervision ---

    /// Reconnection supervisor pass: rebuild every link observed in a
    /// failed or disconnected state, re-issuing the offer when this side
    /// was the original initiator. Runs unbounded for the session lifetime.
    pub fn tick(&mut self) {
        let stale: Vec<String> = self
            .peers
            .values()
            .filter(|link| link.needs_restart())
            .map(|link| link.participant().to_string())
            .collect();

        for peer in stale {
            log::warn!("rebuilding link to {peer}");
            self.commands.push(MediaCommand::CloseLink { peer: peer.clone() });
            self.peers.remove(&peer);
            self.open_link(&peer);
        }
    }

    // --- Queue draining ---

    /// Drain queued instructions for the platform media driver.
    pub fn take_commands(&mut self) -> Vec<MediaCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Drain queued payloads for the signaling channel.
    pub fn take_outgoing(&mut self) -> Vec<Payload> {
        std::mem::take(&mut self.outgoing)
    }

    /// Drain reported statuses for the embedding UI.
    pub fn take_reports(&mut self) -> Vec<VoiceError> {
        std::mem::take(&mut self.reports)
    }

    // --- Internals ---

    /// Create (or replace) the link for `peer`; the smaller id under the
    /// total order initiates the offer.
    fn open_link(&mut self, peer: &str) {
        if self.peers.contains_key(peer) {
            self.commands.push(MediaCommand::CloseLink {
                peer: peer.to_string(),
            });
        }

        let initiator = is_initiator(&self.local_id, peer);
        self.peers
            .insert(peer.to_string(), PeerLink::new(peer, initiator));
        self.commands.push(MediaCommand::OpenLink {
            peer: peer.to_string(),
            config: self.rtc_config.clone(),
        });

        if initiator {
            self.commands.push(MediaCommand::CreateOffer {
                peer: peer.to_string(),
            });
        }
    }

    fn close_link(&mut self, peer: &str) {
        if self.peers.remove(peer).is_some() {
            self.commands.push(MediaCommand::CloseLink {
                peer: peer.to_string(),
            });
        }
        if self.sinks.remove(peer).is_some() {
            self.commands.push(MediaCommand::RemoveSink {
                peer: peer.to_string(),
            });
        }
    }

    /// Incoming offer: reuse or create the link, apply the description,
    /// flush buffered candidates, and start the answer.
    fn apply_offer(&mut self, peer: &str, offer: SessionDescription) {
        if !self.peers.contains_key(peer) {
            self.open_link(peer);
        }
        self.apply_remote_description(peer, offer);
        if self.peers.contains_key(peer) {
            self.commands.push(MediaCommand::CreateAnswer {
                peer: peer.to_string(),
            });
        }
    }

    fn apply_remote_description(&mut self, peer: &str, description: SessionDescription) {
        let Some(link) = self.peers.get_mut(peer) else {
            log::warn!("description from {peer} without a link; dropping");
            return;
        };

        let buffered = link.set_remote_description(description.clone());
        link.set_state(LinkState::Connecting);
        self.commands.push(MediaCommand::SetRemoteDescription {
            peer: peer.to_string(),
            description,
        });
        // Candidates held back while the description was missing go out in
        // arrival order, after it.
        for candidate in buffered {
            self.commands.push(MediaCommand::AddIceCandidate {
                peer: peer.to_string(),
                candidate,
            });
        }
    }

    /// A locally produced description: mutate for quality, set it locally,
    /// and send it to the addressed peer.
    fn apply_local_description(&mut self, peer: &str, kind: SdpKind, sdp: String) {
        let Some(room) = self.room.clone() else {
            return;
        };
        let Some(link) = self.peers.get_mut(peer) else {
            log::warn!("local description for unknown peer {peer}; dropping");
            return;
        };

        let description = SessionDescription {
            kind,
            sdp: boost_audio_quality(&sdp),
        };
        link.set_local_description(description.clone());
        link.set_state(LinkState::Connecting);
        self.commands.push(MediaCommand::SetLocalDescription {
            peer: peer.to_string(),
            description: description.clone(),
        });

        let payload = match kind {
            SdpKind::Offer => Payload::Offer {
                target_user_id: peer.to_string(),
                user_id: self.local_id.clone(),
                offer: description,
                room,
            },
            SdpKind::Answer => Payload::Answer {
                target_user_id: peer.to_string(),
                user_id: self.local_id.clone(),
                answer: description,
                room,
            },
        };
        self.outgoing.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcast_core::protocol::IceCandidateInit;

    const SDP: &str = "v=0\r\na=mid:audio\r\na=fmtp:111 minptime=10\r\n";

    fn joined(id: &str) -> VoiceSessionManager {
        let mut session = VoiceSessionManager::new(id);
        session.join("board-7");
        let epoch = session.epoch();
        session.handle_media(MediaEvent::CaptureReady { epoch });
        session.take_commands();
        session.take_outgoing();
        session
    }

    fn candidate(tag: &str) -> IceCandidateInit {
        IceCandidateInit {
            candidate: tag.to_string(),
            sdp_mid: Some("audio".to_string()),
            sdp_m_line_index: Some(0),
        }
    }

    #[test]
    fn test_join_acquires_capture_before_announcing() {
        let mut session = VoiceSessionManager::new("a1");
        session.join("board-7");

        let commands = session.take_commands();
        assert!(matches!(
            commands[0],
            MediaCommand::AcquireCapture { .. }
        ));
        // Presence is announced only once capture is granted.
        assert!(session.take_outgoing().is_empty());

        let epoch = session.epoch();
        session.handle_media(MediaEvent::CaptureReady { epoch });

        assert_eq!(session.capture_state(), CaptureState::Active);
        assert_eq!(
            session.take_outgoing(),
            vec![Payload::Join {
                room: "board-7".into()
            }]
        );
        // Tracks start muted.
        assert!(
            session
                .take_commands()
                .contains(&MediaCommand::SetCaptureEnabled { enabled: false })
        );
        assert!(!session.microphone_enabled());
    }

    #[test]
    fn test_capture_denial_is_fatal_and_reported_once() {
        let mut session = VoiceSessionManager::new("a1");
        session.join("board-7");
        let epoch = session.epoch();
        session.take_commands();

        session.handle_media(MediaEvent::CaptureDenied {
            epoch,
            reason: "permission dismissed".into(),
        });

        assert_eq!(session.capture_state(), CaptureState::Denied);
        let reports = session.take_reports();
        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0], VoiceError::DeviceAccessDenied(_)));

        // No retry: the supervisor never touches capture.
        session.tick();
        assert!(session.take_commands().is_empty());
        // And presence was never announced.
        assert!(session.take_outgoing().is_empty());

        assert!(!session.toggle_microphone());
    }

    #[test]
    fn test_smaller_id_offers_and_both_connect() {
        let mut a1 = joined("a1");
        let mut b2 = joined("b2");

        // Relay fans out the join both ways.
        a1.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        b2.handle_signal(Payload::PeerJoined {
            user_id: "a1".into(),
        });

        // a1 < b2: only a1 starts an offer.
        let a1_commands = a1.take_commands();
        assert!(
            a1_commands
                .iter()
                .any(|c| matches!(c, MediaCommand::CreateOffer { peer } if peer == "b2"))
        );
        let b2_commands = b2.take_commands();
        assert!(
            !b2_commands
                .iter()
                .any(|c| matches!(c, MediaCommand::CreateOffer { .. }))
        );

        // Driver completes a1's offer; the payload goes to b2.
        let epoch = a1.epoch();
        a1.handle_media(MediaEvent::OfferCreated {
            epoch,
            peer: "b2".into(),
            sdp: SDP.into(),
        });
        let offers = a1.take_outgoing();
        assert_eq!(offers.len(), 1);
        let offer = offers.into_iter().next().unwrap();
        match &offer {
            Payload::Offer {
                target_user_id,
                offer,
                ..
            } => {
                assert_eq!(target_user_id, "b2");
                assert!(offer.sdp.contains("useinbandfec=1"));
                assert!(offer.sdp.contains("b=AS:128"));
            }
            other => panic!("expected offer, got {other:?}"),
        }

        // b2 answers.
        b2.handle_signal(offer);
        assert!(
            b2.take_commands()
                .iter()
                .any(|c| matches!(c, MediaCommand::CreateAnswer { peer } if peer == "a1"))
        );
        let epoch = b2.epoch();
        b2.handle_media(MediaEvent::AnswerCreated {
            epoch,
            peer: "a1".into(),
            sdp: SDP.into(),
        });
        let answers = b2.take_outgoing();
        assert_eq!(answers.len(), 1);
        a1.handle_signal(answers.into_iter().next().unwrap());

        // Driver observes both links connecting.
        let epoch = a1.epoch();
        a1.handle_media(MediaEvent::LinkStateChanged {
            epoch,
            peer: "b2".into(),
            state: LinkState::Connected,
        });
        let epoch = b2.epoch();
        b2.handle_media(MediaEvent::LinkStateChanged {
            epoch,
            peer: "a1".into(),
            state: LinkState::Connected,
        });

        assert_eq!(a1.peer_state("b2"), Some(LinkState::Connected));
        assert_eq!(b2.peer_state("a1"), Some(LinkState::Connected));
    }

    #[test]
    fn test_early_candidates_buffered_and_flushed_in_order() {
        let mut a1 = joined("a1");
        a1.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        a1.take_commands();

        // Candidates arrive before b2's answer.
        for tag in ["first", "second"] {
            a1.handle_signal(Payload::IceCandidate {
                target_user_id: "a1".into(),
                user_id: "b2".into(),
                candidate: candidate(tag),
                room: "board-7".into(),
            });
        }
        // Nothing reaches the driver yet.
        assert!(a1.take_commands().is_empty());

        a1.handle_signal(Payload::Answer {
            target_user_id: "a1".into(),
            user_id: "b2".into(),
            answer: SessionDescription {
                kind: SdpKind::Answer,
                sdp: SDP.into(),
            },
            room: "board-7".into(),
        });

        let commands = a1.take_commands();
        let tags: Vec<&str> = commands
            .iter()
            .filter_map(|c| match c {
                MediaCommand::AddIceCandidate { candidate, .. } => {
                    Some(candidate.candidate.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["first", "second"]);

        // The description itself precedes the candidates.
        assert!(matches!(
            commands[0],
            MediaCommand::SetRemoteDescription { .. }
        ));
    }

    #[test]
    fn test_candidate_before_any_link_creates_and_buffers() {
        let mut b2 = joined("b2");

        b2.handle_signal(Payload::IceCandidate {
            target_user_id: "b2".into(),
            user_id: "a1".into(),
            candidate: candidate("early"),
            room: "board-7".into(),
        });

        // Link exists (non-initiator side) with the candidate held back.
        assert_eq!(b2.peer_state("a1"), Some(LinkState::New));
        assert!(
            !b2.take_commands()
                .iter()
                .any(|c| matches!(c, MediaCommand::AddIceCandidate { .. }))
        );
    }

    #[test]
    fn test_gathered_candidates_forwarded_immediately() {
        let mut a1 = joined("a1");
        a1.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        a1.take_commands();

        let epoch = a1.epoch();
        a1.handle_media(MediaEvent::IceCandidateGathered {
            epoch,
            peer: "b2".into(),
            candidate: candidate("local"),
        });

        let outgoing = a1.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        assert!(matches!(
            &outgoing[0],
            Payload::IceCandidate { target_user_id, .. } if target_user_id == "b2"
        ));
    }

    #[test]
    fn test_stale_epoch_completion_discarded() {
        let mut session = VoiceSessionManager::new("a1");
        session.join("board-7");
        let old_epoch = session.epoch();
        session.leave();
        session.take_commands();
        session.take_outgoing();

        // The capture grant lands after the session was torn down.
        session.handle_media(MediaEvent::CaptureReady { epoch: old_epoch });

        assert_eq!(session.capture_state(), CaptureState::Inactive);
        assert!(session.take_outgoing().is_empty());
        assert!(session.take_commands().is_empty());
    }

    #[test]
    fn test_supervisor_rebuilds_failed_link_and_reoffers() {
        let mut a1 = joined("a1");
        a1.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        a1.take_commands();

        let epoch = a1.epoch();
        a1.handle_media(MediaEvent::LinkStateChanged {
            epoch,
            peer: "b2".into(),
            state: LinkState::Failed,
        });
        assert!(matches!(
            a1.take_reports().as_slice(),
            [VoiceError::PeerConnectionFailed { .. }]
        ));

        a1.tick();
        let commands = a1.take_commands();
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, MediaCommand::CloseLink { peer } if peer == "b2"))
        );
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, MediaCommand::OpenLink { peer, .. } if peer == "b2"))
        );
        // a1 was the initiator, so it re-offers.
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, MediaCommand::CreateOffer { peer } if peer == "b2"))
        );
        assert_eq!(a1.peer_state("b2"), Some(LinkState::New));
    }

    #[test]
    fn test_supervisor_does_not_reoffer_as_responder() {
        let mut b2 = joined("b2");
        b2.handle_signal(Payload::PeerJoined {
            user_id: "a1".into(),
        });
        b2.take_commands();

        let epoch = b2.epoch();
        b2.handle_media(MediaEvent::LinkStateChanged {
            epoch,
            peer: "a1".into(),
            state: LinkState::Disconnected,
        });

        b2.tick();
        let commands = b2.take_commands();
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, MediaCommand::OpenLink { .. }))
        );
        assert!(
            !commands
                .iter()
                .any(|c| matches!(c, MediaCommand::CreateOffer { .. }))
        );
    }

    #[test]
    fn test_healthy_links_left_alone() {
        let mut a1 = joined("a1");
        a1.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        let epoch = a1.epoch();
        a1.handle_media(MediaEvent::LinkStateChanged {
            epoch,
            peer: "b2".into(),
            state: LinkState::Connected,
        });
        a1.take_commands();

        a1.tick();
        assert!(a1.take_commands().is_empty());
    }

    #[test]
    fn test_microphone_toggle() {
        let mut session = joined("a1");

        assert!(session.toggle_microphone());
        assert!(
            session
                .take_commands()
                .contains(&MediaCommand::SetCaptureEnabled { enabled: true })
        );

        assert!(!session.toggle_microphone());
        assert!(
            session
                .take_commands()
                .contains(&MediaCommand::SetCaptureEnabled { enabled: false })
        );
    }

    #[test]
    fn test_remote_audio_toggle_and_volume() {
        let mut session = joined("a1");

        assert!(!session.toggle_remote_audio());
        assert!(
            session
                .take_commands()
                .contains(&MediaCommand::SetSinksMuted { muted: true })
        );

        assert_eq!(session.set_volume(1.7), 1.0);
        assert_eq!(session.set_volume(-0.3), 0.0);
        assert_eq!(session.set_volume(0.4), 0.4);
    }

    #[test]
    fn test_remote_track_attaches_sink_with_current_settings() {
        let mut session = joined("a1");
        session.toggle_remote_audio();
        session.set_volume(0.5);
        session.take_commands();

        let epoch = session.epoch();
        session.handle_media(MediaEvent::RemoteTrack {
            epoch,
            peer: "b2".into(),
        });

        let commands = session.take_commands();
        assert_eq!(
            commands,
            vec![MediaCommand::AttachSink {
                peer: "b2".into(),
                volume: 0.5,
                muted: true,
            }]
        );
    }

    #[test]
    fn test_autoplay_block_surfaces_resume_affordance() {
        let mut session = joined("a1");
        let epoch = session.epoch();
        session.handle_media(MediaEvent::RemoteTrack {
            epoch,
            peer: "b2".into(),
        });
        session.handle_media(MediaEvent::AutoplayBlocked {
            epoch,
            peer: "b2".into(),
        });
        session.take_commands();

        assert!(matches!(
            session.take_reports().as_slice(),
            [VoiceError::AutoplayBlocked(_)]
        ));

        assert!(session.resume_playback("b2"));
        assert_eq!(
            session.take_commands(),
            vec![MediaCommand::ResumeSink { peer: "b2".into() }]
        );
        // One resume per block.
        assert!(!session.resume_playback("b2"));
    }

    #[test]
    fn test_peer_left_tears_down_link_and_sink() {
        let mut session = joined("a1");
        session.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        let epoch = session.epoch();
        session.handle_media(MediaEvent::RemoteTrack {
            epoch,
            peer: "b2".into(),
        });
        session.take_commands();

        session.handle_signal(Payload::PeerLeft {
            user_id: "b2".into(),
        });

        let commands = session.take_commands();
        assert!(commands.contains(&MediaCommand::CloseLink { peer: "b2".into() }));
        assert!(commands.contains(&MediaCommand::RemoveSink { peer: "b2".into() }));
        assert_eq!(session.peer_state("b2"), None);
    }

    #[test]
    fn test_leave_announces_and_releases_everything() {
        let mut session = joined("a1");
        session.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        session.take_commands();

        session.leave();

        let commands = session.take_commands();
        assert!(commands.contains(&MediaCommand::CloseLink { peer: "b2".into() }));
        assert!(commands.contains(&MediaCommand::ReleaseCapture));
        assert_eq!(
            session.take_outgoing(),
            vec![Payload::Leave {
                room: "board-7".into()
            }]
        );
        assert_eq!(session.room(), None);
        assert!(session.participants().len() == 1);
    }

    #[test]
    fn test_signal_after_leave_ignored() {
        let mut session = joined("a1");
        session.leave();
        session.take_commands();

        session.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });
        assert!(session.take_commands().is_empty());
        assert_eq!(session.peer_state("b2"), None);
    }

    #[test]
    fn test_offer_not_addressed_to_us_ignored() {
        let mut session = joined("a1");
        session.handle_signal(Payload::Offer {
            target_user_id: "c3".into(),
            user_id: "b2".into(),
            offer: SessionDescription {
                kind: SdpKind::Offer,
                sdp: SDP.into(),
            },
            room: "board-7".into(),
        });

        assert!(session.take_commands().is_empty());
        assert_eq!(session.peer_state("b2"), None);
    }

    #[test]
    fn test_participants_snapshot() {
        let mut session = joined("a1");
        session.handle_signal(Payload::PeerJoined {
            user_id: "b2".into(),
        });

        let participants = session.participants();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].role, ParticipantRole::Local);
        assert_eq!(participants[0].id, "a1");
        assert_eq!(participants[1].role, ParticipantRole::Remote);
        assert_eq!(participants[1].id, "b2");
    }
}
