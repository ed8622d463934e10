//! Media driver interface: commands out, completions in.
//!
//! The session manager never performs device or peer-connection I/O itself.
//! It queues [`MediaCommand`]s that a platform driver drains and executes in
//! order, and the driver reports results back as [`MediaEvent`]s. Every
//! event carries the session epoch it was issued under so completions that
//! outlive their session are discarded instead of mutating fresh state.

use crate::peer::LinkState;
use boardcast_core::protocol::{IceCandidateInit, SessionDescription};
use serde::{Deserialize, Serialize};

/// Audio capture constraints requested from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Mono for voice clarity.
    pub channel_count: u32,
    pub sample_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            channel_count: 1,
            sample_rate: 44_100,
        }
    }
}

/// One ICE server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Connection configuration handed to the platform when opening a link.
///
/// Defaults to public STUN only; TURN relays and their credentials are the
/// embedder's to supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfig {
    pub ice_servers: Vec<IceServer>,
    pub ice_candidate_pool_size: u8,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServer::stun("stun:stun.l.google.com:19302"),
                IceServer::stun("stun:stun1.l.google.com:19302"),
            ],
            ice_candidate_pool_size: 10,
        }
    }
}

/// Instructions for the platform media driver, executed in queue order.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    /// Acquire the local audio capture stream.
    AcquireCapture { constraints: CaptureConstraints },
    /// Stop and release all capture tracks.
    ReleaseCapture,
    /// Enable or disable the capture tracks (microphone mute).
    SetCaptureEnabled { enabled: bool },
    /// Create the platform peer connection for `peer` and add the local
    /// capture tracks to it.
    OpenLink { peer: String, config: RtcConfig },
    /// Close and discard the peer connection for `peer`.
    CloseLink { peer: String },
    /// Start offer creation on the link.
    CreateOffer { peer: String },
    /// Start answer creation on the link.
    CreateAnswer { peer: String },
    SetLocalDescription {
        peer: String,
        description: SessionDescription,
    },
    SetRemoteDescription {
        peer: String,
        description: SessionDescription,
    },
    AddIceCandidate {
        peer: String,
        candidate: IceCandidateInit,
    },
    /// Attach the remote stream for `peer` to a playback sink with the
    /// given initial volume and mute state.
    AttachSink {
        peer: String,
        volume: f64,
        muted: bool,
    },
    RemoveSink { peer: String },
    /// Apply a volume to every playback sink.
    SetSinkVolume { volume: f64 },
    /// Mute or unmute every playback sink.
    SetSinksMuted { muted: bool },
    /// Retry playback on a sink previously blocked by autoplay policy.
    ResumeSink { peer: String },
}

/// Completions reported back by the platform driver.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Capture acquired; tracks exist but their enabled state is still
    /// whatever the platform produced.
    CaptureReady { epoch: u64 },
    /// Capture permission denied or device unavailable.
    CaptureDenied { epoch: u64, reason: String },
    /// Offer SDP produced for a link, not yet applied locally.
    OfferCreated {
        epoch: u64,
        peer: String,
        sdp: String,
    },
    /// Answer SDP produced for a link, not yet applied locally.
    AnswerCreated {
        epoch: u64,
        peer: String,
        sdp: String,
    },
    /// A locally gathered ICE candidate ready to forward.
    IceCandidateGathered {
        epoch: u64,
        peer: String,
        candidate: IceCandidateInit,
    },
    /// Observed connection-state change on a link.
    LinkStateChanged {
        epoch: u64,
        peer: String,
        state: LinkState,
    },
    /// Remote media track arrived for a peer.
    RemoteTrack { epoch: u64, peer: String },
    /// Platform refused to start playback without a user gesture.
    AutoplayBlocked { epoch: u64, peer: String },
}

impl MediaEvent {
    /// The session epoch this completion belongs to.
    pub fn epoch(&self) -> u64 {
        match self {
            MediaEvent::CaptureReady { epoch }
            | MediaEvent::CaptureDenied { epoch, .. }
            | MediaEvent::OfferCreated { epoch, .. }
            | MediaEvent::AnswerCreated { epoch, .. }
            | MediaEvent::IceCandidateGathered { epoch, .. }
            | MediaEvent::LinkStateChanged { epoch, .. }
            | MediaEvent::RemoteTrack { epoch, .. }
            | MediaEvent::AutoplayBlocked { epoch, .. } => *epoch,
        }
    }
}
