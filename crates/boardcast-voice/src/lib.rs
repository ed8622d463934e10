//! Boardcast Voice Library
//!
//! Peer-to-peer audio signaling and connection-lifecycle management for the
//! Boardcast shared canvas. The session manager is a sans-IO state machine:
//! the embedder drains [`media::MediaCommand`]s into its platform media
//! driver and outgoing [`boardcast_core::protocol::Payload`]s into its
//! signaling channel, and feeds completions and received payloads back in.

pub mod error;
pub mod media;
pub mod peer;
pub mod sdp;
pub mod session;

pub use error::VoiceError;
pub use media::{CaptureConstraints, IceServer, MediaCommand, MediaEvent, RtcConfig};
pub use peer::{LinkState, PeerLink, is_initiator};
pub use sdp::boost_audio_quality;
pub use session::{
    CaptureState, Participant, ParticipantRole, SUPERVISOR_INTERVAL_SECS, VoiceSessionManager,
};
