//! Failure taxonomy for the voice subsystem.
//!
//! All of these are caught at the operation boundary and converted into a
//! reported status plus a diagnostic entry; none terminate the session.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// Capture device rejected. Fatal for voice: reported once, never
    /// retried automatically.
    #[error("audio capture denied: {0}")]
    DeviceAccessDenied(String),

    /// Transport disconnected. Reconnection is the transport's own concern,
    /// not this subsystem's.
    #[error("signaling transport unavailable")]
    SignalingUnavailable,

    /// ICE or connection failure. The reconnection supervisor retries for
    /// the life of the session.
    #[error("peer connection to {peer} failed")]
    PeerConnectionFailed { peer: String },

    /// Remote playback blocked by platform policy. Non-fatal; surfaced as a
    /// user-actionable resume affordance.
    #[error("audio playback for {0} blocked; user action required")]
    AutoplayBlocked(String),
}
