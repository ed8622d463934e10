//! Boardcast Core Library
//!
//! Platform-agnostic session state and synchronization logic for the
//! Boardcast shared canvas: stroke capture and sync, viewport transforms,
//! the signaling wire protocol, and the auto-save boundary.

pub mod board;
pub mod engine;
pub mod input;
pub mod protocol;
pub mod signaling;
pub mod storage;
pub mod stroke;
pub mod viewport;

pub use board::{BoardDocument, BoardState};
pub use engine::DrawSyncEngine;
pub use input::{Modifiers, MouseButton, TouchPoint, WheelEvent};
pub use protocol::{IceCandidateInit, Payload, ProtocolError, SdpKind, SessionDescription};
pub use signaling::{
    ChannelEvent, ChannelState, PlatformSignalingClient, SignalingChannel, SignalingError,
};
pub use stroke::{DraftStroke, SmoothingQuality, Stroke, StrokeId, StrokeStyle};
pub use viewport::{MAX_SCALE, MIN_SCALE, ViewportController};
