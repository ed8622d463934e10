//! Drawing synchronization engine.
//!
//! Owns local stroke capture and the shared board replica. Strokes are
//! committed and broadcast exactly once, at pointer-up; in-progress drafts
//! never touch the network. Remote payloads are applied through
//! [`DrawSyncEngine::handle_payload`] with an explicit membership check, so
//! messages that race a `leave()` are discarded rather than mutating a
//! torn-down session.

use crate::board::BoardState;
use crate::protocol::Payload;
use crate::stroke::{DraftStroke, SmoothingQuality, Stroke, StrokeId, StrokeStyle};
use kurbo::Point;

/// Local capture plus the shared ordered stroke list for one board session.
pub struct DrawSyncEngine {
    author: String,
    room: Option<String>,
    board: BoardState,
    draft: Option<DraftStroke>,
    quality: SmoothingQuality,
    outgoing: Vec<Payload>,
}

impl DrawSyncEngine {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            room: None,
            board: BoardState::new(),
            draft: None,
            quality: SmoothingQuality::default(),
            outgoing: Vec::new(),
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.board.strokes()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn set_quality(&mut self, quality: SmoothingQuality) {
        self.quality = quality;
    }

    /// Announce presence and scope subsequent broadcasts to `room`.
    pub fn join(&mut self, room: &str) {
        if self.room.is_some() {
            self.leave();
        }
        self.room = Some(room.to_string());
        self.outgoing.push(Payload::Join {
            room: room.to_string(),
        });
    }

    /// Announce departure and stop applying payloads for the old room.
    pub fn leave(&mut self) {
        self.draft = None;
        if let Some(room) = self.room.take() {
            self.outgoing.push(Payload::Leave { room });
        }
    }

    /// Open a mutable, local-only draft stroke.
    ///
    /// An unfinished previous draft is discarded; this matches pointer
    /// capture being lost without a pointer-up.
    pub fn begin_stroke(&mut self, point: Point, style: StrokeStyle) {
        if self.draft.is_some() {
            log::warn!("begin_stroke with draft already open; discarding previous draft");
        }
        self.draft = Some(DraftStroke::new(point, style, self.author.clone()));
    }

    /// Record a pointer sample into the open draft.
    ///
    /// Returns whether the sample was recorded (false when no draft is open
    /// or the sample was suppressed as jitter).
    pub fn extend_stroke(&mut self, point: Point) -> bool {
        match &mut self.draft {
            Some(draft) => draft.append(point),
            None => false,
        }
    }

    /// Freeze the draft into an immutable stroke, append it to the shared
    /// list, and broadcast it. Exactly one broadcast per stroke.
    pub fn end_stroke(&mut self) -> Option<StrokeId> {
        let draft = self.draft.take()?;
        let stroke = draft.freeze(self.quality);
        let id = stroke.id;

        if let Some(room) = &self.room {
            self.outgoing.push(Payload::StrokeCommitted {
                room: room.clone(),
                stroke: stroke.clone(),
            });
        }
        self.board.commit(stroke);

        Some(id)
    }

    /// Pop the most recent stroke (any author) onto the redo stack.
    /// Applied locally only.
    pub fn undo(&mut self) -> bool {
        self.board.undo().is_some()
    }

    /// Restore the most recently undone batch. Applied locally only.
    pub fn redo(&mut self) -> bool {
        self.board.redo() > 0
    }

    pub fn can_undo(&self) -> bool {
        self.board.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.board.can_redo()
    }

    /// Remove every stroke within eraser reach and broadcast the surviving
    /// list so remote replicas reconcile to the same state.
    ///
    /// Returns the number of strokes removed.
    pub fn erase_at(&mut self, point: Point, radius: f64) -> usize {
        let removed = self.board.erase_at(point, radius);
        if removed > 0 {
            if let Some(room) = &self.room {
                self.outgoing.push(Payload::StrokesReplaced {
                    room: room.clone(),
                    surviving_strokes: self.board.strokes().to_vec(),
                });
            }
        }
        removed
    }

    /// Apply one payload received from the signaling channel.
    ///
    /// Payloads for a room this engine is not currently joined to are
    /// dropped: they are stale completions of an already torn-down session.
    /// Returns whether the board changed.
    pub fn handle_payload(&mut self, payload: Payload) -> bool {
        match payload {
            Payload::StrokeCommitted { room, stroke } => {
                if !self.in_room(&room) {
                    return false;
                }
                self.board.apply_remote(stroke);
                true
            }
            Payload::StrokesReplaced {
                room,
                surviving_strokes,
            } => {
                if !self.in_room(&room) {
                    return false;
                }
                self.board.replace_all(surviving_strokes);
                true
            }
            // Membership and voice payloads are not this engine's concern.
            _ => false,
        }
    }

    fn in_room(&self, room: &str) -> bool {
        if self.room.as_deref() == Some(room) {
            true
        } else {
            log::debug!("dropping payload for room {room}: not a member");
            false
        }
    }

    /// Drain queued broadcasts for the signaling channel.
    pub fn take_outgoing(&mut self) -> Vec<Payload> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }
}
