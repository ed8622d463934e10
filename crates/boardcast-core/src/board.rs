//! Shared board state: the ordered stroke list and erase/undo bookkeeping.
//!
//! The stroke list is the replicated structure: every client appends strokes
//! in the order it received them, so the list itself serves as the undo
//! history. The redo stack holds batches because one erase can remove
//! several strokes at once.

use crate::stroke::{Stroke, StrokeId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered stroke list plus redo bookkeeping for one board.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    strokes: Vec<Stroke>,
    redo_stack: Vec<Vec<Stroke>>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strokes in application order (oldest first).
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Append a locally committed stroke. Clears the redo stack, as any new
    /// edit invalidates previously undone work.
    pub fn commit(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
        self.redo_stack.clear();
    }

    /// Append a stroke received from a remote participant.
    ///
    /// Remote strokes do not clear the redo stack: another participant's
    /// drawing must not invalidate a local undo in progress.
    pub fn apply_remote(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Pop the most recently appended stroke, irrespective of authorship,
    /// onto the redo stack. Returns its id, or None if the board is empty.
    pub fn undo(&mut self) -> Option<StrokeId> {
        let stroke = self.strokes.pop()?;
        let id = stroke.id;
        self.redo_stack.push(vec![stroke]);
        Some(id)
    }

    /// Restore the most recently undone batch to the tail of the list.
    /// Returns the number of strokes restored.
    pub fn redo(&mut self) -> usize {
        let Some(batch) = self.redo_stack.pop() else {
            return 0;
        };
        let restored = batch.len();
        self.strokes.extend(batch);
        restored
    }

    pub fn can_undo(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Remove every stroke within eraser reach of `point` and push the
    /// removed strokes onto the redo stack as a single batch.
    ///
    /// A stroke is removed when the minimum point-to-segment distance from
    /// `point` is at most `radius` plus half the stroke width. Returns the
    /// number of strokes removed.
    pub fn erase_at(&mut self, point: Point, radius: f64) -> usize {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.strokes.len());

        for stroke in self.strokes.drain(..) {
            if stroke.hit_by_eraser(point, radius) {
                removed.push(stroke);
            } else {
                kept.push(stroke);
            }
        }

        self.strokes = kept;
        let count = removed.len();
        if count > 0 {
            self.redo_stack.push(removed);
        }
        count
    }

    /// Reconcile to a full stroke list broadcast by a remote erase.
    pub fn replace_all(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
    }
}

/// Persisted form of a board: identity plus the ordered stroke list.
///
/// The auto-save collaborator serializes this; the core only guarantees the
/// list is internally consistent and ordered at any inspection point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    pub id: String,
    pub title: String,
    pub strokes: Vec<Stroke>,
}

impl BoardDocument {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: "Untitled".to_string(),
            strokes: Vec::new(),
        }
    }

    /// Snapshot the current board state under this document's identity.
    pub fn from_state(id: String, title: String, state: &BoardState) -> Self {
        Self {
            id,
            title,
            strokes: state.strokes().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for BoardDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::StrokeStyle;

    fn stroke_at(y: f64, author: &str) -> Stroke {
        Stroke {
            id: Uuid::new_v4(),
            points: vec![Point::new(0.0, y), Point::new(10.0, y)],
            style: StrokeStyle::default(),
            author: author.to_string(),
        }
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        board.undo();
        assert!(board.can_redo());

        board.commit(stroke_at(10.0, "a1"));
        assert!(!board.can_redo());
    }

    #[test]
    fn test_remote_append_keeps_redo() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        board.undo();

        board.apply_remote(stroke_at(10.0, "b2"));
        assert!(board.can_redo());
    }

    #[test]
    fn test_undo_redo_restores_identical_stroke() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        let original = board.strokes()[0].clone();

        let undone = board.undo().unwrap();
        assert_eq!(undone, original.id);
        assert!(board.is_empty());

        assert_eq!(board.redo(), 1);
        assert_eq!(board.strokes()[0], original);
    }

    #[test]
    fn test_undo_pops_any_author() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        board.apply_remote(stroke_at(10.0, "b2"));

        let remote_id = board.strokes()[1].id;
        assert_eq!(board.undo(), Some(remote_id));
    }

    #[test]
    fn test_undo_empty() {
        let mut board = BoardState::new();
        assert_eq!(board.undo(), None);
        assert_eq!(board.redo(), 0);
    }

    #[test]
    fn test_erase_pushes_batch() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        board.commit(stroke_at(1.0, "a1"));
        board.commit(stroke_at(100.0, "a1"));

        // Both strokes near y=0 fall inside the reach; the far one survives.
        let removed = board.erase_at(Point::new(5.0, 0.5), 3.0);
        assert_eq!(removed, 2);
        assert_eq!(board.len(), 1);

        // The batch comes back in one redo.
        assert_eq!(board.redo(), 2);
        assert_eq!(board.len(), 3);
    }

    #[test]
    fn test_erase_miss_leaves_redo_untouched() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));

        let removed = board.erase_at(Point::new(500.0, 500.0), 3.0);
        assert_eq!(removed, 0);
        assert!(!board.can_redo());
    }

    #[test]
    fn test_erase_boundary_distance() {
        // Width 4, eraser radius 3 at distance exactly 5 = radius + width/2.
        let mut board = BoardState::new();
        let mut stroke = stroke_at(0.0, "a1");
        stroke.style.width = 4.0;
        board.commit(stroke);

        assert_eq!(board.erase_at(Point::new(5.0, 5.0), 3.0), 1);
    }

    #[test]
    fn test_replace_all() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));
        board.commit(stroke_at(10.0, "a1"));

        let surviving = vec![board.strokes()[1].clone()];
        board.replace_all(surviving.clone());

        assert_eq!(board.strokes(), surviving.as_slice());
    }

    #[test]
    fn test_document_json_roundtrip() {
        let mut board = BoardState::new();
        board.commit(stroke_at(0.0, "a1"));

        let doc = BoardDocument::from_state("board-1".into(), "Sketch".into(), &board);
        let json = doc.to_json().unwrap();
        let back = BoardDocument::from_json(&json).unwrap();

        assert_eq!(back.id, "board-1");
        assert_eq!(back.title, "Sketch");
        assert_eq!(back.strokes.len(), 1);
    }
}
