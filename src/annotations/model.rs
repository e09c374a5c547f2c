//! Ordered annotation records with linear undo/redo
//!
//! History is kept as two stacks of inverse commands rather than snapshots:
//! an undo entry only says "remove the last record", a redo entry carries
//! the record that was removed.

use std::collections::VecDeque;

use crate::domain::AnnotationRecord;

/// Default number of undo steps kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Reversible edit applied to the record list
#[derive(Clone, Debug, PartialEq)]
enum EditCommand {
    /// Push the record onto the end of the list
    Append(AnnotationRecord),
    /// Pop the last record off the list
    RemoveLast,
}

/// Annotation records in paint order plus their edit history
#[derive(Clone, Debug)]
pub struct AnnotationModel {
    records: Vec<AnnotationRecord>,
    /// Commands that undo past edits (most recent at the back)
    undo_stack: VecDeque<EditCommand>,
    /// Commands that redo undone edits (most recent last)
    redo_stack: Vec<EditCommand>,
    history_limit: usize,
}

impl Default for AnnotationModel {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl AnnotationModel {
    /// Create an empty model keeping at most `limit` undo steps
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            history_limit: limit.max(1),
        }
    }

    /// Apply a command and return its inverse
    fn apply(&mut self, command: EditCommand) -> Option<EditCommand> {
        match command {
            EditCommand::Append(record) => {
                self.records.push(record);
                Some(EditCommand::RemoveLast)
            }
            EditCommand::RemoveLast => self.records.pop().map(EditCommand::Append),
        }
    }

    fn push_undo(&mut self, command: EditCommand) {
        self.undo_stack.push_back(command);
        // Oldest steps fall off; their records stay committed
        while self.undo_stack.len() > self.history_limit {
            self.undo_stack.pop_front();
        }
    }

    /// Commit a record on top of the paint order
    pub fn append(&mut self, record: AnnotationRecord) {
        log::debug!("Committing {:?} annotation", record.kind());
        self.redo_stack.clear();
        if let Some(inverse) = self.apply(EditCommand::Append(record)) {
            self.push_undo(inverse);
        }
    }

    /// Remove the most recent record; returns false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.undo_stack.pop_back() else {
            return false;
        };
        match self.apply(command) {
            Some(inverse) => {
                self.redo_stack.push(inverse);
                true
            }
            None => false,
        }
    }

    /// Restore the most recently undone record; returns false when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let Some(command) = self.redo_stack.pop() else {
            return false;
        };
        match self.apply(command) {
            Some(inverse) => {
                self.push_undo(inverse);
                true
            }
            None => false,
        }
    }

    /// Drop every record and all history. Cannot be undone.
    pub fn clear(&mut self) {
        self.records.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Owned copy of the current records
    pub fn snapshot(&self) -> Vec<AnnotationRecord> {
        self.records.clone()
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Color, Point, Shape, Style};

    fn rect(w: f32) -> AnnotationRecord {
        AnnotationRecord::new(
            Point::new(1.0, 1.0),
            Shape::Rectangle {
                width: w,
                height: 10.0,
            },
            Style {
                color: Color::rgb(0, 0, 255),
                stroke_width: 2.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_undo_reverses_append_and_redo_restores() {
        let mut model = AnnotationModel::default();
        model.append(rect(1.0));
        model.append(rect(2.0));
        let before = model.snapshot();

        assert!(model.undo());
        assert_eq!(model.records(), &before[..1]);
        assert!(model.can_redo());

        assert!(model.redo());
        assert_eq!(model.snapshot(), before);
        assert!(!model.can_redo());
    }

    #[test]
    fn test_append_clears_redo() {
        let mut model = AnnotationModel::default();
        model.append(rect(1.0));
        model.append(rect(2.0));
        model.undo();
        model.undo();
        assert_eq!(model.redo_count(), 2);

        model.append(rect(3.0));
        assert_eq!(model.redo_count(), 0);
        assert!(!model.redo());
        assert_eq!(model.records(), &[rect(3.0)]);
    }

    #[test]
    fn test_undo_redo_on_empty_history_are_noops() {
        let mut model = AnnotationModel::default();
        assert!(!model.undo());
        assert!(!model.redo());
        assert!(model.is_empty());
    }

    #[test]
    fn test_interleaved_sequence_matches_linear_history() {
        let mut model = AnnotationModel::default();
        for i in 1..=5 {
            model.append(rect(i as f32));
        }
        for _ in 0..3 {
            model.undo();
        }
        model.redo();
        assert_eq!(model.records(), &[rect(1.0), rect(2.0), rect(3.0)]);
        model.append(rect(9.0));
        assert_eq!(model.records(), &[rect(1.0), rect(2.0), rect(3.0), rect(9.0)]);
        assert_eq!(model.undo_count(), 4);
        assert_eq!(model.redo_count(), 0);
    }

    #[test]
    fn test_history_limit_keeps_records() {
        let mut model = AnnotationModel::with_history_limit(3);
        for i in 1..=5 {
            model.append(rect(i as f32));
        }
        assert_eq!(model.undo_count(), 3);
        while model.undo() {}
        assert_eq!(model.records(), &[rect(1.0), rect(2.0)]);
    }

    #[test]
    fn test_clear_is_irreversible() {
        let mut model = AnnotationModel::default();
        model.append(rect(1.0));
        model.undo();
        model.append(rect(2.0));
        model.clear();
        assert!(model.is_empty());
        assert!(!model.undo());
        assert!(!model.redo());
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let mut model = AnnotationModel::default();
        model.append(rect(1.0));
        let snapshot = model.snapshot();
        model.append(rect(2.0));
        model.clear();
        assert_eq!(snapshot, vec![rect(1.0)]);
    }
}
