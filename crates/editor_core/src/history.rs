//! Linear undo/redo history.

use shared::error::StoreError;
use tracing::{info, warn};

use crate::action::{Action, EditContext};

#[derive(Debug, Default)]
pub struct ActionLog {
    undo_stack: Vec<Action>,
    redo_stack: Vec<Action>,
    changed: bool,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `action` and records it. A failed commit records nothing and
    /// keeps the redo stack.
    pub fn submit(&mut self, mut action: Action, ctx: &mut EditContext<'_>) -> Result<(), StoreError> {
        action.commit(ctx)?;
        info!(action = %action.description(), "action committed");
        self.undo_stack.push(action);
        self.redo_stack.clear();
        self.changed = true;
        Ok(())
    }

    /// Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<bool, StoreError> {
        let Some(mut action) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = action.revert(ctx) {
            warn!(action = %action.description(), %err, "undo failed");
            self.undo_stack.push(action);
            return Err(err);
        }
        info!(action = %action.description(), "action undone");
        self.redo_stack.push(action);
        self.changed = true;
        Ok(true)
    }

    pub fn redo(&mut self, ctx: &mut EditContext<'_>) -> Result<bool, StoreError> {
        let Some(mut action) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = action.commit(ctx) {
            warn!(action = %action.description(), %err, "redo failed");
            self.redo_stack.push(action);
            return Err(err);
        }
        info!(action = %action.description(), "action redone");
        self.undo_stack.push(action);
        self.changed = true;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(Action::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(Action::description)
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_saved(&mut self) {
        self.changed = false;
    }

    /// Drops both stacks, e.g. when another document is loaded.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.changed = false;
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
