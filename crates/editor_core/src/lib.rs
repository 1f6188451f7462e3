use shared::{
    domain::{Group, GroupId, Label, LabelIndex, ViewMode, DEFAULT_COLOR_HEX_LIST},
    error::{IngestError, StoreError},
    protocol::TransFile,
};
use storage::EntityStore;
use tracing::{debug, info};

pub mod action;
pub mod history;
pub mod view;

pub use action::{
    Action, ActionKind, AdapterAction, EditContext, GroupAction, LabelAction, LabelChange,
    PictureAction,
};
pub use history::ActionLog;
pub use view::{NodeId, NodeKind, Row, ViewProjection};

/// Name and color lists used to suggest the next group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefaults {
    pub names: Vec<String>,
    pub colors: Vec<String>,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            colors: DEFAULT_COLOR_HEX_LIST.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Single owner of one open document, its history and its projection.
///
/// Edits go through [`Session::submit`] (or one of the semantic helpers built
/// on it), which keeps the store, the undo stacks and the projection in step.
#[derive(Debug)]
pub struct Session {
    store: EntityStore,
    log: ActionLog,
    view: ViewProjection,
    group_defaults: GroupDefaults,
}

impl Session {
    pub fn open(file: TransFile, mode: ViewMode) -> Result<Self, IngestError> {
        let mut store = EntityStore::from_trans_file(file)?;
        let view = ViewProjection::attach(&mut store, mode);
        info!(
            groups = store.group_count(),
            pictures = store.pic_count(),
            "session opened"
        );
        Ok(Self {
            store,
            log: ActionLog::new(),
            view,
            group_defaults: GroupDefaults::default(),
        })
    }

    pub fn new_document(mode: ViewMode) -> Self {
        let mut store = EntityStore::new();
        let view = ViewProjection::attach(&mut store, mode);
        Self {
            store,
            log: ActionLog::new(),
            view,
            group_defaults: GroupDefaults::default(),
        }
    }

    pub fn with_group_defaults(mut self, defaults: GroupDefaults) -> Self {
        self.group_defaults = defaults;
        self
    }

    /// Replaces the document. History is reset; the view mode is kept.
    pub fn load(&mut self, file: TransFile) -> Result<(), IngestError> {
        let mut store = EntityStore::from_trans_file(file)?;
        self.view = ViewProjection::attach(&mut store, self.view.mode());
        self.store = store;
        self.log.clear();
        info!(
            groups = self.store.group_count(),
            pictures = self.store.pic_count(),
            "document loaded"
        );
        Ok(())
    }

    pub fn close(self) -> TransFile {
        info!(changed = self.log.is_changed(), "session closed");
        self.store.to_trans_file()
    }

    pub fn snapshot(&self) -> TransFile {
        self.store.to_trans_file()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn view(&self) -> &ViewProjection {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewProjection {
        &mut self.view
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    // ----- history -----

    pub fn submit(&mut self, action: impl Into<Action>) -> Result<(), StoreError> {
        let mut ctx = EditContext {
            store: &mut self.store,
            view: &mut self.view,
        };
        let result = self.log.submit(action.into(), &mut ctx);
        self.view.refresh(&self.store);
        result
    }

    pub fn undo(&mut self) -> Result<bool, StoreError> {
        let mut ctx = EditContext {
            store: &mut self.store,
            view: &mut self.view,
        };
        let result = self.log.undo(&mut ctx);
        self.view.refresh(&self.store);
        result
    }

    pub fn redo(&mut self) -> Result<bool, StoreError> {
        let mut ctx = EditContext {
            store: &mut self.store,
            view: &mut self.view,
        };
        let result = self.log.redo(&mut ctx);
        self.view.refresh(&self.store);
        result
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.log.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.log.redo_description()
    }

    pub fn is_changed(&self) -> bool {
        self.log.is_changed()
    }

    pub fn mark_saved(&mut self) {
        self.log.mark_saved();
    }

    // ----- projection -----

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view.set_view_mode(mode, &self.store);
    }

    pub fn show_picture(&mut self, picture: &str) -> Result<(), StoreError> {
        self.view.show_picture(&self.store, picture)
    }

    pub fn request_update(&mut self) {
        self.view.request_update(&self.store);
    }

    // ----- groups -----

    /// Name and color for the next group from the configured defaults.
    pub fn suggest_group(&self) -> Group {
        let count = self.store.group_count();
        let is_free = |name: &str| self.store.group_id_by_name(name).is_err();

        let name = self
            .group_defaults
            .names
            .get(count)
            .filter(|name| is_free(name))
            .cloned()
            .or_else(|| {
                (count + 1..)
                    .map(|n| format!("New Group {n}"))
                    .find(|name| is_free(name))
            })
            .unwrap_or_default();

        let colors = &self.group_defaults.colors;
        let color_hex = if colors.is_empty() {
            DEFAULT_COLOR_HEX_LIST[count % DEFAULT_COLOR_HEX_LIST.len()].to_string()
        } else {
            colors[count % colors.len()].clone()
        };
        Group::new(name, color_hex)
    }

    pub fn add_group(&mut self, group: Group) -> Result<GroupId, StoreError> {
        self.submit(GroupAction::add(group))?;
        Ok(GroupId::from_position(self.store.group_count() - 1))
    }

    pub fn rename_group(&mut self, group_id: GroupId, name: &str) -> Result<(), StoreError> {
        let action = GroupAction::change(&self.store, group_id, Some(name.to_string()), None)?;
        self.submit(action)
    }

    pub fn recolor_group(&mut self, group_id: GroupId, color_hex: &str) -> Result<(), StoreError> {
        let action =
            GroupAction::change(&self.store, group_id, None, Some(color_hex.to_string()))?;
        self.submit(action)
    }

    /// Deletes an unused group and shifts every label of a later group down
    /// by one, as a single undo step.
    pub fn delete_group(&mut self, group_id: GroupId) -> Result<(), StoreError> {
        self.store.get_group(group_id)?;
        if !self.store.is_group_unused(group_id) {
            return Err(StoreError::GroupInUse { group_id });
        }

        let mut children: Vec<Action> = Vec::new();
        for picture in self.store.pic_names() {
            for label in self.store.labels(&picture)? {
                if label.group_id > group_id {
                    let shifted = LabelChange::group(GroupId(label.group_id.0 - 1));
                    children.push(
                        LabelAction::change(&self.store, picture.as_str(), label.index, shifted)?
                            .into(),
                    );
                }
            }
        }
        debug!(group_id = group_id.0, shifted = children.len(), "group delete cascade");
        children.push(GroupAction::remove(&self.store, group_id)?.into());
        self.submit(Action::Complex(children))
    }

    // ----- pictures -----

    pub fn add_picture(&mut self, picture: &str) -> Result<(), StoreError> {
        self.submit(PictureAction::add(picture))
    }

    pub fn remove_picture(&mut self, picture: &str) -> Result<(), StoreError> {
        let action = PictureAction::remove(&self.store, picture)?;
        self.submit(action)
    }

    // ----- labels -----

    /// Adds a label with the next free index and returns that index.
    pub fn add_label(
        &mut self,
        picture: &str,
        group_id: GroupId,
        x: f64,
        y: f64,
        text: &str,
    ) -> Result<LabelIndex, StoreError> {
        let index = self.store.next_label_index(picture)?;
        let label = Label::new(index.0, group_id.0, text).at(x, y);
        self.submit(LabelAction::add(picture, label))?;
        Ok(index)
    }

    /// Removes labels highest index first as one undo step. Returns how many
    /// were removed.
    pub fn remove_labels(
        &mut self,
        picture: &str,
        indices: &[LabelIndex],
    ) -> Result<usize, StoreError> {
        let mut indices = indices.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        let children = indices
            .iter()
            .map(|index| LabelAction::remove(&self.store, picture, *index).map(Action::from))
            .collect::<Result<Vec<_>, _>>()?;
        let count = children.len();
        if count > 0 {
            self.submit(Action::Complex(children))?;
        }
        Ok(count)
    }

    pub fn set_label_text(
        &mut self,
        picture: &str,
        index: LabelIndex,
        text: &str,
    ) -> Result<(), StoreError> {
        let action = LabelAction::change(&self.store, picture, index, LabelChange::text(text))?;
        self.submit(action)
    }

    pub fn move_label(
        &mut self,
        picture: &str,
        index: LabelIndex,
        x: f64,
        y: f64,
    ) -> Result<(), StoreError> {
        let action =
            LabelAction::change(&self.store, picture, index, LabelChange::position(x, y))?;
        self.submit(action)
    }

    /// Regroups labels. Labels already in `group_id` are skipped; nothing is
    /// recorded when no label changes.
    pub fn move_labels_to_group(
        &mut self,
        picture: &str,
        indices: &[LabelIndex],
        group_id: GroupId,
    ) -> Result<usize, StoreError> {
        let name = self.store.get_group(group_id)?.name.clone();

        let mut children: Vec<Action> = Vec::new();
        for index in indices {
            if self.store.get_label(picture, *index)?.group_id == group_id {
                continue;
            }
            let change = LabelChange::group(group_id);
            children.push(LabelAction::change(&self.store, picture, *index, change)?.into());
        }
        let count = children.len();
        if count == 0 {
            return Ok(0);
        }

        let description = match count {
            1 => format!("Move label to group '{name}'"),
            n => format!("Move {n} labels to group '{name}'"),
        };
        self.submit(AdapterAction::with_rebuild(
            description,
            Action::Complex(children),
        ))?;
        Ok(count)
    }

    pub fn move_label_to_index(
        &mut self,
        picture: &str,
        from: LabelIndex,
        to: LabelIndex,
    ) -> Result<(), StoreError> {
        let action = LabelAction::change(&self.store, picture, from, LabelChange::index(to))?;
        self.submit(AdapterAction::with_rebuild(
            format!("Change label index {from} to {to}"),
            action.into(),
        ))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
