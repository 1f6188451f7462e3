//! Undoable document edits.
//!
//! Every variant pairs `commit` with an exact inverse `revert`. Change
//! variants snapshot the fields they overwrite when they are built, removal
//! variants remember where the entity sat so revert puts it back in place.

use std::{cell::RefCell, fmt, rc::Rc};

use shared::{
    domain::{Group, GroupId, Label, LabelIndex},
    error::StoreError,
};
use storage::EntityStore;
use tracing::warn;

use crate::view::ViewProjection;

/// Mutable state an action may touch while it is applied.
pub struct EditContext<'a> {
    pub store: &'a mut EntityStore,
    pub view: &'a mut ViewProjection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Add,
    Remove,
    Change,
}

/// Field values for a label change. `None` leaves the field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelChange {
    pub text: Option<String>,
    pub group_id: Option<GroupId>,
    pub index: Option<LabelIndex>,
    pub position: Option<(f64, f64)>,
}

impl LabelChange {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn group(group_id: GroupId) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn index(index: LabelIndex) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self {
            position: Some((x, y)),
            ..Self::default()
        }
    }

    /// Current values of the fields this change would overwrite.
    fn snapshot(&self, label: &Label) -> Self {
        Self {
            text: self.text.as_ref().map(|_| label.text.clone()),
            group_id: self.group_id.map(|_| label.group_id),
            index: self.index.map(|_| label.index),
            position: self.position.map(|_| (label.x, label.y)),
        }
    }

    /// Validates everything first so the label is either fully updated or
    /// untouched.
    fn apply(
        &self,
        store: &mut EntityStore,
        picture: &str,
        at: LabelIndex,
    ) -> Result<(), StoreError> {
        store.get_label(picture, at)?;
        if let Some(group_id) = self.group_id {
            store.check_label_group(group_id)?;
        }
        if let Some(new_index) = self.index {
            if new_index != at && store.get_label(picture, new_index).is_ok() {
                return Err(StoreError::IndexRepeated {
                    picture: picture.to_string(),
                    index: new_index,
                });
            }
        }

        let mut index = at;
        if let Some(new_index) = self.index {
            store.set_label_index(picture, index, new_index)?;
            index = new_index;
        }
        if let Some(group_id) = self.group_id {
            store.set_label_group(picture, index, group_id)?;
        }
        if let Some(text) = &self.text {
            store.set_label_text(picture, index, text)?;
        }
        if let Some((x, y)) = self.position {
            store.set_label_position(picture, index, x, y)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum LabelAction {
    Add {
        picture: String,
        label: Label,
    },
    Remove {
        picture: String,
        label: Label,
        position: Option<usize>,
    },
    Change {
        picture: String,
        index: LabelIndex,
        new: LabelChange,
        old: LabelChange,
    },
}

impl LabelAction {
    pub fn add(picture: impl Into<String>, label: Label) -> Self {
        Self::Add {
            picture: picture.into(),
            label,
        }
    }

    pub fn remove(
        store: &EntityStore,
        picture: impl Into<String>,
        index: LabelIndex,
    ) -> Result<Self, StoreError> {
        let picture = picture.into();
        let label = store.get_label(&picture, index)?.clone();
        Ok(Self::Remove {
            picture,
            label,
            position: None,
        })
    }

    pub fn change(
        store: &EntityStore,
        picture: impl Into<String>,
        index: LabelIndex,
        new: LabelChange,
    ) -> Result<Self, StoreError> {
        let picture = picture.into();
        let old = new.snapshot(store.get_label(&picture, index)?);
        Ok(Self::Change {
            picture,
            index,
            new,
            old,
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Add { .. } => ActionKind::Add,
            Self::Remove { .. } => ActionKind::Remove,
            Self::Change { .. } => ActionKind::Change,
        }
    }

    /// Group and index changes move a label between tree nodes without any
    /// list event.
    pub fn moves_node(&self) -> bool {
        matches!(self, Self::Change { new, .. } if new.group_id.is_some() || new.index.is_some())
    }

    fn commit(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { picture, label } => store.add_label(picture, label.clone()),
            Self::Remove {
                picture,
                label,
                position,
            } => {
                let at = store.label_position(picture, label.index)?;
                *label = store.remove_label(picture, label.index)?;
                *position = Some(at);
                Ok(())
            }
            Self::Change {
                picture,
                index,
                new,
                ..
            } => new.apply(store, picture, *index),
        }
    }

    fn revert(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { picture, label } => store.remove_label(picture, label.index).map(drop),
            Self::Remove {
                picture,
                label,
                position,
            } => {
                let at = position.take().unwrap_or(usize::MAX);
                store.insert_label(picture, at, label.clone())
            }
            Self::Change {
                picture,
                index,
                new,
                old,
            } => old.apply(store, picture, new.index.unwrap_or(*index)),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Add { label, .. } => format!("Add label {}", label.index),
            Self::Remove { label, .. } => format!("Remove label {}", label.index),
            Self::Change { index, new, .. } => match new.group_id {
                Some(group_id) if new.text.is_none() && new.index.is_none() => {
                    format!("Move label {index} to group {group_id}")
                }
                _ => format!("Edit label {index}"),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum GroupAction {
    Add {
        group: Group,
        group_id: Option<GroupId>,
    },
    Remove {
        group_id: GroupId,
        group: Group,
    },
    Change {
        group_id: GroupId,
        new_name: Option<String>,
        new_color_hex: Option<String>,
        old_name: String,
        old_color_hex: String,
    },
}

impl GroupAction {
    pub fn add(group: Group) -> Self {
        Self::Add {
            group,
            group_id: None,
        }
    }

    pub fn remove(store: &EntityStore, group_id: GroupId) -> Result<Self, StoreError> {
        let group = store.get_group(group_id)?.clone();
        Ok(Self::Remove { group_id, group })
    }

    pub fn change(
        store: &EntityStore,
        group_id: GroupId,
        new_name: Option<String>,
        new_color_hex: Option<String>,
    ) -> Result<Self, StoreError> {
        let group = store.get_group(group_id)?;
        Ok(Self::Change {
            group_id,
            old_name: group.name.clone(),
            old_color_hex: group.color_hex.clone(),
            new_name,
            new_color_hex,
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Add { .. } => ActionKind::Add,
            Self::Remove { .. } => ActionKind::Remove,
            Self::Change { .. } => ActionKind::Change,
        }
    }

    fn commit(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { group, group_id } => {
                *group_id = Some(store.add_group(group.clone())?);
                Ok(())
            }
            Self::Remove { group_id, group } => {
                *group = store.remove_group(*group_id)?;
                Ok(())
            }
            Self::Change {
                group_id,
                new_name,
                new_color_hex,
                ..
            } => set_group_fields(store, *group_id, new_name.as_deref(), new_color_hex.as_deref()),
        }
    }

    fn revert(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { group, group_id } => {
                let id = match group_id.take() {
                    Some(id) => id,
                    None => store.group_id_by_name(&group.name)?,
                };
                store.remove_group(id).map(drop)
            }
            Self::Remove { group_id, group } => store.insert_group(*group_id, group.clone()),
            Self::Change {
                group_id,
                new_name,
                new_color_hex,
                old_name,
                old_color_hex,
            } => set_group_fields(
                store,
                *group_id,
                new_name.as_ref().map(|_| old_name.as_str()),
                new_color_hex.as_ref().map(|_| old_color_hex.as_str()),
            ),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Add { group, .. } => format!("Add group '{}'", group.name),
            Self::Remove { group, .. } => format!("Remove group '{}'", group.name),
            Self::Change {
                old_name, new_name, ..
            } => match new_name {
                Some(new_name) => format!("Rename group '{old_name}' to '{new_name}'"),
                None => format!("Recolor group '{old_name}'"),
            },
        }
    }
}

fn set_group_fields(
    store: &mut EntityStore,
    group_id: GroupId,
    name: Option<&str>,
    color_hex: Option<&str>,
) -> Result<(), StoreError> {
    store.get_group(group_id)?;
    if let Some(name) = name {
        store.rename_group(group_id, name)?;
    }
    if let Some(color_hex) = color_hex {
        store.recolor_group(group_id, color_hex)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum PictureAction {
    Add { picture: String },
    Remove { picture: String, labels: Vec<Label> },
}

impl PictureAction {
    pub fn add(picture: impl Into<String>) -> Self {
        Self::Add {
            picture: picture.into(),
        }
    }

    pub fn remove(store: &EntityStore, picture: impl Into<String>) -> Result<Self, StoreError> {
        let picture = picture.into();
        let labels = store.labels(&picture)?.to_vec();
        Ok(Self::Remove { picture, labels })
    }

    fn commit(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { picture } => store.add_picture(picture),
            Self::Remove { picture, labels } => {
                *labels = store.remove_picture(picture)?;
                Ok(())
            }
        }
    }

    fn revert(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        match self {
            Self::Add { picture } => store.remove_picture(picture).map(drop),
            Self::Remove { picture, labels } => store.insert_picture(picture, labels.clone()),
        }
    }
}

pub type Effect = Box<dyn FnMut(&mut EditContext<'_>) -> Result<(), StoreError>>;

/// Arbitrary paired side effects replayed by undo/redo as one unit.
pub struct AdapterAction {
    description: String,
    commit: Effect,
    revert: Effect,
}

impl AdapterAction {
    pub fn new<C, R>(description: impl Into<String>, commit: C, revert: R) -> Self
    where
        C: FnMut(&mut EditContext<'_>) -> Result<(), StoreError> + 'static,
        R: FnMut(&mut EditContext<'_>) -> Result<(), StoreError> + 'static,
    {
        Self {
            description: description.into(),
            commit: Box::new(commit),
            revert: Box::new(revert),
        }
    }

    /// Wraps `action` so the projection is rebuilt right after it is applied
    /// in either direction, under its own description.
    pub fn with_rebuild(description: impl Into<String>, action: Action) -> Self {
        let forward = Rc::new(RefCell::new(action));
        let backward = Rc::clone(&forward);
        Self::new(
            description,
            move |ctx| {
                forward.borrow_mut().commit(ctx)?;
                ctx.view.rebuild(ctx.store);
                Ok(())
            },
            move |ctx| {
                backward.borrow_mut().revert(ctx)?;
                ctx.view.rebuild(ctx.store);
                Ok(())
            },
        )
    }
}

impl fmt::Debug for AdapterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterAction")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Action {
    Label(LabelAction),
    Group(GroupAction),
    Picture(PictureAction),
    /// Children commit in order and revert in reverse order.
    Complex(Vec<Action>),
    Adapter(AdapterAction),
}

impl Action {
    pub fn commit(&mut self, ctx: &mut EditContext<'_>) -> Result<(), StoreError> {
        match self {
            Self::Label(action) => {
                action.commit(ctx.store)?;
                if action.moves_node() {
                    ctx.view.invalidate();
                }
                Ok(())
            }
            Self::Group(action) => action.commit(ctx.store),
            Self::Picture(action) => action.commit(ctx.store),
            Self::Complex(children) => commit_all(children, ctx),
            Self::Adapter(adapter) => (adapter.commit)(ctx),
        }
    }

    pub fn revert(&mut self, ctx: &mut EditContext<'_>) -> Result<(), StoreError> {
        match self {
            Self::Label(action) => {
                action.revert(ctx.store)?;
                if action.moves_node() {
                    ctx.view.invalidate();
                }
                Ok(())
            }
            Self::Group(action) => action.revert(ctx.store),
            Self::Picture(action) => action.revert(ctx.store),
            Self::Complex(children) => revert_all(children, ctx),
            Self::Adapter(adapter) => (adapter.revert)(ctx),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Label(action) => action.description(),
            Self::Group(action) => action.description(),
            Self::Picture(PictureAction::Add { picture }) => format!("Add picture '{picture}'"),
            Self::Picture(PictureAction::Remove { picture, .. }) => {
                format!("Remove picture '{picture}'")
            }
            Self::Complex(children) => match children.as_slice() {
                [single] => single.description(),
                _ if !children.is_empty()
                    && children.iter().all(|child| {
                        matches!(child, Self::Label(action) if action.kind() == ActionKind::Remove)
                    }) =>
                {
                    format!("Remove {} labels", children.len())
                }
                _ => {
                    // A re-index cascade is named after its one group edit.
                    let mut groups = children.iter().filter(|child| matches!(child, Self::Group(_)));
                    match (groups.next(), groups.next()) {
                        (Some(group), None) => group.description(),
                        _ => format!("Batch ({} actions)", children.len()),
                    }
                }
            },
            Self::Adapter(adapter) => adapter.description.clone(),
        }
    }
}

impl From<LabelAction> for Action {
    fn from(value: LabelAction) -> Self {
        Self::Label(value)
    }
}

impl From<GroupAction> for Action {
    fn from(value: GroupAction) -> Self {
        Self::Group(value)
    }
}

impl From<PictureAction> for Action {
    fn from(value: PictureAction) -> Self {
        Self::Picture(value)
    }
}

impl From<AdapterAction> for Action {
    fn from(value: AdapterAction) -> Self {
        Self::Adapter(value)
    }
}

// A failing child rolls back the children already applied, so a composite
// never stays half-applied.
fn commit_all(children: &mut [Action], ctx: &mut EditContext<'_>) -> Result<(), StoreError> {
    for position in 0..children.len() {
        if let Err(err) = children[position].commit(ctx) {
            for applied in children[..position].iter_mut().rev() {
                if let Err(rollback) = applied.revert(ctx) {
                    warn!(%rollback, "rollback of composite child failed");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

fn revert_all(children: &mut [Action], ctx: &mut EditContext<'_>) -> Result<(), StoreError> {
    let count = children.len();
    for step in 0..count {
        let position = count - 1 - step;
        if let Err(err) = children[position].revert(ctx) {
            for reverted in children[position + 1..].iter_mut() {
                if let Err(rollback) = reverted.commit(ctx) {
                    warn!(%rollback, "re-apply of composite child failed");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/action_tests.rs"]
mod tests;
