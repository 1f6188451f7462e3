use std::collections::{BTreeMap, HashSet};

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::unsync::OnceCell;
use shared::{
    domain::{is_color_hex, Group, GroupId, Label, LabelIndex},
    error::{IngestError, StoreError},
    protocol::{StoreEvent, TransFile, DEFAULT_COMMENT, DEFAULT_VERSION},
};
use tracing::debug;

pub use shared::natural::sort_natural;

/// Canonical owner of groups and per-picture label lists.
///
/// Every mutating call either succeeds completely or returns a [`StoreError`]
/// without touching any state. List mutations are announced to subscribers as
/// [`StoreEvent`]s; in-place field edits are not.
pub struct EntityStore {
    version: [u32; 2],
    comment: String,
    groups: Vec<Group>,
    pictures: BTreeMap<String, Vec<Label>>,
    sorted_pic_names: OnceCell<Vec<String>>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            comment: DEFAULT_COMMENT.to_string(),
            groups: Vec::new(),
            pictures: BTreeMap::new(),
            sorted_pic_names: OnceCell::new(),
            subscribers: Vec::new(),
        }
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a loaded document, refusing anything that breaks
    /// the group/label invariants.
    pub fn from_trans_file(file: TransFile) -> Result<Self, IngestError> {
        validate(&file.group_list, &file.trans_map)?;
        debug!(
            groups = file.group_list.len(),
            pictures = file.trans_map.len(),
            "document ingested"
        );
        Ok(Self {
            version: file.version,
            comment: file.comment,
            groups: file.group_list,
            pictures: file.trans_map,
            ..Self::default()
        })
    }

    /// Snapshot in the writer's shape: labels ascending by index.
    pub fn to_trans_file(&self) -> TransFile {
        let trans_map = self
            .pictures
            .iter()
            .map(|(name, labels)| {
                let mut labels = labels.clone();
                labels.sort_by_key(|label| label.index);
                (name.clone(), labels)
            })
            .collect();

        TransFile {
            version: self.version,
            comment: self.comment.clone(),
            group_list: self.groups.clone(),
            trans_map,
        }
    }

    /// Re-checks every invariant against the live state.
    pub fn validate(&self) -> Result<(), IngestError> {
        validate(&self.groups, &self.pictures)
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn version(&self) -> [u32; 2] {
        self.version
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    // ----- groups -----

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|group| group.name.clone()).collect()
    }

    pub fn group_colors(&self) -> Vec<String> {
        self.groups
            .iter()
            .map(|group| group.color_hex.clone())
            .collect()
    }

    pub fn group_id_by_name(&self, name: &str) -> Result<GroupId, StoreError> {
        self.groups
            .iter()
            .position(|group| group.name == name)
            .map(GroupId::from_position)
            .ok_or_else(|| StoreError::GroupNotFound {
                name: name.to_string(),
            })
    }

    fn group_position(&self, group_id: GroupId) -> Result<usize, StoreError> {
        let position = group_id
            .position()
            .ok_or(StoreError::IndexNegative { group_id })?;
        if position >= self.groups.len() {
            return Err(StoreError::IndexOutOfBounds {
                group_id,
                count: self.groups.len(),
            });
        }
        Ok(position)
    }

    fn ensure_color(color_hex: &str) -> Result<(), StoreError> {
        if !is_color_hex(color_hex) {
            return Err(StoreError::MalformedColor {
                color_hex: color_hex.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_name_free(&self, name: &str, except: Option<usize>) -> Result<(), StoreError> {
        let taken = self
            .groups
            .iter()
            .enumerate()
            .any(|(position, group)| Some(position) != except && group.name == name);
        if taken {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Appends a group and returns its id.
    pub fn add_group(&mut self, group: Group) -> Result<GroupId, StoreError> {
        let group_id = GroupId::from_position(self.groups.len());
        self.insert_group(group_id, group)?;
        Ok(group_id)
    }

    /// Inserts a group at `group_id`, shifting later groups up by one. Labels
    /// are not re-indexed; the caller pairs this with the matching cascade.
    pub fn insert_group(&mut self, group_id: GroupId, group: Group) -> Result<(), StoreError> {
        let position = group_id
            .position()
            .ok_or(StoreError::IndexNegative { group_id })?;
        if position > self.groups.len() {
            return Err(StoreError::IndexOutOfBounds {
                group_id,
                count: self.groups.len(),
            });
        }
        self.ensure_name_free(&group.name, None)?;
        Self::ensure_color(&group.color_hex)?;

        debug!(group_id = group_id.0, name = %group.name, "group added");
        self.groups.insert(position, group.clone());
        self.emit(StoreEvent::GroupAdded { group_id, group });
        Ok(())
    }

    pub fn get_group(&self, group_id: GroupId) -> Result<&Group, StoreError> {
        let position = self.group_position(group_id)?;
        Ok(&self.groups[position])
    }

    /// Removes the group at `group_id`. Does not check [`Self::is_group_unused`].
    pub fn remove_group(&mut self, group_id: GroupId) -> Result<Group, StoreError> {
        let position = self.group_position(group_id)?;
        let group = self.groups.remove(position);
        debug!(group_id = group_id.0, name = %group.name, "group removed");
        self.emit(StoreEvent::GroupRemoved {
            group_id,
            group: group.clone(),
        });
        Ok(group)
    }

    pub fn is_group_unused(&self, group_id: GroupId) -> bool {
        !self
            .pictures
            .values()
            .flatten()
            .any(|label| label.group_id == group_id)
    }

    /// Returns the previous name.
    pub fn rename_group(&mut self, group_id: GroupId, name: &str) -> Result<String, StoreError> {
        let position = self.group_position(group_id)?;
        self.ensure_name_free(name, Some(position))?;
        debug!(group_id = group_id.0, name, "group renamed");
        Ok(std::mem::replace(
            &mut self.groups[position].name,
            name.to_string(),
        ))
    }

    /// Returns the previous color.
    pub fn recolor_group(
        &mut self,
        group_id: GroupId,
        color_hex: &str,
    ) -> Result<String, StoreError> {
        let position = self.group_position(group_id)?;
        Self::ensure_color(color_hex)?;
        debug!(group_id = group_id.0, color_hex, "group recolored");
        Ok(std::mem::replace(
            &mut self.groups[position].color_hex,
            color_hex.to_string(),
        ))
    }

    // ----- pictures -----

    pub fn has_picture(&self, picture: &str) -> bool {
        self.pictures.contains_key(picture)
    }

    pub fn pic_count(&self) -> usize {
        self.pictures.len()
    }

    pub fn pic_names(&self) -> Vec<String> {
        self.pictures.keys().cloned().collect()
    }

    /// Picture names in natural order, cached until the picture set changes.
    pub fn sorted_pic_names(&self) -> &[String] {
        self.sorted_pic_names
            .get_or_init(|| sort_natural(self.pictures.keys().cloned().collect()))
    }

    pub fn add_picture(&mut self, picture: &str) -> Result<(), StoreError> {
        self.insert_picture(picture, Vec::new())
    }

    /// Adds a picture together with an existing label list.
    pub fn insert_picture(&mut self, picture: &str, labels: Vec<Label>) -> Result<(), StoreError> {
        if self.pictures.contains_key(picture) {
            return Err(StoreError::DuplicateName {
                name: picture.to_string(),
            });
        }
        let mut seen = HashSet::new();
        for label in &labels {
            self.check_label_group(label.group_id)?;
            if !seen.insert(label.index) {
                return Err(StoreError::IndexRepeated {
                    picture: picture.to_string(),
                    index: label.index,
                });
            }
        }

        debug!(picture, labels = labels.len(), "picture added");
        self.pictures.insert(picture.to_string(), labels);
        self.sorted_pic_names = OnceCell::new();
        self.emit(StoreEvent::PictureAdded {
            picture: picture.to_string(),
        });
        Ok(())
    }

    /// Removes a picture and returns its label list.
    pub fn remove_picture(&mut self, picture: &str) -> Result<Vec<Label>, StoreError> {
        let labels = self
            .pictures
            .remove(picture)
            .ok_or_else(|| StoreError::PictureNotFound {
                picture: picture.to_string(),
            })?;
        debug!(picture, labels = labels.len(), "picture removed");
        self.sorted_pic_names = OnceCell::new();
        self.emit(StoreEvent::PictureRemoved {
            picture: picture.to_string(),
        });
        Ok(labels)
    }

    // ----- labels -----

    /// Labels of `picture` in insertion order.
    pub fn labels(&self, picture: &str) -> Result<&[Label], StoreError> {
        self.pictures
            .get(picture)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::PictureNotFound {
                picture: picture.to_string(),
            })
    }

    fn labels_mut(&mut self, picture: &str) -> Result<&mut Vec<Label>, StoreError> {
        self.pictures
            .get_mut(picture)
            .ok_or_else(|| StoreError::PictureNotFound {
                picture: picture.to_string(),
            })
    }

    /// One past the highest index in `picture`, starting at 1.
    pub fn next_label_index(&self, picture: &str) -> Result<LabelIndex, StoreError> {
        let max = self
            .labels(picture)?
            .iter()
            .map(|label| label.index.0)
            .max()
            .unwrap_or(0);
        max.checked_add(1)
            .map(LabelIndex)
            .ok_or_else(|| StoreError::IndexExhausted {
                picture: picture.to_string(),
            })
    }

    /// Checks that `group_id` may be stored on a label.
    pub fn check_label_group(&self, group_id: GroupId) -> Result<(), StoreError> {
        match group_id.position() {
            Some(position) if position < self.groups.len() => Ok(()),
            _ => Err(StoreError::GroupIdOutOfBounds {
                group_id,
                count: self.groups.len(),
            }),
        }
    }

    /// Position of the label inside its picture's list.
    pub fn label_position(&self, picture: &str, index: LabelIndex) -> Result<usize, StoreError> {
        self.labels(picture)?
            .iter()
            .position(|label| label.index == index)
            .ok_or_else(|| StoreError::LabelNotFound {
                picture: picture.to_string(),
                index,
            })
    }

    pub fn add_label(&mut self, picture: &str, label: Label) -> Result<(), StoreError> {
        let end = self.labels(picture)?.len();
        self.insert_label(picture, end, label)
    }

    /// Inserts a label at list position `position` (clamped to the list end).
    pub fn insert_label(
        &mut self,
        picture: &str,
        position: usize,
        label: Label,
    ) -> Result<(), StoreError> {
        let labels = self.labels(picture)?;
        self.check_label_group(label.group_id)?;
        if labels.iter().any(|existing| existing.index == label.index) {
            return Err(StoreError::IndexRepeated {
                picture: picture.to_string(),
                index: label.index,
            });
        }

        debug!(picture, index = label.index.0, group_id = label.group_id.0, "label added");
        let labels = self.labels_mut(picture)?;
        let position = position.min(labels.len());
        labels.insert(position, label.clone());
        self.emit(StoreEvent::LabelAdded {
            picture: picture.to_string(),
            label,
        });
        Ok(())
    }

    pub fn get_label(&self, picture: &str, index: LabelIndex) -> Result<&Label, StoreError> {
        let position = self.label_position(picture, index)?;
        Ok(&self.labels(picture)?[position])
    }

    pub fn remove_label(&mut self, picture: &str, index: LabelIndex) -> Result<Label, StoreError> {
        let position = self.label_position(picture, index)?;
        let label = self.labels_mut(picture)?.remove(position);
        debug!(picture, index = index.0, "label removed");
        self.emit(StoreEvent::LabelRemoved {
            picture: picture.to_string(),
            label: label.clone(),
        });
        Ok(label)
    }

    fn label_mut(&mut self, picture: &str, index: LabelIndex) -> Result<&mut Label, StoreError> {
        let position = self.label_position(picture, index)?;
        Ok(&mut self.labels_mut(picture)?[position])
    }

    /// Returns the previous group id.
    pub fn set_label_group(
        &mut self,
        picture: &str,
        index: LabelIndex,
        group_id: GroupId,
    ) -> Result<GroupId, StoreError> {
        self.label_position(picture, index)?;
        self.check_label_group(group_id)?;
        debug!(picture, index = index.0, group_id = group_id.0, "label group changed");
        let label = self.label_mut(picture, index)?;
        Ok(std::mem::replace(&mut label.group_id, group_id))
    }

    /// Returns the previous index. Fails if `new_index` belongs to another label.
    pub fn set_label_index(
        &mut self,
        picture: &str,
        index: LabelIndex,
        new_index: LabelIndex,
    ) -> Result<LabelIndex, StoreError> {
        self.label_position(picture, index)?;
        if new_index != index && self.label_position(picture, new_index).is_ok() {
            return Err(StoreError::IndexRepeated {
                picture: picture.to_string(),
                index: new_index,
            });
        }
        debug!(picture, index = index.0, new_index = new_index.0, "label index changed");
        let label = self.label_mut(picture, index)?;
        Ok(std::mem::replace(&mut label.index, new_index))
    }

    /// Returns the previous text.
    pub fn set_label_text(
        &mut self,
        picture: &str,
        index: LabelIndex,
        text: &str,
    ) -> Result<String, StoreError> {
        let label = self.label_mut(picture, index)?;
        debug!(picture, index = index.0, "label text changed");
        Ok(std::mem::replace(&mut label.text, text.to_string()))
    }

    /// Returns the previous position.
    pub fn set_label_position(
        &mut self,
        picture: &str,
        index: LabelIndex,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), StoreError> {
        let label = self.label_mut(picture, index)?;
        let previous = (label.x, label.y);
        label.x = x;
        label.y = y;
        Ok(previous)
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("groups", &self.groups)
            .field("pictures", &self.pictures)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn validate(groups: &[Group], pictures: &BTreeMap<String, Vec<Label>>) -> Result<(), IngestError> {
    let mut names = HashSet::new();
    for group in groups {
        if !names.insert(group.name.as_str()) {
            return Err(IngestError::DuplicateGroupName {
                name: group.name.clone(),
            });
        }
        if !is_color_hex(&group.color_hex) {
            return Err(IngestError::MalformedColor {
                name: group.name.clone(),
                color_hex: group.color_hex.clone(),
            });
        }
    }

    for (picture, labels) in pictures {
        let mut indices = HashSet::new();
        for label in labels {
            let in_bounds = label
                .group_id
                .position()
                .is_some_and(|position| position < groups.len());
            if !in_bounds {
                return Err(IngestError::LabelGroupOutOfBounds {
                    picture: picture.clone(),
                    index: label.index,
                    group_id: label.group_id,
                });
            }
            if !indices.insert(label.index) {
                return Err(IngestError::RepeatedLabelIndex {
                    picture: picture.clone(),
                    index: label.index,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
