//! Tree-shaped read model of one picture's labels.
//!
//! The projection consumes [`StoreEvent`]s and patches its tree in place.
//! Only a mode switch, an explicit [`ViewProjection::rebuild`] or a layout
//! edit flagged through [`ViewProjection::invalidate`] re-derives the whole
//! tree from the store.

use crossbeam_channel::Receiver;
use shared::{
    domain::{GroupId, Label, LabelIndex, ViewMode},
    error::StoreError,
    protocol::StoreEvent,
};
use storage::EntityStore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

pub const ROOT: NodeId = NodeId(0);

/// What a tree node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Group(GroupId),
    Label(LabelIndex),
}

/// One visible line of the fully expanded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub id: NodeId,
    pub depth: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
struct LabelNode {
    id: NodeId,
    index: LabelIndex,
}

#[derive(Debug, Clone)]
struct GroupNode {
    id: NodeId,
    labels: Vec<LabelNode>,
}

#[derive(Debug, Clone)]
enum Tree {
    Flat(Vec<LabelNode>),
    Grouped(Vec<GroupNode>),
}

impl Tree {
    fn empty(mode: ViewMode) -> Self {
        match mode {
            ViewMode::Flat => Self::Flat(Vec::new()),
            ViewMode::Grouped => Self::Grouped(Vec::new()),
        }
    }

    fn mode(&self) -> ViewMode {
        match self {
            Self::Flat(_) => ViewMode::Flat,
            Self::Grouped(_) => ViewMode::Grouped,
        }
    }
}

#[derive(Debug)]
pub struct ViewProjection {
    events: Receiver<StoreEvent>,
    picture: Option<String>,
    tree: Tree,
    next_id: u64,
    selection: Vec<NodeId>,
    selected_group: Option<GroupId>,
    selected_label: Option<LabelIndex>,
    stale: bool,
}

impl ViewProjection {
    /// Subscribes to `store` and builds the initial tree (no picture shown).
    pub fn attach(store: &mut EntityStore, mode: ViewMode) -> Self {
        let events = store.subscribe();
        let mut view = Self {
            events,
            picture: None,
            tree: Tree::empty(mode),
            next_id: 0,
            selection: Vec::new(),
            selected_group: None,
            selected_label: None,
            stale: false,
        };
        view.rebuild(store);
        view
    }

    pub fn mode(&self) -> ViewMode {
        self.tree.mode()
    }

    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }

    fn alloc(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    // ----- full rebuilds -----

    /// Re-derives the tree from the live store, dropping pending events. The
    /// root, group and label selections that still resolve are restored.
    pub fn rebuild(&mut self, store: &EntityStore) {
        while self.events.try_recv().is_ok() {}
        self.stale = false;

        let root_selected = self.selection.contains(&ROOT);
        let labels = self.selected_labels();
        let group = self.selected_group;
        let focused = self.selected_label;
        self.clear_selection();

        let mut tree = Tree::empty(self.mode());
        if let Tree::Grouped(groups) = &mut tree {
            for _ in 0..store.group_count() {
                self.next_id += 1;
                groups.push(GroupNode {
                    id: NodeId(self.next_id),
                    labels: Vec::new(),
                });
            }
        }
        self.tree = tree;

        if let Some(picture) = self.picture.clone() {
            match store.labels(&picture) {
                Ok(labels) => {
                    for label in labels {
                        self.insert_label_node(label);
                    }
                }
                Err(_) => self.picture = None,
            }
        }

        if root_selected {
            self.select_root(false);
        }
        if let Some(group_id) = group {
            if self.select_group(group_id, false).is_err() {
                debug!(group_id = group_id.0, "selected group did not survive rebuild");
            }
        }
        self.select_labels(&labels, false);
        self.selected_label = focused.filter(|index| self.label_node(*index).is_some());
        debug!(mode = ?self.mode(), picture = ?self.picture, "projection rebuilt");
    }

    /// Marks the tree as out of step with the store. The next
    /// [`Self::refresh`] ends with a full rebuild.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn request_update(&mut self, store: &EntityStore) {
        self.rebuild(store);
    }

    pub fn set_view_mode(&mut self, mode: ViewMode, store: &EntityStore) {
        if self.mode() == mode {
            return;
        }
        self.tree = Tree::empty(mode);
        self.rebuild(store);
    }

    pub fn show_picture(&mut self, store: &EntityStore, picture: &str) -> Result<(), StoreError> {
        store.labels(picture)?;
        self.picture = Some(picture.to_string());
        self.clear_selection();
        self.rebuild(store);
        Ok(())
    }

    pub fn hide_picture(&mut self, store: &EntityStore) {
        self.picture = None;
        self.rebuild(store);
    }

    // ----- incremental hooks -----

    /// Applies pending events, then rebuilds if the tree was invalidated.
    /// Events still run first so selection follows group and label removals.
    pub fn refresh(&mut self, store: &EntityStore) {
        self.sync();
        if self.stale {
            self.rebuild(store);
        }
    }

    /// Drains and applies every pending store event.
    pub fn sync(&mut self) {
        let pending: Vec<StoreEvent> = self.events.try_iter().collect();
        for event in &pending {
            self.apply(event);
        }
    }

    pub fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::GroupAdded { group_id, .. } => self.on_group_added(*group_id),
            StoreEvent::GroupRemoved { group_id, .. } => self.on_group_removed(*group_id),
            StoreEvent::PictureAdded { .. } => {}
            StoreEvent::PictureRemoved { picture } => self.on_picture_removed(picture),
            StoreEvent::LabelAdded { picture, label } => self.on_label_added(picture, label),
            StoreEvent::LabelRemoved { picture, label } => self.on_label_removed(picture, label),
        }
    }

    pub fn on_group_added(&mut self, group_id: GroupId) {
        let id = self.alloc();
        let Tree::Grouped(groups) = &mut self.tree else {
            return;
        };
        let position = group_id.position().unwrap_or(0).min(groups.len());
        groups.insert(
            position,
            GroupNode {
                id,
                labels: Vec::new(),
            },
        );
        if let Some(selected) = self.selected_group {
            if selected >= group_id {
                self.selected_group = Some(GroupId(selected.0 + 1));
            }
        }
        debug!(group_id = group_id.0, "group node inserted");
    }

    pub fn on_group_removed(&mut self, group_id: GroupId) {
        let Tree::Grouped(groups) = &self.tree else {
            return;
        };
        let Some(position) = group_id.position().filter(|p| *p < groups.len()) else {
            warn!(group_id = group_id.0, "removed group has no node");
            return;
        };

        let node = &groups[position];
        if !node.labels.is_empty() {
            warn!(
                group_id = group_id.0,
                labels = node.labels.len(),
                "removing group node that still holds labels"
            );
        }
        let mut detached = vec![node.id];
        detached.extend(node.labels.iter().map(|label| label.id));
        let held_selected = self
            .selected_label
            .is_some_and(|index| node.labels.iter().any(|label| label.index == index));

        // Deselect before detaching.
        self.deselect(&detached);
        if held_selected {
            self.selected_label = None;
        }
        self.selected_group = match self.selected_group {
            Some(selected) if selected == group_id => None,
            Some(selected) if selected > group_id => Some(GroupId(selected.0 - 1)),
            other => other,
        };

        if let Tree::Grouped(groups) = &mut self.tree {
            groups.remove(position);
        }
        debug!(group_id = group_id.0, "group node removed");
    }

    pub fn on_label_added(&mut self, picture: &str, label: &Label) {
        if self.picture.as_deref() != Some(picture) {
            return;
        }
        if self.insert_label_node(label) {
            debug!(picture, index = label.index.0, "label node inserted");
        }
    }

    pub fn on_label_removed(&mut self, picture: &str, label: &Label) {
        if self.picture.as_deref() != Some(picture) {
            return;
        }
        let Some((group, position)) = self.find_label(label.index, Some(label.group_id)) else {
            warn!(picture, index = label.index.0, "removed label has no node");
            return;
        };

        let siblings = match (&mut self.tree, group) {
            (Tree::Flat(nodes), _) => nodes,
            (Tree::Grouped(groups), Some(group)) => &mut groups[group].labels,
            (Tree::Grouped(_), None) => return,
        };
        let node = siblings.remove(position);

        self.deselect(&[node.id]);
        if self.selected_label == Some(node.index) {
            self.selected_label = None;
        }
        debug!(picture, index = label.index.0, "label node removed");
    }

    pub fn on_picture_removed(&mut self, picture: &str) {
        if self.picture.as_deref() != Some(picture) {
            return;
        }
        self.clear_selection();
        self.picture = None;
        match &mut self.tree {
            Tree::Flat(nodes) => nodes.clear(),
            Tree::Grouped(groups) => groups.iter_mut().for_each(|group| group.labels.clear()),
        }
    }

    /// Ordered insert: before the first sibling with a larger index.
    fn insert_label_node(&mut self, label: &Label) -> bool {
        let id = self.alloc();
        let siblings = match &mut self.tree {
            Tree::Flat(nodes) => nodes,
            Tree::Grouped(groups) => {
                match label.group_id.position().and_then(|p| groups.get_mut(p)) {
                    Some(group) => &mut group.labels,
                    None => {
                        warn!(
                            index = label.index.0,
                            group_id = label.group_id.0,
                            "label references a group without node"
                        );
                        return false;
                    }
                }
            }
        };
        let position = siblings
            .iter()
            .position(|node| node.index > label.index)
            .unwrap_or(siblings.len());
        siblings.insert(
            position,
            LabelNode {
                id,
                index: label.index,
            },
        );
        true
    }

    /// Finds a label node, trying the `hint` group first.
    fn find_label(
        &self,
        index: LabelIndex,
        hint: Option<GroupId>,
    ) -> Option<(Option<usize>, usize)> {
        match &self.tree {
            Tree::Flat(nodes) => nodes
                .iter()
                .position(|node| node.index == index)
                .map(|position| (None, position)),
            Tree::Grouped(groups) => {
                let hinted = hint
                    .and_then(GroupId::position)
                    .and_then(|group| Some((group, groups.get(group)?)))
                    .and_then(|(group, node)| {
                        let position = node.labels.iter().position(|l| l.index == index)?;
                        Some((Some(group), position))
                    });
                if hinted.is_some() {
                    return hinted;
                }
                let found = groups.iter().enumerate().find_map(|(group, node)| {
                    let position = node.labels.iter().position(|l| l.index == index)?;
                    Some((Some(group), position))
                });
                if found.is_some() {
                    warn!(index = index.0, "label node found outside its group");
                }
                found
            }
        }
    }

    // ----- read model -----

    /// Label indices in row order.
    pub fn label_order(&self) -> Vec<LabelIndex> {
        match &self.tree {
            Tree::Flat(nodes) => nodes.iter().map(|node| node.index).collect(),
            Tree::Grouped(groups) => groups
                .iter()
                .flat_map(|group| group.labels.iter().map(|node| node.index))
                .collect(),
        }
    }

    /// Children of a group node; `None` in flat mode or for unknown groups.
    pub fn group_children(&self, group_id: GroupId) -> Option<Vec<LabelIndex>> {
        let Tree::Grouped(groups) = &self.tree else {
            return None;
        };
        let group = groups.get(group_id.position()?)?;
        Some(group.labels.iter().map(|node| node.index).collect())
    }

    pub fn group_node_count(&self) -> usize {
        match &self.tree {
            Tree::Flat(_) => 0,
            Tree::Grouped(groups) => groups.len(),
        }
    }

    /// The fully expanded tree, depth first, root first.
    pub fn rows(&self) -> Vec<Row> {
        let mut rows = vec![Row {
            id: ROOT,
            depth: 0,
            kind: NodeKind::Root,
        }];
        match &self.tree {
            Tree::Flat(nodes) => rows.extend(nodes.iter().map(|node| Row {
                id: node.id,
                depth: 1,
                kind: NodeKind::Label(node.index),
            })),
            Tree::Grouped(groups) => {
                for (position, group) in groups.iter().enumerate() {
                    rows.push(Row {
                        id: group.id,
                        depth: 1,
                        kind: NodeKind::Group(GroupId::from_position(position)),
                    });
                    rows.extend(group.labels.iter().map(|node| Row {
                        id: node.id,
                        depth: 2,
                        kind: NodeKind::Label(node.index),
                    }));
                }
            }
        }
        rows
    }

    pub fn row_of(&self, id: NodeId) -> Option<usize> {
        self.rows().iter().position(|row| row.id == id)
    }

    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.rows()
            .into_iter()
            .find(|row| row.id == id)
            .map(|row| row.kind)
    }

    pub fn label_node(&self, index: LabelIndex) -> Option<NodeId> {
        let (group, position) = self.find_label(index, None)?;
        match (&self.tree, group) {
            (Tree::Flat(nodes), _) => Some(nodes[position].id),
            (Tree::Grouped(groups), Some(group)) => Some(groups[group].labels[position].id),
            (Tree::Grouped(_), None) => None,
        }
    }

    pub fn group_node(&self, group_id: GroupId) -> Option<NodeId> {
        let Tree::Grouped(groups) = &self.tree else {
            return None;
        };
        groups.get(group_id.position()?).map(|group| group.id)
    }

    // ----- selection -----

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn selected_group_id(&self) -> Option<GroupId> {
        self.selected_group
    }

    pub fn selected_label_index(&self) -> Option<LabelIndex> {
        self.selected_label
    }

    /// Selected label indices in row order.
    pub fn selected_labels(&self) -> Vec<LabelIndex> {
        self.rows()
            .into_iter()
            .filter(|row| self.selection.contains(&row.id))
            .filter_map(|row| match row.kind {
                NodeKind::Label(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selected_group = None;
        self.selected_label = None;
    }

    fn deselect(&mut self, ids: &[NodeId]) {
        self.selection.retain(|id| !ids.contains(id));
    }

    /// Adds a node to the selection and updates the matching observable.
    pub fn select_node(&mut self, id: NodeId, clear: bool) -> bool {
        let Some(kind) = self.node_kind(id) else {
            return false;
        };
        if clear {
            self.clear_selection();
        }
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
        match kind {
            NodeKind::Root => {}
            NodeKind::Group(group_id) => self.selected_group = Some(group_id),
            NodeKind::Label(index) => self.selected_label = Some(index),
        }
        true
    }

    pub fn select_root(&mut self, clear: bool) {
        self.select_node(ROOT, clear);
    }

    pub fn select_label(&mut self, index: LabelIndex, clear: bool) -> Result<(), StoreError> {
        let id = self
            .label_node(index)
            .ok_or_else(|| StoreError::LabelNotFound {
                picture: self.picture.clone().unwrap_or_default(),
                index,
            })?;
        self.select_node(id, clear);
        Ok(())
    }

    /// Selects every listed label that has a node; returns how many did.
    pub fn select_labels(&mut self, indices: &[LabelIndex], clear: bool) -> usize {
        if clear {
            self.clear_selection();
        }
        let nodes: Vec<NodeId> = indices
            .iter()
            .filter_map(|index| self.label_node(*index))
            .collect();
        nodes
            .into_iter()
            .filter(|id| self.select_node(*id, false))
            .count()
    }

    /// No-op in flat mode, which has no group nodes.
    pub fn select_group(&mut self, group_id: GroupId, clear: bool) -> Result<(), StoreError> {
        if self.mode() == ViewMode::Flat {
            return Ok(());
        }
        let id = self
            .group_node(group_id)
            .ok_or(StoreError::IndexOutOfBounds {
                group_id,
                count: self.group_node_count(),
            })?;
        self.select_node(id, clear);
        Ok(())
    }

    /// Selects the first label row, or the root when there are no labels.
    pub fn select_first(&mut self, clear: bool) -> Option<LabelIndex> {
        let first = self.label_order().first().copied();
        self.select_edge(first, clear)
    }

    pub fn select_last(&mut self, clear: bool) -> Option<LabelIndex> {
        let last = self.label_order().last().copied();
        self.select_edge(last, clear)
    }

    fn select_edge(&mut self, index: Option<LabelIndex>, clear: bool) -> Option<LabelIndex> {
        match index {
            Some(index) => self.select_label(index, clear).ok().map(|()| index),
            None => {
                self.select_root(clear);
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
