use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::{Group, GroupId, Label};

pub const DEFAULT_VERSION: [u32; 2] = [1, 0];
pub const DEFAULT_COMMENT: &str = "Default Comment\nYou can edit me";

/// The document as exchanged with project loaders and writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransFile {
    #[serde(default = "default_version")]
    pub version: [u32; 2],
    #[serde(default = "default_comment")]
    pub comment: String,
    #[serde(default)]
    pub group_list: Vec<Group>,
    /// Written with picture names in natural order.
    #[serde(default, serialize_with = "serialize_natural")]
    pub trans_map: BTreeMap<String, Vec<Label>>,
}

fn serialize_natural<S>(
    map: &BTreeMap<String, Vec<Label>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| natord::compare(a, b));
    serializer.collect_map(entries)
}

fn default_version() -> [u32; 2] {
    DEFAULT_VERSION
}

fn default_comment() -> String {
    DEFAULT_COMMENT.to_string()
}

impl Default for TransFile {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            comment: default_comment(),
            group_list: Vec::new(),
            trans_map: BTreeMap::new(),
        }
    }
}

impl TransFile {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Structural change emitted by the entity store after a list mutation.
/// In-place field edits (rename, recolor, text, group or index change) do not
/// emit events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StoreEvent {
    GroupAdded {
        group_id: GroupId,
        group: Group,
    },
    GroupRemoved {
        group_id: GroupId,
        group: Group,
    },
    PictureAdded {
        picture: String,
    },
    PictureRemoved {
        picture: String,
    },
    LabelAdded {
        picture: String,
        label: Label,
    },
    LabelRemoved {
        picture: String,
        label: Label,
    },
}
