use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Position of a group in the group list. Dense, 0-based.
id_newtype!(GroupId);
// Label number, unique within one picture.
id_newtype!(LabelIndex);

impl GroupId {
    /// Position in the group list, if non-negative.
    pub fn position(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    pub fn from_position(position: usize) -> Self {
        Self(position as i64)
    }
}

pub const DEFAULT_COLOR_HEX_LIST: [&str; 9] = [
    "FF0000", "0000FF", "008000", "1E90FF", "FFD700", "FF00FF", "A0522D", "FF4500", "9400D3",
];

/// True when `value` is exactly six hex digits.
pub fn is_color_hex(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    pub color_hex: String,
}

impl Group {
    pub fn new(name: impl Into<String>, color_hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_hex: color_hex.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub index: LabelIndex,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub group_id: GroupId,
    #[serde(default)]
    pub text: String,
}

impl Label {
    pub fn new(index: i64, group_id: i64, text: impl Into<String>) -> Self {
        Self {
            index: LabelIndex(index),
            x: 0.0,
            y: 0.0,
            group_id: GroupId(group_id),
            text: text.into(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// All labels directly under the root, ordered by index.
    Flat,
    /// One node per group, labels under their group.
    #[default]
    Grouped,
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "index" => Ok(Self::Flat),
            "grouped" | "group" => Ok(Self::Grouped),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}
