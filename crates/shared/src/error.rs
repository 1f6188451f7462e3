use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{GroupId, LabelIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    DuplicateName,
    IndexNegative,
    IndexOutOfBounds,
    IndexRepeated,
    GroupIdOutOfBounds,
    PictureNotFound,
    LabelNotFound,
    GroupNotFound,
    GroupInUse,
    MalformedColor,
    IndexExhausted,
}

/// Recoverable failure of a document operation. A failed call leaves the
/// document untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("name '{name}' is already in use")]
    DuplicateName { name: String },
    #[error("group id {group_id} is negative")]
    IndexNegative { group_id: GroupId },
    #[error("group id {group_id} is out of bounds (group count {count})")]
    IndexOutOfBounds { group_id: GroupId, count: usize },
    #[error("label index {index} is already used in picture '{picture}'")]
    IndexRepeated { picture: String, index: LabelIndex },
    #[error("label group id {group_id} is out of bounds (group count {count})")]
    GroupIdOutOfBounds { group_id: GroupId, count: usize },
    #[error("picture '{picture}' not found")]
    PictureNotFound { picture: String },
    #[error("label {index} not found in picture '{picture}'")]
    LabelNotFound { picture: String, index: LabelIndex },
    #[error("group '{name}' not found")]
    GroupNotFound { name: String },
    #[error("group {group_id} is still referenced by labels")]
    GroupInUse { group_id: GroupId },
    #[error("color '{color_hex}' is not six hex digits")]
    MalformedColor { color_hex: String },
    #[error("picture '{picture}' has no label index left after the highest one")]
    IndexExhausted { picture: String },
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateName { .. } => ErrorCode::DuplicateName,
            Self::IndexNegative { .. } => ErrorCode::IndexNegative,
            Self::IndexOutOfBounds { .. } => ErrorCode::IndexOutOfBounds,
            Self::IndexRepeated { .. } => ErrorCode::IndexRepeated,
            Self::GroupIdOutOfBounds { .. } => ErrorCode::GroupIdOutOfBounds,
            Self::PictureNotFound { .. } => ErrorCode::PictureNotFound,
            Self::LabelNotFound { .. } => ErrorCode::LabelNotFound,
            Self::GroupNotFound { .. } => ErrorCode::GroupNotFound,
            Self::GroupInUse { .. } => ErrorCode::GroupInUse,
            Self::MalformedColor { .. } => ErrorCode::MalformedColor,
            Self::IndexExhausted { .. } => ErrorCode::IndexExhausted,
        }
    }
}

/// An input document that violates the structural invariants. Construction
/// is aborted entirely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("group name '{name}' appears more than once")]
    DuplicateGroupName { name: String },
    #[error("group '{name}' has malformed color '{color_hex}'")]
    MalformedColor { name: String, color_hex: String },
    #[error("label {index} in picture '{picture}' references missing group {group_id}")]
    LabelGroupOutOfBounds {
        picture: String,
        index: LabelIndex,
        group_id: GroupId,
    },
    #[error("label index {index} appears more than once in picture '{picture}'")]
    RepeatedLabelIndex { picture: String, index: LabelIndex },
}
