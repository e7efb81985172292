//! Outcome vocabulary shared by every backend.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// Closed set of outcomes a storage operation can report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
pub enum OperationResult {
    Success,
    PathNotFound,
    FileNotFound,
    DirectoryNotFound,
    NotADirectory,
    IsDirectoryNotFile,
    AlreadyExists,
    ObjectNameCollision,
    DirectoryNotEmpty,
}

/// Broad grouping of the failure outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FailureClass {
    NotFound,
    Conflict,
    TypeMismatch,
    NonEmpty,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success)
    }

    /// Failure class, `None` for [`OperationResult::Success`].
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            OperationResult::Success => None,
            OperationResult::PathNotFound
            | OperationResult::FileNotFound
            | OperationResult::DirectoryNotFound => Some(FailureClass::NotFound),
            OperationResult::AlreadyExists | OperationResult::ObjectNameCollision => {
                Some(FailureClass::Conflict)
            }
            OperationResult::NotADirectory | OperationResult::IsDirectoryNotFile => {
                Some(FailureClass::TypeMismatch)
            }
            OperationResult::DirectoryNotEmpty => Some(FailureClass::NonEmpty),
        }
    }
}
