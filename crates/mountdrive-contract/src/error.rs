//! Storage error types.

use thiserror::Error;

use crate::path::PathHierarchy;
use crate::result::OperationResult;

/// Storage error type.
///
/// Every variant except [`StorageError::Fault`] is an expected outcome and
/// maps to exactly one [`OperationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// An intermediate component is missing or not a directory.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// File or node not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsDirectoryNotFile(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Destination name is taken.
    #[error("object name collision: {0}")]
    ObjectNameCollision(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Something the backend did not expect, such as a node vanishing between
    /// resolution and use.
    #[error("storage fault: {0}")]
    Fault(String),
}

impl StorageError {
    /// Create a PathNotFound error.
    pub fn path_not_found(path: &PathHierarchy) -> Self {
        Self::PathNotFound(path.to_string())
    }

    /// Create a FileNotFound error.
    pub fn file_not_found(path: &PathHierarchy) -> Self {
        Self::FileNotFound(path.to_string())
    }

    /// Create a DirectoryNotFound error.
    pub fn directory_not_found(path: &PathHierarchy) -> Self {
        Self::DirectoryNotFound(path.to_string())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: &PathHierarchy) -> Self {
        Self::NotADirectory(path.to_string())
    }

    /// Create an IsDirectoryNotFile error.
    pub fn is_directory(path: &PathHierarchy) -> Self {
        Self::IsDirectoryNotFile(path.to_string())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: &PathHierarchy) -> Self {
        Self::AlreadyExists(path.to_string())
    }

    /// Create an ObjectNameCollision error.
    pub fn name_collision(path: &PathHierarchy) -> Self {
        Self::ObjectNameCollision(path.to_string())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: &PathHierarchy) -> Self {
        Self::DirectoryNotEmpty(path.to_string())
    }

    /// Create a Fault error.
    pub fn fault(msg: impl Into<String>) -> Self {
        Self::Fault(msg.into())
    }

    /// The outcome this error reports, `None` for faults.
    pub fn result(&self) -> Option<OperationResult> {
        match self {
            StorageError::PathNotFound(_) => Some(OperationResult::PathNotFound),
            StorageError::FileNotFound(_) => Some(OperationResult::FileNotFound),
            StorageError::DirectoryNotFound(_) => Some(OperationResult::DirectoryNotFound),
            StorageError::NotADirectory(_) => Some(OperationResult::NotADirectory),
            StorageError::IsDirectoryNotFile(_) => Some(OperationResult::IsDirectoryNotFile),
            StorageError::AlreadyExists(_) => Some(OperationResult::AlreadyExists),
            StorageError::ObjectNameCollision(_) => Some(OperationResult::ObjectNameCollision),
            StorageError::DirectoryNotEmpty(_) => Some(OperationResult::DirectoryNotEmpty),
            StorageError::Fault(_) => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, StorageError::Fault(_))
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_mapping() {
        let path = PathHierarchy::parse("\\docs\\a.txt");
        assert_eq!(
            StorageError::file_not_found(&path).result(),
            Some(OperationResult::FileNotFound)
        );
        assert_eq!(
            StorageError::name_collision(&path).result(),
            Some(OperationResult::ObjectNameCollision)
        );
        assert_eq!(StorageError::fault("boom").result(), None);
        assert!(StorageError::fault("boom").is_fault());
    }

    #[test]
    fn test_messages_carry_path() {
        let path = PathHierarchy::parse("\\docs");
        assert_eq!(
            StorageError::directory_not_empty(&path).to_string(),
            "directory not empty: \\docs"
        );
    }
}
