//! Path and request model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used by the driver's native path strings.
pub const PATH_SEPARATOR: char = '\\';

/// Ordered sequence of name components. The empty sequence is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathHierarchy {
    components: Vec<String>,
}

impl PathHierarchy {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a driver path such as `\docs\a.txt`.
    ///
    /// Empty components are dropped, so `\`, `` and `\\` all denote the root
    /// and a trailing separator is ignored.
    pub fn parse(raw: &str) -> Self {
        Self {
            components: raw
                .split(PATH_SEPARATOR)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Build from components, skipping empty ones.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components
                .into_iter()
                .map(Into::<String>::into)
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// All components but the last. The parent of the root is the root.
    pub fn parent(&self) -> PathHierarchy {
        let end = self.components.len().saturating_sub(1);
        Self {
            components: self.components[..end].to_vec(),
        }
    }

    /// Append a component.
    pub fn join(&self, name: impl Into<String>) -> PathHierarchy {
        let mut components = self.components.clone();
        let name = name.into();
        if !name.is_empty() {
            components.push(name);
        }
        Self { components }
    }

    /// True when `self` is `other` or lies beneath it.
    pub fn starts_with(&self, other: &PathHierarchy) -> bool {
        self.components.starts_with(&other.components)
    }
}

impl fmt::Display for PathHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "{PATH_SEPARATOR}");
        }
        for component in &self.components {
            write!(f, "{PATH_SEPARATOR}{component}")?;
        }
        Ok(())
    }
}

impl From<&str> for PathHierarchy {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl<const N: usize> From<[&str; N]> for PathHierarchy {
    fn from(components: [&str; N]) -> Self {
        Self::from_components(components)
    }
}

/// Entry-type hint carried with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    File,
    Directory,
    /// The mount point itself.
    Device,
}

impl EntryType {
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryType::Directory | EntryType::Device)
    }
}

/// Backend-issued handle to an opened node.
///
/// Identifies a node slot plus the generation that slot had when the handle
/// was issued. Backends must refuse handles whose generation is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    id: u64,
    generation: u64,
    append: bool,
}

impl FileHandle {
    pub fn new(id: u64, generation: u64) -> Self {
        Self {
            id,
            generation,
            append: false,
        }
    }

    /// Mark the handle so writes through it land at end of stream.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_append(&self) -> bool {
        self.append
    }
}

/// Per-call request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub path: PathHierarchy,
    pub entry_type: EntryType,
    /// Handle from a previous open, used instead of re-resolving `path`.
    pub handle: Option<FileHandle>,
}

impl RequestMeta {
    pub fn new(path: impl Into<PathHierarchy>, entry_type: EntryType) -> Self {
        Self {
            path: path.into(),
            entry_type,
            handle: None,
        }
    }

    /// Request against a file path.
    pub fn file(path: impl Into<PathHierarchy>) -> Self {
        Self::new(path, EntryType::File)
    }

    /// Request against a directory path.
    pub fn directory(path: impl Into<PathHierarchy>) -> Self {
        Self::new(path, EntryType::Directory)
    }

    pub fn with_handle(mut self, handle: Option<FileHandle>) -> Self {
        self.handle = handle;
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}
