use serde::{Deserialize, Serialize};

/// One document to copy, preview and publish
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Opaque download handle for the source document
    pub source_ref: String,
    /// Logical destination path
    pub path: String,
}

impl WorkItem {
    pub fn new(source_ref: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            path: path.into(),
        }
    }
}
