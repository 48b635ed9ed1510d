//! RemoteEntry domain entity
//!
//! One file returned by a directory listing. Entries are transient: they live
//! for the duration of a single execution and are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemotePath;

/// A single listed remote file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    name: String,
    path: RemotePath,
    last_modified: DateTime<Utc>,
    size_bytes: u64,
}

impl RemoteEntry {
    /// Creates a new entry; the name is taken from the last path segment
    pub fn new(path: RemotePath, last_modified: DateTime<Utc>, size_bytes: u64) -> Self {
        let name = path.file_name().unwrap_or_default().to_string();
        Self {
            name,
            path,
            last_modified,
            size_bytes,
        }
    }

    /// File name without directory
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full resolved remote path
    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    /// Last-modified instant reported by the remote endpoint
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
