//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a single execution of a sync item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Create a new random ExecutionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ExecutionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ExecutionId: {e}")))
    }
}

// ============================================================================
// ItemKey
// ============================================================================

/// Stable identifier of a sync item, derived from its configuration
///
/// The key is the first 16 hex characters of a SHA-256 digest over the
/// connector name, source template, bucket and prefix. Two configurations
/// that describe the same mapping always yield the same key, so watermarks
/// survive restarts and config reordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    const LEN: usize = 16;

    /// Derive a key from the parts that identify a sync item
    pub fn derive(connector: &str, source_template: &str, bucket: &str, prefix: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [connector, source_template, bucket, prefix] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex[..Self::LEN].to_string())
    }

    /// Parse an existing key, checking its format
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.len() != Self::LEN || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidItemKey(key));
        }
        Ok(Self(key.to_ascii_lowercase()))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// RemotePath
// ============================================================================

/// An absolute, `/`-separated path on the remote endpoint
///
/// Invariants:
/// - starts with `/`
/// - has no trailing `/` unless it is the root
/// - contains no `..` segments, empty segments or NUL bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Creates a validated remote path
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "must be absolute: {path}"
            )));
        }
        if path.contains('\0') {
            return Err(DomainError::InvalidRemotePath(format!(
                "contains NUL byte: {path:?}"
            )));
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        for segment in trimmed[1..].split('/') {
            if segment.is_empty() || segment == ".." || segment == "." {
                return Err(DomainError::InvalidRemotePath(format!(
                    "invalid segment {segment:?} in {path}"
                )));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The remote root `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root path
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Appends a single path segment
    pub fn join(&self, segment: &str) -> Result<Self, DomainError> {
        let segment = segment.trim_matches('/');
        if self.is_root() {
            Self::new(format!("/{segment}"))
        } else {
            Self::new(format!("{}/{segment}", self.0))
        }
    }

    /// Returns the last path segment, or `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// Returns the part of this path below `base`, without a leading `/`
    ///
    /// Returns `None` when this path is not strictly inside `base`.
    pub fn relative_to(&self, base: &RemotePath) -> Option<&str> {
        if base.is_root() {
            return self.0.strip_prefix('/').filter(|rest| !rest.is_empty());
        }
        self.0
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Folder name usable as a single path component in report layouts
    ///
    /// `/outbound/2024/03` becomes `outbound-2024-03`; the root becomes `root`.
    pub fn safe_folder_name(&self) -> String {
        if self.is_root() {
            return "root".to_string();
        }
        self.0[1..].replace('/', "-")
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// BucketName / KeyPrefix / ConnectorName
// ============================================================================

/// Name of an object-storage bucket
///
/// Normalised on construction: an `s3://` scheme is stripped, surrounding
/// slashes are removed and the name is lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Creates a normalised bucket name
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let raw = name.into();
        let normalized = raw
            .trim()
            .trim_start_matches("s3://")
            .trim_matches('/')
            .to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidBucketName(raw));
        }
        if normalized.contains('/') || normalized.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidBucketName(raw));
        }
        Ok(Self(normalized))
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BucketName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

/// Object key prefix inside a bucket, stored without leading or trailing `/`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Creates a prefix, trimming surrounding slashes
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self(prefix.as_ref().trim().trim_matches('/').to_string())
    }

    /// Returns the prefix as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no prefix is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds an object key from this prefix and a remote path
    pub fn key_for(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.0.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{relative}", self.0)
        }
    }
}

impl Display for KeyPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyPrefix {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<KeyPrefix> for String {
    fn from(prefix: KeyPrefix) -> Self {
        prefix.0
    }
}

/// Connector name, restricted to lowercase ASCII letters, digits and `-`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectorName(String);

impl ConnectorName {
    /// Creates a connector name, lowercasing and dropping disallowed characters
    pub fn new(name: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = name.as_ref();
        let sanitized: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();
        if sanitized.is_empty() {
            return Err(DomainError::InvalidConnectorName(raw.to_string()));
        }
        Ok(Self(sanitized))
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConnectorName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConnectorName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConnectorName> for String {
    fn from(name: ConnectorName) -> Self {
        name.0
    }
}
