//! SyncItem domain entity
//!
//! A sync item maps one remote source folder template onto one bucket and
//! key prefix. Items are built from configuration and stay immutable for the
//! duration of an execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{BucketName, ConnectorName, ItemKey, KeyPrefix, RemotePath};
use super::remote_entry::RemoteEntry;
use super::schedule::Schedule;
use super::template;

/// Where listed files are copied to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSpec {
    pub bucket: BucketName,
    #[serde(default)]
    pub prefix: KeyPrefix,
    /// Encryption key reference handed to the dispatcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

/// Concrete destination of one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetLocation {
    pub bucket: BucketName,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

impl std::fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// A configured source-folder-to-bucket mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    key: ItemKey,
    connector: ConnectorName,
    source_template: String,
    recursive: bool,
    target: TargetSpec,
    schedule: Schedule,
}

impl SyncItem {
    /// Creates an item, deriving its key from the connector, source and target
    pub fn new(
        connector: ConnectorName,
        source_template: impl Into<String>,
        recursive: bool,
        target: TargetSpec,
        schedule: Schedule,
    ) -> Result<Self, DomainError> {
        let source_template = normalize_folder(&source_template.into());
        // Validate the template shape up front; tags resolve to digits only
        RemotePath::new(template::resolve(&source_template, Utc::now()))?;
        let key = ItemKey::derive(
            connector.as_str(),
            &source_template,
            target.bucket.as_str(),
            target.prefix.as_str(),
        );
        Ok(Self {
            key,
            connector,
            source_template,
            recursive,
            target,
            schedule,
        })
    }

    pub fn key(&self) -> &ItemKey {
        &self.key
    }

    pub fn connector(&self) -> &ConnectorName {
        &self.connector
    }

    /// Remote folder, possibly containing date tags
    pub fn source_template(&self) -> &str {
        &self.source_template
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Resolves the source template for a trigger instant
    pub fn resolve_source(&self, trigger_instant: DateTime<Utc>) -> Result<RemotePath, DomainError> {
        RemotePath::new(template::resolve(&self.source_template, trigger_instant))
    }

    /// Destination for `entry`
    ///
    /// The key is the prefix followed by the full remote path of the entry,
    /// so files from different resolved date folders never share a key.
    pub fn target_for(&self, entry: &RemoteEntry) -> TargetLocation {
        TargetLocation {
            bucket: self.target.bucket.clone(),
            key: self.target.prefix.key_for(entry.path().as_str()),
            kms_key_id: self.target.kms_key_id.clone(),
        }
    }
}

/// Normalises a configured remote folder: one leading `/`, no trailing `/`
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(template: &str, prefix: &str) -> SyncItem {
        SyncItem::new(
            ConnectorName::new("partner-a").unwrap(),
            template,
            true,
            TargetSpec {
                bucket: BucketName::new("landing").unwrap(),
                prefix: KeyPrefix::new(prefix),
                kms_key_id: None,
            },
            Schedule::parse("@daily").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder("outbound/"), "/outbound");
        assert_eq!(normalize_folder("//a/b//"), "/a/b");
        assert_eq!(normalize_folder(""), "/");
    }

    #[test]
    fn test_key_is_derived_from_normalized_config() {
        assert_eq!(item("outbound/", "in").key(), item("/outbound", "/in/").key());
        assert_ne!(item("/outbound", "in").key(), item("/outbound", "other").key());
    }

    #[test]
    fn test_invalid_template_rejected() {
        let result = SyncItem::new(
            ConnectorName::new("c").unwrap(),
            "/a/../b",
            false,
            TargetSpec {
                bucket: BucketName::new("b").unwrap(),
                prefix: KeyPrefix::default(),
                kms_key_id: None,
            },
            Schedule::parse("@daily").unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_source() {
        let item = item("/outbound/%year%/%month%", "in");
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(item.resolve_source(at).unwrap().as_str(), "/outbound/2024/03");
    }

    #[test]
    fn test_target_keeps_remote_layout() {
        let item = item("/outbound", "partner-a/in");
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = RemoteEntry::new(RemotePath::new("/outbound/sub/x.csv").unwrap(), when, 1);

        let target = item.target_for(&entry);
        assert_eq!(target.bucket.as_str(), "landing");
        assert_eq!(target.key, "partner-a/in/outbound/sub/x.csv");
        assert_eq!(
            target.to_string(),
            "s3://landing/partner-a/in/outbound/sub/x.csv"
        );
    }

    #[test]
    fn test_date_partitions_map_to_distinct_keys() {
        let item = item("/outbound/%year%/%month%/%day%", "in");
        let day1 = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();

        let keys: Vec<String> = [day1, day2]
            .into_iter()
            .map(|at| {
                let root = item.resolve_source(at).unwrap();
                let entry = RemoteEntry::new(root.join("report.csv").unwrap(), at, 1);
                item.target_for(&entry).key
            })
            .collect();

        assert_eq!(keys[0], "in/outbound/2024/03/05/report.csv");
        assert_eq!(keys[1], "in/outbound/2024/03/06/report.csv");
    }

    #[test]
    fn test_empty_prefix_uses_bare_remote_path() {
        let item = item("/outbound", "");
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = RemoteEntry::new(RemotePath::new("/outbound/x.csv").unwrap(), when, 1);
        assert_eq!(item.target_for(&entry).key, "outbound/x.csv");
    }
}
