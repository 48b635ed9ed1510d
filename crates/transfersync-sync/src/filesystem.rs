//! Filesystem adapters (secondary/driven adapters)
//!
//! - [`MountedDirectoryListing`] implements [`IDirectoryListing`] over a
//!   remote endpoint mounted into the local filesystem (sshfs, rclone mount,
//!   a managed transfer gateway...).
//! - [`DirectoryDispatcher`] implements [`ITransferDispatcher`] with a local
//!   directory standing in for object storage: `<root>/<bucket>/<key>`.
//!
//! Remote paths are always absolute and already validated, so joining them
//! under the mount root cannot escape it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use transfersync_core::domain::{RemoteEntry, RemotePath, TargetLocation};
use transfersync_core::ports::{IDirectoryListing, ITransferDispatcher};

use crate::SyncError;

/// Maps a remote path to its location under `mount_root`
pub fn local_path(mount_root: &Path, remote: &RemotePath) -> PathBuf {
    let relative = remote.as_str().trim_start_matches('/');
    if relative.is_empty() {
        mount_root.to_path_buf()
    } else {
        mount_root.join(relative)
    }
}

// ============================================================================
// MountedDirectoryListing
// ============================================================================

/// Lists files of a remote endpoint mounted at `mount_root`
///
/// Symlinks are followed when they point at files. Directory symlinks are
/// not descended into, so cyclic links cannot loop the walk.
#[derive(Debug, Clone)]
pub struct MountedDirectoryListing {
    mount_root: PathBuf,
}

impl MountedDirectoryListing {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }
}

#[async_trait::async_trait]
impl IDirectoryListing for MountedDirectoryListing {
    #[instrument(skip(self), fields(mount = %self.mount_root.display()))]
    async fn list(&self, path: &RemotePath, recursive: bool) -> anyhow::Result<Vec<RemoteEntry>> {
        let root = local_path(&self.mount_root, path);
        let metadata = match tokio::fs::metadata(&root).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(root).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to stat {}", root.display()));
            }
        };
        if !metadata.is_dir() {
            anyhow::bail!("{} is not a directory", path);
        }

        let mut entries = Vec::new();
        let mut pending = vec![(root, path.clone())];

        while let Some((dir, remote_dir)) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("failed to read directory {}", dir.display()))?;

            while let Some(child) = reader.next_entry().await? {
                let name = match child.file_name().into_string() {
                    Ok(name) => name,
                    Err(raw) => {
                        warn!(name = ?raw, dir = %remote_dir, "Skipping non UTF-8 file name");
                        continue;
                    }
                };

                // metadata() follows symlinks; a dangling link or a file
                // removed mid-walk is simply not listed.
                let metadata = match tokio::fs::metadata(child.path()).await {
                    Ok(m) => m,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        debug!(name = %name, "Entry vanished during listing");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let remote_path = remote_dir.join(&name)?;
                if metadata.is_dir() {
                    let is_link = child.file_type().await?.is_symlink();
                    if recursive && !is_link {
                        pending.push((child.path(), remote_path));
                    }
                    continue;
                }
                if !metadata.is_file() {
                    continue;
                }

                let modified: DateTime<Utc> = metadata
                    .modified()
                    .with_context(|| format!("no modification time for {}", remote_path))?
                    .into();
                entries.push(RemoteEntry::new(remote_path, modified, metadata.len()));
            }
        }

        entries.sort_by(|a, b| a.path().as_str().cmp(b.path().as_str()));
        debug!(count = entries.len(), "Listing complete");
        Ok(entries)
    }
}

// ============================================================================
// DirectoryDispatcher
// ============================================================================

/// Copies remote files into `<buckets_root>/<bucket>/<key>`
///
/// Writes go to a uniquely named `<object>.<id>.partial` file next to the
/// destination and are renamed into place, so a reader never sees a
/// half-written object and a repeated transfer simply replaces it. A partial
/// file is removed when its transfer fails or is dropped mid-copy; any that
/// survive (crash, abort racing the copy) are swept by the next transfer of
/// the same key.
#[derive(Debug, Clone)]
pub struct DirectoryDispatcher {
    mount_root: PathBuf,
    buckets_root: PathBuf,
}

const PARTIAL_SUFFIX: &str = ".partial";

impl DirectoryDispatcher {
    pub fn new(mount_root: impl Into<PathBuf>, buckets_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            buckets_root: buckets_root.into(),
        }
    }

    /// Destination file for `target`
    pub fn object_path(&self, target: &TargetLocation) -> Result<PathBuf, SyncError> {
        let escapes = target.key.is_empty()
            || target.key.starts_with('/')
            || target
                .key
                .split('/')
                .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if escapes {
            return Err(SyncError::PathEscapesRoot(target.key.clone()));
        }
        Ok(self
            .buckets_root
            .join(target.bucket.as_str())
            .join(&target.key))
    }
}

/// Partial files left behind by earlier transfers of `destination`
async fn stale_partials(destination: &Path) -> std::io::Result<Vec<PathBuf>> {
    let (Some(parent), Some(name)) = (destination.parent(), destination.file_name()) else {
        return Ok(Vec::new());
    };
    let mut marker = name.to_os_string();
    marker.push(".");
    let marker = marker.to_string_lossy().into_owned();

    let mut stale = Vec::new();
    let mut dir = tokio::fs::read_dir(parent).await?;
    while let Some(entry) = dir.next_entry().await? {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(&marker) && file_name.ends_with(PARTIAL_SUFFIX) {
            stale.push(entry.path());
        }
    }
    Ok(stale)
}

/// Temporary copy target, removed on drop unless it was renamed into place
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn next_to(destination: &Path) -> Self {
        let mut path = destination.as_os_str().to_owned();
        path.push(format!(".{}{PARTIAL_SUFFIX}", uuid::Uuid::new_v4().simple()));
        Self {
            path: PathBuf::from(path),
            committed: false,
        }
    }

    async fn commit(mut self, destination: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, destination).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial object"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial object"),
        }
    }
}

#[async_trait::async_trait]
impl ITransferDispatcher for DirectoryDispatcher {
    #[instrument(skip(self, entry), fields(path = %entry.path(), target = %target))]
    async fn transfer(&self, entry: &RemoteEntry, target: &TargetLocation) -> anyhow::Result<()> {
        let source = local_path(&self.mount_root, entry.path());
        let destination = self.object_path(target)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if target.kms_key_id.is_some() {
            debug!("Directory storage ignores the KMS key");
        }

        for stale in stale_partials(&destination).await? {
            debug!(path = %stale.display(), "Sweeping stale partial object");
            if let Err(e) = tokio::fs::remove_file(&stale).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %stale.display(), error = %e, "Failed to sweep partial object");
                }
            }
        }

        let partial = PartialFile::next_to(&destination);
        let copied = match tokio::fs::copy(&source, &partial.path).await {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(source).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to copy {}", source.display()));
            }
        };
        partial
            .commit(&destination)
            .await
            .with_context(|| format!("failed to move object into {}", destination.display()))?;

        debug!(bytes = copied, "Object written");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use tempfile::TempDir;
    use transfersync_core::domain::BucketName;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn remote(path: &str) -> RemotePath {
        RemotePath::new(path).unwrap()
    }

    fn target(bucket: &str, key: &str) -> TargetLocation {
        TargetLocation {
            bucket: BucketName::new(bucket).unwrap(),
            key: key.to_string(),
            kms_key_id: None,
        }
    }

    #[test]
    fn test_local_path_mapping() {
        let root = Path::new("/mnt/remote");
        assert_eq!(local_path(root, &RemotePath::root()), root);
        assert_eq!(
            local_path(root, &remote("/in/2024")),
            PathBuf::from("/mnt/remote/in/2024")
        );
    }

    #[tokio::test]
    async fn test_list_non_recursive() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "in/a.csv", "aaa");
        write(dir.path(), "in/b.csv", "b");
        write(dir.path(), "in/sub/c.csv", "c");
        set_mtime(&a, 1_700_000_000);

        let listing = MountedDirectoryListing::new(dir.path());
        let entries = listing.list(&remote("/in"), false).await.unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path().as_str()).collect();
        assert_eq!(paths, vec!["/in/a.csv", "/in/b.csv"]);
        assert_eq!(entries[0].size_bytes(), 3);
        assert_eq!(entries[0].last_modified().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_list_recursive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "in/a.csv", "a");
        write(dir.path(), "in/sub/c.csv", "c");
        write(dir.path(), "in/sub/deeper/d.csv", "d");

        let listing = MountedDirectoryListing::new(dir.path());
        let entries = listing.list(&remote("/in"), true).await.unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path().as_str()).collect();
        assert_eq!(
            paths,
            vec!["/in/a.csv", "/in/sub/c.csv", "/in/sub/deeper/d.csv"]
        );
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let listing = MountedDirectoryListing::new(dir.path());
        assert!(listing.list(&remote("/empty"), true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let listing = MountedDirectoryListing::new(dir.path());

        let err = listing.list(&remote("/missing"), false).await.unwrap_err();
        assert!(err.to_string().contains("Path not found"));
        assert_eq!(
            std::fs::read_dir(buckets.path().join("landing")).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_list_file_instead_of_directory_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "in/a.csv", "a");
        let listing = MountedDirectoryListing::new(dir.path());

        assert!(listing.list(&remote("/in/a.csv"), false).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_follows_file_symlinks_only() {
        let dir = TempDir::new().unwrap();
        let real = write(dir.path(), "elsewhere/real.csv", "r");
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("in/link.csv")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("in"), dir.path().join("in/loop")).unwrap();

        let listing = MountedDirectoryListing::new(dir.path());
        let entries = listing.list(&remote("/in"), true).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path().as_str(), "/in/link.csv");
    }

    #[tokio::test]
    async fn test_dispatch_copies_into_bucket() {
        let mount = TempDir::new().unwrap();
        let buckets = TempDir::new().unwrap();
        write(mount.path(), "in/a.csv", "payload");

        let dispatcher = DirectoryDispatcher::new(mount.path(), buckets.path());
        let entry = RemoteEntry::new(remote("/in/a.csv"), Utc::now(), 7);
        dispatcher
            .transfer(&entry, &target("landing", "daily/a.csv"))
            .await
            .unwrap();

        let copied = std::fs::read_to_string(buckets.path().join("landing/daily/a.csv")).unwrap();
        assert_eq!(copied, "payload");
        let leftovers: Vec<_> = std::fs::read_dir(buckets.path().join("landing/daily"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("a.csv")]);
    }

    #[tokio::test]
    async fn test_dispatch_sweeps_stale_partials_of_same_key() {
        let mount = TempDir::new().unwrap();
        let buckets = TempDir::new().unwrap();
        write(mount.path(), "in/a.csv", "payload");
        let stale = write(buckets.path(), "landing/a.csv.0f3c.partial", "half");
        let other = write(buckets.path(), "landing/ab.csv.0f3c.partial", "other key");

        let dispatcher = DirectoryDispatcher::new(mount.path(), buckets.path());
        let entry = RemoteEntry::new(remote("/in/a.csv"), Utc::now(), 7);
        dispatcher
            .transfer(&entry, &target("landing", "a.csv"))
            .await
            .unwrap();

        assert!(!stale.exists());
        assert!(other.exists());
        assert_eq!(
            std::fs::read_to_string(buckets.path().join("landing/a.csv")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn test_dropped_partial_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("a.csv");
        let partial = PartialFile::next_to(&destination);
        std::fs::write(&partial.path, "half").unwrap();
        let path = partial.path.clone();
        assert!(path.to_string_lossy().ends_with(PARTIAL_SUFFIX));

        drop(partial);
        assert!(!path.exists());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_dispatch_overwrites_existing_object() {
        let mount = TempDir::new().unwrap();
        let buckets = TempDir::new().unwrap();
        write(mount.path(), "in/a.csv", "new");
        write(buckets.path(), "landing/a.csv", "old contents");

        let dispatcher = DirectoryDispatcher::new(mount.path(), buckets.path());
        let entry = RemoteEntry::new(remote("/in/a.csv"), Utc::now(), 3);
        dispatcher
            .transfer(&entry, &target("landing", "a.csv"))
            .await
            .unwrap();

        let copied = std::fs::read_to_string(buckets.path().join("landing/a.csv")).unwrap();
        assert_eq!(copied, "new");
    }

    #[tokio::test]
    async fn test_dispatch_missing_source_fails() {
        let mount = TempDir::new().unwrap();
        let buckets = TempDir::new().unwrap();

        let dispatcher = DirectoryDispatcher::new(mount.path(), buckets.path());
        let entry = RemoteEntry::new(remote("/in/gone.csv"), Utc::now(), 3);
        let err = dispatcher
            .transfer(&entry, &target("landing", "gone.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Path not found"));
        assert_eq!(
            std::fs::read_dir(buckets.path().join("landing")).unwrap().count(),
            0
        );
    }

    #[test]
    fn test_object_path_rejects_escaping_keys() {
        let dispatcher = DirectoryDispatcher::new("/mnt", "/buckets");
        assert!(dispatcher.object_path(&target("b", "../etc/passwd")).is_err());
        assert!(dispatcher.object_path(&target("b", "/abs")).is_err());
        assert!(dispatcher.object_path(&target("b", "")).is_err());
        assert_eq!(
            dispatcher.object_path(&target("b", "x/y.csv")).unwrap(),
            PathBuf::from("/buckets/b/x/y.csv")
        );
    }
}
