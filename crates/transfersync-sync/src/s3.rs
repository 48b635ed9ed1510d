//! Amazon S3 transfer dispatcher (feature `s3`)
//!
//! Reads the source file from the mounted remote tree and writes it with a
//! single `PutObject`. Credentials and endpoint come from the standard AWS
//! environment (profile, env vars, instance role).

use std::path::PathBuf;

use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, instrument};

use transfersync_core::domain::{RemoteEntry, TargetLocation};
use transfersync_core::ports::ITransferDispatcher;

use crate::filesystem::local_path;

/// Uploads files from a mounted remote tree to S3
#[derive(Debug, Clone)]
pub struct S3Dispatcher {
    client: S3Client,
    mount_root: PathBuf,
}

impl S3Dispatcher {
    pub fn new(client: S3Client, mount_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            mount_root: mount_root.into(),
        }
    }

    /// Builds a client from the AWS environment, optionally pinning the region
    pub async fn from_env(mount_root: impl Into<PathBuf>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        Self::new(S3Client::new(&config), mount_root)
    }
}

#[async_trait::async_trait]
impl ITransferDispatcher for S3Dispatcher {
    #[instrument(skip(self, entry), fields(path = %entry.path(), target = %target))]
    async fn transfer(&self, entry: &RemoteEntry, target: &TargetLocation) -> anyhow::Result<()> {
        let source = local_path(&self.mount_root, entry.path());
        let data = tokio::fs::read(&source)
            .await
            .with_context(|| format!("failed to read {}", source.display()))?;
        let size = data.len();

        let mut request = self
            .client
            .put_object()
            .bucket(target.bucket.as_str())
            .key(&target.key)
            .body(ByteStream::from(data));
        if let Some(kms_key_id) = &target.kms_key_id {
            request = request
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(kms_key_id);
        }

        request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("PutObject to {} failed: {}", target, e))?;

        debug!(bytes = size, "Object uploaded");
        Ok(())
    }
}
