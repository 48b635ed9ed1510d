//! Watermark store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - `put` must never persist an instant earlier than the stored one;
//!   implementations reject such writes with an error.

use crate::domain::{ItemKey, Watermark};

/// Port trait for durable per-item watermarks
#[async_trait::async_trait]
pub trait IWatermarkStore: Send + Sync {
    /// Returns the watermark for `item`, or `None` before its first success
    async fn get(&self, item: &ItemKey) -> anyhow::Result<Option<Watermark>>;

    /// Stores the watermark for `item`
    async fn put(&self, item: &ItemKey, watermark: &Watermark) -> anyhow::Result<()>;

    /// Returns every stored watermark, ordered by item key
    async fn list(&self) -> anyhow::Result<Vec<(ItemKey, Watermark)>>;
}
