//! Record store seam used for duplicate detection.

use anyhow::Result;
use async_trait::async_trait;

pub use crate::db::CodeRecord;

/// Persistence for accepted codes.
///
/// [`crate::db::Database`] is the local implementation; a remote backend can
/// sit behind the same trait.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<CodeRecord>>;

    async fn insert(&self, code: &str, owner_id: Option<&str>) -> Result<CodeRecord>;

    async fn count(&self) -> Result<u64>;
}
