//! Flag store trait definition.

use crate::error::StoreResult;
use aperture_core::FeatureFlag;
use async_trait::async_trait;

/// Persistence seam for flag definitions.
///
/// Flags are addressed by their unique name. Writes are last-write-wins;
/// there is no version fencing on concurrent updates.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Fetch a flag definition.
    ///
    /// Returns `Ok(None)` when no flag with that name exists; absence is
    /// a normal outcome, not an error.
    async fn get(&self, name: &str) -> StoreResult<Option<FeatureFlag>>;

    /// Write a flag definition, replacing any existing one.
    async fn put(&self, flag: FeatureFlag) -> StoreResult<()>;

    /// Remove a flag definition.
    ///
    /// Returns whether a flag was actually removed.
    async fn delete(&self, name: &str) -> StoreResult<bool>;

    /// List flag names starting with `prefix` (empty prefix lists all).
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
