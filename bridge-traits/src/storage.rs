//! Key-value settings storage.
//!
//! The core persists a handful of small typed values (session position,
//! queue ids, playback modes). Hosts back this with whatever durable map they
//! have: SQLite on desktop, `SharedPreferences`/`DataStore` on Android,
//! `UserDefaults` on iOS.

use async_trait::async_trait;

use crate::error::Result;

/// Settings storage trait
///
/// Stores typed scalar values under string keys. Reading a key with a
/// different type than it was written with is an error.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_volume(store: &dyn SettingsStore) -> Result<()> {
///     store.set_i64("volume_percent", 80).await?;
///     store.set_bool("resume_on_launch", true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;

    /// Begin a transaction for atomic updates
    ///
    /// Nothing written through the transaction is visible until
    /// [`SettingsTransaction::commit`] succeeds.
    async fn begin_transaction(&self) -> Result<Box<dyn SettingsTransaction + Send>>;
}

/// Transaction for atomic settings updates
#[async_trait]
pub trait SettingsTransaction: Send {
    async fn set_string(&mut self, key: &str, value: &str) -> Result<()>;

    async fn set_bool(&mut self, key: &str, value: bool) -> Result<()>;

    async fn set_i64(&mut self, key: &str, value: i64) -> Result<()>;

    async fn delete(&mut self, key: &str) -> Result<()>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
