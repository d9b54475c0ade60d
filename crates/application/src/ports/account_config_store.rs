//! Account configuration store port
//!
//! Persists the typed per-account configuration, including the per-folder
//! synchronization bookkeeping consumed by refresh throttling.

use domain::{AccountConfig, AccountId};

use super::StorageError;

/// Storage for [`AccountConfig`]
pub trait AccountConfigStore: Send + Sync {
    /// Load the configuration of an account (default when none is stored)
    fn load(&self, account_id: AccountId) -> Result<AccountConfig, StorageError>;

    /// Apply `change` to the stored configuration as one atomic
    /// read-modify-write and return the new configuration
    fn update(
        &self,
        account_id: AccountId,
        change: &mut dyn FnMut(&mut AccountConfig),
    ) -> Result<AccountConfig, StorageError>;
}
