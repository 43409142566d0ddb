use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod file_store;
#[cfg(test)]
pub mod memory_store;

pub use file_store::JsonFileStore;
#[cfg(test)]
pub use memory_store::MemoryStore;

/// Discord identity -> GitHub login.
pub type AccountMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("timed out after {waited:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry file is not a valid account mapping: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Persistence behind [`AccountRegistry`]. `locked` provides exclusive
/// access for a whole load-mutate-store sequence; `load` and `store` are only
/// called inside it.
pub trait AccountStore: Send + Sync {
    fn locked<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;

    /// An absent document reads as an empty map.
    fn load(&self) -> Result<AccountMap>;

    fn store(&self, accounts: &AccountMap) -> Result<()>;
}

pub struct AccountRegistry<S> {
    store: S,
}

impl<S: AccountStore> AccountRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Links `account` to `identity`, returning the account it replaced.
    pub fn add(&self, identity: &str, account: &str) -> Result<Option<String>> {
        let identity = validate_identity(identity)?;
        let account = validate_account(account)?;

        let previous = self.store.locked(|store| {
            let mut accounts = store.load()?;
            let previous = accounts.insert(identity.to_string(), account.to_string());
            store.store(&accounts)?;
            Ok(previous)
        })?;

        info!("Linked {} to {}", account, identity);
        Ok(previous)
    }

    /// Unlinks `identity`. Unknown identities are not an error.
    pub fn remove(&self, identity: &str) -> Result<Option<String>> {
        let identity = validate_identity(identity)?;

        let removed = self.store.locked(|store| {
            let mut accounts = store.load()?;
            let removed = accounts.remove(identity);
            if removed.is_some() {
                store.store(&accounts)?;
            }
            Ok(removed)
        })?;

        match &removed {
            Some(account) => info!("Unlinked {} from {}", account, identity),
            None => debug!("Nothing linked to {}", identity),
        }
        Ok(removed)
    }

    pub fn list(&self) -> Result<AccountMap> {
        self.store.locked(|store| store.load())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn require_value<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(value)
}

fn validate_identity(identity: &str) -> Result<&str> {
    require_value("chat identity", identity)
}

/// Accounts are stored as given; names outside the current login rules are
/// only reported.
fn validate_account(account: &str) -> Result<&str> {
    static LOGIN: OnceLock<Option<Regex>> = OnceLock::new();

    let account = require_value("account name", account)?;
    let looks_valid = LOGIN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,37}[A-Za-z0-9])?$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(account))
        && !account.contains("--");

    if !looks_valid {
        warn!("{:?} does not look like a GitHub login, storing it anyway", account);
    }
    Ok(account)
}
