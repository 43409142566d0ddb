use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local store used by the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    gate: Mutex<()>,
    accounts: Mutex<AccountMap>,
}

impl MemoryStore {
    pub fn with_accounts(accounts: AccountMap) -> Self {
        Self {
            gate: Mutex::new(()),
            accounts: Mutex::new(accounts),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, AccountMap> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountStore for MemoryStore {
    fn locked<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        op(self)
    }

    fn load(&self) -> Result<AccountMap> {
        Ok(self.accounts().clone())
    }

    fn store(&self, accounts: &AccountMap) -> Result<()> {
        *self.accounts() = accounts.clone();
        Ok(())
    }
}
