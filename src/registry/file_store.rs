use super::*;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Instant;
use tracing::warn;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Account map stored as a pretty-printed JSON object. Access is serialized
/// through an advisory lock on a sibling file with the same base name
/// (`data.json` is guarded by `data.lock`).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    poll_interval: Duration,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");

        Self {
            path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn acquire(&self) -> Result<LockGuard> {
        ensure_parent_dir(&self.lock_path)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    debug!("Acquired {}", self.lock_path.display());
                    return Ok(LockGuard {
                        file,
                        path: self.lock_path.clone(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    let waited = start.elapsed();
                    if waited >= self.lock_timeout {
                        return Err(RegistryError::LockTimeout {
                            path: self.lock_path.clone(),
                            waited,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

impl AccountStore for JsonFileStore {
    fn locked<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _guard = self.acquire()?;
        op(self)
    }

    fn load(&self) -> Result<AccountMap> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(AccountMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if text.trim().is_empty() {
            return Ok(AccountMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes a sibling temp file and renames it over the document, so a
    /// reader never sees a partial write.
    fn store(&self, accounts: &AccountMap) -> Result<()> {
        ensure_parent_dir(&self.path)?;

        let mut json = serde_json::to_string_pretty(accounts)?;
        json.push('\n');

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!("Stored {} account(s) in {}", accounts.len(), self.path.display());
        Ok(())
    }
}

/// Releases the advisory lock when dropped, whatever the operation's outcome.
struct LockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}
