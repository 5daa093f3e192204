use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::kernel::constants::LOCK_FILE_EXTENSION;

#[derive(Debug, Error)]
pub enum ExclusivityError {
    #[error("Another session already holds '{identity}' (lock file {path:?}, holder pid: {pid})", pid = .holder.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    AlreadyHeld {
        identity: String,
        path: PathBuf,
        holder: Option<u32>,
    },

    #[error("Lock file I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Process-level single-instance guard held while a session is initialized.
pub trait ExclusivityGuard: Send + Sync {
    /// Acquire the guard. Acquiring a guard that is already held by this
    /// value succeeds without doing anything.
    fn acquire(&mut self) -> Result<(), ExclusivityError>;

    /// Release the guard. Releasing an unheld guard is a no-op.
    fn release(&mut self) -> Result<(), ExclusivityError>;

    fn is_held(&self) -> bool;
}

/// Guard for sessions that do not need exclusivity.
#[derive(Debug, Default)]
pub struct NoopGuard {
    held: bool,
}

impl ExclusivityGuard for NoopGuard {
    fn acquire(&mut self) -> Result<(), ExclusivityError> {
        self.held = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ExclusivityError> {
        self.held = false;
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held
    }
}

/// Exclusivity through a lock file, `<dir>/<identity>.lock`, created
/// atomically and holding the owner's pid.
#[derive(Debug)]
pub struct LockFileGuard {
    identity: String,
    path: PathBuf,
    held: bool,
}

impl LockFileGuard {
    pub fn new(dir: impl AsRef<Path>, identity: &str) -> Self {
        let file_name: String = identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        Self {
            identity: identity.to_string(),
            path: dir.as_ref().join(format!("{}.{}", file_name, LOCK_FILE_EXTENSION)),
            held: false,
        }
    }

    /// Lock file in the OS temp directory.
    pub fn in_temp_dir(identity: &str) -> Self {
        Self::new(std::env::temp_dir(), identity)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> ExclusivityError {
        ExclusivityError::Io { path: self.path.clone(), source }
    }

    /// Write the pid to a staging file, then hard-link it into place so the
    /// lock file never exists without its pid.
    fn create_lock_file(&self) -> io::Result<()> {
        let staging = self.path.with_extension(format!(
            "{}.{}-{}",
            LOCK_FILE_EXTENSION,
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&staging, format!("{}\n", std::process::id()))?;
        let linked = fs::hard_link(&staging, &self.path);
        if let Err(e) = fs::remove_file(&staging) {
            log::warn!("Could not remove staging file {:?}: {}", staging, e);
        }
        linked
    }
}

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a cheap liveness probe, assume the holder is running.
#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

impl ExclusivityGuard for LockFileGuard {
    /// A lock file whose holder pid is unreadable or no longer running is
    /// stale: it is removed and creation is retried once.
    fn acquire(&mut self) -> Result<(), ExclusivityError> {
        if self.held {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let mut removed_stale = false;
        loop {
            match self.create_lock_file() {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let holder = fs::read_to_string(&self.path)
                        .ok()
                        .and_then(|content| content.trim().parse::<u32>().ok());
                    let stale = holder.is_none_or(|pid| !process_is_alive(pid));
                    if stale && !removed_stale {
                        log::warn!(
                            "Removing stale lock file {:?} (holder pid: {:?})",
                            self.path,
                            holder
                        );
                        match fs::remove_file(&self.path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                            Err(e) => return Err(self.io_error(e)),
                        }
                        removed_stale = true;
                        continue;
                    }
                    return Err(ExclusivityError::AlreadyHeld {
                        identity: self.identity.clone(),
                        path: self.path.clone(),
                        holder,
                    });
                }
                Err(e) => return Err(self.io_error(e)),
            }
        }

        self.held = true;
        log::debug!("Acquired exclusivity lock {:?}", self.path);
        Ok(())
    }

    fn release(&mut self) -> Result<(), ExclusivityError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("Released exclusivity lock {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release exclusivity lock on drop: {}", e);
        }
    }
}
