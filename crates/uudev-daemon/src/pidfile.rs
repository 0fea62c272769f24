//! Process-singleton pidfile bookkeeping
//!
//! uudev refuses to start while a previous instance's pidfile exists, unless
//! forced, in which case the recorded process is killed first. The file is
//! removed when the handle is dropped on shutdown.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Handle on the claimed pidfile; dropping it removes the file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim the singleton pidfile under `/var/run/user/<uid>/uudev/`.
    ///
    /// Fails when another instance is recorded, unless `force` is set, in
    /// which case the recorded process is killed (an already-dead process is
    /// tolerated) and the file is taken over.
    pub fn acquire(force: bool) -> Result<Self> {
        let dir = PathBuf::from(format!("/var/run/user/{}/uudev", nix::unistd::getuid()));
        Self::acquire_at(&dir.join("uudev.pid"), force)
    }

    fn acquire_at(path: &Path, force: bool) -> Result<Self> {
        if let Ok(recorded) = fs::read_to_string(path) {
            if !force {
                bail!(
                    "uudev instance is already running pid={}",
                    recorded.trim()
                );
            }
            kill_recorded(&recorded)?;
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(path, std::process::id().to_string())
            .with_context(|| format!("failed to write pid to {}", path.display()))?;
        debug!(path = %path.display(), "pidfile written");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// Kill the process recorded in the pidfile. An unparseable record or an
/// already-exited process is not an error; anything else is.
fn kill_recorded(recorded: &str) -> Result<()> {
    let pid: i32 = match recorded.trim().parse() {
        Ok(pid) => pid,
        Err(_) => return Ok(()),
    };

    match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => {
            debug!(pid, "killed previous instance");
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => bail!("failed to kill running instance pid={pid}: {e}"),
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(error = %e, path = %self.path.display(), "failed to remove pidfile");
        }
    }
}
