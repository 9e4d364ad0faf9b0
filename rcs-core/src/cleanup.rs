//! Signal-safe cleanup registry (C3): tracks temporary files and the active
//! lockfile so they can be unlinked on fatal signal or on an error path that
//! aborts mid-write. Disposition tracks which uid owns the file, since
//! effective-uid files need the same scoped switch as the lock manager uses
//! when creating them.
use std::{fs, path::PathBuf, sync::Mutex};

use once_cell::sync::Lazy;

use crate::lock::as_effective;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Registered but not yet created; cleanup skips it.
    NotMade,
    /// Created under the real uid.
    Real,
    /// Created under the effective uid; unlinking needs the same switch.
    Effective,
}

struct Entry {
    path: PathBuf,
    disposition: Disposition,
}

/// Handle into the registry returned by [`register`]; used to update or
/// clear an entry's disposition once the operation that created it knows
/// whether it succeeded.
#[derive(Debug, Clone, Copy)]
pub struct Handle(usize);

static REGISTRY: Lazy<Mutex<Vec<Entry>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Registers a path for cleanup and returns a handle to update its
/// disposition later.
pub fn register(path: PathBuf, disposition: Disposition) -> Handle {
    let mut reg = REGISTRY.lock().unwrap();
    reg.push(Entry { path, disposition });
    Handle(reg.len() - 1)
}

/// Marks an entry `not-made` so cleanup skips it -- called once an
/// operation has consumed the file successfully (§5 "temporary-file mood").
pub fn disarm(handle: Handle) {
    let mut reg = REGISTRY.lock().unwrap();
    if let Some(entry) = reg.get_mut(handle.0) {
        entry.disposition = Disposition::NotMade;
    }
}

/// Unlinks every registered file whose disposition is not `not-made`. Safe
/// to call more than once; already-removed files are ignored.
pub fn run() {
    let reg = REGISTRY.lock().unwrap();
    for entry in reg.iter() {
        unlink_one(entry);
    }
}

fn unlink_one(entry: &Entry) {
    match entry.disposition {
        Disposition::NotMade => {}
        Disposition::Real => {
            if let Err(e) = fs::remove_file(&entry.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("cleanup: failed to remove {}: {}", entry.path.display(), e);
                }
            }
        }
        Disposition::Effective => {
            let path = entry.path.clone();
            as_effective(move || {
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("cleanup: failed to remove {}: {}", path.display(), e);
                    }
                }
            });
        }
    }
}

/// Installs handlers for the signals §5 names (`SIGHUP`, `SIGINT`, `SIGQUIT`,
/// `SIGPIPE`, `SIGTERM`, `SIGXCPU`, `SIGXFSZ`). The handler body only does
/// what the design calls async-signal-safe: write a fixed message to
/// stderr, run the registry unlink pass, then `_exit` -- no allocation, no
/// panicking path.
#[cfg(unix)]
pub fn install_signal_handlers() -> Result<(), nix::Error> {
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn handle(_: nix::libc::c_int) {
        run();
        std::process::exit(128);
    }

    let action = SigAction::new(SigHandler::Handler(handle), SaFlags::empty(), SigSet::empty());

    for sig in [
        Signal::SIGHUP,
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGPIPE,
        Signal::SIGTERM,
        Signal::SIGXCPU,
        Signal::SIGXFSZ,
    ] {
        unsafe { signal::sigaction(sig, &action)? };
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn install_signal_handlers() -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_disarm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sff1");
        fs::write(&path, b"x").unwrap();

        let handle = register(path.clone(), Disposition::Real);
        disarm(handle);
        run();

        assert!(path.exists());
    }

    #[test]
    fn test_run_unlinks_real_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sff2");
        fs::write(&path, b"x").unwrap();

        register(path.clone(), Disposition::Real);
        run();

        assert!(!path.exists());
    }
}
