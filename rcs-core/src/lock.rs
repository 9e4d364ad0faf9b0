//! Archive locking and per-revision locks (C12).
//!
//! The archive lock is a sibling file created with `O_CREAT|O_EXCL`; its
//! existence is the only cross-process coordination this crate provides
//! (§5). Creating and renaming the lockfile must happen under the
//! set-user-id binary's effective uid, so this module also owns the scoped
//! privilege switch (§5 "set-user-id discipline") that every other writer
//! (C11, C3) borrows.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use comma_v::Id;
use filetime::FileTime;
use thiserror::Error;

/// Write bits stripped from a mode before it's applied to a committed
/// archive (§4.11 step 5's `fchmod`): owner, group, and other write, per
/// `rcsedit.c`'s `st_mode & ~(S_IWUSR | S_IWGRP | S_IWOTH)`.
const WRITE_BITS: u32 = 0o222;

/// Mode applied to a brand-new archive that has no prior file to inherit a
/// mode from.
const NEW_ARCHIVE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum Error {
    #[error("archive is locked by another process")]
    Busy,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("revision {revision} is already locked by {locker}")]
    AlreadyLocked { revision: String, locker: String },

    #[error("revision {revision} is locked by {locker}, not {caller}")]
    LockedByOther {
        revision: String,
        locker: String,
        caller: String,
    },

    #[error("revision {0} is not locked")]
    NotLocked(String),

    #[error("caller holds locks on more than one revision")]
    MultipleLocks,
}

/// Computes the lockfile path for an archive, per §6 "Lockfile naming": the
/// first character of the (nonempty) suffix, followed by the archive
/// basename with its final character dropped; if the suffix is empty, the
/// archive's own final character is replaced with `_`.
pub fn lockfile_path(archive: &Path, suffix: &str) -> PathBuf {
    let dir = archive.parent().unwrap_or_else(|| Path::new("."));
    let base = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if suffix.is_empty() {
        let mut name = base.to_string();
        if !name.is_empty() {
            name.truncate(name.len() - 1);
            name.push('_');
        }
        dir.join(name)
    } else {
        let mut trimmed = base.to_string();
        trimmed.pop();
        let prefix = suffix.chars().next().unwrap();
        dir.join(format!("{}{}", prefix, trimmed))
    }
}

/// A held archive lock: the lockfile has been created exclusively and is
/// open for writing the new archive contents. Dropping it without calling
/// [`ArchiveLock::commit`] unlinks the lockfile (abort/failure path).
pub struct ArchiveLock {
    path: PathBuf,
    file: Option<fs::File>,
    committed: bool,
    /// The archive's mode before this rewrite, with write bits already
    /// stripped (§4.11 step 5); `None` if the archive didn't exist yet, in
    /// which case [`NEW_ARCHIVE_MODE`] is used instead.
    target_mode: Option<u32>,
}

impl ArchiveLock {
    /// Acquires the lock, switching to the effective uid for the duration of
    /// the create (§5). `EEXIST` maps to [`Error::Busy`]. Opened read-only
    /// (§4.12: `O_CREAT|O_EXCL|O_WRONLY|O_TRUNC`, mode read-only) -- the
    /// `write(true)` open flag still lets this process write through the fd
    /// it already holds; the mode only governs what a *new* open of the
    /// path could do.
    pub fn acquire(archive: &Path, suffix: &str) -> Result<Self, Error> {
        let path = lockfile_path(archive, suffix);
        let target_mode = archive_mode(archive);

        let file = as_effective(|| open_lockfile(&path))
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    Error::Busy
                } else {
                    Error::Io(e)
                }
            })?;

        log::debug!("acquired lock {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
            committed: false,
            target_mode,
        })
    }

    pub fn file_mut(&mut self) -> &mut fs::File {
        self.file.as_mut().expect("lock already released")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the lockfile, `fchmod`s it to the archive mode, `utime`s it
    /// to `mtime` (skipped if `None`, matching `setmtime`'s `mtime == -1`
    /// convention), then renames it over the archive, releasing the lock
    /// successfully. Must run under the effective uid (§4.11 step 5).
    pub fn commit(mut self, archive: &Path, mtime: Option<FileTime>) -> Result<(), Error> {
        let file = self.file.take().expect("lock already released");
        let mode = self.target_mode.unwrap_or(NEW_ARCHIVE_MODE) & !WRITE_BITS;
        set_mode(&file, mode)?;
        drop(file);

        if let Some(mtime) = mtime {
            filetime::set_file_mtime(&self.path, mtime)?;
        }

        as_effective(|| fs::rename(&self.path, archive))?;
        log::debug!("committed lock {} -> {}", self.path.display(), archive.display());
        self.committed = true;
        Ok(())
    }
}

/// The archive's current mode with write bits stripped, or `None` if it
/// doesn't exist yet (a brand-new archive).
#[cfg(unix)]
fn archive_mode(archive: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(archive).ok().map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn archive_mode(_archive: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn open_lockfile(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o444)
        .open(path)
}

#[cfg(not(unix))]
fn open_lockfile(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().create_new(true).write(true).open(path)
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        if !self.committed {
            self.file = None;
            if let Err(e) = as_effective(|| fs::remove_file(&self.path)) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("failed to unlink abandoned lockfile {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Runs `f` with the effective uid active, restoring the prior uid
/// afterward regardless of how `f` returns (§5 `as_effective`). On
/// non-set-user-id binaries (the common case outside a real install) this
/// is a no-op: `seteuid` to the already-current uid always succeeds.
#[cfg(unix)]
pub fn as_effective<T>(f: impl FnOnce() -> T) -> T {
    use nix::unistd::{self, Uid};

    let real = unistd::getuid();
    let saved_effective = unistd::geteuid();

    // Nested calls are fine: if we're already effective, this is a no-op
    // swap back to the same uid.
    let _ = unistd::seteuid(saved_effective);
    let result = f();
    let _ = unistd::seteuid(real);
    let _: Uid = real;

    result
}

#[cfg(not(unix))]
pub fn as_effective<T>(f: impl FnOnce() -> T) -> T {
    f()
}

/// Adds a lock on `revision` for `who`. No-op if already held by `who`;
/// errors if held by someone else.
pub fn add_lock(
    locks: &mut Vec<(Id, comma_v::Num)>,
    revision: &comma_v::Num,
    who: &Id,
) -> Result<(), Error> {
    if let Some((locker, _)) = locks.iter().find(|(_, r)| r == revision) {
        if locker == who {
            return Ok(());
        }
        return Err(Error::AlreadyLocked {
            revision: revision.to_string(),
            locker: String::from_utf8_lossy(locker).to_string(),
        });
    }

    locks.push((who.clone(), revision.clone()));
    Ok(())
}

/// Removes a lock on `revision`. `who` must hold it unless `force` is set
/// (root or archive owner in non-strict mode, per §4.12).
pub fn remove_lock(
    locks: &mut Vec<(Id, comma_v::Num)>,
    revision: &comma_v::Num,
    who: &Id,
    force: bool,
) -> Result<(), Error> {
    let idx = locks
        .iter()
        .position(|(_, r)| r == revision)
        .ok_or_else(|| Error::NotLocked(revision.to_string()))?;

    let (locker, _) = &locks[idx];
    if locker != who && !force {
        return Err(Error::LockedByOther {
            revision: revision.to_string(),
            locker: String::from_utf8_lossy(locker).to_string(),
            caller: String::from_utf8_lossy(who).to_string(),
        });
    }

    locks.remove(idx);
    Ok(())
}

/// Forcibly removes a lock regardless of owner. Mail notification on break
/// is out of scope (§4.12).
pub fn break_lock(locks: &mut Vec<(Id, comma_v::Num)>, revision: &comma_v::Num) -> Result<(), Error> {
    let idx = locks
        .iter()
        .position(|(_, r)| r == revision)
        .ok_or_else(|| Error::NotLocked(revision.to_string()))?;
    locks.remove(idx);
    Ok(())
}

/// Returns the single revision `who` currently locks, erroring if they hold
/// more than one.
pub fn find_caller_lock(
    locks: &[(Id, comma_v::Num)],
    who: &Id,
) -> Result<Option<comma_v::Num>, Error> {
    let mut found: Option<&comma_v::Num> = None;
    for (locker, rev) in locks {
        if locker == who {
            if found.is_some() {
                return Err(Error::MultipleLocks);
            }
            found = Some(rev);
        }
    }
    Ok(found.cloned())
}
