//! Orchestration (C14): composes the components above into the high-level
//! operations a caller invokes -- deposit, retrieve, lock/unlock, and log
//! report (§4.14). Each function follows the step sequence named in its
//! doc comment; none of them touch the filesystem directly beyond what
//! `Repository`/`lock`/`cleanup` already abstract.
use std::collections::HashMap;
use std::path::Path;

use comma_v::{Id, Num, Span, Sym};

use crate::{
    config::Config,
    date, delta,
    error::Error,
    keyword, lock, num,
    repo::Repository,
    resolve::{self, Criteria},
    writer,
};

pub struct DepositRequest {
    pub working_text: Vec<u8>,
    pub author: Id,
    pub log_message: Vec<u8>,
    pub state: Option<Id>,
    pub revision: Option<Num>,
}

pub struct DepositOutcome {
    pub new_revision: Num,
    pub archive_bytes: Vec<u8>,
    /// True if the working file was unchanged from the current head and no
    /// new revision was created (§4.14 step 5).
    pub unchanged: bool,
}

/// Deposits a new revision onto the trunk (§4.14 "deposit"):
/// 1. Resolve the current head (or start a brand-new archive with `1.1`).
/// 2. Compare against the working text; abort with `unchanged` if equal.
/// 3. Mint a new revision number and date.
/// 4. Diff the working text against the old head to produce the old head's
///    new (reverse-diff) deltatext.
/// 5. Splice the new delta in as head; write the archive.
pub fn deposit(
    repo: &Repository,
    cfg: &Config,
    diff_bin: &str,
    req: DepositRequest,
) -> Result<DepositOutcome, Error> {
    let archive = repo.source.as_bytes();

    match repo.head().cloned() {
        None => {
            let new_num = req.revision.clone().unwrap_or_else(|| Num(b"1.1".to_vec()));
            let mut file = repo.file.clone();
            let mut scratch = archive.to_vec();
            let date_span = mint_date(&mut scratch);

            file.admin.head = Some(new_num.clone());
            file.delta.insert(
                new_num.clone(),
                comma_v::Delta {
                    date: date_span,
                    author: req.author,
                    state: req.state.or_else(|| Some(Id(b"Exp".to_vec()))),
                    branches: vec![],
                    next: None,
                    commit_id: None,
                },
            );
            file.delta_text_order = vec![new_num.clone()];

            let mut overrides = HashMap::new();
            overrides.insert(
                new_num.clone(),
                writer::Override {
                    log: Some(req.log_message),
                    text: Some(req.working_text),
                },
            );

            let archive_bytes = writer::write(&file, &scratch, &overrides);
            Ok(DepositOutcome {
                new_revision: new_num,
                archive_bytes,
                unchanged: false,
            })
        }
        Some(old_head) => {
            let old_head_text = delta::reconstruct(&repo.file, archive, &old_head)?;
            if old_head_text == req.working_text {
                return Ok(DepositOutcome {
                    new_revision: old_head,
                    archive_bytes: archive.to_vec(),
                    unchanged: true,
                });
            }

            let new_num = match req.revision {
                Some(n) => n,
                None => num::increment(&old_head)?,
            };

            let mut scratch = archive.to_vec();
            let date_span = mint_date(&mut scratch);

            let new_delta = delta::splice_new_head(
                old_head.clone(),
                date_span,
                req.author,
                req.state,
                None,
            );

            let script = crate::diff::diff(&cfg.temp_dir, diff_bin, &req.working_text, &old_head_text)?;

            let mut file = repo.file.clone();
            file.delta.insert(new_num.clone(), new_delta);
            file.admin.head = Some(new_num.clone());
            file.delta_text_order.insert(0, new_num.clone());

            let mut overrides = HashMap::new();
            overrides.insert(
                new_num.clone(),
                writer::Override {
                    log: Some(req.log_message),
                    text: Some(req.working_text),
                },
            );
            overrides.insert(
                old_head,
                writer::Override {
                    log: None,
                    text: Some(script),
                },
            );

            let archive_bytes = writer::write(&file, &scratch, &overrides);
            Ok(DepositOutcome {
                new_revision: new_num,
                archive_bytes,
                unchanged: false,
            })
        }
    }
}

fn mint_date(scratch: &mut Vec<u8>) -> Span {
    let date_str = date::now_canonical();
    let offset = scratch.len();
    scratch.extend_from_slice(date_str.as_bytes());
    Span::new(offset, date_str.len())
}

pub struct RetrieveRequest {
    pub designator: String,
    pub criteria: Criteria,
    pub working_value: Option<Num>,
    pub mode: keyword::Mode,
    pub archive_path: String,
    pub locker: Option<Id>,
}

/// Retrieves a revision's text, applying keyword expansion per the
/// requested mode (§4.14 "retrieve", §4.9).
pub fn retrieve(repo: &Repository, req: &RetrieveRequest) -> Result<(Num, Vec<u8>), Error> {
    let archive = repo.source.as_bytes();
    let revision = resolve::resolve(
        &repo.file,
        archive,
        &req.designator,
        &req.criteria,
        req.working_value.as_ref(),
    )?;

    let text = delta::reconstruct(&repo.file, archive, &revision)?;
    if keyword::Mode::is_verbatim(req.mode) {
        return Ok((revision, text));
    }

    let d = repo
        .file
        .delta
        .get(&revision)
        .expect("resolve() only returns revisions present in the delta map");
    let date_raw = crate::source::materialize_escaped(
        &archive[d.date.offset..d.date.offset + d.date.len],
    );
    let formatted_date = date::format(&date_raw, crate::date::Zone::Local).unwrap_or_default();

    let ctx = keyword::Context {
        archive_path: req.archive_path.clone(),
        working_path: String::new(),
        revision: revision.to_string(),
        date: formatted_date,
        author: String::from_utf8_lossy(&d.author).to_string(),
        state: d
            .state
            .as_ref()
            .map(|s| String::from_utf8_lossy(s).to_string())
            .unwrap_or_default(),
        locker: req.locker.as_ref().map(|l| String::from_utf8_lossy(l).to_string()),
        name: None,
    };

    let mut out = Vec::with_capacity(text.len());
    for line in text.split(|&b| b == b'\n') {
        let (expanded, _) = keyword::expand_line(line, req.mode, &ctx);
        out.extend_from_slice(&expanded);
        out.push(b'\n');
    }
    if !text.ends_with(b"\n") && out.ends_with(b"\n") {
        out.pop();
    }

    Ok((revision, out))
}

/// Locks a revision for `who` (§4.14, §4.12).
pub fn lock_revision(repo: &mut Repository, revision: &Num, who: &Id) -> Result<(), Error> {
    lock::add_lock(&mut repo.file.admin.locks, revision, who)?;
    Ok(())
}

/// Unlocks a revision held by `who` (or forcibly, if `force`).
pub fn unlock_revision(
    repo: &mut Repository,
    revision: &Num,
    who: &Id,
    force: bool,
) -> Result<(), Error> {
    lock::remove_lock(&mut repo.file.admin.locks, revision, who, force)?;
    Ok(())
}

/// Adds or moves a symbolic name (§4.14 "admin").
pub fn tag(repo: &mut Repository, name: Sym, revision: Num, force: bool) -> Result<(), Error> {
    if let Some(existing) = repo
        .file
        .admin
        .symbols
        .iter_mut()
        .find(|(sym, _)| *sym == name)
    {
        if !force {
            return Err(Error::Usage(format!(
                "symbolic name {} already bound",
                String::from_utf8_lossy(&existing.0)
            )));
        }
        existing.1 = revision;
    } else {
        repo.file.admin.symbols.push((name, revision));
    }
    Ok(())
}

/// Serializes the repository's current in-memory state, unconditionally
/// (used by `admin`/`tag`/lock operations that don't touch deltatext).
pub fn rewrite(repo: &Repository) -> Vec<u8> {
    writer::write(&repo.file, repo.source.as_bytes(), &HashMap::new())
}

/// Full deposit-to-disk cycle: acquire the lock, write the new archive,
/// commit (§4.14 steps 2, 7). `mtime` is the target modification time for
/// the committed archive, if the caller wants one preserved (§4.11 step 5);
/// `None` leaves the filesystem to stamp the commit time, same as a fresh
/// write.
pub fn commit_archive(
    archive_path: &Path,
    suffix: &str,
    bytes: &[u8],
    mtime: Option<filetime::FileTime>,
) -> Result<(), Error> {
    let mut guard = lock::ArchiveLock::acquire(archive_path, suffix)?;
    std::io::Write::write_all(guard.file_mut(), bytes)?;
    guard.commit(archive_path, mtime)?;
    Ok(())
}
