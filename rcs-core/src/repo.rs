//! Bridges `comma_v::File` (pure grammar) with the consistency checks and
//! defaults `rcs_core` relies on (§4.5 "Post-parse consistency").
use std::path::{Path, PathBuf};

use comma_v::{File, Id, Num};
use thiserror::Error;

use crate::{keyword, source::Source};

#[derive(Debug, Error)]
pub enum Error {
    #[error("head revision {0} does not exist")]
    DanglingHead(Num),

    #[error(transparent)]
    Parse(#[from] comma_v::Error),

    #[error(transparent)]
    Source(#[from] crate::source::Error),

    #[error("delta {referrer} refers to nonexistent revision {missing}")]
    DanglingReference { referrer: Num, missing: Num },
}

/// A loaded archive: the parsed grammar plus the source bytes spans are
/// relative to, since `comma_v` never copies deltatext or date strings out
/// of the buffer (§3 "Ownership").
pub struct Repository {
    pub path: PathBuf,
    pub source: Source,
    pub file: File,
    /// Default keyword-expansion mode, falling back to `kv` per §4.5 when
    /// the archive's `expand` clause is absent or unrecognized.
    pub default_expand: keyword::Mode,
}

impl Repository {
    /// Opens and parses an archive, running the post-parse consistency
    /// checks (§4.5): a dangling `head` is fatal; dangling locks are
    /// downgraded to a warning with a phantom delta inserted so the lock
    /// survives round-tripping; dangling `branches`/`next` references are
    /// fatal, naming the offending number.
    pub fn load(path: &Path, mem_limit: u64) -> Result<Self, Error> {
        let source = Source::open(path, mem_limit)?;
        let mut file = comma_v::parse(source.as_bytes())?;

        if let Some(head) = file.admin.head.clone() {
            if !file.delta.contains_key(&head) {
                return Err(Error::DanglingHead(head));
            }
        }

        check_references(&file)?;
        patch_dangling_locks(&mut file);

        let default_expand = file
            .admin
            .expand
            .map(|span| crate::source::materialize_escaped(&source.as_bytes()[span.offset..span.offset + span.len]))
            .and_then(|raw| keyword::Mode::parse(&raw).ok())
            .unwrap_or(keyword::Mode::Kv);

        Ok(Self {
            path: path.to_path_buf(),
            source,
            file,
            default_expand,
        })
    }

    pub fn head(&self) -> Option<&Num> {
        self.file.admin.head.as_ref()
    }
}

fn check_references(file: &File) -> Result<(), Error> {
    for (num, delta) in &file.delta {
        if let Some(next) = &delta.next {
            if !file.delta.contains_key(next) {
                return Err(Error::DanglingReference {
                    referrer: num.clone(),
                    missing: next.clone(),
                });
            }
        }
        for branch in &delta.branches {
            if !file.delta.contains_key(branch) {
                return Err(Error::DanglingReference {
                    referrer: num.clone(),
                    missing: branch.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Replaces any lock referencing a missing revision with a phantom delta so
/// the lock (and thus the user's intent) isn't silently discarded, per §3's
/// invariant that a dangling lock downgrades to a warning rather than a
/// fatal error.
fn patch_dangling_locks(file: &mut File) {
    let missing: Vec<Num> = file
        .admin
        .locks
        .iter()
        .map(|(_, rev)| rev.clone())
        .filter(|rev| !file.delta.contains_key(rev))
        .collect();

    for rev in missing {
        log::warn!("lock on nonexistent revision {}; inserting phantom delta", rev);
        file.delta.insert(
            rev,
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: Id(b"unknown".to_vec()),
                state: None,
                branches: vec![],
                next: None,
                commit_id: None,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_archive(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo,v");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        (dir, path)
    }

    const MINIMAL: &[u8] = b"head\t1.1;\naccess;\nsymbols;\nlocks; strict;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\n@\n";

    #[test]
    fn test_load_minimal_archive() {
        let (_dir, path) = write_archive(MINIMAL);
        let repo = Repository::load(&path, 1024 * 1024).unwrap();
        assert_eq!(repo.head(), Some(&Num(b"1.1".to_vec())));
        assert_eq!(repo.default_expand, keyword::Mode::Kv);
    }

    #[test]
    fn test_load_dangling_head_is_fatal() {
        let bad = b"head\t9.9;\naccess;\nsymbols;\nlocks; strict;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\n@\n";
        let (_dir, path) = write_archive(bad);
        assert!(matches!(
            Repository::load(&path, 1024 * 1024),
            Err(Error::DanglingHead(_))
        ));
    }
}
