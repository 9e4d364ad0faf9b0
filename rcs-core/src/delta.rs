//! Delta engine (C8): chain selection, revision reconstruction, deposit
//! splice, and outdate (revision deletion).
use std::collections::HashSet;

use comma_v::{Delta, File, Num};
use thiserror::Error;

use crate::{num, source::materialize_escaped};

#[derive(Debug, Error)]
pub enum Error {
    #[error("repository has no head revision")]
    NoHead,

    #[error("revision {0} does not exist")]
    NoSuchRevision(Num),

    #[error("no branch of {0} leads to the requested revision")]
    NoSuchBranch(Num),

    #[error("delta graph contains a cycle reachable from {0}")]
    Cycle(Num),

    #[error(transparent)]
    Edit(#[from] rcs_ed::Error),

    #[error(transparent)]
    Script(#[from] rcs_ed::ScriptError),

    #[error("cannot delete branch point {0}")]
    BranchPoint(Num),

    #[error("cannot delete locked revision {0}")]
    Locked(Num),
}

/// Chooses the ordered chain of deltas from `head` down to `target`,
/// crossing onto a branch where needed (§4.8 "Chain selection"). The first
/// entry is always the trunk head (full text); every later entry's
/// deltatext is an edit script applied against the text reconstructed so
/// far.
pub fn gen_deltas(file: &File, target: &Num) -> Result<Vec<Num>, Error> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cur = file.admin.head.clone().ok_or(Error::NoHead)?;
    let mut depth = 2;

    loop {
        if !seen.insert(cur.clone()) {
            return Err(Error::Cycle(cur));
        }
        chain.push(cur.clone());

        if cur == *target {
            return Ok(chain);
        }

        let delta = file
            .delta
            .get(&cur)
            .ok_or_else(|| Error::NoSuchRevision(cur.clone()))?;

        if num::count_fields(&cur) == depth && num::partial(target, depth) == cur {
            // `target` branches off here: find the child whose branch
            // index matches the next field of `target`.
            let next_prefix = num::partial(target, depth + 1);
            let branch_start = delta
                .branches
                .iter()
                .find(|b| num::partial(b, depth + 1) == next_prefix)
                .ok_or_else(|| Error::NoSuchBranch(cur.clone()))?;
            cur = branch_start.clone();
            depth += 2;
            continue;
        }

        match &delta.next {
            Some(next) => cur = next.clone(),
            None => return Err(Error::NoSuchRevision(target.clone())),
        }
    }
}

/// Reconstructs the full text of `target` by applying its delta chain in
/// order: the head provides full text, every later delta's deltatext is an
/// edit script applied to the previous text in the chain.
pub fn reconstruct(file: &File, archive: &[u8], target: &Num) -> Result<Vec<u8>, Error> {
    let chain = gen_deltas(file, target)?;
    let mut text: Option<Vec<u8>> = None;

    for num in &chain {
        let dt = file
            .delta_text
            .get(num)
            .ok_or_else(|| Error::NoSuchRevision(num.clone()))?;
        let body = materialize_escaped(&archive[dt.text.offset..dt.text.offset + dt.text.len]);

        text = Some(match text {
            None => body,
            Some(prev) => {
                let commands = rcs_ed::Script::parse(&body[..]).into_command_list()?;
                let lines = rcs_ed::File::from_bytes(&prev).apply(&commands)?;
                rcs_ed::File::new(lines).into_bytes()
            }
        });
    }

    text.ok_or_else(|| Error::NoSuchRevision(target.clone()))
}

/// A new trunk head delta linking back to the revision it displaced. The
/// caller (`ops`) fills in `date`/`author`/`state`/`commit_id` from the
/// invocation and stores the returned delta under `new_num`; the outgoing
/// head's own delta entry is unchanged except for its deltatext, which the
/// caller replaces with the reverse-diff script computed by `crate::diff`
/// (§4.8 "Deposit", steps 3-5).
pub fn splice_new_head(
    old_head: Num,
    date: comma_v::Span,
    author: comma_v::Id,
    state: Option<comma_v::Id>,
    commit_id: Option<comma_v::Sym>,
) -> Delta {
    Delta {
        date,
        author,
        state,
        branches: vec![],
        next: Some(old_head),
        commit_id,
    }
}

/// Outdates (deletes) the range of revisions from `cuthead` to `cuttail`
/// inclusive (§4.8 "Revision deletion"). Refuses if any victim is a branch
/// point or locked. If `cuttail` is present, returns the two
/// materializations the caller must diff to rebuild `cuttail`'s script
/// against `cuthead`'s predecessor; the diff itself is `crate::diff`'s job.
/// If `cuttail` is `None`, deletion runs to the leaf and there is nothing to
/// rebuild -- the parent's child pointer is simply cleared by the caller.
pub fn outdate(
    file: &File,
    archive: &[u8],
    cuthead: &Num,
    cuttail: Option<&Num>,
    locks: &[(comma_v::Id, Num)],
) -> Result<Option<(Vec<u8>, Vec<u8>)>, Error> {
    for victim in chain_between(file, cuthead, cuttail)? {
        let delta = file
            .delta
            .get(&victim)
            .ok_or_else(|| Error::NoSuchRevision(victim.clone()))?;
        if !delta.branches.is_empty() {
            return Err(Error::BranchPoint(victim));
        }
        if locks.iter().any(|(_, rev)| *rev == victim) {
            return Err(Error::Locked(victim));
        }
    }

    match cuttail {
        None => Ok(None),
        Some(tail) => {
            let head_text = reconstruct(file, archive, cuthead)?;
            let tail_text = reconstruct(file, archive, tail)?;
            Ok(Some((head_text, tail_text)))
        }
    }
}

fn chain_between(file: &File, cuthead: &Num, cuttail: Option<&Num>) -> Result<Vec<Num>, Error> {
    let end = cuttail.cloned().unwrap_or_else(|| cuthead.clone());
    let full_chain = gen_deltas(file, &end)?;
    let start_idx = full_chain
        .iter()
        .position(|n| n == cuthead)
        .ok_or_else(|| Error::NoSuchRevision(cuthead.clone()))?;
    Ok(full_chain[start_idx..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn delta(next: Option<&str>, branches: Vec<&str>) -> Delta {
        Delta {
            date: comma_v::Span::new(0, 0),
            author: comma_v::Id(b"ada".to_vec()),
            state: Some(comma_v::Id(b"Exp".to_vec())),
            branches: branches.into_iter().map(|b| Num(b.as_bytes().to_vec())).collect(),
            next: next.map(|n| Num(n.as_bytes().to_vec())),
            commit_id: None,
        }
    }

    fn deltatext(text: &str, archive: &mut String) -> comma_v::DeltaText {
        let offset = archive.len();
        archive.push_str(text);
        comma_v::DeltaText {
            neck: 0,
            log: comma_v::Span::new(0, 0),
            text: comma_v::Span::new(offset, text.len()),
        }
    }

    fn two_revision_trunk() -> (File, String) {
        let mut archive = String::new();
        let mut delta_map = HashMap::new();
        let mut delta_text = HashMap::new();

        delta_map.insert(Num(b"1.2".to_vec()), delta(Some("1.1"), vec![]));
        delta_map.insert(Num(b"1.1".to_vec()), delta(None, vec![]));

        delta_text.insert(Num(b"1.2".to_vec()), deltatext("A\nC\n", &mut archive));
        delta_text.insert(Num(b"1.1".to_vec()), deltatext("d2 1\na2 1\nB\n", &mut archive));

        let file = File {
            admin: comma_v::Admin {
                head: Some(Num(b"1.2".to_vec())),
                branch: None,
                access: vec![],
                symbols: vec![],
                locks: vec![],
                strict: false,
                comment: None,
                expand: None,
            },
            delta: delta_map,
            neck: 0,
            desc: comma_v::Span::new(0, 0),
            delta_text,
            delta_text_order: vec![Num(b"1.2".to_vec()), Num(b"1.1".to_vec())],
        };

        (file, archive)
    }

    #[test]
    fn test_gen_deltas_trunk() {
        let (file, _) = two_revision_trunk();
        let chain = gen_deltas(&file, &Num(b"1.1".to_vec())).unwrap();
        assert_eq!(chain, vec![Num(b"1.2".to_vec()), Num(b"1.1".to_vec())]);
    }

    #[test]
    fn test_reconstruct_trunk_head() {
        let (file, archive) = two_revision_trunk();
        let text = reconstruct(&file, archive.as_bytes(), &Num(b"1.2".to_vec())).unwrap();
        assert_eq!(text, b"A\nC\n");
    }

    #[test]
    fn test_reconstruct_trunk_ancestor() {
        let (file, archive) = two_revision_trunk();
        let text = reconstruct(&file, archive.as_bytes(), &Num(b"1.1".to_vec())).unwrap();
        assert_eq!(text, b"A\nB\n");
    }

    #[test]
    fn test_gen_deltas_missing_revision() {
        let (file, _) = two_revision_trunk();
        assert!(matches!(
            gen_deltas(&file, &Num(b"1.9".to_vec())),
            Err(Error::NoSuchRevision(_))
        ));
    }

    #[test]
    fn test_outdate_to_leaf_returns_none() {
        let (file, archive) = two_revision_trunk();
        let result = outdate(
            &file,
            archive.as_bytes(),
            &Num(b"1.1".to_vec()),
            None,
            &[],
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_outdate_with_tail_returns_materializations() {
        let (file, archive) = two_revision_trunk();
        let (head_text, tail_text) = outdate(
            &file,
            archive.as_bytes(),
            &Num(b"1.2".to_vec()),
            Some(&Num(b"1.1".to_vec())),
            &[],
        )
        .unwrap()
        .unwrap();
        assert_eq!(head_text, b"A\nC\n");
        assert_eq!(tail_text, b"A\nB\n");
    }

    #[test]
    fn test_outdate_refuses_branch_point() {
        let mut archive = String::new();
        let mut delta_map = HashMap::new();
        delta_map.insert(Num(b"1.1".to_vec()), delta(None, vec!["1.1.1.1"]));
        let mut delta_text = HashMap::new();
        delta_text.insert(Num(b"1.1".to_vec()), deltatext("A\n", &mut archive));

        let file = File {
            admin: comma_v::Admin {
                head: Some(Num(b"1.1".to_vec())),
                branch: None,
                access: vec![],
                symbols: vec![],
                locks: vec![],
                strict: false,
                comment: None,
                expand: None,
            },
            delta: delta_map,
            neck: 0,
            desc: comma_v::Span::new(0, 0),
            delta_text,
            delta_text_order: vec![Num(b"1.1".to_vec())],
        };

        assert!(matches!(
            outdate(&file, archive.as_bytes(), &Num(b"1.1".to_vec()), None, &[]),
            Err(Error::BranchPoint(_))
        ));
    }

    #[test]
    fn test_outdate_refuses_locked_revision() {
        let (file, archive) = two_revision_trunk();
        let locks = vec![(comma_v::Id(b"ada".to_vec()), Num(b"1.1".to_vec()))];
        assert!(matches!(
            outdate(&file, archive.as_bytes(), &Num(b"1.1".to_vec()), None, &locks),
            Err(Error::Locked(_))
        ));
    }
}
