//! Symbol resolver (C7): expands a possibly-symbolic revision designator
//! into a numeric revision or branch number.
use comma_v::{File, Id, Num};
use thiserror::Error;

use crate::{date, num, source::materialize_escaped};

#[derive(Debug, Error)]
pub enum Error {
    #[error("symbolic name {0:?} is not defined")]
    UnknownSymbol(String),

    #[error("no revision matches the given criteria: {0}")]
    NoMatch(String),

    #[error("revision {0} does not exist")]
    NoSuchRevision(String),

    #[error("designator {0:?} requires a working-file keyword value, which was not supplied")]
    MissingWorkingValue(String),
}

/// Criteria for selecting a revision on a branch by walking candidates in
/// order and picking the most recent one that matches (§4.7).
#[derive(Debug, Default, Clone)]
pub struct Criteria {
    pub date: Option<Vec<u8>>,
    pub author: Option<Id>,
    pub state: Option<Id>,
}

impl Criteria {
    fn matches(&self, file: &File, archive: &[u8], candidate: &Num) -> bool {
        let delta = match file.delta.get(candidate) {
            Some(d) => d,
            None => return false,
        };

        if let Some(want_date) = &self.date {
            let span = delta.date;
            let have_date = materialize_escaped(&archive[span.offset..span.offset + span.len]);
            match date::cmp_date(&have_date, want_date) {
                Ok(std::cmp::Ordering::Greater) => return false,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        if let Some(author) = &self.author {
            if &delta.author != author {
                return false;
            }
        }
        if let Some(state) = &self.state {
            if delta.state.as_ref() != Some(state) {
                return false;
            }
        }
        true
    }
}

/// Resolves a designator string to a concrete revision number.
///
/// `working_value` supplies the revision a bare `$` designator should read
/// from the working file's own keyword values, since this module has no
/// access to the working file itself.
pub fn resolve(
    file: &File,
    archive: &[u8],
    designator: &str,
    criteria: &Criteria,
    working_value: Option<&Num>,
) -> Result<Num, Error> {
    if designator.is_empty() {
        return default_revision(file, archive);
    }

    if designator == "$" {
        return working_value
            .cloned()
            .ok_or_else(|| Error::MissingWorkingValue(designator.to_string()));
    }

    if let Some(rest) = designator.strip_prefix('.') {
        let branch = file
            .admin
            .branch
            .clone()
            .ok_or_else(|| Error::NoMatch("no default branch set".to_string()))?;
        let combined = format!("{}.{}", branch, rest);
        return resolve(file, archive, &combined, criteria, working_value);
    }

    if let Some(sym_num) = lookup_symbol(file, designator) {
        return resolve_number_or_branch(file, archive, &sym_num, criteria);
    }

    // Numeric (possibly mixed with symbolic field prefixes, or trailing `.`
    // meaning "latest on this branch").
    let expanded = expand_fields(file, designator)?;
    resolve_number_or_branch(file, archive, &expanded, criteria)
}

fn lookup_symbol(file: &File, name: &str) -> Option<Num> {
    file.admin
        .symbols
        .iter()
        .find(|(sym, _)| sym.as_slice() == name.as_bytes())
        .map(|(_, n)| n.clone())
}

/// Resolves embedded symbolic field prefixes in a mixed designator like
/// `rel1.3`, then normalizes leading zeros away.
fn expand_fields(file: &File, designator: &str) -> Result<Num, Error> {
    let trailing_dot = designator.ends_with('.');
    let trimmed = designator.trim_end_matches('.');

    let mut out_fields: Vec<String> = Vec::new();
    for field in trimmed.split('.') {
        if field.chars().all(|c| c.is_ascii_digit()) {
            out_fields.push(field.trim_start_matches('0').to_string());
            if out_fields.last().unwrap().is_empty() {
                out_fields.pop();
                out_fields.push("0".to_string());
            }
        } else if let Some(sym_num) = lookup_symbol(file, field) {
            out_fields.push(sym_num.to_string());
        } else {
            return Err(Error::UnknownSymbol(field.to_string()));
        }
    }

    let mut joined = out_fields.join(".");
    if trailing_dot {
        joined.push('.');
    }
    Ok(Num(joined.into_bytes()))
}

fn resolve_number_or_branch(
    file: &File,
    archive: &[u8],
    n: &Num,
    criteria: &Criteria,
) -> Result<Num, Error> {
    let text = n.to_string();
    let trailing_dot = text.ends_with('.');
    let stripped = text.trim_end_matches('.');
    let candidate = Num(stripped.as_bytes().to_vec());

    let is_branch = num::count_fields(&candidate) % 2 == 0;

    if trailing_dot || is_branch {
        return latest_on_branch(file, archive, &candidate, criteria);
    }

    if file.delta.contains_key(&candidate) {
        Ok(candidate)
    } else {
        Err(Error::NoSuchRevision(candidate.to_string()))
    }
}

/// Walks every delta whose number shares `branch`'s prefix and picks the
/// most recent match, per §4.7's candidate-selection rule.
fn latest_on_branch(
    file: &File,
    archive: &[u8],
    branch: &Num,
    criteria: &Criteria,
) -> Result<Num, Error> {
    let mut candidates: Vec<&Num> = file
        .delta
        .keys()
        .filter(|num| num::branch_of(num) == *branch || **num == *branch)
        .collect();

    candidates.sort_by(|a, b| num::cmp_num(b, a));

    for candidate in candidates {
        if criteria.matches(file, archive, candidate) {
            return Ok(candidate.clone());
        }
    }

    Err(Error::NoMatch(format!(
        "no revision on branch {} matches the given criteria",
        branch
    )))
}

/// Repository default designator: default branch tip if set, else trunk
/// tip.
fn default_revision(file: &File, archive: &[u8]) -> Result<Num, Error> {
    if let Some(branch) = &file.admin.branch {
        return latest_on_branch(file, archive, branch, &Criteria::default());
    }

    file.admin
        .head
        .clone()
        .ok_or_else(|| Error::NoMatch("repository has no head revision".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use comma_v::Sym;
    use std::collections::HashMap;

    fn delta(author: &str, state: &str) -> comma_v::Delta {
        comma_v::Delta {
            date: comma_v::Span::new(0, 0),
            author: Id(author.as_bytes().to_vec()),
            state: Some(Id(state.as_bytes().to_vec())),
            branches: vec![],
            next: None,
            commit_id: None,
        }
    }

    fn sample_file() -> File {
        let mut delta_map = HashMap::new();
        delta_map.insert(Num(b"1.1".to_vec()), delta("ada", "Exp"));
        delta_map.insert(Num(b"1.2".to_vec()), delta("bob", "Exp"));

        File {
            admin: comma_v::Admin {
                head: Some(Num(b"1.2".to_vec())),
                branch: None,
                access: vec![],
                symbols: vec![(Sym(b"v1".to_vec()), Num(b"1.1".to_vec()))],
                locks: vec![],
                strict: false,
                comment: None,
                expand: None,
            },
            delta: delta_map,
            neck: 0,
            desc: comma_v::Span::new(0, 0),
            delta_text: HashMap::new(),
            delta_text_order: vec![],
        }
    }

    #[test]
    fn test_resolve_empty_is_head() {
        let file = sample_file();
        assert_eq!(
            resolve(&file, b"", "", &Criteria::default(), None).unwrap(),
            Num(b"1.2".to_vec())
        );
    }

    #[test]
    fn test_resolve_symbol() {
        let file = sample_file();
        assert_eq!(
            resolve(&file, b"", "v1", &Criteria::default(), None).unwrap(),
            Num(b"1.1".to_vec())
        );
    }

    #[test]
    fn test_resolve_unknown_symbol() {
        let file = sample_file();
        assert!(matches!(
            resolve(&file, b"", "nope", &Criteria::default(), None),
            Err(Error::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_resolve_numeric() {
        let file = sample_file();
        assert_eq!(
            resolve(&file, b"", "1.1", &Criteria::default(), None).unwrap(),
            Num(b"1.1".to_vec())
        );
    }
}
