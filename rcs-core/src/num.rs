//! Revision-number algebra: dotted decimal sequences compared and sliced
//! per field, never parsed into a fixed-width integer. An odd field count
//! names a revision, an even one names a branch.
use std::cmp::Ordering;

use comma_v::Num;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("revision number {0} has fewer than {1} field(s)")]
    MissingField(Num, usize),

    #[error("revision number {0} has no fields")]
    Empty(Num),
}

fn fields(s: &[u8]) -> Vec<&[u8]> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(|&b| b == b'.').collect()
    }
}

fn strip_leading_zeros(field: &[u8]) -> &[u8] {
    if field.is_empty() {
        return field;
    }
    // Keep at least one digit: an all-zero field strips down to "0".
    let first_nonzero = field.iter().position(|&b| b != b'0').unwrap_or(field.len() - 1);
    &field[first_nonzero..]
}

fn cmp_field(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Lexicographic-by-field, numeric-per-field comparison. A missing field
/// ranks higher than any present field, so `1.2` > `1.2.0`... no: `1.2` has
/// fewer fields than `1.2.1`, so `1.2` is missing field 3 and ranks *above*
/// `1.2.1`.
pub fn cmp_num(a: &Num, b: &Num) -> Ordering {
    let af = fields(a);
    let bf = fields(b);
    let n = af.len().max(bf.len());

    for i in 0..n {
        match (af.get(i), bf.get(i)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) => match cmp_field(x, y) {
                Ordering::Equal => continue,
                ord => return ord,
            },
        }
    }

    Ordering::Equal
}

/// Compares only the k-th (1-based) field; both numbers must have at least
/// `k` fields.
pub fn cmp_num_field(a: &Num, b: &Num, k: usize) -> Result<Ordering, Error> {
    let af = fields(a);
    let bf = fields(b);

    let x = af.get(k - 1).ok_or_else(|| Error::MissingField(a.clone(), k))?;
    let y = bf.get(k - 1).ok_or_else(|| Error::MissingField(b.clone(), k))?;

    Ok(cmp_field(x, y))
}

pub fn count_fields(s: &Num) -> usize {
    fields(s).len()
}

/// If `s` already names a branch (even field count), returns it unchanged;
/// otherwise strips the final field.
pub fn branch_of(s: &Num) -> Num {
    let f = fields(s);
    if f.is_empty() || f.len() % 2 == 0 {
        return s.clone();
    }

    Num(f[..f.len() - 1].join(&b'.'))
}

/// The first `k` dot-joined fields of `s`.
pub fn partial(s: &Num, k: usize) -> Num {
    let f = fields(s);
    let k = k.min(f.len());
    Num(f[..k].join(&b'.'))
}

/// Increments the final field as a decimal integer; no width limit, no
/// carry into earlier fields (`999` becomes `1000`).
pub fn increment(s: &Num) -> Result<Num, Error> {
    let f = fields(s);
    let last = f.last().ok_or_else(|| Error::Empty(s.clone()))?;

    let mut digits: Vec<u8> = last.to_vec();
    let mut carry = true;
    for d in digits.iter_mut().rev() {
        if !carry {
            break;
        }
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            carry = false;
        }
    }
    if carry {
        digits.insert(0, b'1');
    }

    let mut out = f[..f.len() - 1].join(&b'.');
    if !out.is_empty() {
        out.push(b'.');
    }
    out.extend(digits);

    Ok(Num(out))
}

/// Like [`cmp_num`] but only considers the first `k` fields; a number with
/// fewer than `k` fields is treated as missing the rest, which ranks higher.
pub fn cmp_partial(a: &Num, b: &Num, k: usize) -> Ordering {
    cmp_num(&partial(a, k), &partial(b, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Num {
        Num(s.as_bytes().to_vec())
    }

    #[test]
    fn test_cmp_num_basic() {
        assert_eq!(cmp_num(&num("1.2"), &num("1.3")), Ordering::Less);
        assert_eq!(cmp_num(&num("1.10"), &num("1.9")), Ordering::Greater);
        assert_eq!(cmp_num(&num("1.02"), &num("1.2")), Ordering::Equal);
    }

    #[test]
    fn test_cmp_num_missing_field_ranks_higher() {
        assert_eq!(cmp_num(&num("1.2"), &num("1.2.1")), Ordering::Greater);
        assert_eq!(cmp_num(&num("1.2.1"), &num("1.2")), Ordering::Less);
    }

    #[test]
    fn test_count_fields() {
        assert_eq!(count_fields(&num("1.2.3.4")), 4);
        assert_eq!(count_fields(&num("")), 0);
    }

    #[test]
    fn test_branch_of() {
        assert_eq!(branch_of(&num("1.2.3.4")), num("1.2.3.4"));
        assert_eq!(branch_of(&num("1.2.3")), num("1.2"));
    }

    #[test]
    fn test_partial() {
        assert_eq!(partial(&num("1.2.3.4"), 2), num("1.2"));
        assert_eq!(partial(&num("1.2"), 10), num("1.2"));
    }

    #[test]
    fn test_increment() {
        assert_eq!(increment(&num("1.9")).unwrap(), num("1.10"));
        assert_eq!(increment(&num("1.999")).unwrap(), num("1.1000"));
        assert_eq!(increment(&num("1")).unwrap(), num("2"));
    }

    #[test]
    fn test_cmp_partial() {
        assert_eq!(cmp_partial(&num("1.2.3"), &num("1.2.9"), 2), Ordering::Equal);
        assert_eq!(cmp_partial(&num("1.2"), &num("1.3.1"), 2), Ordering::Less);
    }
}
