use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while, take_while1},
    combinator::{map, recognize, value},
    multi::fold_many0,
    sequence::delimited,
    IResult,
};

use super::char::*;
use crate::types;

pub(super) fn id(input: &[u8]) -> IResult<&[u8], types::Id> {
    map(take_while(|c| is_idchar(c) || c == b'.'), |bytes| {
        types::Id(Vec::from(bytes))
    })(input)
}

pub(super) fn numlike(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|c| c == b'.' || (b'0'..=b'9').contains(&c))(input)
}

pub(super) fn num(input: &[u8]) -> IResult<&[u8], types::Num> {
    map(numlike, |bytes| types::Num(Vec::from(bytes)))(input)
}

fn string_literal(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till1(|c| c == b'@')(input)
}

fn string_escape(input: &[u8]) -> IResult<&[u8], &[u8]> {
    value(&b"@@"[..], tag(b"@@"))(input)
}

/// Matches an archive string `@...@` and returns the raw body, `@@` escapes
/// still doubled, with no allocation performed. This is the lexer design
/// point from spec.md §4.4: the returned slice is a window into the caller's
/// buffer, and materializing it (contracting `@@` to `@`) is deferred to
/// whoever actually needs the bytes -- see `rcs_core::source`.
pub(super) fn string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(
        tag(b"@"),
        recognize(fold_many0(
            alt((string_literal, string_escape)),
            || (),
            |_, _| (),
        )),
        tag(b"@"),
    )(input)
}

pub(super) fn sym(input: &[u8]) -> IResult<&[u8], types::Sym> {
    map(take_while(is_idchar), |bytes| types::Sym(Vec::from(bytes)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_raw() {
        assert_eq!(string(b"@foo bar@").unwrap().1, b"foo bar");
        assert_eq!(string(b"@foo@@bar@").unwrap().1, b"foo@@bar");
        assert_eq!(string(b"@@").unwrap().1, b"");
    }

    #[test]
    fn test_id() {
        assert_eq!(*id(b"adam ").unwrap().1, b"adam");
    }
}
