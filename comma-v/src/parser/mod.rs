use std::collections::HashMap;

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{multispace0, multispace1},
    combinator::opt,
    multi::{fold_many0, many0},
    sequence::{delimited, preceded, separated_pair, tuple},
    IResult, Offset,
};

use crate::types;

mod char;
mod scalar;
use self::{char::is_idchar, scalar::*};

struct RawAdmin<'a> {
    head: Option<types::Num>,
    branch: Option<types::Num>,
    access: Vec<types::Id>,
    symbols: Vec<(types::Sym, types::Num)>,
    locks: Vec<(types::Id, types::Num)>,
    strict: bool,
    comment: Option<&'a [u8]>,
    expand: Option<&'a [u8]>,
}

struct RawDelta<'a> {
    date: &'a [u8],
    author: types::Id,
    state: Option<types::Id>,
    branches: Vec<types::Num>,
    next: Option<types::Num>,
    commit_id: Option<types::Sym>,
}

struct RawDeltaText<'a> {
    /// Position of this clause's `revno`; used to derive `neck`.
    marker: &'a [u8],
    log: &'a [u8],
    text: &'a [u8],
}

/// Parses a full archive. `root` must be the exact slice handed to
/// [`crate::parse`] -- every `Span` in the result is measured as a byte
/// offset from its start, via [`Offset`].
pub(crate) fn file<'a>(root: &'a [u8]) -> IResult<&'a [u8], types::File> {
    let (input, admin) = delimited(multispace0, admin, multispace0)(root)?;
    let (input, delta) = many0(delimited(multispace0, delta, multispace0))(input)?;
    let desc_marker = input;
    let (input, desc) = desc(input)?;
    let (input, delta_text) = preceded(
        multispace0,
        many0(delimited(multispace0, delta_text, multispace0)),
    )(input)?;

    let span_of = |s: &[u8]| types::Span::new(root.offset(s), s.len());

    let admin = types::Admin {
        head: admin.head,
        branch: admin.branch,
        access: admin.access,
        symbols: admin.symbols,
        locks: admin.locks,
        strict: admin.strict,
        comment: admin.comment.map(span_of),
        expand: admin.expand.map(span_of),
    };

    let delta_map = delta
        .into_iter()
        .map(|(num, d)| {
            (
                num,
                types::Delta {
                    date: span_of(d.date),
                    author: d.author,
                    state: d.state,
                    branches: d.branches,
                    next: d.next,
                    commit_id: d.commit_id,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    let delta_text_order: Vec<types::Num> = delta_text.iter().map(|(n, _)| n.clone()).collect();
    let delta_text_map = delta_text
        .into_iter()
        .map(|(num, dt)| {
            (
                num,
                types::DeltaText {
                    neck: root.offset(dt.marker),
                    log: span_of(dt.log),
                    text: span_of(dt.text),
                },
            )
        })
        .collect::<HashMap<_, _>>();

    Ok((
        input,
        types::File {
            admin,
            delta: delta_map,
            neck: root.offset(desc_marker),
            desc: span_of(desc),
            delta_text: delta_text_map,
            delta_text_order,
        },
    ))
}

/// A bare `ident word* ";"` phrase this parser doesn't recognize. Forward
/// compatibility (spec.md §4.5): unrecognized clauses are skipped, not
/// rejected.
fn newphrase(input: &[u8]) -> IResult<&[u8], ()> {
    fn word(input: &[u8]) -> IResult<&[u8], ()> {
        nom::branch::alt((
            |i| take_while1(is_idchar)(i).map(|(r, _): (&[u8], &[u8])| (r, ())),
            |i| numlike(i).map(|(r, _)| (r, ())),
            |i| string(i).map(|(r, _)| (r, ())),
            |i| tag::<_, _, nom::error::Error<&[u8]>>(b":")(i).map(|(r, _)| (r, ())),
        ))(input)
    }

    let (input, _) = take_while1(is_idchar)(input)?;
    let (input, _) = many0(preceded(multispace0, word))(input)?;
    let (input, _) = delimited(multispace0, tag(b";"), multispace0)(input)?;
    Ok((input, ()))
}

fn admin(input: &[u8]) -> IResult<&[u8], RawAdmin> {
    let (input, head) = delimited(
        tuple((tag(b"head"), multispace0)),
        opt(num),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, branch) = opt(delimited(
        tuple((tag(b"branch"), multispace0)),
        opt(num),
        tuple((multispace0, tag(b";"), multispace0)),
    ))(input)?;
    let branch = branch.flatten();

    let (input, access) = delimited(
        tag(b"access"),
        many0(preceded(multispace1, id)),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, symbols) = delimited(
        tag(b"symbols"),
        fold_many0(
            separated_pair(
                delimited(multispace0, sym, multispace0),
                tag(b":"),
                delimited(multispace0, num, multispace0),
            ),
            Vec::new,
            |mut acc, pair| {
                acc.push(pair);
                acc
            },
        ),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, locks) = delimited(
        tag(b"locks"),
        fold_many0(
            separated_pair(
                delimited(multispace0, id, multispace0),
                tag(b":"),
                delimited(multispace0, num, multispace0),
            ),
            Vec::new,
            |mut acc, pair| {
                acc.push(pair);
                acc
            },
        ),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, strict) = opt(tuple((
        tag(b"strict"),
        multispace0,
        tag(b";"),
        multispace0,
    )))(input)?;
    let strict = strict.is_some();

    let (input, comment) = opt(delimited(
        tuple((tag(b"comment"), multispace1)),
        string,
        tuple((multispace0, tag(b";"), multispace0)),
    ))(input)?;

    let (input, expand) = opt(delimited(
        tuple((tag(b"expand"), multispace1)),
        string,
        tuple((multispace0, tag(b";"), multispace0)),
    ))(input)?;

    let (input, _) = many0(delimited(multispace0, newphrase, multispace0))(input)?;

    Ok((
        input,
        RawAdmin {
            head,
            branch,
            access,
            symbols,
            locks,
            strict,
            comment,
            expand,
        },
    ))
}

fn delta(input: &[u8]) -> IResult<&[u8], (types::Num, RawDelta)> {
    let (input, revno) = nom::sequence::terminated(num, multispace1)(input)?;

    let (input, date) = delimited(
        tuple((tag(b"date"), multispace1)),
        numlike,
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, author) = delimited(
        tuple((tag(b"author"), multispace1)),
        id,
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, state) = delimited(
        tuple((tag(b"state"), multispace0)),
        opt(id),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, branches) = delimited(
        tag(b"branches"),
        many0(preceded(multispace1, num)),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, next) = delimited(
        tuple((tag(b"next"), multispace0)),
        opt(num),
        tuple((multispace0, tag(b";"), multispace0)),
    )(input)?;

    let (input, commit_id) = opt(delimited(
        tuple((tag(b"commitid"), multispace1)),
        sym,
        tuple((multispace0, tag(b";"), multispace0)),
    ))(input)?;

    let (input, _) = many0(delimited(multispace0, newphrase, multispace0))(input)?;

    Ok((
        input,
        (
            revno,
            RawDelta {
                date,
                author,
                state,
                branches,
                next,
                commit_id,
            },
        ),
    ))
}

fn delta_text(input: &[u8]) -> IResult<&[u8], (types::Num, RawDeltaText)> {
    let marker = input;
    let (input, n) = num(input)?;
    let (input, _) = preceded(multispace1, tag(b"log"))(input)?;
    let (input, log) = delimited(multispace1, string, multispace1)(input)?;
    let (input, _) = tag(b"text")(input)?;
    let (input, text) = preceded(multispace1, string)(input)?;

    Ok((input, (n, RawDeltaText { marker, log, text })))
}

fn desc(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tuple((tag(b"desc"), multispace1)), string)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin() {
        let input = b"head     1.1;\naccess;\nsymbols;\nlocks; strict;\ncomment    @# @;\n\n";
        let have = admin(input).unwrap().1;
        assert_eq!(*have.head.unwrap(), b"1.1");
        assert!(have.branch.is_none());
        assert_eq!(have.access.len(), 0);
        assert_eq!(have.symbols.len(), 0);
        assert_eq!(have.locks.len(), 0);
        assert!(have.strict);
        assert_eq!(have.comment.unwrap(), b"# ");
        assert!(have.expand.is_none());
    }

    #[test]
    fn test_delta() {
        let input = b"1.2\ndate\t2021.08.20.17.34.26;\tauthor adam;\tstate Exp;\nbranches\n\t1.2.2.1\n\t1.2.4.1;\nnext\t1.1;\n";
        let (num, have) = delta(input).unwrap().1;
        assert_eq!(*num, b"1.2");
        assert_eq!(have.date, b"2021.08.20.17.34.26");
        assert_eq!(*have.author, b"adam");
        assert_eq!(*have.state.unwrap(), b"Exp");
        assert_eq!(
            have.branches,
            vec![
                types::Num::from(b"1.2.2.1".to_vec()),
                types::Num::from(b"1.2.4.1".to_vec())
            ]
        );
        assert_eq!(*have.next.unwrap(), b"1.1");
        assert!(have.commit_id.is_none());
    }

    #[test]
    fn test_delta_text() {
        let input = b"1.1\nlog\n@initial revision\n@\ntext\n@line one\nline two\n@\n";
        let (num, have) = delta_text(input).unwrap().1;
        assert_eq!(*num, b"1.1");
        assert_eq!(have.log, b"initial revision\n");
        assert_eq!(have.text, b"line one\nline two\n");

        let (num, have) = delta_text(b"1.2 log @@ text @@").unwrap().1;
        assert_eq!(*num, b"1.2");
        assert_eq!(have.log, b"");
        assert_eq!(have.text, b"");
    }

    #[test]
    fn test_desc() {
        assert_eq!(desc(b"desc @@").unwrap().1, b"");
        assert_eq!(desc(b"desc @foo@@bar@").unwrap().1, b"foo@@bar");
        assert_eq!(desc(b"desc   @foo@@bar@").unwrap().1, b"foo@@bar");
    }

    #[test]
    fn test_file() {
        let input: &[u8] = b"head\t1.2;\naccess;\nsymbols;\nlocks; strict;\n\n1.2\ndate\t2021.08.11.19.08.27;\tauthor adam;\tstate Exp;\nbranches;\nnext\t1.1;\n\n1.1\ndate\t2021.08.10.10.00.00;\tauthor adam;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.2\nlog\n@two\n@\ntext\n@A\nC\n@\n\n1.1\nlog\n@one\n@\ntext\n@d2 1\na2 1\nC\n@\n";
        let have = file(input).unwrap().1;

        assert_eq!(*have.admin.head.unwrap(), b"1.2");
        assert_eq!(have.delta.len(), 2);
        assert_eq!(have.delta_text.len(), 2);
        assert_eq!(have.delta_text_order.len(), 2);
        assert_eq!(*have.delta_text_order[0], b"1.2");
        assert_eq!(*have.delta_text_order[1], b"1.1");
    }

    #[test]
    fn test_newphrase_skip() {
        let input = b"head 1.1;\naccess;\nsymbols;\nlocks; strict;\ncomment @# @;\nfoo bar baz : @q@ 1.2;\n\n1.1\ndate 2021.01.01.00.00.00; author a; state Exp;\nbranches;\nnext ;\nxtra 1 2 3;\n\ndesc\n@@\n1.1\nlog\n@x@\ntext\n@y@\n";
        let f = file(input).unwrap().1;
        assert_eq!(*f.admin.head.unwrap(), b"1.1");
    }
}
