//! Parses a single line of an RCS `n`-format edit script into an
//! [`EditCommand`]. The format has exactly two shapes, `a<line> <count>` and
//! `d<line> <count>`, sharing a "letter, digits, space, digits" skeleton;
//! [`counted_command`] captures that skeleton once and lets each caller
//! supply the letter and the constructor.
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::map,
    sequence::{preceded, separated_pair},
    Finish, IResult,
};
use thiserror::Error;

/// The internal, index-bearing representation of one script line. Kept
/// distinct from [`crate::Command`], which additionally carries an `Add`
/// command's payload lines once the script reader has consumed them.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EditCommand {
    Add { position: usize, lines: usize },
    Delete { position: usize, lines: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ed command: {0}")]
    InvalidCommand(String),

    #[error("missing ed command")]
    NoCommand,

    #[error("ed command {0:?} requests zero lines, which no real script emits")]
    ZeroCount(String),
}

impl EditCommand {
    pub(crate) fn parse(line: &[u8]) -> Result<Self, Error> {
        let (_, (position, (kind, count))) = Finish::finish(edit_command(line)).map_err(|e| {
            if e.input.is_empty() {
                Error::NoCommand
            } else {
                Error::InvalidCommand(String::from_utf8_lossy(e.input).to_string())
            }
        })?;

        if count == 0 {
            return Err(Error::ZeroCount(String::from_utf8_lossy(line).to_string()));
        }

        Ok(match kind {
            Kind::Add => EditCommand::Add { position, lines: count },
            Kind::Delete => EditCommand::Delete { position, lines: count },
        })
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Add,
    Delete,
}

/// `a<line> <count>` or `d<line> <count>`: a letter tag, two plain decimal
/// fields, one space between them. Neither field can be negative -- the
/// grammar has no sign character to begin with.
fn counted_command(kind: Kind, letter: u8) -> impl Fn(&[u8]) -> IResult<&[u8], (usize, (Kind, usize))> {
    move |input| {
        map(
            preceded(tag(&[letter][..]), separated_pair(digit1, tag(b" "), digit1)),
            move |(position, count): (&[u8], &[u8])| (to_usize(position), (kind, to_usize(count))),
        )(input)
    }
}

fn edit_command(input: &[u8]) -> IResult<&[u8], (usize, (Kind, usize))> {
    alt((counted_command(Kind::Add, b'a'), counted_command(Kind::Delete, b'd')))(input)
}

fn to_usize(digits: &[u8]) -> usize {
    // `digit1` only matches ASCII digits, so this is always valid UTF-8;
    // an ed script with a line count this large would already have blown
    // past every other limit in the pipeline, so an overflow panic here
    // matches the rest of the crate's "trust the archive" posture.
    std::str::from_utf8(digits)
        .expect("digit1 output is ASCII")
        .parse()
        .expect("ed command line counts fit in usize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        assert_eq!(
            EditCommand::parse(b"a2 3").unwrap(),
            EditCommand::Add { position: 2, lines: 3 }
        );
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            EditCommand::parse(b"d20 32121").unwrap(),
            EditCommand::Delete { position: 20, lines: 32121 }
        );
    }

    #[test]
    fn test_parse_empty_is_no_command() {
        assert!(matches!(EditCommand::parse(b""), Err(Error::NoCommand)));
    }

    #[test]
    fn test_parse_missing_count_is_invalid() {
        assert!(matches!(
            EditCommand::parse(b"a2 "),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_unknown_letter_is_invalid() {
        assert!(matches!(
            EditCommand::parse(b"c1 2"),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_garbage_is_invalid() {
        assert!(matches!(EditCommand::parse(b"x"), Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_zero_count_is_rejected() {
        assert!(matches!(EditCommand::parse(b"a2 0"), Err(Error::ZeroCount(_))));
    }
}
