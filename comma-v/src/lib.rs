//! Grammar-level parsing for RCS archive (`,v`) files.
//!
//! This crate only understands the archive's textual grammar: admin clause,
//! delta headers, description, deltatext bodies. It deliberately knows
//! nothing about revision-number arithmetic, keyword expansion, locking, or
//! how to turn deltas back into file content -- that lives in `rcs-core`,
//! built on top of this crate and `rcs-ed`.
use nom::Finish;

mod error;
mod parser;
mod types;

pub use error::Error;
pub use types::*;

/// Parses a full archive buffer. Strings are not copied during parsing --
/// [`Admin::comment`], [`Delta::date`], [`DeltaText::log`]/[`DeltaText::text`]
/// and [`File::desc`] are all [`Span`]s into `input`.
pub fn parse(input: &[u8]) -> Result<File, Error> {
    Ok(Finish::finish(parser::file(input))
        .map_err(|e| Error::ParseError {
            location: Vec::from(e.input),
            kind: e.code,
        })?
        .1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let input = b"head\t1.1;\naccess;\nsymbols;\nlocks; strict;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\nline 2\n@\n";
        let file = parse(input).unwrap();
        assert_eq!(**file.admin.head.as_ref().unwrap(), b"1.1");
        assert_eq!(file.delta.len(), 1);
        assert_eq!(file.delta_text.len(), 1);

        let (_, dt) = file.revision(&Num(b"1.1".to_vec())).unwrap();
        let text = &input[dt.text.offset..dt.text.offset + dt.text.len];
        assert_eq!(text, b"line 1\nline 2\n");
    }
}
