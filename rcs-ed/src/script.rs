//! Reads an RCS `n`-format edit script line-by-line from any [`Read`],
//! turning each `a`/`d` line (plus, for `a`, the payload lines that follow
//! it) into a [`Command`] the rest of the crate can apply.
use std::io::{BufRead, BufReader, Read, Split};

use thiserror::Error;

use crate::command::{self, EditCommand};

/// Streams [`Command`]s out of a reader one script line at a time, pulling
/// an `Add` command's payload lines eagerly so that each yielded item is
/// immediately applicable.
pub struct Script<R: Read> {
    lines: Split<BufReader<R>>,
    line_no: usize,
}

/// The external representation of an ed command: unlike [`EditCommand`], an
/// `Add` here already carries the content lines it inserts.
#[derive(Debug)]
pub enum Command {
    Add { position: usize, content: Vec<Vec<u8>> },
    Delete { position: usize, lines: usize },
}

pub type CommandList = Vec<Command>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("command parsing error on line {line}: {error}")]
    Command {
        #[source]
        error: command::Error,
        line: usize,
    },

    #[error("unexpected end of file: wanted {want} line(s) and only got {have}")]
    EndOfFile { have: usize, want: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl<R: Read> Script<R> {
    pub fn parse(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).split(b'\n'),
            line_no: 0,
        }
    }

    pub fn into_command_list(self) -> Result<CommandList, Error> {
        self.into_iter().collect()
    }

    /// Reads exactly `want` payload lines for an in-flight `Add` command.
    /// Anything less than `want` before the reader runs dry is a truncated
    /// script, not a normal end of iteration.
    fn read_payload(&mut self, want: usize) -> Result<Vec<Vec<u8>>, Error> {
        let mut content = Vec::with_capacity(want);
        for _ in 0..want {
            match self.lines.next() {
                Some(Ok(line)) => {
                    self.line_no += 1;
                    content.push(line);
                }
                Some(Err(e)) => return Err(Error::Io(e)),
                None => break,
            }
        }
        if content.len() < want {
            return Err(Error::EndOfFile { have: content.len(), want });
        }
        Ok(content)
    }
}

impl<R: Read> Iterator for Script<R> {
    type Item = Result<Command, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.lines.next()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e.into())),
        };
        self.line_no += 1;
        let command_line = self.line_no;

        match EditCommand::parse(&raw) {
            Ok(EditCommand::Add { position, lines }) => {
                Some(self.read_payload(lines).map(|content| Command::Add { position, content }))
            }
            Ok(EditCommand::Delete { position, lines }) => Some(Ok(Command::Delete { position, lines })),
            Err(error) => Some(Err(Error::Command { error, line: command_line })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_consumes_payload() {
        let commands = Script::parse(&b"a1 2\nfoo\nbar\n"[..]).into_command_list().unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            Command::Add { position, content } => {
                assert_eq!(*position, 1);
                assert_eq!(content, &vec![b"foo".to_vec(), b"bar".to_vec()]);
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_has_no_payload() {
        let commands = Script::parse(&b"d3 2\n"[..]).into_command_list().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], Command::Delete { position: 3, lines: 2 }));
    }

    #[test]
    fn test_truncated_add_payload_is_end_of_file() {
        let result = Script::parse(&b"a1 3\nonly one line\n"[..]).into_command_list();
        assert!(matches!(result, Err(Error::EndOfFile { have: 1, want: 3 })));
    }

    #[test]
    fn test_invalid_command_reports_line_number() {
        let result = Script::parse(&b"a1 1\nfoo\nbogus\n"[..]).into_command_list();
        assert!(matches!(result, Err(Error::Command { line: 3, .. })));
    }
}
