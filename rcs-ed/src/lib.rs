//! Applies RCS `-n`-format edit scripts (GLOSSARY "edit script `n`-format")
//! to a line buffer. An edit script is a list of `a` (add) and `d` (delete)
//! commands; this crate only knows how to run one against in-memory lines,
//! not how to choose or chain the deltas that produce it -- that lives in
//! `rcs_core::delta`.
use thiserror::Error;

mod command;

mod script;
pub use script::{Command, CommandList, Script};
pub use script::Error as ScriptError;

#[derive(Debug, Clone)]
pub struct File {
    lines: Vec<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("edit script command refers to line {line}, past end of file ({len} lines)")]
    LineOutOfRange { line: usize, len: usize },
}

#[derive(Debug, Clone)]
enum Line<'a> {
    Add(Vec<&'a Vec<Vec<u8>>>),
    Delete,
    Keep,
    Replace(Vec<&'a Vec<Vec<u8>>>),
}

impl File {
    pub fn new(lines: Vec<Vec<u8>>) -> Self {
        Self { lines }
    }

    /// Splits already-read content into lines the way deltatext does: a
    /// trailing newline does not produce a phantom empty final line, but its
    /// absence still yields the final (possibly partial) line as-is.
    pub fn from_bytes(content: &[u8]) -> Self {
        if content.is_empty() {
            return Self { lines: vec![] };
        }

        let mut lines: Vec<Vec<u8>> =
            content.split(|&b| b == b'\n').map(|s| s.to_vec()).collect();

        if content.ends_with(b"\n") {
            lines.pop();
        }

        Self { lines }
    }

    pub fn apply(&self, commands: &CommandList) -> Result<Vec<Vec<u8>>, Error> {
        let line_commands = calculate_line_commands(self.lines.len(), commands)?;

        let mut output = Vec::with_capacity(line_commands.body.len());
        output.extend(
            line_commands
                .prefix
                .iter()
                .flat_map(|content| content.iter())
                .cloned(),
        );
        for (orig, line) in self.lines.iter().zip(line_commands.body.into_iter()) {
            match line {
                Line::Add(contents) => {
                    output.push(orig.clone());
                    output.extend(contents.iter().flat_map(|content| content.iter()).cloned());
                }
                Line::Delete => {}
                Line::Keep => {
                    output.push(orig.clone());
                }
                Line::Replace(contents) => {
                    output.extend(contents.iter().flat_map(|content| content.iter()).cloned());
                }
            }
        }

        Ok(output)
    }

    pub fn apply_in_place(&mut self, commands: &CommandList) -> Result<(), Error> {
        self.lines = self.apply(commands)?;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Joins the lines back into a byte stream, terminating with a newline
    /// if there is any content. Deltatext bodies in practice always end
    /// this way; this engine does not track the no-trailing-newline case a
    /// working file could in principle have.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut out = self.lines.join(&b'\n');
        if !self.lines.is_empty() {
            out.push(b'\n');
        }
        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.as_bytes()
    }
}

struct LineCommands<'a> {
    /// Content from an `a0 N` command, which inserts before line 1 -- the one
    /// case that doesn't fit the "attach to the line above" model below.
    prefix: Vec<&'a Vec<Vec<u8>>>,
    body: Vec<Line<'a>>,
}

fn calculate_line_commands(n: usize, commands: &CommandList) -> Result<LineCommands, Error> {
    let mut line_commands = vec![Line::Keep; n];
    let mut prefix: Vec<&Vec<Vec<u8>>> = Vec::new();

    for command in commands {
        match command {
            Command::Add { position, content } if *position > 0 => {
                if *position > n {
                    return Err(Error::LineOutOfRange {
                        line: *position,
                        len: n,
                    });
                }
                match &mut line_commands[position - 1] {
                    Line::Add(existing) => {
                        // FIXME: unclear from the format spec whether multiple
                        // `a` commands targeting the same line should even
                        // occur; treat them as appending in script order.
                        existing.push(content);
                    }
                    Line::Delete => {
                        line_commands[position - 1] = Line::Replace(vec![content]);
                    }
                    Line::Keep => {
                        line_commands[position - 1] = Line::Add(vec![content]);
                    }
                    Line::Replace(existing) => {
                        existing.push(content);
                    }
                }
            }
            Command::Add { content, .. } => {
                // position == 0: insert before the first line.
                prefix.push(content);
            }
            Command::Delete { position, lines } => {
                if *position == 0 || position + lines - 1 > n {
                    return Err(Error::LineOutOfRange {
                        line: position + lines.saturating_sub(1),
                        len: n,
                    });
                }
                line_commands.splice(
                    position - 1..position + lines - 1,
                    vec![Line::Delete; *lines],
                );
            }
        }
    }

    Ok(LineCommands {
        prefix,
        body: line_commands,
    })
}
