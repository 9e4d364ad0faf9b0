//! Read-only access to an archive file (C1 arena + C2 "fro" abstraction).
//!
//! `Source` owns the archive bytes for as long as any [`comma_v::Span`]
//! referring into it is alive -- the single-allocation, bulk-release
//! discipline the original design calls an arena (§4.1). Below a configured
//! size, the file is read fully into memory; above it, a read-only mapping
//! is used instead. Either way callers see the same `&[u8]`, so `comma_v`'s
//! parser and `rcs_core`'s other modules never need to know which backing
//! was chosen.
use std::{fs, io, path::Path};

use comma_v::Span;
use memmap2::Mmap;
use thiserror::Error;

/// Default memory-limit threshold (§6 "a memory-limit hint"): files at or
/// below this size are read fully into a `Vec`; larger files are mapped.
pub const DEFAULT_MEM_LIMIT: u64 = 256 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot access {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unexpected end of file in {path}")]
    UnexpectedEof { path: String },
}

enum Backing {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

pub struct Source {
    path: String,
    backing: Backing,
}

impl Source {
    pub fn open(path: impl AsRef<Path>, mem_limit: u64) -> Result<Self, Error> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        let file = fs::File::open(path_ref).map_err(|source| Error::Open {
            path: display.clone(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| Error::Open {
                path: display.clone(),
                source,
            })?
            .len();

        let backing = if len > mem_limit {
            log::trace!("mapping {} ({} bytes)", display, len);
            // SAFETY: the archive is only ever read by this process; callers
            // accept the documented risk of truncation races the same way
            // the design notes do for NFS stale-handle scenarios.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Error::Open {
                path: display.clone(),
                source,
            })?;
            Backing::Mapped(mmap)
        } else {
            log::trace!("buffering {} ({} bytes)", display, len);
            Backing::Buffered(fs::read(path_ref).map_err(|source| Error::Open {
                path: display.clone(),
                source,
            })?)
        };

        Ok(Self {
            path: display,
            backing,
        })
    }

    pub fn from_bytes(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            backing: Backing::Buffered(bytes),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(m) => &m[..],
            Backing::Buffered(v) => &v[..],
        }
    }

    /// Concatenates a span's bytes and contracts `@@` escapes to `@`
    /// (`materialize_escaped`).
    pub fn materialize(&self, span: Span) -> Vec<u8> {
        materialize_escaped(&self.as_bytes()[span.offset..span.offset + span.len])
    }
}

/// Contracts `@@` to `@` within an already-sliced span body. Free function
/// so callers holding only a borrowed slice (e.g. a `Source`-less test) can
/// use it without constructing a `Source`.
pub fn materialize_escaped(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'@' && i + 1 < body.len() && body[i + 1] == b'@' {
            out.push(b'@');
            i += 2;
        } else {
            out.push(body[i]);
            i += 1;
        }
    }
    out
}

/// Escapes literal `@` bytes for re-emission inside an archive string.
pub fn escape(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    for &b in body {
        out.push(b);
        if b == b'@' {
            out.push(b'@');
        }
    }
    out
}

/// A sequential cursor over a byte slice, used where code wants `try_get_byte`
/// / `seek` semantics rather than direct slicing -- the working-file reader
/// in the keyword expander and the diff driver's output reader both read
/// this way.
pub struct Fro<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Fro<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Returns `None` at EOF rather than erroring.
    pub fn try_get_byte(&mut self) -> Option<u8> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    pub fn must_get_byte(&mut self) -> io::Result<u8> {
        self.try_get_byte()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected EOF"))
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.bytes.len());
    }

    pub fn seek_relative(&mut self, delta: isize) {
        let target = (self.pos as isize + delta).max(0) as usize;
        self.seek(target);
    }

    /// Bulk-copies `[beg, end)` into `dest`.
    pub fn spew_range(&self, dest: &mut Vec<u8>, beg: usize, end: usize) {
        dest.extend_from_slice(&self.bytes[beg..end.min(self.bytes.len())]);
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}
