//! Keyword expansion engine (C9): a line-oriented scanner that rewrites
//! `$Keyword$` markers in working-file text per §4.9.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown expansion mode {0:?}")]
    UnknownMode(String),
}

/// One of the ten fixed keyword identifiers (`rcskeys.c`'s list, confirmed
/// unexpanded in SPEC_FULL.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Author,
    Date,
    Header,
    Id,
    Locker,
    Log,
    Name,
    RcsFile,
    Revision,
    Source,
    State,
}

impl Keyword {
    const ALL: &'static [(&'static str, Keyword)] = &[
        ("Author", Keyword::Author),
        ("Date", Keyword::Date),
        ("Header", Keyword::Header),
        ("Id", Keyword::Id),
        ("Locker", Keyword::Locker),
        ("Log", Keyword::Log),
        ("Name", Keyword::Name),
        ("RCSfile", Keyword::RcsFile),
        ("Revision", Keyword::Revision),
        ("Source", Keyword::Source),
        ("State", Keyword::State),
    ];

    fn lookup(name: &[u8]) -> Option<Keyword> {
        Self::ALL
            .iter()
            .find(|(n, _)| n.as_bytes() == name)
            .map(|(_, k)| *k)
    }

    fn name(self) -> &'static str {
        Self::ALL.iter().find(|(_, k)| *k == self).unwrap().0
    }
}

/// Expansion mode (§4.9 table; §6 mode strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Kv,
    Kvl,
    K,
    V,
    O,
    B,
}

impl Mode {
    pub fn parse(s: &[u8]) -> Result<Self, Error> {
        match s {
            b"kv" => Ok(Mode::Kv),
            b"kvl" => Ok(Mode::Kvl),
            b"k" => Ok(Mode::K),
            b"v" => Ok(Mode::V),
            b"o" => Ok(Mode::O),
            b"b" => Ok(Mode::B),
            _ => Err(Error::UnknownMode(String::from_utf8_lossy(s).to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Kv => "kv",
            Mode::Kvl => "kvl",
            Mode::K => "k",
            Mode::V => "v",
            Mode::O => "o",
            Mode::B => "b",
        }
    }

    /// `o`/`b` treat the file as opaque; `b` additionally marks it binary
    /// for I/O purposes, which this engine (text-only) does not otherwise
    /// distinguish.
    pub fn is_verbatim(self) -> bool {
        matches!(self, Mode::O | Mode::B)
    }
}

/// Everything the expander needs to compute a keyword's value for one
/// revision. Assembled by the caller (`ops`) from the repository, the
/// resolved delta, and how the revision was designated.
#[derive(Debug, Clone)]
pub struct Context {
    pub archive_path: String,
    pub working_path: String,
    pub revision: String,
    pub date: String,
    pub author: String,
    pub state: String,
    pub locker: Option<String>,
    /// The symbolic name this revision was retrieved by, if any (§4.9
    /// `Name`).
    pub name: Option<String>,
}

/// Escapes bytes that would confuse a later re-parse of an expanded value
/// (§4.9 "Value escape"): tab, newline, space, `$`, and backslash.
fn escape_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            ' ' => out.push_str("\\040"),
            '$' => out.push_str("\\044"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn value_of(keyword: Keyword, ctx: &Context) -> String {
    match keyword {
        Keyword::Author => ctx.author.clone(),
        Keyword::Date => ctx.date.clone(),
        Keyword::Header => header_like(ctx, &ctx.archive_path),
        Keyword::Id => header_like(ctx, basename(&ctx.archive_path)),
        Keyword::Locker => ctx.locker.clone().unwrap_or_default(),
        Keyword::Log => String::new(), // handled separately: Log grows the file.
        Keyword::Name => ctx.name.clone().unwrap_or_default(),
        Keyword::RcsFile => escape_value(basename(&ctx.archive_path)),
        Keyword::Revision => ctx.revision.clone(),
        Keyword::Source => escape_value(&ctx.archive_path),
        Keyword::State => ctx.state.clone(),
    }
}

fn header_like(ctx: &Context, path: &str) -> String {
    let mut s = format!(
        "{} {} {} {} {}",
        escape_value(path),
        ctx.revision,
        ctx.date,
        ctx.author,
        ctx.state
    );
    if let Some(locker) = &ctx.locker {
        s.push(' ');
        s.push_str(locker);
    }
    s
}

/// Marker the "checked in with -k" deposit path writes as a log message,
/// which suppresses re-insertion of the `$Log$` block (§4.9).
pub const SUPPRESS_LOG_PREFIX: &str = "checked in with -k by ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineResult {
    pub changed: bool,
}

/// Expands every marker on one line, per the stream-editor contract (§4.9
/// last paragraph): a `$` begins a scan for an identifier; if it's not a
/// known keyword, or the terminator isn't found before EOL, the original
/// bytes are emitted unchanged.
pub fn expand_line(line: &[u8], mode: Mode, ctx: &Context) -> (Vec<u8>, LineResult) {
    if mode.is_verbatim() {
        return (line.to_vec(), LineResult { changed: false });
    }

    let mut out = Vec::with_capacity(line.len());
    let mut changed = false;
    let mut i = 0;

    while i < line.len() {
        if line[i] != b'$' {
            out.push(line[i]);
            i += 1;
            continue;
        }

        let marker_start = i;
        let mut j = i + 1;
        while j < line.len() && (line[j].is_ascii_alphabetic()) {
            j += 1;
        }
        let ident = &line[i + 1..j];

        let keyword = match Keyword::lookup(ident) {
            Some(k) => k,
            None => {
                out.push(line[i]);
                i += 1;
                continue;
            }
        };

        if j >= line.len() || (line[j] != b'$' && line[j] != b':') {
            // No terminator before EOL: emit the `$Ident` prefix unchanged
            // and resume scanning right after it.
            out.extend_from_slice(&line[marker_start..j]);
            i = j;
            continue;
        }

        if line[j] == b'$' {
            // Bare `$Keyword$`.
            write_marker(&mut out, keyword, mode, ctx);
            changed = true;
            i = j + 1;
            continue;
        }

        // `$Keyword: value $` or `$Keyword:: value #$`.
        let double_colon = line.get(j + 1) == Some(&b':');
        let value_start = if double_colon { j + 2 } else { j + 1 };
        match line[value_start..].iter().position(|&b| b == b'$' || b == b'\n') {
            Some(rel) if line[value_start + rel] == b'$' => {
                write_marker(&mut out, keyword, mode, ctx);
                changed = true;
                i = value_start + rel + 1;
            }
            _ => {
                // No closing `$` before EOL: not a recognized marker.
                out.extend_from_slice(&line[marker_start..j + 1]);
                i = j + 1;
            }
        }
    }

    (out, LineResult { changed })
}

fn write_marker(out: &mut Vec<u8>, keyword: Keyword, mode: Mode, ctx: &Context) {
    let value = value_of(keyword, ctx);
    match mode {
        Mode::K => {
            out.push(b'$');
            out.extend_from_slice(keyword.name().as_bytes());
            out.push(b'$');
        }
        Mode::V => {
            out.extend_from_slice(value.as_bytes());
        }
        Mode::Kv | Mode::Kvl => {
            out.push(b'$');
            out.extend_from_slice(keyword.name().as_bytes());
            out.push(b':');
            out.push(b' ');
            out.extend_from_slice(value.as_bytes());
            out.push(b' ');
            out.push(b'$');
        }
        Mode::O | Mode::B => unreachable!("handled by caller before reaching write_marker"),
    }
}

/// Strips all markers to their bare value (mode `v`'s idempotence
/// property, §8 invariant 6): repeated application is a no-op because the
/// output no longer contains any `$Keyword` sequence.
pub fn expand_v(text: &[u8], ctx: &Context) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for line in text.split_inclusive(|&b| b == b'\n') {
        let (expanded, _) = expand_line(line, Mode::V, ctx);
        out.extend_from_slice(&expanded);
    }
    out
}

/// Implements the `$Log$` insertion algorithm (§4.9): detects the comment
/// leader from the bytes preceding the marker on its line, then writes a
/// header line and each log-message line prefixed by that leader.
///
/// `preceding` is everything on the line before the `$Log` marker;
/// `log_message` is the new revision's log text, already split into lines
/// without trailing newlines.
pub fn expand_log(
    preceding: &[u8],
    revision: &str,
    date: &str,
    author: &str,
    log_message: &[Vec<u8>],
) -> Vec<u8> {
    if log_message
        .first()
        .map(|first| first.starts_with(SUPPRESS_LOG_PREFIX.as_bytes()))
        .unwrap_or(false)
    {
        return Vec::new();
    }

    let leader = detect_leader(preceding);

    let mut out = Vec::new();
    out.push(b'\n');
    out.extend_from_slice(&leader);
    out.extend_from_slice(format!("Revision {} {}  {}\n", revision, date, author).as_bytes());
    for line in log_message {
        out.extend_from_slice(&leader);
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.extend_from_slice(&leader);

    out
}

/// Legacy `/*` and `(*` column-1 leaders are rewritten to ` *`; everything
/// else is used as-is (§4.9 step 2).
fn detect_leader(preceding: &[u8]) -> Vec<u8> {
    if preceding == b"/*" || preceding == b"(*" {
        log::warn!("legacy comment leader {:?} rewritten to \" *\"", String::from_utf8_lossy(preceding));
        return b" *".to_vec();
    }
    preceding.to_vec()
}
