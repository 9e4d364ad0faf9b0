use derive_more::{Deref, From, Into};
use eq_macro::EqU8;
use std::{collections::HashMap, fmt::Display};

/// A byte range within the archive buffer that was handed to [`crate::parse`].
/// Lexing never copies string bodies: it only remembers where they start and
/// how long they are, `@@` escapes included. Turning a `Span` back into real
/// bytes (contracting `@@` to `@`) is the caller's job -- see
/// `rcs_core::source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

#[derive(Debug, Clone)]
pub struct File {
    pub admin: Admin,
    pub delta: HashMap<Num, Delta>,
    /// Byte offset of the `desc` clause: the boundary between the admin +
    /// delta-header section and the deltatext section.
    pub neck: usize,
    pub desc: Span,
    pub delta_text: HashMap<Num, DeltaText>,
    /// Revisions in the order their deltatext bodies appeared in the source
    /// archive, needed by the writer to preserve body order on rewrite.
    pub delta_text_order: Vec<Num>,
}

impl File {
    pub fn head_delta(&self) -> Option<(&Num, &Delta)> {
        let head = self.admin.head.as_ref()?;
        self.delta.get(head).map(|delta| (head, delta))
    }

    pub fn revision(&self, revision: &Num) -> Option<(&Delta, &DeltaText)> {
        let delta = self.delta.get(revision)?;
        let delta_text = self.delta_text.get(revision)?;
        Some((delta, delta_text))
    }
}

#[derive(Debug, Clone)]
pub struct Admin {
    pub head: Option<Num>,
    pub branch: Option<Num>,
    pub access: Vec<Id>,
    /// Insertion order is significant for serialization, so this is a vector
    /// of pairs rather than a `HashMap`.
    pub symbols: Vec<(Sym, Num)>,
    pub locks: Vec<(Id, Num)>,
    pub strict: bool,
    pub comment: Option<Span>,
    pub expand: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct Delta {
    pub date: Span,
    pub author: Id,
    pub state: Option<Id>,
    pub branches: Vec<Num>,
    pub next: Option<Num>,
    pub commit_id: Option<Sym>,
}

#[derive(Debug, Clone)]
pub struct DeltaText {
    /// Byte offset at which this delta's `log ... text ...` clause begins in
    /// the source archive, used by the writer to copy a whole deltatext body
    /// verbatim when it did not change.
    pub neck: usize,
    pub log: Span,
    pub text: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, EqU8, Deref, From, Into, Hash)]
pub struct Num(pub Vec<u8>);

impl Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, EqU8, Deref, From, Into, Hash)]
pub struct Id(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, EqU8, Deref, From, Into, Hash)]
pub struct Sym(pub Vec<u8>);
