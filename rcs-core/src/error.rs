//! Top-level error type composing every submodule's errors (§7 "Error
//! taxonomy"). `ops` and the CLI only ever see this type; submodule errors
//! are reached through `#[from]`/`#[source]` when a caller needs to match
//! on them specifically.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] comma_v::Error),

    #[error(transparent)]
    Repo(#[from] crate::repo::Error),

    #[error(transparent)]
    Num(#[from] crate::num::Error),

    #[error(transparent)]
    Date(#[from] crate::date::Error),

    #[error(transparent)]
    Source(#[from] crate::source::Error),

    #[error(transparent)]
    Resolve(#[from] crate::resolve::Error),

    #[error(transparent)]
    Delta(#[from] crate::delta::Error),

    #[error(transparent)]
    Lock(#[from] crate::lock::Error),

    #[error(transparent)]
    Diff(#[from] crate::diff::Error),

    #[error(transparent)]
    Keyword(#[from] crate::keyword::Error),

    #[error(transparent)]
    Edit(#[from] rcs_ed::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}
