use nom::error::ErrorKind;
use thiserror::Error;

/// Grammar-level failures. Per spec.md §7 a syntax error names the offending
/// location and is always fatal to the archive being parsed; the caller
/// decides whether that aborts the whole invocation or just this file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error of kind {kind:?} at location {location:?}")]
    ParseError { location: Vec<u8>, kind: ErrorKind },
}
