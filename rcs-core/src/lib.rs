//! File-based revision-control core: archive parsing rides on `comma_v`,
//! edit-script application on `rcs_ed`; everything else (revision-number
//! algebra, dates, keyword expansion, locking, diff/merge, and the archive
//! writer) lives here, composed by `ops` into the operations a CLI front
//! end calls.
pub mod cleanup;
pub mod config;
pub mod date;
pub mod delta;
pub mod diff;
pub mod error;
pub mod keyword;
pub mod lock;
pub mod num;
pub mod ops;
pub mod repo;
pub mod resolve;
pub mod source;
pub mod writer;

pub use config::Config;
pub use error::Error;
pub use repo::Repository;
