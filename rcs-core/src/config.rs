//! Per-invocation configuration (§6 "Environment contract", §9's "replace
//! global mutable state with an explicit per-invocation context object").
//! Nothing here is read from the environment implicitly; the binary gathers
//! these from env vars / CLI flags and passes the result into every
//! operation explicitly.
use std::path::PathBuf;

use crate::{date::Zone, keyword::Mode};

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for SFFs and the diff driver's temporaries (§6 "a
    /// temp-directory hint").
    pub temp_dir: PathBuf,

    /// Display zone for keyword-expanded dates (§6 "a time-zone
    /// specification").
    pub zone: Zone,

    /// Files at or below this size are fully buffered rather than mapped
    /// (§6 "a memory-limit hint").
    pub mem_limit: u64,

    /// Suffix list for pairing a working file with its archive (§1's
    /// filename-pairing heuristic is out of scope, but the lockfile naming
    /// rule in §6 still needs the suffix that was matched).
    pub suffix: String,

    /// Default keyword-expansion mode used when an archive's `expand`
    /// clause is absent (§4.5 post-parse consistency: default is `kv`).
    pub default_expand: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            zone: Zone::Local,
            mem_limit: crate::source::DEFAULT_MEM_LIMIT,
            suffix: ",v".to_string(),
            default_expand: Mode::Kv,
        }
    }
}
