//! `RolodexConfig` (§6.1): the options recognized by the indexer. Constructed
//! directly by library callers; the CLI front-end may layer flag parsing on
//! top, but the core never reads environment variables itself.

use std::{path::PathBuf, time::Duration};

/// Options governing how a [`crate::rolodex::Rolodex`] walks, resolves, and
/// fetches a federation of OpenAPI documents.
#[derive(Clone, Debug)]
pub struct RolodexConfig {
    /// Root URL used to resolve relative remote refs.
    pub base_url: Option<url::Url>,
    /// Root directory for relative file refs.
    pub base_path: Option<PathBuf>,
    /// Canonical location of the root document (drives `$id` base URI and
    /// file joining).
    pub spec_absolute_path: Option<String>,
    /// If false, any non-local `$ref` resolution emits a `remote-disallowed`
    /// error instead of fetching.
    pub allow_remote_lookup: bool,
    /// If false, any file-scheme `$ref` resolution emits a `file-disallowed`
    /// error.
    pub allow_file_lookup: bool,
    /// If true, skip the final count/build pass; caller invokes
    /// [`crate::index::SpecIndex::build_index`] later.
    pub avoid_build_index: bool,
    /// If true, skip the cycle-detection pass.
    pub avoid_circular_reference_check: bool,
    /// If true, a detected cycle is recorded in `ignored_circular_references`
    /// instead of `circular_references` — tolerated rather than reported.
    pub allow_circular_resolution: bool,
    /// If true, omit any ref whose JSON path lies under an `x-*` key.
    pub exclude_extension_refs: bool,
    /// If true, sibling-of-`$ref` properties are recorded *and* flagged for
    /// downstream transformation. If false they are still recorded (for
    /// backward compatibility) but not flagged.
    pub transform_sibling_refs: bool,
    /// Per-request HTTP timeout for `RemoteFs`.
    pub http_timeout: Duration,
}

impl Default for RolodexConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            base_path: None,
            spec_absolute_path: None,
            allow_remote_lookup: false,
            allow_file_lookup: true,
            avoid_build_index: false,
            avoid_circular_reference_check: false,
            allow_circular_resolution: false,
            exclude_extension_refs: false,
            transform_sibling_refs: false,
            http_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RolodexConfig::default();
        assert!(!config.allow_remote_lookup);
        assert!(config.allow_file_lookup);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }
}
