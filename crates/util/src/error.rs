//! Indexing error kinds (§7): errors are *data*, collected into a SpecIndex's
//! error lists rather than thrown. Modeled on the teacher's
//! `YamlErrorKind`/`LocatedError` split — a plain data enum plus a wrapper
//! that pairs it with where it happened.

use crate::node::Node;
use thiserror::Error;

/// One of the error kinds enumerated in §7, carrying whatever payload that
/// kind needs to be actionable in a report.
#[derive(Debug, Error)]
pub enum IndexingErrorKind {
    #[error("empty $ref at {path}")]
    EmptyRef { path: String },

    #[error("malformed $ref {definition:?}: {reason}")]
    MalformedRef { definition: String, reason: String },

    #[error("unresolvable $ref {definition:?}")]
    UnresolvableRef { definition: String },

    #[error("remote lookup disallowed for {definition:?}")]
    RemoteDisallowed { definition: String },

    #[error("file lookup disallowed for {definition:?}")]
    FileDisallowed { definition: String },

    #[error(
        "duplicate operation parameter {name:?} (in {location:?}) on {path}"
    )]
    DuplicateOperationParameter {
        name: String,
        location: String,
        path: String,
    },

    #[error("unnamed operation parameter at {path}")]
    UnnamedOperationParameter { path: String },

    #[error("invalid $id {id:?}: {reason}")]
    InvalidSchemaId { id: String, reason: String },

    #[error("fetch failure for {url}: {reason}")]
    FetchFailure {
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("parse failure for {source_name}: {reason}")]
    ParseFailure { source_name: String, reason: String },

    #[error("could not navigate path {path} to {definition:?}")]
    PathNavigationFailure { path: String, definition: String },
}

/// An [IndexingErrorKind] paired with the friendly path (§4.2) where it was
/// discovered and, when available, the node that triggered it.
#[derive(Debug, Error)]
#[error("{kind} (at {path})")]
pub struct IndexingError {
    #[source]
    pub kind: IndexingErrorKind,
    /// Friendly, `$`-rooted path to the offending node.
    pub path: String,
    /// The offending node, when one exists (absent for e.g. fetch failures
    /// that precede any parse).
    pub node: Option<Node>,
}

impl IndexingError {
    pub fn new(kind: IndexingErrorKind, path: impl Into<String>) -> Self {
        Self { kind, path: path.into(), node: None }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.node = Some(node);
        self
    }
}
