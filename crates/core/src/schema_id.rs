//! `SchemaIdRegistry` and scope (§4.4): JSON Schema 2020-12 `$id`-based
//! identification and base-URI resolution.

use crate::reference::IndexId;
use indexmap::IndexMap;
use rolodex_util::{
    error::{IndexingError, IndexingErrorKind},
    node::Node,
};
use url::Url;

/// A base URI plus the chain of `$id`s pushed while descending into nested
/// `$id`-bearing schemas. Cheap to copy-on-push (`Clone`), matching the
/// walker's need to push on descent and pop (by dropping the clone) on exit.
#[derive(Clone, Debug)]
pub struct SchemaIdScope {
    pub base_uri: String,
    pub chain: Vec<String>,
}

impl SchemaIdScope {
    pub fn root(base_uri: impl Into<String>) -> Self {
        Self { base_uri: base_uri.into(), chain: Vec::new() }
    }

    /// The URI new `$id` resolution should use as a base: the most recently
    /// pushed id, or the root base URI if none has been pushed yet.
    pub fn current_base(&self) -> &str {
        self.chain.last().map_or(self.base_uri.as_str(), String::as_str)
    }

    /// Return a new scope with `resolved` pushed onto the chain.
    pub fn push(&self, resolved: impl Into<String>) -> Self {
        let mut chain = self.chain.clone();
        chain.push(resolved.into());
        Self { base_uri: self.base_uri.clone(), chain }
    }
}

/// A registered `$id` (§3).
#[derive(Clone, Debug)]
pub struct SchemaIdEntry {
    pub original_id: String,
    pub resolved_uri: String,
    pub schema_node: Node,
    pub parent_id: Option<String>,
    pub owning_index_id: IndexId,
    pub definition_path: String,
    pub line: u32,
    pub column: u32,
}

/// Validate a raw `$id` value: it must be non-empty and must not carry a
/// fragment (`#`), per JSON Schema 2020-12.
pub fn validate_schema_id(id: &str) -> Result<(), IndexingErrorKind> {
    if id.is_empty() {
        return Err(IndexingErrorKind::InvalidSchemaId {
            id: id.to_owned(),
            reason: "empty $id".to_owned(),
        });
    }
    if id.contains('#') {
        return Err(IndexingErrorKind::InvalidSchemaId {
            id: id.to_owned(),
            reason: "fragment in $id".to_owned(),
        });
    }
    Ok(())
}

/// Resolve `id` against `base_uri`: if `id` is already an absolute URI,
/// return it as-is; otherwise resolve it as a relative reference against
/// `base_uri` using standard URL-resolution rules.
pub fn resolve_schema_id(
    id: &str,
    base_uri: &str,
) -> Result<String, IndexingErrorKind> {
    if let Ok(absolute) = Url::parse(id) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(base_uri).map_err(|error| {
        IndexingErrorKind::InvalidSchemaId {
            id: id.to_owned(),
            reason: format!("invalid base URI {base_uri:?}: {error}"),
        }
    })?;
    let resolved = base.join(id).map_err(|error| {
        IndexingErrorKind::InvalidSchemaId {
            id: id.to_owned(),
            reason: format!("could not resolve against base: {error}"),
        }
    })?;
    Ok(resolved.to_string())
}

/// Per-index (and, reused at the rolodex level, global) registry of resolved
/// `$id` URIs. First registration for a given key wins; later registrations
/// under the same key are silently ignored.
#[derive(Debug, Default)]
pub struct SchemaIdRegistry {
    by_uri: IndexMap<String, SchemaIdEntry>,
}

impl SchemaIdRegistry {
    /// Validate and resolve `id` against `scope`, then register it. Returns
    /// the resolved URI to push onto the scope for the subtree, or the
    /// collected error if `id` was invalid (the walk continues regardless).
    pub fn register(
        &mut self,
        id: &str,
        scope: &SchemaIdScope,
        schema_node: Node,
        owning_index_id: IndexId,
        definition_path: &str,
        line: u32,
        column: u32,
    ) -> Result<String, IndexingError> {
        validate_schema_id(id).map_err(|kind| {
            IndexingError::new(kind, definition_path.to_owned())
        })?;
        let resolved = resolve_schema_id(id, scope.current_base())
            .map_err(|kind| {
                IndexingError::new(kind, definition_path.to_owned())
            })?;
        let key = resolved.clone();
        self.by_uri.entry(key).or_insert_with(|| SchemaIdEntry {
            original_id: id.to_owned(),
            resolved_uri: resolved.clone(),
            schema_node,
            parent_id: scope.chain.last().cloned(),
            owning_index_id,
            definition_path: definition_path.to_owned(),
            line,
            column,
        });
        Ok(resolved)
    }

    pub fn get(&self, uri: &str) -> Option<&SchemaIdEntry> {
        self.by_uri.get(uri)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SchemaIdEntry> {
        self.by_uri.values()
    }

    /// Feed every entry of `other` into `self`, first-wins (used by the
    /// rolodex's global registry after a child index is attached).
    pub fn absorb(&mut self, other: &SchemaIdRegistry) {
        for entry in other.entries() {
            self.by_uri
                .entry(entry.resolved_uri.clone())
                .or_insert_with(|| entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_fragment_bearing_ids() {
        assert!(validate_schema_id("").is_err());
        assert!(validate_schema_id("https://example.com/a#/frag").is_err());
        assert!(validate_schema_id("https://example.com/a").is_ok());
    }

    #[test]
    fn resolves_nested_scope_against_most_recent_id_not_document_base() {
        let root = SchemaIdScope::root("https://example.com/root.json");
        let level1 = resolve_schema_id("level1/", root.current_base())
            .unwrap();
        assert_eq!(level1, "https://example.com/level1/");
        let scope1 = root.push(level1);

        let level2 =
            resolve_schema_id("level2.json", scope1.current_base()).unwrap();
        assert_eq!(level2, "https://example.com/level1/level2.json");
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = SchemaIdRegistry::default();
        let scope = SchemaIdScope::root("https://example.com/root.json");
        let node = Node::parse_yaml("type: object\n").unwrap();

        let first = registry
            .register("a.json", &scope, node.clone(), 0, "$.a", 1, 1)
            .unwrap();
        registry
            .register("a.json", &scope, node, 0, "$.b", 2, 1)
            .unwrap();

        assert_eq!(registry.get(&first).unwrap().definition_path, "$.a");
    }
}
