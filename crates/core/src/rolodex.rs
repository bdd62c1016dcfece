//! `Rolodex` (§4.9, §9): federation of file sources plus every [`SpecIndex`]
//! built from them. Owns the root index, opens child indexes on demand
//! (deduplicating concurrent opens of the same key), and maintains the
//! global `$id` registry and circular-reference results.

use crate::{
    components::extract_components,
    config::RolodexConfig,
    index::{CircularReference, SpecIndex},
    reference::IndexId,
    schema_id::SchemaIdRegistry,
    walker::extract_refs,
};
use indexmap::IndexMap;
use rolodex_util::{
    error::{IndexingError, IndexingErrorKind},
    node::Node,
};
use std::sync::{Arc, Mutex, OnceLock};

pub struct Rolodex {
    pub config: RolodexConfig,
    sources: Vec<Box<dyn crate::file_source::FileSource>>,
    indexes: Mutex<Vec<Arc<SpecIndex>>>,
    opened: Mutex<IndexMap<String, Arc<OnceLock<Result<IndexId, String>>>>>,
    pub global_schema_ids: Mutex<SchemaIdRegistry>,
    pub fetch_errors: Mutex<Vec<IndexingError>>,
    pub circular_references: Mutex<Vec<CircularReference>>,
    pub ignored_circular_references: Mutex<Vec<CircularReference>>,
}

impl Rolodex {
    /// Build a rolodex with `root` already indexed as index 0, and `sources`
    /// available for any cross-file `$ref` the resolver later follows.
    pub fn new(
        root: Node,
        config: RolodexConfig,
        sources: Vec<Box<dyn crate::file_source::FileSource>>,
    ) -> Self {
        let rolodex = Self {
            config: config.clone(),
            sources,
            indexes: Mutex::new(Vec::new()),
            opened: Mutex::new(IndexMap::new()),
            global_schema_ids: Mutex::new(SchemaIdRegistry::default()),
            fetch_errors: Mutex::new(Vec::new()),
            circular_references: Mutex::new(Vec::new()),
            ignored_circular_references: Mutex::new(Vec::new()),
        };
        let spec_absolute_path =
            config.spec_absolute_path.clone().unwrap_or_default();
        let root_index = SpecIndex::new(0, None);
        root_index.bootstrap(root, config, spec_absolute_path.clone());
        rolodex.indexes.lock().unwrap().push(Arc::new(root_index));
        // Pre-seed the root's own key as already-resolved to index 0. Once a
        // child document is itself resolved (see `open_uncached`), one of its
        // refs may point back at the root by its exact absolute path; without
        // this, that lookup would call `open_uncached` a second time instead
        // of reusing the root bootstrapped above.
        if !spec_absolute_path.is_empty() {
            rolodex.opened.lock().unwrap().insert(
                spec_absolute_path,
                Arc::new(OnceLock::from(Ok(0))),
            );
        }
        rolodex
    }

    pub fn root(&self) -> Arc<SpecIndex> {
        self.index(0)
    }

    pub fn index(&self, id: IndexId) -> Arc<SpecIndex> {
        self.indexes.lock().unwrap()[id].clone()
    }

    pub fn index_count(&self) -> usize {
        self.indexes.lock().unwrap().len()
    }

    /// Walk and component-extract every currently-known index. Runs the root
    /// first; callers normally follow this with [`Self::resolve_all`], which
    /// opens children on demand and therefore grows the index list further.
    pub fn index_the_rolodex(&self) {
        let root = self.root();
        extract_refs(&root);
        extract_components(&root);
        self.global_schema_ids
            .lock()
            .unwrap()
            .absorb(&root.schema_id_registry.lock().unwrap());
    }

    /// Open `key` (an absolute file path or URL), returning its `IndexId`.
    /// Concurrent callers opening the same key block on the first caller's
    /// fetch-parse-walk pipeline via `OnceLock::get_or_init`, then share its
    /// result — this is the in-flight-fetch deduplication called for in §4.9.
    /// `parent_id` is the index whose `$ref` triggered this open, recorded as
    /// the new index's back-pointer (§9).
    pub fn open(
        &self,
        key: &str,
        parent_id: IndexId,
    ) -> Result<IndexId, IndexingError> {
        let slot = {
            let mut opened = self.opened.lock().unwrap();
            opened
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        slot.get_or_init(|| {
            self.open_uncached(key, parent_id).map_err(|error| error.to_string())
        })
        .clone()
        .map_err(|reason| {
            IndexingError::new(
                IndexingErrorKind::FetchFailure {
                    url: key.to_owned(),
                    reason,
                    source: None,
                },
                key.to_owned(),
            )
        })
    }

    fn open_uncached(
        &self,
        key: &str,
        parent_id: IndexId,
    ) -> Result<IndexId, IndexingError> {
        let source = self
            .sources
            .iter()
            .find(|source| source.handles(key))
            .ok_or_else(|| {
                IndexingError::new(
                    IndexingErrorKind::UnresolvableRef { definition: key.to_owned() },
                    key.to_owned(),
                )
            })?;
        let text = source.fetch(key).inspect_err(|error| {
            self.fetch_errors.lock().unwrap().push(clone_error(error));
        })?;
        let root = Node::parse_yaml(&text).map_err(|scan_error| {
            IndexingError::new(
                IndexingErrorKind::ParseFailure {
                    source_name: key.to_owned(),
                    reason: scan_error.to_string(),
                },
                key.to_owned(),
            )
        })?;

        let id = {
            let mut indexes = self.indexes.lock().unwrap();
            indexes.len()
        };
        let index = SpecIndex::new(id, Some(parent_id));
        index.bootstrap(root, self.config.clone(), key.to_owned());
        self.indexes.lock().unwrap().push(Arc::new(index));

        let index = self.index(id);
        extract_refs(&index);
        extract_components(&index);
        self.global_schema_ids
            .lock()
            .unwrap()
            .absorb(&index.schema_id_registry.lock().unwrap());
        // Resolve this child's own raw refs too, so multi-hop federation
        // (root -> this file -> a file it refs) doesn't silently leave
        // refs inside opened-on-demand documents unresolved.
        crate::resolver::extract_components_from_refs(self, &index);

        Ok(id)
    }

    /// Pre-index every key its sources can enumerate up front (§4.9's
    /// `LocalFs` base-directory walk), rather than waiting for an on-demand
    /// `$ref` to open each one. A source with nothing to enumerate
    /// contributes no keys. Fetch/parse failures are recorded in
    /// `fetch_errors` by `open_uncached` itself and do not abort the walk.
    pub fn preindex_remaining_sources(&self) {
        let keys: Vec<String> =
            self.sources.iter().flat_map(|source| source.discover()).collect();
        for key in keys {
            let _ = self.open(&key, 0);
        }
    }

    /// Find where `target` actually came from, searching the root index and
    /// then every child index opened so far (§4.3, Testable Property 6).
    pub fn find_node_origin(
        &self,
        target: &Node,
    ) -> Option<crate::origin::NodeOrigin> {
        let indexes = self.indexes.lock().unwrap();
        crate::origin::find_node_origin(
            target,
            indexes.iter().map(|index| {
                (index.id, index.spec_absolute_path(), index.node_origin_map())
            }),
        )
    }

    /// Run the resolver over the root index and every index reachable from
    /// it, recording circular reference chains discovered along the way.
    pub fn check_for_circular_references(&self) {
        if self.config.avoid_circular_reference_check {
            return;
        }
        let mut i = 0;
        loop {
            let count = self.index_count();
            if i >= count {
                break;
            }
            let index = self.index(i);
            for cycle in crate::resolver::detect_cycles(&index) {
                let mut schemas = index.component_schemas.lock().unwrap();
                for name in &cycle.chain {
                    if let Some(reference) = schemas.get_mut(name) {
                        reference.circular = true;
                    }
                }
                drop(schemas);
                if self.config.allow_circular_resolution {
                    self.ignored_circular_references.lock().unwrap().push(cycle);
                } else {
                    self.circular_references.lock().unwrap().push(cycle);
                }
            }
            i += 1;
        }
    }
}

/// `IndexingError` does not derive `Clone` (it may wrap a foreign boxed
/// error); rebuild a lossy-but-faithful copy (message preserved, the
/// original source chain is not) for the rolodex-wide fetch-error list.
fn clone_error(error: &IndexingError) -> IndexingError {
    IndexingError::new(
        IndexingErrorKind::FetchFailure {
            url: error.path.clone(),
            reason: error.kind.to_string(),
            source: None,
        },
        error.path.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_source::InMemoryFs;
    use pretty_assertions::assert_eq;

    fn rolodex_with(root_yaml: &str, files: &[(&str, &str)]) -> Rolodex {
        let config = RolodexConfig {
            spec_absolute_path: Some("root.yaml".to_owned()),
            ..RolodexConfig::default()
        };
        let source = InMemoryFs::new(
            files.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        let rolodex = Rolodex::new(
            Node::parse_yaml(root_yaml).unwrap(),
            config,
            vec![Box::new(source)],
        );
        rolodex.index_the_rolodex();
        rolodex
    }

    #[test]
    fn opening_the_same_key_twice_returns_the_same_index() {
        let rolodex = rolodex_with(
            "components:\n  schemas: {}\n",
            &[("pet.yaml", "type: object\n")],
        );
        let first = rolodex.open("pet.yaml", 0).unwrap();
        let second = rolodex.open("pet.yaml", 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(rolodex.index_count(), 2);
    }

    #[test]
    fn node_origin_reports_the_owning_documents_absolute_location() {
        let rolodex = rolodex_with("components:\n  schemas:\n    Pet:\n      type: object\n", &[]);
        let root = rolodex.root();
        let schemas = root
            .root()
            .unwrap_document()
            .get("components")
            .unwrap()
            .get("schemas")
            .unwrap();
        let (_, pet) = &schemas.mapping_entries()[0];
        let origin = rolodex.find_node_origin(pet).unwrap();
        assert_eq!(origin.absolute_location, "root.yaml");
    }

    #[test]
    fn preindex_remaining_sources_opens_every_discovered_key() {
        use crate::file_source::LocalFs;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pet.yaml"), "type: object\n").unwrap();
        let config = RolodexConfig {
            spec_absolute_path: Some("root.yaml".to_owned()),
            ..RolodexConfig::default()
        };
        let rolodex = Rolodex::new(
            Node::parse_yaml("components:\n  schemas: {}\n").unwrap(),
            config,
            vec![Box::new(LocalFs::new(Some(dir.path().to_path_buf())))],
        );
        rolodex.index_the_rolodex();
        rolodex.preindex_remaining_sources();
        assert_eq!(rolodex.index_count(), 2);
    }

    #[test]
    fn unhandled_key_is_unresolvable() {
        let rolodex = rolodex_with("components:\n  schemas: {}\n", &[]);
        assert!(rolodex.open("missing.yaml", 0).is_err());
    }
}
