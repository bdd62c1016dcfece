//! `SpecIndex` (§4.8): the aggregate that owns a single document's root node,
//! configuration, and every collection extracted from it.

use crate::{
    config::RolodexConfig,
    origin::NodeOriginMap,
    reference::{
        DescriptionReference, EnumReference, IndexId, ObjectReference,
        Reference, ReferenceMapped,
    },
    schema_id::SchemaIdRegistry,
};
use indexmap::IndexMap;
use rolodex_util::{error::IndexingError, node::Node};
use std::sync::{Mutex, OnceLock};

/// A recorded circular reference chain (§8 property 8, §9).
#[derive(Clone, Debug)]
pub struct CircularReference {
    /// Friendly paths of every schema/ref participating in the cycle, in the
    /// order the resolver walked them.
    pub chain: Vec<String>,
}

/// Every collection the document walker, component extractor, and resolver
/// populate (§4.8), each behind its own lock so the walk, the parallel
/// resolution fan-out, and node-origin-map construction can all write
/// concurrently without contending on a single global lock.
#[derive(Default)]
pub struct SpecIndex {
    pub id: IndexId,
    pub parent_id: Option<IndexId>,
    pub root: OnceLock<Node>,
    pub config: OnceLock<RolodexConfig>,
    pub spec_absolute_path: OnceLock<String>,

    // Raw walk output
    pub all_refs: Mutex<IndexMap<String, Reference>>,
    pub raw_sequenced_refs: Mutex<Vec<Reference>>,
    pub refs_with_siblings: Mutex<IndexMap<String, Reference>>,
    pub polymorphic_refs: Mutex<Vec<Reference>>,
    pub polymorphic_all_of: Mutex<Vec<Reference>>,
    pub polymorphic_any_of: Mutex<Vec<Reference>>,
    pub polymorphic_one_of: Mutex<Vec<Reference>>,

    pub inline_schema_definitions: Mutex<Vec<Reference>>,
    pub inline_schema_object_definitions: Mutex<Vec<Reference>>,
    pub ref_schema_definitions: Mutex<Vec<Reference>>,

    pub descriptions: Mutex<Vec<DescriptionReference>>,
    pub summaries: Mutex<Vec<DescriptionReference>>,
    pub enums: Mutex<Vec<EnumReference>>,
    pub objects_with_properties: Mutex<Vec<ObjectReference>>,
    pub security_requirements: Mutex<Vec<Reference>>,
    pub external_docs: Mutex<Vec<Node>>,
    pub root_servers: Mutex<Vec<Node>>,
    pub operation_server_overrides: Mutex<Vec<Node>>,
    pub global_tags: Mutex<Vec<Node>>,
    pub operation_tags: Mutex<Vec<Node>>,

    // Component extractor output
    pub component_schemas: Mutex<IndexMap<String, Reference>>,
    pub component_parameters: Mutex<IndexMap<String, Reference>>,
    pub operation_parameters: Mutex<Vec<Reference>>,
    pub component_responses: Mutex<IndexMap<String, Reference>>,
    pub component_headers: Mutex<IndexMap<String, Reference>>,
    pub component_examples: Mutex<IndexMap<String, Reference>>,
    pub component_links: Mutex<IndexMap<String, Reference>>,
    pub component_callbacks: Mutex<IndexMap<String, Reference>>,
    pub component_request_bodies: Mutex<IndexMap<String, Reference>>,
    pub component_security_schemes: Mutex<IndexMap<String, Reference>>,

    // Resolver output
    pub all_mapped_refs: Mutex<IndexMap<String, Reference>>,
    pub all_mapped_refs_sequenced: Mutex<Vec<ReferenceMapped>>,

    // Errors (§7) and children
    pub ref_errors: Mutex<Vec<IndexingError>>,
    pub operation_param_errors: Mutex<Vec<IndexingError>>,
    pub children: Mutex<IndexMap<String, IndexId>>,
    pub circular_references: Mutex<Vec<CircularReference>>,

    pub schema_id_registry: Mutex<SchemaIdRegistry>,
    pub node_origin_map: OnceLock<NodeOriginMap>,

    counters: Counters,
}

/// Lazily-computed, monotonic counters (§4.8, §5c): each is computed once on
/// first request and cached; "generation 2" counters (aggregates that depend
/// on other counters) are computed from already-cached generation-1 values.
#[derive(Default)]
struct Counters {
    total_refs: OnceLock<usize>,
    total_mapped_refs: OnceLock<usize>,
    total_inline_schemas: OnceLock<usize>,
    global_tag_count: OnceLock<usize>,
    operation_tag_count: OnceLock<usize>,
    total_tag_count: OnceLock<usize>,
    duplicate_operation_param_count: OnceLock<usize>,
}

impl SpecIndex {
    pub fn new(id: IndexId, parent_id: Option<IndexId>) -> Self {
        Self { id, parent_id, ..Self::default() }
    }

    pub fn bootstrap(
        &self,
        root: Node,
        config: RolodexConfig,
        spec_absolute_path: String,
    ) {
        let _ = self.root.set(root);
        let _ = self.spec_absolute_path.set(spec_absolute_path);
        let _ = self.config.set(config);
    }

    pub fn root(&self) -> &Node {
        self.root.get().expect("SpecIndex used before bootstrap()")
    }

    pub fn config(&self) -> &RolodexConfig {
        self.config.get().expect("SpecIndex used before bootstrap()")
    }

    pub fn spec_absolute_path(&self) -> &str {
        self.spec_absolute_path
            .get()
            .expect("SpecIndex used before bootstrap()")
    }

    /// Build (or return the cached) node-origin map for this index.
    pub fn node_origin_map(&self) -> &NodeOriginMap {
        self.node_origin_map
            .get_or_init(|| NodeOriginMap::build(self.root()))
    }

    // --- counters, generation 1 (depend only on raw collections) ---

    pub fn total_ref_count(&self) -> usize {
        *self
            .counters
            .total_refs
            .get_or_init(|| self.all_refs.lock().unwrap().len())
    }

    pub fn total_mapped_ref_count(&self) -> usize {
        *self
            .counters
            .total_mapped_refs
            .get_or_init(|| self.all_mapped_refs.lock().unwrap().len())
    }

    pub fn total_inline_schema_count(&self) -> usize {
        *self.counters.total_inline_schemas.get_or_init(|| {
            self.inline_schema_definitions.lock().unwrap().len()
        })
    }

    pub fn global_tag_count(&self) -> usize {
        *self
            .counters
            .global_tag_count
            .get_or_init(|| self.global_tags.lock().unwrap().len())
    }

    pub fn operation_tag_count(&self) -> usize {
        *self
            .counters
            .operation_tag_count
            .get_or_init(|| self.operation_tags.lock().unwrap().len())
    }

    // --- counters, generation 2 (aggregate over generation-1 counters) ---

    /// Total of global and operation tags. An empty `tags: []` sequence
    /// contributes 0 and is not an error (§9 open question, resolved).
    pub fn total_tag_count(&self) -> usize {
        *self.counters.total_tag_count.get_or_init(|| {
            self.global_tag_count() + self.operation_tag_count()
        })
    }

    /// Number of operation parameters whose `(name, in)` pair collides with
    /// another parameter on the same operation. The component extractor
    /// already detects these while merging path-level and operation-level
    /// parameter lists; this just tallies its findings.
    pub fn duplicate_operation_param_count(&self) -> usize {
        *self.counters.duplicate_operation_param_count.get_or_init(|| {
            self.operation_param_errors
                .lock()
                .unwrap()
                .iter()
                .filter(|error| {
                    matches!(
                        error.kind,
                        rolodex_util::error::IndexingErrorKind::DuplicateOperationParameter { .. }
                    )
                })
                .count()
        })
    }
}
