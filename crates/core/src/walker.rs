//! `DocumentWalker` / `ExtractRefs` (§4.5): a single recursive pass over a
//! document that collects every `$ref`, inline and `$id`-bearing schema,
//! polymorphic branch, description/summary, enum, object-with-properties,
//! tag, and security requirement, tracking a friendly path and a `$id` scope
//! as it descends.
//!
//! Grounded in the teacher's `util/src/yaml/resolve.rs` scan-then-collect
//! recursive walk, restructured around the friendly-path/scope-stack state
//! this indexer's contract (rather than a typed deserializer) requires.

use crate::{
    index::SpecIndex,
    reference::{
        DescriptionReference, EnumReference, ObjectReference, Reference,
    },
    schema_id::SchemaIdScope,
};
use rolodex_util::{
    error::{IndexingError, IndexingErrorKind},
    node::{Node, NodeKind},
    pointer::{PathSegment, friendly_path},
    refstring::parse_ref_string,
};

const POLYMORPHIC_KEYWORDS: [&str; 3] = ["allOf", "anyOf", "oneOf"];
const SCHEMA_CONTAINER_KEYWORDS: [&str; 7] = [
    "schema",
    "items",
    "additionalProperties",
    "contains",
    "not",
    "unevaluatedItems",
    "unevaluatedProperties",
];

/// `poly`: true once the walk has descended under an `allOf`/`anyOf`/`oneOf`
/// branch; `keyword` names the nearest such keyword, used to route a found
/// ref to the matching per-keyword bucket.
#[derive(Clone, Copy, Default)]
struct PolyState {
    poly: bool,
    keyword: Option<&'static str>,
}

/// Walk `index.root()` and populate every raw-walk collection on `index`.
/// Idempotent only in the sense that calling it twice duplicates entries;
/// callers (the resolver, via [`crate::rolodex::Rolodex`]) run it exactly
/// once per index.
pub fn extract_refs(index: &SpecIndex) {
    let _span = tracing::info_span!("walk", index_id = index.id).entered();
    let root = index.root().unwrap_document().clone();
    let scope = SchemaIdScope::root(
        index
            .config()
            .spec_absolute_path
            .clone()
            .or_else(|| index.config().base_url.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "file:///root.yaml".to_owned()),
    );
    let mut walker = Walker {
        index,
        exclude_extensions: index.config().exclude_extension_refs,
    };
    walker.walk_node(&root, &[], &scope, None, false, PolyState::default());
}

struct Walker<'a> {
    index: &'a SpecIndex,
    exclude_extensions: bool,
}

impl Walker<'_> {
    /// Recurse into `node`, tracking `path_segments` (for friendly paths),
    /// the current `$id` scope, the node's immediate parent (for sibling
    /// detection), whether we are currently inside a `paths.*.*` operation
    /// object, and the polymorphic-branch state.
    fn walk_node(
        &mut self,
        node: &Node,
        path_segments: &[PathSegment],
        scope: &SchemaIdScope,
        parent: Option<&Node>,
        in_operation: bool,
        poly: PolyState,
    ) {
        match node.kind() {
            NodeKind::Mapping => self.walk_mapping(
                node,
                path_segments,
                scope,
                parent,
                in_operation,
                poly,
            ),
            NodeKind::Sequence => {
                for (i, item) in node.sequence_items().iter().enumerate() {
                    let mut child_path = path_segments.to_vec();
                    child_path.push(PathSegment::Index(i));
                    self.walk_node(
                        item,
                        &child_path,
                        scope,
                        Some(node),
                        in_operation,
                        poly,
                    );
                }
            }
            NodeKind::Scalar | NodeKind::Alias | NodeKind::Document => {}
        }
    }

    fn walk_mapping(
        &mut self,
        node: &Node,
        path_segments: &[PathSegment],
        scope: &SchemaIdScope,
        parent: Option<&Node>,
        in_operation: bool,
        poly: PolyState,
    ) {
        let path = friendly_path(path_segments);

        if let Some(ref_node) = node.get("$ref") {
            self.record_ref(ref_node, node, parent, &path, poly);
        }

        if let Some(id_node) = node.get("$id") {
            if let Some(id) = id_node.as_scalar_str() {
                self.record_schema_id(id, node, &path, scope);
            }
        }

        for keyword in SCHEMA_CONTAINER_KEYWORDS {
            if let Some(child) = node.get(keyword) {
                self.record_schema_container(child, &format!("{path}.{keyword}"));
            }
        }
        for map_keyword in ["properties", "patternProperties"] {
            if let Some(properties) = node.get(map_keyword) {
                for (key_node, value) in properties.mapping_entries() {
                    let key = key_node.as_scalar_str().unwrap_or_default();
                    self.record_schema_container(
                        value,
                        &format!("{path}.{map_keyword}.{key}"),
                    );
                }
            }
        }
        for keyword in POLYMORPHIC_KEYWORDS.into_iter().chain(["prefixItems"]) {
            if let Some(items) = node.get(keyword) {
                for (i, item) in items.sequence_items().iter().enumerate() {
                    self.record_schema_container(
                        item,
                        &format!("{path}.{keyword}[{i}]"),
                    );
                }
            }
        }

        if let Some(description) = node.get("description") {
            self.record_description_or_summary(
                &mut *self.index.descriptions.lock().unwrap(),
                description,
                &path,
            );
        }
        if let Some(summary) = node.get("summary") {
            self.record_description_or_summary(
                &mut *self.index.summaries.lock().unwrap(),
                summary,
                &path,
            );
        }

        if let Some(enum_node) = node.get("enum") {
            if let Some(type_node) = node.get("type") {
                self.index.enums.lock().unwrap().push(EnumReference {
                    node: enum_node.clone(),
                    path: path.clone(),
                    schema_type_node: type_node.clone(),
                });
            }
        }

        if node.is_typed_object() {
            if let Some(properties) = node.get("properties") {
                self.index.objects_with_properties.lock().unwrap().push(
                    ObjectReference {
                        node: properties.clone(),
                        path: format!("{path}.properties"),
                        schema_node: node.clone(),
                        parent_node: parent
                            .cloned()
                            .unwrap_or_else(|| node.clone()),
                    },
                );
            }
        }

        if let Some(tags) = node.get("tags") {
            let bucket = if in_operation {
                &self.index.operation_tags
            } else {
                &self.index.global_tags
            };
            for tag in tags.sequence_items() {
                bucket.lock().unwrap().push(tag.clone());
            }
        }

        if let Some(security) = node.get("security") {
            self.record_security(security, &path);
        }

        if path_segments.is_empty() {
            if let Some(servers) = node.get("servers") {
                for server in servers.sequence_items() {
                    self.index.root_servers.lock().unwrap().push(server.clone());
                }
            }
            if let Some(docs) = node.get("externalDocs") {
                self.index.external_docs.lock().unwrap().push(docs.clone());
            }
        } else if in_operation {
            if let Some(servers) = node.get("servers") {
                for server in servers.sequence_items() {
                    self.index
                        .operation_server_overrides
                        .lock()
                        .unwrap()
                        .push(server.clone());
                }
            }
        }

        let entering_operation = in_operation || is_operation_object(path_segments);

        for (key, value) in node.mapping_entries() {
            let key_str = key.as_scalar_str().unwrap_or_default();
            if self.exclude_extensions && key_str.starts_with("x-") {
                continue;
            }
            if key_str == "$ref" {
                continue;
            }
            let child_poly = if POLYMORPHIC_KEYWORDS.contains(&key_str) {
                PolyState { poly: true, keyword: Some(poly_keyword_str(key_str)) }
            } else {
                poly
            };
            let mut child_path = path_segments.to_vec();
            child_path.push(PathSegment::Key(key_str.to_owned()));
            self.walk_node(
                value,
                &child_path,
                scope,
                Some(node),
                entering_operation,
                child_poly,
            );
        }
    }

    fn record_ref(
        &mut self,
        ref_node: &Node,
        container: &Node,
        parent: Option<&Node>,
        path: &str,
        poly: PolyState,
    ) {
        let Some(definition) = ref_node.as_scalar_str() else {
            return;
        };
        if definition.is_empty() {
            self.index.ref_errors.lock().unwrap().push(
                IndexingError::new(
                    IndexingErrorKind::EmptyRef { path: path.to_owned() },
                    path.to_owned(),
                )
                .with_node(ref_node.clone()),
            );
            return;
        }
        if parse_ref_string(definition).is_err() {
            self.index.ref_errors.lock().unwrap().push(
                IndexingError::new(
                    IndexingErrorKind::MalformedRef {
                        definition: definition.to_owned(),
                        reason: "contains a backslash".to_owned(),
                    },
                    path.to_owned(),
                )
                .with_node(ref_node.clone()),
            );
            return;
        }

        let mut reference = Reference::raw(definition, path, self.index.id);
        reference.container_node = Some(container.clone());
        reference.parent_node = parent.cloned();

        let siblings: Vec<(String, Node)> = container
            .mapping_entries()
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_scalar_str()?;
                (key != "$ref").then(|| (key.to_owned(), v.clone()))
            })
            .collect();
        if !siblings.is_empty() {
            reference.has_sibling_properties = true;
            for (key, value) in siblings {
                reference.sibling_properties.insert(key, value);
            }
        }

        if poly.poly {
            self.index.polymorphic_refs.lock().unwrap().push(reference.clone());
            let bucket = match poly.keyword {
                Some("allOf") => &self.index.polymorphic_all_of,
                Some("anyOf") => &self.index.polymorphic_any_of,
                _ => &self.index.polymorphic_one_of,
            };
            bucket.lock().unwrap().push(reference);
            return;
        }

        self.index
            .all_refs
            .lock()
            .unwrap()
            .insert(reference.full_definition.clone(), reference.clone());
        if reference.has_sibling_properties {
            self.index
                .refs_with_siblings
                .lock()
                .unwrap()
                .insert(reference.full_definition.clone(), reference.clone());
        }
        self.index.raw_sequenced_refs.lock().unwrap().push(reference);
    }

    fn record_schema_id(
        &mut self,
        id: &str,
        schema_node: &Node,
        path: &str,
        scope: &SchemaIdScope,
    ) {
        let mut registry = self.index.schema_id_registry.lock().unwrap();
        if let Err(error) = registry.register(
            id,
            scope,
            schema_node.clone(),
            self.index.id,
            path,
            schema_node.line(),
            schema_node.column(),
        ) {
            drop(registry);
            self.index.ref_errors.lock().unwrap().push(error);
        }
    }

    /// A schema-container keyword's value (`schema`, `items`,
    /// `additionalProperties`, a `properties` entry, a polymorphic branch…):
    /// boolean `additionalProperties: false` is not a schema at all, a
    /// direct `$ref` child is tracked separately, and everything else is an
    /// inline schema (additionally an *object* inline schema when typed so).
    fn record_schema_container(&mut self, child: &Node, path: &str) {
        if child.kind() != NodeKind::Mapping {
            return;
        }
        if let Some(ref_node) = child.get("$ref") {
            if let Some(definition) = ref_node.as_scalar_str() {
                let reference = Reference::raw(definition, path, self.index.id);
                self.index
                    .ref_schema_definitions
                    .lock()
                    .unwrap()
                    .push(reference);
            }
            return;
        }
        let reference = Reference::raw(path, path, self.index.id);
        self.index
            .inline_schema_definitions
            .lock()
            .unwrap()
            .push(reference.clone());
        if child.is_typed_object() || is_typed_array(child) {
            self.index
                .inline_schema_object_definitions
                .lock()
                .unwrap()
                .push(reference);
        }
    }

    /// A `description`/`summary` keyword is only genuine when its value is a
    /// scalar. A `properties` map with a field literally named `description`
    /// holds a nested schema (a mapping) there instead, so it is skipped
    /// here and picked up correctly one level down when that field's own
    /// schema is walked.
    fn record_description_or_summary(
        &self,
        bucket: &mut Vec<DescriptionReference>,
        node: &Node,
        path: &str,
    ) {
        if node.kind() == NodeKind::Scalar {
            bucket.push(DescriptionReference {
                node: node.clone(),
                path: path.to_owned(),
            });
        }
    }

    /// One `Reference` per scope string on a security requirement's scheme,
    /// at `{path}.security[{i}].{scheme}[{j}]`; a scheme listing no scopes
    /// still gets a single scheme-level reference at `{path}.security[{i}].{scheme}`
    /// so an unscoped-but-referenced scheme isn't dropped.
    fn record_security(&mut self, security: &Node, path: &str) {
        for (i, requirement) in security.sequence_items().iter().enumerate() {
            for (scheme_name, scopes) in requirement.mapping_entries() {
                let Some(name) = scheme_name.as_scalar_str() else { continue };
                let definition = format!("#/components/securitySchemes/{name}");
                let scope_items = scopes.sequence_items();
                if scope_items.is_empty() {
                    let reference = Reference::raw(
                        definition,
                        format!("{path}.security[{i}].{name}"),
                        self.index.id,
                    );
                    self.index
                        .security_requirements
                        .lock()
                        .unwrap()
                        .push(reference);
                    continue;
                }
                for (j, _scope) in scope_items.iter().enumerate() {
                    let reference = Reference::raw(
                        definition.clone(),
                        format!("{path}.security[{i}].{name}[{j}]"),
                        self.index.id,
                    );
                    self.index
                        .security_requirements
                        .lock()
                        .unwrap()
                        .push(reference);
                }
            }
        }
    }
}

fn poly_keyword_str(key: &str) -> &'static str {
    match key {
        "allOf" => "allOf",
        "anyOf" => "anyOf",
        _ => "oneOf",
    }
}

fn is_typed_array(node: &Node) -> bool {
    match node.get("type") {
        Some(type_node) => match type_node.kind() {
            NodeKind::Scalar => type_node.as_scalar_str() == Some("array"),
            NodeKind::Sequence => type_node
                .sequence_items()
                .iter()
                .any(|item| item.as_scalar_str() == Some("array")),
            _ => false,
        },
        None => false,
    }
}

/// `paths./x.get`, `paths./x.post`, etc: the last two path segments are an
/// HTTP method name directly under a `paths` entry.
fn is_operation_object(path_segments: &[PathSegment]) -> bool {
    const METHODS: [&str; 8] =
        ["get", "put", "post", "delete", "options", "head", "patch", "trace"];
    matches!(
        (path_segments.first(), path_segments.last()),
        (Some(PathSegment::Key(root)), Some(PathSegment::Key(method)))
            if root == "paths" && METHODS.contains(&method.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RolodexConfig;
    use rolodex_util::node::Node;

    fn walk(yaml: &str) -> SpecIndex {
        let index = SpecIndex::new(0, None);
        index.bootstrap(
            Node::parse_yaml(yaml).unwrap(),
            RolodexConfig::default(),
            "file:///root.yaml".to_owned(),
        );
        extract_refs(&index);
        index
    }

    #[test]
    fn collects_local_ref_and_its_sibling_properties() {
        let index = walk(
            "paths:\n  /pets:\n    get:\n      responses:\n        '200':\n          description: ok\n          $ref: '#/components/responses/Pets'\n",
        );
        let refs = index.all_refs.lock().unwrap();
        let reference = refs.get("#/components/responses/Pets").unwrap();
        assert!(reference.has_sibling_properties);
        assert!(reference.sibling_properties.contains_key("description"));
    }

    #[test]
    fn empty_ref_is_an_error_not_a_reference() {
        let index = walk("components:\n  schemas:\n    Pet:\n      $ref: ''\n");
        assert!(index.all_refs.lock().unwrap().is_empty());
        assert_eq!(index.ref_errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn distinguishes_global_tags_from_operation_tags() {
        let index = walk(
            "tags:\n  - name: pets\npaths:\n  /pets:\n    get:\n      tags:\n        - public\n      responses: {}\n",
        );
        assert_eq!(index.global_tags.lock().unwrap().len(), 1);
        assert_eq!(index.operation_tags.lock().unwrap().len(), 1);
    }

    #[test]
    fn description_under_properties_is_a_property_not_a_keyword() {
        let index = walk(
            "components:\n  schemas:\n    Note:\n      type: object\n      description: a note\n      properties:\n        description:\n          type: string\n",
        );
        // Exactly one genuine `description` keyword (the schema's own); the
        // nested property named `description` is never reinterpreted as a
        // `description` keyword occurrence.
        assert_eq!(index.descriptions.lock().unwrap().len(), 1);
    }

    #[test]
    fn allof_branches_populate_the_allof_bucket() {
        let index = walk(
            "components:\n  schemas:\n    Dog:\n      allOf:\n        - $ref: '#/components/schemas/Animal'\n        - type: object\n",
        );
        assert_eq!(index.polymorphic_all_of.lock().unwrap().len(), 1);
        assert_eq!(index.polymorphic_refs.lock().unwrap().len(), 1);
    }

    #[test]
    fn refs_under_polymorphic_branches_never_reach_all_refs() {
        let index = walk(
            "components:\n  schemas:\n    Dog:\n      allOf:\n        - $ref: '#/components/schemas/Animal'\n        - properties:\n            tail:\n              $ref: '#/components/schemas/Tail'\n",
        );
        assert!(index.all_refs.lock().unwrap().is_empty());
        assert_eq!(index.polymorphic_refs.lock().unwrap().len(), 2);
    }

    #[test]
    fn nested_id_scope_is_tracked_from_root() {
        let index = walk(
            "components:\n  schemas:\n    Pet:\n      $id: pet.json\n      type: object\n",
        );
        let registry = index.schema_id_registry.lock().unwrap();
        assert_eq!(registry.entries().count(), 1);
    }

    #[test]
    fn security_requirement_becomes_a_scheme_reference() {
        let index = walk(
            "security:\n  - apiKey: []\npaths:\n  /pets:\n    get:\n      security:\n        - oauth: [read, write]\n      responses: {}\n",
        );
        let refs = index.security_requirements.lock().unwrap();
        // apiKey has no scopes -> one scheme-level reference; oauth lists two
        // scopes -> one reference per scope.
        assert_eq!(refs.len(), 3);
        assert_eq!(
            refs.iter().filter(|r| r.definition.ends_with("apiKey")).count(),
            1
        );
        assert_eq!(
            refs.iter().filter(|r| r.definition.ends_with("oauth")).count(),
            2
        );
        assert!(refs.iter().any(|r| r.path.ends_with("apiKey")));
        assert!(refs.iter().any(|r| r.path.ends_with("oauth[0]")));
        assert!(refs.iter().any(|r| r.path.ends_with("oauth[1]")));
    }

    #[test]
    fn boolean_additional_properties_is_not_an_inline_schema() {
        let index = walk(
            "components:\n  schemas:\n    Pet:\n      type: object\n      additionalProperties: false\n",
        );
        assert!(index.inline_schema_definitions.lock().unwrap().is_empty());
    }

    #[test]
    fn ref_valued_schema_container_is_tracked_as_a_ref_schema_definition() {
        let index = walk(
            "components:\n  schemas:\n    Kennel:\n      type: object\n      properties:\n        occupant:\n          $ref: '#/components/schemas/Dog'\n",
        );
        assert_eq!(index.ref_schema_definitions.lock().unwrap().len(), 1);
        assert!(index.inline_schema_definitions.lock().unwrap().is_empty());
    }
}
