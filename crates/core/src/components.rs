//! `ComponentExtractor` (§4.6): after the walk, populate the typed component
//! maps from `paths`/`tags`/`servers`/`security`/`components` (OpenAPI 3) or
//! the flat Swagger 2 top-level `definitions`/`parameters`/`responses`/
//! `securityDefinitions`, and compute `RequiredRefProperties` for schemas.

use crate::index::SpecIndex;
use indexmap::IndexMap;
use rolodex_util::{
    error::{IndexingError, IndexingErrorKind},
    node::Node,
};

const HTTP_METHODS: [&str; 8] =
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// One OpenAPI-3 `components.*` sub-map name paired with the collection it
/// feeds and its `#/…` path prefix; reused verbatim as the Swagger-2
/// top-level key for the maps both specs share.
struct ComponentKind {
    openapi3_key: &'static str,
    swagger2_key: Option<&'static str>,
    prefix: &'static str,
}

const COMPONENT_KINDS: [ComponentKind; 7] = [
    ComponentKind {
        openapi3_key: "schemas",
        swagger2_key: Some("definitions"),
        prefix: "#/components/schemas/",
    },
    ComponentKind {
        openapi3_key: "parameters",
        swagger2_key: Some("parameters"),
        prefix: "#/components/parameters/",
    },
    ComponentKind {
        openapi3_key: "responses",
        swagger2_key: Some("responses"),
        prefix: "#/components/responses/",
    },
    ComponentKind {
        openapi3_key: "headers",
        swagger2_key: None,
        prefix: "#/components/headers/",
    },
    ComponentKind {
        openapi3_key: "examples",
        swagger2_key: None,
        prefix: "#/components/examples/",
    },
    ComponentKind {
        openapi3_key: "links",
        swagger2_key: None,
        prefix: "#/components/links/",
    },
    ComponentKind {
        openapi3_key: "callbacks",
        swagger2_key: None,
        prefix: "#/components/callbacks/",
    },
];

/// Populate every typed component map on `index` from its root node. Must
/// run after [`crate::walker::extract_refs`] has populated `all_refs`
/// (schemas' `RequiredRefProperties` computation reads the same root tree
/// directly, independent of walk order, so this has no hard ordering
/// dependency on the walk beyond sharing the same root).
pub fn extract_components(index: &SpecIndex) {
    let root = index.root().unwrap_document().clone();
    let components = root.get("components");

    extract_operation_parameters(index, &root);

    for kind in &COMPONENT_KINDS {
        let map_node = components
            .and_then(|c| c.get(kind.openapi3_key))
            .or_else(|| kind.swagger2_key.and_then(|key| root.get(key)));
        let Some(map_node) = map_node else { continue };
        let target = component_bucket(index, kind.openapi3_key);
        for (key_node, value) in map_node.mapping_entries() {
            let Some(name) = key_node.as_scalar_str() else { continue };
            let mut reference = crate::reference::Reference::raw(
                format!("{}{name}", kind.prefix),
                format!("$.components.{}.{name}", kind.openapi3_key),
                index.id,
            );
            reference.node = Some(value.clone());
            if kind.openapi3_key == "schemas" {
                reference.required_ref_properties =
                    compute_required_ref_properties(value);
            }
            target.lock().unwrap().insert(reference.full_definition.clone(), reference);
        }
    }

    let request_bodies = components
        .and_then(|c| c.get("requestBodies"))
        .or_else(|| root.get("requestBodies"));
    if let Some(map_node) = request_bodies {
        insert_plain(index, &index.component_request_bodies, map_node, "requestBodies");
    }

    let security_schemes = components
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| root.get("securityDefinitions"));
    if let Some(map_node) = security_schemes {
        insert_plain(
            index,
            &index.component_security_schemes,
            map_node,
            "securitySchemes",
        );
    }
}

/// For every `paths./x.{method}`, merge that operation's own `parameters`
/// with its path item's shared `parameters`, record each as an
/// `operation_parameters` entry, and flag duplicate `(name, in)` pairs and
/// parameters missing a `name` (§7's `DuplicateOperationParameter` and
/// `UnnamedOperationParameter` error kinds).
fn extract_operation_parameters(index: &SpecIndex, root: &Node) {
    let Some(paths) = root.get("paths") else { return };
    for (path_key, path_item) in paths.mapping_entries() {
        let Some(path_name) = path_key.as_scalar_str() else { continue };
        let shared = path_item.get("parameters");
        for method in HTTP_METHODS {
            let Some(operation) = path_item.get(method) else { continue };
            let Some(own) = operation.get("parameters") else {
                if shared.is_none() {
                    continue;
                }
                record_operation_parameters(index, path_name, method, shared, None);
                continue;
            };
            record_operation_parameters(index, path_name, method, shared, Some(own));
        }
    }
}

fn record_operation_parameters(
    index: &SpecIndex,
    path_name: &str,
    method: &str,
    shared: Option<&Node>,
    own: Option<&Node>,
) {
    let base_path = format!("$.paths.{path_name}.{method}.parameters");
    let mut seen: IndexMap<(String, String), ()> = IndexMap::new();

    let items = shared
        .into_iter()
        .flat_map(Node::sequence_items)
        .chain(own.into_iter().flat_map(Node::sequence_items));

    for (position, param) in items.enumerate() {
        let path = format!("{base_path}[{position}]");
        let reference_definition = format!(
            "#/paths/{path_name}/{method}/parameters/{position}"
        );
        let mut reference =
            crate::reference::Reference::raw(reference_definition, path.clone(), index.id);
        reference.node = Some(param.clone());
        index.operation_parameters.lock().unwrap().push(reference);

        if param.get("$ref").is_some() {
            continue;
        }
        let Some(name) = param.get("name").and_then(Node::as_scalar_str) else {
            index.operation_param_errors.lock().unwrap().push(IndexingError::new(
                IndexingErrorKind::UnnamedOperationParameter { path: path.clone() },
                path,
            ));
            continue;
        };
        let location = param
            .get("in")
            .and_then(Node::as_scalar_str)
            .unwrap_or_default()
            .to_owned();
        let key = (name.to_owned(), location.clone());
        if seen.insert(key, ()).is_some() {
            index.operation_param_errors.lock().unwrap().push(IndexingError::new(
                IndexingErrorKind::DuplicateOperationParameter {
                    name: name.to_owned(),
                    location,
                    path: path.clone(),
                },
                path,
            ));
        }
    }
}

fn component_bucket<'a>(
    index: &'a SpecIndex,
    key: &str,
) -> &'a std::sync::Mutex<IndexMap<String, crate::reference::Reference>> {
    match key {
        "schemas" => &index.component_schemas,
        "parameters" => &index.component_parameters,
        "responses" => &index.component_responses,
        "headers" => &index.component_headers,
        "examples" => &index.component_examples,
        "links" => &index.component_links,
        _ => &index.component_callbacks,
    }
}

fn insert_plain(
    index: &SpecIndex,
    bucket: &std::sync::Mutex<IndexMap<String, crate::reference::Reference>>,
    map_node: &Node,
    key: &str,
) {
    for (key_node, value) in map_node.mapping_entries() {
        let Some(name) = key_node.as_scalar_str() else { continue };
        let mut reference = crate::reference::Reference::raw(
            format!("#/components/{key}/{name}"),
            format!("$.components.{key}.{name}"),
            index.id,
        );
        reference.node = Some(value.clone());
        bucket.lock().unwrap().insert(reference.full_definition.clone(), reference);
    }
}

/// For `schema`, compute which of its `required` properties themselves
/// reference another schema (directly, or through `items.$ref` for array
/// properties), descending recursively through `allOf`/`anyOf`/`oneOf`
/// branches. The result maps the referenced schema's definition string to
/// the list of property names on `schema` that require it.
fn compute_required_ref_properties(schema: &Node) -> IndexMap<String, Vec<String>> {
    let mut required_refs: IndexMap<String, Vec<String>> = IndexMap::new();
    collect_required_ref_properties(schema, &mut required_refs);
    required_refs
}

fn collect_required_ref_properties(
    schema: &Node,
    out: &mut IndexMap<String, Vec<String>>,
) {
    let required: Vec<&str> = schema
        .get("required")
        .map(|node| {
            node.sequence_items()
                .iter()
                .filter_map(Node::as_scalar_str)
                .collect()
        })
        .unwrap_or_default();

    if let Some(properties) = schema.get("properties") {
        for property_name in &required {
            let Some(property_schema) = properties.get(property_name) else {
                continue;
            };
            if let Some(definition) = direct_ref_definition(property_schema) {
                out.entry(definition)
                    .or_default()
                    .push((*property_name).to_owned());
            } else if let Some(items) = property_schema.get("items") {
                if let Some(definition) = direct_ref_definition(items) {
                    out.entry(definition)
                        .or_default()
                        .push((*property_name).to_owned());
                }
            }
        }
    }

    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(branches) = schema.get(keyword) {
            for branch in branches.sequence_items() {
                collect_required_ref_properties(branch, out);
            }
        }
    }
}

fn direct_ref_definition(node: &Node) -> Option<String> {
    node.get("$ref").and_then(Node::as_scalar_str).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RolodexConfig;
    use rolodex_util::node::Node;

    fn extract(yaml: &str) -> SpecIndex {
        let index = SpecIndex::new(0, None);
        index.bootstrap(
            Node::parse_yaml(yaml).unwrap(),
            RolodexConfig::default(),
            "file:///root.yaml".to_owned(),
        );
        extract_components(&index);
        index
    }

    #[test]
    fn registers_openapi3_schemas_by_name() {
        let index = extract(
            "components:\n  schemas:\n    Pet:\n      type: object\n",
        );
        let schemas = index.component_schemas.lock().unwrap();
        assert!(schemas.contains_key("#/components/schemas/Pet"));
    }

    #[test]
    fn falls_back_to_swagger2_definitions() {
        let index = extract("definitions:\n  Pet:\n    type: object\n");
        let schemas = index.component_schemas.lock().unwrap();
        assert!(schemas.contains_key("#/components/schemas/Pet"));
    }

    #[test]
    fn duplicate_name_and_location_on_one_operation_is_an_error() {
        let index = extract(
            "paths:\n  /pets:\n    get:\n      parameters:\n        - name: limit\n          in: query\n        - name: limit\n          in: query\n",
        );
        assert_eq!(index.operation_parameters.lock().unwrap().len(), 2);
        let errors = index.operation_param_errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn shared_path_parameters_are_merged_into_every_operation() {
        let index = extract(
            "paths:\n  /pets/{id}:\n    parameters:\n      - name: id\n        in: path\n    get:\n      responses: {}\n    delete:\n      responses: {}\n",
        );
        assert_eq!(index.operation_parameters.lock().unwrap().len(), 2);
    }

    #[test]
    fn parameter_without_a_name_is_an_error() {
        let index = extract(
            "paths:\n  /pets:\n    get:\n      parameters:\n        - in: query\n",
        );
        let errors = index.operation_param_errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        rolodex_util::assert_matches!(
            &errors[0].kind,
            rolodex_util::error::IndexingErrorKind::UnnamedOperationParameter { .. }
        );
    }

    #[test]
    fn ref_valued_parameter_is_recorded_but_not_checked_for_a_name() {
        let index = extract(
            "paths:\n  /pets:\n    get:\n      parameters:\n        - $ref: '#/components/parameters/Limit'\n",
        );
        assert_eq!(index.operation_parameters.lock().unwrap().len(), 1);
        assert!(index.operation_param_errors.lock().unwrap().is_empty());
    }

    #[test]
    fn required_ref_property_is_recorded_against_referenced_schema() {
        let index = extract(
            "components:\n  schemas:\n    Order:\n      type: object\n      required: [pet]\n      properties:\n        pet:\n          $ref: '#/components/schemas/Pet'\n    Pet:\n      type: object\n",
        );
        let schemas = index.component_schemas.lock().unwrap();
        let order = schemas.get("#/components/schemas/Order").unwrap();
        let required = order
            .required_ref_properties
            .get("#/components/schemas/Pet")
            .unwrap();
        assert_eq!(required, &vec!["pet".to_owned()]);
    }

    #[test]
    fn required_array_property_follows_items_ref() {
        let index = extract(
            "components:\n  schemas:\n    Order:\n      type: object\n      required: [pets]\n      properties:\n        pets:\n          type: array\n          items:\n            $ref: '#/components/schemas/Pet'\n",
        );
        let schemas = index.component_schemas.lock().unwrap();
        let order = schemas.get("#/components/schemas/Order").unwrap();
        assert!(order.required_ref_properties.contains_key("#/components/schemas/Pet"));
    }
}
