//! `PointerPath` (§4.2): converts a `$ref` definition into a friendly dotted
//! path for error messages, and navigates a [Node] tree by fragment segments.

use crate::node::{Node, NodeKind};

/// Convert a component definition (e.g. `#/components/schemas/Pet`) into its
/// short name (`Pet`) and a friendly, dotted, `$`-rooted path
/// (`$.components.schemas.Pet`) suitable for error messages.
pub fn convert_component_id_into_friendly_path(
    definition: &str,
) -> (String, String) {
    let fragment = definition.split('#').nth(1).unwrap_or(definition);
    let segments: Vec<&str> = fragment
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let name = segments.last().copied().unwrap_or_default().to_owned();
    let friendly = friendly_path(&segments.iter().map(|s| {
        PathSegment::Key((*s).to_owned())
    }).collect::<Vec<_>>());
    (name, friendly)
}

/// A single step of a JSON-path-style path: a named key, or a sequence index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Render a dotted, `$`-rooted path from a list of segments, e.g.
/// `$.paths./test.get.responses.200`.
pub fn friendly_path(segments: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Navigate `root` by a list of decoded pointer segments (as produced by
/// [`crate::refstring::parse_ref_string`]'s fragment), unwrapping a leading
/// document wrapper and walking mapping keys / sequence indices. Returns
/// `None` if any segment fails to resolve.
pub fn navigate_fragment(root: &Node, segments: &[String]) -> Option<Node> {
    let mut current = root.unwrap_document().clone();
    for segment in segments {
        current = navigate_one(&current, segment)?;
    }
    Some(current)
}

fn navigate_one(node: &Node, segment: &str) -> Option<Node> {
    let node = node.unwrap_document();
    match node.kind() {
        NodeKind::Mapping => node
            .mapping_entries()
            .iter()
            .find(|(key, _)| key.as_scalar_str() == Some(segment))
            .map(|(_, value)| value.clone()),
        NodeKind::Sequence => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| node.sequence_items().get(index))
            .cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::rolodex_util_test_support::parse_doc;

    #[test]
    fn converts_component_id_to_friendly_path() {
        let (name, path) = convert_component_id_into_friendly_path(
            "#/components/schemas/Pet",
        );
        assert_eq!(name, "Pet");
        assert_eq!(path, "$.components.schemas.Pet");
    }

    #[test]
    fn navigates_mapping_and_sequence_segments() {
        let root = parse_doc(
            "a:\n  b:\n    - x\n    - y\n    - z\n",
        );
        let found = navigate_fragment(
            &root,
            &["a".to_owned(), "b".to_owned(), "1".to_owned()],
        )
        .unwrap();
        assert_eq!(found.as_scalar_str(), Some("y"));
    }

    #[test]
    fn bracketed_and_escaped_names_navigate_unambiguously() {
        let root = parse_doc(
            "components:\n  schemas:\n    Cake[Burger]:\n      type: object\n",
        );
        let found = navigate_fragment(
            &root,
            &[
                "components".to_owned(),
                "schemas".to_owned(),
                "Cake[Burger]".to_owned(),
            ],
        )
        .unwrap();
        assert!(found.is_typed_object());
    }

    #[test]
    fn missing_segment_returns_none() {
        let root = parse_doc("a: b\n");
        assert!(navigate_fragment(&root, &["missing".to_owned()]).is_none());
    }
}
