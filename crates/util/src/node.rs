//! A minimal, source-position-tracking YAML AST, adapted from [saphyr]'s
//! `MarkedYaml` into the shape the walker and resolver need: five kinds
//! (document, mapping, sequence, scalar, alias), each carrying its own line
//! and column, with mappings preserving key/value order.
//!
//! This is intentionally much thinner than a full deserialization framework —
//! the indexer only ever reads structure, it never deserializes into typed
//! business objects.

use saphyr::{LoadableYamlNode, MarkedYaml, Scalar, YamlData};
use std::sync::Arc;

/// The kind of a parsed node, mirroring the YAML/JSON node kinds the walker
/// cares about.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// The top-level wrapper around a single parsed document
    Document,
    Mapping,
    Sequence,
    Scalar,
    /// A YAML alias (`*anchor`); never chased by this crate
    Alias,
}

/// A parsed node. Cheap to clone (reference-counted); clones compare equal by
/// identity first, so resolved references can be compared against nodes
/// produced during the original walk.
#[derive(Clone, Debug)]
pub struct Node(pub(crate) Arc<NodeData>);

#[derive(Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Present only for `Scalar` nodes.
    pub scalar: Option<String>,
    /// Present only for `Mapping` nodes; preserves document order.
    pub mapping: Vec<(Node, Node)>,
    /// Present only for `Sequence` and `Document` nodes (document holds
    /// exactly one child, stored here for uniformity).
    pub sequence: Vec<Node>,
    pub line: u32,
    pub column: u32,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn line(&self) -> u32 {
        self.0.line
    }

    pub fn column(&self) -> u32 {
        self.0.column
    }

    /// If this is a scalar node, its string representation.
    pub fn as_scalar_str(&self) -> Option<&str> {
        self.0.scalar.as_deref()
    }

    /// Mapping entries in document order, or an empty slice for non-mappings.
    pub fn mapping_entries(&self) -> &[(Node, Node)] {
        &self.0.mapping
    }

    /// Sequence elements in document order, or an empty slice for
    /// non-sequences.
    pub fn sequence_items(&self) -> &[Node] {
        &self.0.sequence
    }

    /// Unwrap a `Document` node to its single content child, per the
    /// convention that a document wrapper is transparent to navigation.
    /// Non-document nodes return themselves.
    pub fn unwrap_document(&self) -> &Node {
        match self.kind() {
            NodeKind::Document => self.0.sequence.first().unwrap_or(self),
            _ => self,
        }
    }

    /// Look up a mapping child by exact key string, ignoring siblings. Only
    /// meaningful for mapping nodes.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.mapping_entries().iter().find_map(|(k, v)| {
            (k.as_scalar_str() == Some(key)).then_some(v)
        })
    }

    /// Whether this node is a mapping whose `type` field is, or includes,
    /// the literal value `"object"`.
    pub fn is_typed_object(&self) -> bool {
        match self.get("type") {
            Some(type_node) => match type_node.kind() {
                NodeKind::Scalar => type_node.as_scalar_str() == Some("object"),
                NodeKind::Sequence => type_node
                    .sequence_items()
                    .iter()
                    .any(|item| item.as_scalar_str() == Some("object")),
                _ => false,
            },
            None => false,
        }
    }

    /// Identity comparison: true if both handles point at the same
    /// allocation (the same node from the same parse).
    pub fn is_same_allocation(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Structural hash of this node's shape (kind, scalar value, and
    /// recursive hashes of children) — used as a fallback for node-origin
    /// lookups when identity comparison misses (e.g. the caller holds a
    /// deep-cloned copy with identical content).
    pub fn content_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_content(&mut hasher);
        hasher.finish()
    }

    fn hash_content<H: std::hash::Hasher>(&self, hasher: &mut H) {
        use std::hash::Hash;
        self.0.kind.hash(hasher);
        self.0.scalar.hash(hasher);
        for (k, v) in &self.0.mapping {
            k.hash_content(hasher);
            v.hash_content(hasher);
        }
        for item in &self.0.sequence {
            item.hash_content(hasher);
        }
    }

    /// Parse a YAML document from a string into a [Node] tree.
    pub fn parse_yaml(input: &str) -> Result<Node, saphyr::ScanError> {
        let mut documents = MarkedYaml::load_from_str(input).inspect_err(
            |error| tracing::debug!(%error, "failed to parse YAML document"),
        )?;
        let root = documents
            .pop()
            .unwrap_or_else(|| YamlData::Mapping(Default::default()).into());
        Ok(Node::wrap_document(Node::from_marked(&root)))
    }

    /// Parse a JSON document (a strict subset of YAML) from a string into a
    /// [Node] tree.
    pub fn parse_json(input: &str) -> Result<Node, saphyr::ScanError> {
        Self::parse_yaml(input)
    }

    fn wrap_document(content: Node) -> Node {
        let line = content.line();
        let column = content.column();
        Node(Arc::new(NodeData {
            kind: NodeKind::Document,
            scalar: None,
            mapping: Vec::new(),
            sequence: vec![content],
            line,
            column,
        }))
    }

    fn from_marked(yaml: &MarkedYaml<'_>) -> Node {
        let line = yaml.span.start.line() as u32;
        let column = yaml.span.start.col() as u32;
        let data = match &yaml.data {
            YamlData::Value(scalar) => NodeData {
                kind: NodeKind::Scalar,
                scalar: Some(scalar_to_string(scalar)),
                mapping: Vec::new(),
                sequence: Vec::new(),
                line,
                column,
            },
            YamlData::Sequence(items) => NodeData {
                kind: NodeKind::Sequence,
                scalar: None,
                mapping: Vec::new(),
                sequence: items.iter().map(Node::from_marked).collect(),
                line,
                column,
            },
            YamlData::Mapping(mapping) => NodeData {
                kind: NodeKind::Mapping,
                scalar: None,
                mapping: mapping
                    .iter()
                    .map(|(k, v)| (Node::from_marked(k), Node::from_marked(v)))
                    .collect(),
                sequence: Vec::new(),
                line,
                column,
            },
            YamlData::Tagged(_, value) => return Node::from_marked(value),
            YamlData::Alias(_) => NodeData {
                kind: NodeKind::Alias,
                scalar: None,
                mapping: Vec::new(),
                sequence: Vec::new(),
                line,
                column,
            },
            YamlData::BadValue | YamlData::Representation(_, _, _) => {
                NodeData {
                    kind: NodeKind::Scalar,
                    scalar: None,
                    mapping: Vec::new(),
                    sequence: Vec::new(),
                    line,
                    column,
                }
            }
        };
        Node(Arc::new(data))
    }
}

fn scalar_to_string(scalar: &Scalar<'_>) -> String {
    match scalar {
        Scalar::Null => String::new(),
        Scalar::Boolean(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::FloatingPoint(f) => f.to_string(),
        Scalar::String(s) => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_unwraps_to_mapping() {
        let node = Node::parse_yaml("foo: bar\n").unwrap();
        assert_eq!(node.kind(), NodeKind::Document);
        let content = node.unwrap_document();
        assert_eq!(content.kind(), NodeKind::Mapping);
        assert_eq!(
            content.get("foo").and_then(Node::as_scalar_str),
            Some("bar")
        );
    }

    #[test]
    fn is_typed_object_checks_scalar_and_sequence_type() {
        let node = Node::parse_yaml("type: object\n").unwrap();
        assert!(node.unwrap_document().is_typed_object());

        let node = Node::parse_yaml("type: [object, \"null\"]\n").unwrap();
        assert!(node.unwrap_document().is_typed_object());

        let node = Node::parse_yaml("type: string\n").unwrap();
        assert!(!node.unwrap_document().is_typed_object());
    }

    #[test]
    fn identity_survives_clone_but_not_reparse() {
        let node = Node::parse_yaml("foo: bar\n").unwrap();
        let clone = node.clone();
        assert!(node.is_same_allocation(&clone));

        let reparsed = Node::parse_yaml("foo: bar\n").unwrap();
        assert!(!node.is_same_allocation(&reparsed));
        assert_eq!(node.content_hash(), reparsed.content_hash());
    }
}
