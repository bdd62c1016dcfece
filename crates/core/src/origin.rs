//! `NodeOriginMap` (§4.3): per-index (line, column) -> node lookup, plus the
//! rolodex-wide lookup used for diagnostics after cross-file resolution.

use crate::reference::IndexId;
use rolodex_util::node::Node;
use std::{collections::HashMap, sync::mpsc};

/// `(Node, line, column, absolute location, owning index)` — identifies
/// where a node, possibly reached through a resolved reference, actually
/// came from.
#[derive(Clone, Debug)]
pub struct NodeOrigin {
    pub node: Node,
    pub line: u32,
    pub column: u32,
    pub absolute_location: String,
    pub owning_index_id: IndexId,
}

/// Maps `(line, column)` back to the exact node the parser produced there.
/// Built once per index by a producer/consumer pair (§5's `MapNodes`): a
/// producer thread walks the tree and sends every node over a channel, the
/// calling thread consumes into the map; the channel's closing (the sender
/// being dropped when the walk finishes) is the one-shot completion signal.
#[derive(Debug, Default)]
pub struct NodeOriginMap {
    by_line: HashMap<u32, HashMap<u32, Node>>,
}

impl NodeOriginMap {
    /// Walk `root` and build the (line, column) -> node map.
    pub fn build(root: &Node) -> Self {
        let (tx, rx) = mpsc::channel::<Node>();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                walk_send(root, &tx);
                // Dropping `tx` here (end of scope) closes the channel,
                // which is the consumer's signal that the walk is done.
            });

            let mut map = NodeOriginMap::default();
            for node in rx {
                map.by_line
                    .entry(node.line())
                    .or_default()
                    .insert(node.column(), node);
            }
            map
        })
    }

    /// Look up the original parsed node at `(line, column)`, if any.
    pub fn lookup(&self, line: u32, column: u32) -> Option<&Node> {
        self.by_line.get(&line).and_then(|by_col| by_col.get(&column))
    }
}

fn walk_send(node: &Node, tx: &mpsc::Sender<Node>) {
    let _ = tx.send(node.clone());
    for (key, value) in node.mapping_entries() {
        walk_send(key, tx);
        walk_send(value, tx);
    }
    for item in node.sequence_items() {
        walk_send(item, tx);
    }
}

/// Search, in order, the root index's origin map and then every child
/// index's, first by node identity and falling back to a structural content
/// hash (so a deep-cloned copy with identical content still matches).
///
/// Each index contributes its `IndexId`, its own absolute path/URL (so the
/// returned origin's `absolute_location` names the file a reference was
/// actually satisfied from, per Testable Property 6), and its origin map.
pub fn find_node_origin<'a>(
    target: &Node,
    indexes: impl IntoIterator<Item = (IndexId, &'a str, &'a NodeOriginMap)>,
) -> Option<NodeOrigin> {
    let mut by_hash: Option<NodeOrigin> = None;
    let target_hash = target.content_hash();

    for (index_id, absolute_location, map) in indexes {
        for by_col in map.by_line.values() {
            for candidate in by_col.values() {
                if candidate.is_same_allocation(target) {
                    return Some(NodeOrigin {
                        node: candidate.clone(),
                        line: candidate.line(),
                        column: candidate.column(),
                        absolute_location: absolute_location.to_owned(),
                        owning_index_id: index_id,
                    });
                }
                if by_hash.is_none() && candidate.content_hash() == target_hash
                {
                    by_hash = Some(NodeOrigin {
                        node: candidate.clone(),
                        line: candidate.line(),
                        column: candidate.column(),
                        absolute_location: absolute_location.to_owned(),
                        owning_index_id: index_id,
                    });
                }
            }
        }
    }
    by_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_looks_up_nodes_by_position() {
        let root = Node::parse_yaml("a:\n  b: c\n").unwrap();
        let map = NodeOriginMap::build(&root);
        let mapping = root.unwrap_document();
        let (key, _) = &mapping.mapping_entries()[0];
        let found = map.lookup(key.line(), key.column()).unwrap();
        assert_eq!(found.as_scalar_str(), Some("a"));
    }

    #[test]
    fn finds_origin_by_identity_then_by_content_hash() {
        let root = Node::parse_yaml("a: b\n").unwrap();
        let map = NodeOriginMap::build(&root);
        let mapping = root.unwrap_document();
        let (key, _) = &mapping.mapping_entries()[0];

        let origin = find_node_origin(key, [(0usize, "root.yaml", &map)])
            .expect("found by identity");
        assert!(origin.node.is_same_allocation(key));
        assert_eq!(origin.absolute_location, "root.yaml");

        let reparsed = Node::parse_yaml("a: b\n").unwrap();
        let reparsed_mapping = reparsed.unwrap_document();
        let (reparsed_key, _) = &reparsed_mapping.mapping_entries()[0];
        let origin = find_node_origin(reparsed_key, [(0usize, "root.yaml", &map)])
            .expect("found by content hash");
        assert!(!origin.node.is_same_allocation(reparsed_key));
    }
}
