//! Data model (§3): the value types the walker, resolver, and component
//! extractor produce and consume.

use indexmap::IndexMap;
use rolodex_util::node::Node;

/// Identifies a [`crate::index::SpecIndex`] within a [`crate::rolodex::Rolodex`].
/// A plain integer handle rather than a literal back-pointer, since every
/// `Reference` needs to name its owning index but Rust ownership makes a
/// direct `Rc<SpecIndex>` cycle (index owns references, references point back
/// to index) awkward; the rolodex resolves an `IndexId` back to a `SpecIndex`
/// on demand.
pub type IndexId = usize;

/// Identity of one `$ref` occurrence or one mapped component (§3).
#[derive(Clone, Debug)]
pub struct Reference {
    /// The literal ref string, e.g. `#/components/schemas/Pet`.
    pub definition: String,
    /// The last pointer segment, e.g. `Pet`.
    pub name: String,
    /// The node this reference resolves to, once mapped.
    pub node: Option<Node>,
    /// The node that contains the node this ref resolves to.
    pub parent_node: Option<Node>,
    /// The mapping node that contains the `$ref` key itself (used for
    /// sibling detection).
    pub container_node: Option<Node>,
    /// A JSON-path-style friendly path to where this ref occurs.
    pub path: String,
    /// Absolute-form definition including the owning file, once resolved.
    pub full_definition: String,
    /// Absolute path/URL of the file owning the *target* node, when that
    /// file differs from the file containing the ref.
    pub remote_location: Option<String>,
    pub is_remote: bool,
    pub circular: bool,
    pub has_sibling_properties: bool,
    /// Sibling property name -> node, for refs with siblings.
    pub sibling_properties: IndexMap<String, Node>,
    /// For a schema-defining reference: referenced-schema-definition -> the
    /// property names on *this* schema that require it (§4.6).
    pub required_ref_properties: IndexMap<String, Vec<String>>,
    pub owning_index_id: IndexId,
}

impl Reference {
    /// Construct a raw, not-yet-resolved reference as discovered by the
    /// walker. `definition` must be non-empty; the walker is responsible for
    /// routing empty refs to an error instead of calling this.
    pub fn raw(
        definition: impl Into<String>,
        path: impl Into<String>,
        owning_index_id: IndexId,
    ) -> Self {
        let definition = definition.into();
        let name = last_pointer_segment(&definition);
        Self {
            full_definition: definition.clone(),
            definition,
            name,
            node: None,
            parent_node: None,
            container_node: None,
            path: path.into(),
            remote_location: None,
            is_remote: false,
            circular: false,
            has_sibling_properties: false,
            sibling_properties: IndexMap::new(),
            required_ref_properties: IndexMap::new(),
            owning_index_id,
        }
    }
}

fn last_pointer_segment(definition: &str) -> String {
    let fragment = definition.split('#').next_back().unwrap_or(definition);
    fragment
        .rsplit('/')
        .next()
        .unwrap_or(fragment)
        .to_owned()
}

/// A `(Reference, Definition)` pair recording the order in which raw refs
/// were mapped, independent of the order resolution actually completed in.
#[derive(Clone, Debug)]
pub struct ReferenceMapped {
    pub reference: Reference,
    pub definition: String,
}

/// A lightweight pointer to a genuine `description`/`summary` scalar (§4.5).
#[derive(Clone, Debug)]
pub struct DescriptionReference {
    pub node: Node,
    pub path: String,
}

/// A lightweight pointer to an `enum` keyword, paired with the sibling `type`
/// node that licenses recording it.
#[derive(Clone, Debug)]
pub struct EnumReference {
    pub node: Node,
    pub path: String,
    pub schema_type_node: Node,
}

/// A lightweight pointer to a `properties` keyword inside a schema whose
/// `type` is, or includes, `object`.
#[derive(Clone, Debug)]
pub struct ObjectReference {
    pub node: Node,
    pub path: String,
    pub schema_node: Node,
    pub parent_node: Node,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_reference_derives_name_from_last_segment() {
        let reference = Reference::raw("#/components/schemas/Pet", "$.x", 0);
        assert_eq!(reference.name, "Pet");
        assert_eq!(reference.full_definition, "#/components/schemas/Pet");
    }

    #[test]
    fn name_handles_bracketed_segments() {
        let reference =
            Reference::raw("#/components/schemas/Cake[Burger]", "$.x", 0);
        assert_eq!(reference.name, "Cake[Burger]");
    }
}
