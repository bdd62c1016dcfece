//! Core indexing engine for Rolodex, agnostic of any particular front end.
//!
//! **This crate is not semver compliant**. The version is locked to the root
//! `rolodex` crate version. If you choose to depend directly on this crate,
//! you do so at your own risk of breakage.

pub mod components;
pub mod config;
pub mod file_source;
pub mod index;
pub mod origin;
pub mod reference;
pub mod resolver;
pub mod rolodex;
pub mod schema_id;
pub mod walker;

use crate::{
    config::RolodexConfig, file_source::FileSource, rolodex::Rolodex,
};
use rolodex_util::node::Node;

/// Build a fully indexed and resolved [`Rolodex`] from a root document's raw
/// text and a list of file sources for any cross-file `$ref` it contains.
/// This is the crate's single public entry point, mirroring §4.9's
/// `IndexTheRolodex` → `Resolve` → `CheckForCircularReferences` sequence.
pub fn index_document(
    root_text: &str,
    config: RolodexConfig,
    sources: Vec<Box<dyn FileSource>>,
) -> Result<Rolodex, rolodex_util::error::IndexingError> {
    let root = Node::parse_yaml(root_text).map_err(|scan_error| {
        rolodex_util::error::IndexingError::new(
            rolodex_util::error::IndexingErrorKind::ParseFailure {
                source_name: config
                    .spec_absolute_path
                    .clone()
                    .unwrap_or_default(),
                reason: scan_error.to_string(),
            },
            String::new(),
        )
    })?;

    let rolodex = Rolodex::new(root, config, sources);
    rolodex.index_the_rolodex();
    resolver::extract_components_from_refs(&rolodex, &rolodex.root());
    rolodex.preindex_remaining_sources();
    rolodex.check_for_circular_references();
    Ok(rolodex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RolodexConfig;

    #[test]
    fn indexes_a_small_document_end_to_end() {
        let rolodex = index_document(
            "components:\n  schemas:\n    Pet:\n      type: object\n    Owner:\n      properties:\n        pet:\n          $ref: '#/components/schemas/Pet'\n",
            RolodexConfig {
                spec_absolute_path: Some("root.yaml".to_owned()),
                ..RolodexConfig::default()
            },
            Vec::new(),
        )
        .unwrap();
        let root = rolodex.root();
        assert_eq!(root.total_ref_count(), 1);
        assert_eq!(root.total_mapped_ref_count(), 1);
    }
}
