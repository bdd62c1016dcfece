//! `Resolver` (§4.7): turns each raw [`Reference`] into a mapped one by
//! navigating the owning index's own tree, opening cross-file documents
//! through the [`Rolodex`], or falling back to the global `$id` registry.
//! `extract_components_from_refs` fans resolution out over `rayon` while
//! preserving discovery order in `all_mapped_refs_sequenced` (§5b).

use crate::{
    index::{CircularReference, SpecIndex},
    reference::{Reference, ReferenceMapped},
    rolodex::Rolodex,
};
use rayon::prelude::*;
use rolodex_util::{
    error::{IndexingError, IndexingErrorKind},
    pointer::{convert_component_id_into_friendly_path, navigate_fragment},
    refstring::{RefKind, RefString, parse_ref_string},
};
use std::{collections::HashSet, path::Path};

/// Resolve every ref the walker discovered on `index` and populate its
/// mapped-ref collections. Must run after [`crate::walker::extract_refs`].
pub fn extract_components_from_refs(rolodex: &Rolodex, index: &SpecIndex) {
    let raw_refs = index.raw_sequenced_refs.lock().unwrap().clone();

    // Pre-sized slot array: resolution runs in parallel, but each result is
    // written to the slot matching its original discovery index, so the
    // final in-order sweep reproduces discovery order regardless of which
    // thread finished first.
    let mut slots: Vec<Option<ReferenceMapped>> = vec![None; raw_refs.len()];
    let resolved: Vec<(usize, Result<Reference, IndexingError>)> = raw_refs
        .par_iter()
        .enumerate()
        .map(|(i, reference)| (i, resolve_reference(rolodex, index, reference)))
        .collect();

    for (i, result) in resolved {
        match result {
            Ok(mapped) => {
                let mut all_mapped = index.all_mapped_refs.lock().unwrap();
                if all_mapped.contains_key(&mapped.full_definition) {
                    continue;
                }
                all_mapped.insert(mapped.full_definition.clone(), mapped.clone());
                drop(all_mapped);
                slots[i] = Some(ReferenceMapped {
                    definition: mapped.full_definition.clone(),
                    reference: mapped,
                });
            }
            Err(error) => {
                index.ref_errors.lock().unwrap().push(error);
            }
        }
    }

    index
        .all_mapped_refs_sequenced
        .lock()
        .unwrap()
        .extend(slots.into_iter().flatten());
}

/// Resolve a single reference against `owning_index`, per §4.7's algorithm.
///
/// Each raw ref is resolved in a single hop — navigate locally, or open one
/// cross-file document and read the target node directly — so there is no
/// recursive resolution chain within this call to protect against. Real
/// cyclic *file* opens (document A importing document B importing A back)
/// are instead guarded by [`Rolodex::open`]'s per-key dedup, and cyclic
/// *schema* references are reported separately by [`detect_cycles`]. An
/// earlier revision kept a `Mutex<HashSet<String>>` of "currently resolving"
/// definitions here, but since two unrelated occurrences of the same `$ref`
/// string are common (every duplicate `$ref` in `rawSequencedRefs` shares
/// one `fullDefinition`) and are resolved concurrently by `rayon`, that set
/// produced nondeterministic false positives: whichever duplicate lost the
/// race was spuriously marked circular.
pub fn resolve_reference(
    rolodex: &Rolodex,
    owning_index: &SpecIndex,
    reference: &Reference,
) -> Result<Reference, IndexingError> {
    let (_, friendly_path) =
        convert_component_id_into_friendly_path(&reference.full_definition);
    resolve_reference_inner(rolodex, owning_index, reference, &friendly_path)
}

fn resolve_reference_inner(
    rolodex: &Rolodex,
    owning_index: &SpecIndex,
    reference: &Reference,
    friendly_path: &str,
) -> Result<Reference, IndexingError> {
    let parsed: RefString = parse_ref_string(&reference.full_definition)
        .map_err(|error| {
            IndexingError::new(
                IndexingErrorKind::MalformedRef {
                    definition: reference.full_definition.clone(),
                    reason: error.0,
                },
                friendly_path.to_owned(),
            )
        })?;

    let mut mapped = reference.clone();

    if matches!(parsed.kind, RefKind::Local) {
        let fragment = parsed.fragment.clone().unwrap_or_default();
        if let Some(node) = navigate_fragment(owning_index.root(), &fragment) {
            mapped.node = Some(node);
            mapped.full_definition = reference.full_definition.clone();
            mapped.remote_location =
                Some(owning_index.spec_absolute_path().to_owned());
            return Ok(mapped);
        }
        return try_global_schema_id(rolodex, &mut mapped, friendly_path)
            .ok_or_else(|| unresolvable(reference, friendly_path));
    }

    if matches!(parsed.kind, RefKind::Http) && !owning_index.config().allow_remote_lookup {
        return Err(IndexingError::new(
            IndexingErrorKind::RemoteDisallowed {
                definition: reference.full_definition.clone(),
            },
            friendly_path.to_owned(),
        ));
    }
    if matches!(parsed.kind, RefKind::File) && !owning_index.config().allow_file_lookup {
        return Err(IndexingError::new(
            IndexingErrorKind::FileDisallowed {
                definition: reference.full_definition.clone(),
            },
            friendly_path.to_owned(),
        ));
    }

    let absolute_key = absolute_lookup_key(owning_index, &parsed);
    match rolodex.open(&absolute_key, owning_index.id) {
        Ok(child_id) => {
            let child_index = rolodex.index(child_id);
            let fragment = parsed.fragment.clone().unwrap_or_default();
            let node = if fragment.is_empty() {
                Some(child_index.root().clone())
            } else {
                navigate_fragment(child_index.root(), &fragment)
            };
            match node {
                Some(node) => {
                    mapped.node = Some(node);
                    mapped.is_remote = true;
                    mapped.remote_location = Some(absolute_key.clone());
                    mapped.full_definition = format!(
                        "{absolute_key}#/{}",
                        fragment.join("/")
                    );
                    owning_index
                        .children
                        .lock()
                        .unwrap()
                        .insert(absolute_key, child_id);
                    Ok(mapped)
                }
                None => try_global_schema_id(rolodex, &mut mapped, friendly_path)
                    .ok_or_else(|| unresolvable(reference, friendly_path)),
            }
        }
        Err(_) => try_global_schema_id(rolodex, &mut mapped, friendly_path)
            .ok_or_else(|| unresolvable(reference, friendly_path)),
    }
}

fn try_global_schema_id(
    rolodex: &Rolodex,
    mapped: &mut Reference,
    _friendly_path: &str,
) -> Option<Reference> {
    let registry = rolodex.global_schema_ids.lock().unwrap();
    let entry = registry.get(&mapped.definition)?;
    mapped.node = Some(entry.schema_node.clone());
    mapped.full_definition = entry.resolved_uri.clone();
    mapped.owning_index_id = entry.owning_index_id;
    mapped.remote_location =
        Some(rolodex.index(entry.owning_index_id).spec_absolute_path().to_owned());
    Some(mapped.clone())
}

fn unresolvable(reference: &Reference, friendly_path: &str) -> IndexingError {
    IndexingError::new(
        IndexingErrorKind::UnresolvableRef {
            definition: reference.full_definition.clone(),
        },
        friendly_path.to_owned(),
    )
}

/// Compute the absolute key the rolodex should `open()` for a cross-file
/// reference: used as-is when already absolute (HTTP, or a leading `/`),
/// otherwise joined against the owning index's own spec path's directory.
fn absolute_lookup_key(owning_index: &SpecIndex, parsed: &RefString) -> String {
    if matches!(parsed.kind, RefKind::Http) || parsed.base.starts_with('/') {
        return parsed.base.clone();
    }
    let owner_path = owning_index.spec_absolute_path();
    match Path::new(owner_path).parent() {
        Some(dir) if !owner_path.is_empty() => {
            dir.join(&parsed.base).to_string_lossy().into_owned()
        }
        _ => parsed.base.clone(),
    }
}

/// Detect cycles in the `requiredRefProperties` graph between a single
/// index's own component schemas (§8 property 8). Returns one record per
/// distinct cycle, each naming every schema definition in the cycle.
pub fn detect_cycles(index: &SpecIndex) -> Vec<CircularReference> {
    let schemas = index.component_schemas.lock().unwrap();
    let mut results = Vec::new();
    let mut reported_edges = HashSet::new();

    for start in schemas.keys() {
        let mut stack = vec![start.clone()];
        let mut seen = Vec::new();
        while let Some(current) = stack.pop() {
            if let Some(position) = seen.iter().position(|s| s == &current) {
                let chain: Vec<String> = seen[position..].to_vec();
                let edge = (chain.first().cloned(), chain.last().cloned());
                if reported_edges.insert(edge) {
                    results.push(CircularReference { chain });
                }
                continue;
            }
            seen.push(current.clone());
            let Some(reference) = schemas.get(&current) else { continue };
            for next in reference.required_ref_properties.keys() {
                if schemas.contains_key(next) {
                    stack.push(next.clone());
                }
            }
        }
    }
    results
}
