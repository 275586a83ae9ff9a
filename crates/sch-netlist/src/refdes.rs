//! Reference resolution: placeholder references to final designators.
//!
//! A placeholder (`IC?`) resolves by pure lookup of `(placeholder,
//! hierarchy path)` in the design's recorded alternates; there is no
//! shared counter. Resolution is injective: two distinct paths must not
//! end up with the same final reference, and fixed references join the
//! same uniqueness check.

use std::collections::{BTreeMap, HashMap};

use sch_core::Design;

use crate::diag::{DiagCode, Diagnostics, Location};
use crate::hierarchy::Hierarchy;

/// Final reference per `(hierarchy node, component index)`.
pub(crate) type ResolvedRefs = BTreeMap<(usize, usize), String>;

pub(crate) fn resolve_references(
    design: &Design,
    hierarchy: &Hierarchy,
    diags: &mut Diagnostics,
) -> ResolvedRefs {
    let mut refs = ResolvedRefs::new();
    let mut taken: HashMap<String, String> = HashMap::new(); // final ref -> path

    for (i, node) in hierarchy.nodes.iter().enumerate() {
        let sheet = &design.sheets[&node.sheet];
        let path = node.path.to_string();
        for (ci, component) in sheet.components.iter().enumerate() {
            let resolved = if component.is_placeholder() {
                let mut matches = design.ref_map.iter().filter(|alt| {
                    alt.placeholder == component.reference && alt.path == path
                });
                match (matches.next(), matches.next()) {
                    (Some(alt), None) => alt.reference.clone(),
                    (None, _) => {
                        diags.error(
                            DiagCode::AmbiguousReference,
                            Location::reference(&node.path, &component.reference),
                            format!(
                                "no recorded alternate for placeholder '{}' at path {}",
                                component.reference, node.path
                            ),
                        );
                        format!("{}@{}", component.reference, node.path)
                    }
                    (Some(_), Some(_)) => {
                        diags.error(
                            DiagCode::AmbiguousReference,
                            Location::reference(&node.path, &component.reference),
                            format!(
                                "multiple recorded alternates for placeholder '{}' at path {}",
                                component.reference, node.path
                            ),
                        );
                        format!("{}@{}", component.reference, node.path)
                    }
                }
            } else {
                component.reference.clone()
            };

            match taken.get(&resolved) {
                Some(previous) if *previous != path => diags.error(
                    DiagCode::DuplicateReference,
                    Location::reference(&node.path, &resolved),
                    format!("reference '{resolved}' is already used at {previous}"),
                ),
                Some(_) => diags.error(
                    DiagCode::DuplicateReference,
                    Location::reference(&node.path, &resolved),
                    format!("reference '{resolved}' is used twice on one sheet"),
                ),
                None => {
                    taken.insert(resolved.clone(), path.clone());
                }
            }
            refs.insert((i, ci), resolved);
        }
    }
    refs
}
