//! Cross-hierarchy net resolution.
//!
//! Local nets from every sheet instance are placed in one arena indexed
//! by `(hierarchy node, local net id)` and merged with a disjoint-set
//! structure: sheet-pin bindings chain child nets to parent nets through
//! arbitrary nesting, and design-wide anchors (global labels and power
//! rails) merge same-named nets with no wiring at all. Naming follows the
//! priority power > global > hierarchical > local > auto id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::unionfind::UnionFind;
use sch_core::{Design, LabelKind};

use crate::connectivity::{LocalNetId, SheetConnectivity};
use crate::diag::{DiagCode, Diagnostics, Location};
use crate::hierarchy::Hierarchy;
use crate::path::SheetPath;
use crate::ResolveOptions;

/// Marker error: a cancellation request was observed. The caller owns the
/// diagnostics gathered so far and attaches them to the fatal error.
pub(crate) struct Canceled;

/// Outcome of net resolution: every `(node, local net)` slot mapped to a
/// named group.
pub(crate) struct ResolvedNets {
    base: Vec<usize>,
    group_of: Vec<usize>,
    names: Vec<String>,
    auto_named: Vec<bool>,
}

impl ResolvedNets {
    pub fn group(&self, node: usize, local: LocalNetId) -> usize {
        self.group_of[self.base[node] + local]
    }

    pub fn name(&self, group: usize) -> &str {
        &self.names[group]
    }

    pub fn is_auto_named(&self, group: usize) -> bool {
        self.auto_named[group]
    }

    pub fn group_count(&self) -> usize {
        self.names.len()
    }
}

/// Scope-qualified net name: `/RXD` at the root, `/phy1/RXD` below it.
fn scoped(path: &SheetPath, text: &str) -> String {
    if path.is_root() {
        format!("/{text}")
    } else {
        format!("{path}/{text}")
    }
}

pub(crate) fn resolve_nets(
    design: &Design,
    hierarchy: &Hierarchy,
    conn: &BTreeMap<String, SheetConnectivity>,
    options: &ResolveOptions,
    diags: &mut Diagnostics,
) -> Result<ResolvedNets, Canceled> {
    let canceled = || options.is_canceled();

    // Arena layout: one slot per local net of every sheet instance.
    let mut base = Vec::with_capacity(hierarchy.nodes.len());
    let mut total = 0usize;
    for node in &hierarchy.nodes {
        base.push(total);
        total += conn[&node.sheet].nets.len();
    }
    let mut uf = UnionFind::<usize>::new(total);

    // Same-text labels within one sheet instance are the same logical
    // net: two wire stubs labelled "RXD" on one sheet connect by name.
    for (i, node) in hierarchy.nodes.iter().enumerate() {
        if canceled() {
            return Err(Canceled);
        }
        let sheet = &design.sheets[&node.sheet];
        let c = &conn[&node.sheet];
        let mut local_by_text: BTreeMap<&str, usize> = BTreeMap::new();
        let mut hier_by_text: BTreeMap<&str, usize> = BTreeMap::new();
        for (l, net) in c.nets.iter().enumerate() {
            for &li in &net.labels {
                let label = &sheet.labels[li];
                let map = match label.kind {
                    LabelKind::Local => &mut local_by_text,
                    LabelKind::Hierarchical => &mut hier_by_text,
                    LabelKind::Global => continue,
                };
                match map.get(label.text.as_str()) {
                    Some(&first) => {
                        uf.union(base[i] + first, base[i] + l);
                    }
                    None => {
                        map.insert(&label.text, l);
                    }
                }
            }
        }
    }

    // Sheet-pin bindings: union the child net at the matching
    // hierarchical label with the parent net at the bound point.
    for (i, node) in hierarchy.nodes.iter().enumerate() {
        if canceled() {
            return Err(Canceled);
        }
        let Some(parent) = node.parent else { continue };
        let child_sheet = &design.sheets[&node.sheet];
        let child_conn = &conn[&node.sheet];
        let parent_conn = &conn[&hierarchy.nodes[parent].sheet];
        for binding in &node.bindings {
            if binding.direction.is_none() {
                diags.warning(
                    DiagCode::SheetPinUnconnected,
                    Location::reference(&node.path, &binding.pin),
                    format!(
                        "sheet '{}' does not declare pin '{}'; binding ignored",
                        node.sheet, binding.pin
                    ),
                );
                continue;
            }
            let attach = child_sheet
                .labels
                .iter()
                .find(|label| label.kind == LabelKind::Hierarchical && label.text == binding.pin)
                .and_then(|label| child_conn.net_at(label.at));
            let Some(child_local) = attach else {
                diags.warning(
                    DiagCode::SheetPinUnconnected,
                    Location::reference(&node.path, &binding.pin),
                    format!(
                        "no hierarchical label '{}' inside sheet '{}'",
                        binding.pin, node.sheet
                    ),
                );
                continue;
            };
            let Some(parent_local) = parent_conn.net_at(binding.parent_at) else {
                continue;
            };
            uf.union(base[parent] + parent_local, base[i] + child_local);
        }
    }

    // Design-wide anchors: a global label or power rail name merges every
    // net carrying it, anywhere in the hierarchy, with no wiring.
    let mut anchor: BTreeMap<String, usize> = BTreeMap::new();
    for (i, node) in hierarchy.nodes.iter().enumerate() {
        if canceled() {
            return Err(Canceled);
        }
        let sheet = &design.sheets[&node.sheet];
        let c = &conn[&node.sheet];
        for (l, net) in c.nets.iter().enumerate() {
            let arena = base[i] + l;
            for &pi in &net.power {
                merge_anchor(&mut anchor, &mut uf, &sheet.power_symbols[pi].net, arena);
            }
            for &li in &net.labels {
                let label = &sheet.labels[li];
                if label.kind == LabelKind::Global {
                    merge_anchor(&mut anchor, &mut uf, &label.text, arena);
                }
            }
        }
    }

    // Hierarchical labels that never reach a sheet pin on any parent
    // instance. Severity is configurable; the data alone cannot say
    // whether the author meant a future port or a mistake.
    let bound_pins: BTreeMap<&str, BTreeSet<&str>> = {
        let mut map: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for node in &hierarchy.nodes {
            let set = map.entry(node.sheet.as_str()).or_default();
            for binding in &node.bindings {
                if binding.direction.is_some() {
                    set.insert(binding.pin.as_str());
                }
            }
        }
        map
    };
    let used: BTreeSet<&str> = hierarchy.used_sheets().collect();
    for sheet_name in used {
        let sheet = &design.sheets[sheet_name];
        for label in &sheet.labels {
            if label.kind != LabelKind::Hierarchical {
                continue;
            }
            let bound = bound_pins
                .get(sheet_name)
                .is_some_and(|set| set.contains(label.text.as_str()));
            if !bound {
                diags.push(
                    options.unresolved_hier_label,
                    DiagCode::UnresolvedHierLabel,
                    Location::at(sheet_name, label.at),
                    format!(
                        "hierarchical label '{}' has no matching sheet pin on any parent instance",
                        label.text
                    ),
                );
            }
        }
    }

    // Group arena slots by union-find root, in deterministic order.
    let mut group_of = vec![usize::MAX; total];
    let mut group_by_root: HashMap<usize, usize> = HashMap::new();
    let mut members: Vec<Vec<(usize, LocalNetId)>> = Vec::new();
    for (i, node) in hierarchy.nodes.iter().enumerate() {
        for l in 0..conn[&node.sheet].nets.len() {
            let arena = base[i] + l;
            let root = uf.find(arena);
            let group = *group_by_root.entry(root).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            group_of[arena] = group;
            members[group].push((i, l));
        }
    }

    // Name each group by priority; conflicting power rails on one
    // electrical node are reported and the first-seen name kept.
    let mut names = Vec::with_capacity(members.len());
    let mut auto_named = Vec::with_capacity(members.len());
    let mut taken: HashMap<String, usize> = HashMap::new();
    let mut auto_seq = 0usize;
    for group_members in &members {
        let mut power_name: Option<String> = None;
        let mut global_name: Option<String> = None;
        let mut hier_name: Option<String> = None;
        let mut local_name: Option<String> = None;
        for &(i, l) in group_members {
            let node = &hierarchy.nodes[i];
            let sheet = &design.sheets[&node.sheet];
            let net = &conn[&node.sheet].nets[l];
            for &pi in &net.power {
                let power = &sheet.power_symbols[pi];
                match &power_name {
                    None => power_name = Some(power.net.clone()),
                    Some(first) if *first != power.net => diags.error(
                        DiagCode::NetNameConflict,
                        Location::at(&node.path, power.at),
                        format!(
                            "electrical node carries both power rails '{first}' and '{}'; keeping '{first}'",
                            power.net
                        ),
                    ),
                    Some(_) => {}
                }
            }
            for &li in &net.labels {
                let label = &sheet.labels[li];
                match label.kind {
                    LabelKind::Global => {
                        if global_name.is_none() {
                            global_name = Some(label.text.clone());
                        }
                    }
                    LabelKind::Hierarchical => {
                        // Only a label backed by a declared sheet pin may
                        // name the net.
                        if hier_name.is_none() && sheet.sheet_pin(&label.text).is_some() {
                            hier_name = Some(scoped(&node.path, &label.text));
                        }
                    }
                    LabelKind::Local => {
                        if local_name.is_none() {
                            local_name = Some(scoped(&node.path, &label.text));
                        }
                    }
                }
            }
        }

        let named = power_name
            .or(global_name)
            .or(hier_name)
            .or(local_name);
        let is_auto = named.is_none();
        let mut name = named.unwrap_or_else(|| {
            auto_seq += 1;
            let (i, _) = group_members[0];
            scoped(&hierarchy.nodes[i].path, &format!("$N{auto_seq}"))
        });
        // Canonical names are unique within their scope; suffix the rare
        // residual collision deterministically.
        if taken.contains_key(&name) {
            let stem = name.clone();
            let mut bump = 2;
            while taken.contains_key(&name) {
                name = format!("{stem}_{bump}");
                bump += 1;
            }
        }
        taken.insert(name.clone(), names.len());
        names.push(name);
        auto_named.push(is_auto);
    }

    log::info!(
        "resolved {} nets across {} sheet instances",
        names.len(),
        hierarchy.nodes.len()
    );
    Ok(ResolvedNets {
        base,
        group_of,
        names,
        auto_named,
    })
}

fn merge_anchor(
    anchor: &mut BTreeMap<String, usize>,
    uf: &mut UnionFind<usize>,
    name: &str,
    arena: usize,
) {
    match anchor.get(name) {
        Some(&first) => {
            uf.union(first, arena);
        }
        None => {
            anchor.insert(name.to_string(), arena);
        }
    }
}
