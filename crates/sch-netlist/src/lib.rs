//! Netlist resolution for hierarchical schematic designs.
//!
//! Given an immutable [`Design`] snapshot (see `sch-core`), this crate
//! computes the true electrical connectivity: the set of nets and the
//! `(component reference, pin number)` pairs each contains. The pipeline
//! is a deterministic batch computation:
//!
//! 1. [`hierarchy`] flattens sheet instances into a rooted tree and
//!    rejects cycles.
//! 2. [`connectivity`] builds local nets per sheet definition (one pass
//!    per sheet, parallelizable).
//! 3. The net resolver merges local nets across the hierarchy through a
//!    single arena-indexed union-find and assigns canonical names.
//! 4. The reference resolver maps placeholder references to final
//!    designators per instantiation path.
//! 5. [`diag`] diagnostics are accumulated throughout and attached to
//!    the output; only parse failures and hierarchy cycles abort a run.

pub mod connectivity;
pub mod diag;
pub mod hierarchy;
pub mod netlist;
pub mod path;

mod refdes;
mod resolve;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use sch_core::{Design, PinType, Point};
use thiserror::Error;

use crate::connectivity::SheetConnectivity;
use crate::diag::{Diagnostics, Location};
use crate::hierarchy::HierarchyError;

pub use crate::diag::{DiagCode, Diagnostic, Severity};
pub use crate::netlist::{NetNode, Netlist};
pub use crate::path::SheetPath;

/// Cooperative cancellation handle. Cancellation is observed between
/// sheets; a canceled run yields no net map.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Severity of a hierarchical label with no matching sheet pin on
    /// any parent instance. Defaults to error.
    pub unresolved_hier_label: Severity,
    pub cancel: Option<CancelToken>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            unresolved_hier_label: Severity::Error,
            cancel: None,
        }
    }
}

impl ResolveOptions {
    pub(crate) fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_canceled)
    }
}

/// Failures that abort a run before any net map is produced.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// The run was canceled; diagnostics gathered from completed phases
    /// are still available for debugging.
    #[error("resolution canceled before completion")]
    Canceled { diagnostics: Vec<Diagnostic> },
}

/// The output of a run: the flat net map plus the ordered diagnostics
/// report. Non-fatal diagnostics never block resolution of unrelated
/// nets.
#[derive(Debug)]
pub struct Resolution {
    pub netlist: Netlist,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Resolve a design into its flat netlist.
pub fn resolve(design: &Design, options: &ResolveOptions) -> Result<Resolution, FatalError> {
    let hierarchy = hierarchy::build(design)?;
    let mut diags = Diagnostics::new();

    // Per-sheet connectivity: independent per sheet definition, built in
    // parallel. Tasks started after a cancellation request skip the work.
    let used: BTreeSet<&str> = hierarchy.used_sheets().collect();
    let conn: BTreeMap<String, SheetConnectivity> = used
        .par_iter()
        .map(|name| {
            if options.is_canceled() {
                return (name.to_string(), SheetConnectivity::default());
            }
            (name.to_string(), SheetConnectivity::build(&design.sheets[*name]))
        })
        .collect();
    if options.is_canceled() {
        return Err(FatalError::Canceled {
            diagnostics: diags.into_vec(),
        });
    }

    let nets = match resolve::resolve_nets(design, &hierarchy, &conn, options, &mut diags) {
        Ok(nets) => nets,
        Err(resolve::Canceled) => {
            return Err(FatalError::Canceled {
                diagnostics: diags.into_vec(),
            });
        }
    };
    let refs = refdes::resolve_references(design, &hierarchy, &mut diags);

    // Assemble the net map and gather per-group pin facts for the
    // post-resolution checks.
    let no_connects: BTreeMap<&str, BTreeSet<Point>> = design
        .sheets
        .iter()
        .map(|(name, sheet)| {
            (
                name.as_str(),
                sheet.no_connects.iter().map(|nc| nc.at).collect(),
            )
        })
        .collect();

    struct GroupPin {
        node: usize,
        at: Point,
        desc: String,
        is_output: bool,
    }
    let mut group_pins: Vec<Vec<GroupPin>> = Vec::new();
    group_pins.resize_with(nets.group_count(), Vec::new);

    let mut out = Netlist::new();
    for (i, node) in hierarchy.nodes.iter().enumerate() {
        if options.is_canceled() {
            return Err(FatalError::Canceled {
                diagnostics: diags.into_vec(),
            });
        }
        let sheet = &design.sheets[&node.sheet];
        let c = &conn[&node.sheet];
        for (ci, component) in sheet.components.iter().enumerate() {
            let reference = &refs[&(i, ci)];
            for unit in &component.units {
                for pin in &unit.pins {
                    let Some(local) = c.net_at(pin.at) else { continue };
                    let group = nets.group(i, local);
                    out.add_member(nets.name(group), reference.clone(), pin.number.clone());
                    group_pins[group].push(GroupPin {
                        node: i,
                        at: pin.at,
                        desc: format!("{reference} pin {}", pin.number),
                        is_output: pin.pin_type == PinType::Output,
                    });
                }
            }
        }
    }
    // Named nets appear in the map even when no pin reached them.
    for group in 0..nets.group_count() {
        if !nets.is_auto_named(group) {
            out.add_net(nets.name(group));
        }
    }
    out.sort_members();

    // Floating pins: a lone pin on an auto-named net with nothing else
    // attached, unless a no-connect marker sits on it.
    for (group, pins) in group_pins.iter().enumerate() {
        if nets.is_auto_named(group) && pins.len() == 1 {
            let pin = &pins[0];
            let node = &hierarchy.nodes[pin.node];
            let marked = no_connects
                .get(node.sheet.as_str())
                .is_some_and(|points| points.contains(&pin.at));
            if !marked {
                diags.warning(
                    DiagCode::FloatingPin,
                    Location {
                        sheet: node.path.to_string(),
                        at: Some(pin.at),
                        reference: Some(pin.desc.clone()),
                    },
                    "pin is not connected and has no no-connect marker",
                );
            }
        }
    }

    // Output-output pairing on one resolved net is a conflict, but never
    // blocks the rest of the design.
    for (group, pins) in group_pins.iter().enumerate() {
        let outputs: Vec<&GroupPin> = pins.iter().filter(|pin| pin.is_output).collect();
        if outputs.len() >= 2 {
            let drivers: Vec<&str> = outputs.iter().map(|pin| pin.desc.as_str()).collect();
            diags.error(
                DiagCode::DirectionConflict,
                Location::reference(&hierarchy.nodes[outputs[0].node].path, nets.name(group)),
                format!(
                    "net '{}' is driven by multiple outputs: {}",
                    nets.name(group),
                    drivers.join(", ")
                ),
            );
        }
    }

    if options.is_canceled() {
        return Err(FatalError::Canceled {
            diagnostics: diags.into_vec(),
        });
    }
    log::info!(
        "netlist has {} nets, {} diagnostics",
        out.nets.len(),
        diags.iter().len()
    );
    Ok(Resolution {
        netlist: out,
        diagnostics: diags.into_vec(),
    })
}
