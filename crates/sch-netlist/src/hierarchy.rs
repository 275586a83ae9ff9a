//! Hierarchy builder: the rooted tree of sheet instances.
//!
//! Fails fatally on a sheet transitively instantiating itself or on an
//! instance referencing a sheet the design does not contain; both make
//! every downstream result meaningless, so no net resolution runs after
//! either.

use sch_core::{Design, Point, PortDirection};
use thiserror::Error;

use crate::path::SheetPath;

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("cyclic hierarchy: sheet '{sheet}' transitively instantiates itself at {path}")]
    Cycle { sheet: String, path: SheetPath },
    #[error("instance '{instance}' at {path} references unknown sheet '{sheet}'")]
    UnknownSheet {
        instance: String,
        sheet: String,
        path: SheetPath,
    },
}

/// One exposed-pin binding of a sheet instance, resolved against the
/// child sheet's declared pins.
#[derive(Debug, Clone)]
pub struct Binding {
    pub pin: String,
    /// Direction from the child sheet's `sheet_pin` declaration; `None`
    /// when the child does not declare the pin.
    pub direction: Option<PortDirection>,
    /// Bound point on the parent canvas.
    pub parent_at: Point,
}

/// A sheet instance in the flattened tree.
#[derive(Debug, Clone)]
pub struct SheetNode {
    pub path: SheetPath,
    /// Name of the sheet definition this node instantiates.
    pub sheet: String,
    /// Index of the parent node in [`Hierarchy::nodes`]; `None` for the root.
    pub parent: Option<usize>,
    pub bindings: Vec<Binding>,
}

/// Preorder flattening of the instance tree. Node order follows document
/// order of instances, so it is deterministic for a given design.
#[derive(Debug)]
pub struct Hierarchy {
    pub nodes: Vec<SheetNode>,
}

impl Hierarchy {
    /// Sheet definition names that are actually instantiated (root included).
    pub fn used_sheets(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.sheet.as_str())
    }
}

pub fn build(design: &Design) -> Result<Hierarchy, HierarchyError> {
    if !design.sheets.contains_key(&design.root) {
        return Err(HierarchyError::UnknownSheet {
            instance: design.root.clone(),
            sheet: design.root.clone(),
            path: SheetPath::root(),
        });
    }
    let mut nodes = Vec::new();
    let mut active = Vec::new();
    visit(
        design,
        &design.root,
        SheetPath::root(),
        None,
        Vec::new(),
        &mut active,
        &mut nodes,
    )?;
    log::debug!("hierarchy has {} sheet instances", nodes.len());
    Ok(Hierarchy { nodes })
}

fn visit(
    design: &Design,
    sheet_name: &str,
    path: SheetPath,
    parent: Option<usize>,
    bindings: Vec<Binding>,
    active: &mut Vec<String>,
    nodes: &mut Vec<SheetNode>,
) -> Result<(), HierarchyError> {
    if active.iter().any(|name| name == sheet_name) {
        return Err(HierarchyError::Cycle {
            sheet: sheet_name.to_string(),
            path,
        });
    }

    let index = nodes.len();
    nodes.push(SheetNode {
        path: path.clone(),
        sheet: sheet_name.to_string(),
        parent,
        bindings,
    });

    let sheet = &design.sheets[sheet_name];
    active.push(sheet_name.to_string());
    for instance in &sheet.instances {
        let Some(child) = design.sheets.get(&instance.sheet) else {
            return Err(HierarchyError::UnknownSheet {
                instance: instance.name.clone(),
                sheet: instance.sheet.clone(),
                path: path.join(&instance.name),
            });
        };
        let bindings = instance
            .bindings
            .iter()
            .map(|binding| Binding {
                pin: binding.pin.clone(),
                direction: child.sheet_pin(&binding.pin).map(|pin| pin.direction),
                parent_at: binding.at,
            })
            .collect();
        visit(
            design,
            &instance.sheet,
            path.join(&instance.name),
            Some(index),
            bindings,
            active,
            nodes,
        )?;
    }
    active.pop();
    Ok(())
}
