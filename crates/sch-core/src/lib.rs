//! Schematic primitives and the document loader.
//!
//! This crate defines the in-memory records a schematic document is made
//! of (components with per-unit pins, wires, junctions, labels, power
//! symbols, no-connect markers, sheet pins, sheet instances and reference
//! annotations) and a loader that produces them from the persisted
//! S-expression representation. Everything downstream of the loader is
//! purely derived: the resolution engine in `sch-netlist` recomputes nets
//! and final references from scratch on every run.

mod load;
mod model;

pub use load::{LoadError, load_design, parse_sheet};
pub use model::*;
