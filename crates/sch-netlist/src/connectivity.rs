//! Per-sheet connectivity: local nets from geometric primitives.
//!
//! One pass per sheet *definition*; every instance of the sheet shares
//! the same local nets, distinguished later by hierarchy path. Nodes are
//! the distinct points referenced by pins, wire endpoints, labels,
//! junctions, power symbols and instance bindings. Exact coordinate
//! equality contracts nodes; each wire segment is an edge; a junction
//! additionally contracts with any wire passing through its interior.
//! Crossing wires with no junction and no shared endpoint stay distinct.

use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;
use sch_core::{Point, SheetDoc, Wire};

pub type LocalNetId = usize;

/// A pin attachment: indices into the sheet's component/unit/pin lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAttach {
    pub component: usize,
    pub unit: usize,
    pub pin: usize,
}

/// One local net: a connected component of the sheet's point graph.
#[derive(Debug, Clone, Default)]
pub struct LocalNet {
    /// Member points, sorted.
    pub points: Vec<Point>,
    pub pins: Vec<PinAttach>,
    /// Indices into `SheetDoc::labels`.
    pub labels: Vec<usize>,
    /// Indices into `SheetDoc::power_symbols`.
    pub power: Vec<usize>,
}

/// All local nets of one sheet definition, with ids ordered by each
/// net's smallest member point so the numbering is independent of
/// processing order.
#[derive(Debug, Default)]
pub struct SheetConnectivity {
    pub nets: Vec<LocalNet>,
    net_by_point: BTreeMap<Point, LocalNetId>,
}

impl SheetConnectivity {
    /// The local net containing `point`, if the point is referenced by
    /// any primitive on this sheet.
    pub fn net_at(&self, point: Point) -> Option<LocalNetId> {
        self.net_by_point.get(&point).copied()
    }

    pub fn build(sheet: &SheetDoc) -> Self {
        // Collect every referenced point; BTreeMap gives nodes a stable
        // numbering by coordinate.
        let mut node_of: BTreeMap<Point, usize> = BTreeMap::new();
        let mut add = |point: Point| {
            let next = node_of.len();
            node_of.entry(point).or_insert(next);
        };

        for component in &sheet.components {
            for unit in &component.units {
                for pin in &unit.pins {
                    add(pin.at);
                }
            }
        }
        for wire in &sheet.wires {
            add(wire.a);
            add(wire.b);
        }
        for label in &sheet.labels {
            add(label.at);
        }
        for junction in &sheet.junctions {
            add(junction.at);
        }
        for power in &sheet.power_symbols {
            add(power.at);
        }
        for instance in &sheet.instances {
            for binding in &instance.bindings {
                add(binding.at);
            }
        }

        let mut uf = UnionFind::<usize>::new(node_of.len());
        for wire in &sheet.wires {
            uf.union(node_of[&wire.a], node_of[&wire.b]);
        }
        // A junction ties together every wire whose span passes through
        // it. Junctions at a shared endpoint are already one node.
        for junction in &sheet.junctions {
            for wire in &sheet.wires {
                if on_segment(junction.at, wire) {
                    uf.union(node_of[&junction.at], node_of[&wire.a]);
                }
            }
        }

        // Group points by union-find root, then number the groups by
        // their smallest point for order-independent ids.
        let mut groups: BTreeMap<usize, LocalNet> = BTreeMap::new();
        let mut root_by_min: Vec<(Point, usize)> = Vec::new();
        for (&point, &node) in &node_of {
            let root = uf.find(node);
            let group = groups.entry(root).or_default();
            if group.points.is_empty() {
                // First member is the smallest point: node_of iterates in
                // coordinate order.
                root_by_min.push((point, root));
            }
            group.points.push(point);
        }
        root_by_min.sort();

        let mut nets = Vec::with_capacity(root_by_min.len());
        let mut id_of_root: BTreeMap<usize, LocalNetId> = BTreeMap::new();
        for (_, root) in root_by_min {
            id_of_root.insert(root, nets.len());
            nets.push(groups.remove(&root).unwrap_or_default());
        }

        let mut net_by_point = BTreeMap::new();
        for (&point, &node) in &node_of {
            net_by_point.insert(point, id_of_root[&uf.find(node)]);
        }

        let mut conn = SheetConnectivity { nets, net_by_point };
        for (ci, component) in sheet.components.iter().enumerate() {
            for (ui, unit) in component.units.iter().enumerate() {
                for (pi, pin) in unit.pins.iter().enumerate() {
                    let id = conn.net_by_point[&pin.at];
                    conn.nets[id].pins.push(PinAttach {
                        component: ci,
                        unit: ui,
                        pin: pi,
                    });
                }
            }
        }
        for (li, label) in sheet.labels.iter().enumerate() {
            let id = conn.net_by_point[&label.at];
            conn.nets[id].labels.push(li);
        }
        for (pi, power) in sheet.power_symbols.iter().enumerate() {
            let id = conn.net_by_point[&power.at];
            conn.nets[id].power.push(pi);
        }

        log::trace!(
            "sheet '{}': {} points, {} local nets",
            sheet.name,
            conn.net_by_point.len(),
            conn.nets.len()
        );
        conn
    }
}

/// Whether `p` lies on the closed segment of `wire` (collinear and within
/// its bounding box). Endpoints count, but an endpoint is the same graph
/// node as the junction anyway.
fn on_segment(p: Point, wire: &Wire) -> bool {
    let (a, b) = (wire.a, wire.b);
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross != 0 {
        return false;
    }
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sch_core::{Junction, Label, LabelKind};

    fn wire(ax: i64, ay: i64, bx: i64, by: i64) -> Wire {
        Wire {
            a: Point::new(ax, ay),
            b: Point::new(bx, by),
        }
    }

    fn sheet_with(wires: Vec<Wire>, junctions: Vec<Junction>) -> SheetDoc {
        SheetDoc {
            name: "t".into(),
            wires,
            junctions,
            ..SheetDoc::default()
        }
    }

    #[test]
    fn shared_endpoints_merge() {
        let sheet = sheet_with(vec![wire(0, 0, 10, 0), wire(10, 0, 10, 10)], Vec::new());
        let conn = SheetConnectivity::build(&sheet);
        assert_eq!(conn.nets.len(), 1);
        assert_eq!(
            conn.net_at(Point::new(0, 0)),
            conn.net_at(Point::new(10, 10))
        );
    }

    #[test]
    fn crossing_without_junction_stays_distinct() {
        // Two wires crossing at (5, 0) / (5, x): no junction, no shared
        // endpoint, so they must remain separate nets.
        let sheet = sheet_with(vec![wire(0, 0, 10, 0), wire(5, -5, 5, 5)], Vec::new());
        let conn = SheetConnectivity::build(&sheet);
        assert_eq!(conn.nets.len(), 2);
        assert_ne!(conn.net_at(Point::new(0, 0)), conn.net_at(Point::new(5, 5)));
    }

    #[test]
    fn junction_merges_crossing_wires() {
        let sheet = sheet_with(
            vec![wire(0, 0, 10, 0), wire(5, -5, 5, 5)],
            vec![Junction {
                at: Point::new(5, 0),
            }],
        );
        let conn = SheetConnectivity::build(&sheet);
        assert_eq!(conn.nets.len(), 1);
    }

    #[test]
    fn junction_ties_wire_terminating_mid_segment() {
        // Vertical wire ends on the middle of a horizontal one; only the
        // junction makes that an electrical merge.
        // (5,0) is an endpoint of the vertical wire but interior to the
        // horizontal one, so without a junction the nets stay apart.
        let without = sheet_with(vec![wire(0, 0, 10, 0), wire(5, 5, 5, 0)], Vec::new());
        let conn = SheetConnectivity::build(&without);
        assert_ne!(conn.net_at(Point::new(0, 0)), conn.net_at(Point::new(5, 5)));

        let with = sheet_with(
            vec![wire(0, 0, 10, 0), wire(5, 5, 5, 0)],
            vec![Junction {
                at: Point::new(5, 0),
            }],
        );
        let conn = SheetConnectivity::build(&with);
        assert_eq!(conn.net_at(Point::new(0, 0)), conn.net_at(Point::new(5, 5)));
    }

    #[test]
    fn coordinate_merge_is_order_independent() {
        let mut forward = sheet_with(vec![wire(0, 0, 5, 0), wire(5, 0, 9, 0)], Vec::new());
        forward.labels.push(Label {
            text: "A".into(),
            kind: LabelKind::Local,
            at: Point::new(5, 0),
        });
        let mut reversed = sheet_with(vec![wire(5, 0, 9, 0), wire(0, 0, 5, 0)], Vec::new());
        reversed.labels.push(Label {
            text: "A".into(),
            kind: LabelKind::Local,
            at: Point::new(5, 0),
        });

        let a = SheetConnectivity::build(&forward);
        let b = SheetConnectivity::build(&reversed);
        assert_eq!(a.nets.len(), b.nets.len());
        assert_eq!(a.net_at(Point::new(0, 0)), b.net_at(Point::new(0, 0)));
        assert_eq!(a.nets[0].points, b.nets[0].points);
    }

    #[test]
    fn attachments_land_on_their_nets() {
        use sch_core::{Component, Pin, PinType, PowerSymbol, Unit};
        let mut sheet = sheet_with(vec![wire(0, 0, 10, 0)], Vec::new());
        sheet.components.push(Component {
            reference: "R1".into(),
            value: "10k".into(),
            footprint: None,
            units: vec![Unit {
                number: 1,
                at: Point::new(0, 0),
                pins: vec![Pin {
                    number: "1".into(),
                    at: Point::new(0, 0),
                    pin_type: PinType::Passive,
                }],
            }],
        });
        sheet.power_symbols.push(PowerSymbol {
            net: "GND".into(),
            at: Point::new(10, 0),
        });

        let conn = SheetConnectivity::build(&sheet);
        assert_eq!(conn.nets.len(), 1);
        assert_eq!(conn.nets[0].pins.len(), 1);
        assert_eq!(conn.nets[0].power, vec![0]);
    }
}
