//! Primitive records of a schematic document.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Integer point in sheet-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Electrical type of a component pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Input,
    Output,
    Bidirectional,
    Power,
    Passive,
}

impl FromStr for PinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(PinType::Input),
            "output" => Ok(PinType::Output),
            "bidirectional" => Ok(PinType::Bidirectional),
            "power" => Ok(PinType::Power),
            "passive" => Ok(PinType::Passive),
            _ => Err(format!("unknown pin type '{s}'")),
        }
    }
}

/// A pin owned by a component unit, placed at a sheet-local point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub number: String,
    pub at: Point,
    pub pin_type: PinType,
}

/// One unit of a component (a multi-unit part places each unit separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub number: u32,
    pub at: Point,
    pub pins: Vec<Pin>,
}

/// A placed component. The reference may be a placeholder (trailing `?`)
/// that the reference resolver maps to a final designator per hierarchy
/// path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub reference: String,
    pub value: String,
    pub footprint: Option<String>,
    pub units: Vec<Unit>,
}

impl Component {
    /// Placeholder references end in `?` (e.g. `IC?`).
    pub fn is_placeholder(&self) -> bool {
        self.reference.ends_with('?')
    }
}

/// A wire segment between two points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Wire {
    pub a: Point,
    pub b: Point,
}

/// Explicit electrical merge marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Junction {
    pub at: Point,
}

/// Scope of a text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    /// Names a net within its own sheet only.
    Local,
    /// Names a net design-wide; same-named nets merge across sheets.
    Global,
    /// Names a net within a sheet and its parent via a matching sheet pin.
    Hierarchical,
}

/// A net-name hint attached to a point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    pub kind: LabelKind,
    pub at: Point,
}

/// Implicit net-naming anchor (supply or ground rail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSymbol {
    pub net: String,
    pub at: Point,
}

/// Suppresses the floating-pin diagnostic for the pin at this point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoConnect {
    pub at: Point,
}

/// Which edge of the sheet symbol an exposed pin sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl FromStr for PinSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(PinSide::Left),
            "right" => Ok(PinSide::Right),
            "top" => Ok(PinSide::Top),
            "bottom" => Ok(PinSide::Bottom),
            _ => Err(format!("unknown pin side '{s}'")),
        }
    }
}

/// Direction of an exposed sheet pin as seen from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    Bidirectional,
    Passive,
}

impl FromStr for PortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(PortDirection::Input),
            "output" => Ok(PortDirection::Output),
            "bidirectional" => Ok(PortDirection::Bidirectional),
            "passive" => Ok(PortDirection::Passive),
            _ => Err(format!("unknown port direction '{s}'")),
        }
    }
}

/// An exposed pin of a sheet definition. The attachment point inside the
/// sheet is the hierarchical label carrying the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetPin {
    pub name: String,
    pub side: PinSide,
    pub direction: PortDirection,
}

/// Binding of one exposed pin of an instantiated sheet to a point on the
/// parent canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinBinding {
    pub pin: String,
    pub at: Point,
}

/// A placement of a sheet inside a parent sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInstance {
    pub name: String,
    pub sheet: String,
    pub at: Point,
    pub bindings: Vec<PinBinding>,
}

/// Recorded alternate for a placeholder reference at one concrete
/// instantiation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefAlternate {
    pub placeholder: String,
    pub path: String,
    pub reference: String,
}

/// One sheet of the design, as loaded from a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetDoc {
    pub name: String,
    pub components: Vec<Component>,
    pub wires: Vec<Wire>,
    pub junctions: Vec<Junction>,
    pub labels: Vec<Label>,
    pub power_symbols: Vec<PowerSymbol>,
    pub no_connects: Vec<NoConnect>,
    pub pins: Vec<SheetPin>,
    pub instances: Vec<SheetInstance>,
}

impl SheetDoc {
    /// The exposed pin with the given name, if the sheet declares one.
    pub fn sheet_pin(&self, name: &str) -> Option<&SheetPin> {
        self.pins.iter().find(|pin| pin.name == name)
    }
}

/// A complete multi-sheet design: an immutable snapshot of loaded
/// primitives, keyed by sheet name, plus the design-wide reference
/// annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub root: String,
    pub sheets: BTreeMap<String, SheetDoc>,
    pub ref_map: Vec<RefAlternate>,
}

impl Design {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            sheets: BTreeMap::new(),
            ref_map: Vec::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: SheetDoc) -> &mut Self {
        self.sheets.insert(sheet.name.clone(), sheet);
        self
    }

    pub fn root_sheet(&self) -> Option<&SheetDoc> {
        self.sheets.get(&self.root)
    }
}
