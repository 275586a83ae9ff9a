//! Loader from persisted S-expression documents to primitive records.
//!
//! Each document holds exactly one `(sheet "<name>" ...)` form. Reference
//! annotations (`ref_alt` records) may appear in any sheet and are
//! collected design-wide. Structurally invalid input fails with a
//! [`LoadError`] naming the document and byte offset; loading is batch
//! and fatal on the first such failure.

use rayon::prelude::*;
use sch_sexpr::{ParseError, Sexpr, Span};
use thiserror::Error;

use crate::model::*;

/// A structural failure while loading a document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: ParseError,
    },
    #[error("{document}: byte {offset}: {message}")]
    Invalid {
        document: String,
        offset: usize,
        message: String,
    },
    #[error("duplicate sheet '{name}'")]
    DuplicateSheet { name: String },
    #[error("root sheet '{root}' not found in loaded documents")]
    MissingRoot { root: String },
}

impl LoadError {
    fn invalid(document: &str, span: Span, message: impl Into<String>) -> Self {
        LoadError::Invalid {
            document: document.to_string(),
            offset: span.start,
            message: message.into(),
        }
    }
}

/// Parse one sheet document, returning the sheet plus any reference
/// annotations it carries.
pub fn parse_sheet(document: &str, text: &str) -> Result<(SheetDoc, Vec<RefAlternate>), LoadError> {
    let forms = sch_sexpr::parse_all(text).map_err(|source| LoadError::Parse {
        document: document.to_string(),
        source,
    })?;

    let [form] = forms.as_slice() else {
        return Err(LoadError::invalid(
            document,
            Span::default(),
            format!("expected exactly one (sheet ...) form, found {}", forms.len()),
        ));
    };
    if form.tag() != Some("sheet") {
        return Err(LoadError::invalid(document, form.span, "expected (sheet ...)"));
    }
    let items = form.as_list().unwrap_or_default();
    let name = items
        .get(1)
        .and_then(Sexpr::as_str)
        .ok_or_else(|| LoadError::invalid(document, form.span, "sheet is missing its name"))?;

    let mut sheet = SheetDoc {
        name: name.to_string(),
        ..SheetDoc::default()
    };
    let mut ref_map = Vec::new();

    for child in &items[2..] {
        match child.tag() {
            Some("symbol") => sheet.components.push(read_component(document, child)?),
            Some("wire") => sheet.wires.push(read_wire(document, child)?),
            Some("junction") => sheet.junctions.push(Junction {
                at: req_point(document, child, "at")?,
            }),
            Some("label") => sheet.labels.push(read_label(document, child, LabelKind::Local)?),
            Some("global_label") => sheet
                .labels
                .push(read_label(document, child, LabelKind::Global)?),
            Some("hier_label") => sheet
                .labels
                .push(read_label(document, child, LabelKind::Hierarchical)?),
            Some("power") => sheet.power_symbols.push(PowerSymbol {
                net: req_name(document, child, "power symbol")?,
                at: req_point(document, child, "at")?,
            }),
            Some("no_connect") => sheet.no_connects.push(NoConnect {
                at: req_point(document, child, "at")?,
            }),
            Some("sheet_pin") => sheet.pins.push(read_sheet_pin(document, child)?),
            Some("instance") => sheet.instances.push(read_instance(document, child)?),
            Some("ref_alt") => ref_map.push(read_ref_alt(document, child)?),
            _ => {
                return Err(LoadError::invalid(
                    document,
                    child.span,
                    "unknown record in sheet",
                ));
            }
        }
    }

    log::debug!(
        "loaded sheet '{}' from {document}: {} components, {} wires, {} instances",
        sheet.name,
        sheet.components.len(),
        sheet.wires.len(),
        sheet.instances.len(),
    );
    Ok((sheet, ref_map))
}

/// Load a complete design from `(document name, text)` pairs. Documents
/// are independent until resolution, so they are parsed in parallel.
pub fn load_design(root: &str, documents: &[(String, String)]) -> Result<Design, LoadError> {
    let parsed: Vec<(SheetDoc, Vec<RefAlternate>)> = documents
        .par_iter()
        .map(|(document, text)| parse_sheet(document, text))
        .collect::<Result<_, _>>()?;

    let mut design = Design::new(root);
    for (sheet, mut ref_map) in parsed {
        if design.sheets.contains_key(&sheet.name) {
            return Err(LoadError::DuplicateSheet { name: sheet.name });
        }
        design.add_sheet(sheet);
        design.ref_map.append(&mut ref_map);
    }
    if !design.sheets.contains_key(root) {
        return Err(LoadError::MissingRoot {
            root: root.to_string(),
        });
    }
    Ok(design)
}

fn req_point(document: &str, node: &Sexpr, tag: &str) -> Result<Point, LoadError> {
    let list = node
        .find_list(tag)
        .ok_or_else(|| LoadError::invalid(document, node.span, format!("missing ({tag} x y)")))?;
    match (list.get(1).and_then(Sexpr::as_int), list.get(2).and_then(Sexpr::as_int)) {
        (Some(x), Some(y)) => Ok(Point::new(x, y)),
        _ => Err(LoadError::invalid(
            document,
            node.span,
            format!("({tag} ...) needs two integer coordinates"),
        )),
    }
}

/// First positional string of a record, e.g. the text of `(label "RXD" ...)`.
fn req_name(document: &str, node: &Sexpr, what: &str) -> Result<String, LoadError> {
    node.as_list()
        .and_then(|items| items.get(1))
        .and_then(Sexpr::as_str)
        .map(str::to_string)
        .ok_or_else(|| LoadError::invalid(document, node.span, format!("{what} is missing its name")))
}

fn req_field(document: &str, node: &Sexpr, tag: &str) -> Result<String, LoadError> {
    node.find_list(tag)
        .and_then(|list| list.get(1))
        .and_then(Sexpr::as_atom)
        .map(str::to_string)
        .ok_or_else(|| LoadError::invalid(document, node.span, format!("missing ({tag} ...)")))
}

fn read_wire(document: &str, node: &Sexpr) -> Result<Wire, LoadError> {
    let points = node.find_all_lists("xy");
    let [a, b] = points.as_slice() else {
        return Err(LoadError::invalid(
            document,
            node.span,
            "wire needs exactly two (xy x y) endpoints",
        ));
    };
    let endpoint = |list: &[Sexpr]| -> Option<Point> {
        Some(Point::new(list.get(1)?.as_int()?, list.get(2)?.as_int()?))
    };
    match (endpoint(a), endpoint(b)) {
        (Some(a), Some(b)) => Ok(Wire { a, b }),
        _ => Err(LoadError::invalid(
            document,
            node.span,
            "wire endpoints need integer coordinates",
        )),
    }
}

fn read_label(document: &str, node: &Sexpr, kind: LabelKind) -> Result<Label, LoadError> {
    Ok(Label {
        text: req_name(document, node, "label")?,
        kind,
        at: req_point(document, node, "at")?,
    })
}

fn read_component(document: &str, node: &Sexpr) -> Result<Component, LoadError> {
    let reference = req_field(document, node, "ref")?;
    let value = req_field(document, node, "value")?;
    let footprint = node
        .find_list("footprint")
        .and_then(|list| list.get(1))
        .and_then(Sexpr::as_str)
        .map(str::to_string);

    let mut units = Vec::new();
    for unit_items in node.find_all_lists("unit") {
        let unit_node = Sexpr::with_span(
            sch_sexpr::SexprKind::List(unit_items.to_vec()),
            node.span,
        );
        let number = unit_items
            .get(1)
            .and_then(Sexpr::as_int)
            .ok_or_else(|| LoadError::invalid(document, node.span, "unit is missing its number"))?;
        let mut pins = Vec::new();
        for pin_items in unit_node.find_all_lists("pin") {
            let pin_node =
                Sexpr::with_span(sch_sexpr::SexprKind::List(pin_items.to_vec()), node.span);
            let pin_type: PinType = req_field(document, &pin_node, "type")?
                .parse()
                .map_err(|msg: String| LoadError::invalid(document, pin_node.span, msg))?;
            pins.push(Pin {
                number: req_name(document, &pin_node, "pin")?,
                at: req_point(document, &pin_node, "at")?,
                pin_type,
            });
        }
        units.push(Unit {
            number: number as u32,
            at: req_point(document, &unit_node, "at")?,
            pins,
        });
    }
    if units.is_empty() {
        return Err(LoadError::invalid(
            document,
            node.span,
            format!("symbol '{reference}' has no units"),
        ));
    }

    Ok(Component {
        reference,
        value,
        footprint,
        units,
    })
}

fn read_sheet_pin(document: &str, node: &Sexpr) -> Result<SheetPin, LoadError> {
    let side: PinSide = req_field(document, node, "side")?
        .parse()
        .map_err(|msg: String| LoadError::invalid(document, node.span, msg))?;
    let direction: PortDirection = req_field(document, node, "direction")?
        .parse()
        .map_err(|msg: String| LoadError::invalid(document, node.span, msg))?;
    Ok(SheetPin {
        name: req_name(document, node, "sheet pin")?,
        side,
        direction,
    })
}

fn read_instance(document: &str, node: &Sexpr) -> Result<SheetInstance, LoadError> {
    let mut bindings = Vec::new();
    for bind_items in node.find_all_lists("bind") {
        let bind_node = Sexpr::with_span(sch_sexpr::SexprKind::List(bind_items.to_vec()), node.span);
        bindings.push(PinBinding {
            pin: req_name(document, &bind_node, "bind")?,
            at: req_point(document, &bind_node, "at")?,
        });
    }
    Ok(SheetInstance {
        name: req_name(document, node, "instance")?,
        sheet: req_field(document, node, "sheet")?,
        at: req_point(document, node, "at")?,
        bindings,
    })
}

fn read_ref_alt(document: &str, node: &Sexpr) -> Result<RefAlternate, LoadError> {
    Ok(RefAlternate {
        placeholder: req_field(document, node, "placeholder")?,
        path: req_field(document, node, "path")?,
        reference: req_field(document, node, "ref")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"
        (sheet "ethernet"
          (symbol (ref "U1") (value "KSZ8081") (footprint "QFN-24")
            (unit 1 (at 100 50)
              (pin "1" (at 96 54) (type input))
              (pin "2" (at 96 58) (type output))))
          (wire (xy 10 10) (xy 96 54))
          (junction (at 10 10))
          (label "RXD" (at 10 10))
          (global_label "ETH_RX0" (at 96 58))
          (hier_label "RXD0" (at 0 10))
          (power "3V3" (at 5 5))
          (no_connect (at 96 58))
          (sheet_pin "RXD0" (side left) (direction input))
          (instance "phy1" (sheet "phy") (at 50 50)
            (bind "RXD0" (at 60 50)))
          (ref_alt (placeholder "IC?") (path "/phy1") (ref "IC101")))
    "#;

    #[test]
    fn parses_every_record_kind() {
        let (sheet, ref_map) = parse_sheet("ethernet.sch", SHEET).unwrap();
        assert_eq!(sheet.name, "ethernet");
        assert_eq!(sheet.components.len(), 1);
        assert_eq!(sheet.components[0].units[0].pins.len(), 2);
        assert_eq!(sheet.components[0].units[0].pins[1].pin_type, PinType::Output);
        assert_eq!(sheet.wires.len(), 1);
        assert_eq!(sheet.junctions[0].at, Point::new(10, 10));
        assert_eq!(sheet.labels.len(), 3);
        assert_eq!(sheet.labels[1].kind, LabelKind::Global);
        assert_eq!(sheet.power_symbols[0].net, "3V3");
        assert_eq!(sheet.pins[0].direction, PortDirection::Input);
        assert_eq!(sheet.instances[0].bindings[0].at, Point::new(60, 50));
        assert_eq!(ref_map.len(), 1);
        assert_eq!(ref_map[0].reference, "IC101");
    }

    #[test]
    fn rejects_unknown_records() {
        let err = parse_sheet("bad.sch", r#"(sheet "x" (blob (at 1 2)))"#).unwrap_err();
        match err {
            LoadError::Invalid { document, message, .. } => {
                assert_eq!(document, "bad.sch");
                assert!(message.contains("unknown record"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_malformed_wire() {
        let err = parse_sheet("w.sch", r#"(sheet "x" (wire (xy 1 2)))"#).unwrap_err();
        assert!(err.to_string().contains("two (xy x y) endpoints"));
    }

    #[test]
    fn parse_failure_names_document_and_offset() {
        let err = parse_sheet("trunc.sch", r#"(sheet "x" (wire (xy 1 2"#).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("trunc.sch:"), "{text}");
    }

    #[test]
    fn load_design_rejects_duplicates_and_missing_root() {
        let a = ("a.sch".to_string(), r#"(sheet "top")"#.to_string());
        let dup = ("b.sch".to_string(), r#"(sheet "top")"#.to_string());
        assert!(matches!(
            load_design("top", &[a.clone(), dup]),
            Err(LoadError::DuplicateSheet { .. })
        ));
        assert!(matches!(
            load_design("main", &[a]),
            Err(LoadError::MissingRoot { .. })
        ));
    }
}
