//! End-to-end resolution over persisted sheet documents.

use sch_core::load_design;
use sch_netlist::{
    resolve, CancelToken, DiagCode, FatalError, ResolveOptions, Severity,
};

fn design(root: &str, docs: &[(&str, &str)]) -> sch_core::Design {
    let docs: Vec<(String, String)> = docs
        .iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();
    load_design(root, &docs).unwrap()
}

#[test]
fn global_label_renames_net_through_sheet_pin() {
    // Inside "phy" a hierarchical label RXD0 reaches U1 pin 3; the parent
    // binds that pin to a wire carrying global label ETH_RX0. The global
    // name wins and the pin lands on ETH_RX0.
    let d = design(
        "top",
        &[
            (
                "top.sch",
                r#"(sheet "top"
                     (global_label "ETH_RX0" (at 0 0))
                     (wire (xy 0 0) (xy 60 50))
                     (instance "phy1" (sheet "phy") (at 50 50)
                       (bind "RXD0" (at 60 50))))"#,
            ),
            (
                "phy.sch",
                r#"(sheet "phy"
                     (sheet_pin "RXD0" (side left) (direction input))
                     (hier_label "RXD0" (at 0 10))
                     (wire (xy 0 10) (xy 96 54))
                     (symbol (ref "U1") (value "KSZ8081")
                       (unit 1 (at 100 50)
                         (pin "3" (at 96 54) (type input)))))"#,
            ),
        ],
    );
    let res = resolve(&d, &ResolveOptions::default()).unwrap();
    assert!(res.diagnostics.is_empty(), "{:?}", res.diagnostics);

    let members = res.netlist.net("ETH_RX0").expect("ETH_RX0 net");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].reference, "U1");
    assert_eq!(members[0].pin, "3");
    // The hierarchical name must not surface as a separate net.
    assert!(res.netlist.net("/phy1/RXD0").is_none());
}

#[test]
fn wired_power_rails_conflict_instead_of_silently_merging() {
    let d = design(
        "top",
        &[(
            "top.sch",
            r#"(sheet "top"
                 (power "3V3" (at 0 0))
                 (power "GND" (at 10 0))
                 (wire (xy 0 0) (xy 10 0))
                 (label "AUX" (at 0 20)))"#,
        )],
    );
    let res = resolve(&d, &ResolveOptions::default()).unwrap();
    assert!(res.has_errors());
    let conflict = res
        .diagnostics
        .iter()
        .find(|diag| diag.code == DiagCode::NetNameConflict)
        .expect("net-name-conflict diagnostic");
    assert!(conflict.message.contains("3V3"));
    assert!(conflict.message.contains("GND"));

    // First-seen rail names the node; resolution of the rest continues.
    assert!(res.netlist.net("3V3").is_some());
    assert!(res.netlist.net("GND").is_none());
    assert!(res.netlist.net("/AUX").is_some());
}

#[test]
fn placeholders_resolve_per_path_and_local_labels_stay_scoped() {
    let d = design(
        "top",
        &[
            (
                "top.sch",
                r#"(sheet "top"
                     (instance "A" (sheet "amp") (at 0 0))
                     (instance "B" (sheet "amp") (at 50 0)))"#,
            ),
            (
                "amp.sch",
                r#"(sheet "amp"
                     (label "OUT" (at 5 0))
                     (wire (xy 0 0) (xy 5 0))
                     (symbol (ref "IC?") (value "opamp")
                       (unit 1 (at 0 0)
                         (pin "1" (at 0 0) (type output))))
                     (ref_alt (placeholder "IC?") (path "/A") (ref "IC101"))
                     (ref_alt (placeholder "IC?") (path "/B") (ref "IC102")))"#,
            ),
        ],
    );
    let res = resolve(&d, &ResolveOptions::default()).unwrap();
    assert!(res.diagnostics.is_empty(), "{:?}", res.diagnostics);

    // Same local label text in two instances yields two distinct nets,
    // each with its path-resolved reference.
    let a = res.netlist.net("/A/OUT").expect("/A/OUT net");
    let b = res.netlist.net("/B/OUT").expect("/B/OUT net");
    assert_eq!(a[0].reference, "IC101");
    assert_eq!(b[0].reference, "IC102");
}

#[test]
fn global_labels_merge_across_unwired_sheets() {
    let d = design(
        "top",
        &[
            (
                "top.sch",
                r#"(sheet "top"
                     (instance "osc" (sheet "osc") (at 0 0))
                     (instance "cpu" (sheet "cpu") (at 50 0)))"#,
            ),
            (
                "osc.sch",
                r#"(sheet "osc"
                     (global_label "CLK" (at 5 0))
                     (wire (xy 0 0) (xy 5 0))
                     (symbol (ref "X1") (value "25MHz")
                       (unit 1 (at 0 0)
                         (pin "1" (at 0 0) (type output)))))"#,
            ),
            (
                "cpu.sch",
                r#"(sheet "cpu"
                     (global_label "CLK" (at 5 0))
                     (wire (xy 0 0) (xy 5 0))
                     (symbol (ref "U2") (value "mcu")
                       (unit 1 (at 0 0)
                         (pin "7" (at 0 0) (type input)))))"#,
            ),
        ],
    );
    let res = resolve(&d, &ResolveOptions::default()).unwrap();
    assert!(res.diagnostics.is_empty(), "{:?}", res.diagnostics);

    let clk = res.netlist.net("CLK").expect("CLK net");
    let rendered: Vec<String> = clk.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["U2.7", "X1.1"]);
}

#[test]
fn lone_pin_warns_unless_marked_no_connect() {
    let marked = design(
        "top",
        &[(
            "top.sch",
            r#"(sheet "top"
                 (symbol (ref "U1") (value "mcu")
                   (unit 1 (at 0 0)
                     (pin "3" (at 0 0) (type input))
                     (pin "4" (at 0 4) (type input))))
                 (no_connect (at 0 4)))"#,
        )],
    );
    let res = resolve(&marked, &ResolveOptions::default()).unwrap();
    let floating: Vec<_> = res
        .diagnostics
        .iter()
        .filter(|diag| diag.code == DiagCode::FloatingPin)
        .collect();
    assert_eq!(floating.len(), 1);
    assert_eq!(floating[0].severity, Severity::Warning);
    assert_eq!(floating[0].location.reference.as_deref(), Some("U1 pin 3"));
}

#[test]
fn two_outputs_on_one_net_are_a_direction_conflict() {
    let d = design(
        "top",
        &[(
            "top.sch",
            r#"(sheet "top"
                 (wire (xy 0 0) (xy 10 0))
                 (symbol (ref "U1") (value "buf")
                   (unit 1 (at 0 0)
                     (pin "1" (at 0 0) (type output))))
                 (symbol (ref "U2") (value "buf")
                   (unit 1 (at 10 0)
                     (pin "1" (at 10 0) (type output)))))"#,
        )],
    );
    let res = resolve(&d, &ResolveOptions::default()).unwrap();
    let conflict = res
        .diagnostics
        .iter()
        .find(|diag| diag.code == DiagCode::DirectionConflict)
        .expect("direction-conflict diagnostic");
    assert!(conflict.message.contains("U1 pin 1"));
    assert!(conflict.message.contains("U2 pin 1"));
}

#[test]
fn unresolved_hier_label_severity_is_configurable() {
    let d = design(
        "top",
        &[(
            "top.sch",
            r#"(sheet "top"
                 (hier_label "SPARE" (at 0 0)))"#,
        )],
    );
    let strict = resolve(&d, &ResolveOptions::default()).unwrap();
    assert!(strict.has_errors());

    let lax = resolve(
        &d,
        &ResolveOptions {
            unresolved_hier_label: Severity::Warning,
            ..ResolveOptions::default()
        },
    )
    .unwrap();
    assert!(!lax.has_errors());
    assert!(lax
        .diagnostics
        .iter()
        .any(|diag| diag.code == DiagCode::UnresolvedHierLabel));
}

#[test]
fn resolution_is_deterministic() {
    let docs = [
        (
            "top.sch",
            r#"(sheet "top"
                 (power "GND" (at 0 0))
                 (wire (xy 0 0) (xy 20 0))
                 (instance "A" (sheet "amp") (at 0 0))
                 (instance "B" (sheet "amp") (at 50 0)))"#,
        ),
        (
            "amp.sch",
            r#"(sheet "amp"
                 (label "OUT" (at 5 0))
                 (wire (xy 0 0) (xy 5 0))
                 (symbol (ref "IC?") (value "opamp")
                   (unit 1 (at 0 0)
                     (pin "1" (at 0 0) (type output))))
                 (ref_alt (placeholder "IC?") (path "/A") (ref "IC101"))
                 (ref_alt (placeholder "IC?") (path "/B") (ref "IC102")))"#,
        ),
    ];
    let first = resolve(&design("top", &docs), &ResolveOptions::default()).unwrap();
    let second = resolve(&design("top", &docs), &ResolveOptions::default()).unwrap();
    assert_eq!(
        first.netlist.to_json().unwrap(),
        second.netlist.to_json().unwrap()
    );
    let render = |diags: &[sch_netlist::Diagnostic]| -> Vec<String> {
        diags.iter().map(ToString::to_string).collect()
    };
    assert_eq!(render(&first.diagnostics), render(&second.diagnostics));
}

#[test]
fn canceled_run_yields_no_netlist() {
    let d = design("top", &[("top.sch", r#"(sheet "top")"#)]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = resolve(
        &d,
        &ResolveOptions {
            cancel: Some(cancel),
            ..ResolveOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, FatalError::Canceled { .. }));
}
