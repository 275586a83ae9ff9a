//! Semantic diagnostics accumulated during resolution.
//!
//! Fatal failures (parse errors, hierarchy cycles) are `Err` values and
//! never appear here; everything in this module is attached to the output
//! while resolution of unaffected nets continues.

use std::fmt;

use sch_core::Point;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable machine-readable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagCode {
    FloatingPin,
    NetNameConflict,
    UnresolvedHierLabel,
    SheetPinUnconnected,
    DirectionConflict,
    AmbiguousReference,
    DuplicateReference,
}

impl DiagCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagCode::FloatingPin => "floating-pin",
            DiagCode::NetNameConflict => "net-name-conflict",
            DiagCode::UnresolvedHierLabel => "unresolved-hier-label",
            DiagCode::SheetPinUnconnected => "sheet-pin-unconnected",
            DiagCode::DirectionConflict => "direction-conflict",
            DiagCode::AmbiguousReference => "ambiguous-reference",
            DiagCode::DuplicateReference => "duplicate-reference",
        }
    }
}

/// Where a diagnostic points: a sheet (definition name or instance path),
/// optionally a coordinate and/or a reference string.
#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Location {
    pub fn sheet(sheet: impl fmt::Display) -> Self {
        Self {
            sheet: sheet.to_string(),
            at: None,
            reference: None,
        }
    }

    pub fn at(sheet: impl fmt::Display, at: Point) -> Self {
        Self {
            sheet: sheet.to_string(),
            at: Some(at),
            reference: None,
        }
    }

    pub fn reference(sheet: impl fmt::Display, reference: impl Into<String>) -> Self {
        Self {
            sheet: sheet.to_string(),
            at: None,
            reference: Some(reference.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sheet)?;
        if let Some(at) = self.at {
            write!(f, " {at}")?;
        }
        if let Some(reference) = &self.reference {
            write!(f, " [{reference}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagCode,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}: {}",
            self.severity,
            self.code.as_str(),
            self.location,
            self.message
        )
    }
}

/// Ordered diagnostic accumulator. Emission order is deterministic for a
/// given input, so the report doubles as a regression artifact.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, code: DiagCode, location: Location, message: impl Into<String>) {
        let diag = Diagnostic {
            severity,
            code,
            message: message.into(),
            location,
        };
        log::debug!("{diag}");
        self.items.push(diag);
    }

    pub fn warning(&mut self, code: DiagCode, location: Location, message: impl Into<String>) {
        self.push(Severity::Warning, code, location, message);
    }

    pub fn error(&mut self, code: DiagCode, location: Location, message: impl Into<String>) {
        self.push(Severity::Error, code, location, message);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
