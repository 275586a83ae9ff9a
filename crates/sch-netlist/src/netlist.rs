//! The flat netlist output: canonical net name to the ordered set of
//! `(component reference, pin number)` pairs it contains.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One pin membership in a net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetNode {
    pub reference: String,
    pub pin: String,
}

impl fmt::Display for NetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.reference, self.pin)
    }
}

/// Flat net map. Net names sort lexicographically; members sort by
/// natural reference order (`R2` before `R10`) then pin number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    pub nets: BTreeMap<String, Vec<NetNode>>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a net exists, even with no members yet.
    pub fn add_net(&mut self, name: impl Into<String>) -> &mut Self {
        self.nets.entry(name.into()).or_default();
        self
    }

    pub fn add_member(
        &mut self,
        net: impl Into<String>,
        reference: impl Into<String>,
        pin: impl Into<String>,
    ) -> &mut Self {
        self.nets.entry(net.into()).or_default().push(NetNode {
            reference: reference.into(),
            pin: pin.into(),
        });
        self
    }

    /// Bring every member list into canonical order.
    pub fn sort_members(&mut self) {
        for members in self.nets.values_mut() {
            members.sort_by(|a, b| {
                natord::compare(&a.reference, &b.reference)
                    .then_with(|| natord::compare(&a.pin, &b.pin))
            });
        }
    }

    /// Members of a net, if it exists.
    pub fn net(&self, name: &str) -> Option<&[NetNode]> {
        self.nets.get(name).map(Vec::as_slice)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, members) in &self.nets {
            writeln!(f, "net \"{name}\"")?;
            for member in members {
                writeln!(f, "  {member}")?;
            }
        }
        Ok(())
    }
}
