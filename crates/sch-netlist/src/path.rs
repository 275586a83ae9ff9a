//! Hierarchical sheet paths.

use std::fmt;

use serde::{Serialize, Serializer};

/// Sequence of instance names from the root sheet down to one sheet
/// instance. The root is the empty path, rendered `/`; nested instances
/// render `/phy1/mac`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SheetPath {
    segments: Vec<String>,
}

impl SheetPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path of a child instance placed inside this sheet.
    pub fn join(&self, instance: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(instance.to_string());
        Self { segments }
    }

    /// Parse a rendered path (`/`, `/a`, `/a/b`). Empty segments are
    /// dropped, so trailing slashes are tolerated.
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s
                .split('/')
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl fmt::Display for SheetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for SheetPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
