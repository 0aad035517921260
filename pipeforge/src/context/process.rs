//! Process kinds a pipeline can be assembled for.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of process a run executes.
///
/// Closed set: adding a kind means adding a variant here and a resolver in
/// [`crate::assembler::resolver_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    /// The primary multi-stage pipeline (raw data to experiment).
    #[serde(rename = "gem2s")]
    Primary,
    /// The per-sample quality-control pipeline.
    #[serde(rename = "qc")]
    QualityControl,
    /// The data-subset pipeline.
    #[serde(rename = "subset")]
    Subset,
}

impl ProcessKind {
    /// All process kinds.
    pub const ALL: [Self; 3] = [Self::Primary, Self::QualityControl, Self::Subset];

    /// Returns the process name forwarded to workers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "gem2s",
            Self::QualityControl => "qc",
            Self::Subset => "subset",
        }
    }

    /// Parses a process name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
