//! Demand-site escalation level.

use std::fmt;

/// Priority of a demand site, derived by the host from load and flags.
///
/// Ordered so that `Critical > Warning > None`; the closest-target heuristic
/// compares priorities directly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Priority {
    #[default]
    None,
    Warning,
    Critical,
}

impl Priority {
    /// `true` for `Warning` and `Critical`.
    #[inline]
    pub fn is_escalated(self) -> bool {
        self >= Priority::Warning
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::None     => "none",
            Priority::Warning  => "warning",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
