use crate::coldsync::inventory::Inventory;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

impl Severity {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MissingRemote {
        name: String,
    },
    SizeMismatch {
        name: String,
        local_bytes: u64,
        remote_bytes: u64,
        tolerance_bytes: u64,
    },
    MissingLocal {
        name: String,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingRemote { .. } => Severity::Error,
            Self::SizeMismatch { .. } | Self::MissingLocal { .. } => Severity::Warn,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::MissingRemote { name }
            | Self::SizeMismatch { name, .. }
            | Self::MissingLocal { name } => name,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.severity().tag();
        match self {
            Self::MissingRemote { name } => write!(f, "{tag} {name} is missing from remote"),
            Self::SizeMismatch {
                name,
                local_bytes,
                remote_bytes,
                tolerance_bytes,
            } => write!(
                f,
                "{tag} {name} size difference is greater than {tolerance_bytes} bytes (local={local_bytes} remote={remote_bytes})"
            ),
            Self::MissingLocal { name } => {
                write!(f, "{tag} {name} is in remote but missing from local")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileRules {
    pub tolerance_bytes: u64,
    pub report_missing_local: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub missing_remote: usize,
    pub size_mismatch: usize,
    pub missing_local: usize,
}

impl ReconcileSummary {
    pub fn from_diagnostics(local: &Inventory, diagnostics: &[Diagnostic]) -> Self {
        let mut out = Self::default();
        for diag in diagnostics {
            match diag {
                Diagnostic::MissingRemote { .. } => out.missing_remote += 1,
                Diagnostic::SizeMismatch { .. } => out.size_mismatch += 1,
                Diagnostic::MissingLocal { .. } => out.missing_local += 1,
            }
        }
        out.matched = local
            .len()
            .saturating_sub(out.missing_remote + out.size_mismatch);
        out
    }

    pub fn has_errors(&self) -> bool {
        self.missing_remote > 0
    }
}

/// Compare `local` against `remote`. An empty result means every local
/// archive is present remotely within tolerance.
pub fn reconcile(local: &Inventory, remote: &Inventory, rules: ReconcileRules) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for (name, local_bytes) in local.iter() {
        let Some(remote_bytes) = remote.get(name) else {
            out.push(Diagnostic::MissingRemote {
                name: name.to_string(),
            });
            continue;
        };
        if local_bytes.abs_diff(remote_bytes) > rules.tolerance_bytes {
            out.push(Diagnostic::SizeMismatch {
                name: name.to_string(),
                local_bytes,
                remote_bytes,
                tolerance_bytes: rules.tolerance_bytes,
            });
        }
    }

    if rules.report_missing_local {
        for (name, _) in remote.iter() {
            if !local.contains(name) {
                out.push(Diagnostic::MissingLocal {
                    name: name.to_string(),
                });
            }
        }
    }

    out
}
