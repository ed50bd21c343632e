//! Canonical archive names.
//!
//! Local listings and remote inventories decorate the same archive
//! differently: `du`-style listings carry a `./` prefix and shell sigils,
//! while remote descriptions carry the uploader's description prefix and the
//! archive extension. Both sides are reduced to a bare title so they can be
//! matched.
//!
//! Every normalizer here is idempotent.

pub const DESCRIPTION_PREFIX: &str = "Glacier backup of ";
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Options for normalizing names from a local listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNameRules {
    /// Replace `"` with `-`, matching how archive names were generated.
    pub replace_quotes: bool,
}

impl Default for LocalNameRules {
    fn default() -> Self {
        Self {
            replace_quotes: true,
        }
    }
}

fn strip_repeated<'a>(mut value: &'a str, prefix: &str) -> &'a str {
    while let Some(rest) = value.strip_prefix(prefix) {
        value = rest;
    }
    value
}

fn strip_repeated_suffix<'a>(mut value: &'a str, suffix: &str) -> &'a str {
    while let Some(rest) = value.strip_suffix(suffix) {
        value = rest;
    }
    value
}

/// Canonical name for an entry of a local listing.
///
/// Sigils go first so that removing them can never expose a fresh `./`.
pub fn normalize_local(raw: &str, rules: LocalNameRules) -> String {
    let mut name: String = raw.chars().filter(|c| *c != '$').collect();
    if rules.replace_quotes {
        name = name.replace('"', "-");
    }
    strip_repeated(&name, "./").trim_end().to_string()
}

/// Canonical name for a remote archive description.
pub fn normalize_remote(description: &str) -> String {
    let name = strip_repeated(description, DESCRIPTION_PREFIX);
    strip_repeated_suffix(name, ARCHIVE_SUFFIX).to_string()
}
