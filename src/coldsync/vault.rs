use crate::coldsync::config::VaultNames;
use crate::error::NamingError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    Movies,
    TvShows,
}

impl VaultKind {
    pub fn vault_name(self, names: &VaultNames) -> &str {
        match self {
            Self::Movies => &names.movies,
            Self::TvShows => &names.tv_shows,
        }
    }
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// `<title> (<digits>)`; the title may be empty but the space is required.
fn is_movie_stem(stem: &str) -> bool {
    let Some(open) = stem.rfind(" (") else {
        return false;
    };
    let Some(inner) = stem[open + 2..].strip_suffix(')') else {
        return false;
    };
    all_digits(inner)
}

/// `<title> - Season <digits>` or `<title> - Specials`.
fn is_tv_stem(stem: &str) -> bool {
    if stem.ends_with(" - Specials") {
        return true;
    }
    let Some(pos) = stem.rfind(" - Season ") else {
        return false;
    };
    all_digits(&stem[pos + " - Season ".len()..])
}

/// Route an archive file name to a vault by its shape.
pub fn decide_vault(file_name: &str) -> Result<VaultKind, NamingError> {
    let Some((stem, _ext)) = file_name.rsplit_once('.') else {
        return Err(NamingError::MissingExtension(file_name.to_string()));
    };
    if is_movie_stem(stem) {
        return Ok(VaultKind::Movies);
    }
    if is_tv_stem(stem) {
        return Ok(VaultKind::TvShows);
    }
    Err(NamingError::Unmatched(stem.to_string()))
}
