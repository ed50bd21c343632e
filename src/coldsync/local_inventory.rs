use crate::coldsync::inventory::Inventory;
use crate::coldsync::names::{LocalNameRules, normalize_local};
use crate::error::InventoryError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const BYTES_PER_KILOBYTE: u64 = 1024;

/// Parse one `<kilobytes> <name>` line. `Ok(None)` for blank lines.
fn parse_line(
    source: &str,
    line_no: usize,
    line: &str,
    rules: LocalNameRules,
) -> Result<Option<(String, u64)>, InventoryError> {
    let trimmed = line.trim_start();
    if trimmed.trim_end().is_empty() {
        return Ok(None);
    }

    let (size_token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((size, rest)) => (size, rest.trim_start()),
        None => (trimmed.trim_end(), ""),
    };

    let kilobytes = size_token
        .parse::<u64>()
        .map_err(|_| InventoryError::InvalidSize {
            path: source.to_string(),
            line: line_no,
            token: size_token.to_string(),
        })?;
    let size_bytes =
        kilobytes
            .checked_mul(BYTES_PER_KILOBYTE)
            .ok_or_else(|| InventoryError::SizeOverflow {
                path: source.to_string(),
                line: line_no,
                kilobytes,
            })?;

    let name = normalize_local(rest, rules);
    if name.is_empty() {
        return Err(InventoryError::MissingName {
            path: source.to_string(),
            line: line_no,
        });
    }

    Ok(Some((name, size_bytes)))
}

/// Parse a listing already held in memory. `source` only labels errors.
pub fn parse_local_inventory(
    source: &str,
    raw: &str,
    rules: LocalNameRules,
) -> Result<Inventory, InventoryError> {
    let mut out = Inventory::new();
    for (idx, line) in raw.lines().enumerate() {
        if let Some((name, size)) = parse_line(source, idx + 1, line, rules)? {
            out.insert(name, size);
        }
    }
    Ok(out)
}

pub fn load_local_inventory(path: &Path, rules: LocalNameRules) -> Result<Inventory> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let inventory = parse_local_inventory(&path.display().to_string(), &raw, rules)?;
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> LocalNameRules {
        LocalNameRules::default()
    }

    #[test]
    fn parses_season_listing_into_bytes() {
        let inv = parse_local_inventory("list.txt", "2048 ./Show - Season 1\n", rules())
            .expect("parse");
        assert_eq!(inv.get("Show - Season 1"), Some(2_097_152));
    }

    #[test]
    fn accepts_tab_separated_du_output() {
        let raw = "4\t./Heat (1995)\n1024\t./$Cash$ - Specials\n";
        let inv = parse_local_inventory("du.txt", raw, rules()).expect("parse");
        assert_eq!(inv.get("Heat (1995)"), Some(4096));
        assert_eq!(inv.get("Cash - Specials"), Some(1_048_576));
    }

    #[test]
    fn keeps_inner_whitespace_of_names() {
        let inv =
            parse_local_inventory("l", "  12   ./A  B (2000)  \r\n", rules()).expect("parse");
        assert_eq!(inv.get("A  B (2000)"), Some(12 * 1024));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let inv = parse_local_inventory("l", "\n1 ./a\n   \n2 ./b\n", rules()).expect("parse");
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn rejects_non_numeric_size_with_line_number() {
        let err = parse_local_inventory("l", "1 ./a\n1.5K ./b\n", rules()).unwrap_err();
        match err {
            InventoryError::InvalidSize { line, token, .. } => {
                assert_eq!(line, 2);
                assert_eq!(token, "1.5K");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_negative_size() {
        let err = parse_local_inventory("l", "-4 ./a\n", rules()).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSize { line: 1, .. }));
    }

    #[test]
    fn rejects_line_without_name() {
        let err = parse_local_inventory("l", "2048\n", rules()).unwrap_err();
        assert!(matches!(err, InventoryError::MissingName { line: 1, .. }));

        let err = parse_local_inventory("l", "2048 ./\n", rules()).unwrap_err();
        assert!(matches!(err, InventoryError::MissingName { line: 1, .. }));
    }

    #[test]
    fn rejects_overflowing_size() {
        let raw = format!("{} ./huge\n", u64::MAX);
        let err = parse_local_inventory("l", &raw, rules()).unwrap_err();
        assert!(matches!(err, InventoryError::SizeOverflow { .. }));
    }

    #[test]
    fn later_duplicates_win() {
        let inv = parse_local_inventory("l", "1 ./a\n2 a\n", rules()).expect("parse");
        assert_eq!(inv.get("a"), Some(2048));
        assert_eq!(inv.overwritten(), 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = load_local_inventory(&tmp.path().join("nope.txt"), rules()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }
}
