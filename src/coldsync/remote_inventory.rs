use crate::coldsync::inventory::Inventory;
use crate::coldsync::names::normalize_remote;
use crate::error::InventoryError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Subset of a vault inventory-retrieval job output.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultInventory {
    #[serde(rename = "VaultARN", default)]
    pub vault_arn: Option<String>,
    #[serde(rename = "InventoryDate", default)]
    pub inventory_date: Option<String>,
    #[serde(rename = "ArchiveList")]
    pub archive_list: Vec<RemoteArchive>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteArchive {
    #[serde(rename = "ArchiveDescription")]
    pub archive_description: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

impl VaultInventory {
    pub fn to_inventory(&self) -> Inventory {
        self.archive_list
            .iter()
            .map(|archive| (normalize_remote(&archive.archive_description), archive.size))
            .collect()
    }
}

pub fn parse_vault_inventory(source: &str, raw: &str) -> Result<VaultInventory, InventoryError> {
    serde_json::from_str(raw).map_err(|source_err| InventoryError::RemoteStructure {
        path: source.to_string(),
        source: source_err,
    })
}

pub fn load_vault_inventory(path: &Path) -> Result<VaultInventory> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = parse_vault_inventory(&path.display().to_string(), &raw)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_remote_inventory(source: &str, raw: &str) -> Result<Inventory, InventoryError> {
        Ok(parse_vault_inventory(source, raw)?.to_inventory())
    }

    #[test]
    fn parses_archive_list_with_canonical_names() {
        let raw = r#"{"ArchiveList": [
            {"ArchiveDescription": "Glacier backup of Show - Season 1.zip", "Size": 2097200}
        ]}"#;
        let inv = parse_remote_inventory("inv.json", raw).expect("parse");
        assert_eq!(inv.get("Show - Season 1"), Some(2_097_200));
    }

    #[test]
    fn ignores_extra_glacier_fields() {
        let raw = r#"{
            "VaultARN": "arn:aws:glacier:eu-west-1:000000000000:vaults/Movies",
            "InventoryDate": "2020-08-22T21:19:46Z",
            "ArchiveList": [{
                "ArchiveId": "abc",
                "ArchiveDescription": "Glacier backup of Heat (1995).zip",
                "CreationDate": "2020-08-01T10:00:00Z",
                "Size": 42,
                "SHA256TreeHash": "00"
            }]
        }"#;
        let parsed = parse_vault_inventory("inv.json", raw).expect("parse");
        assert!(parsed.vault_arn.is_some());
        assert_eq!(parsed.inventory_date.as_deref(), Some("2020-08-22T21:19:46Z"));
        assert_eq!(parsed.to_inventory().get("Heat (1995)"), Some(42));
    }

    #[test]
    fn missing_archive_list_is_structural_error() {
        let err = parse_remote_inventory("inv.json", r#"{"Archives": []}"#).unwrap_err();
        assert!(matches!(err, InventoryError::RemoteStructure { .. }));
        assert!(err.to_string().contains("ArchiveList"));
    }

    #[test]
    fn missing_entry_fields_are_structural_errors() {
        let no_size = r#"{"ArchiveList": [{"ArchiveDescription": "x"}]}"#;
        let err = parse_remote_inventory("inv.json", no_size).unwrap_err();
        assert!(err.to_string().contains("Size"));

        let no_description = r#"{"ArchiveList": [{"Size": 1}]}"#;
        let err = parse_remote_inventory("inv.json", no_description).unwrap_err();
        assert!(err.to_string().contains("ArchiveDescription"));
    }

    #[test]
    fn negative_size_is_rejected() {
        let raw = r#"{"ArchiveList": [{"ArchiveDescription": "x", "Size": -1}]}"#;
        assert!(parse_remote_inventory("inv.json", raw).is_err());
    }

    #[test]
    fn empty_archive_list_is_valid() {
        let inv = parse_remote_inventory("inv.json", r#"{"ArchiveList": []}"#).expect("parse");
        assert!(inv.is_empty());
    }
}
