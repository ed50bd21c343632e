use std::collections::BTreeMap;

/// Canonical archive name → size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: BTreeMap<String, u64>,
    overwritten: usize,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later records for the same name replace earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, size_bytes: u64) {
        if self.entries.insert(name.into(), size_bytes).is_some() {
            self.overwritten += 1;
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Number of records that replaced an earlier record with the same name.
    pub fn overwritten(&self) -> usize {
        self.overwritten
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut out = Inventory::new();
        for (name, size) in iter {
            out.insert(name, size);
        }
        out
    }
}
