use std::collections::HashMap;

/// Per-id high-water mark, used by `ExportChanges`/`ImportChanges` and
/// by Tangle reconciliation (§4.6, §4.7.3) to describe "what a peer has
/// already seen".
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionVector(HashMap<String, u64>);

impl VersionVector {
    pub fn new() -> Self {
        VersionVector(HashMap::new())
    }

    pub fn get(&self, id: &str) -> Option<u64> {
        self.0.get(id).copied()
    }

    pub fn set(&mut self, id: impl Into<String>, version: u64) {
        let id = id.into();
        let entry = self.0.entry(id).or_insert(version);
        if *entry < version {
            *entry = version;
        }
    }

    /// Whether `version` is strictly newer than what this vector has
    /// recorded for `id` (absent entries count as version `None`, so
    /// every version is "newer").
    pub fn is_newer(&self, id: &str, version: u64) -> bool {
        match self.get(id) {
            Some(known) => version > known,
            None => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_entries_are_always_newer() {
        let vv = VersionVector::new();
        assert!(vv.is_newer("k", 0));
    }

    #[test]
    fn set_only_moves_forward() {
        let mut vv = VersionVector::new();
        vv.set("k", 5);
        vv.set("k", 2);
        assert_eq!(vv.get("k"), Some(5));
        vv.set("k", 9);
        assert_eq!(vv.get("k"), Some(9));
    }
}
