//! Question registry
//!
//! Holds the fixed set of question entries for a training session. Pure
//! lookup: entries are never mutated, and the registry is only ever replaced
//! wholesale.

use crate::error::RegistryError;
use crate::types::{QuestionEntry, QuestionId};
use indexmap::IndexMap;

/// Ordered, id-indexed set of questions
///
/// Iteration order is load order; batches are partitioned in that order.
#[derive(Debug, Clone, Default)]
pub struct QuestionRegistry {
    entries: IndexMap<QuestionId, QuestionEntry>,
}

impl QuestionRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from entries
    ///
    /// # Errors
    /// - `RegistryError::EmptyId` if any id is empty
    /// - `RegistryError::DuplicateId` if two entries share an id
    pub fn from_entries(
        entries: impl IntoIterator<Item = QuestionEntry>,
    ) -> Result<Self, RegistryError> {
        let mut map = IndexMap::new();
        for entry in entries {
            if entry.id.as_str().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if map.contains_key(&entry.id) {
                return Err(RegistryError::DuplicateId(entry.id));
            }
            map.insert(entry.id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// Look up an entry
    #[inline]
    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&QuestionEntry> {
        self.entries.get(id)
    }

    /// Whether an id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Ids in load order
    pub fn ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.entries.keys()
    }

    /// Entries in load order
    pub fn iter(&self) -> impl Iterator<Item = &QuestionEntry> {
        self.entries.values()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str) -> QuestionEntry {
        QuestionEntry::new(id, json!({"stem": id}), json!("A"))
    }

    #[test]
    fn registry_preserves_load_order() {
        let registry =
            QuestionRegistry::from_entries(vec![entry("c"), entry("a"), entry("b")]).unwrap();

        let ids: Vec<&str> = registry.ids().map(QuestionId::as_str).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let result = QuestionRegistry::from_entries(vec![entry("a"), entry("a")]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateId(QuestionId::from("a"))
        );
    }

    #[test]
    fn registry_rejects_empty_id() {
        let result = QuestionRegistry::from_entries(vec![entry("")]);
        assert_eq!(result.unwrap_err(), RegistryError::EmptyId);
    }

    #[test]
    fn registry_lookup() {
        let registry = QuestionRegistry::from_entries(vec![entry("a")]).unwrap();
        assert!(registry.contains(&QuestionId::from("a")));
        assert!(registry.get(&QuestionId::from("b")).is_none());
        assert!(!registry.is_empty());
    }
}
