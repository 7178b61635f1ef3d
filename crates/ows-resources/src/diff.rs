//! Three-way reconciliation between a prior resource map and a new one.

use std::collections::HashMap;
use std::hash::Hash;

/// The outcome of comparing a prior resource map to a new one: resources
/// present in both but changed, resources only in the new map, and
/// resources only in the prior map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<K, V> {
    /// Present in both maps with a different config.
    pub updated: Vec<(K, V)>,
    /// Present only in the new map.
    pub added: Vec<(K, V)>,
    /// Present only in the prior map.
    pub removed: Vec<K>,
}

impl<K, V> Default for Diff<K, V> {
    fn default() -> Self {
        Self { updated: Vec::new(), added: Vec::new(), removed: Vec::new() }
    }
}

/// Computes the three-way reconciliation diff of `prior` against `new`:
/// present in both with different config → `updated`; present only in
/// `new` → `added`; present only in `prior` → `removed`.
pub fn reconcile<K, V>(prior: &HashMap<K, V>, new: &HashMap<K, V>) -> Diff<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Clone,
{
    let mut diff = Diff::default();
    for (id, config) in new {
        match prior.get(id) {
            None => diff.added.push((id.clone(), config.clone())),
            Some(old) if old != config => diff.updated.push((id.clone(), config.clone())),
            Some(_) => {}
        }
    }
    for id in prior.keys() {
        if !new.contains_key(id) {
            diff.removed.push(id.clone());
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn unchanged_entries_are_reported_in_neither_list() {
        let mut prior = HashMap::new();
        prior.insert("a".to_string(), 1);
        let new = prior.clone();
        let diff = reconcile(&prior, &new);
        assert!(diff.updated.is_empty());
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn changed_entries_are_reported_as_updated() {
        let mut prior = HashMap::new();
        prior.insert("a".to_string(), 1);
        let mut new = HashMap::new();
        new.insert("a".to_string(), 2);
        let diff = reconcile(&prior, &new);
        assert_eq!(diff.updated, vec![("a".to_string(), 2)]);
    }

    #[test]
    fn new_only_entries_are_added_prior_only_entries_are_removed() {
        let mut prior = HashMap::new();
        prior.insert("gone".to_string(), 1);
        let mut new = HashMap::new();
        new.insert("fresh".to_string(), 2);
        let diff = reconcile(&prior, &new);
        assert_eq!(diff.added, vec![("fresh".to_string(), 2)]);
        assert_eq!(diff.removed, vec!["gone".to_string()]);
    }
}
