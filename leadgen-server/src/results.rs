//! Reader-side script collection
//!
//! A results reader sees scripts from two sources: the initial database read
//! and live `ScriptSaved` events. Both may carry the same row, so rows are
//! keyed by id and kept sorted by `order_index`.

use leadgen_common::db::GeneratedScript;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct ScriptCollection {
    seen: HashSet<Uuid>,
    ordered: BTreeMap<(i64, Uuid), GeneratedScript>,
}

impl ScriptCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script; returns false if its id was already present
    pub fn insert(&mut self, script: GeneratedScript) -> bool {
        if !self.seen.insert(script.id) {
            return false;
        }
        self.ordered.insert((script.order_index, script.id), script);
        true
    }

    /// Add every script, returning the ones that were new (in position order)
    pub fn merge<I>(&mut self, scripts: I) -> Vec<GeneratedScript>
    where
        I: IntoIterator<Item = GeneratedScript>,
    {
        let mut added: Vec<GeneratedScript> = scripts
            .into_iter()
            .filter(|s| self.insert(s.clone()))
            .collect();
        added.sort_by_key(|s| s.order_index);
        added
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Scripts in position order
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedScript> {
        self.ordered.values()
    }

    pub fn into_vec(self) -> Vec<GeneratedScript> {
        self.ordered.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn script(order_index: i64) -> GeneratedScript {
        GeneratedScript {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            title: format!("Title {}", order_index),
            script_body: "Body".to_string(),
            order_index,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_duplicate_ids_ignored() {
        let mut collection = ScriptCollection::new();
        let s = script(1);
        assert!(collection.insert(s.clone()));
        assert!(!collection.insert(s.clone()));
        assert_eq!(collection.len(), 1);
        assert!(collection.contains(&s.id));
    }

    #[test]
    fn test_kept_in_position_order() {
        let mut collection = ScriptCollection::new();
        for i in [3, 1, 5, 2, 4] {
            collection.insert(script(i));
        }
        let positions: Vec<i64> = collection.iter().map(|s| s.order_index).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_merge_returns_only_new_rows() {
        let mut collection = ScriptCollection::new();
        let first = script(1);
        let second = script(2);
        collection.insert(first.clone());

        // Live event for `second` arrived, then a re-read returns both rows
        let added = collection.merge(vec![second.clone()]);
        assert_eq!(added.len(), 1);

        let added = collection.merge(vec![first, second, script(3)]);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].order_index, 3);
        assert_eq!(collection.into_vec().len(), 3);
    }
}
