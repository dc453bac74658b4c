use std::collections::{BTreeMap, BTreeSet};

use painel_core::{values_equal, Record, RecordKey};

use crate::screen::{CompareFields, ScreenSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    pub added: Vec<RecordKey>,
    pub removed: Vec<RecordKey>,
    pub updated: Vec<RecordKey>,
    pub reordered: bool,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty() && !self.reordered
    }
}

pub fn changed(previous: &[Record], next: &[Record], spec: &ScreenSpec) -> bool {
    if previous.len() != next.len() {
        return true;
    }

    let (Some(previous_keys), Some(next_keys)) = (
        unique_keys(previous, spec.key_field()),
        unique_keys(next, spec.key_field()),
    ) else {
        return positional_changed(previous, next, spec.compare());
    };

    if previous_keys != next_keys {
        return true;
    }
    previous
        .iter()
        .zip(next)
        .any(|(left, right)| record_changed(left, right, spec.compare()))
}

pub fn positional_changed(previous: &[Record], next: &[Record], fields: &CompareFields) -> bool {
    previous.len() != next.len()
        || previous
            .iter()
            .zip(next)
            .any(|(left, right)| record_changed(left, right, fields))
}

pub fn diff(previous: &[Record], next: &[Record], spec: &ScreenSpec) -> CollectionDiff {
    let key_field = spec.key_field();
    let previous_by_key = index_by_key(previous, key_field);
    let next_by_key = index_by_key(next, key_field);

    let mut result = CollectionDiff::default();
    for (key, record) in &next_by_key {
        match previous_by_key.get(key) {
            None => result.added.push(key.clone()),
            Some(old) if record_changed(old, record, spec.compare()) => {
                result.updated.push(key.clone())
            }
            Some(_) => {}
        }
    }
    result.removed = previous_by_key
        .keys()
        .filter(|key| !next_by_key.contains_key(*key))
        .cloned()
        .collect();

    let retained_previous = ordered_keys(previous, key_field)
        .into_iter()
        .filter(|key| next_by_key.contains_key(key))
        .collect::<Vec<_>>();
    let retained_next = ordered_keys(next, key_field)
        .into_iter()
        .filter(|key| previous_by_key.contains_key(key))
        .collect::<Vec<_>>();
    result.reordered = retained_previous != retained_next;
    result
}

fn record_changed(left: &Record, right: &Record, fields: &CompareFields) -> bool {
    match fields {
        CompareFields::Only(fields) => fields.iter().any(|field| !left.field_eq(right, field)),
        CompareFields::All => {
            let names = left
                .as_map()
                .keys()
                .chain(right.as_map().keys())
                .collect::<BTreeSet<_>>();
            names
                .into_iter()
                .any(|name| !values_equal(left.get(name), right.get(name)))
        }
    }
}

// `None` when any record lacks a key or a key repeats.
fn unique_keys(records: &[Record], key_field: &str) -> Option<Vec<RecordKey>> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::with_capacity(records.len());
    for record in records {
        let key = record.key(key_field)?;
        if !seen.insert(key.clone()) {
            return None;
        }
        keys.push(key);
    }
    Some(keys)
}

fn ordered_keys(records: &[Record], key_field: &str) -> Vec<RecordKey> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter_map(|record| record.key(key_field))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

fn index_by_key<'a>(records: &'a [Record], key_field: &str) -> BTreeMap<RecordKey, &'a Record> {
    let mut index = BTreeMap::new();
    for record in records {
        if let Some(key) = record.key(key_field) {
            index.entry(key).or_insert(record);
        }
    }
    index
}
