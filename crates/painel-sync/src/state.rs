use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::SystemTime;

use painel_core::{CoreError, Record, RecordKey};
use serde_json::Value;

use crate::change::changed;
use crate::cursor::{Filters, SyncCursor};
use crate::screen::ScreenSpec;

pub type CellKey = (RecordKey, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Replaced,
    Unchanged,
    Stale,
    Discarded,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteTicket {
    pub key: RecordKey,
    pub field: String,
    pub seq: u64,
    pub value: Value,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    seq: u64,
    value: Value,
    confirmed: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub records: Arc<[Record]>,
    pub revision: u64,
    pub loading: bool,
    pub last_synced_at: Option<SystemTime>,
    pub last_sync_error: Option<String>,
    pub companion: Option<Value>,
    pub drafts: BTreeMap<CellKey, Value>,
    pub dirty: BTreeSet<CellKey>,
    pub filters: Filters,
    pub cursor: Option<SyncCursor>,
}

impl SyncSnapshot {
    pub fn record(&self, key_field: &str, key: &RecordKey) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.key(key_field).as_ref() == Some(key))
    }
}

#[derive(Debug)]
pub struct SyncState {
    records: Arc<[Record]>,
    revision: u64,
    loading_generation: Option<u64>,
    last_synced_at: Option<SystemTime>,
    last_sync_error: Option<String>,
    companion: Option<Value>,
    pending: BTreeMap<CellKey, PendingWrite>,
    drafts: BTreeMap<CellKey, Value>,
    filters: Filters,
    cursor: Option<SyncCursor>,
    issued_generation: u64,
    applied_generation: u64,
    write_seq: u64,
    closed: bool,
}

impl SyncState {
    pub fn new(spec: &ScreenSpec) -> Self {
        Self {
            records: Arc::from(Vec::<Record>::new()),
            revision: 0,
            loading_generation: None,
            last_synced_at: None,
            last_sync_error: None,
            companion: None,
            pending: BTreeMap::new(),
            drafts: BTreeMap::new(),
            filters: Filters::new(),
            cursor: spec.page_size().map(SyncCursor::new),
            issued_generation: 0,
            applied_generation: 0,
            write_seq: 0,
            closed: false,
        }
    }

    pub fn records(&self) -> &Arc<[Record]> {
        &self.records
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_loading(&self) -> bool {
        self.loading_generation.is_some()
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn replace_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn cursor(&self) -> Option<SyncCursor> {
        self.cursor
    }

    pub fn cursor_mut(&mut self) -> Option<&mut SyncCursor> {
        self.cursor.as_mut()
    }

    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = self.filters.to_query();
        if let Some(cursor) = &self.cursor {
            query.extend(cursor.to_query());
        }
        query
    }

    pub fn is_dirty(&self, key: &RecordKey, field: &str) -> bool {
        self.pending.contains_key(&(key.clone(), field.to_owned()))
    }

    pub fn draft(&self, key: &RecordKey, field: &str) -> Option<&Value> {
        self.drafts.get(&(key.clone(), field.to_owned()))
    }

    pub fn record(&self, spec: &ScreenSpec, key: &RecordKey) -> Option<&Record> {
        self.position(spec, key).map(|index| &self.records[index])
    }

    pub fn begin_fetch(&mut self, silent: bool) -> u64 {
        self.issued_generation += 1;
        let generation = self.issued_generation;
        if !silent {
            self.loading_generation = Some(generation);
            self.revision += 1;
        }
        generation
    }

    pub fn apply_fetch(
        &mut self,
        spec: &ScreenSpec,
        generation: u64,
        mut incoming: Vec<Record>,
        companion: Option<Value>,
        silent: bool,
        now: SystemTime,
    ) -> ApplyOutcome {
        if self.closed {
            return ApplyOutcome::Closed;
        }
        if generation <= self.applied_generation {
            return ApplyOutcome::Stale;
        }

        self.applied_generation = generation;
        // A newer successful fetch supersedes any older foreground load.
        if self
            .loading_generation
            .is_some_and(|loading| loading <= generation)
        {
            self.finish_loading();
        }
        self.last_synced_at = Some(now);
        self.last_sync_error = None;
        self.overlay_pending(spec, &mut incoming);

        let companion_changed = match companion {
            Some(document) if self.companion.as_ref() != Some(&document) => {
                self.companion = Some(document);
                true
            }
            _ => false,
        };

        let replace = !silent || changed(&self.records, &incoming, spec);
        if replace {
            if !silent {
                let live = incoming
                    .iter()
                    .filter_map(|record| record.key(spec.key_field()))
                    .collect::<BTreeSet<_>>();
                self.drafts.retain(|(key, _), _| live.contains(key));
                self.pending.retain(|(key, _), _| live.contains(key));
            }
            self.records = Arc::from(incoming);
        }
        if replace || companion_changed {
            self.revision += 1;
        }

        if replace {
            ApplyOutcome::Replaced
        } else {
            ApplyOutcome::Unchanged
        }
    }

    pub fn fail_fetch(&mut self, generation: u64, reason: impl Into<String>) -> ApplyOutcome {
        if self.closed {
            return ApplyOutcome::Closed;
        }
        if generation <= self.applied_generation {
            return ApplyOutcome::Stale;
        }
        if self.loading_generation == Some(generation) {
            self.finish_loading();
        }
        self.last_sync_error = Some(reason.into());
        ApplyOutcome::Discarded
    }

    pub fn begin_write(
        &mut self,
        spec: &ScreenSpec,
        key: &RecordKey,
        field: &str,
        value: Value,
    ) -> Result<WriteTicket, CoreError> {
        if self.closed {
            return Err(CoreError::Closed);
        }
        let index = self
            .position(spec, key)
            .ok_or_else(|| CoreError::UnknownRecord(key.clone()))?;

        let mut records = self.records.to_vec();
        let previous = records[index].set(field, value.clone());
        self.records = Arc::from(records);
        self.revision += 1;
        self.write_seq += 1;
        let seq = self.write_seq;

        match self.pending.entry((key.clone(), field.to_owned())) {
            // An overlapping write keeps the last confirmed value for rollback.
            Entry::Occupied(mut entry) => {
                let pending = entry.get_mut();
                pending.seq = seq;
                pending.value = value.clone();
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingWrite {
                    seq,
                    value: value.clone(),
                    confirmed: previous,
                });
            }
        }

        Ok(WriteTicket {
            key: key.clone(),
            field: field.to_owned(),
            seq,
            value,
        })
    }

    pub fn ack_write(&mut self, ticket: &WriteTicket) {
        if self.closed {
            return;
        }
        let cell = (ticket.key.clone(), ticket.field.clone());
        let Some(pending) = self.pending.get_mut(&cell) else {
            return;
        };
        if pending.seq == ticket.seq {
            self.pending.remove(&cell);
        } else if pending.seq > ticket.seq {
            pending.confirmed = Some(ticket.value.clone());
        }
    }

    // Returns true when the cell was rolled back.
    pub fn fail_write(&mut self, spec: &ScreenSpec, ticket: &WriteTicket) -> bool {
        if self.closed {
            return false;
        }
        let cell = (ticket.key.clone(), ticket.field.clone());
        if self
            .pending
            .get(&cell)
            .map_or(true, |pending| pending.seq != ticket.seq)
        {
            return false;
        }
        let Some(pending) = self.pending.remove(&cell) else {
            return false;
        };
        let Some(index) = self.position(spec, &ticket.key) else {
            return false;
        };

        let mut records = self.records.to_vec();
        match pending.confirmed {
            Some(value) => {
                records[index].set(&ticket.field, value);
            }
            None => {
                records[index].remove(&ticket.field);
            }
        }
        self.records = Arc::from(records);
        self.revision += 1;
        true
    }

    pub fn set_draft(
        &mut self,
        spec: &ScreenSpec,
        key: &RecordKey,
        field: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::Closed);
        }
        if !spec.is_editable(field) {
            return Err(CoreError::Configuration(format!(
                "field `{field}` is not editable on the {} screen",
                spec.name()
            )));
        }
        if self.position(spec, key).is_none() {
            return Err(CoreError::UnknownRecord(key.clone()));
        }
        self.drafts.insert((key.clone(), field.to_owned()), value);
        self.revision += 1;
        Ok(())
    }

    pub fn take_draft(&mut self, key: &RecordKey, field: &str) -> Option<Value> {
        let draft = self.drafts.remove(&(key.clone(), field.to_owned()));
        if draft.is_some() {
            self.revision += 1;
        }
        draft
    }

    pub fn insert_record(&mut self, spec: &ScreenSpec, record: Record) -> bool {
        if self.closed {
            return false;
        }
        let Some(key) = record.key(spec.key_field()) else {
            return false;
        };
        if self.position(spec, &key).is_some() {
            return false;
        }
        let mut records = self.records.to_vec();
        records.push(record);
        self.records = Arc::from(records);
        self.revision += 1;
        true
    }

    pub fn remove_record(&mut self, spec: &ScreenSpec, key: &RecordKey) -> bool {
        if self.closed {
            return false;
        }
        let Some(index) = self.position(spec, key) else {
            return false;
        };
        let mut records = self.records.to_vec();
        records.remove(index);
        self.records = Arc::from(records);
        self.drafts.retain(|(draft_key, _), _| draft_key != key);
        self.pending.retain(|(pending_key, _), _| pending_key != key);
        self.revision += 1;
        true
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.loading_generation = None;
        self.drafts.clear();
        self.pending.clear();
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            records: Arc::clone(&self.records),
            revision: self.revision,
            loading: self.is_loading(),
            last_synced_at: self.last_synced_at,
            last_sync_error: self.last_sync_error.clone(),
            companion: self.companion.clone(),
            drafts: self.drafts.clone(),
            dirty: self.pending.keys().cloned().collect(),
            filters: self.filters.clone(),
            cursor: self.cursor,
        }
    }

    fn position(&self, spec: &ScreenSpec, key: &RecordKey) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.key(spec.key_field()).as_ref() == Some(key))
    }

    fn finish_loading(&mut self) {
        self.loading_generation = None;
        self.revision += 1;
    }

    // Dirty cells keep the local value; the server's copy becomes the rollback target.
    fn overlay_pending(&mut self, spec: &ScreenSpec, incoming: &mut [Record]) {
        if self.pending.is_empty() {
            return;
        }
        for record in incoming.iter_mut() {
            let Some(key) = record.key(spec.key_field()) else {
                continue;
            };
            for ((pending_key, field), pending) in self.pending.iter_mut() {
                if pending_key == &key {
                    pending.confirmed = record.set(field, pending.value.clone());
                }
            }
        }
    }
}
