use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use painel_core::{
    values_equal, CoreError, FetchOutcome, ReadRequest, Record, RecordApi, RecordKey, WriteRequest,
};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cursor::Filters;
use crate::export;
use crate::screen::ScreenSpec;
use crate::state::{ApplyOutcome, SyncSnapshot, SyncState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub silent: bool,
    pub reset_cursor: bool,
    pub filters: Option<Filters>,
}

impl LoadOptions {
    pub fn poll(spec: &ScreenSpec) -> Self {
        Self {
            silent: true,
            reset_cursor: spec.poll_resets_cursor(),
            filters: None,
        }
    }
}

pub struct ListSynchronizer {
    inner: Arc<SyncInner>,
    poller: tokio::sync::Mutex<Option<PollerState>>,
}

#[derive(Debug)]
struct PollerState {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

struct SyncInner {
    spec: ScreenSpec,
    api: Arc<dyn RecordApi>,
    state: Mutex<SyncState>,
    revisions: watch::Sender<u64>,
    paused: AtomicBool,
}

impl std::fmt::Debug for ListSynchronizer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ListSynchronizer")
            .field("screen", &self.inner.spec.name())
            .field("resource", &self.inner.spec.resource())
            .finish_non_exhaustive()
    }
}

impl ListSynchronizer {
    pub fn new(spec: ScreenSpec, api: Arc<dyn RecordApi>) -> Self {
        let state = SyncState::new(&spec);
        let (revisions, _receiver) = watch::channel(state.revision());
        Self {
            inner: Arc::new(SyncInner {
                spec,
                api,
                state: Mutex::new(state),
                revisions,
                paused: AtomicBool::new(false),
            }),
            poller: tokio::sync::Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &ScreenSpec {
        &self.inner.spec
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revisions.subscribe()
    }

    // The first load fails softly so the poller can recover once the server is back.
    pub async fn open(&self) -> Result<ApplyOutcome, CoreError> {
        let initial = self.inner.load(LoadOptions::default()).await;
        if let Err(error) = &initial {
            warn!(
                screen = self.inner.spec.name(),
                error = %error,
                "initial load failed"
            );
        }
        self.start_polling().await?;
        initial
    }

    pub async fn load(&self, options: LoadOptions) -> Result<ApplyOutcome, CoreError> {
        self.inner.load(options).await
    }

    pub async fn refresh(&self) -> Result<ApplyOutcome, CoreError> {
        self.inner.load(LoadOptions::default()).await
    }

    pub async fn set_filters(&self, filters: Filters) -> Result<ApplyOutcome, CoreError> {
        self.inner
            .load(LoadOptions {
                silent: false,
                reset_cursor: true,
                filters: Some(filters),
            })
            .await
    }

    pub async fn next_page(&self) -> Result<ApplyOutcome, CoreError> {
        self.move_cursor(true).await
    }

    pub async fn previous_page(&self) -> Result<ApplyOutcome, CoreError> {
        self.move_cursor(false).await
    }

    async fn move_cursor(&self, forward: bool) -> Result<ApplyOutcome, CoreError> {
        {
            let mut state = self.inner.lock();
            if state.is_closed() {
                return Err(CoreError::Closed);
            }
            let Some(cursor) = state.cursor_mut() else {
                return Err(CoreError::Configuration(format!(
                    "the {} screen is not paginated",
                    self.inner.spec.name()
                )));
            };
            if forward {
                cursor.next_page();
            } else {
                cursor.previous_page();
            }
        }
        self.inner.load(LoadOptions::default()).await
    }

    pub async fn set_field(
        &self,
        key: &RecordKey,
        field: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        let spec = &self.inner.spec;
        let request = spec.field_request(key, field, value.clone())?;
        let (ticket, revision) = {
            let mut state = self.inner.lock();
            let ticket = state.begin_write(spec, key, field, value)?;
            (ticket, state.revision())
        };
        self.inner.publish(revision);
        debug!(screen = spec.name(), key = %key, field, seq = ticket.seq, "optimistic field update");

        match self.inner.api.write(request).await {
            Ok(_) => {
                self.inner.lock().ack_write(&ticket);
                Ok(())
            }
            Err(error) => {
                warn!(
                    screen = spec.name(),
                    key = %key,
                    field,
                    error = %error,
                    "field update failed; restoring previous value"
                );
                let revision = {
                    let mut state = self.inner.lock();
                    state.fail_write(spec, &ticket);
                    state.revision()
                };
                self.inner.publish(revision);
                Err(error)
            }
        }
    }

    pub fn edit_draft(&self, key: &RecordKey, field: &str, value: Value) -> Result<(), CoreError> {
        let revision = {
            let mut state = self.inner.lock();
            state.set_draft(&self.inner.spec, key, field, value)?;
            state.revision()
        };
        self.inner.publish(revision);
        Ok(())
    }

    pub fn discard_draft(&self, key: &RecordKey, field: &str) -> bool {
        let (discarded, revision) = {
            let mut state = self.inner.lock();
            let discarded = state.take_draft(key, field).is_some();
            (discarded, state.revision())
        };
        self.inner.publish(revision);
        discarded
    }

    // Returns false when there was nothing to save. A failed save keeps the draft.
    pub async fn commit_draft(&self, key: &RecordKey, field: &str) -> Result<bool, CoreError> {
        let (draft, current) = {
            let state = self.inner.lock();
            let draft = state.draft(key, field).cloned();
            let current = state
                .record(&self.inner.spec, key)
                .and_then(|record| record.get(field).cloned());
            (draft, current)
        };

        let Some(draft) = draft else {
            return Ok(false);
        };
        if values_equal(Some(&draft), current.as_ref()) {
            self.discard_draft(key, field);
            return Ok(false);
        }
        self.set_field(key, field, draft.clone()).await?;

        // An edit typed while the save was in flight stays in place.
        let revision = {
            let mut state = self.inner.lock();
            if state.draft(key, field) == Some(&draft) {
                state.take_draft(key, field);
            }
            state.revision()
        };
        self.inner.publish(revision);
        Ok(true)
    }

    pub fn export_csv(&self) -> Result<Vec<u8>, CoreError> {
        let columns = self.inner.spec.export_columns();
        if columns.is_empty() {
            return Err(CoreError::Configuration(format!(
                "the {} screen has no export layout",
                self.inner.spec.name()
            )));
        }
        let records = self.snapshot().records;
        export::export_csv(&records, columns)
    }

    pub async fn create(&self, fields: Record) -> Result<Option<Record>, CoreError> {
        let spec = &self.inner.spec;
        if self.inner.lock().is_closed() {
            return Err(CoreError::Closed);
        }
        let request = spec.create_request(fields.into_value())?;
        let response = self.inner.api.write(request).await.map_err(|error| {
            warn!(screen = spec.name(), error = %error, "create failed");
            error
        })?;

        if let Some(created) =
            Record::from_value(response).filter(|record| record.key(spec.key_field()).is_some())
        {
            let revision = {
                let mut state = self.inner.lock();
                state.insert_record(spec, created.clone());
                state.revision()
            };
            self.inner.publish(revision);
            return Ok(Some(created));
        }

        // The server did not echo the record, so fetch the list it now holds.
        match self.inner.load(LoadOptions::default()).await {
            Ok(_) | Err(CoreError::Closed) => {}
            Err(error) => {
                warn!(screen = spec.name(), error = %error, "reload after create failed");
            }
        }
        Ok(None)
    }

    pub async fn delete(&self, key: &RecordKey) -> Result<(), CoreError> {
        let request = self.inner.spec.delete_request(key)?;
        self.remove_confirmed(key, request).await
    }

    pub async fn remove_after(&self, key: &RecordKey, action: &str) -> Result<(), CoreError> {
        let request = self.inner.spec.action_request(action, key)?;
        self.remove_confirmed(key, request).await
    }

    async fn remove_confirmed(
        &self,
        key: &RecordKey,
        request: WriteRequest,
    ) -> Result<(), CoreError> {
        let spec = &self.inner.spec;
        {
            let state = self.inner.lock();
            if state.is_closed() {
                return Err(CoreError::Closed);
            }
            if state.record(spec, key).is_none() {
                return Err(CoreError::UnknownRecord(key.clone()));
            }
        }

        let method = request.method;
        self.inner.api.write(request).await.map_err(|error| {
            warn!(
                screen = spec.name(),
                key = %key,
                method = %method,
                error = %error,
                "server refused removal; keeping record"
            );
            error
        })?;

        let revision = {
            let mut state = self.inner.lock();
            state.remove_record(spec, key);
            state.revision()
        };
        self.inner.publish(revision);
        Ok(())
    }

    pub fn set_polling_paused(&self, paused: bool) {
        self.inner.paused.store(paused, Ordering::Relaxed);
    }

    pub async fn start_polling(&self) -> Result<(), CoreError> {
        let Some(period) = self.inner.spec.poll_interval() else {
            debug!(screen = self.inner.spec.name(), "screen has no poll interval");
            return Ok(());
        };

        let mut guard = self.poller.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        if self.inner.lock().is_closed() {
            return Err(CoreError::Closed);
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if inner.paused.load(Ordering::Relaxed) {
                            continue;
                        }
                        match inner.load(LoadOptions::poll(&inner.spec)).await {
                            Ok(ApplyOutcome::Closed) | Err(CoreError::Closed) => break,
                            Ok(_) => {}
                            Err(error) => warn!(
                                screen = inner.spec.name(),
                                error = %error,
                                "background poll failed"
                            ),
                        }
                    }
                }
            }
        });

        *guard = Some(PollerState {
            stop_tx: Some(stop_tx),
            task,
        });
        info!(
            screen = self.inner.spec.name(),
            interval_ms = period.as_millis() as u64,
            "polling started"
        );
        Ok(())
    }

    pub async fn stop_polling(&self) {
        let state = {
            let mut guard = self.poller.lock().await;
            guard.take()
        };

        if let Some(mut state) = state {
            if let Some(stop_tx) = state.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            if let Err(error) = state.task.await {
                warn!(
                    screen = self.inner.spec.name(),
                    error = %error,
                    "polling task join failed"
                );
            }
            debug!(screen = self.inner.spec.name(), "polling stopped");
        }
    }

    pub async fn close(&self) {
        self.inner.lock().close();
        self.stop_polling().await;
        info!(screen = self.inner.spec.name(), "screen closed");
    }
}

impl Drop for ListSynchronizer {
    fn drop(&mut self) {
        if let Some(state) = self.poller.get_mut().take() {
            state.task.abort();
        }
        if let Ok(mut state) = self.inner.state.lock() {
            state.close();
        }
    }
}

impl SyncInner {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().expect("synchronizer state lock")
    }

    fn publish(&self, revision: u64) {
        self.revisions.send_if_modified(|current| {
            if *current == revision {
                false
            } else {
                *current = revision;
                true
            }
        });
    }

    async fn load(&self, options: LoadOptions) -> Result<ApplyOutcome, CoreError> {
        let spec = &self.spec;
        if let Some(filters) = &options.filters {
            filters.validate(spec.recognized_filters())?;
        }

        let (generation, collection, companion, revision) = {
            let mut state = self.lock();
            if state.is_closed() {
                return Err(CoreError::Closed);
            }
            if let Some(filters) = options.filters.clone() {
                state.replace_filters(filters);
            }
            if options.reset_cursor {
                if let Some(cursor) = state.cursor_mut() {
                    cursor.reset();
                }
            }
            let generation = state.begin_fetch(options.silent);
            let collection =
                ReadRequest::new(spec.scope(), spec.resource()).with_query(state.query());
            let companion = spec
                .companion()
                .map(|path| ReadRequest::new(spec.scope(), path));
            (generation, collection, companion, state.revision())
        };
        self.publish(revision);
        debug!(
            screen = spec.name(),
            generation,
            silent = options.silent,
            "loading collection"
        );

        let (fetched, document) = match companion {
            Some(companion) => {
                let (fetched, document) = tokio::join!(
                    self.api.fetch_collection(collection),
                    self.api.fetch_document(companion)
                );
                (fetched, Some(document))
            }
            None => (self.api.fetch_collection(collection).await, None),
        };
        let document = match document {
            Some(Ok(document)) => Some(document),
            Some(Err(error)) => {
                warn!(screen = spec.name(), error = %error, "companion document fetch failed");
                None
            }
            None => None,
        };

        let (result, revision) = match fetched {
            Ok(FetchOutcome::Records(records)) => {
                let count = records.len();
                let mut state = self.lock();
                let outcome = state.apply_fetch(
                    spec,
                    generation,
                    records,
                    document,
                    options.silent,
                    SystemTime::now(),
                );
                debug!(screen = spec.name(), generation, count, outcome = ?outcome, "collection fetched");
                (Ok(outcome), state.revision())
            }
            Ok(FetchOutcome::Malformed(reason)) => {
                warn!(screen = spec.name(), reason = %reason, "discarding malformed collection");
                let mut state = self.lock();
                let outcome = state.fail_fetch(generation, format!("malformed response: {reason}"));
                (Ok(outcome), state.revision())
            }
            Err(error) => {
                let mut state = self.lock();
                state.fail_fetch(generation, error.to_string());
                (Err(error), state.revision())
            }
        };
        self.publish(revision);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Default)]
    struct StubApi {
        collections: tokio::sync::Mutex<VecDeque<Result<FetchOutcome, CoreError>>>,
        writes: tokio::sync::Mutex<VecDeque<Result<Value, CoreError>>>,
        reads: tokio::sync::Mutex<Vec<ReadRequest>>,
        sent: tokio::sync::Mutex<Vec<WriteRequest>>,
    }

    impl StubApi {
        async fn push_records(&self, records: Vec<Record>) {
            self.collections
                .lock()
                .await
                .push_back(Ok(FetchOutcome::Records(records)));
        }

        async fn push_collection(&self, outcome: Result<FetchOutcome, CoreError>) {
            self.collections.lock().await.push_back(outcome);
        }

        async fn push_write(&self, outcome: Result<Value, CoreError>) {
            self.writes.lock().await.push_back(outcome);
        }
    }

    #[async_trait]
    impl RecordApi for StubApi {
        async fn fetch_collection(&self, request: ReadRequest) -> Result<FetchOutcome, CoreError> {
            self.reads.lock().await.push(request);
            self.collections
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(CoreError::Unreachable("no queued collection".to_owned())))
        }

        async fn fetch_document(&self, request: ReadRequest) -> Result<Value, CoreError> {
            self.reads.lock().await.push(request);
            Ok(json!({ "last_sync_at": "2026-03-02T10:00:00Z" }))
        }

        async fn write(&self, request: WriteRequest) -> Result<Value, CoreError> {
            self.sent.lock().await.push(request);
            self.writes
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    fn mrh(id: i64, dias: i64, candidatos: i64) -> Record {
        Record::new()
            .with("mrh", id)
            .with("dias_em_aberto", dias)
            .with("total_candidatos", candidatos)
            .with("total_comentarios", 0)
    }

    #[tokio::test]
    async fn silent_poll_picks_up_changed_counter() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(1, 2, 5), mrh(2, 0, 0)]).await;
        api.push_records(vec![mrh(1, 2, 5), mrh(2, 1, 0)]).await;
        let sync = ListSynchronizer::new(screens::mrhs().expect("preset"), api.clone());

        sync.load(LoadOptions::default()).await.expect("initial load");
        let outcome = sync
            .load(LoadOptions::poll(sync.spec()))
            .await
            .expect("poll");

        assert_eq!(outcome, ApplyOutcome::Replaced);
        let snapshot = sync.snapshot();
        assert_eq!(
            snapshot
                .record("mrh", &RecordKey::from("2"))
                .and_then(|record| record.get("dias_em_aberto")),
            Some(&json!(1))
        );
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn optimistic_toggle_rolls_back_on_network_failure() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new().with("id", 31).with("checked", false)])
            .await;
        api.push_write(Err(CoreError::Unreachable("connection reset".to_owned())))
            .await;
        let sync = ListSynchronizer::new(
            screens::checkdocs(&RecordKey::from("9")).expect("preset"),
            api.clone(),
        );
        sync.refresh().await.expect("initial load");

        let error = sync
            .set_field(&RecordKey::from("31"), "checked", json!(true))
            .await
            .expect_err("write should fail");

        assert!(matches!(error, CoreError::Unreachable(_)));
        let snapshot = sync.snapshot();
        assert_eq!(
            snapshot
                .record("id", &RecordKey::from("31"))
                .and_then(|record| record.get("checked")),
            Some(&json!(false))
        );
        assert!(snapshot.dirty.is_empty());
        assert_eq!(api.sent.lock().await[0].path, "/checkdocs/item/31/check");
    }

    #[tokio::test]
    async fn delete_keeps_record_when_server_refuses() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new().with("id", 42), Record::new().with("id", 43)])
            .await;
        api.push_write(Err(CoreError::rejected(409, "Candidato possui vínculos")))
            .await;
        api.push_write(Ok(Value::Null)).await;
        let sync = ListSynchronizer::new(
            screens::candidatos_registrados().expect("preset"),
            api.clone(),
        );
        sync.refresh().await.expect("initial load");

        let error = sync
            .delete(&RecordKey::from("42"))
            .await
            .expect_err("refused delete");
        assert_eq!(error.user_message(), "Candidato possui vínculos");
        assert_eq!(sync.snapshot().records.len(), 2);

        sync.delete(&RecordKey::from("42")).await.expect("delete");
        let snapshot = sync.snapshot();
        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.record("id", &RecordKey::from("42")).is_none());
    }

    #[tokio::test]
    async fn filter_change_resets_offset_before_fetching() {
        let api = Arc::new(StubApi::default());
        for _ in 0..3 {
            api.push_records(vec![Record::new().with("id", 1)]).await;
        }
        let sync = ListSynchronizer::new(screens::rondas().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");
        sync.next_page().await.expect("next page");
        assert_eq!(sync.snapshot().cursor.map(|cursor| cursor.offset()), Some(20));

        sync.set_filters(Filters::new().with("roteiro", "Vigilante"))
            .await
            .expect("filtered load");

        let reads = api.reads.lock().await;
        let last = reads
            .iter()
            .rev()
            .find(|request| request.path == "/rondas")
            .expect("collection read");
        assert!(last
            .query
            .contains(&("offset".to_owned(), "0".to_owned())));
        assert!(last
            .query
            .contains(&("roteiro".to_owned(), "Vigilante".to_owned())));
        assert!(reads
            .iter()
            .any(|request| request.path == "/rondas/ultima-sincronizacao"));
    }

    #[tokio::test]
    async fn unknown_filters_are_rejected_without_fetching() {
        let api = Arc::new(StubApi::default());
        let sync = ListSynchronizer::new(screens::rondas().expect("preset"), api.clone());

        let error = sync
            .set_filters(Filters::new().with("setor", "B"))
            .await
            .expect_err("unknown filter");

        assert!(matches!(error, CoreError::Configuration(_)));
        assert!(api.reads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_leaves_state_untouched() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(1, 2, 5)]).await;
        api.push_collection(Ok(FetchOutcome::Malformed("object".to_owned())))
            .await;
        let sync = ListSynchronizer::new(screens::mrhs().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");
        let before = sync.snapshot().records;

        let outcome = sync
            .load(LoadOptions::poll(sync.spec()))
            .await
            .expect("malformed is not an error");

        assert_eq!(outcome, ApplyOutcome::Discarded);
        assert!(Arc::ptr_eq(&before, &sync.snapshot().records));
    }

    #[tokio::test]
    async fn concluding_removes_the_row_after_confirmation() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(7, 1, 0), mrh(8, 1, 0)]).await;
        let sync = ListSynchronizer::new(screens::documentacao().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");

        sync.remove_after(&RecordKey::from("7"), screens::CONCLUIR)
            .await
            .expect("concluir");

        assert_eq!(sync.snapshot().records.len(), 1);
        assert_eq!(
            api.sent.lock().await[0].path,
            "/mrhsdocumentacao/concluir/7"
        );
    }

    #[tokio::test]
    async fn committing_an_unchanged_draft_sends_nothing() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new().with("mrh", 5).with("exame", "2026-03-02")])
            .await;
        let sync = ListSynchronizer::new(screens::agendamento().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");
        let key = RecordKey::from("5");

        sync.edit_draft(&key, "exame", json!("2026-03-02"))
            .expect("draft");
        assert!(!sync.commit_draft(&key, "exame").await.expect("commit"));

        sync.edit_draft(&key, "exame", json!("2026-03-09"))
            .expect("draft");
        assert!(sync.commit_draft(&key, "exame").await.expect("commit"));

        let sent = api.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, Some(json!({ "valor": "2026-03-09" })));
    }

    #[tokio::test]
    async fn create_appends_echoed_record() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new().with("id", 1).with("nome", "RG")])
            .await;
        api.push_write(Ok(json!({ "id": 2, "nome": "CPF" }))).await;
        let sync = ListSynchronizer::new(
            screens::checkdocs(&RecordKey::from("9")).expect("preset"),
            api.clone(),
        );
        sync.refresh().await.expect("initial load");

        let created = sync
            .create(Record::new().with("nome", "CPF"))
            .await
            .expect("create")
            .expect("echoed record");

        assert_eq!(created.key("id"), Some(RecordKey::from("2")));
        assert_eq!(sync.snapshot().records.len(), 2);
    }

    #[tokio::test]
    async fn poller_refreshes_until_closed() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(1, 0, 0)]).await;
        api.push_records(vec![mrh(1, 0, 0), mrh(2, 0, 0)]).await;
        let spec = screens::mrhs()
            .expect("preset")
            .with_poll_interval(Duration::from_millis(20));
        let sync = ListSynchronizer::new(spec, api.clone());
        let mut revisions = sync.subscribe();

        sync.open().await.expect("open");
        sync.start_polling().await.expect("second start is a no-op");

        timeout(Duration::from_secs(1), async {
            loop {
                if sync.snapshot().records.len() == 2 {
                    break;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("poller should pick up the second payload");
        assert!(revisions.has_changed().expect("sender alive"));

        sync.close().await;
        assert!(matches!(sync.refresh().await, Err(CoreError::Closed)));
    }

    #[tokio::test]
    async fn failed_commit_keeps_the_typed_draft() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new().with("mrh", 5).with("exame", "2026-03-02")])
            .await;
        api.push_write(Err(CoreError::Unreachable("down".to_owned())))
            .await;
        let sync = ListSynchronizer::new(screens::agendamento().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");
        let key = RecordKey::from("5");

        sync.edit_draft(&key, "exame", json!("2026-03-09"))
            .expect("draft");
        let error = sync
            .commit_draft(&key, "exame")
            .await
            .expect_err("save fails");

        assert!(matches!(error, CoreError::Unreachable(_)));
        let snapshot = sync.snapshot();
        assert_eq!(
            snapshot.drafts.get(&(key.clone(), "exame".to_owned())),
            Some(&json!("2026-03-09"))
        );
        assert_eq!(
            snapshot
                .record("mrh", &key)
                .and_then(|record| record.get("exame")),
            Some(&json!("2026-03-02"))
        );

        assert!(sync.commit_draft(&key, "exame").await.expect("retry"));
        assert!(sync.snapshot().drafts.is_empty());
    }

    #[tokio::test]
    async fn moving_an_mrh_to_documentacao_removes_it_after_confirmation() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(318, 3, 2), mrh(319, 1, 0)]).await;
        let sync = ListSynchronizer::new(screens::mrhs().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");

        sync.remove_after(&RecordKey::from("318"), screens::MOVER_DOCUMENTACAO)
            .await
            .expect("documentacao");

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.record("mrh", &RecordKey::from("318")).is_none());
        let sent = api.sent.lock().await;
        assert_eq!(sent[0].method, painel_core::HttpMethod::Patch);
        assert_eq!(sent[0].path, "/mrhsabertas/318/documentacao");
    }

    #[tokio::test]
    async fn previous_page_never_goes_below_the_first_page() {
        let api = Arc::new(StubApi::default());
        for _ in 0..5 {
            api.push_records(vec![Record::new().with("id", 1)]).await;
        }
        let sync = ListSynchronizer::new(screens::rondas().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");
        sync.next_page().await.expect("page 2");
        sync.next_page().await.expect("page 3");

        sync.previous_page().await.expect("back to page 2");
        assert_eq!(sync.snapshot().cursor.map(|cursor| cursor.offset()), Some(20));
        sync.previous_page().await.expect("back to page 1");
        sync.previous_page().await.expect("still page 1");
        assert_eq!(sync.snapshot().cursor.map(|cursor| cursor.offset()), Some(0));

        let reads = api.reads.lock().await;
        let last = reads
            .iter()
            .rev()
            .find(|request| request.path == "/rondas")
            .expect("collection read");
        assert!(last
            .query
            .contains(&("offset".to_owned(), "0".to_owned())));
    }

    #[tokio::test]
    async fn unpaginated_screens_refuse_to_page() {
        let api = Arc::new(StubApi::default());
        let sync = ListSynchronizer::new(screens::mrhs().expect("preset"), api.clone());

        let error = sync.previous_page().await.expect_err("not paginated");
        assert!(matches!(error, CoreError::Configuration(_)));
        assert!(api.reads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn paused_poller_skips_ticks_until_resumed() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![mrh(1, 0, 0)]).await;
        api.push_records(vec![mrh(1, 0, 0), mrh(2, 0, 0)]).await;
        let spec = screens::candidatos_registrados()
            .expect("preset")
            .with_poll_interval(Duration::from_millis(20));
        let sync = ListSynchronizer::new(spec, api.clone());

        sync.set_polling_paused(true);
        sync.open().await.expect("open");
        sleep(Duration::from_millis(100)).await;
        assert_eq!(api.reads.lock().await.len(), 1);
        assert_eq!(sync.snapshot().records.len(), 1);

        sync.set_polling_paused(false);
        timeout(Duration::from_secs(1), async {
            while sync.snapshot().records.len() != 2 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("poller should resume");

        sync.close().await;
    }

    #[tokio::test]
    async fn export_writes_the_held_collection() {
        let api = Arc::new(StubApi::default());
        api.push_records(vec![Record::new()
            .with("mrh", 7)
            .with("nome_colaborador", "Ana Souza")
            .with("exame", "2026-03-02")])
            .await;
        let sync = ListSynchronizer::new(screens::agendamento().expect("preset"), api.clone());
        sync.refresh().await.expect("initial load");

        let text = String::from_utf8(sync.export_csv().expect("export")).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("MRH,Colaborador,CPF,Função,Empresa,CR,Exame,Uniformes,Integração,Admissão")
        );
        assert_eq!(lines.next(), Some("7,Ana Souza,,,,,2026-03-02,,,"));

        let rondas = ListSynchronizer::new(screens::rondas().expect("preset"), api.clone());
        assert!(matches!(
            rondas.export_csv(),
            Err(CoreError::Configuration(_))
        ));
    }
}
