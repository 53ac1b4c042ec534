//! Integration manager service
//!
//! Owns the set of configured vendor connections and one recurring polling
//! timer per active connection. Each sync cycle:
//! - fetches calls for the window `last_sync .. now`
//! - deduplicates against the ledger by `(vendor, external_id)`
//! - downloads recordings and hands them to the transcription collaborator
//! - updates `last_sync`, the lifetime counters, and the lifecycle status
//!
//! The manager is an explicitly constructed service owned by the process's
//! composition root; every dependency is injected. The per-integration
//! re-entrancy guard is process-local only: multiple server instances each
//! run their own timers with no cross-instance coordination.

use callscope_core::{
    models::{
        CallRecord, FetchFilters, Integration, IntegrationConfig, IntegrationStatus,
        ProcessingStatus, VendorKind,
    },
    traits::{CallRepository, IntegrationRepository, RecordingFetcher, Repository, Transcriber},
    AppError, AppResult,
};
use callscope_vendors::{VendorClient, VendorClientFactory};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{MAX_SYNC_INTERVAL_MINUTES, MIN_SYNC_INTERVAL_MINUTES};

/// Request to create an integration
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub name: String,
    pub vendor: VendorKind,
    pub config: IntegrationConfig,
}

/// Result of one sync cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    /// Raw records the vendor returned for the window
    pub fetched: usize,
    /// New records processed into the ledger
    pub processed: i64,
    /// Records skipped because their external id was already processed
    pub duplicates: usize,
    /// Per-record failures (recording download, transcription, persistence)
    pub errors: i64,
}

/// Integration manager
///
/// Constructed once per process; spawned timer tasks hold an `Arc` back to
/// the manager, so constructors hand out `Arc<IntegrationManager>`.
pub struct IntegrationManager {
    integrations: Arc<dyn IntegrationRepository>,
    ledger: Arc<dyn CallRepository>,
    registry: Arc<dyn VendorClientFactory>,
    transcriber: Arc<dyn Transcriber>,
    recordings: Arc<dyn RecordingFetcher>,
    /// One timer task per polling integration
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    /// Per-integration re-entrancy guards (process-local)
    guards: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl IntegrationManager {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        ledger: Arc<dyn CallRepository>,
        registry: Arc<dyn VendorClientFactory>,
        transcriber: Arc<dyn Transcriber>,
        recordings: Arc<dyn RecordingFetcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            integrations,
            ledger,
            registry,
            transcriber,
            recordings,
            timers: Mutex::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        })
    }

    /// Resume timers for every pollable integration already persisted
    ///
    /// Called once at boot. Windows missed while the process was down are
    /// not backfilled; the next cycle starts from the stored `last_sync`.
    #[instrument(skip(self))]
    pub async fn start_all(self: Arc<Self>) -> AppResult<usize> {
        let stored = self.integrations.list_all().await?;
        let mut started = 0;

        for integration in stored {
            if integration.is_pollable() {
                Self::spawn_timer(&self, &integration);
                started += 1;
            }
        }

        info!("Resumed {} integration timer(s)", started);
        Ok(started)
    }

    /// Add a new vendor connection
    ///
    /// Connectivity is tested before anything is stored, so no integration
    /// ever persists in a non-validated state. On success the integration
    /// is stored `Active`, its timer starts, and one sync runs immediately.
    #[instrument(skip(self, request), fields(name = %request.name, vendor = %request.vendor))]
    pub async fn add_integration(
        self: Arc<Self>,
        request: NewIntegration,
    ) -> AppResult<Integration> {
        let mut config = request.config;
        config.sync_interval_minutes = config
            .sync_interval_minutes
            .clamp(MIN_SYNC_INTERVAL_MINUTES, MAX_SYNC_INTERVAL_MINUTES);

        let client = self
            .registry
            .client_for(request.vendor, &config)
            .map_err(|e| e.into_app(request.vendor))?;

        info!("Testing {} connectivity before storing", request.vendor);
        client
            .test_connection()
            .await
            .map_err(|e| e.into_app(request.vendor))?;

        let mut integration = Integration::new(request.name, request.vendor, config);
        integration.status = IntegrationStatus::Active;
        let integration = self.integrations.create(&integration).await?;

        Self::spawn_timer(&self, &integration);

        // First cycle runs immediately; its failure marks the integration
        // `error` but does not undo the add.
        if let Err(e) = self.sync_integration(integration.id).await {
            warn!("Initial sync for {} failed: {}", integration.id, e);
        }

        self.integrations
            .find_by_id(integration.id)
            .await?
            .ok_or_else(|| AppError::IntegrationNotFound(integration.id.to_string()))
    }

    /// Remove a connection: cancel its timer, then delete the stored row
    ///
    /// An in-flight cycle is not aborted; it runs to completion and its
    /// counter updates fail against the now-absent row.
    #[instrument(skip(self))]
    pub async fn remove_integration(&self, id: Uuid) -> AppResult<bool> {
        if let Some(handle) = self.timers.lock().expect("timer map poisoned").remove(&id) {
            handle.abort();
            info!("Cancelled timer for integration {}", id);
        }
        self.guards.lock().expect("guard map poisoned").remove(&id);

        self.integrations.delete(id).await
    }

    /// Deactivate without deleting: timer stops, configuration stays
    #[instrument(skip(self))]
    pub async fn pause_integration(&self, id: Uuid) -> AppResult<()> {
        if let Some(handle) = self.timers.lock().expect("timer map poisoned").remove(&id) {
            handle.abort();
        }
        self.integrations
            .set_status(id, IntegrationStatus::Inactive)
            .await
    }

    /// Run one sync cycle on demand (same guard as the timer path)
    pub async fn trigger_sync(&self, id: Uuid) -> AppResult<SyncOutcome> {
        self.sync_integration(id).await
    }

    fn spawn_timer(manager: &Arc<Self>, integration: &Integration) {
        let id = integration.id;
        let minutes = integration
            .config
            .sync_interval_minutes
            .clamp(MIN_SYNC_INTERVAL_MINUTES, MAX_SYNC_INTERVAL_MINUTES);

        let this = manager.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(minutes * 60));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the add path already ran
            // its immediate sync, so consume it before looping.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match this.sync_integration(id).await {
                    Ok(outcome) => {
                        debug!(
                            "Scheduled sync for {}: {} processed, {} duplicates, {} errors",
                            id, outcome.processed, outcome.duplicates, outcome.errors
                        );
                    }
                    Err(AppError::IntegrationNotFound(_)) => {
                        // Row vanished underneath the timer; stop polling.
                        warn!("Integration {} no longer exists, stopping timer", id);
                        break;
                    }
                    Err(e) => {
                        warn!("Scheduled sync for {} failed: {}", id, e);
                    }
                }
            }
        });

        let mut timers = manager.timers.lock().expect("timer map poisoned");
        if let Some(previous) = timers.insert(id, handle) {
            previous.abort();
        }
    }

    fn guard(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        self.guards
            .lock()
            .expect("guard map poisoned")
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// One poll-fetch-process cycle for a single integration
    #[instrument(skip(self))]
    pub async fn sync_integration(&self, id: Uuid) -> AppResult<SyncOutcome> {
        // Re-entrancy guard: a cycle never runs twice concurrently for the
        // same integration in this process.
        let guard = self.guard(id);
        let _held = guard
            .try_lock()
            .map_err(|_| AppError::SyncInProgress(id.to_string()))?;

        let integration = self
            .integrations
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::IntegrationNotFound(id.to_string()))?;

        let client = self
            .registry
            .client_for(integration.vendor, &integration.config)
            .map_err(|e| e.into_app(integration.vendor))?;

        let window_end = Utc::now();
        let mut filters = integration.config.filters.clone();
        filters.start_date = integration.last_sync.or(filters.start_date);
        filters.end_date = Some(window_end);

        debug!(
            "Syncing {} ({}): window {:?} .. {}",
            integration.name, integration.vendor, filters.start_date, window_end
        );

        let fetched = match client.fetch_calls(&filters).await {
            Ok(records) => records,
            Err(e) => {
                // Connection-level failure: the whole integration goes to
                // `error`, the window is kept for retry, ticks continue.
                error!("Fetch failed for integration {}: {}", id, e);
                self.integrations
                    .record_sync(id, None, 0, 1, IntegrationStatus::Error)
                    .await?;
                return Err(e.into_app(integration.vendor));
            }
        };

        let mut outcome = SyncOutcome {
            fetched: fetched.len(),
            ..Default::default()
        };

        // Records are processed sequentially, in the order the vendor
        // returned them; one failure never aborts the rest of the batch.
        for record in fetched {
            if self
                .ledger
                .exists_external(integration.vendor, &record.external_id)
                .await?
            {
                outcome.duplicates += 1;
                continue;
            }

            match self
                .process_record(&integration, client.as_ref(), record)
                .await
            {
                Ok(()) => outcome.processed += 1,
                Err(e) => {
                    warn!("Record processing failed during sync of {}: {}", id, e);
                    outcome.errors += 1;
                }
            }
        }

        // Successful cycle: advance the window and self-heal `error`.
        self.integrations
            .record_sync(
                id,
                Some(window_end),
                outcome.processed + outcome.errors,
                outcome.errors,
                IntegrationStatus::Active,
            )
            .await?;

        info!(
            "Sync of {} done: {} fetched, {} new, {} duplicates, {} errors",
            id, outcome.fetched, outcome.processed, outcome.duplicates, outcome.errors
        );
        Ok(outcome)
    }

    /// Process one new record: recording resolution, download, handoff
    async fn process_record(
        &self,
        integration: &Integration,
        client: &dyn VendorClient,
        mut record: CallRecord,
    ) -> AppResult<()> {
        record.status = ProcessingStatus::Processing;

        // Fallback when the list endpoint did not inline the URL; a failed
        // lookup means "no recording available" and is not an error.
        if record.recording_url.is_none() {
            match client.recording_url(&record.external_id).await {
                Ok(url) => record.recording_url = url,
                Err(e) => {
                    warn!(
                        "Recording lookup for {} failed, treating as unavailable: {}",
                        record.id, e
                    );
                }
            }
        }

        let mut failure: Option<AppError> = None;

        if let Some(url) = record.recording_url.clone() {
            match self.recordings.download(&url).await {
                Ok(audio) => {
                    if integration.config.auto_transcribe {
                        record.transcription_status = ProcessingStatus::Processing;
                        match self.transcriber.submit(&record, audio).await {
                            Ok(job_id) => {
                                debug!("Transcription job {} submitted for {}", job_id, record.id);
                            }
                            Err(e) => {
                                record.transcription_status = ProcessingStatus::Failed;
                                failure = Some(e);
                            }
                        }
                    }
                }
                Err(e) => {
                    record.transcription_status = ProcessingStatus::Failed;
                    failure = Some(e);
                }
            }
        }

        record.status = if failure.is_some() {
            ProcessingStatus::Failed
        } else {
            ProcessingStatus::Completed
        };

        // The record is stored either way; failures are visible in its
        // pipeline states and in the integration counters.
        self.ledger.upsert(&record).await?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for IntegrationManager {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().expect("timer map poisoned").drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use callscope_db::{InMemoryCallRepository, InMemoryIntegrationRepository};
    use callscope_vendors::VendorError;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Scripted vendor client: each fetch pops the next batch, or an HTTP
    /// failure status; an exhausted script returns an empty batch.
    struct FakeVendorClient {
        vendor: VendorKind,
        script: StdMutex<VecDeque<Result<Vec<CallRecord>, u16>>>,
        connect_ok: bool,
    }

    impl FakeVendorClient {
        fn scripted(vendor: VendorKind, script: Vec<Result<Vec<CallRecord>, u16>>) -> Arc<Self> {
            Arc::new(Self {
                vendor,
                script: StdMutex::new(script.into()),
                connect_ok: true,
            })
        }

        fn unreachable_vendor(vendor: VendorKind) -> Arc<Self> {
            Arc::new(Self {
                vendor,
                script: StdMutex::new(VecDeque::new()),
                connect_ok: false,
            })
        }
    }

    #[async_trait]
    impl VendorClient for FakeVendorClient {
        fn vendor(&self) -> VendorKind {
            self.vendor
        }

        async fn test_connection(&self) -> Result<(), VendorError> {
            if self.connect_ok {
                Ok(())
            } else {
                Err(VendorError::Http(503))
            }
        }

        async fn fetch_calls(&self, _: &FetchFilters) -> Result<Vec<CallRecord>, VendorError> {
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(records)) => Ok(records),
                Some(Err(status)) => Err(VendorError::Http(status)),
                None => Ok(Vec::new()),
            }
        }

        async fn recording_url(&self, _: &str) -> Result<Option<String>, VendorError> {
            Ok(None)
        }
    }

    struct FakeFactory {
        client: Arc<FakeVendorClient>,
    }

    impl VendorClientFactory for FakeFactory {
        fn client_for(
            &self,
            _: VendorKind,
            _: &IntegrationConfig,
        ) -> Result<Arc<dyn VendorClient>, VendorError> {
            Ok(self.client.clone())
        }
    }

    #[derive(Default)]
    struct FakeTranscriber {
        submitted: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn submit(&self, record: &CallRecord, _: Bytes) -> AppResult<String> {
            self.submitted.lock().unwrap().push(record.id.clone());
            Ok(format!("job-{}", record.id))
        }
    }

    struct FakeRecordings {
        fail_on: Option<String>,
    }

    #[async_trait]
    impl RecordingFetcher for FakeRecordings {
        async fn download(&self, url: &str) -> AppResult<Bytes> {
            if let Some(ref bad) = self.fail_on {
                if url.contains(bad.as_str()) {
                    return Err(AppError::RecordingDownload("status 404".to_string()));
                }
            }
            Ok(Bytes::from_static(b"audio"))
        }
    }

    struct Harness {
        manager: Arc<IntegrationManager>,
        integrations: Arc<InMemoryIntegrationRepository>,
        ledger: Arc<InMemoryCallRepository>,
        transcriber: Arc<FakeTranscriber>,
    }

    fn harness(client: Arc<FakeVendorClient>, fail_recording_on: Option<&str>) -> Harness {
        let integrations = Arc::new(InMemoryIntegrationRepository::new());
        let ledger = Arc::new(InMemoryCallRepository::new());
        let transcriber = Arc::new(FakeTranscriber::default());
        let manager = IntegrationManager::new(
            integrations.clone(),
            ledger.clone(),
            Arc::new(FakeFactory { client }),
            transcriber.clone(),
            Arc::new(FakeRecordings {
                fail_on: fail_recording_on.map(String::from),
            }),
        );
        Harness {
            manager,
            integrations,
            ledger,
            transcriber,
        }
    }

    fn new_request(auto_transcribe: bool) -> NewIntegration {
        NewIntegration {
            name: "test line".to_string(),
            vendor: VendorKind::Retreaver,
            config: IntegrationConfig {
                api_key: "key".to_string(),
                account_id: None,
                sync_interval_minutes: 5,
                auto_transcribe,
                filters: FetchFilters::default(),
            },
        }
    }

    fn record_with_recording(external_id: &str) -> CallRecord {
        let mut record = CallRecord::new(VendorKind::Retreaver, external_id);
        record.recording_url = Some(format!("https://rec.example.com/{}.mp3", external_id));
        record.duration_seconds = 60;
        record
    }

    #[tokio::test]
    async fn test_add_runs_immediate_sync_and_transcribes() {
        let client = FakeVendorClient::scripted(
            VendorKind::Retreaver,
            vec![Ok(vec![
                record_with_recording("c1"),
                record_with_recording("c2"),
            ])],
        );
        let h = harness(client, None);

        let integration = h.manager.clone().add_integration(new_request(true)).await.unwrap();

        assert_eq!(integration.status, IntegrationStatus::Active);
        assert_eq!(integration.total_calls, 2);
        assert!(integration.last_sync.is_some());
        assert_eq!(h.ledger.count().await.unwrap(), 2);
        assert_eq!(h.transcriber.submitted.lock().unwrap().len(), 2);

        let stored = h
            .ledger
            .find_by_id("retreaver-c1".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
        assert_eq!(stored.transcription_status, ProcessingStatus::Processing);
    }

    #[tokio::test]
    async fn test_failed_connectivity_stores_nothing() {
        let client = FakeVendorClient::unreachable_vendor(VendorKind::Retreaver);
        let h = harness(client, None);

        let result = h.manager.clone().add_integration(new_request(false)).await;

        assert!(result.is_err());
        assert_eq!(h.integrations.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_external_ids_processed_once() {
        // The same external id comes back in two consecutive cycles;
        // exactly one ledger record must result.
        let client = FakeVendorClient::scripted(
            VendorKind::Retreaver,
            vec![
                Ok(vec![record_with_recording("dup-1")]),
                Ok(vec![record_with_recording("dup-1")]),
            ],
        );
        let h = harness(client, None);

        let integration = h.manager.clone().add_integration(new_request(false)).await.unwrap();
        let outcome = h.manager.trigger_sync(integration.id).await.unwrap();

        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(h.ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_error_then_self_heals() {
        let client = FakeVendorClient::scripted(
            VendorKind::Retreaver,
            vec![
                Ok(vec![]),      // immediate sync on add
                Err(502),        // first scheduled cycle fails
                Ok(vec![record_with_recording("late-1")]),
            ],
        );
        let h = harness(client, None);
        let integration = h.manager.clone().add_integration(new_request(false)).await.unwrap();
        let synced_at = integration.last_sync;

        let err = h.manager.trigger_sync(integration.id).await.unwrap_err();
        assert!(matches!(err, AppError::VendorHttp { status: 502, .. }));

        let stored = h
            .integrations
            .find_by_id(integration.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, IntegrationStatus::Error);
        assert_eq!(stored.error_count, 1);
        // The failed window is not consumed
        assert_eq!(stored.last_sync, synced_at);

        // Next successful cycle heals the status back to active
        h.manager.trigger_sync(integration.id).await.unwrap();
        let healed = h
            .integrations
            .find_by_id(integration.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(healed.status, IntegrationStatus::Active);
        assert!(healed.last_sync > synced_at);
    }

    #[tokio::test]
    async fn test_record_failure_does_not_abort_batch() {
        let client = FakeVendorClient::scripted(
            VendorKind::Retreaver,
            vec![Ok(vec![
                record_with_recording("ok-1"),
                record_with_recording("bad-1"),
                record_with_recording("ok-2"),
            ])],
        );
        let h = harness(client, Some("bad-1"));

        let integration = h.manager.clone().add_integration(new_request(true)).await.unwrap();

        assert_eq!(integration.total_calls, 3);
        assert_eq!(integration.error_count, 1);
        assert_eq!(h.ledger.count().await.unwrap(), 3);

        let failed = h
            .ledger
            .find_by_id("retreaver-bad-1".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, ProcessingStatus::Failed);
        assert_eq!(failed.transcription_status, ProcessingStatus::Failed);

        let ok = h
            .ledger
            .find_by_id("retreaver-ok-2".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn test_sync_guard_rejects_reentrant_cycle() {
        let client = FakeVendorClient::scripted(VendorKind::Retreaver, vec![Ok(vec![])]);
        let h = harness(client, None);
        let integration = h.manager.clone().add_integration(new_request(false)).await.unwrap();

        let guard = h.manager.guard(integration.id);
        let _held = guard.lock().await;

        let err = h.manager.sync_integration(integration.id).await.unwrap_err();
        assert!(matches!(err, AppError::SyncInProgress(_)));
    }

    #[tokio::test]
    async fn test_remove_cancels_timer_and_deletes() {
        let client = FakeVendorClient::scripted(VendorKind::Retreaver, vec![Ok(vec![])]);
        let h = harness(client, None);
        let integration = h.manager.clone().add_integration(new_request(false)).await.unwrap();

        assert!(h.manager.remove_integration(integration.id).await.unwrap());
        assert_eq!(h.integrations.count().await.unwrap(), 0);
        assert!(h
            .manager
            .timers
            .lock()
            .unwrap()
            .get(&integration.id)
            .is_none());

        // Removing twice reports nothing left to delete
        assert!(!h.manager.remove_integration(integration.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_start_all_resumes_only_pollable() {
        let client = FakeVendorClient::scripted(VendorKind::Retreaver, vec![]);
        let h = harness(client, None);

        let mut active = Integration::new("a", VendorKind::Retreaver, new_request(false).config);
        active.status = IntegrationStatus::Active;
        let mut inactive = Integration::new("b", VendorKind::Retreaver, new_request(false).config);
        inactive.status = IntegrationStatus::Inactive;
        h.integrations.create(&active).await.unwrap();
        h.integrations.create(&inactive).await.unwrap();

        let started = h.manager.clone().start_all().await.unwrap();
        assert_eq!(started, 1);
    }
}
