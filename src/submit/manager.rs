use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{Settings, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{BuildError, SubmitFailure};
use crate::slots::store::FormState;
use crate::storage::database::{Database, SubmissionRecord, SERVICE_URL_KEY};

use super::api_client::{ApiClient, Transport};
use super::encoder::encode;
use super::response::classify;
use super::types::*;

/// Owns the form and drives one build at a time against the generation service.
///
/// The form is an immutable value swapped on every edit; a build keeps the
/// `Arc` it started with, so edits made while a request is in flight never
/// leak into it. Resizing bumps the generation so a late reply for the old
/// layout is dropped.
pub struct BuildManager<T: Transport> {
    transport: T,
    db: Option<Arc<Database>>,
    form: Mutex<Arc<FormState>>,
    status: Mutex<SubmissionState>,
    generation: AtomicU64,
    timeout: Duration,
}

impl BuildManager<ApiClient> {
    /// Service URL precedence: stored setting, then env/compile-time default.
    pub fn from_settings(settings: &Settings, db: Option<Arc<Database>>) -> Self {
        let service_url = db
            .as_ref()
            .and_then(|db| db.get_setting(SERVICE_URL_KEY))
            .unwrap_or_else(|| settings.service_url.clone());

        let api = ApiClient::with_timeout(&service_url, settings.request_timeout);
        clog!("Generation service: {}", api.base_url());

        let manager = Self::new(api).with_timeout(settings.request_timeout);
        match db {
            Some(db) => manager.with_database(db),
            None => manager,
        }
    }
}

impl<T: Transport> BuildManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            db: None,
            form: Mutex::new(Arc::new(FormState::default())),
            status: Mutex::new(SubmissionState::Idle),
            generation: AtomicU64::new(0),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Attach storage and restore the configuration of the last successful build.
    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        if let Some(config) = db.load_configuration() {
            clog!("Restored configuration \"{}\"", config.title);
            Arc::make_mut(self.form.get_mut().unwrap_or_else(PoisonError::into_inner))
                .config_mut()
                .clone_from(&config);
        }
        self.db = Some(db);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_form(self, form: FormState) -> Self {
        *self.lock_form() = Arc::new(form);
        self
    }

    // ── Form ────────────────────────────────────────────────────────────

    /// Snapshot of the current form.
    pub fn form(&self) -> Arc<FormState> {
        self.lock_form().clone()
    }

    /// Apply one edit. The new form replaces the old one in a single step.
    pub fn update_form<R>(&self, edit: impl FnOnce(&mut FormState) -> R) -> R {
        let (result, relaid) = {
            let mut form = self.lock_form();
            let epoch = form.layout_epoch();
            let result = edit(Arc::make_mut(&mut form));
            (result, form.layout_epoch() != epoch)
        };
        if relaid {
            self.invalidate_in_flight();
        }
        result
    }

    pub fn resize(&self, count: usize) -> usize {
        self.update_form(|form| form.resize(count))
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub fn status(&self) -> SubmissionState {
        self.lock_status().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// False while a build is in flight (the build action is disabled).
    pub fn can_build(&self) -> bool {
        !self.lock_status().is_submitting()
    }

    /// Encode the current form and submit it.
    ///
    /// Returns the terminal state of this attempt. A build requested while
    /// another is in flight is ignored with `BuildError::InFlight`.
    pub async fn build(&self) -> Result<SubmissionState, BuildError> {
        let snapshot = self.form();

        let (generation, payload) = {
            let mut status = self.lock_status();
            if status.is_submitting() {
                clog!("build: already submitting, ignoring");
                return Err(BuildError::InFlight);
            }

            let payload = encode(snapshot.slots(), snapshot.config()).map_err(|e| {
                clog!("build: form not ready: {}", e);
                e
            })?;

            if !matches!(*status, SubmissionState::Idle) {
                clog!("build: {} -> idle", status.label());
                *status = SubmissionState::Idle;
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = SubmissionState::Submitting { generation };
            (generation, payload)
        };

        clog!(
            "build #{}: submitting {} images ({} bytes)",
            generation,
            payload.images.len(),
            payload.total_bytes()
        );

        let result = match tokio::time::timeout(self.timeout, self.transport.submit(&payload)).await
        {
            Ok(Ok(raw)) => classify(raw),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(SubmitFailure::NetworkError(format!(
                "No response after {}s",
                self.timeout.as_secs()
            ))),
        };

        let next = {
            let mut status = self.lock_status();
            let current = matches!(
                *status,
                SubmissionState::Submitting { generation: g } if g == generation
            );
            if !current || self.form().layout_epoch() != snapshot.layout_epoch() {
                clog!("build #{}: form changed while in flight, discarding reply", generation);
                return Err(BuildError::Superseded);
            }

            let next = match result {
                Ok(outcome) => SubmissionState::Succeeded(outcome),
                Err(failure) => SubmissionState::Failed(failure),
            };
            *status = next.clone();
            next
        };

        self.after_build(generation, &snapshot, &next);
        Ok(next)
    }

    fn after_build(&self, generation: u64, snapshot: &FormState, state: &SubmissionState) {
        let (outcome, detail) = match state {
            SubmissionState::Succeeded(SubmissionOutcome::Archive(artifact)) => {
                clog!(
                    "build #{}: archive {} ({} bytes)",
                    generation,
                    artifact.file_name,
                    artifact.len()
                );
                ("archive", artifact.file_name.clone())
            }
            SubmissionState::Succeeded(SubmissionOutcome::Deployed { url, .. }) => {
                clog!("build #{}: deployed at {}", generation, url);
                ("deployed", url.clone())
            }
            SubmissionState::Failed(failure) => {
                clog!("ERROR: build #{} failed: {}", generation, failure);
                ("failed", failure.to_string())
            }
            _ => return,
        };

        let Some(db) = self.db.as_ref() else {
            return;
        };

        let record = SubmissionRecord::new(generation, snapshot.len(), outcome, detail);
        if let Err(e) = db.record_submission(&record) {
            clog!("ERROR: Failed to record submission: {}", e);
        }
        if matches!(state, SubmissionState::Succeeded(_)) {
            if let Err(e) = db.save_configuration(snapshot.config()) {
                clog!("ERROR: Failed to save configuration: {}", e);
            }
        }
    }

    fn invalidate_in_flight(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut status = self.lock_status();
        if let SubmissionState::Submitting { generation } = *status {
            clog!("build #{}: form resized, abandoning in-flight build", generation);
            *status = SubmissionState::Idle;
        }
    }

    fn lock_form(&self) -> MutexGuard<'_, Arc<FormState>> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_status(&self) -> MutexGuard<'_, SubmissionState> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use crate::slots::asset::Asset;
    use crate::slots::Configuration;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Replies with a canned result, optionally waiting for a go signal first.
    struct FakeTransport {
        reply: Mutex<Option<Result<RawResponse, SubmitFailure>>>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
        last_payload: Mutex<Option<SubmissionPayload>>,
    }

    impl FakeTransport {
        fn replying(reply: Result<RawResponse, SubmitFailure>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                gate: None,
                calls: AtomicUsize::new(0),
                last_payload: Mutex::new(None),
            }
        }

        fn gated(reply: Result<RawResponse, SubmitFailure>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::replying(reply)
            }
        }

        fn set_reply(&self, reply: Result<RawResponse, SubmitFailure>) {
            *self.reply.lock().unwrap() = Some(reply);
        }
    }

    impl Transport for FakeTransport {
        async fn submit(&self, payload: &SubmissionPayload) -> Result<RawResponse, SubmitFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self.reply.lock().unwrap().clone();
            reply.unwrap_or_else(|| Err(SubmitFailure::NetworkError("no reply".into())))
        }
    }

    fn json_reply(body: &str) -> Result<RawResponse, SubmitFailure> {
        Ok(RawResponse {
            status: 200,
            content_type: Some("application/json".into()),
            content_disposition: None,
            body: body.as_bytes().to_vec(),
        })
    }

    fn complete_form() -> FormState {
        let mut form = FormState::new(5);
        form.batch_assign((0..5).map(|i| Asset::new(format!("pic{}.png", i), vec![i as u8])));
        form
    }

    #[tokio::test]
    async fn test_url_reply_succeeds_with_that_url() {
        let manager =
            BuildManager::new(FakeTransport::replying(json_reply(r#"{"url":"https://example.com/site"}"#)))
                .with_form(complete_form());

        let state = manager.build().await.unwrap();
        match state {
            SubmissionState::Succeeded(outcome) => {
                assert_eq!(outcome.url(), Some("https://example.com/site"));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(manager.status(), manager.build().await.unwrap());
    }

    #[tokio::test]
    async fn test_network_failure_then_retry_is_permitted() {
        let transport = FakeTransport::replying(Err(SubmitFailure::NetworkError("refused".into())));
        let manager = BuildManager::new(transport).with_form(complete_form());

        let state = manager.build().await.unwrap();
        assert!(matches!(
            state,
            SubmissionState::Failed(SubmitFailure::NetworkError(_))
        ));
        assert!(manager.can_build());
        // Form survives a failure.
        assert!(manager.form().is_complete());

        manager.transport.set_reply(json_reply(r#"{"site_url":"https://ok.example"}"#));
        let state = manager.build().await.unwrap();
        assert!(matches!(state, SubmissionState::Succeeded(_)));
        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_incomplete_form_is_blocked_before_transport() {
        let manager = BuildManager::new(FakeTransport::replying(json_reply("{}")));

        let err = manager.build().await.unwrap_err();
        assert!(matches!(err, BuildError::Form(FormError::IncompleteForm(_))));
        assert_eq!(manager.status(), SubmissionState::Idle);
        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_build_while_submitting_is_ignored() {
        let gate = Arc::new(Notify::new());
        let manager = BuildManager::new(FakeTransport::gated(
            json_reply(r#"{"url":"https://one.example"}"#),
            gate.clone(),
        ))
        .with_form(complete_form());

        let (first, second) = tokio::join!(manager.build(), async {
            tokio::task::yield_now().await;
            assert!(!manager.can_build());
            let second = manager.build().await;
            gate.notify_one();
            second
        });

        assert_eq!(second.unwrap_err(), BuildError::InFlight);
        assert!(matches!(first.unwrap(), SubmissionState::Succeeded(_)));
        assert_eq!(manager.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_edits_during_flight_do_not_leak_into_payload() {
        let gate = Arc::new(Notify::new());
        let manager = BuildManager::new(FakeTransport::gated(
            json_reply(r#"{"url":"https://one.example"}"#),
            gate.clone(),
        ))
        .with_form(complete_form());

        let (first, _) = tokio::join!(manager.build(), async {
            tokio::task::yield_now().await;
            manager.update_form(|form| form.set_label(0, "edited")).unwrap();
            gate.notify_one();
        });

        assert!(matches!(first.unwrap(), SubmissionState::Succeeded(_)));
        let sent = manager.transport.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent.filenames[0], "pic0");
        assert_eq!(manager.form().slot(0).unwrap().label, "edited");
    }

    #[tokio::test]
    async fn test_resize_mid_flight_discards_reply() {
        let gate = Arc::new(Notify::new());
        let manager = BuildManager::new(FakeTransport::gated(
            json_reply(r#"{"url":"https://stale.example"}"#),
            gate.clone(),
        ))
        .with_form(complete_form());

        let (first, _) = tokio::join!(manager.build(), async {
            tokio::task::yield_now().await;
            manager.resize(7);
            assert!(manager.can_build());
            gate.notify_one();
        });

        assert_eq!(first.unwrap_err(), BuildError::Superseded);
        assert_eq!(manager.status(), SubmissionState::Idle);
        assert_eq!(manager.form().len(), 7);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let gate = Arc::new(Notify::new());
        let manager = BuildManager::new(FakeTransport::gated(json_reply("{}"), gate))
            .with_form(complete_form())
            .with_timeout(Duration::from_millis(20));

        let state = manager.build().await.unwrap();
        assert!(matches!(
            state,
            SubmissionState::Failed(SubmitFailure::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_success_is_recorded_and_configuration_restored() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut form = complete_form();
        *form.config_mut() = Configuration {
            title: "Stored".into(),
            ..Configuration::default()
        };

        let manager = BuildManager::new(FakeTransport::replying(Ok(RawResponse {
            status: 200,
            content_type: Some("application/zip".into()),
            content_disposition: None,
            body: b"PK\x03\x04".to_vec(),
        })))
        .with_database(db.clone())
        .with_form(form);

        let state = manager.build().await.unwrap();
        assert!(matches!(
            state,
            SubmissionState::Succeeded(SubmissionOutcome::Archive(_))
        ));

        let records = db.recent_submissions(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, "archive");
        assert_eq!(records[0].slot_count, 5);

        let restored = BuildManager::new(FakeTransport::replying(json_reply("{}")))
            .with_database(db);
        assert_eq!(restored.form().config().title, "Stored");
    }
}
