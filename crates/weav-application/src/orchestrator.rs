//! Generation orchestrator.
//!
//! Runs one submit→poll→refresh cycle per invocation. The `sending` flag is
//! a presentation-level guard against overlapping invocations, not a lock:
//! callers are expected to disable their affordances while it is set.
//! Concurrent invocations against the same session are outside the
//! contract; the backend accepts them, and nothing here or server-side
//! enforces mutual exclusion across processes.
//!
//! Cancellation is cooperative. `stop()` cancels the invocation's token and
//! the poll loop checks it at the top of each iteration; the in-flight
//! status request is not aborted at the transport level, only the next
//! iteration and the completion refresh are skipped. A cancel call is
//! additionally forwarded to the backend, best effort.

use crate::directory::SessionDirectory;
use crate::poll::{PollConfig, Sleeper, TokioSleeper};
use crate::preferences::PreferenceStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use weav_core::error::Result;
use weav_core::generation::{GenerationApi, ImageRegenOptions, ImageRequest};
use weav_core::job::JobState;
use weav_core::models::ImageOptionPatch;
use weav_core::session::SessionKind;

const TIMEOUT_MESSAGE: &str = "Timed out waiting for the generation to complete.";

/// A transient (session, prompt) pair.
///
/// Used for the regenerate intents ("edit and resubmit the last exchange")
/// and for showing an image prompt before its job resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub session_id: i64,
    pub prompt: String,
}

/// Call-site additions to a `send_image` invocation.
///
/// The reference fields take precedence over the stored selection; the
/// option patch wins field-by-field over the stored settings.
#[derive(Debug, Clone, Default)]
pub struct SendImageOverrides {
    pub reference_image_id: Option<i64>,
    pub reference_image_url: Option<String>,
    pub options: ImageOptionPatch,
}

/// Options for a chat regeneration.
#[derive(Debug, Clone, Default)]
pub struct RegenerateChatOptions {
    /// Replacement model; defaults to the session's stored preference
    pub model: Option<String>,
    /// Replacement prompt; the backend reuses the last user prompt when
    /// absent
    pub prompt: Option<String>,
}

/// Options for an image regeneration.
#[derive(Debug, Clone, Default)]
pub struct RegenerateImageOptions {
    /// Replacement prompt, shown via the pending marker while the job runs
    pub prompt: Option<String>,
    pub options: ImageOptionPatch,
}

/// Drives chat and image generation requests through the backend job API.
pub struct GenerationOrchestrator {
    api: Arc<dyn GenerationApi>,
    directory: Arc<SessionDirectory>,
    preferences: Arc<PreferenceStore>,
    poll: PollConfig,
    sleeper: Arc<dyn Sleeper>,
    sending: AtomicBool,
    error: Mutex<Option<String>>,
    cancel: Mutex<CancellationToken>,
    active_task: Mutex<Option<String>>,
    pending_image: Mutex<Option<PendingRequest>>,
    regenerate_chat_intent: Mutex<Option<PendingRequest>>,
    regenerate_image_intent: Mutex<Option<PendingRequest>>,
}

impl GenerationOrchestrator {
    pub fn new(
        api: Arc<dyn GenerationApi>,
        directory: Arc<SessionDirectory>,
        preferences: Arc<PreferenceStore>,
    ) -> Self {
        Self {
            api,
            directory,
            preferences,
            poll: PollConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            sending: AtomicBool::new(false),
            error: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            active_task: Mutex::new(None),
            pending_image: Mutex::new(None),
            regenerate_chat_intent: Mutex::new(None),
            regenerate_image_intent: Mutex::new(None),
        }
    }

    /// Overrides the polling parameters.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Overrides the sleep implementation.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Whether an invocation is in flight. Presentation-level guard only.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    /// The error of the most recent invocation, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.error.lock().unwrap().clone()
    }

    pub fn clear_error(&self) {
        *self.error.lock().unwrap() = None;
    }

    /// The prompt of the image request currently awaiting its job, if any.
    pub fn pending_image_request(&self) -> Option<PendingRequest> {
        self.pending_image.lock().unwrap().clone()
    }

    /// The chat exchange queued for editing, if any.
    pub fn regenerate_prompt(&self) -> Option<PendingRequest> {
        self.regenerate_chat_intent.lock().unwrap().clone()
    }

    pub fn set_regenerate_prompt(&self, session_id: i64, prompt: impl Into<String>) {
        *self.regenerate_chat_intent.lock().unwrap() = Some(PendingRequest {
            session_id,
            prompt: prompt.into(),
        });
    }

    pub fn clear_regenerate_prompt(&self) {
        *self.regenerate_chat_intent.lock().unwrap() = None;
    }

    /// The image prompt queued for editing, if any.
    pub fn regenerate_image_prompt(&self) -> Option<PendingRequest> {
        self.regenerate_image_intent.lock().unwrap().clone()
    }

    pub fn set_regenerate_image_prompt(&self, session_id: i64, prompt: impl Into<String>) {
        *self.regenerate_image_intent.lock().unwrap() = Some(PendingRequest {
            session_id,
            prompt: prompt.into(),
        });
    }

    pub fn clear_regenerate_image_prompt(&self) {
        *self.regenerate_image_intent.lock().unwrap() = None;
    }

    /// Submits a chat completion for the current session and polls it to
    /// completion. No-op unless the current session is a chat session.
    pub async fn send_chat(&self, prompt: &str, model: &str) {
        let Some(session) = self.directory.current() else {
            return;
        };
        if session.kind != SessionKind::Chat {
            return;
        }
        let session_id = session.id;

        let token = self.begin();
        let outcome = async {
            let ticket = self
                .api
                .complete_chat(session_id, prompt, model, None)
                .await?;
            self.track(&ticket.task_id);
            self.directory.refresh_one(session_id).await;
            self.poll_job(&ticket.task_id, session_id, &token).await
        }
        .await;
        self.settle(outcome);
    }

    /// Submits an image generation for the current session and polls it to
    /// completion. No-op unless the current session is an image session.
    ///
    /// The pending marker is set for the duration so the prompt can be
    /// displayed before the job resolves, and cleared on every exit path.
    pub async fn send_image(&self, prompt: &str, model: &str, overrides: &SendImageOverrides) {
        let Some(session) = self.directory.current() else {
            return;
        };
        if session.kind != SessionKind::Image {
            return;
        }
        let session_id = session.id;

        let token = self.begin();
        *self.pending_image.lock().unwrap() = Some(PendingRequest {
            session_id,
            prompt: prompt.to_string(),
        });

        let request = self.build_image_request(session_id, prompt, model, overrides);
        let outcome = async {
            let ticket = self.api.complete_image(session_id, &request).await?;
            self.track(&ticket.task_id);
            self.directory.refresh_one(session_id).await;
            self.poll_job(&ticket.task_id, session_id, &token).await
        }
        .await;

        *self.pending_image.lock().unwrap() = None;
        self.settle(outcome);
    }

    /// Resubmits the session's last chat exchange. No-op unless
    /// `session_id` is the current chat session.
    pub async fn regenerate_chat(&self, session_id: i64, options: &RegenerateChatOptions) {
        let Some(session) = self.directory.current() else {
            return;
        };
        if session.kind != SessionKind::Chat || session.id != session_id {
            return;
        }
        self.clear_regenerate_prompt();

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.preferences.chat_model(session_id));
        let prompt = options.prompt.as_deref().filter(|p| !p.is_empty());

        let token = self.begin();
        let outcome = async {
            let ticket = self
                .api
                .regenerate_chat(session_id, Some(&model), prompt)
                .await?;
            self.track(&ticket.task_id);
            self.directory.refresh_one(session_id).await;
            self.poll_job(&ticket.task_id, session_id, &token).await
        }
        .await;
        self.settle(outcome);
    }

    /// Resubmits the session's most recent image generation. No-op unless
    /// `session_id` is the current image session.
    pub async fn regenerate_image(&self, session_id: i64, options: &RegenerateImageOptions) {
        let Some(session) = self.directory.current() else {
            return;
        };
        if session.kind != SessionKind::Image || session.id != session_id {
            return;
        }
        self.clear_regenerate_image_prompt();

        if let Some(prompt) = &options.prompt {
            *self.pending_image.lock().unwrap() = Some(PendingRequest {
                session_id,
                prompt: prompt.clone(),
            });
        }

        let model = self.preferences.image_model(session_id);
        let mut merged = self.preferences.image_settings(session_id, &model);
        merged.apply(&options.options);
        let regen = ImageRegenOptions {
            aspect_ratio: Some(merged.aspect_ratio),
            resolution: merged.resolution,
            output_format: merged.output_format,
            seed: merged.seed,
        };

        let token = self.begin();
        let outcome = async {
            let ticket = self.api.regenerate_image(session_id, &regen).await?;
            self.track(&ticket.task_id);
            self.directory.refresh_one(session_id).await;
            self.poll_job(&ticket.task_id, session_id, &token).await
        }
        .await;

        *self.pending_image.lock().unwrap() = None;
        self.settle(outcome);
    }

    /// Cancels the active invocation.
    ///
    /// `sending` flips false immediately for responsiveness; the poll loop
    /// notices the cancelled token at its next iteration and exits without
    /// refreshing or surfacing an error. If a task is tracked, a cancel is
    /// forwarded to the backend so server-side work may stop too; its
    /// outcome is ignored.
    pub fn stop(&self) {
        self.cancel.lock().unwrap().cancel();
        self.sending.store(false, Ordering::SeqCst);
        self.clear_regenerate_prompt();
        self.clear_regenerate_image_prompt();

        let task_id = self.active_task.lock().unwrap().take();
        if let Some(task_id) = task_id {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                if let Err(err) = api.cancel_job(&task_id).await {
                    tracing::debug!("backend cancel for task {task_id} failed: {err}");
                }
            });
        }
    }

    /// Starts an invocation: raises `sending`, clears the previous error,
    /// and installs a fresh cancellation token.
    fn begin(&self) -> CancellationToken {
        self.sending.store(true, Ordering::SeqCst);
        *self.error.lock().unwrap() = None;
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();
        token
    }

    /// Ends an invocation: folds a failure into the error slot and lowers
    /// `sending`. Runs on every exit path.
    fn settle(&self, outcome: Result<()>) {
        if let Err(err) = outcome {
            self.untrack();
            *self.error.lock().unwrap() = Some(err.user_message());
        }
        self.sending.store(false, Ordering::SeqCst);
    }

    fn track(&self, task_id: &str) {
        *self.active_task.lock().unwrap() = Some(task_id.to_string());
    }

    fn untrack(&self) {
        *self.active_task.lock().unwrap() = None;
    }

    fn build_image_request(
        &self,
        session_id: i64,
        prompt: &str,
        model: &str,
        overrides: &SendImageOverrides,
    ) -> ImageRequest {
        // URL beats id; configuring either side clears the other
        let reference_url = overrides
            .reference_image_url
            .clone()
            .or_else(|| self.preferences.reference_image_url(session_id))
            .filter(|url| !url.is_empty());
        let reference_id = if reference_url.is_none() {
            overrides
                .reference_image_id
                .or_else(|| self.preferences.reference_image_id(session_id))
        } else {
            None
        };

        let mut options = self.preferences.image_settings(session_id, model);
        options.apply(&overrides.options);

        ImageRequest {
            prompt: prompt.to_string(),
            model: model.to_string(),
            aspect_ratio: options.aspect_ratio,
            num_images: options.num_images,
            reference_image_id: reference_id,
            reference_image_url: reference_url,
            resolution: options.resolution,
            output_format: options.output_format,
            seed: options.seed,
        }
    }

    /// Polls the job until it is terminal, the attempt budget runs out, or
    /// the token is cancelled.
    ///
    /// Terminal and timeout exits refresh the owning session; the failure
    /// or timeout error is surfaced only when the refresh reports the
    /// session still current, so errors of an abandoned session never show
    /// against whatever the user is viewing now. Status-query transport
    /// errors propagate to the caller.
    async fn poll_job(
        &self,
        task_id: &str,
        session_id: i64,
        token: &CancellationToken,
    ) -> Result<()> {
        for _ in 0..self.poll.max_attempts {
            if token.is_cancelled() {
                self.untrack();
                return Ok(());
            }

            let status = self.api.job_status(task_id).await?;
            if status.status.is_terminal() {
                self.untrack();
                let still_current = self.directory.refresh_one(session_id).await;
                if status.status == JobState::Failure
                    && still_current
                    && let Some(message) = status.error
                {
                    *self.error.lock().unwrap() = Some(message);
                }
                return Ok(());
            }

            self.sleeper.sleep(self.poll.interval).await;
        }

        self.untrack();
        let still_current = self.directory.refresh_one(session_id).await;
        if still_current {
            *self.error.lock().unwrap() = Some(TIMEOUT_MESSAGE.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;
    use weav_core::WeavError;
    use weav_core::job::{JobStatus, JobTicket};
    use weav_core::preferences::PreferenceStorage;
    use weav_core::session::{Message, Role, Session, SessionApi};

    fn session(id: i64, kind: SessionKind) -> Session {
        Session {
            id,
            kind,
            title: format!("session {id}"),
            created_at: "2025-06-01T10:00:00Z".to_string(),
            updated_at: "2025-06-01T10:00:00Z".to_string(),
            messages: Vec::new(),
            image_records: Vec::new(),
        }
    }

    fn ticket(task_id: &str) -> JobTicket {
        JobTicket {
            task_id: task_id.to_string(),
            job_id: 1,
            message_id: None,
        }
    }

    fn status(task_id: &str, state: JobState) -> JobStatus {
        JobStatus {
            task_id: task_id.to_string(),
            job_id: 1,
            status: state,
            message: None,
            image: None,
            error: None,
        }
    }

    struct NullStorage;

    impl PreferenceStorage for NullStorage {
        fn load(&self) -> weav_core::Result<Option<String>> {
            Ok(None)
        }
        fn save(&self, _payload: &str) -> weav_core::Result<()> {
            Ok(())
        }
    }

    struct MockSessionApi {
        sessions: Mutex<HashMap<i64, Session>>,
        fetch_calls: AtomicUsize,
    }

    impl MockSessionApi {
        fn new(seed: Vec<Session>) -> Self {
            Self {
                sessions: Mutex::new(seed.into_iter().map(|s| (s.id, s)).collect()),
                fetch_calls: AtomicUsize::new(0),
            }
        }

        fn set_session(&self, session: Session) {
            self.sessions.lock().unwrap().insert(session.id, session);
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionApi for MockSessionApi {
        async fn list(&self, _kind: Option<SessionKind>) -> weav_core::Result<Vec<Session>> {
            Ok(self.sessions.lock().unwrap().values().cloned().collect())
        }

        async fn fetch(&self, session_id: i64) -> weav_core::Result<Session> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.sessions
                .lock()
                .unwrap()
                .get(&session_id)
                .cloned()
                .ok_or_else(|| WeavError::not_found("Session", session_id.to_string()))
        }

        async fn create(
            &self,
            _kind: SessionKind,
            _title: Option<String>,
        ) -> weav_core::Result<Session> {
            unimplemented!("not used by orchestrator tests")
        }

        async fn rename(&self, _session_id: i64, _title: &str) -> weav_core::Result<Session> {
            unimplemented!("not used by orchestrator tests")
        }

        async fn delete(&self, _session_id: i64) -> weav_core::Result<()> {
            unimplemented!("not used by orchestrator tests")
        }
    }

    #[derive(Default)]
    struct MockGenerationApi {
        /// Statuses returned by consecutive job_status calls; when drained,
        /// the job reports `running` forever.
        statuses: Mutex<VecDeque<JobStatus>>,
        submit_error: Mutex<Option<WeavError>>,
        chat_submissions: Mutex<Vec<(i64, String, String)>>,
        regen_chat_submissions: Mutex<Vec<(i64, Option<String>, Option<String>)>>,
        image_submissions: Mutex<Vec<ImageRequest>>,
        regen_image_submissions: Mutex<Vec<ImageRegenOptions>>,
        cancel_calls: Mutex<Vec<String>>,
        status_calls: AtomicUsize,
    }

    impl MockGenerationApi {
        fn with_statuses(statuses: Vec<JobStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn failing_submit(error: WeavError) -> Self {
            Self {
                submit_error: Mutex::new(Some(error)),
                ..Default::default()
            }
        }

        fn take_submit_error(&self) -> weav_core::Result<()> {
            match self.submit_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl GenerationApi for MockGenerationApi {
        async fn complete_chat(
            &self,
            session_id: i64,
            prompt: &str,
            model: &str,
            _system_prompt: Option<&str>,
        ) -> weav_core::Result<JobTicket> {
            self.take_submit_error()?;
            self.chat_submissions.lock().unwrap().push((
                session_id,
                prompt.to_string(),
                model.to_string(),
            ));
            Ok(ticket("task-1"))
        }

        async fn regenerate_chat(
            &self,
            session_id: i64,
            model: Option<&str>,
            prompt: Option<&str>,
        ) -> weav_core::Result<JobTicket> {
            self.take_submit_error()?;
            self.regen_chat_submissions.lock().unwrap().push((
                session_id,
                model.map(String::from),
                prompt.map(String::from),
            ));
            Ok(ticket("task-1"))
        }

        async fn complete_image(
            &self,
            _session_id: i64,
            request: &ImageRequest,
        ) -> weav_core::Result<JobTicket> {
            self.take_submit_error()?;
            self.image_submissions.lock().unwrap().push(request.clone());
            Ok(ticket("task-1"))
        }

        async fn regenerate_image(
            &self,
            _session_id: i64,
            options: &ImageRegenOptions,
        ) -> weav_core::Result<JobTicket> {
            self.take_submit_error()?;
            self.regen_image_submissions
                .lock()
                .unwrap()
                .push(options.clone());
            Ok(ticket("task-1"))
        }

        async fn job_status(&self, task_id: &str) -> weav_core::Result<JobStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| status(task_id, JobState::Running)))
        }

        async fn cancel_job(&self, task_id: &str) -> weav_core::Result<()> {
            self.cancel_calls.lock().unwrap().push(task_id.to_string());
            Ok(())
        }

        async fn upload_reference_image(
            &self,
            _file_name: &str,
            _bytes: Vec<u8>,
        ) -> weav_core::Result<String> {
            unimplemented!("not used by orchestrator tests")
        }
    }

    /// Sleeper that counts invocations and yields without waiting.
    #[derive(Default)]
    struct CountingSleeper {
        slept: AtomicUsize,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.slept.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }

    /// Sleeper that parks until released, so a test can act mid-poll.
    #[derive(Default)]
    struct GatedSleeper {
        slept: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl Sleeper for GatedSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.slept.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
        }
    }

    struct Fixture {
        session_api: Arc<MockSessionApi>,
        generation_api: Arc<MockGenerationApi>,
        directory: Arc<SessionDirectory>,
        preferences: Arc<PreferenceStore>,
    }

    impl Fixture {
        fn new(sessions: Vec<Session>, generation_api: MockGenerationApi) -> Self {
            let session_api = Arc::new(MockSessionApi::new(sessions));
            let directory = Arc::new(SessionDirectory::new(session_api.clone()));
            let preferences = Arc::new(PreferenceStore::new(Arc::new(NullStorage)));
            Self {
                session_api,
                generation_api: Arc::new(generation_api),
                directory,
                preferences,
            }
        }

        fn orchestrator(&self, poll: PollConfig, sleeper: Arc<dyn Sleeper>) -> GenerationOrchestrator {
            GenerationOrchestrator::new(
                self.generation_api.clone(),
                self.directory.clone(),
                self.preferences.clone(),
            )
            .with_poll_config(poll)
            .with_sleeper(sleeper)
        }
    }

    fn fast_poll(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn chat_success_refreshes_the_session() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            MockGenerationApi::with_statuses(vec![
                status("task-1", JobState::Pending),
                JobStatus {
                    message: Some(Message {
                        id: 1,
                        role: Role::Assistant,
                        content: "hello".to_string(),
                        created_at: "2025-06-01T10:01:02Z".to_string(),
                    }),
                    ..status("task-1", JobState::Success)
                },
            ]),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        // The backend appends the exchange while the job runs
        let mut completed = session(7, SessionKind::Chat);
        completed.messages = vec![
            Message {
                id: 0,
                role: Role::User,
                content: "hi".to_string(),
                created_at: "2025-06-01T10:01:00Z".to_string(),
            },
            Message {
                id: 1,
                role: Role::Assistant,
                content: "hello".to_string(),
                created_at: "2025-06-01T10:01:02Z".to_string(),
            },
        ];
        fixture.session_api.set_session(completed);

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator.send_chat("hi", "model-x").await;

        assert!(!orchestrator.is_sending());
        assert_eq!(orchestrator.last_error(), None);
        let current = fixture.directory.current().unwrap();
        assert!(
            current
                .messages
                .iter()
                .any(|m| m.role == Role::Assistant && m.content == "hello")
        );
        let submissions = fixture.generation_api.chat_submissions.lock().unwrap();
        assert_eq!(submissions.as_slice(), &[(7, "hi".to_string(), "model-x".to_string())]);
    }

    #[tokio::test]
    async fn send_chat_is_a_noop_without_a_current_chat_session() {
        let fixture = Fixture::new(
            vec![session(3, SessionKind::Image)],
            MockGenerationApi::default(),
        );
        fixture.directory.select(Some(3)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator.send_chat("hi", "model-x").await;

        assert!(fixture.generation_api.chat_submissions.lock().unwrap().is_empty());
        assert!(!orchestrator.is_sending());
    }

    #[tokio::test]
    async fn submission_failure_surfaces_without_polling() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            MockGenerationApi::failing_submit(WeavError::api(400, "Not a chat session")),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator.send_chat("hi", "model-x").await;

        assert_eq!(orchestrator.last_error().as_deref(), Some("Not a chat session"));
        assert!(!orchestrator.is_sending());
        assert_eq!(fixture.generation_api.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn poll_exhaustion_surfaces_a_timeout() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            // No terminal status ever arrives
            MockGenerationApi::with_statuses(vec![]),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        let sleeper = Arc::new(CountingSleeper::default());
        let orchestrator = fixture.orchestrator(fast_poll(5), sleeper.clone());
        orchestrator.send_chat("hi", "model-x").await;

        assert_eq!(orchestrator.last_error().as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(!orchestrator.is_sending());
        // Exactly the configured attempt budget
        assert_eq!(fixture.generation_api.status_calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.slept.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn job_failure_surfaces_the_server_error_when_still_current() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            MockGenerationApi::with_statuses(vec![JobStatus {
                error: Some("model unavailable".to_string()),
                ..status("task-1", JobState::Failure)
            }]),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator.send_chat("hi", "model-x").await;

        assert_eq!(orchestrator.last_error().as_deref(), Some("model unavailable"));
        assert!(!orchestrator.is_sending());
    }

    /// Sleeper that navigates to another session on its first invocation,
    /// simulating the user leaving mid-generation.
    struct NavigatingSleeper {
        directory: Arc<SessionDirectory>,
        target: i64,
        navigated: AtomicBool,
    }

    #[async_trait]
    impl Sleeper for NavigatingSleeper {
        async fn sleep(&self, _duration: Duration) {
            if !self.navigated.swap(true, Ordering::SeqCst) {
                self.directory.select(Some(self.target)).await.unwrap();
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn job_failure_is_suppressed_after_navigating_away() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat), session(8, SessionKind::Chat)],
            MockGenerationApi::with_statuses(vec![
                status("task-1", JobState::Running),
                JobStatus {
                    error: Some("model unavailable".to_string()),
                    ..status("task-1", JobState::Failure)
                },
            ]),
        );
        fixture.directory.load_sessions().await.unwrap();
        fixture.directory.select(Some(7)).await.unwrap();

        let sleeper = Arc::new(NavigatingSleeper {
            directory: fixture.directory.clone(),
            target: 8,
            navigated: AtomicBool::new(false),
        });
        let orchestrator = fixture.orchestrator(fast_poll(60), sleeper);
        orchestrator.send_chat("hi", "model-x").await;

        // The error belonged to session 7, which is no longer on screen
        assert_eq!(orchestrator.last_error(), None);
        assert_eq!(fixture.directory.current_id(), Some(8));
        assert!(!orchestrator.is_sending());
    }

    #[tokio::test]
    async fn stop_cancels_silently_and_notifies_the_backend() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            // Never terminal: the poll would spin until stopped
            MockGenerationApi::with_statuses(vec![]),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        let sleeper = Arc::new(GatedSleeper::default());
        let orchestrator = Arc::new(fixture.orchestrator(fast_poll(60), sleeper.clone()));

        let invocation = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.send_chat("hi", "model-x").await })
        };

        // Wait for the poll to park in its first delay
        while sleeper.slept.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        let fetches_before = fixture.session_api.fetches();

        orchestrator.stop();
        assert!(!orchestrator.is_sending());

        sleeper.release.notify_waiters();
        invocation.await.unwrap();

        // Silent: no error, no completion refresh
        assert_eq!(orchestrator.last_error(), None);
        assert_eq!(fixture.session_api.fetches(), fetches_before);

        // The backend cancel was fired for the tracked task
        tokio::task::yield_now().await;
        assert_eq!(
            fixture.generation_api.cancel_calls.lock().unwrap().as_slice(),
            &["task-1".to_string()]
        );
    }

    #[tokio::test]
    async fn call_site_reference_url_beats_stored_id() {
        let fixture = Fixture::new(
            vec![session(3, SessionKind::Image)],
            MockGenerationApi::with_statuses(vec![status("task-1", JobState::Success)]),
        );
        fixture.directory.select(Some(3)).await.unwrap();
        fixture.preferences.set_reference_image_id(3, Some(5));

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator
            .send_image(
                "a fox",
                "fal-ai/imagen4/preview",
                &SendImageOverrides {
                    reference_image_url: Some("http://x/y.png".to_string()),
                    ..Default::default()
                },
            )
            .await;

        let submissions = fixture.generation_api.image_submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0].reference_image_url.as_deref(),
            Some("http://x/y.png")
        );
        assert_eq!(submissions[0].reference_image_id, None);
    }

    #[tokio::test]
    async fn stored_settings_yield_to_call_site_options() {
        let fixture = Fixture::new(
            vec![session(3, SessionKind::Image)],
            MockGenerationApi::with_statuses(vec![status("task-1", JobState::Success)]),
        );
        fixture.directory.select(Some(3)).await.unwrap();
        fixture.preferences.set_image_settings(
            3,
            &ImageOptionPatch {
                aspect_ratio: Some("16:9".to_string()),
                num_images: Some(2),
                ..Default::default()
            },
        );

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator
            .send_image(
                "a fox",
                "fal-ai/imagen4/preview",
                &SendImageOverrides {
                    options: ImageOptionPatch {
                        aspect_ratio: Some("9:16".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await;

        let submissions = fixture.generation_api.image_submissions.lock().unwrap();
        assert_eq!(submissions[0].aspect_ratio, "9:16");
        assert_eq!(submissions[0].num_images, 2);
    }

    #[tokio::test]
    async fn pending_marker_is_cleared_even_when_the_submit_fails() {
        let fixture = Fixture::new(
            vec![session(3, SessionKind::Image)],
            MockGenerationApi::failing_submit(WeavError::http("connection refused")),
        );
        fixture.directory.select(Some(3)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator
            .send_image("a fox", "fal-ai/imagen4/preview", &SendImageOverrides::default())
            .await;

        assert_eq!(orchestrator.pending_image_request(), None);
        assert!(orchestrator.last_error().is_some());
        assert!(!orchestrator.is_sending());
    }

    #[tokio::test]
    async fn regenerate_chat_elsewhere_is_a_noop() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat), session(8, SessionKind::Chat)],
            MockGenerationApi::default(),
        );
        fixture.directory.select(Some(7)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator
            .regenerate_chat(8, &RegenerateChatOptions::default())
            .await;

        assert!(fixture.generation_api.regen_chat_submissions.lock().unwrap().is_empty());
        assert!(!orchestrator.is_sending());
    }

    #[tokio::test]
    async fn regenerate_chat_defaults_to_the_stored_model() {
        let fixture = Fixture::new(
            vec![session(7, SessionKind::Chat)],
            MockGenerationApi::with_statuses(vec![status("task-1", JobState::Success)]),
        );
        fixture.directory.select(Some(7)).await.unwrap();
        fixture.preferences.set_chat_model(7, "openai/gpt-4o");

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator.set_regenerate_prompt(7, "edited prompt");
        orchestrator
            .regenerate_chat(7, &RegenerateChatOptions::default())
            .await;

        let submissions = fixture.generation_api.regen_chat_submissions.lock().unwrap();
        assert_eq!(
            submissions.as_slice(),
            &[(7, Some("openai/gpt-4o".to_string()), None)]
        );
        // The queued intent is consumed by the submission
        assert_eq!(orchestrator.regenerate_prompt(), None);
    }

    #[tokio::test]
    async fn regenerate_image_sends_the_merged_option_subset() {
        let fixture = Fixture::new(
            vec![session(3, SessionKind::Image)],
            MockGenerationApi::with_statuses(vec![status("task-1", JobState::Success)]),
        );
        fixture.directory.select(Some(3)).await.unwrap();

        let orchestrator =
            fixture.orchestrator(fast_poll(60), Arc::new(CountingSleeper::default()));
        orchestrator
            .regenerate_image(
                3,
                &RegenerateImageOptions {
                    prompt: Some("a red fox".to_string()),
                    options: ImageOptionPatch {
                        seed: Some(11),
                        ..Default::default()
                    },
                },
            )
            .await;

        let submissions = fixture.generation_api.regen_image_submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].aspect_ratio.as_deref(), Some("1:1"));
        assert_eq!(submissions[0].seed, Some(11));
        // The marker was visible during the run and cleared afterwards
        assert_eq!(orchestrator.pending_image_request(), None);
    }
}
