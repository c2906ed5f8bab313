use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::archive::{archive_digest, ArchiveBuilder, ArchiveEntry};
use crate::config::{
    ARCHIVE_CONTENT_TYPE, ARCHIVE_FILE_NAME, REPORT_FILE_NAME, SAMPLE_PERIOD_SECS,
    SCRIPT_CONTENT_TYPE, SCRIPT_FILE_NAME,
};
use crate::error::PilotError;
use crate::event_log::{EventLog, LogLevel, LogSource};
use crate::prompt::{GenerateScriptRequest, PromptService, SuggestPlanRequest};
use crate::sampling::{RunPlan, SamplingTask, TickSink};
use crate::session::{compose_test_plan, RunConfig, RunProgress, Sample, Session};

pub const ANALYZE_FAILED_MESSAGE: &str =
    "Failed to analyze API. Please check the Swagger/OpenAPI spec and try again.";
pub const SCRIPT_FAILED_MESSAGE: &str =
    "Failed to generate k6 script. Please review your test plan and try again.";
pub const ARCHIVE_FAILED_MESSAGE: &str = "Failed to create archive.";

// --- Response types ---

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: Session,
    pub loading: bool,
    pub step_title: &'static str,
    pub step_description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedArchive {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub entries: Vec<String>,
    pub archive_base64: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptDownload {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

// --- In-flight gates ---

struct InFlight {
    name: &'static str,
    flag: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InFlight {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            flag: AtomicBool::new(false),
        }
    }

    fn try_enter(&self) -> Result<InFlightGuard<'_>, PilotError> {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PilotError::Busy(self.name))?;
        Ok(InFlightGuard(&self.flag))
    }

    fn is_active(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// --- Session storage ---

struct SessionSlot {
    session: Session,
    /// Bumped on reset; late prompt/archive results from an older generation are dropped.
    generation: u64,
    /// Bumped on every run start and on reset; ticks from older runs are dropped.
    run_epoch: u64,
}

/// Applies sampling ticks to the session.
struct SessionSink {
    slot: Arc<RwLock<SessionSlot>>,
    logs: Arc<EventLog>,
}

#[async_trait]
impl TickSink for SessionSink {
    async fn on_tick(&self, epoch: u64, sample: Sample) -> bool {
        let mut slot = self.slot.write().await;
        if slot.run_epoch != epoch {
            return false;
        }
        let time = sample.time;
        let recorded = slot.session.record_sample(sample);
        match recorded {
            Some(next) => {
                slot.session = next;
                debug!("Run {} recorded sample {}", epoch, time);
                true
            }
            None => false,
        }
    }

    async fn on_complete(&self, epoch: u64) {
        let samples = {
            let mut slot = self.slot.write().await;
            if slot.run_epoch != epoch || !slot.session.running {
                return;
            }
            slot.session = slot.session.complete_run();
            slot.session.samples.len()
        };
        info!("Simulated run {} completed with {} samples", epoch, samples);
        self.logs
            .emit(
                LogSource::Simulation,
                LogLevel::Info,
                format!("Test completed: {} samples", samples),
            )
            .await;
    }
}

// --- Wizard ---

/// Drives one session through Upload → Plan → Script → Results.
pub struct Wizard {
    slot: Arc<RwLock<SessionSlot>>,
    prompt: Arc<dyn PromptService>,
    archive: Arc<dyn ArchiveBuilder>,
    logs: Arc<EventLog>,
    submit_gate: InFlight,
    script_gate: InFlight,
    export_gate: InFlight,
    sampler: Mutex<Option<SamplingTask>>,
    sample_period: Duration,
    seed: Option<u64>,
}

impl Wizard {
    pub fn new(
        prompt: Arc<dyn PromptService>,
        archive: Arc<dyn ArchiveBuilder>,
        logs: Arc<EventLog>,
    ) -> Self {
        Self {
            slot: Arc::new(RwLock::new(SessionSlot {
                session: Session::new(),
                generation: 0,
                run_epoch: 0,
            })),
            prompt,
            archive,
            logs,
            submit_gate: InFlight::new("API analysis"),
            script_gate: InFlight::new("Script generation"),
            export_gate: InFlight::new("Archive export"),
            sampler: Mutex::new(None),
            sample_period: Duration::from_secs(SAMPLE_PERIOD_SECS),
            seed: None,
        }
    }

    /// Pin the simulation's random source.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn logs(&self) -> &Arc<EventLog> {
        &self.logs
    }

    fn loading(&self) -> bool {
        self.submit_gate.is_active() || self.script_gate.is_active() || self.export_gate.is_active()
    }

    pub async fn session(&self) -> Session {
        self.slot.read().await.session.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session().await;
        SessionSnapshot {
            step_title: session.phase.title(),
            step_description: session.phase.description(),
            loading: self.loading(),
            session,
        }
    }

    pub async fn progress(&self) -> RunProgress {
        self.slot.read().await.session.progress()
    }

    /// Upload → Plan: ask the prompt service for a test plan.
    pub async fn submit_specification(&self, specification: String) -> Result<Session, PilotError> {
        let _guard = self.submit_gate.try_enter()?;
        let generation = {
            let slot = self.slot.read().await;
            slot.session.check_submission(&specification)?;
            slot.generation
        };

        info!(
            "Analyzing API specification ({} chars)",
            specification.len()
        );
        self.logs
            .emit(LogSource::Prompt, LogLevel::Info, "Requesting test plan suggestion")
            .await;

        let result = self
            .prompt
            .suggest_test_plan(SuggestPlanRequest {
                specification: specification.clone(),
            })
            .await;

        let mut slot = self.slot.write().await;
        if slot.generation != generation {
            warn!("Discarding plan suggestion for a session that was reset");
            return Err(PilotError::SessionReset);
        }

        match result {
            Ok(plan) => {
                let next = slot.session.with_suggestion(&specification, plan)?;
                slot.session = next.clone();
                drop(slot);
                self.logs
                    .emit(
                        LogSource::Wizard,
                        LogLevel::Info,
                        format!(
                            "Test plan suggested with {} test type(s)",
                            next.suggested_plan.as_ref().map_or(0, |p| p.test_types.len())
                        ),
                    )
                    .await;
                Ok(next)
            }
            Err(e) => {
                slot.session = slot.session.with_error(ANALYZE_FAILED_MESSAGE);
                drop(slot);
                warn!("Plan suggestion failed: {}", e);
                self.logs
                    .emit(
                        LogSource::Prompt,
                        LogLevel::Error,
                        format!("Analysis failed: {}", e),
                    )
                    .await;
                Err(PilotError::PromptService(ANALYZE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Store plan edits and run config while staying on the Plan step.
    /// Rejected while a script is being generated from the stored plan.
    pub async fn edit_plan(&self, edited_plan: String, config: RunConfig) -> Result<Session, PilotError> {
        let mut slot = self.slot.write().await;
        // Checked under the lock: request_script stores its plan under the same lock.
        if self.script_gate.is_active() {
            return Err(PilotError::Busy(self.script_gate.name));
        }
        let next = slot.session.with_plan_edit(&edited_plan, &config)?;
        slot.session = next.clone();
        Ok(next)
    }

    /// Plan → Script: generate the k6 script from the edited plan.
    ///
    /// The edit itself is kept even if generation fails.
    pub async fn request_script(
        &self,
        edited_plan: String,
        config: RunConfig,
    ) -> Result<Session, PilotError> {
        let _guard = self.script_gate.try_enter()?;
        let (generation, specification) = {
            let mut slot = self.slot.write().await;
            let next = slot.session.with_plan_edit(&edited_plan, &config)?;
            slot.session = next;
            (slot.generation, slot.session.specification.clone())
        };

        let request = GenerateScriptRequest {
            specification,
            test_plan: compose_test_plan(&edited_plan, &config),
        };
        info!(
            "Generating k6 script for {} / {}",
            config.environment, config.test_type
        );
        self.logs
            .emit(LogSource::Prompt, LogLevel::Info, "Requesting k6 script generation")
            .await;

        let result = self.prompt.generate_script(request).await;

        let mut slot = self.slot.write().await;
        if slot.generation != generation {
            warn!("Discarding generated script for a session that was reset");
            return Err(PilotError::SessionReset);
        }

        let failure = match result {
            Ok(generated) if !generated.script.trim().is_empty() => {
                let next = slot.session.with_script(generated.script)?;
                slot.session = next.clone();
                drop(slot);
                self.logs
                    .emit(LogSource::Wizard, LogLevel::Info, "k6 script generated")
                    .await;
                return Ok(next);
            }
            Ok(_) => "prompt service returned an empty script".to_string(),
            Err(e) => e.to_string(),
        };

        slot.session = slot.session.with_error(SCRIPT_FAILED_MESSAGE);
        drop(slot);
        warn!("Script generation failed: {}", failure);
        self.logs
            .emit(
                LogSource::Prompt,
                LogLevel::Error,
                format!("Script generation failed: {}", failure),
            )
            .await;
        Err(PilotError::PromptService(SCRIPT_FAILED_MESSAGE.to_string()))
    }

    /// Script → Results: start the simulated run.
    pub async fn start_run(&self, config: RunConfig) -> Result<Session, PilotError> {
        let mut sampler = self.sampler.lock().await;
        let mut slot = self.slot.write().await;
        let (next, total) = slot.session.start_run(&config)?;

        if let Some(previous) = sampler.take() {
            debug!("Replacing sampling task for run {}", previous.epoch());
            previous.cancel();
        }
        slot.run_epoch += 1;
        slot.session = next.clone();
        let plan = RunPlan {
            epoch: slot.run_epoch,
            total_ticks: total,
            target_concurrency: config.concurrency,
            period: self.sample_period,
            seed: self.seed,
        };
        drop(slot);

        info!(
            "Starting simulated run {}: {} VUs for {}s",
            plan.epoch, plan.target_concurrency, plan.total_ticks
        );
        let sink = Arc::new(SessionSink {
            slot: self.slot.clone(),
            logs: self.logs.clone(),
        });
        *sampler = Some(SamplingTask::spawn(plan, sink));
        drop(sampler);

        self.logs
            .emit(
                LogSource::Simulation,
                LogLevel::Info,
                format!(
                    "Test started: {} VUs for {}s",
                    config.concurrency, total
                ),
            )
            .await;
        Ok(next)
    }

    /// End the current run. Idempotent; the sampling task calls the same
    /// transition after its last tick.
    pub async fn stop_or_complete(&self) -> Session {
        let mut sampler = self.sampler.lock().await;
        if let Some(task) = sampler.take() {
            if !task.is_finished() {
                task.cancel();
            }
        }
        let mut slot = self.slot.write().await;
        slot.session = slot.session.complete_run();
        slot.session.clone()
    }

    /// Package the script and the sample report. Leaves the session as is
    /// unless the archive builder fails.
    pub async fn export_artifacts(&self) -> Result<ExportedArchive, PilotError> {
        let _guard = self.export_gate.try_enter()?;
        let (generation, script, report) = {
            let slot = self.slot.read().await;
            slot.session.check_export()?;
            (
                slot.generation,
                slot.session.script.clone(),
                slot.session.report_json()?,
            )
        };

        let entries = vec![
            ArchiveEntry::new(SCRIPT_FILE_NAME, script),
            ArchiveEntry::new(REPORT_FILE_NAME, report),
        ];

        match self.archive.build(&entries).await {
            Ok(archive_base64) => {
                let sha256 = archive_digest(&archive_base64).unwrap_or_default();
                info!("Exported {} ({} base64 chars)", ARCHIVE_FILE_NAME, archive_base64.len());
                self.logs
                    .emit(
                        LogSource::Archive,
                        LogLevel::Info,
                        format!("{} is ready", ARCHIVE_FILE_NAME),
                    )
                    .await;
                Ok(ExportedArchive {
                    file_name: ARCHIVE_FILE_NAME,
                    content_type: ARCHIVE_CONTENT_TYPE,
                    entries: entries.into_iter().map(|e| e.name).collect(),
                    archive_base64,
                    sha256,
                })
            }
            Err(e) => {
                {
                    let mut slot = self.slot.write().await;
                    if slot.generation == generation {
                        slot.session = slot.session.with_error(ARCHIVE_FAILED_MESSAGE);
                    }
                }
                warn!("Archive build failed: {}", e);
                self.logs
                    .emit(
                        LogSource::Archive,
                        LogLevel::Error,
                        format!("Archive failed: {}", e),
                    )
                    .await;
                Err(PilotError::Archive(ARCHIVE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    pub async fn script_download(&self) -> Result<ScriptDownload, PilotError> {
        let slot = self.slot.read().await;
        if slot.session.script.trim().is_empty() {
            return Err(PilotError::MissingScript);
        }
        Ok(ScriptDownload {
            file_name: SCRIPT_FILE_NAME,
            content_type: SCRIPT_CONTENT_TYPE,
            body: slot.session.script.clone(),
        })
    }

    pub async fn go_back(&self) -> Result<Session, PilotError> {
        if self.loading() {
            return Err(PilotError::Busy("A request"));
        }
        let mut slot = self.slot.write().await;
        let next = slot.session.go_back()?;
        slot.session = next.clone();
        debug!("Wizard moved back to {}", next.phase);
        Ok(next)
    }

    /// Cancel any run and start over with a fresh session.
    pub async fn reset(&self) -> Session {
        let mut sampler = self.sampler.lock().await;
        if let Some(task) = sampler.take() {
            task.cancel();
        }
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        slot.run_epoch += 1;
        slot.session = slot.session.reset();
        let fresh = slot.session.clone();
        drop(slot);
        drop(sampler);

        info!("Session reset: {}", fresh.id);
        self.logs
            .emit(LogSource::Wizard, LogLevel::Info, "Started a new test")
            .await;
        fresh
    }

    /// Stop background work before the process exits.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sampler.lock().await.take() {
            task.cancel();
        }
    }
}
