use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_DURATION, MAX_RUN_DURATION_SECS};
use crate::error::PilotError;
use crate::prompt::TestPlan;

// --- Phase ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Upload,
    Plan,
    Script,
    Results,
}

impl Phase {
    pub fn title(self) -> &'static str {
        match self {
            Phase::Upload => "Analyze API",
            Phase::Plan => "Create Plan",
            Phase::Script => "Generate Script",
            Phase::Results => "Execute & Report",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Phase::Upload => "Start by providing your API's Swagger/OpenAPI specification.",
            Phase::Plan => "Review the AI-suggested test plan and customize it for your needs.",
            Phase::Script => "Configure test parameters and review the generated k6 script.",
            Phase::Results => "Monitor real-time test execution and view performance reports.",
        }
    }

    /// The step `go_back` returns to. Results has no way back; only reset leaves it.
    pub fn previous(self) -> Option<Phase> {
        match self {
            Phase::Plan => Some(Phase::Upload),
            Phase::Script => Some(Phase::Plan),
            Phase::Upload | Phase::Results => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "upload"),
            Phase::Plan => write!(f, "plan"),
            Phase::Script => write!(f, "script"),
            Phase::Results => write!(f, "results"),
        }
    }
}

// --- Run configuration ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    #[default]
    #[serde(rename = "Load Test")]
    Load,
    #[serde(rename = "Stress Test")]
    Stress,
    #[serde(rename = "Spike Test")]
    Spike,
    #[serde(rename = "Soak Test")]
    Soak,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Load => write!(f, "Load Test"),
            TestType::Stress => write!(f, "Stress Test"),
            TestType::Spike => write!(f, "Spike Test"),
            TestType::Soak => write!(f, "Soak Test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target number of virtual users.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Free-text duration, see [`parse_duration`].
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub test_type: TestType,
}

fn default_concurrency() -> u32 {
    DEFAULT_CONCURRENCY
}

fn default_duration() -> String {
    DEFAULT_DURATION.to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            duration: default_duration(),
            environment: Environment::default(),
            test_type: TestType::default(),
        }
    }
}

impl RunConfig {
    /// Validate the config and return the run length in seconds.
    pub fn validate(&self) -> Result<u64, PilotError> {
        if self.concurrency == 0 {
            return Err(PilotError::InvalidConcurrency);
        }
        parse_duration(&self.duration)
    }
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$|^(\d+)$").expect("valid duration regex")
    })
}

/// Parse a run duration into whole seconds.
///
/// Accepts `<n>h`, `<n>m`, `<n>s` groups, each at most once and in that
/// order (`1h`, `2m`, `1m30s`), or a bare number of seconds (`45`). Repeated
/// or out-of-order units (`1s1s`, `30s1m`) are rejected. Zero and anything
/// above `MAX_RUN_DURATION_SECS` are rejected, as is any other text.
pub fn parse_duration(raw: &str) -> Result<u64, PilotError> {
    let trimmed = raw.trim();
    let invalid = || PilotError::InvalidDuration(raw.to_string());

    let caps = duration_regex().captures(trimmed).ok_or_else(invalid)?;
    let groups = [(1, 3600u64), (2, 60), (3, 1), (4, 1)];

    let mut total: u64 = 0;
    let mut matched = false;
    for (index, unit) in groups {
        let Some(part) = caps.get(index) else {
            continue;
        };
        matched = true;
        let value: u64 = part.as_str().parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }

    if !matched || total == 0 || total > MAX_RUN_DURATION_SECS {
        return Err(invalid());
    }
    Ok(total)
}

/// Plan text sent to script generation: run context header, then the plan.
pub fn compose_test_plan(edited_plan: &str, config: &RunConfig) -> String {
    format!(
        "Environment: {}\nTest Type: {}\n\n{}",
        config.environment, config.test_type, edited_plan
    )
}

/// Render a suggested plan as the initial editable text.
pub fn render_plan(plan: &TestPlan) -> String {
    serde_json::to_string_pretty(plan).unwrap_or_default()
}

// --- Samples ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the run started, 1-based.
    pub time: u64,
    pub vus: u32,
    pub response_time_p95_ms: f64,
    pub requests_per_sec: f64,
    /// Fraction of failed requests, 0.0..=1.0.
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunProgress {
    pub elapsed: u64,
    pub total: u64,
    pub percent: f64,
    pub running: bool,
    pub latest: Option<Sample>,
}

// --- Session ---

/// The wizard's aggregate state. Every operation returns a new value; a
/// failed operation leaves the previous value untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: Phase,
    pub specification: String,
    pub suggested_plan: Option<TestPlan>,
    pub edited_plan: String,
    pub run_config: RunConfig,
    pub script: String,
    pub samples: Vec<Sample>,
    pub running: bool,
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            phase: Phase::Upload,
            specification: String::new(),
            suggested_plan: None,
            edited_plan: String::new(),
            run_config: RunConfig::default(),
            script: String::new(),
            samples: Vec::new(),
            running: false,
            last_error: None,
        }
    }

    /// True when the session has the shape of a freshly created one.
    pub fn is_initial(&self) -> bool {
        self.phase == Phase::Upload
            && self.specification.is_empty()
            && self.suggested_plan.is_none()
            && self.edited_plan.is_empty()
            && self.run_config == RunConfig::default()
            && self.script.is_empty()
            && self.samples.is_empty()
            && !self.running
            && self.last_error.is_none()
    }

    pub fn reset(&self) -> Session {
        Session::new()
    }

    fn require_phase(&self, expected: Phase) -> Result<(), PilotError> {
        if self.phase != expected {
            return Err(PilotError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    pub fn with_error(&self, message: impl Into<String>) -> Session {
        Session {
            last_error: Some(message.into()),
            ..self.clone()
        }
    }

    // --- Upload -> Plan ---

    pub fn check_submission(&self, specification: &str) -> Result<(), PilotError> {
        self.require_phase(Phase::Upload)?;
        if specification.trim().is_empty() {
            return Err(PilotError::EmptySpecification);
        }
        Ok(())
    }

    pub fn with_suggestion(&self, specification: &str, plan: TestPlan) -> Result<Session, PilotError> {
        self.check_submission(specification)?;
        Ok(Session {
            phase: Phase::Plan,
            specification: specification.to_string(),
            edited_plan: render_plan(&plan),
            suggested_plan: Some(plan),
            last_error: None,
            ..self.clone()
        })
    }

    // --- Plan -> Script ---

    /// Store the user's plan edits and run config without leaving the Plan step.
    pub fn with_plan_edit(&self, edited_plan: &str, config: &RunConfig) -> Result<Session, PilotError> {
        self.require_phase(Phase::Plan)?;
        if edited_plan.trim().is_empty() {
            return Err(PilotError::EmptyPlan);
        }
        config.validate()?;
        Ok(Session {
            edited_plan: edited_plan.to_string(),
            run_config: config.clone(),
            ..self.clone()
        })
    }

    pub fn with_script(&self, script: String) -> Result<Session, PilotError> {
        self.require_phase(Phase::Plan)?;
        Ok(Session {
            phase: Phase::Script,
            script,
            last_error: None,
            ..self.clone()
        })
    }

    // --- Script -> Results ---

    /// Begin a run. Returns the new session and the number of ticks to sample.
    pub fn start_run(&self, config: &RunConfig) -> Result<(Session, u64), PilotError> {
        if self.running {
            return Err(PilotError::RunInProgress);
        }
        self.require_phase(Phase::Script)?;
        if self.script.trim().is_empty() {
            return Err(PilotError::MissingScript);
        }
        let total = config.validate()?;
        let session = Session {
            phase: Phase::Results,
            run_config: config.clone(),
            samples: Vec::new(),
            running: true,
            last_error: None,
            ..self.clone()
        };
        Ok((session, total))
    }

    /// Append the next sample. `None` if the session is not expecting it:
    /// no active run, an out-of-order offset, or past the configured end.
    ///
    /// Copies the sample list on every call, so a run of n ticks costs O(n²)
    /// sample copies. At one tick per second and `MAX_RUN_DURATION_SECS` this
    /// is bounded but grows quickly for day-long runs.
    pub fn record_sample(&self, sample: Sample) -> Option<Session> {
        if !self.running || sample.time != self.samples.len() as u64 + 1 {
            return None;
        }
        let total = parse_duration(&self.run_config.duration).ok()?;
        if sample.time > total {
            return None;
        }
        let mut samples = self.samples.clone();
        samples.push(sample);
        Some(Session {
            samples,
            ..self.clone()
        })
    }

    /// Mark the run finished. Idempotent.
    pub fn complete_run(&self) -> Session {
        Session {
            running: false,
            ..self.clone()
        }
    }

    pub fn go_back(&self) -> Result<Session, PilotError> {
        if self.running {
            return Err(PilotError::RunInProgress);
        }
        let previous = self
            .phase
            .previous()
            .ok_or(PilotError::CannotGoBack(self.phase))?;
        Ok(Session {
            phase: previous,
            last_error: None,
            ..self.clone()
        })
    }

    // --- Read-only views ---

    pub fn check_export(&self) -> Result<(), PilotError> {
        if self.running {
            return Err(PilotError::RunInProgress);
        }
        if self.script.trim().is_empty() {
            return Err(PilotError::MissingScript);
        }
        Ok(())
    }

    /// Samples as the indented JSON report shipped in the archive.
    pub fn report_json(&self) -> Result<String, PilotError> {
        serde_json::to_string_pretty(&self.samples)
            .map_err(|e| PilotError::Archive(format!("Failed to serialize report: {}", e)))
    }

    pub fn progress(&self) -> RunProgress {
        let total = parse_duration(&self.run_config.duration).unwrap_or(0);
        let elapsed = self.samples.len() as u64;
        let percent = if total == 0 {
            0.0
        } else {
            (elapsed as f64 / total as f64 * 100.0).min(100.0)
        };
        RunProgress {
            elapsed,
            total,
            percent,
            running: self.running,
            latest: self.samples.last().cloned(),
        }
    }
}
