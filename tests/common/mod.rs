#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use api_pilot::archive::{ArchiveBuilder, ArchiveEntry, ArchiveError, ZipArchiveBuilder};
use api_pilot::event_log::EventLog;
use api_pilot::prompt::{
    GenerateScriptRequest, GeneratedScript, MetricEntry, PromptError, PromptService,
    SuggestPlanRequest, TestPlan, TestTypeEntry,
};
use api_pilot::wizard::Wizard;

pub const SPECIFICATION: &str = r#"{"openapi":"3.0.0","paths":{}}"#;
pub const SCRIPT_BODY: &str = "k6 script body";

pub fn load_test_plan() -> TestPlan {
    TestPlan {
        test_types: vec![TestTypeEntry {
            name: "Load Test".to_string(),
            description: "Expected traffic for 10 minutes".to_string(),
            metrics: vec![MetricEntry {
                name: "http_req_duration p(95)".to_string(),
                threshold: "< 500ms".to_string(),
                description: "95th percentile response time".to_string(),
            }],
        }],
    }
}

/// Prompt service with canned answers.
#[derive(Default)]
pub struct MockPrompt {
    pub fail_plan: AtomicBool,
    pub fail_script: AtomicBool,
    pub empty_script: AtomicBool,
    pub plan_calls: AtomicUsize,
    pub script_requests: Mutex<Vec<GenerateScriptRequest>>,
    /// When set, every call waits for a notification before answering.
    pub gate: Option<Arc<Notify>>,
}

impl MockPrompt {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn script_calls(&self) -> usize {
        self.script_requests.lock().unwrap().len()
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl PromptService for MockPrompt {
    async fn suggest_test_plan(&self, _request: SuggestPlanRequest) -> Result<TestPlan, PromptError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_plan.load(Ordering::SeqCst) {
            return Err(PromptError::MalformedOutput("mock failure".to_string()));
        }
        Ok(load_test_plan())
    }

    async fn generate_script(
        &self,
        request: GenerateScriptRequest,
    ) -> Result<GeneratedScript, PromptError> {
        self.script_requests.lock().unwrap().push(request);
        self.wait_gate().await;
        if self.fail_script.load(Ordering::SeqCst) {
            return Err(PromptError::Status {
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        let script = if self.empty_script.load(Ordering::SeqCst) {
            String::new()
        } else {
            SCRIPT_BODY.to_string()
        };
        Ok(GeneratedScript { script })
    }
}

/// Real zip builder that also records what it was asked to pack.
#[derive(Default)]
pub struct RecordingArchive {
    pub calls: Mutex<Vec<Vec<ArchiveEntry>>>,
    pub fail: AtomicBool,
    /// When set, every build waits for a notification before packing.
    pub gate: Option<Arc<Notify>>,
}

impl RecordingArchive {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ArchiveBuilder for RecordingArchive {
    async fn build(&self, entries: &[ArchiveEntry]) -> Result<String, ArchiveError> {
        self.calls.lock().unwrap().push(entries.to_vec());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArchiveError::Io(std::io::Error::other("disk full")));
        }
        ZipArchiveBuilder.build(entries).await
    }
}

pub fn wizard_with(prompt: Arc<MockPrompt>, archive: Arc<RecordingArchive>) -> Wizard {
    Wizard::new(prompt, archive, Arc::new(EventLog::new())).with_seed(Some(42))
}
