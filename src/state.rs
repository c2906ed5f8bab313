use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::archive::{ArchiveBuilder, ZipArchiveBuilder};
use crate::config::PilotConfig;
use crate::event_log::EventLog;
use crate::prompt::{GeminiPromptService, PromptError, PromptService};
use crate::wizard::Wizard;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: PilotConfig,
    pub wizard: Wizard,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: PilotConfig,
        prompt: Arc<dyn PromptService>,
        archive: Arc<dyn ArchiveBuilder>,
    ) -> Self {
        let logs = Arc::new(EventLog::new());
        let wizard = Wizard::new(prompt, archive, logs).with_seed(config.seed);
        Self {
            config,
            wizard,
            started_at: Utc::now(),
        }
    }

    /// Production wiring: Gemini prompt service and zip archives.
    pub fn from_config(config: PilotConfig) -> Result<Self, PromptError> {
        let prompt = Arc::new(GeminiPromptService::new(&config)?);
        Ok(Self::new(config, prompt, Arc::new(ZipArchiveBuilder)))
    }

    pub fn logs(&self) -> &EventLog {
        self.wizard.logs()
    }
}
