use anyhow::Result;
use std::sync::Arc;

use super::provider::{create_provider, AnalysisProvider};
use super::AnalysisResult;
use crate::config::AnalysisConfig;
use crate::journal::ChatTurn;

/// Analysis client wrapping a provider implementation.
pub struct AnalysisClient {
    provider: Arc<dyn AnalysisProvider>,
}

impl AnalysisClient {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            provider: Arc::from(create_provider(config)),
        }
    }

    /// Wrap an explicit provider; used by tests with a scripted provider.
    pub fn with_provider(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn analyze_media(&self, data_url: &str, mime_type: &str) -> Result<AnalysisResult> {
        self.provider.analyze_media(data_url, mime_type)
    }

    pub fn hope_spotlight_story(&self, subject: &str) -> Result<String> {
        self.provider.hope_spotlight_story(subject)
    }

    pub fn chat_reply(
        &self,
        subject: &str,
        persona: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String> {
        self.provider.chat_reply(subject, persona, history, message)
    }

    pub fn check_in(&self, subject: &str) -> Result<String> {
        self.provider.check_in(subject)
    }
}
