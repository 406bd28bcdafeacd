use serde::Deserialize;
use std::time::Duration;

/// Engine knobs read from the `[composer]` table of a settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComposerSettings {
    /// Upper bound for a single provider invocation.
    pub provider_timeout_ms: Option<u64>,

    /// Upper bound for a whole page execution.
    pub page_timeout_ms: Option<u64>,

    /// Record trace events and print fetch statistics.
    pub trace: bool,
}

impl ComposerSettings {
    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }

    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub composer: ComposerSettings,
}
