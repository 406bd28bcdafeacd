// crates/serve/src/static_text.rs

//! A provider that answers with a fixed text.
//!
//! Useful for fixtures, fallbacks and demos. `{name}` placeholders in the
//! text are filled from the request parameters so static fragments can still
//! take part in dependency chains.

use crate::{
    provider::{ContentProvider, SharedProvider},
    tracer::SharedTracer,
    Error,
};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Content, Headers, Parameters, Position, SingleContent};
use regex::{Captures, Regex};
use serde_json::Value as Json;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StaticText {
    source: String,
    text: String,
    position: Option<Position>,
    headers: Headers,
    delay: Option<Duration>,
}

pub fn static_text(text: impl Into<String>) -> StaticText {
    StaticText::new(text)
}

impl StaticText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: "static".to_owned(),
            text: text.into(),
            position: None,
            headers: Headers::empty(),
            delay: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Tag the content with `position` instead of the requested one.
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Simulated latency before the content is produced.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> SharedProvider {
        Arc::new(self)
    }
}

#[async_trait]
impl ContentProvider for StaticText {
    async fn fetch(
        &self,
        position: &Position,
        _tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error> {
        let started = Utc::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let position = self.position.clone().unwrap_or_else(|| position.clone());
        let content = SingleContent::new(
            self.source.clone(),
            position,
            interpolate(&self.text, parameters),
        )
        .with_headers(self.headers.clone())
        .with_timing(started, Utc::now());

        Ok(Some(content.into()))
    }
}

/// Replaces `{key}` with the value of parameter `key`. Unknown keys and
/// unbalanced braces are left as they are.
fn interpolate(text: &str, parameters: &Parameters) -> String {
    static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

    if parameters.is_empty() {
        return text.to_owned();
    }

    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match parameters.get(&caps[1]) {
            Some(Json::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_owned(),
        })
        .into_owned()
}
