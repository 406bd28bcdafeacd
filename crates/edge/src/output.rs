// crates/edge/src/output.rs

//! JSON report of a page execution.

use domain::{Content, Headers, Position};
use serde::Serialize;
use serve::Stats;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub contents: Vec<ContentView<'a>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsView>,
}

#[derive(Debug, Serialize)]
pub struct ContentView<'a> {
    pub position: &'a Position,
    pub source: &'a str,
    pub available: bool,
    pub body: &'a str,
    pub headers: &'a Headers,
    pub runtime_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> From<&'a Content> for ContentView<'a> {
    fn from(content: &'a Content) -> Self {
        ContentView {
            position: content.position(),
            source: content.source(),
            available: content.is_available(),
            body: content.body(),
            headers: content.headers(),
            runtime_ms: content.total_runtime().as_millis() as u64,
            error: content.as_error_content().ok().map(|e| e.message()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub fragments: usize,
    pub fetches: usize,
    pub succeeded: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub candidates: usize,
    pub candidate_failures: usize,
    pub total_fetch_ms: u64,
    pub avg_fetch_ms: u64,
    pub max_fetch_ms: u64,
    pub slowest_source: Option<String>,
}

impl From<&Stats> for StatsView {
    fn from(stats: &Stats) -> Self {
        StatsView {
            fragments: stats.fragments,
            fetches: stats.fetches,
            succeeded: stats.succeeded,
            unavailable: stats.unavailable,
            failed: stats.failed,
            candidates: stats.candidates,
            candidate_failures: stats.candidate_failures,
            total_fetch_ms: stats.total_fetch_time.as_millis() as u64,
            avg_fetch_ms: stats.avg_fetch_time().as_millis() as u64,
            max_fetch_ms: stats.max_fetch_time.as_millis() as u64,
            slowest_source: stats.slowest_source.clone(),
        }
    }
}

impl<'a> Report<'a> {
    pub fn new(contents: &'a [Content], stats: Option<&Stats>) -> Self {
        Report {
            contents: contents.iter().map(ContentView::from).collect(),
            stats: stats.map(StatsView::from),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
