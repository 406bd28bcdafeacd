// crates/serve/src/tracer.rs

//! Fetch lifecycle tracing.
//!
//! The engine reports what it does through a [`Tracer`]:
//!   - fragment start and completion (or failure);
//!   - one fetch per fragment: a `FetchStarted` event followed by exactly one
//!     fetch outcome, no matter how many providers are nested below it;
//!   - for every candidate a selection strategy asks, a `CandidateStarted`
//!     event followed by exactly one candidate outcome.
//!
//! A start event and its outcome carry the same `source` label. The source
//! of the content that came back, if any, is in `content_source`. The engine
//! never locks around tracer calls, so implementations must be safe under
//! concurrent writes.

use crate::Error;
use chrono::{DateTime, Utc};
use domain::{Content, Position};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type SharedTracer = Arc<dyn Tracer>;

pub trait Tracer: Send + Sync {
    fn trace(&self, event: TraceEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FragmentStarted,
    FragmentCompleted,
    FragmentFailed,
    FetchStarted,
    FetchSucceeded,
    FetchUnavailable,
    FetchFailed,
    CandidateStarted,
    CandidateSucceeded,
    CandidateUnavailable,
    CandidateFailed,
    PageCompleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub position: Position,
    pub source: String,
    pub content_source: Option<String>,
    pub elapsed: Option<Duration>,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn new(kind: EventKind, position: &Position, source: impl Into<String>) -> Self {
        Self {
            kind,
            position: position.clone(),
            source: source.into(),
            content_source: None,
            elapsed: None,
            message: None,
            at: Utc::now(),
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_content_source(mut self, source: impl Into<String>) -> Self {
        self.content_source = Some(source.into());
        self
    }

    /// Outcome of the fetch a fragment makes for its own position.
    pub(crate) fn fetch_outcome(
        position: &Position,
        label: &str,
        elapsed: Duration,
        result: &Result<Option<Content>, Error>,
    ) -> Self {
        Self::outcome(
            [
                EventKind::FetchSucceeded,
                EventKind::FetchUnavailable,
                EventKind::FetchFailed,
            ],
            position,
            label,
            elapsed,
            result,
        )
    }

    /// Outcome of one candidate asked by a selection strategy.
    pub(crate) fn candidate_outcome(
        position: &Position,
        label: &str,
        elapsed: Duration,
        result: &Result<Option<Content>, Error>,
    ) -> Self {
        Self::outcome(
            [
                EventKind::CandidateSucceeded,
                EventKind::CandidateUnavailable,
                EventKind::CandidateFailed,
            ],
            position,
            label,
            elapsed,
            result,
        )
    }

    fn outcome(
        [succeeded, unavailable, failed]: [EventKind; 3],
        position: &Position,
        label: &str,
        elapsed: Duration,
        result: &Result<Option<Content>, Error>,
    ) -> Self {
        let event = match result {
            Ok(Some(content)) => {
                let kind = if content.is_available() {
                    succeeded
                } else {
                    unavailable
                };
                TraceEvent::new(kind, position, label).with_content_source(content.source())
            }
            Ok(None) => TraceEvent::new(unavailable, position, label),
            Err(e) => TraceEvent::new(failed, position, label).with_message(e.to_string()),
        };
        event.with_elapsed(elapsed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NoOpTracer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTracer;

impl Tracer for NoOpTracer {
    fn trace(&self, _event: TraceEvent) {}
}

pub fn no_op_tracer() -> SharedTracer {
    Arc::new(NoOpTracer)
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordingTracer
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps every event in arrival order and aggregates them into [`Stats`].
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Candidate events are counted on their own and never as fetches, so
    /// nesting strategies does not inflate the fetch numbers.
    pub fn stats(&self) -> Stats {
        let events = self.events.lock();
        let mut stats = Stats::default();

        for event in events.iter() {
            let elapsed = match event.kind {
                EventKind::FragmentStarted => {
                    stats.fragments += 1;
                    continue;
                }
                EventKind::CandidateStarted => {
                    stats.candidates += 1;
                    continue;
                }
                EventKind::CandidateFailed => {
                    stats.candidate_failures += 1;
                    continue;
                }
                EventKind::FetchStarted => {
                    stats.fetches += 1;
                    continue;
                }
                EventKind::FetchSucceeded => {
                    stats.succeeded += 1;
                    event.elapsed
                }
                EventKind::FetchUnavailable => {
                    stats.unavailable += 1;
                    event.elapsed
                }
                EventKind::FetchFailed => {
                    stats.failed += 1;
                    event.elapsed
                }
                _ => continue,
            };
            if let Some(elapsed) = elapsed {
                stats.total_fetch_time += elapsed;
                if elapsed >= stats.max_fetch_time {
                    stats.max_fetch_time = elapsed;
                    stats.slowest_source = Some(
                        event
                            .content_source
                            .clone()
                            .unwrap_or_else(|| event.source.clone()),
                    );
                }
            }
        }
        stats
    }
}

impl Tracer for RecordingTracer {
    fn trace(&self, event: TraceEvent) {
        debug!(
            kind = ?event.kind,
            position = %event.position,
            source = %event.source,
            elapsed = ?event.elapsed,
            "trace event"
        );
        self.events.lock().push(event);
    }
}

/// Aggregated view over the events of one or more page executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub fragments: usize,
    pub fetches: usize,
    pub succeeded: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub candidates: usize,
    pub candidate_failures: usize,
    pub total_fetch_time: Duration,
    pub max_fetch_time: Duration,
    pub slowest_source: Option<String>,
}

impl Stats {
    pub fn avg_fetch_time(&self) -> Duration {
        let completed = self.succeeded + self.unavailable + self.failed;
        if completed == 0 {
            Duration::ZERO
        } else {
            self.total_fetch_time / completed as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::SingleContent;

    const X: Position = Position::from_static("X");

    fn outcome(source: &str, body: &str, ms: u64) -> TraceEvent {
        let content: Content = SingleContent::new(source, X, body).into();
        TraceEvent::fetch_outcome(&X, "X", Duration::from_millis(ms), &Ok(Some(content)))
    }

    #[test]
    fn recording_tracer_keeps_events_in_order() {
        let tracer = RecordingTracer::new();
        tracer.trace(TraceEvent::new(EventKind::FragmentStarted, &X, "X"));
        tracer.trace(TraceEvent::new(EventKind::FetchStarted, &X, "X"));

        let kinds: Vec<_> = tracer.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::FragmentStarted, EventKind::FetchStarted]);
    }

    #[test]
    fn fetch_outcome_classifies_results() {
        let succeeded = outcome("http://svc/a", "Foo", 1);
        assert_eq!(succeeded.kind, EventKind::FetchSucceeded);
        // same label as the start event, content source kept apart
        assert_eq!(succeeded.source, "X");
        assert_eq!(succeeded.content_source.as_deref(), Some("http://svc/a"));
        assert_eq!(outcome("a", "", 1).kind, EventKind::FetchUnavailable);

        let none = TraceEvent::fetch_outcome(&X, "X", Duration::ZERO, &Ok(None));
        assert_eq!(none.kind, EventKind::FetchUnavailable);
        assert_eq!(none.content_source, None);

        let failed = TraceEvent::fetch_outcome(
            &X,
            "X",
            Duration::ZERO,
            &Err(Error::provider("svc", "Bumm!!!")),
        );
        assert_eq!(failed.kind, EventKind::FetchFailed);
        assert_eq!(
            failed.message.as_deref(),
            Some("provider `svc` failed: Bumm!!!")
        );
    }

    #[test]
    fn candidate_outcome_uses_candidate_kinds() {
        let content: Content = SingleContent::new("svc", X, "Foo").into();

        let succeeded =
            TraceEvent::candidate_outcome(&X, "'0:X'", Duration::ZERO, &Ok(Some(content)));
        let failed = TraceEvent::candidate_outcome(
            &X,
            "'1:X'",
            Duration::ZERO,
            &Err(Error::provider("svc", "Bumm!!!")),
        );

        assert_eq!(succeeded.kind, EventKind::CandidateSucceeded);
        assert_eq!(succeeded.source, "'0:X'");
        assert_eq!(failed.kind, EventKind::CandidateFailed);
    }

    #[test]
    fn stats_aggregate_fetch_outcomes() {
        let tracer = RecordingTracer::new();
        tracer.trace(TraceEvent::new(EventKind::FragmentStarted, &X, "X"));
        for _ in 0..3 {
            tracer.trace(TraceEvent::new(EventKind::FetchStarted, &X, "X"));
        }
        tracer.trace(outcome("fast", "Foo", 10));
        tracer.trace(outcome("slow", "Bar", 40));
        tracer.trace(outcome("empty", "", 10));

        let stats = tracer.stats();
        assert_eq!(stats.fragments, 1);
        assert_eq!(stats.fetches, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.unavailable, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total_fetch_time, Duration::from_millis(60));
        assert_eq!(stats.max_fetch_time, Duration::from_millis(40));
        assert_eq!(stats.avg_fetch_time(), Duration::from_millis(20));
        assert_eq!(stats.slowest_source.as_deref(), Some("slow"));
    }

    #[test]
    fn candidates_are_not_counted_as_fetches() {
        let tracer = RecordingTracer::new();
        tracer.trace(TraceEvent::new(EventKind::CandidateStarted, &X, "'0:X'"));
        tracer.trace(TraceEvent::candidate_outcome(
            &X,
            "'0:X'",
            Duration::from_millis(500),
            &Err(Error::provider("svc", "Bumm!!!")),
        ));

        let stats = tracer.stats();
        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.candidate_failures, 1);
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total_fetch_time, Duration::ZERO);
    }

    #[test]
    fn empty_stats_have_zero_average() {
        assert_eq!(RecordingTracer::new().stats().avg_fetch_time(), Duration::ZERO);
    }
}
