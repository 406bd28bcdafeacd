// crates/domain/src/content.rs

//! The result of fetching one slot of a page.
//!
//! [`Content`] is a closed sum over three public shapes:
//!   - [`SingleContent`]: the leaf result of one provider call
//!   - [`CompositeContent`]: several contents for the same position, folded
//!     in list order
//!   - [`ErrorContent`]: a failed fetch kept as a placeholder
//!
//! Every shape answers the same accessors, so callers only branch on
//! `is_composite` / `is_error_content` when they need variant detail.

use crate::{headers::Headers, position::Position};
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("content from `{0}` is not an error content")]
    NotErrorContent(String),

    #[error("content from `{0}` is not a composite content")]
    NotComposite(String),

    #[error("content from `{0}` is not a single content")]
    NotSingle(String),

    #[error("a composite content needs at least one constituent")]
    EmptyComposite,

    #[error("position mismatch: expected `{expected}`, found `{found}`")]
    PositionMismatch { expected: Position, found: Position },
}

pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

fn runtime_between(started: DateTime<Utc>, completed: DateTime<Utc>) -> Duration {
    (completed - started).to_std().unwrap_or(Duration::ZERO)
}

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Content {
    Single(SingleContent),
    Composite(CompositeContent),
    Error(ErrorContent),
}

impl Content {
    /// Identifies where the content came from: a URL for HTTP content,
    /// some other unique key otherwise. Used to tell fetches apart in traces.
    pub fn source(&self) -> &str {
        match self {
            Content::Single(c) => c.source(),
            Content::Composite(c) => c.source(),
            Content::Error(c) => c.source(),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Content::Single(c) => c.position(),
            Content::Composite(c) => c.position(),
            Content::Error(c) => c.position(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Content::Single(c) => c.is_available(),
            Content::Composite(c) => c.is_available(),
            Content::Error(_) => false,
        }
    }

    /// Body of the content; empty when unavailable.
    pub fn body(&self) -> &str {
        match self {
            Content::Single(c) => c.body(),
            Content::Composite(c) => c.body(),
            Content::Error(_) => "",
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Content::Single(c) => c.headers(),
            Content::Composite(c) => c.headers(),
            Content::Error(c) => c.headers(),
        }
    }

    pub fn started_ts(&self) -> DateTime<Utc> {
        match self {
            Content::Single(c) => c.started_ts(),
            Content::Composite(c) => c.started_ts(),
            Content::Error(c) => c.started_ts(),
        }
    }

    pub fn completed_ts(&self) -> DateTime<Utc> {
        match self {
            Content::Single(c) => c.completed_ts(),
            Content::Composite(c) => c.completed_ts(),
            Content::Error(c) => c.completed_ts(),
        }
    }

    pub fn avg_runtime(&self) -> Duration {
        match self {
            Content::Composite(c) => c.avg_runtime(),
            other => other.total_runtime(),
        }
    }

    pub fn total_runtime(&self) -> Duration {
        match self {
            Content::Single(c) => c.total_runtime(),
            Content::Composite(c) => c.total_runtime(),
            Content::Error(c) => c.total_runtime(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Content::Composite(_))
    }

    pub fn is_error_content(&self) -> bool {
        matches!(self, Content::Error(_))
    }

    pub fn as_single(&self) -> Result<&SingleContent, ContentError> {
        match self {
            Content::Single(c) => Ok(c),
            other => Err(ContentError::NotSingle(other.source().to_owned())),
        }
    }

    pub fn as_composite(&self) -> Result<&CompositeContent, ContentError> {
        match self {
            Content::Composite(c) => Ok(c),
            other => Err(ContentError::NotComposite(other.source().to_owned())),
        }
    }

    pub fn as_error_content(&self) -> Result<&ErrorContent, ContentError> {
        match self {
            Content::Error(c) => Ok(c),
            other => Err(ContentError::NotErrorContent(other.source().to_owned())),
        }
    }
}

impl From<SingleContent> for Content {
    fn from(c: SingleContent) -> Self {
        Content::Single(c)
    }
}

impl From<CompositeContent> for Content {
    fn from(c: CompositeContent) -> Self {
        Content::Composite(c)
    }
}

impl From<ErrorContent> for Content {
    fn from(c: ErrorContent) -> Self {
        Content::Error(c)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SingleContent
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SingleContent {
    source: String,
    position: Position,
    body: String,
    available: bool,
    headers: Headers,
    started: DateTime<Utc>,
    completed: DateTime<Utc>,
}

impl SingleContent {
    /// Content is available iff `body` is non-empty. Both timestamps are set
    /// to now; providers that measure their call use `with_timing`.
    pub fn new(source: impl Into<String>, position: Position, body: impl Into<String>) -> Self {
        let body = body.into();
        let now = Utc::now();
        Self {
            source: source.into(),
            position,
            available: !body.is_empty(),
            body,
            headers: Headers::empty(),
            started: now,
            completed: now,
        }
    }

    /// A structurally valid but empty result.
    pub fn unavailable(source: impl Into<String>, position: Position) -> Self {
        Self::new(source, position, String::new())
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timing(mut self, started: DateTime<Utc>, completed: DateTime<Utc>) -> Self {
        self.started = started;
        self.completed = completed;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn started_ts(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn completed_ts(&self) -> DateTime<Utc> {
        self.completed
    }

    pub fn avg_runtime(&self) -> Duration {
        self.total_runtime()
    }

    pub fn total_runtime(&self) -> Duration {
        runtime_between(self.started, self.completed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CompositeContent
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered merge of contents that share one position.
///
/// The body is the concatenation of the constituent bodies in list order.
/// Headers are the union of all constituent headers; when two constituents
/// carry the same key, the later one in the list wins.
#[derive(Debug, Clone)]
pub struct CompositeContent {
    position: Position,
    contents: Vec<Content>,
    source: String,
    body: String,
    headers: Headers,
    started: DateTime<Utc>,
    completed: DateTime<Utc>,
    total_runtime: Duration,
}

impl CompositeContent {
    /// Folds `contents` in the given order.
    ///
    /// Fails when the list is empty or when any constituent disagrees with
    /// the first one about the position. Validation happens before anything
    /// is merged.
    pub fn try_new(contents: Vec<Content>) -> Result<Self, ContentError> {
        let position = contents
            .first()
            .ok_or(ContentError::EmptyComposite)?
            .position()
            .clone();
        if let Some(other) = contents.iter().find(|c| c.position() != &position) {
            return Err(ContentError::PositionMismatch {
                expected: position,
                found: other.position().clone(),
            });
        }

        let mut body = String::new();
        let mut headers = Headers::empty();
        let mut sources = Vec::with_capacity(contents.len());
        let mut started = contents[0].started_ts();
        let mut completed = contents[0].completed_ts();
        let mut total_runtime = Duration::ZERO;

        for content in &contents {
            body.push_str(content.body());
            headers = headers.merge(content.headers());
            sources.push(content.source());
            started = started.min(content.started_ts());
            completed = completed.max(content.completed_ts());
            total_runtime += content.total_runtime();
        }

        let source = sources.join(",");
        Ok(Self {
            position,
            source,
            body,
            headers,
            started,
            completed,
            total_runtime,
            contents,
        })
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_available(&self) -> bool {
        self.contents.iter().any(Content::is_available)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn started_ts(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn completed_ts(&self) -> DateTime<Utc> {
        self.completed
    }

    pub fn avg_runtime(&self) -> Duration {
        // try_new guarantees at least one constituent
        self.total_runtime / self.contents.len() as u32
    }

    pub fn total_runtime(&self) -> Duration {
        self.total_runtime
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorContent
// ─────────────────────────────────────────────────────────────────────────────

/// Placeholder for a slot whose fetch failed.
#[derive(Debug, Clone)]
pub struct ErrorContent {
    source: String,
    position: Position,
    cause: Cause,
    headers: Headers,
    started: DateTime<Utc>,
    completed: DateTime<Utc>,
}

impl ErrorContent {
    pub fn new<E>(source: impl Into<String>, position: Position, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_cause(source, position, Arc::new(cause))
    }

    pub fn from_cause(source: impl Into<String>, position: Position, cause: Cause) -> Self {
        let now = Utc::now();
        Self {
            source: source.into(),
            position,
            cause,
            headers: Headers::empty(),
            started: now,
            completed: now,
        }
    }

    pub fn with_timing(mut self, started: DateTime<Utc>, completed: DateTime<Utc>) -> Self {
        self.started = started;
        self.completed = completed;
        self
    }

    /// The failure that produced this placeholder.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn message(&self) -> String {
        self.cause.to_string()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn started_ts(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn completed_ts(&self) -> DateTime<Utc> {
        self.completed
    }

    pub fn total_runtime(&self) -> Duration {
        runtime_between(self.started, self.completed)
    }
}
