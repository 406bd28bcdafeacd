//! Page composition engine.
//!
//! A [`page::Page`] is an ordered list of [`fragment::Fragment`]s. Each
//! fragment asks a [`provider::ContentProvider`] for the content of its
//! position and then runs its dependent follow-ups. Providers for the same
//! slot are combined with the strategies in [`selection`].

pub mod fragment;
pub mod page;
pub mod provider;
pub mod selection;
pub mod static_text;
pub mod tracer;

pub use fragment::Fragment;
pub use page::Page;
pub use provider::{from_fn, with_timeout, ContentProvider, SharedProvider};
pub use selection::{with_all, with_all_matching, with_first, with_first_matching};
pub use static_text::{static_text, StaticText};
pub use tracer::{no_op_tracer, NoOpTracer, RecordingTracer, SharedTracer, Stats, Tracer};

use domain::{ContentError, Position};
use std::{error::Error as StdError, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider `{source_id}` failed: {message}")]
    Provider { source_id: String, message: String },

    #[error("provider failed: {0}")]
    Boxed(#[source] Box<dyn StdError + Send + Sync>),

    #[error("fetching `{position}` timed out after {after:?}")]
    Timeout { position: Position, after: Duration },

    #[error("page execution timed out after {0:?}")]
    PageTimeout(Duration),

    #[error("position mismatch: expected `{expected}`, found `{found}`")]
    PositionMismatch { expected: Position, found: Position },

    #[error("a selection strategy needs at least one provider")]
    NoProviders,

    #[error("content error: {0}")]
    Content(ContentError),
}

impl From<ContentError> for Error {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::PositionMismatch { expected, found } => {
                Error::PositionMismatch { expected, found }
            }
            other => Error::Content(other),
        }
    }
}

impl Error {
    #[inline]
    pub fn provider(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn boxed<E>(e: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Boxed(Box::new(e))
    }

    /// Defects in the page definition rather than failures of a fetch.
    ///
    /// These are never absorbed by a fallback strategy or turned into an
    /// error placeholder.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::PositionMismatch { .. } | Error::NoProviders | Error::Content(_)
        )
    }
}
