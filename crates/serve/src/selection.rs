// crates/serve/src/selection.rs

//! Providers built out of other providers.
//!
//! Every strategy takes an ordered, non-empty list of providers for the same
//! slot and returns a single [`SharedProvider`], so strategies nest freely:
//!   - [`with_first`] / [`with_first_matching`] ask one candidate after the
//!     other and stop at the first acceptable content. Later candidates are
//!     never called once one is accepted.
//!   - [`with_all`] / [`with_all_matching`] ask every candidate concurrently
//!     and fold the results into one composite content in list order.

mod indexed;

use self::indexed::IndexedContent;
use crate::{
    provider::{ContentProvider, SharedProvider},
    tracer::{EventKind, SharedTracer, TraceEvent},
    Error,
};
use async_trait::async_trait;
use domain::{CompositeContent, Content, Parameters, Position};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

type Predicate = Box<dyn Fn(&Content) -> bool + Send + Sync>;

/// Trace label of a candidate, shared by its start and outcome events.
fn candidate_label(index: usize, position: &Position) -> String {
    format!("'{index}:{position}'")
}

// ─────────────────────────────────────────────────────────────────────────────
// First available / first matching
// ─────────────────────────────────────────────────────────────────────────────

/// Yields the first available content, asking providers in list order.
///
/// Failed candidates are skipped. If no candidate has available content the
/// result is `Ok(None)`.
pub fn with_first(providers: Vec<SharedProvider>) -> Result<SharedProvider, Error> {
    with_first_matching(Content::is_available, providers)
}

/// Like [`with_first`], accepting the first content that satisfies
/// `predicate` instead of the first available one.
pub fn with_first_matching<P>(
    predicate: P,
    providers: Vec<SharedProvider>,
) -> Result<SharedProvider, Error>
where
    P: Fn(&Content) -> bool + Send + Sync + 'static,
{
    if providers.is_empty() {
        return Err(Error::NoProviders);
    }
    Ok(Arc::new(FirstMatching {
        providers,
        predicate: Box::new(predicate),
    }))
}

struct FirstMatching {
    providers: Vec<SharedProvider>,
    predicate: Predicate,
}

#[async_trait]
impl ContentProvider for FirstMatching {
    async fn fetch(
        &self,
        position: &Position,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error> {
        for (index, provider) in self.providers.iter().enumerate() {
            let label = candidate_label(index, position);
            tracer.trace(TraceEvent::new(EventKind::CandidateStarted, position, &label));
            let started = Instant::now();
            let result = provider.fetch(position, tracer, parameters).await;
            tracer.trace(TraceEvent::candidate_outcome(
                position,
                &label,
                started.elapsed(),
                &result,
            ));

            match result {
                Ok(Some(content)) if !content.is_error_content() && (self.predicate)(&content) => {
                    debug!(%position, index, source = content.source(), "candidate accepted");
                    return Ok(Some(content));
                }
                Ok(_) => {}
                // a broken page definition is not something to fall back from
                Err(e) if e.is_config_error() => return Err(e),
                Err(e) => debug!(%position, index, error = %e, "candidate failed, trying next"),
            }
        }
        debug!(%position, "no candidate accepted");
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// All / all matching
// ─────────────────────────────────────────────────────────────────────────────

/// Asks every provider concurrently and folds all contents into one
/// composite content, in list order.
///
/// Any failed candidate fails the whole selection, as does a disagreement
/// about the position.
pub fn with_all(providers: Vec<SharedProvider>) -> Result<SharedProvider, Error> {
    if providers.is_empty() {
        return Err(Error::NoProviders);
    }
    Ok(Arc::new(AllMatching {
        providers,
        predicate: None,
    }))
}

/// Like [`with_all`], folding only the contents that satisfy `predicate`.
///
/// Positions are validated across every result before filtering. When no
/// content matches the result is `Ok(None)`.
pub fn with_all_matching<P>(
    predicate: P,
    providers: Vec<SharedProvider>,
) -> Result<SharedProvider, Error>
where
    P: Fn(&Content) -> bool + Send + Sync + 'static,
{
    if providers.is_empty() {
        return Err(Error::NoProviders);
    }
    Ok(Arc::new(AllMatching {
        providers,
        predicate: Some(Box::new(predicate)),
    }))
}

struct AllMatching {
    providers: Vec<SharedProvider>,
    predicate: Option<Predicate>,
}

impl AllMatching {
    fn accepts(&self, content: &Content) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(content))
    }
}

#[async_trait]
impl ContentProvider for AllMatching {
    async fn fetch(
        &self,
        position: &Position,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error> {
        let mut pending: FuturesUnordered<_> = self
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| async move {
                let label = candidate_label(index, position);
                tracer.trace(TraceEvent::new(EventKind::CandidateStarted, position, &label));
                let started = Instant::now();
                let result = provider.fetch(position, tracer, parameters).await;
                (index, label, started.elapsed(), result)
            })
            .collect();

        let mut indexed = Vec::with_capacity(self.providers.len());
        while let Some((index, label, elapsed, result)) = pending.next().await {
            match result {
                Ok(Some(content)) => {
                    let content = IndexedContent::new(index, content);
                    let kind = if content.is_available() {
                        EventKind::CandidateSucceeded
                    } else {
                        EventKind::CandidateUnavailable
                    };
                    tracer.trace(
                        TraceEvent::new(kind, position, &label)
                            .with_content_source(content.source())
                            .with_elapsed(elapsed),
                    );
                    indexed.push(content);
                }
                other => {
                    tracer.trace(TraceEvent::candidate_outcome(position, &label, elapsed, &other));
                    if let Err(e) = other {
                        // dropping `pending` cancels the candidates still in flight
                        warn!(%position, index, error = %e, "candidate failed, selection aborted");
                        return Err(e);
                    }
                }
            }
        }

        indexed.sort_by_key(IndexedContent::index);

        if let Some(first) = indexed.first() {
            if let Some(other) = indexed.iter().find(|c| c.position() != first.position()) {
                return Err(Error::PositionMismatch {
                    expected: first.position().clone(),
                    found: other.position().clone(),
                });
            }
        }

        let retained: Vec<Content> = indexed
            .into_iter()
            .map(IndexedContent::into_content)
            .filter(|c| self.accepts(c))
            .collect();
        if retained.is_empty() {
            debug!(%position, "no content retained");
            return Ok(None);
        }

        Ok(Some(CompositeContent::try_new(retained)?.into()))
    }
}
