// crates/serve/src/fragment.rs

//! A positioned slot of a page together with its dependent follow-ups.
//!
//! A fragment fetches its own content first and then runs each follow-up in
//! declaration order. A follow-up derives its parameters from the parent's
//! content, so it can only start once the parent is done. The resulting
//! sequence is pre-order: own content, then the whole sequence of the first
//! follow-up, then the second, and so on.
//!
//! A fragment whose own fetch fails fails as a whole. A follow-up that fails
//! is replaced by an error content at its position, so the parent and the
//! other follow-ups are kept.

use crate::{
    provider::SharedProvider,
    tracer::{EventKind, SharedTracer, TraceEvent},
    Error,
};
use domain::{Content, ErrorContent, Parameters, Position, SingleContent};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

type Mapper = Arc<dyn Fn(&Content) -> Parameters + Send + Sync>;

#[derive(Clone)]
struct FollowUp {
    mapper: Mapper,
    fragment: Fragment,
}

#[derive(Clone)]
pub struct Fragment {
    position: Position,
    provider: SharedProvider,
    follow_ups: Vec<FollowUp>,
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("position", &self.position)
            .field(
                "follow_ups",
                &self.follow_ups.iter().map(|u| &u.fragment).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Fragment {
    pub fn new(position: Position, provider: SharedProvider) -> Self {
        Self {
            position,
            provider,
            follow_ups: Vec::new(),
        }
    }

    /// Appends a follow-up that runs after this fragment with the parameters
    /// `mapper` derives from this fragment's content.
    pub fn followed_by<M>(mut self, mapper: M, fragment: Fragment) -> Self
    where
        M: Fn(&Content) -> Parameters + Send + Sync + 'static,
    {
        self.follow_ups.push(FollowUp {
            mapper: Arc::new(mapper),
            fragment,
        });
        self
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Fetches this fragment and its follow-ups, in pre-order.
    ///
    /// Fails when this fragment's own fetch fails, or on a broken page
    /// definition anywhere in the subtree.
    pub fn fetch_with<'a>(
        &'a self,
        tracer: &'a SharedTracer,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<Vec<Content>, Error>> {
        Box::pin(async move {
            tracer.trace(TraceEvent::new(
                EventKind::FragmentStarted,
                &self.position,
                self.position.name(),
            ));
            let started = Instant::now();

            let result = self.run(tracer, parameters).await;

            let event = match &result {
                Ok(contents) => {
                    debug!(position = %self.position, items = contents.len(), "fragment completed");
                    TraceEvent::new(
                        EventKind::FragmentCompleted,
                        &self.position,
                        self.position.name(),
                    )
                }
                Err(e) => TraceEvent::new(
                    EventKind::FragmentFailed,
                    &self.position,
                    self.position.name(),
                )
                .with_message(e.to_string()),
            };
            tracer.trace(event.with_elapsed(started.elapsed()));
            result
        })
    }

    #[tracing::instrument(skip_all, fields(position = %self.position))]
    async fn run(
        &self,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Vec<Content>, Error> {
        let label = self.position.name();
        tracer.trace(TraceEvent::new(EventKind::FetchStarted, &self.position, label));
        let started = Instant::now();
        let result = self.provider.fetch(&self.position, tracer, parameters).await;
        tracer.trace(TraceEvent::fetch_outcome(
            &self.position,
            label,
            started.elapsed(),
            &result,
        ));

        let own = match result? {
            Some(content) => content,
            None => {
                debug!("no content, standing in with an unavailable one");
                SingleContent::unavailable(label, self.position.clone()).into()
            }
        };

        let mut contents = vec![own];
        for follow_up in &self.follow_ups {
            let derived = (follow_up.mapper)(&contents[0]);
            match follow_up.fragment.fetch_with(tracer, &derived).await {
                Ok(nested) => contents.extend(nested),
                Err(e) if e.is_config_error() => return Err(e),
                Err(e) => {
                    let position = follow_up.fragment.position();
                    warn!(%position, error = %e, "follow-up failed, using error content");
                    contents.push(ErrorContent::new(position.name(), position.clone(), e).into());
                }
            }
        }
        Ok(contents)
    }
}
