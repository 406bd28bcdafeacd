// crates/serve/src/page.rs

//! Executes a list of top-level fragments concurrently.

use crate::{
    fragment::Fragment,
    tracer::{no_op_tracer, EventKind, SharedTracer, TraceEvent},
    Error,
};
use domain::{Content, ErrorContent, Parameters, Position};
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PAGE: Position = Position::from_static("page");

#[derive(Debug, Clone)]
pub struct Page {
    fragments: Vec<Fragment>,
    timeout: Option<Duration>,
}

impl Page {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments,
            timeout: None,
        }
    }

    /// Bounds a whole execution. On expiry every in-flight fetch is dropped
    /// and the execution fails with [`Error::PageTimeout`].
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub async fn fetch(&self) -> Result<Vec<Content>, Error> {
        self.fetch_with(&no_op_tracer(), &Parameters::empty()).await
    }

    /// Runs every fragment with `parameters` and concatenates their
    /// sequences in list order, whatever order they complete in.
    ///
    /// A fragment that fails to fetch is represented by an error content at
    /// its position. A broken page definition fails the whole execution.
    #[tracing::instrument(skip_all, fields(fragments = self.fragments.len()))]
    pub async fn fetch_with(
        &self,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Vec<Content>, Error> {
        let started = Instant::now();

        let contents = match self.timeout {
            Some(after) => tokio::time::timeout(after, self.fetch_all(tracer, parameters))
                .await
                .map_err(|_| {
                    warn!(?after, "page timed out");
                    Error::PageTimeout(after)
                })??,
            None => self.fetch_all(tracer, parameters).await?,
        };

        let elapsed = started.elapsed();
        debug!(items = contents.len(), ?elapsed, "page completed");
        tracer.trace(
            TraceEvent::new(EventKind::PageCompleted, &PAGE, PAGE.name())
                .with_elapsed(elapsed)
                .with_message(format!("{} items", contents.len())),
        );
        Ok(contents)
    }

    async fn fetch_all(
        &self,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Vec<Content>, Error> {
        let results = join_all(
            self.fragments
                .iter()
                .map(|fragment| fragment.fetch_with(tracer, parameters)),
        )
        .await;

        let mut contents = Vec::with_capacity(results.len());
        for (fragment, result) in self.fragments.iter().zip(results) {
            match result {
                Ok(items) => contents.extend(items),
                Err(e) if e.is_config_error() => return Err(e),
                Err(e) => {
                    let position = fragment.position();
                    warn!(%position, error = %e, "fragment failed, using error content");
                    contents.push(ErrorContent::new(position.name(), position.clone(), e).into());
                }
            }
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        provider::{from_fn, SharedProvider},
        selection::{with_all, with_first},
        static_text::static_text,
        tracer::RecordingTracer,
    };
    use std::sync::Arc;

    const X: Position = Position::from_static("X");
    const Y: Position = Position::from_static("Y");
    const Z: Position = Position::from_static("Z");

    fn delayed(body: &str, ms: u64) -> SharedProvider {
        static_text(body)
            .with_delay(Duration::from_millis(ms))
            .shared()
    }

    fn failing() -> SharedProvider {
        from_fn(|_, _, _| async { Err::<Option<Content>, _>(Error::provider("svc", "Bumm!!!")) })
    }

    #[tokio::test]
    async fn keeps_list_order_regardless_of_completion_order() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 60)),
            Fragment::new(Y, delayed("B", 30)),
            Fragment::new(Z, delayed("C", 0)),
        ]);

        let contents = page.fetch().await.unwrap();

        let bodies: Vec<_> = contents.iter().map(Content::body).collect();
        assert_eq!(bodies, vec!["A", "B", "C"]);
        let positions: Vec<_> = contents.iter().map(|c| c.position().clone()).collect();
        assert_eq!(positions, vec![X, Y, Z]);
    }

    #[tokio::test]
    async fn runs_fragments_concurrently() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 100)),
            Fragment::new(Y, delayed("B", 100)),
            Fragment::new(Z, delayed("C", 100)),
        ]);

        let started = Instant::now();
        page.fetch().await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn concatenates_fragment_sequences() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 20))
                .followed_by(|_| Parameters::empty(), Fragment::new(Y, delayed("B", 0))),
            Fragment::new(Z, delayed("C", 0)),
        ]);

        let contents = page.fetch().await.unwrap();

        let bodies: Vec<_> = contents.iter().map(Content::body).collect();
        assert_eq!(bodies, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn failed_fragment_becomes_error_content_in_place() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 10)),
            Fragment::new(Y, failing()),
            Fragment::new(Z, delayed("C", 0)),
        ]);

        let contents = page.fetch().await.unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].body(), "A");
        assert_eq!(contents[2].body(), "C");

        let placeholder = &contents[1];
        assert!(placeholder.is_error_content());
        assert!(!placeholder.is_available());
        assert_eq!(placeholder.position(), &Y);
        assert_eq!(placeholder.body(), "");
        assert_eq!(
            placeholder.as_error_content().unwrap().message(),
            "provider `svc` failed: Bumm!!!"
        );
    }

    #[tokio::test]
    async fn broken_definitions_fail_the_page() {
        let mismatched = with_all(vec![
            static_text("Foo").at(X).shared(),
            static_text("Bar").at(Y).shared(),
        ])
        .unwrap();
        let page = Page::new(vec![
            Fragment::new(X, mismatched),
            Fragment::new(Z, delayed("C", 0)),
        ]);

        let err = page.fetch().await.unwrap_err();

        assert!(matches!(err, Error::PositionMismatch { .. }));
    }

    #[tokio::test]
    async fn page_timeout_aborts_the_execution() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 0)),
            Fragment::new(Y, delayed("B", 5_000)),
        ])
        .with_timeout(Duration::from_millis(30));

        let err = page.fetch().await.unwrap_err();

        assert!(matches!(err, Error::PageTimeout(after) if after == Duration::from_millis(30)));
    }

    #[tokio::test]
    async fn parameters_reach_every_fragment() {
        let page = Page::new(vec![
            Fragment::new(X, static_text("{id}-x").shared()),
            Fragment::new(Y, static_text("{id}-y").shared()),
        ]);

        let contents = page
            .fetch_with(&no_op_tracer(), &Parameters::empty().with("id", 42))
            .await
            .unwrap();

        assert_eq!(contents[0].body(), "42-x");
        assert_eq!(contents[1].body(), "42-y");
    }

    #[tokio::test]
    async fn tracer_sees_the_whole_execution() {
        let recorder = Arc::new(RecordingTracer::new());
        let tracer: SharedTracer = recorder.clone();
        let page = Page::new(vec![
            Fragment::new(
                X,
                with_first(vec![failing(), static_text("").shared(), delayed("A", 5)]).unwrap(),
            ),
            Fragment::new(Y, delayed("B", 5)),
        ]);

        page.fetch_with(&tracer, &Parameters::empty()).await.unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.fragments, 2);
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.unavailable, 0);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.candidate_failures, 1);

        let last = recorder.events().pop().unwrap();
        assert_eq!(last.kind, EventKind::PageCompleted);
        assert_eq!(last.message.as_deref(), Some("2 items"));
    }

    #[tokio::test]
    async fn plain_fragment_counts_as_one_successful_fetch() {
        let recorder = Arc::new(RecordingTracer::new());
        let tracer: SharedTracer = recorder.clone();
        let page = Page::new(vec![Fragment::new(X, static_text("A").shared())]);

        page.fetch_with(&tracer, &Parameters::empty()).await.unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.fragments, 1);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.candidates, 0);
    }

    #[tokio::test]
    async fn nested_selections_do_not_inflate_fetches() {
        let recorder = Arc::new(RecordingTracer::new());
        let tracer: SharedTracer = recorder.clone();
        let nested =
            with_first(vec![with_all(vec![delayed("a", 0), delayed("b", 0)]).unwrap()]).unwrap();
        let page = Page::new(vec![Fragment::new(X, nested)]);

        page.fetch_with(&tracer, &Parameters::empty()).await.unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.candidate_failures, 0);
    }

    #[tokio::test]
    async fn failed_follow_up_keeps_its_parent() {
        let page = Page::new(vec![
            Fragment::new(X, delayed("A", 0))
                .followed_by(|_| Parameters::empty(), Fragment::new(Y, failing())),
            Fragment::new(Z, delayed("C", 0)),
        ]);

        let contents = page.fetch().await.unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].body(), "A");
        assert!(contents[1].is_error_content());
        assert_eq!(contents[1].position(), &Y);
        assert_eq!(contents[2].body(), "C");
    }
}
