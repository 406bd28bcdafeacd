// crates/serve/src/provider.rs

//! The content provider port.
//!
//! Concrete providers (HTTP clients, caches, static fixtures) live outside the
//! engine and implement [`ContentProvider`]. The engine only ever sees
//! [`SharedProvider`] handles, which is what lets the selection strategies
//! build providers out of other providers.

use crate::{tracer::SharedTracer, Error};
use async_trait::async_trait;
use domain::{Content, Parameters, Position};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub type SharedProvider = Arc<dyn ContentProvider>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetch the content for `position`.
    ///
    /// `Ok(None)` means the provider had nothing to offer; an `Err` is a
    /// failed fetch. Must be safe to call repeatedly and concurrently.
    async fn fetch(
        &self,
        position: &Position,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Closures as providers
// ─────────────────────────────────────────────────────────────────────────────

struct FnProvider<F> {
    f: F,
}

/// Lifts a closure into a [`SharedProvider`].
///
/// The closure receives owned clones of its arguments so the returned future
/// can be `'static`.
pub fn from_fn<F, Fut>(f: F) -> SharedProvider
where
    F: Fn(Position, SharedTracer, Parameters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Content>, Error>> + Send + 'static,
{
    Arc::new(FnProvider { f })
}

#[async_trait]
impl<F, Fut> ContentProvider for FnProvider<F>
where
    F: Fn(Position, SharedTracer, Parameters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Content>, Error>> + Send + 'static,
{
    async fn fetch(
        &self,
        position: &Position,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error> {
        (self.f)(position.clone(), tracer.clone(), parameters.clone()).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeout
// ─────────────────────────────────────────────────────────────────────────────

struct Timeout {
    inner: SharedProvider,
    after: Duration,
}

/// Bounds every invocation of `provider` to `after`.
///
/// An expired invocation is dropped (which cancels whatever it was awaiting)
/// and reported as [`Error::Timeout`], a plain fetch failure as far as the
/// selection strategies are concerned.
pub fn with_timeout(provider: SharedProvider, after: Duration) -> SharedProvider {
    Arc::new(Timeout {
        inner: provider,
        after,
    })
}

#[async_trait]
impl ContentProvider for Timeout {
    async fn fetch(
        &self,
        position: &Position,
        tracer: &SharedTracer,
        parameters: &Parameters,
    ) -> Result<Option<Content>, Error> {
        match tokio::time::timeout(self.after, self.inner.fetch(position, tracer, parameters)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(%position, after = ?self.after, "provider timed out");
                Err(Error::Timeout {
                    position: position.clone(),
                    after: self.after,
                })
            }
        }
    }
}
