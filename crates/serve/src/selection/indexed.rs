// crates/serve/src/selection/indexed.rs

use domain::Content;
use std::ops::Deref;

/// Content tagged with its provider's index in a fan-out.
///
/// Fan-out results arrive in completion order; the index restores list order
/// before they are folded. Every accessor except `source` goes straight to
/// the wrapped content.
#[derive(Debug)]
pub(crate) struct IndexedContent {
    index: usize,
    content: Content,
}

impl IndexedContent {
    pub(crate) fn new(index: usize, content: Content) -> Self {
        Self { index, content }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// `'{index}:{source}'`, so traces can tell concurrent siblings apart.
    pub(crate) fn source(&self) -> String {
        format!("'{}:{}'", self.index, self.content.source())
    }

    pub(crate) fn into_content(self) -> Content {
        self.content
    }
}

impl Deref for IndexedContent {
    type Target = Content;

    fn deref(&self) -> &Content {
        &self.content
    }
}
