// crates/domain/src/position.rs

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identity of a slot in the page layout.
///
/// Layouts usually know their slots up front, so `from_static` is `const`
/// and allocation free. Callers that model their layout as an enum should
/// implement `From<TheirEnum> for Position`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Cow<'static, str>);

impl Position {
    pub const fn from_static(name: &'static str) -> Self {
        Position(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Position(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Position {
    fn from(name: &str) -> Self {
        Position::new(name)
    }
}

impl From<String> for Position {
    fn from(name: String) -> Self {
        Position::new(name)
    }
}
