// crates/edge/src/layout.rs

//! Page layouts read from TOML.
//!
//! ```toml
//! [[fragments]]
//! position = "teaser"
//! strategy = "first"
//!
//! [[fragments.sources]]
//! text = ""
//!
//! [[fragments.sources]]
//! text = "Hello World"
//! delay_ms = 20
//!
//! [[fragments.followed_by]]
//! position = "related"
//! bind = "topic"
//!
//! [[fragments.followed_by.sources]]
//! text = "More about {topic}"
//! ```
//!
//! Sources are static texts; a source with `fail` set always fails with that
//! message instead. A follow-up's `bind` names the parameter that receives
//! the parent's body.

use crate::Error;
use domain::{setting::ComposerSettings, Content, Headers, Parameters, Position};
use regex::Regex;
use serde::Deserialize;
use serve::{
    from_fn, static_text, with_all, with_all_matching, with_first, with_first_matching,
    with_timeout, Fragment, Page, SharedProvider,
};
use std::{collections::BTreeMap, path::Path, time::Duration};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub fragments: Vec<FragmentDef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    First,
    FirstMatching,
    All,
    AllMatching,
}

impl Strategy {
    fn needs_pattern(self) -> bool {
        matches!(self, Strategy::FirstMatching | Strategy::AllMatching)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FragmentDef {
    pub position: String,

    #[serde(default)]
    pub strategy: Strategy,

    /// Regex the body must match, for the matching strategies.
    pub pattern: Option<String>,

    /// Parameter receiving the parent's body; follow-ups only.
    pub bind: Option<String>,

    pub sources: Vec<SourceDef>,

    #[serde(default)]
    pub followed_by: Vec<FragmentDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceDef {
    pub text: String,
    pub source: Option<String>,
    pub position: Option<String>,
    pub delay_ms: Option<u64>,
    pub fail: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Layout {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    #[tracing::instrument(skip_all)]
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let layout = Self::from_toml(&text)?;
        debug!(
            "Loaded {} top-level fragments from {}",
            layout.fragments.len(),
            path.display()
        );
        Ok(layout)
    }

    /// Builds the executable page, applying the timeouts of `settings`.
    pub fn to_page(&self, settings: &ComposerSettings) -> Result<Page, Error> {
        let fragments = self
            .fragments
            .iter()
            .map(|def| def.to_fragment(settings))
            .collect::<Result<Vec<_>, _>>()?;

        let page = Page::new(fragments);
        Ok(match settings.page_timeout() {
            Some(after) => page.with_timeout(after),
            None => page,
        })
    }
}

impl FragmentDef {
    fn to_fragment(&self, settings: &ComposerSettings) -> Result<Fragment, Error> {
        let providers: Vec<SharedProvider> = self
            .sources
            .iter()
            .map(|source| source.to_provider(settings))
            .collect();

        if self.pattern.is_some() && !self.strategy.needs_pattern() {
            return Err(Error::Config(format!(
                "fragment `{}`: pattern is only used by the matching strategies",
                self.position
            )));
        }
        let predicate = self.pattern.as_deref().map(matcher).transpose()?;

        let provider = match (self.strategy, predicate) {
            (Strategy::First, _) => with_first(providers),
            (Strategy::All, _) => with_all(providers),
            (Strategy::FirstMatching, Some(p)) => with_first_matching(p, providers),
            (Strategy::AllMatching, Some(p)) => with_all_matching(p, providers),
            (strategy, None) => {
                return Err(Error::Config(format!(
                    "fragment `{}`: strategy {strategy:?} needs a pattern",
                    self.position
                )))
            }
        }?;

        let mut fragment = Fragment::new(Position::new(self.position.as_str()), provider);
        for follow_up in &self.followed_by {
            let bind = follow_up.bind.clone();
            fragment = fragment.followed_by(
                move |parent: &Content| match &bind {
                    Some(name) => Parameters::empty().with(name.as_str(), parent.body()),
                    None => Parameters::empty(),
                },
                follow_up.to_fragment(settings)?,
            );
        }
        Ok(fragment)
    }
}

fn matcher(pattern: &str) -> Result<impl Fn(&Content) -> bool + Send + Sync + 'static, Error> {
    let re = Regex::new(pattern)?;
    Ok(move |content: &Content| re.is_match(content.body()))
}

impl SourceDef {
    fn name(&self) -> String {
        self.source.clone().unwrap_or_else(|| "static".to_owned())
    }

    fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    fn to_provider(&self, settings: &ComposerSettings) -> SharedProvider {
        let provider = match &self.fail {
            Some(message) => failing(self.name(), message.clone(), self.delay()),
            None => {
                let mut text = static_text(self.text.as_str())
                    .with_source(self.name())
                    .with_headers(Headers::single(self.headers.iter()));
                if let Some(position) = &self.position {
                    text = text.at(Position::new(position.as_str()));
                }
                if let Some(delay) = self.delay() {
                    text = text.with_delay(delay);
                }
                text.shared()
            }
        };

        match settings.provider_timeout() {
            Some(after) => with_timeout(provider, after),
            None => provider,
        }
    }
}

fn failing(source: String, message: String, delay: Option<Duration>) -> SharedProvider {
    from_fn(move |_, _, _| {
        let source = source.clone();
        let message = message.clone();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Err::<Option<Content>, _>(serve::Error::provider(source, message))
        }
    })
}
