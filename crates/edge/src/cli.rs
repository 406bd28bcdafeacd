// crates/edge/src/cli.rs

use crate::{layout::Layout, output::Report, Error};
use chrono::{DateTime, Utc};
use clap::{builder::ValueHint, Parser, Subcommand};
use domain::{setting::Settings, Content, Parameters};
use serde_json::Value as Json;
use serve::{no_op_tracer, Page, RecordingTracer, SharedTracer};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{debug, error, info};

pub type Result<T> = std::result::Result<T, Error>;

/// Composer CLI
#[tokio::main(flavor = "multi_thread")]
#[tracing::instrument(skip_all)]
pub async fn start() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compose(compose) => do_compose(compose).await,
    };

    result.map_or_else(
        |e| {
            error!("Failed to compose page: {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
        |json| {
            println!("{json}");
            ExitCode::SUCCESS
        },
    )
}

/// Loads settings and layout, runs the page and renders the JSON report.
#[tracing::instrument(skip_all)]
pub async fn do_compose(compose: ComposeCmd) -> Result<String> {
    let then = Utc::now();
    let process = ComposeProcess::<CommandIssued>::load_settings(compose)?;
    info!("Settings loaded in {} milliseconds", millis_since(then));

    let then = Utc::now();
    let process = process.load_layout()?;
    info!("Layout loaded in {} milliseconds", millis_since(then));

    let then = Utc::now();
    let process = process.compose().await?;
    info!("Page composed in {} milliseconds", millis_since(then));

    process.render()
}

fn millis_since(then: DateTime<Utc>) -> i64 {
    Utc::now().timestamp_millis() - then.timestamp_millis()
}

#[derive(Parser, Debug)]
#[command(name = "composer", version, about = "Compose a page out of content providers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the page described by a layout file and print the result as JSON
    Compose(ComposeCmd),
}

#[derive(Parser, Debug)]
pub struct ComposeCmd {
    /// Layout file (TOML)
    #[arg(
        value_name = "LAYOUT",
        value_hint = ValueHint::FilePath,
        value_parser = file_must_exist
    )]
    pub layout: PathBuf,

    /// Settings file with a `[composer]` table (or set COMPOSER_SETTINGS)
    #[arg(
        long,
        env = "COMPOSER_SETTINGS",
        value_hint = ValueHint::FilePath,
        value_parser = file_must_exist
    )]
    pub settings: Option<PathBuf>,

    /// Request parameter; values that parse as JSON are passed as JSON
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Json)>,

    /// Record trace events and include fetch statistics in the output
    #[arg(long)]
    pub trace: bool,
}

fn file_must_exist(s: &str) -> std::result::Result<PathBuf, String> {
    let p = PathBuf::from(s);
    if !p.exists() {
        return Err(format!("Not found: {}", p.display()));
    }
    if !p.is_file() {
        return Err(format!("Not a file: {}", p.display()));
    }
    Ok(p)
}

fn parse_param(s: &str) -> Result<(String, Json)> {
    let (key, value) = s
        .split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .ok_or_else(|| Error::InvalidParam(s.to_owned()))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Json::String(value.to_owned()));
    Ok((key.trim().to_owned(), value))
}

// ─────────────────────────────────────────────────────────────────────────────
// Compose process state machine
// ─────────────────────────────────────────────────────────────────────────────

trait ProcessState {}

struct CommandIssued;

struct SettingsLoaded {
    command: ComposeCmd,
    settings: Settings,
}

struct LayoutLoaded {
    command: ComposeCmd,
    settings: Settings,
    page: Page,
}

struct Composed {
    contents: Vec<Content>,
    recorder: Option<Arc<RecordingTracer>>,
}

impl ProcessState for CommandIssued {}
impl ProcessState for SettingsLoaded {}
impl ProcessState for LayoutLoaded {}
impl ProcessState for Composed {}

struct ComposeProcess<S: ProcessState> {
    state: S,
}

impl ComposeProcess<CommandIssued> {
    /// Reads the settings file if one was given; defaults otherwise.
    #[tracing::instrument(skip_all)]
    fn load_settings(command: ComposeCmd) -> Result<ComposeProcess<SettingsLoaded>> {
        let settings = match &command.settings {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| Error::io(path.as_path(), e))?;
                toml::from_str::<Settings>(&text).map_err(|err| {
                    Error::Config(format!("Invalid settings at {}: {}", path.display(), err))
                })?
            }
            None => Settings::default(),
        };
        debug!("Composer settings: {:?}", settings.composer);

        Ok(ComposeProcess {
            state: SettingsLoaded { command, settings },
        })
    }
}

impl ComposeProcess<SettingsLoaded> {
    #[tracing::instrument(skip_all)]
    fn load_layout(self) -> Result<ComposeProcess<LayoutLoaded>> {
        let layout = Layout::load(&self.state.command.layout)?;
        let page = layout.to_page(&self.state.settings.composer)?;

        Ok(ComposeProcess {
            state: LayoutLoaded {
                command: self.state.command,
                settings: self.state.settings,
                page,
            },
        })
    }
}

impl ComposeProcess<LayoutLoaded> {
    #[tracing::instrument(skip_all)]
    async fn compose(self) -> Result<ComposeProcess<Composed>> {
        let LayoutLoaded {
            command,
            settings,
            page,
        } = self.state;

        let recorder =
            (command.trace || settings.composer.trace).then(|| Arc::new(RecordingTracer::new()));
        let tracer: SharedTracer = match &recorder {
            Some(recorder) => recorder.clone(),
            None => no_op_tracer(),
        };
        let parameters: Parameters = command.params.into_iter().collect();

        let contents = page.fetch_with(&tracer, &parameters).await?;

        Ok(ComposeProcess {
            state: Composed { contents, recorder },
        })
    }
}

impl ComposeProcess<Composed> {
    fn render(self) -> Result<String> {
        let stats = self.state.recorder.as_ref().map(|r| r.stats());
        Ok(Report::new(&self.state.contents, stats.as_ref()).to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const LAYOUT: &str = r#"
        [[fragments]]
        position = "greeting"
        [[fragments.sources]]
        text = "Hello {name}"

        [[fragments]]
        position = "teaser"
        strategy = "all"
        [[fragments.sources]]
        text = "Foo"
        source = "foo"
        delay_ms = 20
        [[fragments.sources]]
        text = "Bar"
        source = "bar"

        [[fragments]]
        position = "broken"
        strategy = "all"
        [[fragments.sources]]
        fail = "Bumm!!!"
    "#;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn command(layout: &Path) -> ComposeCmd {
        ComposeCmd {
            layout: layout.to_path_buf(),
            settings: None,
            params: Vec::new(),
            trace: false,
        }
    }

    async fn run(compose: ComposeCmd) -> Json {
        serde_json::from_str(&do_compose(compose).await.unwrap()).unwrap()
    }

    #[test]
    fn parse_param_accepts_json_and_plain_values() {
        assert_eq!(parse_param("id=42").unwrap(), ("id".to_owned(), json!(42)));
        assert_eq!(
            parse_param("name=World").unwrap(),
            ("name".to_owned(), json!("World"))
        );
        assert_eq!(
            parse_param("query=a=b").unwrap(),
            ("query".to_owned(), json!("a=b"))
        );
        assert!(matches!(parse_param("novalue"), Err(Error::InvalidParam(_))));
        assert!(matches!(parse_param("=x"), Err(Error::InvalidParam(_))));
    }

    #[test]
    fn cli_parses_compose_arguments() {
        let dir = tempdir().unwrap();
        let layout = write(&dir, "layout.toml", LAYOUT);

        let cli = Cli::try_parse_from([
            "composer",
            "compose",
            layout.to_str().unwrap(),
            "--param",
            "name=World",
            "-p",
            "id=7",
            "--trace",
        ])
        .unwrap();

        let Commands::Compose(compose) = cli.command;
        assert_eq!(compose.layout, layout);
        assert_eq!(compose.params.len(), 2);
        assert!(compose.trace);
    }

    #[test]
    fn cli_rejects_missing_layout() {
        assert!(Cli::try_parse_from(["composer", "compose", "/definitely/not/here.toml"]).is_err());
    }

    #[tokio::test]
    async fn compose_renders_contents_in_layout_order() {
        let dir = tempdir().unwrap();
        let layout = write(&dir, "layout.toml", LAYOUT);
        let mut compose = command(&layout);
        compose.params = vec![("name".to_owned(), json!("World"))];

        let json = run(compose).await;

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["body"], json!("Hello World"));
        assert_eq!(contents[1]["body"], json!("FooBar"));
        assert_eq!(contents[1]["source"], json!("foo,bar"));
        assert_eq!(contents[2]["position"], json!("broken"));
        assert_eq!(contents[2]["available"], json!(false));
        assert_eq!(contents[2]["error"], json!("provider `static` failed: Bumm!!!"));
        assert!(json.get("stats").is_none());
    }

    #[tokio::test]
    async fn trace_flag_adds_stats() {
        let dir = tempdir().unwrap();
        let layout = write(&dir, "layout.toml", LAYOUT);
        let mut compose = command(&layout);
        compose.trace = true;

        let json = run(compose).await;

        assert_eq!(json["stats"]["fragments"], json!(3));
        assert_eq!(json["stats"]["fetches"], json!(3));
        assert_eq!(json["stats"]["succeeded"], json!(2));
        assert_eq!(json["stats"]["failed"], json!(1));
        assert_eq!(json["stats"]["candidates"], json!(4));
        assert_eq!(json["stats"]["candidate_failures"], json!(1));
    }

    #[tokio::test]
    async fn settings_file_enables_tracing_and_timeouts() {
        let dir = tempdir().unwrap();
        let layout = write(
            &dir,
            "layout.toml",
            r#"
            [[fragments]]
            position = "slow"
            [[fragments.sources]]
            text = "late"
            delay_ms = 5000
            [[fragments.sources]]
            text = "in time"
            "#,
        );
        let settings = write(
            &dir,
            "settings.toml",
            "[composer]\nprovider_timeout_ms = 20\ntrace = true\n",
        );
        let mut compose = command(&layout);
        compose.settings = Some(settings);

        let json = run(compose).await;

        assert_eq!(json["contents"][0]["body"], json!("in time"));
        assert_eq!(json["stats"]["fetches"], json!(1));
        assert_eq!(json["stats"]["succeeded"], json!(1));
        assert_eq!(json["stats"]["failed"], json!(0));
        assert_eq!(json["stats"]["candidate_failures"], json!(1));
    }

    #[tokio::test]
    async fn invalid_settings_are_reported() {
        let dir = tempdir().unwrap();
        let layout = write(&dir, "layout.toml", LAYOUT);
        let settings = write(&dir, "settings.toml", "[composer]\ntrace = \"yes\"\n");
        let mut compose = command(&layout);
        compose.settings = Some(settings);

        let err = do_compose(compose).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }
}
