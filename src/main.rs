use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use code_review::cli::{self, Cli, Commands, OneShotArgs};
use code_review::client::GeminiClient;
use code_review::config::Config;
use code_review::dispatch::{BackgroundDispatcher, Dispatcher};
use code_review::session::Session;
use code_review::tui::{App, run_tui};
use code_review::{Action, LANGUAGES, Language, ResponseState};

fn main() -> Result<()> {
    let Cli {
        global,
        file,
        command,
    } = cli::parse_args();

    let action = match command {
        Some(Commands::Languages) => {
            handle_languages();
            return Ok(());
        }
        Some(Commands::Review(args)) => Some((Action::Review, args)),
        Some(Commands::Fix(args)) => Some((Action::Fix, args)),
        None => None,
    };

    let config = Config::from_args(&global)?;
    init_tracing(config.log_file.as_deref(), action.is_none())?;

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let client = GeminiClient::new(&config.base_url, config.api_key.clone(), config.timeout)
        .context("Failed to build HTTP client")?;
    if !client.has_api_key() {
        warn!("no API key configured, requests will fail until GEMINI_API_KEY is set");
    }
    let dispatcher = Dispatcher::new(Arc::new(client), config.model.clone());

    match action {
        Some((action, args)) => handle_once(&runtime, &dispatcher, &config, action, &args),
        None => handle_tui(&runtime, dispatcher, &config, file.as_deref()),
    }
}

/// Install the tracing subscriber.
///
/// The TUI owns the terminal, so it only logs when a file is given.
fn init_tracing(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None if !interactive => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
        None => {}
    }
    Ok(())
}

/// Print the language table.
fn handle_languages() {
    for language in LANGUAGES.iter() {
        println!("{}\t{}", language.code, language.label);
    }
}

/// Pick the starting language: explicit flag, then file extension, then the default.
fn initial_language(config: &Config, path: Option<&Path>) -> Language {
    config
        .language
        .or_else(|| path.and_then(Language::from_path))
        .unwrap_or_default()
}

/// Run one review or fix and print the response state.
///
/// Exits with status 1 when the response is a warning or error.
fn handle_once(
    runtime: &Runtime,
    dispatcher: &Dispatcher,
    config: &Config,
    action: Action,
    args: &OneShotArgs,
) -> Result<()> {
    let path = args.path().map(|p| p.as_path());
    let code = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let mut session = Session::new(config.race_policy);
    session.set_language(initial_language(config, path));
    session.set_code(code);

    info!(
        action = action.verb(),
        language = session.language().code,
        "running one-shot request"
    );
    runtime.block_on(dispatcher.execute(&mut session, action));

    match session.response() {
        ResponseState::Text(text) => {
            println!("{}", text);
            Ok(())
        }
        ResponseState::Error(message) => {
            println!("{}", message);
            std::process::exit(1);
        }
        ResponseState::Empty | ResponseState::Loading => Ok(()),
    }
}

/// Launch the interactive editor, optionally preloaded from a file.
fn handle_tui(
    runtime: &Runtime,
    dispatcher: Dispatcher,
    config: &Config,
    file: Option<&Path>,
) -> Result<()> {
    let mut session = Session::new(config.race_policy);
    session.set_language(initial_language(config, file));
    if let Some(path) = file {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        session.set_code(code);
    }

    let background = BackgroundDispatcher::new(dispatcher, runtime.handle().clone());
    run_tui(App::new(session, background))
}
