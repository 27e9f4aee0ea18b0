use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::RacePolicy;
use crate::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Parser, Debug)]
#[command(
    name = "code-review",
    version,
    about = "Review or fix source code with a hosted language model"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// File to load into the editor when launching the TUI.
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Language code or label (e.g. "python", "C#"). Defaults to the file extension, then JavaScript.
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Model identifier passed to generateContent.
    #[arg(long, global = true, env = "CODE_REVIEW_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the generation API.
    #[arg(long, global = true, env = "CODE_REVIEW_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API key. Missing keys only fail when a request is sent.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds (no timeout when omitted).
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Which completion is shown when requests overlap.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "CODE_REVIEW_RACE_POLICY",
        default_value = "latest-started"
    )]
    pub race_policy: RacePolicy,

    /// Write logs to this file (filter with RUST_LOG).
    #[arg(long, global = true, env = "CODE_REVIEW_LOG")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review a file once and print the result.
    Review(OneShotArgs),
    /// Fix a file once and print the fenced result.
    Fix(OneShotArgs),
    /// List the supported languages.
    Languages,
}

#[derive(Args, Debug)]
pub struct OneShotArgs {
    /// Source file, or "-" / omitted to read stdin.
    pub file: Option<PathBuf>,
}

impl OneShotArgs {
    /// Path to read, `None` meaning stdin.
    pub fn path(&self) -> Option<&PathBuf> {
        self.file.as_ref().filter(|p| p.as_os_str() != "-")
    }
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
