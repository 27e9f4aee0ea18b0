pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod editor;
pub mod highlight;
pub mod language;
pub mod markdown;
pub mod prompt;
pub mod session;
pub mod tui;

pub use language::{LANGUAGES, Language};

/// The two things a user can ask the model to do with the code buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Review,
    Fix,
}

impl Action {
    /// Short verb used in the status bar and logs.
    pub fn verb(self) -> &'static str {
        match self {
            Action::Review => "review",
            Action::Fix => "fix",
        }
    }
}

/// The single outcome slot shown in the response pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseState {
    #[default]
    Empty,
    /// Cleared while a call is pending.
    Loading,
    /// Successful model output, rendered as markdown.
    Text(String),
    /// Input warning or prefixed API failure.
    Error(String),
}

impl ResponseState {
    /// Text to render when not loading. `Empty` and `Loading` render as "".
    pub fn text(&self) -> &str {
        match self {
            ResponseState::Text(text) | ResponseState::Error(text) => text,
            ResponseState::Empty | ResponseState::Loading => "",
        }
    }
}

/// Which completion wins when two requests overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RacePolicy {
    /// Only the most recently started request may write the response.
    #[default]
    LatestStarted,
    /// Every completion overwrites the response, whichever settles last wins.
    LastCompleted,
}
