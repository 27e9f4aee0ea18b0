use crate::{Action, Language, RacePolicy, ResponseState, prompt};
use thiserror::Error;
use tracing::debug;

/// Errors raised by session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// A request that passed the blank-code check.
///
/// The prompt is built when the request starts, so later edits to the
/// language or code do not leak into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub token: u64,
    pub action: Action,
    pub language: Language,
    pub prompt: String,
}

/// Result of [`Session::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Begin {
    /// The code buffer was blank; the warning is already in the response.
    Rejected,
    Started(PendingRequest),
}

/// Settled result of a generation call, before it is mapped to display text.
pub type Outcome = std::result::Result<String, String>;

/// In-memory state for one editing session.
///
/// Every mutation bumps `revision`, which the presentation layer compares
/// against the last value it drew.
#[derive(Debug, Default)]
pub struct Session {
    language: Language,
    code: String,
    response: ResponseState,
    loading: bool,
    policy: RacePolicy,
    revision: u64,
    next_token: u64,
    latest_token: Option<u64>,
    in_flight: usize,
}

impl Session {
    pub fn new(policy: RacePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        if self.language != language {
            self.language = language;
            self.touch();
        }
    }

    /// Select a language by code or label.
    pub fn select_language(&mut self, name: &str) -> Result<Language> {
        let language =
            Language::find(name).ok_or_else(|| SessionError::UnknownLanguage(name.to_owned()))?;
        self.set_language(language);
        Ok(language)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        let code = code.into();
        if self.code != code {
            self.code = code;
            self.touch();
        }
    }

    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    pub fn set_response(&mut self, response: ResponseState) {
        self.response = response;
        self.touch();
    }

    /// True from the start of an awaited call until it settles, whatever the
    /// response slot holds in between.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of started requests that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start `action` against the current buffer.
    ///
    /// Blank code stores the action's warning and leaves the loading flag as is.
    pub fn begin(&mut self, action: Action) -> Begin {
        if self.code.trim().is_empty() {
            debug!(action = action.verb(), "blank code buffer, request not sent");
            self.set_response(ResponseState::Error(
                prompt::empty_warning(action).to_owned(),
            ));
            return Begin::Rejected;
        }

        self.next_token += 1;
        let token = self.next_token;
        self.latest_token = Some(token);
        self.in_flight += 1;
        self.loading = true;
        self.set_response(ResponseState::Loading);

        Begin::Started(PendingRequest {
            token,
            action,
            language: self.language,
            prompt: prompt::build(action, self.language, &self.code),
        })
    }

    /// Apply a settled call. Returns `false` when the race policy discards it.
    pub fn settle(&mut self, request: &PendingRequest, outcome: Outcome) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        if self.policy == RacePolicy::LatestStarted && self.latest_token != Some(request.token) {
            debug!(
                token = request.token,
                latest = ?self.latest_token,
                "discarding superseded completion"
            );
            return false;
        }

        let response = match outcome {
            Ok(text) => ResponseState::Text(prompt::success_text(
                request.action,
                request.language,
                text,
            )),
            Err(message) => ResponseState::Error(prompt::error_message(request.action, &message)),
        };
        self.loading = false;
        self.set_response(response);
        true
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_code(code: &str) -> Session {
        let mut session = Session::new(RacePolicy::LatestStarted);
        session.set_code(code);
        session
    }

    fn started(begin: Begin) -> PendingRequest {
        match begin {
            Begin::Started(request) => request,
            Begin::Rejected => panic!("expected request to start"),
        }
    }

    #[test]
    fn new_session_is_idle() {
        let session = Session::new(RacePolicy::default());
        assert_eq!(session.language(), Language::default());
        assert_eq!(session.code(), "");
        assert_eq!(session.response(), &ResponseState::Empty);
        assert!(!session.is_loading());
    }

    #[test]
    fn blank_code_is_rejected_without_loading() {
        for code in ["", "   ", "\n\t  \n"] {
            let mut session = session_with_code(code);
            assert_eq!(session.begin(Action::Review), Begin::Rejected);
            assert!(!session.is_loading());
            assert_eq!(session.response().text(), prompt::REVIEW_EMPTY_WARNING);
            assert_eq!(session.in_flight(), 0);

            assert_eq!(session.begin(Action::Fix), Begin::Rejected);
            assert_eq!(session.response().text(), prompt::FIX_EMPTY_WARNING);
        }
    }

    #[test]
    fn begin_clears_response_and_sets_loading() {
        let mut session = session_with_code("x = 1");
        session.set_response(ResponseState::Text("old".into()));

        let request = started(session.begin(Action::Review));
        assert!(session.is_loading());
        assert_eq!(session.response().text(), "");
        assert_eq!(request.token, 1);
        assert!(request.prompt.contains("x = 1"));
    }

    #[test]
    fn settle_success_and_failure() {
        let mut session = session_with_code("x = 1");
        let request = started(session.begin(Action::Review));
        assert!(session.settle(&request, Ok("looks fine".into())));
        assert!(!session.is_loading());
        assert_eq!(session.response(), &ResponseState::Text("looks fine".into()));

        let request = started(session.begin(Action::Fix));
        assert!(session.settle(&request, Err("quota exceeded".into())));
        assert_eq!(
            session.response(),
            &ResponseState::Error("⚠️ Error generating fixed code: quota exceeded".into())
        );
    }

    #[test]
    fn prompt_is_fixed_at_start() {
        let mut session = session_with_code("print('hi')");
        session.select_language("python").unwrap();
        let request = started(session.begin(Action::Fix));

        session.select_language("rust").unwrap();
        session.set_code("fn main() {}");
        assert!(request.prompt.contains("written in python"));
        assert!(!request.prompt.contains("fn main"));

        session.settle(&request, Ok("print('hi')".into()));
        assert_eq!(session.response().text(), "```python\nprint('hi')\n```");
    }

    #[test]
    fn latest_started_discards_superseded_completion() {
        let mut session = session_with_code("x = 1");
        let first = started(session.begin(Action::Review));
        let second = started(session.begin(Action::Fix));

        assert!(session.settle(&second, Ok("fixed".into())));
        assert!(!session.settle(&first, Ok("review".into())));
        assert_eq!(session.response().text(), "```javascript\nfixed\n```");
        assert_eq!(session.in_flight(), 0);
    }

    #[test]
    fn latest_started_keeps_loading_until_latest_settles() {
        let mut session = session_with_code("x = 1");
        let first = started(session.begin(Action::Review));
        let second = started(session.begin(Action::Review));

        assert!(!session.settle(&first, Ok("stale".into())));
        assert!(session.is_loading());
        assert!(session.settle(&second, Ok("fresh".into())));
        assert_eq!(session.response().text(), "fresh");
    }

    #[test]
    fn blank_press_keeps_pending_call_loading() {
        for policy in [RacePolicy::LatestStarted, RacePolicy::LastCompleted] {
            let mut session = Session::new(policy);
            session.set_code("x = 1");
            let request = started(session.begin(Action::Review));

            session.set_code("   ");
            assert_eq!(session.begin(Action::Fix), Begin::Rejected);
            assert!(session.is_loading(), "{policy:?}");
            assert_eq!(session.response().text(), prompt::FIX_EMPTY_WARNING);
            assert_eq!(session.in_flight(), 1);

            assert!(session.settle(&request, Ok("late".into())));
            assert!(!session.is_loading(), "{policy:?}");
            assert_eq!(session.response().text(), "late");
        }
    }

    #[test]
    fn last_completed_lets_every_completion_overwrite() {
        let mut session = Session::new(RacePolicy::LastCompleted);
        session.set_code("x = 1");
        let first = started(session.begin(Action::Review));
        let second = started(session.begin(Action::Review));

        assert!(session.settle(&second, Ok("second".into())));
        assert!(session.settle(&first, Ok("first".into())));
        assert_eq!(session.response().text(), "first");
        assert!(!session.is_loading());
    }

    #[test]
    fn select_unknown_language_fails() {
        let mut session = Session::new(RacePolicy::default());
        let err = session.select_language("cobol").unwrap_err();
        assert_eq!(err.to_string(), "unknown language: cobol");
        assert_eq!(session.language(), Language::default());
    }

    #[test]
    fn revision_moves_on_change_only() {
        let mut session = Session::new(RacePolicy::default());
        let start = session.revision();
        session.set_code("");
        assert_eq!(session.revision(), start);
        session.set_code("a");
        assert_eq!(session.revision(), start + 1);
        session.select_language("go").unwrap();
        assert_eq!(session.revision(), start + 2);
    }
}
