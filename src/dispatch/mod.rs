use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::Action;
use crate::client::GenerationClient;
use crate::session::{Begin, Outcome, PendingRequest, Session};

/// A finished background call, waiting to be applied by the UI loop.
#[derive(Debug)]
pub struct Completion {
    pub request: PendingRequest,
    pub outcome: Outcome,
}

/// Sends prompts to one model through one client and writes the outcome
/// back into the [`Session`].
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn GenerationClient>,
    model: String,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the network call for an already started request.
    ///
    /// Failures are flattened to their message; nothing is retried.
    pub async fn call(&self, request: &PendingRequest) -> Outcome {
        info!(
            token = request.token,
            action = request.action.verb(),
            language = request.language.code,
            model = %self.model,
            "dispatching request"
        );
        match self.client.generate(&self.model, &request.prompt).await {
            Ok(text) => {
                debug!(token = request.token, len = text.len(), "request succeeded");
                Ok(text)
            }
            Err(e) => {
                warn!(token = request.token, "request failed: {}", e);
                Err(e.to_string())
            }
        }
    }

    /// Start `action`, await the call, and settle it on `session`.
    ///
    /// Returns `true` if the session's response was written by a completion,
    /// `false` if the request was rejected or discarded.
    pub async fn execute(&self, session: &mut Session, action: Action) -> bool {
        match session.begin(action) {
            Begin::Rejected => false,
            Begin::Started(request) => {
                let outcome = self.call(&request).await;
                session.settle(&request, outcome)
            }
        }
    }
}

/// Runs dispatcher calls on a tokio runtime and hands completions back over a channel.
///
/// The UI stays responsive while calls are outstanding and any number of
/// calls may overlap; [`Session::settle`] decides which one is shown.
pub struct BackgroundDispatcher {
    dispatcher: Dispatcher,
    handle: Handle,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl BackgroundDispatcher {
    pub fn new(dispatcher: Dispatcher, handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            dispatcher,
            handle,
            tx,
            rx,
        }
    }

    pub fn model(&self) -> &str {
        self.dispatcher.model()
    }

    /// Start `action` and spawn its call. Returns the request token, or `None`
    /// if the blank-code check rejected it.
    pub fn submit(&self, session: &mut Session, action: Action) -> Option<u64> {
        let Begin::Started(request) = session.begin(action) else {
            return None;
        };
        let token = request.token;
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let outcome = dispatcher.call(&request).await;
            // Receiver only goes away when the app is shutting down.
            let _ = tx.send(Completion { request, outcome });
        });
        Some(token)
    }

    /// Apply every completion that has arrived. Returns how many changed the response.
    pub fn drain(&mut self, session: &mut Session) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(completion) => {
                    if session.settle(&completion.request, completion.outcome) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Wait for the next completion and apply it. Used where there is no UI loop to poll.
    pub async fn settle_next(&mut self, session: &mut Session) -> Option<bool> {
        let completion = self.rx.recv().await?;
        Some(session.settle(&completion.request, completion.outcome))
    }
}
