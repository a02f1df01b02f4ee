//! Conversation session controller.
//!
//! Owns the live [`Session`] and is the only thing that talks to the
//! [`AssessmentService`]. State sits behind an async mutex that is released
//! while a request is in flight, so `reset` may run concurrently with `submit`.
//! A reply is applied only if the session it was issued under is still live.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::models::{ApiResponse, AssessmentService, InvokeRequest, InvokeResponse, ServiceError};
use crate::session::{AssessmentResult, ERROR_REPLY, Message, Role, Session};

/// Notified once per session, when the service signals `chat_done`.
pub trait CompletionObserver: Send + Sync {
    fn on_complete(&self, payload: &InvokeResponse);
}

impl<F> CompletionObserver for F
where
    F: Fn(&InvokeResponse) + Send + Sync,
{
    fn on_complete(&self, payload: &InvokeResponse) {
        self(payload)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    EmptyInput,
    AwaitingReply,
    SessionComplete,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Nothing was appended and no request was issued.
    Ignored { reason: IgnoreReason },
    Replied,
    Completed { payload: InvokeResponse },
    /// The error reply was appended; the session can be resubmitted.
    Failed { error: ServiceError },
    /// The session was reset while the request was in flight; the reply was dropped.
    Stale,
}

pub struct SessionController {
    service: Arc<dyn AssessmentService>,
    patient_history: Vec<Value>,
    observer: Option<Arc<dyn CompletionObserver>>,
    state: Mutex<Session>,
}

impl SessionController {
    pub fn new(service: Arc<dyn AssessmentService>) -> Self {
        let session = Session::new();
        tracing::info!(session_id = %session.session_id, "session initialized");
        Self { service, patient_history: Vec::new(), observer: None, state: Mutex::new(session) }
    }

    /// Records sent as `PatientHistory` alongside the first message of every session.
    pub fn with_patient_history(mut self, history: Vec<Value>) -> Self {
        self.patient_history = history;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CompletionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn snapshot(&self) -> Session {
        self.state.lock().await.clone()
    }

    /// Replaces the live session. A request still in flight for the old one is left to finish
    /// and its reply is discarded.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, Session::new());
        tracing::info!(
            previous = %previous.session_id,
            session_id = %state.session_id,
            was_awaiting = previous.is_awaiting_reply,
            "session reset"
        );
    }

    /// Sends one user turn. Exactly one request per accepted call, never retried.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let (issued_under, request) = {
            let mut state = self.state.lock().await;
            if text.trim().is_empty() {
                return SubmitOutcome::Ignored { reason: IgnoreReason::EmptyInput };
            }
            if state.is_awaiting_reply {
                tracing::debug!(session_id = %state.session_id, "submit ignored: reply pending");
                return SubmitOutcome::Ignored { reason: IgnoreReason::AwaitingReply };
            }
            if state.is_complete {
                tracing::debug!(session_id = %state.session_id, "submit ignored: session complete");
                return SubmitOutcome::Ignored { reason: IgnoreReason::SessionComplete };
            }

            // Decided here, under the lock, for the session this turn belongs to.
            let first_turn = !state.has_user_turns();
            state.messages.push(Message::new(Role::User, text));
            state.is_awaiting_reply = true;

            let request = InvokeRequest {
                session_id: state.session_id.to_string(),
                latest_message: text.to_string(),
                api_response: first_turn.then(|| ApiResponse { patient_history: self.patient_history.clone() }),
            };
            (state.session_id.clone(), request)
        };

        metrics::counter!("careway_turns_total").increment(1);
        tracing::info!(session_id = %issued_under, first = request.api_response.is_some(), "turn submitted");

        let reply = self.service.invoke(&request).await;

        let mut state = self.state.lock().await;
        if state.session_id != issued_under {
            metrics::counter!("careway_stale_responses_total").increment(1);
            tracing::info!(issued_under = %issued_under, live = %state.session_id, "discarding reply for replaced session");
            return SubmitOutcome::Stale;
        }
        state.is_awaiting_reply = false;

        match reply {
            Ok(payload) => {
                state.messages.push(Message::new(Role::Assistant, payload.message.clone()));
                if !payload.chat_done {
                    return SubmitOutcome::Replied;
                }
                state.complete(AssessmentResult::from(&payload));
                drop(state);

                metrics::counter!("careway_assessments_completed_total").increment(1);
                tracing::info!(session_id = %issued_under, "assessment complete");
                if let Some(observer) = &self.observer {
                    observer.on_complete(&payload);
                }
                SubmitOutcome::Completed { payload }
            }
            Err(error) => {
                metrics::counter!("careway_turn_failures_total").increment(1);
                tracing::warn!(session_id = %issued_under, %error, "assessment request failed");
                state.messages.push(Message::new(Role::Assistant, ERROR_REPLY));
                SubmitOutcome::Failed { error }
            }
        }
    }
}
