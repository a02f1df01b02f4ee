//! One chat instance: the session controller plus the pending input line,
//! the optional voice capability and the latest completion payload.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::controller::{CompletionObserver, SessionController, SubmitOutcome};
use crate::models::{AssessmentService, InvokeResponse};
use crate::presenter::{self, ResultsView};
use crate::session::Session;
use crate::voice::{SpeechRecognizer, VoiceEvent, VoiceInput};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct CompletionSlot(Mutex<Option<InvokeResponse>>);

impl CompletionObserver for CompletionSlot {
    fn on_complete(&self, payload: &InvokeResponse) {
        *lock(&self.0) = Some(payload.clone());
    }
}

pub struct ChatWidget {
    controller: SessionController,
    completed: Arc<CompletionSlot>,
    pending: Mutex<String>,
    voice: Mutex<Option<VoiceInput>>,
}

impl ChatWidget {
    pub fn new(service: Arc<dyn AssessmentService>, patient_history: Vec<serde_json::Value>) -> Self {
        let completed = Arc::new(CompletionSlot::default());
        let controller = SessionController::new(service)
            .with_patient_history(patient_history)
            .with_observer(completed.clone());
        Self { controller, completed, pending: Mutex::new(String::new()), voice: Mutex::new(None) }
    }

    /// Attaches a speech recognizer for the lifetime of the widget.
    #[allow(dead_code)] // no recognizer ships for the terminal
    pub fn with_voice(self, recognizer: Box<dyn SpeechRecognizer>) -> Self {
        *lock(&self.voice) = Some(VoiceInput::new(recognizer));
        self
    }

    pub fn has_voice(&self) -> bool {
        lock(&self.voice).is_some()
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.voice).as_ref().is_some_and(VoiceInput::is_listening)
    }

    /// `None` when no recognizer is attached.
    pub fn toggle_listening(&self) -> Option<VoiceEvent> {
        let event = lock(&self.voice).as_mut()?.toggle();
        if let VoiceEvent::Transcribed(Some(text)) = &event {
            self.set_input(text.clone());
        }
        Some(event)
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *lock(&self.pending) = text.into();
    }

    pub fn input(&self) -> String {
        lock(&self.pending).clone()
    }

    /// Submits the pending input. The input is cleared unless the controller ignored it.
    pub async fn send(&self) -> SubmitOutcome {
        let text = std::mem::take(&mut *lock(&self.pending));
        let outcome = self.controller.submit(&text).await;
        if matches!(outcome, SubmitOutcome::Ignored { .. }) {
            let mut pending = lock(&self.pending);
            if pending.is_empty() {
                *pending = text;
            }
        }
        outcome
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.controller.submit(text).await
    }

    pub async fn new_chat(&self) {
        self.controller.reset().await;
        lock(&self.pending).clear();
        *lock(&self.completed.0) = None;
    }

    pub async fn snapshot(&self) -> Session {
        self.controller.snapshot().await
    }

    pub fn completion(&self) -> Option<InvokeResponse> {
        lock(&self.completed.0).clone()
    }

    pub fn results(&self) -> Option<ResultsView> {
        presenter::render(self.completion().as_ref())
    }
}
