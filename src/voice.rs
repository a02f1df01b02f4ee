use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("speech recognition failed to start: {0}")]
    Start(String),
}

/// Platform speech-to-text. One utterance per start/stop cycle; only final results.
pub trait SpeechRecognizer: Send {
    fn start(&mut self) -> Result<(), VoiceError>;
    /// Ends capture and returns the final result segments of the utterance.
    fn stop(&mut self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Started,
    /// Capture ended. `None` when nothing was recognized.
    Transcribed(Option<String>),
    Failed(String),
}

/// Owned handle on a recognizer. Released when dropped.
pub struct VoiceInput {
    recognizer: Box<dyn SpeechRecognizer>,
    listening: bool,
}

impl VoiceInput {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self { recognizer, listening: false }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn toggle(&mut self) -> VoiceEvent {
        if self.listening {
            self.listening = false;
            let transcript: String = self.recognizer.stop().concat();
            let transcript = (!transcript.trim().is_empty()).then_some(transcript);
            tracing::debug!(recognized = transcript.is_some(), "voice capture stopped");
            return VoiceEvent::Transcribed(transcript);
        }
        match self.recognizer.start() {
            Ok(()) => {
                self.listening = true;
                tracing::debug!("voice capture started");
                VoiceEvent::Started
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice capture unavailable");
                VoiceEvent::Failed(e.to_string())
            }
        }
    }
}

impl Drop for VoiceInput {
    fn drop(&mut self) {
        if self.listening {
            let _ = self.recognizer.stop();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Hands back canned segments and records calls.
    #[derive(Clone, Default)]
    pub(crate) struct CannedRecognizer {
        pub segments: Vec<String>,
        pub fail_start: bool,
        pub log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpeechRecognizer for CannedRecognizer {
        fn start(&mut self) -> Result<(), VoiceError> {
            self.log.lock().unwrap().push("start");
            if self.fail_start {
                return Err(VoiceError::Start("no microphone".into()));
            }
            Ok(())
        }

        fn stop(&mut self) -> Vec<String> {
            self.log.lock().unwrap().push("stop");
            self.segments.clone()
        }
    }

    #[test]
    fn toggle_cycles_and_joins_segments() {
        let rec = CannedRecognizer { segments: vec!["sore ".into(), "throat".into()], ..Default::default() };
        let mut voice = VoiceInput::new(Box::new(rec));
        assert_eq!(voice.toggle(), VoiceEvent::Started);
        assert!(voice.is_listening());
        assert_eq!(voice.toggle(), VoiceEvent::Transcribed(Some("sore throat".into())));
        assert!(!voice.is_listening());
    }

    #[test]
    fn silence_yields_no_transcript() {
        let mut voice = VoiceInput::new(Box::new(CannedRecognizer::default()));
        voice.toggle();
        assert_eq!(voice.toggle(), VoiceEvent::Transcribed(None));
    }

    #[test]
    fn failed_start_does_not_enter_listening() {
        let rec = CannedRecognizer { fail_start: true, ..Default::default() };
        let mut voice = VoiceInput::new(Box::new(rec));
        assert!(matches!(voice.toggle(), VoiceEvent::Failed(_)));
        assert!(!voice.is_listening());
    }

    #[test]
    fn dropping_while_listening_releases_recognizer() {
        let rec = CannedRecognizer::default();
        let log = rec.log.clone();
        let mut voice = VoiceInput::new(Box::new(rec));
        voice.toggle();
        drop(voice);
        assert_eq!(*log.lock().unwrap(), vec!["start", "stop"]);
    }
}
