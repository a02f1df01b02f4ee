use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::InvokeResponse;

pub const GREETING: &str = "Hello! I am your medical assistant. Please describe your symptoms or health concerns so I can help assess your condition.";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error processing your message. Please try again.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role, text: text.into(), sent_at: Utc::now() }
    }
}

/// `session_<unix millis>_<9 base36 chars>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let mut n = Uuid::new_v4().as_u128();
        let mut suffix = String::with_capacity(9);
        for _ in 0..9 {
            let digit = (n % 36) as u32;
            n /= 36;
            suffix.push(char::from_digit(digit, 36).unwrap_or('0'));
        }
        Self(format!("session_{}_{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AssessmentResult {
    pub summary: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub diagnoses: Option<Vec<String>>,
    pub specialties: Option<Vec<String>>,
    pub history_summary: Option<String>,
}

impl From<&InvokeResponse> for AssessmentResult {
    fn from(r: &InvokeResponse) -> Self {
        Self {
            summary: r.summary.clone(),
            symptoms: r.symptoms.clone(),
            diagnoses: r.diagnoses.clone(),
            specialties: r.specialties.clone(),
            history_summary: r.medical_history_summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub is_awaiting_reply: bool,
    pub is_complete: bool,
    pub result: Option<AssessmentResult>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::generate(),
            created_at: Utc::now(),
            messages: vec![Message::new(Role::Assistant, GREETING)],
            is_awaiting_reply: false,
            is_complete: false,
            result: None,
        }
    }

    pub fn has_user_turns(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    pub(crate) fn complete(&mut self, result: AssessmentResult) {
        self.is_complete = true;
        self.result = Some(result);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
