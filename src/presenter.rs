//! Maps a completed assessment payload onto displayable sections.

use serde::Serialize;
use std::fmt;

use crate::models::InvokeResponse;

pub const DISCLAIMER: &str = "This assessment is for informational purposes only and should not be considered a substitute for professional medical advice, diagnosis, or treatment. Always consult with a qualified healthcare provider for any health concerns.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Summary,
    Symptoms,
    Diagnoses,
    Specialties,
    History,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SectionBody {
    Text(String),
    /// Preformatted text, rendered verbatim.
    Preformatted(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub title: &'static str,
    pub subtitle: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultsView {
    pub sections: Vec<Section>,
    pub disclaimer: &'static str,
}

/// `None` unless the payload carries the completion signal.
pub fn render(payload: Option<&InvokeResponse>) -> Option<ResultsView> {
    let data = payload.filter(|p| p.chat_done)?;
    let mut sections = Vec::new();

    if let Some(summary) = non_blank(&data.summary) {
        sections.push(Section {
            kind: SectionKind::Summary,
            title: "Medical Summary",
            subtitle: "Based on your symptoms and medical history".into(),
            body: SectionBody::Text(summary.to_string()),
        });
    }
    if let Some(symptoms) = non_empty(&data.symptoms) {
        sections.push(Section {
            kind: SectionKind::Symptoms,
            title: "Identified Symptoms",
            subtitle: format!("{} symptom(s) detected", symptoms.len()),
            body: SectionBody::List(symptoms.to_vec()),
        });
    }
    if let Some(diagnoses) = non_empty(&data.diagnoses) {
        sections.push(Section {
            kind: SectionKind::Diagnoses,
            title: "Possible Diagnoses",
            subtitle: "For professional evaluation (not a medical diagnosis)".into(),
            body: SectionBody::List(diagnoses.to_vec()),
        });
    }
    if let Some(specialties) = non_empty(&data.specialties) {
        sections.push(Section {
            kind: SectionKind::Specialties,
            title: "Recommended Specialties",
            subtitle: "Consider consulting these specialists".into(),
            body: SectionBody::List(specialties.to_vec()),
        });
    }
    if let Some(history) = non_blank(&data.medical_history_summary) {
        sections.push(Section {
            kind: SectionKind::History,
            title: "Medical History",
            subtitle: "Patient records summary".into(),
            body: SectionBody::Preformatted(history.to_string()),
        });
    }

    Some(ResultsView { sections, disclaimer: DISCLAIMER })
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn non_empty(field: &Option<Vec<String>>) -> Option<&[String]> {
    field.as_deref().filter(|v| !v.is_empty())
}

impl fmt::Display for ResultsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "== {} ==", section.title)?;
            writeln!(f, "({})", section.subtitle)?;
            match &section.body {
                SectionBody::Text(text) => writeln!(f, "{}", text)?,
                SectionBody::Preformatted(text) => {
                    for line in text.lines() {
                        writeln!(f, "  {}", line)?;
                    }
                }
                SectionBody::List(items) => {
                    for item in items {
                        writeln!(f, "  * {}", item)?;
                    }
                }
            }
            writeln!(f)?;
        }
        write!(f, "Disclaimer: {}", self.disclaimer)
    }
}
