//! Terminal front end for a [`ChatWidget`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::controller::{IgnoreReason, SubmitOutcome};
use crate::session::Role;
use crate::voice::VoiceEvent;
use crate::widget::ChatWidget;

const HELP: &str = "Commands: /new start a new chat, /voice toggle voice input, /results show results, /quit exit";

pub async fn run<R, W>(widget: &ChatWidget, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    print_transcript(widget, 0, out).await?;
    out.write_all(format!("{}\n", HELP).as_bytes()).await?;
    if !widget.has_voice() {
        out.write_all(b"(voice input is not available on this terminal)\n").await?;
    }

    let mut lines = input.lines();
    loop {
        let prompt: &[u8] = if widget.is_listening() { b"(listening) > " } else { b"> " };
        out.write_all(prompt).await?;
        out.flush().await?;
        let Some(line) = lines.next_line().await? else { break };

        match line.trim() {
            "/quit" => break,
            "/new" => {
                widget.new_chat().await;
                print_transcript(widget, 0, out).await?;
            }
            "/voice" => {
                let note = match widget.toggle_listening() {
                    None => "Voice input is not available.".to_string(),
                    Some(VoiceEvent::Started) => "Listening... type /voice again to stop.".to_string(),
                    Some(VoiceEvent::Transcribed(Some(text))) => format!("Heard: {} (press enter to send)", text),
                    Some(VoiceEvent::Transcribed(None)) => "Nothing was recognized.".to_string(),
                    Some(VoiceEvent::Failed(reason)) => format!("Voice input failed: {}", reason),
                };
                out.write_all(format!("{}\n", note).as_bytes()).await?;
            }
            "/results" => match widget.results() {
                Some(view) => out.write_all(format!("{}\n", view).as_bytes()).await?,
                None => out.write_all(b"Complete the chat to see assessment results.\n").await?,
            },
            _ => {
                // An empty line sends whatever voice input left pending.
                if !line.trim().is_empty() {
                    widget.set_input(line.as_str());
                }
                let before = widget.snapshot().await.messages.len();
                match widget.send().await {
                    SubmitOutcome::Ignored { reason: IgnoreReason::SessionComplete } => {
                        out.write_all(b"Assessment complete. Type /new to start a new chat.\n").await?;
                    }
                    SubmitOutcome::Ignored { .. } => {}
                    SubmitOutcome::Completed { .. } => {
                        print_transcript(widget, before, out).await?;
                        out.write_all(b"Assessment complete! Your results are ready below.\n\n").await?;
                        if let Some(view) = widget.results() {
                            out.write_all(format!("{}\n", view).as_bytes()).await?;
                        }
                    }
                    SubmitOutcome::Replied | SubmitOutcome::Failed { .. } | SubmitOutcome::Stale => {
                        print_transcript(widget, before, out).await?;
                    }
                }
            }
        }
    }
    out.flush().await?;
    Ok(())
}

/// Prints assistant messages from index `from` onwards.
async fn print_transcript<W: AsyncWrite + Unpin>(widget: &ChatWidget, from: usize, out: &mut W) -> anyhow::Result<()> {
    let session = widget.snapshot().await;
    for msg in session.messages.iter().skip(from).filter(|m| m.role == Role::Assistant) {
        let stamp = msg.sent_at.with_timezone(&chrono::Local).format("%H:%M");
        out.write_all(format!("assistant [{}]: {}\n", stamp, msg.text).as_bytes()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{ScriptedService, done_with_symptoms, reply};
    use crate::models::{InvokeResponse, ServiceError};
    use crate::session::{ERROR_REPLY, GREETING};
    use tokio::io::BufReader;

    async fn drive(widget: &ChatWidget, script: &str) -> String {
        let mut out = Vec::new();
        run(widget, BufReader::new(script.as_bytes()), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn conversation_prints_replies_and_results() {
        let svc = ScriptedService::new(vec![
            reply("How long have you had it?"),
            Ok(InvokeResponse {
                message: "Thanks, that's all I need.".into(),
                chat_done: true,
                summary: Some("Probable migraine.".into()),
                ..Default::default()
            }),
        ]);
        let widget = ChatWidget::new(svc.clone(), Vec::new());
        let out = drive(&widget, "headache\n\nthree days\nmore\n/quit\nnever read\n").await;

        assert!(out.contains(GREETING));
        assert!(out.contains("How long have you had it?"));
        assert!(out.contains("== Medical Summary =="));
        assert!(out.contains("Probable migraine."));
        assert!(out.contains("Type /new to start a new chat."));
        assert_eq!(svc.request_count(), 2);
    }

    #[tokio::test]
    async fn failures_show_the_error_reply_and_new_chat_restarts() {
        let svc = ScriptedService::new(vec![Err(ServiceError::Status(503)), done_with_symptoms(&["fever"])]);
        let widget = ChatWidget::new(svc.clone(), Vec::new());
        let out = drive(&widget, "fever\nfever\n/results\n/new\n/results\n").await;

        assert!(out.contains(ERROR_REPLY));
        assert!(out.contains("* fever"));
        assert_eq!(out.matches(GREETING).count(), 2);
        assert!(out.ends_with("Complete the chat to see assessment results.\n> "));
        assert_eq!(widget.snapshot().await.messages.len(), 1);
    }

    #[tokio::test]
    async fn voice_command_without_capability() {
        let widget = ChatWidget::new(ScriptedService::new(vec![]), Vec::new());
        let out = drive(&widget, "/voice\n").await;
        assert!(out.contains("Voice input is not available."));
    }
}
