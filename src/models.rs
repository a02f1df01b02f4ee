use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::settings::EffectiveSettings;

/// Body of `POST <endpoint>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeRequest {
    pub session_id: String,
    pub latest_message: String,
    /// Only present on the first message of a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApiResponse {
    #[serde(rename = "PatientHistory")]
    pub patient_history: Vec<Value>,
}

/// Successful reply from the assessment service. `message` and `chat_done` are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InvokeResponse {
    pub message: String,
    pub chat_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnoses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history_summary: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("assessment service returned status {0}")]
    Status(u16),
    #[error("could not decode assessment response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn invoke(&self, req: &InvokeRequest) -> Result<InvokeResponse, ServiceError>;
}

#[derive(Clone)]
pub struct HttpAssessmentService {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAssessmentService {
    pub fn new(settings: &EffectiveSettings) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, endpoint: settings.endpoint.clone() })
    }
}

#[async_trait]
impl AssessmentService for HttpAssessmentService {
    async fn invoke(&self, req: &InvokeRequest) -> Result<InvokeResponse, ServiceError> {
        tracing::debug!(session_id = %req.session_id, first = req.api_response.is_some(), "invoking assessment service");
        let resp = self.client.post(self.endpoint.clone()).json(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(session_id = %req.session_id, %status, "assessment service call failed");
            return Err(ServiceError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn service_for(addr: SocketAddr, timeout: Duration) -> HttpAssessmentService {
        let settings = EffectiveSettings {
            endpoint: Url::parse(&format!("http://{}/invoke", addr)).unwrap(),
            timeout,
            patient_history: Vec::new(),
        };
        HttpAssessmentService::new(&settings).unwrap()
    }

    fn first_request() -> InvokeRequest {
        InvokeRequest {
            session_id: "session_1_abc".into(),
            latest_message: "I have a headache".into(),
            api_response: Some(ApiResponse::default()),
        }
    }

    #[test]
    fn request_serializes_patient_history_only_when_present() {
        let v = serde_json::to_value(first_request()).unwrap();
        assert_eq!(v, json!({
            "session_id": "session_1_abc",
            "latest_message": "I have a headache",
            "api_response": {"PatientHistory": []}
        }));

        let later = InvokeRequest { api_response: None, ..first_request() };
        let v = serde_json::to_value(later).unwrap();
        assert!(v.get("api_response").is_none());
    }

    #[test]
    fn response_requires_message_and_chat_done() {
        let ok: InvokeResponse = serde_json::from_value(json!({"message": "hi", "chat_done": false, "summary": null})).unwrap();
        assert_eq!(ok.summary, None);
        assert!(serde_json::from_value::<InvokeResponse>(json!({"message": "hi"})).is_err());
        assert!(serde_json::from_value::<InvokeResponse>(json!({"chat_done": true})).is_err());
    }

    #[tokio::test]
    async fn posts_json_and_decodes_reply() {
        let app = Router::new().route(
            "/invoke",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(json!({
                    "message": format!("echo:{}", body["latest_message"].as_str().unwrap_or("")),
                    "chat_done": body["api_response"]["PatientHistory"].is_array(),
                    "symptoms": ["headache"],
                }))
            }),
        );
        let addr = spawn(app).await;
        let svc = service_for(addr, Duration::from_secs(5));
        let resp = svc.invoke(&first_request()).await.unwrap();
        assert_eq!(resp.message, "echo:I have a headache");
        assert!(resp.chat_done);
        assert_eq!(resp.symptoms, Some(vec!["headache".to_string()]));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route("/invoke", post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }));
        let addr = spawn(app).await;
        let err = service_for(addr, Duration::from_secs(5)).invoke(&first_request()).await.unwrap_err();
        assert_eq!(err, ServiceError::Status(502));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let app = Router::new().route("/invoke", post(|| async { Json(json!({"text": "wrong shape"})) }));
        let addr = spawn(app).await;
        let err = service_for(addr, Duration::from_secs(5)).invoke(&first_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let app = Router::new().route(
            "/invoke",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"message": "late", "chat_done": false}))
            }),
        );
        let addr = spawn(app).await;
        let err = service_for(addr, Duration::from_millis(100)).invoke(&first_request()).await.unwrap_err();
        assert_eq!(err, ServiceError::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = service_for(addr, Duration::from_secs(5)).invoke(&first_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)), "got {err:?}");
    }
}
