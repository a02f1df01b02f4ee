use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::{get, post}};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::controller::SubmitOutcome;
use crate::models::AssessmentService;
use crate::session::Session;
use crate::widget::ChatWidget;

/// Hosts one [`ChatWidget`] per browser tab.
#[derive(Clone)]
pub struct AppState {
    pub widgets: Arc<RwLock<HashMap<Uuid, Arc<ChatWidget>>>>,
    pub service: Arc<dyn AssessmentService>,
    pub patient_history: Arc<Vec<serde_json::Value>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<dyn AssessmentService>, patient_history: Vec<serde_json::Value>) -> Self {
        Self {
            widgets: Arc::default(),
            service,
            patient_history: Arc::new(patient_history),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    async fn widget(&self, id: Uuid) -> Result<Arc<ChatWidget>, StatusCode> {
        self.widgets.read().await.get(&id).cloned().ok_or(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWidgetResponse {
    pub id: Uuid,
}

async fn create_widget(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<CreateWidgetResponse> {
    let widget = ChatWidget::new(state.service.clone(), state.patient_history.as_ref().clone());
    let id = Uuid::new_v4();
    state.widgets.write().await.insert(id, Arc::new(widget));
    tracing::info!(widget = %id, "widget mounted");
    Json(CreateWidgetResponse { id })
}

async fn get_widget(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<Session>, StatusCode> {
    let widget = state.widget(id).await?;
    Ok(Json(widget.snapshot().await))
}

async fn delete_widget(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> StatusCode {
    if state.widgets.write().await.remove(&id).is_some() {
        tracing::info!(widget = %id, "widget unmounted");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub outcome: SubmitOutcome,
    pub session: Session,
}

async fn post_message(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, StatusCode> {
    let widget = state.widget(id).await?;
    // Detached so a dropped client connection cannot strand the session mid-request.
    let outcome = tokio::spawn({
        let widget = widget.clone();
        async move { widget.submit(&body.text).await }
    })
    .await
    .map_err(|e| {
        tracing::error!(widget = %id, error = %e, "submit task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let session = widget.snapshot().await;
    Ok(Json(SubmitResponse { outcome, session }))
}

async fn reset_widget(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<Session>, StatusCode> {
    let widget = state.widget(id).await?;
    widget.new_chat().await;
    Ok(Json(widget.snapshot().await))
}

async fn get_results(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Response, StatusCode> {
    let widget = state.widget(id).await?;
    Ok(match widget.results() {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn render_metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<String, StatusCode> {
    state.metrics.as_ref().map(PrometheusHandle::render).ok_or(StatusCode::NOT_FOUND)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/widgets", post(create_widget))
        .route("/v1/widgets/:id", get(get_widget).delete(delete_widget))
        .route("/v1/widgets/:id/messages", post(post_message))
        .route("/v1/widgets/:id/reset", post(reset_widget))
        .route("/v1/widgets/:id/results", get(get_results))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
