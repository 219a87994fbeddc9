// SPDX-License-Identifier: MIT

//! HTTP boundary
//!
//! Thin JSON handlers over a shared [`WorkflowRunner`]; every thread
//! operation maps to one route under `/api/threads/{id}`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::TollgateError;
use crate::adk::model::Content;
use crate::tollgate::workflow::interrupt::ResumeDecision;
use crate::tollgate::workflow::runner::{RunInput, WorkflowRunner};
use crate::tollgate::workflow::state::StateDelta;

pub async fn serve(
    runner: WorkflowRunner,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(runner);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(runner: WorkflowRunner) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/threads", get(list_threads))
        .route("/api/threads/{id}", get(get_thread).delete(evict_thread))
        .route("/api/threads/{id}/invoke", post(invoke))
        .route("/api/threads/{id}/resume", post(resume))
        .route("/api/threads/{id}/stream", post(stream_thread))
        .route("/api/threads/{id}/interrupt", get(get_interrupt))
        .route("/api/threads/{id}/history", get(get_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(runner)
}

/// Engine error rendered as a JSON response
pub struct ApiError(TollgateError);

impl From<TollgateError> for ApiError {
    fn from(err: TollgateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TollgateError::ThreadNotFound { .. } | TollgateError::CheckpointNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            TollgateError::ThreadBusy { .. } | TollgateError::NoPendingInterrupt { .. } => {
                StatusCode::CONFLICT
            }
            TollgateError::InvalidResumeInput(_)
            | TollgateError::InvalidDelta { .. }
            | TollgateError::Json(_) => StatusCode::BAD_REQUEST,
            TollgateError::MalformedWorkflow(_) | TollgateError::UnknownTool { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {}", self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "recoverable": self.0.is_recoverable(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Body of `invoke` and `stream`. An empty body continues the thread.
#[derive(Debug, Default, Deserialize)]
pub struct InvokeRequest {
    /// User message appended to `messages`
    #[serde(default)]
    pub input: Option<String>,
    /// Raw field updates, merged before the message
    #[serde(default)]
    pub values: Option<Value>,
}

impl InvokeRequest {
    fn into_run_input(self) -> Result<RunInput, TollgateError> {
        if self.input.is_none() && self.values.is_none() {
            return Ok(RunInput::Continue);
        }
        let mut delta = match self.values {
            Some(values) => StateDelta::from_object(values)?,
            None => StateDelta::new(),
        };
        if let Some(text) = self.input {
            delta = delta.message(&Content::user(text))?;
        }
        Ok(RunInput::Values(delta))
    }
}

async fn health_check(State(runner): State<WorkflowRunner>) -> Json<Value> {
    Json(json!({ "status": "ok", "workflow": runner.workflow().name() }))
}

async fn list_threads(State(runner): State<WorkflowRunner>) -> ApiResult {
    Ok(Json(json!(runner.list_threads().await?)))
}

async fn get_thread(State(runner): State<WorkflowRunner>, Path(id): Path<String>) -> ApiResult {
    let thread = runner.get_thread(&id).await?;
    Ok(Json(serde_json::to_value(thread).map_err(TollgateError::from)?))
}

async fn evict_thread(State(runner): State<WorkflowRunner>, Path(id): Path<String>) -> ApiResult {
    let evicted = runner.evict(&id).await?;
    Ok(Json(json!({ "evicted": evicted })))
}

#[tracing::instrument(skip(runner, payload))]
async fn invoke(
    State(runner): State<WorkflowRunner>,
    Path(id): Path<String>,
    Json(payload): Json<InvokeRequest>,
) -> ApiResult {
    let outcome = runner.invoke(&id, payload.into_run_input()?).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TollgateError::from)?))
}

#[tracing::instrument(skip(runner))]
async fn resume(
    State(runner): State<WorkflowRunner>,
    Path(id): Path<String>,
    Json(decision): Json<ResumeDecision>,
) -> ApiResult {
    let outcome = runner.invoke(&id, RunInput::Resume(decision)).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TollgateError::from)?))
}

async fn get_interrupt(State(runner): State<WorkflowRunner>, Path(id): Path<String>) -> ApiResult {
    let status = runner.pending_interrupt(&id).await?;
    Ok(Json(serde_json::to_value(status).map_err(TollgateError::from)?))
}

async fn get_history(State(runner): State<WorkflowRunner>, Path(id): Path<String>) -> ApiResult {
    let history = runner.get_history(&id).await?;
    Ok(Json(serde_json::to_value(history).map_err(TollgateError::from)?))
}

#[tracing::instrument(skip(runner, payload))]
async fn stream_thread(
    State(runner): State<WorkflowRunner>,
    Path(id): Path<String>,
    Json(payload): Json<InvokeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let input = payload.into_run_input()?;
    log::info!("Starting streaming run for thread {}", id);

    let stream = runner.stream(id, input).map(|item| {
        let event = match item {
            Ok(event) => Event::default()
                .event("step")
                .json_data(&event)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
            Err(e) => Event::default()
                .event("error")
                .json_data(json!({ "error": e.to_string(), "recoverable": e.is_recoverable() }))
                .unwrap_or_else(|_| Event::default().event("error").data(e.to_string())),
        };
        Ok(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(1))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tollgate::config::RunnerConfig;
    use crate::tollgate::workflow::executor::StepExecutor;
    use crate::tollgate::workflow::graph::{FnNode, WorkflowGraph};
    use crate::tollgate::workflow::registry::ToolRegistry;
    use crate::tollgate::workflow::state::StateSchema;
    use crate::tollgate::workflow::store::MemoryStore;
    use std::sync::Arc;

    fn runner() -> WorkflowRunner {
        let workflow = WorkflowGraph::new("echo")
            .with_schema(StateSchema::messages())
            .add_node(
                "echo",
                FnNode::new(|state| {
                    Ok(StateDelta::new().set("echoed", json!(state.message_count())))
                }),
            )
            .set_start("echo")
            .set_terminal("echo")
            .compile()
            .unwrap();
        WorkflowRunner::new(
            workflow,
            StepExecutor::without_model(ToolRegistry::new()),
            Arc::new(MemoryStore::new()),
            RunnerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_invoke_and_get_thread() {
        let runner = runner();
        let request = InvokeRequest {
            input: Some("hi".into()),
            values: None,
        };
        let Json(body) = invoke(State(runner.clone()), Path("t1".into()), Json(request))
            .await
            .ok()
            .unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["state"]["echoed"], json!(1));

        let Json(thread) = get_thread(State(runner.clone()), Path("t1".into()))
            .await
            .ok()
            .unwrap();
        assert_eq!(thread["status"], "completed");

        let Json(history) = get_history(State(runner), Path("t1".into()))
            .await
            .ok()
            .unwrap();
        assert_eq!(history.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let runner = runner();
        let response = get_thread(State(runner.clone()), Path("missing".into()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = resume(
            State(runner),
            Path("missing".into()),
            Json(ResumeDecision::Accept),
        )
        .await
        .err()
        .unwrap()
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError(TollgateError::malformed("bad edge")).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_request_translation() {
        assert_eq!(
            InvokeRequest::default().into_run_input().unwrap(),
            RunInput::Continue
        );
        let input = InvokeRequest {
            input: None,
            values: Some(json!({"name": "LangGraph"})),
        }
        .into_run_input()
        .unwrap();
        assert_eq!(
            input,
            RunInput::Values(StateDelta::new().set("name", json!("LangGraph")))
        );
        assert!(InvokeRequest {
            input: None,
            values: Some(json!([1, 2])),
        }
        .into_run_input()
        .is_err());
    }
}
