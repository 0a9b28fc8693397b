//! HTTP endpoint layer: the axum router over the translator.
//!
//! Handlers validate the request, hand the validated fields to the
//! [`Translator`], and return its payload unchanged: 201 for task creation,
//! 200 for everything else, HTML for guides and reports.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{Html, Response};
use axum::routing::{get, put};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::auth::{BasicCredentials, require_basic_auth};
use super::request::{self, ApiError};
use crate::oscapd::{ResultId, TaskId};
use crate::runtime::ShutdownSignal;
use crate::translate::types::*;
use crate::translate::{ResultSelector, SsgSource, TaskSelector, Translator};

/// Shared state accessible to all route handlers.
pub struct ApiState {
    pub translator: Translator,
    pub credentials: Option<Arc<BasicCredentials>>,
    /// Log every request at `info` rather than `debug`.
    pub verbose: bool,
}

impl ApiState {
    pub fn new(translator: Translator) -> Self {
        Self {
            translator,
            credentials: None,
            verbose: false,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<BasicCredentials>) -> Self {
        self.credentials = credentials.map(Arc::new);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Build the axum router with all gateway routes.
pub fn router(state: Arc<ApiState>) -> axum::Router {
    let routes = axum::Router::new()
        .route("/tasks", get(handle_list_tasks).post(handle_new_task))
        .route(
            "/tasks/{id}",
            get(handle_get_task)
                .put(handle_update_task)
                .delete(handle_remove_task),
        )
        .route(
            "/tasks/{id}/guide",
            get(handle_task_guide).put(handle_schedule_literal),
        )
        .route(
            "/tasks/{id}/result",
            put(handle_schedule_literal).delete(handle_remove_task_results),
        )
        .route(
            "/tasks/{id}/result/{result_id}",
            get(handle_task_result).delete(handle_remove_task_result),
        )
        .route(
            "/tasks/{id}/run",
            get(handle_run_task).put(handle_schedule_literal),
        )
        .route("/tasks/{id}/{schedule}", put(handle_task_schedule))
        .route("/ssgs", get(handle_list_ssgs).post(handle_get_ssg));

    let routes = match state.credentials.clone() {
        Some(credentials) => {
            routes.layer(middleware::from_fn_with_state(credentials, require_basic_auth))
        }
        None => routes,
    };

    routes
        .layer(middleware::from_fn_with_state(state.clone(), log_request))
        .with_state(state)
}

/// Serve the router on `listener` until a shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP gateway listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP gateway shutting down");
        })
        .await
}

async fn log_request(State(state): State<Arc<ApiState>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if state.verbose {
        info!(%method, %path, status, elapsed_ms, "request");
    } else {
        debug!(%method, %path, status, elapsed_ms, "request");
    }
    response
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_list_tasks(State(state): State<Arc<ApiState>>) -> Json<TasksEnvelope<TaskView>> {
    Json(state.translator.get_task(TaskSelector::All).await)
}

async fn handle_new_task(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<TasksEnvelope<CreatedTask>>), ApiError> {
    let fields = request::new_task_fields(&body)?;
    let created = state.translator.new_task(&fields).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn handle_get_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
) -> Json<TasksEnvelope<TaskView>> {
    Json(state.translator.get_task(TaskSelector::One(id)).await)
}

async fn handle_update_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
    body: Bytes,
) -> Result<Json<TasksEnvelope<UpdatedTask>>, ApiError> {
    let fields = request::update_task_fields(&body)?;
    Ok(Json(state.translator.update_task(id, &fields).await))
}

async fn handle_remove_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
) -> Json<TasksEnvelope<RemoveAck>> {
    Json(state.translator.remove_task(id).await)
}

async fn handle_task_guide(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
) -> Html<String> {
    Html(state.translator.get_task_guide(id).await)
}

async fn handle_task_result(
    State(state): State<Arc<ApiState>>,
    Path((id, result)): Path<(TaskId, ResultId)>,
) -> Html<String> {
    Html(state.translator.get_task_result(id, result).await)
}

async fn handle_remove_task_results(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
) -> Json<TasksEnvelope<ResultRemoval>> {
    Json(
        state
            .translator
            .remove_task_result(id, ResultSelector::All)
            .await,
    )
}

async fn handle_remove_task_result(
    State(state): State<Arc<ApiState>>,
    Path((id, result)): Path<(TaskId, ResultId)>,
) -> Json<TasksEnvelope<ResultRemoval>> {
    Json(
        state
            .translator
            .remove_task_result(id, ResultSelector::One(result))
            .await,
    )
}

async fn handle_run_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
) -> Json<TasksEnvelope<RunAck>> {
    Json(state.translator.run_task_outside_schedule(id).await)
}

async fn handle_task_schedule(
    State(state): State<Arc<ApiState>>,
    Path((id, schedule)): Path<(TaskId, String)>,
) -> Json<TasksEnvelope<ScheduleAck>> {
    Json(state.translator.task_schedule(id, &schedule).await)
}

/// `PUT` on a fixed sub-resource (`guide`, `result`, `run`) is a schedule
/// change with that literal as the status, which never modifies anything.
async fn handle_schedule_literal(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<TaskId>,
    uri: Uri,
) -> Json<TasksEnvelope<ScheduleAck>> {
    let literal = uri.path().rsplit('/').next().unwrap_or_default();
    Json(state.translator.task_schedule(id, literal).await)
}

async fn handle_list_ssgs(State(state): State<Arc<ApiState>>) -> Json<SsgsEnvelope> {
    Json(state.translator.get_ssg(SsgSource::System, "").await)
}

async fn handle_get_ssg(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SsgsEnvelope>, ApiError> {
    let (ssg_file, tailoring_file) = request::ssg_fields(&body)?;
    Ok(Json(
        state
            .translator
            .get_ssg(SsgSource::from_request(ssg_file), &tailoring_file)
            .await,
    ))
}
