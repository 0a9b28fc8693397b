//! Request body validation and the `{"Error": ...}` response shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::oscapd::DaemonError;
use crate::translate::TaskFields;

pub const TASK_TITLE: &str = "taskTitle";
pub const TASK_TARGET: &str = "taskTarget";
pub const TASK_SSG: &str = "taskSSG";
pub const TASK_TAILORING: &str = "taskTailoring";
pub const TASK_PROFILE_ID: &str = "taskProfileId";
pub const TASK_ONLINE_REMEDIATION: &str = "taskOnlineRemediation";
pub const TASK_SCHEDULE_NOT_BEFORE: &str = "taskScheduleNotBefore";
pub const TASK_SCHEDULE_REPEAT_AFTER: &str = "taskScheduleRepeatAfter";

/// Keys every task create/update body must carry.
pub const TASK_FIELDS: [&str; 8] = [
    TASK_TITLE,
    TASK_TARGET,
    TASK_SSG,
    TASK_TAILORING,
    TASK_PROFILE_ID,
    TASK_ONLINE_REMEDIATION,
    TASK_SCHEDULE_NOT_BEFORE,
    TASK_SCHEDULE_REPEAT_AFTER,
];

pub const SSG_FILE: &str = "ssgFile";
pub const TAILORING_FILE: &str = "tailoringFile";

/// Keys every `POST /ssgs` body must carry.
pub const SSG_FIELDS: [&str; 2] = [SSG_FILE, TAILORING_FILE];

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Errors the endpoint layer reports to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("json data required")]
    JsonRequired,

    #[error("There are missing fields in the request")]
    MissingFields,

    #[error("Both taskSSG and taskProfileId fields cannot be empty")]
    EmptySsgOrProfile,

    #[error("ssgFile field cannot be empty")]
    EmptySsgFile,

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Daemon(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Parse a request body that must be a JSON object.
pub fn json_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::JsonRequired),
    }
}

/// Every key in `required` must be present (its value may be anything).
pub fn require_fields(body: &Map<String, Value>, required: &[&str]) -> Result<(), ApiError> {
    if required.iter().all(|key| body.contains_key(*key)) {
        Ok(())
    } else {
        Err(ApiError::MissingFields)
    }
}

/// A field that must be present and not the empty string.
pub fn is_empty_field(body: &Map<String, Value>, key: &str) -> bool {
    matches!(body.get(key), Some(Value::String(s)) if s.is_empty())
}

/// Validate a create (`POST /tasks`) body.
pub fn new_task_fields(body: &[u8]) -> Result<TaskFields, ApiError> {
    let map = json_object(body)?;
    require_fields(&map, &TASK_FIELDS)?;
    if is_empty_field(&map, TASK_SSG) || is_empty_field(&map, TASK_PROFILE_ID) {
        return Err(ApiError::EmptySsgOrProfile);
    }
    Ok(task_fields(map))
}

/// Validate an update (`PUT /tasks/{id}`) body. Empty values are allowed
/// and mean "leave unchanged".
pub fn update_task_fields(body: &[u8]) -> Result<TaskFields, ApiError> {
    let map = json_object(body)?;
    require_fields(&map, &TASK_FIELDS)?;
    Ok(task_fields(map))
}

/// Validate a `POST /ssgs` body, returning `(ssgFile, tailoringFile)`.
pub fn ssg_fields(body: &[u8]) -> Result<(String, String), ApiError> {
    let map = json_object(body)?;
    require_fields(&map, &SSG_FIELDS)?;
    if is_empty_field(&map, SSG_FILE) {
        return Err(ApiError::EmptySsgFile);
    }
    let text = |key| {
        crate::translate::normalize::field_text(map.get(key).unwrap_or(&Value::Null))
    };
    Ok((text(SSG_FILE), text(TAILORING_FILE)))
}

fn task_fields(mut map: Map<String, Value>) -> TaskFields {
    let mut take = |key: &str| map.remove(key).unwrap_or(Value::Null);
    TaskFields {
        title: take(TASK_TITLE),
        target: take(TASK_TARGET),
        ssg: take(TASK_SSG),
        tailoring: take(TASK_TAILORING),
        profile_id: take(TASK_PROFILE_ID),
        online_remediation: take(TASK_ONLINE_REMEDIATION),
        schedule_not_before: take(TASK_SCHEDULE_NOT_BEFORE),
        schedule_repeat_after: take(TASK_SCHEDULE_REPEAT_AFTER),
    }
}
