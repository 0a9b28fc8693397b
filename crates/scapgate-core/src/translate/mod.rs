//! Translation layer: one operation per task or SSG lifecycle action.
//!
//! Each operation normalizes its input, issues the daemon call sequence
//! for it, and maps the outcome (or partial outcome) into the JSON shapes
//! from [`types`]. Daemon failures are never raised to the HTTP layer
//! except for task creation: every other operation turns them into an
//! empty, partial, or negative acknowledgment and logs the cause.

pub mod normalize;
pub mod types;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use scapgate_config::BatchPolicy;

use crate::oscapd::{DaemonResult, OscapDaemon, ResultId, TaskId};
use normalize::{
    RepeatAfter, field_text, is_blank, not_before_wire, online_remediation, schedule_not_before,
    target_or_localhost,
};
use types::*;

/// Refusal reported when running a disabled task.
pub const RUN_REQUIRES_ENABLED: &str = "Task must be enabled first";
/// Reported when the daemon refuses an out-of-schedule run.
pub const RUN_ALREADY_RUNNING: &str = "Task seems to be already running";
/// Refusal reported when deleting an enabled task.
pub const REMOVE_REQUIRES_DISABLED: &str = "enabled tasks cannot be deleted";
/// `ssgFile` value that selects daemon-side content discovery.
pub const SYSTEM_SSG: &str = "system";
/// Echoed by `task_schedule` for anything but `enable`/`disable`.
pub const NOT_MODIFIED: &str = "not_modified";

/// Task fields of a create or update request, as the client sent them.
#[derive(Debug, Clone, Default)]
pub struct TaskFields {
    pub title: Value,
    pub target: Value,
    pub ssg: Value,
    pub tailoring: Value,
    pub profile_id: Value,
    pub online_remediation: Value,
    pub schedule_not_before: Value,
    pub schedule_repeat_after: Value,
}

/// Which tasks `get_task` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSelector {
    All,
    One(TaskId),
}

/// Which results `remove_task_result` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSelector {
    All,
    One(ResultId),
}

impl fmt::Display for ResultSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSelector::All => f.write_str("all"),
            ResultSelector::One(id) => write!(f, "{id}"),
        }
    }
}

/// Where `get_ssg` looks for scan content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsgSource {
    /// Everything the daemon discovers on the system.
    System,
    File(String),
}

impl SsgSource {
    /// `ssgFile` as sent by a client: the literal `system` asks for
    /// discovery, anything else names one content file.
    pub fn from_request(ssg_file: String) -> Self {
        if ssg_file == SYSTEM_SSG {
            SsgSource::System
        } else {
            SsgSource::File(ssg_file)
        }
    }
}

/// Owns the shared daemon handle and serializes call sequences on it.
pub struct Translator {
    daemon: Arc<dyn OscapDaemon>,
    /// Held for the whole call sequence of one operation so that
    /// concurrent requests never interleave their daemon calls.
    calls: Mutex<()>,
    batch_policy: BatchPolicy,
}

impl Translator {
    pub fn new(daemon: Arc<dyn OscapDaemon>) -> Self {
        Self {
            daemon,
            calls: Mutex::new(()),
            batch_policy: BatchPolicy::default(),
        }
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        self.batch_policy
    }

    /// Create a task and configure it from the request fields.
    ///
    /// The task starts disabled. A failing daemon call aborts the sequence
    /// and is returned to the caller.
    pub async fn new_task(&self, fields: &TaskFields) -> DaemonResult<TasksEnvelope<CreatedTask>> {
        let _calls = self.calls.lock().await;

        let id = self.daemon.create_task().await?;
        if let Err(e) = self.configure_new_task(id, fields).await {
            warn!(task = id, error = %e, "Task created but left partially configured");
            return Err(e);
        }

        info!(task = id, "Created task");
        Ok(TasksEnvelope::new(vec![CreatedTask {
            id,
            enabled: "0".to_string(),
        }]))
    }

    async fn configure_new_task(&self, id: TaskId, fields: &TaskFields) -> DaemonResult<()> {
        let d = &self.daemon;
        d.set_task_title(id, field_text(&fields.title)).await?;
        d.set_task_target(id, target_or_localhost(&field_text(&fields.target))).await?;
        d.set_task_input(id, field_text(&fields.ssg)).await?;
        d.set_task_tailoring(id, field_text(&fields.tailoring)).await?;
        d.set_task_profile_id(id, field_text(&fields.profile_id)).await?;
        d.set_task_online_remediation(id, online_remediation(&fields.online_remediation)).await?;
        let not_before = schedule_not_before(&field_text(&fields.schedule_not_before));
        d.set_task_schedule_not_before(id, not_before_wire(not_before)).await?;
        let repeat = RepeatAfter::parse(&field_text(&fields.schedule_repeat_after));
        d.set_task_schedule_repeat_after(id, repeat.hours()).await
    }

    /// Apply the non-empty fields of `fields` to an existing task.
    ///
    /// The first failing setter stops the update. The acknowledgment is
    /// still returned, but then reports `"updated": "false"`, so clients
    /// must accept both `"true"` and `"false"` in that field. An unreadable
    /// task yields an empty `tasks` list.
    pub async fn update_task(&self, id: TaskId, fields: &TaskFields) -> TasksEnvelope<UpdatedTask> {
        let _calls = self.calls.lock().await;

        let enabled = match self.daemon.task_enabled(id).await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(task = id, error = %e, "Cannot update task");
                return TasksEnvelope::new(Vec::new());
            }
        };

        let updated = match self.apply_update(id, fields).await {
            Ok(()) => {
                info!(task = id, "Updated task");
                true
            }
            Err(e) => {
                warn!(task = id, error = %e, "Task update stopped part-way");
                false
            }
        };

        TasksEnvelope::new(vec![UpdatedTask {
            id: id.to_string(),
            enabled,
            updated: updated.to_string(),
        }])
    }

    async fn apply_update(&self, id: TaskId, fields: &TaskFields) -> DaemonResult<()> {
        let d = &self.daemon;
        if !is_blank(&fields.title) {
            d.set_task_title(id, field_text(&fields.title)).await?;
        }
        if !is_blank(&fields.target) {
            d.set_task_target(id, field_text(&fields.target)).await?;
        }
        if !is_blank(&fields.ssg) {
            d.set_task_input(id, field_text(&fields.ssg)).await?;
        }
        if !is_blank(&fields.tailoring) {
            d.set_task_tailoring(id, field_text(&fields.tailoring)).await?;
        }
        if !is_blank(&fields.profile_id) {
            d.set_task_profile_id(id, field_text(&fields.profile_id)).await?;
        }
        if !is_blank(&fields.online_remediation) {
            d.set_task_online_remediation(id, online_remediation(&fields.online_remediation))
                .await?;
        }
        if !is_blank(&fields.schedule_not_before) {
            let at = schedule_not_before(&field_text(&fields.schedule_not_before));
            d.set_task_schedule_not_before(id, not_before_wire(at)).await?;
        }
        if !is_blank(&fields.schedule_repeat_after) {
            let repeat = RepeatAfter::parse(&field_text(&fields.schedule_repeat_after));
            d.set_task_schedule_repeat_after(id, repeat.hours()).await?;
        }
        Ok(())
    }

    /// Describe one task or all of them, including their results.
    pub async fn get_task(&self, selector: TaskSelector) -> TasksEnvelope<TaskView> {
        let _calls = self.calls.lock().await;

        let ids = match selector {
            TaskSelector::One(id) => vec![id],
            TaskSelector::All => match self.daemon.list_task_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "Cannot list tasks");
                    return TasksEnvelope::new(Vec::new());
                }
            },
        };

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            match self.task_view(id).await {
                Ok(view) => tasks.push(view),
                Err(e) => {
                    warn!(task = id, error = %e, policy = ?self.batch_policy, "Cannot read task");
                    if self.batch_policy == BatchPolicy::Stop {
                        break;
                    }
                }
            }
        }
        TasksEnvelope::new(tasks)
    }

    async fn task_view(&self, id: TaskId) -> DaemonResult<TaskView> {
        let d = &self.daemon;
        let title = d.task_title(id).await?;
        let target = d.task_target(id).await?;
        let modified = d.task_modified_timestamp(id).await?;
        let enabled = d.task_enabled(id).await?;

        let result_ids = d.task_result_ids(id).await?;
        let mut results = Vec::with_capacity(result_ids.len());
        for result in result_ids {
            let exit_code = d.result_exit_code(id, result).await?;
            let timestamp = d.result_created_timestamp(id, result).await?;
            results.push(ResultView {
                id: result.to_string(),
                timestamp,
                status: ResultStatus::from_exit_code(exit_code).to_string(),
            });
        }

        Ok(TaskView {
            id: id.to_string(),
            title,
            target,
            modified: local_time(modified),
            enabled,
            results,
        })
    }

    /// HTML guide for the task, or an empty string if the daemon fails.
    pub async fn get_task_guide(&self, id: TaskId) -> String {
        let _calls = self.calls.lock().await;
        self.daemon.generate_guide(id).await.unwrap_or_else(|e| {
            warn!(task = id, error = %e, "Cannot render guide");
            String::new()
        })
    }

    /// HTML report for one result, or an empty string if the daemon fails.
    pub async fn get_task_result(&self, id: TaskId, result: ResultId) -> String {
        let _calls = self.calls.lock().await;
        self.daemon
            .generate_report(id, result)
            .await
            .unwrap_or_else(|e| {
                warn!(task = id, result, error = %e, "Cannot render report");
                String::new()
            })
    }

    pub async fn remove_task_result(
        &self,
        id: TaskId,
        selector: ResultSelector,
    ) -> TasksEnvelope<ResultRemoval> {
        let _calls = self.calls.lock().await;

        let outcome = match selector {
            ResultSelector::All => self.daemon.remove_task_results(id).await,
            ResultSelector::One(result) => self.daemon.remove_task_result(id, result).await,
        };
        let removed = match outcome {
            Ok(()) => {
                info!(task = id, result = %selector, "Removed task result");
                vec![RemovedResult {
                    id: selector.to_string(),
                    removed: "true".to_string(),
                }]
            }
            Err(e) => {
                warn!(task = id, result = %selector, error = %e, "Cannot remove task result");
                Vec::new()
            }
        };

        TasksEnvelope::new(vec![ResultRemoval {
            id: id.to_string(),
            removed,
        }])
    }

    /// Start a scan now, regardless of schedule. Only enabled tasks run.
    pub async fn run_task_outside_schedule(&self, id: TaskId) -> TasksEnvelope<RunAck> {
        let _calls = self.calls.lock().await;

        let running = match self.daemon.task_enabled(id).await {
            Err(e) => {
                warn!(task = id, error = %e, "Cannot run task");
                return TasksEnvelope::new(Vec::new());
            }
            Ok(false) => RUN_REQUIRES_ENABLED.to_string(),
            Ok(true) => match self.daemon.run_task_outside_schedule(id).await {
                Ok(()) => {
                    info!(task = id, "Started out-of-schedule run");
                    "true".to_string()
                }
                Err(e) => {
                    debug!(task = id, error = %e, "Daemon refused out-of-schedule run");
                    RUN_ALREADY_RUNNING.to_string()
                }
            },
        };

        TasksEnvelope::new(vec![RunAck { id, running }])
    }

    /// Delete a disabled task together with its results.
    pub async fn remove_task(&self, id: TaskId) -> TasksEnvelope<RemoveAck> {
        let _calls = self.calls.lock().await;

        let removed = match self.daemon.task_enabled(id).await {
            Err(e) => {
                warn!(task = id, error = %e, "Cannot remove task");
                return TasksEnvelope::new(Vec::new());
            }
            Ok(true) => REMOVE_REQUIRES_DISABLED.to_string(),
            Ok(false) => match self.daemon.remove_task(id, true).await {
                Ok(()) => {
                    info!(task = id, "Removed task");
                    "true".to_string()
                }
                Err(e) => {
                    warn!(task = id, error = %e, "Cannot remove task");
                    return TasksEnvelope::new(Vec::new());
                }
            },
        };

        TasksEnvelope::new(vec![RemoveAck { id, removed }])
    }

    /// Enable or disable a task's schedule. Any other `status` is echoed as
    /// `not_modified` without touching the daemon.
    pub async fn task_schedule(&self, id: TaskId, status: &str) -> TasksEnvelope<ScheduleAck> {
        let enable = match status {
            "enable" => true,
            "disable" => false,
            _ => {
                return TasksEnvelope::new(vec![ScheduleAck {
                    id,
                    schedule: NOT_MODIFIED.to_string(),
                }]);
            }
        };

        let _calls = self.calls.lock().await;
        match self.daemon.set_task_enabled(id, enable).await {
            Ok(()) => {
                info!(task = id, enabled = enable, "Changed task schedule");
                TasksEnvelope::new(vec![ScheduleAck {
                    id,
                    schedule: status.to_string(),
                }])
            }
            Err(e) => {
                warn!(task = id, error = %e, "Cannot change task schedule");
                TasksEnvelope::new(Vec::new())
            }
        }
    }

    /// Describe scan content files and the profiles each offers.
    pub async fn get_ssg(&self, source: SsgSource, tailoring_file: &str) -> SsgsEnvelope {
        let _calls = self.calls.lock().await;

        let candidates = match source {
            SsgSource::File(file) => vec![file],
            SsgSource::System => match self.daemon.ssg_choices().await {
                Ok(choices) => choices,
                Err(e) => {
                    warn!(error = %e, "Cannot discover SSG content");
                    return SsgsEnvelope { ssgs: Vec::new() };
                }
            },
        };

        let tailoring_file = if tailoring_file.is_empty() {
            String::new()
        } else {
            absolute(tailoring_file)
        };

        let mut ssgs = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let ssg_file = absolute(&candidate);
            match self
                .daemon
                .profile_choices(ssg_file.clone(), tailoring_file.clone())
                .await
            {
                Ok(mut choices) => {
                    choices.sort();
                    ssgs.push(SsgView {
                        ssg_file,
                        tailoring_file: tailoring_file.clone(),
                        profiles: choices
                            .into_iter()
                            .map(|(id, name)| ProfileView { id, name })
                            .collect(),
                    });
                }
                Err(e) => {
                    warn!(
                        ssg = %ssg_file,
                        error = %e,
                        policy = ?self.batch_policy,
                        "Cannot read SSG profiles"
                    );
                    if self.batch_policy == BatchPolicy::Stop {
                        break;
                    }
                }
            }
        }
        SsgsEnvelope { ssgs }
    }
}

/// Render epoch seconds as local time, `%Y-%m-%d %H:%M:%S`.
fn local_time(epoch_secs: i64) -> String {
    match DateTime::from_timestamp(epoch_secs, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => epoch_secs.to_string(),
    }
}

/// Absolute form of `path` against the gateway's working directory.
fn absolute(path: &str) -> String {
    std::path::absolute(Path::new(path))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}
