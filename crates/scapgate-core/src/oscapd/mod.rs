//! OpenSCAP daemon call interface.
//!
//! Everything the gateway knows about the daemon goes through the
//! [`OscapDaemon`] trait: one fallible async method per daemon call. The
//! production implementation is [`DbusDaemon`]; tests substitute an
//! in-memory fake.
//!
//! ```text
//! ┌────────────┐      ┌──────────────┐    D-Bus    ┌──────────┐
//! │ Translator │─────▶│ dyn Oscap-   │────────────▶│  oscapd  │
//! │            │      │   Daemon     │  (system /  │          │
//! └────────────┘      └──────────────┘   session)  └──────────┘
//! ```

pub mod dbus;

pub use dbus::DbusDaemon;

use crate::BoxFuture;

/// Daemon-assigned task identifier.
pub type TaskId = u32;

/// Identifier of one result within a task.
pub type ResultId = u32;

/// Result alias for daemon calls.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Errors from a daemon call.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("cannot reach the OpenSCAP daemon: {0}")]
    Unavailable(String),

    #[error("{method} failed: {message}")]
    Call {
        method: &'static str,
        message: String,
    },

    #[error("{kind} id {id} cannot be represented on the daemon interface")]
    IdOutOfRange { kind: &'static str, id: u32 },

    #[error("no such {0}")]
    NotFound(String),
}

/// The capability set consumed from the OpenSCAP daemon.
///
/// Every method is a single synchronous-from-the-caller's-view daemon
/// call. Ordering and failure handling across calls is the caller's job.
pub trait OscapDaemon: Send + Sync {
    fn list_task_ids(&self) -> BoxFuture<'_, DaemonResult<Vec<TaskId>>>;

    /// Create an empty, disabled task and return its id.
    fn create_task(&self) -> BoxFuture<'_, DaemonResult<TaskId>>;

    fn remove_task(&self, task: TaskId, remove_results: bool) -> BoxFuture<'_, DaemonResult<()>>;

    fn task_title(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>>;

    fn set_task_title(&self, task: TaskId, title: String) -> BoxFuture<'_, DaemonResult<()>>;

    fn task_target(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>>;

    fn set_task_target(&self, task: TaskId, target: String) -> BoxFuture<'_, DaemonResult<()>>;

    /// Set the SSG (scan content) file of the task.
    fn set_task_input(&self, task: TaskId, input: String) -> BoxFuture<'_, DaemonResult<()>>;

    fn set_task_tailoring(
        &self,
        task: TaskId,
        tailoring: String,
    ) -> BoxFuture<'_, DaemonResult<()>>;

    fn set_task_profile_id(
        &self,
        task: TaskId,
        profile_id: String,
    ) -> BoxFuture<'_, DaemonResult<()>>;

    fn set_task_online_remediation(
        &self,
        task: TaskId,
        enabled: bool,
    ) -> BoxFuture<'_, DaemonResult<()>>;

    /// Seconds since the Unix epoch.
    fn task_modified_timestamp(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<i64>>;

    fn task_enabled(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<bool>>;

    fn set_task_enabled(&self, task: TaskId, enabled: bool) -> BoxFuture<'_, DaemonResult<()>>;

    /// `not_before` is formatted `%Y-%m-%dT%H:%M`.
    fn set_task_schedule_not_before(
        &self,
        task: TaskId,
        not_before: String,
    ) -> BoxFuture<'_, DaemonResult<()>>;

    /// `hours == 0` disables repetition.
    fn set_task_schedule_repeat_after(
        &self,
        task: TaskId,
        hours: u32,
    ) -> BoxFuture<'_, DaemonResult<()>>;

    fn task_result_ids(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<Vec<ResultId>>>;

    fn result_exit_code(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i32>>;

    /// Seconds since the Unix epoch.
    fn result_created_timestamp(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i64>>;

    fn remove_task_result(&self, task: TaskId, result: ResultId)
    -> BoxFuture<'_, DaemonResult<()>>;

    fn remove_task_results(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>>;

    fn run_task_outside_schedule(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>>;

    /// HTML guide for the task's content and profile.
    fn generate_guide(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>>;

    /// HTML report for one result.
    fn generate_report(&self, task: TaskId, result: ResultId)
    -> BoxFuture<'_, DaemonResult<String>>;

    /// Content files discovered system-wide by the daemon.
    fn ssg_choices(&self) -> BoxFuture<'_, DaemonResult<Vec<String>>>;

    /// `(profile id, profile name)` pairs offered by an SSG file, optionally
    /// through a tailoring file (empty string for none).
    fn profile_choices(
        &self,
        ssg_file: String,
        tailoring_file: String,
    ) -> BoxFuture<'_, DaemonResult<Vec<(String, String)>>>;
}
