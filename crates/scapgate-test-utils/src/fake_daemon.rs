//! In-memory OpenSCAP daemon.
//!
//! [`FakeDaemon`] implements [`OscapDaemon`] over a task table held in a
//! mutex. Every call is recorded in order, and any method can be made to
//! fail, either always or only for one task.
//!
//! ```ignore
//! let daemon = FakeDaemon::new();
//! let id = daemon.add_task(FakeTask::new("nightly").enabled(true).result(0));
//! daemon.fail_on_task("GetTaskTitle", id);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use scapgate_core::BoxFuture;
use tracing::debug;
use scapgate_core::oscapd::{DaemonError, DaemonResult, OscapDaemon, ResultId, TaskId};

/// Timestamp every fake task and result is stamped with.
pub const FAKE_EPOCH: i64 = 1_700_000_000;

/// One recorded daemon call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The D-Bus method name, e.g. `SetTaskTarget`.
    pub method: &'static str,
    pub args: Vec<String>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, self.args.join(", "))
    }
}

/// A result stored on a fake task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeResult {
    pub exit_code: i32,
    pub created: i64,
}

/// Stored state of one fake task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTask {
    pub title: String,
    pub target: String,
    pub input: String,
    pub tailoring: String,
    pub profile_id: String,
    pub online_remediation: bool,
    pub not_before: String,
    pub repeat_after: u32,
    pub enabled: bool,
    /// Refuse out-of-schedule runs, as the daemon does while a scan is active.
    pub busy: bool,
    pub modified: i64,
    pub results: BTreeMap<ResultId, FakeResult>,
}

impl FakeTask {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            target: "localhost".to_string(),
            input: String::new(),
            tailoring: String::new(),
            profile_id: String::new(),
            online_remediation: false,
            not_before: String::new(),
            repeat_after: 0,
            enabled: false,
            busy: false,
            modified: FAKE_EPOCH,
            results: BTreeMap::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    /// Append a result with the given exit code. Result ids start at 1.
    pub fn result(mut self, exit_code: i32) -> Self {
        let id = self.results.keys().next_back().map_or(1, |last| last + 1);
        self.results.insert(
            id,
            FakeResult {
                exit_code,
                created: FAKE_EPOCH + i64::from(id),
            },
        );
        self
    }
}

impl Default for FakeTask {
    fn default() -> Self {
        Self::new("")
    }
}

#[derive(Default)]
struct State {
    tasks: BTreeMap<TaskId, FakeTask>,
    last_id: TaskId,
    ssgs: Vec<String>,
    profiles: HashMap<String, Vec<(String, String)>>,
    calls: Vec<Call>,
    fail_always: HashSet<&'static str>,
    fail_for_task: HashSet<(&'static str, TaskId)>,
}

impl State {
    fn task(&mut self, id: TaskId) -> DaemonResult<&mut FakeTask> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| DaemonError::NotFound(format!("task {id}")))
    }

    fn update(&mut self, id: TaskId, apply: impl FnOnce(&mut FakeTask)) -> DaemonResult<()> {
        let task = self.task(id)?;
        apply(&mut *task);
        task.modified += 1;
        Ok(())
    }
}

/// An [`OscapDaemon`] backed by memory.
#[derive(Default)]
pub struct FakeDaemon {
    state: Mutex<State>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `task` under the next free id and return that id.
    pub fn add_task(&self, task: FakeTask) -> TaskId {
        let mut state = self.state();
        state.last_id += 1;
        let id = state.last_id;
        state.tasks.insert(id, task);
        id
    }

    /// Register an SSG file offering `profiles` as `(id, name)` pairs.
    pub fn add_ssg(&self, path: &str, profiles: &[(&str, &str)]) {
        let mut state = self.state();
        state.ssgs.push(path.to_string());
        state.profiles.insert(
            path.to_string(),
            profiles
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        );
    }

    /// List an SSG file whose profiles cannot be read.
    pub fn add_unreadable_ssg(&self, path: &str) {
        self.state().ssgs.push(path.to_string());
    }

    /// Make every call to `method` fail.
    pub fn fail_on(&self, method: &'static str) {
        self.state().fail_always.insert(method);
    }

    /// Make calls to `method` fail when they concern `task`.
    pub fn fail_on_task(&self, method: &'static str, task: TaskId) {
        self.state().fail_for_task.insert((method, task));
    }

    /// Snapshot of a stored task.
    pub fn task(&self, id: TaskId) -> Option<FakeTask> {
        self.state().tasks.get(&id).cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// The calls made to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Method names of every call so far, in order.
    pub fn method_sequence(&self) -> Vec<&'static str> {
        self.state().calls.iter().map(|call| call.method).collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake daemon state poisoned")
    }

    /// Record a call, apply failure injection, then run `op` on the state.
    fn call<T>(
        &self,
        method: &'static str,
        task: Option<TaskId>,
        args: Vec<String>,
        op: impl FnOnce(&mut State) -> DaemonResult<T>,
    ) -> DaemonResult<T> {
        let mut state = self.state();
        state.calls.push(Call { method, args });

        let injected = state.fail_always.contains(method)
            || task.is_some_and(|id| state.fail_for_task.contains(&(method, id)));
        if injected {
            debug!(method, ?task, "Injecting fake daemon failure");
            return Err(DaemonError::Call {
                method,
                message: "injected failure".to_string(),
            });
        }
        op(&mut *state)
    }
}

fn result_of(state: &mut State, task: TaskId, result: ResultId) -> DaemonResult<FakeResult> {
    state
        .task(task)?
        .results
        .get(&result)
        .cloned()
        .ok_or_else(|| DaemonError::NotFound(format!("result {result} of task {task}")))
}

impl OscapDaemon for FakeDaemon {
    fn list_task_ids(&self) -> BoxFuture<'_, DaemonResult<Vec<TaskId>>> {
        Box::pin(async move {
            self.call("ListTaskIDs", None, vec![], |s| {
                Ok(s.tasks.keys().copied().collect())
            })
        })
    }

    fn create_task(&self) -> BoxFuture<'_, DaemonResult<TaskId>> {
        Box::pin(async move {
            self.call("CreateTask", None, vec![], |s| {
                s.last_id += 1;
                let id = s.last_id;
                s.tasks.insert(id, FakeTask::default());
                Ok(id)
            })
        })
    }

    fn remove_task(&self, task: TaskId, remove_results: bool) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), remove_results.to_string()];
            self.call("RemoveTask", Some(task), args, |s| {
                s.tasks
                    .remove(&task)
                    .map(|_| ())
                    .ok_or_else(|| DaemonError::NotFound(format!("task {task}")))
            })
        })
    }

    fn task_title(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.call("GetTaskTitle", Some(task), vec![task.to_string()], |s| {
                Ok(s.task(task)?.title.clone())
            })
        })
    }

    fn set_task_title(&self, task: TaskId, title: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), title.clone()];
            self.call("SetTaskTitle", Some(task), args, |s| {
                s.update(task, |t| t.title = title)
            })
        })
    }

    fn task_target(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.call("GetTaskTarget", Some(task), vec![task.to_string()], |s| {
                Ok(s.task(task)?.target.clone())
            })
        })
    }

    fn set_task_target(&self, task: TaskId, target: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), target.clone()];
            self.call("SetTaskTarget", Some(task), args, |s| {
                s.update(task, |t| t.target = target)
            })
        })
    }

    fn set_task_input(&self, task: TaskId, input: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), input.clone()];
            self.call("SetTaskInput", Some(task), args, |s| {
                s.update(task, |t| t.input = input)
            })
        })
    }

    fn set_task_tailoring(
        &self,
        task: TaskId,
        tailoring: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), tailoring.clone()];
            self.call("SetTaskTailoring", Some(task), args, |s| {
                s.update(task, |t| t.tailoring = tailoring)
            })
        })
    }

    fn set_task_profile_id(
        &self,
        task: TaskId,
        profile_id: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), profile_id.clone()];
            self.call("SetTaskProfileID", Some(task), args, |s| {
                s.update(task, |t| t.profile_id = profile_id)
            })
        })
    }

    fn set_task_online_remediation(
        &self,
        task: TaskId,
        enabled: bool,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), enabled.to_string()];
            self.call("SetTaskOnlineRemediation", Some(task), args, |s| {
                s.update(task, |t| t.online_remediation = enabled)
            })
        })
    }

    fn task_modified_timestamp(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<i64>> {
        Box::pin(async move {
            self.call(
                "GetTaskModifiedTimestamp",
                Some(task),
                vec![task.to_string()],
                |s| Ok(s.task(task)?.modified),
            )
        })
    }

    fn task_enabled(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<bool>> {
        Box::pin(async move {
            self.call("GetTaskEnabled", Some(task), vec![task.to_string()], |s| {
                Ok(s.task(task)?.enabled)
            })
        })
    }

    fn set_task_enabled(&self, task: TaskId, enabled: bool) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), enabled.to_string()];
            self.call("SetTaskEnabled", Some(task), args, |s| {
                s.update(task, |t| t.enabled = enabled)
            })
        })
    }

    fn set_task_schedule_not_before(
        &self,
        task: TaskId,
        not_before: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), not_before.clone()];
            self.call("SetTaskScheduleNotBefore", Some(task), args, |s| {
                s.update(task, |t| t.not_before = not_before)
            })
        })
    }

    fn set_task_schedule_repeat_after(
        &self,
        task: TaskId,
        hours: u32,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), hours.to_string()];
            self.call("SetTaskScheduleRepeatAfter", Some(task), args, |s| {
                s.update(task, |t| t.repeat_after = hours)
            })
        })
    }

    fn task_result_ids(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<Vec<ResultId>>> {
        Box::pin(async move {
            self.call("GetTaskResultIDs", Some(task), vec![task.to_string()], |s| {
                Ok(s.task(task)?.results.keys().copied().collect())
            })
        })
    }

    fn result_exit_code(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i32>> {
        Box::pin(async move {
            let args = vec![task.to_string(), result.to_string()];
            self.call("GetExitCodeOfTaskResult", Some(task), args, |s| {
                Ok(result_of(s, task, result)?.exit_code)
            })
        })
    }

    fn result_created_timestamp(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i64>> {
        Box::pin(async move {
            let args = vec![task.to_string(), result.to_string()];
            self.call("GetResultCreatedTimestamp", Some(task), args, |s| {
                Ok(result_of(s, task, result)?.created)
            })
        })
    }

    fn remove_task_result(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            let args = vec![task.to_string(), result.to_string()];
            self.call("RemoveTaskResult", Some(task), args, |s| {
                s.task(task)?
                    .results
                    .remove(&result)
                    .map(|_| ())
                    .ok_or_else(|| DaemonError::NotFound(format!("result {result}")))
            })
        })
    }

    fn remove_task_results(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.call("RemoveTaskResults", Some(task), vec![task.to_string()], |s| {
                s.task(task)?.results.clear();
                Ok(())
            })
        })
    }

    fn run_task_outside_schedule(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.call(
                "RunTaskOutsideSchedule",
                Some(task),
                vec![task.to_string()],
                |s| {
                    if s.task(task)?.busy {
                        return Err(DaemonError::Call {
                            method: "RunTaskOutsideSchedule",
                            message: format!("task {task} is already running"),
                        });
                    }
                    Ok(())
                },
            )
        })
    }

    fn generate_guide(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.call("GenerateGuideForTask", Some(task), vec![task.to_string()], |s| {
                let t = s.task(task)?;
                Ok(format!(
                    "<html><body><h1>{}</h1><p>{}</p></body></html>",
                    t.title, t.profile_id
                ))
            })
        })
    }

    fn generate_report(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            let args = vec![task.to_string(), result.to_string()];
            self.call("GenerateReportForTaskResult", Some(task), args, |s| {
                let found = result_of(s, task, result)?;
                Ok(format!(
                    "<html><body>task {task} result {result} exit {}</body></html>",
                    found.exit_code
                ))
            })
        })
    }

    fn ssg_choices(&self) -> BoxFuture<'_, DaemonResult<Vec<String>>> {
        Box::pin(async move { self.call("GetSSGChoices", None, vec![], |s| Ok(s.ssgs.clone())) })
    }

    fn profile_choices(
        &self,
        ssg_file: String,
        tailoring_file: String,
    ) -> BoxFuture<'_, DaemonResult<Vec<(String, String)>>> {
        Box::pin(async move {
            let args = vec![ssg_file.clone(), tailoring_file];
            self.call("GetProfileChoicesForInput", None, args, |s| {
                s.profiles
                    .get(&ssg_file)
                    .cloned()
                    .ok_or_else(|| DaemonError::NotFound(format!("SSG file {ssg_file}")))
            })
        })
    }
}
