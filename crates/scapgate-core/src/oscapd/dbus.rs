//! D-Bus transport to the OpenSCAP daemon.
//!
//! One connection is opened at startup and shared by every request. The
//! zbus connection multiplexes concurrent method calls safely; ordering of
//! multi-call sequences is enforced one level up by the translator's call
//! lock.

use std::collections::HashMap;

use tracing::{debug, info};
use zbus::Connection;
use zbus::names::BusName;
use zbus::proxy::CacheProperties;

use scapgate_config::{BusKind, DaemonConfig};

use super::{DaemonError, DaemonResult, OscapDaemon, ResultId, TaskId};
use crate::BoxFuture;

/// Wire-level method set of `org.OpenSCAP.daemon.Interface`.
///
/// Task and result ids travel as D-Bus bytes.
#[zbus::proxy(
    interface = "org.OpenSCAP.daemon.Interface",
    default_service = "org.OpenSCAP.daemon",
    default_path = "/OpenSCAP/daemon",
    gen_blocking = false
)]
trait OscapdInterface {
    #[zbus(name = "ListTaskIDs")]
    fn list_task_ids(&self) -> zbus::Result<Vec<u8>>;

    #[zbus(name = "CreateTask")]
    fn create_task(&self) -> zbus::Result<u8>;

    #[zbus(name = "RemoveTask")]
    fn remove_task(&self, task_id: u8, remove_results: bool) -> zbus::Result<()>;

    #[zbus(name = "GetTaskTitle")]
    fn get_task_title(&self, task_id: u8) -> zbus::Result<String>;

    #[zbus(name = "SetTaskTitle")]
    fn set_task_title(&self, task_id: u8, title: &str) -> zbus::Result<()>;

    #[zbus(name = "GetTaskTarget")]
    fn get_task_target(&self, task_id: u8) -> zbus::Result<String>;

    #[zbus(name = "SetTaskTarget")]
    fn set_task_target(&self, task_id: u8, target: &str) -> zbus::Result<()>;

    #[zbus(name = "SetTaskInput")]
    fn set_task_input(&self, task_id: u8, input: &str) -> zbus::Result<()>;

    #[zbus(name = "SetTaskTailoring")]
    fn set_task_tailoring(&self, task_id: u8, tailoring: &str) -> zbus::Result<()>;

    #[zbus(name = "SetTaskProfileID")]
    fn set_task_profile_id(&self, task_id: u8, profile_id: &str) -> zbus::Result<()>;

    #[zbus(name = "SetTaskOnlineRemediation")]
    fn set_task_online_remediation(&self, task_id: u8, remediation: bool) -> zbus::Result<()>;

    #[zbus(name = "GetTaskModifiedTimestamp")]
    fn get_task_modified_timestamp(&self, task_id: u8) -> zbus::Result<i64>;

    #[zbus(name = "GetTaskEnabled")]
    fn get_task_enabled(&self, task_id: u8) -> zbus::Result<bool>;

    #[zbus(name = "SetTaskEnabled")]
    fn set_task_enabled(&self, task_id: u8, enabled: bool) -> zbus::Result<()>;

    #[zbus(name = "SetTaskScheduleNotBefore")]
    fn set_task_schedule_not_before(&self, task_id: u8, not_before: &str) -> zbus::Result<()>;

    #[zbus(name = "SetTaskScheduleRepeatAfter")]
    fn set_task_schedule_repeat_after(&self, task_id: u8, hours: u32) -> zbus::Result<()>;

    #[zbus(name = "GetTaskResultIDs")]
    fn get_task_result_ids(&self, task_id: u8) -> zbus::Result<Vec<u8>>;

    #[zbus(name = "GetExitCodeOfTaskResult")]
    fn get_exit_code_of_task_result(&self, task_id: u8, result_id: u8) -> zbus::Result<i32>;

    #[zbus(name = "GetResultCreatedTimestamp")]
    fn get_result_created_timestamp(&self, task_id: u8, result_id: u8) -> zbus::Result<i64>;

    #[zbus(name = "RemoveTaskResult")]
    fn remove_task_result(&self, task_id: u8, result_id: u8) -> zbus::Result<()>;

    #[zbus(name = "RemoveTaskResults")]
    fn remove_task_results(&self, task_id: u8) -> zbus::Result<()>;

    #[zbus(name = "RunTaskOutsideSchedule")]
    fn run_task_outside_schedule(&self, task_id: u8) -> zbus::Result<()>;

    #[zbus(name = "GenerateGuideForTask")]
    fn generate_guide_for_task(&self, task_id: u8) -> zbus::Result<String>;

    #[zbus(name = "GenerateReportForTaskResult")]
    fn generate_report_for_task_result(&self, task_id: u8, result_id: u8)
    -> zbus::Result<String>;

    #[zbus(name = "GetSSGChoices")]
    fn get_ssg_choices(&self) -> zbus::Result<Vec<String>>;

    #[zbus(name = "GetProfileChoicesForInput")]
    fn get_profile_choices_for_input(
        &self,
        input_file: &str,
        tailoring_file: &str,
    ) -> zbus::Result<HashMap<String, String>>;
}

/// [`OscapDaemon`] over a live D-Bus connection.
pub struct DbusDaemon {
    proxy: OscapdInterfaceProxy<'static>,
}

impl DbusDaemon {
    /// Connect to the configured bus and bind to the daemon's object.
    ///
    /// Fails if the bus is unreachable or nobody owns the daemon's bus name.
    pub async fn connect(config: &DaemonConfig) -> DaemonResult<Self> {
        let connection = match config.bus {
            BusKind::System => Connection::system().await,
            BusKind::Session => Connection::session().await,
        }
        .map_err(|e| {
            DaemonError::Unavailable(format!("cannot connect to the {:?} bus: {e}", config.bus))
        })?;

        let name = BusName::try_from(config.service.clone())
            .map_err(|e| DaemonError::Unavailable(format!("invalid bus name: {e}")))?;
        let bus = zbus::fdo::DBusProxy::new(&connection)
            .await
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?;
        let owned = bus
            .name_has_owner(name)
            .await
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?;
        if !owned {
            return Err(DaemonError::Unavailable(format!(
                "{} is not on the bus. Is the daemon running?",
                config.service
            )));
        }

        let proxy = OscapdInterfaceProxy::builder(&connection)
            .destination(config.service.clone())
            .and_then(|b| b.path(config.object_path.clone()))
            .and_then(|b| b.interface(config.interface.clone()))
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?;

        info!(
            bus = ?config.bus,
            service = %config.service,
            path = %config.object_path,
            "Connected to the OpenSCAP daemon"
        );
        Ok(Self { proxy })
    }
}

fn wire_task(id: TaskId) -> DaemonResult<u8> {
    u8::try_from(id).map_err(|_| DaemonError::IdOutOfRange { kind: "task", id })
}

fn wire_result(id: ResultId) -> DaemonResult<u8> {
    u8::try_from(id).map_err(|_| DaemonError::IdOutOfRange { kind: "result", id })
}

fn call_failed(method: &'static str) -> impl FnOnce(zbus::Error) -> DaemonError {
    move |e| {
        debug!(method, error = %e, "Daemon call failed");
        DaemonError::Call {
            method,
            message: e.to_string(),
        }
    }
}

impl OscapDaemon for DbusDaemon {
    fn list_task_ids(&self) -> BoxFuture<'_, DaemonResult<Vec<TaskId>>> {
        Box::pin(async move {
            let ids = self
                .proxy
                .list_task_ids()
                .await
                .map_err(call_failed("ListTaskIDs"))?;
            Ok(ids.into_iter().map(TaskId::from).collect())
        })
    }

    fn create_task(&self) -> BoxFuture<'_, DaemonResult<TaskId>> {
        Box::pin(async move {
            let id = self
                .proxy
                .create_task()
                .await
                .map_err(call_failed("CreateTask"))?;
            Ok(TaskId::from(id))
        })
    }

    fn remove_task(&self, task: TaskId, remove_results: bool) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .remove_task(wire_task(task)?, remove_results)
                .await
                .map_err(call_failed("RemoveTask"))
        })
    }

    fn task_title(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.proxy
                .get_task_title(wire_task(task)?)
                .await
                .map_err(call_failed("GetTaskTitle"))
        })
    }

    fn set_task_title(&self, task: TaskId, title: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_title(wire_task(task)?, &title)
                .await
                .map_err(call_failed("SetTaskTitle"))
        })
    }

    fn task_target(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.proxy
                .get_task_target(wire_task(task)?)
                .await
                .map_err(call_failed("GetTaskTarget"))
        })
    }

    fn set_task_target(&self, task: TaskId, target: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_target(wire_task(task)?, &target)
                .await
                .map_err(call_failed("SetTaskTarget"))
        })
    }

    fn set_task_input(&self, task: TaskId, input: String) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_input(wire_task(task)?, &input)
                .await
                .map_err(call_failed("SetTaskInput"))
        })
    }

    fn set_task_tailoring(
        &self,
        task: TaskId,
        tailoring: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_tailoring(wire_task(task)?, &tailoring)
                .await
                .map_err(call_failed("SetTaskTailoring"))
        })
    }

    fn set_task_profile_id(
        &self,
        task: TaskId,
        profile_id: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_profile_id(wire_task(task)?, &profile_id)
                .await
                .map_err(call_failed("SetTaskProfileID"))
        })
    }

    fn set_task_online_remediation(
        &self,
        task: TaskId,
        enabled: bool,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_online_remediation(wire_task(task)?, enabled)
                .await
                .map_err(call_failed("SetTaskOnlineRemediation"))
        })
    }

    fn task_modified_timestamp(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<i64>> {
        Box::pin(async move {
            self.proxy
                .get_task_modified_timestamp(wire_task(task)?)
                .await
                .map_err(call_failed("GetTaskModifiedTimestamp"))
        })
    }

    fn task_enabled(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<bool>> {
        Box::pin(async move {
            self.proxy
                .get_task_enabled(wire_task(task)?)
                .await
                .map_err(call_failed("GetTaskEnabled"))
        })
    }

    fn set_task_enabled(&self, task: TaskId, enabled: bool) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_enabled(wire_task(task)?, enabled)
                .await
                .map_err(call_failed("SetTaskEnabled"))
        })
    }

    fn set_task_schedule_not_before(
        &self,
        task: TaskId,
        not_before: String,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_schedule_not_before(wire_task(task)?, &not_before)
                .await
                .map_err(call_failed("SetTaskScheduleNotBefore"))
        })
    }

    fn set_task_schedule_repeat_after(
        &self,
        task: TaskId,
        hours: u32,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .set_task_schedule_repeat_after(wire_task(task)?, hours)
                .await
                .map_err(call_failed("SetTaskScheduleRepeatAfter"))
        })
    }

    fn task_result_ids(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<Vec<ResultId>>> {
        Box::pin(async move {
            let ids = self
                .proxy
                .get_task_result_ids(wire_task(task)?)
                .await
                .map_err(call_failed("GetTaskResultIDs"))?;
            Ok(ids.into_iter().map(ResultId::from).collect())
        })
    }

    fn result_exit_code(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i32>> {
        Box::pin(async move {
            self.proxy
                .get_exit_code_of_task_result(wire_task(task)?, wire_result(result)?)
                .await
                .map_err(call_failed("GetExitCodeOfTaskResult"))
        })
    }

    fn result_created_timestamp(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<i64>> {
        Box::pin(async move {
            self.proxy
                .get_result_created_timestamp(wire_task(task)?, wire_result(result)?)
                .await
                .map_err(call_failed("GetResultCreatedTimestamp"))
        })
    }

    fn remove_task_result(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .remove_task_result(wire_task(task)?, wire_result(result)?)
                .await
                .map_err(call_failed("RemoveTaskResult"))
        })
    }

    fn remove_task_results(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .remove_task_results(wire_task(task)?)
                .await
                .map_err(call_failed("RemoveTaskResults"))
        })
    }

    fn run_task_outside_schedule(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<()>> {
        Box::pin(async move {
            self.proxy
                .run_task_outside_schedule(wire_task(task)?)
                .await
                .map_err(call_failed("RunTaskOutsideSchedule"))
        })
    }

    fn generate_guide(&self, task: TaskId) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.proxy
                .generate_guide_for_task(wire_task(task)?)
                .await
                .map_err(call_failed("GenerateGuideForTask"))
        })
    }

    fn generate_report(
        &self,
        task: TaskId,
        result: ResultId,
    ) -> BoxFuture<'_, DaemonResult<String>> {
        Box::pin(async move {
            self.proxy
                .generate_report_for_task_result(wire_task(task)?, wire_result(result)?)
                .await
                .map_err(call_failed("GenerateReportForTaskResult"))
        })
    }

    fn ssg_choices(&self) -> BoxFuture<'_, DaemonResult<Vec<String>>> {
        Box::pin(async move {
            self.proxy
                .get_ssg_choices()
                .await
                .map_err(call_failed("GetSSGChoices"))
        })
    }

    fn profile_choices(
        &self,
        ssg_file: String,
        tailoring_file: String,
    ) -> BoxFuture<'_, DaemonResult<Vec<(String, String)>>> {
        Box::pin(async move {
            let choices = self
                .proxy
                .get_profile_choices_for_input(&ssg_file, &tailoring_file)
                .await
                .map_err(call_failed("GetProfileChoicesForInput"))?;
            Ok(choices.into_iter().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ids_fit_in_a_byte() {
        assert_eq!(wire_task(7).unwrap(), 7);
        assert_eq!(wire_result(255).unwrap(), 255);
        assert!(matches!(
            wire_task(256),
            Err(DaemonError::IdOutOfRange { kind: "task", id: 256 })
        ));
        assert!(matches!(
            wire_result(1000),
            Err(DaemonError::IdOutOfRange { kind: "result", .. })
        ));
    }

    #[test]
    fn test_call_error_names_the_method() {
        let err = call_failed("GetTaskTitle")(zbus::Error::InterfaceNotFound);
        assert!(err.to_string().starts_with("GetTaskTitle failed"));
    }
}
