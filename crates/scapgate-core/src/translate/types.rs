//! JSON shapes returned by the gateway.
//!
//! Field names and value types match what existing clients of the service
//! already parse: ids are strings in most places, booleans are the strings
//! `"true"`/`"0"` in acknowledgments, and a couple of ids stay numeric.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::oscapd::TaskId;

/// `{"tasks": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksEnvelope<T> {
    pub tasks: Vec<T>,
}

impl<T> TasksEnvelope<T> {
    pub fn new(tasks: Vec<T>) -> Self {
        Self { tasks }
    }
}

/// `{"ssgs": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsgsEnvelope {
    pub ssgs: Vec<SsgView>,
}

/// Outcome of one evaluation, derived from the scanner's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Compliant,
    NonCompliant,
    EvaluationError,
    Unknown(i32),
}

impl ResultStatus {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => ResultStatus::Compliant,
            1 => ResultStatus::NonCompliant,
            2 => ResultStatus::EvaluationError,
            other => ResultStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Compliant => f.write_str("Compliant"),
            ResultStatus::NonCompliant => f.write_str("Non-Compliant"),
            ResultStatus::EvaluationError => f.write_str("Evaluation Error"),
            ResultStatus::Unknown(code) => write!(f, "Unknown status for exitCode {code}"),
        }
    }
}

/// One result of a task as listed by `GET /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    #[serde(rename = "taskResultId")]
    pub id: String,
    #[serde(rename = "taskResulttimestamp")]
    pub timestamp: i64,
    #[serde(rename = "taskResultStatus")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub target: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub modified: String,
    pub enabled: bool,
    pub results: Vec<ResultView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: TaskId,
    /// Always `"0"`: new tasks start disabled.
    pub enabled: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedTask {
    pub id: String,
    pub enabled: bool,
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedResult {
    #[serde(rename = "taskResultId")]
    pub id: String,
    pub removed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRemoval {
    pub id: String,
    #[serde(rename = "taskResultsRemoved")]
    pub removed: Vec<RemovedResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAck {
    pub id: TaskId,
    pub running: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveAck {
    pub id: TaskId,
    pub removed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAck {
    pub id: TaskId,
    pub schedule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    #[serde(rename = "profileId")]
    pub id: String,
    #[serde(rename = "profileName")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsgView {
    #[serde(rename = "ssgfile")]
    pub ssg_file: String,
    #[serde(rename = "tailoringFile")]
    pub tailoring_file: String,
    pub profiles: Vec<ProfileView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(ResultStatus::from_exit_code(0).to_string(), "Compliant");
        assert_eq!(ResultStatus::from_exit_code(1).to_string(), "Non-Compliant");
        assert_eq!(
            ResultStatus::from_exit_code(2).to_string(),
            "Evaluation Error"
        );
        let unknown = ResultStatus::from_exit_code(137).to_string();
        assert!(unknown.contains("137"), "{unknown}");
        assert!(ResultStatus::from_exit_code(-1).to_string().contains("-1"));
    }

    #[test]
    fn test_task_view_wire_names() {
        let view = TaskView {
            id: "3".to_string(),
            title: "weekly".to_string(),
            target: "localhost".to_string(),
            modified: "2024-03-01 08:30:00".to_string(),
            enabled: true,
            results: vec![ResultView {
                id: "1".to_string(),
                timestamp: 1_709_281_800,
                status: "Compliant".to_string(),
            }],
        };
        assert_eq!(
            serde_json::to_value(TasksEnvelope::new(vec![view])).unwrap(),
            json!({"tasks": [{
                "id": "3",
                "title": "weekly",
                "target": "localhost",
                "modified": "2024-03-01 08:30:00",
                "enabled": true,
                "results": [{
                    "taskResultId": "1",
                    "taskResulttimestamp": 1_709_281_800,
                    "taskResultStatus": "Compliant"
                }]
            }]})
        );
    }

    #[test]
    fn test_ssg_view_wire_names() {
        let ssg = SsgsEnvelope {
            ssgs: vec![SsgView {
                ssg_file: "/usr/share/xml/scap/ssg/content/ssg-rhel9-ds.xml".to_string(),
                tailoring_file: String::new(),
                profiles: vec![ProfileView {
                    id: "xccdf_org.ssgproject.content_profile_cis".to_string(),
                    name: "CIS".to_string(),
                }],
            }],
        };
        assert_eq!(
            serde_json::to_value(ssg).unwrap(),
            json!({"ssgs": [{
                "ssgfile": "/usr/share/xml/scap/ssg/content/ssg-rhel9-ds.xml",
                "tailoringFile": "",
                "profiles": [{
                    "profileId": "xccdf_org.ssgproject.content_profile_cis",
                    "profileName": "CIS"
                }]
            }]})
        );
    }
}
