//! Translator behaviour against the in-memory daemon.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use scapgate_config::BatchPolicy;
use scapgate_core::translate::types::*;
use scapgate_core::translate::{
    NOT_MODIFIED, REMOVE_REQUIRES_DISABLED, RUN_ALREADY_RUNNING, RUN_REQUIRES_ENABLED,
    ResultSelector, SsgSource, TaskFields, TaskSelector, Translator,
};
use scapgate_test_utils::{FakeDaemon, FakeTask};

fn setup() -> (Arc<FakeDaemon>, Translator) {
    let daemon = Arc::new(FakeDaemon::new());
    let translator = Translator::new(daemon.clone());
    (daemon, translator)
}

fn fields(values: [(&str, Value); 8]) -> TaskFields {
    let get = |name: &str| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    };
    TaskFields {
        title: get("title"),
        target: get("target"),
        ssg: get("ssg"),
        tailoring: get("tailoring"),
        profile_id: get("profile_id"),
        online_remediation: get("online_remediation"),
        schedule_not_before: get("not_before"),
        schedule_repeat_after: get("repeat_after"),
    }
}

fn new_task_fields() -> TaskFields {
    fields([
        ("title", json!("nightly")),
        ("target", json!("")),
        ("ssg", json!("/usr/share/xml/scap/ssg/content/ssg-fedora-ds.xml")),
        ("tailoring", json!("")),
        ("profile_id", json!("xccdf_org.ssgproject.content_profile_standard")),
        ("online_remediation", json!("yes")),
        ("not_before", json!("2024-03-01 08:30")),
        ("repeat_after", json!("@weekly")),
    ])
}

fn blank_fields() -> TaskFields {
    fields([
        ("title", json!("")),
        ("target", json!("")),
        ("ssg", json!("")),
        ("tailoring", json!("")),
        ("profile_id", json!("")),
        ("online_remediation", json!("")),
        ("not_before", json!("")),
        ("repeat_after", json!("")),
    ])
}

// ── new_task ────────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_new_task_issues_setters_in_order() {
    let (daemon, translator) = setup();

    let created = translator.new_task(&new_task_fields()).await.unwrap();
    assert_eq!(
        created,
        TasksEnvelope::new(vec![CreatedTask {
            id: 1,
            enabled: "0".to_string(),
        }])
    );

    assert_eq!(
        daemon.method_sequence(),
        vec![
            "CreateTask",
            "SetTaskTitle",
            "SetTaskTarget",
            "SetTaskInput",
            "SetTaskTailoring",
            "SetTaskProfileID",
            "SetTaskOnlineRemediation",
            "SetTaskScheduleNotBefore",
            "SetTaskScheduleRepeatAfter",
        ]
    );

    let task = daemon.task(1).unwrap();
    assert_eq!(task.title, "nightly");
    assert_eq!(task.target, "localhost");
    assert!(task.online_remediation);
    assert_eq!(task.not_before, "2024-03-01T08:30");
    assert_eq!(task.repeat_after, 168);
    assert!(!task.enabled);
}

#[tokio::test]
async fn test_new_task_monthly_and_garbage_repeat() {
    let (daemon, translator) = setup();

    let mut monthly = new_task_fields();
    monthly.schedule_repeat_after = json!("@monthly");
    translator.new_task(&monthly).await.unwrap();

    let mut garbage = new_task_fields();
    garbage.schedule_repeat_after = json!("fortnightly");
    translator.new_task(&garbage).await.unwrap();

    assert_eq!(daemon.task(1).unwrap().repeat_after, 720);
    assert_eq!(daemon.task(2).unwrap().repeat_after, 0);
}

#[tokio::test]
async fn test_new_task_remediation_variants() {
    let (daemon, translator) = setup();

    for (value, expected) in [
        (json!("y"), true),
        (json!(1), true),
        (json!(true), true),
        (json!("no"), false),
        (json!(0), false),
        (json!(""), false),
    ] {
        let mut f = new_task_fields();
        f.online_remediation = value.clone();
        let created = translator.new_task(&f).await.unwrap();
        let id = created.tasks[0].id;
        assert_eq!(
            daemon.task(id).unwrap().online_remediation,
            expected,
            "remediation value {value}"
        );
    }
}

#[tokio::test]
async fn test_new_task_failure_stops_sequence() {
    let (daemon, translator) = setup();
    daemon.fail_on("SetTaskInput");

    let err = translator.new_task(&new_task_fields()).await.unwrap_err();
    assert!(err.to_string().contains("SetTaskInput"), "{err}");

    assert_eq!(
        daemon.method_sequence(),
        vec!["CreateTask", "SetTaskTitle", "SetTaskTarget", "SetTaskInput"]
    );
    // The created task is left behind, partially configured.
    assert!(daemon.task(1).is_some());
}

// ── update_task ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_task_skips_blank_fields() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("old").enabled(true).target("db01"));

    let mut update = blank_fields();
    update.title = json!("renamed");
    update.schedule_repeat_after = json!("@monthly");

    let ack = translator.update_task(id, &update).await;
    assert_eq!(
        ack,
        TasksEnvelope::new(vec![UpdatedTask {
            id: id.to_string(),
            enabled: true,
            updated: "true".to_string(),
        }])
    );
    assert_eq!(
        daemon.method_sequence(),
        vec!["GetTaskEnabled", "SetTaskTitle", "SetTaskScheduleRepeatAfter"]
    );

    let task = daemon.task(id).unwrap();
    assert_eq!(task.title, "renamed");
    assert_eq!(task.target, "db01");
    assert_eq!(task.repeat_after, 720);
}

#[tokio::test]
async fn test_update_task_does_not_default_target() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").target("db01"));

    translator.update_task(id, &blank_fields()).await;
    assert!(daemon.calls_to("SetTaskTarget").is_empty());
    assert_eq!(daemon.task(id).unwrap().target, "db01");
}

#[tokio::test]
async fn test_update_task_reports_partial_failure() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t"));
    daemon.fail_on("SetTaskTarget");

    let mut update = blank_fields();
    update.title = json!("a");
    update.target = json!("b");
    update.ssg = json!("c.xml");

    let ack = translator.update_task(id, &update).await;
    assert_eq!(ack.tasks[0].updated, "false");
    assert!(daemon.calls_to("SetTaskInput").is_empty());
    assert_eq!(daemon.task(id).unwrap().title, "a");
}

#[tokio::test]
async fn test_update_unknown_task_is_empty() {
    let (_daemon, translator) = setup();
    let ack = translator.update_task(42, &new_task_fields()).await;
    assert!(ack.tasks.is_empty());
}

// ── get_task ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_task_maps_result_status() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(
        FakeTask::new("weekly")
            .enabled(true)
            .result(0)
            .result(1)
            .result(2)
            .result(137),
    );

    let listing = translator.get_task(TaskSelector::One(id)).await;
    assert_eq!(listing.tasks.len(), 1);

    let task = &listing.tasks[0];
    assert_eq!(task.id, id.to_string());
    assert_eq!(task.title, "weekly");
    assert_eq!(task.target, "localhost");
    assert!(task.enabled);
    assert_eq!(task.modified.len(), "2024-01-01 00:00:00".len());

    let statuses: Vec<&str> = task.results.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(
        statuses,
        vec![
            "Compliant",
            "Non-Compliant",
            "Evaluation Error",
            "Unknown status for exitCode 137",
        ]
    );
    assert_eq!(task.results[0].id, "1");
    assert_eq!(task.results[0].timestamp, scapgate_test_utils::fake_daemon::FAKE_EPOCH + 1);
}

#[tokio::test]
async fn test_get_task_all_skips_failing_task_by_default() {
    let (daemon, translator) = setup();
    let a = daemon.add_task(FakeTask::new("a"));
    let b = daemon.add_task(FakeTask::new("b"));
    let c = daemon.add_task(FakeTask::new("c"));
    daemon.fail_on_task("GetTaskTitle", b);

    assert_eq!(translator.batch_policy(), BatchPolicy::Skip);
    let listing = translator.get_task(TaskSelector::All).await;
    let ids: Vec<String> = listing.tasks.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec![a.to_string(), c.to_string()]);
}

#[tokio::test]
async fn test_get_task_all_stops_at_failing_task() {
    let daemon = Arc::new(FakeDaemon::new());
    let translator = Translator::new(daemon.clone()).with_batch_policy(BatchPolicy::Stop);
    let a = daemon.add_task(FakeTask::new("a"));
    let b = daemon.add_task(FakeTask::new("b"));
    daemon.add_task(FakeTask::new("c"));
    daemon.fail_on_task("GetTaskResultIDs", b);

    let listing = translator.get_task(TaskSelector::All).await;
    let ids: Vec<String> = listing.tasks.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec![a.to_string()]);
}

#[tokio::test]
async fn test_get_task_list_failure_is_empty() {
    let (daemon, translator) = setup();
    daemon.add_task(FakeTask::new("a"));
    daemon.fail_on("ListTaskIDs");
    assert!(translator.get_task(TaskSelector::All).await.tasks.is_empty());
}

#[tokio::test]
async fn test_get_unknown_task_is_empty() {
    let (_daemon, translator) = setup();
    assert!(translator.get_task(TaskSelector::One(9)).await.tasks.is_empty());
}

// ── guide and report ────────────────────────────────────────────────────

#[tokio::test]
async fn test_guide_and_report_html() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("nightly").result(1));

    let guide = translator.get_task_guide(id).await;
    assert!(guide.contains("<h1>nightly</h1>"), "{guide}");

    let report = translator.get_task_result(id, 1).await;
    assert!(report.contains("exit 1"), "{report}");

    assert_eq!(translator.get_task_result(id, 7).await, "");
    daemon.fail_on("GenerateGuideForTask");
    assert_eq!(translator.get_task_guide(id).await, "");
}

// ── remove_task_result ──────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_single_result() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").result(0).result(1));

    let ack = translator
        .remove_task_result(id, ResultSelector::One(2))
        .await;
    assert_eq!(
        serde_json::to_value(&ack).unwrap(),
        json!({"tasks": [{
            "id": id.to_string(),
            "taskResultsRemoved": [{"taskResultId": "2", "removed": "true"}]
        }]})
    );
    assert_eq!(daemon.task(id).unwrap().results.len(), 1);
}

#[tokio::test]
async fn test_remove_all_results() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").result(0).result(1));

    let ack = translator.remove_task_result(id, ResultSelector::All).await;
    assert_eq!(ack.tasks[0].removed[0].id, "all");
    assert!(daemon.task(id).unwrap().results.is_empty());
}

#[tokio::test]
async fn test_remove_result_failure_has_empty_list() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t"));

    let ack = translator
        .remove_task_result(id, ResultSelector::One(5))
        .await;
    assert_eq!(ack.tasks.len(), 1);
    assert_eq!(ack.tasks[0].id, id.to_string());
    assert!(ack.tasks[0].removed.is_empty());
}

// ── run / remove / schedule ─────────────────────────────────────────────

#[tokio::test]
async fn test_run_requires_enabled_task() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").enabled(false));

    let ack = translator.run_task_outside_schedule(id).await;
    assert_eq!(ack.tasks[0].running, RUN_REQUIRES_ENABLED);
    assert!(daemon.calls_to("RunTaskOutsideSchedule").is_empty());
}

#[tokio::test]
async fn test_run_enabled_task() {
    let (daemon, translator) = setup();
    let idle = daemon.add_task(FakeTask::new("idle").enabled(true));
    let busy = daemon.add_task(FakeTask::new("busy").enabled(true).busy(true));

    let ack = translator.run_task_outside_schedule(idle).await;
    assert_eq!(
        ack,
        TasksEnvelope::new(vec![RunAck {
            id: idle,
            running: "true".to_string(),
        }])
    );

    let ack = translator.run_task_outside_schedule(busy).await;
    assert_eq!(ack.tasks[0].running, RUN_ALREADY_RUNNING);
}

#[tokio::test]
async fn test_remove_enabled_task_is_refused() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").enabled(true));

    let ack = translator.remove_task(id).await;
    assert_eq!(ack.tasks[0].removed, REMOVE_REQUIRES_DISABLED);
    assert!(daemon.calls_to("RemoveTask").is_empty());
    assert!(daemon.task(id).is_some());
}

#[tokio::test]
async fn test_remove_disabled_task_removes_results_too() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t").result(0));

    let ack = translator.remove_task(id).await;
    assert_eq!(
        ack,
        TasksEnvelope::new(vec![RemoveAck {
            id,
            removed: "true".to_string(),
        }])
    );

    let removals = daemon.calls_to("RemoveTask");
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].args, vec![id.to_string(), "true".to_string()]);
    assert!(daemon.task(id).is_none());
}

#[tokio::test]
async fn test_schedule_enable_and_disable() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t"));

    let ack = translator.task_schedule(id, "enable").await;
    assert_eq!(ack.tasks[0].schedule, "enable");
    assert!(daemon.task(id).unwrap().enabled);

    let ack = translator.task_schedule(id, "disable").await;
    assert_eq!(ack.tasks[0].schedule, "disable");
    assert!(!daemon.task(id).unwrap().enabled);
}

#[tokio::test]
async fn test_schedule_other_status_makes_no_call() {
    let (daemon, translator) = setup();
    let id = daemon.add_task(FakeTask::new("t"));

    for status in ["pause", "Enable", "run", ""] {
        let ack = translator.task_schedule(id, status).await;
        assert_eq!(ack.tasks[0].schedule, NOT_MODIFIED);
    }
    assert_eq!(daemon.call_count(), 0);
}

// ── get_ssg ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_ssg_system_sorts_profiles() {
    let (daemon, translator) = setup();
    daemon.add_ssg(
        "/usr/share/xml/scap/ssg/content/ssg-rhel9-ds.xml",
        &[
            ("xccdf_org.ssgproject.content_profile_stig", "DISA STIG"),
            ("xccdf_org.ssgproject.content_profile_cis", "CIS"),
        ],
    );

    let listing = translator.get_ssg(SsgSource::System, "").await;
    assert_eq!(listing.ssgs.len(), 1);

    let ssg = &listing.ssgs[0];
    assert_eq!(ssg.ssg_file, "/usr/share/xml/scap/ssg/content/ssg-rhel9-ds.xml");
    assert_eq!(ssg.tailoring_file, "");
    let ids: Vec<&str> = ssg.profiles.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "xccdf_org.ssgproject.content_profile_cis",
            "xccdf_org.ssgproject.content_profile_stig",
        ]
    );
}

#[tokio::test]
async fn test_get_ssg_file_with_tailoring() {
    let (daemon, translator) = setup();
    daemon.add_ssg("/srv/ssg.xml", &[("p1", "Profile one")]);

    let listing = translator
        .get_ssg(SsgSource::File("/srv/ssg.xml".to_string()), "/srv/tailoring.xml")
        .await;
    assert_eq!(listing.ssgs[0].tailoring_file, "/srv/tailoring.xml");

    let lookups = daemon.calls_to("GetProfileChoicesForInput");
    assert_eq!(lookups[0].args, vec!["/srv/ssg.xml", "/srv/tailoring.xml"]);
}

#[tokio::test]
async fn test_get_ssg_skips_unreadable_content() {
    let (daemon, translator) = setup();
    daemon.add_ssg("/srv/a.xml", &[("a", "A")]);
    daemon.add_unreadable_ssg("/srv/b.xml");
    daemon.add_ssg("/srv/c.xml", &[("c", "C")]);

    let listing = translator.get_ssg(SsgSource::System, "").await;
    let files: Vec<&str> = listing.ssgs.iter().map(|s| s.ssg_file.as_str()).collect();
    assert_eq!(files, vec!["/srv/a.xml", "/srv/c.xml"]);

    let listing = translator
        .get_ssg(SsgSource::File("/srv/missing.xml".to_string()), "")
        .await;
    assert!(listing.ssgs.is_empty());
}

#[tokio::test]
async fn test_get_ssg_stops_at_unreadable_content() {
    let daemon = Arc::new(FakeDaemon::new());
    let translator = Translator::new(daemon.clone()).with_batch_policy(BatchPolicy::Stop);
    daemon.add_ssg("/srv/a.xml", &[("a", "A")]);
    daemon.add_unreadable_ssg("/srv/b.xml");
    daemon.add_ssg("/srv/c.xml", &[("c", "C")]);

    let listing = translator.get_ssg(SsgSource::System, "").await;
    assert_eq!(listing.ssgs.len(), 1);
    assert_eq!(listing.ssgs[0].ssg_file, "/srv/a.xml");
}

#[tokio::test]
async fn test_get_ssg_discovery_failure_is_empty() {
    let (daemon, translator) = setup();
    daemon.fail_on("GetSSGChoices");
    assert!(translator.get_ssg(SsgSource::System, "").await.ssgs.is_empty());
}

// ── call serialization ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_do_not_interleave() {
    let (daemon, translator) = setup();
    let translator = Arc::new(translator);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let translator = translator.clone();
        handles.push(tokio::spawn(async move {
            translator.new_task(&new_task_fields()).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let sequence = daemon.method_sequence();
    assert_eq!(sequence.len(), 16 * 9);
    for chunk in sequence.chunks(9) {
        assert_eq!(chunk[0], "CreateTask");
        assert!(chunk[1..].iter().all(|m| *m != "CreateTask"));
    }
}
