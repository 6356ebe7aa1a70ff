//! Workflow recording, stage timing, and structured run artifacts.

use crate::runtime::artifacts::ArtifactManager;
use crate::runtime::error::{XtaskError, XtaskResult};
use serde::Serialize;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
struct StageRecord {
    name: String,
    started_unix_ms: u64,
    duration_ms: u128,
    status: String,
    error: Option<String>,
    exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
struct RunManifest {
    workflow: String,
    profile: Option<String>,
    started_unix_ms: u64,
    finished_unix_ms: u64,
    duration_ms: u128,
    status: String,
    error: Option<String>,
    run_dir: String,
    command: String,
    stages: Vec<StageRecord>,
}

#[derive(Debug)]
struct ActiveRun {
    workflow: String,
    profile: Option<String>,
    started_unix_ms: u64,
    started_instant: Instant,
    run_dir: PathBuf,
    manifest_path: PathBuf,
    events_path: PathBuf,
    command: String,
    stages: Vec<StageRecord>,
}

/// Shared workflow recorder service.
///
/// Wrap a command in [`with_workflow_run`](Self::with_workflow_run) and nest each step in
/// [`run_timed_stage`](Self::run_timed_stage) to get a manifest and an event log under
/// `.artifacts/automation/runs/`. The active run lives inside the recorder, so separate
/// recorders never see each other's stages.
#[derive(Clone, Debug)]
pub struct WorkflowRecorder {
    artifacts: ArtifactManager,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl WorkflowRecorder {
    /// Create a recorder service.
    pub fn new(artifacts: ArtifactManager) -> Self {
        Self {
            artifacts,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a workflow with manifest and event recording.
    pub fn with_workflow_run<F>(
        &self,
        workflow: &str,
        profile: Option<String>,
        action: F,
    ) -> XtaskResult<()>
    where
        F: FnOnce() -> XtaskResult<()>,
    {
        let run = self.begin_workflow_run(workflow, profile)?;
        *self.lock()? = Some(run);

        let result = action();
        let finished = self.finish_workflow_run(result.as_ref().err());
        match (result, finished) {
            (Err(err), Err(finish_err)) => {
                warn!(workflow, error = %finish_err, "failed to finalize workflow run");
                Err(err)
            }
            (result, finished) => finished.and(result),
        }
    }

    fn lock(&self) -> XtaskResult<MutexGuard<'_, Option<ActiveRun>>> {
        self.active
            .lock()
            .map_err(|_| XtaskError::io("failed to lock workflow recorder"))
    }

    fn begin_workflow_run(&self, workflow: &str, profile: Option<String>) -> XtaskResult<ActiveRun> {
        let started_unix_ms = unix_timestamp_millis();
        let run_dir = self
            .artifacts
            .automation_runs_dir()
            .join(format!("{started_unix_ms}-{workflow}"));
        self.artifacts.ensure_dir(&run_dir)?;

        let events_path = run_dir.join("events.jsonl");
        let manifest_path = run_dir.join("manifest.json");
        fs::write(&events_path, "").map_err(|err| {
            XtaskError::io(format!(
                "failed to initialize {}: {err}",
                events_path.display()
            ))
        })?;

        append_run_event(
            &events_path,
            serde_json::json!({
                "type": "workflow_started",
                "workflow": workflow,
                "profile": profile,
                "timestamp_unix_ms": started_unix_ms
            }),
        )?;
        info!(workflow, profile = ?profile, "workflow started");

        Ok(ActiveRun {
            workflow: workflow.to_string(),
            profile,
            started_unix_ms,
            started_instant: Instant::now(),
            run_dir,
            manifest_path,
            events_path,
            command: env::args().collect::<Vec<_>>().join(" "),
            stages: Vec::new(),
        })
    }

    fn finish_workflow_run(&self, error: Option<&XtaskError>) -> XtaskResult<()> {
        let Some(run) = self.lock()?.take() else {
            return Ok(());
        };

        let finished_unix_ms = unix_timestamp_millis();
        let status = if error.is_none() { "ok" } else { "failed" };
        let manifest = RunManifest {
            workflow: run.workflow.clone(),
            profile: run.profile.clone(),
            started_unix_ms: run.started_unix_ms,
            finished_unix_ms,
            duration_ms: run.started_instant.elapsed().as_millis(),
            status: status.to_string(),
            error: error.map(ToString::to_string),
            run_dir: run.run_dir.display().to_string(),
            command: run.command.clone(),
            stages: run.stages,
        };

        append_run_event(
            &run.events_path,
            serde_json::json!({
                "type": "workflow_finished",
                "workflow": run.workflow,
                "timestamp_unix_ms": finished_unix_ms,
                "status": status,
                "error": error.map(ToString::to_string)
            }),
        )?;

        let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|err| {
            XtaskError::io(format!("failed to serialize automation manifest: {err}"))
        })?;
        fs::write(&run.manifest_path, manifest_json).map_err(|err| {
            XtaskError::io(format!(
                "failed to write {}: {err}",
                run.manifest_path.display()
            ))
        })?;
        info!(workflow = %run.workflow, status, "workflow finished");
        println!("    automation run artifact: {}", run.manifest_path.display());

        Ok(())
    }

    /// Record a stage with timing and structured events.
    ///
    /// The stage result is propagated unchanged after the `stage_finished` event is written.
    pub fn run_timed_stage<T, F>(&self, message: &str, action: F) -> XtaskResult<T>
    where
        F: FnOnce() -> XtaskResult<T>,
    {
        println!("\n==> {message}");
        let started = Instant::now();
        let started_unix_ms = unix_timestamp_millis();
        self.append_active_event(serde_json::json!({
            "type": "stage_started",
            "name": message,
            "timestamp_unix_ms": started_unix_ms
        }))?;

        let result = action();
        let elapsed = started.elapsed();
        let stage = StageRecord {
            name: message.to_string(),
            started_unix_ms,
            duration_ms: elapsed.as_millis(),
            status: if result.is_ok() { "ok" } else { "failed" }.to_string(),
            error: result.as_ref().err().map(ToString::to_string),
            exit_code: result.as_ref().err().and_then(|err| err.exit_code),
        };
        self.record_stage(stage)?;

        match &result {
            Ok(_) => println!("    done in {}", format_duration(elapsed)),
            Err(err) => {
                warn!(stage = message, error = %err, "stage failed");
                println!("    failed in {}", format_duration(elapsed));
            }
        }
        result
    }

    /// Print a warning using the shared workflow output style.
    pub fn warn(&self, message: &str) {
        warn!("{message}");
        println!("\n[warn] {message}");
    }

    fn append_active_event(&self, event: serde_json::Value) -> XtaskResult<()> {
        let guard = self.lock()?;
        let Some(run) = guard.as_ref() else {
            return Ok(());
        };
        append_run_event(&run.events_path, event)
    }

    fn record_stage(&self, stage: StageRecord) -> XtaskResult<()> {
        let mut guard = self.lock()?;
        let Some(run) = guard.as_mut() else {
            return Ok(());
        };
        append_run_event(
            &run.events_path,
            serde_json::json!({
                "type": "stage_finished",
                "name": stage.name,
                "started_unix_ms": stage.started_unix_ms,
                "finished_unix_ms": unix_timestamp_millis(),
                "duration_ms": stage.duration_ms,
                "status": stage.status,
                "error": stage.error,
                "exit_code": stage.exit_code
            }),
        )?;
        run.stages.push(stage);
        Ok(())
    }
}

fn append_run_event(path: &Path, event: serde_json::Value) -> XtaskResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| XtaskError::io(format!("failed to open {}: {err}", path.display())))?;
    let line = serde_json::to_string(&event)
        .map_err(|err| XtaskError::io(format!("failed to serialize run event: {err}")))?;
    writeln!(&mut file, "{line}")
        .map_err(|err| XtaskError::io(format!("failed to append {}: {err}", path.display())))
}

/// Format a duration for human-readable terminal output.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs >= 60 {
        let minutes = secs / 60;
        let rem_secs = secs % 60;
        format!("{minutes}m {rem_secs}.{millis:03}s")
    } else {
        format!("{secs}.{millis:03}s")
    }
}

/// Return the current unix timestamp in milliseconds.
pub fn unix_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::XtaskErrorCategory;

    fn unique_temp_root() -> PathBuf {
        std::env::temp_dir().join(format!(
            "xtask-workflow-test-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time")
                .as_nanos()
        ))
    }

    fn single_run_dir(artifacts: &ArtifactManager) -> PathBuf {
        let entries = fs::read_dir(artifacts.automation_runs_dir())
            .expect("read run dir")
            .map(|entry| entry.expect("entry").path())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 1);
        entries[0].clone()
    }

    #[test]
    fn workflow_run_writes_manifest_and_events() {
        let root = unique_temp_root();
        let artifacts = ArtifactManager::new(root.clone());
        let workflow = WorkflowRecorder::new(artifacts.clone());

        workflow
            .with_workflow_run("shell", Some("Debug".into()), || {
                workflow.run_timed_stage("ensure build dir", || Ok(()))
            })
            .expect("workflow run");

        let run_dir = single_run_dir(&artifacts);
        let manifest = fs::read_to_string(run_dir.join("manifest.json")).expect("manifest");
        let events = fs::read_to_string(run_dir.join("events.jsonl")).expect("events");

        assert!(manifest.contains("\"workflow\": \"shell\""));
        assert!(manifest.contains("\"profile\": \"Debug\""));
        assert!(manifest.contains("\"status\": \"ok\""));
        assert!(events.contains("\"type\":\"workflow_started\""));
        assert!(events.contains("\"type\":\"stage_started\""));
        assert!(events.contains("\"type\":\"stage_finished\""));
        assert!(events.contains("\"type\":\"workflow_finished\""));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn failed_stage_records_exit_code_and_marks_manifest_failed() {
        let root = unique_temp_root();
        let artifacts = ArtifactManager::new(root.clone());
        let workflow = WorkflowRecorder::new(artifacts.clone());

        let result = workflow.with_workflow_run("shell", None, || {
            workflow.run_timed_stage("cmake --build", || -> XtaskResult<()> {
                Err(XtaskError::process_exit("`cmake` exited with status 2")
                    .with_exit_code(Some(2)))
            })
        });
        assert!(result.is_err());

        let manifest =
            fs::read_to_string(single_run_dir(&artifacts).join("manifest.json")).expect("manifest");
        assert!(manifest.contains("\"status\": \"failed\""));
        assert!(manifest.contains("\"exit_code\": 2"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn finalize_failure_does_not_mask_the_action_error() {
        let root = unique_temp_root();
        let artifacts = ArtifactManager::new(root.clone());
        let workflow = WorkflowRecorder::new(artifacts.clone());

        let err = workflow
            .with_workflow_run("shell", None, || {
                fs::remove_dir_all(artifacts.automation_runs_dir()).expect("remove runs");
                Err(XtaskError::process_exit("`cmake` exited with status 2").with_exit_code(Some(2)))
            })
            .expect_err("action fails");

        assert_eq!(err.category, XtaskErrorCategory::ProcessExit);
        assert_eq!(err.exit_code, Some(2));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn finalize_failure_is_reported_when_the_action_succeeds() {
        let root = unique_temp_root();
        let artifacts = ArtifactManager::new(root.clone());
        let workflow = WorkflowRecorder::new(artifacts.clone());

        let err = workflow
            .with_workflow_run("shell", None, || {
                fs::remove_dir_all(artifacts.automation_runs_dir()).expect("remove runs");
                Ok(())
            })
            .expect_err("finalize fails");

        assert_eq!(err.category, XtaskErrorCategory::Io);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn stage_outside_a_run_still_returns_its_value() {
        let workflow = WorkflowRecorder::new(ArtifactManager::new(unique_temp_root()));
        let value = workflow
            .run_timed_stage("resolve output dir", || Ok(PathBuf::from("/tmp/bin")))
            .expect("stage value");
        assert_eq!(value, PathBuf::from("/tmp/bin"));
    }

    #[test]
    fn format_duration_switches_to_minutes() {
        assert_eq!(format_duration(Duration::from_millis(1_234)), "1.234s");
        assert_eq!(format_duration(Duration::from_millis(61_005)), "1m 1.005s");
    }
}
