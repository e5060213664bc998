use crate::data::{Database, RunStatus};
use serde_json::{Value, json};
use tracing::warn;

/// Best-effort progress reporting into `admin_job_runs`. Failures are
/// logged and never interrupt the job.
pub struct AdminReporter<'a> {
    database: &'a Database,
    run_id: String,
}

impl<'a> AdminReporter<'a> {
    pub fn new(database: &'a Database, run_id: impl Into<String>, job_type: &str) -> Self {
        let run_id = run_id.into();
        if let Err(e) = database.ensure_admin_run(&run_id, job_type) {
            warn!("Could not register admin run {}: {}", run_id, e);
        }
        Self { database, run_id }
    }

    pub fn progress(&self, ok: u64, errors: u64, total_count: usize) {
        let result = json!({
            "templates_ok": ok,
            "templates_error": errors,
            "total_count": total_count,
        });
        if let Err(e) = self.database.update_admin_progress(&self.run_id, &result) {
            warn!("Could not report progress for run {}: {}", self.run_id, e);
        }
    }

    pub fn finish(&self, status: RunStatus, ok: u64, errors: u64) {
        self.finish_with(status, json!({ "templates_ok": ok, "templates_error": errors }));
    }

    /// Mark the run failed. The counts from the last progress update stay in
    /// the result and `error` is added next to them.
    pub fn fail(&self, error: &str) {
        let mut result = match self.database.get_admin_run(&self.run_id) {
            Ok(Some(run)) => run.result.filter(Value::is_object),
            _ => None,
        }
        .unwrap_or_else(|| json!({ "templates_ok": 0, "templates_error": 0 }));
        result["error"] = json!(error);
        self.finish_with(RunStatus::Failed, result);
    }

    pub fn finish_with(&self, status: RunStatus, result: Value) {
        if let Err(e) = self.database.finish_admin_run(&self.run_id, status, &result) {
            warn!("Could not mark run {} as {}: {}", self.run_id, status.as_str(), e);
        }
    }
}
