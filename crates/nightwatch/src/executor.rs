//! Run execution: timeout-bounded delegation to the external test runner.

use crate::archive::ArtifactHandle;
use crate::error::{Result, SchedulerError};
use crate::target::{ResolvedTargetSet, TagFilterProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a single target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Passed,
    Failed,
    /// The target was still pending when the run's wall-clock ceiling fired.
    TimedOut,
}

/// Overall outcome of one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    /// Execution exceeded the configured ceiling. Not a retry trigger.
    TimedOut,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Structured result of one execution, primary or secondary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub targets: ResolvedTargetSet,
    pub status: RunStatus,
    pub per_target: BTreeMap<String, TargetStatus>,
    pub artifacts: Vec<ArtifactHandle>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn passed_count(&self) -> usize {
        self.per_target
            .values()
            .filter(|s| matches!(s, TargetStatus::Passed))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.per_target
            .values()
            .filter(|s| !matches!(s, TargetStatus::Passed))
            .count()
    }
}

/// What the external runner is asked to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerRequest {
    pub targets: Vec<String>,
    pub concurrency: u32,
    pub tag_filter_expression: String,
    pub extra_flags: Vec<String>,
}

/// Exit of the external runner: process status plus the build-event
/// artifact pair it produced.
#[derive(Debug, Clone)]
pub struct RunnerExit {
    pub exit_code: i32,
    pub artifacts: Vec<ArtifactHandle>,
}

/// Per-target status board the runner reports into as targets finish, so a
/// fired timeout can tell completed targets from pending ones.
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    inner: Arc<Mutex<BTreeMap<String, TargetStatus>>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, target: &str, status: TargetStatus) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(target.to_string(), status);
    }

    pub fn snapshot(&self) -> BTreeMap<String, TargetStatus> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.clone()
    }
}

/// External test runner abstraction.
///
/// Implementations wrap an out-of-process runner (Bazel in production, a
/// scripted fake in tests). The runner owns its internal parallelism and
/// any retry policy; the executor only imposes the wall-clock ceiling and
/// normalizes the outcome.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the request, reporting per-target completions into `progress`.
    async fn run(&self, request: &RunnerRequest, progress: &ProgressBoard)
        -> anyhow::Result<RunnerExit>;

    /// Runner name for logging.
    fn name(&self) -> &str;
}

/// Execute a resolved target set through the runner under a wall-clock
/// ceiling and normalize the outcome into a [`RunResult`].
///
/// An empty target set is a valid no-op run: the runner is not invoked and
/// the result is `Success`. Nonzero runner exit is `Failure`; a fired
/// timeout is `TimedOut` with every still-pending target marked
/// `TimedOut` rather than `Failed`. Only an infrastructure-level runner
/// fault (spawn failure) propagates as an error.
pub async fn execute(
    runner: &dyn TestRunner,
    targets: &ResolvedTargetSet,
    concurrency: u32,
    profile: &TagFilterProfile,
    timeout: Duration,
) -> Result<RunResult> {
    let run_id = Uuid::new_v4();
    let start = Instant::now();

    if targets.is_empty() {
        info!(run_id = %run_id, "Empty target set, recording no-op run");
        return Ok(RunResult {
            run_id,
            targets: targets.clone(),
            status: RunStatus::Success,
            per_target: BTreeMap::new(),
            artifacts: Vec::new(),
            duration_ms: 0,
            finished_at: Utc::now(),
        });
    }

    let request = RunnerRequest {
        targets: targets.labels().to_vec(),
        concurrency,
        tag_filter_expression: profile.expression(),
        extra_flags: Vec::new(),
    };
    let progress = ProgressBoard::new();

    info!(
        run_id = %run_id,
        runner = runner.name(),
        targets = targets.len(),
        concurrency,
        profile = profile.name.as_str(),
        "Dispatching run"
    );

    let (status, artifacts) = match tokio::time::timeout(timeout, runner.run(&request, &progress))
        .await
    {
        Ok(Ok(exit)) => {
            let status = if exit.exit_code == 0 {
                RunStatus::Success
            } else {
                RunStatus::Failure
            };
            (status, exit.artifacts)
        }
        Ok(Err(e)) => return Err(SchedulerError::Runner(e)),
        Err(_) => {
            warn!(run_id = %run_id, timeout_secs = timeout.as_secs(), "Run exceeded wall-clock ceiling");
            (RunStatus::TimedOut, Vec::new())
        }
    };

    let mut per_target = progress.snapshot();
    for label in targets.labels() {
        per_target.entry(label.clone()).or_insert(match status {
            RunStatus::Success => TargetStatus::Passed,
            RunStatus::Failure => TargetStatus::Failed,
            RunStatus::TimedOut => TargetStatus::TimedOut,
        });
    }

    let result = RunResult {
        run_id,
        targets: targets.clone(),
        status,
        per_target,
        artifacts,
        duration_ms: start.elapsed().as_millis() as u64,
        finished_at: Utc::now(),
    };

    info!(
        run_id = %run_id,
        status = ?result.status,
        passed = result.passed_count(),
        failed = result.failed_count(),
        duration_ms = result.duration_ms,
        "Run finished"
    );

    Ok(result)
}
