//! Bazel wrapper: the production [`TestRunner`] implementation.

use crate::archive::{ArtifactHandle, ArtifactKind};
use crate::executor::{ProgressBoard, RunnerExit, RunnerRequest, TestRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runs a target set through `bazel test`.
///
/// Bazel owns target-level parallelism, retries and sandboxing; this
/// wrapper only renders the request into flags and collects the
/// build-event and profile artifacts Bazel leaves behind.
pub struct BazelRunner {
    binary_path: String,
    workspace: PathBuf,
    output_dir: PathBuf,
}

impl BazelRunner {
    pub fn new(
        binary_path: impl Into<String>,
        workspace: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            workspace: workspace.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Default: `bazel` from PATH, current directory as workspace.
    pub fn default_path(output_dir: impl Into<PathBuf>) -> Self {
        Self::new("bazel", ".", output_dir)
    }

    fn bep_path(&self) -> PathBuf {
        self.output_dir.join("bep.json")
    }

    fn profile_path(&self) -> PathBuf {
        self.output_dir.join("profile.gz")
    }

    fn build_args(&self, request: &RunnerRequest) -> Vec<String> {
        let mut args = vec!["test".to_string()];
        args.extend(request.targets.iter().cloned());
        args.push(format!("--jobs={}", request.concurrency));
        if !request.tag_filter_expression.is_empty() {
            args.push(format!(
                "--test_tag_filters={}",
                request.tag_filter_expression
            ));
        }
        args.push("--keep_going".to_string());
        args.push(format!(
            "--build_event_json_file={}",
            self.bep_path().display()
        ));
        args.push(format!("--profile={}", self.profile_path().display()));
        args.extend(request.extra_flags.iter().cloned());
        args
    }

    fn collect_artifacts(&self) -> Vec<ArtifactHandle> {
        let mut artifacts = Vec::new();
        for (name, path, kind) in [
            ("bep.json", self.bep_path(), ArtifactKind::BuildEvents),
            ("profile.gz", self.profile_path(), ArtifactKind::Profile),
        ] {
            if Path::new(&path).exists() {
                artifacts.push(ArtifactHandle::new(name, path, kind));
            }
        }
        artifacts
    }
}

#[async_trait]
impl TestRunner for BazelRunner {
    async fn run(
        &self,
        request: &RunnerRequest,
        _progress: &ProgressBoard,
    ) -> anyhow::Result<RunnerExit> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let args = self.build_args(request);
        debug!(args = ?args, "Invoking bazel");

        let output = tokio::process::Command::new(&self.binary_path)
            .args(&args)
            .current_dir(&self.workspace)
            .output()
            .await?;

        let exit_code = output.status.code().unwrap_or(-1);
        info!(exit_code, targets = request.targets.len(), "bazel test finished");

        Ok(RunnerExit {
            exit_code,
            artifacts: self.collect_artifacts(),
        })
    }

    fn name(&self) -> &str {
        "bazel"
    }
}
