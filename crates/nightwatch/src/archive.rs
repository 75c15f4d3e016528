//! Best-effort artifact archiving keyed by job identity.

use crate::config::SchedulerConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// What kind of artifact a run produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Build-event-protocol output consumed by observability tooling.
    BuildEvents,
    /// Execution profile data.
    Profile,
    /// Plain runner log.
    Log,
}

/// Reference to a blob the runner left behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Short name, e.g. `bep.json`.
    pub name: String,

    /// Where the runner wrote it.
    pub path: PathBuf,

    pub kind: ArtifactKind,
}

impl ArtifactHandle {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }
}

/// What archiving achieved. Warnings are soft: they never change the run's
/// recorded status and never block the chain decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    pub archived: usize,
    pub warnings: Vec<String>,
}

impl ArchiveOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// External artifact sink: accepts named blobs under a retention policy.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store one artifact under `key`. Overwrites an existing key.
    async fn store(
        &self,
        key: &str,
        artifact: &ArtifactHandle,
        retention_days: u32,
    ) -> anyhow::Result<()>;
}

/// Archives a run's artifacts into the sink, best-effort.
pub struct Archiver<'a> {
    sink: &'a dyn ArtifactSink,
    config: &'a SchedulerConfig,
}

impl<'a> Archiver<'a> {
    pub fn new(sink: &'a dyn ArtifactSink, config: &'a SchedulerConfig) -> Self {
        Self { sink, config }
    }

    /// Archive every artifact of one run. Invoked unconditionally after a
    /// result, success or failure. Sink errors become warnings, never
    /// failures: an unarchived blob must not fail the run. An empty
    /// artifact list is success.
    pub async fn archive(
        &self,
        run_id: Uuid,
        job: &str,
        artifacts: &[ArtifactHandle],
    ) -> ArchiveOutcome {
        let mut outcome = ArchiveOutcome::default();

        for artifact in artifacts {
            let key = self.archive_key(run_id, job, artifact);
            match self
                .sink
                .store(&key, artifact, self.config.retention_days)
                .await
            {
                Ok(()) => {
                    debug!(run_id = %run_id, key = %key, "Archived artifact");
                    outcome.archived += 1;
                }
                Err(e) => {
                    let message = format!("failed to archive '{}': {}", key, e);
                    warn!(run_id = %run_id, key = %key, error = %e, "Archive failure (soft)");
                    outcome.warnings.push(message);
                }
            }
        }

        outcome
    }

    /// Composite key of job identity plus the artifact name. Reruns of the
    /// same job overwrite, last-write-wins; `qualify_with_run_id` prefixes
    /// the run id when exact historical retention is wanted.
    fn archive_key(&self, run_id: Uuid, job: &str, artifact: &ArtifactHandle) -> String {
        if self.config.qualify_with_run_id {
            format!("{}-{}-{}", job, run_id, artifact.name)
        } else {
            format!("{}-{}", job, artifact.name)
        }
    }
}

/// Filesystem sink used by the CLI and tests. Stores blobs flat under a
/// root directory with a sidecar retention stamp.
pub struct FsArtifactSink {
    root: PathBuf,
}

impl FsArtifactSink {
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key.replace('/', "_"))
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn store(
        &self,
        key: &str,
        artifact: &ArtifactHandle,
        retention_days: u32,
    ) -> anyhow::Result<()> {
        let dest = self.blob_path(key);
        tokio::fs::copy(&artifact.path, &dest).await?;

        let expires = chrono::Utc::now() + chrono::Duration::days(i64::from(retention_days));
        let stamp = dest.with_extension("retention");
        tokio::fs::write(&stamp, expires.to_rfc3339()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records stores and can be scripted to fail.
    #[derive(Default)]
    struct RecordingSink {
        stored: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ArtifactSink for RecordingSink {
        async fn store(
            &self,
            key: &str,
            _artifact: &ArtifactHandle,
            _retention_days: u32,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("storage unavailable")
            }
            self.stored.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn handles() -> Vec<ArtifactHandle> {
        vec![
            ArtifactHandle::new("bep.json", "/tmp/bep.json", ArtifactKind::BuildEvents),
            ArtifactHandle::new("profile.gz", "/tmp/profile.gz", ArtifactKind::Profile),
        ]
    }

    #[tokio::test]
    async fn test_archive_keys_job_plus_name() {
        let sink = RecordingSink::default();
        let config = SchedulerConfig::default();
        let archiver = Archiver::new(&sink, &config);

        let outcome = archiver
            .archive(Uuid::new_v4(), "nightly", &handles())
            .await;
        assert_eq!(outcome.archived, 2);
        assert!(outcome.is_clean());
        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored.as_slice(), &["nightly-bep.json", "nightly-profile.gz"]);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_same_key() {
        let sink = RecordingSink::default();
        let config = SchedulerConfig::default();
        let archiver = Archiver::new(&sink, &config);

        archiver.archive(Uuid::new_v4(), "nightly", &handles()).await;
        archiver.archive(Uuid::new_v4(), "nightly", &handles()).await;

        // Different runs, same keys: the sink overwrites.
        let stored = sink.stored.lock().unwrap();
        assert_eq!(stored[0], stored[2]);
    }

    #[tokio::test]
    async fn test_run_id_qualified_keys() {
        let sink = RecordingSink::default();
        let config = SchedulerConfig {
            qualify_with_run_id: true,
            ..SchedulerConfig::default()
        };
        let archiver = Archiver::new(&sink, &config);

        let run_id = Uuid::new_v4();
        archiver.archive(run_id, "nightly", &handles()).await;
        let stored = sink.stored.lock().unwrap();
        assert!(stored[0].contains(&run_id.to_string()));
    }

    #[tokio::test]
    async fn test_sink_failure_is_a_soft_warning() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let config = SchedulerConfig::default();
        let archiver = Archiver::new(&sink, &config);

        let outcome = archiver
            .archive(Uuid::new_v4(), "nightly", &handles())
            .await;
        assert_eq!(outcome.archived, 0);
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_artifact_list_is_success() {
        let sink = RecordingSink::default();
        let config = SchedulerConfig::default();
        let archiver = Archiver::new(&sink, &config);

        let outcome = archiver.archive(Uuid::new_v4(), "nightly", &[]).await;
        assert_eq!(outcome.archived, 0);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn test_fs_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bep.json");
        tokio::fs::write(&src, b"{}").await.unwrap();

        let sink = FsArtifactSink::new(dir.path().join("archive")).unwrap();
        let handle = ArtifactHandle::new("bep.json", &src, ArtifactKind::BuildEvents);
        sink.store("nightly-bep.json", &handle, 14).await.unwrap();

        let blob = sink.blob_path("nightly-bep.json");
        assert_eq!(tokio::fs::read(&blob).await.unwrap(), b"{}");
        assert!(blob.with_extension("retention").exists());
    }

    #[tokio::test]
    async fn test_fs_sink_missing_source_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArtifactSink::new(dir.path()).unwrap();
        let handle = ArtifactHandle::new(
            "gone.json",
            dir.path().join("does-not-exist.json"),
            ArtifactKind::Log,
        );
        assert!(sink.store("k", &handle, 14).await.is_err());
    }
}
