//! End-to-end scheduling: classify, resolve, execute, chain, archive.

use crate::archive::{ArchiveOutcome, Archiver, ArtifactSink};
use crate::chain::{ChainController, TierLink};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::executor::{execute, RunResult, TestRunner};
use crate::target::{resolve, TagFilterProfile, TargetRegistry};
use crate::trigger::{classify, RunIntent, TriggerEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything one orchestration pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub intent: RunIntent,
    pub primary: RunResult,
    pub primary_archive: ArchiveOutcome,
    pub secondary: Option<RunResult>,
    pub secondary_archive: Option<ArchiveOutcome>,
    pub link: Option<TierLink>,
}

impl ScheduleReport {
    /// Overall verdict surfaced to the invocation surface. The secondary
    /// tier's outcome is reported but does not gate anything further.
    pub fn primary_succeeded(&self) -> bool {
        self.primary.status.is_success()
    }
}

/// Drives one complete orchestration pass.
///
/// Control flow is single-threaded: the external runner owns all real
/// parallelism, and the secondary tier never starts before the primary
/// result is fully in hand.
pub struct SchedulePipeline;

impl SchedulePipeline {
    /// Run the pipeline for one trigger event.
    ///
    /// A resolution failure aborts immediately, before anything executes or
    /// archives. Execution failures and timeouts are data in the report:
    /// the run is still archived and still evaluated for chaining.
    pub async fn run(
        runner: &dyn TestRunner,
        sink: &dyn ArtifactSink,
        registry: &TargetRegistry,
        config: &SchedulerConfig,
        job: &str,
        event: TriggerEvent,
    ) -> Result<ScheduleReport> {
        let intent = classify(&event, config);
        info!(
            trigger = event.kind_name(),
            selector = %intent.selector,
            concurrency = intent.concurrency,
            registry_digest = %&registry.digest()[..12],
            "Classified trigger"
        );

        let mut controller = ChainController::new(event);
        let archiver = Archiver::new(sink, config);

        let profile = TagFilterProfile::named(intent.profile);
        let targets = resolve(&intent.selector, registry, &profile)?;

        controller.on_primary_dispatch()?;
        let primary = execute(
            runner,
            &targets,
            intent.concurrency,
            &profile,
            config.primary_timeout(),
        )
        .await?;

        let primary_archive = archiver
            .archive(
                primary.run_id,
                &format!("{}-{}", job, profile.name.as_str()),
                &primary.artifacts,
            )
            .await;

        let chain = controller.on_primary_result(&primary)?;

        let (secondary, secondary_archive, link) = if chain {
            info!(primary_run_id = %primary.run_id, "Primary succeeded on schedule, dispatching hourly tier");

            let hourly = TagFilterProfile::hourly();
            let hourly_targets = resolve("all", registry, &hourly)?;
            let result = execute(
                runner,
                &hourly_targets,
                intent.concurrency,
                &hourly,
                config.secondary_timeout(),
            )
            .await?;

            let archive = archiver
                .archive(
                    result.run_id,
                    &format!("{}-{}", job, hourly.name.as_str()),
                    &result.artifacts,
                )
                .await;

            let link = controller.on_secondary_result(&primary, &result)?;
            (Some(result), Some(archive), Some(link))
        } else {
            info!(primary_run_id = %primary.run_id, status = ?primary.status, "No hourly tier for this run");
            (None, None, None)
        };

        Ok(ScheduleReport {
            intent,
            primary,
            primary_archive,
            secondary,
            secondary_archive,
            link,
        })
    }
}
