//! Trigger classification: mapping invocation events to run intents.

use crate::config::SchedulerConfig;
use crate::target::ProfileName;
use serde::{Deserialize, Serialize};

/// The event that started an orchestration pass.
///
/// Constructed once per invocation by the invocation surface and read-only
/// thereafter. Manual fields arrive as raw strings and are validated during
/// classification, never at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// Timer-driven nightly invocation.
    Scheduled,

    /// Operator-requested run with optional target and job-count overrides.
    Manual { targets: String, jobs: String },

    /// Code-change invocation carrying the changed paths for audit.
    RepositoryChange { changed_paths: Vec<String> },
}

impl TriggerEvent {
    /// Whether this event kind qualifies for tier chaining.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, TriggerEvent::Scheduled)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TriggerEvent::Scheduled => "scheduled",
            TriggerEvent::Manual { .. } => "manual",
            TriggerEvent::RepositoryChange { .. } => "repository_change",
        }
    }
}

/// What a single run should do: which targets, how wide, which tag profile.
///
/// Derived deterministically from a [`TriggerEvent`]; no hidden state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunIntent {
    /// `"all"` or an explicit Bazel-style target expression.
    pub selector: String,

    /// Parallel jobs handed to the external runner. Always >= 1.
    pub concurrency: u32,

    /// Tag filter profile the run resolves against.
    pub profile: ProfileName,
}

/// Classify a trigger event into a run intent.
///
/// Total over every event variant; malformed manual fields fall back to
/// configured defaults rather than failing. Scheduled runs exercise the
/// full suite at lower parallelism to bound cluster contention over the
/// nightly window; manual and change-triggered runs default to the narrow
/// smoke target at higher parallelism for fast feedback.
pub fn classify(event: &TriggerEvent, config: &SchedulerConfig) -> RunIntent {
    match event {
        TriggerEvent::Scheduled => RunIntent {
            selector: "all".to_string(),
            concurrency: config.scheduled_jobs.max(1),
            profile: ProfileName::Base,
        },
        TriggerEvent::Manual { targets, jobs } => RunIntent {
            selector: if targets.trim().is_empty() {
                config.default_target.clone()
            } else {
                targets.trim().to_string()
            },
            concurrency: parse_jobs(jobs).unwrap_or(config.fallback_jobs).max(1),
            profile: ProfileName::Base,
        },
        TriggerEvent::RepositoryChange { .. } => RunIntent {
            selector: config.default_target.clone(),
            concurrency: config.fallback_jobs.max(1),
            profile: ProfileName::Base,
        },
    }
}

/// Parse a job-count override; `None` for anything non-numeric or < 1.
fn parse_jobs(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}
