//! Nightwatch - trigger-driven CI test scheduling
//!
//! Orchestrates system-test runs:
//! - Classifies trigger events (scheduled, manual, code change) into run intents
//! - Resolves tag-filtered target sets from the registry
//! - Executes them through an external test runner under a wall-clock ceiling
//! - Chains the hourly tier off successful scheduled runs, exactly one level
//! - Archives run artifacts best-effort

pub mod archive;
pub mod bazel;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod target;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use archive::{ArchiveOutcome, Archiver, ArtifactHandle, ArtifactKind, ArtifactSink, FsArtifactSink};
pub use bazel::BazelRunner;
pub use chain::{should_chain, ChainController, ChainState, TierLink};
pub use config::SchedulerConfig;
pub use error::{ResolutionError, Result, SchedulerError};
pub use executor::{
    execute, ProgressBoard, RunResult, RunStatus, RunnerExit, RunnerRequest, TargetStatus,
    TestRunner,
};
pub use pipeline::{SchedulePipeline, ScheduleReport};
pub use target::{
    apply_filters, resolve, ProfileName, ResolvedTargetSet, TagFilterProfile, TargetRegistry,
    TestTarget,
};
pub use trigger::{classify, RunIntent, TriggerEvent};

/// Nightwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
