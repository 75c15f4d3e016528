//! Tier chaining: gating the hourly tier on the primary run's outcome.

use crate::error::{Result, SchedulerError};
use crate::executor::RunResult;
use crate::trigger::TriggerEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a secondary (hourly) tier should run after a primary result.
///
/// True iff the triggering event was scheduled and the primary succeeded.
/// Anything else — manual or change triggers, failures, timeouts — ends
/// the pipeline after the primary. This keeps a failing primary from
/// masking resource consumption on a likely-redundant hourly superset.
pub fn should_chain(event: &TriggerEvent, primary: &RunResult) -> bool {
    event.is_scheduled() && primary.status.is_success()
}

/// Audit back-reference from a primary run to the secondary it triggered.
/// Created only when chaining occurs; not an ownership relation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierLink {
    pub primary_run_id: Uuid,
    pub secondary_run_id: Uuid,
}

/// Lifecycle of one orchestration pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Idle,
    PrimaryRunning,
    AwaitingChainDecision,
    SecondaryRunning,
    Done,
}

impl ChainState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainState::Idle => "idle",
            ChainState::PrimaryRunning => "primary_running",
            ChainState::AwaitingChainDecision => "awaiting_chain_decision",
            ChainState::SecondaryRunning => "secondary_running",
            ChainState::Done => "done",
        }
    }
}

/// State machine bounding chain depth to exactly one level.
///
/// The secondary transition on result receipt is always to `Done`,
/// regardless of the secondary's outcome — the hourly tier never chains
/// further.
#[derive(Debug)]
pub struct ChainController {
    event: TriggerEvent,
    state: ChainState,
}

impl ChainController {
    pub fn new(event: TriggerEvent) -> Self {
        Self {
            event,
            state: ChainState::Idle,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    /// Idle → PrimaryRunning on intent dispatch.
    pub fn on_primary_dispatch(&mut self) -> Result<()> {
        self.transition(ChainState::Idle, ChainState::PrimaryRunning)
    }

    /// PrimaryRunning → AwaitingChainDecision → SecondaryRunning or Done.
    ///
    /// Returns whether a secondary tier should be dispatched.
    pub fn on_primary_result(&mut self, primary: &RunResult) -> Result<bool> {
        self.transition(ChainState::PrimaryRunning, ChainState::AwaitingChainDecision)?;
        if should_chain(&self.event, primary) {
            self.state = ChainState::SecondaryRunning;
            Ok(true)
        } else {
            self.state = ChainState::Done;
            Ok(false)
        }
    }

    /// SecondaryRunning → Done, creating the audit link.
    pub fn on_secondary_result(
        &mut self,
        primary: &RunResult,
        secondary: &RunResult,
    ) -> Result<TierLink> {
        self.transition(ChainState::SecondaryRunning, ChainState::Done)?;
        Ok(TierLink {
            primary_run_id: primary.run_id,
            secondary_run_id: secondary.run_id,
        })
    }

    fn transition(&mut self, expected: ChainState, next: ChainState) -> Result<()> {
        if self.state != expected {
            return Err(SchedulerError::InvalidTransition {
                current: self.state.as_str().to_string(),
                requested: next.as_str().to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
