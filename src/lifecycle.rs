//! Cache generation ownership and the worker's install/activate state machine.

use std::fmt;

use crate::error::{CacheError, Result};

/// The one cache bucket the running version owns. Every other bucket in cache
/// storage is garbage once this version activates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheGeneration {
    name: String,
}

impl CacheGeneration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.name == name
    }

    /// Names from `existing` that belong to superseded generations.
    pub fn stale<'a>(&self, existing: &'a [String]) -> Vec<&'a str> {
        existing
            .iter()
            .map(String::as_str)
            .filter(|name| !self.is_current(name))
            .collect()
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Waiting for old clients to go away. Skipped when `skip_waiting` is set.
    Installed,
    Activating,
    Activated,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

/// Tracks the lifecycle of one worker version.
#[derive(Debug)]
pub struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: WorkerState::Parsed,
            skip_waiting: false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn skips_waiting(&self) -> bool {
        self.skip_waiting
    }

    pub fn begin_install(&mut self) -> Result<()> {
        // A failed install may be retried by the host.
        self.transition(
            &[WorkerState::Parsed, WorkerState::Installing],
            WorkerState::Installing,
        )
    }

    pub fn finish_install(&mut self) -> Result<()> {
        self.transition(&[WorkerState::Installing], WorkerState::Installed)
    }

    /// Promote straight to activation instead of waiting for old tabs to close.
    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Re-entry from `Activated` is allowed; garbage collection is idempotent
    /// and update checks can trigger it again. `Parsed` is accepted because the
    /// host may restart the worker between install and activate, losing this
    /// in-memory state.
    pub fn begin_activate(&mut self) -> Result<()> {
        self.transition(
            &[
                WorkerState::Parsed,
                WorkerState::Installed,
                WorkerState::Activating,
                WorkerState::Activated,
            ],
            WorkerState::Activating,
        )
    }

    pub fn finish_activate(&mut self) -> Result<()> {
        self.transition(&[WorkerState::Activating], WorkerState::Activated)
    }

    fn transition(&mut self, allowed_from: &[WorkerState], to: WorkerState) -> Result<()> {
        if !allowed_from.contains(&self.state) {
            return Err(CacheError::Lifecycle {
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        tracing::debug!(target: "proposal_shell::lifecycle", from = self.state.as_str(), to = to.as_str(), "worker state");
        self.state = to;
        Ok(())
    }
}
