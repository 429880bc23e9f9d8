//! # Population State
//!
//! The gate read paths consult before serving cached data. Only the
//! backfill coordinator moves it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use registry_telemetry::POPULATION_STATE;

use super::errors::RegistryCacheError;

/// Cache population state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PopulationState {
    /// Process started, no backfill yet.
    Initialised = 0,
    /// Backfill running.
    InProgress = 1,
    /// Backfill finished and keys verified.
    Complete = 2,
}

impl PopulationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PopulationState::InProgress,
            2 => PopulationState::Complete,
            _ => PopulationState::Initialised,
        }
    }
}

impl fmt::Display for PopulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PopulationState::Initialised => "INITIALISED",
            PopulationState::InProgress => "IN_PROGRESS",
            PopulationState::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free holder of the population state.
#[derive(Debug)]
pub struct PopulationStateGate {
    state: AtomicU8,
}

impl Default for PopulationStateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PopulationStateGate {
    /// New gate in `Initialised`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PopulationState::Initialised as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> PopulationState {
        PopulationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `state`.
    pub fn set(&self, state: PopulationState) {
        self.state.store(state as u8, Ordering::Release);
        POPULATION_STATE.set(state as u8 as f64);
    }

    /// True once population has completed.
    pub fn is_complete(&self) -> bool {
        self.state() == PopulationState::Complete
    }

    /// Refuse with `CacheNotReady` unless population has completed.
    pub fn ensure_complete(&self) -> Result<(), RegistryCacheError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(RegistryCacheError::CacheNotReady)
        }
    }
}
