//! Error types for boot script execution.

use crate::result::ExpectError;
use crate::script::BootState;
use std::time::Duration;
use thiserror::Error;

/// Why a boot script did not reach a successful outcome.
///
/// Every variant names the state that was active, so a timeout waiting for
/// the firmware is distinguishable from one waiting for the menu.
#[derive(Error, Debug)]
pub enum BootError {
    /// An expect step's deadline elapsed.
    #[error("Boot timed out in {state} (after {deadline:?})")]
    Timeout {
        /// State whose expectation timed out
        state: BootState,
        /// That state's deadline
        deadline: Duration,
    },

    /// A failure marker appeared.
    #[error("Boot failed in {state}: saw {label} ({matched:?})")]
    Failed {
        /// State that saw the marker
        state: BootState,
        /// Label of the failure candidate
        label: String,
        /// The text that matched
        matched: String,
    },

    /// The run was cancelled.
    #[error("Interrupted in {state}")]
    Interrupted {
        /// State that was active when the cancellation arrived
        state: BootState,
    },

    /// The session itself failed: output closed, input unwritable, bad
    /// pattern.
    #[error("Console session failed in {state}: {source}")]
    Session {
        /// State that was active
        state: BootState,
        /// Underlying engine error
        #[source]
        source: ExpectError,
    },
}

impl BootError {
    /// Attach `state` to an engine error.
    pub(crate) fn from_expect(state: BootState, err: ExpectError) -> Self {
        match err {
            ExpectError::Timeout { deadline, .. } => BootError::Timeout { state, deadline },
            ExpectError::Interrupted => BootError::Interrupted { state },
            source => BootError::Session { state, source },
        }
    }

    /// The state that was active when the script stopped.
    pub fn state(&self) -> BootState {
        match self {
            BootError::Timeout { state, .. }
            | BootError::Failed { state, .. }
            | BootError::Interrupted { state }
            | BootError::Session { state, .. } => *state,
        }
    }
}
