//! Boot scripts: ordered expect / send / wait steps run against a session.
//!
//! A [`BootScript`] is a flat list of steps, each tagged with the
//! [`BootState`] it represents. Steps run strictly in order. Branching is
//! expressed through candidate [`Verdict`]s: a matched candidate can let the
//! script continue, end it successfully, or end it as a boot failure.
//!
//! ```no_run
//! use solboot::{BootScript, ConsoleCommand, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::builder()
//!     .spawn(&ConsoleCommand::new("./scripts/ipmi_helper.sh").arg("console").inherit_env())?;
//!
//! let outcome = BootScript::nautilus().execute(&mut session).await;
//! session.teardown().await?;
//! println!("{:?}", outcome?);
//! # Ok(())
//! # }
//! ```

mod error;
mod nautilus;

pub use error::BootError;
pub use nautilus::{
    CONFIRM_PRESSES, KEY_INTERVAL, MENU_DOWN_PRESSES, MENU_READY_DEADLINE, SESSION_READY_DEADLINE,
    STAGE_DEADLINE,
};

use crate::pattern::{ExpectRule, Verdict};
use crate::session::Session;
use std::fmt;
use std::time::Duration;

/// Named states of the boot procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootState {
    /// Waiting for the SOL session to come up
    AwaitSessionReady,
    /// Waiting for firmware to start booting
    AwaitFirmwareBoot,
    /// Waiting for the bootloader menu to list the target entry
    AwaitMenuBanner,
    /// Waiting for the menu to accept input
    AwaitMenuReady,
    /// Moving the cursor to the target entry
    NavigateMenu,
    /// Selecting the highlighted entry
    ConfirmSelection,
    /// Waiting for the booted system to report success or failure
    AwaitOutcome,
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One unit of work in a boot script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Wait for one of the rule's candidates.
    Expect(ExpectRule),
    /// Type `bytes` `count` times, pausing `delay` after each.
    Send {
        /// Payload for each send
        bytes: Vec<u8>,
        /// Number of sends
        count: usize,
        /// Pause after each send
        delay: Duration,
    },
    /// Do nothing for a while.
    Wait(Duration),
}

/// A [`Step`] tagged with the state it represents.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    /// State reported while this step runs
    pub state: BootState,
    /// The work itself
    pub step: Step,
}

/// How a successful script ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOutcome {
    /// State of the step that ended the script
    pub state: BootState,
    /// Label of the candidate that ended it, if an expect did
    pub label: Option<String>,
}

/// An ordered sequence of steps.
#[derive(Debug, Clone, Default)]
pub struct BootScript {
    steps: Vec<ScriptStep>,
}

impl BootScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an expect step.
    pub fn expect(mut self, state: BootState, rule: ExpectRule) -> Self {
        self.steps.push(ScriptStep {
            state,
            step: Step::Expect(rule),
        });
        self
    }

    /// Append a send step.
    pub fn send(mut self, state: BootState, bytes: impl Into<Vec<u8>>, count: usize, delay: Duration) -> Self {
        self.steps.push(ScriptStep {
            state,
            step: Step::Send {
                bytes: bytes.into(),
                count,
                delay,
            },
        });
        self
    }

    /// Append a wait step.
    pub fn wait(mut self, state: BootState, duration: Duration) -> Self {
        self.steps.push(ScriptStep {
            state,
            step: Step::Wait(duration),
        });
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Run every step against `session`, in order.
    ///
    /// The script ends early when a matched candidate carries
    /// [`Verdict::Succeed`] or [`Verdict::Fail`]; otherwise it succeeds after
    /// the last step. The session is left open: closing it is the caller's
    /// job (see [`SessionLifecycle`](crate::SessionLifecycle)).
    ///
    /// # Errors
    ///
    /// Returns a [`BootError`] naming the state that stopped the script.
    pub async fn execute(&self, session: &mut Session) -> Result<BootOutcome, BootError> {
        let mut last_state = None;

        for ScriptStep { state, step } in &self.steps {
            let state = *state;
            if last_state != Some(state) {
                tracing::info!(%state, "entering state");
                last_state = Some(state);
            }

            match step {
                Step::Expect(rule) => {
                    let result = session
                        .expect(rule)
                        .await
                        .map_err(|e| BootError::from_expect(state, e))?;
                    tracing::info!(%state, label = %result.label, "matched");

                    match rule.candidates()[result.pattern_index].verdict {
                        Verdict::Continue => {}
                        Verdict::Succeed => {
                            return Ok(BootOutcome {
                                state,
                                label: Some(result.label),
                            })
                        }
                        Verdict::Fail => {
                            return Err(BootError::Failed {
                                state,
                                label: result.label,
                                matched: result.matched,
                            })
                        }
                    }
                }
                Step::Send { bytes, count, delay } => {
                    session
                        .send_repeated(bytes, *count, *delay)
                        .await
                        .map_err(|e| BootError::from_expect(state, e))?;
                }
                Step::Wait(duration) => {
                    session
                        .pause(*duration)
                        .await
                        .map_err(|e| BootError::from_expect(state, e))?;
                }
            }
        }

        Ok(BootOutcome {
            state: last_state.unwrap_or(BootState::AwaitOutcome),
            label: None,
        })
    }
}
