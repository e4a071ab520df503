//! Error types for the expect engine

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a console session.
///
/// Every fallible [`Session`](crate::Session) operation returns
/// `Result<T, ExpectError>`. The boot script maps these onto
/// [`BootError`](crate::BootError) with the state that was active.
///
/// # Examples
///
/// ```no_run
/// use solboot::{ExpectError, ExpectRule, Session};
/// use std::time::Duration;
///
/// # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
/// let rule = ExpectRule::new()
///     .exact("ready", "SOL Session operational")
///     .deadline(Duration::from_secs(15));
///
/// match session.expect(&rule).await {
///     Ok(result) => println!("Matched: {}", result.label),
///     Err(ExpectError::Timeout { labels, deadline }) => {
///         eprintln!("none of {:?} within {:?}", labels, deadline);
///     }
///     Err(ExpectError::StreamClosed) => eprintln!("console went away"),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// No candidate pattern matched before the rule's deadline.
    #[error("Timeout waiting for {labels:?} (after {deadline:?})")]
    Timeout {
        /// Labels of the candidates that were being waited for
        labels: Vec<String>,
        /// The rule's deadline, as configured
        deadline: Duration,
    },

    /// The console output closed before any candidate matched.
    #[error("Console output closed before pattern matched")]
    StreamClosed,

    /// Writing to the console input failed.
    #[error("Failed to write to console: {0}")]
    SessionWriteFailed(#[source] std::io::Error),

    /// The session was cancelled while waiting.
    #[error("Interrupted")]
    Interrupted,

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    PatternError(#[from] PatternError),

    /// I/O error outside of the console write path.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// PTY creation or manipulation failed.
    #[error("PTY error: {0}")]
    PtyError(String),

    /// The console process could not be started.
    #[error("Failed to spawn console process: {0}")]
    SpawnError(String),

    /// The console process did not exit after the quit sequence.
    #[error("Console process still running {waited:?} after quit sequence")]
    ExitTimeout {
        /// How long teardown waited before giving up
        waited: Duration,
    },

    /// The process handle was already reaped.
    #[error("Console process has already been reaped")]
    ProcessExited,
}

/// Errors related to pattern construction.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty literal pattern.
    #[error("Pattern cannot be empty")]
    EmptyPattern,

    /// A rule was built with no candidates.
    #[error("Rule has no candidate patterns")]
    EmptyRule,
}
