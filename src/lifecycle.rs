//! Run a boot script from spawn to teardown

use crate::result::ExpectError;
use crate::script::{BootError, BootOutcome, BootScript};
use crate::session::{ConsoleCommand, Session, SessionBuilder};
use portable_pty::ExitStatus;
use tokio_util::sync::CancellationToken;

/// Process exit code for a boot that hit the failure marker
pub const EXIT_BOOT_FAILED: i32 = 2;
/// Process exit code for a boot that timed out
pub const EXIT_BOOT_TIMEOUT: i32 = 3;
/// Process exit code for an interrupted run
pub const EXIT_INTERRUPTED: i32 = 130;
/// Process exit code for any other failure
pub const EXIT_ERROR: i32 = 1;

/// What a run produced.
#[derive(Debug)]
pub struct BootReport {
    /// How the script ended
    pub outcome: Result<BootOutcome, BootError>,
    /// Exit status of the console process, if teardown reaped it
    pub exit_status: Option<ExitStatus>,
    /// Why teardown could not reap the process, if it could not
    pub teardown_error: Option<ExpectError>,
}

impl BootReport {
    /// Whether the script reached a successful outcome.
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Exit code for the whole program.
    ///
    /// Success passes the console process's own exit code through. Failures
    /// map to distinct codes, so a failed boot and a timed-out boot can be
    /// told apart without reading the log.
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            Ok(_) => match &self.exit_status {
                Some(status) => status.exit_code() as i32,
                None => EXIT_ERROR,
            },
            Err(BootError::Failed { .. }) => EXIT_BOOT_FAILED,
            Err(BootError::Timeout { .. }) => EXIT_BOOT_TIMEOUT,
            Err(BootError::Interrupted { .. }) => EXIT_INTERRUPTED,
            Err(BootError::Session { .. }) => EXIT_ERROR,
        }
    }
}

/// Owns a console session end to end.
///
/// [`run`](SessionLifecycle::run) spawns the console, executes the script,
/// and then tears the session down exactly once, whether the script
/// succeeded, failed, timed out, or was interrupted through the
/// cancellation token.
///
/// # Examples
///
/// ```no_run
/// use solboot::{BootScript, ConsoleCommand, SessionLifecycle};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cancel = CancellationToken::new();
/// let lifecycle = SessionLifecycle::new(
///     ConsoleCommand::new("./scripts/ipmi_helper.sh").arg("console").inherit_env(),
/// )
/// .cancel_token(cancel.clone());
///
/// let report = lifecycle.run(&BootScript::nautilus()).await?;
/// std::process::exit(report.exit_code());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    command: ConsoleCommand,
    builder: SessionBuilder,
    cancel: CancellationToken,
}

impl SessionLifecycle {
    /// Lifecycle for `command` with default session settings.
    pub fn new(command: ConsoleCommand) -> Self {
        Self {
            command,
            builder: SessionBuilder::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `builder` for session settings. Its cancellation token is
    /// replaced by this lifecycle's.
    pub fn session_builder(mut self, builder: SessionBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Token that interrupts the run when cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Spawn the console and run `script` to completion.
    ///
    /// # Errors
    ///
    /// Only setup failures (PTY, spawn, echo target) are returned as `Err`;
    /// once the process is running every outcome is in the [`BootReport`].
    pub async fn run(&self, script: &BootScript) -> Result<BootReport, ExpectError> {
        let session = self
            .builder
            .clone()
            .cancel_token(self.cancel.clone())
            .spawn(&self.command)?;
        Ok(run_session(session, script).await)
    }
}

/// Run `script` on an already open session, then tear it down.
///
/// The session is consumed: nothing else can touch the console after its
/// quit sequence has been sent.
pub async fn run_session(mut session: Session, script: &BootScript) -> BootReport {
    let outcome = script.execute(&mut session).await;
    match &outcome {
        Ok(done) => tracing::info!(state = %done.state, "boot script finished"),
        Err(e @ BootError::Interrupted { .. }) => tracing::warn!("{e}"),
        Err(e) => tracing::error!("{e}"),
    }

    let (exit_status, teardown_error) = match session.teardown().await {
        Ok(status) => (status, None),
        Err(e) => {
            tracing::warn!(error = %e, "teardown did not complete");
            (None, Some(e))
        }
    };

    BootReport {
        outcome,
        exit_status,
        teardown_error,
    }
}
