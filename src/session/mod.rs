//! Console session: the process, its input and output, and teardown

mod builder;
mod expect;
mod inject;
mod spawn;

pub use builder::{ConsoleCommand, EchoTarget, SessionBuilder};
pub use inject::keys;
pub use spawn::ConsoleProcess;

use crate::buffer::StreamBuffer;
use crate::result::ExpectError;
use bytes::Bytes;
use portable_pty::ExitStatus;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often teardown polls the process for exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls after a kill before giving up on reaping
const REAP_ATTEMPTS: usize = 10;

/// The raw pieces a [`Session`] drives.
pub struct SessionParts {
    /// Console output, chunk by chunk, in arrival order. Closing the sender
    /// signals end of stream.
    pub output: mpsc::Receiver<Bytes>,
    /// Console input.
    pub input: Box<dyn Write + Send>,
    /// The process behind both.
    pub process: Box<dyn ConsoleProcess>,
}

/// A running console session.
///
/// A `Session` owns the console process exclusively. Output is pulled by
/// [`expect`](Session::expect), input is written by
/// [`send`](Session::send) and [`send_repeated`](Session::send_repeated), and
/// [`teardown`](Session::teardown) sends the quit sequence and reaps the
/// process, once.
///
/// # Examples
///
/// ```no_run
/// use solboot::{keys, ConsoleCommand, ExpectRule, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder()
///     .spawn(&ConsoleCommand::new("./scripts/ipmi_helper.sh").arg("console").inherit_env())?;
///
/// session
///     .expect(&ExpectRule::new().exact("ready", "SOL Session operational").deadline(Duration::from_secs(15)))
///     .await?;
/// session.send(keys::ENTER).await?;
/// let status = session.teardown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    output: mpsc::Receiver<Bytes>,
    input: Arc<Mutex<Box<dyn Write + Send>>>,
    process: Option<Box<dyn ConsoleProcess>>,
    buffer: StreamBuffer,
    cancel: CancellationToken,
    eof_reached: bool,
    exit_timeout: Duration,
    torn_down: bool,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Token that interrupts this session's waits when cancelled.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether teardown has already run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Check if the console process is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::ProcessExited`] once teardown has reaped the
    /// process.
    pub fn is_alive(&mut self) -> Result<bool, ExpectError> {
        match &mut self.process {
            Some(process) => Ok(process.try_wait()?.is_none()),
            None => Err(ExpectError::ProcessExited),
        }
    }

    /// Close the console session.
    ///
    /// Sends a newline and the SOL quit escape, then waits for the process
    /// to exit. The configured exit timeout bounds the whole sequence,
    /// writes included: a console that stops reading its input cannot stall
    /// teardown. On expiry the process is killed and
    /// [`ExpectError::ExitTimeout`] is returned.
    ///
    /// Runs at most once: later calls return `Ok(None)` without touching the
    /// console. Not interruptible, since it is what interruption leads to.
    pub async fn teardown(&mut self) -> Result<Option<ExitStatus>, ExpectError> {
        if self.torn_down {
            return Ok(None);
        }
        self.torn_down = true;
        let deadline = Instant::now() + self.exit_timeout;

        let quit = async {
            for chunk in [keys::NEWLINE, keys::SOL_QUIT] {
                self.send(chunk).await?;
            }
            Ok::<(), ExpectError>(())
        };
        match tokio::time::timeout_at(deadline, quit).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "could not send quit sequence"),
            Err(_) => tracing::warn!("console input stalled, quit sequence not delivered"),
        }
        tracing::info!("quit");

        let mut process = self.process.take().ok_or(ExpectError::ProcessExited)?;
        loop {
            match process.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(code = status.exit_code(), "console process exited");
                    return Ok(Some(status));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "could not poll console process");
                    kill_and_reap(process.as_mut()).await;
                    return Err(e.into());
                }
            }
            if Instant::now() >= deadline {
                kill_and_reap(process.as_mut()).await;
                return Err(ExpectError::ExitTimeout {
                    waited: self.exit_timeout,
                });
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

/// Kill the process and give it a moment to be reaped.
async fn kill_and_reap(process: &mut dyn ConsoleProcess) {
    if let Err(e) = process.kill() {
        tracing::warn!(error = %e, "could not kill console process");
        return;
    }
    for _ in 0..REAP_ATTEMPTS {
        match process.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(code = status.exit_code(), "killed console process reaped");
                return;
            }
            Ok(None) => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
            Err(_) => return,
        }
    }
    tracing::warn!("killed console process not reaped");
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            tracing::warn!("session dropped without teardown, killing console process");
            let _ = process.kill();
        }
    }
}
