//! Console process handles and the output reader thread

use bytes::Bytes;
use portable_pty::{Child, ChildKiller, ExitStatus, MasterPty};
use std::io::{self, Read, Write};
use tokio::sync::mpsc;

/// Bytes requested from the PTY per read
const READ_CHUNK: usize = 4096;

/// Handle on the external console process.
///
/// Implemented for PTY-spawned children; tests and alternative transports
/// can supply their own.
pub trait ConsoleProcess: Send {
    /// Return the exit status if the process has exited, without blocking
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Forcefully terminate the process
    fn kill(&mut self) -> io::Result<()>;
}

/// A child spawned on a PTY. Holds the master side open for the child's
/// lifetime.
pub(crate) struct PtyProcess {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
}

impl PtyProcess {
    pub(crate) fn new(child: Box<dyn Child + Send + Sync>, master: Box<dyn MasterPty + Send>) -> Self {
        Self {
            child,
            _master: master,
        }
    }
}

impl ConsoleProcess for PtyProcess {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    fn kill(&mut self) -> io::Result<()> {
        ChildKiller::kill(&mut *self.child)
    }
}

/// Start the thread that copies console output into `tx`, echoing every
/// chunk to `echo` first.
///
/// The thread ends on EOF, on a read error (a PTY master reports EIO once the
/// child has exited), or when the session drops the receiving end.
pub(crate) fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    mut echo: Option<Box<dyn Write + Send>>,
    tx: mpsc::Sender<Bytes>,
) -> io::Result<()> {
    std::thread::Builder::new()
        .name("console-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "console read ended");
                        break;
                    }
                };

                let echo_failed = match echo.as_mut() {
                    Some(sink) => sink.write_all(&buf[..n]).and_then(|()| sink.flush()).is_err(),
                    None => false,
                };
                if echo_failed {
                    tracing::warn!("console echo sink failed, echo disabled");
                    echo = None;
                }

                if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            tracing::debug!("console reader finished");
        })?;
    Ok(())
}
