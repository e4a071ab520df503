//! A scripted stand-in for the SOL console helper.
//!
//! Output is pushed by the test through a channel; input is recorded with the
//! (paused) tokio clock; the "process" exits once it has been sent the quit
//! escape, unless told to hang.

#![allow(dead_code)]

use bytes::Bytes;
use solboot::{keys, ConsoleProcess, ExitStatus, Session, SessionBuilder, SessionParts};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Knobs for the fake console.
#[derive(Debug, Clone, Copy)]
pub struct FakeOptions {
    /// Exit when `@.` arrives
    pub exit_on_quit: bool,
    /// Real time each write takes
    pub write_latency: Option<Duration>,
    /// Every write fails with a broken pipe
    pub broken_input: bool,
    /// Writes block until the process is killed, then fail
    pub stalled_input: bool,
    /// Polling the process for exit fails
    pub broken_wait: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            exit_on_quit: true,
            write_latency: None,
            broken_input: false,
            stalled_input: false,
            broken_wait: false,
        }
    }
}

#[derive(Default)]
struct Shared {
    writes: Mutex<Vec<(Instant, Vec<u8>)>>,
    exited: AtomicBool,
    killed: AtomicBool,
    reaped: AtomicBool,
}

/// Test-side handle on the fake console.
pub struct FakeConsole {
    output: Option<mpsc::Sender<Bytes>>,
    shared: Arc<Shared>,
}

impl FakeConsole {
    /// Push console output immediately.
    pub async fn emit(&self, text: &str) {
        if let Some(tx) = &self.output {
            tx.send(Bytes::copy_from_slice(text.as_bytes()))
                .await
                .expect("session dropped its output receiver");
        }
    }

    /// Push each line at its offset from now, in the background.
    pub fn emit_at(&self, schedule: &[(u64, &'static str)]) {
        let tx = self.output.clone().expect("output already closed");
        let start = Instant::now();
        let schedule = schedule.to_vec();
        tokio::spawn(async move {
            for (secs, text) in schedule {
                tokio::time::sleep_until(start + Duration::from_secs(secs)).await;
                if tx.send(Bytes::from_static(text.as_bytes())).await.is_err() {
                    return;
                }
            }
        });
    }

    /// End the output stream, as if the helper had closed its end.
    pub fn close_output(&mut self) {
        self.output = None;
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.timed_writes().into_iter().map(|(_, w)| w).collect()
    }

    /// Every write with the time it landed.
    pub fn timed_writes(&self) -> Vec<(Instant, Vec<u8>)> {
        self.shared.writes.lock().unwrap().clone()
    }

    /// How many writes carried exactly `payload`.
    pub fn count(&self, payload: &[u8]) -> usize {
        self.writes().iter().filter(|w| w.as_slice() == payload).count()
    }

    /// How many times the quit escape was sent.
    pub fn quit_count(&self) -> usize {
        self.count(keys::SOL_QUIT)
    }

    /// Whether the fake process has exited.
    pub fn exited(&self) -> bool {
        self.shared.exited.load(Ordering::SeqCst)
    }

    /// Whether the fake process was killed.
    pub fn killed(&self) -> bool {
        self.shared.killed.load(Ordering::SeqCst)
    }

    /// Whether an exit status was collected after the process exited.
    pub fn reaped(&self) -> bool {
        self.shared.reaped.load(Ordering::SeqCst)
    }
}

struct FakeInput {
    shared: Arc<Shared>,
    options: FakeOptions,
}

impl Write for FakeInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.options.broken_input {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "console input closed"));
        }
        if self.options.stalled_input {
            // Real time: a blocking task holds the paused clock still.
            while !self.shared.killed.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "console killed"));
        }
        if let Some(latency) = self.options.write_latency {
            std::thread::sleep(latency);
        }
        self.shared
            .writes
            .lock()
            .unwrap()
            .push((Instant::now(), buf.to_vec()));
        if self.options.exit_on_quit && buf == keys::SOL_QUIT {
            self.shared.exited.store(true, Ordering::SeqCst);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeProcess {
    shared: Arc<Shared>,
    options: FakeOptions,
}

impl ConsoleProcess for FakeProcess {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.options.broken_wait {
            return Err(io::Error::other("waitpid failed"));
        }
        if !self.shared.exited.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.shared.reaped.store(true, Ordering::SeqCst);
        Ok(Some(ExitStatus::with_exit_code(0)))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.shared.killed.store(true, Ordering::SeqCst);
        self.shared.exited.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A session over a fake console with default options.
pub fn fake_session(builder: SessionBuilder) -> (Session, FakeConsole) {
    fake_session_with(builder, FakeOptions::default())
}

/// A session over a fake console.
pub fn fake_session_with(builder: SessionBuilder, options: FakeOptions) -> (Session, FakeConsole) {
    let shared = Arc::new(Shared::default());
    let (tx, rx) = mpsc::channel(64);

    let session = builder.build(SessionParts {
        output: rx,
        input: Box::new(FakeInput {
            shared: shared.clone(),
            options,
        }),
        process: Box::new(FakeProcess {
            shared: shared.clone(),
            options,
        }),
    });

    (
        session,
        FakeConsole {
            output: Some(tx),
            shared,
        },
    )
}
