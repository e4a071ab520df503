//! Session builder and console command configuration

use crate::buffer::StreamBuffer;
use crate::result::ExpectError;
use crate::session::spawn::{spawn_reader, PtyProcess};
use crate::session::{Session, SessionParts};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Default cap on unconsumed console bytes
const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Default time allowed for the console process to exit after the quit
/// sequence
const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 30;

/// Chunks queued between the reader thread and the session
const OUTPUT_CHANNEL_DEPTH: usize = 256;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// The external console process and everything it is started with.
///
/// The environment is enumerated, not inherited implicitly: the spawn starts
/// from an empty environment and applies exactly the pairs held here.
/// [`inherit_env`](ConsoleCommand::inherit_env) snapshots the caller's
/// environment, which is how connection and credential settings reach the
/// console helper.
///
/// # Examples
///
/// ```
/// use solboot::ConsoleCommand;
///
/// let command = ConsoleCommand::new("./scripts/ipmi_helper.sh")
///     .arg("console")
///     .inherit_env()
///     .env("IPMI_INTERFACE", "lanplus");
/// assert_eq!(command.args().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleCommand {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    cwd: Option<PathBuf>,
}

impl ConsoleCommand {
    /// Command running `program` with no arguments and an empty environment.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Build from an argv list; the first element is the program.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SpawnError`] when `argv` is empty.
    pub fn from_argv<S: AsRef<OsStr>>(argv: &[S]) -> Result<Self, ExpectError> {
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| ExpectError::SpawnError("Empty command".to_string()))?;
        Ok(rest
            .iter()
            .fold(Self::new(program.as_ref()), |cmd, arg| cmd.arg(arg.as_ref())))
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set one environment variable.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Copy every variable of the current process into this command.
    pub fn inherit_env(mut self) -> Self {
        self.env.extend(std::env::vars_os());
        self
    }

    /// Run the process in `dir` instead of the caller's working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The program to run.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments after the program.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Environment pairs, in application order.
    pub fn envs(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    fn to_command_builder(&self) -> io::Result<CommandBuilder> {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        cmd.env_clear();
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        let cwd = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        cmd.cwd(cwd.as_os_str());
        Ok(cmd)
    }
}

/// Where raw console output is echoed while it is being scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EchoTarget {
    /// Standard output.
    #[default]
    Stdout,
    /// A file, truncated on open.
    File(PathBuf),
    /// No echo.
    Off,
}

impl EchoTarget {
    fn open(&self) -> io::Result<Option<Box<dyn Write + Send>>> {
        Ok(match self {
            EchoTarget::Stdout => Some(Box::new(io::stdout())),
            EchoTarget::File(path) => Some(Box::new(File::create(path)?)),
            EchoTarget::Off => None,
        })
    }
}

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Max buffer size: 64 KiB of unconsumed output
/// - Exit timeout: 30 seconds
/// - Echo: stdout
/// - PTY size: 24 rows × 80 columns
/// - Cancellation: a fresh token nobody else holds
///
/// # Examples
///
/// ```no_run
/// use solboot::{ConsoleCommand, Session};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cancel = CancellationToken::new();
/// let session = Session::builder()
///     .exit_timeout(Duration::from_secs(10))
///     .cancel_token(cancel.clone())
///     .spawn(&ConsoleCommand::new("ipmitool").arg("sol").arg("activate").inherit_env())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    max_buffer_size: usize,
    exit_timeout: Duration,
    pty_size: PtySize,
    echo: EchoTarget,
    cancel: CancellationToken,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            exit_timeout: Duration::from_secs(DEFAULT_EXIT_TIMEOUT_SECS),
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            echo: EchoTarget::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Cap the number of unconsumed bytes held for matching.
    ///
    /// When exceeded, the oldest third is dropped. Regex candidates can only
    /// match inside what remains.
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// How long teardown waits for the process to exit before killing it.
    pub fn exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Choose where console output is echoed.
    pub fn echo(mut self, target: EchoTarget) -> Self {
        self.echo = target;
        self
    }

    /// Token whose cancellation interrupts any pending wait.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Spawn the console command on a fresh PTY.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    /// - The echo target cannot be opened
    pub fn spawn(self, command: &ConsoleCommand) -> Result<Session, ExpectError> {
        let pty_system = native_pty_system();
        let pty_pair = pty_system
            .openpty(self.pty_size)
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let cmd = command.to_command_builder()?;
        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ExpectError::SpawnError(e.to_string()))?;
        // Only the child may hold the slave, or the master never sees EOF.
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;
        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_DEPTH);
        spawn_reader(reader, self.echo.open()?, tx)?;

        tracing::info!(
            program = ?command.program(),
            pid = ?child.process_id(),
            "console process started"
        );

        Ok(self.build(SessionParts {
            output: rx,
            input: writer,
            process: Box::new(PtyProcess::new(child, pty_pair.master)),
        }))
    }

    /// Assemble a session over an already running console.
    ///
    /// The echo target is not applied here; whoever feeds `parts.output` is
    /// responsible for echoing.
    pub fn build(self, parts: SessionParts) -> Session {
        Session {
            output: parts.output,
            input: Arc::new(Mutex::new(parts.input)),
            process: Some(parts.process),
            buffer: StreamBuffer::new(self.max_buffer_size),
            cancel: self.cancel,
            eof_reached: false,
            exit_timeout: self.exit_timeout,
            torn_down: false,
        }
    }
}
