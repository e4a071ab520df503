//! solboot: unattended boot-menu navigation over a Serial-over-LAN console
//!
//! solboot opens a console session to a machine's management controller,
//! waits for boot milestones to scroll past, types the keystrokes that pick a
//! bootloader entry, and closes the session cleanly however the run ends.
//!
//! # Features
//!
//! - **Expect engine**: race literal or regex candidates against live output,
//!   with per-step deadlines and declaration-order priority
//! - **Bounded buffering**: consumed and scanned-past output is released
//! - **Paced input**: repeated keystrokes with a fixed pause, for firmware
//!   that drops fast input
//! - **Interruptible**: a cancellation token cuts short any wait and goes
//!   straight to teardown
//! - **Exactly-once teardown**: quit sequence, bounded wait for exit, kill as
//!   a last resort
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use solboot::{BootScript, ConsoleCommand, SessionLifecycle};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cancel = CancellationToken::new();
//!     let watcher = cancel.clone();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         watcher.cancel();
//!     });
//!
//!     let command = ConsoleCommand::new("./scripts/ipmi_helper.sh")
//!         .arg("console")
//!         .inherit_env();
//!     let report = SessionLifecycle::new(command)
//!         .cancel_token(cancel)
//!         .run(&BootScript::nautilus())
//!         .await?;
//!
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! # Custom scripts
//!
//! ```rust,no_run
//! use solboot::{keys, BootScript, BootState, ExpectRule, Pattern, Verdict};
//! use std::time::Duration;
//!
//! let script = BootScript::new()
//!     .expect(
//!         BootState::AwaitMenuBanner,
//!         ExpectRule::new()
//!             .regex("menu", r"GNU GRUB\s+version")
//!             .unwrap()
//!             .deadline(Duration::from_secs(60)),
//!     )
//!     .send(BootState::ConfirmSelection, keys::ENTER, 1, Duration::from_secs(1))
//!     .expect(
//!         BootState::AwaitOutcome,
//!         ExpectRule::new()
//!             .candidate("login", Pattern::exact("login:"), Verdict::Succeed)
//!             .candidate("panic", Pattern::exact("Kernel panic"), Verdict::Fail),
//!     );
//! ```

#![warn(missing_docs)]

mod buffer;
mod lifecycle;
mod pattern;
mod result;
mod script;
mod session;

// Public API exports
pub use buffer::{Found, StreamBuffer};
pub use lifecycle::{
    run_session, BootReport, SessionLifecycle, EXIT_BOOT_FAILED, EXIT_BOOT_TIMEOUT, EXIT_ERROR,
    EXIT_INTERRUPTED,
};
pub use pattern::{Candidate, ExactMatcher, ExpectRule, Match, Matcher, Pattern, RegexMatcher, Verdict};
pub use result::{ExpectError, MatchResult, PatternError};
pub use script::{
    BootError, BootOutcome, BootScript, BootState, ScriptStep, Step, CONFIRM_PRESSES, KEY_INTERVAL,
    MENU_DOWN_PRESSES, MENU_READY_DEADLINE, SESSION_READY_DEADLINE, STAGE_DEADLINE,
};
pub use session::{keys, ConsoleCommand, ConsoleProcess, EchoTarget, Session, SessionBuilder, SessionParts};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
pub use tokio_util::sync::CancellationToken;
