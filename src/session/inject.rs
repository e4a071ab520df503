//! Keystroke injection into the console input

use crate::result::ExpectError;
use crate::session::Session;
use std::io::Write;
use std::time::Duration;

/// Byte sequences the boot procedure types into the console.
pub mod keys {
    /// ANSI cursor-down (`ESC [ B`)
    pub const CURSOR_DOWN: &[u8] = b"\x1b[B";
    /// Enter, as the firmware console expects it
    pub const ENTER: &[u8] = b"\r\n";
    /// Bare newline; the SOL escape is only recognised at the start of a line
    pub const NEWLINE: &[u8] = b"\n";
    /// SOL escape character `@` followed by `.`: ends the console session
    pub const SOL_QUIT: &[u8] = b"@.";

    /// Short name for a payload, for progress logs.
    pub fn name(bytes: &[u8]) -> String {
        match bytes {
            CURSOR_DOWN => "down".to_string(),
            ENTER => "enter".to_string(),
            other => format!("{:?}", String::from_utf8_lossy(other)),
        }
    }
}

impl Session {
    /// Write `data` to the console input once, and flush.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SessionWriteFailed`] if the input side is
    /// closed or the write fails.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        let writer = self.input.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| ExpectError::SessionWriteFailed(std::io::Error::other(e)))?
        .map_err(ExpectError::SessionWriteFailed)
    }

    /// Send `data` `count` times, pausing `delay` after each send.
    ///
    /// The pause is measured from when the write completes, so a slow sink
    /// stretches the spacing but never shortens it.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::SessionWriteFailed`] if any write fails
    /// - [`ExpectError::Interrupted`] if the session token is cancelled
    ///   during a pause
    pub async fn send_repeated(&mut self, data: &[u8], count: usize, delay: Duration) -> Result<(), ExpectError> {
        for sent in 1..=count {
            self.send(data).await?;
            tracing::info!(key = %keys::name(data), sent, count, "sent");
            self.pause(delay).await?;
        }
        Ok(())
    }

    /// Sleep for `duration` unless the session is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Interrupted`] on cancellation.
    pub async fn pause(&self, duration: Duration) -> Result<(), ExpectError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExpectError::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
