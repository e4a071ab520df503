//! The expect engine: wait for one of several patterns in console output

use crate::pattern::{ExpectRule, Matcher};
use crate::result::{ExpectError, MatchResult};
use crate::session::Session;
use tokio::time::Instant;

impl Session {
    /// Wait for any candidate of `rule` to appear in the console output.
    ///
    /// Candidates are checked in declaration order against everything
    /// received since the previous match, so output that arrived earlier
    /// (during a send, say) is not missed. On a match the buffer is consumed
    /// through the end of the match; bytes after it stay available to the
    /// next call.
    ///
    /// The wait ends on whichever comes first: a match, the rule's deadline,
    /// end of the console stream, or cancellation of the session token.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Timeout`] with the rule's labels and exact deadline
    /// - [`ExpectError::StreamClosed`] if the output ends first
    /// - [`ExpectError::Interrupted`] if the session token is cancelled
    /// - [`ExpectError::PatternError`] for an empty rule or empty literal
    pub async fn expect(&mut self, rule: &ExpectRule) -> Result<MatchResult, ExpectError> {
        let matchers = rule.matchers()?;
        let longest_literal = longest_literal(&matchers);
        let deadline = rule.deadline_duration().map(|d| Instant::now() + d);

        loop {
            self.drain_ready();
            if let Some(result) = self.take_match(rule, &matchers) {
                return Ok(result);
            }
            // Everything pending was just searched, so trimming is safe now.
            if let Some(longest) = longest_literal {
                self.buffer.retire_scanned(longest);
            }
            self.buffer.enforce_limit();
            if self.eof_reached {
                return Err(ExpectError::StreamClosed);
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!(labels = ?rule.labels(), "expect interrupted");
                    return Err(ExpectError::Interrupted);
                }
                chunk = self.output.recv() => match chunk {
                    Some(bytes) => self.buffer.append(&bytes),
                    None => self.eof_reached = true,
                },
                _ = sleep_until(deadline) => {
                    // Output that was already delivered still counts.
                    self.drain_ready();
                    if let Some(result) = self.take_match(rule, &matchers) {
                        return Ok(result);
                    }
                    return Err(ExpectError::Timeout {
                        labels: rule.labels(),
                        deadline: rule.deadline_duration().unwrap_or_default(),
                    });
                }
            }
        }
    }

    /// Move every chunk the reader has already delivered into the buffer,
    /// so all of it is visible to the next search at once.
    ///
    /// The buffer may briefly exceed its cap here, by at most what the
    /// bounded output channel was already holding.
    fn drain_ready(&mut self) {
        while let Ok(bytes) = self.output.try_recv() {
            self.buffer.append(&bytes);
        }
    }

    fn take_match(&mut self, rule: &ExpectRule, matchers: &[Box<dyn Matcher>]) -> Option<MatchResult> {
        let found = self.buffer.search(matchers)?;
        let label = rule.candidates()[found.index].label.clone();

        let result = MatchResult {
            matched: String::from_utf8_lossy(self.buffer.slice(found.start, found.end)).into_owned(),
            before: String::from_utf8_lossy(self.buffer.slice(self.buffer.base(), found.start)).into_owned(),
            label,
            pattern_index: found.index,
            start: found.start,
            end: found.end,
        };
        self.buffer.consume_through(found.end);

        tracing::debug!(label = %result.label, start = result.start, "pattern matched");
        Some(result)
    }
}

/// Length of the longest literal, or `None` if any candidate is unbounded.
fn longest_literal(matchers: &[Box<dyn Matcher>]) -> Option<usize> {
    matchers
        .iter()
        .map(|m| m.max_len())
        .try_fold(0, |acc, len| len.map(|l| acc.max(l)))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
