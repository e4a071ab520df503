//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

/// Result of a successful expect.
///
/// Produced once per [`Session::expect`](crate::Session::expect) call. Offsets
/// are absolute positions in the console stream since the session started,
/// so they stay meaningful after the buffer has released older bytes.
///
/// # Examples
///
/// ```no_run
/// use solboot::{ExpectRule, Session};
///
/// # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
/// let rule = ExpectRule::new()
///     .exact("shell", "root-shell")
///     .exact("panic", "UNHANDLED EXCEPTION");
///
/// let result = session.expect(&rule).await?;
/// println!("{} at {}..{}", result.label, result.start, result.end);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Label of the candidate that matched.
    pub label: String,

    /// Index of the candidate in the rule (0-based, declaration order).
    pub pattern_index: usize,

    /// The matched text (lossy UTF-8).
    pub matched: String,

    /// Stream offset of the first matched byte.
    pub start: u64,

    /// Stream offset one past the last matched byte.
    pub end: u64,

    /// Retained text between the previous consume point and the match.
    ///
    /// Bytes that were retired while scanning for literals or compacted away
    /// are not included.
    pub before: String,
}
