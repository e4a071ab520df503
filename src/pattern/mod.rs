//! Patterns and expect rules

mod matcher;

pub use matcher::{ExactMatcher, Match, Matcher, RegexMatcher};

use crate::result::PatternError;
use regex::bytes::Regex;
use std::time::Duration;

/// A pattern to watch for in console output.
///
/// # Examples
///
/// ```
/// use solboot::Pattern;
///
/// // Literal substring (fastest)
/// let banner = Pattern::exact("SOL Session operational");
///
/// // Regular expression over raw bytes
/// let countdown = Pattern::regex(r"automatically in \d+s").unwrap();
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal byte substring.
    Exact(Vec<u8>),

    /// Regular expression, evaluated over raw bytes.
    Regex(Regex),
}

impl Pattern {
    /// Create a literal pattern.
    pub fn exact(s: impl Into<Vec<u8>>) -> Self {
        Pattern::Exact(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns a regex error if the pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Convert pattern to a matcher implementation
    pub fn to_matcher(&self) -> Result<Box<dyn Matcher>, PatternError> {
        match self {
            Pattern::Exact(bytes) => Ok(Box::new(ExactMatcher::new(bytes.clone())?)),
            Pattern::Regex(re) => Ok(Box::new(RegexMatcher::new(re.clone()))),
        }
    }
}

/// What a boot script does once a candidate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// Move on to the next step.
    #[default]
    Continue,
    /// Stop the script; the boot succeeded.
    Succeed,
    /// Stop the script; the boot failed.
    Fail,
}

/// One labelled candidate in an [`ExpectRule`].
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Name reported in [`MatchResult::label`](crate::MatchResult::label)
    pub label: String,
    /// What to look for
    pub pattern: Pattern,
    /// How a script reacts when this candidate wins
    pub verdict: Verdict,
}

/// An ordered set of candidates raced against the console stream, plus a
/// deadline.
///
/// Candidates are checked in declaration order on every scan, so when several
/// are already present the one declared first wins, whatever their byte
/// offsets.
///
/// # Examples
///
/// ```
/// use solboot::{ExpectRule, Verdict};
/// use std::time::Duration;
///
/// let outcome = ExpectRule::new()
///     .candidate("shell", solboot::Pattern::exact("root-shell"), Verdict::Succeed)
///     .candidate("panic", solboot::Pattern::exact("UNHANDLED EXCEPTION"), Verdict::Fail);
/// assert_eq!(outcome.deadline_duration(), None);
///
/// let banner = ExpectRule::new()
///     .exact("banner", "Booting")
///     .deadline(Duration::from_secs(120));
/// assert_eq!(banner.labels(), vec!["banner".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExpectRule {
    candidates: Vec<Candidate>,
    deadline: Option<Duration>,
}

impl ExpectRule {
    /// Create an empty rule with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate with an explicit verdict.
    pub fn candidate(mut self, label: impl Into<String>, pattern: Pattern, verdict: Verdict) -> Self {
        self.candidates.push(Candidate {
            label: label.into(),
            pattern,
            verdict,
        });
        self
    }

    /// Append a literal candidate that lets the script continue.
    pub fn exact(self, label: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        self.candidate(label, Pattern::exact(text), Verdict::Continue)
    }

    /// Append a regex candidate that lets the script continue.
    ///
    /// # Errors
    ///
    /// Returns a regex error if the pattern is invalid.
    pub fn regex(self, label: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(self.candidate(label, Pattern::regex(pattern)?, Verdict::Continue))
    }

    /// Fail with a timeout if nothing matches within `deadline`.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Wait indefinitely.
    pub fn no_deadline(mut self) -> Self {
        self.deadline = None;
        self
    }

    /// The configured deadline, if any.
    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline
    }

    /// Candidates in declaration order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Candidate labels in declaration order.
    pub fn labels(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.label.clone()).collect()
    }

    /// Build matchers for every candidate, in declaration order.
    pub(crate) fn matchers(&self) -> Result<Vec<Box<dyn Matcher>>, PatternError> {
        if self.candidates.is_empty() {
            return Err(PatternError::EmptyRule);
        }
        self.candidates.iter().map(|c| c.pattern.to_matcher()).collect()
    }
}
