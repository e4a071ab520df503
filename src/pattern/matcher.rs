//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Span of a match within the searched slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
}

/// Trait for pattern matching over raw console bytes
pub trait Matcher: Send + Sync {
    /// Find the leftmost match in the buffer
    fn find(&self, buffer: &[u8]) -> Option<Match>;

    /// Longest possible match, if bounded.
    ///
    /// Literals know their length, so a scan that found nothing only needs to
    /// keep `max_len - 1` trailing bytes for the next attempt.
    fn max_len(&self) -> Option<usize> {
        None
    }
}

/// Literal matcher using Boyer-Moore-Horspool
pub struct ExactMatcher {
    needle: Vec<u8>,
    skip: [usize; 256],
}

impl ExactMatcher {
    /// Create a new literal matcher
    pub fn new(needle: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let last = needle.len() - 1;
        let mut skip = [needle.len(); 256];
        for (i, &byte) in needle[..last].iter().enumerate() {
            skip[byte as usize] = last - i;
        }

        Ok(Self { needle, skip })
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let n = self.needle.len();
        let mut pos = 0;
        while pos + n <= buffer.len() {
            if buffer[pos..pos + n] == self.needle[..] {
                return Some(Match {
                    start: pos,
                    end: pos + n,
                });
            }
            pos += self.skip[buffer[pos + n - 1] as usize];
        }
        None
    }

    fn max_len(&self) -> Option<usize> {
        Some(self.needle.len())
    }
}

/// Regex matcher over bytes, so invalid UTF-8 on the wire does not hide a match
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Wrap an already compiled regex
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        self.regex.find(buffer).map(|m| Match {
            start: m.start(),
            end: m.end(),
        })
    }
}
