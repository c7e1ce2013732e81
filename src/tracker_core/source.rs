//! Snapshot source contract
//!
//! A source hands out the currently visible window of the feed as raw tokens. How the
//! window is obtained (file, HTTP endpoint, page scrape) is the implementor's business;
//! the coordinator only acquires, reads, and releases.

use async_trait::async_trait;

#[derive(Debug)]
pub enum SourceError {
    /// Source cannot be reached or created right now
    Unavailable(String),
    /// Source did not answer within the read deadline
    ReadTimeout,
    /// Source answered with something that is not a window
    Malformed(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            SourceError::ReadTimeout => write!(f, "Source read timed out"),
            SourceError::Malformed(msg) => write!(f, "Malformed snapshot: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait SnapshotSource: Send {
    /// Live connection to the feed, dropped on release
    type Handle: Send;

    async fn acquire(&mut self) -> Result<Self::Handle, SourceError>;

    /// Raw tokens of the visible window, oldest first
    async fn snapshot(&mut self, handle: &mut Self::Handle) -> Result<Vec<String>, SourceError>;

    async fn release(&mut self, handle: Self::Handle);

    /// Get source type for logging
    fn source_type(&self) -> &'static str;
}

/// Split one recorded window into raw tokens.
///
/// Tokens are separated by commas and/or whitespace: `"CT, T BONUS"` → `["CT", "T", "BONUS"]`.
pub fn parse_window_line(line: &str) -> Vec<String> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_line() {
        assert_eq!(parse_window_line("CT, T BONUS"), vec!["CT", "T", "BONUS"]);
        assert_eq!(parse_window_line("coin-ct,coin-t,,spinner"), vec!["coin-ct", "coin-t", "spinner"]);
        assert!(parse_window_line("  \t ").is_empty());
    }
}
