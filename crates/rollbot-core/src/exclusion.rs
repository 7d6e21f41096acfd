//! Exclusion patterns: items whose message matches any pattern are never reported.
//!
//! The list lives in a plain text file (one pattern per line) that operators edit
//! while the bot runs; it is re-read at the start of every cycle.

use std::{io::ErrorKind, path::Path};

use regex::{Regex, RegexBuilder};
use tokio::fs;

use crate::{errors::Error, Result};

#[derive(Clone, Debug, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compile patterns, skipping blank lines and lines that are not valid expressions.
    pub fn from_patterns<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut patterns = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match compile_pattern(line) {
                Ok(re) => patterns.push(re),
                Err(e) => tracing::warn!(pattern = line, error = %e, "ignoring invalid exclusion pattern"),
            }
        }
        Self { patterns }
    }

    /// Read the pattern file, creating it empty when missing.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| Error::persistence(parent, e))?;
                }
                fs::write(path, "")
                    .await
                    .map_err(|e| Error::persistence(path, e))?;
                String::new()
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self::from_patterns(contents.lines()))
    }

    pub fn is_excluded(&self, message: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(message))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// `*` is a lazy "anything" wildcard; the rest of the line is a case-insensitive
/// regular expression in which `.` also matches newlines. Unanchored.
fn compile_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&pattern.replace('*', ".*?"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anywhere_case_insensitively() {
        let f = ExclusionFilter::from_patterns(["timeout on *"]);
        assert!(f.is_excluded("Timeout on rpc node 3"));
        assert!(f.is_excluded("worker: TIMEOUT ON \n multi-line"));
        assert!(!f.is_excluded("timed out on rpc node"));
    }

    #[test]
    fn dot_matches_newline() {
        let f = ExclusionFilter::from_patterns(["first*second"]);
        assert!(f.is_excluded("first line\nsecond line"));
    }

    #[test]
    fn blank_and_invalid_lines_are_skipped() {
        let f = ExclusionFilter::from_patterns(["", "   ", "unclosed (group", "ok"]);
        assert_eq!(f.len(), 1);
        assert!(!f.is_excluded("anything at all"));
        assert!(f.is_excluded("this is OK"));
    }

    #[test]
    fn empty_filter_excludes_nothing() {
        let f = ExclusionFilter::default();
        assert!(f.is_empty());
        assert!(!f.is_excluded("boom"));
    }

    #[tokio::test]
    async fn load_creates_missing_file_and_rereads_edits() {
        let dir = std::env::temp_dir().join(format!(
            "rollbot-exclusion-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let path = dir.join("rollbar_exclusion_filter.csv");

        let f = ExclusionFilter::load(&path).await.unwrap();
        assert!(f.is_empty());
        assert!(path.exists());

        std::fs::write(&path, "nonce too low*\nrate limit\n").unwrap();
        let f = ExclusionFilter::load(&path).await.unwrap();
        assert_eq!(f.len(), 2);
        assert!(f.is_excluded("Nonce too low: expected 4"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
