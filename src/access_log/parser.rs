//! nginx access log line parsing
//!
//! Lines are matched against the fluentd nginx pattern, every named group
//! becomes an [`Observation`] attribute. Groups that did not take part in the
//! match (e.g. a missing forwarded-for column) are kept as empty strings.

use regex::Regex;

use crate::errors::AppResult;
use crate::presence::{FIELD_PATH, Observation};

/// nginx access log entry, based on <https://docs.fluentd.org/parser/nginx>
pub const NGINX_LOG_PATTERN: &str = r#"(?P<remote>[^ ]*) (?P<host>[^ ]*) (?P<user>[^ ]*) \[(?P<time>[^\]]*)\] "(?P<method>\S+)(?: +(?P<path>[^"]*?)(?: +\S*)?)?" (?P<code>[^ ]*) (?P<size>[^ ]*)(?: "(?P<referer>[^"]*)" "(?P<agent>[^"]*)"(?:\s+(?P<http_x_forwarded_for>[^ ]+))?)?"#;

/// Outcome of classifying one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Well-formed request for a path that indicates a viewer
    Viewer(Observation),
    /// Well-formed request for any other path
    Filtered(Observation),
    /// Not an nginx access log line
    Malformed,
}

#[derive(Debug, Clone)]
pub struct AccessLogParser {
    line_regex: Regex,
    path_regex: Regex,
}

impl AccessLogParser {
    /// Create a parser counting requests whose path matches `path_pattern`
    pub fn new(path_pattern: &str) -> AppResult<Self> {
        Ok(Self {
            line_regex: Regex::new(NGINX_LOG_PATTERN)?,
            path_regex: Regex::new(path_pattern)?,
        })
    }

    /// Split a log line into its named fields
    pub fn parse_line(&self, line: &str) -> Option<Observation> {
        let captures = self.line_regex.captures(line)?;

        Some(
            self.line_regex
                .capture_names()
                .flatten()
                .map(|name| {
                    let value = captures.name(name).map_or("", |m| m.as_str());
                    (name, value)
                })
                .collect(),
        )
    }

    pub fn is_viewer_path(&self, path: &str) -> bool {
        self.path_regex.is_match(path)
    }

    pub fn classify(&self, line: &str) -> ParsedLine {
        match self.parse_line(line) {
            Some(observation) if self.is_viewer_path(observation.field(FIELD_PATH)) => {
                ParsedLine::Viewer(observation)
            }
            Some(observation) => ParsedLine::Filtered(observation),
            None => ParsedLine::Malformed,
        }
    }
}
