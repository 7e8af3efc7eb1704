//! Feeds access log lines into the presence tracker

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::parser::{AccessLogParser, ParsedLine};
use crate::presence::{FIELD_PATH, PresenceTracker};

/// Longest access log line kept in memory
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Line counters for one tailing run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TailStats {
    pub lines: u64,
    pub viewers: u64,
    pub filtered: u64,
    pub malformed: u64,
}

/// Reads an nginx access log stream and reports viewer requests to a tracker.
///
/// The current time is used instead of the log's timestamp, so this is only
/// meant for following a live log.
pub struct LogTailer {
    parser: AccessLogParser,
    max_line_length: usize,
}

enum ReadLine {
    Complete,
    /// The line exceeded the length limit; its bytes were discarded
    TooLong,
    Eof,
}

impl LogTailer {
    pub fn new(parser: AccessLogParser) -> Self {
        Self::with_max_line_length(parser, MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(parser: AccessLogParser, max_line_length: usize) -> Self {
        Self {
            parser,
            max_line_length,
        }
    }

    /// Consume `reader` until end of input, a read error, or cancellation.
    ///
    /// Lines that are not access log entries, or whose path does not indicate
    /// a viewer, are skipped. Lines longer than the length limit are counted as
    /// malformed. Invalid UTF-8 is replaced rather than rejected.
    pub async fn run<R>(
        &self,
        mut reader: R,
        tracker: &PresenceTracker,
        cancellation_token: CancellationToken,
    ) -> TailStats
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = TailStats::default();
        let mut buf = Vec::new();

        loop {
            let next = tokio::select! {
                read = read_line(&mut reader, &mut buf, self.max_line_length) => read,
                _ = cancellation_token.cancelled() => {
                    info!("Log tailer received cancellation signal, shutting down");
                    break;
                }
            };

            match next {
                Ok(ReadLine::Complete) => {
                    let line = String::from_utf8_lossy(&buf);
                    self.process_line(line.trim_end_matches('\r'), tracker, &mut stats);
                }
                Ok(ReadLine::TooLong) => {
                    stats.lines += 1;
                    stats.malformed += 1;
                    warn!(
                        max_line_length = self.max_line_length,
                        "Skipping access log line over the length limit"
                    );
                }
                Ok(ReadLine::Eof) => {
                    info!("Access log input closed");
                    break;
                }
                Err(e) => {
                    error!("Access log read failed: {}", e);
                    break;
                }
            }
        }

        debug!(
            lines = stats.lines,
            viewers = stats.viewers,
            filtered = stats.filtered,
            malformed = stats.malformed,
            "Log tailer finished"
        );
        stats
    }

    fn process_line(&self, line: &str, tracker: &PresenceTracker, stats: &mut TailStats) {
        stats.lines += 1;

        match self.parser.classify(line) {
            ParsedLine::Viewer(observation) => {
                stats.viewers += 1;
                info!(fields = ?observation, "nginx log matches");
                tracker.observe(&observation);
            }
            ParsedLine::Filtered(observation) => {
                stats.filtered += 1;
                debug!(path = observation.field(FIELD_PATH), "Skipping non-viewer request");
            }
            ParsedLine::Malformed => {
                stats.malformed += 1;
                debug!(line, "Skipping malformed log line");
            }
        }
    }
}

/// Read one `\n` terminated line into `buf` without keeping more than `max`
/// bytes of it. A final line without terminator still counts.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<ReadLine>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut too_long = false;
    let mut seen_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (seen_any, too_long) {
                (false, _) => ReadLine::Eof,
                (true, true) => ReadLine::TooLong,
                (true, false) => ReadLine::Complete,
            });
        }
        seen_any = true;

        let (chunk_len, used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(newline) => (newline, newline + 1, true),
            None => (available.len(), available.len(), false),
        };
        if !too_long {
            if buf.len() + chunk_len > max {
                too_long = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..chunk_len]);
            }
        }
        reader.consume(used);

        if done {
            return Ok(if too_long {
                ReadLine::TooLong
            } else {
                ReadLine::Complete
            });
        }
    }
}
