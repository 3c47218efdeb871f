//! Log record parser.
//!
//! Classifies a raw payload against the structured-log grammar
//! `<PRI>1 TIMESTAMP HOST APP PROC MSGID [- ] MESSAGE`. Pure and total:
//! any input that does not match falls through as an opaque raw line,
//! and nothing in here can panic on untrusted bytes.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static SYSLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(\d+)>1\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(-\s+)?(.+)")
        .expect("syslog grammar is a valid regex")
});

/// Classified log level, derived from the numeric priority modulo 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Error,
    Warn,
    Info,
    Config,
    Debug,
    Trace,
}

impl Severity {
    /// Fixed priority table. Remainders without an entry map to TRACE.
    pub fn from_priority(priority: u32) -> Self {
        match priority % 8 {
            1 => Self::Fatal,
            2 => Self::Error,
            3 => Self::Warn,
            4 => Self::Info,
            5 => Self::Config,
            6 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Config => "CONFIG",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        };
        f.write_str(label)
    }
}

/// A structured record extracted from one payload. Derived, not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub timestamp: String,
    pub host: String,
    pub application: String,
    pub process: String,
    pub message: String,
}

impl LogRecord {
    /// Render the console line: timestamp clipped to millisecond precision,
    /// fields joined with `" | "`, trailing newline.
    pub fn render(&self) -> String {
        let timestamp: String = self.timestamp.chars().take(23).collect();
        format!(
            "{timestamp} | {} | {} | {} | {} | {}\n",
            self.severity, self.process, self.application, self.host, self.message
        )
    }
}

/// Result of classifying one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Record(LogRecord),
    Raw(String),
}

/// Classify a payload. Never fails; non-matching input comes back verbatim.
pub fn parse_line(text: &str) -> ParsedLine {
    let Some(captures) = SYSLOG.captures(text) else {
        return ParsedLine::Raw(text.to_string());
    };

    // A priority too large for u32 counts as malformed and maps to 0.
    let priority = captures[1].parse::<u32>().unwrap_or(0);
    ParsedLine::Record(LogRecord {
        severity: Severity::from_priority(priority),
        timestamp: captures[2].to_string(),
        host: captures[3].to_string(),
        application: captures[4].to_string(),
        process: captures[5].to_string(),
        message: captures[8].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_is_total_and_periodic() {
        assert_eq!(Severity::from_priority(1), Severity::Fatal);
        assert_eq!(Severity::from_priority(2), Severity::Error);
        assert_eq!(Severity::from_priority(3), Severity::Warn);
        assert_eq!(Severity::from_priority(4), Severity::Info);
        assert_eq!(Severity::from_priority(5), Severity::Config);
        assert_eq!(Severity::from_priority(6), Severity::Debug);
        assert_eq!(Severity::from_priority(0), Severity::Trace);
        assert_eq!(Severity::from_priority(7), Severity::Trace);

        for priority in 0..64 {
            assert_eq!(
                Severity::from_priority(priority),
                Severity::from_priority(priority + 8)
            );
        }
    }

    #[test]
    fn parses_structured_record() {
        let line = "<134>1 2024-01-01T10:00:00.000Z myhost myapp 1234 - Something happened";
        let ParsedLine::Record(record) = parse_line(line) else {
            panic!("expected a structured record");
        };
        // 134 % 8 == 6
        assert_eq!(record.severity, Severity::Debug);
        assert_eq!(record.timestamp, "2024-01-01T10:00:00.000Z");
        assert_eq!(record.host, "myhost");
        assert_eq!(record.application, "myapp");
        assert_eq!(record.process, "1234");
        assert_eq!(record.message, "Something happened");
    }

    #[test]
    fn renders_clipped_timestamp_and_field_order() {
        let line = "<12>1 2024-01-01T10:00:00.000Z myhost myapp 1234 - hello";
        let ParsedLine::Record(record) = parse_line(line) else {
            panic!("expected a structured record");
        };
        assert_eq!(
            record.render(),
            "2024-01-01T10:00:00.000 | INFO | 1234 | myapp | myhost | hello\n"
        );
    }

    #[test]
    fn record_without_msgid_dash_still_matches() {
        let line = "<3>1 2024-01-01T10:00:00Z host app 99 msgid payload text";
        let ParsedLine::Record(record) = parse_line(line) else {
            panic!("expected a structured record");
        };
        assert_eq!(record.severity, Severity::Warn);
        assert_eq!(record.message, "payload text");
    }

    #[test]
    fn non_matching_input_passes_through_raw() {
        for input in [
            "",
            "plain text line",
            "<>1 no priority",
            "<134>2 wrong version host app 1 - msg",
            "\u{0}\u{1}binary\u{2}garbage",
            "<134>1 incomplete",
        ] {
            assert_eq!(parse_line(input), ParsedLine::Raw(input.to_string()));
        }
    }

    #[test]
    fn oversized_priority_defaults_to_trace() {
        let line = "<99999999999999999999>1 t h a p m - msg";
        let ParsedLine::Record(record) = parse_line(line) else {
            panic!("expected a structured record");
        };
        assert_eq!(record.severity, Severity::Trace);
    }
}
