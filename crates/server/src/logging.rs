use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Built-in patterns applied when `use_default_pii` is set. Vehicle notes
/// are free text and end up in debug logs.
const DEFAULT_PII: &[(&str, &str)] = &[
    (r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}", "[EMAIL]"),
    (r"\+\d[\d -]{7,}\d", "[PHONE]"),
];

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = redact(&s, &self.patterns);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stdout>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stdout(),
            patterns: self.patterns.clone(),
        }
    }
}

fn redact(line: &str, patterns: &[(Regex, String)]) -> String {
    let mut redacted = line.to_string();
    for (re, replacement) in patterns {
        redacted = re.replace_all(&redacted, replacement.as_str()).into_owned();
    }
    redacted
}

fn compile_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    let redaction = &config.redaction;
    if !redaction.enabled {
        return Vec::new();
    }

    let mut patterns = Vec::new();
    if redaction.use_default_pii {
        for (re, placeholder) in DEFAULT_PII {
            if let Ok(re) = Regex::new(re) {
                patterns.push((re, placeholder.to_string()));
            }
        }
    }
    for p in &redaction.patterns {
        match Regex::new(&p.regex) {
            Ok(re) => patterns.push((re, p.placeholder.clone())),
            Err(e) => eprintln!("warning: skipping redaction pattern {}: {}", p.name, e),
        }
    }
    patterns
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level flags.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.levels.directive();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let show_file = config.format.location.show_file;
    let show_line = config.format.location.show_line;
    let make_writer = RedactingMakeWriter {
        patterns: compile_patterns(config),
    };

    // Use Layer::boxed() to unify the types of the if/else branches
    let fmt_layer = if !config.format.show_time {
        fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .with_thread_ids(false)
            .without_time()
            .boxed()
    } else {
        fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .with_thread_ids(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        LoggingFormatConfig, LoggingLevelsConfig, LoggingLocationConfig, RedactionConfig,
        RedactionPattern,
    };

    fn logging_config(redaction: RedactionConfig) -> LoggingConfig {
        LoggingConfig {
            format: LoggingFormatConfig {
                show_time: false,
                location: LoggingLocationConfig {
                    show_file: false,
                    show_line: false,
                },
            },
            levels: LoggingLevelsConfig {
                debug: false,
                info: true,
                warning: true,
                error: true,
                critical: true,
            },
            redaction,
        }
    }

    #[test]
    fn test_default_pii_is_redacted() {
        let patterns = compile_patterns(&logging_config(RedactionConfig::default()));
        let out = redact("notes=call jane@example.com or +33 6 12 34 56 78", &patterns);
        assert_eq!(out, "notes=call [EMAIL] or [PHONE]");
    }

    #[test]
    fn test_custom_patterns_and_disabled() {
        let custom = RedactionConfig {
            enabled: true,
            use_default_pii: false,
            patterns: vec![RedactionPattern {
                name: "plate".into(),
                regex: r"[A-Z]{2}-\d{3}-[A-Z]{2}".into(),
                placeholder: "[PLATE]".into(),
            }],
        };
        let patterns = compile_patterns(&logging_config(custom));
        assert_eq!(patterns.len(), 1);
        assert_eq!(redact("plate AB-123-CD", &patterns), "plate [PLATE]");

        let off = RedactionConfig {
            enabled: false,
            ..RedactionConfig::default()
        };
        assert!(compile_patterns(&logging_config(off)).is_empty());
    }

    #[test]
    fn test_writer_reports_full_length() {
        use std::io::Write;
        let mut w = RedactingWriter {
            inner: Vec::new(),
            patterns: compile_patterns(&logging_config(RedactionConfig::default())),
        };
        let input = b"user a@b.io";
        assert_eq!(w.write(input).unwrap(), input.len());
        assert_eq!(String::from_utf8(w.inner).unwrap(), "user [EMAIL]");
    }
}
