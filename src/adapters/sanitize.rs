//! Log sanitization for clinical values and secrets.
//!
//! Applied to every formatted log line through [`SanitizingMakeWriter`]:
//! - Clinical measurements written as `field=value` (age, blood pressure, ...)
//! - Whole feature-vector dumps (15 comma-separated numbers in brackets)
//! - Patient identifiers (UUIDs, MRNs, SSNs, emails)
//! - Key material (long hex runs, `key=...` style secrets)
//!
//! The pipeline itself never logs input values; this catches the ones that
//! slip in through `Debug` output or error messages.
//!
//! Input is capped at `HEARTSENSE_SANITIZE_MAX_BYTES` (default 16 KiB).

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

const RULES: &[(&str, &str)] = &[
    // Clinical measurements, snake_case or camelCase, `=` or `:`
    (
        r"(?i)\b(age|resting_?bp|resting_?blood_?pressure|cholesterol|max_?hr|max_?heart_?rate|old_?peak|fasting_?bs|fasting_?blood_?sugar)\b(\s*[:=]\s*)-?\d+(?:\.\d+)?",
        "${1}${2}[REDACTED]",
    ),
    // Feature-vector dumps
    (
        r"\[\s*-?\d+(?:\.\d+)?(?:\s*,\s*-?\d+(?:\.\d+)?){14}\s*\]",
        "[REDACTED-FEATURES]",
    ),
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-UUID]",
    ),
    (r"\b\d{3}-\d{2}-\d{4}\b", "[REDACTED-SSN]"),
    (r"\bMRN[:\s]?\d{6,10}\b", "[REDACTED-MRN]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"(?i)\b(?:secret|password|private[_-]?key|seed|token)\b\s*[:=]\s*[A-Za-z0-9+/]{32,}={0,2}",
        "[REDACTED-SECRET]",
    ),
    (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
];

// SGR colour sequences emitted by the fmt layer when ANSI output is on
const ANSI_ESCAPE: &str = r"\x1b\[[0-9;]*m";

struct Patterns {
    ansi: Regex,
    set: RegexSet,
    rules: Vec<(Regex, &'static str)>,
}

fn patterns() -> &'static Patterns {
    // The rule table is constant; a failure here is a programming error.
    PATTERNS.get_or_init(|| Patterns {
        ansi: Regex::new(ANSI_ESCAPE).expect("Valid regex"),
        set: RegexSet::new(RULES.iter().map(|(p, _)| *p)).expect("Valid regex set"),
        rules: RULES
            .iter()
            .map(|(p, r)| (Regex::new(p).expect("Valid regex"), *r))
            .collect(),
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("HEARTSENSE_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact clinical values, identifiers and secrets from `input`.
///
/// Colour escapes are stripped first so `field=value` pairs match.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut out = patterns.ansi.replace_all(prefix, "").into_owned();
    for idx in patterns.set.matches(&out).iter() {
        let (regex, replacement) = &patterns.rules[idx];
        out = regex.replace_all(&out, *replacement).into_owned();
    }

    if truncated {
        out.push_str(" [TRUNCATED]");
    }
    out
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted line
/// before it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter that never emits a newline must not buffer forever.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn log_through_fmt(ansi: bool) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(SanitizingMakeWriter::new(captured.clone()))
            .with_ansi(ansi)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(age = 61, cholesterol = 287, "submitted");
        });
        captured.text()
    }

    #[test]
    fn test_redacts_clinical_values() {
        let out = sanitize("input age=48 cholesterol: 228 oldPeak=2.5 maxHeartRate=100");
        assert!(!out.contains("48"));
        assert!(!out.contains("228"));
        assert!(!out.contains("2.5"));
        assert!(out.contains("age=[REDACTED]"));
        assert!(out.contains("cholesterol: [REDACTED]"));
    }

    #[test]
    fn test_redacts_feature_vector() {
        let out = sanitize(concat!(
            "features [48.0, 140.0, 228.0, 1.0, 100.0, 2.5, 1.0, 0.0, ",
            "0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0] encoded"
        ));
        assert!(out.contains("[REDACTED-FEATURES]"));
        assert!(!out.contains("228.0"));
    }

    #[test]
    fn test_keeps_ordinary_text() {
        let line = "Assessment complete prediction=1 model=1.0.0";
        assert_eq!(sanitize(line), line);
    }

    #[test]
    fn test_redacts_identifiers() {
        let out = sanitize("patient 550e8400-e29b-41d4-a716-446655440000 MRN:12345678 a@b.org");
        assert!(out.contains("[REDACTED-UUID]"));
        assert!(out.contains("[REDACTED-MRN]"));
        assert!(out.contains("[REDACTED-EMAIL]"));
    }

    #[test]
    fn test_redacts_key_material() {
        let out = sanitize("seed=QWxhZGRpbjpvcGVuIHNlc2FtZSB3aXRoIGxvbmcgc2VjcmV0");
        assert!(out.contains("[REDACTED-SECRET]"));
        let out = sanitize("digest 0123456789abcdef0123456789abcdef");
        assert!(out.contains("[REDACTED-KEY]"));
    }

    #[test]
    fn test_strips_colour_before_matching() {
        let out = sanitize("\x1b[3mage\x1b[0m\x1b[2m=\x1b[0m61 done");
        assert_eq!(out, "age=[REDACTED] done");
    }

    #[test]
    fn test_fmt_subscriber_fields_redacted() {
        for ansi in [false, true] {
            let out = log_through_fmt(ansi);
            assert!(out.contains("submitted"), "{out:?}");
            assert!(out.contains("age=[REDACTED]"), "{out:?}");
            assert!(out.contains("cholesterol=[REDACTED]"), "{out:?}");
            assert!(!out.contains("61"), "{out:?}");
            assert!(!out.contains("287"), "{out:?}");
            assert!(!out.contains('\x1b'), "{out:?}");
        }
    }

    #[test]
    fn test_truncates_large_inputs() {
        let out = sanitize_with_limit("é".repeat(40).as_str(), 15);
        assert!(out.ends_with("[TRUNCATED]"));
    }

    #[test]
    fn test_writer_sanitizes_per_line() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter {
                inner: &mut sink,
                buffer: Vec::new(),
            };
            writer.write_all(b"first age=61\nsecond ").unwrap();
            writer.write_all(b"cholesterol=300").unwrap();
        }
        let text = String::from_utf8(sink).unwrap();
        assert_eq!(text, "first age=[REDACTED]\nsecond cholesterol=[REDACTED]");
    }
}
