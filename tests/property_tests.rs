//! Property-based tests for ldgr using proptest

use chrono::DateTime;
use ldgr::core::fmtutil;
use ldgr::prelude::*;
use ldgr::LogBuffer;
use proptest::prelude::*;
use std::sync::Arc;

fn any_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Off),
        Just(Severity::Trace),
        Just(Severity::Debug),
        Just(Severity::Info),
        Just(Severity::Warn),
        Just(Severity::Error),
        Just(Severity::Fatal),
    ]
}

/// Straightforward split-based version of `trunc_file`.
fn reference_trunc(path: &str) -> String {
    let parts: Vec<&str> = path.rsplitn(3, '/').collect();
    if parts.len() == 3 {
        format!("{}/{}", parts[1], parts[0])
    } else {
        path.to_string()
    }
}

fn render(f: impl FnOnce(&mut LogBuffer)) -> String {
    let mut buffer = LogBuffer::new();
    f(&mut buffer);
    String::from_utf8(buffer.to_vec()).unwrap()
}

// ============================================================================
// Severity Tests
// ============================================================================

proptest! {
    /// Gate decisions follow the numeric ordering exactly
    #[test]
    fn test_gate_matches_ordering(level in any_severity(), severity in any_severity()) {
        let logger = Logger::builder("PROP").level(level).build();
        prop_assert_eq!(logger.should_log(severity), severity as u8 >= level as u8);
    }

    /// Severity names parse back to the same value
    #[test]
    fn test_severity_str_roundtrip(severity in any_severity()) {
        let parsed: Severity = severity.to_str().parse().unwrap();
        prop_assert_eq!(parsed, severity);
        prop_assert_eq!(format!("{}", severity), severity.to_str());
    }

    /// Rendered severity tokens are right-aligned in five columns
    #[test]
    fn test_severity_token_width(raw in 0u8..=255) {
        let rendered = render(|b| fmtutil::append_severity_raw(b, raw));
        prop_assert!(rendered.len() >= 5);
        prop_assert_eq!(rendered.trim_start(), fmtutil::severity_token(raw));
    }
}

// ============================================================================
// Formatting Primitive Tests
// ============================================================================

proptest! {
    #[test]
    fn test_pad_int_two(n in 0u32..100) {
        prop_assert_eq!(render(|b| fmtutil::append_pad_int::<2>(b, n)), format!("{:02}", n));
    }

    #[test]
    fn test_pad_int_six(n in 0u32..1_000_000) {
        prop_assert_eq!(render(|b| fmtutil::append_pad_int::<6>(b, n)), format!("{:06}", n));
    }

    #[test]
    fn test_u32_digits(n in any::<u32>()) {
        let mut scratch = [0u8; 10];
        let expected = n.to_string();
        prop_assert_eq!(fmtutil::u32_digits(n, &mut scratch), expected.as_bytes());
    }

    #[test]
    fn test_trunc_file_matches_reference(path in "[a-z./]{0,40}") {
        let truncated = fmtutil::trunc_file(path.as_bytes());
        let expected = reference_trunc(&path);
        prop_assert_eq!(truncated, expected.as_bytes());
        prop_assert!(path.as_bytes().ends_with(truncated));
    }
}

// ============================================================================
// Snapshot Tests
// ============================================================================

proptest! {
    /// Snapshot views equal the entry fields, whichever factory backs them
    #[test]
    fn test_snapshot_preserves_fields(
        severity in any_severity(),
        name in proptest::collection::vec(any::<u8>(), 0..64),
        file in proptest::collection::vec(any::<u8>(), 0..128),
        line in "[0-9]{0,6}",
        message in proptest::collection::vec(any::<u8>(), 0..4096),
        micros in 0i64..4_102_444_800_000_000,
    ) {
        let pool = BufferPool::new();
        let entry = LogEntry::new(severity, &name[..], &message[..])
            .with_location(&file[..], line.as_str())
            .with_timestamp(DateTime::from_timestamp_micros(micros).unwrap());

        for factory in [&pool as &dyn BufferFactory, &HeapBufferFactory] {
            let snapshot = Snapshot::capture(&entry, false, factory);
            prop_assert_eq!(snapshot.severity(), severity);
            prop_assert_eq!(snapshot.name(), &name[..]);
            prop_assert_eq!(snapshot.file(), &file[..]);
            prop_assert_eq!(snapshot.line(), line.as_bytes());
            prop_assert_eq!(snapshot.message(), &message[..]);
            prop_assert_eq!(
                snapshot.buffer().as_bytes().len(),
                name.len() + file.len() + line.len() + message.len()
            );
            prop_assert_eq!(snapshot.time().microseconds as i64, micros % 1_000_000);
        }
    }

    /// A sink at level L writes exactly the entries a logger gate at L passes
    #[test]
    fn test_sink_gate_matches_logger_gate(
        level in any_severity(),
        severities in proptest::collection::vec(any_severity(), 0..32),
    ) {
        let sink = Arc::new(MemorySink::new());
        sink.set_level(level);
        let logger = Logger::builder("PROP.SINK")
            .level(Severity::Off)
            .sink(sink.clone())
            .build();

        for &severity in &severities {
            logger.log(&LogEntry::new(severity, "PROP.SINK", "m"));
        }

        let expected = severities.iter().filter(|&&s| s >= level).count();
        prop_assert_eq!(sink.lines().len(), expected);
    }
}
