//! Integration Test: Sleep Prohibition
//!
//! **Policy**: neither production code nor integration tests sleep. Waiting is
//! done on I/O, channels, `Notify` or cancellation tokens; tests that need
//! interleaving yield instead of sleeping.

use architectural_enforcement::{
    report, rust_files, SourceFile, Violation, INTEGRATION_TEST_DIRS, PRODUCTION_DIRS,
};

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

/// Test that production code does not contain sleep calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations: Vec<Violation> = Vec::new();

    for path in rust_files(PRODUCTION_DIRS) {
        let Some(file) = SourceFile::load(&path) else {
            continue;
        };
        violations.extend(
            file.production_lines()
                .filter(|&idx| is_sleep_call(file.code(idx)))
                .map(|idx| file.violation(idx, "Sleep call")),
        );
    }

    report(
        "CRITICAL: Sleep calls found in production code!",
        &violations,
        &[
            "❌ FORBIDDEN: sleep in polling loops or as synchronization",
            "✅ USE: async I/O, channels, tokio::sync::Notify, CancellationToken",
        ],
    );
}

/// Test that integration tests do not rely on timing
#[test]
fn test_no_sleep_in_integration_tests() {
    let mut violations: Vec<Violation> = Vec::new();

    for path in rust_files(INTEGRATION_TEST_DIRS) {
        let Some(file) = SourceFile::load(&path) else {
            continue;
        };
        violations.extend(
            (0..file.lines().len())
                .filter(|&idx| is_sleep_call(file.code(idx)))
                .map(|idx| file.violation(idx, "Sleep in integration test")),
        );
    }

    report(
        "Sleep calls found in integration tests!",
        &violations,
        &["✅ USE: tokio::task::yield_now(), Notify gates, or awaiting the stream task"],
    );
}

#[test]
fn test_sleep_detection() {
    assert!(is_sleep_call("tokio::time::sleep(Duration::from_millis(10)).await;"));
    assert!(is_sleep_call("std::thread::sleep(d);"));
    assert!(!is_sleep_call("tokio::task::yield_now().await;"));
}
