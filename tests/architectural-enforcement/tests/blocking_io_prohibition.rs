//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the client MUST NOT block the runtime.
//! **Required**: `tokio::fs`, `tokio::io`, async `reqwest`, not their `std`
//! or `reqwest::blocking` counterparts.
//!
//! Synchronous functions that run before the runtime does real work (config
//! loading, argument parsing) may use blocking calls.

use architectural_enforcement::{report, rust_files, SourceFile, Violation, PRODUCTION_DIRS};

/// Blocking calls forbidden inside `async fn`
const ASYNC_FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin in async"),
    ("std::io::stdout()", "Blocking stdout in async"),
    ("std::thread::sleep", "Thread sleep in async"),
];

/// Blocking calls forbidden everywhere in production code
const ALWAYS_FORBIDDEN: &[(&str, &str)] = &[("reqwest::blocking", "Blocking HTTP client")];

/// Test that async production code does not block
#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = find_blocking_io_violations();

    report(
        "CRITICAL: Blocking I/O calls found in async production code!",
        &violations,
        &[
            "✅ REQUIRED async I/O:",
            "  - tokio::fs::read().await, tokio::io::stdin()",
            "  - reqwest::Client (async)",
            "✅ ACCEPTABLE blocking I/O:",
            "  - Non-async functions (config loading before the first request)",
            "  - Test code",
        ],
    );
}

fn find_blocking_io_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for path in rust_files(PRODUCTION_DIRS) {
        let Some(file) = SourceFile::load(&path) else {
            continue;
        };
        for idx in file.production_lines() {
            let code = file.code(idx);

            for (pattern, kind) in ALWAYS_FORBIDDEN {
                if code.contains(pattern) {
                    violations.push(file.violation(idx, kind));
                }
            }

            if !file.in_async_fn(idx) {
                continue;
            }
            for (pattern, kind) in ASYNC_FORBIDDEN {
                if code.contains(pattern) {
                    violations.push(file.violation(idx, kind));
                }
            }
        }
    }

    violations
}

#[test]
fn test_detector_flags_blocking_read_in_async_fn() {
    let file = SourceFile::from_source(
        std::path::Path::new("bad.rs"),
        "pub async fn bad() {\n    let s = std::fs::read_to_string(\"f\");\n}\n",
    );
    let idx = 1;
    assert!(file.in_async_fn(idx));
    assert!(file.code(idx).contains("std::fs::"));
}

#[test]
fn test_detector_allows_blocking_read_in_sync_fn() {
    let file = SourceFile::from_source(
        std::path::Path::new("ok.rs"),
        "pub fn load() {\n    let s = std::fs::read_to_string(\"client.toml\");\n}\n",
    );
    assert!(!file.in_async_fn(1));
}
