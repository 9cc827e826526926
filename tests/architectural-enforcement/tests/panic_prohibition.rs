//! Integration Test: Panic Prohibition
//!
//! **Policy**: production code propagates errors with `?` and typed error
//! enums. `unwrap()`, `expect()` and panicking macros are for tests only.

use architectural_enforcement::{report, rust_files, SourceFile, Violation, PRODUCTION_DIRS};

const FORBIDDEN: &[(&str, &str)] = &[
    (".unwrap()", "unwrap() in production code"),
    (".expect(", "expect() in production code"),
    ("panic!(", "panic! in production code"),
    ("todo!(", "todo! in production code"),
    ("unimplemented!(", "unimplemented! in production code"),
];

#[test]
fn test_no_panics_in_production_code() {
    let mut violations: Vec<Violation> = Vec::new();

    for path in rust_files(PRODUCTION_DIRS) {
        let Some(file) = SourceFile::load(&path) else {
            continue;
        };
        for idx in file.production_lines() {
            let code = file.code(idx);
            if code.trim_start().starts_with("//") {
                continue;
            }
            for (pattern, kind) in FORBIDDEN {
                if code.contains(pattern) {
                    violations.push(file.violation(idx, kind));
                }
            }
        }
    }

    report(
        "Panicking calls found in production code!",
        &violations,
        &[
            "✅ USE: `?` with ClientError / ChatError / ConfigError in the library",
            "✅ USE: anyhow::Context in the binary",
        ],
    );
}
