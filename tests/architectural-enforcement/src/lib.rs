//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the enforcement tests under `tests/`:
//! - No blocking I/O inside async code
//! - No sleeping in production code or integration tests
//! - No `unwrap()`/`expect()` in production code
//!
//! Scanning is line-based. Production code is everything in a source file
//! before its `#[cfg(test)] mod tests`; `test_utils.rs` files are test-only.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["client/core/src", "client/cli/src"];

/// Integration test roots, relative to the workspace root
pub const INTEGRATION_TEST_DIRS: &[&str] = &["client/core/tests"];

/// Workspace root, derived from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from("../.."))
}

/// A rule breach at a specific line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the breach
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// What rule was broken
    pub kind: &'static str,
    /// The offending line, trimmed
    pub line: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line_number,
            self.kind,
            self.line
        )
    }
}

/// A loaded Rust source file
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    lines: Vec<String>,
}

impl SourceFile {
    /// Read a file; `None` if it cannot be read
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self::from_source(path, &content))
    }

    /// Build from in-memory source
    #[must_use]
    pub fn from_source(path: &Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    /// All lines
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Indices of lines that belong to production code
    pub fn production_lines(&self) -> impl Iterator<Item = usize> + '_ {
        let test_only = self.path.file_name().and_then(|n| n.to_str()) == Some("test_utils.rs");
        let end = if test_only {
            0
        } else {
            self.lines
                .windows(2)
                .position(|w| {
                    w[0].trim().starts_with("#[cfg(test)]") && w[1].trim().starts_with("mod tests")
                })
                .unwrap_or(self.lines.len())
        };
        0..end
    }

    /// Code portion of a line with any `//` comment removed
    #[must_use]
    pub fn code(&self, idx: usize) -> &str {
        strip_comment(&self.lines[idx])
    }

    /// Whether the nearest enclosing `fn` above `idx` is async
    #[must_use]
    pub fn in_async_fn(&self, idx: usize) -> bool {
        enclosing_fn(&self.lines, idx).is_some_and(|f| f.is_async)
    }

    /// Whether the nearest enclosing `fn` above `idx` is a test
    #[must_use]
    pub fn in_test_fn(&self, idx: usize) -> bool {
        enclosing_fn(&self.lines, idx).is_some_and(|f| f.is_test)
    }

    /// Record a violation at `idx`
    #[must_use]
    pub fn violation(&self, idx: usize, kind: &'static str) -> Violation {
        Violation {
            path: self.path.clone(),
            line_number: idx + 1,
            kind,
            line: self.lines[idx].trim().to_string(),
        }
    }
}

/// Signature facts about a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnInfo {
    /// Declared `async fn`
    pub is_async: bool,
    /// Marked `#[test]` or `#[tokio::test]`
    pub is_test: bool,
}

/// Strip a trailing `//` comment (string contents are not parsed)
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Parse a function signature line, ignoring visibility and qualifiers
#[must_use]
pub fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    let mut is_async = false;
    loop {
        if let Some(stripped) = rest.strip_prefix("async ") {
            is_async = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("const ") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("unsafe ") {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.starts_with("fn ").then_some(is_async)
}

/// Find the function whose signature most closely precedes `idx`
#[must_use]
pub fn enclosing_fn<S: AsRef<str>>(lines: &[S], idx: usize) -> Option<FnInfo> {
    let fn_idx = (0..=idx)
        .rev()
        .find(|&i| fn_signature(lines[i].as_ref()).is_some())?;
    let is_async = fn_signature(lines[fn_idx].as_ref()).unwrap_or(false);

    let is_test = (0..fn_idx)
        .rev()
        .map(|i| lines[i].as_ref().trim())
        .take_while(|l| l.starts_with("#[") || l.starts_with("///"))
        .any(|l| l.starts_with("#[test]") || l.starts_with("#[tokio::test"));

    Some(FnInfo { is_async, is_test })
}

/// All `.rs` files under the given workspace-relative roots
#[must_use]
pub fn rust_files(roots: &[&str]) -> Vec<PathBuf> {
    let base = workspace_root();
    let mut files = Vec::new();
    for root in roots {
        let dir = base.join(root);
        if !dir.exists() {
            continue;
        }
        files.extend(
            walkdir::WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(|e| e.path().to_path_buf()),
        );
    }
    files.sort();
    files
}

/// Print violations and fail the test when there are any
///
/// # Panics
///
/// Panics if `violations` is not empty.
pub fn report(title: &str, violations: &[Violation], guidance: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in guidance {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s).\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_variants() {
        assert_eq!(fn_signature("fn main() {"), Some(false));
        assert_eq!(fn_signature("    pub async fn send(&self) {"), Some(true));
        assert_eq!(fn_signature("pub(crate) fn now_ms() -> u64 {"), Some(false));
        assert_eq!(fn_signature("let f = 1;"), None);
        assert_eq!(fn_signature("// fn commented"), None);
    }

    #[test]
    fn test_enclosing_fn_detection() {
        let code = [
            "#[tokio::test]",
            "async fn test_something() {",
            "    do_it().await;",
            "}",
            "pub fn load() {",
            "    read();",
            "}",
        ];

        assert_eq!(
            enclosing_fn(&code, 2),
            Some(FnInfo {
                is_async: true,
                is_test: true
            })
        );
        assert_eq!(
            enclosing_fn(&code, 5),
            Some(FnInfo {
                is_async: false,
                is_test: false
            })
        );
        assert_eq!(enclosing_fn(&code, 0), None);
    }

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let file = SourceFile::from_source(
            Path::new("client/core/src/x.rs"),
            "#[cfg(test)]\nmod test_utils;\nfn a() {}\n\n#[cfg(test)]\nmod tests {}\n",
        );
        assert_eq!(file.production_lines().count(), 4);

        let helpers = SourceFile::from_source(
            Path::new("client/core/src/transport/test_utils.rs"),
            "fn a() {}\n",
        );
        assert_eq!(helpers.production_lines().count(), 0);
    }
}
