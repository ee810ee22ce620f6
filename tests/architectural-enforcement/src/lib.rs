//! Architectural Enforcement
//!
//! Source scanners backing the integration tests in `tests/`:
//! - No sleeping in production code outside reconnect backoff
//! - No blocking I/O inside async functions
//!
//! Scanning is line based. Everything after the first `#[cfg(test)]` in a
//! file is treated as test code and skipped.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production sources of the realtime core crate
#[must_use]
pub fn core_src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../realtime/core/src")
}

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Trimmed source text
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Lines of `content` that belong to production code
#[must_use]
pub fn production_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
        .collect()
}

/// Code part of a line, without any trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Run `rule` over every production line of every `.rs` file under `dir`
///
/// `rule` gets the file's production lines and the index being checked and
/// returns `true` for an offending line.
pub fn scan_directory<F>(dir: &Path, rule: F) -> Vec<Violation>
where
    F: Fn(&[&str], usize) -> bool,
{
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };

        let lines = production_lines(&content);
        for idx in 0..lines.len() {
            if rule(&lines, idx) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    text: lines[idx].trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Whether the line calls a sleep function
#[must_use]
pub fn is_sleep_call(line: &str) -> bool {
    let code = code_part(line);
    code.contains("::sleep(") || code.contains(".sleep(")
}

/// Whether a sleep at `idx` sits in reconnect or retry backoff
pub fn is_backoff_context(lines: &[&str], idx: usize) -> bool {
    let range = idx.saturating_sub(15)..std::cmp::min(idx + 5, lines.len());
    lines[range].iter().any(|line| {
        let line = line.to_lowercase();
        line.contains("reconnect") || line.contains("retry") || line.contains("backoff")
    })
}

/// Whether the innermost function enclosing `idx` is `async`
pub fn is_in_async_fn(lines: &[&str], idx: usize) -> bool {
    for line in lines[..=idx].iter().rev() {
        let code = code_part(line).trim_start();
        let signature = code
            .trim_start_matches("pub(crate) ")
            .trim_start_matches("pub ");
        if signature.starts_with("async fn ") {
            return true;
        }
        if signature.starts_with("fn ") {
            return false;
        }
    }
    false
}

/// Whether the line uses a blocking std I/O facility
#[must_use]
pub fn is_blocking_io(line: &str) -> bool {
    let code = code_part(line);
    code.contains("std::fs::")
        || code.contains("std::net::")
        || code.contains("std::thread::sleep")
        || code.contains("std::process::Command")
        || code.contains("std::io::stdin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "fn a() {}\n#[cfg(test)]\nmod tests {}\n";
        assert_eq!(production_lines(content), vec!["fn a() {}"]);
    }

    #[test]
    fn test_backoff_detection() {
        let lines = vec![
            "fn schedule_reconnect(&self) {",
            "    let delay = self.policy.next_attempt();",
            "    tokio::time::sleep(delay).await;",
            "}",
        ];
        assert!(is_sleep_call(lines[2]));
        assert!(is_backoff_context(&lines, 2));
    }

    #[test]
    fn test_plain_sleep_is_not_backoff() {
        let lines = vec![
            "async fn poll(&self) {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ];
        assert!(!is_backoff_context(&lines, 1));
    }

    #[test]
    fn test_async_fn_detection() {
        let lines = vec![
            "fn read_toml(path: &Path) {",
            "    std::fs::read_to_string(path)",
            "}",
            "pub async fn connect(&self) {",
            "    std::net::TcpStream::connect(addr)",
            "}",
        ];
        assert!(!is_in_async_fn(&lines, 1));
        assert!(is_in_async_fn(&lines, 4));
        assert!(is_blocking_io(lines[4]));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert!(!is_sleep_call("// tokio::time::sleep(d) is forbidden"));
        assert!(!is_blocking_io("let x = 1; // std::fs::read"));
    }
}
