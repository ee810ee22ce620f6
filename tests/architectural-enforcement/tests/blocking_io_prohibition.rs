//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in the realtime core MUST NOT use blocking std
//! I/O. Synchronous helpers (config loading before the runtime matters) are
//! exempt.

use architectural_enforcement::{core_src_dir, is_blocking_io, is_in_async_fn, scan_directory};

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = scan_directory(&core_src_dir(), |lines, idx| {
        is_blocking_io(lines[idx]) && is_in_async_fn(lines, idx)
    });

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O found in async code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs, tokio::net, tokio::time");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.\nFix these before merging!",
            violations.len()
        );
    }
}
