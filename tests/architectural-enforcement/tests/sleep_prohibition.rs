//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the realtime core MUST NOT sleep to wait for
//! events. Waiting happens on channels and the watch state.
//! **Exception**: the reconnect backoff timer.

use architectural_enforcement::{core_src_dir, is_backoff_context, is_sleep_call, scan_directory};

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan_directory(&core_src_dir(), |lines, idx| {
        is_sleep_call(lines[idx]) && !is_backoff_context(lines, idx)
    });

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Reconnect backoff timers");
        eprintln!("  - Test code (after #[cfg(test)])");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_core_sources_are_scanned() {
    assert!(
        core_src_dir().join("connection/controller.rs").exists(),
        "realtime core sources not found at {}",
        core_src_dir().display()
    );
}
