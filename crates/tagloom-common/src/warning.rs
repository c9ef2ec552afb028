//! Console warnings with colored terminal output.
//!
//! Provides deduplication to avoid spamming the same warning multiple times.
//! Used while building rule tables to report declarations that refer to
//! unknown tags or are otherwise ignored. Resolution itself never prints;
//! it records into a [`Logger`](crate::Logger) instead.

use std::collections::HashSet;
use std::sync::Mutex;

use owo_colors::OwoColorize;

/// Global set of warnings we've already printed (to deduplicate)
static WARNED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Warn about an ignored configuration item (prints once per unique message)
///
/// Returns `true` if the warning was printed, `false` if it was a duplicate.
///
/// # Example
/// ```ignore
/// warn_once("Rules", "tag B denies unknown child FOO");
/// ```
#[must_use]
pub fn warn_once(component: &str, message: &str) -> bool {
    let key = format!("[{component}] {message}");
    let should_print = WARNED
        .lock()
        .map(|mut guard| guard.get_or_insert_with(HashSet::new).insert(key))
        .unwrap_or(false);

    if should_print {
        eprintln!("{}", format!("[tagloom {component}] ⚠ {message}").yellow());
    }
    should_print
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_once_deduplicates() {
        let message = "test_warn_once_deduplicates: unknown tag";
        assert!(warn_once("Test", message));
        assert!(!warn_once("Test", message));
        assert!(warn_once("Other", message));
    }
}
