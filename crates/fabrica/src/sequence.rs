//! Process-wide named counters for unique per-call values.

use std::collections::BTreeMap;
use std::sync::Mutex;

static SEQUENCES: Mutex<BTreeMap<String, u64>> = Mutex::new(BTreeMap::new());

/// Increment the named counter and map the value through `f`.
///
/// The first call for a name yields 1. Increments are atomic under a single
/// lock, so concurrent callers never observe a partial update.
///
/// ```
/// use fabrica::sequence::sequence;
///
/// let email = sequence("docs.email", |n| format!("test-{n}@mail.com"));
/// assert_eq!(email, "test-1@mail.com");
/// ```
pub fn sequence<T>(name: &str, f: impl FnOnce(u64) -> T) -> T {
    f(next_value(name))
}

/// Raw next value for a named sequence.
pub fn next_value(name: &str) -> u64 {
    let mut counters = SEQUENCES.lock().unwrap_or_else(|err| err.into_inner());
    let counter = counters.entry(name.to_string()).or_insert(0);
    *counter += 1;
    *counter
}

/// Reset every named counter. Intended between independent test runs so
/// numbering stays deterministic.
pub fn clean_up() {
    SEQUENCES
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .clear();
}
