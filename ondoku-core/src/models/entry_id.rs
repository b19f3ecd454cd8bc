use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Returns the current time in milliseconds, bumped forward when needed so
/// that every call in this process yields a strictly larger value.
pub(crate) fn next_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ISSUED.load(AtomicOrdering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_ISSUED.compare_exchange_weak(
            last,
            next,
            AtomicOrdering::Relaxed,
            AtomicOrdering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Identifier of a log entry: the creation time in epoch milliseconds,
/// rendered as a decimal string. It doubles as the remote document key.
///
/// Ordering compares the numeric timestamp, not the string, so `"10"`
/// sorts after `"3"`. Keys that are not numbers sort before every numeric
/// key and among themselves by string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Generate a fresh id from the current time.
    pub fn generate() -> Self {
        Self(next_millis().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The creation timestamp encoded in the id, if it is numeric.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_time = match (self.timestamp_millis(), other.timestamp_millis()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_strictly_increasing() {
        let ids: Vec<EntryId> = (0..50).map(|_| EntryId::generate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_numeric_not_lexicographic_order() {
        let mut ids = vec![EntryId::from("3"), EntryId::from("10"), EntryId::from("2")];
        ids.sort_by(|a, b| b.cmp(a));
        let order: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["10", "3", "2"]);
    }

    #[test]
    fn test_non_numeric_sorts_below_numeric() {
        assert!(EntryId::from("abc") < EntryId::from("1"));
        assert!(EntryId::from("abc") < EntryId::from("abd"));
    }

    #[test]
    fn test_json_is_plain_string() {
        let id = EntryId::from("1700000000000");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1700000000000\"");
    }
}
