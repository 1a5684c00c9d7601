//! crates/od_ledger_core/src/keys.rs
//!
//! Generates the keys ledger entries are stored under.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::EntryKey;

/// Issues timestamp-derived entry keys.
///
/// A key is the write time in milliseconds since the epoch, as a decimal
/// string. When the clock has not moved past the last issued key the next one
/// is `last + 1`, so keys from one generator are strictly increasing and two
/// writes in the same millisecond never share a key.
#[derive(Debug, Default)]
pub struct EntryKeyGenerator {
    last: AtomicI64,
}

impl EntryKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self, now: DateTime<Utc>) -> EntryKey {
        let millis = now.timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = millis.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return EntryKey::new(next.to_string()),
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn key_is_the_millisecond_timestamp() {
        let keys = EntryKeyGenerator::new();
        let now = Utc.timestamp_millis_opt(1_724_146_200_123).unwrap();
        assert_eq!(keys.next_key(now).as_str(), "1724146200123");
    }

    #[test]
    fn same_millisecond_yields_distinct_increasing_keys() {
        let keys = EntryKeyGenerator::new();
        let now = Utc.timestamp_millis_opt(1_724_146_200_000).unwrap();

        let first = keys.next_key(now);
        let second = keys.next_key(now);
        assert_eq!(first.as_str(), "1724146200000");
        assert_eq!(second.as_str(), "1724146200001");
    }

    #[test]
    fn clock_going_backwards_still_advances() {
        let keys = EntryKeyGenerator::new();
        let now = Utc.timestamp_millis_opt(1_724_146_200_000).unwrap();

        keys.next_key(now);
        let earlier = keys.next_key(now - Duration::hours(1));
        assert_eq!(earlier.as_str(), "1724146200001");
    }

    #[test]
    fn concurrent_callers_never_share_a_key() {
        let keys = Arc::new(EntryKeyGenerator::new());
        let now = Utc.timestamp_millis_opt(1_724_146_200_000).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keys = Arc::clone(&keys);
                std::thread::spawn(move || (0..100).map(|_| keys.next_key(now)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(seen.insert(key), "duplicate entry key issued");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
