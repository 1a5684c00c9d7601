//! crates/od_ledger_core/src/filters.rs
//!
//! Consumer-side narrowing of a student's OD history, as used by the faculty
//! and admin searches. Not part of the ledger's storage contract.

use chrono::NaiveDate;

use crate::domain::{KeyedOdEntry, OdEntry, StudentInfo, StudentOdHistory};

/// Optional criteria an entry must meet to be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OdFilter {
    pub date: Option<NaiveDate>,
    pub slot: Option<u32>,
    /// Matched against the student's snapshot department, not per entry.
    pub department: Option<String>,
}

impl OdFilter {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.slot.is_none() && self.department.is_none()
    }

    pub fn matches(&self, student: &StudentInfo, entry: &OdEntry) -> bool {
        self.department
            .as_deref()
            .map_or(true, |department| department == student.department)
            && self.date.map_or(true, |date| date == entry.date)
            && self.slot.map_or(true, |slot| slot == entry.slot)
    }

    /// Keeps the matching entries, preserving their order.
    pub fn apply(&self, history: StudentOdHistory) -> FilteredHistory {
        let original_count = history.count();
        let student = history.student;
        let entries = history
            .entries
            .into_iter()
            .filter(|keyed| self.matches(&student, &keyed.entry))
            .collect();
        FilteredHistory {
            student,
            entries,
            original_count,
        }
    }
}

/// A student history after an `OdFilter` was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredHistory {
    pub student: StudentInfo,
    pub entries: Vec<KeyedOdEntry>,
    pub original_count: usize,
}

impl FilteredHistory {
    pub fn filtered_count(&self) -> usize {
        self.entries.len()
    }

    pub fn summary(&self) -> String {
        if self.entries.is_empty() && self.original_count > 0 {
            format!(
                "Found {} total OD entries, but none match your filters",
                self.original_count
            )
        } else {
            format!(
                "Found {} OD entries for {}",
                self.filtered_count(),
                self.student.student_name
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryKey;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn keyed(key: &str, date: NaiveDate, slot: u32) -> KeyedOdEntry {
        KeyedOdEntry {
            key: EntryKey::new(key),
            entry: OdEntry {
                date,
                slot,
                created_at: Utc.with_ymd_and_hms(2024, 8, 20, 10, 0, 0).unwrap(),
                granted_by_id: None,
                granted_by_name: None,
                event_name: None,
            },
        }
    }

    fn history() -> StudentOdHistory {
        StudentOdHistory {
            student: StudentInfo {
                roll_number: "A1".to_string(),
                student_name: "Asha".to_string(),
                department: "ECE".to_string(),
                section: "B".to_string(),
            },
            entries: vec![
                keyed("3", day(21), 2),
                keyed("2", day(20), 3),
                keyed("1", day(20), 1),
            ],
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = OdFilter::default();
        assert!(filter.is_empty());

        let filtered = filter.apply(history());
        assert_eq!(filtered.filtered_count(), 3);
        assert_eq!(filtered.original_count, 3);
    }

    #[test]
    fn date_and_slot_narrow_in_order() {
        let by_date = OdFilter {
            date: Some(day(20)),
            ..OdFilter::default()
        }
        .apply(history());
        let keys: Vec<&str> = by_date.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["2", "1"]);

        let by_both = OdFilter {
            date: Some(day(20)),
            slot: Some(3),
            department: None,
        }
        .apply(history());
        assert_eq!(by_both.filtered_count(), 1);
        assert_eq!(by_both.entries[0].key.as_str(), "2");
        assert_eq!(by_both.original_count, 3);
    }

    #[test]
    fn department_mismatch_excludes_the_student() {
        let filtered = OdFilter {
            department: Some("CSE".to_string()),
            ..OdFilter::default()
        }
        .apply(history());

        assert!(filtered.entries.is_empty());
        assert_eq!(
            filtered.summary(),
            "Found 3 total OD entries, but none match your filters"
        );
    }

    #[test]
    fn department_match_keeps_entries() {
        let filtered = OdFilter {
            department: Some("ECE".to_string()),
            ..OdFilter::default()
        }
        .apply(history());
        assert_eq!(filtered.filtered_count(), 3);
        assert_eq!(filtered.summary(), "Found 3 OD entries for Asha");
    }
}
