//! Person change history
//!
//! Every change to a person's record is captured as an immutable
//! snapshot stamped with an *effective date*: the date from which that
//! snapshot is authoritative. Snapshots are append-only; once written
//! they are never mutated or deleted (outside the administrative erasure
//! path, which removes the whole person).
//!
//! # As-of queries
//!
//! "What did we know about this person on date d" is answered by the
//! snapshot with the greatest effective date that is less than or equal
//! to d. A future-dated entry is never selected for a past date. When
//! two entries share an effective date, the one written later is
//! authoritative; write order is the entry's position in the append-only
//! sequence.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{HistoryEntryId, PersonId};
use serde::{Deserialize, Serialize};

/// An immutable snapshot of a person's attributes at an effective date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonHistoryEntry {
    /// Unique snapshot identifier
    pub id: HistoryEntryId,
    /// The person this snapshot belongs to
    pub person_id: PersonId,
    /// Date from which this snapshot is authoritative
    pub effective_date: NaiveDate,
    /// When the snapshot was written
    pub recorded_at: DateTime<Utc>,
    /// Last name at the effective date
    pub last_name: String,
    /// First name at the effective date
    pub first_name: String,
    /// Date of birth as recorded at the effective date
    pub date_of_birth: NaiveDate,
    /// Street line at the effective date
    pub street: Option<String>,
    /// City at the effective date
    pub city: Option<String>,
    /// Postal code at the effective date
    pub postal_code: Option<String>,
}

impl PersonHistoryEntry {
    /// Creates a snapshot stamped now
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        person_id: PersonId,
        effective_date: NaiveDate,
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        date_of_birth: NaiveDate,
        street: Option<String>,
        city: Option<String>,
        postal_code: Option<String>,
    ) -> Self {
        Self {
            id: HistoryEntryId::new_v7(),
            person_id,
            effective_date,
            recorded_at: Utc::now(),
            last_name: last_name.into(),
            first_name: first_name.into(),
            date_of_birth,
            street,
            city,
            postal_code,
        }
    }
}

/// Selects the snapshot authoritative as of `date`
///
/// `entries` must be in write order (append order). Returns the entry
/// with the greatest effective date ≤ `date`; among entries sharing that
/// effective date, the one written last wins. Returns `None` when `date`
/// predates every entry.
pub fn entry_as_of(entries: &[PersonHistoryEntry], date: NaiveDate) -> Option<&PersonHistoryEntry> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.effective_date <= date)
        .max_by_key(|(index, entry)| (entry.effective_date, *index))
        .map(|(_, entry)| entry)
}

/// Sorts entries ascending by effective date, write order breaking ties
///
/// This is the ordering contract of the full-trail query: the edit
/// trail reads oldest-first, and entries sharing an effective date stay
/// in the order they were written.
pub fn sort_ascending(entries: &mut [PersonHistoryEntry]) {
    // Stable sort keeps write order within equal effective dates.
    entries.sort_by_key(|entry| entry.effective_date);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(person_id: PersonId, effective: NaiveDate, postal: &str) -> PersonHistoryEntry {
        PersonHistoryEntry::new(
            person_id,
            effective,
            "Muster",
            "Anna",
            NaiveDate::from_ymd_opt(1980, 5, 1).unwrap(),
            None,
            None,
            Some(postal.to_string()),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_as_of_before_first_entry_is_none() {
        let person_id = PersonId::new();
        let entries = vec![entry(person_id, date(2020, 1, 1), "8001")];
        assert!(entry_as_of(&entries, date(2019, 12, 31)).is_none());
    }

    #[test]
    fn test_as_of_on_effective_date_selects_entry() {
        let person_id = PersonId::new();
        let entries = vec![entry(person_id, date(2020, 1, 1), "8001")];
        let found = entry_as_of(&entries, date(2020, 1, 1)).unwrap();
        assert_eq!(found.postal_code.as_deref(), Some("8001"));
    }

    #[test]
    fn test_as_of_between_entries_selects_earlier() {
        let person_id = PersonId::new();
        let entries = vec![
            entry(person_id, date(2020, 1, 1), "8001"),
            entry(person_id, date(2023, 6, 1), "8002"),
        ];
        let found = entry_as_of(&entries, date(2021, 1, 1)).unwrap();
        assert_eq!(found.postal_code.as_deref(), Some("8001"));
    }

    #[test]
    fn test_as_of_after_last_selects_freshest() {
        let person_id = PersonId::new();
        let entries = vec![
            entry(person_id, date(2020, 1, 1), "8001"),
            entry(person_id, date(2023, 6, 1), "8002"),
        ];
        let found = entry_as_of(&entries, date(2024, 1, 1)).unwrap();
        assert_eq!(found.postal_code.as_deref(), Some("8002"));
    }

    #[test]
    fn test_future_entry_never_selected_for_past_date() {
        let person_id = PersonId::new();
        let entries = vec![
            entry(person_id, date(2030, 1, 1), "9999"),
            entry(person_id, date(2020, 1, 1), "8001"),
        ];
        let found = entry_as_of(&entries, date(2021, 1, 1)).unwrap();
        assert_eq!(found.postal_code.as_deref(), Some("8001"));
    }

    #[test]
    fn test_equal_effective_dates_later_write_wins() {
        let person_id = PersonId::new();
        let entries = vec![
            entry(person_id, date(2022, 3, 1), "8000"),
            entry(person_id, date(2022, 3, 1), "8045"),
        ];
        let found = entry_as_of(&entries, date(2022, 3, 1)).unwrap();
        assert_eq!(found.postal_code.as_deref(), Some("8045"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn naive_date_strategy() -> impl Strategy<Value = NaiveDate> {
            (2000i32..2030i32, 1u32..=12u32, 1u32..=28u32)
                .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
        }

        proptest! {
            /// The selected entry is never future-dated relative to the
            /// query, and no eligible entry has a greater effective date.
            #[test]
            fn prop_as_of_selects_greatest_eligible(
                dates in proptest::collection::vec(naive_date_strategy(), 0..20),
                query in naive_date_strategy(),
            ) {
                let person_id = PersonId::new();
                let entries: Vec<PersonHistoryEntry> = dates
                    .iter()
                    .map(|d| entry(person_id, *d, "8000"))
                    .collect();

                match entry_as_of(&entries, query) {
                    Some(selected) => {
                        prop_assert!(selected.effective_date <= query);
                        let greatest = dates.iter().filter(|d| **d <= query).max().unwrap();
                        prop_assert_eq!(selected.effective_date, *greatest);
                    }
                    None => {
                        prop_assert!(dates.iter().all(|d| *d > query));
                    }
                }
            }
        }
    }

    #[test]
    fn test_sort_ascending_is_stable_for_ties() {
        let person_id = PersonId::new();
        let mut entries = vec![
            entry(person_id, date(2023, 1, 1), "b"),
            entry(person_id, date(2020, 1, 1), "a"),
            entry(person_id, date(2023, 1, 1), "c"),
        ];
        sort_ascending(&mut entries);
        let postal: Vec<_> = entries
            .iter()
            .map(|e| e.postal_code.as_deref().unwrap())
            .collect();
        assert_eq!(postal, vec!["a", "b", "c"]);
    }
}
