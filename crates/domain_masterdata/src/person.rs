//! Person aggregate
//!
//! A person is the master record for a natural person in the back
//! office. Each person belongs to exactly one tenant; the tenant id is
//! set at construction and never changes. The AHV number is optional
//! (imported records may arrive without one) but, when present, must be
//! unique within the tenant. The repository layer enforces that.
//!
//! Effective-dated changes (`change_name`, `change_address`) apply the
//! change and hand back the [`PersonHistoryEntry`] snapshot that the
//! caller must persist in the same transaction, so the edit trail never
//! diverges from the current state.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{AhvNumber, PersonId, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::MasterdataError;
use crate::history::PersonHistoryEntry;

/// Lifecycle status of a person record
///
/// Persons are never physically deleted by normal flow; deactivation is
/// the soft lifecycle. Physical deletion exists only as a rare
/// administrative erasure operation on the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonStatus {
    Active,
    Inactive,
}

impl PersonStatus {
    /// Lowercase storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonStatus::Active => "active",
            PersonStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for PersonStatus {
    type Err = MasterdataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PersonStatus::Active),
            "inactive" => Ok(PersonStatus::Inactive),
            other => Err(MasterdataError::validation(
                "Person",
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// A natural person, owned by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique person identifier
    pub id: PersonId,
    /// Owning tenant, immutable once set
    pub tenant_id: TenantId,
    /// National identifier, unique per tenant when present
    pub ahv_nr: Option<AhvNumber>,
    /// Legal last name
    pub last_name: String,
    /// Legal first name
    pub first_name: String,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// Street line of the current address
    pub street: Option<String>,
    /// City of the current address
    pub city: Option<String>,
    /// Postal code of the current address
    pub postal_code: Option<String>,
    /// Lifecycle status
    pub status: PersonStatus,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Creates a new person with a generated id
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the last or first name is blank,
    /// or if the date of birth lies in the future.
    pub fn new(
        tenant_id: TenantId,
        ahv_nr: Option<AhvNumber>,
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        date_of_birth: NaiveDate,
    ) -> Result<Self, MasterdataError> {
        let last_name = last_name.into();
        let first_name = first_name.into();
        if last_name.trim().is_empty() {
            return Err(MasterdataError::validation(
                "Person",
                "last_name",
                "must not be blank",
            ));
        }
        if first_name.trim().is_empty() {
            return Err(MasterdataError::validation(
                "Person",
                "first_name",
                "must not be blank",
            ));
        }
        if date_of_birth > Utc::now().date_naive() {
            return Err(MasterdataError::validation(
                "Person",
                "date_of_birth",
                "cannot be in the future",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: PersonId::new_v7(),
            tenant_id,
            ahv_nr,
            last_name,
            first_name,
            date_of_birth,
            street: None,
            city: None,
            postal_code: None,
            status: PersonStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the full name (first name + last name)
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Calculates the age in whole years at a given date
    pub fn age_at(&self, date: NaiveDate) -> u32 {
        use chrono::Datelike;
        let mut age = date.year() - self.date_of_birth.year();
        if (date.month(), date.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    /// Returns whether this record is active
    pub fn is_active(&self) -> bool {
        self.status == PersonStatus::Active
    }

    /// Builds a snapshot of the current state, effective at the given date
    pub fn snapshot(&self, effective_date: NaiveDate) -> PersonHistoryEntry {
        PersonHistoryEntry::new(
            self.id,
            effective_date,
            self.last_name.clone(),
            self.first_name.clone(),
            self.date_of_birth,
            self.street.clone(),
            self.city.clone(),
            self.postal_code.clone(),
        )
    }

    /// Changes the name (e.g. due to marriage) and returns the snapshot
    /// to persist
    ///
    /// The snapshot reflects the new state and is authoritative from
    /// `effective_date`. Backdated corrections are permitted.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if either new name is blank.
    pub fn change_name(
        &mut self,
        new_last_name: impl Into<String>,
        new_first_name: impl Into<String>,
        effective_date: NaiveDate,
    ) -> Result<PersonHistoryEntry, MasterdataError> {
        let new_last_name = new_last_name.into();
        let new_first_name = new_first_name.into();
        if new_last_name.trim().is_empty() {
            return Err(MasterdataError::validation(
                "Person",
                "last_name",
                "must not be blank",
            ));
        }
        if new_first_name.trim().is_empty() {
            return Err(MasterdataError::validation(
                "Person",
                "first_name",
                "must not be blank",
            ));
        }
        self.last_name = new_last_name;
        self.first_name = new_first_name;
        self.updated_at = Utc::now();
        Ok(self.snapshot(effective_date))
    }

    /// Changes the address and returns the snapshot to persist
    pub fn change_address(
        &mut self,
        street: Option<String>,
        city: Option<String>,
        postal_code: Option<String>,
        effective_date: NaiveDate,
    ) -> PersonHistoryEntry {
        self.street = street;
        self.city = city;
        self.postal_code = postal_code;
        self.updated_at = Utc::now();
        self.snapshot(effective_date)
    }

    /// Replaces the AHV number
    ///
    /// Callers must re-check tenant-scoped uniqueness before committing
    /// the changed record.
    pub fn change_ahv_nr(&mut self, ahv_nr: Option<AhvNumber>) {
        self.ahv_nr = ahv_nr;
        self.updated_at = Utc::now();
    }

    /// Deactivates the record (soft lifecycle)
    pub fn deactivate(&mut self) {
        self.status = PersonStatus::Inactive;
        self.updated_at = Utc::now();
    }
}
