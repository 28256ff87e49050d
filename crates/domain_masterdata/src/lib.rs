//! Master Data Domain
//!
//! This crate manages the person and household master data shared by
//! the operative insurance modules, with full change history per
//! person.
//!
//! # Temporal model
//!
//! Every effective-dated change to a person appends an immutable
//! snapshot of the resulting state to the person's history. The live
//! record always reflects the latest write; questions like "what was
//! this person's address on 2021-07-01" are answered from the history
//! with last-value-before-or-at semantics. A freshly registered person
//! has no history until the first effective-dated change.
//!
//! # Tenant isolation
//!
//! All data belongs to exactly one tenant and every read and write path
//! is tenant-filtered. Two tenants may hold the same AHV number; within
//! one tenant it is unique.
//!
//! # Examples
//!
//! ```rust
//! use core_kernel::{AhvNumber, TenantId};
//! use domain_masterdata::person::Person;
//! use chrono::NaiveDate;
//!
//! let tenant_id = TenantId::new();
//! let mut person = Person::new(
//!     tenant_id,
//!     Some("756.1234.5678.97".parse::<AhvNumber>().unwrap()),
//!     "Muster",
//!     "Anna",
//!     NaiveDate::from_ymd_opt(1985, 3, 12).unwrap(),
//! )
//! .unwrap();
//!
//! // A rename valid from mid-2022 yields a history snapshot.
//! let entry = person
//!     .change_name("Muster-Keller", "Anna", NaiveDate::from_ymd_opt(2022, 6, 1).unwrap())
//!     .unwrap();
//! assert_eq!(entry.last_name, "Muster-Keller");
//! ```

pub mod error;
pub mod history;
pub mod household;
pub mod person;
pub mod ports;
pub mod service;

pub use error::MasterdataError;
pub use history::{entry_as_of, PersonHistoryEntry};
pub use household::{Household, HouseholdMember, HouseholdRole};
pub use person::{Person, PersonStatus};
pub use ports::{
    memory::{InMemoryHouseholdRepository, InMemoryPersonRepository},
    HouseholdRepository, PersonRepository, PersonSearchCriteria,
};
pub use service::{
    CreatePersonRequest, HouseholdService, PersonService, UpdatePersonRequest,
};
