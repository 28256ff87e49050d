//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants, plus fake-data helpers for
//! realistic names.

use chrono::NaiveDate;
use core_kernel::AhvNumber;
use domain_masterdata::household::HouseholdRole;
use domain_masterdata::person::Person;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use proptest::prelude::*;

use crate::fixtures::TenantFixtures;

/// Strategy for generating well-formed AHV numbers
pub fn ahv_number_strategy() -> impl Strategy<Value = AhvNumber> {
    "[0-9]{4}\\.[0-9]{4}\\.[0-9]{2}".prop_map(|suffix| {
        AhvNumber::new(format!("756.{suffix}")).expect("generated number is well formed")
    })
}

/// Strategy for generating plausible dates of birth
pub fn date_of_birth_strategy() -> impl Strategy<Value = NaiveDate> {
    (1930i32..2020i32, 1u32..=12u32, 1u32..=28u32)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("day capped at 28"))
}

/// Strategy for generating effective dates in the working range
pub fn effective_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2026i32, 1u32..=12u32, 1u32..=28u32)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("day capped at 28"))
}

/// Strategy for generating non-blank name parts
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,15}"
}

/// Strategy for generating household roles
pub fn household_role_strategy() -> impl Strategy<Value = HouseholdRole> {
    prop_oneof![
        Just(HouseholdRole::Primary),
        Just(HouseholdRole::Partner),
        Just(HouseholdRole::Child),
        Just(HouseholdRole::Other),
    ]
}

/// Strategy for generating valid persons in the default tenant
pub fn person_strategy() -> impl Strategy<Value = Person> {
    (name_strategy(), name_strategy(), date_of_birth_strategy()).prop_map(
        |(last, first, dob)| {
            Person::new(TenantFixtures::tenant_a(), None, last, first, dob)
                .expect("generated fields satisfy the aggregate rules")
        },
    )
}

/// A realistic random last name
pub fn fake_last_name() -> String {
    LastName().fake()
}

/// A realistic random first name
pub fn fake_first_name() -> String {
    FirstName().fake()
}
