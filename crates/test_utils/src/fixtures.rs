//! Test Fixtures
//!
//! Pre-built, deterministic test data. Identifier fixtures are process
//! stable so data created in one test helper is addressable from
//! another within the same test.

use chrono::NaiveDate;
use core_kernel::{AhvNumber, TenantId};
use once_cell::sync::Lazy;

/// Stable tenant identifiers
pub struct TenantFixtures;

static TENANT_A: Lazy<TenantId> = Lazy::new(TenantId::new);
static TENANT_B: Lazy<TenantId> = Lazy::new(TenantId::new);

impl TenantFixtures {
    /// The default tenant for single-tenant tests
    pub fn tenant_a() -> TenantId {
        *TENANT_A
    }

    /// A second tenant, for isolation tests
    pub fn tenant_b() -> TenantId {
        *TENANT_B
    }
}

/// Well-formed AHV numbers for test persons
pub struct AhvFixtures;

impl AhvFixtures {
    pub fn anna() -> AhvNumber {
        AhvNumber::new("756.1234.5678.97").unwrap()
    }

    pub fn beat() -> AhvNumber {
        AhvNumber::new("756.9876.5432.10").unwrap()
    }

    pub fn clara() -> AhvNumber {
        AhvNumber::new("756.1111.2222.33").unwrap()
    }

    /// The same number in its unformatted 13-digit form
    pub fn anna_unformatted() -> &'static str {
        "7561234567897"
    }
}

/// Dates used across the temporal tests
pub struct DateFixtures;

impl DateFixtures {
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    /// A date of birth safely in the past
    pub fn adult_dob() -> NaiveDate {
        Self::date(1985, 3, 12)
    }

    pub fn child_dob() -> NaiveDate {
        Self::date(2015, 9, 1)
    }
}
