//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about.

use chrono::NaiveDate;
use core_kernel::{AhvNumber, PersonId, TenantId};
use domain_masterdata::household::{Household, HouseholdRole};
use domain_masterdata::person::Person;
use domain_masterdata::service::CreatePersonRequest;

use crate::fixtures::{DateFixtures, TenantFixtures};

/// Builder for test persons
pub struct PersonBuilder {
    tenant_id: TenantId,
    ahv_nr: Option<AhvNumber>,
    last_name: String,
    first_name: String,
    date_of_birth: NaiveDate,
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
}

impl Default for PersonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            tenant_id: TenantFixtures::tenant_a(),
            ahv_nr: None,
            last_name: "Muster".to_string(),
            first_name: "Anna".to_string(),
            date_of_birth: DateFixtures::adult_dob(),
            street: None,
            city: None,
            postal_code: None,
        }
    }

    /// Sets the owning tenant
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Sets the AHV number
    pub fn with_ahv_nr(mut self, ahv_nr: AhvNumber) -> Self {
        self.ahv_nr = Some(ahv_nr);
        self
    }

    /// Sets both name parts
    pub fn with_name(mut self, last: impl Into<String>, first: impl Into<String>) -> Self {
        self.last_name = last.into();
        self.first_name = first.into();
        self
    }

    /// Sets the date of birth
    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = date_of_birth;
        self
    }

    /// Sets the full address
    pub fn with_address(
        mut self,
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        self.street = Some(street.into());
        self.city = Some(city.into());
        self.postal_code = Some(postal_code.into());
        self
    }

    /// Builds the person aggregate
    pub fn build(self) -> Person {
        let mut person = Person::new(
            self.tenant_id,
            self.ahv_nr,
            self.last_name,
            self.first_name,
            self.date_of_birth,
        )
        .expect("builder defaults must be valid");
        person.street = self.street;
        person.city = self.city;
        person.postal_code = self.postal_code;
        person
    }

    /// Builds the equivalent create request for service-level tests
    pub fn build_request(self) -> CreatePersonRequest {
        CreatePersonRequest {
            ahv_nr: self.ahv_nr.map(|a| a.as_str().to_string()),
            last_name: self.last_name,
            first_name: self.first_name,
            date_of_birth: self.date_of_birth,
            street: self.street,
            city: self.city,
            postal_code: self.postal_code,
        }
    }
}

/// Builder for test households
pub struct HouseholdBuilder {
    tenant_id: TenantId,
    name: String,
    members: Vec<(PersonId, HouseholdRole, NaiveDate)>,
}

impl Default for HouseholdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HouseholdBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            tenant_id: TenantFixtures::tenant_a(),
            name: "Familie Muster".to_string(),
            members: Vec::new(),
        }
    }

    /// Sets the owning tenant
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Sets the household name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a member joining on the given date
    pub fn with_member(
        mut self,
        person_id: PersonId,
        role: HouseholdRole,
        joined_on: NaiveDate,
    ) -> Self {
        self.members.push((person_id, role, joined_on));
        self
    }

    /// Builds the household aggregate
    pub fn build(self) -> Household {
        let mut household =
            Household::new(self.tenant_id, self.name).expect("builder defaults must be valid");
        for (person_id, role, joined_on) in self.members {
            household
                .add_member(person_id, role, joined_on)
                .expect("builder members must satisfy membership rules");
        }
        household
    }
}
