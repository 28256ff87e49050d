//! Application services for the master data subsystem
//!
//! [`PersonService`] and [`HouseholdService`] are the use-case layer:
//! they own the orchestration that spans aggregate and storage port,
//! while the aggregates themselves own their invariants. Services
//! receive their ports as `Arc<dyn _>`, so the same code runs against
//! the in-memory engine in tests and PostgreSQL in production.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use core_kernel::{AhvNumber, HouseholdId, Page, PageRequest, PersonId, TenantId};

use crate::error::MasterdataError;
use crate::history::PersonHistoryEntry;
use crate::household::{Household, HouseholdRole};
use crate::person::Person;
use crate::ports::{HouseholdRepository, PersonRepository, PersonSearchCriteria};

/// Request payload for creating a person
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePersonRequest {
    /// AHV number in dotted or unformatted form, if known
    pub ahv_nr: Option<String>,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub first_name: String,
    pub date_of_birth: NaiveDate,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Request payload for an effective-dated person update
///
/// Name fields replace the current value when present. Address fields
/// replace the address as a whole whenever any of them is present, so a
/// move that drops the street clears it instead of keeping the stale
/// value.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePersonRequest {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub first_name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// The real-world date from which the new data applies
    pub effective_date: NaiveDate,
}

impl UpdatePersonRequest {
    fn touches_address(&self) -> bool {
        self.street.is_some() || self.city.is_some() || self.postal_code.is_some()
    }
}

fn check(request: &impl Validate, entity: &'static str) -> Result<(), MasterdataError> {
    request.validate().map_err(|errors| {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_default();
        MasterdataError::validation(entity, "request", format!("{field}: invalid value"))
    })
}

/// Use cases around the Person aggregate and its history
pub struct PersonService {
    repo: Arc<dyn PersonRepository>,
}

impl PersonService {
    pub fn new(repo: Arc<dyn PersonRepository>) -> Self {
        Self { repo }
    }

    /// Registers a new person for a tenant
    ///
    /// Enforces the per-tenant AHV uniqueness twice: a pre-check here
    /// for a clean `Conflict` error, and again inside the storage
    /// adapter for races the pre-check cannot see. A freshly created
    /// person has no history; the trail starts with the first
    /// effective-dated change.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        request: CreatePersonRequest,
    ) -> Result<Person, MasterdataError> {
        check(&request, "Person")?;
        let ahv_nr = match request.ahv_nr.as_deref() {
            Some(raw) => Some(raw.parse::<AhvNumber>()?),
            None => None,
        };
        if let Some(ref ahv_nr) = ahv_nr {
            if self.repo.exists_by_ahv_nr(ahv_nr, tenant_id).await? {
                return Err(MasterdataError::conflict("Person", "ahv_nr", ahv_nr));
            }
        }
        let mut person = Person::new(
            tenant_id,
            ahv_nr,
            request.last_name,
            request.first_name,
            request.date_of_birth,
        )?;
        person.street = request.street;
        person.city = request.city;
        person.postal_code = request.postal_code;

        let person = self.repo.save(person).await?;
        info!(person_id = %person.id, tenant_id = %tenant_id, "Person created");
        Ok(person)
    }

    /// Tenant-guarded lookup by id
    pub async fn get(
        &self,
        tenant_id: TenantId,
        id: PersonId,
    ) -> Result<Option<Person>, MasterdataError> {
        self.repo.find_by_id_and_tenant_id(id, tenant_id).await
    }

    /// Tenant-guarded lookup by AHV number
    pub async fn get_by_ahv_nr(
        &self,
        tenant_id: TenantId,
        ahv_nr: &AhvNumber,
    ) -> Result<Option<Person>, MasterdataError> {
        self.repo.find_by_ahv_nr(ahv_nr, tenant_id).await
    }

    /// Paginated listing of a tenant's persons
    pub async fn list(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError> {
        self.repo.find_by_tenant_id(tenant_id, page).await
    }

    /// Multi-criteria search within a tenant
    pub async fn search(
        &self,
        tenant_id: TenantId,
        criteria: &PersonSearchCriteria,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError> {
        self.repo.search(tenant_id, criteria, page).await
    }

    /// Applies an effective-dated update and records the snapshot
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: PersonId,
        request: UpdatePersonRequest,
    ) -> Result<Person, MasterdataError> {
        check(&request, "Person")?;
        let mut person = self
            .repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;

        if request.last_name.is_some() || request.first_name.is_some() {
            let last = request
                .last_name
                .clone()
                .unwrap_or_else(|| person.last_name.clone());
            let first = request
                .first_name
                .clone()
                .unwrap_or_else(|| person.first_name.clone());
            person.change_name(last, first, request.effective_date)?;
        }
        if request.touches_address() {
            person.change_address(
                request.street,
                request.city,
                request.postal_code,
                request.effective_date,
            );
        }
        // One snapshot per update, covering the combined change.
        let entry = person.snapshot(request.effective_date);
        let person = self.repo.save(person).await?;
        self.repo.save_history(entry).await?;
        Ok(person)
    }

    /// Renames a person as of a given date
    pub async fn change_name(
        &self,
        tenant_id: TenantId,
        id: PersonId,
        new_last_name: impl Into<String> + Send,
        new_first_name: impl Into<String> + Send,
        effective_date: NaiveDate,
    ) -> Result<Person, MasterdataError> {
        let mut person = self
            .repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        let entry = person.change_name(new_last_name, new_first_name, effective_date)?;
        let person = self.repo.save(person).await?;
        self.repo.save_history(entry).await?;
        Ok(person)
    }

    /// Full edit trail for a tenant's person, ascending
    pub async fn history(
        &self,
        tenant_id: TenantId,
        id: PersonId,
    ) -> Result<Vec<PersonHistoryEntry>, MasterdataError> {
        self.repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        self.repo.find_history_by_person_id(id).await
    }

    /// The person's data as it was valid on `date`
    ///
    /// `Ok(None)` means the person existed but no recorded state covers
    /// that date. An unknown or foreign-tenant id is a `NotFound` error.
    pub async fn state_at(
        &self,
        tenant_id: TenantId,
        id: PersonId,
        date: NaiveDate,
    ) -> Result<Option<PersonHistoryEntry>, MasterdataError> {
        self.repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        self.repo.find_history_at(id, date).await
    }

    /// Replaces a person's AHV number
    ///
    /// Re-checks the per-tenant uniqueness when a new number is set; the
    /// number change itself is not effective-dated and emits no
    /// snapshot.
    pub async fn change_ahv_nr(
        &self,
        tenant_id: TenantId,
        id: PersonId,
        ahv_nr: Option<AhvNumber>,
    ) -> Result<Person, MasterdataError> {
        let mut person = self
            .repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        if let Some(ref new_nr) = ahv_nr {
            if person.ahv_nr.as_ref() != Some(new_nr)
                && self.repo.exists_by_ahv_nr(new_nr, tenant_id).await?
            {
                return Err(MasterdataError::conflict("Person", "ahv_nr", new_nr));
            }
        }
        person.change_ahv_nr(ahv_nr);
        self.repo.save(person).await
    }

    /// Deactivates a person (soft lifecycle, record stays queryable)
    pub async fn deactivate(
        &self,
        tenant_id: TenantId,
        id: PersonId,
    ) -> Result<Person, MasterdataError> {
        let mut person = self
            .repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        person.deactivate();
        let person = self.repo.save(person).await?;
        info!(person_id = %id, tenant_id = %tenant_id, "Person deactivated");
        Ok(person)
    }

    /// Physically erases a person and their entire history
    pub async fn delete(
        &self,
        tenant_id: TenantId,
        id: PersonId,
    ) -> Result<(), MasterdataError> {
        let person = self
            .repo
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", id))?;
        self.repo.delete(&person).await?;
        info!(person_id = %id, tenant_id = %tenant_id, "Person erased");
        Ok(())
    }
}

/// Use cases around the Household aggregate
pub struct HouseholdService {
    households: Arc<dyn HouseholdRepository>,
    persons: Arc<dyn PersonRepository>,
}

impl HouseholdService {
    pub fn new(
        households: Arc<dyn HouseholdRepository>,
        persons: Arc<dyn PersonRepository>,
    ) -> Self {
        Self { households, persons }
    }

    /// Creates an empty household for a tenant
    pub async fn create(
        &self,
        tenant_id: TenantId,
        name: impl Into<String> + Send,
    ) -> Result<Household, MasterdataError> {
        let household = Household::new(tenant_id, name)?;
        let household = self.households.save(household).await?;
        info!(household_id = %household.id, tenant_id = %tenant_id, "Household created");
        Ok(household)
    }

    /// Tenant-guarded lookup by id
    pub async fn get(
        &self,
        tenant_id: TenantId,
        id: HouseholdId,
    ) -> Result<Option<Household>, MasterdataError> {
        self.households.find_by_id_and_tenant_id(id, tenant_id).await
    }

    /// Paginated listing of a tenant's households
    pub async fn list(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Household>, MasterdataError> {
        self.households.find_by_tenant_id(tenant_id, page).await
    }

    /// Adds a tenant's person to one of the tenant's households
    ///
    /// The person must exist within the same tenant and must not
    /// currently belong to any household. Role rules (single Primary,
    /// no duplicate membership) are enforced by the aggregate.
    pub async fn add_member(
        &self,
        tenant_id: TenantId,
        household_id: HouseholdId,
        person_id: PersonId,
        role: HouseholdRole,
        joined_on: NaiveDate,
    ) -> Result<Household, MasterdataError> {
        let mut household = self
            .households
            .find_by_id_and_tenant_id(household_id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Household", household_id))?;
        self.persons
            .find_by_id_and_tenant_id(person_id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Person", person_id))?;
        if let Some(existing) = self
            .households
            .find_by_person_id(person_id, tenant_id)
            .await?
        {
            return Err(MasterdataError::conflict(
                "HouseholdMember",
                "person_id",
                format!("{person_id} already belongs to household {}", existing.id),
            ));
        }
        household.add_member(person_id, role, joined_on)?;
        self.households.save(household).await
    }

    /// Ends a person's current membership as of `left_on`
    pub async fn remove_member(
        &self,
        tenant_id: TenantId,
        household_id: HouseholdId,
        person_id: PersonId,
        left_on: NaiveDate,
    ) -> Result<Household, MasterdataError> {
        let mut household = self
            .households
            .find_by_id_and_tenant_id(household_id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Household", household_id))?;
        household.remove_member(person_id, left_on)?;
        self.households.save(household).await
    }

    /// The household a tenant's person currently belongs to
    pub async fn find_for_person(
        &self,
        tenant_id: TenantId,
        person_id: PersonId,
    ) -> Result<Option<Household>, MasterdataError> {
        self.households.find_by_person_id(person_id, tenant_id).await
    }

    /// Deletes a household; fails with `Conflict` while members remain
    pub async fn delete(
        &self,
        tenant_id: TenantId,
        id: HouseholdId,
    ) -> Result<(), MasterdataError> {
        let household = self
            .households
            .find_by_id_and_tenant_id(id, tenant_id)
            .await?
            .ok_or_else(|| MasterdataError::not_found("Household", id))?;
        self.households.delete(&household).await?;
        info!(household_id = %id, tenant_id = %tenant_id, "Household deleted");
        Ok(())
    }
}
