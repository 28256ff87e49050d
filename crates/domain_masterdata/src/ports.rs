//! Master data storage ports
//!
//! This module defines the single storage-port boundary of the
//! subsystem: the [`PersonRepository`] and [`HouseholdRepository`]
//! traits. Concrete implementations are selected by dependency injection
//! at process start: the in-memory adapters in [`memory`] for tests and
//! development, the PostgreSQL adapters in the infrastructure crate for
//! production. No other polymorphic dispatch exists in the subsystem.
//!
//! # Tenant scope guard
//!
//! Every operation that can be scoped by tenant takes a `TenantId` and
//! must filter by it, even where the unique id alone would find the row.
//! This is defense in depth against cross-tenant leakage through id
//! guessing. `find_by_id` without a tenant exists solely for the
//! administrative erasure path and must not be used in request handling.
//!
//! # Not-found semantics
//!
//! Lookups return `Result<Option<_>, _>`: absence is a checked, visible
//! outcome at every call site, never an error and never a null.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_kernel::{AhvNumber, HouseholdId, Page, PageRequest, PersonId, TenantId};

use crate::error::MasterdataError;
use crate::history::PersonHistoryEntry;
use crate::household::Household;
use crate::person::Person;

/// Optional criteria for the person search
///
/// Each supplied criterion narrows the result set (logical AND); absent
/// criteria impose no constraint. Name criteria match case-insensitive
/// substrings; AHV number and date of birth match exactly; the postal
/// code matches as a prefix (`"80"` finds `"8001"` and `"8045"`).
#[derive(Debug, Clone, Default)]
pub struct PersonSearchCriteria {
    /// Case-insensitive substring of the last name
    pub last_name: Option<String>,
    /// Case-insensitive substring of the first name
    pub first_name: Option<String>,
    /// Exact AHV number
    pub ahv_nr: Option<AhvNumber>,
    /// Exact date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Postal code prefix
    pub postal_code: Option<String>,
}

impl PersonSearchCriteria {
    /// Creates a criteria set matching by last name
    pub fn by_last_name(last_name: impl Into<String>) -> Self {
        Self {
            last_name: Some(last_name.into()),
            ..Default::default()
        }
    }

    /// Creates a criteria set matching by exact AHV number
    pub fn by_ahv_nr(ahv_nr: AhvNumber) -> Self {
        Self {
            ahv_nr: Some(ahv_nr),
            ..Default::default()
        }
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.last_name.is_none()
            && self.first_name.is_none()
            && self.ahv_nr.is_none()
            && self.date_of_birth.is_none()
            && self.postal_code.is_none()
    }

    /// Checks a person against all supplied criteria
    pub fn matches(&self, person: &Person) -> bool {
        if let Some(ref needle) = self.last_name {
            if !person
                .last_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(ref needle) = self.first_name {
            if !person
                .first_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(ref ahv_nr) = self.ahv_nr {
            if person.ahv_nr.as_ref() != Some(ahv_nr) {
                return false;
            }
        }
        if let Some(dob) = self.date_of_birth {
            if person.date_of_birth != dob {
                return false;
            }
        }
        if let Some(ref prefix) = self.postal_code {
            match person.postal_code.as_deref() {
                Some(code) if code.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Storage port for the Person aggregate and its history
#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// Inserts or updates a person
    ///
    /// Implementations must reject a save that would leave two persons
    /// of the same tenant with the same AHV number, surfacing a
    /// `Conflict` error. Two concurrent saves racing for the same
    /// (tenant, AHV) pair must be serialized; exactly one wins.
    async fn save(&self, person: Person) -> Result<Person, MasterdataError>;

    /// Looks up a person by id without tenant scope
    ///
    /// Reserved for the administrative erasure path.
    async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>, MasterdataError>;

    /// Tenant-guarded lookup by id
    async fn find_by_id_and_tenant_id(
        &self,
        id: PersonId,
        tenant_id: TenantId,
    ) -> Result<Option<Person>, MasterdataError>;

    /// Tenant-guarded lookup by AHV number; at most one result
    async fn find_by_ahv_nr(
        &self,
        ahv_nr: &AhvNumber,
        tenant_id: TenantId,
    ) -> Result<Option<Person>, MasterdataError>;

    /// Paginated listing of a tenant's persons, stable ordering
    async fn find_by_tenant_id(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError>;

    /// Multi-criteria search within a tenant
    ///
    /// An empty criteria set returns the tenant's full paginated
    /// listing, identical to [`find_by_tenant_id`](Self::find_by_tenant_id).
    async fn search(
        &self,
        tenant_id: TenantId,
        criteria: &PersonSearchCriteria,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError>;

    /// Pre-check for the per-tenant AHV uniqueness invariant
    async fn exists_by_ahv_nr(
        &self,
        ahv_nr: &AhvNumber,
        tenant_id: TenantId,
    ) -> Result<bool, MasterdataError>;

    /// Physically deletes a person and their history (erasure path)
    async fn delete(&self, person: &Person) -> Result<(), MasterdataError>;

    /// Appends an immutable history snapshot
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the referenced person does not
    /// exist.
    async fn save_history(
        &self,
        entry: PersonHistoryEntry,
    ) -> Result<PersonHistoryEntry, MasterdataError>;

    /// Full edit trail, ascending by effective date (write order on ties)
    async fn find_history_by_person_id(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<PersonHistoryEntry>, MasterdataError>;

    /// The snapshot authoritative as of `date`
    ///
    /// Last-value-before-or-at semantics: the entry with the greatest
    /// effective date ≤ `date`, later write winning ties. `None` when
    /// `date` predates the person's first entry.
    async fn find_history_at(
        &self,
        person_id: PersonId,
        date: NaiveDate,
    ) -> Result<Option<PersonHistoryEntry>, MasterdataError>;
}

/// Storage port for the Household aggregate
#[async_trait]
pub trait HouseholdRepository: Send + Sync {
    /// Inserts or updates a household
    ///
    /// Implementations must verify that every referenced person id
    /// resolves within the household's tenant: an unknown person id is
    /// a `Validation` error, a person belonging to another tenant is a
    /// `Conflict`. The service layer checks this too; the port is the
    /// second layer, guarding callers that bypass the service.
    async fn save(&self, household: Household) -> Result<Household, MasterdataError>;

    /// Looks up a household by id without tenant scope
    ///
    /// Reserved for administrative tooling.
    async fn find_by_id(&self, id: HouseholdId) -> Result<Option<Household>, MasterdataError>;

    /// Tenant-guarded lookup by id
    async fn find_by_id_and_tenant_id(
        &self,
        id: HouseholdId,
        tenant_id: TenantId,
    ) -> Result<Option<Household>, MasterdataError>;

    /// Paginated listing of a tenant's households, stable ordering
    async fn find_by_tenant_id(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Household>, MasterdataError>;

    /// The household a person currently belongs to, if any
    ///
    /// A person belongs to at most one household per tenant.
    async fn find_by_person_id(
        &self,
        person_id: PersonId,
        tenant_id: TenantId,
    ) -> Result<Option<Household>, MasterdataError>;

    /// Deletes an empty household
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` error while the household still has current
    /// members.
    async fn delete(&self, household: &Household) -> Result<(), MasterdataError>;
}

pub mod memory {
    //! In-memory adapters
    //!
    //! The test/development storage engine. State lives in `HashMap`s
    //! behind `tokio::sync::RwLock`; the person adapter enforces the
    //! per-tenant AHV uniqueness inside its write lock, so concurrent
    //! saves racing for the same pair are serialized and exactly one
    //! wins. History is an append-only `Vec` whose index is the write
    //! order used by the as-of tie-break.

    use std::collections::HashMap;
    use tokio::sync::RwLock;

    use super::*;
    use crate::history::{entry_as_of, sort_ascending};

    /// In-memory implementation of [`PersonRepository`]
    #[derive(Debug, Default)]
    pub struct InMemoryPersonRepository {
        persons: RwLock<HashMap<PersonId, Person>>,
        history: RwLock<Vec<PersonHistoryEntry>>,
    }

    impl InMemoryPersonRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    /// Stable listing order: last name, first name, then id
    fn person_order(a: &Person, b: &Person) -> std::cmp::Ordering {
        (a.last_name.to_lowercase(), a.first_name.to_lowercase(), a.id.to_string()).cmp(&(
            b.last_name.to_lowercase(),
            b.first_name.to_lowercase(),
            b.id.to_string(),
        ))
    }

    fn paginate<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
        let total = items.len() as u64;
        let offset = page.offset().min(total) as usize;
        let mut items: Vec<T> = items.drain(offset..).collect();
        items.truncate(page.size as usize);
        Page::new(items, page, total)
    }

    #[async_trait]
    impl PersonRepository for InMemoryPersonRepository {
        async fn save(&self, person: Person) -> Result<Person, MasterdataError> {
            let mut persons = self.persons.write().await;
            // Uniqueness check and insert under one write lock: this is
            // the serialization point for racing saves.
            if let Some(ref ahv_nr) = person.ahv_nr {
                let duplicate = persons.values().any(|existing| {
                    existing.id != person.id
                        && existing.tenant_id == person.tenant_id
                        && existing.ahv_nr.as_ref() == Some(ahv_nr)
                });
                if duplicate {
                    return Err(MasterdataError::conflict("Person", "ahv_nr", ahv_nr));
                }
            }
            persons.insert(person.id, person.clone());
            Ok(person)
        }

        async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>, MasterdataError> {
            Ok(self.persons.read().await.get(&id).cloned())
        }

        async fn find_by_id_and_tenant_id(
            &self,
            id: PersonId,
            tenant_id: TenantId,
        ) -> Result<Option<Person>, MasterdataError> {
            Ok(self
                .persons
                .read()
                .await
                .get(&id)
                .filter(|p| p.tenant_id == tenant_id)
                .cloned())
        }

        async fn find_by_ahv_nr(
            &self,
            ahv_nr: &AhvNumber,
            tenant_id: TenantId,
        ) -> Result<Option<Person>, MasterdataError> {
            Ok(self
                .persons
                .read()
                .await
                .values()
                .find(|p| p.tenant_id == tenant_id && p.ahv_nr.as_ref() == Some(ahv_nr))
                .cloned())
        }

        async fn find_by_tenant_id(
            &self,
            tenant_id: TenantId,
            page: PageRequest,
        ) -> Result<Page<Person>, MasterdataError> {
            self.search(tenant_id, &PersonSearchCriteria::default(), page)
                .await
        }

        async fn search(
            &self,
            tenant_id: TenantId,
            criteria: &PersonSearchCriteria,
            page: PageRequest,
        ) -> Result<Page<Person>, MasterdataError> {
            let persons = self.persons.read().await;
            let mut matches: Vec<Person> = persons
                .values()
                .filter(|p| p.tenant_id == tenant_id && criteria.matches(p))
                .cloned()
                .collect();
            matches.sort_by(person_order);
            Ok(paginate(matches, page))
        }

        async fn exists_by_ahv_nr(
            &self,
            ahv_nr: &AhvNumber,
            tenant_id: TenantId,
        ) -> Result<bool, MasterdataError> {
            Ok(self.find_by_ahv_nr(ahv_nr, tenant_id).await?.is_some())
        }

        async fn delete(&self, person: &Person) -> Result<(), MasterdataError> {
            self.persons.write().await.remove(&person.id);
            // Erasure cascades to the edit trail.
            self.history
                .write()
                .await
                .retain(|entry| entry.person_id != person.id);
            Ok(())
        }

        async fn save_history(
            &self,
            entry: PersonHistoryEntry,
        ) -> Result<PersonHistoryEntry, MasterdataError> {
            if !self.persons.read().await.contains_key(&entry.person_id) {
                return Err(MasterdataError::validation(
                    "PersonHistoryEntry",
                    "person_id",
                    format!("person {} does not exist", entry.person_id),
                ));
            }
            self.history.write().await.push(entry.clone());
            Ok(entry)
        }

        async fn find_history_by_person_id(
            &self,
            person_id: PersonId,
        ) -> Result<Vec<PersonHistoryEntry>, MasterdataError> {
            let history = self.history.read().await;
            let mut entries: Vec<PersonHistoryEntry> = history
                .iter()
                .filter(|entry| entry.person_id == person_id)
                .cloned()
                .collect();
            sort_ascending(&mut entries);
            Ok(entries)
        }

        async fn find_history_at(
            &self,
            person_id: PersonId,
            date: NaiveDate,
        ) -> Result<Option<PersonHistoryEntry>, MasterdataError> {
            let history = self.history.read().await;
            let entries: Vec<PersonHistoryEntry> = history
                .iter()
                .filter(|entry| entry.person_id == person_id)
                .cloned()
                .collect();
            Ok(entry_as_of(&entries, date).cloned())
        }
    }

    /// In-memory implementation of [`HouseholdRepository`]
    ///
    /// Holds a handle on the person store so `save` can resolve member
    /// ids within the household's tenant, mirroring what the PostgreSQL
    /// adapter checks inside its save transaction.
    #[derive(Debug)]
    pub struct InMemoryHouseholdRepository {
        households: RwLock<HashMap<HouseholdId, Household>>,
        persons: std::sync::Arc<InMemoryPersonRepository>,
    }

    impl InMemoryHouseholdRepository {
        pub fn new(persons: std::sync::Arc<InMemoryPersonRepository>) -> Self {
            Self {
                households: RwLock::new(HashMap::new()),
                persons,
            }
        }
    }

    #[async_trait]
    impl HouseholdRepository for InMemoryHouseholdRepository {
        async fn save(&self, household: Household) -> Result<Household, MasterdataError> {
            {
                let persons = self.persons.persons.read().await;
                for member in &household.members {
                    match persons.get(&member.person_id) {
                        None => {
                            return Err(MasterdataError::validation(
                                "HouseholdMember",
                                "person_id",
                                format!("person {} does not exist", member.person_id),
                            ))
                        }
                        Some(p) if p.tenant_id != household.tenant_id => {
                            return Err(MasterdataError::conflict(
                                "HouseholdMember",
                                "person_id",
                                member.person_id,
                            ))
                        }
                        Some(_) => {}
                    }
                }
            }
            self.households
                .write()
                .await
                .insert(household.id, household.clone());
            Ok(household)
        }

        async fn find_by_id(
            &self,
            id: HouseholdId,
        ) -> Result<Option<Household>, MasterdataError> {
            Ok(self.households.read().await.get(&id).cloned())
        }

        async fn find_by_id_and_tenant_id(
            &self,
            id: HouseholdId,
            tenant_id: TenantId,
        ) -> Result<Option<Household>, MasterdataError> {
            Ok(self
                .households
                .read()
                .await
                .get(&id)
                .filter(|h| h.tenant_id == tenant_id)
                .cloned())
        }

        async fn find_by_tenant_id(
            &self,
            tenant_id: TenantId,
            page: PageRequest,
        ) -> Result<Page<Household>, MasterdataError> {
            let households = self.households.read().await;
            let mut matches: Vec<Household> = households
                .values()
                .filter(|h| h.tenant_id == tenant_id)
                .cloned()
                .collect();
            matches.sort_by(|a, b| {
                (a.name.to_lowercase(), a.id.to_string())
                    .cmp(&(b.name.to_lowercase(), b.id.to_string()))
            });
            Ok(paginate(matches, page))
        }

        async fn find_by_person_id(
            &self,
            person_id: PersonId,
            tenant_id: TenantId,
        ) -> Result<Option<Household>, MasterdataError> {
            Ok(self
                .households
                .read()
                .await
                .values()
                .find(|h| {
                    h.tenant_id == tenant_id
                        && h.current_members().iter().any(|m| m.person_id == person_id)
                })
                .cloned())
        }

        async fn delete(&self, household: &Household) -> Result<(), MasterdataError> {
            let mut households = self.households.write().await;
            // Check the stored state, not the caller's copy.
            if let Some(stored) = households.get(&household.id) {
                if !stored.is_empty() {
                    return Err(MasterdataError::conflict(
                        "Household",
                        "members",
                        stored.current_members().len(),
                    ));
                }
                households.remove(&household.id);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{InMemoryHouseholdRepository, InMemoryPersonRepository};
    use super::*;
    use crate::household::HouseholdRole;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person(tenant_id: TenantId, ahv: Option<&str>, last: &str, first: &str) -> Person {
        Person::new(
            tenant_id,
            ahv.map(|a| AhvNumber::new(a).unwrap()),
            last,
            first,
            date(1980, 5, 1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        let saved = repo
            .save(person(tenant, Some("756.1234.5678.97"), "Muster", "Anna"))
            .await
            .unwrap();
        let found = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn test_tenant_isolation_on_id_lookup() {
        let repo = InMemoryPersonRepository::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let saved = repo
            .save(person(tenant_a, None, "Muster", "Anna"))
            .await
            .unwrap();

        assert!(repo.find_by_id(saved.id).await.unwrap().is_some());
        assert!(repo
            .find_by_id_and_tenant_id(saved.id, tenant_b)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_by_id_and_tenant_id(saved.id, tenant_a)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_duplicate_ahv_same_tenant_conflicts() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        repo.save(person(tenant, Some("756.1234.5678.97"), "Muster", "Anna"))
            .await
            .unwrap();
        let err = repo
            .save(person(tenant, Some("756.1234.5678.97"), "Beispiel", "Beat"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_same_ahv_different_tenant_allowed() {
        let repo = InMemoryPersonRepository::new();
        repo.save(person(TenantId::new(), Some("756.1234.5678.97"), "Muster", "Anna"))
            .await
            .unwrap();
        repo.save(person(TenantId::new(), Some("756.1234.5678.97"), "Beispiel", "Beat"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resave_same_person_keeps_ahv() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        let mut saved = repo
            .save(person(tenant, Some("756.1234.5678.97"), "Muster", "Anna"))
            .await
            .unwrap();
        saved.change_address(None, None, Some("8001".to_string()), date(2020, 1, 1));
        // Updating the same record must not trip the uniqueness check.
        repo.save(saved).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_requires_existing_person() {
        let repo = InMemoryPersonRepository::new();
        let entry = PersonHistoryEntry::new(
            PersonId::new(),
            date(2020, 1, 1),
            "Muster",
            "Anna",
            date(1980, 5, 1),
            None,
            None,
            None,
        );
        assert!(repo.save_history(entry).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_history_trail_ascending() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        let mut p = repo
            .save(person(tenant, None, "Muster", "Anna"))
            .await
            .unwrap();

        let later = p.change_address(None, None, Some("8002".to_string()), date(2023, 6, 1));
        repo.save_history(later).await.unwrap();
        let earlier = p.change_address(None, None, Some("8001".to_string()), date(2020, 1, 1));
        repo.save_history(earlier).await.unwrap();

        let trail = repo.find_history_by_person_id(p.id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].effective_date, date(2020, 1, 1));
        assert_eq!(trail[1].effective_date, date(2023, 6, 1));
    }

    #[tokio::test]
    async fn test_search_criteria_combinations() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        let mut anna = person(tenant, Some("756.1111.2222.33"), "Muster", "Anna");
        anna.change_address(None, None, Some("8001".to_string()), date(2020, 1, 1));
        repo.save(anna).await.unwrap();
        repo.save(person(tenant, None, "Mustermann", "Beat"))
            .await
            .unwrap();
        repo.save(person(tenant, None, "Keller", "Clara"))
            .await
            .unwrap();

        // Substring, case-insensitive
        let by_name = repo
            .search(
                tenant,
                &PersonSearchCriteria::by_last_name("muster"),
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(by_name.total_items, 2);

        // AND across criteria
        let narrowed = repo
            .search(
                tenant,
                &PersonSearchCriteria {
                    last_name: Some("muster".to_string()),
                    postal_code: Some("80".to_string()),
                    ..Default::default()
                },
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(narrowed.total_items, 1);
        assert_eq!(narrowed.items[0].first_name, "Anna");

        // Empty criteria equals full listing
        let all = repo
            .search(tenant, &PersonSearchCriteria::default(), PageRequest::first())
            .await
            .unwrap();
        let listed = repo
            .find_by_tenant_id(tenant, PageRequest::first())
            .await
            .unwrap();
        assert_eq!(all.items, listed.items);
        assert_eq!(all.total_items, 3);
    }

    #[tokio::test]
    async fn test_pagination_is_stable() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        for i in 0..5 {
            repo.save(person(tenant, None, &format!("Name{i}"), "Test"))
                .await
                .unwrap();
        }
        let page_one_a = repo
            .find_by_tenant_id(tenant, PageRequest::new(0, 2))
            .await
            .unwrap();
        let page_one_b = repo
            .find_by_tenant_id(tenant, PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page_one_a.items, page_one_b.items);
        assert_eq!(page_one_a.total_items, 5);
        assert_eq!(page_one_a.total_pages(), 3);

        let page_three = repo
            .find_by_tenant_id(tenant, PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page_three.items.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_erases_history() {
        let repo = InMemoryPersonRepository::new();
        let tenant = TenantId::new();
        let mut p = repo
            .save(person(tenant, None, "Muster", "Anna"))
            .await
            .unwrap();
        let entry = p.change_address(None, None, Some("8001".to_string()), date(2020, 1, 1));
        repo.save_history(entry).await.unwrap();

        repo.delete(&p).await.unwrap();
        assert!(repo.find_by_id(p.id).await.unwrap().is_none());
        assert!(repo.find_history_by_person_id(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_household_delete_non_empty_conflicts() {
        let persons = std::sync::Arc::new(InMemoryPersonRepository::new());
        let repo = InMemoryHouseholdRepository::new(persons.clone());
        let tenant = TenantId::new();
        let anna = persons
            .save(person(tenant, None, "Muster", "Anna"))
            .await
            .unwrap();
        let mut household = Household::new(tenant, "Familie Muster").unwrap();
        household
            .add_member(anna.id, HouseholdRole::Primary, date(2020, 1, 1))
            .unwrap();
        let saved = repo.save(household).await.unwrap();

        assert!(repo.delete(&saved).await.unwrap_err().is_conflict());

        let mut emptied = saved.clone();
        emptied
            .remove_member(saved.head_person_id.unwrap(), date(2024, 1, 1))
            .unwrap();
        let emptied = repo.save(emptied).await.unwrap();
        repo.delete(&emptied).await.unwrap();
        assert!(repo.find_by_id(emptied.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_household_lookup_by_person() {
        let persons = std::sync::Arc::new(InMemoryPersonRepository::new());
        let repo = InMemoryHouseholdRepository::new(persons.clone());
        let tenant = TenantId::new();
        let p = persons
            .save(person(tenant, None, "Muster", "Anna"))
            .await
            .unwrap();

        let mut household = Household::new(tenant, "Familie Muster").unwrap();
        household
            .add_member(p.id, HouseholdRole::Primary, date(2020, 1, 1))
            .unwrap();
        let saved = repo.save(household).await.unwrap();

        let found = repo.find_by_person_id(p.id, tenant).await.unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        // Tenant guard also applies here
        assert!(repo
            .find_by_person_id(p.id, TenantId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_household_save_rejects_cross_tenant_member() {
        let persons = std::sync::Arc::new(InMemoryPersonRepository::new());
        let repo = InMemoryHouseholdRepository::new(persons.clone());
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let foreign = persons
            .save(person(tenant_b, None, "Muster", "Anna"))
            .await
            .unwrap();

        // A household referencing a person of another tenant must not
        // be persisted, even when the caller bypasses the service.
        let mut household = Household::new(tenant_a, "Familie Muster").unwrap();
        household
            .add_member(foreign.id, HouseholdRole::Primary, date(2020, 1, 1))
            .unwrap();
        let err = repo.save(household).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_household_save_requires_existing_members() {
        let persons = std::sync::Arc::new(InMemoryPersonRepository::new());
        let repo = InMemoryHouseholdRepository::new(persons);
        let tenant = TenantId::new();

        let mut household = Household::new(tenant, "Familie Muster").unwrap();
        household
            .add_member(PersonId::new(), HouseholdRole::Primary, date(2020, 1, 1))
            .unwrap();
        let err = repo.save(household).await.unwrap_err();
        assert!(err.is_validation());
    }
}
