//! PostgreSQL repository integration tests
//!
//! These tests need a running PostgreSQL instance and are ignored by
//! default. Run them with:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/masterdata_test cargo test -p infra_db -- --ignored
//! ```
//!
//! Each test works with fresh tenants, so a shared database stays
//! usable across runs.

use chrono::NaiveDate;
use core_kernel::{PageRequest, PersonId, TenantId};
use domain_masterdata::{
    HouseholdRole, HouseholdRepository, PersonRepository, PersonSearchCriteria,
};
use infra_db::{create_pool_from_url, run_migrations, DatabasePool, PgHouseholdRepository, PgPersonRepository};
use test_utils::{AhvFixtures, DateFixtures, HouseholdBuilder, PersonBuilder};

fn init_tracing() {
    // Set RUST_LOG=debug to see the adapter's query logging while
    // debugging a failing test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn test_pool() -> DatabasePool {
    init_tracing();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
    let pool = create_pool_from_url(&url).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    DateFixtures::date(y, m, d)
}

#[tokio::test]
#[ignore]
async fn test_person_round_trip() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();

    let person = PersonBuilder::new()
        .with_tenant(tenant)
        .with_ahv_nr(AhvFixtures::anna())
        .with_address("Bahnhofstrasse 1", "Zürich", "8001")
        .build();
    let saved = repo.save(person).await.unwrap();

    let found = repo
        .find_by_id_and_tenant_id(saved.id, tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, saved);

    let by_ahv = repo
        .find_by_ahv_nr(&AhvFixtures::anna(), tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_ahv.id, saved.id);
}

#[tokio::test]
#[ignore]
async fn test_unique_index_rejects_duplicate_ahv() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();

    repo.save(
        PersonBuilder::new()
            .with_tenant(tenant)
            .with_ahv_nr(AhvFixtures::beat())
            .build(),
    )
    .await
    .unwrap();

    // Straight to the adapter, bypassing the service pre-check: the
    // index itself must reject the duplicate.
    let err = repo
        .save(
            PersonBuilder::new()
                .with_tenant(tenant)
                .with_name("Beispiel", "Beat")
                .with_ahv_nr(AhvFixtures::beat())
                .build(),
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Other tenants are unaffected.
    repo.save(
        PersonBuilder::new()
            .with_tenant(TenantId::new())
            .with_ahv_nr(AhvFixtures::beat())
            .build(),
    )
    .await
    .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_history_as_of_queries() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();
    let mut person = repo
        .save(PersonBuilder::new().with_tenant(tenant).build())
        .await
        .unwrap();

    let first = person.change_address(
        None,
        Some("Zürich".to_string()),
        Some("8001".to_string()),
        date(2020, 1, 1),
    );
    repo.save(person.clone()).await.unwrap();
    repo.save_history(first).await.unwrap();

    let second = person.change_address(
        None,
        Some("Zürich".to_string()),
        Some("8002".to_string()),
        date(2023, 6, 1),
    );
    repo.save(person.clone()).await.unwrap();
    repo.save_history(second).await.unwrap();

    assert!(repo
        .find_history_at(person.id, date(2019, 12, 31))
        .await
        .unwrap()
        .is_none());
    let between = repo
        .find_history_at(person.id, date(2021, 7, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(between.postal_code.as_deref(), Some("8001"));
    let latest = repo
        .find_history_at(person.id, date(2026, 1, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.postal_code.as_deref(), Some("8002"));

    let trail = repo.find_history_by_person_id(person.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].effective_date, date(2020, 1, 1));
}

#[tokio::test]
#[ignore]
async fn test_history_tie_break_prefers_later_write() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();
    let mut person = repo
        .save(PersonBuilder::new().with_tenant(tenant).build())
        .await
        .unwrap();

    let first = person.change_address(None, None, Some("8001".to_string()), date(2022, 3, 1));
    repo.save_history(first).await.unwrap();
    let second = person.change_address(None, None, Some("8045".to_string()), date(2022, 3, 1));
    repo.save_history(second).await.unwrap();

    let state = repo
        .find_history_at(person.id, date(2022, 3, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.postal_code.as_deref(), Some("8045"));
}

#[tokio::test]
#[ignore]
async fn test_search_and_pagination() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();

    for (last, first, postal) in [
        ("Muster", "Anna", "8001"),
        ("Mustermann", "Beat", "8045"),
        ("Keller", "Clara", "3011"),
    ] {
        repo.save(
            PersonBuilder::new()
                .with_tenant(tenant)
                .with_name(last, first)
                .with_address("Teststrasse 1", "Stadt", postal)
                .build(),
        )
        .await
        .unwrap();
    }

    let by_name = repo
        .search(
            tenant,
            &PersonSearchCriteria::by_last_name("muster"),
            PageRequest::first(),
        )
        .await
        .unwrap();
    assert_eq!(by_name.total_items, 2);

    let by_prefix = repo
        .search(
            tenant,
            &PersonSearchCriteria {
                postal_code: Some("80".to_string()),
                ..Default::default()
            },
            PageRequest::first(),
        )
        .await
        .unwrap();
    assert_eq!(by_prefix.total_items, 2);

    let page = repo
        .find_by_tenant_id(tenant, PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_next());
}

#[tokio::test]
#[ignore]
async fn test_delete_cascades_to_history() {
    let repo = PgPersonRepository::new(test_pool().await);
    let tenant = TenantId::new();
    let mut person = repo
        .save(PersonBuilder::new().with_tenant(tenant).build())
        .await
        .unwrap();
    let entry = person.change_address(None, None, Some("8001".to_string()), date(2020, 1, 1));
    repo.save_history(entry).await.unwrap();

    repo.delete(&person).await.unwrap();
    assert!(repo.find_by_id(person.id).await.unwrap().is_none());
    assert!(repo
        .find_history_by_person_id(person.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn test_household_membership_persistence() {
    let pool = test_pool().await;
    let persons = PgPersonRepository::new(pool.clone());
    let households = PgHouseholdRepository::new(pool);
    let tenant = TenantId::new();

    let anna = persons
        .save(PersonBuilder::new().with_tenant(tenant).build())
        .await
        .unwrap();
    let beat = persons
        .save(
            PersonBuilder::new()
                .with_tenant(tenant)
                .with_name("Muster", "Beat")
                .build(),
        )
        .await
        .unwrap();

    let household = HouseholdBuilder::new()
        .with_tenant(tenant)
        .with_member(anna.id, HouseholdRole::Primary, date(2020, 1, 1))
        .with_member(beat.id, HouseholdRole::Partner, date(2020, 1, 1))
        .build();
    let saved = households.save(household).await.unwrap();

    let found = households
        .find_by_id_and_tenant_id(saved.id, tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.current_members().len(), 2);
    assert_eq!(found.head_person_id, Some(anna.id));

    let via_person = households
        .find_by_person_id(beat.id, tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(via_person.id, saved.id);

    // Occupied households refuse deletion.
    assert!(households.delete(&found).await.unwrap_err().is_conflict());

    let mut emptied = found.clone();
    emptied.remove_member(anna.id, date(2024, 1, 1)).unwrap();
    emptied.remove_member(beat.id, date(2024, 1, 1)).unwrap();
    let emptied = households.save(emptied).await.unwrap();
    households.delete(&emptied).await.unwrap();
    assert!(households.find_by_id(emptied.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_household_save_rejects_cross_tenant_member() {
    let pool = test_pool().await;
    let persons = PgPersonRepository::new(pool.clone());
    let households = PgHouseholdRepository::new(pool);
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();

    let foreign = persons
        .save(PersonBuilder::new().with_tenant(tenant_b).build())
        .await
        .unwrap();

    // Saving through the repository, without the service in front,
    // must still refuse a membership from another tenant.
    let household = HouseholdBuilder::new()
        .with_tenant(tenant_a)
        .with_member(foreign.id, HouseholdRole::Primary, date(2020, 1, 1))
        .build();
    let err = households.save(household).await.unwrap_err();
    assert!(err.is_conflict());

    let dangling = HouseholdBuilder::new()
        .with_tenant(tenant_a)
        .with_member(PersonId::new(), HouseholdRole::Primary, date(2020, 1, 1))
        .build();
    let err = households.save(dangling).await.unwrap_err();
    assert!(err.is_validation());
}
