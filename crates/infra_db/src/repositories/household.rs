//! Household repository implementation
//!
//! PostgreSQL adapter for the household storage port. A household row
//! carries the aggregate header; memberships, including ended ones,
//! live in `household_member` and are rewritten as a set on every save,
//! inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{HouseholdId, Page, PageRequest, PersonId, TenantId};
use domain_masterdata::household::{Household, HouseholdMember};
use domain_masterdata::ports::HouseholdRepository;
use domain_masterdata::MasterdataError;

use crate::error::{map_query_error, map_save_error, DatabaseError};

const HOUSEHOLD_COLUMNS: &str = "id, tenant_id, name, head_person_id, created_at, updated_at";

/// Row mapping for the `household` table
#[derive(Debug, sqlx::FromRow)]
struct HouseholdRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    head_person_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row mapping for the `household_member` table
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    person_id: Uuid,
    role: String,
    joined_on: NaiveDate,
    left_on: Option<NaiveDate>,
}

impl MemberRow {
    fn into_domain(self) -> Result<HouseholdMember, MasterdataError> {
        Ok(HouseholdMember {
            person_id: PersonId::from(self.person_id),
            role: self.role.parse()?,
            joined_on: self.joined_on,
            left_on: self.left_on,
        })
    }
}

fn assemble(row: HouseholdRow, members: Vec<MemberRow>) -> Result<Household, MasterdataError> {
    Ok(Household {
        id: HouseholdId::from(row.id),
        tenant_id: TenantId::from(row.tenant_id),
        name: row.name,
        head_person_id: row.head_person_id.map(PersonId::from),
        members: members
            .into_iter()
            .map(MemberRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Classifies a membership insert failure
///
/// The partial unique index on the current Primary is a role conflict;
/// other duplicate keys concern the membership row itself. A foreign
/// key failure means the referenced person vanished between the
/// tenancy check and the insert and is reported like any other dangling
/// person reference.
fn map_member_save_error(error: sqlx::Error) -> MasterdataError {
    if let sqlx::Error::Database(ref db_err) = error {
        if db_err.constraint() == Some("uq_household_current_primary") {
            return MasterdataError::conflict("HouseholdMember", "role", db_err.message());
        }
    }
    match DatabaseError::from(error) {
        DatabaseError::DuplicateEntry(message) => {
            MasterdataError::conflict("HouseholdMember", "person_id", message)
        }
        DatabaseError::ForeignKeyViolation(message) => {
            MasterdataError::validation("HouseholdMember", "person_id", message)
        }
        other => MasterdataError::storage(other),
    }
}

/// PostgreSQL implementation of the household storage port
#[derive(Debug, Clone)]
pub struct PgHouseholdRepository {
    pool: PgPool,
}

impl PgHouseholdRepository {
    /// Creates a new repository over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_members(&self, id: HouseholdId) -> Result<Vec<MemberRow>, MasterdataError> {
        sqlx::query_as::<_, MemberRow>(
            "SELECT person_id, role, joined_on, left_on FROM household_member \
             WHERE household_id = $1 ORDER BY joined_on, person_id",
        )
        .bind(Uuid::from(id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)
    }

    async fn load(
        &self,
        row: Option<HouseholdRow>,
    ) -> Result<Option<Household>, MasterdataError> {
        match row {
            Some(row) => {
                let members = self.load_members(HouseholdId::from(row.id)).await?;
                assemble(row, members).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl HouseholdRepository for PgHouseholdRepository {
    #[instrument(skip(self, household), fields(household_id = %household.id))]
    async fn save(&self, household: Household) -> Result<Household, MasterdataError> {
        debug!("Saving household with {} memberships", household.members.len());
        let mut tx = self.pool.begin().await.map_err(map_query_error)?;

        // Every referenced person must resolve within the household's
        // tenant. Checked inside the transaction so a concurrent person
        // erasure still trips the member foreign key below.
        let mut member_ids: Vec<Uuid> = household
            .members
            .iter()
            .map(|m| Uuid::from(m.person_id))
            .collect();
        member_ids.sort();
        member_ids.dedup();
        if !member_ids.is_empty() {
            let resolved: Vec<(Uuid, Uuid)> =
                sqlx::query_as("SELECT id, tenant_id FROM person WHERE id = ANY($1)")
                    .bind(&member_ids)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(map_query_error)?;
            for id in &member_ids {
                match resolved.iter().find(|(person_id, _)| person_id == id) {
                    None => {
                        return Err(MasterdataError::validation(
                            "HouseholdMember",
                            "person_id",
                            format!("person {} does not exist", PersonId::from(*id)),
                        ))
                    }
                    Some((_, tenant_id)) if *tenant_id != Uuid::from(household.tenant_id) => {
                        return Err(MasterdataError::conflict(
                            "HouseholdMember",
                            "person_id",
                            PersonId::from(*id),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO household (id, tenant_id, name, head_person_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                head_person_id = EXCLUDED.head_person_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::from(household.id))
        .bind(Uuid::from(household.tenant_id))
        .bind(&household.name)
        .bind(household.head_person_id.map(Uuid::from))
        .bind(household.created_at)
        .bind(household.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_save_error(e, "Household", "id"))?;

        // The aggregate owns the membership set; replace it wholesale.
        sqlx::query("DELETE FROM household_member WHERE household_id = $1")
            .bind(Uuid::from(household.id))
            .execute(&mut *tx)
            .await
            .map_err(map_query_error)?;

        for member in &household.members {
            sqlx::query(
                r#"
                INSERT INTO household_member (household_id, person_id, role, joined_on, left_on)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::from(household.id))
            .bind(Uuid::from(member.person_id))
            .bind(member.role.as_str())
            .bind(member.joined_on)
            .bind(member.left_on)
            .execute(&mut *tx)
            .await
            .map_err(map_member_save_error)?;
        }

        tx.commit().await.map_err(map_query_error)?;
        Ok(household)
    }

    async fn find_by_id(&self, id: HouseholdId) -> Result<Option<Household>, MasterdataError> {
        let row = sqlx::query_as::<_, HouseholdRow>(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM household WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        self.load(row).await
    }

    #[instrument(skip(self), fields(household_id = %id, tenant_id = %tenant_id))]
    async fn find_by_id_and_tenant_id(
        &self,
        id: HouseholdId,
        tenant_id: TenantId,
    ) -> Result<Option<Household>, MasterdataError> {
        let row = sqlx::query_as::<_, HouseholdRow>(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM household WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        self.load(row).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn find_by_tenant_id(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Household>, MasterdataError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM household WHERE tenant_id = $1")
                .bind(Uuid::from(tenant_id))
                .fetch_one(&self.pool)
                .await
                .map_err(map_query_error)?;

        let rows = sqlx::query_as::<_, HouseholdRow>(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM household WHERE tenant_id = $1 \
             ORDER BY lower(name), id LIMIT $2 OFFSET $3"
        ))
        .bind(Uuid::from(tenant_id))
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let members = self.load_members(HouseholdId::from(row.id)).await?;
            items.push(assemble(row, members)?);
        }
        Ok(Page::new(items, page, total as u64))
    }

    #[instrument(skip(self), fields(person_id = %person_id, tenant_id = %tenant_id))]
    async fn find_by_person_id(
        &self,
        person_id: PersonId,
        tenant_id: TenantId,
    ) -> Result<Option<Household>, MasterdataError> {
        let row = sqlx::query_as::<_, HouseholdRow>(
            "SELECT h.id, h.tenant_id, h.name, h.head_person_id, h.created_at, h.updated_at \
             FROM household h \
             JOIN household_member m ON m.household_id = h.id \
             WHERE m.person_id = $1 AND m.left_on IS NULL AND h.tenant_id = $2 \
             LIMIT 1",
        )
        .bind(Uuid::from(person_id))
        .bind(Uuid::from(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        self.load(row).await
    }

    #[instrument(skip(self, household), fields(household_id = %household.id))]
    async fn delete(&self, household: &Household) -> Result<(), MasterdataError> {
        let mut tx = self.pool.begin().await.map_err(map_query_error)?;

        let current: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM household_member \
             WHERE household_id = $1 AND left_on IS NULL",
        )
        .bind(Uuid::from(household.id))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_query_error)?;
        if current > 0 {
            return Err(MasterdataError::conflict("Household", "members", current));
        }

        sqlx::query("DELETE FROM household WHERE id = $1")
            .bind(Uuid::from(household.id))
            .execute(&mut *tx)
            .await
            .map_err(map_query_error)?;
        tx.commit().await.map_err(map_query_error)?;
        Ok(())
    }
}
