//! Person repository implementation
//!
//! PostgreSQL adapter for the person storage port. The live record
//! lives in `person`; every effective-dated change appends a row to
//! `person_history`, whose `seq` column records write order and breaks
//! ties between entries sharing an effective date.
//!
//! Queries are built at runtime so the crate compiles without a live
//! database; the schema contract is covered by the ignored integration
//! tests run against a real PostgreSQL instance.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{AhvNumber, HistoryEntryId, Page, PageRequest, PersonId, TenantId};
use domain_masterdata::history::PersonHistoryEntry;
use domain_masterdata::person::Person;
use domain_masterdata::ports::{PersonRepository, PersonSearchCriteria};
use domain_masterdata::MasterdataError;

use crate::error::{map_query_error, map_save_error, DatabaseError};

const PERSON_COLUMNS: &str = "id, tenant_id, ahv_nr, last_name, first_name, date_of_birth, \
     street, city, postal_code, status, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, person_id, effective_date, recorded_at, last_name, first_name, date_of_birth, \
     street, city, postal_code";

/// Row mapping for the `person` table
#[derive(Debug, sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    tenant_id: Uuid,
    ahv_nr: Option<String>,
    last_name: String,
    first_name: String,
    date_of_birth: NaiveDate,
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PersonRow {
    fn into_domain(self) -> Result<Person, MasterdataError> {
        let ahv_nr = match self.ahv_nr {
            Some(raw) => Some(AhvNumber::new(raw)?),
            None => None,
        };
        Ok(Person {
            id: PersonId::from(self.id),
            tenant_id: TenantId::from(self.tenant_id),
            ahv_nr,
            last_name: self.last_name,
            first_name: self.first_name,
            date_of_birth: self.date_of_birth,
            street: self.street,
            city: self.city,
            postal_code: self.postal_code,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row mapping for the `person_history` table
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    person_id: Uuid,
    effective_date: NaiveDate,
    recorded_at: DateTime<Utc>,
    last_name: String,
    first_name: String,
    date_of_birth: NaiveDate,
    street: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
}

impl HistoryRow {
    fn into_domain(self) -> PersonHistoryEntry {
        PersonHistoryEntry {
            id: HistoryEntryId::from(self.id),
            person_id: PersonId::from(self.person_id),
            effective_date: self.effective_date,
            recorded_at: self.recorded_at,
            last_name: self.last_name,
            first_name: self.first_name,
            date_of_birth: self.date_of_birth,
            street: self.street,
            city: self.city,
            postal_code: self.postal_code,
        }
    }
}

/// PostgreSQL implementation of the person storage port
#[derive(Debug, Clone)]
pub struct PgPersonRepository {
    pool: PgPool,
}

impl PgPersonRepository {
    /// Creates a new repository over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends the search criteria as AND-combined filters
    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, criteria: &PersonSearchCriteria) {
        if let Some(ref last_name) = criteria.last_name {
            builder.push(" AND last_name ILIKE ");
            builder.push_bind(format!("%{last_name}%"));
        }
        if let Some(ref first_name) = criteria.first_name {
            builder.push(" AND first_name ILIKE ");
            builder.push_bind(format!("%{first_name}%"));
        }
        if let Some(ref ahv_nr) = criteria.ahv_nr {
            builder.push(" AND ahv_nr = ");
            builder.push_bind(ahv_nr.as_str().to_string());
        }
        if let Some(date_of_birth) = criteria.date_of_birth {
            builder.push(" AND date_of_birth = ");
            builder.push_bind(date_of_birth);
        }
        if let Some(ref prefix) = criteria.postal_code {
            builder.push(" AND postal_code LIKE ");
            builder.push_bind(format!("{prefix}%"));
        }
    }
}

#[async_trait]
impl PersonRepository for PgPersonRepository {
    #[instrument(skip(self, person), fields(person_id = %person.id))]
    async fn save(&self, person: Person) -> Result<Person, MasterdataError> {
        debug!("Saving person");
        sqlx::query(
            r#"
            INSERT INTO person (id, tenant_id, ahv_nr, last_name, first_name, date_of_birth,
                                street, city, postal_code, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                ahv_nr = EXCLUDED.ahv_nr,
                last_name = EXCLUDED.last_name,
                first_name = EXCLUDED.first_name,
                date_of_birth = EXCLUDED.date_of_birth,
                street = EXCLUDED.street,
                city = EXCLUDED.city,
                postal_code = EXCLUDED.postal_code,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::from(person.id))
        .bind(Uuid::from(person.tenant_id))
        .bind(person.ahv_nr.as_ref().map(|a| a.as_str().to_string()))
        .bind(&person.last_name)
        .bind(&person.first_name)
        .bind(person.date_of_birth)
        .bind(&person.street)
        .bind(&person.city)
        .bind(&person.postal_code)
        .bind(person.status.as_str())
        .bind(person.created_at)
        .bind(person.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_save_error(e, "Person", "ahv_nr"))?;

        Ok(person)
    }

    #[instrument(skip(self), fields(person_id = %id))]
    async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>, MasterdataError> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {PERSON_COLUMNS} FROM person WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        row.map(PersonRow::into_domain).transpose()
    }

    #[instrument(skip(self), fields(person_id = %id, tenant_id = %tenant_id))]
    async fn find_by_id_and_tenant_id(
        &self,
        id: PersonId,
        tenant_id: TenantId,
    ) -> Result<Option<Person>, MasterdataError> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {PERSON_COLUMNS} FROM person WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        row.map(PersonRow::into_domain).transpose()
    }

    #[instrument(skip(self, ahv_nr), fields(tenant_id = %tenant_id))]
    async fn find_by_ahv_nr(
        &self,
        ahv_nr: &AhvNumber,
        tenant_id: TenantId,
    ) -> Result<Option<Person>, MasterdataError> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {PERSON_COLUMNS} FROM person WHERE ahv_nr = $1 AND tenant_id = $2"
        ))
        .bind(ahv_nr.as_str())
        .bind(Uuid::from(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        row.map(PersonRow::into_domain).transpose()
    }

    async fn find_by_tenant_id(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError> {
        self.search(tenant_id, &PersonSearchCriteria::default(), page)
            .await
    }

    #[instrument(skip(self, criteria), fields(tenant_id = %tenant_id))]
    async fn search(
        &self,
        tenant_id: TenantId,
        criteria: &PersonSearchCriteria,
        page: PageRequest,
    ) -> Result<Page<Person>, MasterdataError> {
        debug!("Searching persons: {:?}", criteria);

        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM person WHERE tenant_id = ");
        count_builder.push_bind(Uuid::from(tenant_id));
        Self::push_filters(&mut count_builder, criteria);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_error)?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {PERSON_COLUMNS} FROM person WHERE tenant_id = "
        ));
        builder.push_bind(Uuid::from(tenant_id));
        Self::push_filters(&mut builder, criteria);
        builder.push(" ORDER BY lower(last_name), lower(first_name), id LIMIT ");
        builder.push_bind(i64::from(page.size));
        builder.push(" OFFSET ");
        builder.push_bind(page.offset() as i64);

        let rows: Vec<PersonRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_error)?;
        let items = rows
            .into_iter()
            .map(PersonRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, page, total as u64))
    }

    async fn exists_by_ahv_nr(
        &self,
        ahv_nr: &AhvNumber,
        tenant_id: TenantId,
    ) -> Result<bool, MasterdataError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM person WHERE ahv_nr = $1 AND tenant_id = $2)",
        )
        .bind(ahv_nr.as_str())
        .bind(Uuid::from(tenant_id))
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;
        Ok(exists)
    }

    #[instrument(skip(self, person), fields(person_id = %person.id))]
    async fn delete(&self, person: &Person) -> Result<(), MasterdataError> {
        debug!("Erasing person and history");
        // ON DELETE CASCADE takes the history rows with it.
        sqlx::query("DELETE FROM person WHERE id = $1")
            .bind(Uuid::from(person.id))
            .execute(&self.pool)
            .await
            .map_err(map_query_error)?;
        Ok(())
    }

    #[instrument(skip(self, entry), fields(person_id = %entry.person_id))]
    async fn save_history(
        &self,
        entry: PersonHistoryEntry,
    ) -> Result<PersonHistoryEntry, MasterdataError> {
        sqlx::query(
            r#"
            INSERT INTO person_history (id, person_id, effective_date, recorded_at,
                                        last_name, first_name, date_of_birth,
                                        street, city, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::from(entry.id))
        .bind(Uuid::from(entry.person_id))
        .bind(entry.effective_date)
        .bind(entry.recorded_at)
        .bind(&entry.last_name)
        .bind(&entry.first_name)
        .bind(entry.date_of_birth)
        .bind(&entry.street)
        .bind(&entry.city)
        .bind(&entry.postal_code)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::ForeignKeyViolation(_) => MasterdataError::validation(
                "PersonHistoryEntry",
                "person_id",
                format!("person {} does not exist", entry.person_id),
            ),
            other => MasterdataError::storage(other),
        })?;
        Ok(entry)
    }

    async fn find_history_by_person_id(
        &self,
        person_id: PersonId,
    ) -> Result<Vec<PersonHistoryEntry>, MasterdataError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM person_history \
             WHERE person_id = $1 ORDER BY effective_date, seq"
        ))
        .bind(Uuid::from(person_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;
        Ok(rows.into_iter().map(HistoryRow::into_domain).collect())
    }

    #[instrument(skip(self), fields(person_id = %person_id, %date))]
    async fn find_history_at(
        &self,
        person_id: PersonId,
        date: NaiveDate,
    ) -> Result<Option<PersonHistoryEntry>, MasterdataError> {
        // Last value before or at the date; seq breaks effective-date
        // ties in favor of the later write.
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM person_history \
             WHERE person_id = $1 AND effective_date <= $2 \
             ORDER BY effective_date DESC, seq DESC LIMIT 1"
        ))
        .bind(Uuid::from(person_id))
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;
        Ok(row.map(HistoryRow::into_domain))
    }
}
