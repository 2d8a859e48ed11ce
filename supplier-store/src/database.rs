use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use supplier_core::{StoreError, Supplier, SupplierFields, SupplierRepository};
use tracing::info;

use crate::app_config::DatabaseConfig;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(config.url.expose())
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SupplierRow {
    id: i64,
    company_name: String,
    contact_person: Option<String>,
    phone: Option<String>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            company_name: row.company_name,
            contact_person: row.contact_person.unwrap_or_default(),
            phone: row.phone.unwrap_or_default(),
        }
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Record store over the `suppliers` table. Each method runs exactly one statement on a
/// pooled connection that returns to the pool when the call completes.
pub struct PostgresSupplierRepository {
    pub pool: sqlx::PgPool,
}

impl PostgresSupplierRepository {
    pub fn new(db: &DbClient) -> Self {
        Self { pool: db.pool.clone() }
    }
}

#[async_trait]
impl SupplierRepository for PostgresSupplierRepository {
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        // No ORDER BY: callers must not rely on row order
        let rows = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, company_name, contact_person, phone FROM suppliers",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows.into_iter().map(Supplier::from).collect())
    }

    async fn insert_supplier(&self, fields: &SupplierFields) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO suppliers (company_name, contact_person, phone)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&fields.company_name)
        .bind(&fields.contact_person)
        .bind(&fields.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn update_supplier(&self, id: i64, fields: &SupplierFields) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET company_name = $1, contact_person = $2, phone = $3
            WHERE id = $4
            "#,
        )
        .bind(&fields.company_name)
        .bind(&fields.contact_person)
        .bind(&fields.phone)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }

    async fn delete_supplier(&self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
