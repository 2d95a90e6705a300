use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{Sku, Version};
use domain::{Batch, OrderLine, Product};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{ExpectedVersion, ProductStore, StagedProduct, check_expected_version},
};

/// PostgreSQL-backed product store.
///
/// Each product is a row in `products` plus its `batches` and their
/// `allocations`. Saves compare-and-set `version_number` inside one
/// transaction, so a stale writer rolls back without touching anything.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        sku: &Sku,
    ) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version_number FROM products WHERE sku = $1")
                .bind(sku.as_str())
                .fetch_optional(&mut **tx)
                .await?;
        Ok(version.map(Version::new))
    }

    /// Claims the product row at its expected version, bumping it to the new one.
    async fn claim(
        tx: &mut Transaction<'_, Postgres>,
        product: &Product,
        expected: ExpectedVersion,
    ) -> Result<()> {
        let sku = product.sku();
        let rows = match expected {
            ExpectedVersion::New => sqlx::query(
                "INSERT INTO products (sku, version_number) VALUES ($1, $2) ON CONFLICT (sku) DO NOTHING",
            )
            .bind(sku.as_str())
            .bind(product.version_number().as_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected(),
            ExpectedVersion::Exactly(version) => sqlx::query(
                "UPDATE products SET version_number = $2 WHERE sku = $1 AND version_number = $3",
            )
            .bind(sku.as_str())
            .bind(product.version_number().as_i64())
            .bind(version.as_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected(),
        };

        if rows == 0 {
            let current = Self::current_version(tx, sku).await?;
            check_expected_version(sku, expected, current)?;
        }
        Ok(())
    }

    async fn write_batches(tx: &mut Transaction<'_, Postgres>, product: &Product) -> Result<()> {
        // Allocations go with their batches via ON DELETE CASCADE
        sqlx::query("DELETE FROM batches WHERE sku = $1")
            .bind(product.sku().as_str())
            .execute(&mut **tx)
            .await?;

        for batch in product.batches() {
            sqlx::query(
                r#"
                INSERT INTO batches (reference, sku, purchased_quantity, eta)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(batch.reference().as_str())
            .bind(batch.sku().as_str())
            .bind(to_db_quantity(batch.purchased_quantity())?)
            .bind(batch.eta())
            .execute(&mut **tx)
            .await?;

            for line in batch.allocations() {
                sqlx::query(
                    r#"
                    INSERT INTO allocations (batch_reference, order_id, sku, qty)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(batch.reference().as_str())
                .bind(line.order_id.as_str())
                .bind(line.sku.as_str())
                .bind(to_db_quantity(line.qty)?)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    fn row_to_line(row: &PgRow) -> Result<(String, OrderLine)> {
        let batch_reference: String = row.try_get("batch_reference")?;
        let line = OrderLine::new(
            row.try_get::<String, _>("order_id")?,
            row.try_get::<String, _>("sku")?,
            from_db_quantity(row.try_get("qty")?)?,
        );
        Ok((batch_reference, line))
    }
}

fn to_db_quantity(qty: u32) -> Result<i32> {
    i32::try_from(qty).map_err(|_| StoreError::InvalidData(format!("quantity {qty} out of range")))
}

fn from_db_quantity(qty: i32) -> Result<u32> {
    u32::try_from(qty).map_err(|_| StoreError::InvalidData(format!("negative quantity {qty}")))
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn load(&self, sku: &Sku) -> Result<Option<Product>> {
        // One snapshot for the product row and its children
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let Some(version) = Self::current_version(&mut tx, sku).await? else {
            return Ok(None);
        };

        let mut lines: HashMap<String, Vec<OrderLine>> = HashMap::new();
        let allocation_rows = sqlx::query(
            r#"
            SELECT batch_reference, order_id, sku, qty
            FROM allocations
            WHERE sku = $1
            ORDER BY id ASC
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&mut *tx)
        .await?;
        for row in &allocation_rows {
            let (reference, line) = Self::row_to_line(row)?;
            lines.entry(reference).or_default().push(line);
        }

        let batch_rows = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta
            FROM batches
            WHERE sku = $1
            ORDER BY id ASC
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut batches = Vec::with_capacity(batch_rows.len());
        for row in batch_rows {
            let reference: String = row.try_get("reference")?;
            let allocations = lines.remove(&reference).unwrap_or_default();
            batches.push(Batch::restore(
                reference,
                row.try_get::<String, _>("sku")?,
                from_db_quantity(row.try_get("purchased_quantity")?)?,
                row.try_get::<Option<NaiveDate>, _>("eta")?,
                allocations,
            ));
        }

        tx.commit().await?;
        Ok(Some(Product::with_version(sku.clone(), batches, version)))
    }

    async fn save(&self, staged: Vec<StagedProduct>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in &staged {
            Self::claim(&mut tx, &entry.product, entry.expected).await?;
            Self::write_batches(&mut tx, &entry.product).await?;
        }

        tx.commit().await?;
        tracing::debug!(products = staged.len(), "products saved");
        Ok(())
    }
}
