use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use voyage_core::repository::PackageRepository;
use voyage_core::{CoreError, CoreResult, TravelPackage};

use crate::error::db;
use crate::StoreError;

pub struct PgPackageRepository {
    pool: PgPool,
}

impl PgPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: i64,
    title: String,
    destination: String,
    duration_days: i32,
    price: Decimal,
    currency: String,
    is_active: bool,
}

impl TryFrom<PackageRow> for TravelPackage {
    type Error = CoreError;

    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        let duration_days = u32::try_from(row.duration_days)
            .map_err(|_| StoreError::Corrupt(format!("package {} has negative duration", row.id)))?;
        Ok(TravelPackage {
            id: row.id,
            title: row.title,
            destination: row.destination,
            duration_days,
            price: row.price,
            currency: row.currency,
            is_active: row.is_active,
        })
    }
}

#[async_trait]
impl PackageRepository for PgPackageRepository {
    async fn get_package(&self, id: i64) -> CoreResult<Option<TravelPackage>> {
        sqlx::query_as::<_, PackageRow>(
            "SELECT id, title, destination, duration_days, price, currency, is_active FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .map(TravelPackage::try_from)
        .transpose()
    }

    async fn list_active(&self) -> CoreResult<Vec<TravelPackage>> {
        let rows = sqlx::query_as::<_, PackageRow>(
            "SELECT id, title, destination, duration_days, price, currency, is_active \
             FROM packages WHERE is_active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.into_iter().map(TravelPackage::try_from).collect()
    }
}
