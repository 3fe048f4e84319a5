use async_trait::async_trait;
use ridepool_core::{StoreError, StoreResult, UnitOfWork, UnitOfWorkFactory};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
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

    pub fn unit_of_work_factory(&self) -> PgUnitOfWorkFactory {
        PgUnitOfWorkFactory::new(self.pool.clone())
    }
}

/// Opens one Postgres transaction per unit of work
#[derive(Clone)]
pub struct PgUnitOfWorkFactory {
    pool: Pool<Postgres>,
}

impl PgUnitOfWorkFactory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Repository calls issued through this value share its transaction.
/// sqlx rolls the transaction back if it is dropped uncommitted.
pub struct PgUnitOfWork {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_error)
    }
}

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(db.message().to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

pub(crate) fn status_error(err: ridepool_shared::UnknownStatus) -> StoreError {
    StoreError::Codec(err.to_string())
}
