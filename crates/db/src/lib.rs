use std::time::Duration;

use sqlx::{
    PgPool, Postgres, Transaction,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::info;

pub mod models;

/// Page size applied when the caller does not send one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Upper bound on any single list request.
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Clone)]
pub struct DBService {
    pub pool: PgPool,
}

impl DBService {
    /// Connects to Postgres and applies pending migrations.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<DBService, sqlx::Error> {
        let options: PgConnectOptions = database_url.parse()?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "Database pool ready, migrations applied");

        Ok(DBService { pool })
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Offset/limit derived from 1-based `page` and `page_size` query params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let limit = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// True when the error is a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// True when the error is a Postgres foreign-key violation.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::new(None, None), Page { limit: 50, offset: 0 });
        assert_eq!(Page::new(Some(3), Some(20)), Page { limit: 20, offset: 40 });
        assert_eq!(Page::new(Some(0), Some(10_000)), Page { limit: 200, offset: 0 });
        assert_eq!(Page::new(Some(-4), Some(0)), Page { limit: 1, offset: 0 });
    }

    #[test]
    fn huge_page_numbers_saturate() {
        assert_eq!(
            Page::new(Some(i64::MAX), Some(50)),
            Page { limit: 50, offset: i64::MAX }
        );
        assert_eq!(
            Page::new(Some(i64::MAX / 100), Some(200)),
            Page { limit: 200, offset: i64::MAX }
        );
    }
}
