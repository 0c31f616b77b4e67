use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use diesel::{
    Connection, OptionalExtension,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    AsyncPgConnection, RunQueryDsl,
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::AsyncDieselConnectionManager,
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};
use vapub_common::DataSourceConfig;

use crate::{
    models::{CertificateRow, CrlRow},
    schema::{certificatedata, crldata},
    storage::{CertificateStore, CrlStore, ReplicationTarget, StoreError, WriteOutcome},
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Fingerprint used by the health probe; never matches a real row.
const PROBE_FINGERPRINT: &str = "XX";

type ConnectionManager = AsyncDieselConnectionManager<AsyncPgConnection>;

pub struct PostgresStorage {
    name: String,
    pool: Pool<ConnectionManager>,
}

impl std::fmt::Debug for PostgresStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PostgresStorage {
    /// Create a pooled target for the named data source.
    ///
    /// Connections are opened lazily, so an unreachable database is only
    /// reported on first use (or by [`ReplicationTarget::ping`]).
    pub async fn new(name: &str, data_source: &DataSourceConfig) -> Result<Self, StoreError> {
        let manager = ConnectionManager::new(&data_source.url);
        let pool = Pool::builder()
            .max_size(data_source.max_connections)
            .connection_timeout(Duration::from_secs(data_source.connect_timeout_secs))
            .build(manager)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(data_source = name, "Created connection pool");

        Ok(Self {
            name: name.to_string(),
            pool,
        })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, ConnectionManager>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

/// Apply the embedded schema migrations to the database at `url`.
pub async fn run_migrations(url: &str) -> Result<(), StoreError> {
    let url = url.to_string();

    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let applied = conn.run_pending_migrations(MIGRATIONS)?;
        info!(count = applied.len(), "Applied pending migrations");
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Internal(Box::new(e)))?
}

fn classify(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(
            kind @ (DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation),
            info,
        ) => StoreError::ConstraintViolation(format!("{kind:?}: {}", info.message())),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StoreError::Connection(info.message().to_string())
        }
        other => StoreError::Query(other),
    }
}

fn insert_outcome(result: QueryResult<usize>) -> WriteOutcome {
    match result {
        Ok(_) => WriteOutcome::Inserted,
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            debug!(reason = info.message(), "Insert hit existing row");
            WriteOutcome::Conflict
        }
        Err(e) => WriteOutcome::Failed(classify(e)),
    }
}

fn update_outcome(result: QueryResult<usize>) -> WriteOutcome {
    match result {
        Ok(n) => WriteOutcome::Updated(n),
        Err(e) => WriteOutcome::Failed(classify(e)),
    }
}

#[async_trait]
impl CertificateStore for PostgresStorage {
    #[instrument(skip_all, fields(data_source = %self.name, fingerprint = %row.fingerprint))]
    async fn insert(&self, row: &CertificateRow) -> WriteOutcome {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => return WriteOutcome::Failed(e),
        };

        insert_outcome(
            diesel::insert_into(certificatedata::table)
                .values((row, certificatedata::row_version.eq(0)))
                .execute(&mut *conn)
                .await,
        )
    }

    #[instrument(skip_all, fields(data_source = %self.name, fingerprint = %row.fingerprint))]
    async fn update(&self, row: &CertificateRow) -> WriteOutcome {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => return WriteOutcome::Failed(e),
        };

        update_outcome(
            diesel::update(certificatedata::table.find(row.fingerprint.as_str()))
                .set((row, certificatedata::row_version.eq(certificatedata::row_version + 1)))
                .execute(&mut *conn)
                .await,
        )
    }
}

#[async_trait]
impl CrlStore for PostgresStorage {
    #[instrument(skip_all, fields(data_source = %self.name, fingerprint = %row.fingerprint))]
    async fn insert(&self, row: &CrlRow) -> WriteOutcome {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => return WriteOutcome::Failed(e),
        };

        insert_outcome(
            diesel::insert_into(crldata::table)
                .values((row, crldata::row_version.eq(0)))
                .execute(&mut *conn)
                .await,
        )
    }

    #[instrument(skip_all, fields(data_source = %self.name, fingerprint = %row.fingerprint))]
    async fn update(&self, row: &CrlRow) -> WriteOutcome {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => return WriteOutcome::Failed(e),
        };

        update_outcome(
            diesel::update(crldata::table.find(row.fingerprint.as_str()))
                .set((row, crldata::row_version.eq(crldata::row_version + 1)))
                .execute(&mut *conn)
                .await,
        )
    }
}

#[async_trait]
impl ReplicationTarget for PostgresStorage {
    fn data_source(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(data_source = %self.name))]
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;

        certificatedata::table
            .select(certificatedata::fingerprint)
            .filter(certificatedata::fingerprint.eq(PROBE_FINGERPRINT))
            .first::<String>(&mut *conn)
            .await
            .optional()
            .map_err(classify)?;

        Ok(())
    }
}
