//! Postgres-backed replenishment store.
//!
//! Table layout (created out of band; this crate runs no migrations):
//!
//! ```text
//! StockEvents  (event_id, hospital_id, product_code, current_stock_units,
//!               daily_consumption_units, days_of_supply, event_source, received_timestamp)
//! Orders       (order_id, hospital_id, product_code, order_quantity,
//!               priority, order_status, order_source, created_at)
//! DecisionLogs (decision_id, event_id, order_id, decision_type, decision_reason,
//!               days_of_supply_at_decision, threshold_used)
//! ESBLogs      (log_id, message_id, source_hospital_id, target_service, latency_ms, status)
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (not null / check) | `23502`, `23514` | `Constraint` |
//! | Database (undefined table) | `42P01` | `MissingTable` |
//! | Database (other) | any other | `Query` |
//! | Io, Tls, Protocol, PoolTimedOut, PoolClosed, WorkerCrashed | N/A | `Unavailable` |
//! | Other | N/A | `Query` |

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use replenish_replenishment::{Decision, ObservabilityRecord, Order, StockEvent};

use super::r#trait::{ReplenishmentStore, StoreConnector, StoreError, Table};
use crate::config::StoreConfig;

/// Opens one `PgConnection` per batch.
///
/// Built without options when no store is configured; every connect then
/// fails with `Unavailable`, which makes batches run decision-only.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    options: Option<PgConnectOptions>,
}

impl PostgresConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self {
            options: Some(options),
        }
    }

    pub fn unconfigured() -> Self {
        Self { options: None }
    }

    pub fn from_config(config: Option<&StoreConfig>) -> Self {
        match config {
            Some(c) => Self::new(c.connect_options()),
            None => Self::unconfigured(),
        }
    }
}

#[async_trait]
impl StoreConnector for PostgresConnector {
    type Store = PostgresStore;

    #[instrument(skip(self), err)]
    async fn connect(&self) -> Result<Self::Store, StoreError> {
        let options = self
            .options
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("store not configured (DB_HOST unset)".to_string()))?;

        let conn = PgConnection::connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        debug!("store connection acquired");
        Ok(PostgresStore {
            conn: Mutex::new(Some(conn)),
        })
    }
}

/// A single Postgres connection scoped to one batch invocation.
///
/// Statements run in autocommit mode, one per record.
#[derive(Debug)]
pub struct PostgresStore {
    conn: Mutex<Option<PgConnection>>,
}

impl PostgresStore {
    async fn run(
        &self,
        table: Table,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("connection already released".to_string()))?;

        query
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(|e| map_sqlx_error(table.as_str(), e))
    }
}

#[async_trait]
impl ReplenishmentStore for PostgresStore {
    #[instrument(skip(self, event), fields(event_id = %event.id), err)]
    async fn insert_stock_event(&self, event: &StockEvent) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO StockEvents (
                event_id,
                hospital_id,
                product_code,
                current_stock_units,
                daily_consumption_units,
                days_of_supply,
                event_source,
                received_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id.as_str())
        .bind(&event.hospital_id)
        .bind(&event.product_code)
        .bind(event.current_stock_units)
        .bind(event.daily_consumption_units)
        .bind(event.days_of_supply)
        .bind(event.source.as_str())
        .bind(event.received_at);

        self.run(Table::StockEvents, query).await
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO Orders (
                order_id,
                hospital_id,
                product_code,
                order_quantity,
                priority,
                order_status,
                order_source,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_str())
        .bind(&order.hospital_id)
        .bind(&order.product_code)
        .bind(order.quantity)
        .bind(order.priority.as_str())
        .bind(order.status.as_str())
        .bind(order.source.as_str())
        .bind(order.created_at);

        self.run(Table::Orders, query).await
    }

    #[instrument(
        skip(self, decision),
        fields(decision_id = %decision.id, decision_type = decision.decision_type.as_str()),
        err
    )]
    async fn insert_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO DecisionLogs (
                decision_id,
                event_id,
                order_id,
                decision_type,
                decision_reason,
                days_of_supply_at_decision,
                threshold_used
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(decision.id.as_str())
        .bind(decision.event_id.as_str())
        .bind(decision.order_id.as_ref().map(|id| id.as_str()))
        .bind(decision.decision_type.as_str())
        .bind(&decision.reason)
        .bind(decision.days_of_supply)
        .bind(decision.threshold_used);

        self.run(Table::DecisionLogs, query).await
    }

    #[instrument(skip(self, record), fields(log_id = %record.id, status = record.status.as_str()), err)]
    async fn insert_observability(&self, record: &ObservabilityRecord) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO ESBLogs (
                log_id,
                message_id,
                source_hospital_id,
                target_service,
                latency_ms,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.message_id)
        .bind(record.source_hospital_id.as_deref())
        .bind(&record.target_service)
        .bind(record.latency_ms)
        .bind(record.status.as_str());

        self.run(Table::EsbLogs, query).await
    }

    async fn release(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "store connection close failed");
            }
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23502") | Some("23514") => StoreError::Constraint(msg),
                Some("42P01") => StoreError::MissingTable(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            StoreError::Unavailable(format!("connection failure in {}: {}", operation, err))
        }
        _ => StoreError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}
