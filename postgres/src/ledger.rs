//! [`TicketLedger`] backed by `PostgreSQL`.

use crate::config::PostgresConfig;
use chrono::{DateTime, Utc};
use qr_tickets_core::{
    CitizenId, LedgerError, LedgerFuture, MAX_TICKETS_PER_OWNER, Owner, Ticket, TicketDetails,
    TicketId, TicketLedger,
};
use sqlx::PgPool;
use uuid::Uuid;

type OwnerRow = (String, String, String);
type TicketRow = (Uuid, DateTime<Utc>, String);

/// `PostgreSQL` ticket ledger.
///
/// Owns the connection pool. Clones share it.
#[derive(Clone, Debug)]
pub struct PostgresTicketLedger {
    pool: PgPool,
}

impl PostgresTicketLedger {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with the given configuration.
    ///
    /// Connections are established lazily up to `min_connections`; the first
    /// connection is opened eagerly so a bad URL fails here.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if the configuration is invalid or the
    /// database is unreachable.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, LedgerError> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout,
            "Connected to ticket database"
        );

        Ok(Self { pool })
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert_owner_inner(
        &self,
        id: &CitizenId,
        first_name: &str,
        last_name: &str,
    ) -> Result<Owner, LedgerError> {
        let inserted: Option<OwnerRow> = sqlx::query_as(
            r"
            INSERT INTO owner (id, first_name, last_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, first_name, last_name
            ",
        )
        .bind(id.as_str())
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("upsert_owner"))?;

        if let Some(row) = inserted {
            tracing::info!(owner_id = %id, "Owner created");
            return Ok(owner_from_row(row));
        }

        // Owners are never deleted, so a conflicting row is still there.
        let existing: OwnerRow =
            sqlx::query_as("SELECT id, first_name, last_name FROM owner WHERE id = $1")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error("upsert_owner"))?;

        tracing::debug!(owner_id = %id, "Owner already exists");
        Ok(owner_from_row(existing))
    }

    async fn issue_ticket_inner(&self, owner_id: &CitizenId) -> Result<Ticket, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("issue_ticket"))?;

        // Concurrent issuers for the same owner queue on this lock; other
        // owners are unaffected. Dropping `tx` on any early return rolls back.
        let locked: Option<(String,)> =
            sqlx::query_as("SELECT id FROM owner WHERE id = $1 FOR UPDATE")
                .bind(owner_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error("issue_ticket"))?;

        if locked.is_none() {
            return Err(LedgerError::OwnerNotFound(owner_id.clone()));
        }

        let (held,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ticket WHERE owner_id = $1")
            .bind(owner_id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error("issue_ticket"))?;

        if held >= i64::from(MAX_TICKETS_PER_OWNER) {
            tracing::info!(owner_id = %owner_id, held, "Ticket quota exceeded");
            metrics::counter!("tickets.quota_exceeded").increment(1);
            return Err(LedgerError::QuotaExceeded {
                owner_id: owner_id.clone(),
                limit: MAX_TICKETS_PER_OWNER,
            });
        }

        let row: TicketRow = sqlx::query_as(
            r"
            INSERT INTO ticket (owner_id)
            VALUES ($1)
            RETURNING id, created_at, owner_id
            ",
        )
        .bind(owner_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error("issue_ticket"))?;

        tx.commit().await.map_err(storage_error("issue_ticket"))?;

        let ticket = ticket_from_row(row);
        tracing::info!(
            owner_id = %owner_id,
            ticket_id = %ticket.id,
            held = held + 1,
            "Ticket issued"
        );
        metrics::counter!("tickets.issued").increment(1);

        Ok(ticket)
    }

    async fn get_ticket_inner(&self, ticket_id: TicketId) -> Result<TicketDetails, LedgerError> {
        let row: Option<(Uuid, DateTime<Utc>, String, String, String)> = sqlx::query_as(
            r"
            SELECT t.id, t.created_at, o.id, o.first_name, o.last_name
            FROM ticket t
            JOIN owner o ON o.id = t.owner_id
            WHERE t.id = $1
            ",
        )
        .bind(ticket_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("get_ticket"))?;

        let (id, created_at, owner_id, first_name, last_name) =
            row.ok_or(LedgerError::TicketNotFound(ticket_id))?;

        Ok(TicketDetails {
            ticket: ticket_from_row((id, created_at, owner_id.clone())),
            owner: owner_from_row((owner_id, first_name, last_name)),
        })
    }

    async fn count_tickets_inner(&self) -> Result<u64, LedgerError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ticket")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("count_tickets"))?;

        u64::try_from(count).map_err(|e| LedgerError::Storage(format!("Invalid ticket count: {e}")))
    }

    async fn tickets_for_owner_inner(
        &self,
        owner_id: &CitizenId,
    ) -> Result<Vec<Ticket>, LedgerError> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            r"
            SELECT id, created_at, owner_id
            FROM ticket
            WHERE owner_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("tickets_for_owner"))?;

        Ok(rows.into_iter().map(ticket_from_row).collect())
    }

    async fn ping_inner(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_error("ping"))?;
        Ok(())
    }
}

impl TicketLedger for PostgresTicketLedger {
    fn upsert_owner<'a>(
        &'a self,
        id: &'a CitizenId,
        first_name: &'a str,
        last_name: &'a str,
    ) -> LedgerFuture<'a, Owner> {
        Box::pin(self.upsert_owner_inner(id, first_name, last_name))
    }

    fn issue_ticket<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Ticket> {
        Box::pin(self.issue_ticket_inner(owner_id))
    }

    fn get_ticket(&self, ticket_id: TicketId) -> LedgerFuture<'_, TicketDetails> {
        Box::pin(self.get_ticket_inner(ticket_id))
    }

    fn count_tickets(&self) -> LedgerFuture<'_, u64> {
        Box::pin(self.count_tickets_inner())
    }

    fn tickets_for_owner<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Vec<Ticket>> {
        Box::pin(self.tickets_for_owner_inner(owner_id))
    }

    fn ping(&self) -> LedgerFuture<'_, ()> {
        Box::pin(self.ping_inner())
    }
}

fn storage_error(operation: &'static str) -> impl Fn(sqlx::Error) -> LedgerError {
    move |e| {
        tracing::error!(operation, error = %e, "Ticket ledger query failed");
        metrics::counter!("ledger.errors", "operation" => operation).increment(1);
        LedgerError::Storage(format!("{operation}: {e}"))
    }
}

fn owner_from_row((id, first_name, last_name): OwnerRow) -> Owner {
    Owner {
        id: CitizenId::new(id),
        first_name,
        last_name,
    }
}

fn ticket_from_row((id, created_at, owner_id): TicketRow) -> Ticket {
    Ticket {
        id: TicketId::from_uuid(id),
        created_at,
        owner_id: CitizenId::new(owner_id),
    }
}
