use async_trait::async_trait;
use chrono::Utc;
use common::{BookingId, Version};
use domain::{Booking, BookingStatus, ConflictingBooking, DateRange, ProviderId, TimelineStep};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    BookingStoreError, Result,
    store::{BookingStore, SlotGuard, UpdateOptions, check_update},
};

const SELECT_BOOKING: &str = "SELECT version, document FROM bookings";

/// PostgreSQL-backed booking store implementation.
///
/// Guarded updates serialize on a transaction-scoped advisory lock keyed by
/// provider, so the overlap check and the write commit together.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new PostgreSQL booking store.
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

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let document: serde_json::Value = row.try_get("document")?;
        let mut booking: Booking = serde_json::from_value(document)?;
        booking.version = Version::new(row.try_get("version")?);
        Ok(booking)
    }

    fn map_unique_violation(err: sqlx::Error, booking: &Booking) -> BookingStoreError {
        if let sqlx::Error::Database(ref db_err) = err {
            let duplicate = match db_err.constraint() {
                Some("bookings_pkey") => Some(("booking_id", booking.booking_id.to_string())),
                Some("unique_confirmation_number") => Some((
                    "confirmation_number",
                    booking.confirmation_number.to_string(),
                )),
                Some("unique_transaction_id") => Some((
                    "transaction_id",
                    booking.payment.transaction_id.clone().unwrap_or_default(),
                )),
                _ => None,
            };
            if let Some((field, value)) = duplicate {
                return BookingStoreError::Duplicate { field, value };
            }
        }
        BookingStoreError::Database(err)
    }

    async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: BookingId,
    ) -> Result<Booking> {
        let row = sqlx::query(&format!(
            "{SELECT_BOOKING} WHERE booking_id = $1 FOR UPDATE"
        ))
        .bind(booking_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BookingStoreError::NotFound(booking_id))?;
        Self::row_to_booking(row)
    }

    async fn check_slot(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: BookingId,
        guard: &SlotGuard,
    ) -> Result<()> {
        let statuses: Vec<String> = guard
            .active_statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let row = sqlx::query(&format!(
            "{SELECT_BOOKING} WHERE provider_id = $1 AND status = ANY($2) \
             AND start_date < $3 AND end_date > $4 AND booking_id <> $5 \
             ORDER BY start_date LIMIT 1"
        ))
        .bind(guard.provider_id.as_str())
        .bind(statuses)
        .bind(guard.range.end_date)
        .bind(guard.range.start_date)
        .bind(booking_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => {
                let existing = Self::row_to_booking(row)?;
                Err(BookingStoreError::SlotTaken {
                    booking_id,
                    conflicting: ConflictingBooking::from(&existing),
                })
            }
            None => Ok(()),
        }
    }

    async fn write(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        expected_version: Version,
    ) -> Result<()> {
        let document = serde_json::to_value(booking)?;
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, version = $3, transaction_id = $4, start_date = $5,
                end_date = $6, document = $7, updated_at = $8
            WHERE booking_id = $1 AND version = $9
            "#,
        )
        .bind(booking.booking_id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.version.as_i64())
        .bind(booking.payment.transaction_id.as_deref())
        .bind(booking.date_range.start_date)
        .bind(booking.date_range.end_date)
        .bind(document)
        .bind(booking.updated_at)
        .bind(expected_version.as_i64())
        .execute(&mut **tx)
        .await
        .map_err(|e| Self::map_unique_violation(e, booking))?;

        if result.rows_affected() == 0 {
            return Err(BookingStoreError::VersionConflict {
                booking_id: booking.booking_id,
                expected: expected_version,
                actual: booking.version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.booking_id))]
    async fn create(&self, mut booking: Booking) -> Result<Booking> {
        booking.version = Version::first();
        let document = serde_json::to_value(&booking)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (booking_id, confirmation_number, transaction_id, provider_id,
                                  service_type, status, start_date, end_date, version, document,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(booking.booking_id.as_uuid())
        .bind(booking.confirmation_number.as_str())
        .bind(booking.payment.transaction_id.as_deref())
        .bind(booking.provider_id.as_str())
        .bind(booking.service_type.as_str())
        .bind(booking.status.as_str())
        .bind(booking.date_range.start_date)
        .bind(booking.date_range.end_date)
        .bind(booking.version.as_i64())
        .bind(document)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, &booking))?;

        Ok(booking)
    }

    async fn find_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("{SELECT_BOOKING} WHERE booking_id = $1"))
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn find_by_confirmation_number(&self, code: &str) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("{SELECT_BOOKING} WHERE confirmation_number = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    #[tracing::instrument(
        skip(self, next, options),
        fields(booking_id = %next.booking_id, from = %options.expected_status, to = %next.status)
    )]
    async fn update_status(&self, mut next: Booking, options: UpdateOptions) -> Result<Booking> {
        let booking_id = next.booking_id;
        let mut tx = self.pool.begin().await?;

        // Take the provider lock before the row lock so guarded writers
        // always acquire locks in the same order.
        if let Some(guard) = &options.slot_guard {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(guard.provider_id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        let stored = Self::lock_for_update(&mut tx, booking_id).await?;
        check_update(&stored, &next, &options)?;

        if let Some(guard) = &options.slot_guard {
            Self::check_slot(&mut tx, booking_id, guard).await?;
        }

        next.version = options.expected_version.next();
        Self::write(&mut tx, &next, options.expected_version).await?;
        tx.commit().await?;

        tracing::debug!(version = %next.version, "booking updated");
        Ok(next)
    }

    async fn append_timeline_step(
        &self,
        booking_id: BookingId,
        step: TimelineStep,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = Self::lock_for_update(&mut tx, booking_id).await?;

        if booking.status == BookingStatus::Cancelled {
            return Err(BookingStoreError::TimelineClosed(booking_id));
        }

        let expected = booking.version;
        booking.updated_at = Utc::now().max(step.timestamp);
        booking.timeline.push(step);
        booking.version = expected.next();
        Self::write(&mut tx, &booking, expected).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn find_overlapping(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            "{SELECT_BOOKING} WHERE provider_id = $1 AND status = ANY($2) \
             AND start_date < $3 AND end_date > $4 \
             AND ($5::uuid IS NULL OR booking_id <> $5) \
             ORDER BY start_date ASC"
        ))
        .bind(provider_id.as_str())
        .bind(statuses)
        .bind(range.end_date)
        .bind(range.start_date)
        .bind(exclude.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "{SELECT_BOOKING} WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
