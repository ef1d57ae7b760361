//! src/subscription_store.rs

use crate::domain::{City, NewSubscription, SubscriberEmail, Subscription, SubscriptionId};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Reasons an insert is refused. Nothing is written in either case.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StoreRejection {
    #[error("This email address is already subscribed.")]
    DuplicateEmail,
    #[error("All {0} places are taken.")]
    QuotaReached(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum InsertError {
    #[error(transparent)]
    Rejected(#[from] StoreRejection),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct SubscriptionStore {
    pool: SqlitePool,
    max_subscribers: u32,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool, max_subscribers: u32) -> Self {
        Self {
            pool,
            max_subscribers,
        }
    }

    pub fn max_subscribers(&self) -> u32 {
        self.max_subscribers
    }

    /// Quota check and insert run as one statement, so concurrent inserts
    /// cannot push the table past `max_subscribers`.
    #[tracing::instrument(
        name = "Saving new subscription in the database.",
        skip(self, new_subscription),
        fields(
            subscriber_email = %new_subscription.email,
            city = %new_subscription.city
        )
    )]
    pub async fn insert(
        &self,
        new_subscription: &NewSubscription,
    ) -> Result<SubscriptionId, InsertError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (email, city)
            SELECT $1, $2
            WHERE (SELECT COUNT(*) FROM subscriptions) < $3
            "#,
        )
        .bind(new_subscription.email.as_ref())
        .bind(new_subscription.city.as_ref())
        .bind(self.max_subscribers as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StoreRejection::QuotaReached(self.max_subscribers).into())
            }
            Ok(done) => Ok(SubscriptionId(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreRejection::DuplicateEmail.into())
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("Failed to insert new subscription in the database.")
                .into()),
        }
    }

    /// Rows that no longer pass validation are logged and left out.
    #[tracing::instrument(name = "Read all subscriptions", skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Subscription>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, city, last_alert
            FROM subscriptions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read subscriptions from the database.")?;

        // An unreadable row must not hide the others from the sweep.
        let subscriptions = rows
            .iter()
            .filter_map(|row| match subscription_from_row(row) {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    tracing::warn!(
                        error.cause_chain = ?e,
                        error.message = %e,
                        subscription_id = row.try_get::<i64, _>("id").ok(),
                        "Skipping unreadable subscription row.",
                    );
                    None
                }
            })
            .collect();
        Ok(subscriptions)
    }

    #[tracing::instrument(name = "Read subscription", skip(self))]
    pub async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>, anyhow::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, email, city, last_alert
            FROM subscriptions
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read subscription from the database.")?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    #[tracing::instrument(name = "Count subscriptions", skip(self))]
    pub async fn count(&self) -> Result<u32, anyhow::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM subscriptions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count subscriptions.")?;
        let count: i64 = row.try_get("count")?;
        Ok(count as u32)
    }

    /// Stamps `last_alert`. An older timestamp never overwrites a newer one.
    #[tracing::instrument(name = "Record alert timestamp", skip(self))]
    pub async fn record_alert(
        &self,
        id: SubscriptionId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_alert = $1
            WHERE id = $2
                AND (last_alert IS NULL OR julianday(last_alert) < julianday($1))
            "#,
        )
        .bind(timestamp)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .context("Failed to record alert timestamp.")?;
        Ok(())
    }
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription, anyhow::Error> {
    let email: String = row.try_get("email")?;
    let city: String = row.try_get("city")?;
    // Rows written by older versions or by hand may not pass today's checks.
    Ok(Subscription {
        id: SubscriptionId(row.try_get("id")?),
        email: SubscriberEmail::parse(email)
            .context("Read invalid subscriber email from database.")?,
        city: City::parse(city).context("Read invalid city from database.")?,
        last_alert: row.try_get("last_alert")?,
    })
}
