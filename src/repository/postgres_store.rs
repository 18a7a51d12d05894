//! Subscriber table in PostgreSQL.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::AsyncConnection;
use diesel_async::AsyncPgConnection;
use diesel_async::RunQueryDsl;
use diesel_async::SimpleAsyncConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::scoped_futures::ScopedFutureExt;
use log::debug;
use log::info;

use crate::entity::NotificationState;
use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::repository::SubscriberStore;
use crate::repository::error::StoreError;

/// Same layout as the registration service's table, so both can share a database.
const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(255) PRIMARY KEY,
        personal_number VARCHAR(255) NOT NULL,
        phone_number VARCHAR(50) NOT NULL,
        category_code INTEGER NOT NULL,
        category_name VARCHAR(255) NOT NULL,
        center_id INTEGER NOT NULL,
        center_name VARCHAR(255) NOT NULL,
        email VARCHAR(255),
        telegram_chat_id VARCHAR(100),
        last_checked TIMESTAMP,
        notified BOOLEAN DEFAULT FALSE,
        notified_date VARCHAR(50),
        notified_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
";

diesel::table! {
    users (id) {
        id -> Varchar,
        personal_number -> Varchar,
        phone_number -> Varchar,
        category_code -> Int4,
        category_name -> Varchar,
        center_id -> Int4,
        center_name -> Varchar,
        email -> Nullable<Varchar>,
        telegram_chat_id -> Nullable<Varchar>,
        last_checked -> Nullable<Timestamp>,
        notified -> Nullable<Bool>,
        notified_date -> Nullable<Varchar>,
        notified_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct SubscriberRow {
    id: String,
    personal_number: String,
    phone_number: String,
    category_code: i32,
    category_name: String,
    center_id: i32,
    center_name: String,
    email: Option<String>,
    telegram_chat_id: Option<String>,
    last_checked: Option<NaiveDateTime>,
    notified: Option<bool>,
    notified_date: Option<String>,
    notified_at: Option<NaiveDateTime>,
}

impl SubscriberRow {
    fn new(subscriber: Subscriber, now: NaiveDateTime) -> Self {
        Self {
            notified_at: subscriber.notified.then_some(now),
            id: subscriber.id,
            personal_number: subscriber.subject_key,
            phone_number: subscriber.phone_number,
            category_code: subscriber.watch_category as i32,
            category_name: subscriber.category_label,
            center_id: subscriber.watch_location as i32,
            center_name: subscriber.location_label,
            email: subscriber.email,
            telegram_chat_id: subscriber.telegram_chat_id,
            last_checked: subscriber.last_checked_at.map(|at| at.naive_utc()),
            notified: Some(subscriber.notified),
            notified_date: subscriber.notified_for_occurrence,
        }
    }
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        let notified = row.notified.unwrap_or(false);
        Self {
            id: row.id,
            subject_key: row.personal_number,
            phone_number: row.phone_number,
            watch_category: row.category_code as u32,
            category_label: row.category_name,
            watch_location: row.center_id as u32,
            location_label: row.center_name,
            email: row.email,
            telegram_chat_id: row.telegram_chat_id,
            last_checked_at: row.last_checked.map(|at| at.and_utc()),
            notified,
            // A notified row written without its date cannot be matched to an occurrence.
            notified_for_occurrence: row.notified_date.filter(|_| notified),
        }
    }
}

/// Columns touched by a [`SubscriberPatch`]. `None` leaves a column as it is.
#[derive(Debug, Default, PartialEq, AsChangeset)]
#[diesel(table_name = users)]
struct SubscriberChanges {
    last_checked: Option<NaiveDateTime>,
    notified: Option<bool>,
    notified_date: Option<Option<String>>,
    notified_at: Option<Option<NaiveDateTime>>,
}

impl SubscriberChanges {
    fn from_patch(patch: &SubscriberPatch, now: NaiveDateTime) -> Self {
        let mut changes = Self {
            last_checked: patch.last_checked_at.map(|at| at.naive_utc()),
            ..Default::default()
        };
        match &patch.notification {
            Some(NotificationState::Notified { occurrence }) => {
                changes.notified = Some(true);
                changes.notified_date = Some(Some(occurrence.clone()));
                changes.notified_at = Some(Some(now));
            }
            Some(NotificationState::Cleared) => {
                changes.notified = Some(false);
                changes.notified_date = Some(None);
                changes.notified_at = Some(None);
            }
            None => {}
        }
        changes
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Subscriber store over a pooled async PostgreSQL connection.
pub struct PostgresStore {
    pool: Pool<AsyncPgConnection>,
}

impl PostgresStore {
    /// Connects to `database_url` and creates the `users` table if it is missing.
    pub async fn connect(database_url: &str, max_connections: usize) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(max_connections)
            .build()
            .map_err(|e| StoreError::Connection {
                message: e.to_string(),
            })?;
        let store = Self { pool };

        debug!("Creating subscriber table if missing...");
        store.conn().await?.batch_execute(CREATE_TABLE).await?;
        info!("PostgreSQL subscriber table ready.");
        Ok(store)
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Connection {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SubscriberStore for PostgresStore {
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = users::table
            .select(SubscriberRow::as_select())
            .order((users::created_at.asc(), users::id.asc()))
            .load::<SubscriberRow>(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Subscriber::from).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Subscriber>, StoreError> {
        let mut conn = self.conn().await?;
        let row = users::table
            .find(id)
            .select(SubscriberRow::as_select())
            .first::<SubscriberRow>(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(Subscriber::from))
    }

    async fn insert(&self, mut subscriber: Subscriber) -> Result<String, StoreError> {
        if subscriber.id.is_empty() {
            subscriber.id = uuid::Uuid::new_v4().to_string();
        }
        let row = SubscriberRow::new(subscriber, Utc::now().naive_utc());
        let row = &row;

        let mut conn = self.conn().await?;
        (*conn)
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    diesel::delete(
                        users::table.filter(
                            users::personal_number
                                .eq(&row.personal_number)
                                .and(users::category_code.eq(row.category_code))
                                .or(users::id.eq(&row.id)),
                        ),
                    )
                    .execute(conn)
                    .await?;
                    diesel::insert_into(users::table)
                        .values(row)
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await?;
        Ok(row.id.clone())
    }

    async fn update(&self, id: &str, patch: &SubscriberPatch) -> Result<bool, StoreError> {
        let changes = SubscriberChanges::from_patch(patch, Utc::now().naive_utc());
        if changes.is_empty() {
            return Ok(self.get(id).await?.is_some());
        }
        let mut conn = self.conn().await?;
        let updated = diesel::update(users::table.find(id))
            .set(&changes)
            .execute(&mut *conn)
            .await?;
        Ok(updated > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(users::table.find(id))
            .execute(&mut *conn)
            .await?;
        Ok(deleted > 0)
    }
}
