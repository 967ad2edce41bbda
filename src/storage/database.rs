use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::payments::NewPayment;
use crate::storage::database_payments::insert_payment;
use crate::storage::database_subscriptions::upsert_row;
use crate::storage::time::parse_stored;
use crate::storage::{AccountStore, PurgeReport, SavedRenewal};
use crate::subscription::{ExpiryChange, SubscriptionUpsert};

/// SQLite-backed store. One connection, serialized behind an async mutex.
#[derive(Clone)]
pub struct Database {
    pub(crate) connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self, AppError> {
        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created database directory: {}", parent.display());
            }
        }

        let conn = Connection::open(database_path)?;
        tracing::info!("Database initialized at: {}", database_path);

        // Column names match data files written by earlier deployments.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bot_users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                first_interaction TEXT,
                last_interaction TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                subscribed BOOLEAN DEFAULT 0,
                payment_date TEXT,
                expiry_date TEXT,
                config TEXT,
                last_update TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                amount REAL,
                period INTEGER,
                payment_date TEXT,
                payment_method TEXT
            )",
            [],
        )?;

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl AccountStore for Database {
    async fn save_renewal(
        &self,
        user_id: i64,
        change: ExpiryChange,
        token: &str,
        payment: &NewPayment,
    ) -> Result<SavedRenewal, AppError> {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction()?;
        let stored = tx
            .query_row(
                "SELECT expiry_date FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        let now = payment.paid_at;
        let current = stored.as_deref().and_then(|s| parse_stored(s).ok());
        let expiry = change.resolve(current, now);
        upsert_row(
            &tx,
            &SubscriptionUpsert {
                user_id,
                payment_date: now,
                expiry,
                token: token.to_string(),
            },
        )?;
        let payment_id = insert_payment(&tx, payment)?;
        tx.commit()?;
        Ok(SavedRenewal {
            payment_id,
            expiry,
            was_active: current.is_some_and(|e| e > now),
        })
    }

    async fn purge_user(&self, user_id: i64) -> Result<PurgeReport, AppError> {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction()?;
        let subscriptions = tx.execute("DELETE FROM users WHERE user_id = ?1", [user_id])?;
        let payments = tx.execute("DELETE FROM payments WHERE user_id = ?1", [user_id])?;
        let bot_users = tx.execute("DELETE FROM bot_users WHERE user_id = ?1", [user_id])?;
        tx.commit()?;
        Ok(PurgeReport {
            subscriptions,
            payments,
            bot_users,
        })
    }
}
