use async_trait::async_trait;
use rusqlite::Connection;

use crate::error::AppError;
use crate::payments::{NewPayment, PaymentMethod, PaymentRecord, PaymentStore};
use crate::storage::database::Database;
use crate::storage::time::to_stored_string;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, amount, period, payment_date, payment_method FROM payments";

fn row_to_payment(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRecord> {
    let method_s: Option<String> = row.get(5)?;
    let method = match method_s.as_deref().and_then(PaymentMethod::parse) {
        Some(m) => m,
        None => {
            // Only the three known tags are ever written; anything else predates them.
            tracing::debug!(tag = ?method_s, "unknown payment method tag, counting as gateway");
            PaymentMethod::Gateway
        }
    };
    Ok(PaymentRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
        period_months: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        paid_at: row.get(4)?,
        method,
    })
}

pub(crate) fn insert_payment(conn: &Connection, payment: &NewPayment) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO payments (user_id, amount, period, payment_date, payment_method)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            payment.user_id,
            payment.amount,
            payment.period_months,
            to_stored_string(&payment.paid_at),
            payment.method.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
impl Database {
    pub async fn record_payment(&self, payment: &NewPayment) -> Result<i64, AppError> {
        let conn = self.connection.lock().await;
        Ok(insert_payment(&conn, payment)?)
    }
}

#[async_trait]
impl PaymentStore for Database {
    async fn has_payment_method(
        &self,
        user_id: i64,
        method: PaymentMethod,
    ) -> Result<bool, AppError> {
        let conn = self.connection.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE user_id = ?1 AND payment_method = ?2",
            rusqlite::params![user_id, method.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, AppError> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;
        let rows = stmt.query_map([], row_to_payment)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    async fn list_user_payments(&self, user_id: i64) -> Result<Vec<PaymentRecord>, AppError> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map([user_id], row_to_payment)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
