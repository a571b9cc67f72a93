//! Receipt repository — persistence for extracted receipts.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Row};

use crate::receipt::{LineItem, Receipt};

use super::{Database, DatabaseError};

/// Formats a timestamp the way the `receipts` table stores it (UTC,
/// RFC 3339, fixed precision). One format everywhere keeps the window
/// scan's string comparison sound.
pub(crate) fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn receipt_from_row(row: &Row<'_>) -> Result<Receipt, rusqlite::Error> {
    let items_json: String = row.get("items")?;
    let items: Vec<LineItem> = serde_json::from_str(&items_json).unwrap_or_else(|e| {
        log::warn!("Discarding malformed items column: {}", e);
        Vec::new()
    });

    Ok(Receipt {
        receipt_id: row.get("id")?,
        date: row.get("date")?,
        vendor: row.get("vendor")?,
        total: row.get("total")?,
        items,
        source_location: row.get("source_location")?,
        stored_at: Some(row.get("stored_at")?),
    })
}

/// Idempotent upsert keyed by receipt id. Stamps `stored_at` with the
/// current time and returns the receipt as stored.
pub fn upsert(db: &Database, receipt: &Receipt) -> Result<Receipt, DatabaseError> {
    let mut stored = receipt.clone();
    stored.stored_at = Some(format_timestamp(Utc::now()));

    let items_json = serde_json::to_string(&stored.items)
        .map_err(|e| DatabaseError::Serialize(e.to_string()))?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO receipts (id, date, vendor, total, items, source_location, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 date = excluded.date,
                 vendor = excluded.vendor,
                 total = excluded.total,
                 items = excluded.items,
                 source_location = excluded.source_location,
                 stored_at = excluded.stored_at",
            params![
                stored.receipt_id,
                stored.date,
                stored.vendor,
                stored.total,
                items_json,
                stored.source_location,
                stored.stored_at,
            ],
        )?;
        Ok(())
    })?;

    Ok(stored)
}

/// Finds a receipt by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Receipt>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM receipts WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], receipt_from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns all receipts whose `stored_at` falls after `cutoff`,
/// in no guaranteed order.
pub fn stored_since(db: &Database, cutoff: DateTime<Utc>) -> Result<Vec<Receipt>, DatabaseError> {
    let cutoff = format_timestamp(cutoff);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM receipts WHERE stored_at > ?1")?;
        let rows = stmt
            .query_map(params![cutoff], receipt_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Trailing-window spending history.
///
/// Never fails: any retrieval error is logged and degrades to an empty
/// history, since analytics without history are still useful and a read
/// failure must not abort receipt processing.
pub fn history(db: &Database, window_days: i64) -> Vec<Receipt> {
    let cutoff = Utc::now() - Duration::days(window_days);
    match stored_since(db, cutoff) {
        Ok(receipts) => receipts,
        Err(e) => {
            log::warn!("Failed to read spending history, continuing without it: {}", e);
            Vec::new()
        }
    }
}
