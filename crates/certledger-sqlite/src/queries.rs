//! SQL for the stock, ledger and reporting tables
//!
//! Functions here take a bare connection and return `rusqlite::Result`; the
//! store and transaction types map errors at their boundary.

use certledger_core::types::{
    format_timestamp, parse_timestamp, ActionKind, Batch, BranchStock, BranchSummary,
    CumulativeTotal, LedgerEntry, LedgerRecord, LogFilter, StockAmount,
};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_err(idx, e))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn action_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ActionKind> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<Batch> {
    Ok(Batch {
        batch_id: row.get(0)?,
        created_at: ts_column(row, 1)?,
    })
}

fn stock_from_row(row: &Row<'_>) -> rusqlite::Result<BranchStock> {
    Ok(BranchStock {
        batch_id: row.get(0)?,
        branch: row.get(1)?,
        amount: StockAmount::new(row.get(2)?, row.get(3)?),
        updated_at: ts_column(row, 4)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerRecord> {
    Ok(LedgerRecord {
        id: row.get(0)?,
        entry: LedgerEntry {
            batch_id: row.get(1)?,
            action: action_column(row, 2)?,
            description: row.get(3)?,
            source_branch: row.get(4)?,
            dest_branch: row.get(5)?,
            certificate_delta: row.get(6)?,
            medal_delta: row.get(7)?,
            old_values: json_column(row, 8)?,
            new_values: json_column(row, 9)?,
            actor: row.get(10)?,
            timestamp: ts_column(row, 11)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Batches and stock rows
// ---------------------------------------------------------------------------

pub fn batch_exists(conn: &Connection, batch_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM batches WHERE batch_id = ?1)",
        [batch_id],
        |row| row.get(0),
    )
}

pub fn get_batch(conn: &Connection, batch_id: &str) -> rusqlite::Result<Option<Batch>> {
    conn.query_row(
        "SELECT batch_id, created_at FROM batches WHERE batch_id = ?1",
        [batch_id],
        batch_from_row,
    )
    .optional()
}

pub fn list_batches(conn: &Connection) -> rusqlite::Result<Vec<Batch>> {
    let mut stmt =
        conn.prepare("SELECT batch_id, created_at FROM batches ORDER BY created_at, batch_id")?;
    let rows = stmt.query_map([], batch_from_row)?;
    rows.collect()
}

pub fn insert_batch(
    conn: &Connection,
    batch_id: &str,
    created_at: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO batches (batch_id, created_at) VALUES (?1, ?2)",
        params![batch_id, format_timestamp(created_at)],
    )?;
    Ok(())
}

pub fn get_stock(
    conn: &Connection,
    batch_id: &str,
    branch: &str,
) -> rusqlite::Result<Option<BranchStock>> {
    conn.query_row(
        "SELECT batch_id, branch_code, certificates, medals, updated_at
         FROM branch_stock WHERE batch_id = ?1 AND branch_code = ?2",
        params![batch_id, branch],
        stock_from_row,
    )
    .optional()
}

pub fn stock_for_batch(conn: &Connection, batch_id: &str) -> rusqlite::Result<Vec<BranchStock>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, branch_code, certificates, medals, updated_at
         FROM branch_stock WHERE batch_id = ?1 ORDER BY branch_code",
    )?;
    let rows = stmt.query_map([batch_id], stock_from_row)?;
    rows.collect()
}

pub fn all_stock(conn: &Connection) -> rusqlite::Result<Vec<BranchStock>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, branch_code, certificates, medals, updated_at
         FROM branch_stock ORDER BY batch_id, branch_code",
    )?;
    let rows = stmt.query_map([], stock_from_row)?;
    rows.collect()
}

/// Insert or overwrite one stock row
pub fn put_stock(
    conn: &Connection,
    batch_id: &str,
    branch: &str,
    amount: &StockAmount,
    updated_at: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO branch_stock (batch_id, branch_code, certificates, medals, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (batch_id, branch_code) DO UPDATE SET
             certificates = excluded.certificates,
             medals = excluded.medals,
             updated_at = excluded.updated_at",
        params![
            batch_id,
            branch,
            amount.certificates,
            amount.medals,
            format_timestamp(updated_at)
        ],
    )?;
    Ok(())
}

/// Delete every stock row and batch. Returns `(stock_rows, batches)`.
pub fn delete_all_batches(conn: &Connection) -> rusqlite::Result<(usize, usize)> {
    let stock_rows = conn.execute("DELETE FROM branch_stock", [])?;
    let batches = conn.execute("DELETE FROM batches", [])?;
    Ok((stock_rows, batches))
}

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

pub fn insert_ledger_entry(conn: &Connection, entry: &LedgerEntry) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO ledger_entries (
             batch_id, action, description, source_branch, dest_branch,
             certificate_delta, medal_delta, old_values, new_values, actor, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            entry.batch_id,
            entry.action.as_str(),
            entry.description,
            entry.source_branch,
            entry.dest_branch,
            entry.certificate_delta,
            entry.medal_delta,
            entry.old_values.to_string(),
            entry.new_values.to_string(),
            entry.actor,
            format_timestamp(&entry.timestamp),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete entries strictly older than `cutoff`. Content is never consulted.
pub fn delete_entries_before(conn: &Connection, cutoff: &DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM ledger_entries WHERE created_at < ?1",
        [format_timestamp(cutoff)],
    )
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// WHERE clause and bound values for a log filter
fn log_filter_clause(filter: &LogFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(batch_id) = &filter.batch_id {
        clauses.push("e.batch_id = ?".to_string());
        values.push(Value::Text(batch_id.clone()));
    }
    if let Some(action) = &filter.action {
        clauses.push("e.action = ?".to_string());
        values.push(Value::Text(action.as_str().to_string()));
    }
    if let Some(from) = &filter.from {
        clauses.push("e.created_at >= ?".to_string());
        values.push(Value::Text(format_timestamp(from)));
    }
    if let Some(to) = &filter.to {
        clauses.push("e.created_at < ?".to_string());
        values.push(Value::Text(format_timestamp(to)));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        clauses.push(
            "(e.description LIKE ? ESCAPE '\\' OR e.actor LIKE ? ESCAPE '\\' OR e.batch_id LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        let pattern = escape_like(search.trim());
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }
    if let Some(region) = &filter.region {
        clauses.push(
            "EXISTS (SELECT 1 FROM branch_regions r
                     WHERE r.region = ? AND r.branch_code IN (e.source_branch, e.dest_branch))"
                .to_string(),
        );
        values.push(Value::Text(region.clone()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

/// Matching entries, newest first
pub fn query_logs(conn: &Connection, filter: &LogFilter) -> rusqlite::Result<Vec<LedgerRecord>> {
    let (clause, mut values) = log_filter_clause(filter);
    let sql = format!(
        "SELECT e.id, e.batch_id, e.action, e.description, e.source_branch, e.dest_branch,
                e.certificate_delta, e.medal_delta, e.old_values, e.new_values, e.actor, e.created_at
         FROM ledger_entries e
         {clause}
         ORDER BY e.created_at DESC, e.id DESC
         LIMIT ? OFFSET ?"
    );
    values.push(Value::Integer(filter.limit as i64));
    values.push(Value::Integer(filter.offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), record_from_row)?;
    rows.collect()
}

pub fn count_logs(conn: &Connection, filter: &LogFilter) -> rusqlite::Result<usize> {
    let (clause, values) = log_filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM ledger_entries e {clause}");
    conn.query_row(&sql, params_from_iter(values), |row| {
        row.get::<_, i64>(0).map(|n| n as usize)
    })
}

pub fn upsert_branch_region(conn: &Connection, branch: &str, region: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO branch_regions (branch_code, region) VALUES (?1, ?2)
         ON CONFLICT (branch_code) DO UPDATE SET region = excluded.region",
        params![branch, region],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reporting projections
// ---------------------------------------------------------------------------

pub fn summary_by_branch(conn: &Connection) -> rusqlite::Result<Vec<BranchSummary>> {
    let mut stmt = conn.prepare(
        "SELECT branch_code,
                SUM(certificates),
                SUM(medals),
                COUNT(CASE WHEN certificates > 0 OR medals > 0 THEN 1 END)
         FROM branch_stock
         GROUP BY branch_code
         ORDER BY branch_code",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(BranchSummary {
            branch: row.get(0)?,
            total: StockAmount::new(row.get(1)?, row.get(2)?),
            batch_count: row.get::<_, i64>(3)? as usize,
        })
    })?;
    rows.collect()
}

pub fn cumulative_totals(conn: &Connection) -> rusqlite::Result<Vec<CumulativeTotal>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, created_at, certificates, medals,
                SUM(certificates) OVER w,
                SUM(medals) OVER w
         FROM (
             SELECT b.batch_id AS batch_id,
                    b.created_at AS created_at,
                    COALESCE(SUM(s.certificates), 0) AS certificates,
                    COALESCE(SUM(s.medals), 0) AS medals
             FROM batches b
             LEFT JOIN branch_stock s ON s.batch_id = b.batch_id
             GROUP BY b.batch_id, b.created_at
         )
         WINDOW w AS (ORDER BY created_at, batch_id ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)
         ORDER BY created_at, batch_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CumulativeTotal {
            batch_id: row.get(0)?,
            created_at: ts_column(row, 1)?,
            total: StockAmount::new(row.get(2)?, row.get(3)?),
            cumulative: StockAmount::new(row.get(4)?, row.get(5)?),
        })
    })?;
    rows.collect()
}
