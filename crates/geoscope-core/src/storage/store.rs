use crate::model::{PromptSummary, RawResponses};
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection lock poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        migrate_keyed(&conn)?;
        Ok(())
    }

    /// Writes each summary under its (client_name, prompt_id) key. An existing
    /// row is replaced unless it carries a newer timestamp. Returns the number
    /// of rows written.
    pub fn upsert(&self, summaries: &[PromptSummary]) -> anyhow::Result<usize> {
        if summaries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO geo_results (
                    client_name, prompt_id, prompt_text, appearances, appearance_percent,
                    avg_position, avg_sentiment, raw_responses, timestamp,
                    runs_requested, runs_completed
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(client_name, prompt_id) DO UPDATE SET
                    prompt_text=excluded.prompt_text,
                    appearances=excluded.appearances,
                    appearance_percent=excluded.appearance_percent,
                    avg_position=excluded.avg_position,
                    avg_sentiment=excluded.avg_sentiment,
                    raw_responses=excluded.raw_responses,
                    timestamp=excluded.timestamp,
                    runs_requested=excluded.runs_requested,
                    runs_completed=excluded.runs_completed
                 WHERE excluded.timestamp >= geo_results.timestamp",
            )?;

            for s in summaries {
                let n = stmt
                    .execute(params![
                        s.client_name,
                        s.prompt_id,
                        s.prompt_text,
                        s.appearances,
                        s.appearance_percent,
                        s.avg_position,
                        s.avg_sentiment,
                        s.raw_responses.as_str(),
                        format_timestamp(&s.timestamp),
                        s.runs_requested,
                        s.runs_completed,
                    ])
                    .with_context(|| {
                        format!(
                            "upsert summary client={} prompt_id={}",
                            s.client_name, s.prompt_id
                        )
                    })?;
                if n == 0 {
                    tracing::debug!(
                        event = "geoscope.store.stale_skipped",
                        client = %s.client_name,
                        prompt_id = s.prompt_id,
                        "kept newer stored summary"
                    );
                }
                written += n;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// All rows for `client_name`, newest first, then by prompt id.
    pub fn query_by_client(&self, client_name: &str) -> anyhow::Result<Vec<PromptSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT client_name, prompt_id, prompt_text, appearances, appearance_percent,
                    avg_position, avg_sentiment, raw_responses, timestamp,
                    runs_requested, runs_completed
             FROM geo_results
             WHERE client_name = ?1
             ORDER BY timestamp DESC, prompt_id ASC",
        )?;

        let rows = stmt
            .query_map(params![client_name.trim()], |row| {
                Ok(StoredRow {
                    client_name: row.get(0)?,
                    prompt_id: row.get(1)?,
                    prompt_text: row.get(2)?,
                    appearances: row.get(3)?,
                    appearance_percent: row.get(4)?,
                    avg_position: row.get(5)?,
                    avg_sentiment: row.get(6)?,
                    raw_responses: row.get(7)?,
                    timestamp: row.get(8)?,
                    runs_requested: row.get(9)?,
                    runs_completed: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_summary).collect()
    }

    pub fn list_known_clients(&self) -> anyhow::Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT client_name FROM geo_results ORDER BY client_name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = BTreeSet::new();
        for r in rows {
            out.insert(r?);
        }
        Ok(out)
    }

    pub fn count_rows(&self) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM geo_results", [], |r| r.get(0))?;
        Ok(n)
    }
}

struct StoredRow {
    client_name: String,
    prompt_id: i64,
    prompt_text: String,
    appearances: i64,
    appearance_percent: f64,
    avg_position: Option<f64>,
    avg_sentiment: Option<f64>,
    raw_responses: Option<String>,
    timestamp: String,
    runs_requested: Option<i64>,
    runs_completed: Option<i64>,
}

impl StoredRow {
    fn into_summary(self) -> anyhow::Result<PromptSummary> {
        let raw_responses = RawResponses::from_joined(self.raw_responses.unwrap_or_default());
        // Rows written before the run counters existed only kept the texts.
        let runs_completed = match self.runs_completed {
            Some(n) => n as u32,
            None => raw_responses.split().len() as u32,
        };
        let runs_requested = match self.runs_requested {
            Some(n) => n as u32,
            None => runs_completed.max(1),
        };
        let timestamp = parse_timestamp(&self.timestamp).with_context(|| {
            format!(
                "bad timestamp for client={} prompt_id={}",
                self.client_name, self.prompt_id
            )
        })?;

        Ok(PromptSummary {
            client_name: self.client_name,
            prompt_id: self.prompt_id,
            prompt_text: self.prompt_text,
            appearances: self.appearances.max(0) as u32,
            appearance_percent: self.appearance_percent,
            avg_position: self.avg_position,
            avg_sentiment: self.avg_sentiment.unwrap_or(0.0),
            runs_requested,
            runs_completed,
            raw_responses,
            timestamp,
        })
    }
}

/// Fixed-width UTC form, so text order in SQL equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and the zone-less ISO form older tables used (read as UTC).
pub fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| anyhow::anyhow!("unrecognised timestamp '{}': {}", s, e))?;
    Ok(naive.and_utc())
}

/// Tables created before the natural key existed may hold several rows per
/// (client_name, prompt_id). Keep the newest and add the unique index.
fn migrate_keyed(conn: &Connection) -> anyhow::Result<()> {
    let cols = get_columns(conn, "geo_results")?;
    add_column_if_missing(conn, &cols, "geo_results", "runs_requested", "INTEGER")?;
    add_column_if_missing(conn, &cols, "geo_results", "runs_completed", "INTEGER")?;
    rewrite_legacy_timestamps(conn)?;

    let removed = conn.execute(
        "DELETE FROM geo_results WHERE rowid NOT IN (
            SELECT rowid FROM (
                SELECT rowid, ROW_NUMBER() OVER (
                    PARTITION BY client_name, prompt_id
                    ORDER BY timestamp DESC, rowid DESC
                ) AS rn
                FROM geo_results
            ) WHERE rn = 1
        )",
        [],
    )?;
    if removed > 0 {
        tracing::info!(
            event = "geoscope.store.migrated",
            removed,
            "collapsed duplicate summaries to the newest per key"
        );
    }

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_geo_results_key ON geo_results(client_name, prompt_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_geo_results_client_ts ON geo_results(client_name, timestamp)",
        [],
    )?;
    Ok(())
}

/// Older tables stored zone-less timestamps, which sort before any `...Z`
/// value of the same second. Rewrite them into the fixed-width form.
fn rewrite_legacy_timestamps(conn: &Connection) -> anyhow::Result<()> {
    let legacy: Vec<(i64, String)> = {
        let mut stmt =
            conn.prepare("SELECT rowid, timestamp FROM geo_results WHERE timestamp NOT LIKE '%Z'")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect::<Result<_, _>>()?
    };

    let mut rewritten = 0usize;
    for (rowid, raw) in &legacy {
        match parse_timestamp(raw) {
            Ok(ts) => {
                conn.execute(
                    "UPDATE geo_results SET timestamp = ?1 WHERE rowid = ?2",
                    params![format_timestamp(&ts), rowid],
                )?;
                rewritten += 1;
            }
            Err(e) => tracing::warn!(
                event = "geoscope.store.bad_timestamp",
                rowid,
                error = %e,
                "leaving unparseable timestamp as is"
            ),
        }
    }
    if rewritten > 0 {
        tracing::info!(
            event = "geoscope.store.timestamps_rewritten",
            rewritten,
            "normalised legacy timestamps to UTC"
        );
    }
    Ok(())
}

fn get_columns(conn: &Connection, table: &str) -> anyhow::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> anyhow::Result<()> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}
