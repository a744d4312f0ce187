use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::Filter;
use crate::normalize::NormalizedRecord;
use crate::progress::progress_bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Drop and recreate the table on every load.
    #[default]
    Replace,
    /// Keep existing rows; a re-loaded URL overwrites its old row.
    Append,
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// `table` must already be a validated identifier (see `Settings::validate`).
pub fn init_schema(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id                INTEGER PRIMARY KEY,
            rank              INTEGER,
            title             TEXT NOT NULL,
            year              INTEGER,
            duration_hours    REAL,
            rating            REAL,
            votes             INTEGER,
            url               TEXT,
            genres            TEXT NOT NULL,
            primary_genre     TEXT NOT NULL,
            duration_category TEXT NOT NULL,
            rating_category   TEXT NOT NULL,
            run_id            TEXT NOT NULL,
            loaded_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_url ON {table}(url);
        CREATE INDEX IF NOT EXISTS idx_{table}_genre ON {table}(primary_genre);

        CREATE TABLE IF NOT EXISTS load_runs (
            id         INTEGER PRIMARY KEY,
            run_id     TEXT NOT NULL,
            table_name TEXT NOT NULL,
            mode       TEXT NOT NULL,
            rows       INTEGER NOT NULL,
            started_at TEXT NOT NULL
        );
        "
    ))?;
    Ok(())
}

pub fn new_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ"))
}

pub struct LoadSummary {
    pub run_id: String,
    pub written: usize,
}

/// Write records in chunked transactions. URLs are unique; a later record with
/// the same URL replaces the earlier one.
pub fn save_movies(
    conn: &Connection,
    table: &str,
    records: &[NormalizedRecord],
    mode: WriteMode,
    chunk_size: usize,
) -> Result<LoadSummary> {
    if mode == WriteMode::Replace {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    init_schema(conn, table)?;

    let run_id = new_run_id();
    let started_at = chrono::Utc::now().to_rfc3339();
    let sql = format!(
        "INSERT OR REPLACE INTO {table}
         (rank, title, year, duration_hours, rating, votes, url, genres,
          primary_genre, duration_category, rating_category, run_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    );

    let pb = progress_bar(records.len() as u64);
    let mut written = 0;
    for chunk in records.chunks(chunk_size.max(1)) {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for r in chunk {
                let genres = serde_json::to_string(&r.genres)?;
                let votes = r.votes.map(|v| clamp_votes(&r.title, v));
                written += stmt.execute(rusqlite::params![
                    r.rank,
                    r.title,
                    r.year,
                    r.duration_hours,
                    r.rating,
                    votes,
                    r.url,
                    genres,
                    r.primary_genre,
                    r.duration_bucket.label(),
                    r.rating_bucket.label(),
                    run_id,
                ])?;
            }
        }
        tx.commit()?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    let mode_name = match mode {
        WriteMode::Replace => "replace",
        WriteMode::Append => "append",
    };
    conn.execute(
        "INSERT INTO load_runs (run_id, table_name, mode, rows, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![run_id, table, mode_name, written as i64, started_at],
    )?;

    info!("Loaded {} rows into {} ({})", written, table, run_id);
    Ok(LoadSummary { run_id, written })
}

/// SQLite integers are signed; larger counts are stored as `i64::MAX`.
fn clamp_votes(title: &str, votes: u64) -> i64 {
    i64::try_from(votes).unwrap_or_else(|_| {
        warn!("Vote count {} for {:?} exceeds the store range; clamped", votes, title);
        i64::MAX
    })
}

// ── Reading back ──

pub struct MovieRow {
    pub rank: Option<u32>,
    pub title: String,
    pub year: Option<i32>,
    pub duration_hours: Option<f64>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,
    pub url: Option<String>,
    pub genres: Vec<String>,
    pub primary_genre: String,
    pub duration_category: String,
    pub rating_category: String,
}

pub fn fetch_movies(
    conn: &Connection,
    table: &str,
    filter: &Filter,
    limit: usize,
) -> Result<Vec<MovieRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(d) = filter.duration {
        conditions.push(format!("duration_category = ?{}", params.len() + 1));
        params.push(Box::new(d.label()));
    }
    if let Some(r) = filter.min_rating {
        conditions.push(format!("rating >= ?{}", params.len() + 1));
        params.push(Box::new(r));
    }
    if let Some(v) = filter.min_votes {
        conditions.push(format!("COALESCE(votes, 0) >= ?{}", params.len() + 1));
        params.push(Box::new(i64::try_from(v).unwrap_or(i64::MAX)));
    }
    if let Some(g) = &filter.genre {
        conditions.push(format!("primary_genre = ?{}", params.len() + 1));
        params.push(Box::new(g.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT rank, title, year, duration_hours, rating, votes, url, genres,
                primary_genre, duration_category, rating_category
         FROM {table}{where_clause}
         ORDER BY rating IS NULL, rating DESC, votes DESC, title
         LIMIT {limit}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let genres: String = row.get(7)?;
            Ok(MovieRow {
                rank: row.get(0)?,
                title: row.get(1)?,
                year: row.get(2)?,
                duration_hours: row.get(3)?,
                rating: row.get(4)?,
                votes: row.get(5)?,
                url: row.get(6)?,
                genres: serde_json::from_str(&genres).unwrap_or_default(),
                primary_genre: row.get(8)?,
                duration_category: row.get(9)?,
                rating_category: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub rated: usize,
    pub with_duration: usize,
    pub runs: usize,
    pub last_run: Option<String>,
    pub by_rating: Vec<(String, usize)>,
    pub by_duration: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection, table: &str) -> Result<Stats> {
    init_schema(conn, table)?;
    let total: usize = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
    let rated: usize = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE rating IS NOT NULL"),
        [],
        |r| r.get(0),
    )?;
    let with_duration: usize = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE duration_hours IS NOT NULL"),
        [],
        |r| r.get(0),
    )?;
    let runs: usize = conn.query_row(
        "SELECT COUNT(*) FROM load_runs WHERE table_name = ?1",
        [table],
        |r| r.get(0),
    )?;
    let last_run: Option<String> = conn
        .query_row(
            "SELECT run_id FROM load_runs WHERE table_name = ?1 ORDER BY id DESC LIMIT 1",
            [table],
            |r| r.get(0),
        )
        .optional()?;

    Ok(Stats {
        total,
        rated,
        with_duration,
        runs,
        last_run,
        by_rating: count_by(conn, table, "rating_category")?,
        by_duration: count_by(conn, table, "duration_category")?,
    })
}

fn count_by(conn: &Connection, table: &str, column: &str) -> Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM {table} GROUP BY {column} ORDER BY COUNT(*) DESC, {column}"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{fields, Normalizer, RawRecord};

    fn movie(title: &str, rating: &str, runtime: &str, votes: &str, url: &str) -> NormalizedRecord {
        Normalizer::default().normalize(
            &RawRecord::new()
                .with(fields::TITLE, title)
                .with(fields::RATING, rating)
                .with(fields::RUNTIME, runtime)
                .with(fields::VOTES, votes)
                .with(fields::URL, url),
        )
    }

    fn sample() -> Vec<NormalizedRecord> {
        vec![
            movie("Dark Forest", "7.4", "1h 50m", "12K", "https://x/1"),
            movie("Space Race", "8.8", "2h 40m", "1.2M", "https://x/2"),
            movie("Quiet Days", "N/A", "N/A", "N/A", "https://x/3"),
        ]
    }

    #[test]
    fn load_and_read_back() {
        let conn = Connection::open_in_memory().unwrap();
        let summary = save_movies(&conn, "movies", &sample(), WriteMode::Replace, 2).unwrap();
        assert_eq!(summary.written, 3);

        let rows = fetch_movies(&conn, "movies", &Filter::default(), 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, "Space Race");
        assert_eq!(rows[0].votes, Some(1_200_000));
        assert_eq!(rows[0].genres, vec!["Sci-Fi".to_string()]);
        assert_eq!(rows[2].title, "Quiet Days");
        assert_eq!(rows[2].rating_category, "Unrated");
        assert_eq!(rows[2].duration_category, "Unknown");
    }

    #[test]
    fn oversized_votes_are_clamped() {
        let conn = Connection::open_in_memory().unwrap();
        let huge = movie("Ghost Count", "7.0", "1h", "18446744073709551615", "https://x/9");
        save_movies(&conn, "movies", &[huge], WriteMode::Replace, 10).unwrap();

        let rows = fetch_movies(&conn, "movies", &Filter::default(), 10).unwrap();
        assert_eq!(rows[0].votes, Some(i64::MAX));
        assert_eq!(clamp_votes("x", 42), 42);
    }

    #[test]
    fn replace_drops_previous_rows() {
        let conn = Connection::open_in_memory().unwrap();
        save_movies(&conn, "movies", &sample(), WriteMode::Replace, 100).unwrap();
        save_movies(&conn, "movies", &sample()[..1], WriteMode::Replace, 100).unwrap();
        let stats = get_stats(&conn, "movies").unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.runs, 2);
    }

    #[test]
    fn append_dedupes_by_url() {
        let conn = Connection::open_in_memory().unwrap();
        save_movies(&conn, "movies", &sample(), WriteMode::Append, 100).unwrap();
        let updated = vec![movie("Dark Forest", "9.1", "1h 50m", "13K", "https://x/1")];
        save_movies(&conn, "movies", &updated, WriteMode::Append, 100).unwrap();

        let rows = fetch_movies(&conn, "movies", &Filter::default(), 10).unwrap();
        assert_eq!(rows.len(), 3);
        let forest = rows.iter().find(|r| r.title == "Dark Forest").unwrap();
        assert_eq!(forest.rating, Some(9.1));
        assert_eq!(forest.rating_category, "Masterpiece (9.0+)");
    }

    #[test]
    fn filters_in_sql() {
        let conn = Connection::open_in_memory().unwrap();
        save_movies(&conn, "movies", &sample(), WriteMode::Replace, 100).unwrap();

        let filter = Filter {
            min_rating: Some(8.0),
            ..Filter::default()
        };
        let rows = fetch_movies(&conn, "movies", &filter, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Space Race");

        let filter = Filter {
            genre: Some("Horror".into()),
            min_votes: Some(10_000),
            ..Filter::default()
        };
        let rows = fetch_movies(&conn, "movies", &filter, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Dark Forest");
    }

    #[test]
    fn stats_by_bucket() {
        let conn = Connection::open_in_memory().unwrap();
        save_movies(&conn, "movies", &sample(), WriteMode::Replace, 100).unwrap();
        let stats = get_stats(&conn, "movies").unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.rated, 2);
        assert_eq!(stats.with_duration, 2);
        assert!(stats.last_run.is_some());
        assert_eq!(stats.by_rating.iter().map(|(_, n)| n).sum::<usize>(), 3);
        assert!(stats.by_duration.contains(&("Unknown".to_string(), 1)));
    }
}
