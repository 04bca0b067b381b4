use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::store::{Column, Record};

/// SQL column for every fillable record column.
const FIELDS: [(&str, Column); 22] = [
    ("description", Column::Description),
    ("full_address", Column::FullAddress),
    ("street", Column::Street),
    ("municipality", Column::Municipality),
    ("categories", Column::Categories),
    ("time_zone", Column::TimeZone),
    ("amenities", Column::Amenities),
    ("phone", Column::Phone),
    ("phones", Column::Phones),
    ("claimed", Column::Claimed),
    ("review_count", Column::ReviewCount),
    ("average_rating", Column::AverageRating),
    ("review_url", Column::ReviewUrl),
    ("maps_url", Column::MapsUrl),
    ("latitude", Column::Latitude),
    ("longitude", Column::Longitude),
    ("website", Column::Website),
    ("domain", Column::Domain),
    ("opening_hours", Column::OpeningHours),
    ("featured_image", Column::FeaturedImage),
    ("cid", Column::Cid),
    ("fid", Column::Fid),
];

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let columns: String = FIELDS
        .iter()
        .map(|(name, _)| format!("            {} TEXT,\n", name))
        .collect();
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS places (
            id            INTEGER PRIMARY KEY,
            place_id      TEXT UNIQUE NOT NULL,
            name          TEXT NOT NULL,
{}            discovered_at TEXT NOT NULL,
            updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_places_domain ON places(domain);
        ",
        columns
    ))?;
    Ok(())
}

// ── Records ──

/// Upsert by place id. Existing non-empty values are never replaced, so a
/// later run can only fill gaps.
pub fn save_records<'a>(conn: &Connection, records: impl IntoIterator<Item = &'a Record>) -> Result<usize> {
    let names: Vec<&str> = FIELDS.iter().map(|(n, _)| *n).collect();
    let placeholders: Vec<String> = (4..4 + FIELDS.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = names
        .iter()
        .map(|n| format!("{n} = COALESCE(NULLIF(places.{n}, ''), excluded.{n})"))
        .collect();
    let sql = format!(
        "INSERT INTO places (place_id, name, discovered_at, {})
         VALUES (?1, ?2, ?3, {})
         ON CONFLICT(place_id) DO UPDATE SET {}, updated_at = datetime('now')",
        names.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    );

    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for r in records {
            let discovered = r.discovered_at.to_rfc3339();
            let values: Vec<Option<&str>> = FIELDS.iter().map(|(_, c)| r.value(*c)).collect();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(3 + values.len());
            params.push(&r.id);
            params.push(&r.name);
            params.push(&discovered);
            params.extend(values.iter().map(|v| v as &dyn rusqlite::types::ToSql));
            count += stmt.execute(params.as_slice())?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Every stored record, in discovery order.
pub fn fetch_records(conn: &Connection) -> Result<Vec<Record>> {
    let names: Vec<&str> = FIELDS.iter().map(|(n, _)| *n).collect();
    let sql = format!(
        "SELECT place_id, name, discovered_at, {} FROM places ORDER BY id",
        names.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let discovered: String = row.get(2)?;
            let discovered_at = DateTime::parse_from_rfc3339(&discovered)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_default();
            let mut record = Record::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, discovered_at);
            for (i, (_, column)) in FIELDS.iter().enumerate() {
                if let Some(value) = row.get::<_, Option<String>>(3 + i)? {
                    record.fill(*column, &value);
                }
            }
            Ok(record)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub with_phone: usize,
    pub with_website: usize,
    pub with_coordinates: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |filter: &str| -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM places{}", filter);
        Ok(conn.query_row(&sql, [], |r| r.get(0))?)
    };
    Ok(Stats {
        total: count("")?,
        with_phone: count(" WHERE phone IS NOT NULL AND phone != ''")?,
        with_website: count(" WHERE website IS NOT NULL AND website != ''")?,
        with_coordinates: count(" WHERE latitude IS NOT NULL AND longitude IS NOT NULL")?,
    })
}

// ── Tests ──
