//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Job-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested posting
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    external_id TEXT NOT NULL,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    location TEXT,
    salary TEXT,
    url TEXT,
    description TEXT,
    keyword TEXT,
    seen INTEGER NOT NULL DEFAULT 0,
    applied INTEGER NOT NULL DEFAULT 0,
    discarded INTEGER NOT NULL DEFAULT 0,
    merged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE(site, external_id)
);

CREATE INDEX IF NOT EXISTS idx_jobs_title_company ON jobs(title, company);
CREATE INDEX IF NOT EXISTS idx_jobs_site ON jobs(site);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
