//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the JobStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageResult};
use crate::storage::{
    placeholders, CandidateFilter, DuplicateGroup, JobRecord, NewJob, SqlStatement, UserAction,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, site, external_id, title, company, location, salary, url,
     description, keyword, seen, applied, discarded, merged, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        site: row.get(1)?,
        external_id: row.get(2)?,
        title: row.get(3)?,
        company: row.get(4)?,
        location: row.get(5)?,
        salary: row.get(6)?,
        url: row.get(7)?,
        description: row.get(8)?,
        keyword: row.get(9)?,
        seen: row.get::<_, i64>(10)? != 0,
        applied: row.get::<_, i64>(11)? != 0,
        discarded: row.get::<_, i64>(12)? != 0,
        merged: row.get::<_, i64>(13)? != 0,
        created_at: row.get(14)?,
    })
}

impl JobStore for SqliteStorage {
    // ===== Postings =====

    fn insert(&mut self, job: &NewJob) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (site, external_id, title, company, location, salary, url,
             description, keyword, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.site,
                job.external_id,
                job.title,
                job.company,
                job.location,
                job.salary,
                job.url,
                job.description,
                job.keyword,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn exists(&self, site: &str, external_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM jobs WHERE site = ?1 AND external_id = ?2",
                params![site, external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_job(&self, id: i64) -> StorageResult<Option<JobRecord>> {
        let job = self
            .conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn get_jobs(&self, ids: &[i64]) -> StorageResult<Vec<JobRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM jobs WHERE id IN ({}) ORDER BY id ASC",
            JOB_COLUMNS,
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params_from_iter(ids.iter()), row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn mark_user_action(&mut self, id: i64, action: UserAction) -> StorageResult<()> {
        let changed = self.conn.execute(
            &format!("UPDATE jobs SET {} = 1 WHERE id = ?1", action.column()),
            params![id],
        )?;
        if changed == 0 {
            return Err(crate::storage::StorageError::JobNotFound(id));
        }
        Ok(())
    }

    // ===== Deduplication =====

    fn find_duplicate_groups(&self, filter: CandidateFilter) -> StorageResult<Vec<DuplicateGroup>> {
        let sql = format!(
            "SELECT COUNT(*) AS count, GROUP_CONCAT(id) AS ids, title, company
             FROM jobs
             WHERE {}
             GROUP BY title, company
             HAVING COUNT(*) > 1
             ORDER BY MIN(id)",
            filter.predicate()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(count, ids, title, company)| DuplicateGroup::from_row(count, &ids, title, company))
            .collect()
    }

    fn execute_transaction(&mut self, statements: &[SqlStatement]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for statement in statements {
            tx.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_jobs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_jobs_by_site(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT site, COUNT(*) FROM jobs GROUP BY site ORDER BY site")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}
