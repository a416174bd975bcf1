use crate::storage::{
    placeholders, CandidateFilter, DuplicateGroup, JobRecord, JobStore, SqlStatement,
    StorageError, StorageResult,
};
use rusqlite::types::Value;

/// Columns whose values are carried over into the surviving row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeField {
    Location,
    Salary,
    Url,
    Description,
}

impl MergeField {
    pub const ALL: [MergeField; 4] = [
        MergeField::Location,
        MergeField::Salary,
        MergeField::Url,
        MergeField::Description,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Salary => "salary",
            Self::Url => "url",
            Self::Description => "description",
        }
    }

    fn value<'a>(&self, job: &'a JobRecord) -> Option<&'a str> {
        let value = match self {
            Self::Location => job.location.as_deref(),
            Self::Salary => job.salary.as_deref(),
            Self::Url => job.url.as_deref(),
            Self::Description => job.description.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// The outcome of merging one duplicate group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub primary_id: i64,
    /// First non-empty value per field, in id order
    pub fields: Vec<(MergeField, String)>,
    pub removed_ids: Vec<i64>,
}

impl MergedRecord {
    /// The UPDATE on the primary and the DELETE of the others
    pub fn statements(&self) -> Vec<SqlStatement> {
        let mut assignments: Vec<String> = Vec::with_capacity(self.fields.len() + 1);
        let mut params: Vec<Value> = Vec::with_capacity(self.fields.len() + 1);
        for (field, value) in &self.fields {
            assignments.push(format!("{} = ?", field.column()));
            params.push(Value::Text(value.clone()));
        }
        assignments.push("merged = 1".to_string());
        params.push(Value::Integer(self.primary_id));

        let update = SqlStatement::new(
            format!("UPDATE jobs SET {} WHERE id = ?", assignments.join(", ")),
            params,
        );

        let delete = SqlStatement::new(
            format!(
                "DELETE FROM jobs WHERE id IN ({})",
                placeholders(self.removed_ids.len())
            ),
            self.removed_ids.iter().copied().map(Value::Integer).collect(),
        );

        vec![update, delete]
    }
}

/// Builds the merged record for a group's rows
///
/// Rows may arrive in any order. Returns `None` when fewer than two rows are
/// given, since there is nothing to merge.
pub fn plan_merge(rows: &[JobRecord]) -> Option<MergedRecord> {
    if rows.len() < 2 {
        return None;
    }

    let mut ordered: Vec<&JobRecord> = rows.iter().collect();
    ordered.sort_by_key(|job| job.id);

    let primary_id = ordered[0].id;
    let fields = MergeField::ALL
        .iter()
        .filter_map(|field| {
            ordered
                .iter()
                .find_map(|job| field.value(job))
                .map(|value| (*field, value.to_string()))
        })
        .collect();
    let removed_ids = ordered[1..].iter().map(|job| job.id).collect();

    Some(MergedRecord {
        primary_id,
        fields,
        removed_ids,
    })
}

/// Summary of one merge pass
#[derive(Debug, Default)]
pub struct MergeReport {
    pub merged: Vec<MergedRecord>,
    /// `(group, error text)` for every group that could not be merged
    pub failed: Vec<(DuplicateGroup, String)>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Merges duplicate postings in a [`JobStore`]
#[derive(Debug, Clone, Copy)]
pub struct DedupMerger {
    filter: CandidateFilter,
}

impl Default for DedupMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupMerger {
    /// A merger that leaves rows a person has acted on alone
    pub fn new() -> Self {
        Self {
            filter: CandidateFilter::Untouched,
        }
    }

    pub fn with_filter(filter: CandidateFilter) -> Self {
        Self { filter }
    }

    /// Runs one merge pass over every duplicate group
    ///
    /// Only the discovery query can fail the whole pass. A group that fails
    /// to merge is logged and reported, and the pass moves on.
    pub fn merge_duplicates(&self, store: &mut dyn JobStore) -> StorageResult<MergeReport> {
        let groups = store.find_duplicate_groups(self.filter)?;
        let mut report = MergeReport::default();

        for group in groups {
            match self.merge_group(store, &group) {
                Ok(Some(record)) => {
                    tracing::info!(
                        "Merged {} duplicates of '{}' at {} into #{}",
                        group.count,
                        group.title,
                        group.company,
                        record.primary_id
                    );
                    report.merged.push(record);
                }
                Ok(None) => {
                    tracing::debug!(
                        "Duplicate group '{}' at {} vanished before merge",
                        group.title,
                        group.company
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to merge duplicates {:?} of '{}' at {}: {}",
                        group.ids,
                        group.title,
                        group.company,
                        e
                    );
                    report.failed.push((group, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    fn merge_group(
        &self,
        store: &mut dyn JobStore,
        group: &DuplicateGroup,
    ) -> StorageResult<Option<MergedRecord>> {
        let rows = store.get_jobs(&group.ids)?;
        if rows.len() != group.ids.len() {
            tracing::debug!(
                "Group {:?} has {} rows left",
                group.ids,
                rows.len()
            );
        }

        let Some(record) = plan_merge(&rows) else {
            return Ok(None);
        };
        if record.removed_ids.is_empty() {
            return Err(StorageError::MalformedGroup(format!(
                "group {:?} has no rows to remove",
                group.ids
            )));
        }

        store.execute_transaction(&record.statements())?;
        Ok(Some(record))
    }
}
