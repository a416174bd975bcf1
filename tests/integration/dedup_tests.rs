//! Duplicate merge passes against real and instrumented stores

use job_harvester::dedup::DedupMerger;
use job_harvester::storage::{
    CandidateFilter, DuplicateGroup, JobRecord, JobStore, NewJob, SqlStatement, SqliteStorage,
    StorageError, StorageResult, UserAction,
};
use rusqlite::types::Value;

fn posting(external_id: &str, title: &str, company: &str) -> NewJob {
    NewJob {
        site: "board".to_string(),
        external_id: external_id.to_string(),
        title: title.to_string(),
        company: company.to_string(),
        ..Default::default()
    }
}

/// Wraps a SQLite store, recording every batch and failing batches whose
/// UPDATE targets a poisoned primary id
struct InstrumentedStore {
    inner: SqliteStorage,
    batches: Vec<Vec<SqlStatement>>,
    poisoned: Vec<i64>,
}

impl InstrumentedStore {
    fn new() -> Self {
        Self {
            inner: SqliteStorage::new_in_memory().unwrap(),
            batches: Vec::new(),
            poisoned: Vec::new(),
        }
    }
}

impl JobStore for InstrumentedStore {
    fn insert(&mut self, job: &NewJob) -> StorageResult<i64> {
        self.inner.insert(job)
    }

    fn exists(&self, site: &str, external_id: &str) -> StorageResult<bool> {
        self.inner.exists(site, external_id)
    }

    fn get_job(&self, id: i64) -> StorageResult<Option<JobRecord>> {
        self.inner.get_job(id)
    }

    fn get_jobs(&self, ids: &[i64]) -> StorageResult<Vec<JobRecord>> {
        self.inner.get_jobs(ids)
    }

    fn mark_user_action(&mut self, id: i64, action: UserAction) -> StorageResult<()> {
        self.inner.mark_user_action(id, action)
    }

    fn find_duplicate_groups(&self, filter: CandidateFilter) -> StorageResult<Vec<DuplicateGroup>> {
        self.inner.find_duplicate_groups(filter)
    }

    fn execute_transaction(&mut self, statements: &[SqlStatement]) -> StorageResult<()> {
        self.batches.push(statements.to_vec());
        let primary = statements
            .first()
            .and_then(|update| update.params.last())
            .cloned();
        if let Some(Value::Integer(id)) = primary {
            if self.poisoned.contains(&id) {
                return Err(StorageError::Database(format!("injected failure for #{}", id)));
            }
        }
        self.inner.execute_transaction(statements)
    }

    fn count_jobs(&self) -> StorageResult<u64> {
        self.inner.count_jobs()
    }

    fn count_jobs_by_site(&self) -> StorageResult<Vec<(String, u64)>> {
        self.inner.count_jobs_by_site()
    }
}

#[test]
fn test_merge_copies_salary_into_lowest_id() {
    let mut store = InstrumentedStore::new();
    // ids 1..=9 are unrelated postings
    for n in 1..=9 {
        store
            .insert(&posting(&format!("f{}", n), &format!("Filler {}", n), "Other"))
            .unwrap();
    }
    let ten = store.insert(&posting("a", "Dev", "Acme")).unwrap();
    let mut with_salary = posting("b", "Dev", "Acme");
    with_salary.salary = Some("50k".to_string());
    let eleven = store.insert(&with_salary).unwrap();
    assert_eq!((ten, eleven), (10, 11));

    let report = DedupMerger::new().merge_duplicates(&mut store).unwrap();

    assert_eq!(report.merged.len(), 1);
    assert_eq!(store.get_job(10).unwrap().unwrap().salary.as_deref(), Some("50k"));
    assert!(store.get_job(11).unwrap().is_none());

    // update and delete went in as one batch
    assert_eq!(store.batches.len(), 1);
    let batch = &store.batches[0];
    assert_eq!(batch.len(), 2);
    assert!(batch[0].sql.starts_with("UPDATE jobs SET"));
    assert!(batch[1].sql.starts_with("DELETE FROM jobs"));
    assert_eq!(batch[1].params, vec![Value::Integer(11)]);
}

#[test]
fn test_failing_group_does_not_block_others() {
    let mut store = InstrumentedStore::new();
    let a1 = store.insert(&posting("1", "Dev", "Acme")).unwrap();
    let a2 = store.insert(&posting("2", "Dev", "Acme")).unwrap();
    let b1 = store.insert(&posting("3", "Ops", "Globex")).unwrap();
    let b2 = store.insert(&posting("4", "Ops", "Globex")).unwrap();
    store.poisoned.push(a1);

    let report = DedupMerger::new().merge_duplicates(&mut store).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.ids, vec![a1, a2]);
    assert!(report.failed[0].1.contains("injected failure"));
    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].primary_id, b1);

    assert!(store.get_job(a1).unwrap().is_some());
    assert!(store.get_job(a2).unwrap().is_some());
    assert!(store.get_job(b1).unwrap().unwrap().merged);
    assert!(store.get_job(b2).unwrap().is_none());
}

#[test]
fn test_acted_on_rows_survive_merge() {
    let mut store = SqliteStorage::new_in_memory().unwrap();
    let seen = store.insert(&posting("1", "Dev", "Acme")).unwrap();
    let applied = store.insert(&posting("2", "Dev", "Acme")).unwrap();
    let fresh_a = store.insert(&posting("3", "Dev", "Acme")).unwrap();
    let fresh_b = store.insert(&posting("4", "Dev", "Acme")).unwrap();
    store.mark_user_action(seen, UserAction::Seen).unwrap();
    store.mark_user_action(applied, UserAction::Applied).unwrap();

    let report = DedupMerger::new().merge_duplicates(&mut store).unwrap();

    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].primary_id, fresh_a);
    assert!(store.get_job(seen).unwrap().is_some());
    assert!(store.get_job(applied).unwrap().is_some());
    assert!(store.get_job(fresh_b).unwrap().is_none());
}

#[test]
fn test_three_way_merge_takes_first_value_per_field() {
    let mut store = SqliteStorage::new_in_memory().unwrap();
    let mut first = posting("1", "Dev", "Acme");
    first.location = Some("Berlin".to_string());
    let mut second = posting("2", "Dev", "Acme");
    second.location = Some("Munich".to_string());
    second.url = Some("https://board.example.com/2".to_string());
    let mut third = posting("3", "Dev", "Acme");
    third.description = Some("Write Rust".to_string());
    third.url = Some("https://board.example.com/3".to_string());

    let id = store.insert(&first).unwrap();
    store.insert(&second).unwrap();
    store.insert(&third).unwrap();

    DedupMerger::new().merge_duplicates(&mut store).unwrap();

    assert_eq!(store.count_jobs().unwrap(), 1);
    let merged = store.get_job(id).unwrap().unwrap();
    assert_eq!(merged.location.as_deref(), Some("Berlin"));
    assert_eq!(merged.url.as_deref(), Some("https://board.example.com/2"));
    assert_eq!(merged.description.as_deref(), Some("Write Rust"));
}
