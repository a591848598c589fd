//! The append-only history store.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use preflight_core::TestResult;

use crate::error::StoreError;
use crate::escape::{escape_name, unescape_name};

const HISTORY_EXTENSION: &str = "jsonl";

/// Per-test, append-only log of [`TestResult`] records.
///
/// One `.jsonl` file per qualified test name under the store root. The
/// in-memory index mirrors the files and is rebuilt on open. Mutations for
/// one test block only readers of that same test; `truncate_all` takes the
/// store-wide writer lock.
pub struct HistoryStore {
    root: PathBuf,
    entries: DashMap<String, Arc<RwLock<Vec<TestResult>>>>,
    // Read-held by per-test operations, write-held only by truncate_all.
    global: RwLock<()>,
}

impl HistoryStore {
    /// Opens (or creates) a store rooted at `root` and rebuilds the index
    /// from existing history files.
    ///
    /// Lines that fail to parse are skipped with a warning; a trailing
    /// partial line from an interrupted append is therefore harmless.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let store = HistoryStore {
            root,
            entries: DashMap::new(),
            global: RwLock::new(()),
        };
        store.rescan()?;
        Ok(store)
    }

    fn rescan(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HISTORY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(qualified_name) = unescape_name(stem) else {
                tracing::warn!(file = %path.display(), "skipping history file with foreign name");
                continue;
            };
            let results = load_and_repair(&path)?;
            self.entries
                .insert(qualified_name, Arc::new(RwLock::new(results)));
        }
        Ok(())
    }

    fn file_path(&self, qualified_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", escape_name(qualified_name), HISTORY_EXTENSION))
    }

    fn entry(&self, qualified_name: &str) -> Arc<RwLock<Vec<TestResult>>> {
        self.entries
            .entry(qualified_name.to_string())
            .or_default()
            .clone()
    }

    /// Appends one result to its test's log. Durable on return.
    pub fn append(&self, result: &TestResult) -> Result<(), StoreError> {
        let _guard = self.global.read().expect("store lock poisoned");
        let entry = self.entry(&result.qualified_name);
        let mut results = entry.write().expect("history lock poisoned");

        let mut line = serde_json::to_string(result)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(&result.qualified_name))?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        results.push(result.clone());
        Ok(())
    }

    /// All results for one test, in append order.
    pub fn list(&self, qualified_name: &str) -> Vec<TestResult> {
        let _guard = self.global.read().expect("store lock poisoned");
        match self.entries.get(qualified_name) {
            Some(entry) => entry.read().expect("history lock poisoned").clone(),
            None => Vec::new(),
        }
    }

    /// The latest result per test, for dashboard summaries.
    pub fn latest(&self) -> BTreeMap<String, TestResult> {
        let _guard = self.global.read().expect("store lock poisoned");
        let mut latest = BTreeMap::new();
        for entry in self.entries.iter() {
            let results = entry.value().read().expect("history lock poisoned");
            if let Some(last) = results.last() {
                latest.insert(entry.key().clone(), last.clone());
            }
        }
        latest
    }

    /// Removes the entry at `index`; entries above shift down by one.
    pub fn delete_at(&self, qualified_name: &str, index: usize) -> Result<(), StoreError> {
        let _guard = self.global.read().expect("store lock poisoned");
        let entry = self.entry(qualified_name);
        let mut results = entry.write().expect("history lock poisoned");

        if index >= results.len() {
            return Err(StoreError::IndexOutOfRange {
                qualified_name: qualified_name.to_string(),
                index,
            });
        }

        let mut remaining = results.clone();
        remaining.remove(index);
        self.rewrite(qualified_name, &remaining)?;
        *results = remaining;
        Ok(())
    }

    /// Removes all entries for one test. A missing test is a no-op.
    pub fn truncate(&self, qualified_name: &str) -> Result<(), StoreError> {
        let _guard = self.global.read().expect("store lock poisoned");
        let entry = self.entry(qualified_name);
        let mut results = entry.write().expect("history lock poisoned");

        match fs::remove_file(self.file_path(qualified_name)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.sync_dir()?;
        results.clear();
        Ok(())
    }

    /// Removes every entry for every test.
    pub fn truncate_all(&self) -> Result<(), StoreError> {
        let _guard = self.global.write().expect("store lock poisoned");
        for entry in self.entries.iter() {
            match fs::remove_file(self.file_path(entry.key())) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.sync_dir()?;
        self.entries.clear();
        Ok(())
    }

    /// Rewrites one test's file through a temp file and an atomic rename.
    fn rewrite(&self, qualified_name: &str, results: &[TestResult]) -> Result<(), StoreError> {
        let final_path = self.file_path(qualified_name);
        let tmp_path = final_path.with_extension(format!("{}.tmp", HISTORY_EXTENSION));

        let mut buffer = String::new();
        for result in results {
            buffer.push_str(&serde_json::to_string(result)?);
            buffer.push('\n');
        }

        let mut file = File::create(&tmp_path)?;
        file.write_all(buffer.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &final_path)?;
        self.sync_dir()
    }

    fn sync_dir(&self) -> Result<(), StoreError> {
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }
}

/// Reads the valid record prefix of a history file and truncates away
/// anything after it.
///
/// A crash mid-append leaves a torn record with no trailing newline at the
/// end of the file; truncating back to the last complete record restores
/// the last-good state and keeps subsequent appends well-framed.
fn load_and_repair(path: &Path) -> Result<Vec<TestResult>, StoreError> {
    let raw = fs::read(path)?;
    let mut results = Vec::new();
    let mut good_len = 0usize;

    let mut offset = 0usize;
    while offset < raw.len() {
        let Some(newline) = raw[offset..].iter().position(|b| *b == b'\n') else {
            break;
        };
        let line = &raw[offset..offset + newline];
        offset += newline + 1;

        match serde_json::from_slice::<TestResult>(line) {
            Ok(result) => {
                results.push(result);
                good_len = offset;
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), %err, "unreadable history record");
                break;
            }
        }
    }

    if good_len < raw.len() {
        tracing::warn!(
            file = %path.display(),
            dropped = raw.len() - good_len,
            "truncating history file to last complete record"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(good_len as u64)?;
        file.sync_all()?;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(qualified_name: &str, passed: bool) -> TestResult {
        let (module, name) = preflight_core::descriptor::split_qualified(qualified_name)
            .expect("test names are qualified");
        TestResult {
            qualified_name: qualified_name.to_string(),
            module: module.to_string(),
            name: name.to_string(),
            passed,
            duration_seconds: 1.0,
            total_tokens: 7,
            error_kind: None,
            error: None,
            expectations: vec!["expect something".to_string()],
            unmet: Vec::new(),
            failure_reasons: BTreeMap::new(),
            prompt: "test query".to_string(),
            expected_tool_calls: Vec::new(),
            response: None,
        }
    }

    #[test]
    fn append_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        let result = make_result("m::test_one", true);

        store.append(&result).unwrap();

        let listed = store.list("m::test_one");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.last(), Some(&result));
    }

    #[test]
    fn delete_at_shifts_later_entries_down() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        for passed in [true, false, true] {
            store.append(&make_result("m::test_one", passed)).unwrap();
        }

        store.delete_at("m::test_one", 1).unwrap();
        let listed = store.list("m::test_one");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].passed);
        assert!(listed[1].passed);

        store.delete_at("m::test_one", 1).unwrap();
        assert_eq!(store.list("m::test_one").len(), 1);
    }

    #[test]
    fn delete_at_rejects_out_of_range_indices() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();

        let err = store.delete_at("m::test_one", 5).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 5, .. }));
    }

    #[test]
    fn latest_returns_most_recent_per_test() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", false)).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();
        store.append(&make_result("m::test_two", false)).unwrap();

        let latest = store.latest();
        assert_eq!(latest.len(), 2);
        assert!(latest["m::test_one"].passed);
        assert!(!latest["m::test_two"].passed);
    }

    #[test]
    fn truncate_removes_one_test_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();
        store.append(&make_result("m::test_two", true)).unwrap();

        store.truncate("m::test_one").unwrap();
        assert!(store.list("m::test_one").is_empty());
        assert_eq!(store.list("m::test_two").len(), 1);
    }

    #[test]
    fn truncate_all_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();
        store.append(&make_result("m::test_two", true)).unwrap();

        store.truncate_all().unwrap();
        assert!(store.latest().is_empty());
    }

    #[test]
    fn truncate_missing_test_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.truncate("ghost::test_none").unwrap();
    }
}
