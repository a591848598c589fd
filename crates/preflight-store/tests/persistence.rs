//! Restart and crash-safety tests for the history store.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;

use preflight_core::TestResult;
use preflight_store::{escape_name, HistoryStore};

fn make_result(qualified_name: &str, passed: bool) -> TestResult {
    let (module, name) =
        preflight_core::descriptor::split_qualified(qualified_name).expect("qualified");
    TestResult {
        qualified_name: qualified_name.to_string(),
        module: module.to_string(),
        name: name.to_string(),
        passed,
        duration_seconds: 0.25,
        total_tokens: 12,
        error_kind: None,
        error: None,
        expectations: vec!["answers in German".to_string()],
        unmet: Vec::new(),
        failure_reasons: BTreeMap::new(),
        prompt: "wie geht's".to_string(),
        expected_tool_calls: vec!["translate".to_string()],
        response: None,
    }
}

#[test]
fn reopened_store_serves_the_same_history() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", false)).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();
        store.append(&make_result("other::test_two", true)).unwrap();
    }

    let reopened = HistoryStore::open(dir.path()).unwrap();
    let listed = reopened.list("m::test_one");
    assert_eq!(listed.len(), 2);
    assert!(!listed[0].passed);
    assert!(listed[1].passed);
    assert_eq!(reopened.latest().len(), 2);
}

#[test]
fn trailing_partial_line_is_ignored_on_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&make_result("m::test_one", true)).unwrap();
    }

    // Simulate a crash mid-append: a torn record with no closing brace.
    let path = dir.path().join(format!("{}.jsonl", escape_name("m::test_one")));
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(b"{\"qualified_name\":\"m::test_one\",\"pas").unwrap();

    let reopened = HistoryStore::open(dir.path()).unwrap();
    let listed = reopened.list("m::test_one");
    assert_eq!(listed.len(), 1);
    assert!(listed[0].passed);

    // The store keeps working after recovery.
    reopened.append(&make_result("m::test_one", false)).unwrap();
    assert_eq!(reopened.list("m::test_one").len(), 2);
}

#[test]
fn deletion_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = HistoryStore::open(dir.path()).unwrap();
        for passed in [true, false, true] {
            store.append(&make_result("m::test_one", passed)).unwrap();
        }
        store.delete_at("m::test_one", 1).unwrap();
    }

    let reopened = HistoryStore::open(dir.path()).unwrap();
    let listed = reopened.list("m::test_one");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|r| r.passed));
}

#[test]
fn names_with_separators_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path()).unwrap();
    store.append(&make_result("a::b::test_deep", true)).unwrap();
    store.append(&make_result("a::test_shallow", false)).unwrap();

    let reopened = HistoryStore::open(dir.path()).unwrap();
    assert_eq!(reopened.list("a::b::test_deep").len(), 1);
    assert_eq!(reopened.list("a::test_shallow").len(), 1);
}
