// tests/test_delete_objects.rs
//
// Batched DeleteObjects: chunking, failure aggregation, empty input.

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{hook_with, put, setup, BUCKET, CONN_ID};
use s3hook::{HookConfig, HookError, InMemoryClient, ObjectClient};

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_delete_missing_key_reports_it() {
    let (store, hook) = setup();
    let err = hook.delete_objects(Some(BUCKET), &keys(&["key-1"])).unwrap_err();
    assert_eq!(err.to_string(), "Errors when deleting: ['key-1']");
    assert_eq!(err.failed_keys(), ["key-1"]);
    assert_eq!(store.delete_calls(), vec![1]);
}

#[test]
fn test_delete_single_key() -> Result<()> {
    let (store, hook) = setup();
    put(&store, "key-1", "Data");
    put(&store, "key-2", "Data");

    hook.delete_objects(None, &keys(&["key-1"]))?;
    assert!(!hook.check_for_key("key-1", Some(BUCKET))?);
    assert!(hook.check_for_key("key-2", Some(BUCKET))?);
    Ok(())
}

#[test]
fn test_delete_many_keys_in_batches_of_1000() -> Result<()> {
    let (store, hook) = setup();
    let names: Vec<String> = (0..1001).map(|i| format!("key-{i}")).collect();
    for name in &names {
        put(&store, name, "Data");
    }
    assert_eq!(store.object_count(BUCKET), 1001);

    hook.delete_objects(None, &names)?;
    assert_eq!(store.delete_calls(), vec![1000, 1]);
    assert_eq!(store.object_count(BUCKET), 0);
    Ok(())
}

#[test]
fn test_exact_multiple_of_batch_size() -> Result<()> {
    let (store, hook) = setup();
    let names: Vec<String> = (0..2000).map(|i| format!("key-{i}")).collect();
    for name in &names {
        put(&store, name, "Data");
    }
    hook.delete_objects(None, &names)?;
    assert_eq!(store.delete_calls(), vec![1000, 1000]);
    Ok(())
}

#[test]
fn test_failures_are_aggregated_across_batches() {
    let store = Arc::new(InMemoryClient::new());
    store.create_bucket(BUCKET, None).unwrap();
    let hook = hook_with(
        &store,
        Some(BUCKET),
        HookConfig::new(CONN_ID).with_delete_batch_size(2),
    );
    for name in ["a", "b", "c"] {
        put(&store, name, "x");
    }

    let err = hook
        .delete_objects(None, &keys(&["a", "missing-1", "b", "missing-2", "c"]))
        .unwrap_err();

    // Every batch is still sent after the first failure.
    assert_eq!(store.delete_calls(), vec![2, 2, 1]);
    assert_eq!(store.object_count(BUCKET), 0);
    match err {
        HookError::Delete { failed_keys } => {
            assert_eq!(failed_keys, vec!["missing-1", "missing-2"]);
        }
        other => panic!("expected Delete, got {other:?}"),
    }
}

#[test]
fn test_repeated_failed_key_is_reported_once() {
    let store = Arc::new(InMemoryClient::new());
    store.create_bucket(BUCKET, None).unwrap();
    let hook = hook_with(
        &store,
        Some(BUCKET),
        HookConfig::new(CONN_ID).with_delete_batch_size(1),
    );

    let err = hook
        .delete_objects(None, &keys(&["gone", "gone"]))
        .unwrap_err();
    assert_eq!(err.failed_keys(), ["gone"]);
    assert_eq!(store.delete_calls(), vec![1, 1]);
}

#[test]
fn test_empty_key_list_sends_nothing() -> Result<()> {
    let (store, hook) = setup();
    hook.delete_objects(None, &[])?;
    assert!(store.delete_calls().is_empty());
    Ok(())
}

#[test]
fn test_store_error_stops_immediately() {
    let (store, hook) = setup();
    let err = hook
        .delete_objects(Some("no-such-bucket"), &keys(&["a"]))
        .unwrap_err();
    assert!(matches!(err, HookError::Store(_)));
    // The call was attempted once and not retried.
    assert_eq!(store.delete_calls(), vec![1]);
}
