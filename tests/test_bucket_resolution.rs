// tests/test_bucket_resolution.rs
//
// Bucket defaulting from the connection and the key/URL resolution rules.

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{hook_with, setup, BUCKET, CONN_ID};
use s3hook::{
    CallShape, HookConfig, HookError, InMemoryClient, ObjectLocator, S3Hook,
    StaticConnectionResolver,
};

#[test]
fn test_bucket_scoped_uses_connection_default() -> Result<()> {
    let (_store, hook) = setup();
    assert_eq!(
        hook.provide_bucket_name(CallShape::BucketScoped, None)?,
        Some(BUCKET.to_string())
    );
    Ok(())
}

#[test]
fn test_explicit_bucket_wins_over_default() -> Result<()> {
    let (_store, hook) = setup();
    assert_eq!(
        hook.provide_bucket_name(CallShape::BucketScoped, Some("other"))?,
        Some("other".to_string())
    );
    Ok(())
}

#[test]
fn test_empty_bucket_counts_as_missing() -> Result<()> {
    let (_store, hook) = setup();
    assert_eq!(
        hook.provide_bucket_name(CallShape::BucketScoped, Some(""))?,
        Some(BUCKET.to_string())
    );
    Ok(())
}

#[test]
fn test_key_addressed_is_never_defaulted() -> Result<()> {
    let (_store, hook) = setup();
    assert_eq!(hook.provide_bucket_name(CallShape::KeyAddressed, None)?, None);
    assert_eq!(
        hook.provide_bucket_name(CallShape::KeyAddressed, Some("given"))?,
        Some("given".to_string())
    );
    Ok(())
}

#[test]
fn test_missing_bucket_without_default() {
    let store = Arc::new(InMemoryClient::new());
    let hook = hook_with(&store, None, HookConfig::new(CONN_ID));

    let err = hook
        .provide_bucket_name(CallShape::BucketScoped, None)
        .unwrap_err();
    assert!(matches!(err, HookError::MissingBucket { ref conn_id } if conn_id == CONN_ID));

    // Every bucket-scoped operation surfaces the same error.
    assert!(matches!(
        hook.check_for_bucket(None),
        Err(HookError::MissingBucket { .. })
    ));
    assert!(matches!(
        hook.delete_objects(None, &["k".to_string()]),
        Err(HookError::MissingBucket { .. })
    ));
}

#[test]
fn test_locate_with_and_without_bucket() -> Result<()> {
    let (_store, hook) = setup();
    assert_eq!(
        hook.locate("s3://bucket/dir/key", None)?,
        ObjectLocator::new("bucket", "dir/key")
    );
    // With a bucket the key is taken literally, even if it looks like a URL.
    assert_eq!(
        hook.locate("dir/key", Some("b"))?,
        ObjectLocator::new("b", "dir/key")
    );
    Ok(())
}

#[test]
fn test_bare_key_without_bucket_is_invalid() {
    let (_store, hook) = setup();
    // The connection default is not used for key-addressed calls.
    let err = hook.check_for_key("dir/key", None).unwrap_err();
    assert!(matches!(err, HookError::InvalidLocation { .. }));
}

#[test]
fn test_wildcard_without_bucket_is_never_defaulted() {
    let (store, hook) = setup();
    common::put(&store, "abc", "x");
    // "abc" exists in the connection's default bucket, but a bare wildcard
    // is not resolved against it.
    let err = hook.get_wildcard_key("a*", None, "").unwrap_err();
    assert!(matches!(err, HookError::InvalidLocation { .. }));
    assert!(matches!(
        hook.check_for_wildcard_key("a*", None, ""),
        Err(HookError::InvalidLocation { .. })
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = S3Hook::new(
        HookConfig::new(CONN_ID).with_delete_batch_size(0),
        Arc::new(StaticConnectionResolver::new()),
    );
    assert!(matches!(result, Err(HookError::Config(_))));
}
