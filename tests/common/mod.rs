// tests/common/mod.rs
//
// Shared fixtures: hooks wired to an in-memory store and a fixed resolver.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use s3hook::{
    Connection, HookConfig, InMemoryClient, ObjectClient, S3Hook, StaticConnectionResolver,
};

pub const CONN_ID: &str = "aws_default";
pub const BUCKET: &str = "test_bucket";

/// Hook over `store` whose connection has `default_bucket` (if any).
pub fn hook_with(
    store: &Arc<InMemoryClient>,
    default_bucket: Option<&str>,
    config: HookConfig,
) -> S3Hook {
    let mut conn = Connection::new(config.conn_id.clone());
    conn.default_bucket = default_bucket.map(str::to_string);
    let resolver = StaticConnectionResolver::new().with(conn);
    S3Hook::with_client(config, Arc::new(resolver), store.clone())
        .expect("valid hook config")
}

/// Store with an empty `BUCKET` and a hook whose connection defaults to it.
pub fn setup() -> (Arc<InMemoryClient>, S3Hook) {
    let store = Arc::new(InMemoryClient::new());
    store.create_bucket(BUCKET, None).expect("create bucket");
    let hook = hook_with(&store, Some(BUCKET), HookConfig::new(CONN_ID));
    (store, hook)
}

pub fn put(store: &InMemoryClient, key: &str, body: &str) {
    store
        .put_object(BUCKET, key, Bytes::copy_from_slice(body.as_bytes()), false)
        .expect("put object");
}
