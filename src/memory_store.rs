// src/memory_store.rs
//
// InMemoryClient: an in-process ObjectClient with S3-like listing semantics.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use bytes::Bytes;
use tracing::debug;

use crate::constants::{DEFAULT_REGION, DEFAULT_SELECT_EXPRESSION};
use crate::error::{HookError, Result};
use crate::object_store::{
    DeleteReport, ListRequest, Listing, ObjectClient, ObjectSummary, SelectRequest,
};
use crate::s3_utils::ObjectLocator;

#[derive(Debug, Default)]
struct MemBucket {
    location: Option<String>,
    objects: BTreeMap<String, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, MemBucket>,
    delete_calls: Vec<usize>,
}

/// Object store held in a `Mutex<BTreeMap>`; keys list in byte order like S3.
///
/// DeleteObjects reports keys that do not exist as failed, and every
/// DeleteObjects call is recorded so batching can be observed.
#[derive(Debug)]
pub struct InMemoryClient {
    region: String,
    state: Mutex<State>,
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::with_region(DEFAULT_REGION)
    }

    pub fn with_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Number of keys sent in each DeleteObjects call so far, in call order.
    pub fn delete_calls(&self) -> Vec<usize> {
        self.state()
            .map(|s| s.delete_calls.clone())
            .unwrap_or_default()
    }

    /// Number of objects currently stored in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.state()
            .ok()
            .and_then(|s| s.buckets.get(bucket).map(|b| b.objects.len()))
            .unwrap_or(0)
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| HookError::Store(anyhow!("in-memory store lock poisoned")))
    }
}

fn no_such_bucket(bucket: &str) -> HookError {
    HookError::Store(anyhow!("NoSuchBucket: the bucket {bucket} does not exist"))
}

fn bucket_mut<'a>(state: &'a mut State, bucket: &str) -> Result<&'a mut MemBucket> {
    state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))
}

fn bucket_ref<'a>(state: &'a State, bucket: &str) -> Result<&'a MemBucket> {
    state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))
}

fn e_tag(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

impl ObjectClient for InMemoryClient {
    fn region(&self) -> Option<String> {
        Some(self.region.clone())
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.state()?.buckets.contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        let mut state = self.state()?;
        if state.buckets.contains_key(bucket) {
            debug!(bucket, "bucket already exists");
            return Ok(());
        }
        state.buckets.insert(
            bucket.to_string(),
            MemBucket {
                location: location.map(str::to_string),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state()?;
        if !bucket_ref(&state, bucket)?.objects.is_empty() {
            return Err(HookError::Store(anyhow!(
                "BucketNotEmpty: the bucket {bucket} is not empty"
            )));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    fn get_bucket_location(&self, bucket: &str) -> Result<Option<String>> {
        let state = self.state()?;
        Ok(bucket_ref(&state, bucket)?.location.clone())
    }

    /// Single-page listing; `page_size` has no effect here.
    fn list_objects(&self, request: &ListRequest) -> Result<Listing> {
        let state = self.state()?;
        let objects = &bucket_ref(&state, &request.bucket)?.objects;
        let max = request.max_items.unwrap_or(usize::MAX);

        let mut listing = Listing::default();
        for key in objects.keys() {
            let Some(rest) = key.strip_prefix(request.prefix.as_str()) else {
                continue;
            };
            let split = if request.delimiter.is_empty() {
                None
            } else {
                rest.find(request.delimiter.as_str())
            };
            match split {
                Some(idx) => {
                    let end = request.prefix.len() + idx + request.delimiter.len();
                    let common = &key[..end];
                    if listing.prefixes.last().map(String::as_str) != Some(common)
                        && listing.prefixes.len() < max
                    {
                        listing.prefixes.push(common.to_string());
                    }
                }
                None if listing.keys.len() < max => listing.keys.push(key.clone()),
                None => {}
            }
        }
        Ok(listing)
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectSummary>> {
        let state = self.state()?;
        Ok(bucket_ref(&state, bucket)?
            .objects
            .get(key)
            .map(|body| ObjectSummary {
                bucket: bucket.to_string(),
                key: key.to_string(),
                size: body.len() as u64,
                e_tag: Some(e_tag(body)),
                content_type: None,
            }))
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let state = self.state()?;
        bucket_ref(&state, bucket)?
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| HookError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn put_object(&self, bucket: &str, key: &str, body: Bytes, _encrypt: bool) -> Result<()> {
        let mut state = self.state()?;
        bucket_mut(&mut state, bucket)?
            .objects
            .insert(key.to_string(), body);
        Ok(())
    }

    fn copy_object(&self, source: &ObjectLocator, dest: &ObjectLocator) -> Result<()> {
        let body = self.get_object(&source.bucket, &source.key)?;
        self.put_object(&dest.bucket, &dest.key, body, false)
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteReport> {
        let mut state = self.state()?;
        state.delete_calls.push(keys.len());
        let objects = &mut bucket_mut(&mut state, bucket)?.objects;

        let mut report = DeleteReport::default();
        for key in keys {
            if objects.remove(key).is_some() {
                report.deleted.push(key.clone());
            } else {
                report.failed.push(key.clone());
            }
        }
        Ok(report)
    }

    /// Only the whole-object query is understood.
    fn select_object_content(
        &self,
        bucket: &str,
        key: &str,
        request: &SelectRequest,
    ) -> Result<Bytes> {
        if !request
            .expression
            .trim()
            .eq_ignore_ascii_case(DEFAULT_SELECT_EXPRESSION)
        {
            return Err(HookError::Store(anyhow!(
                "in-memory store cannot evaluate {:?}",
                request.expression
            )));
        }
        self.get_object(bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&str]) -> InMemoryClient {
        let store = InMemoryClient::new();
        store.create_bucket("b", None).unwrap();
        for k in keys {
            store
                .put_object("b", k, Bytes::from_static(b"x"), false)
                .unwrap();
        }
        store
    }

    fn list(store: &InMemoryClient, prefix: &str, delimiter: &str) -> Listing {
        store
            .list_objects(&ListRequest {
                bucket: "b".into(),
                prefix: prefix.into(),
                delimiter: delimiter.into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn delimiter_groups_common_prefixes() {
        let store = store_with(&["a", "dir/b", "dir/c", "dir/sub/d", "e"]);
        let listing = list(&store, "", "/");
        assert_eq!(listing.keys, vec!["a", "e"]);
        assert_eq!(listing.prefixes, vec!["dir/"]);

        let nested = list(&store, "dir/", "/");
        assert_eq!(nested.keys, vec!["dir/b", "dir/c"]);
        assert_eq!(nested.prefixes, vec!["dir/sub/"]);
    }

    #[test]
    fn no_delimiter_lists_everything() {
        let store = store_with(&["abc", "a/b"]);
        assert_eq!(list(&store, "a", "").keys, vec!["a/b", "abc"]);
    }

    #[test]
    fn max_items_truncates() {
        let store = store_with(&["0", "1", "2"]);
        let listing = store
            .list_objects(&ListRequest {
                bucket: "b".into(),
                max_items: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(listing.keys, vec!["0", "1"]);
    }

    #[test]
    fn delete_reports_missing_keys() {
        let store = store_with(&["k1"]);
        let report = store
            .delete_objects("b", &["k1".to_string(), "k2".to_string()])
            .unwrap();
        assert_eq!(report.deleted, vec!["k1"]);
        assert_eq!(report.failed, vec!["k2"]);
        assert_eq!(store.delete_calls(), vec![2]);
    }

    #[test]
    fn missing_bucket_is_a_store_error() {
        let store = InMemoryClient::new();
        assert!(matches!(
            store.head_object("nope", "k"),
            Err(HookError::Store(_))
        ));
    }

    #[test]
    fn non_empty_bucket_cannot_be_deleted() {
        let store = store_with(&["k"]);
        assert!(store.delete_bucket("b").is_err());
    }
}
