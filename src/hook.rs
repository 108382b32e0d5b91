// src/hook.rs
//
// S3Hook: blocking bucket/key operations on top of an ObjectClient, with the
// bucket name defaulted from the hook's connection.

use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::HookConfig;
use crate::connection::{Connection, ConnectionResolver, EnvConnectionResolver};
use crate::constants::DEFAULT_REGION;
use crate::error::{HookError, Result};
use crate::object_store::{ListRequest, Listing, ObjectClient, ObjectSummary, SelectRequest};
use crate::s3_ops::AwsS3Client;
use crate::s3_utils::{parse_s3_url, ObjectLocator};

/// How an operation names its object, which decides whether a missing
/// bucket may be filled in from the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// Takes a bare bucket name; a missing one is defaulted.
    BucketScoped,
    /// Takes a key or wildcard key that may be a full `s3://` URL; the bucket
    /// is never defaulted.
    KeyAddressed,
}

/// Listing arguments passed through to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: String,
    pub delimiter: String,
    /// Falls back to `HookConfig::page_size`.
    pub page_size: Option<usize>,
    pub max_items: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

/// Upload behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Overwrite an existing object instead of failing with `KeyExists`.
    pub replace: bool,
    /// Ask for AES256 server-side encryption.
    pub encrypt: bool,
}

impl PutOptions {
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Default::default()
        }
    }
}

/// Blocking S3 hook bound to one connection id.
///
/// The object client is created from the connection on first use and shared
/// by every later call on this hook.
pub struct S3Hook {
    config: HookConfig,
    resolver: Arc<dyn ConnectionResolver>,
    client: OnceCell<Arc<dyn ObjectClient>>,
}

impl fmt::Debug for S3Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Hook")
            .field("config", &self.config)
            .field("connected", &self.client.get().is_some())
            .finish()
    }
}

impl S3Hook {
    /// Hook that builds an [`AwsS3Client`] from the resolved connection when
    /// first needed.
    pub fn new(config: HookConfig, resolver: Arc<dyn ConnectionResolver>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            resolver,
            client: OnceCell::new(),
        })
    }

    /// Hook configured from `S3HOOK_*` variables with an environment resolver.
    pub fn from_env() -> Result<Self> {
        Self::new(HookConfig::from_env(), Arc::new(EnvConnectionResolver::new()))
    }

    /// Hook using an already built client.
    pub fn with_client(
        config: HookConfig,
        resolver: Arc<dyn ConnectionResolver>,
        client: Arc<dyn ObjectClient>,
    ) -> Result<Self> {
        let hook = Self::new(config, resolver)?;
        // Freshly created cell, cannot already be set.
        let _ = hook.client.set(client);
        Ok(hook)
    }

    pub fn conn_id(&self) -> &str {
        &self.config.conn_id
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// The hook's connection record, read from the resolver on every call.
    pub fn get_connection(&self) -> Result<Connection> {
        self.resolver.get_connection(&self.config.conn_id)
    }

    /// The shared object client, created on first use.
    pub fn get_conn(&self) -> Result<Arc<dyn ObjectClient>> {
        self.client
            .get_or_try_init(|| -> Result<Arc<dyn ObjectClient>> {
                let conn = self.get_connection()?;
                let client = AwsS3Client::connect(&conn)?;
                info!(conn_id = %conn.conn_id, region = ?client.region(), "connected to S3");
                Ok(Arc::new(client))
            })
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Bucket name resolution
    // -------------------------------------------------------------------------

    /// Fill in a missing bucket name for bucket-scoped calls.
    ///
    /// Key-addressed calls get `bucket` back untouched, even when it is
    /// `None`: their key may be a full URL naming its own bucket. An empty
    /// string counts as missing.
    pub fn provide_bucket_name(
        &self,
        shape: CallShape,
        bucket: Option<&str>,
    ) -> Result<Option<String>> {
        let given = bucket.filter(|b| !b.is_empty()).map(str::to_owned);
        match (shape, given) {
            (CallShape::KeyAddressed, _) => Ok(bucket.map(str::to_owned)),
            (CallShape::BucketScoped, Some(b)) => Ok(Some(b)),
            (CallShape::BucketScoped, None) => {
                let conn = self.get_connection()?;
                match conn.default_bucket.filter(|b| !b.is_empty()) {
                    Some(b) => {
                        debug!(conn_id = %conn.conn_id, bucket = %b, "using connection default bucket");
                        Ok(Some(b))
                    }
                    None => Err(HookError::MissingBucket {
                        conn_id: conn.conn_id,
                    }),
                }
            }
        }
    }

    fn bucket_name(&self, bucket: Option<&str>) -> Result<String> {
        self.provide_bucket_name(CallShape::BucketScoped, bucket)?
            .ok_or_else(|| HookError::MissingBucket {
                conn_id: self.config.conn_id.clone(),
            })
    }

    /// Resolve a key-addressed argument pair: with a bucket the key is taken
    /// literally, without one the key must be an `s3://` URL.
    pub fn locate(&self, key: &str, bucket: Option<&str>) -> Result<ObjectLocator> {
        match self.provide_bucket_name(CallShape::KeyAddressed, bucket)? {
            Some(b) if !b.is_empty() => Ok(ObjectLocator::new(b, key)),
            _ => parse_s3_url(key),
        }
    }

    // -------------------------------------------------------------------------
    // Buckets
    // -------------------------------------------------------------------------

    /// Store refusals count as "no"; credential failures propagate.
    #[instrument(skip(self))]
    pub fn check_for_bucket(&self, bucket: Option<&str>) -> Result<bool> {
        let bucket = self.bucket_name(bucket)?;
        let exists = self.get_conn()?.bucket_exists(&bucket)?;
        if !exists {
            info!(%bucket, "bucket does not exist");
        }
        Ok(exists)
    }

    /// `region` defaults to the client's region; us-east-1 buckets get no
    /// LocationConstraint.
    #[instrument(skip(self))]
    pub fn create_bucket(&self, bucket: Option<&str>, region: Option<&str>) -> Result<()> {
        let bucket = self.bucket_name(bucket)?;
        let client = self.get_conn()?;
        let region = region
            .map(str::to_owned)
            .or_else(|| client.region())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let location = (region != DEFAULT_REGION).then_some(region.as_str());
        client.create_bucket(&bucket, location)?;
        info!(%bucket, %region, "created bucket");
        Ok(())
    }

    /// `None` for us-east-1.
    pub fn get_bucket_location(&self, bucket: Option<&str>) -> Result<Option<String>> {
        let bucket = self.bucket_name(bucket)?;
        self.get_conn()?.get_bucket_location(&bucket)
    }

    /// With `force`, every object is removed first through [`S3Hook::delete_objects`].
    #[instrument(skip(self))]
    pub fn delete_bucket(&self, bucket: Option<&str>, force: bool) -> Result<()> {
        let bucket = self.bucket_name(bucket)?;
        if force {
            let keys = self.list_keys(Some(&bucket), &ListOptions::new())?;
            self.delete_objects(Some(&bucket), &keys)?;
        }
        self.get_conn()?.delete_bucket(&bucket)?;
        info!(%bucket, "deleted bucket");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Listing
    // -------------------------------------------------------------------------

    fn list(&self, bucket: Option<&str>, opts: &ListOptions) -> Result<Listing> {
        let bucket = self.bucket_name(bucket)?;
        let request = ListRequest {
            bucket,
            prefix: opts.prefix.clone(),
            delimiter: opts.delimiter.clone(),
            page_size: opts.page_size.or(self.config.page_size),
            max_items: opts.max_items,
        };
        self.get_conn()?.list_objects(&request)
    }

    /// Common prefixes under `opts.prefix`; empty when there are none.
    pub fn list_prefixes(&self, bucket: Option<&str>, opts: &ListOptions) -> Result<Vec<String>> {
        Ok(self.list(bucket, opts)?.prefixes)
    }

    /// Object keys under `opts.prefix`; empty when there are none.
    pub fn list_keys(&self, bucket: Option<&str>, opts: &ListOptions) -> Result<Vec<String>> {
        Ok(self.list(bucket, opts)?.keys)
    }

    /// Whether `prefix` exists as a common prefix one level below its parent.
    pub fn check_for_prefix(
        &self,
        prefix: &str,
        delimiter: &str,
        bucket: Option<&str>,
    ) -> Result<bool> {
        if delimiter.is_empty() {
            return Err(HookError::Config("check_for_prefix needs a delimiter".into()));
        }
        let prefix = if prefix.ends_with(delimiter) {
            prefix.to_string()
        } else {
            format!("{prefix}{delimiter}")
        };
        let opts = ListOptions::new()
            .prefix(previous_level(&prefix, delimiter))
            .delimiter(delimiter);
        let prefixes = self.list_prefixes(bucket, &opts)?;
        Ok(prefixes.contains(&prefix))
    }

    // -------------------------------------------------------------------------
    // Keys
    // -------------------------------------------------------------------------

    pub fn check_for_key(&self, key: &str, bucket: Option<&str>) -> Result<bool> {
        let loc = self.locate(key, bucket)?;
        Ok(self.get_conn()?.head_object(&loc.bucket, &loc.key)?.is_some())
    }

    pub fn get_key(&self, key: &str, bucket: Option<&str>) -> Result<ObjectSummary> {
        let loc = self.locate(key, bucket)?;
        self.get_conn()?
            .head_object(&loc.bucket, &loc.key)?
            .ok_or(HookError::NotFound {
                bucket: loc.bucket,
                key: loc.key,
            })
    }

    /// Object body decoded as UTF-8.
    pub fn read_key(&self, key: &str, bucket: Option<&str>) -> Result<String> {
        let loc = self.locate(key, bucket)?;
        let body = self.get_conn()?.get_object(&loc.bucket, &loc.key)?;
        Ok(String::from_utf8(body.to_vec())?)
    }

    /// S3 Select over one object, result decoded as UTF-8.
    #[instrument(skip(self, request), fields(expression = %request.expression))]
    pub fn select_key(
        &self,
        key: &str,
        bucket: Option<&str>,
        request: &SelectRequest,
    ) -> Result<String> {
        let loc = self.locate(key, bucket)?;
        let body = self
            .get_conn()?
            .select_object_content(&loc.bucket, &loc.key, request)?;
        Ok(String::from_utf8(body.to_vec())?)
    }

    pub fn check_for_wildcard_key(
        &self,
        wildcard_key: &str,
        bucket: Option<&str>,
        delimiter: &str,
    ) -> Result<bool> {
        Ok(self
            .get_wildcard_key(wildcard_key, bucket, delimiter)?
            .is_some())
    }

    /// First key, in listing order, matching the glob `wildcard_key`.
    ///
    /// The listing prefix is the text before the first `*`, `?` or `[`;
    /// `*` also matches `/`.
    pub fn get_wildcard_key(
        &self,
        wildcard_key: &str,
        bucket: Option<&str>,
        delimiter: &str,
    ) -> Result<Option<ObjectSummary>> {
        let loc = self.locate(wildcard_key, bucket)?;
        let pattern = wildcard_pattern(&loc.key).map_err(|_| HookError::InvalidLocation {
            url: wildcard_key.to_owned(),
            reason: "invalid wildcard pattern",
        })?;
        let prefix = loc
            .key
            .find(['*', '?', '['])
            .map_or(loc.key.as_str(), |idx| &loc.key[..idx]);

        let opts = ListOptions::new().prefix(prefix).delimiter(delimiter);
        let keys = self.list_keys(Some(&loc.bucket), &opts)?;
        match keys.into_iter().find(|k| pattern.matches(k)) {
            Some(key) => self.get_conn()?.head_object(&loc.bucket, &key),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Uploads
    // -------------------------------------------------------------------------

    fn upload(&self, key: &str, bucket: Option<&str>, body: Bytes, opts: PutOptions) -> Result<()> {
        let loc = self.locate(key, bucket)?;
        let client = self.get_conn()?;
        if !opts.replace && client.head_object(&loc.bucket, &loc.key)?.is_some() {
            return Err(HookError::KeyExists { key: loc.key });
        }
        debug!(object = %loc, bytes = body.len(), encrypt = opts.encrypt, "uploading");
        client.put_object(&loc.bucket, &loc.key, body, opts.encrypt)
    }

    /// Upload `data` as UTF-8.
    pub fn load_string(
        &self,
        data: &str,
        key: &str,
        bucket: Option<&str>,
        opts: PutOptions,
    ) -> Result<()> {
        self.upload(key, bucket, Bytes::copy_from_slice(data.as_bytes()), opts)
    }

    pub fn load_bytes(
        &self,
        data: impl Into<Bytes>,
        key: &str,
        bucket: Option<&str>,
        opts: PutOptions,
    ) -> Result<()> {
        self.upload(key, bucket, data.into(), opts)
    }

    pub fn load_file(
        &self,
        path: &Path,
        key: &str,
        bucket: Option<&str>,
        opts: PutOptions,
    ) -> Result<()> {
        let data = std::fs::read(path)?;
        self.upload(key, bucket, Bytes::from(data), opts)
    }

    /// Upload everything `reader` yields.
    pub fn load_reader<R: Read>(
        &self,
        mut reader: R,
        key: &str,
        bucket: Option<&str>,
        opts: PutOptions,
    ) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.upload(key, bucket, Bytes::from(data), opts)
    }

    /// Server-side copy. Each key is resolved on its own, so either may be a
    /// full URL.
    pub fn copy_object(
        &self,
        source_key: &str,
        dest_key: &str,
        source_bucket: Option<&str>,
        dest_bucket: Option<&str>,
    ) -> Result<()> {
        let source = self.locate(source_key, source_bucket)?;
        let dest = self.locate(dest_key, dest_bucket)?;
        self.get_conn()?.copy_object(&source, &dest)?;
        info!(%source, %dest, "copied object");
        Ok(())
    }

    /// Download into a new file under `local_dir` (system temp dir when
    /// `None`) and return its path. The file is kept.
    pub fn download_file(
        &self,
        key: &str,
        bucket: Option<&str>,
        local_dir: Option<&Path>,
    ) -> Result<PathBuf> {
        let loc = self.locate(key, bucket)?;
        let body = self.get_conn()?.get_object(&loc.bucket, &loc.key)?;

        let dir = local_dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let mut file = tempfile::Builder::new()
            .prefix("s3hook_")
            .tempfile_in(&dir)?;
        file.write_all(&body)?;
        let (_, path) = file.keep().map_err(|e| HookError::Io(e.error))?;
        debug!(object = %loc, path = %path.display(), "downloaded object");
        Ok(path)
    }

    // -------------------------------------------------------------------------
    // Bulk delete
    // -------------------------------------------------------------------------

    /// Delete `keys`, at most `delete_batch_size` per request, one request
    /// after another.
    ///
    /// Keys the store reports as failed are gathered across all batches and
    /// returned as one [`HookError::Delete`], in first-failure order. Errors
    /// of the request itself stop immediately.
    #[instrument(skip(self, keys), fields(num_keys = keys.len()))]
    pub fn delete_objects(&self, bucket: Option<&str>, keys: &[String]) -> Result<()> {
        let bucket = self.bucket_name(bucket)?;
        if keys.is_empty() {
            return Ok(());
        }
        let client = self.get_conn()?;

        let mut failed_keys = Vec::new();
        let mut seen = HashSet::new();
        for (batch, chunk) in keys.chunks(self.config.delete_batch_size).enumerate() {
            let report = client.delete_objects(&bucket, chunk)?;
            debug!(
                batch,
                requested = chunk.len(),
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "delete batch done"
            );
            for key in report.failed {
                if seen.insert(key.clone()) {
                    failed_keys.push(key);
                }
            }
        }

        if !failed_keys.is_empty() {
            warn!(%bucket, failed = failed_keys.len(), "some keys could not be deleted");
            return Err(HookError::Delete { failed_keys });
        }
        info!(%bucket, num_keys = keys.len(), "deleted objects");
        Ok(())
    }
}

/// `a/b/` → `a/`, `dir/` → `` (the level a prefix is listed from).
fn previous_level<'a>(prefix: &'a str, delimiter: &str) -> &'a str {
    let trimmed = prefix.strip_suffix(delimiter).unwrap_or(prefix);
    match trimmed.rfind(delimiter) {
        Some(idx) => &prefix[..idx + delimiter.len()],
        None => "",
    }
}

/// Compile a key wildcard. Runs of `*` collapse to one, and a `[` that never
/// closes is matched literally.
fn wildcard_pattern(wildcard: &str) -> std::result::Result<glob::Pattern, glob::PatternError> {
    let chars: Vec<char> = wildcard.chars().collect();
    let mut out = String::with_capacity(wildcard.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '*' if out.ends_with('*') => {}
            // A class needs at least one member before its `]`.
            '[' if !chars.get(i + 2..).is_some_and(|rest| rest.contains(&']')) => {
                out.push_str("[[]")
            }
            _ => out.push(c),
        }
    }
    glob::Pattern::new(&out)
}
