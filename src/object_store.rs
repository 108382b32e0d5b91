// src/object_store.rs
//
// The object-storage client seam. `S3Hook` only talks to an `ObjectClient`;
// `AwsS3Client` drives the AWS SDK and `InMemoryClient` keeps everything in
// process for tests and dry runs.

use bytes::Bytes;

use crate::constants::DEFAULT_SELECT_EXPRESSION;
use crate::error::Result;
use crate::s3_utils::ObjectLocator;

/// Arguments of a listing call, passed straight through to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    /// Empty means no grouping into common prefixes.
    pub delimiter: String,
    pub page_size: Option<usize>,
    /// Upper bound on returned keys and on returned prefixes.
    pub max_items: Option<usize>,
}

/// Keys and common prefixes of a listing, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub keys: Vec<String>,
    pub prefixes: Vec<String>,
}

/// Metadata of a single object, as returned by HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub e_tag: Option<String>,
    pub content_type: Option<String>,
}

/// Outcome of one DeleteObjects request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// Keys the store refused, in the order it reported them.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectFormat {
    Csv,
    /// One JSON document per line.
    JsonLines,
    /// Input only.
    Parquet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRequest {
    pub expression: String,
    pub input: SelectFormat,
    pub output: SelectFormat,
}

impl Default for SelectRequest {
    fn default() -> Self {
        Self {
            expression: DEFAULT_SELECT_EXPRESSION.to_string(),
            input: SelectFormat::Csv,
            output: SelectFormat::Csv,
        }
    }
}

impl SelectRequest {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }
}

/// Blocking object-storage client.
///
/// Methods are thin pass-throughs: pagination, retries and credential
/// handling are the implementation's business.
pub trait ObjectClient: Send + Sync {
    /// Region the client talks to, if known.
    fn region(&self) -> Option<String>;

    /// `Ok(false)` when the store answers that the bucket is missing or not ours.
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// `location` becomes the bucket's LocationConstraint; `None` sends none.
    fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()>;

    fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// `None` for buckets without a LocationConstraint (us-east-1).
    fn get_bucket_location(&self, bucket: &str) -> Result<Option<String>>;

    /// Full listing, every page fetched.
    fn list_objects(&self, request: &ListRequest) -> Result<Listing>;

    /// `Ok(None)` when the object does not exist.
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectSummary>>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// `encrypt` asks for AES256 server-side encryption.
    fn put_object(&self, bucket: &str, key: &str, body: Bytes, encrypt: bool) -> Result<()>;

    fn copy_object(&self, source: &ObjectLocator, dest: &ObjectLocator) -> Result<()>;

    /// One DeleteObjects request. Callers keep `keys` within the store's limit.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteReport>;

    /// Run an S3 Select query and return the concatenated record payloads.
    fn select_object_content(
        &self,
        bucket: &str,
        key: &str,
        request: &SelectRequest,
    ) -> Result<Bytes>;
}
