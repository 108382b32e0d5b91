// src/constants.rs
//
// Centralized constants for s3hook to avoid hardcoded values throughout the codebase

/// Connection id used when the caller does not name one.
pub const DEFAULT_CONN_ID: &str = "aws_default";

/// Region assumed when neither the connection nor the environment names one.
/// Buckets created here get no LocationConstraint.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum number of keys S3 accepts in a single DeleteObjects request.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

/// URL schemes accepted by the location parser. The first one is used when
/// a locator is rendered back to a URL.
pub const S3_SCHEMES: &[&str] = &["s3://", "s3a://", "s3n://"];

/// Default S3 Select expression, returns the whole object.
pub const DEFAULT_SELECT_EXPRESSION: &str = "SELECT * FROM S3Object";

// ============================================================================
// Environment variables
// ============================================================================

/// Connection id picked up by `HookConfig::from_env`.
pub const ENV_CONN_ID: &str = "S3HOOK_CONN_ID";

/// Override for the delete batch size (keys per request).
pub const ENV_DELETE_BATCH_SIZE: &str = "S3HOOK_DELETE_BATCH_SIZE";

/// Default page size for listings.
pub const ENV_PAGE_SIZE: &str = "S3HOOK_PAGE_SIZE";

/// Worker threads for the background Tokio runtime.
pub const ENV_RT_THREADS: &str = "S3HOOK_RT_THREADS";

/// Prefix of per-connection variables, e.g. `S3HOOK_CONN_AWS_DEFAULT_BUCKET`.
pub const ENV_CONN_PREFIX: &str = "S3HOOK_CONN_";

/// Per-operation timeout for SDK calls (seconds).
pub const ENV_OPERATION_TIMEOUT_SECS: &str = "S3HOOK_OPERATION_TIMEOUT_SECS";

/// Default timeout for storage operations (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300; // 5 minutes
