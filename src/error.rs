// src/error.rs
//
// Error taxonomy shared by the hook, the connection resolvers and the clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// The string is not an object-storage URL this crate understands.
    #[error("invalid object location {url:?}: {reason}")]
    InvalidLocation { url: String, reason: &'static str },

    /// No bucket was supplied and the connection has no default bucket.
    #[error("no bucket name supplied and connection {conn_id:?} has no default bucket")]
    MissingBucket { conn_id: String },

    /// Credentials could not be resolved for the connection.
    #[error("unable to locate credentials for connection {conn_id:?}")]
    NoCredentials { conn_id: String },

    /// One or more keys were reported as failed by the store.
    #[error("Errors when deleting: [{}]", quote_keys(.failed_keys))]
    Delete { failed_keys: Vec<String> },

    #[error("The key {key} already exists.")]
    KeyExists { key: String },

    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("object body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything the underlying store reported, with the failing call as context.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl HookError {
    /// Keys carried by a `Delete` error, empty for every other variant.
    pub fn failed_keys(&self) -> &[String] {
        match self {
            HookError::Delete { failed_keys } => failed_keys,
            _ => &[],
        }
    }
}

fn quote_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = HookError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_error_lists_every_key() {
        let err = HookError::Delete {
            failed_keys: vec!["key-1".into(), "dir/key-2".into()],
        };
        assert_eq!(err.to_string(), "Errors when deleting: ['key-1', 'dir/key-2']");
        assert_eq!(err.failed_keys().len(), 2);
    }

    #[test]
    fn other_errors_have_no_failed_keys() {
        let err = HookError::MissingBucket { conn_id: "aws_default".into() };
        assert!(err.failed_keys().is_empty());
        assert!(err.to_string().contains("aws_default"));
    }
}
