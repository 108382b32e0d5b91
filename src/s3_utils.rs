//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// src/s3_utils.rs
//! Object-storage URL helpers: `s3://bucket/key` <-> [`ObjectLocator`].

use std::fmt;
use std::str::FromStr;

use crate::constants::S3_SCHEMES;
use crate::error::{HookError, Result};

/// A bucket/key pair addressed by an object-storage URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Split into `(bucket, key)`.
    pub fn into_parts(self) -> (String, String) {
        (self.bucket, self.key)
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEMES[0], self.bucket, self.key)
    }
}

/// Lets `clap` and friends parse `s3://bucket/key` straight into a locator.
impl FromStr for ObjectLocator {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self> {
        parse_s3_url(s)
    }
}

/// Split `s3://bucket/key` → (`bucket`, `key`).
///
/// The key is everything after the first `/` following the bucket and is kept
/// verbatim, so `s3://bucket//a` yields the key `/a`. A URL with no `/` after
/// the bucket yields an empty key.
pub fn parse_s3_url(url: &str) -> Result<ObjectLocator> {
    let rest = S3_SCHEMES
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .ok_or_else(|| HookError::InvalidLocation {
            url: url.to_owned(),
            reason: "URL must start with s3://",
        })?;

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(HookError::InvalidLocation {
            url: url.to_owned(),
            reason: "please provide a bucket name",
        });
    }
    Ok(ObjectLocator::new(bucket, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        let parsed = parse_s3_url("s3://test/this/is/not/a-real-key.txt").unwrap();
        assert_eq!(
            parsed.into_parts(),
            ("test".to_string(), "this/is/not/a-real-key.txt".to_string()),
            "Incorrect parsing of the s3 url"
        );
    }

    #[test]
    fn keeps_leading_slash_in_key() {
        let parsed = parse_s3_url("s3://bucket//a").unwrap();
        assert_eq!(parsed.bucket(), "bucket");
        assert_eq!(parsed.key(), "/a");
    }

    #[test]
    fn hadoop_schemes_are_accepted() {
        assert_eq!(parse_s3_url("s3a://b/k").unwrap(), ObjectLocator::new("b", "k"));
        assert_eq!(parse_s3_url("s3n://b/k").unwrap(), ObjectLocator::new("b", "k"));
    }

    #[test]
    fn bucket_without_key() {
        let parsed = parse_s3_url("s3://bucket").unwrap();
        assert_eq!(parsed.bucket(), "bucket");
        assert_eq!(parsed.key(), "");
    }

    #[test]
    fn rejects_missing_scheme_and_bucket() {
        for bad in ["bucket/key", "http://bucket/key", "s3://", "s3:///key", ""] {
            let err = parse_s3_url(bad).unwrap_err();
            assert!(
                matches!(err, HookError::InvalidLocation { .. }),
                "expected InvalidLocation for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        let pairs = [
            ("bucket", "key"),
            ("my-bucket", "dir/sub/file.csv"),
            ("b", "a*b?c"),
            ("bucket", ""),
        ];
        for (bucket, key) in pairs {
            let loc = ObjectLocator::new(bucket, key);
            let reparsed: ObjectLocator = loc.to_string().parse().unwrap();
            assert_eq!(reparsed, loc);
        }
    }
}
