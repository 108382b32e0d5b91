// src/connection.rs
//
// Connection records and the resolvers that look them up by id.

use std::collections::HashMap;
use std::env;
use std::fmt;

use tracing::{debug, warn};

use crate::constants::ENV_CONN_PREFIX;
use crate::error::Result;

/// Static access-key credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn access_key_masked(&self) -> String {
        let visible: String = self.access_key_id.chars().take(4).collect();
        format!("{visible}****")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_masked())
            .field("secret_access_key", &"****")
            .field("session_token", &self.session_token.as_ref().map(|_| "****"))
            .finish()
    }
}

/// A stored connection: where to connect, as whom, and which bucket to use
/// when a call does not name one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub conn_id: String,
    pub default_bucket: Option<String>,
    pub credentials: Option<Credentials>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Connection {
    /// An empty connection: no default bucket, no credentials.
    pub fn new(conn_id: impl Into<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            ..Default::default()
        }
    }

    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint.into());
        self
    }
}

/// Looks up connections by id.
///
/// Implementations may perform I/O; their errors are passed through to the
/// hook's caller untouched.
pub trait ConnectionResolver: Send + Sync {
    fn get_connection(&self, conn_id: &str) -> Result<Connection>;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves connections from `S3HOOK_CONN_<ID>_*` variables, falling back to
/// the standard `AWS_*` variables for credentials, region and endpoint.
///
/// An id with no variables at all resolves to an empty [`Connection`].
pub struct EnvConnectionResolver {
    lookup: Lookup,
}

impl EnvConnectionResolver {
    /// Reads the process environment, loading `.env` first.
    pub fn new() -> Self {
        dotenvy::dotenv().ok();
        Self::with_lookup(|name| env::var(name).ok())
    }

    /// Reads variables from `lookup` instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn conn_var(&self, conn_id: &str, field: &str) -> Option<String> {
        self.var(&format!("{ENV_CONN_PREFIX}{}_{field}", env_key(conn_id)))
    }

    fn conn_var_or(&self, conn_id: &str, field: &str, fallback: &str) -> Option<String> {
        self.conn_var(conn_id, field).or_else(|| self.var(fallback))
    }
}

impl Default for EnvConnectionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionResolver for EnvConnectionResolver {
    fn get_connection(&self, conn_id: &str) -> Result<Connection> {
        let access_key = self.conn_var_or(conn_id, "ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID");
        let secret_key = self.conn_var_or(conn_id, "SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY");
        let credentials = match (access_key, secret_key) {
            (Some(ak), Some(sk)) => {
                let mut creds = Credentials::new(ak, sk);
                creds.session_token =
                    self.conn_var_or(conn_id, "SESSION_TOKEN", "AWS_SESSION_TOKEN");
                Some(creds)
            }
            (None, None) => None,
            _ => {
                warn!(conn_id, "only one of access key id / secret access key is set, ignoring both");
                None
            }
        };

        let conn = Connection {
            conn_id: conn_id.to_string(),
            default_bucket: self.conn_var(conn_id, "BUCKET"),
            credentials,
            region: self.conn_var_or(conn_id, "REGION", "AWS_REGION"),
            endpoint_url: self.conn_var_or(conn_id, "ENDPOINT_URL", "AWS_ENDPOINT_URL"),
        };
        debug!(?conn, "resolved connection from environment");
        Ok(conn)
    }
}

/// Upper-case the id and replace anything outside `[A-Z0-9]` with `_`.
fn env_key(conn_id: &str) -> String {
    conn_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Fixed set of connections held in memory. Unknown ids resolve to an empty
/// [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionResolver {
    connections: HashMap<String, Connection>,
}

impl StaticConnectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, connection: Connection) -> Self {
        self.insert(connection);
        self
    }

    pub fn insert(&mut self, connection: Connection) {
        self.connections.insert(connection.conn_id.clone(), connection);
    }
}

impl ConnectionResolver for StaticConnectionResolver {
    fn get_connection(&self, conn_id: &str) -> Result<Connection> {
        Ok(self
            .connections
            .get(conn_id)
            .cloned()
            .unwrap_or_else(|| Connection::new(conn_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(pairs: &[(&str, &str)]) -> EnvConnectionResolver {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConnectionResolver::with_lookup(move |name| map.get(name).cloned())
    }

    #[test]
    fn env_key_normalises_ids() {
        assert_eq!(env_key("aws_default"), "AWS_DEFAULT");
        assert_eq!(env_key("my-minio.local"), "MY_MINIO_LOCAL");
    }

    #[test]
    fn per_connection_variables_win() {
        let r = resolver(&[
            ("S3HOOK_CONN_MINIO_BUCKET", "test_bucket"),
            ("S3HOOK_CONN_MINIO_ACCESS_KEY_ID", "minioadmin"),
            ("S3HOOK_CONN_MINIO_SECRET_ACCESS_KEY", "miniosecret"),
            ("S3HOOK_CONN_MINIO_ENDPOINT_URL", "http://localhost:9000"),
            ("AWS_ACCESS_KEY_ID", "aws-key"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
            ("AWS_REGION", "eu-west-1"),
        ]);
        let conn = r.get_connection("minio").unwrap();
        assert_eq!(conn.default_bucket.as_deref(), Some("test_bucket"));
        assert_eq!(conn.credentials, Some(Credentials::new("minioadmin", "miniosecret")));
        assert_eq!(conn.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(conn.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn falls_back_to_aws_variables() {
        let r = resolver(&[
            ("AWS_ACCESS_KEY_ID", "aws-key"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]);
        let conn = r.get_connection("aws_default").unwrap();
        assert_eq!(conn.default_bucket, None);
        let creds = conn.credentials.unwrap();
        assert_eq!(creds.access_key_id, "aws-key");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn unknown_connection_is_empty() {
        let conn = resolver(&[]).get_connection("does_not_exist").unwrap();
        assert_eq!(conn, Connection::new("does_not_exist"));
    }

    #[test]
    fn half_credentials_are_dropped() {
        let conn = resolver(&[("AWS_ACCESS_KEY_ID", "aws-key")])
            .get_connection("aws_default")
            .unwrap();
        assert!(conn.credentials.is_none());
    }

    #[test]
    fn credentials_debug_is_masked() {
        let creds = Credentials::new("AKIAEXAMPLEKEY", "super-secret");
        let shown = format!("{creds:?}");
        assert!(shown.contains("AKIA****"));
        assert!(!shown.contains("super-secret"));
        assert!(!shown.contains("EXAMPLEKEY"));
    }

    #[test]
    fn static_resolver_returns_registered_connection() {
        let r = StaticConnectionResolver::new()
            .with(Connection::new("aws_default").with_default_bucket("test_bucket"));
        let conn = r.get_connection("aws_default").unwrap();
        assert_eq!(conn.default_bucket.as_deref(), Some("test_bucket"));
        assert_eq!(r.get_connection("other").unwrap(), Connection::new("other"));
    }
}
