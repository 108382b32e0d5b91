// src/s3_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Blocking bridge to the async AWS Rust SDK.
//! Owns one process-wide multi-thread Tokio runtime and builds SDK clients
//! from a [`Connection`].

use std::sync::mpsc;
use std::{env, thread, time::Duration};

use anyhow::anyhow;
use aws_config::meta::region::RegionProviderChain;
use aws_config::timeout::TimeoutConfig;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::{config::Region, Client};
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder as TokioBuilder, Handle};
use tracing::debug;

use crate::connection::Connection;
use crate::constants::{
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_REGION, ENV_OPERATION_TIMEOUT_SECS, ENV_RT_THREADS,
};
use crate::error::{HookError, Result};

// -----------------------------------------------------------------------------
// Global runtime (lazy, thread-safe)
// -----------------------------------------------------------------------------
static RT_HANDLE: OnceCell<Handle> = OnceCell::new();

// Create (once) a background multi-thread Tokio runtime and return its Handle.
fn global_rt_handle() -> Result<&'static Handle> {
    RT_HANDLE.get_or_try_init(|| -> Result<Handle> {
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("s3hook-rt".to_string())
            .spawn(move || {
                let threads = get_runtime_threads();
                debug!("Creating Tokio runtime with {} worker threads", threads);

                let rt = match TokioBuilder::new_multi_thread()
                    .enable_all()
                    .worker_threads(threads)
                    .thread_name("s3hook-rt-worker")
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                // Send a Handle clone back to the creator, then park the runtime forever.
                let _ = tx.send(Ok(rt.handle().clone()));
                rt.block_on(std::future::pending::<()>());
            })?;

        let handle = rx
            .recv()
            .map_err(|_| HookError::Store(anyhow!("s3hook runtime thread exited during startup")))??;
        Ok(handle)
    })
}

/// Worker threads for the global runtime, `S3HOOK_RT_THREADS` overrides.
fn get_runtime_threads() -> usize {
    env::var(ENV_RT_THREADS)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| num_cpus::get().clamp(2, 8))
}

fn get_operation_timeout() -> Duration {
    env::var(ENV_OPERATION_TIMEOUT_SECS)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS))
}

/// Run an async `fut` on the global runtime and block the **current** thread
/// until it completes. Safe to call from plain threads and from inside
/// another runtime.
pub fn run_on_global_rt<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = global_rt_handle()?;
    let (tx, rx) = mpsc::channel();

    handle.spawn(async move {
        let _ = tx.send(fut.await);
    });

    rx.recv()
        .map_err(|_| HookError::Store(anyhow!("global runtime task crashed: RecvError(())")))?
}

// -----------------------------------------------------------------------------
// Client factory
// -----------------------------------------------------------------------------

/// Build an SDK client for `conn`. Blocks on the global runtime.
pub fn aws_s3_client(conn: &Connection) -> Result<(Client, Option<String>)> {
    run_on_global_rt(aws_s3_client_async(conn.clone()))
}

/// Async half of [`aws_s3_client`]; returns the client and its region.
///
/// Static keys on the connection win. Without them the SDK's default
/// provider chain is used (environment, profiles, SSO, web identity, IMDS).
/// Credentials are resolved once here, so a chain that finds nothing fails
/// with [`HookError::NoCredentials`] instead of on the first request.
pub async fn aws_s3_client_async(conn: Connection) -> Result<(Client, Option<String>)> {
    let region = RegionProviderChain::first_try(conn.region.map(Region::new))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(5))
        .operation_timeout(get_operation_timeout())
        .build();

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region)
        .timeout_config(timeout_config);
    let static_keys = conn.credentials.is_some();
    if let Some(creds) = conn.credentials {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            creds.access_key_id,
            creds.secret_access_key,
            creds.session_token,
            None,
            "s3hook",
        ));
    }
    let custom_endpoint = conn.endpoint_url.is_some();
    if let Some(endpoint) = conn.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let cfg = loader.load().await;
    let region = cfg.region().map(|r| r.to_string());

    let provider = cfg
        .credentials_provider()
        .ok_or_else(|| HookError::NoCredentials {
            conn_id: conn.conn_id.clone(),
        })?;
    ensure_credentials(&conn.conn_id, &provider).await?;

    // S3-compatible services behind a custom endpoint (MinIO, Ceph, ...)
    // need path-style addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&cfg)
        .force_path_style(custom_endpoint)
        .build();
    debug!(conn_id = %conn.conn_id, ?region, static_keys, custom_endpoint, "built S3 client");
    Ok((Client::from_conf(s3_config), region))
}

/// Ask `provider` for credentials once. "Nothing configured" becomes
/// `NoCredentials`; any other provider failure is a store error.
async fn ensure_credentials(conn_id: &str, provider: &impl ProvideCredentials) -> Result<()> {
    match provider.provide_credentials().await {
        Ok(_) => Ok(()),
        Err(CredentialsError::CredentialsNotLoaded(_)) => Err(HookError::NoCredentials {
            conn_id: conn_id.to_owned(),
        }),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("resolving credentials for connection {conn_id} failed"))
            .into()),
    }
}
