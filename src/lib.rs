// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: module tree and public re-exports.

// ===== Core Public API =====
pub mod hook;
pub mod config;
pub mod connection;
pub mod error;

pub use hook::{CallShape, ListOptions, PutOptions, S3Hook};
pub use config::HookConfig;
pub use connection::{
    Connection, ConnectionResolver, Credentials, EnvConnectionResolver, StaticConnectionResolver,
};
pub use error::{HookError, Result};

// ===== Storage backends =====
pub mod object_store;
pub mod memory_store;
pub mod s3_ops;

pub use object_store::{
    DeleteReport, ListRequest, Listing, ObjectClient, ObjectSummary, SelectFormat, SelectRequest,
};
pub use memory_store::InMemoryClient;
pub use s3_ops::AwsS3Client;

// ===== Internal Modules (Implementation) =====
pub mod constants;
pub mod s3_client;
pub mod s3_utils;

pub use s3_client::run_on_global_rt;
pub use s3_utils::{parse_s3_url, ObjectLocator};
