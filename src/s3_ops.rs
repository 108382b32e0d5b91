// src/s3_ops.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! `AwsS3Client`: the [`ObjectClient`] backed by `aws-sdk-s3`.
//!
//! Every call is an async helper driven to completion on the global runtime
//! (see [`crate::s3_client::run_on_global_rt`]), so the trait stays blocking.

use anyhow::Context;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, CsvInput, CsvOutput, Delete,
    ExpressionType, InputSerialization, JsonInput, JsonOutput, JsonType, ObjectIdentifier,
    OutputSerialization, ParquetInput, SelectObjectContentEventStream, ServerSideEncryption,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::error::{HookError, Result};
use crate::object_store::{
    DeleteReport, ListRequest, Listing, ObjectClient, ObjectSummary, SelectFormat, SelectRequest,
};
use crate::s3_client::{aws_s3_client, run_on_global_rt};
use crate::s3_utils::ObjectLocator;

/// S3 client bound to one connection.
#[derive(Clone, Debug)]
pub struct AwsS3Client {
    client: Client,
    region: Option<String>,
}

impl AwsS3Client {
    /// Build a client from `conn`; fails with `NoCredentials` when neither the
    /// connection nor the SDK's default chain has credentials.
    pub fn connect(conn: &Connection) -> Result<Self> {
        let (client, region) = aws_s3_client(conn)?;
        Ok(Self { client, region })
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client, region: Option<String>) -> Self {
        Self { client, region }
    }

    pub fn as_inner(&self) -> &Client {
        &self.client
    }
}

impl ObjectClient for AwsS3Client {
    fn region(&self) -> Option<String> {
        self.region.clone()
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        run_on_global_rt(bucket_exists_async(self.client.clone(), bucket.to_owned()))
    }

    fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        run_on_global_rt(create_bucket_async(
            self.client.clone(),
            bucket.to_owned(),
            location.map(str::to_owned),
        ))
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let client = self.client.clone();
        let bucket = bucket.to_owned();
        run_on_global_rt(async move {
            client
                .delete_bucket()
                .bucket(&bucket)
                .send()
                .await
                .with_context(|| format!("delete_bucket {bucket} failed"))?;
            Ok::<_, HookError>(())
        })
    }

    fn get_bucket_location(&self, bucket: &str) -> Result<Option<String>> {
        let client = self.client.clone();
        let bucket = bucket.to_owned();
        run_on_global_rt(async move {
            let resp = client
                .get_bucket_location()
                .bucket(&bucket)
                .send()
                .await
                .with_context(|| format!("get_bucket_location {bucket} failed"))?;
            let location = resp
                .location_constraint()
                .map(|c| c.as_str().to_owned())
                .filter(|c| !c.is_empty());
            Ok::<_, HookError>(location)
        })
    }

    fn list_objects(&self, request: &ListRequest) -> Result<Listing> {
        run_on_global_rt(list_objects_async(self.client.clone(), request.clone()))
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectSummary>> {
        run_on_global_rt(head_object_async(
            self.client.clone(),
            bucket.to_owned(),
            key.to_owned(),
        ))
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        run_on_global_rt(get_object_async(
            self.client.clone(),
            bucket.to_owned(),
            key.to_owned(),
        ))
    }

    fn put_object(&self, bucket: &str, key: &str, body: Bytes, encrypt: bool) -> Result<()> {
        let client = self.client.clone();
        let bucket = bucket.to_owned();
        let key = key.to_owned();
        run_on_global_rt(async move {
            let mut req = client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .body(ByteStream::from(body));
            if encrypt {
                req = req.server_side_encryption(ServerSideEncryption::Aes256);
            }
            req.send()
                .await
                .with_context(|| format!("put_object s3://{bucket}/{key} failed"))?;
            Ok::<_, HookError>(())
        })
    }

    fn copy_object(&self, source: &ObjectLocator, dest: &ObjectLocator) -> Result<()> {
        let client = self.client.clone();
        let source = source.clone();
        let dest = dest.clone();
        run_on_global_rt(async move {
            client
                .copy_object()
                .copy_source(format!("{}/{}", source.bucket, source.key))
                .bucket(&dest.bucket)
                .key(&dest.key)
                .send()
                .await
                .with_context(|| format!("copy_object {source} -> {dest} failed"))?;
            Ok::<_, HookError>(())
        })
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteReport> {
        run_on_global_rt(delete_objects_async(
            self.client.clone(),
            bucket.to_owned(),
            keys.to_vec(),
        ))
    }

    fn select_object_content(
        &self,
        bucket: &str,
        key: &str,
        request: &SelectRequest,
    ) -> Result<Bytes> {
        run_on_global_rt(select_object_content_async(
            self.client.clone(),
            bucket.to_owned(),
            key.to_owned(),
            request.clone(),
        ))
    }
}

// -----------------------------------------------------------------------------
//  Async helpers
// -----------------------------------------------------------------------------

async fn bucket_exists_async(client: Client, bucket: String) -> Result<bool> {
    match client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => Ok(true),
        // 404 / 403 and friends: the bucket is not usable by us.
        Err(SdkError::ServiceError(e)) => {
            debug!(%bucket, code = ?e.err().code(), "head_bucket refused");
            Ok(false)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("head_bucket {bucket} failed"))
            .into()),
    }
}

async fn create_bucket_async(
    client: Client,
    bucket: String,
    location: Option<String>,
) -> Result<()> {
    let mut req = client.create_bucket().bucket(&bucket);
    if let Some(location) = location {
        let cfg = CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(location.as_str()))
            .build();
        req = req.create_bucket_configuration(cfg);
    }
    match req.send().await {
        Ok(_) => Ok(()),
        Err(e) if e.code() == Some("BucketAlreadyOwnedByYou") => {
            debug!(%bucket, "bucket already owned by us");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("create_bucket {bucket} failed"))
            .into()),
    }
}

/// Drives the SDK paginator until exhausted or `max_items` is reached.
#[instrument(skip(client), fields(bucket = %request.bucket, prefix = %request.prefix))]
async fn list_objects_async(client: Client, request: ListRequest) -> Result<Listing> {
    let mut req = client.list_objects_v2().bucket(&request.bucket);
    if !request.prefix.is_empty() {
        req = req.prefix(&request.prefix);
    }
    if !request.delimiter.is_empty() {
        req = req.delimiter(&request.delimiter);
    }
    let mut paginator = req.into_paginator();
    if let Some(size) = request.page_size {
        paginator = paginator.page_size(i32::try_from(size).unwrap_or(i32::MAX));
    }
    let max = request.max_items.unwrap_or(usize::MAX);

    let mut pages = paginator.send();
    let mut listing = Listing::default();
    while let Some(page) = pages.next().await {
        let page = page.with_context(|| format!("list_objects_v2 on {} failed", request.bucket))?;
        listing.keys.extend(
            page.contents()
                .iter()
                .filter_map(|o| o.key())
                .map(str::to_owned),
        );
        listing.prefixes.extend(
            page.common_prefixes()
                .iter()
                .filter_map(|p| p.prefix())
                .map(str::to_owned),
        );
        if listing.keys.len() >= max && listing.prefixes.len() >= max {
            break;
        }
    }
    listing.keys.truncate(max);
    listing.prefixes.truncate(max);
    Ok(listing)
}

async fn head_object_async(
    client: Client,
    bucket: String,
    key: String,
) -> Result<Option<ObjectSummary>> {
    match client.head_object().bucket(&bucket).key(&key).send().await {
        Ok(out) => Ok(Some(ObjectSummary {
            size: out.content_length().unwrap_or(0).max(0) as u64,
            e_tag: out.e_tag().map(str::to_owned),
            content_type: out.content_type().map(str::to_owned),
            bucket,
            key,
        })),
        Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("head_object s3://{bucket}/{key} failed"))
            .into()),
    }
}

async fn get_object_async(client: Client, bucket: String, key: String) -> Result<Bytes> {
    let resp = match client.get_object().bucket(&bucket).key(&key).send().await {
        Ok(resp) => resp,
        Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
            return Err(HookError::NotFound { bucket, key });
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("get_object s3://{bucket}/{key} failed"))
                .into());
        }
    };
    let data = resp
        .body
        .collect()
        .await
        .context("collect body failed")?
        .into_bytes();
    Ok(data)
}

#[instrument(skip(client, keys), fields(num_keys = keys.len()))]
async fn delete_objects_async(
    client: Client,
    bucket: String,
    keys: Vec<String>,
) -> Result<DeleteReport> {
    // 1. Build ObjectIdentifier list, propagating any build errors.
    let objects = keys
        .into_iter()
        .map(|k| ObjectIdentifier::builder().key(k).build())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("building ObjectIdentifier failed")?;

    // 2. Build the Delete struct (also returns Result).
    let delete = Delete::builder()
        .set_objects(Some(objects))
        .quiet(false)
        .build()
        .context("building Delete failed")?;

    // 3. Call S3.
    let out = client
        .delete_objects()
        .bucket(&bucket)
        .delete(delete)
        .send()
        .await
        .with_context(|| format!("delete_objects on {bucket} failed"))?;

    Ok(DeleteReport {
        deleted: out
            .deleted()
            .iter()
            .filter_map(|d| d.key())
            .map(str::to_owned)
            .collect(),
        failed: out
            .errors()
            .iter()
            .filter_map(|e| e.key())
            .map(str::to_owned)
            .collect(),
    })
}

async fn select_object_content_async(
    client: Client,
    bucket: String,
    key: String,
    request: SelectRequest,
) -> Result<Bytes> {
    let output = output_serialization(request.output)?;
    let mut out = client
        .select_object_content()
        .bucket(&bucket)
        .key(&key)
        .expression(&request.expression)
        .expression_type(ExpressionType::Sql)
        .input_serialization(input_serialization(request.input))
        .output_serialization(output)
        .send()
        .await
        .with_context(|| format!("select_object_content s3://{bucket}/{key} failed"))?;

    let mut buf = Vec::new();
    while let Some(event) = out
        .payload
        .recv()
        .await
        .context("reading select event stream failed")?
    {
        if let SelectObjectContentEventStream::Records(records) = event {
            if let Some(payload) = records.payload() {
                buf.extend_from_slice(payload.as_ref());
            }
        }
    }
    Ok(Bytes::from(buf))
}

fn input_serialization(format: SelectFormat) -> InputSerialization {
    let builder = InputSerialization::builder();
    match format {
        SelectFormat::Csv => builder.csv(CsvInput::builder().build()),
        SelectFormat::JsonLines => builder.json(JsonInput::builder().r#type(JsonType::Lines).build()),
        SelectFormat::Parquet => builder.parquet(ParquetInput::builder().build()),
    }
    .build()
}

fn output_serialization(format: SelectFormat) -> Result<OutputSerialization> {
    let builder = OutputSerialization::builder();
    let builder = match format {
        SelectFormat::Csv => builder.csv(CsvOutput::builder().build()),
        SelectFormat::JsonLines => builder.json(JsonOutput::builder().build()),
        SelectFormat::Parquet => {
            return Err(HookError::Config(
                "parquet is only supported as a select input format".into(),
            ));
        }
    };
    Ok(builder.build())
}
