//! S3-compatible object-store backend.
//!
//! Talks to any S3 API (MinIO in development) with path-style addressing.
//! Presigned GET URLs carry `response-content-disposition` so the browser
//! sees the original filename; when the store sits behind a reverse proxy,
//! `public_endpoint_override` rewrites the signed URL's origin.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use depot_core::defaults::STORE_OP_TIMEOUT_SECS;
use depot_core::{DepotConfig, Error, Result};

use crate::retry::with_retry;
use crate::{content_disposition, Disposition, ObjectStore};

/// Production object store over an S3-compatible endpoint.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
    public_endpoint_override: Option<String>,
}

impl S3ObjectStore {
    /// Build a client against the configured endpoint.
    ///
    /// Credentials come from the SDK's default chain (environment, profile,
    /// instance metadata). Path-style addressing is forced for MinIO
    /// compatibility.
    pub async fn connect(config: &DepotConfig) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .endpoint_url(&config.object_store_endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            endpoint: config.object_store_endpoint.clone(),
            public_endpoint_override: config.public_endpoint_override.clone(),
        })
    }

    /// Swap the internal endpoint for the public one in a presigned URL.
    fn rewrite_public(&self, url: String) -> String {
        match &self.public_endpoint_override {
            Some(public) if url.starts_with(&self.endpoint) => {
                format!("{}{}", public.trim_end_matches('/'), &url[self.endpoint.len()..])
            }
            _ => url,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, locator: &str, bytes: &[u8], mime: &str) -> Result<()> {
        let body = bytes.to_vec();
        with_retry("put", || {
            let body = body.clone();
            async move {
                let fut = self
                    .client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(locator)
                    .content_type(mime)
                    .body(ByteStream::from(body))
                    .send();
                timed(fut)
                    .await?
                    .map_err(|e| map_sdk_error("put", locator, e))?;
                Ok(())
            }
        })
        .await?;

        debug!(
            subsystem = "store",
            component = "s3",
            op = "put",
            locator,
            size_bytes = bytes.len(),
            "blob stored"
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        locator: &str,
        disposition: Disposition,
        filename: &str,
        ttl: Duration,
    ) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::InvalidArgument(format!("presign ttl: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(locator)
            .response_content_disposition(content_disposition(disposition, filename))
            .presigned(presign_config)
            .await
            .map_err(|e| map_sdk_error("presign", locator, e))?;

        Ok(self.rewrite_public(presigned.uri().to_string()))
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        with_retry("remove", || async {
            let fut = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(locator)
                .send();
            timed(fut)
                .await?
                .map_err(|e| map_sdk_error("remove", locator, e))?;
            Ok(())
        })
        .await?;

        debug!(
            subsystem = "store",
            component = "s3",
            op = "remove",
            locator,
            "blob removed"
        );
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        let result = with_retry("head", || async {
            let fut = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(locator)
                .send();
            match timed(fut).await? {
                Ok(_) => Ok(true),
                // HEAD on a missing key has no error body, so match the
                // typed variant rather than the (absent) error code.
                Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
                Err(e) => Err(map_sdk_error("head", locator, e)),
            }
        })
        .await;

        match result {
            Ok(found) => Ok(found),
            Err(Error::NotFound(_)) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

/// Apply the secondary per-operation timeout.
async fn timed<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(STORE_OP_TIMEOUT_SECS), fut)
        .await
        .map_err(|_| Error::Transient("store operation timed out".to_string()))
}

/// Classify an SDK failure into the domain taxonomy.
///
/// Connection-level failures are retryable; `NoSuchKey`-family service codes
/// become `NotFound`; throttling and 5xx-style codes stay retryable;
/// everything else is a hard `Storage` error.
fn map_sdk_error<E, R>(op: &str, locator: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            Error::Transient(format!("{op} {locator}: {err:?}"))
        }
        SdkError::ServiceError(ctx) => match ctx.err().code().unwrap_or_default() {
            "NoSuchKey" | "NotFound" => Error::NotFound(format!("{op} {locator}")),
            code @ ("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout") => {
                Error::Transient(format!("{op} {locator}: {code}"))
            }
            code => Error::Storage(format!("{op} {locator}: {code}")),
        },
        _ => Error::Storage(format!("{op} {locator}: {err:?}")),
    }
}
