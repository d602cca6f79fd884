//! [`Transport`] implementation for S3-compatible storage
//!
//! Each file is sent with a single `PutObject` request whose body is wrapped
//! in a [`ProgressBody`], so every chunk handed to the HTTP client is reported
//! as a byte delta to the owning actor.

use crate::model::error::{TransportError, TransportResult};
use crate::model::upload_file::FileSource;
use crate::services::transport::{ProgressReporter, Transport, UploadRequest};
use crate::settings::config::Settings;
use crate::settings::file_credentials::FileCredential;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::{
    primitives::{ByteStream, SdkBody},
    Client,
};
use aws_smithy_runtime_api::http::Request;
use aws_smithy_types::error::display::DisplayErrorContext;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http_body::{Body, SizeHint};
use std::collections::HashMap;
use std::sync::Arc;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::RwLock;

/// Region used when neither the credential nor the environment names one
const FALLBACK_REGION: &str = "eu-north-1";

/// Cache key for S3 clients
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClientCacheKey {
    access_key_id: String,
    region: String,
    endpoint_url: Option<String>,
}

impl ClientCacheKey {
    fn from_credential(credential: &FileCredential) -> Self {
        ClientCacheKey {
            access_key_id: credential.access_key.clone(),
            region: credential.default_region.clone(),
            endpoint_url: credential.endpoint_url.clone(),
        }
    }

    fn short_key(&self) -> &str {
        &self.access_key_id[..8.min(self.access_key_id.len())]
    }
}

/// Pool of S3 clients for reuse across uploads.
///
/// AWS SDK clients are designed to be reused. Every actor of a session
/// usually shares the same credential, so they end up on the same client.
#[derive(Clone, Default)]
pub struct S3ClientPool {
    clients: Arc<RwLock<HashMap<ClientCacheKey, Client>>>,
}

impl S3ClientPool {
    pub fn new() -> Self {
        S3ClientPool::default()
    }

    /// Get an existing client or create a new one for the given credential
    pub async fn get_or_create(&self, credential: &FileCredential) -> Client {
        let key = ClientCacheKey::from_credential(credential);

        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return client.clone();
            }
        }

        let mut clients = self.clients.write().await;

        // Another task may have created it while we waited for the write lock
        if let Some(client) = clients.get(&key) {
            return client.clone();
        }

        tracing::debug!(
            "Creating new S3 client for region: {}, access_key: {}...",
            key.region,
            key.short_key()
        );

        let credentials = Credentials::new(
            credential.access_key.clone(),
            credential.secret_key.clone(),
            None,
            None,
            "s3upload",
        );
        let region_provider =
            RegionProviderChain::first_try(Region::new(credential.default_region.clone()))
                .or_default_provider()
                .or_else(Region::new(FALLBACK_REGION));
        let shared_config = aws_config::from_env()
            .credentials_provider(credentials)
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(credential.force_path_style);
        if let Some(endpoint_url) = &credential.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(builder.build());

        clients.insert(key, client.clone());
        client
    }

    pub async fn cached_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Uploads files to S3 buckets
#[derive(Clone)]
pub struct S3Transport {
    default_credential: FileCredential,
    default_bucket: Option<String>,
    key_prefix: Option<String>,
    client_pool: S3ClientPool,
}

impl S3Transport {
    pub fn new(default_credential: FileCredential) -> Self {
        S3Transport {
            default_credential,
            default_bucket: None,
            key_prefix: None,
            client_pool: S3ClientPool::new(),
        }
    }

    /// Apply the bucket and key prefix from the settings
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.default_bucket = settings.default_bucket.clone();
        self.key_prefix = settings.key_prefix.clone();
        self
    }

    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Object key for a file name, with the configured prefix applied
    fn object_key(&self, file_name: &str) -> String {
        match self.key_prefix.as_deref() {
            None | Some("") | Some("/") => file_name.to_string(),
            Some(prefix) if prefix.ends_with('/') => format!("{}{}", prefix, file_name),
            Some(prefix) => format!("{}/{}", prefix, file_name),
        }
    }

    async fn put_object(
        client: Client,
        bucket: String,
        key: String,
        source: FileSource,
        progress: ProgressReporter,
    ) -> TransportResult {
        let body = match source {
            FileSource::Path(path) => ByteStream::read_from()
                .path(path)
                .build()
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?,
            FileSource::Memory(bytes) => ByteStream::from(bytes),
        };

        let request = client.put_object().bucket(&bucket).key(&key).body(body);
        let customized = request
            .customize()
            .map_request(move |req| ProgressBody::<SdkBody>::replace(req, progress.clone()));

        match customized.send().await {
            Ok(_) => {
                tracing::debug!("PutObject {}/{} succeeded", bucket, key);
                Ok(())
            }
            Err(e) => {
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!("Upload SdkError: {}", message);
                Err(TransportError::from_message(message))
            }
        }
    }
}

impl Transport for S3Transport {
    fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> BoxFuture<'static, TransportResult> {
        let bucket = request.bucket_id.or_else(|| self.default_bucket.clone());
        let credential = request
            .credential
            .unwrap_or_else(|| self.default_credential.clone());
        let key = self.object_key(request.file.name());
        let source = request.file.source().clone();
        let pool = self.client_pool.clone();

        async move {
            let bucket = bucket.ok_or(TransportError::MissingBucket)?;
            let client = pool.get_or_create(&credential).await;
            Self::put_object(client, bucket, key, source, progress).await
        }
        .boxed()
    }
}

struct ProgressTracker {
    content_length: u64,
    reporter: ProgressReporter,
}

impl ProgressTracker {
    fn track(&self, len: u64) {
        self.reporter.report(len);
    }
}

/// Request body that reports every chunk it yields
#[pin_project::pin_project]
pub struct ProgressBody<InnerBody> {
    #[pin]
    inner: InnerBody,
    // progress_tracker is a separate field, so it can be accessed as &mut.
    progress_tracker: ProgressTracker,
}

impl ProgressBody<SdkBody> {
    // Wraps the request body built by the SDK and hands it back as a new SdkBody
    pub fn replace(
        value: Request<SdkBody>,
        reporter: ProgressReporter,
    ) -> Result<Request<SdkBody>, Infallible> {
        let value = value.map(|body| {
            let len = body.content_length().unwrap_or_default();
            let body = ProgressBody::new(body, len, reporter.clone());
            SdkBody::from_body_0_4(body)
        });
        Ok(value)
    }
}

impl<InnerBody> ProgressBody<InnerBody>
where
    InnerBody: Body<Data = Bytes, Error = aws_smithy_types::body::Error>,
{
    pub fn new(body: InnerBody, content_length: u64, reporter: ProgressReporter) -> Self {
        Self {
            inner: body,
            progress_tracker: ProgressTracker {
                content_length,
                reporter,
            },
        }
    }
}

impl<InnerBody> Body for ProgressBody<InnerBody>
where
    InnerBody: Body<Data = Bytes, Error = aws_smithy_types::body::Error>,
{
    type Data = Bytes;

    type Error = aws_smithy_types::body::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = self.project();
        match this.inner.poll_data(cx) {
            Poll::Ready(Some(Ok(data))) => {
                this.progress_tracker.track(data.len() as u64);
                Poll::Ready(Some(Ok(data)))
            }
            other => other,
        }
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        self.project().inner.poll_trailers(cx)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.progress_tracker.content_length)
    }
}
