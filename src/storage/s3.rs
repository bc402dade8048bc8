use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

use super::failure::{NetworkCause, ProviderFailure};
use super::object_store::{MAX_DELETE_BATCH, ObjectStore};

/// Wrapper around the AWS S3 client scoped to one bucket
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        S3Store {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                req = req.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| sdk_failure("list_objects", e))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .map(String::from),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/");
            if !prefix.is_empty() {
                req = req.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| sdk_failure("list_prefixes", e))?;

            names.extend(
                resp.common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix())
                    .filter_map(|p| p.strip_prefix(prefix))
                    .map(|p| p.trim_end_matches('/').to_string())
                    .filter(|p| !p.is_empty()),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        names.sort();
        Ok(names)
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), ProviderFailure> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(content_type) = content_type_for(key) {
            req = req.content_type(content_type);
        }

        req.send().await.map_err(|e| sdk_failure("put_object", e))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), ProviderFailure> {
        if keys.is_empty() {
            return Ok(());
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(ProviderFailure::service(
                "delete_objects",
                None,
                Some("TooManyKeys".to_string()),
                format!("{} keys exceeds the {MAX_DELETE_BATCH} key batch limit", keys.len()),
            ));
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| build_failure("delete_objects", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| build_failure("delete_objects", e))?;

        let resp = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_failure("delete_objects", e))?;

        // A 200 response can still report per-key failures
        if let Some(first) = resp.errors().first() {
            return Err(ProviderFailure::service(
                "delete_objects",
                None,
                first.code().map(String::from),
                format!(
                    "{} of {} keys failed to delete (first: {} {})",
                    resp.errors().len(),
                    keys.len(),
                    first.key().unwrap_or("?"),
                    first.message().unwrap_or("")
                ),
            ));
        }

        Ok(())
    }
}

/// Turn an SDK error into a structured failure for retry classification
fn sdk_failure<E>(operation: &str, err: SdkError<E, HttpResponse>) -> ProviderFailure
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) => {
            ProviderFailure::network(operation, NetworkCause::Timeout, message)
        }
        SdkError::DispatchFailure(failure) => {
            let cause = if failure.is_timeout() {
                NetworkCause::Timeout
            } else if message.to_lowercase().contains("dns") {
                NetworkCause::DnsRetry
            } else if failure.is_io() {
                NetworkCause::ConnectionReset
            } else {
                NetworkCause::Other
            };
            ProviderFailure::network(operation, cause, message)
        }
        SdkError::ResponseError(resp) => ProviderFailure::service(
            operation,
            Some(resp.raw().status().as_u16()),
            None,
            message,
        ),
        SdkError::ServiceError(service) => ProviderFailure::service(
            operation,
            Some(service.raw().status().as_u16()),
            service.err().code().map(String::from),
            message,
        ),
        _ => ProviderFailure::opaque(operation, message),
    }
}

fn build_failure(operation: &str, err: aws_sdk_s3::error::BuildError) -> ProviderFailure {
    ProviderFailure::service(operation, None, Some("BuildError".to_string()), err.to_string())
}

/// Content type for the file kinds a mini-game bundle usually carries
fn content_type_for(key: &str) -> Option<&'static str> {
    let ext = key.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "json" => "application/json",
        "js" => "application/javascript",
        "html" => "text/html",
        "css" => "text/css",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(content_type)
}
