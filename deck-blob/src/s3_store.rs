use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use bytes::Bytes;

use crate::{
    BlobError, BlobResult, BlobStore, ConditionalPut, GetResult, ObjectHead, PutOptions, PutResult,
    StoreCapabilities,
};

/// Connection settings for an S3-compatible bucket (R2, RustFS, MinIO, S3)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Backend honours `If-None-Match: *` on PutObject
    pub conditional_put: bool,
}

impl S3Config {
    /// Read `S3_BUCKET`, `S3_REGION`, `S3_ENDPOINT_URL`, `S3_ACCESS_KEY_ID`,
    /// `S3_SECRET_ACCESS_KEY` and `S3_CONDITIONAL_PUT`
    pub fn from_env() -> BlobResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> BlobResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| BlobError::invalid(format!("{} environment variable required", key)))
        };

        let conditional_put = get("S3_CONDITIONAL_PUT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            bucket: require("S3_BUCKET")?,
            region: get("S3_REGION").unwrap_or_else(|| "auto".to_string()),
            endpoint_url: get("S3_ENDPOINT_URL"),
            access_key_id: require("S3_ACCESS_KEY_ID")?,
            secret_access_key: require("S3_SECRET_ACCESS_KEY")?,
            conditional_put,
        })
    }
}

/// Blob store backed by the AWS SDK against any S3-compatible endpoint
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
    conditional_put: bool,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let conditional_put = config.conditional_put;
        let client = Self::create_client(config).await;
        tracing::debug!(bucket = %bucket, conditional_put, "S3 client ready");
        Self {
            client,
            bucket,
            conditional_put,
        }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "deck-blob",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        tracing::warn!(error = %err, "S3 request failed");
        BlobError::backend(err)
    }

    fn put_request(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(body));

        if let Some(ct) = options.content_type {
            request = request.content_type(ct);
        }
        if let Some(cc) = options.cache_control {
            request = request.cache_control(cc);
        }
        for (k, v) in options.metadata {
            request = request.metadata(k, v);
        }

        request
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(out) => Ok(Some(ObjectHead {
                size_bytes: out.content_length().unwrap_or(0) as u64,
                content_type: out.content_type().map(str::to_string),
                etag: out.e_tag().map(str::to_string),
                last_modified: out.last_modified().map(|dt| dt.secs()),
            })),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(Self::map_aws_error(err)),
        }
    }

    async fn get(&self, key: &str) -> BlobResult<Option<GetResult>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None)
            }
            Err(err) => return Err(Self::map_aws_error(err)),
        };

        let content_type = out.content_type().map(str::to_string);
        let etag = out.e_tag().map(str::to_string);
        let body = out.body.collect().await.map_err(Self::map_aws_error)?;

        Ok(Some(GetResult {
            body: body.into_bytes(),
            content_type,
            etag,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> BlobResult<PutResult> {
        let size_bytes = body.len() as u64;
        let result = self
            .put_request(key, body, options)
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag().map(str::to_string),
            size_bytes,
        })
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> BlobResult<ConditionalPut> {
        if !self.conditional_put {
            return Err(BlobError::Unsupported);
        }

        let size_bytes = body.len() as u64;
        let result = self
            .put_request(key, body, options)
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(out) => Ok(ConditionalPut::Created(PutResult {
                etag: out.e_tag().map(str::to_string),
                size_bytes,
            })),
            // 412 Precondition Failed, or 409 when a concurrent conditional write is in flight
            Err(err)
                if err
                    .raw_response()
                    .is_some_and(|r| matches!(r.status().as_u16(), 409 | 412)) =>
            {
                tracing::debug!(key, "conditional put lost: object already exists");
                Ok(ConditionalPut::AlreadyExists)
            }
            Err(err) => Err(Self::map_aws_error(err)),
        }
    }

    fn capabilities(&self) -> StoreCapabilities {
        if self.conditional_put {
            StoreCapabilities::basic().with_conditional_put()
        } else {
            StoreCapabilities::basic()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> BlobResult<S3Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        S3Config::from_lookup(|key| vars.get(key).cloned())
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("S3_BUCKET", "decks"),
        ("S3_ACCESS_KEY_ID", "key"),
        ("S3_SECRET_ACCESS_KEY", "secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = config_with(&CREDENTIALS).unwrap();
        assert_eq!(config.bucket, "decks");
        assert_eq!(config.region, "auto");
        assert_eq!(config.endpoint_url, None);
        assert!(!config.conditional_put);
    }

    #[test]
    fn optional_vars_are_read() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            ("S3_REGION", "eu-west-1"),
            ("S3_ENDPOINT_URL", " http://localhost:9000 "),
            ("S3_CONDITIONAL_PUT", "TRUE"),
        ]);
        let config = config_with(&pairs).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.conditional_put);

        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("S3_CONDITIONAL_PUT", "yes"));
        assert!(!config_with(&pairs).unwrap().conditional_put);
    }

    #[test]
    fn bucket_and_credentials_are_required() {
        for missing in ["S3_BUCKET", "S3_ACCESS_KEY_ID", "S3_SECRET_ACCESS_KEY"] {
            let pairs: Vec<_> = CREDENTIALS.iter().copied().filter(|(k, _)| *k != missing).collect();
            let err = config_with(&pairs).unwrap_err();
            assert!(matches!(err, BlobError::Invalid { .. }), "{missing}");
            assert!(err.to_string().contains(missing));
        }

        let blank = [("S3_BUCKET", "  "), CREDENTIALS[1], CREDENTIALS[2]];
        assert!(config_with(&blank).is_err());
    }
}
