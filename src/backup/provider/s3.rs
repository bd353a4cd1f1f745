use crate::backup::function_path;
use crate::backup::provider::{Provider, ProviderBuilder};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};

use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bon::Builder;
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use validator::Validate;

static DEFAULT_REGION: &str = "auto";
static CREDENTIALS_PROVIDER_NAME: &str = "backuper-static";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Configuration for a generic S3-compatible object store
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct S3Config {
    #[validate(length(min = 1))]
    #[builder(into)]
    bucket_name: String,
    #[validate(nested)]
    #[builder(into)]
    access_key: RedactedString,
    #[validate(nested)]
    #[builder(into)]
    secret_key: RedactedString,
    #[serde(default = "default_region")]
    #[builder(into, default = default_region())]
    region: String,
    #[builder(into)]
    endpoint_url: Option<String>,
    #[serde(default)]
    #[builder(default)]
    force_path_style: bool,
    /// Upper bound for a single upload request, e.g. `30m`
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

/// Configuration for Cloudflare R2
///
/// R2 speaks the S3 protocol on a per-account endpoint,
/// `https://<account_id>.r2.cloudflarestorage.com`, with region `auto`.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct CloudflareR2Config {
    #[serde(alias = "accessKey")]
    #[validate(nested)]
    #[builder(into)]
    access_key: RedactedString,
    #[serde(alias = "secretKey")]
    #[validate(nested)]
    #[builder(into)]
    secret_key: RedactedString,
    #[serde(alias = "accountID")]
    #[validate(length(min = 1))]
    #[builder(into)]
    account_id: String,
    #[serde(alias = "bucketName")]
    #[validate(length(min = 1))]
    #[builder(into)]
    bucket_name: String,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

impl CloudflareR2Config {
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

impl From<&CloudflareR2Config> for S3Config {
    fn from(r2: &CloudflareR2Config) -> Self {
        S3Config::builder()
            .bucket_name(r2.bucket_name.clone())
            .access_key(r2.access_key.clone())
            .secret_key(r2.secret_key.clone())
            .endpoint_url(r2.endpoint_url())
            .maybe_timeout(r2.timeout)
            .build()
    }
}

impl ProviderBuilder for S3Config {
    #[named]
    fn build_provider(&self, name: &str) -> Result<Box<dyn Provider>> {
        S3Provider::connect(name, self)
            .map(|p| Box::new(p) as Box<dyn Provider>)
            .add_fn_name(function_path!())
    }
}

impl ProviderBuilder for CloudflareR2Config {
    fn build_provider(&self, name: &str) -> Result<Box<dyn Provider>> {
        S3Config::from(self).build_provider(name)
    }
}

/// Uploads archives with a single `PutObject` request each
///
/// Owns a current-thread runtime so the async SDK can be driven from the
/// synchronous backup loop.
pub struct S3Provider {
    name: String,
    bucket_name: String,
    client: Client,
    runtime: Runtime,
}

impl S3Provider {
    pub fn connect(name: &str, config: &S3Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::from)
            .add_msg("Create async runtime for S3 client failed")?;

        let credentials = Credentials::new(
            config.access_key.inner(),
            config.secret_key.inner(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(timeout) = config.timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );
        }

        let sdk_config = runtime.block_on(loader.load());
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            "Created S3 provider {:?} for bucket {:?} at {:?}",
            name,
            config.bucket_name,
            config.endpoint_url.as_deref().unwrap_or("default endpoint")
        );

        Ok(Self {
            name: name.to_string(),
            bucket_name: config.bucket_name.clone(),
            client: Client::from_conf(s3_config),
            runtime,
        })
    }
}

impl Provider for S3Provider {
    fn name(&self) -> &str {
        &self.name
    }

    #[named]
    fn upload(&self, key: &str, archive_path: &Path) -> Result<()> {
        let size = std::fs::metadata(archive_path)
            .map_err(Error::from)
            .add_msg(format!("Read size of {:?} failed", archive_path))?
            .len();
        let content_length = i64::try_from(size).map_err(std::io::Error::other)?;

        tracing::info!(
            "Uploading {:?} ({} bytes) to bucket {:?} as {:?}",
            archive_path,
            size,
            self.bucket_name,
            key
        );

        self.runtime
            .block_on(async {
                let body = ByteStream::from_path(archive_path).await?;
                self.client
                    .put_object()
                    .bucket(&self.bucket_name)
                    .key(key)
                    .content_length(content_length)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| Error::S3(DisplayErrorContext(e).to_string()))?;
                Ok::<_, Error>(())
            })
            .add_msg(format!(
                "Upload {:?} to bucket {:?} failed",
                archive_path, self.bucket_name
            ))
            .add_fn_name(function_path!())
    }
}
